/*!
The [`Bundle`] itself: a primary block followed by canonical blocks, encoded as
an indefinite-length CBOR array (RFC 9171 Section 4.1).
*/

use super::*;
use block::{Block, BlockData};
use bundle_id::BundleId;

#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    pub primary: PrimaryBlock,
    /// The canonical blocks in wire order. The payload block is last.
    pub blocks: Vec<Block>,
}

impl Bundle {
    pub fn new(primary: PrimaryBlock) -> Self {
        Self {
            primary,
            blocks: Vec::new(),
        }
    }

    pub fn id(&self) -> BundleId {
        BundleId {
            source: self.primary.source.clone(),
            destination: self.primary.destination.clone(),
            timestamp: self.primary.timestamp,
            fragment_info: self.primary.fragment_info(),
        }
    }

    /// The id shared by all fragments of the same original bundle.
    pub fn fragment_id(&self) -> BundleId {
        BundleId {
            fragment_info: None,
            ..self.id()
        }
    }

    pub fn is_fragment(&self) -> bool {
        self.primary.flags.is_fragment
    }

    pub fn is_admin_record(&self) -> bool {
        self.primary.flags.is_admin_record
    }

    pub fn block(&self, number: u64) -> Option<&Block> {
        self.blocks.iter().find(|b| b.number == number)
    }

    pub fn block_mut(&mut self, number: u64) -> Option<&mut Block> {
        self.blocks.iter_mut().find(|b| b.number == number)
    }

    pub fn blocks_of_type(&self, block_type: block::Type) -> impl Iterator<Item = &Block> {
        self.blocks.iter().filter(move |b| b.block_type == block_type)
    }

    fn first_of_type(&self, block_type: block::Type) -> Option<&Block> {
        self.blocks_of_type(block_type).next()
    }

    pub fn payload(&self) -> Option<&[u8]> {
        match self.first_of_type(block::Type::Payload).map(|b| &b.data) {
            Some(BlockData::Raw(data)) => Some(data),
            _ => None,
        }
    }

    pub fn hop_count(&self) -> Option<HopInfo> {
        match self.first_of_type(block::Type::HopCount).map(|b| &b.data) {
            Some(BlockData::HopCount(hop_info)) => Some(*hop_info),
            _ => None,
        }
    }

    pub fn bundle_age(&self) -> Option<u64> {
        match self.first_of_type(block::Type::BundleAge).map(|b| &b.data) {
            Some(BlockData::BundleAge(age)) => Some(*age),
            _ => None,
        }
    }

    pub fn previous_node(&self) -> Option<&Eid> {
        match self.first_of_type(block::Type::PreviousNode).map(|b| &b.data) {
            Some(BlockData::PreviousNode(eid)) => Some(eid),
            _ => None,
        }
    }

    /// The time the bundle expires, if the source had a clock.
    pub fn expiry(&self) -> Option<DtnTime> {
        self.primary
            .timestamp
            .creation_time
            .map(|t| t.saturating_add(self.primary.lifetime))
    }

    /// Without a creation time, the age recorded in the Bundle Age block is used.
    pub fn is_expired(&self, now: DtnTime) -> bool {
        match self.expiry() {
            Some(expiry) => now >= expiry,
            None => self
                .bundle_age()
                .is_some_and(|age| age >= self.primary.lifetime),
        }
    }

    /// Adds `block`, allocating its block number, and returns the number.
    ///
    /// A payload block is always number 1 and replaces any existing payload. Other
    /// blocks get the next unused number and are inserted so that block numbers
    /// descend, which keeps the payload last.
    pub fn add_block(&mut self, mut block: Block) -> u64 {
        if block.block_type == block::Type::Payload {
            self.blocks.retain(|b| b.block_type != block::Type::Payload);
            block.number = 1;
            self.blocks.push(block);
            return 1;
        }

        let number = self
            .blocks
            .iter()
            .map(|b| b.number)
            .max()
            .unwrap_or(1)
            .max(1)
            + 1;
        block.number = number;

        let idx = self
            .blocks
            .iter()
            .position(|b| b.number < number)
            .unwrap_or(self.blocks.len());
        self.blocks.insert(idx, block);
        number
    }

    pub fn remove_block(&mut self, number: u64) -> Option<Block> {
        let idx = self.blocks.iter().position(|b| b.number == number)?;
        Some(self.blocks.remove(idx))
    }

    /// Encodes the bundle with the built-in block type registry.
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        self.encode_with(block::registry())
    }

    pub fn encode_with(&self, registry: &block::Registry) -> Result<Vec<u8>, Error> {
        let primary = self.primary.encode();
        let blocks = self
            .blocks
            .iter()
            .map(|b| b.encode_with(registry))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(cbor::encode::emit_array(None, |a| {
            a.emit(&cbor::encode::Raw(&primary));
            for block in &blocks {
                a.emit(&cbor::encode::Raw(block));
            }
        }))
    }

    /// Decodes a bundle with the built-in block type registry.
    ///
    /// Decoding checks the wire format only, use [`validate`](crate::validate) to
    /// check the structure and CRCs.
    pub fn decode(data: &[u8]) -> Result<Self, Error> {
        Self::decode_with(data, block::registry())
    }

    pub fn decode_with(data: &[u8], registry: &block::Registry) -> Result<Self, Error> {
        let (bundle, len) = cbor::decode::parse_array(data, |a, tags| {
            if !tags.is_empty() || a.is_definite() {
                return Err(Error::InvalidCBOR(cbor::decode::Error::IncorrectType(
                    "Untagged Indefinite-length Array".to_string(),
                    "Tagged or Definite-length Array".to_string(),
                )));
            }

            let primary = a.parse_array(|block, _| PrimaryBlock::parse(block))?;

            let mut blocks = Vec::new();
            while let Some(block) = a.try_parse_array(|block, _| Block::parse(block, registry))? {
                blocks.push(block);
            }
            Ok(Bundle { primary, blocks })
        })?;

        if len != data.len() {
            Err(Error::AdditionalData)
        } else {
            Ok(bundle)
        }
    }
}
