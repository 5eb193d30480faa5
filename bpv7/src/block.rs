/*!
Canonical blocks (RFC 9171 Section 4.3.2).

A [`Block`] holds its block-type-specific data decoded into a [`BlockData`]
variant. The conversion between that variant and the byte string carried on the
wire is looked up by block type code in a [`Registry`], so new block types can be
supported without touching the block codec itself.
*/

use super::*;
use error::CaptureFieldErr;
use hashbrown::HashMap;
use std::borrow::Cow;
use std::sync::LazyLock;

/// The processing control flags of a block (RFC 9171 Section 4.2.4).
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Flags {
    /// If set, the block must be replicated in every fragment of the bundle.
    pub must_replicate: bool,
    /// If set, a status report should be generated if block processing fails.
    pub report_on_failure: bool,
    /// If set, the entire bundle should be deleted if block processing fails.
    pub delete_bundle_on_failure: bool,
    /// If set, this block should be deleted if its processing fails.
    pub delete_block_on_failure: bool,
    /// Any flag bits not listed above, kept as received.
    pub unrecognised: u64,
}

impl From<Flags> for u64 {
    fn from(value: Flags) -> Self {
        let mut flags = value.unrecognised & !0x17;
        if value.must_replicate {
            flags |= 0x01;
        }
        if value.report_on_failure {
            flags |= 0x02;
        }
        if value.delete_bundle_on_failure {
            flags |= 0x04;
        }
        if value.delete_block_on_failure {
            flags |= 0x10;
        }
        flags
    }
}

impl From<u64> for Flags {
    fn from(value: u64) -> Self {
        Self {
            must_replicate: value & 0x01 != 0,
            report_on_failure: value & 0x02 != 0,
            delete_bundle_on_failure: value & 0x04 != 0,
            delete_block_on_failure: value & 0x10 != 0,
            unrecognised: value & !0x17,
        }
    }
}

impl cbor::encode::ToCbor for Flags {
    fn to_cbor(&self, encoder: &mut cbor::encode::Encoder) {
        encoder.emit(&u64::from(*self))
    }
}

impl cbor::decode::FromCbor for Flags {
    type Error = cbor::decode::Error;

    fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, usize)>, Self::Error> {
        Ok(cbor::decode::try_parse::<u64>(data)?.map(|(v, len)| (v.into(), len)))
    }
}

/// The type of a canonical block, as defined in RFC 9171 Section 4.2.1.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Type {
    /// Payload Block (type code 1).
    Payload,
    /// Previous Node Block (type code 6).
    PreviousNode,
    /// Bundle Age Block (type code 7).
    BundleAge,
    /// Hop Count Block (type code 10).
    HopCount,
    /// Block Integrity Block (type code 11, RFC 9172).
    BlockIntegrity,
    /// Any other block type code.
    Unrecognised(u64),
}

impl From<Type> for u64 {
    fn from(value: Type) -> Self {
        match value {
            Type::Payload => 1,
            Type::PreviousNode => 6,
            Type::BundleAge => 7,
            Type::HopCount => 10,
            Type::BlockIntegrity => 11,
            Type::Unrecognised(v) => v,
        }
    }
}

impl From<u64> for Type {
    fn from(value: u64) -> Self {
        match value {
            1 => Type::Payload,
            6 => Type::PreviousNode,
            7 => Type::BundleAge,
            10 => Type::HopCount,
            11 => Type::BlockIntegrity,
            value => Type::Unrecognised(value),
        }
    }
}

/// Block-type-specific data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockData {
    /// Uninterpreted bytes: the payload, or a block type registered as opaque.
    Raw(Box<[u8]>),
    /// The previous node's EID.
    PreviousNode(Eid),
    /// Milliseconds the bundle has existed.
    BundleAge(u64),
    HopCount(HopInfo),
    Security(bpsec::AbstractSecurityBlock),
}

impl BlockData {
    /// Returns `true` if this variant is valid content for a block of type `block_type`.
    pub fn matches(&self, block_type: Type) -> bool {
        matches!(
            (self, block_type),
            (BlockData::Raw(_), Type::Payload | Type::Unrecognised(_))
                | (BlockData::PreviousNode(_), Type::PreviousNode)
                | (BlockData::BundleAge(_), Type::BundleAge)
                | (BlockData::HopCount(_), Type::HopCount)
                | (BlockData::Security(_), Type::BlockIntegrity)
        )
    }
}

/// Converts block-type-specific data to and from the bytes carried on the wire.
#[derive(Copy, Clone)]
pub struct Codec {
    pub encode: fn(Type, &BlockData) -> Result<Vec<u8>, Error>,
    pub decode: fn(Type, &[u8]) -> Result<BlockData, Error>,
}

impl Codec {
    /// A codec that carries the block data as uninterpreted bytes.
    pub const RAW: Codec = Codec {
        encode: |block_type, data| match data {
            BlockData::Raw(data) => Ok(data.to_vec()),
            _ => Err(Error::BlockDataMismatch(block_type)),
        },
        decode: |_, data| Ok(BlockData::Raw(data.into())),
    };

    const PREVIOUS_NODE: Codec = Codec {
        encode: |block_type, data| match data {
            BlockData::PreviousNode(eid) => Ok(cbor::encode::emit(eid)),
            _ => Err(Error::BlockDataMismatch(block_type)),
        },
        decode: |_, data| {
            cbor::decode::parse_exact(data)
                .map(BlockData::PreviousNode)
                .map_field_err("Previous Node Block")
        },
    };

    const BUNDLE_AGE: Codec = Codec {
        encode: |block_type, data| match data {
            BlockData::BundleAge(age) => Ok(cbor::encode::emit(age)),
            _ => Err(Error::BlockDataMismatch(block_type)),
        },
        decode: |_, data| {
            cbor::decode::parse_exact(data)
                .map(BlockData::BundleAge)
                .map_field_err("Bundle Age Block")
        },
    };

    const HOP_COUNT: Codec = Codec {
        encode: |block_type, data| match data {
            BlockData::HopCount(hop_info) => Ok(cbor::encode::emit(hop_info)),
            _ => Err(Error::BlockDataMismatch(block_type)),
        },
        decode: |_, data| {
            cbor::decode::parse_exact(data)
                .map(BlockData::HopCount)
                .map_field_err("Hop Count Block")
        },
    };

    const BLOCK_INTEGRITY: Codec = Codec {
        encode: |block_type, data| match data {
            BlockData::Security(asb) => Ok(asb.encode()),
            _ => Err(Error::BlockDataMismatch(block_type)),
        },
        decode: |_, data| Ok(BlockData::Security(bpsec::AbstractSecurityBlock::decode(data)?)),
    };
}

/// Maps block type codes to the [`Codec`] used for their data.
#[derive(Clone)]
pub struct Registry {
    codecs: HashMap<u64, Codec>,
}

impl Default for Registry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Type::Payload, Codec::RAW);
        registry.register(Type::PreviousNode, Codec::PREVIOUS_NODE);
        registry.register(Type::BundleAge, Codec::BUNDLE_AGE);
        registry.register(Type::HopCount, Codec::HOP_COUNT);
        registry.register(Type::BlockIntegrity, Codec::BLOCK_INTEGRITY);
        registry
    }
}

impl Registry {
    /// A registry with no codecs at all, not even for the payload.
    pub fn empty() -> Self {
        Self {
            codecs: HashMap::new(),
        }
    }

    /// Adds or replaces the codec for `block_type`.
    pub fn register(&mut self, block_type: Type, codec: Codec) -> Option<Codec> {
        self.codecs.insert(block_type.into(), codec)
    }

    pub fn is_supported(&self, block_type: Type) -> bool {
        block_type == Type::Payload || self.codecs.contains_key(&u64::from(block_type))
    }

    pub fn encode(&self, block_type: Type, data: &BlockData) -> Result<Vec<u8>, Error> {
        match self.codecs.get(&u64::from(block_type)) {
            Some(codec) => (codec.encode)(block_type, data),
            None if block_type == Type::Payload => (Codec::RAW.encode)(block_type, data),
            None => Err(Error::UnsupportedBlockType(block_type.into())),
        }
    }

    pub fn decode(&self, block_type: Type, data: &[u8]) -> Result<BlockData, Error> {
        match self.codecs.get(&u64::from(block_type)) {
            Some(codec) => (codec.decode)(block_type, data),
            None if block_type == Type::Payload => (Codec::RAW.decode)(block_type, data),
            None => Err(Error::UnsupportedBlockType(block_type.into())),
        }
    }
}

/// The registry of the built-in block types.
pub fn registry() -> &'static Registry {
    static DEFAULT: LazyLock<Registry> = LazyLock::new(Registry::default);
    &DEFAULT
}

/// A canonical block.
///
/// The block number is assigned when the block is added to a bundle with
/// [`Bundle::add_block`](crate::bundle::Bundle::add_block).
#[derive(Debug, Clone)]
pub struct Block {
    pub block_type: Type,
    pub number: u64,
    pub flags: Flags,
    pub crc_type: CrcType,
    pub data: BlockData,
    /// The CRC value read from the wire, checked by the validator.
    pub(crate) received_crc: Option<u32>,
}

// The received CRC is a property of the encoding, not of the block
impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.block_type == other.block_type
            && self.number == other.number
            && self.flags == other.flags
            && self.crc_type == other.crc_type
            && self.data == other.data
    }
}

impl Eq for Block {}

impl Block {
    pub fn new(block_type: Type, data: BlockData) -> Self {
        Self {
            block_type,
            number: 0,
            flags: Flags::default(),
            crc_type: CrcType::None,
            data,
            received_crc: None,
        }
    }

    pub fn with_flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_crc_type(mut self, crc_type: CrcType) -> Self {
        self.crc_type = crc_type;
        self
    }

    /// The CRC value this block was received with, if any.
    pub fn received_crc(&self) -> Option<u32> {
        self.received_crc
    }

    /// Replaces the block data. The received CRC no longer applies and is dropped.
    pub fn set_data(&mut self, data: BlockData) {
        self.data = data;
        self.received_crc = None;
    }

    /// Encodes the block with the built-in block type registry.
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        self.encode_with(registry())
    }

    pub fn encode_with(&self, registry: &Registry) -> Result<Vec<u8>, Error> {
        let mut data = Vec::new();
        self.encode_into(registry, |part| data.extend_from_slice(part))?;
        Ok(data)
    }

    /// Feeds the encoded block to `sink` a part at a time, with the CRC computed as the
    /// parts go by. Payload bytes are passed through as they are held, never copied.
    pub fn encode_into<F>(&self, registry: &Registry, mut sink: F) -> Result<(), Error>
    where
        F: FnMut(&[u8]),
    {
        let data = match &self.data {
            BlockData::Raw(data) if self.block_type == Type::Payload => Cow::Borrowed(&**data),
            data => Cow::Owned(registry.encode(self.block_type, data)?),
        };

        let head = cbor::encode::emit_array(
            Some(if let CrcType::None = self.crc_type {
                5
            } else {
                6
            }),
            |a| {
                a.emit(&u64::from(self.block_type));
                a.emit(&self.number);
                a.emit(&self.flags);
                a.emit(&self.crc_type);
                a.emit_bytes_header(data.len());

                // CRC
                if let CrcType::None = self.crc_type {
                } else {
                    a.skip_value();
                }
            },
        );

        let mut digest = crc::Digest::new(self.crc_type);
        for part in [head.as_slice(), &*data] {
            digest.update(part);
            sink(part);
        }
        let crc = crc::crc_value(self.crc_type, digest);
        if !crc.is_empty() {
            sink(&crc);
        }
        Ok(())
    }

    pub(crate) fn parse(
        a: &mut cbor::decode::Array,
        registry: &Registry,
    ) -> Result<Self, Error> {
        let block_type = a
            .parse::<u64>()
            .map(Type::from)
            .map_field_err("block type code")?;
        let number = a.parse().map_field_err("block number")?;
        let flags = a.parse().map_field_err("block processing control flags")?;
        let crc_type = a.parse().map_field_err("CRC type")?;
        let data = a
            .parse_value(|value, tags| match value {
                cbor::decode::Value::Bytes(data) if tags.is_empty() => Ok(data),
                value => Err(cbor::decode::Error::IncorrectType(
                    "Definite-length Byte String".to_string(),
                    value.type_name(!tags.is_empty()),
                )),
            })
            .map_field_err("block-type-specific data")?;
        let data = registry.decode(block_type, data)?;
        let received_crc = crc::parse_crc_value(a, crc_type)?;

        Ok(Self {
            block_type,
            number,
            flags,
            crc_type,
            data,
            received_crc,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn flags() {
        let flags = Flags::from(0x01 | 0x10 | 0x100);
        assert!(flags.must_replicate);
        assert!(flags.delete_block_on_failure);
        assert!(!flags.report_on_failure);
        assert_eq!(flags.unrecognised, 0x100);
        assert_eq!(u64::from(flags), 0x111);
    }

    #[test]
    fn encode_payload() {
        let mut block = Block::new(Type::Payload, BlockData::Raw(Box::new(*b"abc")));
        block.number = 1;
        assert_eq!(block.encode().unwrap(), hex!("85 01 01 00 00 43 616263"));

        let block = block.with_crc_type(CrcType::CRC16_X25);
        let data = block.encode().unwrap();
        assert_eq!(data[0], 0x86);
        assert_eq!(data.len(), 12);

        let (parsed, _) = cbor::decode::parse_array(&data, |a, _| Block::parse(a, registry()))
            .unwrap();
        assert_eq!(parsed, block);
        assert!(parsed.received_crc().is_some());

        let mut parsed = parsed;
        parsed.set_data(BlockData::Raw(Box::new(*b"abd")));
        assert!(parsed.received_crc().is_none());
    }

    #[test]
    fn streamed_payload() {
        let payload: Box<[u8]> = (0..100_000u32).map(|i| i as u8).collect();
        let mut block = Block::new(Type::Payload, BlockData::Raw(payload))
            .with_crc_type(CrcType::CRC32_CASTAGNOLI);
        block.number = 1;
        let BlockData::Raw(held) = &block.data else {
            unreachable!()
        };

        let mut parts = Vec::new();
        block
            .encode_into(registry(), |part| parts.push((part.as_ptr(), part.to_vec())))
            .unwrap();

        // Head, the payload itself, then the CRC value
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1].0, held.as_ptr());
        assert_eq!(parts[1].1.len(), 100_000);

        let data = parts.into_iter().flat_map(|(_, part)| part).collect::<Vec<_>>();
        assert_eq!(data, block.encode().unwrap());

        let (parsed, _) = cbor::decode::parse_array(&data, |a, _| Block::parse(a, registry()))
            .unwrap();
        assert_eq!(parsed, block);
        crc::check_crc_value(block.crc_type, parsed.received_crc(), &data).unwrap();
    }

    #[test]
    fn mismatched_data() {
        let block = Block::new(Type::BundleAge, BlockData::Raw(Box::default()));
        assert!(matches!(
            block.encode(),
            Err(Error::BlockDataMismatch(Type::BundleAge))
        ));
    }

    #[test]
    fn unknown_types() {
        let block = Block::new(Type::Unrecognised(192), BlockData::Raw(Box::new([1u8])));
        assert!(matches!(
            block.encode(),
            Err(Error::UnsupportedBlockType(192))
        ));

        let data = hex!("85 18C0 02 00 00 41 01");
        assert!(matches!(
            cbor::decode::parse_array(&data, |a, _| Block::parse(a, registry())),
            Err(Error::UnsupportedBlockType(192))
        ));

        let mut registry = Registry::default();
        registry.register(Type::Unrecognised(192), Codec::RAW);
        let (parsed, _) =
            cbor::decode::parse_array(&data, |a, _| Block::parse(a, &registry)).unwrap();
        assert_eq!(parsed.data, BlockData::Raw(Box::new([1u8])));
        assert_eq!(parsed.number, 2);
        assert_eq!(parsed.encode_with(&registry).unwrap(), data);

        // Payload survives an empty registry
        let mut block = Block::new(Type::Payload, BlockData::Raw(Box::default()));
        block.number = 1;
        assert!(block.encode_with(&Registry::empty()).is_ok());
    }
}
