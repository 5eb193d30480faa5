use super::*;
use block::{Block, BlockData};

/// Builds a locally originated bundle.
pub struct Builder {
    bundle_flags: BundleFlags,
    crc_type: CrcType,
    source: Eid,
    destination: Eid,
    report_to: Option<Eid>,
    lifetime: u64,
    hop_limit: Option<u64>,
    payload: Box<[u8]>,
    extensions: Vec<Block>,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            bundle_flags: BundleFlags::default(),
            crc_type: CrcType::CRC32_CASTAGNOLI,
            source: Eid::default(),
            destination: Eid::default(),
            report_to: None,
            lifetime: 24 * 60 * 60 * 1000,
            hop_limit: None,
            payload: Box::default(),
            extensions: Vec::new(),
        }
    }
}

impl Builder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn flags(&mut self, flags: BundleFlags) -> &mut Self {
        self.bundle_flags = flags;
        self
    }

    /// The CRC type of the primary block and every block added afterwards.
    pub fn crc_type(&mut self, crc_type: CrcType) -> &mut Self {
        self.crc_type = crc_type;
        self
    }

    pub fn source(&mut self, source: Eid) -> &mut Self {
        self.source = source;
        self
    }

    pub fn destination(&mut self, destination: Eid) -> &mut Self {
        self.destination = destination;
        self
    }

    /// Defaults to the source.
    pub fn report_to(&mut self, report_to: Eid) -> &mut Self {
        self.report_to = Some(report_to);
        self
    }

    /// Lifetime in milliseconds.
    pub fn lifetime(&mut self, lifetime: u64) -> &mut Self {
        self.lifetime = lifetime;
        self
    }

    /// Adds a Hop Count block with `limit`.
    pub fn hop_limit(&mut self, limit: u64) -> &mut Self {
        self.hop_limit = Some(limit);
        self
    }

    pub fn payload(&mut self, payload: impl Into<Box<[u8]>>) -> &mut Self {
        self.payload = payload.into();
        self
    }

    /// Adds an extension block, its number is assigned by [`Builder::build`].
    pub fn add_extension_block(&mut self, block: Block) -> &mut Self {
        self.extensions.push(block);
        self
    }

    /// Builds the bundle. Without a creation time a Bundle Age block is added, replicated
    /// in every fragment so each one can be aged.
    pub fn build(&self, timestamp: CreationTimestamp) -> Bundle {
        let mut bundle = Bundle::new(PrimaryBlock {
            flags: BundleFlags {
                is_fragment: false,
                ..self.bundle_flags
            },
            crc_type: self.crc_type,
            destination: self.destination.clone(),
            source: self.source.clone(),
            report_to: self.report_to.clone().unwrap_or_else(|| self.source.clone()),
            timestamp,
            lifetime: self.lifetime,
            ..Default::default()
        });

        bundle.add_block(
            Block::new(block::Type::Payload, BlockData::Raw(self.payload.clone()))
                .with_crc_type(self.crc_type),
        );

        if let Some(limit) = self.hop_limit {
            bundle.add_block(
                Block::new(
                    block::Type::HopCount,
                    BlockData::HopCount(HopInfo { limit, count: 0 }),
                )
                .with_crc_type(self.crc_type),
            );
        }

        if timestamp.creation_time.is_none() && bundle.bundle_age().is_none() {
            bundle.add_block(
                Block::new(block::Type::BundleAge, BlockData::BundleAge(0))
                    .with_flags(block::Flags {
                        must_replicate: true,
                        ..Default::default()
                    })
                    .with_crc_type(self.crc_type),
            );
        }

        for block in &self.extensions {
            bundle.add_block(block.clone());
        }
        bundle
    }
}
