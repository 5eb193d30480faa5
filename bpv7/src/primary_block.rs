use super::*;
use bundle_id::FragmentInfo;
use error::CaptureFieldErr;

/// The primary block of a bundle (RFC 9171 Section 4.3.1).
///
/// `fragment_offset` and `total_data_length` are only meaningful, and only
/// encoded, when `flags.is_fragment` is set.
#[derive(Default, Debug, Clone)]
pub struct PrimaryBlock {
    pub flags: BundleFlags,
    pub crc_type: CrcType,
    pub destination: Eid,
    pub source: Eid,
    pub report_to: Eid,
    pub timestamp: CreationTimestamp,
    /// Lifetime in milliseconds from the creation time.
    pub lifetime: u64,
    pub fragment_offset: u64,
    pub total_data_length: u64,
    pub(crate) received_crc: Option<u32>,
}

impl PartialEq for PrimaryBlock {
    fn eq(&self, other: &Self) -> bool {
        self.flags == other.flags
            && self.crc_type == other.crc_type
            && self.destination == other.destination
            && self.source == other.source
            && self.report_to == other.report_to
            && self.timestamp == other.timestamp
            && self.lifetime == other.lifetime
            && self.fragment_info() == other.fragment_info()
    }
}

impl Eq for PrimaryBlock {}

impl PrimaryBlock {
    pub fn fragment_info(&self) -> Option<FragmentInfo> {
        self.flags.is_fragment.then_some(FragmentInfo {
            offset: self.fragment_offset,
            total_len: self.total_data_length,
        })
    }

    pub fn received_crc(&self) -> Option<u32> {
        self.received_crc
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut count = 8;
        if self.flags.is_fragment {
            count += 2;
        }
        if !matches!(self.crc_type, CrcType::None) {
            count += 1;
        }

        crc::append_crc_value(
            self.crc_type,
            cbor::encode::emit_array(Some(count), |a| {
                a.emit(&7);
                a.emit(&self.flags);
                a.emit(&self.crc_type);
                a.emit(&self.destination);
                a.emit(&self.source);
                a.emit(&self.report_to);
                a.emit(&self.timestamp);
                a.emit(&self.lifetime);

                if self.flags.is_fragment {
                    a.emit(&self.fragment_offset);
                    a.emit(&self.total_data_length);
                }

                // CRC
                if let CrcType::None = self.crc_type {
                } else {
                    a.skip_value();
                }
            }),
        )
    }

    pub(crate) fn parse(block: &mut cbor::decode::Array) -> Result<Self, Error> {
        let version = block.parse::<u64>().map_field_err("version")?;
        if version != 7 {
            return Err(Error::InvalidVersion(version));
        }

        let flags: BundleFlags = block
            .parse()
            .map_field_err("bundle processing control flags")?;
        let crc_type = block.parse().map_field_err("CRC type")?;
        let destination = block.parse().map_field_err("destination EID")?;
        let source = block.parse().map_field_err("source EID")?;
        let report_to = block.parse().map_field_err("report-to EID")?;
        let timestamp = block.parse().map_field_err("creation timestamp")?;
        let lifetime = block.parse().map_field_err("lifetime")?;

        let (fragment_offset, total_data_length) = if flags.is_fragment {
            (
                block.parse().map_field_err("fragment offset")?,
                block
                    .parse()
                    .map_field_err("total application data unit length")?,
            )
        } else {
            (0, 0)
        };

        let received_crc = crc::parse_crc_value(block, crc_type)?;

        Ok(Self {
            flags,
            crc_type,
            destination,
            source,
            report_to,
            timestamp,
            lifetime,
            fragment_offset,
            total_data_length,
            received_crc,
        })
    }
}

impl cbor::decode::FromCbor for PrimaryBlock {
    type Error = Error;

    fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, usize)>, Self::Error> {
        cbor::decode::try_parse_array(data, |block, _| Self::parse(block))
    }
}
