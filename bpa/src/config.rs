use super::*;

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "kebab-case"))]
pub struct Config {
    /// Send the status reports bundles ask for.
    pub status_reports: bool,

    /// Lifetime of the status report bundles this node originates.
    pub status_report_lifetime: time::Duration,

    /// CRC type of bundles this node originates.
    #[cfg_attr(feature = "serde", serde(with = "crc_type"))]
    pub crc_type: bpv7::crc::CrcType,

    /// The number of recent bundle ids remembered for duplicate suppression.
    pub seen_bundles: std::num::NonZeroUsize,

    /// Initial value of the creation timestamp sequence counter.
    pub sequence_start: u64,

    pub node_ids: node_ids::NodeIds,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            status_reports: true,
            status_report_lifetime: time::Duration::hours(1),
            crc_type: bpv7::crc::CrcType::CRC32_CASTAGNOLI,
            seen_bundles: std::num::NonZeroUsize::MIN.saturating_add(1023),
            sequence_start: 0,
            node_ids: node_ids::NodeIds::default(),
        }
    }
}

#[cfg(feature = "serde")]
mod crc_type {
    use super::*;
    use bpv7::crc::CrcType;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(value: &CrcType, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(match value {
            CrcType::None => "none",
            CrcType::CRC16_X25 => "crc16",
            CrcType::CRC32_CASTAGNOLI => "crc32",
        })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<CrcType, D::Error> {
        match String::deserialize(deserializer)?.as_str() {
            "none" => Ok(CrcType::None),
            "crc16" => Ok(CrcType::CRC16_X25),
            "crc32" => Ok(CrcType::CRC32_CASTAGNOLI),
            s => Err(de::Error::unknown_variant(s, &["none", "crc16", "crc32"])),
        }
    }
}
