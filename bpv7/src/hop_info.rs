use super::*;
use error::CaptureFieldErr;

/// The content of a Hop Count extension block.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HopInfo {
    pub limit: u64,
    pub count: u64,
}

impl HopInfo {
    pub fn is_exceeded(&self) -> bool {
        self.count > self.limit
    }
}

impl cbor::encode::ToCbor for HopInfo {
    fn to_cbor(&self, encoder: &mut cbor::encode::Encoder) {
        encoder.emit_array(Some(2), |a| {
            a.emit(&self.limit);
            a.emit(&self.count);
        })
    }
}

impl cbor::decode::FromCbor for HopInfo {
    type Error = error::Error;

    fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, usize)>, Self::Error> {
        cbor::decode::try_parse_array(data, |a, _| {
            Ok(HopInfo {
                limit: a.parse().map_field_err("hop limit")?,
                count: a.parse().map_field_err("hop count")?,
            })
        })
    }
}
