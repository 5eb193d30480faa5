use super::*;

const KNOWN_FLAGS: u64 =
    0x01 | 0x02 | 0x04 | 0x20 | 0x40 | 0x4000 | 0x10000 | 0x20000 | 0x40000;

/// Bundle processing control flags (RFC 9171 Section 4.2.3).
///
/// Bits this implementation does not understand are kept in `unrecognised`, so a
/// forwarded bundle carries them unchanged.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BundleFlags {
    pub is_fragment: bool,
    pub is_admin_record: bool,
    pub do_not_fragment: bool,
    pub app_ack_requested: bool,
    pub report_status_time: bool,
    pub receipt_report_requested: bool,
    pub forward_report_requested: bool,
    pub delivery_report_requested: bool,
    pub delete_report_requested: bool,
    pub unrecognised: u64,
}

impl From<u64> for BundleFlags {
    fn from(value: u64) -> Self {
        Self {
            is_fragment: value & 0x01 != 0,
            is_admin_record: value & 0x02 != 0,
            do_not_fragment: value & 0x04 != 0,
            app_ack_requested: value & 0x20 != 0,
            report_status_time: value & 0x40 != 0,
            receipt_report_requested: value & 0x4000 != 0,
            forward_report_requested: value & 0x10000 != 0,
            delivery_report_requested: value & 0x20000 != 0,
            delete_report_requested: value & 0x40000 != 0,
            unrecognised: value & !KNOWN_FLAGS,
        }
    }
}

impl From<BundleFlags> for u64 {
    fn from(value: BundleFlags) -> Self {
        let mut flags = value.unrecognised & !KNOWN_FLAGS;
        if value.is_fragment {
            flags |= 0x01;
        }
        if value.is_admin_record {
            flags |= 0x02;
        }
        if value.do_not_fragment {
            flags |= 0x04;
        }
        if value.app_ack_requested {
            flags |= 0x20;
        }
        if value.report_status_time {
            flags |= 0x40;
        }
        if value.receipt_report_requested {
            flags |= 0x4000;
        }
        if value.forward_report_requested {
            flags |= 0x10000;
        }
        if value.delivery_report_requested {
            flags |= 0x20000;
        }
        if value.delete_report_requested {
            flags |= 0x40000;
        }
        flags
    }
}

impl cbor::encode::ToCbor for BundleFlags {
    fn to_cbor(&self, encoder: &mut cbor::encode::Encoder) {
        encoder.emit(&u64::from(*self))
    }
}

impl cbor::decode::FromCbor for BundleFlags {
    type Error = cbor::decode::Error;

    fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, usize)>, Self::Error> {
        Ok(cbor::decode::try_parse::<u64>(data)?.map(|(v, len)| (v.into(), len)))
    }
}
