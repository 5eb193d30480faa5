use super::*;
use dtn_time::DtnTime;
use error::CaptureFieldErr;
use portable_atomic::{AtomicU64, Ordering};

/// The creation timestamp of a bundle, `[creation-time, sequence-number]` on the wire.
///
/// A `creation_time` of `None` is encoded as zero, meaning the source had no accurate clock.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CreationTimestamp {
    pub creation_time: Option<DtnTime>,
    pub sequence_number: u64,
}

impl CreationTimestamp {
    pub fn new(creation_time: Option<DtnTime>, sequence_number: u64) -> Self {
        Self {
            creation_time,
            sequence_number,
        }
    }

    /// The current time, with the next sequence number from `counter`.
    pub fn now(counter: &SequenceCounter) -> Self {
        Self {
            creation_time: Some(DtnTime::now()),
            sequence_number: counter.next(),
        }
    }
}

impl core::fmt::Display for CreationTimestamp {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.creation_time {
            Some(t) => write!(f, "{t} seq {}", self.sequence_number),
            None => write!(f, "(no clock) seq {}", self.sequence_number),
        }
    }
}

/// Generates bundle sequence numbers for a node.
///
/// Owned by the node context and shared between everything that originates bundles.
#[derive(Debug, Default)]
pub struct SequenceCounter(AtomicU64);

impl SequenceCounter {
    pub fn new(initial: u64) -> Self {
        Self(AtomicU64::new(initial))
    }

    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

impl cbor::encode::ToCbor for CreationTimestamp {
    fn to_cbor(&self, encoder: &mut cbor::encode::Encoder) {
        encoder.emit_array(Some(2), |a| {
            a.emit(&self.creation_time.map_or(0, |t| t.millisecs()));
            a.emit(&self.sequence_number);
        })
    }
}

impl cbor::decode::FromCbor for CreationTimestamp {
    type Error = error::Error;

    fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, usize)>, Self::Error> {
        cbor::decode::try_parse_array(data, |a, _| {
            let creation_time = a
                .parse::<u64>()
                .map_field_err("bundle creation time")?;
            Ok(CreationTimestamp {
                creation_time: (creation_time != 0).then(|| DtnTime::new(creation_time)),
                sequence_number: a.parse().map_field_err("sequence number")?,
            })
        })
    }
}
