/*!
The primary error type for the crate.

Decoding, encoding and validation failures all surface as [`Error`]. Failures in
a specific field of a structure are wrapped with the field name by
[`CaptureFieldErr::map_field_err`], so a message reads like
"Failed to parse primary block: Failed to parse source EID: ...".
*/

use super::*;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// There is data after the end of the CBOR array of a bundle.
    #[error("Bundle has additional data after end of CBOR array")]
    AdditionalData,

    #[error("Unsupported bundle protocol version {0}")]
    InvalidVersion(u64),

    #[error("Bundle has no payload block")]
    MissingPayload,

    #[error("Final block of bundle is not a payload block")]
    PayloadNotFinal,

    #[error("Bundle has more than one block with block number {0}")]
    DuplicateBlockNumber(u64),

    #[error("{1:?} block cannot be block number {0}")]
    InvalidBlockNumber(u64, block::Type),

    #[error("Bundle has multiple {0:?} blocks")]
    DuplicateBlocks(block::Type),

    #[error("Invalid fragment information: offset {0}, total length {1}")]
    InvalidFragmentInfo(u64, u64),

    #[error("Bundle source has no clock, and there is no Bundle Age extension block")]
    MissingBundleAge,

    /// No codec is registered for the block type code.
    #[error("Unsupported block type {0}")]
    UnsupportedBlockType(u64),

    #[error("Block data does not match block type {0:?}")]
    BlockDataMismatch(block::Type),

    #[error("Bundle does not contain block {0}")]
    MissingBlock(u64),

    #[error(transparent)]
    InvalidBPSec(#[from] bpsec::Error),

    #[error(transparent)]
    InvalidCrc(#[from] crc::Error),

    #[error(transparent)]
    InvalidEid(#[from] eid::Error),

    #[error(transparent)]
    InvalidCBOR(#[from] cbor::decode::Error),

    #[error("Failed to parse {field}: {source}")]
    InvalidField {
        field: &'static str,
        source: Box<dyn core::error::Error + Send + Sync>,
    },
}

/// Maps any error into an [`Error::InvalidField`] naming the field that failed.
pub trait CaptureFieldErr<T> {
    fn map_field_err(self, field: &'static str) -> Result<T, Error>;
}

impl<T, E: Into<Box<dyn core::error::Error + Send + Sync>>> CaptureFieldErr<T>
    for core::result::Result<T, E>
{
    fn map_field_err(self, field: &'static str) -> Result<T, Error> {
        self.map_err(|e| Error::InvalidField {
            field,
            source: e.into(),
        })
    }
}
