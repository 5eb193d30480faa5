use super::*;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("No targets in BPSec extension block")]
    NoTargets,

    #[error("Security block {0} targets itself")]
    SelfTarget(u64),

    #[error("Block {0} is targeted more than once by the same security block")]
    DuplicateTarget(u64),

    #[error("Mismatch Target and Results arrays")]
    MismatchedTargetResult,

    #[error("The security target block {0} is not in the bundle")]
    MissingSecurityTarget(u64),

    #[error("Block {0} is a security block and cannot be a signature target")]
    InvalidTarget(u64),

    #[error("Unrecognised BPSec context {0}")]
    UnrecognisedContext(u64),

    #[error("Missing security context parameter id {0}")]
    MissingContextParameter(u64),

    #[error("Invalid security context parameter id {0}")]
    InvalidContextParameter(u64),

    #[error("Missing security context result id {0}")]
    MissingContextResult(u64),

    #[error("Invalid security context result id {0}")]
    InvalidContextResult(u64),

    #[error("Signature verification failed for target block {0}")]
    IntegrityCheckFailed(u64),

    #[error("Key is not usable with security context {0}")]
    InvalidKey(u64),

    #[error("Failed to parse {field}: {source}")]
    InvalidField {
        field: &'static str,
        source: Box<dyn core::error::Error + Send + Sync>,
    },

    #[error(transparent)]
    InvalidCBOR(#[from] cbor::decode::Error),
}

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
