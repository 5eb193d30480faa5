use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unsupported EID scheme {0}")]
    UnsupportedScheme(u64),

    #[error("Invalid 'dtn' scheme-specific part")]
    InvalidDtnSsp,

    #[error("'ipn' EIDs must have exactly 2 components, found {0}")]
    InvalidIpnComponents(usize),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Failed to parse {field}: {source}")]
    InvalidField {
        field: &'static str,
        source: Box<dyn core::error::Error + Send + Sync>,
    },

    #[error(transparent)]
    InvalidCBOR(#[from] bpcore_cbor::decode::Error),
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
