use super::*;
use base64::prelude::*;
use thiserror::Error;

/// The identity of a bundle: who sent it, to whom, and when.
///
/// Two fragments of the same original bundle share everything but `fragment_info`.
#[derive(Default, Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BundleId {
    pub source: Eid,
    pub destination: Eid,
    pub timestamp: CreationTimestamp,
    pub fragment_info: Option<FragmentInfo>,
}

#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FragmentInfo {
    pub offset: u64,
    pub total_len: u64,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Bad bundle id key")]
    BadKey,

    #[error("Bad base64 encoding")]
    BadBase64(#[from] base64::DecodeError),

    #[error("Failed to decode {field}: {source}")]
    InvalidField {
        field: &'static str,
        source: Box<dyn core::error::Error + Send + Sync>,
    },

    #[error(transparent)]
    InvalidCBOR(#[from] cbor::decode::Error),
}

trait CaptureFieldErr<T> {
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

impl BundleId {
    /// The identity shared by every fragment of the same original bundle.
    pub fn fragment_id(&self) -> BundleId {
        BundleId {
            fragment_info: None,
            ..self.clone()
        }
    }

    pub fn from_key(k: &str) -> Result<Self, Error> {
        let data = BASE64_STANDARD_NO_PAD.decode(k)?;
        let (id, len) = cbor::decode::parse_array(&data, |array, _| Self::parse_key(array))?;
        if len != data.len() {
            return Err(Error::BadKey);
        }
        Ok(id)
    }

    /// A printable key, identical for identical ids, that [`BundleId::from_key`] reverses.
    pub fn to_key(&self) -> String {
        BASE64_STANDARD_NO_PAD.encode(cbor::encode::emit_array(
            Some(if self.fragment_info.is_some() { 5 } else { 3 }),
            |array| {
                array.emit(&self.source);
                array.emit(&self.destination);
                array.emit(&self.timestamp);
                if let Some(fragment_info) = &self.fragment_info {
                    array.emit(&fragment_info.offset);
                    array.emit(&fragment_info.total_len);
                }
            },
        ))
    }

    fn parse_key(array: &mut cbor::decode::Array) -> Result<Self, Error> {
        let source = array.parse().map_field_err("source EID")?;
        let destination = array.parse().map_field_err("destination EID")?;
        let timestamp = array.parse().map_field_err("creation timestamp")?;
        let fragment_info = match array.count() {
            Some(5) => Some(FragmentInfo {
                offset: array.parse().map_field_err("fragment offset")?,
                total_len: array
                    .parse()
                    .map_field_err("total application data unit length")?,
            }),
            Some(3) => None,
            _ => return Err(Error::BadKey),
        };
        Ok(Self {
            source,
            destination,
            timestamp,
            fragment_info,
        })
    }
}

impl core::fmt::Display for BundleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if let Some(fi) = &self.fragment_info {
            write!(
                f,
                "{} -> {} {} fragment {}/{}",
                self.source, self.destination, self.timestamp, fi.offset, fi.total_len
            )
        } else {
            write!(
                f,
                "{} -> {} {}",
                self.source, self.destination, self.timestamp
            )
        }
    }
}
