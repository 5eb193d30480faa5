use super::*;
use thiserror::Error;

static X25: ::crc::Crc<u16> = ::crc::Crc::<u16>::new(&::crc::CRC_16_IBM_SDLC);
static CASTAGNOLI: ::crc::Crc<u32> = ::crc::Crc::<u32>::new(&::crc::CRC_32_ISCSI);

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid CRC Type {0}")]
    InvalidType(u64),

    #[error("Block has unexpected CRC value length {0}")]
    InvalidLength(usize),

    #[error("Incorrect CRC value")]
    IncorrectCrc,

    #[error(transparent)]
    InvalidCBOR(#[from] cbor::decode::Error),
}

#[allow(non_camel_case_types)]
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CrcType {
    #[default]
    None,
    CRC16_X25,
    CRC32_CASTAGNOLI,
}

impl CrcType {
    /// Length in bytes of the CRC value carried on the wire.
    pub fn value_len(&self) -> usize {
        match self {
            CrcType::None => 0,
            CrcType::CRC16_X25 => 2,
            CrcType::CRC32_CASTAGNOLI => 4,
        }
    }
}

impl TryFrom<u64> for CrcType {
    type Error = self::Error;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::CRC16_X25),
            2 => Ok(Self::CRC32_CASTAGNOLI),
            v => Err(Error::InvalidType(v)),
        }
    }
}

impl From<CrcType> for u64 {
    fn from(value: CrcType) -> Self {
        match value {
            CrcType::None => 0,
            CrcType::CRC16_X25 => 1,
            CrcType::CRC32_CASTAGNOLI => 2,
        }
    }
}

impl cbor::encode::ToCbor for CrcType {
    fn to_cbor(&self, encoder: &mut cbor::encode::Encoder) {
        encoder.emit(&u64::from(*self))
    }
}

impl cbor::decode::FromCbor for CrcType {
    type Error = self::Error;

    fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, usize)>, Self::Error> {
        match cbor::decode::try_parse::<u64>(data)? {
            Some((v, len)) => Ok(Some((v.try_into()?, len))),
            None => Ok(None),
        }
    }
}

/// Incremental CRC computation, so large blocks can be checked in chunks.
pub enum Digest {
    None,
    X25(::crc::Digest<'static, u16>),
    Castagnoli(::crc::Digest<'static, u32>),
}

impl Digest {
    pub fn new(crc_type: CrcType) -> Self {
        match crc_type {
            CrcType::None => Self::None,
            CrcType::CRC16_X25 => Self::X25(X25.digest()),
            CrcType::CRC32_CASTAGNOLI => Self::Castagnoli(CASTAGNOLI.digest()),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::None => {}
            Self::X25(d) => d.update(data),
            Self::Castagnoli(d) => d.update(data),
        }
    }

    pub fn finalize(self) -> Option<u32> {
        match self {
            Self::None => None,
            Self::X25(d) => Some(d.finalize() as u32),
            Self::Castagnoli(d) => Some(d.finalize()),
        }
    }
}

/// Computes the CRC of `data` as it would be with a zero-filled CRC value appended.
pub fn checksum(crc_type: CrcType, data: &[u8]) -> Option<u32> {
    let mut digest = Digest::new(crc_type);
    digest.update(data);
    digest.update(&[0u8; 4][..crc_type.value_len()]);
    digest.finalize()
}

/// Completes `digest`, which has seen a block array up to its final item, and
/// returns the CRC value byte string that ends the block.
pub fn crc_value(crc_type: CrcType, mut digest: Digest) -> Vec<u8> {
    let len = crc_type.value_len();
    if len == 0 {
        return Vec::new();
    }
    let mut value = vec![0x40 | len as u8];
    digest.update(&value);
    digest.update(&[0u8; 4][..len]);
    if let Some(crc) = digest.finalize() {
        value.extend_from_slice(&crc.to_be_bytes()[4 - len..]);
    }
    value
}

/// Appends the CRC value byte string to `data`, which must hold a block array whose
/// final item slot has been reserved for it.
pub fn append_crc_value(crc_type: CrcType, mut data: Vec<u8>) -> Vec<u8> {
    let mut digest = Digest::new(crc_type);
    digest.update(&data);
    let value = crc_value(crc_type, digest);
    data.extend_from_slice(&value);
    data
}

/// Reads the trailing CRC value of a block, if the CRC type says there is one.
pub(crate) fn parse_crc_value(
    block: &mut cbor::decode::Array,
    crc_type: CrcType,
) -> Result<Option<u32>, Error> {
    if let CrcType::None = crc_type {
        return Ok(None);
    }
    let value = block.parse_value(|value, tags| match value {
        cbor::decode::Value::Bytes(crc) if tags.is_empty() => Ok(crc),
        value => Err(Error::InvalidCBOR(cbor::decode::Error::IncorrectType(
            "Definite-length Byte String".to_string(),
            value.type_name(!tags.is_empty()),
        ))),
    })?;
    match (crc_type, value.len()) {
        (CrcType::CRC16_X25, 2) => Ok(Some(u16::from_be_bytes([value[0], value[1]]) as u32)),
        (CrcType::CRC32_CASTAGNOLI, 4) => Ok(Some(u32::from_be_bytes([
            value[0], value[1], value[2], value[3],
        ]))),
        (_, len) => Err(Error::InvalidLength(len)),
    }
}

/// Checks a received CRC against freshly encoded block bytes, which end with their own CRC value.
pub(crate) fn check_crc_value(
    crc_type: CrcType,
    received: Option<u32>,
    encoded: &[u8],
) -> Result<(), Error> {
    let Some(received) = received else {
        return Ok(());
    };
    let len = crc_type.value_len();
    let computed = encoded
        .len()
        .checked_sub(len)
        .and_then(|start| checksum(crc_type, &encoded[..start]));
    if computed == Some(received) {
        Ok(())
    } else {
        Err(Error::IncorrectCrc)
    }
}
