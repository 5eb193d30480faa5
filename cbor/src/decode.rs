use thiserror::Error;

pub use super::decode_seq::{Array, Map, Sequence, Series};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Not enough data for encoded value")]
    NotEnoughData,

    #[error("No more items in sequence")]
    NoMoreItems,

    #[error("Additional unparsed items in sequence")]
    AdditionalItems,

    #[error("Additional data after the encoded value")]
    AdditionalData,

    #[error("Invalid minor-type value {0}")]
    InvalidMinorValue(u8),

    #[error("Tags with no following value")]
    JustTags,

    #[error("Incorrect type, expecting {0}, found {1}")]
    IncorrectType(String, String),

    #[error("Chunked string contains an invalid chunk")]
    InvalidChunk,

    #[error("Invalid simple type {0}")]
    InvalidSimpleType(u8),

    #[error("Map has key but no value")]
    PartialMap,

    #[error("Maximum recursion depth reached")]
    MaxRecursion,

    #[error("Integer value out of range for the target type")]
    IntegerOverflow,

    #[error(transparent)]
    InvalidUtf8(#[from] core::str::Utf8Error),
}

pub trait FromCbor: Sized {
    type Error: From<self::Error>;

    /// Returns `Ok(None)` when `data` is empty, otherwise the value and the number of bytes consumed.
    fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, usize)>, Self::Error>;
}

pub enum Value<'a, 'b> {
    UnsignedInteger(u64),
    NegativeInteger(u64),
    Bytes(&'a [u8]),
    ByteStream(Vec<&'a [u8]>),
    Text(&'a str),
    TextStream(Vec<&'a str>),
    Array(&'b mut Array<'a>),
    Map(&'b mut Map<'a>),
    False,
    True,
    Null,
    Undefined,
    Simple(u8),
    Float(f64),
}

impl Value<'_, '_> {
    pub fn type_name(&self, tagged: bool) -> String {
        let prefix = if tagged { "Tagged " } else { "" };
        let name = match self {
            Value::UnsignedInteger(_) => "Unsigned Integer",
            Value::NegativeInteger(_) => "Negative Integer",
            Value::Bytes(_) => "Definite-length Byte String",
            Value::ByteStream(_) => "Indefinite-length Byte String",
            Value::Text(_) => "Definite-length Text String",
            Value::TextStream(_) => "Indefinite-length Text String",
            Value::Array(a) if a.is_definite() => "Definite-length Array",
            Value::Array(_) => "Indefinite-length Array",
            Value::Map(m) if m.is_definite() => "Definite-length Map",
            Value::Map(_) => "Indefinite-length Map",
            Value::False => "False",
            Value::True => "True",
            Value::Null => "Null",
            Value::Undefined => "Undefined",
            Value::Simple(_) => "Simple Value",
            Value::Float(_) => "Float",
        };
        format!("{prefix}{name}")
    }

    /// Consume any nested content, so the enclosing sequence can move past this value.
    pub fn skip(&mut self, max_recursion: usize) -> Result<(), Error> {
        match self {
            Value::Array(a) => {
                if max_recursion == 0 {
                    return Err(Error::MaxRecursion);
                }
                while a.skip_value(max_recursion - 1)? {}
                Ok(())
            }
            Value::Map(m) => {
                if max_recursion == 0 {
                    return Err(Error::MaxRecursion);
                }
                while m.skip_value(max_recursion - 1)? {}
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

impl core::fmt::Debug for Value<'_, '_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Value::UnsignedInteger(v) => write!(f, "{v}"),
            Value::NegativeInteger(v) => write!(f, "-{}", *v as u128 + 1),
            Value::Bytes(b) => write!(f, "h'{}'", hex_string(b)),
            Value::ByteStream(chunks) => {
                f.write_str("(_ ")?;
                for (i, b) in chunks.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "h'{}'", hex_string(b))?;
                }
                f.write_str(")")
            }
            Value::Text(s) => write!(f, "{s:?}"),
            Value::TextStream(chunks) => write!(f, "(_ {chunks:?})"),
            Value::Array(_) => f.write_str("[...]"),
            Value::Map(_) => f.write_str("{...}"),
            Value::False => f.write_str("false"),
            Value::True => f.write_str("true"),
            Value::Null => f.write_str("null"),
            Value::Undefined => f.write_str("undefined"),
            Value::Simple(v) => write!(f, "simple({v})"),
            Value::Float(v) => write!(f, "{v:?}"),
        }
    }
}

fn hex_string(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect()
}

fn read_be<const N: usize>(data: &[u8]) -> Result<[u8; N], Error> {
    data.get(..N)
        .and_then(|s| s.try_into().ok())
        .ok_or(Error::NotEnoughData)
}

fn parse_tags(data: &[u8]) -> Result<(Vec<u64>, usize), Error> {
    let mut tags = Vec::new();
    let mut offset = 0;
    while let Some(b) = data.get(offset) {
        if b >> 5 != 6 {
            break;
        }
        offset += 1;
        let (tag, len) = parse_uint_minor(b & 0x1F, &data[offset..])?;
        tags.push(tag);
        offset += len;
    }
    Ok((tags, offset))
}

fn parse_uint_minor(minor: u8, data: &[u8]) -> Result<(u64, usize), Error> {
    match minor {
        0..=23 => Ok((minor as u64, 0)),
        24 => Ok((read_be::<1>(data)?[0] as u64, 1)),
        25 => Ok((u16::from_be_bytes(read_be(data)?) as u64, 2)),
        26 => Ok((u32::from_be_bytes(read_be(data)?) as u64, 4)),
        27 => Ok((u64::from_be_bytes(read_be(data)?), 8)),
        _ => Err(Error::InvalidMinorValue(minor)),
    }
}

fn parse_data_minor(minor: u8, data: &[u8]) -> Result<(&[u8], usize), Error> {
    let (data_len, len) = parse_uint_minor(minor, data)?;
    let end = usize::try_from(data_len)
        .ok()
        .and_then(|l| l.checked_add(len))
        .ok_or(Error::NotEnoughData)?;
    if end > data.len() {
        Err(Error::NotEnoughData)
    } else {
        Ok((&data[len..end], end))
    }
}

fn parse_data_chunked(major: u8, data: &[u8]) -> Result<(Vec<&[u8]>, usize), Error> {
    let mut chunks = Vec::new();
    let mut offset = 0;
    loop {
        let Some(b) = data.get(offset) else {
            return Err(Error::NotEnoughData);
        };
        offset += 1;

        if *b == 0xFF {
            break Ok((chunks, offset));
        }

        // Chunks must be definite-length strings of the same major type
        let minor = b & 0x1F;
        if b >> 5 != major || minor == 31 {
            return Err(Error::InvalidChunk);
        }

        let (chunk, chunk_len) = parse_data_minor(minor, &data[offset..])?;
        chunks.push(chunk);
        offset += chunk_len;
    }
}

pub fn try_parse_value<'a, T, F, E>(data: &'a [u8], f: F) -> Result<Option<(T, usize)>, E>
where
    F: FnOnce(Value<'a, '_>, &[u64]) -> Result<T, E>,
    E: From<Error>,
{
    let (tags, mut offset) = parse_tags(data)?;
    let Some(initial) = data.get(offset) else {
        if !tags.is_empty() {
            return Err(Error::JustTags.into());
        } else {
            return Ok(None);
        }
    };
    offset += 1;

    let r = match (initial >> 5, initial & 0x1F) {
        (0, minor) => {
            let (v, len) = parse_uint_minor(minor, &data[offset..])?;
            offset += len;
            f(Value::UnsignedInteger(v), &tags)?
        }
        (1, minor) => {
            let (v, len) = parse_uint_minor(minor, &data[offset..])?;
            offset += len;
            f(Value::NegativeInteger(v), &tags)?
        }
        (2, 31) => {
            let (chunks, len) = parse_data_chunked(2, &data[offset..])?;
            offset += len;
            f(Value::ByteStream(chunks), &tags)?
        }
        (2, minor) => {
            let (v, len) = parse_data_minor(minor, &data[offset..])?;
            offset += len;
            f(Value::Bytes(v), &tags)?
        }
        (3, 31) => {
            let (chunks, len) = parse_data_chunked(3, &data[offset..])?;
            offset += len;
            let chunks = chunks
                .into_iter()
                .map(core::str::from_utf8)
                .collect::<Result<Vec<_>, _>>()
                .map_err(Error::from)?;
            f(Value::TextStream(chunks), &tags)?
        }
        (3, minor) => {
            let (v, len) = parse_data_minor(minor, &data[offset..])?;
            offset += len;
            f(
                Value::Text(core::str::from_utf8(v).map_err(Error::from)?),
                &tags,
            )?
        }
        (4, minor) => {
            let count = parse_count(minor, data, &mut offset)?;
            let mut a = Array::new(data, count, offset);
            let r = f(Value::Array(&mut a), &tags)?;
            offset = a.complete()?;
            r
        }
        (5, minor) => {
            let count = parse_count(minor, data, &mut offset)?;
            let mut m = Map::new(data, count, offset);
            let r = f(Value::Map(&mut m), &tags)?;
            offset = m.complete()?;
            r
        }
        (7, 20) => f(Value::False, &tags)?,
        (7, 21) => f(Value::True, &tags)?,
        (7, 22) => f(Value::Null, &tags)?,
        (7, 23) => f(Value::Undefined, &tags)?,
        (7, minor @ 0..=19) => f(Value::Simple(minor), &tags)?,
        (7, 24) => {
            let v = read_be::<1>(&data[offset..])?[0];
            if v < 32 {
                return Err(Error::InvalidSimpleType(v).into());
            }
            offset += 1;
            f(Value::Simple(v), &tags)?
        }
        (7, 25) => {
            let v = half::f16::from_be_bytes(read_be(&data[offset..])?);
            offset += 2;
            f(Value::Float(v.into()), &tags)?
        }
        (7, 26) => {
            let v = f32::from_be_bytes(read_be(&data[offset..])?);
            offset += 4;
            f(Value::Float(v.into()), &tags)?
        }
        (7, 27) => {
            let v = f64::from_be_bytes(read_be(&data[offset..])?);
            offset += 8;
            f(Value::Float(v), &tags)?
        }
        (7, minor) => return Err(Error::InvalidMinorValue(minor).into()),
        // Major type 6 is always consumed by parse_tags
        _ => unreachable!(),
    };
    Ok(Some((r, offset)))
}

fn parse_count(minor: u8, data: &[u8], offset: &mut usize) -> Result<Option<usize>, Error> {
    if minor == 31 {
        return Ok(None);
    }
    let (count, len) = parse_uint_minor(minor, &data[*offset..])?;
    *offset += len;
    usize::try_from(count)
        .map(Some)
        .map_err(|_| Error::NotEnoughData)
}

#[inline]
pub fn parse_value<'a, T, F, E>(data: &'a [u8], f: F) -> Result<(T, usize), E>
where
    F: FnOnce(Value<'a, '_>, &[u64]) -> Result<T, E>,
    E: From<Error>,
{
    try_parse_value(data, f)?.ok_or(Error::NotEnoughData.into())
}

pub fn try_parse_array<'a, T, F, E>(data: &'a [u8], f: F) -> Result<Option<(T, usize)>, E>
where
    F: FnOnce(&mut Array<'a>, &[u64]) -> Result<T, E>,
    E: From<Error>,
{
    try_parse_value(data, |value, tags| match value {
        Value::Array(a) => f(a, tags),
        value => Err(
            Error::IncorrectType("Array".to_string(), value.type_name(!tags.is_empty())).into(),
        ),
    })
}

#[inline]
pub fn parse_array<'a, T, F, E>(data: &'a [u8], f: F) -> Result<(T, usize), E>
where
    F: FnOnce(&mut Array<'a>, &[u64]) -> Result<T, E>,
    E: From<Error>,
{
    try_parse_array(data, f)?.ok_or(Error::NotEnoughData.into())
}

pub fn try_parse_map<'a, T, F, E>(data: &'a [u8], f: F) -> Result<Option<(T, usize)>, E>
where
    F: FnOnce(&mut Map<'a>, &[u64]) -> Result<T, E>,
    E: From<Error>,
{
    try_parse_value(data, |value, tags| match value {
        Value::Map(m) => f(m, tags),
        value => Err(
            Error::IncorrectType("Map".to_string(), value.type_name(!tags.is_empty())).into(),
        ),
    })
}

#[inline]
pub fn parse_map<'a, T, F, E>(data: &'a [u8], f: F) -> Result<(T, usize), E>
where
    F: FnOnce(&mut Map<'a>, &[u64]) -> Result<T, E>,
    E: From<Error>,
{
    try_parse_map(data, f)?.ok_or(Error::NotEnoughData.into())
}

/// Parse an RFC 8742 CBOR sequence that spans the whole of `data`.
pub fn parse_sequence<'a, T, F, E>(data: &'a [u8], f: F) -> Result<T, E>
where
    F: FnOnce(&mut Series<'a>) -> Result<T, E>,
    E: From<Error>,
{
    let mut s = Series::new(data, None, 0);
    let r = f(&mut s)?;
    s.complete()?;
    Ok(r)
}

#[inline]
pub fn try_parse<T>(data: &[u8]) -> Result<Option<(T, usize)>, T::Error>
where
    T: FromCbor,
{
    T::try_from_cbor(data)
}

#[inline]
pub fn parse<T>(data: &[u8]) -> Result<(T, usize), T::Error>
where
    T: FromCbor,
{
    T::try_from_cbor(data)?.ok_or(Error::NotEnoughData.into())
}

/// Parse a value that must span the whole of `data`.
pub fn parse_exact<T>(data: &[u8]) -> Result<T, T::Error>
where
    T: FromCbor,
{
    let (v, len) = parse::<T>(data)?;
    if len != data.len() {
        Err(Error::AdditionalData.into())
    } else {
        Ok(v)
    }
}

impl FromCbor for u64 {
    type Error = self::Error;

    fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, usize)>, Self::Error> {
        try_parse_value(data, |value, tags| match value {
            Value::UnsignedInteger(v) if tags.is_empty() => Ok(v),
            value => Err(Error::IncorrectType(
                "Untagged Unsigned Integer".to_string(),
                value.type_name(!tags.is_empty()),
            )),
        })
    }
}

macro_rules! impl_uint_from_cbor {
    ($($ty:ty),*) => {
        $(
            impl FromCbor for $ty {
                type Error = self::Error;

                fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, usize)>, Self::Error> {
                    match u64::try_from_cbor(data)? {
                        Some((v, len)) => Ok(Some((
                            v.try_into().map_err(|_| Error::IntegerOverflow)?,
                            len,
                        ))),
                        None => Ok(None),
                    }
                }
            }
        )*
    };
}

impl_uint_from_cbor!(u8, u16, u32, usize);

impl FromCbor for i64 {
    type Error = self::Error;

    fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, usize)>, Self::Error> {
        try_parse_value(data, |value, tags| match value {
            Value::UnsignedInteger(v) if tags.is_empty() => {
                i64::try_from(v).map_err(|_| Error::IntegerOverflow)
            }
            Value::NegativeInteger(v) if tags.is_empty() => i64::try_from(v)
                .map(|v| -1 - v)
                .map_err(|_| Error::IntegerOverflow),
            value => Err(Error::IncorrectType(
                "Untagged Integer".to_string(),
                value.type_name(!tags.is_empty()),
            )),
        })
    }
}

macro_rules! impl_int_from_cbor {
    ($($ty:ty),*) => {
        $(
            impl FromCbor for $ty {
                type Error = self::Error;

                fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, usize)>, Self::Error> {
                    match i64::try_from_cbor(data)? {
                        Some((v, len)) => Ok(Some((
                            v.try_into().map_err(|_| Error::IntegerOverflow)?,
                            len,
                        ))),
                        None => Ok(None),
                    }
                }
            }
        )*
    };
}

impl_int_from_cbor!(i8, i16, i32, isize);

impl FromCbor for f64 {
    type Error = self::Error;

    fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, usize)>, Self::Error> {
        try_parse_value(data, |value, tags| match value {
            Value::Float(v) if tags.is_empty() => Ok(v),
            value => Err(Error::IncorrectType(
                "Untagged Float".to_string(),
                value.type_name(!tags.is_empty()),
            )),
        })
    }
}

impl FromCbor for f32 {
    type Error = self::Error;

    fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, usize)>, Self::Error> {
        Ok(f64::try_from_cbor(data)?.map(|(v, len)| (v as f32, len)))
    }
}

impl FromCbor for bool {
    type Error = self::Error;

    fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, usize)>, Self::Error> {
        try_parse_value(data, |value, tags| match value {
            Value::False if tags.is_empty() => Ok(false),
            Value::True if tags.is_empty() => Ok(true),
            value => Err(Error::IncorrectType(
                "Untagged Boolean".to_string(),
                value.type_name(!tags.is_empty()),
            )),
        })
    }
}

impl FromCbor for String {
    type Error = self::Error;

    fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, usize)>, Self::Error> {
        try_parse_value(data, |value, tags| match value {
            Value::Text(s) if tags.is_empty() => Ok(s.to_string()),
            Value::TextStream(chunks) if tags.is_empty() => Ok(chunks.concat()),
            value => Err(Error::IncorrectType(
                "Untagged Text String".to_string(),
                value.type_name(!tags.is_empty()),
            )),
        })
    }
}

impl FromCbor for Vec<u8> {
    type Error = self::Error;

    fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, usize)>, Self::Error> {
        try_parse_value(data, |value, tags| match value {
            Value::Bytes(b) if tags.is_empty() => Ok(b.to_vec()),
            Value::ByteStream(chunks) if tags.is_empty() => Ok(chunks.concat()),
            value => Err(Error::IncorrectType(
                "Untagged Byte String".to_string(),
                value.type_name(!tags.is_empty()),
            )),
        })
    }
}

impl FromCbor for Box<[u8]> {
    type Error = self::Error;

    fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, usize)>, Self::Error> {
        Ok(Vec::<u8>::try_from_cbor(data)?.map(|(v, len)| (v.into(), len)))
    }
}
