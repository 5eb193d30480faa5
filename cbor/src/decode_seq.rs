use super::decode::*;

/// A run of CBOR items with a shared cursor.
///
/// `D` distinguishes a bare RFC 8742 sequence (0) from the contents of an array (1) or map (2).
pub struct Sequence<'a, const D: usize> {
    data: &'a [u8],
    count: Option<usize>,
    offset: usize,
    parsed: usize,
}

pub type Series<'a> = Sequence<'a, 0>;
pub type Array<'a> = Sequence<'a, 1>;
pub type Map<'a> = Sequence<'a, 2>;

impl<'a, const D: usize> Sequence<'a, D> {
    pub(crate) fn new(data: &'a [u8], count: Option<usize>, offset: usize) -> Self {
        Self {
            data,
            count: count.map(|c| c.saturating_mul(D.max(1))),
            offset,
            parsed: 0,
        }
    }

    /// The number of items in a definite-length sequence, counting map keys and values separately.
    pub fn count(&self) -> Option<usize> {
        self.count
    }

    pub fn is_definite(&self) -> bool {
        self.count.is_some()
    }

    /// Offset of the cursor, relative to the slice the enclosing value was parsed from.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn parsed(&self) -> usize {
        self.parsed
    }

    fn check_for_end(&self) -> Result<bool, Error> {
        if let Some(count) = self.count {
            return Ok(self.parsed >= count);
        }
        if D == 0 {
            return Ok(self.offset >= self.data.len());
        }
        match self.data.get(self.offset) {
            None => Err(Error::NotEnoughData),
            Some(0xFF) if D == 2 && self.parsed % 2 == 1 => Err(Error::PartialMap),
            Some(0xFF) => Ok(true),
            Some(_) => Ok(false),
        }
    }

    pub fn at_end(&self) -> Result<bool, Error> {
        self.check_for_end()
    }

    /// Consume the closing break of an indefinite-length sequence, returning the final offset.
    pub(crate) fn complete(&mut self) -> Result<usize, Error> {
        if !self.check_for_end()? {
            return Err(Error::AdditionalItems);
        }
        if self.count.is_none() && D != 0 {
            self.offset += 1;
        }
        Ok(self.offset)
    }

    pub fn try_parse_value<T, F, E>(&mut self, f: F) -> Result<Option<T>, E>
    where
        F: FnOnce(Value<'a, '_>, &[u64]) -> Result<T, E>,
        E: From<Error>,
    {
        if self.check_for_end()? {
            return Ok(None);
        }
        match try_parse_value(&self.data[self.offset..], f)? {
            Some((r, len)) => {
                self.offset += len;
                self.parsed += 1;
                Ok(Some(r))
            }
            None => Err(Error::NotEnoughData.into()),
        }
    }

    pub fn parse_value<T, F, E>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(Value<'a, '_>, &[u64]) -> Result<T, E>,
        E: From<Error>,
    {
        self.try_parse_value(f)?
            .ok_or(Error::NoMoreItems.into())
    }

    pub fn try_parse<T>(&mut self) -> Result<Option<T>, T::Error>
    where
        T: FromCbor,
    {
        if self.check_for_end()? {
            return Ok(None);
        }
        match T::try_from_cbor(&self.data[self.offset..])? {
            Some((v, len)) => {
                self.offset += len;
                self.parsed += 1;
                Ok(Some(v))
            }
            None => Err(Error::NotEnoughData.into()),
        }
    }

    pub fn parse<T>(&mut self) -> Result<T, T::Error>
    where
        T: FromCbor,
    {
        self.try_parse::<T>()?.ok_or(Error::NoMoreItems.into())
    }

    pub fn try_parse_array<T, F, E>(&mut self, f: F) -> Result<Option<T>, E>
    where
        F: FnOnce(&mut Array<'a>, &[u64]) -> Result<T, E>,
        E: From<Error>,
    {
        self.try_parse_value(|value, tags| match value {
            Value::Array(a) => f(a, tags),
            value => Err(
                Error::IncorrectType("Array".to_string(), value.type_name(!tags.is_empty()))
                    .into(),
            ),
        })
    }

    pub fn parse_array<T, F, E>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Array<'a>, &[u64]) -> Result<T, E>,
        E: From<Error>,
    {
        self.try_parse_array(f)?
            .ok_or(Error::NoMoreItems.into())
    }

    pub fn try_parse_map<T, F, E>(&mut self, f: F) -> Result<Option<T>, E>
    where
        F: FnOnce(&mut Map<'a>, &[u64]) -> Result<T, E>,
        E: From<Error>,
    {
        self.try_parse_value(|value, tags| match value {
            Value::Map(m) => f(m, tags),
            value => Err(
                Error::IncorrectType("Map".to_string(), value.type_name(!tags.is_empty())).into(),
            ),
        })
    }

    pub fn parse_map<T, F, E>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Map<'a>, &[u64]) -> Result<T, E>,
        E: From<Error>,
    {
        self.try_parse_map(f)?.ok_or(Error::NoMoreItems.into())
    }

    /// Skip the next item, including any nested content. Returns `false` at the end of the sequence.
    pub fn skip_value(&mut self, max_recursion: usize) -> Result<bool, Error> {
        self.try_parse_value(|mut value, _| value.skip(max_recursion))
            .map(|o| o.is_some())
    }

    /// Returns the encoded bytes of the next item, without interpreting them.
    pub fn try_parse_raw(&mut self, max_recursion: usize) -> Result<Option<&'a [u8]>, Error> {
        let start = self.offset;
        if self.skip_value(max_recursion)? {
            Ok(Some(&self.data[start..self.offset]))
        } else {
            Ok(None)
        }
    }

    pub fn parse_raw(&mut self, max_recursion: usize) -> Result<&'a [u8], Error> {
        self.try_parse_raw(max_recursion)?
            .ok_or(Error::NoMoreItems)
    }
}

impl<const D: usize> core::fmt::Debug for Sequence<'_, D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Sequence")
            .field("kind", &D)
            .field("count", &self.count)
            .field("offset", &self.offset)
            .field("parsed", &self.parsed)
            .finish()
    }
}
