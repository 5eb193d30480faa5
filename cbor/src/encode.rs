pub trait ToCbor {
    fn to_cbor(&self, encoder: &mut Encoder);
}

/// A byte string, emitted as a single definite-length CBOR byte string.
pub struct Bytes<'a>(pub &'a [u8]);

/// Pre-encoded CBOR, copied to the output verbatim.
pub struct Raw<'a>(pub &'a [u8]);

pub struct Encoder {
    data: Vec<u8>,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn build(self) -> Vec<u8> {
        self.data
    }

    fn emit_uint_minor(&mut self, major: u8, val: u64) {
        if val < 24 {
            self.data.push((major << 5) | (val as u8))
        } else if val <= u8::MAX as u64 {
            self.data.push((major << 5) | 24u8);
            self.data.push(val as u8)
        } else if val <= u16::MAX as u64 {
            self.data.push((major << 5) | 25u8);
            self.data.extend((val as u16).to_be_bytes())
        } else if val <= u32::MAX as u64 {
            self.data.push((major << 5) | 26u8);
            self.data.extend((val as u32).to_be_bytes())
        } else {
            self.data.push((major << 5) | 27u8);
            self.data.extend(val.to_be_bytes())
        }
    }

    pub fn emit_raw_slice(&mut self, data: &[u8]) {
        self.data.extend_from_slice(data)
    }

    pub fn emit<T>(&mut self, value: &T)
    where
        T: ToCbor + ?Sized,
    {
        value.to_cbor(self)
    }

    /// Emits a definite-length byte string.
    pub fn emit_bytes(&mut self, value: &[u8]) {
        self.emit_bytes_header(value.len());
        self.data.extend_from_slice(value)
    }

    /// Emits only the head of a definite-length byte string of `len` bytes.
    /// The caller is responsible for the content that follows.
    pub fn emit_bytes_header(&mut self, len: usize) {
        self.emit_uint_minor(2, len as u64)
    }

    pub fn emit_array<F>(&mut self, count: Option<usize>, f: F)
    where
        F: FnOnce(&mut Array),
    {
        let mut a = Array::new(self, count);
        f(&mut a);
        a.end()
    }

    pub fn emit_slice<T>(&mut self, values: &[T])
    where
        T: ToCbor,
    {
        self.emit_array(Some(values.len()), |a| {
            for value in values {
                a.emit(value);
            }
        })
    }
}

pub struct Array<'a> {
    encoder: &'a mut Encoder,
    count: Option<usize>,
    idx: usize,
}

impl<'a> Array<'a> {
    fn new(encoder: &'a mut Encoder, count: Option<usize>) -> Self {
        if let Some(count) = count {
            encoder.emit_uint_minor(4, count as u64);
        } else {
            encoder.data.push((4 << 5) | 31);
        }
        Self {
            encoder,
            count,
            idx: 0,
        }
    }

    fn next_field(&mut self) -> &mut Encoder {
        self.idx += 1;
        match self.count {
            Some(count) if self.idx > count => {
                panic!("Too many items added to definite length array")
            }
            _ => {}
        };
        self.encoder
    }

    fn end(self) {
        let Some(count) = self.count else {
            return self.encoder.data.push(0xFF);
        };
        if self.idx != count {
            panic!(
                "Definite length array is short of items: {}, expected {}",
                self.idx, count
            );
        }
    }

    /// Reserve an item slot whose bytes will be appended later with [`Self::append_raw_slice`].
    pub fn skip_value(&mut self) {
        self.next_field();
    }

    /// Append an additional slice of data, without incrementing the field count
    pub fn append_raw_slice(&mut self, data: &[u8]) {
        self.encoder.emit_raw_slice(data)
    }

    pub fn emit<T>(&mut self, value: &T)
    where
        T: ToCbor + ?Sized,
    {
        self.next_field().emit(value)
    }

    pub fn emit_bytes(&mut self, value: &[u8]) {
        self.next_field().emit_bytes(value)
    }

    /// Fills the next item with the head of a byte string of `len` bytes, leaving the
    /// content to be supplied outside this encoder.
    pub fn emit_bytes_header(&mut self, len: usize) {
        self.next_field().emit_bytes_header(len)
    }

    pub fn emit_array<F>(&mut self, count: Option<usize>, f: F)
    where
        F: FnOnce(&mut Array),
    {
        self.next_field().emit_array(count, f)
    }

    pub fn emit_slice<T>(&mut self, values: &[T])
    where
        T: ToCbor,
    {
        self.next_field().emit_slice(values)
    }
}

macro_rules! impl_uint_to_cbor {
    ($($ty:ty),*) => {
        $(
            impl ToCbor for $ty {
                fn to_cbor(&self, encoder: &mut Encoder) {
                    encoder.emit_uint_minor(0, *self as u64);
                }
            }
        )*
    };
}

impl_uint_to_cbor!(u8, u16, u32, u64, usize);

// Untyped integer literals default to i32, so signed values must encode too.
macro_rules! impl_int_to_cbor {
    ($($ty:ty),*) => {
        $(
            impl ToCbor for $ty {
                fn to_cbor(&self, encoder: &mut Encoder) {
                    let val = *self as i64;
                    if val >= 0 {
                        encoder.emit_uint_minor(0, val as u64);
                    } else {
                        // -1 - val, computed without overflowing on i64::MIN
                        encoder.emit_uint_minor(1, !(val as u64));
                    }
                }
            }
        )*
    };
}

impl_int_to_cbor!(i8, i16, i32, i64, isize);

impl ToCbor for bool {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.data.push((7 << 5) | if *self { 21 } else { 20 })
    }
}

impl ToCbor for str {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_uint_minor(3, self.len() as u64);
        encoder.data.extend_from_slice(self.as_bytes());
    }
}

impl ToCbor for String {
    fn to_cbor(&self, encoder: &mut Encoder) {
        self.as_str().to_cbor(encoder)
    }
}

impl ToCbor for Box<str> {
    fn to_cbor(&self, encoder: &mut Encoder) {
        self.as_ref().to_cbor(encoder)
    }
}

impl ToCbor for [u8] {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_bytes(self);
    }
}

impl ToCbor for Vec<u8> {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_bytes(self);
    }
}

impl ToCbor for Box<[u8]> {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_bytes(self);
    }
}

impl<const N: usize> ToCbor for [u8; N] {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_bytes(self);
    }
}

impl ToCbor for Bytes<'_> {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_bytes(self.0);
    }
}

impl ToCbor for Raw<'_> {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_raw_slice(self.0)
    }
}

impl<T> ToCbor for &T
where
    T: ToCbor + ?Sized,
{
    fn to_cbor(&self, encoder: &mut Encoder) {
        (**self).to_cbor(encoder)
    }
}

impl<A, B> ToCbor for (A, B)
where
    A: ToCbor,
    B: ToCbor,
{
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_array(Some(2), |a| {
            a.emit(&self.0);
            a.emit(&self.1);
        })
    }
}

pub fn emit<T>(value: &T) -> Vec<u8>
where
    T: ToCbor + ?Sized,
{
    let mut e = Encoder::new();
    e.emit(value);
    e.build()
}

pub fn emit_array<F>(count: Option<usize>, f: F) -> Vec<u8>
where
    F: FnOnce(&mut Array),
{
    let mut e = Encoder::new();
    e.emit_array(count, f);
    e.build()
}
