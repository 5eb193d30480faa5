/*!
A small, strict CBOR (RFC 8949) codec.

The encoder always produces the preferred (shortest) serialization, which is what
makes BPv7 CRCs and signatures reproducible. The decoder is a pull parser over a
borrowed byte slice: values are handed to closures, and arrays and maps are
walked item by item through a [`decode::Sequence`].
*/

pub mod decode;
pub mod encode;

mod decode_seq;
