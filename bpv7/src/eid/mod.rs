/*!
Endpoint Identifiers (RFC 9171 Section 4.2.5).

Only the `dtn` and `ipn` URI schemes are supported. Every [`Eid`] parsed from text
or CBOR is well formed. Build `dtn` endpoints in code with [`Eid::dtn`], which
applies the same rules.
*/

use super::*;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_encode};

// Keeps RFC 3986 unreserved characters and the sub-delims allowed in a reg-name
const REGNAME_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'!')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b';')
    .remove(b'=');

mod error;
mod parse;

pub use error::Error;



#[derive(Default, Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(into = "String", try_from = "String")
)]
pub enum Eid {
    /// `dtn:none`
    #[default]
    Null,
    /// `dtn://node_name/demux`
    Dtn { node_name: Box<str>, demux: Box<str> },
    /// `ipn:node_number.service_number`
    Ipn {
        node_number: u64,
        service_number: u64,
    },
}

impl Eid {
    /// A `dtn://node_name/demux` endpoint. The node name must not be empty, and
    /// the demux may only hold visible ASCII characters.
    pub fn dtn(node_name: &str, demux: &str) -> Result<Eid, Error> {
        if node_name.is_empty() || !demux.chars().all(|c| ('\x21'..='\x7e').contains(&c)) {
            return Err(Error::InvalidDtnSsp);
        }
        Ok(Eid::Dtn {
            node_name: node_name.into(),
            demux: demux.into(),
        })
    }

    /// Returns `true` for the null endpoint, in either scheme.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(
            self,
            Eid::Null
                | Eid::Ipn {
                    node_number: 0,
                    service_number: 0
                }
        )
    }

    /// Returns `true` if the EID identifies a node's administrative endpoint.
    pub fn is_admin_endpoint(&self) -> bool {
        match self {
            Eid::Null => false,
            Eid::Dtn { demux, .. } => demux.is_empty(),
            Eid::Ipn {
                node_number,
                service_number,
            } => *node_number != 0 && *service_number == 0,
        }
    }

    /// The administrative endpoint of the node this endpoint belongs to.
    pub fn admin_endpoint(&self) -> Option<Eid> {
        match self {
            Eid::Dtn { node_name, .. } => Some(Eid::Dtn {
                node_name: node_name.clone(),
                demux: "".into(),
            }),
            Eid::Ipn { node_number, .. } if *node_number != 0 => Some(Eid::Ipn {
                node_number: *node_number,
                service_number: 0,
            }),
            _ => None,
        }
    }

    /// Returns `true` if both endpoints belong to the same (non-null) node.
    pub fn same_node(&self, other: &Eid) -> bool {
        match (self, other) {
            (Eid::Dtn { node_name: a, .. }, Eid::Dtn { node_name: b, .. }) => a == b,
            (Eid::Ipn { node_number: a, .. }, Eid::Ipn { node_number: b, .. }) => {
                *a != 0 && a == b
            }
            _ => false,
        }
    }
}

impl cbor::encode::ToCbor for Eid {
    fn to_cbor(&self, encoder: &mut cbor::encode::Encoder) {
        match self {
            Eid::Null => encoder.emit(&(1, 0)),
            Eid::Dtn { node_name, demux } => {
                debug_assert!(!node_name.is_empty(), "'dtn' EID with an empty node name");
                encoder.emit(&(
                    1,
                    format!(
                        "//{}/{demux}",
                        percent_encode(node_name.as_bytes(), REGNAME_ENCODE_SET)
                    ),
                ))
            }
            Eid::Ipn {
                node_number,
                service_number,
            } => encoder.emit(&(2, &(node_number, service_number))),
        }
    }
}

impl From<Eid> for String {
    fn from(value: Eid) -> Self {
        value.to_string()
    }
}

impl core::fmt::Display for Eid {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Eid::Null => f.write_str("dtn:none"),
            Eid::Dtn { node_name, demux } => write!(
                f,
                "dtn://{}/{demux}",
                percent_encode(node_name.as_bytes(), REGNAME_ENCODE_SET)
            ),
            Eid::Ipn {
                node_number,
                service_number,
            } => write!(f, "ipn:{node_number}.{service_number}"),
        }
    }
}
