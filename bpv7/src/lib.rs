/*!
Data model and wire format for Bundle Protocol version 7 (RFC 9171).

Everything in this crate is synchronous and free of I/O: bundles are decoded from
and encoded to byte slices, validated, signed, fragmented and reassembled in memory.
Encoding is deterministic, so a decoded bundle re-encodes to the same bytes, which
is what CRC checks and block signatures rely on.
*/

use bpcore_cbor as cbor;

pub mod block;
pub mod bpsec;
pub mod builder;
pub mod bundle;
pub mod bundle_flags;
pub mod bundle_id;
pub mod crc;
pub mod creation_timestamp;
pub mod dtn_time;
pub mod eid;
pub mod fragment;
pub mod hop_info;
pub mod primary_block;
pub mod status_report;
pub mod validate;

mod error;

pub use error::Error;
pub use validate::{validate, validate_with};

use prelude::*;

#[cfg(test)]
mod bundle_tests;

pub mod prelude {
    pub use super::block::{Block, BlockData, Flags as BlockFlags, Type as BlockType};
    pub use super::builder::Builder;
    pub use super::bundle::Bundle;
    pub use super::bundle_flags::BundleFlags;
    pub use super::bundle_id::{BundleId, FragmentInfo};
    pub use super::crc::CrcType;
    pub use super::creation_timestamp::{CreationTimestamp, SequenceCounter};
    pub use super::dtn_time::DtnTime;
    pub use super::eid::Eid;
    pub use super::hop_info::HopInfo;
    pub use super::primary_block::PrimaryBlock;
    pub use super::status_report::{AdministrativeRecord, BundleStatusReport, ReasonCode};
}
