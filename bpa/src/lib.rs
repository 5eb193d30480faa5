/*!
The Bundle Processing Agent: the node-side pipeline that admits, validates,
forwards, delivers and deletes bundles (RFC 9171 Section 5).

The agent owns no I/O of its own. Storage, routing, convergence-layer transmission
and application delivery are supplied as trait objects when the [`agent::Agent`] is
built, and every pipeline step that calls one of them may suspend.
*/

mod error;

pub mod agent;
pub mod cla;
pub mod config;
pub mod descriptor;
pub mod filter;
pub mod node_ids;
pub mod registrar;
pub mod router;
pub mod storage;
pub mod store_mem;

use bpcore_bpv7 as bpv7;
use bpcore_cbor as cbor;
use std::sync::Arc;
use trace_err::*;
use tracing::{debug, error, info, trace, warn};

#[cfg(feature = "instrument")]
use tracing::instrument;

pub use error::Error;

// Re-export for consistency
pub use async_trait::async_trait;
