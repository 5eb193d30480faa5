use super::*;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("No application is registered for endpoint {0}")]
    EndpointNotFound(bpv7::eid::Eid),

    #[error("Bundle {0} is not in the store")]
    BundleNotFound(bpv7::bundle_id::BundleId),

    #[error(transparent)]
    InvalidBundle(#[from] bpv7::Error),

    #[error(transparent)]
    Fragmentation(#[from] bpv7::fragment::Error),

    #[error(transparent)]
    Storage(#[from] storage::Error),
}
