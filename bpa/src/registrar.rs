use super::*;
use bpv7::{bundle::Bundle, eid::Eid};

pub type Error = Box<dyn core::error::Error + Send + Sync>;

/// A local application that consumes bundles addressed to its endpoint.
#[async_trait]
pub trait ApplicationAgent: Send + Sync {
    async fn deliver(&self, bundle: &Bundle) -> Result<(), Error>;
}

/// Maps local endpoints to the applications registered on them.
#[async_trait]
pub trait Registrar: Send + Sync {
    async fn local_delivery(&self, destination: &Eid) -> Option<Arc<dyn ApplicationAgent>>;
}
