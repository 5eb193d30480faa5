use super::*;
use bpv7::{bundle::Bundle, eid::Eid};

/// The outcome of handing bundles to a convergence layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SendStatus {
    Sent,
    /// The transmission was attempted and failed.
    Failed,
    /// The convergence layer refused the bundle, and will keep refusing it.
    Rejected,
    /// The peer cannot be reached right now.
    Unavailable,
}

/// The sending half of a Convergence Layer Adapter, bound to one peer.
#[async_trait]
pub trait ClaSender: Send + Sync {
    async fn send_bundle(&self, bundle: &Bundle) -> SendStatus;

    /// Sends `bundles` as a unit, typically the fragments of one bundle.
    ///
    /// Stops at the first bundle that is not sent.
    async fn send_bundles(&self, bundles: &[Bundle]) -> SendStatus {
        for bundle in bundles {
            let status = self.send_bundle(bundle).await;
            if status != SendStatus::Sent {
                return status;
            }
        }
        SendStatus::Sent
    }

    fn peer_endpoint_id(&self) -> Eid;

    /// The largest payload the peer will accept in one bundle, if limited.
    fn max_payload_size(&self) -> Option<usize> {
        None
    }
}
