use super::*;
use bpv7::{bundle::Bundle, eid::Eid};
use cla::{ClaSender, SendStatus};

/// Decides whether a bundle may be sent to a particular peer.
pub type BundleMatcher = Box<dyn Fn(&Bundle) -> bool + Send + Sync>;

/// Chooses the next hop for bundles that are not for this node.
#[async_trait]
pub trait Router: Send + Sync {
    async fn find_route(&self, bundle: &Bundle) -> Option<Arc<dyn ClaSender>>;

    /// The bundles that can now be sent to `peer`, used when the peer becomes reachable.
    fn bundle_to_cla_matcher(&self, peer: &Eid) -> BundleMatcher;

    /// Told when a send to the chosen route did not succeed.
    /// Returns `true` if the router will retry the bundle later.
    async fn declare_failure(&self, bundle: &Bundle, status: SendStatus) -> bool;
}
