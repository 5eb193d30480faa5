use super::*;
use bpv7::bundle_id::BundleId;
use descriptor::BundleDescriptor;
use std::sync::Mutex;

/// Called once a bundle reaches a terminal state.
pub type CompletionHook = Box<dyn Fn(&BundleDescriptor) + Send + Sync>;

/// Decides whether a bundle entering the agent has been seen before.
#[async_trait]
pub trait DuplicateFilter: Send + Sync {
    async fn is_duplicate(&self, descriptor: &BundleDescriptor) -> bool;
}

#[async_trait]
impl<F> DuplicateFilter for F
where
    F: Fn(&BundleDescriptor) -> bool + Send + Sync,
{
    async fn is_duplicate(&self, descriptor: &BundleDescriptor) -> bool {
        self(descriptor)
    }
}

/// Remembers the ids of the most recently seen bundles.
///
/// Fragments are told apart by their offset, so each fragment is seen once.
pub struct SeenBundles {
    cache: Mutex<lru::LruCache<BundleId, ()>>,
}

impl SeenBundles {
    pub fn new(capacity: std::num::NonZeroUsize) -> Self {
        Self {
            cache: Mutex::new(lru::LruCache::new(capacity)),
        }
    }
}

#[async_trait]
impl DuplicateFilter for SeenBundles {
    async fn is_duplicate(&self, descriptor: &BundleDescriptor) -> bool {
        self.cache
            .lock()
            .trace_expect("Failed to lock mutex")
            .put(descriptor.id(), ())
            .is_some()
    }
}
