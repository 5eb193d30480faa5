use super::*;
use bpv7::bundle_id::BundleId;
use descriptor::BundleDescriptor;
use hashbrown::HashMap;
use std::sync::Mutex;

/// A [`BundleStore`](storage::BundleStore) held entirely in memory.
#[derive(Default)]
pub struct MemoryStore {
    bundles: Mutex<HashMap<BundleId, BundleDescriptor>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bundles.lock().trace_expect("Failed to lock mutex").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl storage::BundleStore for MemoryStore {
    async fn insert(&self, descriptor: &BundleDescriptor) -> storage::Result<bool> {
        Ok(self
            .bundles
            .lock()
            .trace_expect("Failed to lock mutex")
            .insert(descriptor.id(), descriptor.clone())
            .is_none())
    }

    async fn get(&self, id: &BundleId) -> storage::Result<Option<BundleDescriptor>> {
        Ok(self
            .bundles
            .lock()
            .trace_expect("Failed to lock mutex")
            .get(id)
            .cloned())
    }

    async fn exists(&self, id: &BundleId) -> storage::Result<bool> {
        Ok(self
            .bundles
            .lock()
            .trace_expect("Failed to lock mutex")
            .contains_key(id))
    }

    async fn delete(&self, id: &BundleId) -> storage::Result<bool> {
        Ok(self
            .bundles
            .lock()
            .trace_expect("Failed to lock mutex")
            .remove(id)
            .is_some())
    }

    async fn delete_all(&self, ids: &[BundleId]) -> storage::Result<()> {
        let mut bundles = self.bundles.lock().trace_expect("Failed to lock mutex");
        for id in ids {
            bundles.remove(id);
        }
        Ok(())
    }

    async fn gc(&self, now: time::OffsetDateTime) -> storage::Result<Vec<BundleDescriptor>> {
        Ok(self
            .bundles
            .lock()
            .trace_expect("Failed to lock mutex")
            .extract_if(|_, d| d.has_expired(now))
            .map(|(_, d)| d)
            .collect())
    }

    async fn get_all_fragments(
        &self,
        fragment_id: &BundleId,
    ) -> storage::Result<Vec<BundleDescriptor>> {
        Ok(self
            .bundles
            .lock()
            .trace_expect("Failed to lock mutex")
            .values()
            .filter(|d| d.bundle.is_fragment() && &d.bundle.fragment_id() == fragment_id)
            .cloned()
            .collect())
    }

    async fn is_bundle_whole(&self, fragment_id: &BundleId) -> storage::Result<bool> {
        let mut fragments = self
            .bundles
            .lock()
            .trace_expect("Failed to lock mutex")
            .values()
            .filter(|d| d.bundle.is_fragment() && &d.bundle.fragment_id() == fragment_id)
            .map(|d| d.bundle.clone())
            .collect::<Vec<_>>();
        Ok(storage::covers_payload(&mut fragments))
    }

    async fn take_fragments_if_whole(
        &self,
        fragment_id: &BundleId,
    ) -> storage::Result<Option<Vec<BundleDescriptor>>> {
        let mut bundles = self.bundles.lock().trace_expect("Failed to lock mutex");
        let ids = bundles
            .iter()
            .filter(|(_, d)| d.bundle.is_fragment() && &d.bundle.fragment_id() == fragment_id)
            .map(|(id, _)| id.clone())
            .collect::<Vec<_>>();

        let mut fragments = ids
            .iter()
            .filter_map(|id| bundles.get(id))
            .map(|d| d.bundle.clone())
            .collect::<Vec<_>>();
        if !storage::covers_payload(&mut fragments) {
            return Ok(None);
        }
        Ok(Some(ids.iter().filter_map(|id| bundles.remove(id)).collect()))
    }

    async fn delete_all_fragments(&self, fragment_id: &BundleId) -> storage::Result<()> {
        self.bundles
            .lock()
            .trace_expect("Failed to lock mutex")
            .retain(|_, d| !(d.bundle.is_fragment() && &d.bundle.fragment_id() == fragment_id));
        Ok(())
    }
}
