use super::*;
use bpv7::{bundle::Bundle, bundle_id::BundleId};
use descriptor::BundleDescriptor;

pub type Error = Box<dyn core::error::Error + Send + Sync>;
pub type Result<T> = core::result::Result<T, Error>;

/// Where the agent keeps bundles it cannot finish with straight away: fragments
/// awaiting reassembly and bundles waiting for a forwarding opportunity.
///
/// Each call must be atomic with respect to other calls on the same bundle.
#[async_trait]
pub trait BundleStore: Send + Sync {
    /// Stores `descriptor`, replacing any descriptor with the same id.
    /// Returns `true` if the bundle was not already stored.
    async fn insert(&self, descriptor: &BundleDescriptor) -> Result<bool>;

    async fn get(&self, id: &BundleId) -> Result<Option<BundleDescriptor>>;

    async fn exists(&self, id: &BundleId) -> Result<bool>;

    /// Returns `true` if the bundle was stored.
    async fn delete(&self, id: &BundleId) -> Result<bool>;

    async fn delete_all(&self, ids: &[BundleId]) -> Result<()>;

    /// Removes and returns every stored bundle that has expired by `now`.
    async fn gc(&self, now: time::OffsetDateTime) -> Result<Vec<BundleDescriptor>>;

    /// All stored fragments of the bundle identified by `fragment_id`.
    async fn get_all_fragments(&self, fragment_id: &BundleId) -> Result<Vec<BundleDescriptor>>;

    /// Returns `true` if the stored fragments cover the whole original payload.
    async fn is_bundle_whole(&self, fragment_id: &BundleId) -> Result<bool> {
        let mut fragments = self
            .get_all_fragments(fragment_id)
            .await?
            .into_iter()
            .map(|d| d.bundle)
            .collect::<Vec<_>>();
        Ok(covers_payload(&mut fragments))
    }

    /// Reassembles the bundle identified by `fragment_id` from its stored fragments.
    /// The fragments stay in the store.
    async fn get_bundle_from_fragments(&self, fragment_id: &BundleId) -> Result<Bundle> {
        let fragments = self
            .get_all_fragments(fragment_id)
            .await?
            .into_iter()
            .map(|d| d.bundle)
            .collect();
        Ok(bpv7::fragment::reassemble(fragments)?)
    }

    /// Removes and returns every stored fragment of `fragment_id`, but only if together
    /// they cover the whole original payload. Otherwise nothing is removed.
    ///
    /// The check and the removal must be one atomic step, so that only one caller
    /// ever receives the fragments of a bundle.
    async fn take_fragments_if_whole(
        &self,
        fragment_id: &BundleId,
    ) -> Result<Option<Vec<BundleDescriptor>>>;

    async fn delete_all_fragments(&self, fragment_id: &BundleId) -> Result<()> {
        let ids = self
            .get_all_fragments(fragment_id)
            .await?
            .iter()
            .map(|d| d.id())
            .collect::<Vec<_>>();
        self.delete_all(&ids).await
    }
}

/// Returns `true` if `fragments` tile the original payload exactly, with no gaps
/// or overlaps.
pub(crate) fn covers_payload(fragments: &mut [Bundle]) -> bool {
    let Some(total_len) = fragments.first().map(|f| f.primary.total_data_length) else {
        return false;
    };
    fragments.sort_by_key(|f| f.primary.fragment_offset);

    let mut expected = 0;
    for f in fragments.iter() {
        if !f.is_fragment()
            || f.primary.total_data_length != total_len
            || f.primary.fragment_offset != expected
        {
            return false;
        }
        expected += f.payload().map_or(0, |p| p.len() as u64);
    }
    expected == total_len
}
