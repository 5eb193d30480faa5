mod dispatch;
mod forward;
mod local;
mod report;

#[cfg(test)]
mod tests;

use super::*;
use bpv7::{
    bundle::Bundle,
    bundle_id::BundleId,
    creation_timestamp::SequenceCounter,
    crc::CrcType,
    eid::Eid,
    status_report::{ReasonCode, StatusKind},
};
use descriptor::{BundleDescriptor, Constraint, Tag};

/// The Bundle Processing Agent of one node.
///
/// Build it with [`Agent::new`], wrap it in an [`Arc`], and feed it bundles with
/// [`Agent::transmit`] and [`Agent::receive`].
pub struct Agent {
    node_ids: node_ids::NodeIds,
    status_reports: bool,
    status_report_lifetime: time::Duration,
    crc_type: CrcType,
    sequence: SequenceCounter,
    store: Arc<dyn storage::BundleStore>,
    router: Arc<dyn router::Router>,
    registrar: Arc<dyn registrar::Registrar>,
    duplicate_filter: Box<dyn filter::DuplicateFilter>,
    completion_hook: Option<filter::CompletionHook>,
    task_tracker: tokio_util::task::TaskTracker,
}

impl Agent {
    pub fn new(
        config: &config::Config,
        store: Arc<dyn storage::BundleStore>,
        router: Arc<dyn router::Router>,
        registrar: Arc<dyn registrar::Registrar>,
    ) -> Self {
        metrics::describe_counter!(
            "bundles_received",
            metrics::Unit::Count,
            "Total number of bundles received from convergence layers"
        );
        metrics::describe_counter!(
            "bundles_transmitted",
            metrics::Unit::Count,
            "Total number of locally originated bundles accepted for transmission"
        );
        metrics::describe_counter!(
            "bundles_delivered",
            metrics::Unit::Count,
            "Total number of bundles delivered on this node"
        );
        metrics::describe_counter!(
            "bundles_forwarded",
            metrics::Unit::Count,
            "Total number of bundles forwarded to another node"
        );
        metrics::describe_counter!(
            "bundles_deleted",
            metrics::Unit::Count,
            "Total number of bundles deleted"
        );
        metrics::describe_counter!(
            "bundles_dropped",
            metrics::Unit::Count,
            "Total number of duplicate or invalid bundles dropped"
        );

        info!(
            "Bundle Processing Agent for {:?}",
            Vec::<Eid>::from(&config.node_ids)
        );

        Self {
            node_ids: config.node_ids.clone(),
            status_reports: config.status_reports,
            status_report_lifetime: config.status_report_lifetime,
            crc_type: config.crc_type,
            sequence: SequenceCounter::new(config.sequence_start),
            store,
            router,
            registrar,
            duplicate_filter: Box::new(filter::SeenBundles::new(config.seen_bundles)),
            completion_hook: None,
            task_tracker: tokio_util::task::TaskTracker::new(),
        }
    }

    /// Replaces the default [`SeenBundles`](filter::SeenBundles) duplicate filter.
    pub fn with_duplicate_filter(mut self, filter: impl filter::DuplicateFilter + 'static) -> Self {
        self.duplicate_filter = Box::new(filter);
        self
    }

    pub fn with_completion_hook(
        mut self,
        hook: impl Fn(&BundleDescriptor) + Send + Sync + 'static,
    ) -> Self {
        self.completion_hook = Some(Box::new(hook));
        self
    }

    pub fn node_ids(&self) -> &node_ids::NodeIds {
        &self.node_ids
    }

    /// Accepts a bundle originated by a local application.
    #[cfg_attr(feature = "instrument", instrument(skip_all, fields(id = %bundle.id())))]
    pub async fn transmit(self: &Arc<Self>, bundle: Bundle) -> Result<(), Error> {
        metrics::counter!("bundles_transmitted").increment(1);

        let descriptor = BundleDescriptor::new(bundle, Tag::OriginLocal);
        if self.is_duplicate(&descriptor).await {
            return Ok(());
        }

        let source = &descriptor.bundle.primary.source;
        if !source.is_null() && !self.node_ids.is_local(source) {
            info!("Rejecting bundle from non-local source {source}");
            return self
                .delete(descriptor, ReasonCode::NoAdditionalInformation)
                .await;
        }

        self.dispatch(descriptor).await
    }

    /// Accepts a bundle received by a convergence layer.
    #[cfg_attr(feature = "instrument", instrument(skip_all, fields(id = %bundle.id())))]
    pub async fn receive(self: &Arc<Self>, bundle: Bundle) -> Result<(), Error> {
        metrics::counter!("bundles_received").increment(1);

        let descriptor = BundleDescriptor::new(bundle, Tag::OriginCla);
        if self.is_duplicate(&descriptor).await {
            return Ok(());
        }
        self.dispatch(descriptor).await
    }

    /// Decodes and accepts a bundle received by a convergence layer.
    pub async fn receive_data(self: &Arc<Self>, data: &[u8]) -> Result<(), Error> {
        let bundle = bpv7::bundle::Bundle::decode(data).inspect_err(|e| {
            metrics::counter!("bundles_dropped").increment(1);
            debug!("Failed to decode received bundle: {e}");
        })?;
        self.receive(bundle).await
    }

    /// Tries again to forward a stored bundle that could not be sent earlier.
    #[cfg_attr(feature = "instrument", instrument(skip(self)))]
    pub async fn resume(self: &Arc<Self>, id: &BundleId) -> Result<(), Error> {
        let Some(descriptor) = self.store.get(id).await? else {
            return Err(Error::BundleNotFound(id.clone()));
        };
        self.resume_descriptor(descriptor).await
    }

    /// Resumes every bundle in `ids` that the router will now send to `peer`.
    /// Returns the number of bundles resumed.
    #[cfg_attr(feature = "instrument", instrument(skip(self, ids)))]
    pub async fn resume_for_peer(
        self: &Arc<Self>,
        peer: &Eid,
        ids: &[BundleId],
    ) -> Result<usize, Error> {
        let matcher = self.router.bundle_to_cla_matcher(peer);
        let mut resumed = 0;
        for id in ids {
            let Some(descriptor) = self.store.get(id).await? else {
                continue;
            };
            if descriptor.has_constraint(Constraint::Contraindicated) && matcher(&descriptor.bundle)
            {
                self.resume_descriptor(descriptor).await?;
                resumed += 1;
            }
        }
        Ok(resumed)
    }

    async fn resume_descriptor(self: &Arc<Self>, mut descriptor: BundleDescriptor) -> Result<(), Error> {
        if !descriptor.remove_constraint(Constraint::Contraindicated) {
            debug!("Bundle {} is not waiting to be forwarded", descriptor.id());
            return Ok(());
        }
        descriptor.add_tag(Tag::OriginStorage);

        if descriptor.has_expired(time::OffsetDateTime::now_utc()) {
            return self.delete(descriptor, ReasonCode::LifetimeExpired).await;
        }
        self.forward(descriptor).await
    }

    /// Deletes every stored bundle that has expired. Returns the number deleted.
    #[cfg_attr(feature = "instrument", instrument(skip(self)))]
    pub async fn collect_garbage(self: &Arc<Self>) -> Result<usize, Error> {
        let expired = self.store.gc(time::OffsetDateTime::now_utc()).await?;
        let count = expired.len();
        for descriptor in expired {
            self.delete(descriptor, ReasonCode::LifetimeExpired).await?;
        }
        Ok(count)
    }

    /// Waits for every status report in flight to be sent.
    pub async fn shutdown(&self) {
        self.task_tracker.close();
        self.task_tracker.wait().await;
    }

    async fn is_duplicate(&self, descriptor: &BundleDescriptor) -> bool {
        if self.duplicate_filter.is_duplicate(descriptor).await {
            debug!("Dropping duplicate bundle {}", descriptor.id());
            metrics::counter!("bundles_dropped").increment(1);
            true
        } else {
            false
        }
    }

    #[cfg_attr(feature = "instrument", instrument(skip_all, fields(id = %descriptor.id())))]
    async fn delete(
        self: &Arc<Self>,
        mut descriptor: BundleDescriptor,
        reason: ReasonCode,
    ) -> Result<(), Error> {
        debug!("Deleting bundle {}: {reason:?}", descriptor.id());

        self.store.delete(&descriptor.id()).await?;

        descriptor.add_tag(Tag::Deleted);
        metrics::counter!("bundles_deleted").increment(1);
        self.report(&descriptor.bundle, StatusKind::Deleted, reason);
        self.complete(&descriptor);
        Ok(())
    }

    fn complete(&self, descriptor: &BundleDescriptor) {
        if let Some(hook) = &self.completion_hook {
            hook(descriptor);
        }
    }
}
