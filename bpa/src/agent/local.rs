use super::*;
use bpv7::status_report::AdministrativeRecord;

impl Agent {
    #[cfg_attr(feature = "instrument", instrument(skip_all, fields(id = %descriptor.id())))]
    pub(super) async fn deliver(
        self: &Arc<Self>,
        mut descriptor: BundleDescriptor,
    ) -> Result<(), Error> {
        if descriptor.bundle.is_fragment() {
            let Some(whole) = self.reassemble(descriptor).await? else {
                return Ok(());
            };
            descriptor = whole;
        }

        let destination = descriptor.bundle.primary.destination.clone();
        if descriptor.bundle.is_admin_record() && self.node_ids.contains(&destination) {
            self.administrative_bundle(&descriptor);
            descriptor.add_tag(Tag::Delivered);
            metrics::counter!("bundles_delivered").increment(1);
            self.complete(&descriptor);
            return Ok(());
        }

        let Some(application) = self.registrar.local_delivery(&destination).await else {
            debug!("No application registered for {destination}");
            self.delete(descriptor, ReasonCode::DestinationEndpointIDUnavailable)
                .await?;
            return Err(Error::EndpointNotFound(destination));
        };

        if let Err(e) = application.deliver(&descriptor.bundle).await {
            warn!(
                "Failed to deliver bundle {} to {destination}: {e}",
                descriptor.id()
            );
            return self
                .delete(descriptor, ReasonCode::DestinationEndpointIDUnavailable)
                .await;
        }

        trace!("Delivered bundle {} to {destination}", descriptor.id());
        descriptor.add_tag(Tag::Delivered);
        metrics::counter!("bundles_delivered").increment(1);
        self.report(
            &descriptor.bundle,
            StatusKind::Delivered,
            ReasonCode::NoAdditionalInformation,
        );
        self.complete(&descriptor);
        Ok(())
    }

    /// Parks `descriptor` with its sibling fragments, and returns the whole bundle
    /// once every fragment has arrived.
    ///
    /// The fragments are claimed from the store in one step, so when the last
    /// fragments arrive together only one of them completes the bundle.
    async fn reassemble(
        &self,
        mut descriptor: BundleDescriptor,
    ) -> Result<Option<BundleDescriptor>, Error> {
        let fragment_id = descriptor.bundle.fragment_id();

        descriptor.add_constraint(Constraint::ReassemblyPending);
        self.store.insert(&descriptor).await?;

        let Some(fragments) = self.store.take_fragments_if_whole(&fragment_id).await? else {
            trace!("Fragment {} is waiting for reassembly", descriptor.id());
            return Ok(None);
        };

        let mut tags = hashbrown::HashSet::new();
        let bundles = fragments
            .into_iter()
            .map(|f| {
                tags.extend(f.tags());
                f.bundle
            })
            .collect();
        let bundle = match bpv7::fragment::reassemble(bundles) {
            Ok(bundle) => bundle,
            Err(e) => {
                warn!("Failed to reassemble {fragment_id}: {e}");
                metrics::counter!("bundles_dropped").increment(1);
                self.complete(&descriptor);
                return Ok(None);
            }
        };
        debug!("Reassembled bundle {fragment_id}");

        let mut whole = BundleDescriptor::new(bundle, Tag::OriginStorage);
        for tag in tags {
            whole.add_tag(tag);
        }
        Ok(Some(whole))
    }

    fn administrative_bundle(&self, descriptor: &BundleDescriptor) {
        match AdministrativeRecord::from_bundle(&descriptor.bundle) {
            Ok(AdministrativeRecord::BundleStatusReport(report)) => {
                let statuses = [
                    ("received", report.received),
                    ("forwarded", report.forwarded),
                    ("delivered", report.delivered),
                    ("deleted", report.deleted),
                ];
                for (status, assertion) in statuses {
                    if let Some(assertion) = assertion {
                        match assertion.0 {
                            Some(at) => info!(
                                "Bundle {} {status} at {at}, reason {:?}",
                                report.bundle_id, report.reason
                            ),
                            None => info!(
                                "Bundle {} {status}, reason {:?}",
                                report.bundle_id, report.reason
                            ),
                        }
                    }
                }
            }
            Err(e) => warn!(
                "Invalid administrative record from {}: {e}",
                descriptor.bundle.primary.source
            ),
        }
    }
}
