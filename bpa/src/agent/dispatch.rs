use super::*;

impl Agent {
    #[cfg_attr(feature = "instrument", instrument(skip_all, fields(id = %descriptor.id())))]
    pub(super) async fn dispatch(
        self: &Arc<Self>,
        mut descriptor: BundleDescriptor,
    ) -> Result<(), Error> {
        if let Err(e) = bpv7::validate(&descriptor.bundle) {
            warn!("Dropping invalid bundle {}: {e}", descriptor.id());
            metrics::counter!("bundles_dropped").increment(1);
            self.complete(&descriptor);
            return Ok(());
        }
        descriptor.add_constraint(Constraint::DispatchPending);

        if descriptor.has_tag(Tag::OriginCla) {
            self.report(
                &descriptor.bundle,
                StatusKind::Received,
                ReasonCode::NoAdditionalInformation,
            );
        }

        if descriptor.has_expired(time::OffsetDateTime::now_utc()) {
            trace!("Bundle {} has expired", descriptor.id());
            return self.delete(descriptor, ReasonCode::LifetimeExpired).await;
        }

        descriptor.remove_constraint(Constraint::DispatchPending);
        if self.node_ids.is_local(&descriptor.bundle.primary.destination) {
            self.deliver(descriptor).await
        } else {
            self.forward(descriptor).await
        }
    }
}
