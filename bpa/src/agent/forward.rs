use super::*;
use bpv7::block::{Block, BlockData, Type};
use cla::{ClaSender, SendStatus};

impl Agent {
    #[cfg_attr(feature = "instrument", instrument(skip_all, fields(id = %descriptor.id())))]
    pub(super) async fn forward(
        self: &Arc<Self>,
        mut descriptor: BundleDescriptor,
    ) -> Result<(), Error> {
        descriptor.add_constraint(Constraint::ForwardPending);

        // Blocks are updated on a copy, the stored bundle stays as received
        let mut outgoing = descriptor.bundle.clone();
        if !self.update_extension_blocks(&descriptor, &mut outgoing) {
            debug!("Bundle {} has exceeded its hop limit", descriptor.id());
            return self
                .delete(descriptor, ReasonCode::HopLimitExceeded)
                .await;
        }

        let Some(cla) = self.router.find_route(&outgoing).await else {
            debug!("No route for bundle {}", descriptor.id());
            return self.contraindicate(descriptor).await;
        };

        match self.send(cla.as_ref(), &outgoing).await {
            SendStatus::Sent => {
                trace!(
                    "Forwarded bundle {} to {}",
                    descriptor.id(),
                    cla.peer_endpoint_id()
                );
                descriptor.remove_constraint(Constraint::ForwardPending);
                descriptor.add_tag(Tag::Forwarded);
                if descriptor.has_tag(Tag::OriginStorage) {
                    self.store.delete(&descriptor.id()).await?;
                }

                metrics::counter!("bundles_forwarded").increment(1);
                self.report(
                    &descriptor.bundle,
                    StatusKind::Forwarded,
                    ReasonCode::NoAdditionalInformation,
                );
                self.complete(&descriptor);
                Ok(())
            }
            status => {
                let retry = self.router.declare_failure(&outgoing, status).await;
                debug!(
                    "Failed to forward bundle {} to {}: {status:?}, router retry {retry}",
                    descriptor.id(),
                    cla.peer_endpoint_id()
                );
                self.contraindicate(descriptor).await
            }
        }
    }

    async fn contraindicate(&self, mut descriptor: BundleDescriptor) -> Result<(), Error> {
        descriptor.add_constraint(Constraint::Contraindicated);
        self.store.insert(&descriptor).await?;
        Ok(())
    }

    /// Sends `bundle` to `cla`, fragmenting it first if it is too big for the peer.
    async fn send(&self, cla: &dyn ClaSender, bundle: &bpv7::bundle::Bundle) -> SendStatus {
        let Some(max_payload) = cla.max_payload_size() else {
            return cla.send_bundle(bundle).await;
        };
        if bundle.payload().map_or(0, |p| p.len()) <= max_payload {
            return cla.send_bundle(bundle).await;
        }

        match bpv7::fragment::fragment(bundle, max_payload) {
            Ok(fragments) => {
                trace!("Sending bundle as {} fragments", fragments.len());
                cla.send_bundles(&fragments).await
            }
            Err(e) => {
                debug!("Cannot fragment bundle: {e}");
                SendStatus::Rejected
            }
        }
    }

    /// Updates the Previous Node, Hop Count and Bundle Age blocks of `bundle` for
    /// the next hop. Returns `false` if the hop limit is exceeded.
    fn update_extension_blocks(
        &self,
        descriptor: &BundleDescriptor,
        bundle: &mut bpv7::bundle::Bundle,
    ) -> bool {
        let previous_node =
            BlockData::PreviousNode(self.node_ids.admin_endpoint(&bundle.primary.destination));
        if let Some(number) = find_block(bundle, Type::PreviousNode) {
            if let Some(block) = bundle.block_mut(number) {
                block.set_data(previous_node);
            }
        } else {
            bundle.add_block(
                Block::new(Type::PreviousNode, previous_node).with_crc_type(self.crc_type),
            );
        }

        if let Some(hop_count) = bundle.hop_count() {
            let hop_count = bpv7::hop_info::HopInfo {
                count: hop_count.count.saturating_add(1),
                ..hop_count
            };
            if hop_count.is_exceeded() {
                return false;
            }
            if let Some(block) = find_block(bundle, Type::HopCount).and_then(|n| bundle.block_mut(n)) {
                block.set_data(BlockData::HopCount(hop_count));
            }
        }

        if bundle.bundle_age().is_some() {
            let age = descriptor.age(time::OffsetDateTime::now_utc());
            if let Some(block) = find_block(bundle, Type::BundleAge).and_then(|n| bundle.block_mut(n))
            {
                block.set_data(BlockData::BundleAge(age));
            }
        }
        true
    }
}

fn find_block(bundle: &bpv7::bundle::Bundle, block_type: Type) -> Option<u64> {
    bundle.blocks_of_type(block_type).next().map(|b| b.number)
}
