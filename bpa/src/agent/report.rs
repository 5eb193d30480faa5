use super::*;
use bpv7::{
    builder::Builder,
    bundle_flags::BundleFlags,
    creation_timestamp::CreationTimestamp,
    dtn_time::DtnTime,
    status_report::{AdministrativeRecord, BundleStatusReport},
};
use std::{future::Future, pin::Pin};
use tracing::Instrument;

impl Agent {
    /// Sends a status report about `bundle` if it asked for one.
    ///
    /// The report is sent as a new bundle by a tracked task, so it never holds up
    /// the bundle it reports on.
    pub(super) fn report(
        self: &Arc<Self>,
        bundle: &Bundle,
        kind: StatusKind,
        reason: ReasonCode,
    ) {
        let flags = &bundle.primary.flags;
        let requested = match kind {
            StatusKind::Received => flags.receipt_report_requested,
            StatusKind::Forwarded => flags.forward_report_requested,
            StatusKind::Delivered => flags.delivery_report_requested,
            StatusKind::Deleted => flags.delete_report_requested,
        };
        if !requested || !self.status_reports || bundle.is_admin_record() {
            return;
        }

        let report_to = &bundle.primary.report_to;
        if report_to.is_null() {
            trace!("Not reporting {kind:?} to the null endpoint");
            return;
        }
        trace!("Reporting bundle {} {kind:?} to {report_to}", bundle.id());

        let record = AdministrativeRecord::BundleStatusReport(BundleStatusReport::new(
            bundle,
            kind,
            reason,
            DtnTime::now(),
        ));

        let mut builder = Builder::new();
        builder
            .flags(BundleFlags {
                is_admin_record: true,
                ..Default::default()
            })
            .crc_type(self.crc_type)
            .source(self.node_ids.admin_endpoint(report_to))
            .destination(report_to.clone())
            .lifetime(
                self.status_report_lifetime
                    .whole_milliseconds()
                    .clamp(0, u64::MAX as i128) as u64,
            )
            .payload(cbor::encode::emit(&record));
        let report = builder.build(CreationTimestamp::now(&self.sequence));

        self.task_tracker.spawn(self.clone().transmit_report(report));
    }

    fn transmit_report(self: Arc<Self>, report: Bundle) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        let span = tracing::trace_span!(parent: None, "status_report_task");
        span.follows_from(tracing::Span::current());
        Box::pin(
            async move {
                if let Err(e) = self.transmit(report).await {
                    error!("Failed to send status report: {e}");
                }
            }
            .instrument(span),
        )
    }
}
