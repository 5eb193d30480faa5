use super::*;
use bpv7::{bundle_flags::BundleFlags, prelude::*, status_report::StatusAssertion};
use cla::{ClaSender, SendStatus};
use hashbrown::HashMap;
use std::sync::Mutex;
use storage::BundleStore;

struct MockCla {
    peer: Eid,
    status: Mutex<SendStatus>,
    max_payload: Option<usize>,
    sent: Mutex<Vec<Bundle>>,
}

#[async_trait]
impl ClaSender for MockCla {
    async fn send_bundle(&self, bundle: &Bundle) -> SendStatus {
        let status = *self.status.lock().unwrap();
        if status == SendStatus::Sent {
            self.sent.lock().unwrap().push(bundle.clone());
        }
        status
    }

    fn peer_endpoint_id(&self) -> Eid {
        self.peer.clone()
    }

    fn max_payload_size(&self) -> Option<usize> {
        self.max_payload
    }
}

#[derive(Default)]
struct MockRouter {
    cla: Mutex<Option<Arc<MockCla>>>,
    failures: Mutex<Vec<SendStatus>>,
}

#[async_trait]
impl router::Router for MockRouter {
    async fn find_route(&self, _bundle: &Bundle) -> Option<Arc<dyn ClaSender>> {
        self.cla
            .lock()
            .unwrap()
            .clone()
            .map(|cla| cla as Arc<dyn ClaSender>)
    }

    fn bundle_to_cla_matcher(&self, peer: &Eid) -> router::BundleMatcher {
        let peer = peer.clone();
        Box::new(move |bundle| bundle.primary.destination.same_node(&peer))
    }

    async fn declare_failure(&self, _bundle: &Bundle, status: SendStatus) -> bool {
        self.failures.lock().unwrap().push(status);
        false
    }
}

#[derive(Default)]
struct MockApp {
    delivered: Mutex<Vec<Bundle>>,
}

#[async_trait]
impl registrar::ApplicationAgent for MockApp {
    async fn deliver(&self, bundle: &Bundle) -> Result<(), registrar::Error> {
        self.delivered.lock().unwrap().push(bundle.clone());
        Ok(())
    }
}

struct MockRegistrar {
    apps: HashMap<Eid, Arc<MockApp>>,
}

#[async_trait]
impl registrar::Registrar for MockRegistrar {
    async fn local_delivery(&self, destination: &Eid) -> Option<Arc<dyn registrar::ApplicationAgent>> {
        self.apps
            .get(destination)
            .map(|app| app.clone() as Arc<dyn registrar::ApplicationAgent>)
    }
}

/// Yields to the runtime after every operation, so that concurrent pipelines
/// interleave between store calls.
struct YieldingStore(Arc<store_mem::MemoryStore>);

#[async_trait]
impl BundleStore for YieldingStore {
    async fn insert(&self, descriptor: &BundleDescriptor) -> storage::Result<bool> {
        let r = self.0.insert(descriptor).await;
        tokio::task::yield_now().await;
        r
    }

    async fn get(&self, id: &BundleId) -> storage::Result<Option<BundleDescriptor>> {
        let r = self.0.get(id).await;
        tokio::task::yield_now().await;
        r
    }

    async fn exists(&self, id: &BundleId) -> storage::Result<bool> {
        let r = self.0.exists(id).await;
        tokio::task::yield_now().await;
        r
    }

    async fn delete(&self, id: &BundleId) -> storage::Result<bool> {
        let r = self.0.delete(id).await;
        tokio::task::yield_now().await;
        r
    }

    async fn delete_all(&self, ids: &[BundleId]) -> storage::Result<()> {
        let r = self.0.delete_all(ids).await;
        tokio::task::yield_now().await;
        r
    }

    async fn gc(&self, now: time::OffsetDateTime) -> storage::Result<Vec<BundleDescriptor>> {
        let r = self.0.gc(now).await;
        tokio::task::yield_now().await;
        r
    }

    async fn get_all_fragments(
        &self,
        fragment_id: &BundleId,
    ) -> storage::Result<Vec<BundleDescriptor>> {
        let r = self.0.get_all_fragments(fragment_id).await;
        tokio::task::yield_now().await;
        r
    }

    async fn take_fragments_if_whole(
        &self,
        fragment_id: &BundleId,
    ) -> storage::Result<Option<Vec<BundleDescriptor>>> {
        let r = self.0.take_fragments_if_whole(fragment_id).await;
        tokio::task::yield_now().await;
        r
    }
}

struct Harness {
    agent: Arc<Agent>,
    store: Arc<store_mem::MemoryStore>,
    router: Arc<MockRouter>,
    cla: Arc<MockCla>,
    app: Arc<MockApp>,
    completed: Arc<Mutex<Vec<BundleDescriptor>>>,
}

impl Harness {
    /// A node `ipn:<node>.0` with an application on service 1 and a single
    /// route through a peer at `ipn:99.0`.
    fn new(node: u64, max_payload: Option<usize>) -> Self {
        Self::build(node, max_payload, false)
    }

    /// As [`Harness::new`], with the agent's store yielding between calls.
    fn yielding(node: u64) -> Self {
        Self::build(node, None, true)
    }

    fn build(node: u64, max_payload: Option<usize>, yielding: bool) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .try_init();

        let config = config::Config {
            node_ids: node_ids::NodeIds::try_from(Eid::Ipn {
                node_number: node,
                service_number: 0,
            })
            .unwrap(),
            ..Default::default()
        };

        let cla = Arc::new(MockCla {
            peer: "ipn:99.0".parse().unwrap(),
            status: Mutex::new(SendStatus::Sent),
            max_payload,
            sent: Mutex::default(),
        });
        let router = Arc::new(MockRouter {
            cla: Mutex::new(Some(cla.clone())),
            ..Default::default()
        });
        let app = Arc::new(MockApp::default());
        let registrar = Arc::new(MockRegistrar {
            apps: HashMap::from_iter([(
                Eid::Ipn {
                    node_number: node,
                    service_number: 1,
                },
                app.clone(),
            )]),
        });
        let store = Arc::new(store_mem::MemoryStore::new());
        let agent_store: Arc<dyn BundleStore> = if yielding {
            Arc::new(YieldingStore(store.clone()))
        } else {
            store.clone()
        };

        let completed = Arc::new(Mutex::new(Vec::new()));
        let hook = completed.clone();
        let agent = Arc::new(
            Agent::new(&config, agent_store, router.clone(), registrar).with_completion_hook(
                move |descriptor| hook.lock().unwrap().push(descriptor.clone()),
            ),
        );

        Self {
            agent,
            store,
            router,
            cla,
            app,
            completed,
        }
    }

    fn sent(&self) -> Vec<Bundle> {
        self.cla.sent.lock().unwrap().clone()
    }

    fn delivered(&self) -> Vec<Bundle> {
        self.app.delivered.lock().unwrap().clone()
    }

    fn completed_with(&self, tag: Tag) -> usize {
        self.completed
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.has_tag(tag))
            .count()
    }
}

fn builder(source: &str, destination: &str, flags: BundleFlags) -> Builder {
    let mut builder = Builder::new();
    builder
        .source(source.parse().unwrap())
        .destination(destination.parse().unwrap())
        .flags(flags)
        .lifetime(60_000)
        .payload(*b"Hello DTN");
    builder
}

fn bundle(source: &str, destination: &str, flags: BundleFlags, seq: u64) -> Bundle {
    builder(source, destination, flags).build(CreationTimestamp::new(Some(DtnTime::now()), seq))
}

fn reports(sent: &[Bundle]) -> Vec<BundleStatusReport> {
    sent.iter()
        .filter(|b| b.is_admin_record())
        .map(|b| match AdministrativeRecord::from_bundle(b).unwrap() {
            AdministrativeRecord::BundleStatusReport(report) => report,
        })
        .collect()
}

#[tokio::test]
async fn local_delivery() {
    let h = Harness::new(1, None);
    let bundle = bundle("ipn:2.1", "ipn:1.1", BundleFlags::default(), 1);

    h.agent
        .receive_data(&bundle.encode().unwrap())
        .await
        .unwrap();
    h.agent.shutdown().await;

    let delivered = h.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].payload(), Some(b"Hello DTN".as_slice()));
    assert!(h.sent().is_empty());
    assert!(h.store.is_empty());
    assert_eq!(h.completed_with(Tag::Delivered), 1);
}

#[tokio::test]
async fn delivery_report() {
    let h = Harness::new(1, None);
    let flags = BundleFlags {
        delivery_report_requested: true,
        ..Default::default()
    };
    h.agent
        .receive(bundle("ipn:2.1", "ipn:1.1", flags, 1))
        .await
        .unwrap();
    h.agent.shutdown().await;

    let sent = h.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].primary.source, "ipn:1.0".parse::<Eid>().unwrap());
    assert_eq!(sent[0].primary.destination, "ipn:2.1".parse::<Eid>().unwrap());
    assert_eq!(sent[0].primary.lifetime, 60 * 60 * 1000);

    let reports = reports(&sent);
    assert_eq!(reports.len(), 1);
    assert!(matches!(reports[0].delivered, Some(StatusAssertion(Some(_)))));
    assert!(reports[0].received.is_none());
    assert_eq!(reports[0].reason, ReasonCode::NoAdditionalInformation);
}

#[tokio::test]
async fn forward_with_reports() {
    let h = Harness::new(1, None);
    let flags = BundleFlags {
        receipt_report_requested: true,
        forward_report_requested: true,
        ..Default::default()
    };
    let mut builder = builder("ipn:2.1", "ipn:3.1", flags);
    builder.hop_limit(5);
    let bundle = builder.build(CreationTimestamp::new(Some(DtnTime::now()), 1));

    h.agent.receive(bundle.clone()).await.unwrap();
    h.agent.shutdown().await;

    let sent = h.sent();
    assert_eq!(sent.len(), 3);

    let forwarded = sent.iter().find(|b| !b.is_admin_record()).unwrap();
    assert_eq!(forwarded.id(), bundle.id());
    assert_eq!(
        forwarded.previous_node(),
        Some(&"ipn:1.0".parse::<Eid>().unwrap())
    );
    assert_eq!(forwarded.hop_count(), Some(HopInfo { limit: 5, count: 1 }));
    assert_eq!(forwarded.payload(), bundle.payload());

    let reports = reports(&sent);
    assert_eq!(reports.len(), 2);
    assert!(reports.iter().any(|r| r.received.is_some()));
    assert!(reports.iter().any(|r| r.forwarded.is_some()));
    assert!(reports.iter().all(|r| r.bundle_id.source == bundle.primary.source));

    assert!(h.store.is_empty());
    assert_eq!(h.completed_with(Tag::Forwarded), 3);
}

#[tokio::test]
async fn reports_disabled() {
    let config = config::Config {
        status_reports: false,
        node_ids: node_ids::NodeIds::try_from("ipn:1.0".parse::<Eid>().unwrap()).unwrap(),
        ..Default::default()
    };
    let h = Harness::new(1, None);
    let agent = Arc::new(Agent::new(
        &config,
        h.store.clone(),
        h.router.clone(),
        Arc::new(MockRegistrar {
            apps: HashMap::new(),
        }),
    ));

    let flags = BundleFlags {
        receipt_report_requested: true,
        forward_report_requested: true,
        ..Default::default()
    };
    agent
        .receive(bundle("ipn:2.1", "ipn:3.1", flags, 1))
        .await
        .unwrap();
    agent.shutdown().await;

    assert_eq!(h.sent().len(), 1);
    assert!(reports(&h.sent()).is_empty());
}

#[tokio::test]
async fn transmit_foreign_source() {
    let h = Harness::new(1, None);
    let flags = BundleFlags {
        delete_report_requested: true,
        ..Default::default()
    };
    let mut builder = builder("ipn:9.1", "ipn:3.1", flags);
    builder.report_to("ipn:2.1".parse().unwrap());

    h.agent
        .transmit(builder.build(CreationTimestamp::new(Some(DtnTime::now()), 1)))
        .await
        .unwrap();
    h.agent.shutdown().await;

    let sent = h.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].primary.destination, "ipn:2.1".parse::<Eid>().unwrap());

    let reports = reports(&sent);
    assert!(reports[0].deleted.is_some());
    assert_eq!(reports[0].reason, ReasonCode::NoAdditionalInformation);
    assert_eq!(h.completed_with(Tag::Deleted), 1);
}

#[tokio::test]
async fn transmit_local() {
    let h = Harness::new(1, None);

    h.agent
        .transmit(bundle("ipn:1.1", "ipn:3.1", BundleFlags::default(), 1))
        .await
        .unwrap();
    // Anonymous bundles are accepted too
    h.agent
        .transmit(bundle("dtn:none", "ipn:3.1", BundleFlags::default(), 2))
        .await
        .unwrap();
    h.agent.shutdown().await;

    assert_eq!(h.sent().len(), 2);
    let completed = h.completed.lock().unwrap();
    assert!(completed.iter().all(|d| d.has_tag(Tag::OriginLocal)));
}

#[tokio::test]
async fn duplicates() {
    let h = Harness::new(1, None);
    let bundle = bundle("ipn:2.1", "ipn:1.1", BundleFlags::default(), 1);

    h.agent.receive(bundle.clone()).await.unwrap();
    h.agent.receive(bundle).await.unwrap();

    assert_eq!(h.delivered().len(), 1);
    assert_eq!(h.completed.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn custom_duplicate_filter() {
    let h = Harness::new(1, None);
    let config = config::Config {
        node_ids: node_ids::NodeIds::try_from("ipn:1.0".parse::<Eid>().unwrap()).unwrap(),
        ..Default::default()
    };
    let agent = Arc::new(
        Agent::new(
            &config,
            h.store.clone(),
            h.router.clone(),
            Arc::new(MockRegistrar {
                apps: HashMap::new(),
            }),
        )
        .with_duplicate_filter(|d: &BundleDescriptor| d.bundle.primary.timestamp.sequence_number == 13),
    );

    agent
        .receive(bundle("ipn:2.1", "ipn:3.1", BundleFlags::default(), 13))
        .await
        .unwrap();
    agent
        .receive(bundle("ipn:2.1", "ipn:3.1", BundleFlags::default(), 14))
        .await
        .unwrap();

    let sent = h.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].primary.timestamp.sequence_number, 14);
}

#[tokio::test]
async fn endpoint_not_found() {
    let h = Harness::new(1, None);
    let result = h
        .agent
        .receive(bundle("ipn:2.1", "ipn:1.99", BundleFlags::default(), 1))
        .await;

    assert!(matches!(
        result,
        Err(Error::EndpointNotFound(Eid::Ipn {
            node_number: 1,
            service_number: 99
        }))
    ));
    assert_eq!(h.completed_with(Tag::Deleted), 1);
}

#[tokio::test]
async fn fragment_and_reassemble() {
    let sender = Harness::new(1, Some(10));
    let mut builder = builder("ipn:1.1", "ipn:3.1", BundleFlags::default());
    builder.payload((0..35u8).collect::<Vec<_>>());
    let original = builder.build(CreationTimestamp::new(Some(DtnTime::now()), 1));

    sender.agent.transmit(original.clone()).await.unwrap();

    let fragments = sender.sent();
    assert_eq!(fragments.len(), 4);
    assert!(fragments.iter().all(|f| f.is_fragment()));
    assert!(fragments.iter().all(|f| f.payload().unwrap().len() <= 10));
    assert!(fragments.iter().all(|f| f.fragment_id() == original.id()));

    let receiver = Harness::new(3, None);
    for f in fragments.iter().rev() {
        assert!(receiver.delivered().is_empty());
        receiver
            .agent
            .receive_data(&f.encode().unwrap())
            .await
            .unwrap();
    }

    let delivered = receiver.delivered();
    assert_eq!(delivered.len(), 1);
    assert!(!delivered[0].is_fragment());
    assert_eq!(delivered[0].id(), original.id());
    assert_eq!(delivered[0].payload(), original.payload());
    assert!(receiver.store.is_empty());
}

#[tokio::test]
async fn concurrent_last_fragments() {
    let mut builder = builder("ipn:1.1", "ipn:3.1", BundleFlags::default());
    builder.payload((0..18u8).collect::<Vec<_>>());
    let original = builder.build(CreationTimestamp::new(Some(DtnTime::now()), 1));
    let mut fragments = bpv7::fragment::fragment(&original, 10).unwrap();
    assert_eq!(fragments.len(), 2);
    let second = fragments.pop().unwrap();
    let first = fragments.pop().unwrap();

    let h = Harness::yielding(3);
    let (a, b) = tokio::join!(h.agent.receive(first), h.agent.receive(second));
    a.unwrap();
    b.unwrap();

    let delivered = h.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].payload(), original.payload());
    assert_eq!(h.completed_with(Tag::Delivered), 1);
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn do_not_fragment() {
    let h = Harness::new(1, Some(4));
    let flags = BundleFlags {
        do_not_fragment: true,
        ..Default::default()
    };
    let bundle = bundle("ipn:1.1", "ipn:3.1", flags, 1);

    h.agent.transmit(bundle.clone()).await.unwrap();

    assert!(h.sent().is_empty());
    assert_eq!(*h.router.failures.lock().unwrap(), [SendStatus::Rejected]);
    let stored = h.store.get(&bundle.id()).await.unwrap().unwrap();
    assert!(stored.has_constraint(Constraint::Contraindicated));
}

#[tokio::test]
async fn no_route_then_resume() {
    let h = Harness::new(1, None);
    *h.router.cla.lock().unwrap() = None;
    let bundle = bundle("ipn:2.1", "ipn:3.1", BundleFlags::default(), 1);
    let id = bundle.id();

    h.agent.receive(bundle).await.unwrap();
    let stored = h.store.get(&id).await.unwrap().unwrap();
    assert!(stored.has_constraint(Constraint::Contraindicated));
    assert!(h.completed.lock().unwrap().is_empty());

    *h.router.cla.lock().unwrap() = Some(h.cla.clone());
    h.agent.resume(&id).await.unwrap();

    assert_eq!(h.sent().len(), 1);
    // The stored bundle is left untouched by forwarding
    assert!(h.sent()[0].previous_node().is_some());
    assert!(stored.bundle.previous_node().is_none());
    assert!(h.store.is_empty());
    assert_eq!(h.completed_with(Tag::Forwarded), 1);
    assert_eq!(h.completed_with(Tag::OriginStorage), 1);

    assert!(matches!(
        h.agent.resume(&id).await,
        Err(Error::BundleNotFound(_))
    ));
}

#[tokio::test]
async fn resume_for_peer() {
    let h = Harness::new(1, None);
    *h.cla.status.lock().unwrap() = SendStatus::Unavailable;
    let to_3 = bundle("ipn:2.1", "ipn:3.1", BundleFlags::default(), 1);
    let to_4 = bundle("ipn:2.1", "ipn:4.1", BundleFlags::default(), 2);
    let ids = [to_3.id(), to_4.id()];

    h.agent.receive(to_3).await.unwrap();
    h.agent.receive(to_4).await.unwrap();
    assert_eq!(
        *h.router.failures.lock().unwrap(),
        [SendStatus::Unavailable, SendStatus::Unavailable]
    );
    assert_eq!(h.store.len(), 2);

    *h.cla.status.lock().unwrap() = SendStatus::Sent;
    let peer: Eid = "ipn:3.0".parse().unwrap();
    assert_eq!(h.agent.resume_for_peer(&peer, &ids).await.unwrap(), 1);

    let sent = h.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].id(), ids[0]);
    assert_eq!(h.store.len(), 1);
    assert!(h.store.exists(&ids[1]).await.unwrap());

    // Already resumed
    assert_eq!(h.agent.resume_for_peer(&peer, &ids).await.unwrap(), 0);
}

#[tokio::test]
async fn expired() {
    let h = Harness::new(1, None);
    let flags = BundleFlags {
        delete_report_requested: true,
        ..Default::default()
    };
    let mut builder = builder("ipn:2.1", "ipn:1.1", flags);
    builder.lifetime(1000);
    let created = DtnTime::new(DtnTime::now().millisecs() - 10_000);

    h.agent
        .receive(builder.build(CreationTimestamp::new(Some(created), 1)))
        .await
        .unwrap();
    h.agent.shutdown().await;

    assert!(h.delivered().is_empty());
    let reports = reports(&h.sent());
    assert_eq!(reports.len(), 1);
    assert!(reports[0].deleted.is_some());
    assert_eq!(reports[0].reason, ReasonCode::LifetimeExpired);
}

/// A bundle without a creation time, aged `age` milliseconds on arrival.
fn aged(age: u64, seq: u64) -> Bundle {
    let mut bundle =
        builder("ipn:2.1", "ipn:3.1", BundleFlags::default()).build(CreationTimestamp::new(None, seq));
    let number = bundle
        .blocks_of_type(BlockType::BundleAge)
        .next()
        .map(|b| b.number)
        .unwrap();
    bundle
        .block_mut(number)
        .unwrap()
        .set_data(BlockData::BundleAge(age));
    bundle
}

#[tokio::test]
async fn bundle_age() {
    let h = Harness::new(1, None);

    h.agent.receive(aged(5000, 1)).await.unwrap();

    let sent = h.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].bundle_age().unwrap() >= 5000);

    // Aged past its lifetime
    h.agent.receive(aged(70_000, 2)).await.unwrap();

    assert_eq!(h.sent().len(), 1);
    assert_eq!(h.completed_with(Tag::Deleted), 1);
}

#[tokio::test]
async fn hop_limit_exceeded() {
    let h = Harness::new(1, None);
    let flags = BundleFlags {
        delete_report_requested: true,
        ..Default::default()
    };
    let mut builder = builder("ipn:2.1", "ipn:3.1", flags);
    builder.hop_limit(0);

    h.agent
        .receive(builder.build(CreationTimestamp::new(Some(DtnTime::now()), 1)))
        .await
        .unwrap();
    h.agent.shutdown().await;

    let sent = h.sent();
    assert_eq!(sent.len(), 1);
    let reports = reports(&sent);
    assert_eq!(reports[0].reason, ReasonCode::HopLimitExceeded);
    assert_eq!(h.completed_with(Tag::Deleted), 1);
}

#[tokio::test]
async fn administrative_record() {
    let h = Harness::new(1, None);
    let subject = bundle("ipn:1.1", "ipn:2.1", BundleFlags::default(), 7);
    let record = AdministrativeRecord::BundleStatusReport(BundleStatusReport::new(
        &subject,
        StatusKind::Delivered,
        ReasonCode::NoAdditionalInformation,
        DtnTime::now(),
    ));
    let mut builder = builder(
        "ipn:2.0",
        "ipn:1.0",
        BundleFlags {
            is_admin_record: true,
            delivery_report_requested: true,
            ..Default::default()
        },
    );
    builder.payload(cbor::encode::emit(&record));

    h.agent
        .receive(builder.build(CreationTimestamp::new(Some(DtnTime::now()), 1)))
        .await
        .unwrap();
    h.agent.shutdown().await;

    assert!(h.delivered().is_empty());
    // Never reported on
    assert!(h.sent().is_empty());
    assert_eq!(h.completed_with(Tag::Delivered), 1);
}

#[tokio::test]
async fn invalid_bundle() {
    let h = Harness::new(1, None);
    let mut bundle = bundle("ipn:2.1", "ipn:1.1", BundleFlags::default(), 1);
    bundle.blocks.clear();

    h.agent.receive(bundle).await.unwrap();

    assert!(h.delivered().is_empty());
    let completed = h.completed.lock().unwrap();
    assert_eq!(completed.len(), 1);
    assert!(!completed[0].has_tag(Tag::Delivered));
    assert!(!completed[0].has_tag(Tag::Deleted));
}

#[tokio::test]
async fn undecodable() {
    let h = Harness::new(1, None);
    assert!(matches!(
        h.agent.receive_data(&[0x9F, 0x01]).await,
        Err(Error::InvalidBundle(_))
    ));
    assert!(h.completed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn collect_garbage() {
    let h = Harness::new(1, None);
    let mut builder = builder("ipn:2.1", "ipn:3.1", BundleFlags::default());
    builder.lifetime(0);
    let expired = BundleDescriptor::new(
        builder.build(CreationTimestamp::new(Some(DtnTime::now()), 1)),
        Tag::OriginCla,
    );
    let live = BundleDescriptor::new(
        bundle("ipn:2.1", "ipn:3.1", BundleFlags::default(), 2),
        Tag::OriginCla,
    );
    h.store.insert(&expired).await.unwrap();
    h.store.insert(&live).await.unwrap();

    assert_eq!(h.agent.collect_garbage().await.unwrap(), 1);
    assert_eq!(h.store.len(), 1);
    assert!(h.store.exists(&live.id()).await.unwrap());
    assert_eq!(h.completed_with(Tag::Deleted), 1);
}
