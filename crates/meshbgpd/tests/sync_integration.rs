//! End-to-end sync tests.
//!
//! Runs the cluster watcher against an in-memory node source and drives
//! the sync loop, checking the configuration file written to disk.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::{Notify, watch};

use meshbgp_core::{AddressKind, Asn, Node, ROUTER_ID_ANNOTATION, Router, StaticPolicy};
use meshbgp_watch::{ClusterWatcher, NodeEvents, NodeSource, SourceError, SourceResult, WatcherConfig};
use meshbgpd::{ArtifactWriter, Driver, Notifier, NotifyError};

#[derive(Default)]
struct MemorySource {
    nodes: Mutex<Vec<Node>>,
    events: Arc<Notify>,
}

impl MemorySource {
    fn new(nodes: Vec<Node>) -> Arc<Self> {
        let source = Self::default();
        *source.nodes.lock().unwrap() = nodes;
        Arc::new(source)
    }

    fn update(&self, nodes: Vec<Node>) {
        *self.nodes.lock().unwrap() = nodes;
        self.events.notify_one();
    }
}

#[async_trait]
impl NodeSource for MemorySource {
    async fn list(&self) -> SourceResult<Vec<Node>> {
        Ok(self.nodes.lock().unwrap().clone())
    }

    async fn watch(&self) -> SourceResult<NodeEvents> {
        let stream = futures::stream::unfold(self.events.clone(), |events| async move {
            events.notified().await;
            Some((Ok::<(), SourceError>(()), events))
        });
        Ok(stream.boxed())
    }
}

#[derive(Clone, Default)]
struct RecordingNotifier {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, _artifact: &Path) -> Result<(), NotifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn node(name: &str, ip: &str) -> Node {
    Node::new(name)
        .with_address(AddressKind::InternalIpv4, ip)
        .with_address(AddressKind::Hostname, name)
}

fn asn(n: u32) -> Asn {
    Asn::new(n).unwrap()
}

fn reflector_policy() -> StaticPolicy {
    StaticPolicy::new(asn(65000)).with_router(
        Router::new("203.0.113.1".parse().unwrap())
            .with_asn(asn(65010))
            .with_peer("D"),
    )
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap_or_default()
}

async fn wait_for_file(path: &Path, mut cond: impl FnMut(&str) -> bool) -> String {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let text = read(path);
            if cond(&text) {
                return text;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("configuration file never reached the expected state")
}

fn output(dir: &tempfile::TempDir) -> PathBuf {
    dir.path().join("gobgp.conf")
}

#[tokio::test]
async fn reflector_config_follows_cluster_changes() {
    let dir = tempfile::tempdir().unwrap();
    let path = output(&dir);

    let source = MemorySource::new(vec![
        node("A", "10.0.0.1"),
        node("B", "10.0.0.2"),
        node("C", "10.0.0.3"),
        node("D", "10.0.0.4"),
    ]);

    let mut watcher = ClusterWatcher::start(source.clone(), WatcherConfig::default());
    let changes = watcher.changes().unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let notifier = RecordingNotifier::default();
    let driver = Driver::new(
        "D",
        reflector_policy(),
        ArtifactWriter::new(&path),
        notifier.clone(),
    );

    let scenario = async {
        let text = wait_for_file(&path, |t| !t.is_empty()).await;
        assert_eq!(text.matches("[[neighbors]]").count(), 4);
        assert!(text.contains("neighbor-address = \"203.0.113.1\""));
        assert!(text.contains("peer-as = 65010"));
        assert!(text.contains("route-reflector-client = true"));

        // A new node joins the mesh.
        source.update(vec![
            node("A", "10.0.0.1"),
            node("B", "10.0.0.2"),
            node("C", "10.0.0.3"),
            node("D", "10.0.0.4"),
            node("E", "10.0.0.5"),
        ]);
        let text = wait_for_file(&path, |t| t.contains("10.0.0.5")).await;
        assert_eq!(text.matches("[[neighbors]]").count(), 5);

        // An existing node changes address.
        source.update(vec![
            node("A", "10.0.0.1"),
            node("B", "10.0.0.2"),
            node("C", "10.0.0.33"),
            node("D", "10.0.0.4"),
            node("E", "10.0.0.5"),
        ]);
        let text = wait_for_file(&path, |t| t.contains("10.0.0.33")).await;
        assert!(!text.contains("\"10.0.0.3\""));

        shutdown_tx.send(true).unwrap();
    };

    let (result, ()) = tokio::join!(driver.run(&watcher, changes, shutdown_rx), scenario);
    result.unwrap();
    watcher.join().await;

    assert_eq!(notifier.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn non_reflector_has_no_external_neighbor() {
    let dir = tempfile::tempdir().unwrap();
    let path = output(&dir);

    let source = MemorySource::new(vec![
        node("A", "10.0.0.1"),
        node("B", "10.0.0.2"),
        node("C", "10.0.0.3"),
        node("D", "10.0.0.4"),
    ]);

    let mut watcher = ClusterWatcher::start(source, WatcherConfig::default());
    let changes = watcher.changes().unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let driver = Driver::new(
        "A",
        reflector_policy(),
        ArtifactWriter::new(&path),
        RecordingNotifier::default(),
    );

    let scenario = async {
        let text = wait_for_file(&path, |t| !t.is_empty()).await;
        assert_eq!(text.matches("[[neighbors]]").count(), 3);
        assert!(!text.contains("203.0.113.1"));
        assert!(!text.contains("route-reflector"));
        shutdown_tx.send(true).unwrap();
    };

    let (result, ()) = tokio::join!(driver.run(&watcher, changes, shutdown_rx), scenario);
    result.unwrap();
    watcher.join().await;
}

#[tokio::test]
async fn initial_missing_router_id_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = output(&dir);

    let source = MemorySource::new(vec![
        Node::new("A").with_address(AddressKind::InternalIpv6, "fd00::1"),
        node("B", "10.0.0.2"),
    ]);

    let mut watcher = ClusterWatcher::start(source, WatcherConfig::default());
    let changes = watcher.changes().unwrap();
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let driver = Driver::new(
        "A",
        StaticPolicy::new(asn(65000)),
        ArtifactWriter::new(&path),
        RecordingNotifier::default(),
    );

    let err = driver.run(&watcher, changes, shutdown_rx).await.unwrap_err();
    assert!(err.to_string().contains("router-ID"));
    assert!(!path.exists());

    watcher.join().await;
}

#[tokio::test]
async fn annotated_ipv6_node_renders() {
    let dir = tempfile::tempdir().unwrap();
    let path = output(&dir);

    let source = MemorySource::new(vec![
        Node::new("A")
            .with_address(AddressKind::InternalIpv6, "fd00::1")
            .with_annotation(ROUTER_ID_ANNOTATION, "192.0.2.1"),
        Node::new("B").with_address(AddressKind::InternalIpv6, "fd00::2"),
    ]);

    let mut watcher = ClusterWatcher::start(source, WatcherConfig::default());
    let changes = watcher.changes().unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let driver = Driver::new(
        "A",
        StaticPolicy::new(asn(65000)),
        ArtifactWriter::new(&path),
        RecordingNotifier::default(),
    );

    let scenario = async {
        let text = wait_for_file(&path, |t| !t.is_empty()).await;
        assert!(text.contains("router-id = \"192.0.2.1\""));
        assert!(text.contains("neighbor-address = \"fd00::2\""));
        shutdown_tx.send(true).unwrap();
    };

    let (result, ()) = tokio::join!(driver.run(&watcher, changes, shutdown_rx), scenario);
    result.unwrap();
    watcher.join().await;
}

#[tokio::test]
async fn shutdown_before_ready_returns_cleanly() {
    struct NeverSource;

    #[async_trait]
    impl NodeSource for NeverSource {
        async fn list(&self) -> SourceResult<Vec<Node>> {
            std::future::pending().await
        }

        async fn watch(&self) -> SourceResult<NodeEvents> {
            std::future::pending().await
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let mut watcher = ClusterWatcher::start(NeverSource, WatcherConfig::default());
    let changes = watcher.changes().unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    shutdown_tx.send(true).unwrap();

    let driver = Driver::new(
        "A",
        StaticPolicy::new(asn(65000)),
        ArtifactWriter::new(output(&dir)),
        RecordingNotifier::default(),
    );

    driver.run(&watcher, changes, shutdown_rx).await.unwrap();
    watcher.join().await;
}
