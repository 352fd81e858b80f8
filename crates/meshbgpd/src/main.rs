//! meshbgpd — keeps a BGP speaker's peering configuration in sync with
//! the cluster's node set.
//!
//! # Usage
//!
//! ```text
//! NODE_NAME=worker-1 meshbgpd \
//!     --policy /etc/kube-bgp/kube-bgp.yaml \
//!     --output /etc/gobgp/gobgp.conf \
//!     --daemon-pidfile /run/gobgpd.pid
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tokio::sync::watch;
use tracing::info;

use meshbgp_core::StaticPolicy;
use meshbgp_watch::{ClusterWatcher, KubeNodeSource, WatcherConfig};
use meshbgpd::{ArtifactWriter, Driver, NoopNotifier, Notifier, SighupNotifier};

#[derive(Parser)]
#[command(name = "meshbgpd", about = "BGP peering configuration from cluster membership")]
struct Cli {
    /// Name of the node this instance runs on.
    #[arg(long, env = "NODE_NAME")]
    node_name: String,

    /// Static peering policy (YAML, or TOML if the name ends in .toml).
    #[arg(long, env = "MESHBGP_POLICY", default_value = "/etc/kube-bgp/kube-bgp.yaml")]
    policy: PathBuf,

    /// Where to write the rendered BGP daemon configuration.
    #[arg(long, env = "MESHBGP_OUTPUT", default_value = "/etc/gobgp/gobgp.conf")]
    output: PathBuf,

    /// Maximum seconds between full node re-lists.
    #[arg(long, default_value = "60", value_parser = clap::value_parser!(u64).range(1..))]
    max_wait_secs: u64,

    /// Seconds to wait after a failed list or watch.
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(u64).range(1..))]
    retry_secs: u64,

    /// Pidfile of the BGP daemon; it is sent SIGHUP after each update.
    #[arg(long, env = "MESHBGP_DAEMON_PIDFILE")]
    daemon_pidfile: Option<PathBuf>,

    /// Log output format.
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.daemon_pidfile.clone() {
        Some(pidfile) => run(cli, SighupNotifier::new(pidfile)).await,
        None => run(cli, NoopNotifier).await,
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,meshbgpd=debug,meshbgp=debug"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run<N: Notifier>(cli: Cli, notifier: N) -> anyhow::Result<()> {
    let node_name = cli.node_name.trim().to_string();
    if node_name.is_empty() {
        anyhow::bail!("NODE_NAME must be set");
    }

    info!(node = %node_name, "meshbgpd starting");

    // ── Startup: anything failing here is fatal ─────────────────

    let policy = StaticPolicy::from_file(&cli.policy)
        .with_context(|| format!("failed to load policy from {}", cli.policy.display()))?;
    info!(
        path = ?cli.policy,
        asn = %policy.asn,
        routers = policy.routers.len(),
        reflector = policy.is_reflector(&node_name),
        "policy loaded"
    );

    let source = KubeNodeSource::try_default()
        .await
        .context("failed to create the kubernetes client")?;

    let config = WatcherConfig::default()
        .with_max_wait(Duration::from_secs(cli.max_wait_secs))
        .with_retry_backoff(Duration::from_secs(cli.retry_secs));
    let mut watcher = ClusterWatcher::start(source, config);
    let changes = watcher
        .changes()
        .context("cluster watcher change channel unavailable")?;

    // ── Shutdown signal ─────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    // ── Sync loop ───────────────────────────────────────────────

    let driver = Driver::new(node_name, policy, ArtifactWriter::new(cli.output), notifier);
    let result = driver.run(&watcher, changes, shutdown_rx).await;

    watcher.join().await;
    info!("meshbgpd stopped");
    result
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut term) = signal(SignalKind::terminate()) {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
            return;
        }
    }
    let _ = tokio::signal::ctrl_c().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_defaults() {
        let cli = Cli::try_parse_from(["meshbgpd", "--node-name", "worker-1"]).unwrap();
        assert_eq!(cli.max_wait_secs, 60);
        assert_eq!(cli.retry_secs, 1);
    }

    #[test]
    fn zero_intervals_rejected() {
        for flag in ["--max-wait-secs", "--retry-secs"] {
            let parsed = Cli::try_parse_from(["meshbgpd", "--node-name", "worker-1", flag, "0"]);
            assert!(parsed.is_err(), "{flag} 0 was accepted");
        }
    }

    #[test]
    fn positive_intervals_accepted() {
        let cli = Cli::try_parse_from([
            "meshbgpd",
            "--node-name",
            "worker-1",
            "--max-wait-secs",
            "5",
            "--retry-secs",
            "2",
        ])
        .unwrap();
        assert_eq!(cli.max_wait_secs, 5);
        assert_eq!(cli.retry_secs, 2);
    }
}
