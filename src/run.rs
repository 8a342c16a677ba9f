//! Application execution logic.
//!
//! This module wires the reader, poller, state store and metrics endpoint
//! together and runs them until a shutdown signal arrives.

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use netif_exporter::config::ValidatedConfig;
use netif_exporter::metrics::{MetricsError, MetricsRegistry};
use netif_exporter::monitor::{CycleReport, MonitorError, Poller, PrefixWatch};
use netif_exporter::network::filter::{FilterChain, FilteredReader, InterfaceFilter};
use netif_exporter::network::platform::PlatformReader;
use netif_exporter::network::{Snapshot, SnapshotReader};
use netif_exporter::server::{self, ServerState};
use netif_exporter::state::{FileStateStore, LoadResult, StateStore};
use netif_exporter::time::Clock;

/// Type alias for the application's filtered reader.
type AppReader = FilteredReader<PlatformReader, FilterChain>;

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;

/// Error type for runtime execution failures.
#[derive(Debug, Error)]
pub enum RunError {
    /// Failed to register the metric families.
    #[error("Failed to create metrics registry: {0}")]
    Registry(#[source] MetricsError),

    /// The first capture failed, so there is nothing to export.
    #[error("Failed to capture initial interface state: {0}")]
    InitialCapture(#[source] MonitorError),

    /// Failed to bind the metrics endpoint.
    #[error("Failed to start metrics endpoint: {0}")]
    Bind(#[source] MetricsError),

    /// The metrics endpoint failed while serving.
    #[error("Metrics endpoint failed: {0}")]
    Server(#[source] MetricsError),

    /// The metrics endpoint returned without being asked to stop.
    #[error("Metrics endpoint stopped unexpectedly")]
    ServerStopped,

    /// The metrics endpoint task panicked or was cancelled.
    #[error("Metrics endpoint task failed: {0}")]
    ServerTask(String),
}

/// Runtime options extracted from validated config.
///
/// This struct holds only the fields needed for the run loop,
/// allowing the config's `filter` field to be moved separately.
struct RuntimeOptions {
    poll_interval: Duration,
    read_timeout: Duration,
    listen: SocketAddr,
    metrics_path: String,
    prefix_watches: Vec<PrefixWatch>,
    state_file: Option<PathBuf>,
}

impl From<&ValidatedConfig> for RuntimeOptions {
    fn from(config: &ValidatedConfig) -> Self {
        Self {
            poll_interval: config.poll_interval,
            read_timeout: config.read_timeout,
            listen: config.listen,
            metrics_path: config.metrics_path.clone(),
            prefix_watches: config.prefix_watches.clone(),
            state_file: config.state_file.clone(),
        }
    }
}

/// Executes the main application loop.
///
/// This function:
/// 1. Creates the registry and the filtered platform reader
/// 2. Restores the previous snapshot (if a state file is configured)
/// 3. Runs the first poll cycle, which must succeed
/// 4. Binds the metrics endpoint
/// 5. Polls and serves until shutdown signal (Ctrl+C / SIGTERM)
///
/// # Errors
///
/// Returns an error if:
/// - The initial capture fails
/// - The listen address cannot be bound
/// - The endpoint stops on its own
///
/// # Coverage Note
///
/// This function is excluded from coverage because it requires:
/// - Platform-specific network APIs
/// - Real async runtime with signal handling
#[cfg(not(tarpaulin_include))]
pub async fn execute(config: ValidatedConfig) -> Result<(), RunError> {
    // Extract runtime options before consuming config fields
    let options = RuntimeOptions::from(&config);

    let registry = Arc::new(MetricsRegistry::new().map_err(RunError::Registry)?);

    // Create the reader with filters (consumes config.filter)
    let reader: AppReader = FilteredReader::new(PlatformReader::new(), config.filter);

    let store = options.state_file.as_ref().map(FileStateStore::new);
    if let Some(ref store) = store {
        tracing::info!("State persistence enabled: {}", store.path().display());
    }

    let mut poller = build_poller(reader, Arc::clone(&registry), &options, store.as_ref());
    initial_cycle(&mut poller, store.as_ref()).await?;

    let listener = server::bind(options.listen).await.map_err(RunError::Bind)?;
    tracing::info!(
        "Polling every {}s (read timeout {}ms)",
        options.poll_interval.as_secs(),
        options.read_timeout.as_millis()
    );

    run(
        poller,
        registry,
        listener,
        &options.metrics_path,
        store.as_ref(),
        shutdown_signal(),
    )
    .await
}

/// Creates the poller, seeding it from the state store when one is given.
fn build_poller<R, F, S>(
    reader: FilteredReader<R, F>,
    registry: Arc<MetricsRegistry>,
    options: &RuntimeOptions,
    store: Option<&S>,
) -> Poller<FilteredReader<R, F>>
where
    R: SnapshotReader + 'static,
    F: InterfaceFilter + 'static,
    S: StateStore,
{
    let baseline = store.and_then(|s| load_baseline(s, reader.filter()));

    let poller = Poller::new(reader, registry, options.poll_interval)
        .with_read_timeout(options.read_timeout)
        .with_prefix_watches(options.prefix_watches.clone());

    match baseline {
        Some(snapshot) => poller.with_baseline(snapshot),
        None => poller,
    }
}

/// Loads the saved snapshot and drops interfaces the current filter rejects.
fn load_baseline(store: &impl StateStore, filter: &impl InterfaceFilter) -> Option<Snapshot> {
    match store.load() {
        LoadResult::Loaded(saved) => {
            let baseline = saved.retain(|iface| filter.matches(iface));
            tracing::info!(
                "Restored previous state with {} interface(s)",
                baseline.len()
            );
            Some(baseline)
        }
        LoadResult::NotFound => {
            tracing::info!("No previous state found, starting fresh");
            None
        }
        LoadResult::Corrupted { reason } => {
            tracing::warn!("State file corrupted ({reason}), will overwrite on next save");
            None
        }
    }
}

/// Runs the first cycle; its failure aborts startup.
async fn initial_cycle<R, C, S>(
    poller: &mut Poller<R, C>,
    store: Option<&S>,
) -> Result<(), RunError>
where
    R: SnapshotReader + 'static,
    C: Clock,
    S: StateStore,
{
    let report = poller.run_cycle().await.map_err(RunError::InitialCapture)?;
    tracing::info!(
        "Initial capture: {} interface(s), {} change(s)",
        report.snapshot.len(),
        report.events
    );
    save_if_changed(store, &report).await;
    Ok(())
}

/// Serves the endpoint and polls until `shutdown` completes.
async fn run<R, C, S, F>(
    poller: Poller<R, C>,
    registry: Arc<MetricsRegistry>,
    listener: TcpListener,
    metrics_path: &str,
    store: Option<&S>,
    shutdown: F,
) -> Result<(), RunError>
where
    R: SnapshotReader + 'static,
    C: Clock,
    S: StateStore,
    F: Future<Output = ()>,
{
    let state = ServerState::new(registry, poller.subscribe());
    let app = server::router(state, metrics_path);
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let mut server = tokio::spawn(server::serve(listener, app, async move {
        let _ = stop_rx.await;
    }));

    let result = poll_until_shutdown(poller, store, &mut server, shutdown).await;

    // The handle is already consumed when the server ended the loop.
    if result.is_ok() {
        let _ = stop_tx.send(());
        match server.await {
            Ok(Ok(())) => tracing::debug!("Metrics endpoint stopped"),
            Ok(Err(e)) => tracing::error!("Metrics endpoint failed during shutdown: {e}"),
            Err(e) => tracing::error!("Metrics endpoint task failed during shutdown: {e}"),
        }
    }

    result
}

async fn poll_until_shutdown<R, C, S, F>(
    mut poller: Poller<R, C>,
    store: Option<&S>,
    server: &mut JoinHandle<Result<(), MetricsError>>,
    shutdown: F,
) -> Result<(), RunError>
where
    R: SnapshotReader + 'static,
    C: Clock,
    S: StateStore,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;

            () = &mut shutdown => {
                tracing::info!("Shutdown signal received, stopping...");
                return Ok(());
            }

            result = &mut *server => {
                return match result {
                    Ok(Ok(())) => Err(RunError::ServerStopped),
                    Ok(Err(e)) => Err(RunError::Server(e)),
                    Err(e) => Err(RunError::ServerTask(e.to_string())),
                };
            }

            // Failures are logged and counted by the poller.
            cycle = poller.next_cycle() => {
                if let Ok(report) = cycle {
                    save_if_changed(store, &report).await;
                }
            }
        }
    }
}

/// Persists the cycle's snapshot if it changed anything.
async fn save_if_changed<S: StateStore>(store: Option<&S>, report: &CycleReport) {
    let Some(store) = store else {
        return;
    };
    if !report.has_changes() {
        return;
    }
    if let Err(e) = store.save(&report.snapshot).await {
        tracing::error!("Failed to save state: {e}");
    }
}

/// Returns a future that completes when a shutdown signal is received.
///
/// Excluded from coverage - requires OS signal handling.
#[cfg(not(tarpaulin_include))]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
