use clap::Parser;
use miette::{IntoDiagnostic, Result};
use settlement_recon::application::worker::{ReconciliationWorker, WorkerConfig};
use settlement_recon::domain::ports::PaymentStoreRef;
use settlement_recon::error::ReconError;
use settlement_recon::infrastructure::in_memory::{
    InMemoryIdentityResolver, InMemoryPaymentStore, InMemoryStatusOracle, InMemoryTransferIssuer,
};
use settlement_recon::interfaces::csv::settlement_reader::{SettlementReader, SettlementRecord};
use settlement_recon::interfaces::csv::status_writer::StatusWriter;
use settlement_recon::queue::PaymentQueue;
use std::fs::File;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input settlement batch CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "RECON_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Longest wait on an empty queue, in milliseconds
    #[arg(long, env = "RECON_IDLE_BACKOFF_MS", default_value_t = 1000)]
    idle_backoff_ms: u64,

    /// Pause after each retry, in milliseconds
    #[arg(long, env = "RECON_RETRY_PAUSE_MS", default_value_t = 50)]
    retry_pause_ms: u64,

    /// Failed attempts after which a payment is dead-lettered (unbounded if omitted)
    #[arg(long, env = "RECON_MAX_ATTEMPTS")]
    max_attempts: Option<u32>,

    /// Stop reconciling after this many milliseconds
    #[arg(long, env = "RECON_RUN_FOR_MS", default_value_t = 5000)]
    run_for_ms: u64,

    /// Destination account the transfer issuer refuses (repeatable)
    #[arg(long = "reject-destination")]
    reject_destinations: Vec<String>,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .init();
}

#[cfg(feature = "storage-rocksdb")]
fn open_store(db_path: Option<PathBuf>) -> Result<PaymentStoreRef> {
    use settlement_recon::infrastructure::rocksdb::RocksDbPaymentStore;

    match db_path {
        Some(path) => Ok(Arc::new(RocksDbPaymentStore::open(path).into_diagnostic()?)),
        None => Ok(Arc::new(InMemoryPaymentStore::new())),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(db_path: Option<PathBuf>) -> Result<PaymentStoreRef> {
    if db_path.is_some() {
        warn!(
            "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to in-memory storage."
        );
    }
    Ok(Arc::new(InMemoryPaymentStore::new()))
}

/// Producer path: records the payment (keeping an existing record), publishes
/// what the gateway and identity service know, and queues it for reconciliation.
async fn submit(
    record: SettlementRecord,
    store: &PaymentStoreRef,
    oracle: &InMemoryStatusOracle,
    identity: &InMemoryIdentityResolver,
    queue: &PaymentQueue,
) -> settlement_recon::error::Result<()> {
    let payment = match store.get(&record.id).await {
        Ok(existing) => existing,
        Err(ReconError::NotFound(_)) => {
            let payment = record.to_payment()?;
            store.insert(payment.clone()).await?;
            payment
        }
        Err(e) => return Err(e),
    };

    oracle.report(record.id.clone(), record.gateway_status).await;
    if let Some(account) = record.receiver_account {
        identity.register(record.to_user_id, account).await;
    }

    queue.enqueue(payment);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let store = open_store(cli.db_path)?;
    let queue = Arc::new(PaymentQueue::new());
    let oracle = InMemoryStatusOracle::new(Arc::clone(&store));
    let identity = InMemoryIdentityResolver::new();
    let issuer = InMemoryTransferIssuer::rejecting(cli.reject_destinations);

    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = SettlementReader::new(file);
    for record in reader.records() {
        match record {
            Ok(record) => {
                if let Err(e) = submit(record, &store, &oracle, &identity, &queue).await {
                    error!(error = %e, "Error submitting payment");
                }
            }
            Err(e) => {
                error!(error = %e, "Error reading payment");
            }
        }
    }
    info!(queued = queue.len(), "Settlement batch loaded");

    let config = WorkerConfig::default()
        .with_idle_backoff(Duration::from_millis(cli.idle_backoff_ms))
        .with_retry_pause(Duration::from_millis(cli.retry_pause_ms))
        .with_max_attempts(cli.max_attempts)
        .with_stop_when_idle(true);
    let mut worker = ReconciliationWorker::new(
        Arc::clone(&queue),
        Arc::new(oracle),
        Arc::clone(&store),
        Arc::new(identity),
        Arc::new(issuer.clone()),
    )
    .with_config(config);
    let dead_letters = worker.dead_letters();

    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    let mut handle = tokio::spawn(async move { worker.start(token).await });

    tokio::select! {
        result = &mut handle => result.into_diagnostic()?,
        _ = tokio::time::sleep(Duration::from_millis(cli.run_for_ms)) => {
            info!("Run time elapsed, stopping worker");
            shutdown.cancel();
            handle.await.into_diagnostic()?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, stopping worker");
            shutdown.cancel();
            handle.await.into_diagnostic()?;
        }
    }

    info!(
        remaining = queue.len(),
        dead_lettered = dead_letters.len(),
        transfers = issuer.transfers().await.len(),
        "Reconciliation finished"
    );

    let payments = store.all().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = StatusWriter::new(stdout.lock());
    writer.write_payments(&payments).into_diagnostic()?;

    Ok(())
}
