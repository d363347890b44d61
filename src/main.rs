use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::sync::Arc;
use tutorpay::application::locks::KeyedLocks;
use tutorpay::application::payouts::PayoutService;
use tutorpay::application::settlement::SettlementOrchestrator;
use tutorpay::config::SettlementConfig;
use tutorpay::domain::ports::{
    BalanceStore, BalanceStoreBox, LedgerStoreBox, PayoutStoreBox, SessionStoreBox,
};
use tutorpay::infrastructure::gateway::ScriptedVerifier;
use tutorpay::infrastructure::in_memory::{
    InMemoryBalanceStore, InMemoryLedgerStore, InMemoryPayoutStore, InMemorySessionStore,
};
use tutorpay::interfaces::replay::balance_writer::BalanceWriter;
use tutorpay::interfaces::replay::event_reader::EventReader;
use tutorpay::interfaces::replay::runner::ReplayRunner;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input replay script (one JSON event per line)
    input: PathBuf,

    /// Settlement configuration file (JSON). Defaults apply if omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[cfg(feature = "storage-rocksdb")]
    #[arg(long)]
    db_path: Option<PathBuf>,
}

/// Boxed store handles for each consumer. The concrete stores are cheap
/// clones over shared state, so every box sees the same data.
struct Stores {
    ledger: LedgerStoreBox,
    balances_settlement: BalanceStoreBox,
    balances_payouts: BalanceStoreBox,
    balances_output: BalanceStoreBox,
    payouts: PayoutStoreBox,
    sessions_settlement: SessionStoreBox,
    sessions_runner: SessionStoreBox,
}

fn in_memory_stores() -> Stores {
    let ledger = InMemoryLedgerStore::new();
    let balances = InMemoryBalanceStore::new();
    let payouts = InMemoryPayoutStore::new();
    let sessions = InMemorySessionStore::new();
    Stores {
        ledger: Box::new(ledger),
        balances_settlement: Box::new(balances.clone()),
        balances_payouts: Box::new(balances.clone()),
        balances_output: Box::new(balances),
        payouts: Box::new(payouts),
        sessions_settlement: Box::new(sessions.clone()),
        sessions_runner: Box::new(sessions),
    }
}

#[cfg(feature = "storage-rocksdb")]
fn rocksdb_stores(path: PathBuf) -> Result<Stores> {
    use tutorpay::infrastructure::rocksdb::RocksDbStore;
    let store = RocksDbStore::open(path).into_diagnostic()?;
    Ok(Stores {
        ledger: Box::new(store.clone()),
        balances_settlement: Box::new(store.clone()),
        balances_payouts: Box::new(store.clone()),
        balances_output: Box::new(store.clone()),
        payouts: Box::new(store.clone()),
        sessions_settlement: Box::new(store.clone()),
        sessions_runner: Box::new(store),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => SettlementConfig::load(path).into_diagnostic()?,
        None => SettlementConfig::default(),
    };

    #[cfg(feature = "storage-rocksdb")]
    let stores = match cli.db_path.clone() {
        Some(path) => rocksdb_stores(path)?,
        None => in_memory_stores(),
    };
    #[cfg(not(feature = "storage-rocksdb"))]
    let stores = in_memory_stores();

    let account_locks = Arc::new(KeyedLocks::new());
    let verifier = ScriptedVerifier::new();
    let settlement = SettlementOrchestrator::new(
        stores.ledger,
        stores.balances_settlement,
        stores.sessions_settlement,
        Box::new(verifier.clone()),
        config.clone(),
        Arc::clone(&account_locks),
    );
    let payout_service = PayoutService::new(
        stores.payouts,
        stores.balances_payouts,
        config,
        account_locks,
    );

    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = EventReader::new(BufReader::new(file));
    let mut runner = ReplayRunner::new(settlement, payout_service, stores.sessions_runner, verifier);
    let summary = runner.run(reader).await.into_diagnostic()?;
    tracing::info!(applied = summary.applied, failed = summary.failed, "replay finished");

    let accounts = stores.balances_output.get_all().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = BalanceWriter::new(stdout.lock());
    writer.write_accounts(accounts).into_diagnostic()?;

    Ok(())
}
