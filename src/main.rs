use billpay::application::engine::{BillEngine, EngineStores};
use billpay::infrastructure::access::PermissiveAuthorizer;
use billpay::infrastructure::audit::TracingEventSink;
use billpay::infrastructure::extraction::TextInvoiceExtractor;
use billpay::infrastructure::in_memory;
use billpay::infrastructure::processors::default_registry;
use billpay::interfaces::csv::bill_writer::BillWriter;
use billpay::interfaces::csv::operation_reader::OperationReader;
use billpay::interfaces::runner::OperationRunner;
use billpay::policy::EnginePolicy;
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input operations CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Policy overrides as a JSON file. Partial documents are fine; missing
    /// fields keep their defaults.
    #[arg(long)]
    policy: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let policy = match cli.policy {
        Some(path) => {
            let raw = std::fs::read_to_string(path).into_diagnostic()?;
            serde_json::from_str(&raw).into_diagnostic()?
        }
        None => EnginePolicy::default(),
    };

    let stores = build_stores(cli.db_path)?;
    let engine = BillEngine::new(
        stores.clone(),
        Arc::new(TextInvoiceExtractor::new()),
        default_registry(),
        Arc::new(PermissiveAuthorizer),
        Arc::new(TracingEventSink),
        policy,
    );

    // Apply operations, one row at a time
    let file = File::open(cli.input).into_diagnostic()?;
    let reader = OperationReader::new(file);
    let mut runner = OperationRunner::new(engine, stores);
    for op_result in reader.operations() {
        match op_result {
            Ok(op) => {
                if let Err(e) = runner.apply(op).await {
                    eprintln!("Error applying operation: {}", e);
                }
            }
            Err(e) => {
                eprintln!("Error reading operation: {}", e);
            }
        }
    }

    // Report final bill state
    let records = runner.summary().await?;
    let stdout = io::stdout();
    let mut writer = BillWriter::new(stdout.lock());
    writer.write_bills(records)?;

    Ok(())
}

fn build_stores(db_path: Option<PathBuf>) -> Result<EngineStores> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            let store = billpay::infrastructure::rocksdb::RocksDBStore::open(path)?;
            Ok(EngineStores {
                bills: Arc::new(store.clone()),
                vendors: Arc::new(store.clone()),
                workflows: Arc::new(store.clone()),
                approvals: Arc::new(store.clone()),
                payments: Arc::new(store),
            })
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            eprintln!(
                "Warning: --db-path requires the storage-rocksdb feature; using in-memory stores"
            );
            Ok(in_memory::engine_stores())
        }
        None => Ok(in_memory::engine_stores()),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .init();
}
