use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use colored::Colorize;
use eyre::{Context, Result};
use std::io::Read;
use std::path::PathBuf;
use tripledger::{DateFilter, Ledger, LedgerConfig, TripDraft, TripPatch, TripStatus, UnifiedId};

#[derive(Parser)]
#[command(name = "tripledger")]
#[command(about = "Federated trip ledger over fixed and ad-hoc trip stores")]
#[command(version)]
struct Cli {
    /// Path to a YAML config file (default: platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the data directory holding both stores
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List one page of the merged ledger
    List {
        /// Earliest transaction date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Latest transaction date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        /// Page size (default from config)
        #[arg(long)]
        limit: Option<usize>,
        /// Emit the full page as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Fetch one trip by its unified id (e.g. FT-12, AT-7)
    Get { id: String },

    /// Create a trip from a JSON draft (file or stdin); the draft's
    /// trip_type picks the store
    Create {
        /// Read the draft from this file instead of stdin
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Apply a JSON patch (file or stdin) to the trip the id names
    Update {
        id: String,
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Delete the trip the id names
    Delete { id: String },

    /// Show per-store and total record counts
    Count {
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },
}

fn main() -> Result<()> {
    // Setup tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let mut config = LedgerConfig::load(cli.config.as_deref())?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    let mut ledger = Ledger::open(&config.data_dir)?;

    match cli.command {
        Commands::List {
            from,
            to,
            offset,
            limit,
            json,
        } => {
            let filter = DateFilter::new(from, to);
            let limit = limit.unwrap_or(config.default_page_size);
            let page = ledger.list(&filter, offset, limit)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&page)?);
            } else {
                print_page(&page);
            }
        }
        Commands::Get { id } => {
            let id: UnifiedId = id.parse()?;
            match ledger.get(id)? {
                Some(view) => println!("{}", serde_json::to_string_pretty(&view)?),
                None => not_found(id),
            }
        }
        Commands::Create { file } => {
            let body = read_body(file)?;
            let draft = TripDraft::from_json(body)?;
            let view = ledger.create(draft)?;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        Commands::Update { id, file } => {
            let id: UnifiedId = id.parse()?;
            let body = read_body(file)?;
            let patch = TripPatch::from_json(id.tag, body)?;
            match ledger.update(id, patch)? {
                Some(view) => println!("{}", serde_json::to_string_pretty(&view)?),
                None => not_found(id),
            }
        }
        Commands::Delete { id } => {
            let id: UnifiedId = id.parse()?;
            if ledger.delete(id)? {
                println!("Deleted {}", id);
            } else {
                not_found(id);
            }
        }
        Commands::Count { from, to } => {
            let filter = DateFilter::new(from, to);
            let (fixed, adhoc) = ledger.counts(&filter)?;
            println!("fixed: {}", fixed);
            println!("adhoc: {}", adhoc);
            println!("total: {}", fixed + adhoc);
        }
    }

    Ok(())
}

fn read_body(file: Option<PathBuf>) -> Result<serde_json::Value> {
    let raw = match file {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };
    serde_json::from_str(&raw).context("Body is not valid JSON")
}

fn print_page(page: &tripledger::FederatedPage) {
    for tag in &page.degraded {
        eprintln!("{} {} store unavailable, results are partial", "warning:".yellow().bold(), tag);
    }

    println!(
        "{:>4}  {:<8}  {:<10}  {:<11}  {:<9}  {:>12}  {:>12}",
        "#", "id", "date", "type", "status", "freight", "balance"
    );
    for item in &page.items {
        let core = item.view.trip.core();
        let status = match core.status {
            TripStatus::Pending => "pending".yellow(),
            TripStatus::Completed => "completed".green(),
            TripStatus::Cancelled => "cancelled".red(),
        };
        println!(
            "{:>4}  {:<8}  {:<10}  {:<11}  {:<9}  {:>12}  {:>12}",
            item.display_serial,
            item.view.unified_id.to_string(),
            core.transaction_date,
            core.trip_type.as_str(),
            status,
            item.view.financials.total_freight,
            item.view.financials.balance_to_be_paid,
        );
    }
    println!(
        "showing {} of ~{} (offset {})",
        page.items.len(),
        page.total_approx,
        page.offset
    );
}

fn not_found(id: UnifiedId) {
    eprintln!("Not found: {}", id);
    std::process::exit(1);
}
