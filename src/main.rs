// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use member_registry::{
    count_members, import_members, is_valid_sa_cellphone, list_members, seed_admin_user,
    seed_members, setup_database, Config, IdentityNumber, MemberFactory, MemberQuery,
    MemberStatus,
};

#[derive(Parser)]
#[command(name = "member-registry", version, about = "South African member registry")]
struct Cli {
    /// SQLite database file (overrides MEMBER_REGISTRY_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Create the database schema
    Init,
    /// Add the sample members, random members and the admin account
    Seed {
        /// Random members on top of the ten samples
        #[arg(long)]
        count: Option<usize>,
    },
    /// Register members from a CSV file
    Import { csv: PathBuf },
    /// Validate an ID number and show what it encodes
    CheckId { id_number: String },
    /// Validate a cellphone number
    CheckCellphone { cellphone: String },
    /// Print members, newest first
    List {
        /// ID number or member number contains
        #[arg(long)]
        search: Option<String>,
        /// Cellphone contains
        #[arg(long)]
        cellphone: Option<String>,
        #[arg(long)]
        status: Option<MemberStatus>,
    },
    /// Terminal member browser (default)
    Ui,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("member_registry=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(db) = cli.db {
        config.database_path = db;
    }
    let today = Local::now().date_naive();

    match cli.command.unwrap_or(Command::Ui) {
        Command::Init => run_init(&config),
        Command::Seed { count } => {
            if let Some(count) = count {
                config.seed_random_members = count;
            }
            run_seed(&config, today)
        }
        Command::Import { csv } => run_import(&config, &csv, today),
        Command::CheckId { id_number } => {
            run_check_id(&id_number, today);
            Ok(())
        }
        Command::CheckCellphone { cellphone } => {
            run_check_cellphone(&cellphone);
            Ok(())
        }
        Command::List {
            search,
            cellphone,
            status,
        } => {
            let query = MemberQuery::new()
                .search(search.as_deref())
                .cellphone(cellphone.as_deref())
                .status(status);
            run_list(&config, &query)
        }
        Command::Ui => run_ui_mode(&config, today),
    }
}

fn open_database(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    setup_database(&conn).context("Failed to set up database schema")?;
    Ok(conn)
}

fn run_init(config: &Config) -> Result<()> {
    println!("🔧 Setting up database...");
    let conn = open_database(&config.database_path)?;
    println!("✓ Database initialized with WAL mode: {}", config.database_path.display());
    println!("✓ Members on record: {}", count_members(&conn)?);
    Ok(())
}

fn run_seed(config: &Config, today: NaiveDate) -> Result<()> {
    println!("🌱 Seeding {}", config.database_path.display());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let conn = open_database(&config.database_path)?;
    let mut factory = MemberFactory::new();
    let summary = seed_members(&conn, config, today, &mut factory)?;

    println!("✓ Sample members inserted: {}", summary.samples_inserted);
    println!("✓ Sample members already present: {}", summary.samples_skipped);
    println!("✓ Random members inserted: {}", summary.random_inserted);
    if summary.random_rejected > 0 {
        println!("⚠ Random members skipped (duplicates): {}", summary.random_rejected);
    }

    let created = seed_admin_user(&conn, config)?;
    println!(
        "✓ Admin user {}: {}",
        if created { "created" } else { "refreshed" },
        config.admin_email
    );
    println!("✓ Database contains {} members", count_members(&conn)?);
    Ok(())
}

fn run_import(config: &Config, csv: &Path, today: NaiveDate) -> Result<()> {
    println!("📂 Importing {}", csv.display());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let conn = open_database(&config.database_path)?;
    let summary = import_members(&conn, csv, today, config)?;

    println!("✓ Inserted: {} members", summary.inserted);
    println!("✓ Rejected: {} rows", summary.rejected.len());
    for row in &summary.rejected {
        println!("   line {}: {}", row.line, row.reason);
    }
    println!("✓ Database contains {} members", count_members(&conn)?);
    Ok(())
}

fn run_check_id(id_number: &str, today: NaiveDate) {
    match IdentityNumber::parse(id_number, today) {
        Ok(id) => {
            println!("✅ {} is a valid South African ID number", id);
            println!("   Date of birth: {}", id.birth_date().format("%Y-%m-%d"));
            println!("   Gender:        {}", id.gender().as_str());
            println!("   Citizenship:   {}", id.citizenship().as_str());
        }
        Err(err) => println!("❌ {} is not valid: {}", id_number, err),
    }
}

fn run_check_cellphone(cellphone: &str) {
    if is_valid_sa_cellphone(cellphone) {
        println!("✅ {} is a valid South African cellphone number", cellphone);
    } else {
        println!("❌ {} is not a valid South African cellphone number", cellphone);
    }
}

fn run_list(config: &Config, query: &MemberQuery) -> Result<()> {
    let conn = open_database(&config.database_path)?;
    let members = list_members(&conn, query)?;

    println!(
        "{:<9} {:<28} {:<14} {:<13} {:<10}",
        "Member #", "Name", "ID Number", "Cellphone", "Status"
    );
    for member in &members {
        println!(
            "{:<9} {:<28} {:<14} {:<13} {:<10}",
            member.member_number,
            member.full_name(),
            member.id_number,
            member.cellphone,
            member.status.label()
        );
    }
    println!("\n{} member(s)", members.len());
    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: &Config, today: NaiveDate) -> Result<()> {
    println!("🖥️  Loading member registry...\n");

    let conn = open_database(&config.database_path)?;
    let members = list_members(&conn, &MemberQuery::new())?;
    let total_count = count_members(&conn)?;

    println!("✓ Loaded {} members", members.len());
    println!("Starting UI... (Press 'q' to quit)\n");

    let mut app = ui::App::new(members, total_count, today);
    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &Config, _today: NaiveDate) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the REST API: cargo run --bin member-server --features server");
    std::process::exit(1);
}
