use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;

use mcstats::entities::{account, aspect, phase};
use mcstats::{
    hero_records, import_results_file, matchup_grid, phase_summaries, render_verdict, Config,
};

#[derive(Parser)]
#[command(name = "mcstats")]
#[command(version)]
#[command(about = "Marvel Champions Stats - admin tool")]
struct Args {
    /// TOML configuration file
    #[arg(long, env = "MCSTATS_CONFIG")]
    config: Option<PathBuf>,

    /// Database file (overrides the configuration file)
    #[arg(long, env = "MCSTATS_DATABASE")]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the database schema
    Init,

    /// Register an account allowed to edit
    CreateAccount {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "MCSTATS_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Add a release phase
    AddPhase { name: String },

    /// Add a deck-building aspect
    AddAspect { name: String },

    /// Import results from a CSV file (hero,villain,result)
    ImportResults { csv: PathBuf },

    /// Print the hero vs villain grid
    Grid,

    /// Print per-phase counts and hero records
    Stats,
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_target(false)
        .init();

    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(database) = args.database {
        config.database_path = database;
    }

    let conn = mcstats::open(&config.database_path)
        .with_context(|| format!("Failed to open database {:?}", config.database_path))?;

    match args.command {
        Command::Init => {
            info!(
                "Database ready at {:?} (schema version {})",
                config.database_path,
                mcstats::schema_version(&conn)?
            );
        }
        Command::CreateAccount {
            username,
            email,
            password,
        } => {
            let created = account::create(&conn, &username, &email, &password)?;
            println!("✓ Account {} created (id {})", created.username, created.id);
        }
        Command::AddPhase { name } => {
            let created = phase::create(&conn, &name)?;
            println!("✓ Phase '{}' created (id {})", created.name, created.id);
        }
        Command::AddAspect { name } => {
            let created = aspect::create(&conn, &name)?;
            println!("✓ Aspect '{}' created (id {})", created.name, created.id);
        }
        Command::ImportResults { csv } => {
            let report = import_results_file(&conn, &csv)
                .with_context(|| format!("Failed to import {:?}", csv))?;
            println!("✓ Inserted: {} results", report.inserted);
            println!("✓ Skipped duplicates: {}", report.duplicates);
            for rejected in &report.rejected {
                println!("✗ line {}: {}", rejected.line, rejected.reason);
            }
        }
        Command::Grid => print_grid(&conn)?,
        Command::Stats => print_stats(&conn)?,
    }

    Ok(())
}

fn print_grid(conn: &rusqlite::Connection) -> Result<()> {
    let grid = matchup_grid(conn)?;

    print!("{:<20}", "");
    for villain in &grid.villains {
        print!(" {:>3}", villain.id);
    }
    println!();

    for row in &grid.rows {
        print!("{:<20}", row.hero.name);
        for cell in &row.cells {
            print!(" {:>3}", render_verdict(*cell).symbol());
        }
        println!();
    }

    println!();
    for villain in &grid.villains {
        println!("{:>3} {}", villain.id, villain.name);
    }
    Ok(())
}

fn print_stats(conn: &rusqlite::Connection) -> Result<()> {
    println!("Phases");
    for summary in phase_summaries(conn)? {
        println!(
            "  {:<20} {} villains, {} heroes",
            summary.phase.name, summary.villain_count, summary.hero_count
        );
    }

    println!("Heroes");
    for record in hero_records(conn)? {
        let rate = record
            .win_rate()
            .map(|r| format!("{:.0}%", r * 100.0))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<20} {}W {}L {}",
            record.name, record.wins, record.losses, rate
        );
    }
    Ok(())
}
