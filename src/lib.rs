// Marvel Champions Stats - Core Library
// Exposes all modules for use in the CLI, the API server, and tests

pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod import;
pub mod matchups;
#[cfg(feature = "server")]
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use db::{open, open_in_memory, schema_version, setup_database, SCHEMA_VERSION};
pub use entities::{
    Account, Aspect, Hero, HeroForm, MatchResult, Phase, ResultForm, Verdict, Villain,
    VillainForm,
};
pub use error::{ConfigError, StoreError, Violation};
pub use import::{import_results, import_results_file, ImportReport, Rejected};
pub use matchups::{
    hero_records, lookup_verdict, matchup_grid, phase_summaries, render_verdict, villain_count,
    villain_records, Marker, MatchupGrid, PhaseSummary, Record,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
