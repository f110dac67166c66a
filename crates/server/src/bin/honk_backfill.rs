//! Honking version cache backfill.
//!
//! Recomputes the denormalized honking caches from the vote ledger, or with
//! `--verify-only` just reports how many songs have drifted. Run it after
//! the migration that adds the cache columns, or whenever drift is
//! suspected. Exits non-zero when inconsistencies remain.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use honk_common::Config;
use honk_common::config::{DatabaseConfig, ServerConfig};
use honk_core::{BackfillMode, HonkingCacheService};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "honk-backfill")]
#[command(about = "Backfill the honking version cache")]
#[command(version)]
struct Cli {
    /// Only verify consistency without making changes
    #[arg(long, conflicts_with = "fix")]
    verify_only: bool,

    /// Fix inconsistencies (alias for the default backfill)
    #[arg(long)]
    fix: bool,

    /// Database URL (overrides configuration)
    #[arg(long, env = "HONK__DATABASE__URL")]
    database_url: Option<String>,
}

impl Cli {
    const fn mode(&self) -> BackfillMode {
        if self.verify_only {
            BackfillMode::VerifyOnly
        } else {
            BackfillMode::Backfill
        }
    }

    fn config(&self) -> anyhow::Result<Config> {
        match &self.database_url {
            Some(url) => Ok(Config {
                server: ServerConfig::default(),
                database: DatabaseConfig::from_url(url.clone()),
            }),
            None => Config::load().context("Failed to load configuration"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let mode = cli.mode();
    let config = cli.config()?;

    info!(mode = %mode, fix = cli.fix, "Honking version cache backfill");

    let db = honk_db::init(&config).await?;
    honk_db::migrate(&db).await?;

    let report = HonkingCacheService::new(Arc::new(db))
        .run_backfill(mode)
        .await?;

    println!("{report}");

    if report.is_consistent() {
        info!("Cache backfill successful");
        Ok(ExitCode::SUCCESS)
    } else {
        error!(
            remaining = report.final_inconsistencies,
            "Cache backfill completed with warnings"
        );
        Ok(ExitCode::FAILURE)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_mode_is_backfill() {
        let cli = Cli::try_parse_from(["honk-backfill"]).unwrap();
        assert_eq!(cli.mode(), BackfillMode::Backfill);

        let cli = Cli::try_parse_from(["honk-backfill", "--fix"]).unwrap();
        assert_eq!(cli.mode(), BackfillMode::Backfill);
    }

    #[test]
    fn test_verify_only_mode() {
        let cli = Cli::try_parse_from(["honk-backfill", "--verify-only"])
            .unwrap();
        assert_eq!(cli.mode(), BackfillMode::VerifyOnly);
    }

    #[test]
    fn test_verify_only_conflicts_with_fix() {
        assert!(Cli::try_parse_from(["honk-backfill", "--verify-only", "--fix"]).is_err());
    }

    #[test]
    fn test_database_url_overrides_config() {
        let cli = Cli::try_parse_from(["honk-backfill", "--database-url", "sqlite::memory:"])
            .unwrap();
        let config = cli.config().unwrap();
        assert_eq!(config.database.url, "sqlite::memory:");
    }
}
