#![forbid(unsafe_code)]

use std::env;
use std::str::FromStr;

use anyhow::Result;
use takt_sim::{CampaignConfig, run_campaign};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn init_tracing() {
    let filter = EnvFilter::try_from_env("TAKT_LOG")
        .unwrap_or_else(|_| EnvFilter::new("takt=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

fn env_override<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|raw| raw.parse().ok())
}

fn main() -> Result<()> {
    init_tracing();

    let mut config = CampaignConfig::default();
    if let Some(seeds) = env_override::<u64>("TAKT_SIM_SEEDS") {
        config.seed_range = 0..seeds;
    }
    if let Some(threads) = env_override("TAKT_SIM_THREADS") {
        config.threads = threads;
    }
    if let Some(actions) = env_override("TAKT_SIM_ACTIONS") {
        config.actions_per_thread = actions;
    }

    let report = run_campaign(&config)?;

    if env::var("TAKT_SIM_REPORT_JSON").is_ok() {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "campaign complete: seeds={} passed={} contended={} first_failure={:?}",
        report.seeds_run, report.seeds_passed, report.contended_seeds, report.first_failure
    );
    for failure in report.failures.iter().take(5) {
        println!("seed {} failed:", failure.seed);
        for violation in &failure.violations {
            println!("  {violation}");
        }
    }

    Ok(())
}
