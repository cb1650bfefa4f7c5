//! Train a population in the Target Practice arena
//!
//! # Usage
//!
//! ```bash
//! cargo run --release --bin arena_train -- --generations 20
//! cargo run --release --bin arena_train -- --config arena.json --report reports.json
//! ```
//!
//! Without `--config` the default engine configuration is used with the
//! observation size set for the arena.

use anyhow::{Context, Result};
use arena_rl::{
    config::EngineConfig,
    env::{target_practice::OBSERVATION_SIZE, TargetPractice},
    evolution::GenerationOutcome,
    runner::ArenaRunner,
};

struct Args {
    config: Option<String>,
    generations: usize,
    report: Option<String>,
}

fn parse_args() -> Result<Args> {
    let mut args = Args { config: None, generations: 10, report: None };
    let mut iter = std::env::args().skip(1);

    while let Some(flag) = iter.next() {
        match flag.as_str() {
            "--config" => args.config = iter.next(),
            "--report" => args.report = iter.next(),
            "--generations" => {
                let value = iter.next().context("--generations needs a value")?;
                args.generations = value.parse().context("--generations must be a number")?;
            }
            other => anyhow::bail!("unknown argument: {}", other),
        }
    }
    Ok(args)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let args = parse_args()?;
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::new(),
    };
    if config.input_size != OBSERVATION_SIZE {
        tracing::info!(
            "Overriding input_size {} with the arena's observation size {}",
            config.input_size,
            OBSERVATION_SIZE
        );
        config.input_size = OBSERVATION_SIZE;
    }

    tracing::info!("Starting Target Practice training");
    tracing::info!("  Network: {:?}", config.network);
    tracing::info!("  Population: {}", config.population_size);
    tracing::info!("  Generations: {}", args.generations);
    tracing::info!("  Checkpoints: {}", config.checkpoint_dir.display());

    let arena = TargetPractice::new(config.population_size, config.seed);
    let mut runner = ArenaRunner::new(&config, arena)?;
    let reports = runner.run_generations(args.generations)?;

    let evolved = reports
        .iter()
        .filter(|r| matches!(r.outcome, GenerationOutcome::Evolved { .. }))
        .count();
    let best = reports.iter().map(|r| r.best_fitness).fold(f32::NEG_INFINITY, f32::max);
    tracing::info!(
        "Finished {} generations ({} evolved) | best fitness {:.3}",
        reports.len(),
        evolved,
        best
    );

    runner.save_all();
    for report in runner.controller().checkpoint_reports() {
        if let Some(error) = &report.error {
            tracing::warn!("Checkpoint {} failed: {}", report.path.display(), error);
        }
    }

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&reports)?;
        std::fs::write(path, json).with_context(|| format!("writing report to {}", path))?;
        tracing::info!("Wrote generation reports to {}", path);
    }

    Ok(())
}
