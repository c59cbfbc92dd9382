//! cells - drive the event mesh from the command line.
//!
//! # Configuration
//!
//! Configuration is loaded from multiple sources with priority:
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`CELLS_*`)
//! 3. Project config (`.cells/config.toml` in the project root)
//! 4. Global config (`~/.cells/config.toml`)
//! 5. Default values (lowest priority)
//!
//! # Commands
//!
//! ```text
//! cells counter --batch a,b --batch a,c,d   # counts per string, as JSON
//! cells pair --gap-ms 30 --window-ms 100    # pair or timeout event, as JSON
//! ```
//!
//! Logs go to stderr; results go to stdout.

use anyhow::{Context, Result};
use cells_event::{
    CancelContext, Event, Payload, PayloadValue, Scene, KEY_DEFAULT, TOPIC_PAIR, TOPIC_PAIR_TIMEOUT,
};
use cells_runtime::config::{CellsConfig, ConfigLoader};
use cells_runtime::{
    request_counter_results, CounterBehavior, Environment, PairBehavior, PairMatch, SceneBehavior,
};
use cells_types::CellId;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// cells - event mesh driver
#[derive(Parser, Debug)]
#[command(name = "cells")]
#[command(version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Project root directory (defaults to current directory)
    #[arg(short = 'C', long, global = true)]
    project: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Count comma separated strings and print the counters
    Counter {
        /// One batch of strings, e.g. `a,b,c`; repeatable
        #[arg(long = "batch", required = true)]
        batches: Vec<String>,
    },
    /// Send two ticks to a pair cell and print what it reports
    Pair {
        /// Delay between the two ticks
        #[arg(long, default_value_t = 0)]
        gap_ms: u64,

        /// Pair window (overrides `pair.window_ms`)
        #[arg(long)]
        window_ms: Option<u64>,
    },
}

fn load_config(args: &Args) -> Result<CellsConfig> {
    let project_root = match &args.project {
        Some(path) => path.clone(),
        None => std::env::current_dir().context("cannot resolve current directory")?,
    };
    let mut config = ConfigLoader::new()
        .with_project_root(project_root)
        .load()
        .context("config error")?;
    if args.debug {
        config.debug = true;
    }
    Ok(config)
}

fn init_tracing(config: &CellsConfig, verbose: bool) {
    let filter = if config.debug {
        EnvFilter::new("debug,tokio=warn")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .init();
}

/// Splits `a,b,,c` into `["a", "b", "c"]`.
fn split_batch(batch: &str) -> Vec<String> {
    batch
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

async fn run_counter(env: &Environment, batches: &[String]) -> Result<serde_json::Value> {
    let counter = CellId::new("counter");
    env.start_cell(counter.clone(), CounterBehavior::by_default_strings())?;

    for batch in batches {
        env.emit_new(&counter, "count", split_batch(batch))?;
    }

    let ctx = CancelContext::background();
    let counts = request_counter_results(&ctx, env, &counter, env.request_timeout()).await?;
    let sorted: BTreeMap<String, i64> = counts.into_iter().collect();
    Ok(json!(sorted))
}

async fn run_pair(env: &Environment, window: Duration, gap: Duration) -> Result<serde_json::Value> {
    let pair = CellId::new("pair");
    let observer = CellId::new("observer");
    let ticks = |event: &Event, _first: Option<&PayloadValue>| {
        if event.is_topic("tick") {
            PairMatch::Hit(event.payload().get(KEY_DEFAULT).cloned())
        } else {
            PairMatch::Miss
        }
    };
    env.start_cell(pair.clone(), PairBehavior::new(ticks, window))?;
    env.start_cell(observer.clone(), SceneBehavior::new())?;
    env.subscribe(&pair, &[observer])?;

    let scene = Arc::new(Scene::new());
    for n in 1..=2_i64 {
        if n > 1 {
            tokio::time::sleep(gap).await;
        }
        env.emit(&pair, Event::new("tick", n).with_scene(Arc::clone(&scene)))?;
    }

    let ctx =
        CancelContext::background().with_timeout(window.saturating_add(env.request_timeout()));
    let (topic, payload): (&str, Payload) = tokio::select! {
        p = scene.wait_flag(TOPIC_PAIR, Some(&ctx)) => (TOPIC_PAIR, p?),
        p = scene.wait_flag(TOPIC_PAIR_TIMEOUT, Some(&ctx)) => (TOPIC_PAIR_TIMEOUT, p?),
    };
    Ok(json!({ "topic": topic, "payload": payload.to_json() }))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    init_tracing(&config, args.verbose);
    info!(env = %config.environment.id, "starting");

    let env = Environment::from_config(&config);
    let outcome = match &args.command {
        Command::Counter { batches } => run_counter(&env, batches).await,
        Command::Pair { gap_ms, window_ms } => {
            let window = window_ms.map_or_else(|| config.pair.window(), Duration::from_millis);
            run_pair(&env, window, Duration::from_millis(*gap_ms)).await
        }
    };
    env.stop().await;

    println!("{}", serde_json::to_string_pretty(&outcome?)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_splitting() {
        assert_eq!(split_batch("a, b,,c"), vec!["a", "b", "c"]);
        assert!(split_batch(",").is_empty());
    }

    #[test]
    fn parses_counter_batches() {
        let argv = ["cells", "counter", "--batch", "a,b", "--batch", "c"];
        let args = Args::try_parse_from(argv).unwrap();
        match args.command {
            Command::Counter { batches } => assert_eq!(batches, vec!["a,b", "c"]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn counter_requires_a_batch() {
        assert!(Args::try_parse_from(["cells", "counter"]).is_err());
    }

    #[test]
    fn parses_pair_with_global_flags() {
        let argv = [
            "cells", "pair", "--gap-ms", "30", "--window-ms", "10", "-d", "-C", "/tmp",
        ];
        let args = Args::try_parse_from(argv).unwrap();
        assert!(args.debug);
        assert_eq!(args.project, Some(PathBuf::from("/tmp")));
        match args.command {
            Command::Pair { gap_ms, window_ms } => {
                assert_eq!(gap_ms, 30);
                assert_eq!(window_ms, Some(10));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[tokio::test]
    async fn counter_command_counts() {
        let env = Environment::new("cli-test");
        let batches = ["a,b".to_string(), "a".to_string()];
        let out = run_counter(&env, &batches).await.unwrap();
        env.stop().await;
        assert_eq!(out, json!({ "a": 2, "b": 1 }));
    }

    #[tokio::test]
    async fn pair_command_reports_pair_or_timeout() {
        let env = Environment::new("cli-test");
        let out = run_pair(&env, Duration::from_secs(5), Duration::ZERO)
            .await
            .unwrap();
        env.stop().await;
        assert_eq!(out["topic"], TOPIC_PAIR);

        let env = Environment::new("cli-test");
        let out = run_pair(&env, Duration::from_millis(10), Duration::from_millis(60))
            .await
            .unwrap();
        env.stop().await;
        assert_eq!(out["topic"], TOPIC_PAIR_TIMEOUT);
    }

    #[tokio::test]
    async fn huge_request_timeout_is_accepted() {
        let mut config = CellsConfig::default();
        config.timeouts.request_ms = u64::MAX;
        let env = Environment::from_config(&config);

        let out = run_pair(&env, Duration::from_secs(5), Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(out["topic"], TOPIC_PAIR);

        let out = run_counter(&env, &["a".into()]).await.unwrap();
        env.stop().await;
        assert_eq!(out, json!({ "a": 1 }));
    }
}
