//! Riskwatch: accumulate daily risk estimates and their consensus.

use std::sync::Arc;

use chrono::NaiveDate;
use riskwatch_core::config::{parse_batch_param, parse_count_param};
use riskwatch_core::date::{parse_day, today_utc};
use riskwatch_core::RiskwatchConfig;
use riskwatch_runtime::{IntradaySampler, Orchestrator, Reconciler, Tick};
use riskwatch_store::{RunArchive, StorageBackend};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Riskwatch: daily risk estimate accumulation

Usage: riskwatch <command> [options]

Commands:
  tick     [--date D] [--batch N]            Append N runs, record an intraday sample
  ensure   [--date D] [--goal N] [--cap N]   Top up toward N runs, at most cap per call
  append   [--date D] [--count N]            Append exactly N runs
  show     [--date D]                        Reconciled daily snapshot
  runs     [--date D]                        Archived runs
  history                                    All daily snapshots
  intraday [--date D]                        Intraday series (all dates if omitted)
  help                                       Show this help message

Dates are YYYY-MM-DD (UTC, default today).";

/// `--flag value` pairs after the subcommand.
struct Flags(Vec<(String, String)>);

impl Flags {
    fn parse(args: &[String]) -> anyhow::Result<Self> {
        let mut pairs = Vec::new();
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            let name = arg
                .strip_prefix("--")
                .ok_or_else(|| anyhow::anyhow!("Unexpected argument: {}", arg))?;
            let value = iter
                .next()
                .ok_or_else(|| anyhow::anyhow!("Missing value for --{}", name))?;
            pairs.push((name.to_string(), value.clone()));
        }
        Ok(Self(pairs))
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn date(&self) -> anyhow::Result<NaiveDate> {
        match self.get("date") {
            Some(d) => Ok(parse_day(d)?),
            None => Ok(today_utc()),
        }
    }
}

fn print_ok(data: impl serde::Serialize) -> anyhow::Result<()> {
    let data = serde_json::to_value(data)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "ok": true, "data": data }))?
    );
    Ok(())
}

fn orchestrator(
    config: &RiskwatchConfig,
    store: Arc<dyn StorageBackend>,
) -> anyhow::Result<Orchestrator> {
    let estimator = riskwatch_estimator::create_estimator(&config.estimator)?;
    Ok(Orchestrator::new(store, estimator))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("help");
    if matches!(command, "help" | "--help" | "-h") {
        println!("{}", USAGE);
        return Ok(());
    }
    let flags = Flags::parse(&args[2..])?;

    let config = RiskwatchConfig::from_env()?;
    let store = riskwatch_store::create_backend(&config.storage)?;

    match command {
        "tick" => {
            let date = flags.date()?;
            let batch = parse_batch_param(flags.get("batch")).unwrap_or(config.batch);
            let orch = orchestrator(&config, store.clone())?;
            let sampler = IntradaySampler::new(store);
            let outcome = Tick::new(&orch, &sampler).run(date, batch).await?;
            info!("Tick for {} done", date);
            print_ok(outcome)
        }
        "ensure" => {
            let date = flags.date()?;
            let goal = parse_count_param(flags.get("goal")).unwrap_or(config.target_runs);
            let cap = parse_batch_param(flags.get("cap")).unwrap_or(config.batch);
            let orch = orchestrator(&config, store)?;
            let snapshot = orch.ensure_daily_with_goal(date, goal, cap).await?;
            print_ok(snapshot.summary())
        }
        "append" => {
            let date = flags.date()?;
            let count = parse_batch_param(flags.get("count")).unwrap_or(config.batch);
            let orch = orchestrator(&config, store)?;
            let snapshot = orch.append_runs(date, count).await?;
            print_ok(snapshot.summary())
        }
        "show" => {
            let date = flags.date()?;
            let reconciler =
                Reconciler::new(RunArchive::new(store)).with_model(config.estimator.model.clone());
            match reconciler.load_snapshot(date).await? {
                Some(snapshot) => print_ok(snapshot.summary()),
                None => print_ok(serde_json::Value::Null),
            }
        }
        "runs" => {
            let date = flags.date()?;
            let runs = RunArchive::new(store).list_indexed_runs(date).await?;
            let data: Vec<_> = runs
                .into_iter()
                .map(|(index, run)| json!({ "index": index, "run": run }))
                .collect();
            print_ok(data)
        }
        "history" => {
            let reconciler = Reconciler::new(RunArchive::new(store));
            print_ok(reconciler.list_history().await?)
        }
        "intraday" => {
            let sampler = IntradaySampler::new(store);
            let series = match flags.get("date") {
                Some(d) => sampler.list_for_date(parse_day(d)?).await?,
                None => sampler.list_all().await?,
            };
            print_ok(series)
        }
        other => {
            eprintln!("Unknown command: {}. Use 'riskwatch help' for usage.", other);
            std::process::exit(1);
        }
    }
}
