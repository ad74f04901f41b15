use anyhow::{bail, Context};
use chrono::{Duration, Utc};
use mm_analytics::orderbook::types::EvaluationWindow;
use mm_analytics::report::{evaluate_batch, BatchOutcome, EvaluationRequest};
use mm_analytics::store::FactBundle;
use mm_analytics::venue::{collect_once, VenueRegistry};
use mm_analytics::{AnalyticsConfig, EvaluationContext, MMReport, MemoryFactStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Json,
    Markdown,
}

#[derive(Debug)]
struct Options {
    input: Option<PathBuf>,
    live: bool,
    schema: bool,
    format: OutputFormat,
    venue: Option<String>,
    instrument: Option<String>,
    window_mins: Option<i64>,
    samples: usize,
    interval_secs: u64,
    depth: usize,
    trade_limit: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            input: None,
            live: false,
            schema: false,
            format: OutputFormat::Json,
            venue: None,
            instrument: None,
            window_mins: None,
            samples: 5,
            interval_secs: 60,
            depth: 100,
            trade_limit: 500,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let options = parse_args(&args)?;

    // Reports go to stdout, logs to stderr
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    if options.schema {
        println!("{}", serde_json::to_string_pretty(&MMReport::json_schema())?);
        return Ok(());
    }

    let config = AnalyticsConfig::from_env().context("Failed to load configuration")?;

    let (store, requests) = match (&options.input, options.live) {
        (Some(path), false) => load_bundle(path, &options)?,
        (None, true) => collect_live(&config, &options).await?,
        _ => {
            print_usage();
            bail!("exactly one of --input or --live is required");
        }
    };

    if requests.is_empty() {
        tracing::warn!("Nothing to evaluate");
        return Ok(());
    }

    let ctx = Arc::new(EvaluationContext::new(config, Arc::new(store))?);
    let outcomes = evaluate_batch(ctx, requests).await;
    print_outcomes(&outcomes, options.format)?;

    Ok(())
}

/// Load a fact bundle and build one request per (venue, instrument) it holds
fn load_bundle(
    path: &Path,
    options: &Options,
) -> anyhow::Result<(MemoryFactStore, Vec<EvaluationRequest>)> {
    let bundle = FactBundle::from_path(path)?;
    let Some(span) = bundle.span() else {
        tracing::warn!(path = %path.display(), "Fact bundle is empty");
        return Ok((MemoryFactStore::new(), Vec::new()));
    };

    let window = match options.window_mins {
        Some(mins) => EvaluationWindow::trailing(Duration::minutes(mins), span.end),
        None => span,
    };

    let store = MemoryFactStore::from_bundle(bundle);
    let requests = store
        .pairs()
        .into_iter()
        .filter(|(venue, instrument)| matches_filter(venue, instrument, options))
        .map(|(venue, instrument)| EvaluationRequest::new(&venue, &instrument, window))
        .collect();

    tracing::info!(path = %path.display(), start = %window.start, end = %window.end, "Loaded fact bundle");
    Ok((store, requests))
}

/// Sample every configured venue, then evaluate the sampled period
async fn collect_live(
    config: &AnalyticsConfig,
    options: &Options,
) -> anyhow::Result<(MemoryFactStore, Vec<EvaluationRequest>)> {
    let registry = VenueRegistry::from_config(config)?;
    if registry.is_empty() {
        bail!("no configured venue has an adapter; check MM_VENUES");
    }

    let instrument = options
        .instrument
        .clone()
        .or_else(|| config.instruments.first().cloned())
        .context("no instrument given and MM_INSTRUMENTS is empty")?
        .to_uppercase();

    let store = MemoryFactStore::new();
    let started = Utc::now();
    let interval = std::time::Duration::from_secs(options.interval_secs);

    for sample in 1..=options.samples {
        let summary =
            collect_once(&registry, &store, &instrument, options.depth, options.trade_limit).await;
        tracing::info!(
            sample,
            samples = options.samples,
            snapshots = summary.snapshots,
            trades = summary.trades,
            failures = summary.failures,
            "Collected sample"
        );

        if sample == options.samples {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, evaluating samples collected so far");
                break;
            }
        }
    }

    let end = Utc::now();
    let window = match options.window_mins {
        Some(mins) => EvaluationWindow::trailing(Duration::minutes(mins), end),
        None => EvaluationWindow::new(started - Duration::seconds(1), end)?,
    };

    let requests = registry
        .venues()
        .into_iter()
        .filter(|venue| matches_filter(venue, &instrument, options))
        .map(|venue| EvaluationRequest::new(venue, &instrument, window))
        .collect();

    Ok((store, requests))
}

fn matches_filter(venue: &str, instrument: &str, options: &Options) -> bool {
    options.venue.as_deref().map_or(true, |v| v == venue)
        && options
            .instrument
            .as_deref()
            .map_or(true, |i| i.eq_ignore_ascii_case(instrument))
}

fn print_outcomes(outcomes: &[BatchOutcome], format: OutputFormat) -> anyhow::Result<()> {
    let mut reports = Vec::new();

    for outcome in outcomes {
        match &outcome.result {
            Ok(report) => reports.push(report),
            Err(e) => tracing::error!(
                venue = %outcome.request.venue,
                instrument = %outcome.request.instrument,
                error_type = e.error_type(),
                error = %e,
                "Evaluation rejected"
            ),
        }
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        OutputFormat::Markdown => {
            for report in reports {
                println!("{}", report.to_markdown());
            }
        }
    }

    Ok(())
}

/// Parse command-line arguments
fn parse_args(args: &[String]) -> anyhow::Result<Options> {
    let mut options = Options::default();

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        let mut value = || -> anyhow::Result<String> {
            i += 1;
            args.get(i)
                .cloned()
                .with_context(|| format!("{} requires a value", flag))
        };

        match flag {
            "--input" => options.input = Some(PathBuf::from(value()?)),
            "--live" => options.live = true,
            "--schema" => options.schema = true,
            "--format" => {
                options.format = match value()?.as_str() {
                    "json" => OutputFormat::Json,
                    "markdown" | "md" => OutputFormat::Markdown,
                    other => bail!("unknown format '{}', expected json or markdown", other),
                }
            }
            "--venue" => options.venue = Some(value()?),
            "--instrument" => options.instrument = Some(value()?),
            "--window-mins" => {
                options.window_mins = Some(value()?.parse().context("--window-mins")?)
            }
            "--samples" => options.samples = value()?.parse().context("--samples")?,
            "--interval-secs" => {
                options.interval_secs = value()?.parse().context("--interval-secs")?
            }
            "--depth" => options.depth = value()?.parse().context("--depth")?,
            "--trade-limit" => options.trade_limit = value()?.parse().context("--trade-limit")?,
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            _ => {
                print_usage();
                bail!("unknown argument: {}", flag);
            }
        }
        i += 1;
    }

    if options.samples == 0 {
        bail!("--samples must be at least 1");
    }

    Ok(options)
}

/// Print usage information
fn print_usage() {
    println!("mm-analytics - order book analytics and market-maker detection");
    println!();
    println!("USAGE:");
    println!("    mm-analytics --input <FILE> [OPTIONS]");
    println!("    mm-analytics --live [OPTIONS]");
    println!("    mm-analytics --schema");
    println!();
    println!("OPTIONS:");
    println!("    --input <FILE>          Evaluate a JSON fact bundle {{\"snapshots\": [...], \"trades\": [...]}}");
    println!("    --live                  Sample configured venues over REST, then evaluate");
    println!("    --schema                Print the JSON Schema of the report and exit");
    println!("    --format <FORMAT>       Output format: json or markdown (default: json)");
    println!("    --venue <VENUE>         Only evaluate this venue");
    println!("    --instrument <SYMBOL>   Only evaluate this instrument");
    println!("    --window-mins <N>       Trailing window length (default: whole bundle / sampled period)");
    println!("    --samples <N>           Live samples to collect (default: 5)");
    println!("    --interval-secs <N>     Seconds between live samples (default: 60)");
    println!("    --depth <N>             Order book levels per side to fetch (default: 100)");
    println!("    --trade-limit <N>       Recent trades to fetch per sample (default: 500)");
    println!("    --help, -h              Print this help message");
    println!();
    println!("ENVIRONMENT VARIABLES:");
    println!("    MM_VENUES               Recognised venue ids (default: binance_spot,binance_perps,bitget,gate,kucoin)");
    println!("    MM_INSTRUMENTS          Recognised instruments (default: BTCUSDT)");
    println!("    MM_EVALUATION_TIMEOUT_MS  Per-pair evaluation budget (default: 2000)");
    println!("    MM_WORKER_THREADS       Concurrent evaluations (default: CPU cores)");
    println!("    RUST_LOG                Logging level (default: info)");
    println!();
    println!("EXAMPLES:");
    println!("    # Markdown report for one venue from a recorded bundle");
    println!("    mm-analytics --input facts.json --venue gate --format markdown");
    println!();
    println!("    # Sample Binance spot and perps for 10 minutes");
    println!("    MM_VENUES=binance_spot,binance_perps mm-analytics --live --samples 10");
}
