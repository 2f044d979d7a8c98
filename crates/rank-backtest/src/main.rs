use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use backtest_engine::{compare_presets, BacktestResult, BacktestSimulator, EngineConfig};

mod scenario;

use scenario::Scenario;

fn init_tracing() {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    // Logs go to stderr so stdout stays valid JSON
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter())
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(std::io::stderr)
            .init();
    }
}

fn usage() {
    eprintln!("Usage:");
    eprintln!("  rank-backtest <scenario.json>                Compare every weight preset");
    eprintln!("  rank-backtest <scenario.json> --single       Run only the configured weights");
    eprintln!("  rank-backtest <scenario.json> --out FILE     Write results to FILE instead of stdout");
    eprintln!();
    eprintln!("The scenario path may also come from RANK_SCENARIO.");
}

fn log_summary(result: &BacktestResult) {
    let s = &result.summary;
    tracing::info!(
        label = %result.label,
        cumulative_return = s.cumulative_return,
        sharpe_ratio = s.sharpe_ratio,
        max_drawdown = s.max_drawdown,
        annualized_volatility = s.annualized_volatility,
        trading_days = s.trading_days,
        no_overlap_days = s.no_overlap_days,
        total_transaction_cost = s.total_transaction_cost,
        "Backtest summary"
    );
    if let Some(excess) = s.excess_return {
        tracing::info!(label = %result.label, excess_return = excess, "Versus equal-weight benchmark");
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    std::panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
        tracing::error!("PANIC: {info}");
    }));

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        usage();
        return Ok(());
    }
    let single = args.iter().any(|a| a == "--single");
    let out: Option<PathBuf> = args
        .iter()
        .position(|a| a == "--out")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from);

    let scenario_path = match args
        .iter()
        .skip(1)
        .find(|a| !a.starts_with("--") && Some(a.as_str()) != out.as_ref().and_then(|p| p.to_str()))
        .cloned()
        .or_else(|| std::env::var("RANK_SCENARIO").ok())
    {
        Some(p) => PathBuf::from(p),
        None => {
            usage();
            bail!("No scenario given");
        }
    };

    let env_config = EngineConfig::from_env()?;
    let inputs = Scenario::load(&scenario_path)?.into_inputs(env_config)?;
    tracing::info!(
        top_n = inputs.config.top_n,
        allocation = %inputs.config.allocation,
        weights = %inputs.config.weights.label(),
        transaction_cost = inputs.config.transaction_cost_rate,
        "Configuration loaded and validated"
    );

    let report = if single {
        let result = BacktestSimulator::new(inputs.config.clone())?.run(
            &inputs.schedule,
            &inputs.source,
            &inputs.prices,
            &inputs.graph,
        )?;
        log_summary(&result);
        serde_json::to_string_pretty(&result)?
    } else {
        let results = compare_presets(
            &inputs.config,
            &inputs.schedule,
            &inputs.source,
            &inputs.prices,
            &inputs.graph,
        )?;
        for result in results.values() {
            log_summary(result);
        }
        let by_name: std::collections::BTreeMap<&str, &BacktestResult> =
            results.iter().map(|(p, r)| (p.name(), r)).collect();
        serde_json::to_string_pretty(&by_name)?
    };

    match out {
        Some(path) => {
            std::fs::write(&path, report)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "Results written");
        }
        None => println!("{report}"),
    }
    Ok(())
}
