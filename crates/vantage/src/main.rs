use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vantage_models::VantageConfig;

#[derive(Parser, Debug)]
#[command(name = "vantage", about = "Multi-domain market outlook")]
struct Cli {
    /// Path to configuration file (built-in defaults when omitted)
    #[arg(short, long)]
    config: Option<String>,

    /// Investment horizon, overriding the configured one
    #[arg(long)]
    horizon: Option<String>,

    /// Skip the LLM layer; narratives become placeholders
    #[arg(long)]
    no_llm: bool,

    /// Append this run to the outlook history
    #[arg(long)]
    record: bool,

    /// Print the last N recorded runs and exit
    #[arg(long, value_name = "N")]
    history: Option<usize>,

    /// Pretty-print the output JSON
    #[arg(long)]
    pretty: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays clean JSON (respects RUST_LOG)
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    }

    let config = match &cli.config {
        Some(path) => vantage::load_config(path)?,
        None => VantageConfig::default(),
    };

    let reader = vantage::open_reader(&config.cache)?;

    if let Some(limit) = cli.history {
        let rows = reader
            .recent_outlooks(limit)
            .context("Failed to read outlook history")?;
        let entries: Vec<serde_json::Value> = rows
            .into_iter()
            .map(|row| {
                serde_json::json!({
                    "id": row.id,
                    "generated_at": row.generated_at,
                    "horizon": row.horizon,
                    "composite_risk_score": row.composite_risk_score,
                    "risk_level": row.risk_level,
                    "market_label": row.market_label,
                })
            })
            .collect();
        print_json(&entries, cli.pretty)?;
        return Ok(());
    }

    let narrator = if cli.no_llm {
        info!("LLM layer disabled");
        None
    } else {
        Some(vantage::build_dispatch(&config.dispatch)?)
    };

    let horizon = cli
        .horizon
        .clone()
        .unwrap_or_else(|| config.analysis.horizon.clone());
    let orchestrator = vantage::build_orchestrator(&config, reader.clone(), narrator.clone());
    let outlook = orchestrator.run(&horizon).await;

    if cli.record {
        vantage::record_run(&reader, &outlook)?;
    }

    if let Some(narrator) = narrator {
        narrator.shutdown().await;
    }

    if outlook.domains.iter().any(|d| d.error.is_some()) {
        warn!("Some domains failed; see the outlook for details");
    }

    print_json(&outlook, cli.pretty)
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<()> {
    let output = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{output}");
    Ok(())
}
