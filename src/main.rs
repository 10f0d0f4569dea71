//! Trade signal pipeline CLI.
//!
//! Runs the strategy over a price series given on the command line, or one of
//! its building blocks in isolation.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use tradesig::analysis::TechnicalAnalyzer;
use tradesig::metrics::RiskCalculator;
use tradesig::models::{MarketObservation, TradeSide};
use tradesig::optimizer::{AssetWeightInput, WeightOptimizer};
use tradesig::trading::{
    FixedPredictor, MomentumPredictor, PredictionProvider, RiskLimits, RiskManager,
    StrategyParameters, TechnicalPredictor, TradingStrategy,
};

/// Trade signal pipeline CLI.
#[derive(Parser)]
#[command(name = "tradesig")]
#[command(about = "Turn price series into risk-checked trade signals", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full strategy over a price series
    Analyze {
        /// Asset symbol
        #[arg(short, long)]
        symbol: String,

        /// Prices, oldest first (comma separated)
        #[arg(short, long, value_delimiter = ',', required = true)]
        prices: Vec<f64>,

        /// Volume attached to every observation
        #[arg(short, long, default_value = "1000000")]
        volume: f64,

        /// Use a fixed signal for both providers (buy, sell, hold)
        #[arg(long, value_parser = parse_side)]
        signal: Option<TradeSide>,

        /// Confidence of the fixed signal
        #[arg(short, long, default_value = "0.9")]
        confidence: f64,
    },

    /// Show Fibonacci retracement levels
    Levels {
        #[arg(long)]
        high: f64,

        #[arg(long)]
        low: f64,
    },

    /// Show pivot levels, Tesla waves and harmonic pattern for a series
    Technicals {
        /// Prices, oldest first (comma separated)
        #[arg(short, long, value_delimiter = ',', required = true)]
        prices: Vec<f64>,
    },

    /// Optimize portfolio weights
    Optimize {
        /// Asset as SYMBOL:WEIGHT:RISK (repeatable)
        #[arg(short, long = "asset", value_parser = parse_asset, required = true)]
        assets: Vec<AssetWeightInput>,
    },

    /// Show risk metrics and risk level for a series
    Risk {
        /// Prices, oldest first (comma separated)
        #[arg(short, long, value_delimiter = ',', required = true)]
        prices: Vec<f64>,

        /// Latest volume
        #[arg(short, long, default_value = "0")]
        volume: f64,
    },

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Analyze {
            symbol,
            prices,
            volume,
            signal,
            confidence,
        } => {
            let params = StrategyParameters::from_env()?;
            let limits = RiskLimits::from_env()?;

            let (primary, secondary): (Arc<dyn PredictionProvider>, Arc<dyn PredictionProvider>) =
                match signal {
                    Some(side) => (
                        Arc::new(FixedPredictor::new("primary", side, confidence)),
                        Arc::new(FixedPredictor::new("secondary", side, confidence)),
                    ),
                    None => (Arc::new(MomentumPredictor), Arc::new(TechnicalPredictor)),
                };

            info!(
                symbol = %symbol,
                observations = prices.len(),
                primary = primary.name(),
                secondary = secondary.name(),
                "Analyzing series"
            );

            let strategy = TradingStrategy::new(params, limits, primary, secondary)?;
            let series = observation_series(&symbol, &prices, volume);

            match strategy.analyze(&series).await {
                Some(trade) => println!("{}", serde_json::to_string_pretty(&trade)?),
                None => println!("No trade"),
            }
        }

        Commands::Levels { high, low } => {
            let levels = TechnicalAnalyzer::fibonacci_levels(high, low)?;

            println!("\n=== Fibonacci Levels ({} - {}) ===\n", low, high);
            for (ratio, level) in tradesig::analysis::FIBONACCI_RATIOS.iter().zip(levels) {
                println!("  {:>6.1}%  {:>12.4}", ratio * 100.0, level);
            }
        }

        Commands::Technicals { prices } => {
            let series = observation_series("SERIES", &prices, 0.0);
            let snapshot = TechnicalAnalyzer::snapshot(&series)
                .context("Need at least one price")?;

            println!("\n=== Technicals ===\n");
            println!("Range:            {:.4} - {:.4}", snapshot.low, snapshot.high);
            println!("Pivot:            {:.4}", snapshot.pivots.pivot);
            println!("Support:          {:.4}", snapshot.pivots.support);
            println!("Resistance:       {:.4}", snapshot.pivots.resistance);

            println!("\nTesla Waves:");
            println!("  Primary (3):    {:.4}", snapshot.waves.primary_wave);
            println!("  Secondary (7):  {:.4}", snapshot.waves.secondary_wave);
            println!("  Tertiary (11):  {:.4}", snapshot.waves.tertiary_wave);

            match &snapshot.harmonic {
                Some(pattern) => {
                    println!("\nHarmonic Pattern:");
                    println!("  Pattern:        {}", pattern.pattern);
                    println!("  Confidence:     {:.3}", pattern.confidence);
                    println!("  Price Target:   {:.4}", pattern.price_target);
                }
                None => println!("\nHarmonic Pattern: none"),
            }
        }

        Commands::Optimize { assets } => {
            let result = WeightOptimizer::new().optimize(&assets);

            println!("\n{:<12} {:>10} {:>10}", "SYMBOL", "INPUT", "WEIGHT");
            println!("{}", "-".repeat(34));
            for (input, output) in assets.iter().zip(&result.weights) {
                println!(
                    "{:<12} {:>10.4} {:>10.4}",
                    output.symbol, input.weight, output.weight
                );
            }
            println!("\nConfidence: {:.4}", result.confidence);
            if result.fallback {
                println!("Fallback:   proportional allocation");
            }
        }

        Commands::Risk { prices, volume } => {
            let metrics = RiskCalculator::from_prices(&prices, volume);
            let mut manager = RiskManager::new(RiskLimits::from_env()?);
            let score = manager.update_risk_levels(&metrics);

            println!("\n=== Risk Metrics ===\n");
            println!("Volatility:       {:.6}", metrics.volatility);
            println!("Max Drawdown:     {:.2}%", metrics.max_drawdown * 100.0);
            println!("Momentum:         {:.6}", metrics.momentum);
            println!("Sharpe Ratio:     {:.4}", metrics.sharpe_ratio);
            println!("Win Rate:         {:.0}%", metrics.win_rate * 100.0);
            println!("Last Return:      {:.6}", metrics.last_return);
            println!("Volume:           {}", metrics.volume);
            println!("\nRisk Score:       {:.4} ({})", score, manager.risk_level());

            let limits = manager.limits();
            let flag = |breached: bool| if breached { "BREACHED" } else { "ok" };
            println!("\n=== Limits ===\n");
            println!(
                "Volatility:       {:.4} / {:.4}  {}",
                metrics.volatility,
                limits.volatility_threshold,
                flag(metrics.volatility > limits.volatility_threshold)
            );
            println!(
                "Drawdown:         {:.4} / {:.4}  {}",
                metrics.max_drawdown,
                limits.max_drawdown,
                flag(metrics.max_drawdown > limits.max_drawdown)
            );
        }

        Commands::Config => {
            let params = StrategyParameters::from_env()?;
            let limits = RiskLimits::from_env()?;

            println!("\n=== Strategy Parameters ===\n");
            println!("  Stop Loss:            {}%", params.stop_loss_multiplier * 100.0);
            println!("  Take Profit Levels:   {:?}", params.take_profit_levels);
            println!("  Min Confidence:       {}", params.min_confidence);
            println!("  Max Position Size:    ${}", params.max_position_size);
            println!("  Rebalance Interval:   {}ms", params.rebalance_interval);

            println!("\n=== Risk Limits ===\n");
            println!("  Max Drawdown:         {}%", limits.max_drawdown * 100.0);
            println!("  Max Leverage:         {}x", limits.max_leverage);
            println!("  Volatility Threshold: {}", limits.volatility_threshold);
            println!("  Max Position Size:    ${}", limits.max_position_size);
            println!("  Max Exposure:         ${}", limits.max_exposure());
            println!("  Daily Loss Limit:     ${}", limits.daily_loss_limit);
        }
    }

    Ok(())
}

/// One observation per price, one minute apart, the last one now.
fn observation_series(symbol: &str, prices: &[f64], volume: f64) -> Vec<MarketObservation> {
    let now = Utc::now();
    let last = prices.len().saturating_sub(1);
    prices
        .iter()
        .enumerate()
        .map(|(i, &price)| {
            let age = Duration::minutes((last - i) as i64);
            MarketObservation::at(symbol, price, volume, now - age)
        })
        .collect()
}

fn parse_side(s: &str) -> Result<TradeSide, String> {
    TradeSide::parse(s).ok_or_else(|| format!("unknown signal '{}' (buy, sell, hold)", s))
}

fn parse_asset(s: &str) -> Result<AssetWeightInput, String> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 3 {
        return Err(format!("expected SYMBOL:WEIGHT:RISK, got '{}'", s));
    }
    let weight = parts[1]
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid weight in '{}': {}", s, e))?;
    let risk = parts[2]
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid risk in '{}': {}", s, e))?;
    Ok(AssetWeightInput::new(parts[0].trim(), weight, risk))
}
