use clap::{Parser, Subcommand};
use orbbot::backtest::{SessionGenerator, SessionReplay, SessionScenario};
use orbbot::config::BotConfig;
use orbbot::execution::{Executor, ExecutorSettings, PaperBroker, Scheduler};
use orbbot::risk::load_performance;
use orbbot::strategy::DecisionEngine;
use orbbot::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "orbbot",
    version,
    about = "Opening range breakout bot for index futures",
    propagate_version = true
)]
struct Cli {
    /// Config file (TOML/YAML/JSON); ORB_* environment variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Broker client id; only this client's executions are considered
    #[arg(long, global = true)]
    client_id: Option<i32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a synthetic session bar by bar and print the report
    Replay {
        #[arg(long, value_enum, default_value_t = SessionScenario::LongStopThenReentry)]
        scenario: SessionScenario,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Override the computed contract count
        #[arg(long)]
        quantity: Option<u32>,
    },
    /// Run the polling loop against the paper broker fed a synthetic session
    Paper {
        #[arg(long, value_enum, default_value_t = SessionScenario::LongTarget)]
        scenario: SessionScenario,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Seconds between cycles, one bar is released per cycle
        #[arg(long)]
        cadence_secs: Option<u64>,
    },
    /// Print today's contract count from the performance file
    Size {
        #[arg(long)]
        performance_file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    let mut config = BotConfig::load(cli.config.as_deref())?;
    if let Some(client_id) = cli.client_id {
        config.client_id = client_id;
    }

    tracing::info!("🚀 orbbot starting ({} {}, client {})", config.symbol, config.expiration, config.client_id);

    match cli.command {
        Commands::Replay {
            scenario,
            seed,
            quantity,
        } => run_replay(&config, scenario, seed, quantity).await,
        Commands::Paper {
            scenario,
            seed,
            cadence_secs,
        } => run_paper(config, scenario, seed, cadence_secs).await,
        Commands::Size { performance_file } => {
            if let Some(path) = performance_file {
                config.performance_file = Some(path.display().to_string());
            }
            let contracts = contract_count(&config)?;
            println!("{} contract(s) of {} on the {:?} account", contracts, config.symbol, config.account);
            Ok(())
        }
    }
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("orbbot=info,orbbot::strategy=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Contracts for today from trailing performance, or the base size
fn contract_count(config: &BotConfig) -> Result<u32> {
    let Some(path) = &config.performance_file else {
        tracing::info!("No performance file configured, trading base size");
        return Ok(config.sizing.base_contracts);
    };

    let records = load_performance(path)?;
    let net = config.sizing.net_profit(&records, config.account);
    let contracts = config.sizing.contracts_for(&records, config.account);
    tracing::info!(
        "📊 Net profit ${:.2} over {} records -> {} contract(s)",
        net,
        records.len(),
        contracts
    );
    Ok(contracts)
}

async fn run_replay(
    config: &BotConfig,
    scenario: SessionScenario,
    seed: u64,
    quantity: Option<u32>,
) -> Result<()> {
    let quantity = match quantity {
        Some(q) => q,
        None => contract_count(config)?,
    };

    let (candles, range) = SessionGenerator::new(seed)
        .with_profit_multiplier(config.strategy.profit_multiplier)
        .generate(scenario);

    println!("\n🔬 Replaying session: {:?} (seed {})", scenario, seed);
    println!("   Range: {:.2} - {:.2}", range.low, range.high);
    println!("   Bars: {}", candles.len());
    println!("   Contracts: {}", quantity);

    let report = SessionReplay::new(config.strategy.clone(), config.symbol.clone(), quantity)
        .with_client_id(config.client_id)
        .run(candles)
        .await?;

    for entry in &report.actions {
        let time = entry
            .time
            .map(|t| t.format("%H:%M").to_string())
            .unwrap_or_default();
        println!("   {} {:?}", time, entry.action);
    }
    println!("   Final state: {:?}, {} open order(s)", report.final_state, report.open_orders);
    report.metrics.print_report();
    Ok(())
}

async fn run_paper(
    mut config: BotConfig,
    scenario: SessionScenario,
    seed: u64,
    cadence_secs: Option<u64>,
) -> Result<()> {
    let quantity = contract_count(&config)?;
    let (candles, _) = SessionGenerator::new(seed)
        .with_profit_multiplier(config.strategy.profit_multiplier)
        .generate(scenario);

    if let Some(secs) = cadence_secs {
        config.schedule.cadence_secs = secs;
    }
    // Stop once the feed is exhausted unless a limit is configured
    if config.schedule.max_cycles.is_none() {
        config.schedule.max_cycles = Some(candles.len() as u64 + 1);
    }

    let broker = Arc::new(
        PaperBroker::new(config.symbol.clone(), config.client_id)
            .with_feed(candles)
            .with_auto_advance(),
    );
    let mut executor = Executor::new(
        broker.clone(),
        DecisionEngine::new(config.strategy.clone(), config.symbol.clone()),
        ExecutorSettings::from_config(&config)?,
        quantity,
    );

    let summary = Scheduler::new(config.schedule.clone())
        .without_trading_hours_gate()
        .run(&mut executor)
        .await?;

    tracing::info!(
        "🛑 Paper session over: {} cycles, {} actions, {} errors, {:.2} points realized",
        summary.cycles,
        summary.actions.len(),
        summary.errors,
        broker.realized_points()?
    );
    Ok(())
}
