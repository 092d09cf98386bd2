use meridian_runner::{FeedConfig, StrategyEntry, StrategySystem, SyntheticFeed, SystemConfig};
use meridian_strategy::{MeanReversion, MovingAverageCross, StrategyConfig};
use std::time::Duration;

fn print_help() {
    eprintln!(
        r#"Meridian - multi-strategy execution engine with real-time risk management

USAGE:
    meridian [OPTIONS]

OPTIONS:
    --config <PATH>     Load the system configuration from a JSON file
    --ticks <N>         Synthetic bars per symbol (overrides the config)
    --seed <N>          Seed for the synthetic feed
    --help              Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG            Log level filter (default: info)

EXAMPLES:
    # Two bundled strategies on a synthetic feed
    meridian --ticks 300 --seed 42

    # Run with config file
    meridian --config meridian.json
"#
    );
}

/// Used when no config file is given
fn default_config() -> SystemConfig {
    let sma = StrategyConfig::new("sma-aapl", vec!["AAPL".to_string()])
        .with_parameter("fast_period", 10.0)
        .with_parameter("slow_period", 30.0);
    let mr = StrategyConfig::new("mr-msft", vec!["MSFT".to_string()])
        .with_parameter("lookback", 20.0);
    SystemConfig {
        strategies: vec![
            StrategyEntry::new(MovingAverageCross::KIND, sma),
            StrategyEntry::new(MeanReversion::KIND, mr),
        ],
        feed: Some(FeedConfig::default()),
        ..Default::default()
    }
}

fn parse_number<T: std::str::FromStr>(flag: &str, value: Option<&String>) -> T {
    match value.map(|v| v.parse::<T>()) {
        Some(Ok(n)) => n,
        _ => {
            eprintln!("Error: {} requires a numeric argument", flag);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<String> = None;
    let mut ticks: Option<usize> = None;
    let mut seed: Option<u64> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--config" | "-c" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
                config_path = Some(args[i].clone());
            }
            "--ticks" | "-t" => {
                i += 1;
                ticks = Some(parse_number("--ticks", args.get(i)));
            }
            "--seed" | "-s" => {
                i += 1;
                seed = Some(parse_number("--seed", args.get(i)));
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let config = match config_path {
        Some(path) => {
            log::info!("Loading configuration from: {}", path);
            SystemConfig::from_file(&path)?
        }
        None => {
            log::info!("Using default configuration");
            default_config()
        }
    };
    log::info!(
        "Strategies: {}, groups: {}",
        config.strategies.len(),
        config.groups.len()
    );

    let mut feed_config = config.feed.clone().unwrap_or_default();
    if let Some(seed) = seed {
        feed_config.seed = Some(seed);
    }
    let ticks = ticks.unwrap_or(feed_config.ticks);
    let interval = feed_config.interval();

    let system = StrategySystem::from_config(&config).await?;
    system.start().await?;

    let mut feed = SyntheticFeed::new(feed_config);
    let fed = feed.run(system.engine(), ticks, interval).await?;

    // let the data loop drain before the final sample
    for _ in 0..500 {
        if system.engine().stats().await.data_processed >= fed as u64 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    system.refresh_performance().await;

    let reports = system.stop().await;
    println!();
    for report in &reports {
        println!("{}", report);
    }
    for id in system.strategies() {
        match system.performance_report(&id) {
            Ok(report) => println!("{}", report),
            Err(e) => log::warn!("No performance report for {}: {}", id, e),
        }
    }
    match system.compare(&[]) {
        Ok(comparison) => println!("{}", comparison),
        Err(e) => log::warn!("Comparison unavailable: {}", e),
    }
    println!("{}", system.risk_report());
    Ok(())
}
