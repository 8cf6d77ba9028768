//! Arbscan - Cyclic Arbitrage Path Scanner
//!
//! Run with: cargo run -- scan
//!
//! Phases:
//! 1. Cartographer: fetch pools from the subgraph, filter by liquidity, build the graph
//! 2. Brain: enumerate every cycle back to the start token (cached on disk)
//! 3. Simulator: re-quote the cached cycles in parallel workers, forever
//! 4. Executor: log or submit the routes that clear the profit bound

use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result};
use console::style;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod brain;
mod cache;
mod cartographer;
mod config;
mod executor;
mod simulator;

use brain::PathEnumerator;
use cache::{CachedPaths, PathCache};
use cartographer::{GraphRefresher, OnChainValidator, PoolGraph, SubgraphClient};
use config::{Config, ExecutionMode};
use executor::{spawn_dispatcher, SwapExecutor};
use simulator::{PathQuoter, QuoteScanner, ScanParams, ScanTarget, UniV3PathQuoter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration file (defaults to environment variables)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ensure the path cache exists, then scan forever (default)
    Scan,
    /// Rebuild the pool graph and write the path cache, then exit
    BuildPaths {
        /// Append to the existing cache instead of replacing it
        #[arg(long)]
        append: bool,
    },
    /// Print path counts per hop length and a few samples
    InspectCache,
    /// Print the resolved configuration
    ShowConfig,
}

fn print_banner() {
    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!(
        "{}",
        style(" 🔁 ARBSCAN - Cyclic Arbitrage Path Scanner").cyan().bold()
    );
    println!(
        "{}",
        style("    Subgraph Pools | Cycle Enumeration | Parallel Quoting").cyan()
    );
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!();
}

fn phase(title: &str) {
    println!();
    println!("{}", style(format!("═══ {} ═══", title)).blue().bold());
    println!();
}

fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => {
            dotenvy::dotenv().ok();
            Config::from_file(path)
        }
        None => Config::from_env(),
    }
}

// =============================================
// PHASE 1 + 2: GRAPH AND PATHS
// =============================================

async fn build_graph(config: &Config) -> Result<PoolGraph> {
    phase("PHASE 1: THE CARTOGRAPHER");

    let endpoint = config
        .subgraph_endpoint()
        .ok_or_else(|| eyre!("No subgraph endpoint - set GRAPH_API_KEY or GRAPH_ENDPOINT"))?;

    let source = SubgraphClient::new(endpoint)?;
    let validator = OnChainValidator::new(
        &config.rpc_url,
        config.quoter()?,
        config.min_pool_liquidity_usd,
        config.probe_pools,
    )?;

    let refresher = GraphRefresher::new(source, validator)
        .with_pages(config.page_count, config.page_size)
        .with_attempts(config.fetch_attempts)
        .with_concurrency(config.validation_concurrency);

    let graph = refresher.refresh().await?;
    println!(
        "{} Graph: {} tokens, {} pool edges",
        style("✓").green(),
        graph.token_count(),
        graph.edge_count()
    );
    Ok(graph)
}

/// Refresh the graph and enumerate every cycle from the start token
async fn build_paths(config: &Config) -> Result<CachedPaths> {
    let graph = build_graph(config).await?;

    phase("PHASE 2: THE BRAIN");
    let start_token = config.start_token_address()?;
    let start = Instant::now();

    let paths = PathEnumerator::new(&graph, start_token).enumerate(config.max_hops);
    let readable = graph.readable_paths(&paths);
    println!(
        "{} Enumerated {} cycles (≤ {} hops) in {:?}",
        style("✓").green(),
        paths.len(),
        config.max_hops,
        start.elapsed()
    );

    Ok(CachedPaths { paths, readable })
}

/// Cached paths if usable, otherwise a fresh enumeration
async fn ensure_paths(config: &Config) -> Result<CachedPaths> {
    let cache = PathCache::new(&config.path_cache_file);

    if cache.exists() {
        match cache.load() {
            Ok(cached) if !cached.is_empty() => {
                println!(
                    "{} Loaded {} cached paths from {}",
                    style("✓").green(),
                    cached.len(),
                    config.path_cache_file
                );
                return Ok(cached);
            }
            Ok(_) => warn!("Path cache holds no usable paths, rebuilding"),
            Err(e) => warn!("Failed to load path cache: {}, rebuilding", e),
        }
    } else {
        info!("No path cache at {}, building one", config.path_cache_file);
    }

    let built = build_paths(config).await?;
    if let Err(e) = cache.save(&built, false) {
        warn!("Failed to write path cache {}: {}", config.path_cache_file, e);
    }
    Ok(built)
}

// =============================================
// PHASE 3 + 4: SCAN AND EXECUTE
// =============================================

async fn run_scan(config: &Config) -> Result<()> {
    let cached = ensure_paths(config).await?;
    if cached.is_empty() {
        return Err(eyre!(
            "No cycles found from start token {}",
            config.start_token
        ));
    }

    phase("PHASE 3: THE SIMULATOR");

    let params = ScanParams::from_config(config, config.start_token_decimals)?;
    let quoter: Arc<dyn PathQuoter> =
        Arc::new(UniV3PathQuoter::new(&config.rpc_url, config.quoter()?)?);

    let (routes_tx, routes_rx) = mpsc::unbounded_channel();
    let executor = Arc::new(SwapExecutor::new(config)?);
    if executor.mode() == ExecutionMode::Production {
        println!("{}", style("⚠️  PRODUCTION MODE - real swaps will be sent").red().bold());
    }
    let dispatcher = spawn_dispatcher(executor, routes_rx);

    let targets: Vec<ScanTarget> = cached
        .paths
        .into_iter()
        .zip(cached.readable)
        .map(|(path, readable)| ScanTarget { path, readable })
        .collect();

    let scanner = QuoteScanner::new(quoter, params, routes_tx);
    let workers = scanner.spawn_workers(targets, config.worker_count);
    // Workers hold the only remaining senders
    drop(scanner);

    println!(
        "{} {} workers scanning (Ctrl+C to stop)",
        style("✓").green(),
        workers.len()
    );

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
        }
        _ = futures::future::join_all(workers) => {
            error!("All scan workers stopped");
        }
    }

    dispatcher.abort();
    Ok(())
}

fn inspect_cache(config: &Config) -> Result<()> {
    let cache = PathCache::new(&config.path_cache_file);
    if !cache.exists() {
        println!(
            "{} No path cache at {}",
            style("✗").red(),
            cache.location().display()
        );
        return Ok(());
    }

    let cached = cache.load()?;
    let mut per_hops: BTreeMap<usize, usize> = BTreeMap::new();
    for path in &cached.paths {
        *per_hops.entry(path.hop_count()).or_default() += 1;
    }

    println!("{} {} paths in {}", style("✓").green(), cached.len(), cache.location().display());
    for (hops, count) in &per_hops {
        println!("   {} hops: {}", hops, count);
    }

    println!();
    for (path, readable) in cached.paths.iter().zip(&cached.readable).take(5) {
        println!("   {}", readable.join(" → "));
        println!("   {}", style(path.to_hex()).dim());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("arbscan=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    print_banner();

    let config = load_config(&cli)?;
    let command = cli.command.unwrap_or(Commands::Scan);

    if let Commands::ShowConfig = command {
        config.print_summary();
        if let Err(e) = config.validate() {
            warn!("Configuration is not runnable: {}", e);
        }
        return Ok(());
    }
    if let Commands::InspectCache = command {
        return inspect_cache(&config);
    }

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        error!("Please check your .env file");
        return Err(e);
    }
    config.print_summary();

    match command {
        Commands::BuildPaths { append } => {
            let built = build_paths(&config).await?;
            PathCache::new(&config.path_cache_file)
                .save(&built, append)
                .map_err(|e| eyre!("Failed to write path cache {}: {}", config.path_cache_file, e))?;
            println!(
                "{} {} paths {} {}",
                style("✓").green(),
                built.len(),
                if append { "appended to" } else { "written to" },
                config.path_cache_file
            );
            Ok(())
        }
        _ => run_scan(&config).await,
    }
}
