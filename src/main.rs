//! Pricescout main entry point
//!
//! This is the command-line interface for the Pricescout marketplace crawler.

use anyhow::Context;
use clap::Parser;
use pricescout::config::load_config_with_hash;
use pricescout::crawler::run_crawl;
use pricescout::output::{print_summary, LogSink};
use pricescout::proxy::{probe_endpoint, ProxyEndpoint};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Pricescout: a proxy-aware marketplace crawler
///
/// Pricescout crawls configured marketplaces under per-site rate limits,
/// rotating proxies and retiring unhealthy ones automatically. Crawl
/// results flow to the downstream arbitrage pipeline.
#[derive(Parser, Debug)]
#[command(name = "pricescout")]
#[command(version = "1.0.0")]
#[command(about = "A proxy-aware marketplace crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with = "check_proxies")]
    dry_run: bool,

    /// Probe every configured proxy once and exit
    #[arg(long, conflicts_with = "dry_run")]
    check_proxies: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.check_proxies {
        handle_check_proxies(&config).await;
    } else {
        handle_crawl(config).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("pricescout=info,warn"),
            1 => EnvFilter::new("pricescout=debug,info"),
            2 => EnvFilter::new("pricescout=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &pricescout::Config) {
    println!("=== Pricescout Dry Run ===\n");

    println!("Proxy Pool:");
    println!("  Strategy: {:?}", config.pool.selection_strategy);
    println!("  Min success rate: {}", config.pool.min_success_rate);
    println!(
        "  Max consecutive failures: {}",
        config.pool.max_consecutive_failures
    );
    println!("  Cooldown: {} minutes", config.pool.cooldown_minutes);
    println!(
        "  Health check: every {}s, {}s timeout, probe {}",
        config.pool.health_check_interval_secs,
        config.pool.health_check_timeout_secs,
        config.pool.probe_url
    );

    println!("\nProxies ({}):", config.proxies.len());
    for proxy in &config.proxies {
        let mut notes = Vec::new();
        if let Some(country) = &proxy.country {
            notes.push(country.clone());
        }
        if let Some(provider) = &proxy.provider {
            notes.push(provider.clone());
        }
        if !proxy.banned_sites.is_empty() {
            notes.push(format!("banned: {}", proxy.banned_sites.join(",")));
        }
        println!(
            "  - {}://{}:{} {}",
            proxy.protocol,
            proxy.host,
            proxy.port,
            if notes.is_empty() {
                String::new()
            } else {
                format!("({})", notes.join("; "))
            }
        );
    }

    println!("\nSites ({}):", config.sites.len());
    for site in &config.sites {
        println!("  - {} ({})", site.name, site.base_url);
        println!(
            "    rate: {}/min (burst {}), retries: {} (x{}), timeout: {}s",
            site.rate_limit_per_minute,
            site.burst_allowance,
            site.retry_attempts,
            site.retry_backoff_multiplier,
            site.request_timeout_secs
        );
        println!(
            "    proxy: {} (rotate every {}), in-flight: {}",
            if site.requires_proxy { "required" } else { "off" },
            site.proxy_rotation_interval,
            site.max_in_flight
        );
        for seed in &site.seed_urls {
            println!("    * {}", seed);
        }
    }

    let seed_count: usize = config.sites.iter().map(|s| s.seed_urls.len()).sum();
    println!("\n✓ Configuration is valid");
    println!("✓ Would start crawling with {} seed URLs", seed_count);
}

/// Handles the --check-proxies mode: probes every configured proxy once
async fn handle_check_proxies(config: &pricescout::Config) {
    println!("=== Proxy Health Check ===\n");
    println!(
        "Probing {} proxies against {} ({}s timeout)\n",
        config.proxies.len(),
        config.pool.probe_url,
        config.pool.health_check_timeout_secs
    );

    let mut working = 0;
    for entry in &config.proxies {
        let endpoint = ProxyEndpoint::from_entry(entry);
        let probe = probe_endpoint(
            &endpoint,
            &config.pool.probe_url,
            config.pool.health_check_timeout(),
        )
        .await;

        if probe.success {
            working += 1;
            println!("✓ {} ({}ms)", endpoint.label(), probe.latency.as_millis());
        } else {
            println!(
                "✗ {} ({})",
                endpoint.label(),
                probe.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
    }

    println!("\n{}/{} proxies working", working, config.proxies.len());
}

/// Handles the main crawl operation
async fn handle_crawl(config: pricescout::Config) -> anyhow::Result<()> {
    let seed_count: usize = config.sites.iter().map(|s| s.seed_urls.len()).sum();
    tracing::info!(
        "Starting crawl: {} sites, {} proxies, {} seed URLs",
        config.sites.len(),
        config.proxies.len(),
        seed_count
    );

    let sink = Arc::new(LogSink);
    match run_crawl(config, sink).await {
        Ok((stats, pool_status)) => {
            tracing::info!("Crawl completed");
            print_summary(&stats, &pool_status);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
