//! SIEM Threat Enrichment CLI
//! Thin command-line front-end over the enrichment core

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use siem_threat_enrichment::{Config, EnrichmentManager};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let matches = Command::new("enrichment_cli")
        .version("0.1.0")
        .author("SIEM Team")
        .about("Multi-source threat intelligence enrichment for the SIEM platform")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path"),
        )
        .arg(
            Arg::new("validate-config")
                .long("validate-config")
                .help("Validate configuration and exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("ip")
                .long("ip")
                .value_name("ADDR")
                .help("Enrich one IP address")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("domain")
                .long("domain")
                .value_name("NAME")
                .help("Enrich one domain name"),
        )
        .arg(
            Arg::new("correlate")
                .long("correlate")
                .value_name("INDICATOR")
                .help("Correlate a set of indicators (repeatable)")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("source-status")
                .long("source-status")
                .help("Print per-source status and exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("cache-stats")
                .long("cache-stats")
                .help("Print cache statistics and exit")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    // Load configuration
    let config = match matches.get_one::<String>("config") {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            Config::from_file(path)
                .with_context(|| format!("Failed to load configuration from {}", path))?
        }
        None => Config::from_env().context("Failed to load configuration from environment")?,
    };

    if matches.get_flag("validate-config") {
        info!("Configuration is valid");
        return Ok(());
    }

    let manager =
        EnrichmentManager::from_config(config).context("Failed to initialize enrichment manager")?;

    if matches.get_flag("source-status") {
        let status = manager.get_source_status().await;
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    if matches.get_flag("cache-stats") {
        let stats = manager.get_cache_statistics().await;
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    if let Some(ips) = matches.get_many::<String>("ip") {
        let ips: Vec<String> = ips.cloned().collect();
        for (ip, result) in manager.enrich_ips_batch(&ips).await {
            match result {
                Ok(result) => println!("{}", serde_json::to_string_pretty(&result)?),
                Err(e) => eprintln!("{}: {}", ip, e),
            }
        }
        return Ok(());
    }

    if let Some(domain) = matches.get_one::<String>("domain") {
        let result = manager
            .enrich_domain(domain)
            .await
            .with_context(|| format!("Enrichment failed for {}", domain))?;
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if let Some(indicators) = matches.get_many::<String>("correlate") {
        let indicators: Vec<String> = indicators.cloned().collect();
        let result = manager
            .correlate_indicators(&indicators)
            .await
            .context("Correlation failed")?;
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    anyhow::bail!("Nothing to do; pass --ip, --domain, --correlate, --source-status, or --cache-stats");
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "siem_threat_enrichment=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
