mod cli;

use streamgate::{config, server};
use streamgate_common::is_ingest_process_id;
use streamgate_restreamer::{
    build_ingest_config, build_ui_metadata, validate_display_name, validate_source_url,
    ClientConfig, IngestSpec, RestreamerClient,
};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&std::path::Path>,
) -> Result<()> {
    // Load config
    let mut config = config::load_config_or_default(config_path)?;

    // Override host/port from CLI if specified
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config::validate_config(&config)?;

    tracing::info!("Starting Streamgate server");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    server::start_server(config).await
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            // Verbose mode: trace for streamgate, debug for HTTP
            "streamgate=trace,streamgate_restreamer=trace,streamgate_hls=debug,streamgate_common=debug,tower_http=debug".to_string()
        } else {
            // Normal mode: debug for streamgate crates, info for HTTP requests
            "streamgate=debug,streamgate_restreamer=info,streamgate_hls=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            // Create tokio runtime
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Validate { path } => {
            let path = path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::CheckControlPlane => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(check_control_plane(cli.config.as_deref()))
        }
        Commands::BuildConfig { name, source } => {
            build_config(&name, &source, cli.config.as_deref())
        }
        Commands::GenerateApiKey => generate_api_key(),
        Commands::Version => {
            println!("streamgate {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn validate_config(path: Option<&std::path::Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            config::load_config(p)?
        }
        None => {
            println!("No config file specified, using defaults and environment");
            config::load_config_or_default(None)?
        }
    };

    println!("✓ Configuration is valid");
    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  API key: {}", if config.server.api_key.is_some() { "set" } else { "not set" });
    println!(
        "  CORS origins: {}",
        if config.server.cors_origins.is_empty() {
            "any".to_string()
        } else {
            config.server.cors_origins.join(", ")
        }
    );
    println!("  Control plane: {}", config.restreamer.url);
    println!(
        "  Credentials: {}",
        if config.restreamer.has_credentials() { "set" } else { "missing" }
    );
    println!("  Proxy path: {}", config.proxy.public_path);
    println!(
        "  Rate limit: {} per {}s",
        config.rate_limit.max_requests, config.rate_limit.window_secs
    );

    Ok(())
}

async fn check_control_plane(config_path: Option<&std::path::Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let client = RestreamerClient::new(
        ClientConfig::new(
            config.restreamer.url.clone(),
            config.restreamer.username.clone(),
            config.restreamer.password.clone(),
        )
        .with_timeout(config.restreamer.timeout()),
    );

    println!("Checking control plane at {}...", client.base_url());
    client
        .authenticate()
        .await
        .context("Control plane login failed")?;
    println!("✓ Login successful");

    let processes = client
        .list_processes()
        .await
        .context("Listing processes failed")?;
    let ingests: Vec<_> = processes
        .iter()
        .filter(|p| is_ingest_process_id(&p.id))
        .collect();

    println!(
        "✓ {} processes, {} ingest streams",
        processes.len(),
        ingests.len()
    );
    for process in ingests {
        println!("  {} ({})", process.display_name(), process.id);
    }

    Ok(())
}

fn build_config(name: &str, source: &str, config_path: Option<&std::path::Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let name = validate_display_name(name)?;
    validate_source_url(source)?;

    let spec = IngestSpec::new(source, name, config.restreamer.url.as_str());
    let output = serde_json::json!({
        "process": build_ingest_config(&spec),
        "metadata": build_ui_metadata(&spec),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn generate_api_key() -> Result<()> {
    let key = server::api_key::generate_api_key();
    println!("{}", key);
    Ok(())
}
