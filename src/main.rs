mod cli;

use clipforge::{config, pipeline::RenderRequest, server};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};

async fn start_server(
    host: String,
    port: u16,
    config_path: Option<&std::path::Path>,
) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    // Override host/port from CLI if specified
    config.server.host = host;
    config.server.port = port;

    tracing::info!("Starting Clipforge server");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    server::start_server(config).await
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "clipforge=trace,clipforge_av=trace,tower_http=debug".to_string()
        } else {
            "clipforge=debug,clipforge_av=debug,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Render { request, output } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_render(&request, &output, cli.config.as_deref()))
        }
        Commands::CheckTools => check_tools(),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("clipforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::GenerateApiKey => {
            println!("{}", server::auth::generate_api_key());
            Ok(())
        }
    }
}

async fn run_render(
    request_path: &std::path::Path,
    output: &std::path::Path,
    config_path: Option<&std::path::Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    let raw = std::fs::read_to_string(request_path)
        .with_context(|| format!("Failed to read request file: {:?}", request_path))?;
    let request: RenderRequest = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse request file: {:?}", request_path))?;

    let pipeline = server::build_pipeline(&config)?;

    tracing::info!("Rendering {:?}", request_path);
    let artifact = pipeline
        .render(&request)
        .await
        .map_err(|e| anyhow::anyhow!("Render failed during {}: {}", e.stage(), e))?;

    std::fs::write(output, &artifact.data)
        .with_context(|| format!("Failed to write output: {:?}", output))?;
    println!("Wrote {} bytes to {}", artifact.size, output.display());
    Ok(())
}

fn check_tools() -> Result<()> {
    println!("Checking external tools...\n");

    let tools = clipforge_av::check_tools();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install them to enable rendering.");
    }

    Ok(())
}

fn validate_config(path: Option<&std::path::Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Auth enabled: {}", config.server.auth.enabled);
            println!("  Font: {}", config.render.font_path);
            println!(
                "  Timeouts: acquire {}s, encode {}s",
                config.render.acquire_timeout_secs, config.render.encode_timeout_secs
            );
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Server: {}:{}", config.server.host, config.server.port);
        }
    }

    Ok(())
}
