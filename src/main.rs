mod cli;

use renderforged::{config, probe, server};
use renderforged_common::{resolve_duration_frames, resolve_media_url, TemplateRef, TimelineSpec};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!("Starting Renderforged server");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );
    tracing::info!(
        "Rendering to {:?} ({} @ {} fps)",
        config.render.output_dir,
        config.render.container,
        config.render.fps
    );

    server::start_server(config).await
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "renderforged=trace,renderforged_common=debug,tower_http=debug".to_string()
        } else {
            "renderforged=debug,tower_http=info".to_string()
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
        Commands::Resolve { template, url } => {
            resolve(template.as_deref(), url.as_deref(), cli.config.as_deref())
        }
        Commands::Probe { url, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_media(&url, json, cli.config.as_deref()))
        }
        Commands::Frames { file, fps } => frames(&file, fps, cli.config.as_deref()),
        Commands::CheckTools => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(check_tools(cli.config.as_deref()))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("renderforged {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn resolve(template: Option<&str>, url: Option<&str>, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let reference = TemplateRef::parse(template);
    println!("{}", resolve_media_url(&reference, url, &config.media.reference));
    Ok(())
}

async fn probe_media(url: &str, json: bool, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    let ffprobe = probe::find_tool("ffprobe", config.tools.ffprobe.as_deref())
        .context("ffprobe not found; set tools.ffprobe or add it to PATH")?;
    let loader = std::sync::Arc::new(probe::FfprobeLoader::new(
        ffprobe,
        config.server.public_dir.clone(),
    ));
    let cache = probe::MetadataCache::with_limits(
        loader,
        config.media.metadata_timeout(),
        config.media.duration_tolerance_secs,
    );

    let meta = cache.ensure_metadata(url, None).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&meta)?);
    } else {
        println!("URL: {}", url);
        println!("Duration: {:.3}s", meta.duration_seconds);
        println!("Size: {}x{}", meta.width, meta.height);
    }

    Ok(())
}

fn frames(file: &Path, fps: Option<u32>, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let fps = fps.unwrap_or(config.render.fps);
    if fps == 0 {
        anyhow::bail!("fps must be greater than zero");
    }

    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read timeline file: {:?}", file))?;
    let spec: TimelineSpec = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse timeline file: {:?}", file))?;

    let frames = resolve_duration_frames(&spec, fps);
    println!("{} frames ({:.2}s @ {} fps)", frames, frames as f64 / fps as f64, fps);
    Ok(())
}

async fn check_tools(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    println!("Checking external tools...\n");

    let tools = probe::check_tools(&config.tools).await;
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
            print!(" ({})", version);
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
        println!("Some tools are missing. Rendering needs both ffmpeg and ffprobe.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Public dir: {:?}", config.server.public_dir);
            println!("  Output dir: {:?}", config.render.output_dir);
            println!(
                "  Render: {} @ {} fps, composition {}",
                config.render.container, config.render.fps, config.render.composition_id
            );
            println!("  Media prefix: {}", config.media.reference.prefix);
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Media prefix: {}", config.media.reference.prefix);
        }
    }

    Ok(())
}
