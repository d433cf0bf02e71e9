use actix_cors::Cors;
use actix_files as fs;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use field_scraper::api::{self, AppState};
use field_scraper::config::AppConfig;
use field_scraper::engine::ScrapeEngine;
use field_scraper::export::{export, ExportFormat};
use field_scraper::models::ExtractionRequest;
use field_scraper::presets::PresetStore;
use field_scraper::suggest::PresetScorer;

#[derive(Parser)]
#[command(name = "field-scraper", version, about = "Rule-based web scraper with presets and pagination")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run one scrape request from a JSON file and print the records
    Scrape {
        /// Extraction request (JSON)
        request: PathBuf,
        #[arg(short, long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
        /// Write here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[actix_web::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(config).await
        }
        Command::Scrape {
            request,
            format,
            output,
        } => scrape_once(&config, &request, format, output).await,
    }
}

async fn serve(config: AppConfig) -> Result<()> {
    let engine = ScrapeEngine::new(&config)?;
    let presets = PresetStore::load(config.presets_dir.as_deref())?;
    log::info!(
        "Loaded {} presets in {} categories",
        presets.catalog().len(),
        presets.categories().len()
    );

    let state = web::Data::new(AppState {
        engine: Arc::new(engine),
        presets: Arc::new(presets),
        scorer: PresetScorer::new(config.suggest.clone()),
        export: config.export.clone(),
    });

    let host = config.server.host.clone();
    let port = config.server.port;
    let static_dir = config.server.static_dir.clone();

    log::info!("Starting field-scraper");
    log::info!("Server running at http://{}:{}", host, port);
    log::info!("Health check at http://{}:{}/api/health", host, port);

    let mut server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        let mut app = App::new()
            .app_data(state.clone())
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .wrap(cors)
            .configure(api::configure);

        if let Some(dir) = &static_dir {
            app = app.service(fs::Files::new("/", dir).index_file("index.html"));
        }
        app
    });

    if let Some(workers) = config.server.workers {
        server = server.workers(workers);
    }

    server
        .bind((host.as_str(), port))
        .with_context(|| format!("Failed to bind {}:{}", host, port))?
        .run()
        .await
        .context("Server error")
}

async fn scrape_once(
    config: &AppConfig,
    request_path: &Path,
    format: ExportFormat,
    output: Option<PathBuf>,
) -> Result<()> {
    let raw = std::fs::read_to_string(request_path)
        .with_context(|| format!("Failed to read request file {}", request_path.display()))?;
    let request: ExtractionRequest =
        serde_json::from_str(&raw).with_context(|| format!("Invalid request in {}", request_path.display()))?;

    let engine = ScrapeEngine::new(config)?;
    let result = engine.scrape(&request).await?;

    let rendered = match format {
        ExportFormat::Json => serde_json::to_string_pretty(&result)?,
        ExportFormat::Csv => export(&result.data, format, &config.export)?,
    };

    match output {
        Some(path) => {
            std::fs::write(&path, rendered).with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("Wrote {} record(s) to {}", result.total_items, path.display());
        }
        None => println!("{}", rendered),
    }
    Ok(())
}
