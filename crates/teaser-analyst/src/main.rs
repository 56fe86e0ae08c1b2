use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Parser;

use teaser_analyst::cli::{Cli, Commands};
use teaser_analyst::config::{default_config_path, load_config, AppConfig};
use teaser_analyst::pipeline::{TeaserProgressEvent, TeaserService};
use teaser_analyst::{telemetry, Teaser};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing(cli.json_logs)?;

    let config = load_app_config(cli.config.as_deref())?;
    let service = TeaserService::from_config(&config)?;

    match cli.command {
        Commands::Upload { path } => upload(&service, &path),
        Commands::Process { id, blocks, watch } => process(&service, &id, blocks, watch).await,
        Commands::List => list(&service),
        Commands::Show { id, json } => show(&service, &id, json),
        Commands::Cancel { id } => {
            if service.cancel(&id)? {
                println!("Cancelled {}", id);
                Ok(())
            } else {
                bail!("Teaser {} is not being processed", id)
            }
        }
        Commands::Delete { id } => {
            service.delete(&id)?;
            println!("Deleted {}", id);
            Ok(())
        }
        Commands::Blocks => {
            for block in service.registry().blocks() {
                println!(
                    "{:<22} {:<36} {}",
                    block.id,
                    block.display_name,
                    block.taxonomy_path.join(" / ")
                );
            }
            Ok(())
        }
    }
}

/// Explicit path, else the per-user config file if present, else defaults.
fn load_app_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        return load_config(path)
            .with_context(|| format!("loading config from {}", path.display()));
    }
    match default_config_path() {
        Some(path) if path.exists() => load_config(&path)
            .with_context(|| format!("loading config from {}", path.display())),
        _ => Ok(AppConfig::default()),
    }
}

fn upload(service: &TeaserService, path: &Path) -> Result<()> {
    let content =
        std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .context("upload path has no file name")?;
    let teaser = service.upload(filename, &content)?;
    println!("{}", teaser.id);
    Ok(())
}

async fn process(
    service: &TeaserService,
    id: &str,
    blocks: Option<Vec<String>>,
    watch: bool,
) -> Result<()> {
    let events = watch.then(|| service.subscribe());
    let mut handle = service.process_in_background(id, blocks)?;

    let succeeded = match events {
        None => handle.await??,
        Some(mut events) => loop {
            tokio::select! {
                joined = &mut handle => {
                    while let Ok(event) = events.try_recv() {
                        print_event(id, &event);
                    }
                    break joined??;
                }
                Ok(event) = events.recv() => print_event(id, &event),
            }
        },
    };

    let teaser = service.get(id)?;
    if !teaser.status.is_terminal() {
        println!("Teaser {} is already being processed", id);
        return Ok(());
    }
    if !succeeded {
        bail!(
            "Processing failed: {}",
            teaser.error.as_deref().unwrap_or("unknown error")
        );
    }
    print_summary(&teaser);
    Ok(())
}

fn print_event(id: &str, event: &TeaserProgressEvent) {
    if event.teaser_id == id {
        println!("[{}] {}", event.phase, event.message);
    }
}

fn list(service: &TeaserService) -> Result<()> {
    for teaser in service.list()? {
        println!(
            "{}  {:<10}  {}  {}",
            teaser.id,
            teaser.status.as_str(),
            teaser.updated_at.format("%Y-%m-%d %H:%M"),
            teaser.filename
        );
    }
    Ok(())
}

fn show(service: &TeaserService, id: &str, json: bool) -> Result<()> {
    let teaser = service.get(id)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&teaser)?);
    } else {
        print_summary(&teaser);
    }
    Ok(())
}

fn print_summary(teaser: &Teaser) {
    println!("id:       {}", teaser.id);
    println!("file:     {}", teaser.filename);
    println!("status:   {}", teaser.status);
    if let Some(error) = &teaser.error {
        println!("error:    {}", error);
    }
    let sections = teaser.analysis.as_ref().map_or(0, |a| a.leaf_count());
    println!("sections: {}", sections);
    let entities: usize = teaser
        .entities
        .as_ref()
        .map_or(0, |e| e.values().map(Vec::len).sum());
    println!("entities: {}", entities);
    if let Some(report) = &teaser.report_path {
        println!("report:   {}", report);
    }
}
