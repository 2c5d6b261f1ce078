//! `apool config check`: load and validate the config without building the
//! pool or touching the network.

use std::path::Path;

use anyhow::Result;
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use answerpool_infra::config::load_pool_config;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Validate the configuration file and summarize it.
    Check,
}

pub async fn handle_config_command(cmd: &ConfigCommand, path: &Path, json: bool) -> Result<()> {
    match cmd {
        ConfigCommand::Check => check(path, json).await,
    }
}

async fn check(path: &Path, json: bool) -> Result<()> {
    let config = load_pool_config(path).await?;

    if json {
        let providers: Vec<_> = config
            .providers
            .iter()
            .map(|p| {
                serde_json::json!({
                    "name": p.name,
                    "base_url": p.base_url,
                    "keys": p.keys.len(),
                    "model": p.model,
                    "models": p.models,
                    "active": p.active,
                    "priority": p.priority,
                })
            })
            .collect();
        let summary = serde_json::json!({
            "valid": true,
            "path": path.display().to_string(),
            "providers": providers,
            "cache": config.cache,
            "health": config.health,
            "dispatch": {
                "request_timeout_ms": config.dispatch.request_timeout_ms,
                "max_tokens": config.dispatch.max_tokens,
                "temperature": config.dispatch.temperature,
            },
            "server": config.server,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Priority").fg(Color::White),
        Cell::new("Provider").fg(Color::White),
        Cell::new("Keys").fg(Color::White),
        Cell::new("Model").fg(Color::White),
        Cell::new("Active").fg(Color::White),
    ]);
    for p in &config.providers {
        table.add_row(vec![
            Cell::new(p.priority).fg(Color::Cyan),
            Cell::new(&p.name),
            Cell::new(p.keys.len()),
            Cell::new(&p.model).fg(Color::DarkGrey),
            if p.active {
                Cell::new("yes").fg(Color::Green)
            } else {
                Cell::new("no").fg(Color::Red)
            },
        ]);
    }

    println!();
    println!(
        "  {} {} is valid",
        style("✓").green().bold(),
        style(path.display()).cyan()
    );
    println!();
    println!("{table}");
    println!();
    println!(
        "  cache: {}, ttl {}s, {} entries max, shared tier {}",
        if config.cache.enabled { "on" } else { "off" },
        config.cache.ttl_secs,
        config.cache.max_entries,
        if config.cache.shared.is_some() { "on" } else { "off" }
    );
    println!(
        "  health: cooldown after {} failures, {}ms base, {}ms cap",
        config.health.failure_threshold,
        config.health.base_cooldown_ms,
        config.health.max_cooldown_ms
    );
    println!(
        "  dispatch: {}ms timeout, {} max tokens",
        config.dispatch.request_timeout_ms, config.dispatch.max_tokens
    );
    println!();
    Ok(())
}
