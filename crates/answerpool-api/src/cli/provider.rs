//! Provider CLI commands: list, keys, probe.

use anyhow::Result;
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use answerpool_types::status::KeyState;

use crate::state::AppState;

#[derive(Subcommand)]
pub enum ProviderCommand {
    /// List configured providers in selection order.
    #[command(alias = "ls")]
    List,

    /// Show per-key health for one provider.
    Keys {
        /// Provider name.
        name: String,
    },

    /// Send a small test question through every key of a provider.
    Probe {
        /// Provider name.
        name: String,
    },
}

pub async fn handle_provider_command(
    cmd: ProviderCommand,
    state: &AppState,
    json: bool,
) -> Result<()> {
    match cmd {
        ProviderCommand::List => provider_list(state, json),
        ProviderCommand::Keys { name } => provider_keys(state, &name, json),
        ProviderCommand::Probe { name } => provider_probe(state, &name, json).await,
    }
}

fn new_table() -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn format_rate(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}

fn format_latency(avg_ms: Option<u64>) -> String {
    avg_ms.map_or_else(|| "-".to_string(), |ms| format!("{ms}ms"))
}

fn provider_list(state: &AppState, json: bool) -> Result<()> {
    let statuses = state.dispatcher.provider_statuses();

    if json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
        return Ok(());
    }

    let mut table = new_table();
    table.set_header(vec![
        Cell::new("Priority").fg(Color::White),
        Cell::new("Provider").fg(Color::White),
        Cell::new("Model").fg(Color::White),
        Cell::new("Other Models").fg(Color::White),
        Cell::new("Keys").fg(Color::White),
        Cell::new("Success").fg(Color::White),
        Cell::new("Avg Latency").fg(Color::White),
        Cell::new("Active").fg(Color::White),
        Cell::new("Base URL").fg(Color::White),
    ]);

    for status in &statuses {
        let active = if status.is_available() {
            Cell::new("yes").fg(Color::Green)
        } else if status.active {
            Cell::new("cooling").fg(Color::Yellow)
        } else {
            Cell::new("no").fg(Color::Red)
        };
        let keys_color = if status.healthy_keys == status.total_keys {
            Color::Green
        } else if status.healthy_keys == 0 {
            Color::Red
        } else {
            Color::Yellow
        };
        let others = if status.models.is_empty() {
            "-".to_string()
        } else {
            status.models.join(", ")
        };

        table.add_row(vec![
            Cell::new(status.priority).fg(Color::Cyan),
            Cell::new(&status.name).fg(Color::White),
            Cell::new(&status.default_model).fg(Color::DarkGrey),
            Cell::new(others).fg(Color::DarkGrey),
            Cell::new(format!("{}/{}", status.healthy_keys, status.total_keys)).fg(keys_color),
            Cell::new(format_rate(status.success_rate)),
            Cell::new(format_latency(status.avg_latency_ms)).fg(Color::DarkGrey),
            active,
            Cell::new(&status.base_url).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} provider{}",
        style(statuses.len()).bold(),
        if statuses.len() == 1 { "" } else { "s" }
    );
    println!();
    Ok(())
}

fn provider_keys(state: &AppState, name: &str, json: bool) -> Result<()> {
    let keys = state.dispatcher.key_health(name)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&keys)?);
        return Ok(());
    }

    let mut table = new_table();
    table.set_header(vec![
        Cell::new("Key").fg(Color::White),
        Cell::new("Masked").fg(Color::White),
        Cell::new("State").fg(Color::White),
        Cell::new("Failures").fg(Color::White),
        Cell::new("OK / Failed").fg(Color::White),
        Cell::new("Success").fg(Color::White),
        Cell::new("Avg Latency").fg(Color::White),
        Cell::new("Last Error").fg(Color::White),
    ]);

    for key in &keys {
        let state_cell = match key.state {
            KeyState::Healthy => Cell::new("healthy").fg(Color::Green),
            KeyState::Cooldown => {
                Cell::new(format!("cooldown {}s", key.cooldown_remaining_ms.div_ceil(1000)))
                    .fg(Color::Red)
            }
        };
        let last_error = key.last_error.as_deref().unwrap_or("-");
        let last_error = if last_error.chars().count() > 40 {
            format!("{}...", last_error.chars().take(37).collect::<String>())
        } else {
            last_error.to_string()
        };

        table.add_row(vec![
            Cell::new(&key.key_id).fg(Color::Cyan),
            Cell::new(&key.masked_key).fg(Color::DarkGrey),
            state_cell,
            Cell::new(key.consecutive_failures),
            Cell::new(format!("{} / {}", key.total_successes, key.total_failures)),
            Cell::new(format_rate(key.success_rate)),
            Cell::new(format_latency(key.avg_latency_ms)).fg(Color::DarkGrey),
            Cell::new(last_error).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

async fn provider_probe(state: &AppState, name: &str, json: bool) -> Result<()> {
    if !json {
        println!();
        println!("  Probing {} ...", style(name).cyan());
    }

    let result = state.dispatcher.probe_provider(name).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!(
        "  {} {}  {}",
        style("Q:").dim(),
        result.question,
        style(format!("({})", result.model)).dim()
    );
    println!();
    for key in &result.keys {
        let mark = if key.ok {
            style("✓").green()
        } else {
            style("✗").red()
        };
        println!(
            "  {} {:<16} {:>6}ms  {}",
            mark,
            key.key_id,
            key.latency_ms,
            style(&key.detail).dim()
        );
    }
    println!();
    println!(
        "  {}/{} keys healthy",
        style(result.healthy_count()).bold(),
        result.keys.len()
    );
    println!();
    Ok(())
}
