//! Cache CLI commands.

use anyhow::Result;
use clap::Subcommand;
use console::style;

use crate::state::AppState;

#[derive(Subcommand)]
pub enum CacheCommand {
    /// Show hit/miss counters for this process and the tier layout.
    Stats,

    /// Drop every cached answer, including the shared tier.
    Clear,
}

pub async fn handle_cache_command(cmd: CacheCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        CacheCommand::Stats => {
            let stats = state.dispatcher.cache_stats();
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
                return Ok(());
            }
            println!();
            println!("  {}", style("Response cache").bold());
            println!();
            println!("  hits         {}", stats.hits);
            println!("  misses       {}", stats.misses);
            println!("  shared hits  {}", stats.shared_hits);
            println!("  writes       {}", stats.writes);
            println!("  hit rate     {:.1}%", stats.hit_rate * 100.0);
            println!("  entries      {}", stats.entries);
            println!(
                "  shared tier  {}",
                if stats.shared_enabled {
                    style("enabled").green()
                } else {
                    style("disabled").dim()
                }
            );
            println!();
        }
        CacheCommand::Clear => {
            let removed = state.dispatcher.clear_cache().await;
            if json {
                println!(
                    "{}",
                    serde_json::json!({ "cleared": true, "shared_removed": removed })
                );
            } else {
                println!(
                    "  {} Cache cleared ({} shared entr{} removed)",
                    style("✓").green(),
                    removed,
                    if removed == 1 { "y" } else { "ies" }
                );
            }
        }
    }
    Ok(())
}
