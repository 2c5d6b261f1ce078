//! `apool ask`: answer one question and print the result.

use anyhow::Result;
use console::style;
use tokio_util::sync::CancellationToken;

use answerpool_types::answer::AnswerRequest;
use answerpool_types::error::PoolError;

use crate::state::AppState;

/// Run one question through the pool. Ctrl+C cancels the in-flight call.
pub async fn ask(state: &AppState, request: AnswerRequest, json: bool) -> Result<()> {
    request.validate().map_err(anyhow::Error::msg)?;

    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let result = state.dispatcher.answer(&request, &cancel).await;
    watcher.abort();

    let answer = match result {
        Ok(answer) => answer,
        Err(PoolError::AllProvidersExhausted { attempts }) if !json => {
            eprintln!();
            eprintln!(
                "  {} All {} candidates failed:",
                style("✗").red().bold(),
                attempts.len()
            );
            for attempt in &attempts {
                eprintln!(
                    "    {} {}",
                    style(&attempt.key).yellow(),
                    style(&attempt.error).dim()
                );
            }
            eprintln!();
            anyhow::bail!("all providers exhausted");
        }
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
        return Ok(());
    }

    println!();
    println!("  {}", style(&answer.answer).bold());
    println!();
    let source = if answer.from_cache {
        style("cache".to_string()).green()
    } else {
        style(format!(
            "{} attempt{}",
            answer.attempts,
            if answer.attempts == 1 { "" } else { "s" }
        ))
        .cyan()
    };
    println!(
        "  {} {} / {}  {}  {}ms",
        style("via").dim(),
        style(&answer.provider).cyan(),
        style(&answer.model).dim(),
        source,
        answer.latency_ms
    );
    println!();

    Ok(())
}
