//! Ask command implementation.

use crate::agent::TurnOutcome;
use crate::cli::{drive_turn, preflight};
use crate::runtime::Runtime;
use anyhow::{bail, Result};
use tracing::warn;

/// Run a single agentic turn and exit.
///
/// Fails unless the turn produced an answer, so scripts see a non-zero exit
/// status on errors, interruption or when the iteration cap is hit.
pub async fn run_ask(
    question: &str,
    provider: Option<String>,
    model: Option<String>,
    runtime: Runtime,
) -> Result<()> {
    let resolved = preflight::provider(runtime.settings(), provider.as_deref(), model.as_deref())?;

    let cwd = std::env::current_dir()?;
    let agent = runtime.agent(&resolved, &cwd)?;
    if let Err(e) = runtime
        .sessions()
        .new_session(&resolved.name, &resolved.model, &cwd)
        .await
    {
        warn!("Failed to start session: {}", e);
    }

    let (_, outcome) = drive_turn(agent, question.to_string()).await?;
    match outcome {
        Some(TurnOutcome::Completed { .. }) => Ok(()),
        Some(TurnOutcome::IterationLimit { iterations }) => {
            bail!("stopped after {} tool iterations without an answer", iterations)
        }
        Some(TurnOutcome::Failed { error }) => bail!(error),
        Some(TurnOutcome::Cancelled) => bail!("interrupted"),
        None => bail!("turn ended without an outcome"),
    }
}
