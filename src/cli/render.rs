//! Terminal rendering of agent events.

use super::output::{format_elapsed, Output};
use crate::agent::{Agent, AgentEvent, TurnOutcome};
use crate::error::Result;
use console::style;
use indicatif::ProgressBar;
use std::time::Duration;

/// How often the front-end drains the event channel.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Prints events above a spinner that shows what the agent is doing.
pub struct EventRenderer {
    spinner: ProgressBar,
    current_label: String,
    outcome: Option<TurnOutcome>,
}

impl EventRenderer {
    pub fn new() -> Self {
        Self {
            spinner: Output::spinner("Thinking..."),
            current_label: String::new(),
            outcome: None,
        }
    }

    /// How the turn ended, once `Finished` was rendered.
    pub fn outcome(&self) -> Option<&TurnOutcome> {
        self.outcome.as_ref()
    }

    pub fn set_status(&self, msg: &str) {
        self.spinner.set_message(msg.to_string());
    }

    pub fn render(&mut self, event: AgentEvent) {
        match event {
            AgentEvent::Text(text) => {
                self.spinner.suspend(|| println!("\n{}\n", text));
            }
            AgentEvent::Answer(answer) => {
                self.spinner
                    .suspend(|| println!("\n{} {}\n", style("Skiff:").cyan().bold(), answer));
            }
            AgentEvent::ToolStarted { label, .. } => {
                self.spinner.set_message(label.clone());
                self.current_label = label;
            }
            AgentEvent::ToolFinished {
                name,
                success,
                elapsed,
                preview,
                error,
            } => {
                let label = if self.current_label.is_empty() {
                    name
                } else {
                    std::mem::take(&mut self.current_label)
                };
                self.spinner.suspend(|| {
                    let icon = if success {
                        style("✓").green()
                    } else {
                        style("✗").red()
                    };
                    println!("  {} {} {}", icon, label, style(format_elapsed(elapsed)).dim());
                    if let Some(error) = &error {
                        println!("    {}", style(error).red());
                    }
                    if !preview.trim().is_empty() {
                        Output::block(&preview);
                    }
                });
                self.spinner.set_message("Thinking...");
            }
            AgentEvent::Warning(msg) => self.spinner.suspend(|| Output::warning(&msg)),
            AgentEvent::Error(msg) => self.spinner.suspend(|| Output::error(&msg)),
            AgentEvent::Finished(outcome) => {
                if outcome == TurnOutcome::Cancelled {
                    self.spinner.suspend(|| Output::warning("Cancelled."));
                }
                self.outcome = Some(outcome);
            }
        }
    }

    pub fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl Default for EventRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Run one turn on its own task, rendering events until it finishes.
///
/// Ctrl+C cancels the turn. Returns the agent and the turn's outcome.
pub async fn drive_turn(agent: Agent, input: String) -> Result<(Agent, Option<TurnOutcome>)> {
    let mut handle = agent.spawn_turn(input);
    let mut renderer = EventRenderer::new();
    let mut ticker = tokio::time::interval(POLL_INTERVAL);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                handle.cancel();
                renderer.set_status("Cancelling...");
            }
            _ = ticker.tick() => {
                while let Some(event) = handle.try_next_event() {
                    renderer.render(event);
                }
                if renderer.outcome().is_some() || handle.is_finished() {
                    while let Some(event) = handle.try_next_event() {
                        renderer.render(event);
                    }
                    break;
                }
            }
        }
    }

    renderer.finish();
    let outcome = renderer.outcome.take();
    let agent = handle.finish().await?;
    Ok((agent, outcome))
}
