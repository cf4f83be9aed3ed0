//! Sessions command - inspect and manage stored conversations.

use crate::cli::{output::one_line, Output, SessionAction};
use crate::runtime::Runtime;
use crate::session::{Session, SessionStats};
use crate::transport::Role;
use anyhow::Result;
use console::style;

/// Print sessions as a compact table.
pub fn print_session_list(sessions: &[Session], current: Option<&str>) {
    if sessions.is_empty() {
        Output::info("No sessions yet.");
        return;
    }
    for session in sessions {
        let marker = if Some(session.id.as_str()) == current { "*" } else { " " };
        println!(
            "  {} {}  {}  {:>4} msgs  {:<24} {}",
            style(marker).green().bold(),
            style(session.short_id()).cyan(),
            style(session.updated_at.format("%Y-%m-%d %H:%M")).dim(),
            session.message_count,
            one_line(&session.model, 24),
            one_line(&session.title, 50)
        );
    }
}

pub fn print_session_stats(stats: &SessionStats) {
    Output::kv("Sessions", &stats.total_sessions.to_string());
    Output::kv("Messages", &stats.total_messages.to_string());
    Output::kv("Tokens", &stats.total_tokens.to_string());
    Output::kv("Avg tokens/message", &format!("{:.1}", stats.average_tokens));
    if let Some(model) = &stats.most_used_model {
        Output::kv("Most used model", model);
    }
}

/// Run the sessions command.
pub async fn run_sessions(action: &SessionAction, runtime: &Runtime) -> Result<()> {
    let store = runtime.sessions();

    match action {
        SessionAction::List { limit } => {
            Output::header("Sessions");
            let sessions = store.list_sessions(*limit).await?;
            print_session_list(&sessions, None);
        }

        SessionAction::Show { id } => {
            let session = store.resolve_id(id).await?;
            Output::header(&session.title);
            Output::kv("Id", &session.id);
            Output::kv("Model", &format!("{} ({})", session.model, session.provider));
            Output::kv("Directory", &session.working_dir);
            Output::kv("Created", &session.created_at.to_rfc3339());

            for message in store.get_messages(&session.id).await? {
                let who = match message.role {
                    Role::User => style("You:").green().bold(),
                    Role::Assistant => style("Skiff:").cyan().bold(),
                    Role::System => style("System:").dim(),
                };
                println!("\n{} {}", who, message.content);
            }
            println!();
        }

        SessionAction::Export { id, output } => {
            let session = store.resolve_id(id).await?;
            let json = store.export_session(&session.id).await?;
            match output {
                Some(path) => {
                    std::fs::write(path, json)?;
                    Output::success(&format!(
                        "Exported session {} to {}",
                        session.short_id(),
                        path
                    ));
                }
                None => println!("{}", json),
            }
        }

        SessionAction::Delete { id } => {
            let session = store.resolve_id(id).await?;
            store.delete_session(&session.id).await?;
            Output::success(&format!("Deleted session {} ({})", session.short_id(), session.title));
        }

        SessionAction::Stats => {
            Output::header("Session Statistics");
            print_session_stats(&store.stats().await?);
        }
    }

    Ok(())
}
