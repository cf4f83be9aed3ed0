//! Interactive chat command.

use super::providers::print_providers;
use super::sessions::{print_session_list, print_session_stats};
use super::tools::print_tools;
use crate::agent::Agent;
use crate::cli::{drive_turn, preflight, Output};
use crate::config::ResolvedProvider;
use crate::runtime::Runtime;
use crate::tools::{ToolCall, ToolResult};
use crate::transport::Message;
use anyhow::Result;
use console::style;
use std::io::{self, BufRead, Write};
use tracing::warn;

const HELP: &str = "\
/help                 Show this help
/clear                Clear the conversation (keeps the session)
/new                  Start a new session
/model [name]         Show or switch the model
/provider [name]      Show or switch the provider
/providers            List providers
/sessions             List recent sessions
/resume <id>          Resume a stored session
/stats                Usage statistics
/export               Export the current session as JSON
/tools                List the tools available to the model
/ls [path]            List a directory
/cat <file>           Print a file
/pwd                  Print the working directory
/cd <path>            Change the working directory
/git status|log|diff [--staged]|branch
/run <command>        Run a shell command
/quit, /exit          Leave";

#[derive(Debug, Clone, PartialEq, Eq)]
enum GitCommand {
    Status,
    Log,
    Diff { staged: bool },
    Branch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SlashCommand {
    Help,
    Clear,
    New,
    Model(Option<String>),
    Provider(Option<String>),
    Providers,
    Sessions,
    Resume(String),
    Stats,
    Export,
    Tools,
    Ls(Option<String>),
    Cat(String),
    Pwd,
    Cd(String),
    Git(GitCommand),
    Run(String),
    Quit,
    Usage(&'static str),
    Unknown(String),
}

/// Parse a `/command`. Anything not starting with `/` is a chat message.
fn parse_slash(line: &str) -> Option<SlashCommand> {
    let rest = line.trim().strip_prefix('/')?;
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    let arg_opt = (!arg.is_empty()).then(|| arg.to_string());
    let required = |usage: &'static str, make: fn(String) -> SlashCommand| match &arg_opt {
        Some(a) => make(a.clone()),
        None => SlashCommand::Usage(usage),
    };

    let command = match name.to_lowercase().as_str() {
        "help" | "?" => SlashCommand::Help,
        "clear" => SlashCommand::Clear,
        "new" => SlashCommand::New,
        "model" => SlashCommand::Model(arg_opt.clone()),
        "provider" => SlashCommand::Provider(arg_opt.clone()),
        "providers" => SlashCommand::Providers,
        "sessions" | "history" => SlashCommand::Sessions,
        "resume" | "load" => required("/resume <id>", SlashCommand::Resume),
        "stats" => SlashCommand::Stats,
        "export" => SlashCommand::Export,
        "tools" => SlashCommand::Tools,
        "ls" => SlashCommand::Ls(arg_opt.clone()),
        "cat" => required("/cat <file>", SlashCommand::Cat),
        "pwd" => SlashCommand::Pwd,
        "cd" => required("/cd <path>", SlashCommand::Cd),
        "git" => {
            let mut words = arg.split_whitespace();
            match words.next().unwrap_or("status") {
                "status" => SlashCommand::Git(GitCommand::Status),
                "log" => SlashCommand::Git(GitCommand::Log),
                "diff" => SlashCommand::Git(GitCommand::Diff {
                    staged: words.any(|w| w == "--staged" || w == "--cached"),
                }),
                "branch" => SlashCommand::Git(GitCommand::Branch),
                _ => SlashCommand::Usage("/git status|log|diff [--staged]|branch"),
            }
        }
        "run" | "!" => required("/run <command>", SlashCommand::Run),
        "quit" | "exit" | "q" => SlashCommand::Quit,
        other => SlashCommand::Unknown(other.to_string()),
    };
    Some(command)
}

enum Flow {
    Continue,
    Quit,
}

/// REPL state that outlives individual turns.
struct ChatSession {
    runtime: Runtime,
    provider: ResolvedProvider,
}

impl ChatSession {
    async fn start_session(&self, agent: &Agent) {
        if let Err(e) = self
            .runtime
            .sessions()
            .new_session(&self.provider.name, &self.provider.model, agent.cwd())
            .await
        {
            warn!("Failed to start session: {}", e);
            Output::warning("Session storage unavailable; this conversation will not be saved.");
        }
    }

    async fn resume(&self, agent: &mut Agent, id: &str) -> Result<()> {
        let store = self.runtime.sessions();
        let session = store.resolve_id(id).await?;
        let (session, messages) = store.load_session(&session.id).await?;
        agent.load_messages(messages.iter().map(Message::from));
        Output::success(&format!(
            "Resumed {} ({}, {} messages)",
            session.short_id(),
            session.title,
            messages.len()
        ));
        Ok(())
    }

    fn switch(&mut self, agent: &mut Agent, provider: ResolvedProvider) -> Result<()> {
        let transport = self.runtime.transport(&provider)?;
        agent.replace_transport(transport, true);
        Output::success(&format!("Now using {} ({})", provider.model, provider.name));
        self.provider = provider;
        Ok(())
    }

    async fn handle(&mut self, agent: &mut Agent, command: SlashCommand) -> Result<Flow> {
        match command {
            SlashCommand::Help => println!("{}", style(HELP).dim()),
            SlashCommand::Clear => {
                agent.clear_history();
                Output::info("Conversation cleared.");
            }
            SlashCommand::New => {
                agent.clear_history();
                self.start_session(agent).await;
                Output::info("Started a new session.");
            }
            SlashCommand::Model(None) => {
                Output::kv("Model", &self.provider.model);
            }
            SlashCommand::Model(Some(model)) => {
                let provider = self
                    .runtime
                    .resolve(Some(&self.provider.name), Some(&model))?;
                self.switch(agent, provider)?;
            }
            SlashCommand::Provider(None) => {
                Output::kv("Provider", &self.provider.name);
                Output::kv("Model", &self.provider.model);
                Output::kv("Endpoint", &self.provider.base_url);
                Output::kv("Key", &self.provider.masked_key());
            }
            SlashCommand::Provider(Some(name)) => {
                let provider = self.runtime.resolve(Some(&name), None)?;
                self.switch(agent, provider)?;
            }
            SlashCommand::Providers => {
                print_providers(self.runtime.settings(), &self.provider.name)
            }
            SlashCommand::Sessions => {
                let store = self.runtime.sessions();
                let current = store.current().await.map(|s| s.id);
                Output::header("Recent sessions");
                print_session_list(&store.list_sessions(10).await?, current.as_deref());
            }
            SlashCommand::Resume(id) => self.resume(agent, &id).await?,
            SlashCommand::Stats => {
                let stats = agent.stats();
                Output::header("This run");
                Output::kv("Requests", &stats.total_requests.to_string());
                Output::kv("Errors", &stats.total_errors.to_string());
                Output::kv("Tokens", &stats.total_tokens.to_string());
                Output::kv("Messages in context", &agent.message_count().to_string());
                if let Some(at) = stats.last_request_time {
                    Output::kv("Last request", &at.format("%H:%M:%S").to_string());
                }
                Output::header("All sessions");
                print_session_stats(&self.runtime.sessions().stats().await?);
            }
            SlashCommand::Export => {
                let store = self.runtime.sessions();
                let Some(session) = store.current().await else {
                    Output::warning("No active session.");
                    return Ok(Flow::Continue);
                };
                let json = store.export_session(&session.id).await?;
                let path = agent
                    .cwd()
                    .join(format!("skiff-session-{}.json", session.short_id()));
                std::fs::write(&path, json)?;
                Output::success(&format!("Exported to {}", path.display()));
            }
            SlashCommand::Tools => print_tools(),
            SlashCommand::Ls(path) => {
                let call = ToolCall::new("list_directory")
                    .with_param("path", path.unwrap_or_else(|| ".".into()));
                print_result(&agent.execute_tool(&call).await);
            }
            SlashCommand::Cat(path) => {
                let call = ToolCall::new("read_file").with_param("path", path);
                print_result(&agent.execute_tool(&call).await);
            }
            SlashCommand::Pwd => print_result(&agent.execute_tool(&ToolCall::new("get_cwd")).await),
            SlashCommand::Cd(path) => {
                let call = ToolCall::new("change_directory").with_param("path", path);
                print_result(&agent.execute_tool(&call).await);
            }
            SlashCommand::Git(git) => {
                let call = match git {
                    GitCommand::Status => ToolCall::new("git_status"),
                    GitCommand::Log => ToolCall::new("git_log"),
                    GitCommand::Diff { staged } => {
                        ToolCall::new("git_diff").with_param("staged", staged.to_string())
                    }
                    GitCommand::Branch => ToolCall::new("git_branch"),
                };
                print_result(&agent.execute_tool(&call).await);
            }
            SlashCommand::Run(command) => {
                let call = ToolCall::new("run_command").with_param("command", command);
                print_result(&agent.execute_tool(&call).await);
            }
            SlashCommand::Quit => return Ok(Flow::Quit),
            SlashCommand::Usage(usage) => Output::warning(&format!("Usage: {}", usage)),
            SlashCommand::Unknown(name) => {
                Output::warning(&format!("Unknown command /{}. Type /help for a list.", name))
            }
        }
        Ok(Flow::Continue)
    }
}

enum Input {
    Line(String),
    Eof,
    Interrupted,
}

/// Read one line from stdin, giving up on Ctrl+C.
async fn read_input() -> Result<Input> {
    let read = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        let n = io::stdin().lock().read_line(&mut line)?;
        Ok::<_, io::Error>(if n == 0 { Input::Eof } else { Input::Line(line) })
    });
    tokio::select! {
        input = read => Ok(input??),
        _ = tokio::signal::ctrl_c() => Ok(Input::Interrupted),
    }
}

fn print_result(result: &ToolResult) {
    if result.success {
        println!("{}", result.output);
    } else {
        Output::error(result.error.as_deref().unwrap_or("failed"));
        if !result.output.is_empty() {
            Output::block(&result.output);
        }
    }
}

/// Run the interactive chat command.
pub async fn run_chat(
    runtime: Runtime,
    provider: Option<String>,
    model: Option<String>,
    resume: Option<String>,
) -> Result<()> {
    let resolved = preflight::provider(runtime.settings(), provider.as_deref(), model.as_deref())?;
    preflight::warn_missing_tools();

    let cwd = std::env::current_dir()?;
    let mut agent = runtime.agent(&resolved, &cwd)?;
    let mut chat = ChatSession {
        runtime,
        provider: resolved,
    };

    match resume {
        Some(id) => chat.resume(&mut agent, &id).await?,
        None => chat.start_session(&agent).await,
    }

    println!("\n{}", style("Skiff").bold().cyan());
    println!(
        "{}",
        style(format!(
            "{} via {} in {}",
            chat.provider.model,
            chat.provider.name,
            agent.cwd().display()
        ))
        .dim()
    );
    println!(
        "{}\n",
        style("Type a message, /help for commands, Ctrl+C to interrupt a reply.").dim()
    );

    let mut stdout = io::stdout();

    loop {
        print!("{} ", style("You:").green().bold());
        stdout.flush()?;

        let input = match read_input().await? {
            Input::Line(line) => line,
            Input::Eof => {
                println!();
                break;
            }
            Input::Interrupted => {
                println!();
                Output::info("Goodbye!");
                // The abandoned stdin read would keep the runtime from shutting down.
                std::process::exit(0);
            }
        };

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        match parse_slash(input) {
            Some(command) => match chat.handle(&mut agent, command).await {
                Ok(Flow::Quit) => break,
                Ok(Flow::Continue) => {}
                Err(e) => Output::error(&e.to_string()),
            },
            None => {
                let (next, _) = drive_turn(agent, input.to_string()).await?;
                agent = next;
            }
        }
    }

    Output::info("Goodbye!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert_eq!(parse_slash("list the files"), None);
        assert_eq!(parse_slash("  what is /tmp?"), None);
    }

    #[test]
    fn test_parse_commands_with_arguments() {
        assert_eq!(parse_slash("/cat src/main.rs"), Some(SlashCommand::Cat("src/main.rs".into())));
        assert_eq!(parse_slash("/run  ls -la "), Some(SlashCommand::Run("ls -la".into())));
        assert_eq!(parse_slash("/ls"), Some(SlashCommand::Ls(None)));
        assert_eq!(parse_slash("/model gpt-4o"), Some(SlashCommand::Model(Some("gpt-4o".into()))));
        assert_eq!(parse_slash("/EXIT"), Some(SlashCommand::Quit));
    }

    #[test]
    fn test_missing_argument_gives_usage() {
        assert_eq!(parse_slash("/cd"), Some(SlashCommand::Usage("/cd <path>")));
        assert_eq!(parse_slash("/resume"), Some(SlashCommand::Usage("/resume <id>")));
    }

    #[test]
    fn test_git_subcommands() {
        assert_eq!(parse_slash("/git"), Some(SlashCommand::Git(GitCommand::Status)));
        assert_eq!(
            parse_slash("/git diff --staged"),
            Some(SlashCommand::Git(GitCommand::Diff { staged: true }))
        );
        assert_eq!(
            parse_slash("/git diff"),
            Some(SlashCommand::Git(GitCommand::Diff { staged: false }))
        );
        assert!(matches!(parse_slash("/git rebase"), Some(SlashCommand::Usage(_))));
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(parse_slash("/frobnicate"), Some(SlashCommand::Unknown("frobnicate".into())));
    }
}
