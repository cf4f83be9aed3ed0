//! Agent runner with the text-embedded tool calling loop.

use super::events::{AgentEvent, EventSink, TurnHandle, TurnOutcome};
use super::protocol::{
    extract_calls, format_result, strip_calls, strip_think_blocks, tool_results_message,
};
use super::stats::{ClientStats, SharedStats};
use crate::session::SessionStore;
use crate::tools::{indicator, start_label, ExecutionContext, Executor, ToolCall, ToolResult};
use crate::transport::{ChatTransport, Message, Role, TransportError};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default cap on model round-trips per turn.
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// Default length of tool output shown to the user.
pub const DEFAULT_PREVIEW_CHARS: usize = 800;

/// Tunables for the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub max_iterations: usize,
    /// Characters of tool output carried in `ToolFinished` previews.
    pub preview_chars: usize,
    /// Show `<think>` spans instead of hiding them.
    pub show_thinking: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            preview_chars: DEFAULT_PREVIEW_CHARS,
            show_thinking: false,
        }
    }
}

/// Where the loop is within a turn. Only used for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    AwaitingModel,
    ToolsPending,
    ExecutingTools,
    Done,
    Errored,
    Cancelled,
}

/// Text shown to the user during one turn, kept for the session log.
#[derive(Default)]
struct Transcript {
    parts: Vec<String>,
    tokens: u64,
}

impl Transcript {
    fn push(&mut self, text: &str) {
        if !text.is_empty() {
            self.parts.push(text.to_string());
        }
    }
}

/// Conversational agent that runs tools named inside the model's replies.
pub struct Agent {
    transport: Box<dyn ChatTransport>,
    executor: Executor,
    context: ExecutionContext,
    history: Vec<Message>,
    stats: SharedStats,
    session: Option<Arc<dyn SessionStore>>,
    config: AgentConfig,
    state: LoopState,
}

impl Agent {
    /// Create an agent whose history starts with `system_prompt`.
    pub fn new<T>(transport: T, system_prompt: impl Into<String>, context: ExecutionContext) -> Self
    where
        T: ChatTransport + 'static,
    {
        Self {
            transport: Box::new(transport),
            executor: Executor::new(),
            context,
            history: vec![Message::system(system_prompt)],
            stats: SharedStats::new(),
            session: None,
            config: AgentConfig::default(),
            state: LoopState::Idle,
        }
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// Record every finished turn to `store`'s current session.
    pub fn with_session(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.session = Some(store);
        self
    }

    /// Share counters with a reader that outlives turns.
    pub fn with_stats(mut self, stats: SharedStats) -> Self {
        self.stats = stats;
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn message_count(&self) -> usize {
        self.history.len()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stats(&self) -> ClientStats {
        self.stats.snapshot()
    }

    pub fn shared_stats(&self) -> SharedStats {
        self.stats.clone()
    }

    pub fn session_store(&self) -> Option<&Arc<dyn SessionStore>> {
        self.session.as_ref()
    }

    pub fn cwd(&self) -> &Path {
        &self.context.cwd
    }

    /// Drop everything but the system message.
    pub fn clear_history(&mut self) {
        self.history.truncate(1);
        debug!("History cleared");
    }

    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        match self.history.first_mut() {
            Some(first) if first.role == Role::System => first.content = prompt.into(),
            _ => self.history.insert(0, Message::system(prompt)),
        }
    }

    /// Replace the conversation with restored messages. The current system
    /// message is kept; system messages in `messages` are ignored.
    pub fn load_messages(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.clear_history();
        self.history
            .extend(messages.into_iter().filter(|m| m.role != Role::System));
        debug!("Loaded {} messages", self.history.len() - 1);
    }

    /// Swap the model backend, e.g. after a provider switch.
    pub fn replace_transport<T>(&mut self, transport: T, preserve_history: bool)
    where
        T: ChatTransport + 'static,
    {
        self.transport = Box::new(transport);
        if !preserve_history {
            self.clear_history();
        }
    }

    /// Run one tool directly against this agent's context.
    pub async fn execute_tool(&mut self, call: &ToolCall) -> ToolResult {
        self.executor.execute(call, &mut self.context).await
    }

    /// Move the agent onto its own task for one turn.
    pub fn spawn_turn(mut self, input: impl Into<String>) -> TurnHandle {
        let input = input.into();
        let cancel = CancellationToken::new();
        let (sink, events) = EventSink::channel(cancel.clone());
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            self.run_turn(&input, &sink, &token).await;
            self
        });

        TurnHandle::new(events, cancel, task)
    }

    /// Process one user input to completion.
    ///
    /// Always ends with exactly one [`AgentEvent::Finished`] on `sink`.
    pub async fn run_turn(
        &mut self,
        input: &str,
        sink: &EventSink,
        cancel: &CancellationToken,
    ) -> TurnOutcome {
        let mut transcript = Transcript::default();
        let outcome = self.drive(input, sink, cancel, &mut transcript).await;
        self.record_turn(input, &transcript).await;
        self.transition(LoopState::Idle);
        sink.finish(outcome.clone()).await;
        outcome
    }

    async fn drive(
        &mut self,
        input: &str,
        sink: &EventSink,
        cancel: &CancellationToken,
        transcript: &mut Transcript,
    ) -> TurnOutcome {
        self.history.push(Message::user(input));

        for iteration in 1..=self.config.max_iterations {
            if cancel.is_cancelled() {
                return self.cancelled();
            }

            self.transition(LoopState::AwaitingModel);
            debug!("Agent iteration {}", iteration);

            let completion = match self.transport.complete(&self.history, cancel).await {
                Ok(completion) => {
                    self.stats.record_success(completion.total_tokens);
                    completion
                }
                Err(TransportError::Cancelled) => return self.cancelled(),
                Err(e) => {
                    self.stats.record_error();
                    self.transition(LoopState::Errored);
                    let error = e.to_string();
                    sink.emit(AgentEvent::Error(error.clone())).await;
                    return TurnOutcome::Failed { error };
                }
            };
            transcript.tokens += completion.total_tokens.unwrap_or(0);

            let raw = completion.text;
            let calls = extract_calls(&raw);

            if calls.is_empty() {
                let answer = self.display_text(&raw);
                transcript.push(&answer);
                sink.emit(AgentEvent::Answer(answer.clone())).await;
                self.history.push(Message::assistant(raw));
                self.transition(LoopState::Done);
                return TurnOutcome::Completed { answer };
            }

            self.transition(LoopState::ToolsPending);
            let preamble = self.display_text(&strip_calls(&raw));
            if !preamble.is_empty() {
                transcript.push(&preamble);
                sink.emit(AgentEvent::Text(preamble)).await;
            }

            self.transition(LoopState::ExecutingTools);
            let (results, interrupted) = self.run_calls(&calls, sink, cancel).await;

            self.history.push(Message::assistant(raw));
            if !results.is_empty() {
                self.history.push(Message::user(tool_results_message(&results)));
            }
            if interrupted {
                return self.cancelled();
            }
        }

        let warning = format!("Maximum tool iterations reached ({})", self.config.max_iterations);
        warn!("{}", warning);
        sink.emit(AgentEvent::Warning(warning)).await;
        self.transition(LoopState::Done);
        TurnOutcome::IterationLimit {
            iterations: self.config.max_iterations,
        }
    }

    /// Execute calls in order. Returns the formatted results and whether the
    /// turn was cancelled part way.
    async fn run_calls(
        &mut self,
        calls: &[ToolCall],
        sink: &EventSink,
        cancel: &CancellationToken,
    ) -> (Vec<String>, bool) {
        let mut results = Vec::with_capacity(calls.len());

        for call in calls {
            if cancel.is_cancelled() {
                return (results, true);
            }

            sink.emit(AgentEvent::ToolStarted {
                name: call.name.clone(),
                indicator: indicator(&call.name),
                label: start_label(call),
            })
            .await;

            let started = Instant::now();
            let result = tokio::select! {
                result = self.executor.execute(call, &mut self.context) => Some(result),
                _ = cancel.cancelled() => None,
            };
            let Some(result) = result else {
                debug!("Tool {} interrupted", call.name);
                return (results, true);
            };
            let elapsed = started.elapsed();

            info!(
                tool = %call.name,
                success = result.success,
                elapsed_ms = elapsed.as_millis() as u64,
                "Tool finished"
            );

            sink.emit(AgentEvent::ToolFinished {
                name: call.name.clone(),
                success: result.success,
                elapsed,
                preview: preview(&result.output, self.config.preview_chars),
                error: result.error.clone(),
            })
            .await;

            results.push(format_result(call, &result));
        }

        (results, false)
    }

    fn display_text(&self, text: &str) -> String {
        if self.config.show_thinking {
            text.trim().to_string()
        } else {
            strip_think_blocks(text)
        }
    }

    fn cancelled(&mut self) -> TurnOutcome {
        self.transition(LoopState::Cancelled);
        TurnOutcome::Cancelled
    }

    fn transition(&mut self, next: LoopState) {
        if self.state != next {
            debug!("Agent state {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    async fn record_turn(&self, input: &str, transcript: &Transcript) {
        let Some(store) = &self.session else {
            return;
        };

        if let Err(e) = store.add_message(Role::User, input, 0).await {
            warn!("Failed to record user message: {}", e);
            return;
        }
        if transcript.parts.is_empty() {
            return;
        }
        let text = transcript.parts.join("\n\n");
        if let Err(e) = store.add_message(Role::Assistant, &text, transcript.tokens).await {
            warn!("Failed to record assistant message: {}", e);
        }
    }
}

/// First `max` characters of `text`, marked when cut.
fn preview(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max).collect();
    cut.push_str("\n... (truncated)");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySessionStore;
    use crate::transport::{Completion, ScriptedTransport};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    async fn collect(rx: &mut mpsc::Receiver<AgentEvent>) -> Vec<AgentEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn agent_in(dir: &Path, transport: Arc<ScriptedTransport>) -> Agent {
        Agent::new(transport, "You are a test agent.", ExecutionContext::new(dir))
    }

    #[tokio::test]
    async fn test_list_files_scenario() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("alpha.txt"), "a").unwrap();
        std::fs::write(dir.path().join("beta.txt"), "b").unwrap();

        let transport = Arc::new(ScriptedTransport::texts([
            "Let me look.\n<tool_call>{\"name\": \"list_directory\", \"params\": {\"path\": \".\"}}</tool_call>",
            "There are two files: alpha.txt and beta.txt.",
        ]));
        let mut agent = agent_in(dir.path(), transport.clone());
        let cancel = CancellationToken::new();
        let (sink, mut rx) = EventSink::channel(cancel.clone());

        let outcome = agent.run_turn("list files", &sink, &cancel).await;
        assert_eq!(
            outcome,
            TurnOutcome::Completed {
                answer: "There are two files: alpha.txt and beta.txt.".to_string()
            }
        );

        let events = collect(&mut rx).await;
        assert_eq!(events[0], AgentEvent::Text("Let me look.".to_string()));
        assert!(matches!(
            &events[1],
            AgentEvent::ToolStarted { name, .. } if name == "list_directory"
        ));
        match &events[2] {
            AgentEvent::ToolFinished { name, success, preview, .. } => {
                assert_eq!(name, "list_directory");
                assert!(success);
                assert!(preview.contains("alpha.txt"));
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(matches!(&events[3], AgentEvent::Answer(a) if a.contains("two files")));
        assert!(matches!(&events[4], AgentEvent::Finished(TurnOutcome::Completed { .. })));
        assert_eq!(events.len(), 5);

        // system, user, assistant(call), user(results), assistant(answer)
        let history = agent.history();
        assert_eq!(history.len(), 5);
        assert_eq!(history[3].role, Role::User);
        assert!(history[3]
            .content
            .starts_with("Tool results:\n<tool_result name=\"list_directory\">"));
        assert!(history[3].content.contains("beta.txt"));

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].len(), 4);
        assert_eq!(agent.stats().total_requests, 2);
        assert_eq!(agent.state(), LoopState::Idle);
    }

    #[tokio::test]
    async fn test_unknown_tool_reported_to_model() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(ScriptedTransport::texts([
            "<tool_call>{\"name\": \"frobnicate\", \"params\": {}}</tool_call>",
            "That tool does not exist.",
        ]));
        let mut agent = agent_in(dir.path(), transport.clone());
        let cancel = CancellationToken::new();
        let (sink, mut rx) = EventSink::channel(cancel.clone());

        let outcome = agent.run_turn("do it", &sink, &cancel).await;
        assert!(outcome.is_success());

        let events = collect(&mut rx).await;
        assert!(events.iter().any(|e| matches!(
            e,
            AgentEvent::ToolFinished { success: false, error: Some(err), .. } if err == "unknown tool: frobnicate"
        )));
        // No prose before the call, so no Text event.
        assert!(!events.iter().any(|e| matches!(e, AgentEvent::Text(_))));

        let results = &transport.requests()[1][3].content;
        assert!(results.contains(
            "<tool_result name=\"frobnicate\">\nError: unknown tool: frobnicate\n</tool_result>"
        ));
    }

    #[tokio::test]
    async fn test_iteration_cap_stops_without_extra_call() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(ScriptedTransport::repeating(Ok(Completion::from_text(
            "<tool_call>{\"name\": \"get_cwd\"}</tool_call>",
        ))));
        let mut agent = agent_in(dir.path(), transport.clone());
        let cancel = CancellationToken::new();
        let (sink, mut rx) = EventSink::channel(cancel.clone());

        let outcome = agent.run_turn("loop forever", &sink, &cancel).await;
        assert_eq!(outcome, TurnOutcome::IterationLimit { iterations: 10 });
        assert_eq!(transport.calls(), 10);

        let events = collect(&mut rx).await;
        assert!(events.contains(&AgentEvent::Warning(
            "Maximum tool iterations reached (10)".to_string()
        )));
        assert_eq!(
            events.last(),
            Some(&AgentEvent::Finished(TurnOutcome::IterationLimit { iterations: 10 }))
        );
        let finished = events.iter().filter(|e| matches!(e, AgentEvent::Finished(_))).count();
        assert_eq!(finished, 1);
    }

    #[tokio::test]
    async fn test_clear_history_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(ScriptedTransport::texts(["hello"]));
        let mut agent = agent_in(dir.path(), transport);
        let cancel = CancellationToken::new();
        let (sink, _rx) = EventSink::channel(cancel.clone());
        agent.run_turn("hi", &sink, &cancel).await;
        assert_eq!(agent.message_count(), 3);

        agent.clear_history();
        let once = agent.history().to_vec();
        agent.clear_history();
        assert_eq!(agent.history(), once.as_slice());
        assert_eq!(once, vec![Message::system("You are a test agent.")]);
    }

    #[tokio::test]
    async fn test_transport_failure_keeps_user_message() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(ScriptedTransport::new(vec![Err(TransportError::Http {
            status: 401,
            message: "invalid api key".to_string(),
        })]));
        let mut agent = agent_in(dir.path(), transport);
        let cancel = CancellationToken::new();
        let (sink, mut rx) = EventSink::channel(cancel.clone());

        let outcome = agent.run_turn("hello", &sink, &cancel).await;
        assert!(matches!(
            outcome,
            TurnOutcome::Failed { ref error } if error.contains("invalid api key")
        ));
        assert_eq!(agent.history().len(), 2);
        assert_eq!(agent.history()[1], Message::user("hello"));
        assert_eq!(agent.stats().total_errors, 1);

        let events = collect(&mut rx).await;
        assert!(matches!(&events[0], AgentEvent::Error(_)));
        assert!(matches!(&events[1], AgentEvent::Finished(TurnOutcome::Failed { .. })));
    }

    #[tokio::test]
    async fn test_cancelled_turn_makes_no_call() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(ScriptedTransport::texts(["unused"]));
        let mut agent = agent_in(dir.path(), transport.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (sink, mut rx) = EventSink::channel(cancel.clone());

        assert_eq!(agent.run_turn("hi", &sink, &cancel).await, TurnOutcome::Cancelled);
        assert_eq!(transport.calls(), 0);
        assert_eq!(agent.stats().total_errors, 0);
        assert_eq!(
            collect(&mut rx).await,
            vec![AgentEvent::Finished(TurnOutcome::Cancelled)]
        );
    }

    #[tokio::test]
    async fn test_cancel_while_tool_runs_keeps_partial_results() {
        let dir = TempDir::new().unwrap();
        let reply = "Checking.\n<tool_call>{\"name\": \"get_cwd\"}</tool_call>\n\
                     <tool_call>{\"name\": \"run_command\", \"params\": {\"command\": \"sleep 5\"}}</tool_call>";
        let transport = Arc::new(ScriptedTransport::texts([reply, "unused"]));
        let mut agent = agent_in(dir.path(), transport.clone());
        let cancel = CancellationToken::new();
        let (sink, mut rx) = EventSink::channel(cancel.clone());

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let outcome = agent.run_turn("where am I?", &sink, &cancel).await;

        assert_eq!(outcome, TurnOutcome::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(transport.calls(), 1);
        assert_eq!(agent.state(), LoopState::Idle);

        let roles: Vec<Role> = agent.history().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
        assert_eq!(agent.history()[2].content, reply);
        let results = &agent.history()[3].content;
        assert!(results.contains("<tool_result name=\"get_cwd\">"));
        assert!(!results.contains("run_command"));

        let events = collect(&mut rx).await;
        assert_eq!(events.last(), Some(&AgentEvent::Finished(TurnOutcome::Cancelled)));
    }

    #[tokio::test]
    async fn test_think_blocks_hidden_unless_enabled() {
        let dir = TempDir::new().unwrap();
        let reply = "<think>pondering</think>The answer is 4.";

        let mut agent = agent_in(dir.path(), Arc::new(ScriptedTransport::texts([reply])));
        let cancel = CancellationToken::new();
        let (sink, _rx) = EventSink::channel(cancel.clone());
        let outcome = agent.run_turn("2+2", &sink, &cancel).await;
        assert_eq!(outcome, TurnOutcome::Completed { answer: "The answer is 4.".to_string() });
        // History keeps the raw reply.
        assert_eq!(agent.history()[2].content, reply);

        let mut agent = agent_in(dir.path(), Arc::new(ScriptedTransport::texts([reply])))
            .with_config(AgentConfig {
                show_thinking: true,
                ..AgentConfig::default()
            });
        let outcome = agent.run_turn("2+2", &sink, &cancel).await;
        assert_eq!(outcome, TurnOutcome::Completed { answer: reply.to_string() });
    }

    #[tokio::test]
    async fn test_change_directory_persists_across_calls() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("note.txt"), "inside").unwrap();

        let transport = Arc::new(ScriptedTransport::texts([
            "<tool_call>{\"name\": \"change_directory\", \"params\": {\"path\": \"sub\"}}</tool_call>\
             <tool_call>{\"name\": \"read_file\", \"params\": {\"path\": \"note.txt\"}}</tool_call>",
            "It says inside.",
        ]));
        let mut agent = agent_in(dir.path(), transport.clone());
        let cancel = CancellationToken::new();
        let (sink, _rx) = EventSink::channel(cancel.clone());
        agent.run_turn("read the note", &sink, &cancel).await;

        assert_eq!(agent.cwd(), dir.path().join("sub"));
        let results = &transport.requests()[1][3].content;
        let change = results.find("change_directory").unwrap();
        let read = results.find("read_file").unwrap();
        assert!(change < read);
        assert!(results.contains("inside"));
    }

    #[tokio::test]
    async fn test_spawn_turn_returns_agent() {
        let dir = TempDir::new().unwrap();
        let agent = agent_in(dir.path(), Arc::new(ScriptedTransport::texts(["done"])));

        let mut handle = agent.spawn_turn("go");
        let mut last = None;
        while let Some(event) = handle.next_event().await {
            let finished = matches!(event, AgentEvent::Finished(_));
            last = Some(event);
            if finished {
                break;
            }
        }
        assert_eq!(
            last,
            Some(AgentEvent::Finished(TurnOutcome::Completed { answer: "done".to_string() }))
        );

        let agent = handle.finish().await.unwrap();
        assert_eq!(agent.message_count(), 3);
    }

    #[tokio::test]
    async fn test_records_turn_to_session() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemorySessionStore::new());
        let session = store.new_session("test", "scripted", dir.path()).await.unwrap();

        let transport = Arc::new(ScriptedTransport::new(vec![
            Ok(Completion::from_text("Checking.<tool_call>{\"name\": \"get_cwd\"}</tool_call>")),
            Ok(Completion {
                text: "Here.".to_string(),
                total_tokens: Some(12),
                finish_reason: Some("stop".to_string()),
            }),
        ]));
        let mut agent = agent_in(dir.path(), transport).with_session(store.clone());
        let cancel = CancellationToken::new();
        let (sink, _rx) = EventSink::channel(cancel.clone());
        agent.run_turn("where am I", &sink, &cancel).await;

        let messages = store.get_messages(&session.id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "where am I");
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].content, "Checking.\n\nHere.");
        assert_eq!(messages[1].tokens, 12);
    }

    #[tokio::test]
    async fn test_load_messages_and_replace_transport() {
        let dir = TempDir::new().unwrap();
        let mut agent = agent_in(dir.path(), Arc::new(ScriptedTransport::default()));
        agent.load_messages(vec![
            Message::system("stale prompt"),
            Message::user("earlier"),
            Message::assistant("reply"),
        ]);
        assert_eq!(agent.message_count(), 3);
        assert_eq!(agent.history()[0].content, "You are a test agent.");

        agent.replace_transport(ScriptedTransport::default(), true);
        assert_eq!(agent.message_count(), 3);
        agent.replace_transport(ScriptedTransport::default(), false);
        assert_eq!(agent.message_count(), 1);

        agent.set_system_prompt("new prompt");
        assert_eq!(agent.history(), &[Message::system("new prompt")]);
    }

    #[test]
    fn test_preview_truncates_by_chars() {
        assert_eq!(preview("short", 10), "short");
        let cut = preview(&"é".repeat(20), 5);
        assert!(cut.starts_with("ééééé\n"));
        assert!(cut.ends_with("(truncated)"));
    }
}
