//! Session Controller
//!
//! Owns the active memory policy, prompt builder and response intake, and
//! drives the `NoSession` / `ActiveSession` lifecycle.

use async_trait::async_trait;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::MemoriaConfig;
use crate::conversation::{USER_TAG, history_budget, input_budget};
use crate::display::DisplaySink;
use crate::error::{MemoriaError, Result};
use crate::intake::{ActivityIndicator, IntakeState, ResponseIntake};
use crate::llm::{ModelService, OllamaService, StreamEvent};
use crate::memory::{MemoryPolicy, Summarizer, build_policy};
use crate::prompt::{PromptBuilder, PromptBuilderFactory};

use super::id::{extract_session_id, generate_session_id};
use super::store::{FileSessionStore, SavedSession, SessionStore};

/// Label shown in place of the `User: ` tag when history is replayed
pub const REPLAY_USER_LABEL: &str = "You: ";

/// Lifecycle state of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoSession,
    ActiveSession,
}

/// Summarizer that round-trips through the model service using the active
/// prompt builder's summarization template
pub struct LlmSummarizer {
    model: Arc<dyn ModelService>,
    prompts: Arc<dyn PromptBuilder>,
}

impl LlmSummarizer {
    pub fn new(model: Arc<dyn ModelService>, prompts: Arc<dyn PromptBuilder>) -> Self {
        Self { model, prompts }
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, raw_text: &str) -> String {
        let prompt = self.prompts.build_summarization_prompt(raw_text);
        self.model.request(&prompt).await
    }
}

/// Coordinates one terminal chat session at a time
pub struct SessionController {
    config: MemoriaConfig,
    config_path: Option<PathBuf>,
    model: Arc<dyn ModelService>,
    store: Arc<dyn SessionStore>,
    display: Arc<dyn DisplaySink>,
    prompts: Arc<dyn PromptBuilder>,
    summarizer: Arc<LlmSummarizer>,
    memory: Box<dyn MemoryPolicy>,
    intake: ResponseIntake,
    session_id: Option<String>,
    state: SessionState,
}

impl SessionController {
    /// Create a builder
    pub fn builder() -> SessionControllerBuilder {
        SessionControllerBuilder::new()
    }

    /// Start a fresh session, ending the active one first
    pub async fn start(&mut self) {
        if self.state == SessionState::ActiveSession {
            self.end().await;
        }

        let session_id = generate_session_id();
        self.memory.reset();
        self.state = SessionState::ActiveSession;

        info!(session_id = %session_id, memory = %self.memory.kind(), prompt = self.prompts.name(), "Session started");
        self.session_id = Some(session_id);
    }

    /// End the active session and persist it. No-op without one.
    pub async fn end(&mut self) {
        if self.state == SessionState::NoSession {
            return;
        }

        let session_id = self.session_id.take().unwrap_or_else(generate_session_id);
        let turns = self.memory.log().snapshot();
        let context = self.memory.context(history_budget(self.config.max_total_tokens));

        if let Err(e) = self.store.save(&session_id, &turns, &context).await {
            warn!(session_id = %session_id, error = %e, "Failed to save session");
        } else {
            info!(session_id = %session_id, turns = turns.len(), "Session saved");
        }

        self.state = SessionState::NoSession;
    }

    /// Restore a saved session and replay its turns on the display.
    ///
    /// The session id comes from `saved_identifier`; an identifier without
    /// one gets a fresh id.
    pub async fn resume(&mut self, saved_identifier: &str, turns: Vec<String>, context: Vec<String>) {
        if self.state == SessionState::ActiveSession {
            self.end().await;
        }

        let session_id = extract_session_id(saved_identifier).unwrap_or_else(|| {
            let id = generate_session_id();
            warn!(identifier = saved_identifier, session_id = %id, "No session id in identifier, using a new one");
            id
        });

        self.memory.reset();
        self.memory.log_mut().restore(turns);
        self.memory.set_context(context).await;

        for turn in self.memory.log().turns() {
            let text = turn.text();
            let line = match text.strip_prefix(USER_TAG) {
                Some(content) => format!("{}{}\n", REPLAY_USER_LABEL, content),
                None => format!("{}\n", text),
            };
            self.display.show(&line);
        }

        info!(session_id = %session_id, turns = self.memory.log().len(), "Session resumed");
        self.session_id = Some(session_id);
        self.state = SessionState::ActiveSession;
    }

    /// Load a session through the store and resume it.
    ///
    /// An unreadable session resumes as empty.
    pub async fn resume_saved(&mut self, identifier: &str) {
        let saved = match self.store.load(identifier).await {
            Ok(saved) => saved,
            Err(e) => {
                warn!(identifier, error = %e, "Failed to load session, resuming empty");
                SavedSession::default()
            }
        };
        self.resume(identifier, saved.turns, saved.context).await;
    }

    /// Send one user input and stream the response onto the display.
    ///
    /// Returns once the response is fully received and the memory policy has
    /// been notified. Failures are shown as a single `Error: ...` message and
    /// leave the session usable.
    pub async fn process_input(&mut self, user_input: &str) {
        if self.state == SessionState::NoSession {
            debug!("No active session, starting one");
            self.start().await;
        }

        let budget = input_budget(self.config.max_total_tokens, user_input);
        let context = self.memory.context_string(budget);
        let prompt = self.prompts.build_prompt(user_input, &context);
        debug!(budget, context_tokens = crate::conversation::count_tokens(&context), "Built prompt");

        self.memory.log_mut().append(format!("{}{}", USER_TAG, user_input));
        self.intake.begin(self.memory.log_mut()).await;

        let mut stream = match self.model.stream(&prompt).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "Failed to dispatch prompt");
                self.intake.fail(&e.to_string()).await;
                self.intake.abort(self.memory.log_mut()).await;
                return;
            }
        };

        let mut ended = false;
        while let Some(event) = stream.next().await {
            match event {
                Ok(StreamEvent::Fragment(fragment)) => {
                    self.intake.accept(&fragment, self.memory.log_mut()).await;
                }
                Ok(StreamEvent::End) => {
                    ended = true;
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Response stream failed");
                    self.intake.fail(&e.to_string()).await;
                    ended = true;
                    break;
                }
            }
        }
        if !ended {
            warn!("Response stream closed without end sentinel");
        }

        self.intake.finish(self.memory.as_mut()).await;
    }

    /// Synchronous summarization round-trip through the model service.
    ///
    /// The summary memory policy calls the same summarizer.
    pub async fn summarize(&self, raw_text: &str) -> String {
        self.summarizer.summarize(raw_text).await
    }

    /// Switch the prompt builder variant.
    ///
    /// Persists the setting, ends the current session and starts a new one.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown id; nothing changes then.
    pub async fn update_model(&mut self, model_id: &str) -> Result<()> {
        let prompts = PromptBuilderFactory::create(model_id, self.config.system_prompt.as_deref())?;
        let summarizer = Arc::new(LlmSummarizer::new(
            Arc::clone(&self.model),
            Arc::clone(&prompts),
        ));
        let memory = build_policy(
            &self.config.memory,
            Arc::clone(&summarizer) as Arc<dyn Summarizer>,
            self.config.max_total_tokens,
        )?;

        self.config.model = model_id.to_string();
        self.persist_config();

        self.end().await;
        self.prompts = prompts;
        self.summarizer = summarizer;
        self.memory = memory;
        self.start().await;
        Ok(())
    }

    /// Switch the memory policy variant.
    ///
    /// Persists the setting, ends the current session and starts a new one.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown id; nothing changes then.
    pub async fn update_memory(&mut self, memory_id: &str) -> Result<()> {
        let memory = build_policy(
            memory_id,
            Arc::clone(&self.summarizer) as Arc<dyn Summarizer>,
            self.config.max_total_tokens,
        )?;

        self.config.memory = memory.kind().to_string();
        self.persist_config();

        self.end().await;
        self.memory = memory;
        self.start().await;
        Ok(())
    }

    /// Saved session identifiers, newest first. Empty when the store fails.
    pub async fn list_sessions(&self) -> Vec<String> {
        match self.store.list().await {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!(error = %e, "Failed to list sessions");
                Vec::new()
            }
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn intake_state(&self) -> IntakeState {
        self.intake.state()
    }

    /// Active memory policy
    pub fn memory(&self) -> &dyn MemoryPolicy {
        self.memory.as_ref()
    }

    /// Active prompt builder
    pub fn prompt_builder(&self) -> &Arc<dyn PromptBuilder> {
        &self.prompts
    }

    /// Current settings, including any switched model or memory
    pub fn config(&self) -> &MemoriaConfig {
        &self.config
    }

    fn persist_config(&self) {
        let Some(path) = &self.config_path else {
            debug!("No configuration path, setting kept in memory only");
            return;
        };
        if let Err(e) = self.config.save(path) {
            warn!(path = %path.display(), error = %e, "Failed to save configuration");
        }
    }
}

/// Builder for [`SessionController`]
pub struct SessionControllerBuilder {
    config: Option<MemoriaConfig>,
    config_path: Option<PathBuf>,
    model_service: Option<Arc<dyn ModelService>>,
    store: Option<Arc<dyn SessionStore>>,
    display: Option<Arc<dyn DisplaySink>>,
}

impl SessionControllerBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            config_path: None,
            model_service: None,
            store: None,
            display: None,
        }
    }

    /// Settings (defaults when unset)
    pub fn config(mut self, config: MemoriaConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// File switched settings are written back to
    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Model service (an [`OllamaService`] built from the config when unset)
    pub fn model_service(mut self, service: Arc<dyn ModelService>) -> Self {
        self.model_service = Some(service);
        self
    }

    /// Session store (a [`FileSessionStore`] in `storage.sessions_dir` when unset)
    pub fn store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Display sink (required)
    pub fn display(mut self, display: Arc<dyn DisplaySink>) -> Self {
        self.display = Some(display);
        self
    }

    /// Build the controller in the `NoSession` state.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid settings, an unknown model
    /// or memory id, or a missing display.
    pub fn build(self) -> Result<SessionController> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let display = self
            .display
            .ok_or_else(|| MemoriaError::Configuration("Display sink is required".to_string()))?;

        let model = self
            .model_service
            .unwrap_or_else(|| Arc::new(OllamaService::from_config(&config)));
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(FileSessionStore::new(&config.storage.sessions_dir)));

        let prompts = PromptBuilderFactory::create(&config.model, config.system_prompt.as_deref())?;
        let summarizer = Arc::new(LlmSummarizer::new(Arc::clone(&model), Arc::clone(&prompts)));
        let memory = build_policy(&config.memory, Arc::clone(&summarizer) as Arc<dyn Summarizer>, config.max_total_tokens)?;

        let intake = ResponseIntake::new(
            Arc::clone(&display),
            ActivityIndicator::from_config(&config.indicator),
        );

        debug!(model = %config.model, memory = %config.memory, max_total_tokens = config.max_total_tokens, "Session controller built");

        Ok(SessionController {
            config,
            config_path: self.config_path,
            model,
            store,
            display,
            prompts,
            summarizer,
            memory,
            intake,
            session_id: None,
            state: SessionState::NoSession,
        })
    }
}

impl Default for SessionControllerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::RecordingDisplay;
    use crate::llm::ScriptedService;
    use crate::memory::MemoryKind;
    use crate::session::MemorySessionStore;

    struct Harness {
        controller: SessionController,
        service: Arc<ScriptedService>,
        store: Arc<MemorySessionStore>,
        display: Arc<RecordingDisplay>,
    }

    fn harness(config: MemoriaConfig, service: ScriptedService) -> Harness {
        let service = Arc::new(service);
        let store = Arc::new(MemorySessionStore::new());
        let display = Arc::new(RecordingDisplay::new());
        let controller = SessionController::builder()
            .config(config)
            .model_service(service.clone())
            .store(store.clone())
            .display(display.clone())
            .build()
            .unwrap();
        Harness {
            controller,
            service,
            store,
            display,
        }
    }

    fn config(memory: &str) -> MemoriaConfig {
        MemoriaConfig {
            max_total_tokens: 300,
            memory: memory.to_string(),
            ..MemoriaConfig::default()
        }
    }

    #[tokio::test]
    async fn test_build_rejects_unknown_ids() {
        let display: Arc<dyn DisplaySink> = Arc::new(RecordingDisplay::new());
        let service: Arc<dyn ModelService> = Arc::new(ScriptedService::new());

        let mut bad_model = config("buffer");
        bad_model.model = "gpt-unknown".to_string();
        let result = SessionController::builder()
            .config(bad_model)
            .model_service(service.clone())
            .store(Arc::new(MemorySessionStore::new()))
            .display(display.clone())
            .build();
        assert!(matches!(result, Err(MemoriaError::Configuration(_))));

        let result = SessionController::builder()
            .config(config("vector"))
            .model_service(service)
            .store(Arc::new(MemorySessionStore::new()))
            .display(display)
            .build();
        assert!(matches!(result, Err(MemoriaError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_end_without_session_is_noop() {
        let mut h = harness(config("buffer"), ScriptedService::new());
        h.controller.end().await;
        assert!(h.store.is_empty().await);
        assert_eq!(h.controller.state(), SessionState::NoSession);
    }

    #[tokio::test]
    async fn test_start_resets_state() {
        let mut h = harness(config("buffer"), ScriptedService::new());
        h.controller.start().await;
        h.controller.process_input("hello").await;
        assert_eq!(h.controller.memory().log().len(), 2);
        let first = h.controller.session_id().unwrap().to_string();

        h.controller.start().await;
        assert!(h.controller.memory().log().is_empty());
        assert!(h.controller.memory().context_string(300).is_empty());
        assert_ne!(h.controller.session_id().unwrap(), first);

        // Restarting ended and saved the first session
        let saved = h.store.get(&first).await.unwrap();
        assert_eq!(saved.turns, vec!["User: hello", "AI: ok"]);
    }

    #[tokio::test]
    async fn test_process_input_streams_into_log() {
        let service = ScriptedService::new().with_reply(["Hel", "lo", " there"]);
        let mut h = harness(config("buffer"), service);
        h.controller.start().await;

        h.controller.process_input("hi").await;

        assert_eq!(
            h.controller.memory().log().snapshot(),
            vec!["User: hi", "AI: Hello there"]
        );
        assert_eq!(h.controller.intake_state(), IntakeState::Idle);
        assert!(h.display.transcript().ends_with("Hello there\n"));

        let prompts = h.service.stream_prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("hi"));
    }

    #[tokio::test]
    async fn test_context_excludes_current_input() {
        let service = ScriptedService::new().with_reply(["first answer"]);
        let mut h = harness(config("buffer"), service);
        h.controller.start().await;

        h.controller.process_input("question one").await;
        h.controller.process_input("question two").await;

        let prompts = h.service.stream_prompts();
        assert!(!prompts[0].contains("Conversation so far"));
        assert!(prompts[1].contains("User: question one, AI: first answer"));
        assert!(!prompts[1].contains("User: question two"));
    }

    #[tokio::test]
    async fn test_dispatch_failure_is_shown_once() {
        let mut h = harness(config("buffer"), ScriptedService::new().failing());
        h.controller.start().await;

        h.controller.process_input("hi").await;

        let errors: Vec<String> = h
            .display
            .messages()
            .into_iter()
            .filter(|m| m.starts_with("Error: "))
            .collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(h.controller.state(), SessionState::ActiveSession);
        assert_eq!(h.controller.intake_state(), IntakeState::Idle);

        // No empty AI turn is left behind to leak into the next context
        assert_eq!(h.controller.memory().log().snapshot(), vec!["User: hi"]);
        assert!(!h.controller.memory().context_string(300).contains("AI:"));
    }

    #[tokio::test]
    async fn test_missing_sentinel_still_finishes() {
        let service = ScriptedService::new()
            .without_end_sentinel()
            .with_summary("the user said hi");
        let mut h = harness(config("summary"), service);
        h.controller.start().await;

        h.controller.process_input("hi").await;

        assert_eq!(h.controller.intake_state(), IntakeState::Idle);
        assert_eq!(h.controller.memory().context_string(0), "the user said hi");
    }

    #[tokio::test]
    async fn test_summary_policy_refreshes_after_each_response() {
        let service = ScriptedService::new()
            .with_summary("summary one")
            .with_summary("summary two");
        let mut h = harness(config("summary"), service);
        h.controller.start().await;

        h.controller.process_input("hi").await;
        assert_eq!(h.controller.memory().context_string(300), "summary one");

        h.controller.process_input("more").await;
        assert_eq!(h.controller.memory().context_string(300), "summary two");

        let requests = h.service.request_prompts();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].contains("User: more"));
        assert!(h.service.stream_prompts()[1].contains("summary one"));
    }

    #[tokio::test]
    async fn test_resume_replays_history() {
        let mut h = harness(config("buffer"), ScriptedService::new());

        h.controller
            .resume(
                "chat-1700000000000.yaml",
                vec!["User: hi".to_string(), "AI: hello there".to_string()],
                vec![],
            )
            .await;

        assert_eq!(h.controller.state(), SessionState::ActiveSession);
        assert_eq!(h.controller.session_id(), Some("1700000000000"));
        assert_eq!(
            h.display.messages(),
            vec!["You: hi\n", "AI: hello there\n"]
        );
        assert_eq!(h.controller.memory().log().len(), 2);
    }

    #[tokio::test]
    async fn test_resume_ignores_digits_in_directories() {
        let mut h = harness(config("buffer"), ScriptedService::new());

        h.controller
            .resume(
                "/home/user1/v2/sessions/chat-1700000000000.yaml",
                vec!["User: hi".to_string()],
                vec![],
            )
            .await;
        assert_eq!(h.controller.session_id(), Some("1700000000000"));

        h.controller.end().await;
        assert!(h.store.get("1700000000000").await.is_some());
        assert_eq!(h.store.len().await, 1);
    }

    #[tokio::test]
    async fn test_resume_saved_missing_session_is_empty() {
        let mut h = harness(config("buffer"), ScriptedService::new());
        h.controller.resume_saved("chat-42.yaml").await;

        assert_eq!(h.controller.session_id(), Some("42"));
        assert!(h.controller.memory().log().is_empty());
    }

    #[tokio::test]
    async fn test_update_memory_resets_and_validates() {
        let mut h = harness(config("buffer"), ScriptedService::new());
        h.controller.start().await;
        h.controller.process_input("hi").await;
        let first = h.controller.session_id().unwrap().to_string();

        assert!(h.controller.update_memory("vector").await.is_err());
        assert_eq!(h.controller.memory().kind(), MemoryKind::Buffer);
        assert_eq!(h.controller.session_id(), Some(first.as_str()));

        h.controller.update_memory("summary").await.unwrap();
        assert_eq!(h.controller.memory().kind(), MemoryKind::Summary);
        assert_eq!(h.controller.config().memory, "summary");
        assert!(h.controller.memory().log().is_empty());
        assert!(h.store.get(&first).await.is_some());
    }

    #[tokio::test]
    async fn test_update_model_switches_prompt_builder() {
        let mut h = harness(config("buffer"), ScriptedService::new());
        h.controller.start().await;

        assert!(h.controller.update_model("nonexistent").await.is_err());
        assert_eq!(h.controller.prompt_builder().name(), "llama2");

        h.controller.update_model("chatml").await.unwrap();
        assert_eq!(h.controller.prompt_builder().name(), "chatml");
        assert_eq!(h.controller.config().model, "chatml");

        h.controller.process_input("hi").await;
        assert!(h.service.stream_prompts()[0].contains("<|im_start|>"));
    }

    #[tokio::test]
    async fn test_summarize_uses_request() {
        let h = harness(config("buffer"), ScriptedService::new().with_summary("short"));
        assert_eq!(h.controller.summarize("User: a, AI: b").await, "short");
        assert!(h.service.request_prompts()[0].contains("User: a, AI: b"));
    }
}
