use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use slotbot_core::catalog::IntentCatalog;
use slotbot_core::classifier::{IntentClassifier, PhraseMatcher};
use slotbot_core::config::AppConfig;
use slotbot_core::dialogue::{DialogueEngine, TurnEvent};
use slotbot_core::errors::ApplicationError;
use tracing::{error, info};

use crate::session::{SessionSnapshot, SessionStore};

pub type DynEngine = DialogueEngine<Box<dyn PhraseMatcher>>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatReply {
    pub session_id: String,
    pub response: String,
    pub event: TurnEvent,
}

/// Request-facing orchestrator: resolves the session, runs one dialogue turn under the
/// session lock and writes the new state back.
pub struct ChatRuntime {
    engine: DynEngine,
    sessions: SessionStore,
    default_session_id: String,
}

impl ChatRuntime {
    pub fn new(engine: DynEngine, sessions: SessionStore, default_session_id: String) -> Self {
        Self { engine, sessions, default_session_id }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ApplicationError> {
        let catalog = match &config.dialogue.catalog_path {
            Some(path) => IntentCatalog::load(path)
                .map_err(|error| ApplicationError::Catalog(error.to_string()))?,
            None => IntentCatalog::builtin(),
        };

        let classifier = IntentClassifier::new(
            config.dialogue.matcher.build(),
            config.dialogue.similarity_threshold,
            config.dialogue.fallback_intent.clone(),
        );
        let engine = DialogueEngine::new(catalog, classifier)
            .map_err(|error| ApplicationError::Catalog(error.to_string()))?;

        let sessions = SessionStore::new(
            Duration::from_secs(config.sessions.idle_timeout_secs),
            config.sessions.max_sessions,
        );

        info!(
            event_name = "runtime.initialized",
            intents = engine.catalog().len(),
            matcher = engine.classifier().matcher_name(),
            threshold = engine.classifier().threshold(),
            "chat runtime initialized"
        );

        Ok(Self::new(engine, sessions, config.sessions.default_session_id.clone()))
    }

    pub fn engine(&self) -> &DynEngine {
        &self.engine
    }

    pub fn default_session_id(&self) -> &str {
        &self.default_session_id
    }

    pub fn handle_message(
        &self,
        session_id: Option<&str>,
        text: &str,
    ) -> Result<ChatReply, ApplicationError> {
        self.handle_message_at(session_id, text, Utc::now())
    }

    /// Processes one message as of `now`.
    ///
    /// A domain error leaves the session reset to `Idle` so the next message starts a
    /// fresh conversation.
    pub fn handle_message_at(
        &self,
        session_id: Option<&str>,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<ChatReply, ApplicationError> {
        let session_id = session_id.unwrap_or(&self.default_session_id);

        let turn = self
            .sessions
            .with_session(session_id, now, |state| match self.engine.step(state, text) {
                Ok(turn) => {
                    *state = turn.state.clone();
                    Ok(turn)
                }
                Err(domain_error) => {
                    state.reset();
                    Err(domain_error)
                }
            })
            .map_err(|session_error| ApplicationError::Session(session_error.to_string()))?;

        let turn = turn.map_err(|domain_error| {
            error!(
                event_name = "dialogue.state.reset",
                session_id,
                error = %domain_error,
                "conversation state was inconsistent; session reset to idle"
            );
            ApplicationError::from(domain_error)
        })?;

        info!(
            event_name = "dialogue.turn",
            session_id,
            intent = turn.event.intent(),
            event = ?turn.event,
            "dialogue turn processed"
        );

        Ok(ChatReply { session_id: session_id.to_owned(), response: turn.response, event: turn.event })
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        self.sessions.purge_expired(now)
    }

    pub fn session(&self, session_id: &str) -> Option<SessionSnapshot> {
        self.sessions.snapshot(session_id)
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use slotbot_core::catalog::IntentCatalog;
    use slotbot_core::classifier::{IntentClassifier, MatcherKind};
    use slotbot_core::config::AppConfig;
    use slotbot_core::dialogue::{ConversationState, DialogueEngine, SlotFilling, TurnEvent};
    use slotbot_core::errors::ApplicationError;

    use super::ChatRuntime;
    use crate::session::SessionStore;

    fn runtime_with(idle_timeout_secs: u64, max_sessions: usize) -> ChatRuntime {
        let classifier = IntentClassifier::new(MatcherKind::JaroWinkler.build(), 0.7, "greet_user");
        let engine =
            DialogueEngine::new(IntentCatalog::builtin(), classifier).expect("builtin engine");
        ChatRuntime::new(
            engine,
            SessionStore::new(Duration::from_secs(idle_timeout_secs), max_sessions),
            "default".to_owned(),
        )
    }

    fn runtime() -> ChatRuntime {
        runtime_with(1800, 100)
    }

    fn at(seconds: i64) -> chrono::DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + seconds, 0).single().expect("valid timestamp")
    }

    #[test]
    fn default_session_reproduces_single_conversation() {
        let runtime = runtime();

        let replies: Vec<String> = ["I want to book a flight", "Tokyo", "Friday"]
            .into_iter()
            .map(|text| runtime.handle_message(None, text).expect("reply").response)
            .collect();

        assert_eq!(
            replies,
            vec![
                "Great! Where would you like to fly?",
                "Please provide date.",
                "Flight to Tokyo on Friday has been booked!",
            ]
        );
        let session = runtime.session("default").expect("default session exists");
        assert!(session.state.is_idle());
    }

    #[test]
    fn interleaved_sessions_stay_isolated() {
        let runtime = runtime();

        runtime.handle_message(Some("alice"), "I want to book a flight").expect("alice 1");
        runtime.handle_message(Some("bob"), "Order food for me").expect("bob 1");
        runtime.handle_message(Some("alice"), "Tokyo").expect("alice 2");
        runtime.handle_message(Some("bob"), "tacos").expect("bob 2");

        let alice = runtime.handle_message(Some("alice"), "Friday").expect("alice 3");
        let bob = runtime.handle_message(Some("bob"), "3").expect("bob 3");

        assert_eq!(alice.response, "Flight to Tokyo on Friday has been booked!");
        assert_eq!(alice.session_id, "alice");
        assert_eq!(bob.response, "Order of 3 tacos(s) placed successfully!");
        assert_eq!(runtime.active_sessions(), 2);
    }

    #[test]
    fn expired_session_starts_a_new_conversation() {
        let runtime = runtime_with(60, 100);

        runtime.handle_message_at(Some("s"), "I want to book a flight", at(0)).expect("start");
        let reply = runtime.handle_message_at(Some("s"), "hello", at(120)).expect("after expiry");

        assert_eq!(reply.response, "Hello! How can I assist you today?");
        assert!(matches!(reply.event, TurnEvent::IntentAnswered { .. }));
        assert_eq!(runtime.purge_expired(at(500)), 1);
        assert_eq!(runtime.active_sessions(), 0);
    }

    #[test]
    fn exhausted_capacity_surfaces_as_session_error() {
        let runtime = runtime_with(60, 1);

        runtime.handle_message_at(Some("first"), "hello", at(0)).expect("first");
        let error = runtime
            .handle_message_at(Some("second"), "hello", at(1))
            .expect_err("capacity should be exhausted");

        assert!(matches!(error, ApplicationError::Session(_)));
    }

    #[test]
    fn domain_error_resets_the_session() {
        let runtime = runtime();
        let mut slots = SlotFilling::new("book_flight", vec!["destination".to_owned()]);
        slots.current_entity_index = 4;
        runtime
            .sessions()
            .with_session("broken", Utc::now(), |state| *state = ConversationState::SlotFilling(slots))
            .expect("seed broken session");

        let error = runtime.handle_message(Some("broken"), "Tokyo").expect_err("invalid cursor");
        assert!(matches!(error, ApplicationError::Domain(_)));
        assert!(runtime.session("broken").expect("session kept").state.is_idle());

        let reply = runtime.handle_message(Some("broken"), "hello").expect("recovered");
        assert_eq!(reply.response, "Hello! How can I assist you today?");
    }

    #[test]
    fn concurrent_requests_on_one_session_complete_once() {
        let runtime = Arc::new(runtime());
        runtime.handle_message(Some("shared"), "I want to book a flight").expect("activate");

        let workers = 8;
        let barrier = Arc::new(Barrier::new(workers));
        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                let runtime = Arc::clone(&runtime);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    runtime
                        .handle_message(Some("shared"), &format!("value-{worker}"))
                        .expect("reply")
                        .event
                })
            })
            .collect();

        let events: Vec<TurnEvent> =
            handles.into_iter().map(|handle| handle.join().expect("worker")).collect();
        let completions = events
            .iter()
            .filter(|event| matches!(event, TurnEvent::IntentCompleted { .. }))
            .count();
        let collected = events
            .iter()
            .filter(|event| matches!(event, TurnEvent::EntityCollected { .. }))
            .count();

        assert_eq!(completions, 1);
        assert_eq!(collected, 1);
    }

    #[test]
    fn from_config_rejects_catalog_without_fallback() {
        let mut config = AppConfig::default();
        config.dialogue.fallback_intent = "small_talk".to_owned();

        let error = match ChatRuntime::from_config(&config) {
            Ok(_) => panic!("missing fallback should be rejected"),
            Err(error) => error,
        };
        assert!(matches!(error, ApplicationError::Catalog(ref message) if message.contains("small_talk")));
    }

    #[test]
    fn from_config_loads_catalog_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("intents.toml");
        std::fs::write(
            &path,
            r#"
[[intents]]
name = "greet_user"
phrases = ["hello"]
responses = ["Hi!"]

[[intents]]
name = "check_weather"
phrases = ["what is the weather"]
entities = ["city"]
responses = ["Which city?", "Weather in {city} is sunny."]
"#,
        )
        .expect("write catalog");

        let mut config = AppConfig::default();
        config.dialogue.catalog_path = Some(path);
        let runtime = ChatRuntime::from_config(&config).expect("runtime");

        assert_eq!(runtime.engine().catalog().len(), 2);
        assert_eq!(
            runtime.handle_message(None, "what is the weather").expect("ask").response,
            "Which city?"
        );
        assert_eq!(
            runtime.handle_message(None, "Oslo").expect("answer").response,
            "Weather in Oslo is sunny."
        );
    }
}
