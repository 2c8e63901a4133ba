use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use slotbot_agent::ChatRuntime;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Periodically drops sessions that have been idle longer than the configured timeout.
pub fn spawn(runtime: Arc<ChatRuntime>, interval: Duration) -> JoinHandle<()> {
    info!(
        event_name = "system.sweeper.start",
        correlation_id = "bootstrap",
        interval_secs = interval.as_secs(),
        "session sweeper started"
    );

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            sweep_once(&runtime);
        }
    })
}

pub fn sweep_once(runtime: &ChatRuntime) -> usize {
    let purged = runtime.purge_expired(Utc::now());
    if purged > 0 {
        info!(
            event_name = "session.sweep.completed",
            purged,
            remaining = runtime.active_sessions(),
            "expired sessions purged"
        );
    } else {
        debug!(event_name = "session.sweep.completed", purged, "no expired sessions");
    }
    purged
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;
    use slotbot_agent::{ChatRuntime, SessionStore};
    use slotbot_core::catalog::IntentCatalog;
    use slotbot_core::classifier::{IntentClassifier, MatcherKind};
    use slotbot_core::dialogue::DialogueEngine;

    use crate::sweeper::{spawn, sweep_once};

    fn runtime(idle_timeout: Duration) -> Arc<ChatRuntime> {
        let classifier = IntentClassifier::new(MatcherKind::JaroWinkler.build(), 0.7, "greet_user");
        let engine = DialogueEngine::new(IntentCatalog::builtin(), classifier).expect("engine");
        Arc::new(ChatRuntime::new(
            engine,
            SessionStore::new(idle_timeout, 100),
            "default".to_owned(),
        ))
    }

    #[test]
    fn sweep_keeps_recent_sessions() {
        let runtime = runtime(Duration::from_secs(600));
        runtime.handle_message(Some("a"), "hello").expect("reply");

        assert_eq!(sweep_once(&runtime), 0);
        assert_eq!(runtime.active_sessions(), 1);
    }

    #[test]
    fn sweep_removes_stale_sessions() {
        let runtime = runtime(Duration::from_secs(60));
        let long_ago = Utc::now() - chrono::Duration::seconds(3600);
        runtime.handle_message_at(Some("stale"), "hello", long_ago).expect("reply");
        runtime.handle_message(Some("fresh"), "hello").expect("reply");

        assert_eq!(sweep_once(&runtime), 1);
        assert!(runtime.session("stale").is_none());
        assert!(runtime.session("fresh").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_sweeper_runs_on_interval() {
        let runtime = runtime(Duration::from_secs(60));
        let long_ago = Utc::now() - chrono::Duration::seconds(3600);
        runtime.handle_message_at(Some("stale"), "hello", long_ago).expect("reply");

        let handle = spawn(Arc::clone(&runtime), Duration::from_secs(5));
        tokio::time::sleep(Duration::from_secs(6)).await;

        assert_eq!(runtime.active_sessions(), 0);
        handle.abort();
    }
}
