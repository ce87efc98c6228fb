//! crates/storyincolor_core/src/notify.rs
//!
//! Routing for customer-notification emails sent through the serverless
//! function collaborator. Each notification kind maps to an ordered list of
//! candidate function names tried in sequence until one succeeds. The
//! deployed functions have drifted names, so the fallback chain is
//! configuration rather than inline duplication.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::ports::{FunctionInvoker, PortError, PortResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Welcome,
    ProjectSubmission,
    ProcessingComplete,
}

pub struct Notifier {
    invoker: Arc<dyn FunctionInvoker>,
    routes: HashMap<NotificationKind, Vec<String>>,
}

impl Notifier {
    pub fn new(invoker: Arc<dyn FunctionInvoker>) -> Self {
        let mut routes = HashMap::new();
        routes.insert(
            NotificationKind::Welcome,
            vec!["sendWelcomeEmailNotification".to_string()],
        );
        routes.insert(
            NotificationKind::ProjectSubmission,
            vec!["sendProjectSubmissionNotification".to_string()],
        );
        routes.insert(
            NotificationKind::ProcessingComplete,
            vec![
                "sendProcessingCompleteNotification".to_string(),
                "sendProcessedNotification".to_string(),
            ],
        );
        Self { invoker, routes }
    }

    /// Override the candidate list for one notification kind.
    pub fn with_candidates(mut self, kind: NotificationKind, candidates: Vec<String>) -> Self {
        if !candidates.is_empty() {
            self.routes.insert(kind, candidates);
        }
        self
    }

    /// Tries each candidate in order; returns the first success, or the last
    /// failure once the list is exhausted.
    pub async fn dispatch(&self, kind: NotificationKind, payload: Value) -> PortResult<Value> {
        let candidates = self
            .routes
            .get(&kind)
            .ok_or_else(|| PortError::Unexpected(format!("No route for {kind:?}")))?;

        let mut last_error = None;
        for name in candidates {
            match self.invoker.invoke(name, payload.clone()).await {
                Ok(result) => return Ok(result),
                Err(err) => last_error = Some(err),
            }
        }
        Err(last_error
            .unwrap_or_else(|| PortError::Unexpected(format!("Empty route for {kind:?}"))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::executor::block_on;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records invocations and fails every name in `failing`.
    struct ScriptedInvoker {
        failing: Vec<&'static str>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl FunctionInvoker for ScriptedInvoker {
        async fn invoke(&self, name: &str, _payload: Value) -> PortResult<Value> {
            self.calls.lock().unwrap().push(name.to_string());
            if self.failing.iter().any(|failing| *failing == name) {
                Err(PortError::Unexpected(format!("{name} unavailable")))
            } else {
                Ok(json!({ "success": true }))
            }
        }
    }

    #[test]
    fn primary_success_skips_the_fallback() {
        let invoker = Arc::new(ScriptedInvoker {
            failing: vec![],
            calls: Mutex::new(Vec::new()),
        });
        let notifier = Notifier::new(invoker.clone());
        block_on(notifier.dispatch(NotificationKind::ProcessingComplete, json!({}))).unwrap();
        assert_eq!(
            *invoker.calls.lock().unwrap(),
            vec!["sendProcessingCompleteNotification"]
        );
    }

    #[test]
    fn fallback_is_tried_when_the_primary_fails() {
        let invoker = Arc::new(ScriptedInvoker {
            failing: vec!["sendProcessingCompleteNotification"],
            calls: Mutex::new(Vec::new()),
        });
        let notifier = Notifier::new(invoker.clone());
        block_on(notifier.dispatch(NotificationKind::ProcessingComplete, json!({}))).unwrap();
        assert_eq!(
            *invoker.calls.lock().unwrap(),
            vec![
                "sendProcessingCompleteNotification",
                "sendProcessedNotification"
            ]
        );
    }

    #[test]
    fn exhausted_candidates_surface_the_last_failure() {
        let invoker = Arc::new(ScriptedInvoker {
            failing: vec![
                "sendProcessingCompleteNotification",
                "sendProcessedNotification",
            ],
            calls: Mutex::new(Vec::new()),
        });
        let notifier = Notifier::new(invoker);
        let err =
            block_on(notifier.dispatch(NotificationKind::ProcessingComplete, json!({}))).unwrap_err();
        assert!(err.to_string().contains("sendProcessedNotification"));
    }

    #[test]
    fn candidate_lists_are_configurable() {
        let invoker = Arc::new(ScriptedInvoker {
            failing: vec![],
            calls: Mutex::new(Vec::new()),
        });
        let notifier = Notifier::new(invoker.clone()).with_candidates(
            NotificationKind::Welcome,
            vec!["customWelcome".to_string()],
        );
        block_on(notifier.dispatch(NotificationKind::Welcome, json!({}))).unwrap();
        assert_eq!(*invoker.calls.lock().unwrap(), vec!["customWelcome"]);
    }
}
