//! Presentation of failed commerce backend calls.
//!
//! A [`RouteException`] is turned into three independent effects, each
//! looked up per operation with a default fallback:
//!
//! - **message**: a transient notice for the user (suppressed when blank)
//! - **log**: a critical log entry (emitted when the value is truthy)
//! - **redirect**: where to send the user (the current page when unset)
//!
//! Lookups never fail; a missing or malformed rule behaves as unset.

use std::collections::HashMap;
use std::sync::Arc;

use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;
use tracing::error;

use commerce_connector_core::RouteException;

use crate::notices::{NoticeLevel, Notices};

/// A configured value for the `log` key.
///
/// YAML allows `log: true` as well as `log: "1"`; both are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum LogSetting {
    Flag(bool),
    Text(String),
}

impl LogSetting {
    fn is_truthy(&self) -> bool {
        match self {
            Self::Flag(b) => *b,
            Self::Text(s) => {
                let s = s.trim();
                !s.is_empty() && s != "0" && !s.eq_ignore_ascii_case("false")
            }
        }
    }

    fn as_text(&self) -> String {
        match self {
            Self::Flag(b) => b.to_string(),
            Self::Text(s) => s.trim().to_owned(),
        }
    }
}

/// Presentation rule for one operation (or the default).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RouteExceptionRule {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub log: Option<LogSetting>,
    #[serde(default)]
    pub redirect: Option<String>,
}

/// All route exception rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RouteExceptionSettings {
    #[serde(default)]
    pub default: RouteExceptionRule,
    #[serde(default)]
    pub routes: HashMap<String, RouteExceptionRule>,
}

/// What the caller should do after a failure was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteExceptionOutcome {
    /// The notice shown to the user, if any.
    pub message: Option<String>,
    /// Where to send the user.
    pub redirect: String,
}

impl IntoResponse for RouteExceptionOutcome {
    fn into_response(self) -> Response {
        Redirect::to(&self.redirect).into_response()
    }
}

/// Translates backend failures into notices, log entries and redirects.
#[derive(Debug, Clone)]
pub struct RouteExceptionHandler {
    settings: RouteExceptionSettings,
    notices: Arc<Notices>,
}

impl RouteExceptionHandler {
    #[must_use]
    pub const fn new(settings: RouteExceptionSettings, notices: Arc<Notices>) -> Self {
        Self { settings, notices }
    }

    /// Look up a key: the operation's rule first, then the default.
    /// Blank strings count as unset at both levels.
    fn lookup<'a, T, F>(&'a self, exception: &RouteException, pick: F) -> Option<T>
    where
        F: Fn(&'a RouteExceptionRule) -> Option<T>,
    {
        self.settings
            .routes
            .get(exception.operation())
            .and_then(&pick)
            .or_else(|| pick(&self.settings.default))
    }

    /// The user-facing message, or `None` to suppress the notice.
    #[must_use]
    pub fn resolve_message(&self, exception: &RouteException) -> Option<String> {
        self.lookup(exception, |rule| non_blank(rule.message.as_deref()))
    }

    /// The configured log value, or `None` when logging is off.
    ///
    /// Only truthy values are returned, so `log: false` on an operation
    /// falls through to the default like any other unset value.
    #[must_use]
    pub fn resolve_log(&self, exception: &RouteException) -> Option<String> {
        self.lookup(exception, |rule| {
            rule.log
                .as_ref()
                .filter(|log| log.is_truthy())
                .map(LogSetting::as_text)
        })
    }

    /// The redirect target; `current` when nothing is configured.
    #[must_use]
    pub fn resolve_redirect(&self, exception: &RouteException, current: &str) -> String {
        self.lookup(exception, |rule| non_blank(rule.redirect.as_deref()))
            .unwrap_or_else(|| current.to_owned())
    }

    /// Log the failure and queue the user notice, as configured.
    ///
    /// Logging and the notice are evaluated independently: a suppressed
    /// message does not suppress the log entry and vice versa. Returns the
    /// message shown, if any.
    pub fn report(&self, exception: &RouteException) -> Option<String> {
        let message = self.explain(exception);
        if let Some(text) = &message {
            self.notices.push(NoticeLevel::Error, text.clone());
        }
        message
    }

    /// Log the failure as configured and return the resolved message
    /// without queueing a notice.
    pub fn explain(&self, exception: &RouteException) -> Option<String> {
        if self.resolve_log(exception).is_some() {
            error!(
                severity = "critical",
                operation = exception.operation(),
                code = exception.code(),
                message = exception.message(),
                "Commerce backend call failed"
            );
        }
        self.resolve_message(exception)
    }

    /// Apply all three effects and report the outcome.
    pub fn handle(&self, exception: &RouteException, current: &str) -> RouteExceptionOutcome {
        RouteExceptionOutcome {
            message: self.report(exception),
            redirect: self.resolve_redirect(exception, current),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_owned)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn handler(yaml: &str) -> (RouteExceptionHandler, Arc<Notices>) {
        let settings: RouteExceptionSettings = serde_yaml::from_str(yaml).unwrap();
        let notices = Arc::new(Notices::default());
        (RouteExceptionHandler::new(settings, notices.clone()), notices)
    }

    fn exception(operation: &str) -> RouteException {
        RouteException::new(operation, 500, "upstream exploded")
    }

    #[test]
    fn test_operation_rule_wins_over_default() {
        let (handler, _) = handler(
            r"
default: {message: generic, redirect: /home}
routes:
  cart_update: {message: 'Cart could not be updated', redirect: /cart}
",
        );
        let err = exception("cart_update");
        assert_eq!(
            handler.resolve_message(&err).as_deref(),
            Some("Cart could not be updated")
        );
        assert_eq!(handler.resolve_redirect(&err, "/now"), "/cart");
    }

    #[test]
    fn test_default_message_used_without_operation_rule() {
        let (handler, _) = handler("default: {message: generic}");
        assert_eq!(
            handler.resolve_message(&exception("anything")).as_deref(),
            Some("generic")
        );
    }

    #[test]
    fn test_blank_operation_message_falls_back_to_default() {
        let (handler, _) = handler(
            r"
default: {message: generic}
routes:
  store_config: {message: '   '}
",
        );
        assert_eq!(
            handler.resolve_message(&exception("store_config")).as_deref(),
            Some("generic")
        );
    }

    #[test]
    fn test_nothing_configured_suppresses_message_but_log_is_independent() {
        let (handler, notices) = handler("default: {log: '1'}");
        let err = exception("store_config");

        assert_eq!(handler.resolve_message(&err), None);
        assert_eq!(handler.resolve_log(&err).as_deref(), Some("1"));

        let outcome = handler.handle(&err, "/current");
        assert_eq!(outcome.message, None);
        assert_eq!(outcome.redirect, "/current");
        assert!(notices.drain().is_empty());
    }

    #[test]
    fn test_log_truthiness() {
        let (configured, _) = handler(
            r"
default: {log: true}
routes:
  quiet: {log: '0'}
  loud: {log: 'yes'}
",
        );
        // A falsy operation value counts as unset and falls back to the default.
        assert_eq!(configured.resolve_log(&exception("quiet")).as_deref(), Some("true"));
        assert_eq!(configured.resolve_log(&exception("loud")).as_deref(), Some("yes"));

        let (silent, _) = handler("default: {log: false}");
        assert_eq!(silent.resolve_log(&exception("x")), None);
    }

    #[test]
    fn test_handle_pushes_notice() {
        let (handler, notices) = handler("default: {message: 'Try again later'}");
        let outcome = handler.handle(&exception("x"), "/checkout");

        assert_eq!(outcome.message.as_deref(), Some("Try again later"));
        assert_eq!(outcome.redirect, "/checkout");

        let pending = notices.drain();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].message, "Try again later");
        assert_eq!(pending[0].level, NoticeLevel::Error);
    }

    #[test]
    fn test_explain_resolves_message_without_notice() {
        let (handler, notices) = handler("default: {message: 'Backend down', log: true}");
        let err = exception("store_config");

        assert_eq!(handler.explain(&err).as_deref(), Some("Backend down"));
        assert!(notices.drain().is_empty());

        assert_eq!(handler.report(&err).as_deref(), Some("Backend down"));
        assert_eq!(notices.drain().len(), 1);
    }

    #[test]
    fn test_outcome_redirects() {
        let outcome = RouteExceptionOutcome {
            message: None,
            redirect: "/admin".to_owned(),
        };
        let response = outcome.into_response();
        assert_eq!(response.status(), axum::http::StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(axum::http::header::LOCATION).unwrap(),
            "/admin"
        );
    }
}
