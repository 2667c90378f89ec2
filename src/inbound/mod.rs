//! Inbound email handler dispatch
//!
//! Handlers are registered once through [`DispatcherBuilder`] and sorted by
//! priority (lower first, ties in registration order). The built
//! [`HandlerDispatcher`] is immutable and can be shared across tasks.
//!
//! Dispatch is first-match: the first handler whose `matches` returns true
//! handles the message, and its outcome is final. A handler error or panic
//! becomes a `Failure` result; later handlers are not tried.

pub mod handlers;

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::config::InboundConfig;
use crate::hooks::{HookBus, HookName};
use crate::persistence::RecordRef;

pub use handlers::{ContactCaptureHandler, ContactStore, RecordLookup, ReplyReference, ReplyTokenHandler};

/// Message used for the `Skipped` result when no handler matches
pub const UNMATCHED_MESSAGE: &str = "No handler matched the inbound message";

/// Priority handlers get unless they say otherwise
pub const DEFAULT_HANDLER_PRIORITY: i32 = 10;

/// A received email, as handed over by the mailbox poller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InboundMessage {
    pub message_id: String,
    /// Raw `From` header, e.g. `"Jane Doe <jane@example.com>"`
    pub from: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub subject: String,
    pub text_body: Option<String>,
    pub html_body: Option<String>,
    pub headers: BTreeMap<String, String>,
}

impl InboundMessage {
    pub fn new(from: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            subject: subject.into(),
            ..Self::default()
        }
    }

    pub fn with_to(mut self, address: impl Into<String>) -> Self {
        self.to.push(address.into());
        self
    }

    pub fn with_text_body(mut self, body: impl Into<String>) -> Self {
        self.text_body = Some(body.into());
        self
    }

    /// Lower-cased sender address, without the display name
    pub fn sender_address(&self) -> Option<String> {
        parse_address(&self.from)
    }

    /// Sender display name, if the `From` header carries one
    pub fn sender_name(&self) -> Option<String> {
        let (name, _) = self.from.split_once('<')?;
        let name = name.trim().trim_matches('"').trim();
        (!name.is_empty()).then(|| name.to_string())
    }

    /// Lower-cased addresses from `To` and `Cc`, in header order
    pub fn recipients(&self) -> Vec<String> {
        self.to
            .iter()
            .chain(self.cc.iter())
            .filter_map(|raw| parse_address(raw))
            .collect()
    }
}

/// `"Name <a@b.c>"` or `"a@b.c"` to `"a@b.c"`
fn parse_address(raw: &str) -> Option<String> {
    let address = match (raw.find('<'), raw.rfind('>')) {
        (Some(start), Some(end)) if start < end => &raw[start + 1..end],
        _ => raw,
    };
    let address = address.trim();
    let (local, domain) = address.split_once('@')?;
    if local.is_empty() || domain.is_empty() || address.contains(char::is_whitespace) {
        return None;
    }
    Some(address.to_lowercase())
}

/// Dispatch outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerStatus {
    Success,
    Failure,
    Skipped,
}

/// Result of processing one message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerResult {
    pub status: HandlerStatus,
    /// Handler that produced the result; `None` when nothing matched
    pub handler_id: Option<String>,
    pub message: Option<String>,
    /// Record the message was linked to or created
    pub record: Option<RecordRef>,
}

impl HandlerResult {
    fn with_status(status: HandlerStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            handler_id: None,
            message: Some(message.into()),
            record: None,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::with_status(HandlerStatus::Success, message)
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::with_status(HandlerStatus::Failure, message)
    }

    pub fn skipped(message: impl Into<String>) -> Self {
        Self::with_status(HandlerStatus::Skipped, message)
    }

    pub fn with_record(mut self, record: RecordRef) -> Self {
        self.record = Some(record);
        self
    }

    pub fn with_handler(mut self, handler_id: impl Into<String>) -> Self {
        self.handler_id = Some(handler_id.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == HandlerStatus::Success
    }
}

/// Errors raised by handlers and their collaborators
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Lookup failed: {0}")]
    Lookup(String),

    #[error("Storage failed: {0}")]
    Storage(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// One category of inbound email
#[async_trait]
pub trait InboundEmailHandler: Send + Sync {
    /// Stable identifier, reported in results
    fn id(&self) -> &str;

    /// Human-readable name for diagnostics
    fn name(&self) -> &str {
        self.id()
    }

    /// Lower runs first
    fn priority(&self) -> i32 {
        DEFAULT_HANDLER_PRIORITY
    }

    fn matches(&self, message: &InboundMessage) -> bool;

    async fn handle(&self, message: &InboundMessage) -> Result<HandlerResult, HandlerError>;
}

/// Registered handler, as listed by [`HandlerDispatcher::handlers`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandlerInfo {
    pub id: String,
    pub name: String,
    pub priority: i32,
}

// ── Builder ─────────────────────────────────────────────────────────────

/// Registration phase of a [`HandlerDispatcher`]
pub struct DispatcherBuilder {
    handlers: Vec<Arc<dyn InboundEmailHandler>>,
    unmatched_message: String,
    hooks: Option<HookBus>,
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self {
            handlers: Vec::new(),
            unmatched_message: UNMATCHED_MESSAGE.to_string(),
            hooks: None,
        }
    }
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder preset from configuration
    pub fn from_config(config: &InboundConfig) -> Self {
        Self::new().unmatched_message(config.unmatched_message.clone())
    }

    pub fn register<H>(self, handler: H) -> Self
    where
        H: InboundEmailHandler + 'static,
    {
        self.register_arc(Arc::new(handler))
    }

    pub fn register_arc(mut self, handler: Arc<dyn InboundEmailHandler>) -> Self {
        tracing::debug!(handler = handler.id(), priority = handler.priority(), "inbound handler registered");
        self.handlers.push(handler);
        self
    }

    pub fn unmatched_message(mut self, message: impl Into<String>) -> Self {
        self.unmatched_message = message.into();
        self
    }

    /// Fire `InboundProcessed` after each dispatch
    pub fn hooks(mut self, hooks: HookBus) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn build(mut self) -> HandlerDispatcher {
        // Stable sort keeps registration order among equal priorities
        self.handlers.sort_by_key(|h| h.priority());
        HandlerDispatcher {
            handlers: self.handlers.into(),
            unmatched_message: self.unmatched_message,
            hooks: self.hooks,
        }
    }
}

// ── Dispatcher ──────────────────────────────────────────────────────────

/// Immutable, priority-ordered handler list
#[derive(Clone)]
pub struct HandlerDispatcher {
    handlers: Arc<[Arc<dyn InboundEmailHandler>]>,
    unmatched_message: String,
    hooks: Option<HookBus>,
}

impl HandlerDispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Route `message` to the first matching handler
    pub async fn dispatch(&self, message: &InboundMessage) -> HandlerResult {
        let result = match self.handlers.iter().find(|h| h.matches(message)) {
            Some(handler) => match AssertUnwindSafe(handler.handle(message)).catch_unwind().await {
                Ok(Ok(result)) => result.with_handler(handler.id()),
                Ok(Err(e)) => {
                    tracing::warn!(
                        handler = handler.id(),
                        message_id = %message.message_id,
                        error = %e,
                        "inbound handler failed"
                    );
                    HandlerResult::failure(e.to_string()).with_handler(handler.id())
                }
                Err(panic) => {
                    let reason = panic_message(panic.as_ref());
                    tracing::error!(
                        handler = handler.id(),
                        message_id = %message.message_id,
                        panic = %reason,
                        "inbound handler panicked"
                    );
                    HandlerResult::failure(format!("Handler panicked: {}", reason)).with_handler(handler.id())
                }
            },
            None => {
                tracing::debug!(message_id = %message.message_id, "no inbound handler matched");
                HandlerResult::skipped(self.unmatched_message.clone())
            }
        };

        if let Some(hooks) = &self.hooks {
            let payload = serde_json::to_value(&result).unwrap_or(Value::Null);
            // Dispatch reports per-message outcomes; a failing listener must
            // not turn a processed message into an error.
            if let Err(e) = hooks.do_action(&HookName::InboundProcessed, &[json!(message.message_id), payload]) {
                tracing::warn!(error = %e, "inbound_processed hook failed");
            }
        }
        result
    }

    /// Dispatch each message in order; one result per message
    pub async fn dispatch_batch(&self, messages: &[InboundMessage]) -> Vec<HandlerResult> {
        let mut results = Vec::with_capacity(messages.len());
        for message in messages {
            results.push(self.dispatch(message).await);
        }
        results
    }

    /// Registered handlers in dispatch order
    pub fn handlers(&self) -> Vec<HandlerInfo> {
        self.handlers
            .iter()
            .map(|h| HandlerInfo {
                id: h.id().to_string(),
                name: h.name().to_string(),
                priority: h.priority(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Payload of a caught panic, when it is a string
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl std::fmt::Debug for HandlerDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerDispatcher")
            .field("handlers", &self.handlers())
            .field("unmatched_message", &self.unmatched_message)
            .finish()
    }
}
