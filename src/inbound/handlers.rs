//! Built-in inbound handlers
//!
//! Both handlers reach the host's storage through a collaborator trait, so
//! the crate never touches a database directly.

use async_trait::async_trait;

use super::{HandlerError, HandlerResult, InboundEmailHandler, InboundMessage};
use crate::persistence::RecordRef;

// ── Reply threading ─────────────────────────────────────────────────────

/// How a reply points back at the record it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyReference {
    /// `reply+<token>@...` recipient
    Token(String),
    /// `[#<id>]` tag in the subject
    Id(u64),
}

impl ReplyReference {
    /// Find a reply reference in `message`. Recipient tokens win over subject
    /// tags.
    pub fn find(message: &InboundMessage, mailbox: &str) -> Option<Self> {
        let prefix = format!("{}+", mailbox.to_lowercase());
        let token = message.recipients().into_iter().find_map(|address| {
            let (local, _) = address.split_once('@')?;
            let token = local.strip_prefix(&prefix)?;
            let valid = !token.is_empty() && token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
            valid.then(|| token.to_string())
        });
        if let Some(token) = token {
            return Some(ReplyReference::Token(token));
        }
        subject_tag(&message.subject).map(ReplyReference::Id)
    }
}

/// First `[#123]` tag in a subject line
fn subject_tag(subject: &str) -> Option<u64> {
    let mut rest = subject;
    while let Some(start) = rest.find("[#") {
        let after = &rest[start + 2..];
        if let Some(end) = after.find(']') {
            if let Ok(id) = after[..end].parse() {
                return Some(id);
            }
        }
        rest = after;
    }
    None
}

/// Host-side record lookup for reply threading
#[async_trait]
pub trait RecordLookup: Send + Sync {
    async fn find_by_token(&self, token: &str) -> Result<Option<RecordRef>, HandlerError>;

    async fn find_by_id(&self, id: u64) -> Result<Option<RecordRef>, HandlerError>;

    /// Store the reply against `record`
    async fn attach_reply(&self, record: &RecordRef, message: &InboundMessage) -> Result<(), HandlerError>;
}

/// Links replies to the record they answer
pub struct ReplyTokenHandler<L> {
    lookup: L,
    mailbox: String,
    priority: i32,
}

impl<L: RecordLookup> ReplyTokenHandler<L> {
    /// `mailbox` is the local part replies are addressed to (`reply` for
    /// `reply+<token>@example.com`)
    pub fn new(lookup: L, mailbox: impl Into<String>) -> Self {
        Self {
            lookup,
            mailbox: mailbox.into(),
            priority: super::DEFAULT_HANDLER_PRIORITY,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

#[async_trait]
impl<L: RecordLookup> InboundEmailHandler for ReplyTokenHandler<L> {
    fn id(&self) -> &str {
        "reply_token"
    }

    fn name(&self) -> &str {
        "Reply threading"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn matches(&self, message: &InboundMessage) -> bool {
        ReplyReference::find(message, &self.mailbox).is_some()
    }

    async fn handle(&self, message: &InboundMessage) -> Result<HandlerResult, HandlerError> {
        let reference = ReplyReference::find(message, &self.mailbox)
            .ok_or_else(|| HandlerError::InvalidMessage("no reply reference".into()))?;

        let record = match &reference {
            ReplyReference::Token(token) => self.lookup.find_by_token(token).await?,
            ReplyReference::Id(id) => self.lookup.find_by_id(*id).await?,
        };
        let record = match record {
            Some(record) => record,
            None => return Ok(HandlerResult::failure(format!("No record for reply reference {:?}", reference))),
        };

        self.lookup.attach_reply(&record, message).await?;
        tracing::info!(model = %record.model_type, id = record.id, "reply attached");
        Ok(HandlerResult::success("Reply attached").with_record(record))
    }
}

// ── Contact capture ─────────────────────────────────────────────────────

/// Host-side CRM contact storage
#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<RecordRef>, HandlerError>;

    async fn create_contact(&self, email: &str, name: Option<&str>) -> Result<RecordRef, HandlerError>;

    /// Record the message on the contact's timeline
    async fn log_message(&self, contact: &RecordRef, message: &InboundMessage) -> Result<(), HandlerError>;
}

/// Links every message from an unknown or known sender to a CRM contact.
/// Runs late (priority 100) so more specific handlers see messages first.
pub struct ContactCaptureHandler<S> {
    store: S,
    ignored_domains: Vec<String>,
    priority: i32,
}

impl<S: ContactStore> ContactCaptureHandler<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            ignored_domains: Vec::new(),
            priority: 100,
        }
    }

    /// Ignore senders from `domain` (e.g. your own domain or a no-reply service)
    pub fn with_ignored_domain(mut self, domain: impl Into<String>) -> Self {
        self.ignored_domains.push(domain.into().to_lowercase());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    fn is_ignored(&self, address: &str) -> bool {
        address
            .rsplit_once('@')
            .map(|(_, domain)| self.ignored_domains.iter().any(|d| d == domain))
            .unwrap_or(true)
    }
}

#[async_trait]
impl<S: ContactStore> InboundEmailHandler for ContactCaptureHandler<S> {
    fn id(&self) -> &str {
        "contact_capture"
    }

    fn name(&self) -> &str {
        "Contact capture"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn matches(&self, message: &InboundMessage) -> bool {
        message
            .sender_address()
            .map(|address| !self.is_ignored(&address))
            .unwrap_or(false)
    }

    async fn handle(&self, message: &InboundMessage) -> Result<HandlerResult, HandlerError> {
        let address = message
            .sender_address()
            .ok_or_else(|| HandlerError::InvalidMessage(format!("unparseable sender {:?}", message.from)))?;

        let (contact, created) = match self.store.find_by_email(&address).await? {
            Some(contact) => (contact, false),
            None => {
                let name = message.sender_name();
                (self.store.create_contact(&address, name.as_deref()).await?, true)
            }
        };
        self.store.log_message(&contact, message).await?;

        let summary = if created {
            "Created contact"
        } else {
            "Linked to existing contact"
        };
        Ok(HandlerResult::success(summary).with_record(contact))
    }
}
