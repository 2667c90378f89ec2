//! Inbound dispatch: ordering, first-match, failures and the built-in handlers

#[cfg(test)]
mod inbound_tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::config::InboundConfig;
    use crate::hooks::{HookBus, HookName, DEFAULT_PRIORITY};
    use crate::inbound::{
        ContactCaptureHandler, ContactStore, DispatcherBuilder, HandlerDispatcher, HandlerError, HandlerResult,
        HandlerStatus, InboundEmailHandler, InboundMessage, RecordLookup, ReplyTokenHandler, UNMATCHED_MESSAGE,
    };
    use crate::persistence::RecordRef;

    /// Test handler: matches subjects containing `needle`, counts `handle` calls
    struct SubjectHandler {
        id: String,
        priority: i32,
        needle: String,
        fail: bool,
        calls: Arc<AtomicUsize>,
    }

    impl SubjectHandler {
        fn new(id: &str, priority: i32, needle: &str) -> Self {
            Self {
                id: id.into(),
                priority,
                needle: needle.into(),
                fail: false,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn failing(mut self) -> Self {
            self.fail = true;
            self
        }
    }

    #[async_trait]
    impl InboundEmailHandler for SubjectHandler {
        fn id(&self) -> &str {
            &self.id
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn matches(&self, message: &InboundMessage) -> bool {
            message.subject.contains(&self.needle)
        }

        async fn handle(&self, _message: &InboundMessage) -> Result<HandlerResult, HandlerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(HandlerError::Storage("database unavailable".into()));
            }
            Ok(HandlerResult::success(format!("handled by {}", self.id)))
        }
    }

    fn message(subject: &str) -> InboundMessage {
        InboundMessage::new("Sender <sender@example.com>", subject)
    }

    /// Priorities 1, 2, 3 where only 2 matches: 2's result comes back and
    /// neither 1 nor 3 is ever asked to handle.
    #[tokio::test]
    async fn test_only_matching_handler_runs() {
        let p1 = SubjectHandler::new("one", 1, "alpha");
        let p2 = SubjectHandler::new("two", 2, "beta");
        let p3 = SubjectHandler::new("three", 3, "gamma");
        let (c1, c2, c3) = (p1.calls.clone(), p2.calls.clone(), p3.calls.clone());

        let dispatcher = HandlerDispatcher::builder().register(p3).register(p1).register(p2).build();
        let result = dispatcher.dispatch(&message("beta release")).await;

        assert_eq!(result.status, HandlerStatus::Success);
        assert_eq!(result.handler_id.as_deref(), Some("two"));
        assert_eq!(result.message.as_deref(), Some("handled by two"));
        assert_eq!(c1.load(Ordering::SeqCst), 0);
        assert_eq!(c2.load(Ordering::SeqCst), 1);
        assert_eq!(c3.load(Ordering::SeqCst), 0);
    }

    /// Lower priority wins when several handlers match; ties keep
    /// registration order.
    #[tokio::test]
    async fn test_priority_and_tie_order() {
        let dispatcher = HandlerDispatcher::builder()
            .register(SubjectHandler::new("late", 20, "x"))
            .register(SubjectHandler::new("first-tie", 5, "x"))
            .register(SubjectHandler::new("second-tie", 5, "x"))
            .build();

        let ids: Vec<String> = dispatcher.handlers().into_iter().map(|h| h.id).collect();
        assert_eq!(ids, vec!["first-tie", "second-tie", "late"]);

        let result = dispatcher.dispatch(&message("x")).await;
        assert_eq!(result.handler_id.as_deref(), Some("first-tie"));
    }

    /// A handler error becomes a failure result; lower-priority matches are
    /// not tried.
    #[tokio::test]
    async fn test_failure_does_not_fall_through() {
        let broken = SubjectHandler::new("broken", 1, "invoice").failing();
        let backup = SubjectHandler::new("backup", 2, "invoice");
        let backup_calls = backup.calls.clone();

        let dispatcher = HandlerDispatcher::builder().register(broken).register(backup).build();
        let result = dispatcher.dispatch(&message("invoice #4")).await;

        assert_eq!(result.status, HandlerStatus::Failure);
        assert_eq!(result.handler_id.as_deref(), Some("broken"));
        assert!(result.message.unwrap().contains("database unavailable"));
        assert_eq!(backup_calls.load(Ordering::SeqCst), 0);
    }

    /// No match yields a skipped result with the configured message
    #[tokio::test]
    async fn test_unmatched_message() {
        let dispatcher = HandlerDispatcher::builder().register(SubjectHandler::new("a", 1, "zzz")).build();
        let result = dispatcher.dispatch(&message("hello")).await;
        assert_eq!(result.status, HandlerStatus::Skipped);
        assert_eq!(result.message.as_deref(), Some(UNMATCHED_MESSAGE));
        assert_eq!(result.handler_id, None);

        let config = InboundConfig {
            unmatched_message: "Ignored".into(),
        };
        let dispatcher = DispatcherBuilder::from_config(&config).build();
        assert!(dispatcher.is_empty());
        let result = dispatcher.dispatch(&message("hello")).await;
        assert_eq!(result.message.as_deref(), Some("Ignored"));
    }

    /// Batches return one result per message, failures included
    #[tokio::test]
    async fn test_dispatch_batch() {
        let dispatcher = HandlerDispatcher::builder()
            .register(SubjectHandler::new("ok", 1, "ok"))
            .register(SubjectHandler::new("bad", 2, "bad").failing())
            .build();
        let results = dispatcher
            .dispatch_batch(&[message("ok"), message("bad"), message("other")])
            .await;

        let statuses: Vec<HandlerStatus> = results.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![HandlerStatus::Success, HandlerStatus::Failure, HandlerStatus::Skipped]
        );
    }

    /// Matches subjects starting with "boom" and panics while handling them
    struct Exploding;

    #[async_trait]
    impl InboundEmailHandler for Exploding {
        fn id(&self) -> &str {
            "exploding"
        }

        fn priority(&self) -> i32 {
            1
        }

        fn matches(&self, message: &InboundMessage) -> bool {
            message.subject.starts_with("boom")
        }

        async fn handle(&self, message: &InboundMessage) -> Result<HandlerResult, HandlerError> {
            panic!("cannot parse {}", message.subject)
        }
    }

    /// A panicking handler yields a failure for its message; the rest of the
    /// batch is still processed.
    #[tokio::test]
    async fn test_handler_panic_becomes_failure() {
        let dispatcher = HandlerDispatcher::builder()
            .register(Exploding)
            .register(SubjectHandler::new("ok", 2, "ok"))
            .build();
        let results = dispatcher
            .dispatch_batch(&[message("boom one"), message("ok"), message("boom two")])
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].status, HandlerStatus::Failure);
        assert_eq!(results[0].handler_id.as_deref(), Some("exploding"));
        assert_eq!(results[0].message.as_deref(), Some("Handler panicked: cannot parse boom one"));
        assert!(results[1].is_success());
        assert_eq!(results[2].status, HandlerStatus::Failure);
    }

    /// InboundProcessed fires per dispatch; a failing listener does not
    /// change the result.
    #[tokio::test]
    async fn test_inbound_processed_hook() {
        let hooks = HookBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        hooks
            .add_action(HookName::InboundProcessed, DEFAULT_PRIORITY, move |args| {
                sink.lock().push(args[1]["status"].as_str().unwrap_or_default().to_string());
                Ok(())
            })
            .unwrap();
        hooks
            .add_action(HookName::InboundProcessed, DEFAULT_PRIORITY + 1, |_| {
                Err(crate::hooks::HookError::failed(&HookName::InboundProcessed, "audit log offline"))
            })
            .unwrap();

        let dispatcher = HandlerDispatcher::builder()
            .register(SubjectHandler::new("ok", 1, "ok"))
            .hooks(hooks)
            .build();
        let result = dispatcher.dispatch(&message("ok")).await;

        assert!(result.is_success());
        assert_eq!(*seen.lock(), vec!["success".to_string()]);
    }

    /// The dispatcher can be shared across tasks
    #[tokio::test]
    async fn test_concurrent_dispatch() {
        let handler = SubjectHandler::new("ok", 1, "ok");
        let calls = handler.calls.clone();
        let dispatcher = Arc::new(HandlerDispatcher::builder().register(handler).build());

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let dispatcher = dispatcher.clone();
            tasks.push(tokio::spawn(async move { dispatcher.dispatch(&message("ok")).await }));
        }
        for task in tasks {
            assert!(task.await.unwrap().is_success());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 8);
    }

    // ── Built-in handlers ───────────────────────────────────────────────

    #[derive(Default)]
    struct Tickets {
        attached: Mutex<Vec<(u64, String)>>,
    }

    #[async_trait]
    impl RecordLookup for Tickets {
        async fn find_by_token(&self, token: &str) -> Result<Option<RecordRef>, HandlerError> {
            Ok((token == "t-7").then(|| RecordRef::new("ticket", 7)))
        }

        async fn find_by_id(&self, id: u64) -> Result<Option<RecordRef>, HandlerError> {
            Ok((id < 100).then(|| RecordRef::new("ticket", id)))
        }

        async fn attach_reply(&self, record: &RecordRef, message: &InboundMessage) -> Result<(), HandlerError> {
            self.attached.lock().push((record.id, message.subject.clone()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct Contacts {
        known: Mutex<Vec<(String, Option<String>)>>,
        logged: AtomicUsize,
    }

    #[async_trait]
    impl ContactStore for Contacts {
        async fn find_by_email(&self, email: &str) -> Result<Option<RecordRef>, HandlerError> {
            let known = self.known.lock();
            Ok(known
                .iter()
                .position(|(e, _)| e == email)
                .map(|i| RecordRef::new("contact", i as u64 + 1)))
        }

        async fn create_contact(&self, email: &str, name: Option<&str>) -> Result<RecordRef, HandlerError> {
            let mut known = self.known.lock();
            known.push((email.to_string(), name.map(str::to_string)));
            Ok(RecordRef::new("contact", known.len() as u64))
        }

        async fn log_message(&self, _contact: &RecordRef, _message: &InboundMessage) -> Result<(), HandlerError> {
            self.logged.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Replies are threaded by token, then by subject tag; contact capture
    /// only sees what reply threading does not claim.
    #[tokio::test]
    async fn test_builtin_handlers_together() {
        let dispatcher = HandlerDispatcher::builder()
            .register(ContactCaptureHandler::new(Contacts::default()).with_ignored_domain("ourcompany.com"))
            .register(ReplyTokenHandler::new(Tickets::default(), "reply"))
            .build();

        let ids: Vec<String> = dispatcher.handlers().into_iter().map(|h| h.id).collect();
        assert_eq!(ids, vec!["reply_token", "contact_capture"]);

        let reply = message("Re: your ticket").with_to("reply+t-7@ourcompany.com");
        let result = dispatcher.dispatch(&reply).await;
        assert_eq!(result.status, HandlerStatus::Success);
        assert_eq!(result.record, Some(RecordRef::new("ticket", 7)));

        let tagged = message("Re: [#42] printer");
        let result = dispatcher.dispatch(&tagged).await;
        assert_eq!(result.record, Some(RecordRef::new("ticket", 42)));

        let unknown = message("Re: [#500] old thread");
        let result = dispatcher.dispatch(&unknown).await;
        assert_eq!(result.status, HandlerStatus::Failure);
        assert_eq!(result.handler_id.as_deref(), Some("reply_token"));

        let fresh = message("Hello there");
        let result = dispatcher.dispatch(&fresh).await;
        assert_eq!(result.handler_id.as_deref(), Some("contact_capture"));
        assert_eq!(result.message.as_deref(), Some("Created contact"));

        let again = dispatcher.dispatch(&fresh).await;
        assert_eq!(again.message.as_deref(), Some("Linked to existing contact"));
        assert_eq!(again.record, result.record);

        let internal = InboundMessage::new("me@ourcompany.com", "note to self");
        let result = dispatcher.dispatch(&internal).await;
        assert_eq!(result.status, HandlerStatus::Skipped);
    }

    /// New contacts keep the sender's display name
    #[tokio::test]
    async fn test_contact_capture_keeps_name() {
        let contacts = Arc::new(Contacts::default());
        let handler = ContactCaptureHandler::new(SharedContacts(contacts.clone()));
        let result = handler
            .handle(&InboundMessage::new("\"Ada Lovelace\" <ADA@example.com>", "hi"))
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(
            contacts.known.lock()[0],
            ("ada@example.com".to_string(), Some("Ada Lovelace".to_string()))
        );
        assert_eq!(contacts.logged.load(Ordering::SeqCst), 1);
    }

    struct SharedContacts(Arc<Contacts>);

    #[async_trait]
    impl ContactStore for SharedContacts {
        async fn find_by_email(&self, email: &str) -> Result<Option<RecordRef>, HandlerError> {
            self.0.find_by_email(email).await
        }

        async fn create_contact(&self, email: &str, name: Option<&str>) -> Result<RecordRef, HandlerError> {
            self.0.create_contact(email, name).await
        }

        async fn log_message(&self, contact: &RecordRef, message: &InboundMessage) -> Result<(), HandlerError> {
            self.0.log_message(contact, message).await
        }
    }
}
