//! Hook bus ordering and failure semantics

#[cfg(test)]
mod hook_tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use parking_lot::Mutex;
    use serde_json::{json, Value};

    use crate::hooks::{HookBus, HookError, HookName, DEFAULT_PRIORITY};

    fn title() -> HookName {
        HookName::Custom("title".into())
    }

    /// With nothing registered, applying filters returns the input unchanged
    #[test]
    fn test_filters_identity_when_empty() {
        let hooks = HookBus::new();
        let value = json!({"nested": [1, 2, {"k": "v"}]});
        let out = hooks.apply_filters(&title(), value.clone(), &[json!("arg")]).unwrap();
        assert_eq!(out, value);
    }

    /// The priority-5 filter's output is the priority-10 filter's input,
    /// regardless of registration order.
    #[test]
    fn test_filter_priority_threads_values() {
        let hooks = HookBus::new();
        hooks
            .add_filter(title(), 10, |v, _| Ok(json!(format!("{}-ten", v.as_str().unwrap_or_default()))))
            .unwrap();
        hooks
            .add_filter(title(), 5, |v, _| Ok(json!(format!("{}-five", v.as_str().unwrap_or_default()))))
            .unwrap();

        let out = hooks.apply_filters(&title(), json!("start"), &[]).unwrap();
        assert_eq!(out, json!("start-five-ten"));
    }

    /// Equal priorities run in registration order
    #[test]
    fn test_equal_priority_keeps_registration_order() {
        let hooks = HookBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for label in ["first", "second", "third"] {
            let seen = seen.clone();
            hooks
                .add_action(HookName::BlockAdded, DEFAULT_PRIORITY, move |_| {
                    seen.lock().push(label);
                    Ok(())
                })
                .unwrap();
        }

        hooks.do_action(&HookName::BlockAdded, &[]).unwrap();
        assert_eq!(*seen.lock(), vec!["first", "second", "third"]);
    }

    /// Filters receive the call arguments
    #[test]
    fn test_filter_receives_args() {
        let hooks = HookBus::new();
        hooks
            .add_filter(title(), DEFAULT_PRIORITY, |v, args| {
                let suffix = args.first().and_then(Value::as_str).unwrap_or_default();
                Ok(json!(format!("{}{}", v.as_str().unwrap_or_default(), suffix)))
            })
            .unwrap();

        let out = hooks.apply_filters(&title(), json!("a"), &[json!("b")]).unwrap();
        assert_eq!(out, json!("ab"));
    }

    /// The first error stops the chain and reaches the caller
    #[test]
    fn test_error_aborts_chain() {
        let hooks = HookBus::new();
        let later = Arc::new(AtomicUsize::new(0));

        hooks
            .add_action(HookName::DocumentChanged, 1, |_| {
                Err(HookError::failed(&HookName::DocumentChanged, "listener down"))
            })
            .unwrap();
        let counter = later.clone();
        hooks
            .add_action(HookName::DocumentChanged, 2, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();

        let err = hooks.do_action(&HookName::DocumentChanged, &[]).unwrap_err();
        assert!(err.to_string().contains("listener down"));
        assert_eq!(later.load(Ordering::SeqCst), 0);
    }

    /// A filter may call back into the bus without deadlocking
    #[test]
    fn test_reentrant_filter() {
        let hooks = HookBus::new();
        let inner = hooks.clone();
        hooks
            .add_filter(title(), DEFAULT_PRIORITY, move |v, _| {
                inner.apply_filters(&HookName::Custom("inner".into()), v, &[])
            })
            .unwrap();

        assert_eq!(hooks.apply_filters(&title(), json!(1), &[]).unwrap(), json!(1));
    }

    /// Registration fails once the bus is frozen; dispatch keeps working
    #[test]
    fn test_frozen_bus() {
        let hooks = HookBus::new();
        hooks.add_filter(title(), DEFAULT_PRIORITY, |v, _| Ok(v)).unwrap();
        hooks.freeze();

        let result = hooks.add_filter(title(), DEFAULT_PRIORITY, |v, _| Ok(v));
        assert!(matches!(result, Err(HookError::Frozen(_))));
        assert!(hooks.has_filters(&title()));
        assert_eq!(hooks.apply_filters(&title(), json!(2), &[]).unwrap(), json!(2));
    }
}
