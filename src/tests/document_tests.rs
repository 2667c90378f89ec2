//! Builder state: actions, history, selection and snapshots
//!
//! These tests drive `BuilderState` the way the editor does and check the
//! document after every step.

#[cfg(test)]
mod document_tests {
    use serde_json::{json, Value};

    use crate::config::BuilderConfig;
    use crate::core::{BlockId, BlockRegistry, PropertyMap};
    use crate::document::{BuilderDocument, BuilderState, DocumentError, MAX_DEPTH};
    use crate::hooks::{HookBus, HookError, HookName, DEFAULT_PRIORITY};

    fn state() -> BuilderState {
        BuilderState::new(BlockRegistry::with_builtin_blocks(), HookBus::new(), &BuilderConfig::default())
    }

    fn patch(value: Value) -> PropertyMap {
        match value {
            Value::Object(map) => map,
            _ => PropertyMap::new(),
        }
    }

    /// A new block gets the definition's default props and lands at the end
    #[test]
    fn test_add_block_defaults() {
        let mut state = state();
        let first = state.add_block("text", None, None).unwrap();
        let second = state.add_block("spacer", None, None).unwrap();

        assert_eq!(state.document().root(), &[first.clone(), second]);
        let block = state.document().get(&first).unwrap();
        assert_eq!(block.props["text"], json!("Start typing..."));
        assert!(state.can_undo());
    }

    /// Index is clamped to the end of the sibling list
    #[test]
    fn test_add_block_index_is_clamped() {
        let mut state = state();
        let a = state.add_block("text", None, None).unwrap();
        let b = state.add_block("text", None, Some(0)).unwrap();
        let c = state.add_block("text", None, Some(99)).unwrap();
        assert_eq!(state.document().root(), &[b, a, c]);
    }

    /// Unknown types and non-container parents are rejected without history
    #[test]
    fn test_add_block_errors() {
        let mut state = state();
        assert!(matches!(
            state.add_block("nope", None, None),
            Err(DocumentError::UnknownType(_))
        ));

        let text = state.add_block("text", None, None).unwrap();
        let depth = state.history().undo_depth();
        assert!(matches!(
            state.add_block("text", Some(&text), None),
            Err(DocumentError::NotAContainer(id)) if id == text
        ));
        assert!(matches!(
            state.add_block("text", Some(&BlockId::from("ghost")), None),
            Err(DocumentError::BlockNotFound(_))
        ));
        assert_eq!(state.history().undo_depth(), depth);
    }

    /// BlockDefaultProps can rewrite the defaults of new blocks
    #[test]
    fn test_default_props_filter() {
        let hooks = HookBus::new();
        hooks
            .add_filter(HookName::BlockDefaultProps, DEFAULT_PRIORITY, |mut props, args| {
                if args.first() == Some(&json!("button")) {
                    props["text"] = json!("Buy now");
                }
                Ok(props)
            })
            .unwrap();
        let mut state = BuilderState::new(BlockRegistry::with_builtin_blocks(), hooks, &BuilderConfig::default());

        let id = state.add_block("button", None, None).unwrap();
        assert_eq!(state.document().get(&id).unwrap().props["text"], json!("Buy now"));
    }

    /// add, remove, undo restores the pre-removal document; redo restores
    /// the post-removal one exactly.
    #[test]
    fn test_remove_undo_redo() {
        let mut state = state();
        let id = state.add_block("text", None, None).unwrap();
        let before_remove = state.document().clone();

        state.remove_block(&id).unwrap();
        let after_remove = state.document().clone();
        assert!(state.document().is_empty());

        assert!(state.undo());
        assert_eq!(state.document(), &before_remove);

        assert!(state.redo());
        assert_eq!(state.document(), &after_remove);
        assert!(!state.redo());
    }

    /// Removing a block removes its whole subtree
    #[test]
    fn test_remove_cascades() {
        let mut state = state();
        let section = state.add_block("section", None, None).unwrap();
        let columns = state.add_block("columns", Some(&section), None).unwrap();
        state.add_block("text", Some(&columns), None).unwrap();
        state.add_block("image", Some(&columns), None).unwrap();
        let keep = state.add_block("spacer", None, None).unwrap();

        state.remove_block(&section).unwrap();
        assert_eq!(state.document().len(), 1);
        assert_eq!(state.document().root(), &[keep]);
        assert!(state.document().validate().is_ok());
    }

    /// Moving a block under its own descendant fails and changes nothing
    #[test]
    fn test_move_into_descendant_is_cycle() {
        let mut state = state();
        let outer = state.add_block("section", None, None).unwrap();
        let inner = state.add_block("section", Some(&outer), None).unwrap();
        let before = state.document().to_json().unwrap();
        let depth = state.history().undo_depth();

        let err = state.move_block(&outer, Some(&inner), 0).unwrap_err();
        assert!(matches!(err, DocumentError::Cycle { .. }));
        let err = state.move_block(&outer, Some(&outer), 0).unwrap_err();
        assert!(matches!(err, DocumentError::Cycle { .. }));

        assert_eq!(state.document().to_json().unwrap(), before);
        assert_eq!(state.history().undo_depth(), depth);
    }

    /// Moves between parents and within one parent
    #[test]
    fn test_move_block() {
        let mut state = state();
        let a = state.add_block("text", None, None).unwrap();
        let b = state.add_block("text", None, None).unwrap();
        let c = state.add_block("text", None, None).unwrap();
        let section = state.add_block("section", None, None).unwrap();

        // Same parent: the index counts positions after `a` is taken out
        state.move_block(&a, None, 2).unwrap();
        assert_eq!(state.document().root(), &[b.clone(), c.clone(), a.clone(), section.clone()]);

        state.move_block(&c, Some(&section), 5).unwrap();
        assert_eq!(state.document().root(), &[b.clone(), a.clone(), section.clone()]);
        assert_eq!(state.document().get(&section).unwrap().children, vec![c.clone()]);
        assert_eq!(state.document().parent_of(&c), Some(&section));

        state.move_block(&c, None, 0).unwrap();
        assert_eq!(state.document().root(), &[c, b, a, section]);
    }

    /// Moving into a non-container is refused
    #[test]
    fn test_move_into_leaf() {
        let mut state = state();
        let text = state.add_block("text", None, None).unwrap();
        let other = state.add_block("text", None, None).unwrap();
        assert!(matches!(
            state.move_block(&other, Some(&text), 0),
            Err(DocumentError::NotAContainer(_))
        ));
    }

    /// Patches overwrite keys and `null` removes them
    #[test]
    fn test_update_props_and_styles() {
        let mut state = state();
        let id = state.add_block("button", None, None).unwrap();

        state
            .update_block_props(&id, &patch(json!({"text": "Go", "url": null, "extra": 1})))
            .unwrap();
        let block = state.document().get(&id).unwrap();
        assert_eq!(block.props["text"], json!("Go"));
        assert!(!block.props.contains_key("url"));
        assert_eq!(block.props["extra"], json!(1));

        state
            .update_layout_styles(&id, &patch(json!({"marginTop": 12, "align": "left"})))
            .unwrap();
        state.update_layout_styles(&id, &patch(json!({"align": null}))).unwrap();
        let styles = &state.document().get(&id).unwrap().layout_styles;
        assert_eq!(styles.get("marginTop"), Some(&json!(12)));
        assert!(styles.get("align").is_none());

        assert!(matches!(
            state.update_block_props(&BlockId::from("ghost"), &PropertyMap::new()),
            Err(DocumentError::BlockNotFound(_))
        ));
    }

    /// Settings patches are validated; a bad patch leaves settings alone
    #[test]
    fn test_update_settings() {
        let mut state = state();
        state
            .update_settings(&patch(json!({"contentWidth": 640, "preheader": "Hello"})))
            .unwrap();
        assert_eq!(state.document().settings().content_width, Some(640));
        assert_eq!(state.document().settings().extra["preheader"], json!("Hello"));

        let depth = state.history().undo_depth();
        assert!(state.update_settings(&patch(json!({"contentWidth": "wide"}))).is_err());
        assert_eq!(state.document().settings().content_width, Some(640));
        assert_eq!(state.history().undo_depth(), depth);
    }

    /// Duplicates get fresh ids for the whole subtree and sit after the original
    #[test]
    fn test_duplicate_block() {
        let mut state = state();
        let section = state.add_block("section", None, None).unwrap();
        let child = state.add_block("text", Some(&section), None).unwrap();
        let tail = state.add_block("spacer", None, None).unwrap();
        state
            .update_block_props(&child, &patch(json!({"text": "copy me"})))
            .unwrap();

        let copy = state.duplicate_block(&section).unwrap();
        let doc = state.document();
        assert_eq!(doc.root(), &[section.clone(), copy.clone(), tail]);
        assert_ne!(copy, section);

        let copied_children = &doc.get(&copy).unwrap().children;
        assert_eq!(copied_children.len(), 1);
        assert_ne!(copied_children[0], child);
        assert_eq!(doc.get(&copied_children[0]).unwrap().props["text"], json!("copy me"));
        assert_eq!(doc.len(), 5);
        assert!(doc.validate().is_ok());
    }

    /// Selection is dropped once its block disappears, including via undo
    #[test]
    fn test_selection_pruned() {
        let mut state = state();
        let id = state.add_block("text", None, None).unwrap();
        state.select_block(Some(&id)).unwrap();
        assert_eq!(state.selection(), Some(&id));

        assert!(state.undo());
        assert_eq!(state.selection(), None);

        assert!(state.redo());
        state.select_block(Some(&id)).unwrap();
        state.remove_block(&id).unwrap();
        assert_eq!(state.selection(), None);

        assert!(state.select_block(Some(&BlockId::from("ghost"))).is_err());
    }

    /// Selecting does not touch history
    #[test]
    fn test_selection_not_in_history() {
        let mut state = state();
        let id = state.add_block("text", None, None).unwrap();
        let depth = state.history().undo_depth();
        state.select_block(Some(&id)).unwrap();
        state.select_block(None).unwrap();
        assert_eq!(state.history().undo_depth(), depth);
    }

    /// History keeps at most `history_limit` entries
    #[test]
    fn test_history_limit() {
        let config = BuilderConfig {
            history_limit: 3,
            ..BuilderConfig::default()
        };
        let mut state = BuilderState::new(BlockRegistry::with_builtin_blocks(), HookBus::new(), &config);
        for _ in 0..5 {
            state.add_block("text", None, None).unwrap();
        }

        let mut undone = 0;
        while state.undo() {
            undone += 1;
        }
        assert_eq!(undone, 3);
        assert_eq!(state.document().len(), 2);
    }

    /// A new action after undo clears the redo stack
    #[test]
    fn test_action_clears_redo() {
        let mut state = state();
        state.add_block("text", None, None).unwrap();
        state.undo();
        assert!(state.can_redo());

        state.add_block("spacer", None, None).unwrap();
        assert!(!state.can_redo());
    }

    /// A failing action hook rolls the mutation back
    #[test]
    fn test_hook_failure_rolls_back() {
        let hooks = HookBus::new();
        hooks
            .add_action(HookName::BlockRemoved, DEFAULT_PRIORITY, |_| {
                Err(HookError::failed(&HookName::BlockRemoved, "read-only"))
            })
            .unwrap();
        let mut state = BuilderState::new(BlockRegistry::with_builtin_blocks(), hooks, &BuilderConfig::default());
        let id = state.add_block("text", None, None).unwrap();
        let before = state.document().clone();

        let err = state.remove_block(&id).unwrap_err();
        assert!(matches!(err, DocumentError::Hook(_)));
        assert_eq!(state.document(), &before);
        assert_eq!(state.history().undo_depth(), 1);
    }

    /// Snapshots round-trip with ids, types, props, children and order intact
    #[test]
    fn test_snapshot_roundtrip() {
        let mut state = state();
        let section = state.add_block("section", None, None).unwrap();
        state.add_block("heading", Some(&section), None).unwrap();
        state.add_block("text", Some(&section), None).unwrap();
        state.add_block("divider", None, None).unwrap();
        state
            .update_settings(&patch(json!({"backgroundColor": "#eeeeee"})))
            .unwrap();

        let json = state.document().to_json().unwrap();
        let restored = BuilderDocument::from_json(&json).unwrap();
        assert_eq!(&restored, state.document());

        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["root"].as_array().unwrap().len(), 2);
        assert_eq!(value["blocks"][section.as_str()]["type"], "section");
        assert_eq!(value["blocks"][section.as_str()]["children"].as_array().unwrap().len(), 2);
        assert_eq!(value["settings"]["backgroundColor"], "#eeeeee");
    }

    /// Loading a snapshot resets history and selection
    #[test]
    fn test_load_resets_session() {
        let mut state = state();
        let id = state.add_block("text", None, None).unwrap();
        state.select_block(Some(&id)).unwrap();
        let snapshot = state.document().clone();

        state.load(snapshot.clone()).unwrap();
        assert!(!state.can_undo());
        assert_eq!(state.selection(), None);
        assert_eq!(state.document(), &snapshot);
    }

    /// Snapshot JSON for a single chain of `depth` nested sections, `s0` outermost
    fn nested_sections(depth: usize) -> String {
        let mut blocks = serde_json::Map::new();
        for i in 0..depth {
            let children: Vec<Value> = if i + 1 < depth {
                vec![json!(format!("s{}", i + 1))]
            } else {
                Vec::new()
            };
            blocks.insert(
                format!("s{}", i),
                json!({"id": format!("s{}", i), "type": "section", "children": children}),
            );
        }
        json!({"root": ["s0"], "blocks": blocks}).to_string()
    }

    /// Snapshots may nest up to the limit; one level more is rejected
    #[test]
    fn test_snapshot_depth_limit() {
        let deepest = BuilderDocument::from_json(&nested_sections(MAX_DEPTH)).unwrap();
        assert_eq!(deepest.depth_of(&BlockId::from(format!("s{}", MAX_DEPTH - 1))), MAX_DEPTH);
        assert_eq!(deepest.subtree_height(&BlockId::from("s0")), MAX_DEPTH);

        for depth in [MAX_DEPTH + 1, 5_000] {
            let err = BuilderDocument::from_json(&nested_sections(depth)).unwrap_err();
            assert!(matches!(err, DocumentError::TooDeep { max, .. } if max == MAX_DEPTH));
        }
    }

    /// Adding or moving past the depth limit fails and records no history
    #[test]
    fn test_edits_respect_depth_limit() {
        let mut state = state();
        let mut chain = vec![state.add_block("section", None, None).unwrap()];
        while chain.len() < MAX_DEPTH {
            let parent = chain.last().cloned();
            chain.push(state.add_block("section", parent.as_ref(), None).unwrap());
        }
        let depth = state.history().undo_depth();

        let err = state.add_block("text", chain.last(), None).unwrap_err();
        assert!(matches!(err, DocumentError::TooDeep { .. }));
        assert_eq!(err.user_message(), "Blocks cannot be nested that deeply.");

        // Section with one child: two levels tall
        let outer = state.add_block("section", None, None).unwrap();
        state.add_block("text", Some(&outer), None).unwrap();
        let before = state.document().clone();
        let depth_before = state.history().undo_depth();
        assert!(depth_before > depth);

        let err = state.move_block(&outer, Some(&chain[MAX_DEPTH - 2]), 0).unwrap_err();
        assert!(matches!(err, DocumentError::TooDeep { .. }));
        assert_eq!(state.document(), &before);
        assert_eq!(state.history().undo_depth(), depth_before);

        state.move_block(&outer, Some(&chain[MAX_DEPTH - 3]), 0).unwrap();
        assert_eq!(state.document().depth_of(&outer), MAX_DEPTH - 1);
        assert!(state.document().validate().is_ok());
    }
}
