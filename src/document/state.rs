//! Builder state manager
//!
//! Owns the document for one editing session together with its undo/redo
//! history and the current selection. Every mutating action records the
//! pre-mutation snapshot; a failed action restores that snapshot and leaves
//! history untouched, so errors never leave a half-applied edit behind.
//!
//! Selection is UI state: it is not part of snapshots and is only cleared
//! when the selected block stops existing.
//!
//! The state is meant for a single session. Two sessions saving the same
//! stored document resolve as last-write-wins unless the caller passes an
//! expected revision to [`save`](BuilderState::save).

use serde_json::{json, Value};

use super::{Block, BuilderDocument, DocumentError, History, MAX_DEPTH};
use crate::config::BuilderConfig;
use crate::core::{BlockId, BlockRegistry, PropertyMap};
use crate::hooks::{HookBus, HookError, HookName};
use crate::persistence::{DocumentStore, StoreError};

/// One editing session over a `BuilderDocument`
#[derive(Debug)]
pub struct BuilderState {
    document: BuilderDocument,
    history: History,
    selection: Option<BlockId>,
    registry: BlockRegistry,
    hooks: HookBus,
}

impl BuilderState {
    pub fn new(registry: BlockRegistry, hooks: HookBus, config: &BuilderConfig) -> Self {
        Self {
            document: BuilderDocument::new(),
            history: History::new(config.history_limit),
            selection: None,
            registry,
            hooks,
        }
    }

    /// Replace the document, e.g. after loading a saved snapshot.
    /// History and selection are reset.
    pub fn load(&mut self, document: BuilderDocument) -> Result<(), DocumentError> {
        document.validate()?;
        self.document = document;
        self.history.clear();
        self.selection = None;
        Ok(())
    }

    pub fn document(&self) -> &BuilderDocument {
        &self.document
    }

    pub fn selection(&self) -> Option<&BlockId> {
        self.selection.as_ref()
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    pub fn hooks(&self) -> &HookBus {
        &self.hooks
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    // ── Actions ─────────────────────────────────────────────────────────

    /// Add a block of `block_type` under `parent` (or at the top level) at
    /// `index` (clamped; `None` appends). Default props come from the
    /// definition, passed through the `BlockDefaultProps` filter.
    pub fn add_block(
        &mut self,
        block_type: &str,
        parent: Option<&BlockId>,
        index: Option<usize>,
    ) -> Result<BlockId, DocumentError> {
        let definition = self.registry.get(block_type)?;
        if let Some(parent_id) = parent {
            self.ensure_container(parent_id)?;
            self.ensure_depth(parent_id, parent, 1)?;
        }

        let props = self.hooks.apply_filters(
            &HookName::BlockDefaultProps,
            Value::Object(definition.default_props.clone()),
            &[json!(block_type)],
        )?;
        let props = match props {
            Value::Object(map) => map,
            _ => {
                return Err(HookError::failed(
                    &HookName::BlockDefaultProps,
                    "filter must return an object",
                )
                .into())
            }
        };

        let block = Block::new(block_type).with_props(props);
        let id = block.id.clone();
        let hooks = self.hooks.clone();
        self.commit("add_block", |doc| {
            doc.insert_block(block);
            doc.attach(id.clone(), parent, index)?;
            hooks.do_action(&HookName::BlockAdded, &[json!(id), json!(block_type)])?;
            Ok(())
        })?;

        tracing::debug!(block_id = %id, block_type, "block added");
        Ok(id)
    }

    /// Merge `patch` into the block's props (`null` removes a key)
    pub fn update_block_props(&mut self, id: &BlockId, patch: &PropertyMap) -> Result<(), DocumentError> {
        self.commit("update_block_props", |doc| doc.patch_props(id, patch))
    }

    /// Merge `patch` into the block's layout styles (`null` removes a key)
    pub fn update_layout_styles(&mut self, id: &BlockId, patch: &PropertyMap) -> Result<(), DocumentError> {
        self.commit("update_layout_styles", |doc| {
            doc.block_mut(id)?.layout_styles.apply_patch(patch);
            Ok(())
        })
    }

    /// Merge `patch` into the canvas settings (`null` removes a key)
    pub fn update_settings(&mut self, patch: &PropertyMap) -> Result<(), DocumentError> {
        self.commit("update_settings", |doc| {
            let settings = doc.settings().patched(patch)?;
            *doc.settings_mut() = settings;
            Ok(())
        })
    }

    /// Move `id` under `new_parent` (or to the top level) at `new_index`.
    ///
    /// The index is clamped and, for moves within the same parent, refers to
    /// the position after the block has been taken out of the list.
    /// Moving a block into itself or any of its descendants fails with
    /// [`DocumentError::Cycle`] and leaves the document unchanged, as does a
    /// move that would nest the subtree deeper than [`MAX_DEPTH`].
    pub fn move_block(
        &mut self,
        id: &BlockId,
        new_parent: Option<&BlockId>,
        new_index: usize,
    ) -> Result<(), DocumentError> {
        self.document.get(id)?;
        if let Some(target) = new_parent {
            self.document.get(target)?;
            if target == id || self.document.is_descendant(id, target) {
                return Err(DocumentError::Cycle {
                    block: id.clone(),
                    target: target.clone(),
                });
            }
            self.ensure_container(target)?;
        }
        self.ensure_depth(id, new_parent, self.document.subtree_height(id))?;

        self.commit("move_block", |doc| {
            doc.detach(id)?;
            doc.attach(id.clone(), new_parent, Some(new_index))
        })
    }

    /// Remove a block together with all of its descendants
    pub fn remove_block(&mut self, id: &BlockId) -> Result<(), DocumentError> {
        self.document.get(id)?;
        let hooks = self.hooks.clone();
        let removed = self.commit("remove_block", |doc| {
            doc.detach(id)?;
            let removed = doc.drop_subtree(id);
            hooks.do_action(&HookName::BlockRemoved, &[json!(id), json!(removed.len())])?;
            Ok(removed)
        })?;
        tracing::debug!(block_id = %id, removed = removed.len(), "block removed");
        Ok(())
    }

    /// Deep-copy a block and its subtree with fresh ids, placing the copy
    /// right after the original. Returns the id of the copy.
    pub fn duplicate_block(&mut self, id: &BlockId) -> Result<BlockId, DocumentError> {
        self.document.get(id)?;
        self.commit("duplicate_block", |doc| {
            let copy_id = copy_subtree(doc, id)?;
            let parent = doc.parent_of(id).cloned();
            let siblings: &[BlockId] = match &parent {
                Some(parent_id) => &doc.get(parent_id)?.children,
                None => doc.root(),
            };
            let position = siblings.iter().position(|c| c == id).map(|p| p + 1);
            doc.attach(copy_id.clone(), parent.as_ref(), position)?;
            Ok(copy_id)
        })
    }

    /// Select a block, or clear the selection with `None`. Not recorded in history.
    pub fn select_block(&mut self, id: Option<&BlockId>) -> Result<(), DocumentError> {
        match id {
            Some(id) => {
                self.document.get(id)?;
                self.selection = Some(id.clone());
            }
            None => self.selection = None,
        }
        Ok(())
    }

    /// Restore the previous snapshot. Returns `false` when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        match self.history.undo(&self.document) {
            Some(previous) => {
                self.document = previous;
                self.prune_selection();
                true
            }
            None => false,
        }
    }

    /// Re-apply the last undone change. Returns `false` when there is nothing to redo.
    pub fn redo(&mut self) -> bool {
        match self.history.redo(&self.document) {
            Some(next) => {
                self.document = next;
                self.prune_selection();
                true
            }
            None => false,
        }
    }

    // ── Persistence ─────────────────────────────────────────────────────

    /// Replace the session document with the stored one; `Ok(None)` when
    /// nothing is stored under `key`. Returns the stored revision.
    pub fn open(&mut self, store: &dyn DocumentStore, key: &str) -> Result<Option<u64>, StoreError> {
        match store.load(key)? {
            Some(stored) => {
                self.load(stored.document)?;
                Ok(Some(stored.revision))
            }
            None => Ok(None),
        }
    }

    /// Persist the document and fire `DocumentSaved`. See [`DocumentStore::save`]
    /// for `expected_revision`.
    pub fn save(
        &self,
        store: &dyn DocumentStore,
        key: &str,
        expected_revision: Option<u64>,
    ) -> Result<u64, StoreError> {
        let revision = store.save(key, &self.document, expected_revision)?;
        self.hooks
            .do_action(&HookName::DocumentSaved, &[json!(key), json!(revision)])?;
        tracing::info!(key, revision, blocks = self.document.len(), "document saved");
        Ok(revision)
    }

    // ── Internals ───────────────────────────────────────────────────────

    /// Run a mutation against the document. On success the prior snapshot is
    /// recorded and `DocumentChanged` fires; on any error the prior snapshot
    /// is restored.
    fn commit<T>(
        &mut self,
        operation: &str,
        mutate: impl FnOnce(&mut BuilderDocument) -> Result<T, DocumentError>,
    ) -> Result<T, DocumentError> {
        let before = self.document.clone();
        let outcome = mutate(&mut self.document).and_then(|value| {
            self.hooks
                .do_action(&HookName::DocumentChanged, &[json!(operation)])?;
            Ok(value)
        });

        match outcome {
            Ok(value) => {
                self.history.record(before);
                self.prune_selection();
                Ok(value)
            }
            Err(e) => {
                tracing::debug!(operation, error = %e, "mutation rolled back");
                self.document = before;
                Err(e)
            }
        }
    }

    fn ensure_container(&self, id: &BlockId) -> Result<(), DocumentError> {
        let parent = self.document.get(id)?;
        let definition = self.registry.get(&parent.block_type)?;
        if !definition.accepts_children {
            return Err(DocumentError::NotAContainer(id.clone()));
        }
        Ok(())
    }

    /// A subtree `height` levels tall placed under `parent` must stay within
    /// [`MAX_DEPTH`]
    fn ensure_depth(&self, block: &BlockId, parent: Option<&BlockId>, height: usize) -> Result<(), DocumentError> {
        let parent_depth = parent.map(|p| self.document.depth_of(p)).unwrap_or(0);
        if parent_depth + height > MAX_DEPTH {
            return Err(DocumentError::TooDeep {
                block: block.clone(),
                max: MAX_DEPTH,
            });
        }
        Ok(())
    }

    fn prune_selection(&mut self) {
        if let Some(selected) = &self.selection {
            if !self.document.contains(selected) {
                self.selection = None;
            }
        }
    }
}

/// Copy the subtree rooted at `id` into `doc` under fresh ids. The copy is
/// left detached; returns its root id.
fn copy_subtree(doc: &mut BuilderDocument, id: &BlockId) -> Result<BlockId, DocumentError> {
    copy_subtree_at(doc, id, 1)
}

fn copy_subtree_at(doc: &mut BuilderDocument, id: &BlockId, level: usize) -> Result<BlockId, DocumentError> {
    if level > MAX_DEPTH {
        return Err(DocumentError::TooDeep {
            block: id.clone(),
            max: MAX_DEPTH,
        });
    }
    let original = doc.get(id)?.clone();
    let children = original
        .children
        .iter()
        .map(|child| copy_subtree_at(doc, child, level + 1))
        .collect::<Result<Vec<_>, _>>()?;

    let copy = Block {
        id: BlockId::new(),
        children,
        ..original
    };
    let copy_id = copy.id.clone();
    doc.insert_block(copy);
    Ok(copy_id)
}
