//! Builder document model
//!
//! A `BuilderDocument` stores blocks in a flat id-indexed map and expresses the
//! tree through id lists (`root` and each block's `children`). Blocks are held
//! behind `Arc`, so cloning a document for an undo snapshot only copies the map
//! and shares every unchanged block.
//!
//! Serialized form (also the save/load wire format):
//!
//! ```json
//! {
//!   "root": ["b1"],
//!   "blocks": {
//!     "b1": {"id": "b1", "type": "text", "props": {}, "layoutStyles": {}, "children": []}
//!   },
//!   "settings": {"contentWidth": 600}
//! }
//! ```

pub mod history;
pub mod state;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::core::style::apply_patch;
use crate::core::{BlockId, LayoutStyles, PropertyMap, RegistryError};
use crate::hooks::HookError;

pub use history::History;
pub use state::BuilderState;

/// Deepest allowed nesting; top-level blocks sit at depth 1
pub const MAX_DEPTH: usize = 64;

/// Block instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: BlockId,
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default)]
    pub props: PropertyMap,
    #[serde(default)]
    pub layout_styles: LayoutStyles,
    #[serde(default)]
    pub children: Vec<BlockId>,
}

impl Block {
    pub fn new(block_type: impl Into<String>) -> Self {
        Self {
            id: BlockId::new(),
            block_type: block_type.into(),
            props: PropertyMap::new(),
            layout_styles: LayoutStyles::new(),
            children: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<BlockId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_props(mut self, props: PropertyMap) -> Self {
        self.props = props;
        self
    }
}

/// Canvas-level settings
///
/// Unset fields fall back to the adapter's configured defaults. Unknown keys
/// sent by the editor are kept in `extra` and survive a round-trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CanvasSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_background: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub padding: Option<u32>,
    #[serde(flatten)]
    pub extra: PropertyMap,
}

impl CanvasSettings {
    /// Apply an editor patch (keys overwrite, `null` removes) and re-validate
    /// the typed fields.
    pub fn patched(&self, patch: &PropertyMap) -> Result<CanvasSettings, DocumentError> {
        let mut map = match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => map,
            _ => PropertyMap::new(),
        };
        apply_patch(&mut map, patch);
        serde_json::from_value(serde_json::Value::Object(map))
            .map_err(|e| DocumentError::InvalidSettings(e.to_string()))
    }
}

/// Root document entity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuilderDocument {
    #[serde(default)]
    root: Vec<BlockId>,
    #[serde(default)]
    blocks: BTreeMap<BlockId, Arc<Block>>,
    #[serde(default)]
    settings: CanvasSettings,
}

impl BuilderDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: CanvasSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    /// Top-level block ids in order
    pub fn root(&self) -> &[BlockId] {
        &self.root
    }

    pub fn settings(&self) -> &CanvasSettings {
        &self.settings
    }

    pub fn get(&self, id: &BlockId) -> Result<&Block, DocumentError> {
        self.blocks
            .get(id)
            .map(|b| b.as_ref())
            .ok_or_else(|| DocumentError::BlockNotFound(id.clone()))
    }

    pub fn contains(&self, id: &BlockId) -> bool {
        self.blocks.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Every block, keyed by id
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values().map(|b| b.as_ref())
    }

    /// Parent of `id`; `None` for top-level or unknown blocks
    pub fn parent_of(&self, id: &BlockId) -> Option<&BlockId> {
        self.blocks
            .values()
            .find(|b| b.children.contains(id))
            .map(|b| &b.id)
    }

    /// All descendants of `id`, depth-first in document order (excluding `id`)
    pub fn descendants(&self, id: &BlockId) -> Vec<BlockId> {
        let mut out = Vec::new();
        let mut stack: Vec<&BlockId> = match self.blocks.get(id) {
            Some(block) => block.children.iter().rev().collect(),
            None => return out,
        };
        while let Some(current) = stack.pop() {
            out.push(current.clone());
            if let Some(block) = self.blocks.get(current) {
                stack.extend(block.children.iter().rev());
            }
        }
        out
    }

    /// Nesting depth of `id`: 1 for top-level blocks
    pub fn depth_of(&self, id: &BlockId) -> usize {
        let mut depth = 1;
        let mut current = self.parent_of(id);
        while let Some(parent) = current {
            depth += 1;
            current = self.parent_of(parent);
        }
        depth
    }

    /// Levels in the subtree rooted at `id`: 1 for a leaf
    pub fn subtree_height(&self, id: &BlockId) -> usize {
        let mut height = 0;
        let mut stack = vec![(id, 1)];
        while let Some((current, level)) = stack.pop() {
            height = height.max(level);
            if let Some(block) = self.blocks.get(current) {
                stack.extend(block.children.iter().map(|child| (child, level + 1)));
            }
        }
        height
    }

    /// Whether `candidate` sits somewhere below `ancestor`
    pub fn is_descendant(&self, ancestor: &BlockId, candidate: &BlockId) -> bool {
        let mut current = self.parent_of(candidate);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.parent_of(parent);
        }
        false
    }

    /// Check the tree invariants: every referenced id exists, every block is
    /// referenced exactly once (as a root entry or as one parent's child),
    /// each block is stored under its own id, and nesting stays within
    /// [`MAX_DEPTH`].
    pub fn validate(&self) -> Result<(), DocumentError> {
        let mut seen: HashSet<&BlockId> = HashSet::new();

        let references = self
            .root
            .iter()
            .chain(self.blocks.values().flat_map(|b| b.children.iter()));
        for id in references {
            if !self.blocks.contains_key(id) {
                return Err(DocumentError::InvalidSnapshot(format!(
                    "Block '{}' is referenced but missing",
                    id
                )));
            }
            if !seen.insert(id) {
                return Err(DocumentError::InvalidSnapshot(format!(
                    "Block '{}' has more than one parent",
                    id
                )));
            }
        }

        for (key, block) in &self.blocks {
            if key != &block.id {
                return Err(DocumentError::InvalidSnapshot(format!(
                    "Block stored under '{}' has id '{}'",
                    key, block.id
                )));
            }
        }

        // References are unique at this point, so the walk terminates; anything
        // it misses is an orphan or sits on a detached cycle.
        let mut reachable: HashSet<&BlockId> = HashSet::new();
        let mut stack: Vec<(&BlockId, usize)> = self.root.iter().map(|id| (id, 1)).collect();
        while let Some((id, depth)) = stack.pop() {
            if depth > MAX_DEPTH {
                return Err(DocumentError::TooDeep {
                    block: id.clone(),
                    max: MAX_DEPTH,
                });
            }
            if reachable.insert(id) {
                if let Some(block) = self.blocks.get(id) {
                    stack.extend(block.children.iter().map(|child| (child, depth + 1)));
                }
            }
        }
        if let Some(orphan) = self.blocks.keys().find(|id| !reachable.contains(id)) {
            return Err(DocumentError::InvalidSnapshot(format!(
                "Block '{}' is not reachable from the root",
                orphan
            )));
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a snapshot and check its invariants
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        let document: BuilderDocument = serde_json::from_str(json)?;
        document.validate()?;
        Ok(document)
    }

    // ── Structural edits (used by BuilderState) ─────────────────────────

    pub(crate) fn block_mut(&mut self, id: &BlockId) -> Result<&mut Block, DocumentError> {
        self.blocks
            .get_mut(id)
            .map(Arc::make_mut)
            .ok_or_else(|| DocumentError::BlockNotFound(id.clone()))
    }

    pub(crate) fn settings_mut(&mut self) -> &mut CanvasSettings {
        &mut self.settings
    }

    /// Insert a detached block under `parent` (or the root) at `index`,
    /// clamped to the end of the list.
    pub(crate) fn attach(&mut self, id: BlockId, parent: Option<&BlockId>, index: Option<usize>) -> Result<(), DocumentError> {
        let siblings = match parent {
            Some(parent_id) => &mut self.block_mut(parent_id)?.children,
            None => &mut self.root,
        };
        let index = index.unwrap_or(siblings.len()).min(siblings.len());
        siblings.insert(index, id);
        Ok(())
    }

    /// Remove `id` from its parent's child list (or the root list)
    pub(crate) fn detach(&mut self, id: &BlockId) -> Result<(), DocumentError> {
        match self.parent_of(id).cloned() {
            Some(parent) => self.block_mut(&parent)?.children.retain(|c| c != id),
            None => self.root.retain(|c| c != id),
        }
        Ok(())
    }

    pub(crate) fn insert_block(&mut self, block: Block) {
        self.blocks.insert(block.id.clone(), Arc::new(block));
    }

    /// Drop `id` and its descendants from the block map; returns the removed ids
    pub(crate) fn drop_subtree(&mut self, id: &BlockId) -> Vec<BlockId> {
        let mut removed = vec![id.clone()];
        removed.extend(self.descendants(id));
        for block_id in &removed {
            self.blocks.remove(block_id);
        }
        removed
    }

    pub(crate) fn patch_props(&mut self, id: &BlockId, patch: &PropertyMap) -> Result<(), DocumentError> {
        apply_patch(&mut self.block_mut(id)?.props, patch);
        Ok(())
    }
}

/// Document errors
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// No block with the given id
    #[error("Block not found: {0}")]
    BlockNotFound(BlockId),

    /// Block type is not registered
    #[error(transparent)]
    UnknownType(#[from] RegistryError),

    /// A move would place a block inside its own subtree
    #[error("Cannot move block '{block}' into '{target}': target is the block itself or one of its descendants")]
    Cycle { block: BlockId, target: BlockId },

    /// The edit or snapshot nests blocks deeper than [`MAX_DEPTH`]
    #[error("Block '{block}' would be nested deeper than {max} levels")]
    TooDeep { block: BlockId, max: usize },

    /// Target parent's type does not accept children
    #[error("Block '{0}' cannot contain child blocks")]
    NotAContainer(BlockId),

    /// Snapshot violates the tree invariants
    #[error("Invalid document snapshot: {0}")]
    InvalidSnapshot(String),

    /// Canvas settings patch produced invalid settings
    #[error("Invalid canvas settings: {0}")]
    InvalidSettings(String),

    /// A hook rejected the operation
    #[error(transparent)]
    Hook(#[from] HookError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl DocumentError {
    /// Message safe to show to end users
    pub fn user_message(&self) -> &'static str {
        match self {
            DocumentError::BlockNotFound(_) => "That block no longer exists.",
            DocumentError::UnknownType(_) => "That block type is not available.",
            DocumentError::Cycle { .. } => "A block cannot be moved inside itself.",
            DocumentError::NotAContainer(_) => "That block cannot contain other blocks.",
            DocumentError::TooDeep { .. } => "Blocks cannot be nested that deeply.",
            DocumentError::InvalidSettings(_) => "Those canvas settings are not valid.",
            DocumentError::InvalidSnapshot(_) | DocumentError::Serde(_) => "The document could not be loaded.",
            DocumentError::Hook(_) => "The change was rejected.",
        }
    }
}
