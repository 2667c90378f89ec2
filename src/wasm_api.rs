//! WASM API: `#[wasm_bindgen]` exports used by the browser editor.
//!
//! This module is only compiled when targeting `wasm32`. It provides:
//! - `init_builder` / `destroy_builder`: lifecycle
//! - `load_document` / `get_document`: snapshot exchange
//! - block actions, selection, and undo/redo
//! - `generate_html` / `get_block_types`: output and palette discovery
//! - `on_change`: notify the editor after every document change
//!
//! Every function exchanges JSON strings. Failures come back as
//! `{"error": "..."}` rather than as exceptions.

use std::cell::RefCell;

use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::prelude::*;

use crate::adapters::{adapter_for, RenderOptions};
use crate::config::BuilderConfig;
use crate::core::{BlockId, BlockRegistry, Context, DefinitionSummary, PropertyMap};
use crate::document::{BuilderDocument, BuilderState, DocumentError};
use crate::hooks::HookBus;

// ── Global state ────────────────────────────────────────────────────────────

struct WasmBuilder {
    state: BuilderState,
    config: BuilderConfig,
    listener: Option<js_sys::Function>,
}

thread_local! {
    static BUILDER: RefCell<Option<WasmBuilder>> = RefCell::new(None);
}

fn with_builder<R>(f: impl FnOnce(&mut WasmBuilder) -> R) -> Result<R, String> {
    BUILDER.with(|cell| {
        let mut borrow = cell.borrow_mut();
        match borrow.as_mut() {
            Some(builder) => Ok(f(builder)),
            None => Err("Builder not initialized. Call init_builder() first.".into()),
        }
    })
}

// ── Response types ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct OkResponse {
    id: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct HtmlResponse {
    html: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    ok: bool,
    can_undo: bool,
    can_redo: bool,
    selection: Option<String>,
}

fn json_ok(id: &str) -> String {
    serde_json::to_string(&OkResponse { id: id.into() }).unwrap_or_default()
}

fn json_err(msg: impl Into<String>) -> String {
    serde_json::to_string(&ErrorResponse { error: msg.into() }).unwrap_or_default()
}

fn json_status(builder: &WasmBuilder) -> String {
    serde_json::to_string(&StatusResponse {
        ok: true,
        can_undo: builder.state.can_undo(),
        can_redo: builder.state.can_redo(),
        selection: builder.state.selection().map(|id| id.to_string()),
    })
    .unwrap_or_default()
}

fn parse_patch(patch_json: &str) -> Result<PropertyMap, String> {
    match serde_json::from_str::<Value>(patch_json) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err("Patch must be a JSON object".into()),
        Err(e) => Err(format!("Invalid patch JSON: {}", e)),
    }
}

/// Run a document action, notify the listener on success, and answer with
/// `ok` (status or id) or `error`.
fn run_action(action: impl FnOnce(&mut BuilderState) -> Result<Option<BlockId>, DocumentError>) -> String {
    let outcome = with_builder(|builder| match action(&mut builder.state) {
        Ok(id) => {
            notify(builder);
            Ok(match id {
                Some(id) => json_ok(id.as_str()),
                None => json_status(builder),
            })
        }
        Err(e) => Err(e.to_string()),
    });
    match outcome {
        Ok(Ok(json)) => json,
        Ok(Err(e)) | Err(e) => json_err(e),
    }
}

fn notify(builder: &WasmBuilder) {
    if let Some(listener) = &builder.listener {
        if let Ok(json) = builder.state.document().to_json() {
            let _ = listener.call1(&JsValue::NULL, &JsValue::from_str(&json));
        }
    }
}

// ── Exported functions ──────────────────────────────────────────────────────

/// Start a session. `config_toml` may be empty for defaults.
#[wasm_bindgen]
pub fn init_builder(config_toml: &str) -> String {
    console_error_panic_hook::set_once();

    let config = if config_toml.trim().is_empty() {
        BuilderConfig::default()
    } else {
        match BuilderConfig::from_toml_str(config_toml) {
            Ok(config) => config,
            Err(e) => return json_err(e.to_string()),
        }
    };

    let registry = BlockRegistry::with_builtin_blocks();
    registry.freeze();
    let state = BuilderState::new(registry, HookBus::new(), &config);

    BUILDER.with(|cell| {
        *cell.borrow_mut() = Some(WasmBuilder {
            state,
            config,
            listener: None,
        });
    });
    json_ok("builder")
}

#[wasm_bindgen]
pub fn destroy_builder() {
    BUILDER.with(|cell| {
        *cell.borrow_mut() = None;
    });
}

/// Register the change listener; it receives the snapshot JSON
#[wasm_bindgen]
pub fn on_change(callback: js_sys::Function) -> String {
    match with_builder(|builder| builder.listener = Some(callback)) {
        Ok(()) => json_ok("listener"),
        Err(e) => json_err(e),
    }
}

#[wasm_bindgen]
pub fn load_document(snapshot_json: &str) -> String {
    let document = match BuilderDocument::from_json(snapshot_json) {
        Ok(document) => document,
        Err(e) => return json_err(e.to_string()),
    };
    run_action(|state| state.load(document).map(|_| None))
}

#[wasm_bindgen]
pub fn get_document() -> String {
    match with_builder(|builder| builder.state.document().to_json()) {
        Ok(Ok(json)) => json,
        Ok(Err(e)) => json_err(e.to_string()),
        Err(e) => json_err(e),
    }
}

#[wasm_bindgen]
pub fn add_block(block_type: &str, parent_id: Option<String>, index: Option<u32>) -> String {
    let parent = parent_id.map(BlockId::from);
    run_action(|state| {
        state
            .add_block(block_type, parent.as_ref(), index.map(|i| i as usize))
            .map(Some)
    })
}

#[wasm_bindgen]
pub fn update_block_props(block_id: &str, patch_json: &str) -> String {
    let patch = match parse_patch(patch_json) {
        Ok(patch) => patch,
        Err(e) => return json_err(e),
    };
    run_action(|state| state.update_block_props(&BlockId::from(block_id), &patch).map(|_| None))
}

#[wasm_bindgen]
pub fn update_layout_styles(block_id: &str, patch_json: &str) -> String {
    let patch = match parse_patch(patch_json) {
        Ok(patch) => patch,
        Err(e) => return json_err(e),
    };
    run_action(|state| state.update_layout_styles(&BlockId::from(block_id), &patch).map(|_| None))
}

#[wasm_bindgen]
pub fn update_settings(patch_json: &str) -> String {
    let patch = match parse_patch(patch_json) {
        Ok(patch) => patch,
        Err(e) => return json_err(e),
    };
    run_action(|state| state.update_settings(&patch).map(|_| None))
}

#[wasm_bindgen]
pub fn move_block(block_id: &str, parent_id: Option<String>, index: u32) -> String {
    let parent = parent_id.map(BlockId::from);
    run_action(|state| {
        state
            .move_block(&BlockId::from(block_id), parent.as_ref(), index as usize)
            .map(|_| None)
    })
}

#[wasm_bindgen]
pub fn remove_block(block_id: &str) -> String {
    run_action(|state| state.remove_block(&BlockId::from(block_id)).map(|_| None))
}

#[wasm_bindgen]
pub fn duplicate_block(block_id: &str) -> String {
    run_action(|state| state.duplicate_block(&BlockId::from(block_id)).map(Some))
}

/// Selection is UI state: listeners are not notified
#[wasm_bindgen]
pub fn select_block(block_id: Option<String>) -> String {
    let id = block_id.map(BlockId::from);
    match with_builder(|builder| {
        builder
            .state
            .select_block(id.as_ref())
            .map(|_| json_status(builder))
    }) {
        Ok(Ok(json)) => json,
        Ok(Err(e)) => json_err(e.to_string()),
        Err(e) => json_err(e),
    }
}

#[wasm_bindgen]
pub fn undo() -> bool {
    with_builder(|builder| {
        let changed = builder.state.undo();
        if changed {
            notify(builder);
        }
        changed
    })
    .unwrap_or(false)
}

#[wasm_bindgen]
pub fn redo() -> bool {
    with_builder(|builder| {
        let changed = builder.state.redo();
        if changed {
            notify(builder);
        }
        changed
    })
    .unwrap_or(false)
}

/// Render the current document. `context` is `"email"` or `"page"`;
/// `options_json` may be empty.
#[wasm_bindgen]
pub fn generate_html(context: &str, options_json: &str) -> String {
    let context: Context = match context.parse() {
        Ok(context) => context,
        Err(e) => return json_err(format!("{}", e)),
    };
    let options: RenderOptions = if options_json.trim().is_empty() {
        RenderOptions::default()
    } else {
        match serde_json::from_str(options_json) {
            Ok(options) => options,
            Err(e) => return json_err(format!("Invalid options JSON: {}", e)),
        }
    };

    match with_builder(|builder| {
        let adapter = adapter_for(
            context,
            builder.state.registry().clone(),
            builder.state.hooks().clone(),
            &builder.config,
        );
        adapter.generate_html(builder.state.document(), &options)
    }) {
        Ok(Ok(html)) => serde_json::to_string(&HtmlResponse { html }).unwrap_or_default(),
        Ok(Err(e)) => json_err(e.to_string()),
        Err(e) => json_err(e),
    }
}

/// Palette entries for `context`, ordered by category
#[wasm_bindgen]
pub fn get_block_types(context: &str) -> String {
    let context: Context = match context.parse() {
        Ok(context) => context,
        Err(e) => return json_err(format!("{}", e)),
    };
    match with_builder(|builder| {
        builder
            .state
            .registry()
            .list(context)
            .iter()
            .map(|definition| definition.summary())
            .collect::<Vec<DefinitionSummary>>()
    }) {
        Ok(types) => serde_json::to_string(&types).unwrap_or_default(),
        Err(e) => json_err(e),
    }
}
