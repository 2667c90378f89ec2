//! Block Builder - core of the visual email/page builder
//!
//! This crate provides the block definition registry, the hook bus, output
//! adapters for email and page markup, the editing state with undo/redo,
//! document persistence, and the inbound-email handler dispatch.

pub mod adapters;
pub mod categories;
pub mod config;
pub mod core;
pub mod document;
pub mod hooks;
pub mod inbound;
pub mod persistence;
mod tests;

#[cfg(target_arch = "wasm32")]
pub mod wasm_api;

// Re-export commonly used types
pub use adapters::{adapter_for, EmailAdapter, GenerationError, OutputAdapter, PageAdapter, RenderOptions};
pub use categories::BlockCategory;
pub use config::BuilderConfig;
pub use core::{BlockDefinition, BlockId, BlockRegistry, Context, RegistryError};
pub use document::{Block, BuilderDocument, BuilderState, CanvasSettings, DocumentError};
pub use hooks::{HookBus, HookError, HookName};
pub use inbound::{HandlerDispatcher, HandlerResult, HandlerStatus, InboundEmailHandler, InboundMessage};
pub use persistence::{DocumentStore, JsonFileStore, MemoryDocumentStore, StoreError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
