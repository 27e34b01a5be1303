//! # Instruct Editor
//!
//! Editing engine for normalized assembly-instruction documents.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ model: typed rows + grouped id arrays       │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ editor: InstructionStore                    │
//! │  - Generic add/update/delete per kind       │
//! │  - Assignment, split, reorder, move         │
//! │  - Change tracking against a saved baseline │
//! │  - Change-set export for persistence        │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ sync: debounced auto-save to a backend      │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Grouped arrays mirror back-references**: every mutation keeps both
//!    directions of a relation in step
//! 2. **Tracking is incremental**: mutations mark ids; whole-document
//!    replacement re-derives marks with [`diff_documents`]
//! 3. **Arrays are derived**: grouped id arrays are never persisted
//!
//! ## Usage
//!
//! ```rust,ignore
//! use instruct_editor::{InstructionStore, SessionHistory};
//! use instruct_model::{Instruction, Step};
//! use std::path::Path;
//!
//! let mut store = InstructionStore::with_document(Instruction::load(Path::new("doc.json"))?);
//! let mut history = SessionHistory::new(&store);
//!
//! store.update::<Step>("s1", |s| s.title = "Mount frame".into());
//! history.capture_snapshot(&store);
//!
//! let changes = store.export_changes();
//! ```

mod change_tracker;
mod diff;
mod elements;
mod events;
mod export;
mod history;
mod rules;
mod store;

pub use change_tracker::{ChangeTracker, KindChanges};
pub use diff::diff_documents;
pub use elements::{ElementDescriptor, ElementFilter, SubstepElementKind};
pub use events::{EntityEvent, EventOperation, EventSink};
pub use export::{
    export_changes, from_wire, persisted_value, to_camel_case, to_snake_case, to_wire, ChangeSet,
    INSTRUCTION_KEY,
};
pub use history::{SessionHistory, DEFAULT_HISTORY_CAPACITY};
pub use rules::{Refusal, StoreRow};
pub use store::InstructionStore;
