//! # Instruct Sync
//!
//! Moves editor change-sets to a persistence backend.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────┐    revision    ┌────────────────────┐
//! │ SharedStore                  │ ─────────────▶ │ AutoSaveScheduler  │
//! │  InstructionStore (editor)   │    (watch)     │  debounce + guard  │
//! └──────────────────────────────┘                └────────────────────┘
//!                ▲                                           │ ChangeSet
//!                │ commit_saved                              ▼
//!                └──────────────────────────────── dyn PersistencePort
//! ```
//!
//! [`MemoryPersistence`] is a complete in-process backend; real backends
//! implement [`PersistencePort`].

mod autosave;
mod config;
mod memory;
mod port;
mod session;
mod shared;

pub use autosave::{AutoSaveHandle, AutoSaveScheduler, SaveOutcome};
pub use config::{AutoSaveConfig, HistoryConfig, SessionConfig, DEFAULT_CONFIG_NAME};
pub use memory::{apply_change_set, MemoryPersistence, SaveCall};
pub use port::{PersistenceError, PersistencePort, ProjectListItem, SaveResult};
pub use session::EditingSession;
pub use shared::SharedStore;
