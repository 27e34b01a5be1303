//! # Instruct Model
//!
//! Typed rows for a normalized assembly-instruction document.
//!
//! ## Shape
//!
//! ```text
//! Instruction (singleton fields)
//!  ├─ assemblies ─ stepIds ──────────▶ steps ─ substepIds ──▶ substeps
//!  │                                                           ├─ imageRowIds
//!  │                                                           ├─ descriptionRowIds
//!  │                                                           ├─ partToolRowIds
//!  │                                                           ├─ noteRowIds
//!  │                                                           ├─ tutorialRowIds
//!  │                                                           └─ videoSectionRowIds
//!  ├─ videos ─ sectionIds / frameAreaIds / viewportKeyframeIds
//!  └─ catalog: partTools, notes, safetyIcons, drawings, partToolVideoFrameAreas
//! ```
//!
//! Every table is an `id → row` dictionary. Parents additionally carry
//! "grouped id" arrays that mirror the children's back-references; the
//! [`ChildList`] table names every such relation.

mod error;
mod instruction;
pub mod integrity;
mod kind;
mod rows;

pub use error::ModelError;
pub use instruction::{Instruction, InstructionMeta};
pub use integrity::{check_integrity, reconcile_child_lists, IntegrityViolation};
pub use kind::{ChildList, EntityKind, KindVisitor};
pub use rows::*;
