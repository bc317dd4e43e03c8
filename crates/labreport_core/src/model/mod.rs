//! Report document model shared by every engine component.
//!
//! # Responsibility
//! - Define the canonical document tree used by persistence, migration,
//!   normalization and export.
//!
//! # Invariants
//! - Entities are replaced structurally on edit, never aliased.
//! - Binary attachments exist only in memory; stored forms carry encoded text.

pub mod document;
