//! Use-case orchestration over the persistence engine.
//!
//! # Responsibility
//! - Keep UI callers decoupled from engine, scheduler and store wiring.

pub mod report_session;
