//! # chron-core
//!
//! Core types, ID generation, and error types for Chronicle.
//!
//! This crate provides the foundational types shared across all Chronicle crates:
//! - The audit record entity and its append-time input
//! - Action, ordering, and payload-encoding enums
//! - Polymorphic target references and actor attribution
//! - The per-attribute change payload
//! - The reconstruction fold that rebuilds historical attribute state
//! - ID prefix constants and token helpers
//! - Cross-cutting error types

pub mod actor;
pub mod entities;
pub mod enums;
pub mod errors;
pub mod ids;
pub mod payload;
pub mod revision;
pub mod target;
