//! Entity structs for Chronicle.
//!
//! `AuditRecord` maps to the `audits` table. All structs derive `Serialize`,
//! `Deserialize`, and `JsonSchema` for JSON roundtrip and schema validation.

mod audit;

pub use audit::{AppendOutcome, AuditRecord, NewAuditRecord};
