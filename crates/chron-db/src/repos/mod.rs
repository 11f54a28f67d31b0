//! Repository methods on `AuditService`, grouped by concern.

pub mod audit;
pub mod cursor;
pub mod revision;
