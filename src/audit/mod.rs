pub mod handlers;
pub mod recorder;

pub use recorder::{AuditEntry, AuditEvent, AuditRecorder, InMemoryAuditRecorder};
