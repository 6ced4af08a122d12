use axum::{extract::State, Json};
use tracing::instrument;

use super::recorder::AuditEntry;
use crate::shared::AppState;

/// HTTP handler for the recent audit trail, newest first
///
/// GET /admin/audit-logs
#[instrument(name = "list_audit_logs", skip(state))]
pub async fn list_audit_logs(State(state): State<AppState>) -> Json<Vec<AuditEntry>> {
    Json(state.audit.recent(200).await)
}
