use tracing::{info, warn};

use dermadesk_core::audit::{AuditEvent, AuditOutcome, AuditSink};

/// Forwards audit events to the tracing subscriber as structured fields.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        let session_id = event.session_id.as_ref().map(|id| id.as_str()).unwrap_or("-");
        let metadata = event
            .metadata
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(" ");

        match event.outcome {
            AuditOutcome::Success => info!(
                event_name = %event.event_type,
                category = ?event.category,
                session_id,
                correlation_id = %event.correlation_id,
                actor = %event.actor,
                metadata = %metadata,
                "audit"
            ),
            AuditOutcome::Rejected | AuditOutcome::Failed => warn!(
                event_name = %event.event_type,
                category = ?event.category,
                outcome = ?event.outcome,
                session_id,
                correlation_id = %event.correlation_id,
                actor = %event.actor,
                metadata = %metadata,
                "audit"
            ),
        }
    }
}
