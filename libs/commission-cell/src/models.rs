// libs/commission-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

/// Commission-creation request handed to the commission subsystem when an
/// appointment completes. Payment batching and the ledger live elsewhere;
/// this cell only raises the event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionRequest {
    pub professional_id: Uuid,
    pub appointment_id: Uuid,
    pub service_price: f64,
    pub commission_percentage: f64,
}

impl CommissionRequest {
    pub fn amount(&self) -> f64 {
        self.service_price * self.commission_percentage / 100.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commission {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub professional_id: Uuid,
    pub service_price: f64,
    pub commission_percentage: f64,
    pub amount: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    GroupBooked,
    AppointmentConfirmed,
    AppointmentArrived,
    AppointmentStarted,
    AppointmentReadyToPay,
    AppointmentCompleted,
    AppointmentCancelled,
    AppointmentNoShow,
    AppointmentRescheduled,
    GroupCancelled,
    CommissionCreated,
}

/// Structured audit record for booking-lifecycle events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    pub actor_id: Uuid,
    pub actor_email: Option<String>,
    pub entity_id: Uuid,
    pub details: serde_json::Value,
}
