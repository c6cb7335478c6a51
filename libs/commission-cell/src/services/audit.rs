// libs/commission-cell/src/services/audit.rs
use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::Actor;

use crate::models::{AuditEvent, AuditEventType};

/// Fire-and-forget audit sink for booking-lifecycle events. Persistence
/// failures are logged and never propagate to the caller.
pub struct AuditService {
    supabase: SupabaseClient,
}

impl AuditService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn record(
        &self,
        event_type: AuditEventType,
        actor: &Actor,
        entity_id: Uuid,
        details: serde_json::Value,
        auth_token: &str,
    ) {
        let event = AuditEvent {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event_type,
            actor_id: actor.id,
            actor_email: actor.email.clone(),
            entity_id,
            details,
        };

        info!(
            event_id = %event.id,
            event_type = ?event.event_type,
            actor_id = %event.actor_id,
            entity_id = %event.entity_id,
            "AUDIT: {:?}", event.event_type
        );

        let body = json!(event);
        if let Err(e) = self
            .supabase
            .insert_returning("/rest/v1/audit_events", Some(auth_token), body)
            .await
        {
            warn!("Failed to persist audit event {}: {}", event.id, e);
        }
    }
}
