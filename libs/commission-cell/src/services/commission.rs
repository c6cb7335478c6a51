// libs/commission-cell/src/services/commission.rs
use anyhow::{Result, anyhow};
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::CommissionRequest;

/// Trigger into the commission subsystem. One commission row per completed
/// appointment; callers treat failures as log-and-continue.
pub struct CommissionService {
    supabase: SupabaseClient,
}

impl CommissionService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Create the commission for a completed appointment. A commission that
    /// already exists for the appointment is left untouched, so repeated
    /// completion events never produce duplicates.
    pub async fn create_for_appointment(
        &self,
        request: CommissionRequest,
        auth_token: &str,
    ) -> Result<()> {
        debug!(
            "Creating commission for appointment {} (professional {})",
            request.appointment_id, request.professional_id
        );

        let existing_path = format!(
            "/rest/v1/commissions?appointment_id=eq.{}",
            request.appointment_id
        );
        let existing: Vec<Value> = self
            .supabase
            .request(Method::GET, &existing_path, Some(auth_token), None)
            .await?;

        if !existing.is_empty() {
            debug!(
                "Commission already exists for appointment {}, skipping",
                request.appointment_id
            );
            return Ok(());
        }

        let body = json!({
            "id": Uuid::new_v4(),
            "appointment_id": request.appointment_id,
            "professional_id": request.professional_id,
            "service_price": request.service_price,
            "commission_percentage": request.commission_percentage,
            "amount": request.amount(),
            "created_at": Utc::now().to_rfc3339()
        });

        let result = self
            .supabase
            .insert_returning("/rest/v1/commissions", Some(auth_token), body)
            .await?;

        if result.is_empty() {
            return Err(anyhow!("Commission insert returned no rows"));
        }

        info!(
            "Commission created for appointment {}: {:.2} ({}% of {:.2})",
            request.appointment_id,
            request.amount(),
            request.commission_percentage,
            request.service_price
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_is_percentage_of_service_price() {
        let request = CommissionRequest {
            professional_id: Uuid::new_v4(),
            appointment_id: Uuid::new_v4(),
            service_price: 105.0,
            commission_percentage: 40.0,
        };

        assert!((request.amount() - 42.0).abs() < f64::EPSILON);
    }
}
