// libs/appointment-cell/src/services/clients.rs
use chrono::Utc;
use regex::Regex;
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{AppointmentError, Client, ClientData, ClientResult};

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap())
}

/// Find-or-create for the booking client. Writes a row only on the create
/// path; resolution by id or email is read-only.
pub struct ClientResolverService {
    supabase: Arc<SupabaseClient>,
}

impl ClientResolverService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn resolve(
        &self,
        data: &ClientData,
        auth_token: &str,
    ) -> Result<ClientResult, AppointmentError> {
        if let Some(id) = data.id {
            let client = self.get_by_id(id, auth_token).await?;
            return Ok(ClientResult { client, was_created: false });
        }

        if let Some(email) = data.email.as_deref() {
            if let Some(client) = self.find_by_email(email, auth_token).await? {
                debug!("Reusing existing client {} for email match", client.id);
                return Ok(ClientResult { client, was_created: false });
            }
        }

        let client = self.create(data, auth_token).await?;
        Ok(ClientResult { client, was_created: true })
    }

    async fn get_by_id(&self, id: Uuid, auth_token: &str) -> Result<Client, AppointmentError> {
        let path = format!("/rest/v1/clients?id=eq.{}", id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let Some(row) = result.into_iter().next() else {
            return Err(AppointmentError::ClientNotFound);
        };

        serde_json::from_value(row)
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse client: {}", e)))
    }

    async fn find_by_email(
        &self,
        email: &str,
        auth_token: &str,
    ) -> Result<Option<Client>, AppointmentError> {
        let path = format!("/rest/v1/clients?email=eq.{}", urlencoding::encode(email));
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        match result.into_iter().next() {
            Some(row) => serde_json::from_value(row)
                .map(Some)
                .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse client: {}", e))),
            None => Ok(None),
        }
    }

    async fn create(&self, data: &ClientData, auth_token: &str) -> Result<Client, AppointmentError> {
        let name = data
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                AppointmentError::ValidationError("Client name is required".to_string())
            })?;

        if let Some(email) = data.email.as_deref() {
            if !email_regex().is_match(email) {
                return Err(AppointmentError::ValidationError(format!(
                    "Invalid client email: {}",
                    email
                )));
            }
        }

        let body = json!({
            "id": Uuid::new_v4(),
            "name": name,
            "email": data.email,
            "phone": data.phone,
            "created_at": Utc::now().to_rfc3339()
        });

        let result = self
            .supabase
            .insert_returning("/rest/v1/clients", Some(auth_token), body)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let Some(row) = result.into_iter().next() else {
            return Err(AppointmentError::DatabaseError("Failed to create client".to_string()));
        };

        let client: Client = serde_json::from_value(row)
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse client: {}", e)))?;

        info!("Created new client {} during booking", client.id);
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_regex_accepts_plain_addresses() {
        assert!(email_regex().is_match("maria@example.com"));
        assert!(email_regex().is_match("joao.silva+salon@mail.co"));
    }

    #[test]
    fn email_regex_rejects_malformed_addresses() {
        assert!(!email_regex().is_match("not-an-email"));
        assert!(!email_regex().is_match("spaced name@example.com"));
        assert!(!email_regex().is_match("missing@tld"));
    }
}
