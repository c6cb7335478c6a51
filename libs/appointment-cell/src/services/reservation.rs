// libs/appointment-cell/src/services/reservation.rs
//
// Concurrency guard for check-then-insert booking. A lock row per contended
// resource interval in `scheduling_locks` (unique on lock_key) makes the
// final availability check and the appointment insert mutually exclusive
// across processes. Expired locks are reaped so a crashed request cannot
// wedge a slot for longer than the TTL.

use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::AppointmentError;

const LOCK_TIMEOUT_SECONDS: i64 = 30;
const MAX_RETRY_ATTEMPTS: u32 = 3;

pub struct SlotReservationService {
    supabase: Arc<SupabaseClient>,
}

impl SlotReservationService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub fn slot_lock_key(professional_id: Uuid, start: DateTime<Utc>, end: DateTime<Utc>) -> String {
        format!("slot_{}_{}_{}", professional_id, start.timestamp(), end.timestamp())
    }

    pub fn station_lock_key(station_id: Uuid, start: DateTime<Utc>, end: DateTime<Utc>) -> String {
        format!("station_{}_{}_{}", station_id, start.timestamp(), end.timestamp())
    }

    /// Acquire every key or none, retrying with linear backoff on contention.
    /// Exhausting the retries surfaces the conflict to the caller, which is
    /// the one error class a client may retry.
    pub async fn acquire_with_retry(&self, keys: &[String]) -> Result<(), AppointmentError> {
        for attempt in 1..=MAX_RETRY_ATTEMPTS {
            debug!("Lock acquisition attempt {} for {} keys", attempt, keys.len());

            if self.try_acquire_all(keys).await? {
                return Ok(());
            }

            if attempt < MAX_RETRY_ATTEMPTS {
                tokio::time::sleep(tokio::time::Duration::from_millis(100 * attempt as u64)).await;
            }
        }

        warn!("Failed to acquire scheduling locks after {} attempts", MAX_RETRY_ATTEMPTS);
        Err(AppointmentError::ConflictDetected)
    }

    pub async fn release(&self, keys: &[String]) {
        for key in keys {
            if let Err(e) = self.delete_lock(key).await {
                warn!("Failed to release scheduling lock {}: {}", key, e);
            }
        }
    }

    async fn try_acquire_all(&self, keys: &[String]) -> Result<bool, AppointmentError> {
        let mut acquired: Vec<&String> = Vec::with_capacity(keys.len());

        for key in keys {
            match self.try_acquire_one(key).await? {
                true => acquired.push(key),
                false => {
                    // Roll back partial acquisition so the competing request
                    // is not deadlocked against us.
                    for held in acquired {
                        if let Err(e) = self.delete_lock(held).await {
                            warn!("Failed to release scheduling lock {}: {}", held, e);
                        }
                    }
                    return Ok(false);
                }
            }
        }

        Ok(true)
    }

    async fn try_acquire_one(&self, key: &str) -> Result<bool, AppointmentError> {
        if self.insert_lock(key).await? {
            return Ok(true);
        }

        // Lock exists; reap it if expired and try once more.
        if self.cleanup_expired_lock(key).await? {
            return self.insert_lock(key).await;
        }

        Ok(false)
    }

    async fn insert_lock(&self, key: &str) -> Result<bool, AppointmentError> {
        let lock_data = json!({
            "lock_key": key,
            "acquired_at": Utc::now().to_rfc3339(),
            "expires_at": (Utc::now() + Duration::seconds(LOCK_TIMEOUT_SECONDS)).to_rfc3339(),
            "process_id": format!("scheduler_{}", Uuid::new_v4())
        });

        match self
            .supabase
            .request::<Value>(Method::POST, "/rest/v1/scheduling_locks", None, Some(lock_data))
            .await
        {
            Ok(_) => {
                debug!("Scheduling lock acquired: {}", key);
                Ok(true)
            }
            Err(e) if SupabaseClient::is_conflict_error(&e) => Ok(false),
            Err(e) => Err(AppointmentError::DatabaseError(format!("Lock insert failed: {}", e))),
        }
    }

    async fn cleanup_expired_lock(&self, key: &str) -> Result<bool, AppointmentError> {
        let response: Value = self
            .supabase
            .request::<Value>(
                Method::GET,
                &format!("/rest/v1/scheduling_locks?lock_key=eq.{}&select=*", key),
                None,
                None,
            )
            .await
            .map_err(|e| AppointmentError::DatabaseError(format!("Lock check failed: {}", e)))?;

        if let Some(lock) = response.as_array().and_then(|locks| locks.first()) {
            if let Some(expires_at_str) = lock.get("expires_at").and_then(|v| v.as_str()) {
                if let Ok(expires_at) = DateTime::parse_from_rfc3339(expires_at_str) {
                    if expires_at.with_timezone(&Utc) < Utc::now() {
                        self.delete_lock(key).await?;
                        return Ok(true);
                    }
                }
            }
        }

        Ok(false)
    }

    async fn delete_lock(&self, key: &str) -> Result<(), AppointmentError> {
        let _: Value = self
            .supabase
            .request::<Value>(
                Method::DELETE,
                &format!("/rest/v1/scheduling_locks?lock_key=eq.{}", key),
                None,
                None,
            )
            .await
            .map_err(|e| AppointmentError::DatabaseError(format!("Lock release failed: {}", e)))?;

        debug!("Scheduling lock released: {}", key);
        Ok(())
    }
}
