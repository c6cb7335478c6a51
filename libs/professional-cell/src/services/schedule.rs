// libs/professional-cell/src/services/schedule.rs
use chrono::{NaiveTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    BlockType, CreateAvailabilityRequest, CreateBlockedTimeRequest, CreateBreakRequest,
    ProfessionalAvailability, ProfessionalBlockedTime, ProfessionalBreak, SchedulingError,
    UpdateAvailabilityRequest,
};

/// Owns writes to the recurring schedule and its exceptions. The availability
/// engine only ever reads these rows, so all shape validation happens here.
pub struct ScheduleService {
    supabase: SupabaseClient,
}

impl ScheduleService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    // ==============================================================================
    // RECURRING AVAILABILITY
    // ==============================================================================

    pub async fn create_availability(
        &self,
        professional_id: Uuid,
        request: CreateAvailabilityRequest,
        auth_token: &str,
    ) -> Result<ProfessionalAvailability, SchedulingError> {
        debug!("Creating availability for professional {}", professional_id);

        validate_day_and_range(request.day_of_week, request.start_time, request.end_time)?;

        self.check_window_overlap(
            professional_id,
            request.day_of_week,
            request.start_time,
            request.end_time,
            None,
            auth_token,
        )
        .await?;

        let body = json!({
            "professional_id": professional_id,
            "day_of_week": request.day_of_week,
            "start_time": request.start_time.format("%H:%M:%S").to_string(),
            "end_time": request.end_time.format("%H:%M:%S").to_string(),
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let result = self
            .supabase
            .insert_returning("/rest/v1/professional_availability", Some(auth_token), body)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        parse_single(result, "availability")
    }

    pub async fn update_availability(
        &self,
        availability_id: Uuid,
        request: UpdateAvailabilityRequest,
        auth_token: &str,
    ) -> Result<ProfessionalAvailability, SchedulingError> {
        debug!("Updating availability {}", availability_id);

        let current = self.get_availability(availability_id, auth_token).await?;

        let start = request.start_time.unwrap_or(current.start_time);
        let end = request.end_time.unwrap_or(current.end_time);
        validate_day_and_range(current.day_of_week, start, end)?;

        self.check_window_overlap(
            current.professional_id,
            current.day_of_week,
            start,
            end,
            Some(availability_id),
            auth_token,
        )
        .await?;

        let body = json!({
            "start_time": start.format("%H:%M:%S").to_string(),
            "end_time": end.format("%H:%M:%S").to_string(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let path = format!("/rest/v1/professional_availability?id=eq.{}", availability_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(Method::PATCH, &path, Some(auth_token), Some(body), Some(headers))
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        parse_single(result, "availability")
    }

    pub async fn list_availability(
        &self,
        professional_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<ProfessionalAvailability>, SchedulingError> {
        let path = format!(
            "/rest/v1/professional_availability?professional_id=eq.{}&order=day_of_week.asc,start_time.asc",
            professional_id
        );
        self.fetch_parsed(&path, auth_token, "availability").await
    }

    pub async fn delete_availability(
        &self,
        availability_id: Uuid,
        auth_token: &str,
    ) -> Result<(), SchedulingError> {
        debug!("Deleting availability {}", availability_id);

        let path = format!("/rest/v1/professional_availability?id=eq.{}", availability_id);
        let _: Vec<Value> = self
            .supabase
            .request(Method::DELETE, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    // ==============================================================================
    // RECURRING BREAKS
    // ==============================================================================

    pub async fn create_break(
        &self,
        professional_id: Uuid,
        request: CreateBreakRequest,
        auth_token: &str,
    ) -> Result<ProfessionalBreak, SchedulingError> {
        debug!("Creating break for professional {}", professional_id);

        validate_day_and_range(request.day_of_week, request.start_time, request.end_time)?;
        if request.name.trim().is_empty() {
            return Err(SchedulingError::ValidationError("Break name is required".to_string()));
        }

        let body = json!({
            "professional_id": professional_id,
            "day_of_week": request.day_of_week,
            "start_time": request.start_time.format("%H:%M:%S").to_string(),
            "end_time": request.end_time.format("%H:%M:%S").to_string(),
            "name": request.name
        });

        let result = self
            .supabase
            .insert_returning("/rest/v1/professional_breaks", Some(auth_token), body)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        parse_single(result, "break")
    }

    pub async fn list_breaks(
        &self,
        professional_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<ProfessionalBreak>, SchedulingError> {
        let path = format!(
            "/rest/v1/professional_breaks?professional_id=eq.{}&order=day_of_week.asc,start_time.asc",
            professional_id
        );
        self.fetch_parsed(&path, auth_token, "breaks").await
    }

    pub async fn delete_break(&self, break_id: Uuid, auth_token: &str) -> Result<(), SchedulingError> {
        let path = format!("/rest/v1/professional_breaks?id=eq.{}", break_id);
        let _: Vec<Value> = self
            .supabase
            .request(Method::DELETE, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    // ==============================================================================
    // BLOCKED TIMES
    // ==============================================================================

    pub async fn create_blocked_time(
        &self,
        professional_id: Uuid,
        request: CreateBlockedTimeRequest,
        auth_token: &str,
    ) -> Result<ProfessionalBlockedTime, SchedulingError> {
        debug!(
            "Creating blocked time for professional {} on {}",
            professional_id, request.block_date
        );

        // The two block shapes are mutually exclusive
        match request.block_type {
            BlockType::DayOff => {
                if request.start_time.is_some() || request.end_time.is_some() {
                    return Err(SchedulingError::ValidationError(
                        "A day off must not carry start or end times".to_string(),
                    ));
                }
            }
            BlockType::BlockedSlot => {
                let (Some(start), Some(end)) = (request.start_time, request.end_time) else {
                    return Err(SchedulingError::ValidationError(
                        "A blocked slot requires start and end times".to_string(),
                    ));
                };
                if start >= end {
                    return Err(SchedulingError::ValidationError(
                        "Start time must be before end time".to_string(),
                    ));
                }
            }
        }

        if request.block_type == BlockType::DayOff {
            let existing_path = format!(
                "/rest/v1/professional_blocked_times?professional_id=eq.{}&block_date=eq.{}&block_type=eq.day_off",
                professional_id, request.block_date
            );
            let existing: Vec<Value> = self
                .supabase
                .request(Method::GET, &existing_path, Some(auth_token), None)
                .await
                .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

            if !existing.is_empty() {
                return Err(SchedulingError::Conflict(
                    "A day off already exists for this date".to_string(),
                ));
            }
        }

        let body = json!({
            "professional_id": professional_id,
            "block_date": request.block_date,
            "block_type": request.block_type,
            "start_time": request.start_time.map(|t| t.format("%H:%M:%S").to_string()),
            "end_time": request.end_time.map(|t| t.format("%H:%M:%S").to_string()),
            "reason": request.reason
        });

        let result = self
            .supabase
            .insert_returning("/rest/v1/professional_blocked_times", Some(auth_token), body)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        parse_single(result, "blocked time")
    }

    pub async fn list_blocked_times(
        &self,
        professional_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<ProfessionalBlockedTime>, SchedulingError> {
        let path = format!(
            "/rest/v1/professional_blocked_times?professional_id=eq.{}&order=block_date.asc",
            professional_id
        );
        self.fetch_parsed(&path, auth_token, "blocked times").await
    }

    pub async fn delete_blocked_time(
        &self,
        blocked_time_id: Uuid,
        auth_token: &str,
    ) -> Result<(), SchedulingError> {
        let path = format!("/rest/v1/professional_blocked_times?id=eq.{}", blocked_time_id);
        let _: Vec<Value> = self
            .supabase
            .request(Method::DELETE, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    async fn get_availability(
        &self,
        availability_id: Uuid,
        auth_token: &str,
    ) -> Result<ProfessionalAvailability, SchedulingError> {
        let path = format!("/rest/v1/professional_availability?id=eq.{}", availability_id);
        let result: Vec<ProfessionalAvailability> =
            self.fetch_parsed(&path, auth_token, "availability").await?;

        result.into_iter().next().ok_or(SchedulingError::NotFound)
    }

    async fn check_window_overlap(
        &self,
        professional_id: Uuid,
        day_of_week: i32,
        start: NaiveTime,
        end: NaiveTime,
        exclude_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<(), SchedulingError> {
        let mut path = format!(
            "/rest/v1/professional_availability?professional_id=eq.{}&day_of_week=eq.{}",
            professional_id, day_of_week
        );
        if let Some(id) = exclude_id {
            path.push_str(&format!("&id=neq.{}", id));
        }

        let existing: Vec<ProfessionalAvailability> =
            self.fetch_parsed(&path, auth_token, "availability").await?;

        for window in existing {
            if start < window.end_time && end > window.start_time {
                return Err(SchedulingError::Conflict(
                    "Availability overlaps an existing window".to_string(),
                ));
            }
        }

        Ok(())
    }

    async fn fetch_parsed<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        auth_token: &str,
        what: &str,
    ) -> Result<Vec<T>, SchedulingError> {
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<T>, _>>()
            .map_err(|e| SchedulingError::DatabaseError(format!("Failed to parse {}: {}", what, e)))
    }
}

fn validate_day_and_range(day_of_week: i32, start: NaiveTime, end: NaiveTime) -> Result<(), SchedulingError> {
    if !(0..=6).contains(&day_of_week) {
        return Err(SchedulingError::ValidationError(
            "Day of week must be between 0 (Sunday) and 6 (Saturday)".to_string(),
        ));
    }
    if start >= end {
        return Err(SchedulingError::ValidationError(
            "Start time must be before end time".to_string(),
        ));
    }
    Ok(())
}

fn parse_single<T: serde::de::DeserializeOwned>(
    mut rows: Vec<Value>,
    what: &str,
) -> Result<T, SchedulingError> {
    if rows.is_empty() {
        return Err(SchedulingError::DatabaseError(format!("Failed to create {}", what)));
    }
    serde_json::from_value(rows.remove(0))
        .map_err(|e| SchedulingError::DatabaseError(format!("Failed to parse {}: {}", what, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn rejects_inverted_time_range() {
        let err = validate_day_and_range(1, t(17, 0), t(9, 0)).unwrap_err();
        assert!(matches!(err, SchedulingError::ValidationError(_)));
    }

    #[test]
    fn rejects_out_of_range_day() {
        assert!(validate_day_and_range(7, t(9, 0), t(17, 0)).is_err());
        assert!(validate_day_and_range(-1, t(9, 0), t(17, 0)).is_err());
        assert!(validate_day_and_range(0, t(9, 0), t(17, 0)).is_ok());
    }
}
