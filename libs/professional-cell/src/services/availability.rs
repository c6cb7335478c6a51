// libs/professional-cell/src/services/availability.rs
use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use reqwest::Method;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    AvailableSlot, BlockType, BookedInterval, DayAvailability, Professional,
    ProfessionalAvailability, ProfessionalAvailabilitySummary, ProfessionalBlockedTime,
    ProfessionalBreak, SchedulingError,
};
use crate::services::timegrid::{self, TimeRange};

/// Read-only computation of bookable windows for a professional. Writes to
/// the schedule itself live in `ScheduleService`; appointment writes live in
/// the appointment cell.
pub struct AvailabilityService {
    supabase: SupabaseClient,
    granularity_minutes: i32,
    suggested_count: usize,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            granularity_minutes: config.slot_granularity_minutes,
            suggested_count: config.suggested_professionals_count,
        }
    }

    /// Bookable slot starts for one professional on one date.
    pub async fn get_available_slots(
        &self,
        professional_id: Uuid,
        date: NaiveDate,
        duration_minutes: i32,
        granularity: Option<i32>,
        exclude_appointment_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<AvailableSlot>, SchedulingError> {
        debug!("Calculating available slots for professional {} on {}", professional_id, date);

        if duration_minutes <= 0 {
            return Err(SchedulingError::ValidationError(
                "duration_minutes must be positive".to_string(),
            ));
        }

        let free = self
            .free_ranges_for_date(professional_id, date, exclude_appointment_id, auth_token)
            .await?;

        let step = granularity.unwrap_or(self.granularity_minutes).max(1) as i64;
        let starts = timegrid::slot_starts(&free, duration_minutes as i64, step);

        let slots = starts
            .into_iter()
            .map(|start| {
                let start_time = date.and_time(start).and_utc();
                AvailableSlot {
                    start_time,
                    end_time: start_time + chrono::Duration::minutes(duration_minutes as i64),
                    duration_minutes,
                }
            })
            .collect();

        Ok(slots)
    }

    /// Whether [start, end) lies entirely within the professional's free time
    /// on that date. Used by booking and reschedule validation.
    pub async fn is_interval_free(
        &self,
        professional_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_appointment_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<bool, SchedulingError> {
        let date = start.date_naive();
        let duration = (end - start).num_minutes();

        if duration <= 0 {
            return Err(SchedulingError::ValidationError(
                "end must be after start".to_string(),
            ));
        }
        // Appointments never cross midnight
        if end.date_naive() != date {
            return Ok(false);
        }

        let free = self
            .free_ranges_for_date(professional_id, date, exclude_appointment_id, auth_token)
            .await?;

        Ok(timegrid::fits(&free, start.time(), duration))
    }

    /// Per-day `has_slots` flags for a whole month, batch-loading the
    /// schedule and bookings once instead of per day.
    pub async fn month_availability(
        &self,
        professional_id: Uuid,
        year: i32,
        month: u32,
        duration_minutes: i32,
        auth_token: &str,
    ) -> Result<Vec<DayAvailability>, SchedulingError> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| SchedulingError::ValidationError("invalid year/month".to_string()))?;
        let last = last_day_of_month(year, month);

        debug!("Calculating month availability for professional {} {}-{:02}", professional_id, year, month);

        let windows = self.load_all_availability(professional_id, auth_token).await?;
        if windows.is_empty() {
            return Ok(days_of_month(first, last)
                .map(|date| DayAvailability { date, has_slots: false })
                .collect());
        }

        let breaks = self.load_all_breaks(professional_id, auth_token).await?;
        let blocked = self
            .load_blocked_range(professional_id, first, last, auth_token)
            .await?;
        let booked = self
            .load_booked_range(professional_id, first, last, None, auth_token)
            .await?;

        let mut windows_by_day: HashMap<i32, Vec<TimeRange>> = HashMap::new();
        for window in &windows {
            windows_by_day
                .entry(window.day_of_week)
                .or_default()
                .push(TimeRange::new(window.start_time, window.end_time));
        }
        let mut breaks_by_day: HashMap<i32, Vec<TimeRange>> = HashMap::new();
        for b in &breaks {
            breaks_by_day
                .entry(b.day_of_week)
                .or_default()
                .push(TimeRange::new(b.start_time, b.end_time));
        }
        let mut blocked_by_date: HashMap<NaiveDate, Vec<&ProfessionalBlockedTime>> = HashMap::new();
        for block in &blocked {
            blocked_by_date.entry(block.block_date).or_default().push(block);
        }
        let mut booked_by_date: HashMap<NaiveDate, Vec<TimeRange>> = HashMap::new();
        for interval in &booked {
            booked_by_date
                .entry(interval.appointment_date)
                .or_default()
                .push(TimeRange::new(interval.start_time.time(), interval.end_time.time()));
        }

        let step = self.granularity_minutes.max(1) as i64;
        let calendar = days_of_month(first, last)
            .map(|date| {
                let dow = day_of_week(date);
                let day_windows = windows_by_day.get(&dow).cloned().unwrap_or_default();
                let day_blocks = blocked_by_date.get(&date).map(Vec::as_slice).unwrap_or(&[]);

                let has_slots = if day_windows.is_empty() || day_blocks.iter().any(|b| b.block_type == BlockType::DayOff) {
                    false
                } else {
                    let block_ranges: Vec<TimeRange> = day_blocks
                        .iter()
                        .filter_map(|b| blocked_slot_range(b))
                        .collect();
                    let free = timegrid::free_ranges(
                        day_windows,
                        breaks_by_day.get(&dow).map(Vec::as_slice).unwrap_or(&[]),
                        &block_ranges,
                        booked_by_date.get(&date).map(Vec::as_slice).unwrap_or(&[]),
                    );
                    !timegrid::slot_starts(&free, duration_minutes as i64, step).is_empty()
                };

                DayAvailability { date, has_slots }
            })
            .collect();

        Ok(calendar)
    }

    /// Up to `suggested_professionals_count` active professionals with at
    /// least one free slot for the date/duration, front-desk suggestion list.
    pub async fn availability_summary(
        &self,
        date: NaiveDate,
        duration_minutes: i32,
        auth_token: &str,
    ) -> Result<Vec<ProfessionalAvailabilitySummary>, SchedulingError> {
        let path = "/rest/v1/professionals?active=eq.true&order=display_name.asc";
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        let professionals: Vec<Professional> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Professional>, _>>()
            .map_err(|e| SchedulingError::DatabaseError(format!("Failed to parse professionals: {}", e)))?;

        let mut summaries = Vec::new();
        for professional in professionals {
            if summaries.len() >= self.suggested_count {
                break;
            }

            let slots = self
                .get_available_slots(professional.id, date, duration_minutes, None, None, auth_token)
                .await?;

            if !slots.is_empty() {
                summaries.push(ProfessionalAvailabilitySummary {
                    professional_id: professional.id,
                    display_name: professional.display_name,
                    available_slots: slots,
                });
            }
        }

        Ok(summaries)
    }

    /// Effective duration of a service (base + processing + finishing), for
    /// service-level calendar queries.
    pub async fn service_duration(
        &self,
        service_id: Uuid,
        auth_token: &str,
    ) -> Result<i32, SchedulingError> {
        let path = format!("/rest/v1/services?id=eq.{}", service_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        let Some(service) = result.first() else {
            return Err(SchedulingError::ServiceNotFound);
        };

        let minutes = service["duration_minutes"].as_i64().unwrap_or(0)
            + service["processing_time"].as_i64().unwrap_or(0)
            + service["finishing_time"].as_i64().unwrap_or(0);

        Ok(minutes as i32)
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    /// Free ranges for one date: windows minus breaks, blocks and bookings.
    async fn free_ranges_for_date(
        &self,
        professional_id: Uuid,
        date: NaiveDate,
        exclude_appointment_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<TimeRange>, SchedulingError> {
        let dow = day_of_week(date);

        let windows = self.load_availability_for_day(professional_id, dow, auth_token).await?;
        if windows.is_empty() {
            return Ok(vec![]);
        }

        let blocked = self
            .load_blocked_range(professional_id, date, date, auth_token)
            .await?;
        if blocked.iter().any(|b| b.block_type == BlockType::DayOff) {
            debug!("Professional {} has a day off on {}", professional_id, date);
            return Ok(vec![]);
        }
        let block_ranges: Vec<TimeRange> = blocked.iter().filter_map(blocked_slot_range).collect();

        let breaks = self.load_breaks_for_day(professional_id, dow, auth_token).await?;
        let break_ranges: Vec<TimeRange> = breaks
            .iter()
            .map(|b| TimeRange::new(b.start_time, b.end_time))
            .collect();

        let booked = self
            .load_booked_range(professional_id, date, date, exclude_appointment_id, auth_token)
            .await?;
        let booked_ranges: Vec<TimeRange> = booked
            .iter()
            .map(|b| TimeRange::new(b.start_time.time(), b.end_time.time()))
            .collect();

        let window_ranges = windows
            .iter()
            .map(|w| TimeRange::new(w.start_time, w.end_time))
            .collect();

        Ok(timegrid::free_ranges(window_ranges, &break_ranges, &block_ranges, &booked_ranges))
    }

    async fn load_availability_for_day(
        &self,
        professional_id: Uuid,
        day_of_week: i32,
        auth_token: &str,
    ) -> Result<Vec<ProfessionalAvailability>, SchedulingError> {
        let path = format!(
            "/rest/v1/professional_availability?professional_id=eq.{}&day_of_week=eq.{}&order=start_time.asc",
            professional_id, day_of_week
        );
        self.fetch_parsed(&path, auth_token, "availability").await
    }

    async fn load_all_availability(
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

    async fn load_breaks_for_day(
        &self,
        professional_id: Uuid,
        day_of_week: i32,
        auth_token: &str,
    ) -> Result<Vec<ProfessionalBreak>, SchedulingError> {
        let path = format!(
            "/rest/v1/professional_breaks?professional_id=eq.{}&day_of_week=eq.{}&order=start_time.asc",
            professional_id, day_of_week
        );
        self.fetch_parsed(&path, auth_token, "breaks").await
    }

    async fn load_all_breaks(
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

    async fn load_blocked_range(
        &self,
        professional_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<ProfessionalBlockedTime>, SchedulingError> {
        let path = format!(
            "/rest/v1/professional_blocked_times?professional_id=eq.{}&block_date=gte.{}&block_date=lte.{}",
            professional_id, from, to
        );
        self.fetch_parsed(&path, auth_token, "blocked times").await
    }

    async fn load_booked_range(
        &self,
        professional_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        exclude_appointment_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<BookedInterval>, SchedulingError> {
        let mut path = format!(
            "/rest/v1/appointments?professional_id=eq.{}&appointment_date=gte.{}&appointment_date=lte.{}&status=neq.cancelled&order=start_time.asc",
            professional_id, from, to
        );
        if let Some(exclude) = exclude_appointment_id {
            path.push_str(&format!("&id=neq.{}", exclude));
        }
        self.fetch_parsed(&path, auth_token, "appointments").await
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
            .map_err(|e| {
                warn!("Failed to parse {} rows: {}", what, e);
                SchedulingError::DatabaseError(format!("Failed to parse {}: {}", what, e))
            })
    }
}

/// 0 = Sunday, matching the stored day_of_week convention.
pub fn day_of_week(date: NaiveDate) -> i32 {
    match date.weekday() {
        Weekday::Sun => 0,
        Weekday::Mon => 1,
        Weekday::Tue => 2,
        Weekday::Wed => 3,
        Weekday::Thu => 4,
        Weekday::Fri => 5,
        Weekday::Sat => 6,
    }
}

fn blocked_slot_range(block: &ProfessionalBlockedTime) -> Option<TimeRange> {
    match (block.block_type, block.start_time, block.end_time) {
        (BlockType::BlockedSlot, Some(start), Some(end)) => Some(TimeRange::new(start, end)),
        _ => None,
    }
}

fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    next.map(|d| d - chrono::Duration::days(1))
        .unwrap_or_else(|| NaiveDate::from_ymd_opt(year, month, 28).unwrap())
}

fn days_of_month(first: NaiveDate, last: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    first.iter_days().take_while(move |d| *d <= last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_of_week_is_zero_based_on_sunday() {
        // 2025-06-01 was a Sunday
        let sunday = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert_eq!(day_of_week(sunday), 0);
        assert_eq!(day_of_week(sunday + chrono::Duration::days(1)), 1);
    }

    #[test]
    fn last_day_handles_year_rollover() {
        assert_eq!(
            last_day_of_month(2025, 12),
            NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()
        );
        assert_eq!(
            last_day_of_month(2024, 2),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
    }
}
