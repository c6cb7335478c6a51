// libs/professional-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc, NaiveDate, NaiveTime};

// ==============================================================================
// SCHEDULE MODELS
// ==============================================================================

/// Recurring weekly working window. Non-overlapping per professional/day,
/// enforced by the CRUD layer on write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfessionalAvailability {
    pub id: Uuid,
    pub professional_id: Uuid,
    pub day_of_week: i32, // 0 = Sunday, 1 = Monday, etc.
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Recurring weekly break (lunch, cleaning), subtracted from availability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfessionalBreak {
    pub id: Uuid,
    pub professional_id: Uuid,
    pub day_of_week: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    DayOff,
    BlockedSlot,
}

/// One-off exception for an exact date. `DayOff` carries no times and removes
/// the whole day; `BlockedSlot` requires both times and removes that interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfessionalBlockedTime {
    pub id: Uuid,
    pub professional_id: Uuid,
    pub block_date: NaiveDate,
    pub block_type: BlockType,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Professional {
    pub id: Uuid,
    pub display_name: String,
    pub active: bool,
}

// ==============================================================================
// AVAILABILITY QUERY MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableSlot {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i32,
}

/// One entry of the monthly calendar: does this date have at least one
/// bookable slot of the requested duration?
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub has_slots: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfessionalAvailabilitySummary {
    pub professional_id: Uuid,
    pub display_name: String,
    pub available_slots: Vec<AvailableSlot>,
}

/// Appointment occupancy as read back from the appointments table. Only the
/// fields the availability computation needs.
#[derive(Debug, Clone, Deserialize)]
pub struct BookedInterval {
    pub id: Uuid,
    pub professional_id: Uuid,
    pub appointment_date: NaiveDate,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: String,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAvailabilityRequest {
    pub day_of_week: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAvailabilityRequest {
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBreakRequest {
    pub day_of_week: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBlockedTimeRequest {
    pub block_date: NaiveDate,
    pub block_type: BlockType,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub date: NaiveDate,
    pub duration_minutes: i32,
    pub granularity: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    pub year: i32,
    pub month: u32,
    pub service_id: Option<Uuid>,
    pub duration_minutes: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub date: NaiveDate,
    pub service_id: Option<Uuid>,
    pub duration_minutes: Option<i32>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum SchedulingError {
    #[error("Professional not found")]
    ProfessionalNotFound,

    #[error("Schedule entry not found")]
    NotFound,

    #[error("Service not found")]
    ServiceNotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Schedule conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<SchedulingError> for shared_models::error::AppError {
    fn from(err: SchedulingError) -> Self {
        use shared_models::error::AppError;
        match err {
            SchedulingError::ProfessionalNotFound => AppError::NotFound("Professional not found".to_string()),
            SchedulingError::NotFound => AppError::NotFound("Schedule entry not found".to_string()),
            SchedulingError::ServiceNotFound => AppError::NotFound("Service not found".to_string()),
            SchedulingError::ValidationError(msg) => AppError::ValidationError(msg),
            SchedulingError::Conflict(msg) => AppError::Conflict(msg),
            SchedulingError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
