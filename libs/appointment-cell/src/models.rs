// libs/appointment-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc, NaiveDate};
use std::fmt;

use professional_cell::models::SchedulingError;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

/// One (service, professional, client) leg of a group. Price and duration are
/// frozen copies taken at booking time; later catalog edits never touch them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub group_id: Uuid,
    pub client_id: Uuid,
    pub professional_id: Uuid,
    pub service_id: Uuid,
    pub variation_id: Option<Uuid>,
    pub appointment_date: NaiveDate,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub price_at_booking: f64,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One multi-service booking transaction for a single client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentGroup {
    pub id: Uuid,
    pub client_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub total_duration_minutes: i32,
    pub total_price: f64,
    pub status: AppointmentStatus,
    pub walk_in: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    WalkIn,
    Confirmed,
    Arrived,
    InService,
    PartiallyCompleted,
    ReadyToPay,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::NoShow)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::WalkIn => write!(f, "walk_in"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Arrived => write!(f, "arrived"),
            AppointmentStatus::InService => write!(f, "in_service"),
            AppointmentStatus::PartiallyCompleted => write!(f, "partially_completed"),
            AppointmentStatus::ReadyToPay => write!(f, "ready_to_pay"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::NoShow => write!(f, "no_show"),
        }
    }
}

/// Post-creation lifecycle actions. Reschedule is not a status action; it
/// keeps the current status and only moves the interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleAction {
    Confirm,
    Arrive,
    StartService,
    ReadyToPay,
    Complete,
    Cancel,
    NoShow,
}

impl fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleAction::Confirm => write!(f, "confirm"),
            LifecycleAction::Arrive => write!(f, "arrive"),
            LifecycleAction::StartService => write!(f, "start_service"),
            LifecycleAction::ReadyToPay => write!(f, "ready_to_pay"),
            LifecycleAction::Complete => write!(f, "complete"),
            LifecycleAction::Cancel => write!(f, "cancel"),
            LifecycleAction::NoShow => write!(f, "no_show"),
        }
    }
}

// ==============================================================================
// CATALOG MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub price: Option<f64>,
    pub duration_minutes: Option<i32>,
    pub processing_time: Option<i32>,
    pub finishing_time: Option<i32>,
    pub execution_order: i32,
    pub execution_flexible: bool,
    pub parallelable: bool,
    pub max_parallel_pros: Option<i32>,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceVariationGroup {
    pub id: Uuid,
    pub service_id: Uuid,
    pub name: String,
}

/// Named option on a service; deltas may be negative and are applied as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceVariation {
    pub id: Uuid,
    pub group_id: Uuid,
    pub name: String,
    pub price_delta: f64,
    pub duration_delta: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationType {
    pub id: Uuid,
    pub name: String,
}

/// A physical bookable resource (chair, sink, room).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    pub id: Uuid,
    pub station_type_id: Uuid,
    pub label: String,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStationRequirement {
    pub id: Uuid,
    pub service_id: Uuid,
    pub station_type_id: Uuid,
    pub qty: i32,
}

/// Station occupancy row written at booking and removed on cancellation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationReservation {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub station_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ==============================================================================
// PRICING VALUE OBJECTS
// ==============================================================================
// Pure computation types; never persisted, never loaded. All pricing and
// duration math runs on these so it stays testable without a database.

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServicePrice {
    pub base: f64,
    pub variation_delta: f64,
    pub final_price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServiceDuration {
    pub base: i32,
    pub processing: i32,
    pub finishing: i32,
    pub variation_delta: i32,
    pub total: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceCalculation {
    pub service_id: Uuid,
    pub variation_id: Option<Uuid>,
    pub professional_id: Uuid,
    pub price: ServicePrice,
    pub duration: ServiceDuration,
    pub execution_order: i32,
    pub execution_flexible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupTotals {
    pub total_price: f64,
    pub total_duration_minutes: i32,
    pub service_count: usize,
}

#[derive(Debug, Clone)]
pub struct ClientResult {
    pub client: Client,
    pub was_created: bool,
}

/// Everything `prepare` resolves before anything is written.
#[derive(Debug, Clone)]
pub struct AppointmentData {
    pub client: ClientResult,
    pub calculations: Vec<ServiceCalculation>,
    pub totals: GroupTotals,
    pub start_time: DateTime<Utc>,
    pub walk_in: bool,
    pub notes: Option<String>,
}

/// One leg placed on the timeline by the factory.
#[derive(Debug, Clone)]
pub struct LegSchedule {
    pub calculation: ServiceCalculation,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientData {
    pub id: Option<Uuid>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Ids are optional so validation can report missing fields as 400s instead
/// of failing at deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceBookingEntry {
    pub service_id: Option<Uuid>,
    pub professional_id: Option<Uuid>,
    pub variation_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookGroupRequest {
    pub client: ClientData,
    pub services: Vec<ServiceBookingEntry>,
    pub start_time: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookGroupResponse {
    pub group: AppointmentGroup,
    pub appointments: Vec<Appointment>,
    pub client_created: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub new_start_time: DateTime<Utc>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentSearchQuery {
    pub client_id: Option<Uuid>,
    pub professional_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Appointment group not found")]
    GroupNotFound,

    #[error("Client not found")]
    ClientNotFound,

    #[error("Service not found: {0}")]
    ServiceNotFound(Uuid),

    #[error("Service variation not found: {0}")]
    VariationNotFound(Uuid),

    #[error("Requested slot is not available")]
    SlotUnavailable,

    #[error("No free station of the required type")]
    StationUnavailable,

    #[error("Booking conflicts with a concurrent reservation")]
    ConflictDetected,

    #[error("Action {action} is not allowed from status {from}")]
    InvalidTransition {
        from: AppointmentStatus,
        action: LifecycleAction,
    },

    #[error("Appointment in status {0} cannot be rescheduled")]
    NotReschedulable(AppointmentStatus),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<AppointmentError> for shared_models::error::AppError {
    fn from(err: AppointmentError) -> Self {
        use shared_models::error::AppError;
        match &err {
            AppointmentError::NotFound
            | AppointmentError::GroupNotFound
            | AppointmentError::ClientNotFound
            | AppointmentError::ServiceNotFound(_)
            | AppointmentError::VariationNotFound(_) => AppError::NotFound(err.to_string()),
            AppointmentError::SlotUnavailable
            | AppointmentError::StationUnavailable
            | AppointmentError::ConflictDetected => AppError::Conflict(err.to_string()),
            AppointmentError::InvalidTransition { .. }
            | AppointmentError::NotReschedulable(_) => AppError::InvalidState(err.to_string()),
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg.clone()),
            AppointmentError::Unauthorized(msg) => AppError::Forbidden(msg.clone()),
            AppointmentError::DatabaseError(msg) => AppError::Database(msg.clone()),
        }
    }
}

impl From<SchedulingError> for AppointmentError {
    fn from(err: SchedulingError) -> Self {
        match err {
            SchedulingError::ServiceNotFound => {
                AppointmentError::ValidationError("Service not found".to_string())
            }
            SchedulingError::ValidationError(msg) => AppointmentError::ValidationError(msg),
            SchedulingError::Conflict(_) => AppointmentError::ConflictDetected,
            other => AppointmentError::DatabaseError(other.to_string()),
        }
    }
}
