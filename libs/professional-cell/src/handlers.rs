// libs/professional-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;

use crate::models::{
    CalendarQuery, CreateAvailabilityRequest, CreateBlockedTimeRequest, CreateBreakRequest,
    SlotsQuery, SummaryQuery, UpdateAvailabilityRequest,
};
use crate::services::availability::AvailabilityService;
use crate::services::schedule::ScheduleService;

/// Schedule writes are restricted to the front desk and the professional
/// whose schedule it is.
fn ensure_can_manage_schedule(user: &User, professional_id: Uuid) -> Result<(), AppError> {
    let role = user
        .role
        .as_deref()
        .and_then(Role::parse)
        .ok_or_else(|| AppError::Forbidden("Unknown role".to_string()))?;

    if role.is_staff() {
        return Ok(());
    }
    if role == Role::Professional && user.id == professional_id.to_string() {
        return Ok(());
    }

    Err(AppError::Forbidden(
        "Not authorized to manage this professional's schedule".to_string(),
    ))
}

// ==============================================================================
// AVAILABILITY QUERY HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppConfig>>,
    Path(professional_id): Path<Uuid>,
    Query(params): Query<SlotsQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let availability_service = AvailabilityService::new(&state);

    let slots = availability_service
        .get_available_slots(
            professional_id,
            params.date,
            params.duration_minutes,
            params.granularity,
            None,
            token,
        )
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!({
        "professional_id": professional_id,
        "date": params.date,
        "duration_minutes": params.duration_minutes,
        "slots": slots,
        "total": slots.len()
    })))
}

#[axum::debug_handler]
pub async fn get_month_calendar(
    State(state): State<Arc<AppConfig>>,
    Path(professional_id): Path<Uuid>,
    Query(params): Query<CalendarQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let availability_service = AvailabilityService::new(&state);

    let duration_minutes = match (params.service_id, params.duration_minutes) {
        (Some(service_id), _) => availability_service
            .service_duration(service_id, token)
            .await
            .map_err(AppError::from)?,
        (None, Some(duration)) => duration,
        (None, None) => {
            return Err(AppError::BadRequest(
                "Either service_id or duration_minutes is required".to_string(),
            ));
        }
    };

    let calendar = availability_service
        .month_availability(professional_id, params.year, params.month, duration_minutes, token)
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!({
        "professional_id": professional_id,
        "year": params.year,
        "month": params.month,
        "duration_minutes": duration_minutes,
        "days": calendar
    })))
}

#[axum::debug_handler]
pub async fn get_availability_summary(
    State(state): State<Arc<AppConfig>>,
    Query(params): Query<SummaryQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let availability_service = AvailabilityService::new(&state);

    let duration_minutes = match (params.service_id, params.duration_minutes) {
        (Some(service_id), _) => availability_service
            .service_duration(service_id, token)
            .await
            .map_err(AppError::from)?,
        (None, Some(duration)) => duration,
        (None, None) => {
            return Err(AppError::BadRequest(
                "Either service_id or duration_minutes is required".to_string(),
            ));
        }
    };

    let summaries = availability_service
        .availability_summary(params.date, duration_minutes, token)
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!({
        "date": params.date,
        "duration_minutes": duration_minutes,
        "professionals": summaries
    })))
}

// ==============================================================================
// SCHEDULE CRUD HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_availability(
    State(state): State<Arc<AppConfig>>,
    Path(professional_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_can_manage_schedule(&user, professional_id)?;

    let schedule_service = ScheduleService::new(&state);
    let availability = schedule_service
        .create_availability(professional_id, request, auth.token())
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!({
        "success": true,
        "availability": availability
    })))
}

#[axum::debug_handler]
pub async fn list_availability(
    State(state): State<Arc<AppConfig>>,
    Path(professional_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let schedule_service = ScheduleService::new(&state);
    let availability = schedule_service
        .list_availability(professional_id, auth.token())
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!({
        "professional_id": professional_id,
        "availability": availability
    })))
}

#[axum::debug_handler]
pub async fn update_availability(
    State(state): State<Arc<AppConfig>>,
    Path((professional_id, availability_id)): Path<(Uuid, Uuid)>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_can_manage_schedule(&user, professional_id)?;

    let schedule_service = ScheduleService::new(&state);
    let availability = schedule_service
        .update_availability(availability_id, request, auth.token())
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!({
        "success": true,
        "availability": availability
    })))
}

#[axum::debug_handler]
pub async fn delete_availability(
    State(state): State<Arc<AppConfig>>,
    Path((professional_id, availability_id)): Path<(Uuid, Uuid)>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    ensure_can_manage_schedule(&user, professional_id)?;

    let schedule_service = ScheduleService::new(&state);
    schedule_service
        .delete_availability(availability_id, auth.token())
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!({ "success": true })))
}

#[axum::debug_handler]
pub async fn create_break(
    State(state): State<Arc<AppConfig>>,
    Path(professional_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateBreakRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_can_manage_schedule(&user, professional_id)?;

    let schedule_service = ScheduleService::new(&state);
    let break_entry = schedule_service
        .create_break(professional_id, request, auth.token())
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!({
        "success": true,
        "break": break_entry
    })))
}

#[axum::debug_handler]
pub async fn list_breaks(
    State(state): State<Arc<AppConfig>>,
    Path(professional_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let schedule_service = ScheduleService::new(&state);
    let breaks = schedule_service
        .list_breaks(professional_id, auth.token())
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!({
        "professional_id": professional_id,
        "breaks": breaks
    })))
}

#[axum::debug_handler]
pub async fn delete_break(
    State(state): State<Arc<AppConfig>>,
    Path((professional_id, break_id)): Path<(Uuid, Uuid)>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    ensure_can_manage_schedule(&user, professional_id)?;

    let schedule_service = ScheduleService::new(&state);
    schedule_service
        .delete_break(break_id, auth.token())
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!({ "success": true })))
}

#[axum::debug_handler]
pub async fn create_blocked_time(
    State(state): State<Arc<AppConfig>>,
    Path(professional_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateBlockedTimeRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_can_manage_schedule(&user, professional_id)?;

    let schedule_service = ScheduleService::new(&state);
    let blocked = schedule_service
        .create_blocked_time(professional_id, request, auth.token())
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!({
        "success": true,
        "blocked_time": blocked
    })))
}

#[axum::debug_handler]
pub async fn list_blocked_times(
    State(state): State<Arc<AppConfig>>,
    Path(professional_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let schedule_service = ScheduleService::new(&state);
    let blocked = schedule_service
        .list_blocked_times(professional_id, auth.token())
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!({
        "professional_id": professional_id,
        "blocked_times": blocked
    })))
}

#[axum::debug_handler]
pub async fn delete_blocked_time(
    State(state): State<Arc<AppConfig>>,
    Path((professional_id, blocked_time_id)): Path<(Uuid, Uuid)>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    ensure_can_manage_schedule(&user, professional_id)?;

    let schedule_service = ScheduleService::new(&state);
    schedule_service
        .delete_blocked_time(blocked_time_id, auth.token())
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!({ "success": true })))
}
