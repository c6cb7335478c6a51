// libs/appointment-cell/src/handlers.rs
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
use shared_models::auth::{Actor, Role, User};
use shared_models::error::AppError;

use crate::models::{
    AppointmentSearchQuery, BookGroupRequest, CancelRequest, LifecycleAction,
    RescheduleAppointmentRequest,
};
use crate::services::booking::AppointmentBookingService;
use crate::services::lifecycle::AppointmentLifecycleService;

fn actor_from(user: &User) -> Result<Actor, AppError> {
    Actor::from_user(user)
        .ok_or_else(|| AppError::Forbidden("Unknown role or malformed user id".to_string()))
}

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_group(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookGroupRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from(&user)?;

    // Booking management is front-desk work; clients may book for themselves
    match actor.role {
        Role::Manager | Role::Attendant => {}
        Role::Client => {
            if request.client.id != Some(actor.id) {
                return Err(AppError::Forbidden(
                    "Clients may only book for themselves".to_string(),
                ));
            }
        }
        Role::Professional => {
            return Err(AppError::Forbidden(
                "Professionals cannot create bookings".to_string(),
            ));
        }
    }

    let booking_service = AppointmentBookingService::new(&state);
    let response = booking_service
        .book_group(request, false, &actor, auth.token())
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!({
        "success": true,
        "booking": response,
        "message": "Appointment group booked successfully"
    })))
}

#[axum::debug_handler]
pub async fn book_walk_in(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookGroupRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from(&user)?;

    if !actor.role.is_staff() {
        return Err(AppError::Forbidden(
            "Walk-in bookings are created by the front desk".to_string(),
        ));
    }

    let booking_service = AppointmentBookingService::new(&state);
    let response = booking_service
        .book_group(request, true, &actor, auth.token())
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!({
        "success": true,
        "booking": response,
        "message": "Walk-in booked successfully"
    })))
}

// ==============================================================================
// READ HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from(&user)?;
    let booking_service = AppointmentBookingService::new(&state);

    let appointment = booking_service
        .get_appointment(appointment_id, auth.token())
        .await
        .map_err(AppError::from)?;

    let allowed = match actor.role {
        Role::Manager | Role::Attendant => true,
        Role::Professional => appointment.professional_id == actor.id,
        Role::Client => appointment.client_id == actor.id,
    };
    if !allowed {
        return Err(AppError::Forbidden(
            "Not authorized to view this appointment".to_string(),
        ));
    }

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn get_group(
    State(state): State<Arc<AppConfig>>,
    Path(group_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from(&user)?;
    let booking_service = AppointmentBookingService::new(&state);

    let (group, appointments) = booking_service
        .get_group(group_id, auth.token())
        .await
        .map_err(AppError::from)?;

    let allowed = match actor.role {
        Role::Manager | Role::Attendant => true,
        Role::Professional => appointments.iter().any(|a| a.professional_id == actor.id),
        Role::Client => group.client_id == actor.id,
    };
    if !allowed {
        return Err(AppError::Forbidden(
            "Not authorized to view this appointment group".to_string(),
        ));
    }

    Ok(Json(json!({
        "group": group,
        "appointments": appointments
    })))
}

#[axum::debug_handler]
pub async fn search_appointments(
    State(state): State<Arc<AppConfig>>,
    Query(params): Query<AppointmentSearchQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from(&user)?;
    let booking_service = AppointmentBookingService::new(&state);

    let mut search_query = params;

    // Non-staff only ever see their own appointments
    match actor.role {
        Role::Manager | Role::Attendant => {}
        Role::Professional => search_query.professional_id = Some(actor.id),
        Role::Client => search_query.client_id = Some(actor.id),
    }

    let appointments = booking_service
        .search_appointments(search_query, auth.token())
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

// ==============================================================================
// LIFECYCLE HANDLERS
// ==============================================================================

async fn apply_transition(
    state: Arc<AppConfig>,
    appointment_id: Uuid,
    action: LifecycleAction,
    user: &User,
    token: &str,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from(user)?;
    let lifecycle_service = AppointmentLifecycleService::new(&state);

    let appointment = lifecycle_service
        .transition(appointment_id, action, &actor, token)
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn confirm_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    apply_transition(state, appointment_id, LifecycleAction::Confirm, &user, auth.token()).await
}

#[axum::debug_handler]
pub async fn mark_arrived(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    apply_transition(state, appointment_id, LifecycleAction::Arrive, &user, auth.token()).await
}

#[axum::debug_handler]
pub async fn start_service(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    apply_transition(state, appointment_id, LifecycleAction::StartService, &user, auth.token()).await
}

#[axum::debug_handler]
pub async fn mark_ready_to_pay(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    apply_transition(state, appointment_id, LifecycleAction::ReadyToPay, &user, auth.token()).await
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    apply_transition(state, appointment_id, LifecycleAction::Complete, &user, auth.token()).await
}

#[axum::debug_handler]
pub async fn mark_no_show(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    apply_transition(state, appointment_id, LifecycleAction::NoShow, &user, auth.token()).await
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(_request): Json<CancelRequest>,
) -> Result<Json<Value>, AppError> {
    apply_transition(state, appointment_id, LifecycleAction::Cancel, &user, auth.token()).await
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from(&user)?;
    let lifecycle_service = AppointmentLifecycleService::new(&state);

    let appointment = lifecycle_service
        .reschedule(appointment_id, request, &actor, auth.token())
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment rescheduled successfully"
    })))
}

#[axum::debug_handler]
pub async fn cancel_group(
    State(state): State<Arc<AppConfig>>,
    Path(group_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(_request): Json<CancelRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from(&user)?;
    let lifecycle_service = AppointmentLifecycleService::new(&state);

    let group = lifecycle_service
        .cancel_group(group_id, &actor, auth.token())
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!({
        "success": true,
        "group": group,
        "message": "Appointment group cancelled"
    })))
}
