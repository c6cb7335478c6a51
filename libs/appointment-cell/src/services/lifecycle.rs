// libs/appointment-cell/src/services/lifecycle.rs
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::{Actor, Role};
use commission_cell::models::{AuditEventType, CommissionRequest};
use commission_cell::services::audit::AuditService;
use commission_cell::services::commission::CommissionService;
use professional_cell::services::availability::AvailabilityService;

use crate::models::{
    Appointment, AppointmentError, AppointmentGroup, AppointmentStatus, LifecycleAction,
    RescheduleAppointmentRequest,
};
use crate::services::reservation::SlotReservationService;
use crate::services::stations::StationAllocationService;

/// What a lifecycle action does to an appointment's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPlan {
    Apply(AppointmentStatus),
    /// The appointment is already in the target state; the action is a no-op.
    AlreadyDone,
}

/// The (state, action) half of the transition table.
pub fn plan_transition(
    current: AppointmentStatus,
    action: LifecycleAction,
) -> Result<TransitionPlan, AppointmentError> {
    use AppointmentStatus::*;

    let denied = || Err(AppointmentError::InvalidTransition { from: current, action });

    match action {
        LifecycleAction::Confirm => match current {
            Scheduled | WalkIn => Ok(TransitionPlan::Apply(Confirmed)),
            _ => denied(),
        },
        LifecycleAction::Arrive => match current {
            Confirmed => Ok(TransitionPlan::Apply(Arrived)),
            _ => denied(),
        },
        LifecycleAction::StartService => match current {
            Arrived => Ok(TransitionPlan::Apply(InService)),
            _ => denied(),
        },
        LifecycleAction::ReadyToPay => match current {
            InService | PartiallyCompleted => Ok(TransitionPlan::Apply(ReadyToPay)),
            _ => denied(),
        },
        LifecycleAction::Complete => match current {
            Cancelled => denied(),
            Completed => Ok(TransitionPlan::AlreadyDone),
            _ => Ok(TransitionPlan::Apply(Completed)),
        },
        LifecycleAction::Cancel => match current {
            Completed | Cancelled => denied(),
            _ => Ok(TransitionPlan::Apply(Cancelled)),
        },
        LifecycleAction::NoShow => match current {
            Scheduled | WalkIn | Confirmed => Ok(TransitionPlan::Apply(NoShow)),
            _ => denied(),
        },
    }
}

/// The role half of the transition table.
pub fn allowed_roles(action: LifecycleAction) -> &'static [Role] {
    match action {
        LifecycleAction::Confirm => &[Role::Manager, Role::Attendant],
        LifecycleAction::Arrive => &[Role::Manager, Role::Attendant],
        LifecycleAction::StartService => &[Role::Manager, Role::Attendant, Role::Professional],
        LifecycleAction::ReadyToPay => &[Role::Manager, Role::Attendant, Role::Professional],
        LifecycleAction::Complete => &[Role::Manager, Role::Professional],
        LifecycleAction::Cancel => &[Role::Manager, Role::Attendant, Role::Professional, Role::Client],
        LifecycleAction::NoShow => &[Role::Manager, Role::Professional],
    }
}

/// Aggregate status of a group from its children. None means "leave as is".
pub fn derive_group_status(children: &[AppointmentStatus]) -> Option<AppointmentStatus> {
    use AppointmentStatus::*;

    if children.is_empty() {
        return None;
    }

    let active: Vec<AppointmentStatus> =
        children.iter().copied().filter(|s| *s != Cancelled).collect();

    if active.is_empty() {
        return Some(Cancelled);
    }
    if active.iter().all(|s| *s == NoShow) {
        return Some(NoShow);
    }
    if active.iter().all(|s| *s == Completed) {
        return Some(Completed);
    }
    if children.iter().any(|s| *s == Completed) {
        return Some(PartiallyCompleted);
    }

    None
}

fn audit_event_for(action: LifecycleAction) -> AuditEventType {
    match action {
        LifecycleAction::Confirm => AuditEventType::AppointmentConfirmed,
        LifecycleAction::Arrive => AuditEventType::AppointmentArrived,
        LifecycleAction::StartService => AuditEventType::AppointmentStarted,
        LifecycleAction::ReadyToPay => AuditEventType::AppointmentReadyToPay,
        LifecycleAction::Complete => AuditEventType::AppointmentCompleted,
        LifecycleAction::Cancel => AuditEventType::AppointmentCancelled,
        LifecycleAction::NoShow => AuditEventType::AppointmentNoShow,
    }
}

/// Governs every post-creation mutation of appointments and groups, and
/// raises the commission/audit side effects exactly once per event.
pub struct AppointmentLifecycleService {
    supabase: Arc<SupabaseClient>,
    availability: AvailabilityService,
    stations: StationAllocationService,
    reservations: SlotReservationService,
    commission: CommissionService,
    audit: AuditService,
    commission_percent: f64,
}

impl AppointmentLifecycleService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));

        Self {
            availability: AvailabilityService::new(config),
            stations: StationAllocationService::new(Arc::clone(&supabase)),
            reservations: SlotReservationService::new(Arc::clone(&supabase)),
            commission: CommissionService::new(config),
            audit: AuditService::new(config),
            commission_percent: config.default_commission_percent,
            supabase,
        }
    }

    /// Apply one lifecycle action to an appointment on behalf of an actor.
    pub async fn transition(
        &self,
        appointment_id: Uuid,
        action: LifecycleAction,
        actor: &Actor,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Applying {} to appointment {}", action, appointment_id);

        let appointment = self.fetch_appointment(appointment_id, auth_token).await?;
        authorize(&appointment, action, actor)?;

        let new_status = match plan_transition(appointment.status, action)? {
            TransitionPlan::AlreadyDone => {
                debug!("Appointment {} already completed, action is a no-op", appointment_id);
                return Ok(appointment);
            }
            TransitionPlan::Apply(status) => status,
        };

        let updated = self
            .patch_appointment_status(appointment_id, new_status, auth_token)
            .await?;

        if new_status == AppointmentStatus::Cancelled {
            // Cancellation frees any held stations; the row itself stays.
            if let Err(e) = self.stations.release_for_appointment(appointment_id, auth_token).await {
                warn!("Station release after cancellation failed: {}", e);
            }
        }

        self.refresh_group_status(updated.group_id, auth_token).await?;

        // Reaching Completed here means the status actually changed (a
        // re-complete short-circuits above), so this fires once per event
        if new_status == AppointmentStatus::Completed {
            self.emit_commission(&updated, auth_token).await;
        }

        self.audit
            .record(
                audit_event_for(action),
                actor,
                updated.id,
                json!({
                    "group_id": updated.group_id,
                    "from": appointment.status,
                    "to": new_status
                }),
                auth_token,
            )
            .await;

        info!("Appointment {} transitioned {} -> {}", appointment_id, appointment.status, new_status);
        Ok(updated)
    }

    /// Move an appointment to a new interval. Status is untouched: the
    /// operation either fully applies or fails leaving everything as it was.
    pub async fn reschedule(
        &self,
        appointment_id: Uuid,
        request: RescheduleAppointmentRequest,
        actor: &Actor,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Rescheduling appointment {} to {}", appointment_id, request.new_start_time);

        let appointment = self.fetch_appointment(appointment_id, auth_token).await?;
        authorize_reschedule(&appointment, actor)?;

        if appointment.status.is_terminal() {
            return Err(AppointmentError::NotReschedulable(appointment.status));
        }

        let new_start = request.new_start_time;
        let new_end = new_start + chrono::Duration::minutes(appointment.duration_minutes as i64);

        let lock_keys = vec![SlotReservationService::slot_lock_key(
            appointment.professional_id,
            new_start,
            new_end,
        )];
        self.reservations.acquire_with_retry(&lock_keys).await?;

        let result = self
            .apply_reschedule(&appointment, new_start, new_end, auth_token)
            .await;

        self.reservations.release(&lock_keys).await;
        let updated = result?;

        self.audit
            .record(
                AuditEventType::AppointmentRescheduled,
                actor,
                updated.id,
                json!({
                    "group_id": updated.group_id,
                    "from_start": appointment.start_time,
                    "to_start": new_start,
                    "reason": request.reason
                }),
                auth_token,
            )
            .await;

        info!("Appointment {} rescheduled to {}", appointment_id, new_start);
        Ok(updated)
    }

    /// Cancel every remaining child of a group. Completed children keep their
    /// status, which the derived group status then reflects.
    pub async fn cancel_group(
        &self,
        group_id: Uuid,
        actor: &Actor,
        auth_token: &str,
    ) -> Result<AppointmentGroup, AppointmentError> {
        debug!("Cancelling appointment group {}", group_id);

        let group = self.fetch_group(group_id, auth_token).await?;
        authorize_group_cancel(&group, actor)?;

        if matches!(group.status, AppointmentStatus::Completed | AppointmentStatus::Cancelled) {
            return Err(AppointmentError::InvalidTransition {
                from: group.status,
                action: LifecycleAction::Cancel,
            });
        }

        // One statement cancels every child that is still cancellable
        let path = format!(
            "/rest/v1/appointments?group_id=eq.{}&status=not.in.(completed,cancelled)",
            group_id
        );
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let body = json!({
            "status": AppointmentStatus::Cancelled,
            "updated_at": Utc::now().to_rfc3339()
        });
        let cancelled: Vec<Value> = self
            .supabase
            .request_with_headers(Method::PATCH, &path, Some(auth_token), Some(body), Some(headers))
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        for row in &cancelled {
            if let Some(id) = row.get("id").and_then(|v| v.as_str()).and_then(|s| Uuid::parse_str(s).ok()) {
                if let Err(e) = self.stations.release_for_appointment(id, auth_token).await {
                    warn!("Station release for cancelled appointment {} failed: {}", id, e);
                }
            }
        }

        let updated = self.refresh_group_status(group_id, auth_token).await?;
        let group = updated.unwrap_or(group);

        self.audit
            .record(
                AuditEventType::GroupCancelled,
                actor,
                group_id,
                json!({ "cancelled_children": cancelled.len() }),
                auth_token,
            )
            .await;

        info!("Group {} cancelled ({} children)", group_id, cancelled.len());
        Ok(group)
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    async fn apply_reschedule(
        &self,
        appointment: &Appointment,
        new_start: chrono::DateTime<Utc>,
        new_end: chrono::DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let free = self
            .availability
            .is_interval_free(
                appointment.professional_id,
                new_start,
                new_end,
                Some(appointment.id),
                auth_token,
            )
            .await?;

        if !free {
            return Err(AppointmentError::SlotUnavailable);
        }

        // Stations: drop the old reservations, then claim the new interval.
        // If the new interval has no free stations the old ones are restored
        // so a failed reschedule leaves no trace.
        let old_reservations = self.stations.list_for_appointment(appointment.id, auth_token).await?;
        let old_station_ids: Vec<Uuid> = old_reservations.iter().map(|r| r.station_id).collect();

        if !old_station_ids.is_empty() {
            self.stations.release_for_appointment(appointment.id, auth_token).await?;
        }

        let new_station_ids = match self
            .stations
            .allocate(appointment.service_id, new_start, new_end, auth_token)
            .await
        {
            Ok(ids) => ids,
            Err(e) => {
                if !old_station_ids.is_empty() {
                    if let Err(restore) = self
                        .stations
                        .reserve(
                            appointment.id,
                            &old_station_ids,
                            appointment.start_time,
                            appointment.end_time,
                            auth_token,
                        )
                        .await
                    {
                        warn!("Failed to restore station reservations: {}", restore);
                    }
                }
                return Err(e);
            }
        };

        self.stations
            .reserve(appointment.id, &new_station_ids, new_start, new_end, auth_token)
            .await?;

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment.id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let body = json!({
            "appointment_date": new_start.date_naive(),
            "start_time": new_start.to_rfc3339(),
            "end_time": new_end.to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });
        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(Method::PATCH, &path, Some(auth_token), Some(body), Some(headers))
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let updated: Appointment = parse_single(rows, "appointment")?;

        self.refresh_group_span(updated.group_id, auth_token).await?;

        Ok(updated)
    }

    async fn fetch_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let Some(row) = result.into_iter().next() else {
            return Err(AppointmentError::NotFound);
        };

        serde_json::from_value(row)
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", e)))
    }

    async fn fetch_group(
        &self,
        group_id: Uuid,
        auth_token: &str,
    ) -> Result<AppointmentGroup, AppointmentError> {
        let path = format!("/rest/v1/appointment_groups?id=eq.{}", group_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let Some(row) = result.into_iter().next() else {
            return Err(AppointmentError::GroupNotFound);
        };

        serde_json::from_value(row)
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse group: {}", e)))
    }

    async fn fetch_children(
        &self,
        group_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!("/rest/v1/appointments?group_id=eq.{}&order=start_time.asc", group_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointments: {}", e)))
    }

    async fn patch_appointment_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let body = json!({
            "status": status,
            "updated_at": Utc::now().to_rfc3339()
        });
        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(Method::PATCH, &path, Some(auth_token), Some(body), Some(headers))
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        parse_single(rows, "appointment")
    }

    /// Recompute the derived group status after a child changed.
    async fn refresh_group_status(
        &self,
        group_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<AppointmentGroup>, AppointmentError> {
        let group = self.fetch_group(group_id, auth_token).await?;
        let children = self.fetch_children(group_id, auth_token).await?;
        let statuses: Vec<AppointmentStatus> = children.iter().map(|a| a.status).collect();

        let Some(derived) = derive_group_status(&statuses) else {
            return Ok(None);
        };
        if derived == group.status {
            return Ok(None);
        }

        let path = format!("/rest/v1/appointment_groups?id=eq.{}", group_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let body = json!({
            "status": derived,
            "updated_at": Utc::now().to_rfc3339()
        });
        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(Method::PATCH, &path, Some(auth_token), Some(body), Some(headers))
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        debug!("Group {} status derived as {}", group_id, derived);
        parse_single(rows, "group").map(Some)
    }

    /// Keep the group's span covering its children after a reschedule.
    async fn refresh_group_span(
        &self,
        group_id: Uuid,
        auth_token: &str,
    ) -> Result<(), AppointmentError> {
        let children = self.fetch_children(group_id, auth_token).await?;
        let active: Vec<&Appointment> = children
            .iter()
            .filter(|a| a.status != AppointmentStatus::Cancelled)
            .collect();

        let (Some(start), Some(end)) = (
            active.iter().map(|a| a.start_time).min(),
            active.iter().map(|a| a.end_time).max(),
        ) else {
            return Ok(());
        };

        let path = format!("/rest/v1/appointment_groups?id=eq.{}", group_id);
        let body = json!({
            "start_time": start.to_rfc3339(),
            "end_time": end.to_rfc3339(),
            "total_duration_minutes": (end - start).num_minutes(),
            "updated_at": Utc::now().to_rfc3339()
        });
        let _: Vec<Value> = self
            .supabase
            .request(Method::PATCH, &path, Some(auth_token), Some(body))
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    /// Commission emission is fire-and-forget: a failure is logged and never
    /// rolls back the completed appointment.
    async fn emit_commission(&self, appointment: &Appointment, auth_token: &str) {
        let request = CommissionRequest {
            professional_id: appointment.professional_id,
            appointment_id: appointment.id,
            service_price: appointment.price_at_booking,
            commission_percentage: self.commission_percent,
        };

        if let Err(e) = self.commission.create_for_appointment(request, auth_token).await {
            warn!(
                "Commission creation failed for appointment {}: {} (completion kept)",
                appointment.id, e
            );
        }
    }
}

fn authorize(
    appointment: &Appointment,
    action: LifecycleAction,
    actor: &Actor,
) -> Result<(), AppointmentError> {
    if !allowed_roles(action).contains(&actor.role) {
        return Err(AppointmentError::Unauthorized(format!(
            "Role {} may not {}",
            actor.role, action
        )));
    }

    match actor.role {
        Role::Professional if appointment.professional_id != actor.id => {
            Err(AppointmentError::Unauthorized(
                "Professionals may only act on their own appointments".to_string(),
            ))
        }
        Role::Client if appointment.client_id != actor.id => Err(AppointmentError::Unauthorized(
            "Clients may only act on their own appointments".to_string(),
        )),
        _ => Ok(()),
    }
}

fn authorize_reschedule(appointment: &Appointment, actor: &Actor) -> Result<(), AppointmentError> {
    match actor.role {
        Role::Manager | Role::Attendant => Ok(()),
        Role::Professional if appointment.professional_id == actor.id => Ok(()),
        Role::Client if appointment.client_id == actor.id => Ok(()),
        _ => Err(AppointmentError::Unauthorized(
            "Not authorized to reschedule this appointment".to_string(),
        )),
    }
}

fn authorize_group_cancel(group: &AppointmentGroup, actor: &Actor) -> Result<(), AppointmentError> {
    match actor.role {
        Role::Manager | Role::Attendant => Ok(()),
        Role::Client if group.client_id == actor.id => Ok(()),
        _ => Err(AppointmentError::Unauthorized(
            "Not authorized to cancel this group".to_string(),
        )),
    }
}

fn parse_single<T: serde::de::DeserializeOwned>(
    mut rows: Vec<Value>,
    what: &str,
) -> Result<T, AppointmentError> {
    if rows.is_empty() {
        return Err(AppointmentError::DatabaseError(format!("Failed to update {}", what)));
    }
    serde_json::from_value(rows.remove(0))
        .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse {}: {}", what, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use AppointmentStatus::*;

    #[test]
    fn cancel_is_denied_from_completed_and_cancelled() {
        for from in [Completed, Cancelled] {
            let err = plan_transition(from, LifecycleAction::Cancel).unwrap_err();
            assert!(matches!(err, AppointmentError::InvalidTransition { .. }));
        }
    }

    #[test]
    fn cancel_is_allowed_from_any_other_state() {
        for from in [Scheduled, WalkIn, Confirmed, Arrived, InService, PartiallyCompleted, ReadyToPay, NoShow] {
            assert_eq!(
                plan_transition(from, LifecycleAction::Cancel).unwrap(),
                TransitionPlan::Apply(Cancelled)
            );
        }
    }

    #[test]
    fn complete_is_denied_only_from_cancelled() {
        let err = plan_transition(Cancelled, LifecycleAction::Complete).unwrap_err();
        assert!(matches!(err, AppointmentError::InvalidTransition { .. }));

        for from in [Scheduled, WalkIn, Confirmed, Arrived, InService, PartiallyCompleted, ReadyToPay] {
            assert_eq!(
                plan_transition(from, LifecycleAction::Complete).unwrap(),
                TransitionPlan::Apply(Completed)
            );
        }
    }

    #[test]
    fn completing_twice_is_a_noop_not_an_error() {
        assert_eq!(
            plan_transition(Completed, LifecycleAction::Complete).unwrap(),
            TransitionPlan::AlreadyDone
        );
    }

    #[test]
    fn no_show_only_from_pre_arrival_states() {
        for from in [Scheduled, WalkIn, Confirmed] {
            assert_eq!(
                plan_transition(from, LifecycleAction::NoShow).unwrap(),
                TransitionPlan::Apply(NoShow)
            );
        }
        for from in [Arrived, InService, Completed, Cancelled] {
            assert!(plan_transition(from, LifecycleAction::NoShow).is_err());
        }
    }

    #[test]
    fn forward_path_follows_the_chain() {
        assert_eq!(plan_transition(Scheduled, LifecycleAction::Confirm).unwrap(), TransitionPlan::Apply(Confirmed));
        assert_eq!(plan_transition(WalkIn, LifecycleAction::Confirm).unwrap(), TransitionPlan::Apply(Confirmed));
        assert_eq!(plan_transition(Confirmed, LifecycleAction::Arrive).unwrap(), TransitionPlan::Apply(Arrived));
        assert_eq!(plan_transition(Arrived, LifecycleAction::StartService).unwrap(), TransitionPlan::Apply(InService));
        assert_eq!(plan_transition(InService, LifecycleAction::ReadyToPay).unwrap(), TransitionPlan::Apply(ReadyToPay));
        assert!(plan_transition(Scheduled, LifecycleAction::Arrive).is_err());
        assert!(plan_transition(Confirmed, LifecycleAction::StartService).is_err());
    }

    #[test]
    fn clients_may_cancel_but_not_complete() {
        assert!(allowed_roles(LifecycleAction::Cancel).contains(&Role::Client));
        assert!(!allowed_roles(LifecycleAction::Complete).contains(&Role::Client));
        assert!(!allowed_roles(LifecycleAction::Complete).contains(&Role::Attendant));
        assert!(allowed_roles(LifecycleAction::Complete).contains(&Role::Professional));
    }

    #[test]
    fn group_status_completes_only_when_all_active_children_complete() {
        assert_eq!(derive_group_status(&[Completed, Completed]), Some(Completed));
        assert_eq!(derive_group_status(&[Completed, Cancelled]), Some(Completed));
        assert_eq!(derive_group_status(&[Completed, InService]), Some(PartiallyCompleted));
        assert_eq!(derive_group_status(&[Confirmed, Scheduled]), None);
    }

    #[test]
    fn group_status_collapses_to_terminal_states() {
        assert_eq!(derive_group_status(&[Cancelled, Cancelled]), Some(Cancelled));
        assert_eq!(derive_group_status(&[NoShow, Cancelled]), Some(NoShow));
        assert_eq!(derive_group_status(&[]), None);
    }

    #[test]
    fn professional_ownership_is_enforced() {
        let professional_id = Uuid::new_v4();
        let appointment = test_appointment(professional_id, Uuid::new_v4());

        let own = Actor { id: professional_id, role: Role::Professional, email: None };
        assert!(authorize(&appointment, LifecycleAction::Complete, &own).is_ok());

        let other = Actor { id: Uuid::new_v4(), role: Role::Professional, email: None };
        assert!(matches!(
            authorize(&appointment, LifecycleAction::Complete, &other),
            Err(AppointmentError::Unauthorized(_))
        ));
    }

    #[test]
    fn client_ownership_is_enforced_for_cancel() {
        let client_id = Uuid::new_v4();
        let appointment = test_appointment(Uuid::new_v4(), client_id);

        let owner = Actor { id: client_id, role: Role::Client, email: None };
        assert!(authorize(&appointment, LifecycleAction::Cancel, &owner).is_ok());

        let stranger = Actor { id: Uuid::new_v4(), role: Role::Client, email: None };
        assert!(authorize(&appointment, LifecycleAction::Cancel, &stranger).is_err());
    }

    fn test_appointment(professional_id: Uuid, client_id: Uuid) -> Appointment {
        let start: chrono::DateTime<Utc> = "2025-06-02T09:00:00Z".parse().unwrap();
        Appointment {
            id: Uuid::new_v4(),
            group_id: Uuid::new_v4(),
            client_id,
            professional_id,
            service_id: Uuid::new_v4(),
            variation_id: None,
            appointment_date: start.date_naive(),
            start_time: start,
            end_time: start + chrono::Duration::minutes(60),
            duration_minutes: 60,
            price_at_booking: 80.0,
            status: Confirmed,
            notes: None,
            created_at: start,
            updated_at: start,
        }
    }
}
