// libs/appointment-cell/src/services/booking.rs
use chrono::{DateTime, Duration as ChronoDuration, Timelike, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::Actor;
use commission_cell::models::AuditEventType;
use commission_cell::services::audit::AuditService;
use professional_cell::services::availability::AvailabilityService;

use crate::models::{
    Appointment, AppointmentData, AppointmentError, AppointmentGroup, AppointmentSearchQuery,
    AppointmentStatus, BookGroupRequest, BookGroupResponse, LegSchedule, ServiceCalculation,
};
use crate::services::catalog::CatalogService;
use crate::services::clients::ClientResolverService;
use crate::services::pricing;
use crate::services::reservation::SlotReservationService;
use crate::services::stations::StationAllocationService;

/// Orchestrates a booking: resolve the client, price every requested
/// service, place the legs on the timeline, and persist the group with its
/// appointments as one unit under the slot locks.
pub struct AppointmentBookingService {
    supabase: Arc<SupabaseClient>,
    availability: AvailabilityService,
    catalog: CatalogService,
    clients: ClientResolverService,
    stations: StationAllocationService,
    reservations: SlotReservationService,
    audit: AuditService,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));

        Self {
            availability: AvailabilityService::new(config),
            catalog: CatalogService::new(Arc::clone(&supabase)),
            clients: ClientResolverService::new(Arc::clone(&supabase)),
            stations: StationAllocationService::new(Arc::clone(&supabase)),
            reservations: SlotReservationService::new(Arc::clone(&supabase)),
            audit: AuditService::new(config),
            supabase,
        }
    }

    /// Book a multi-service group. `walk_in` marks the same-day front-desk
    /// entry path, which starts the lifecycle at WALK_IN instead of SCHEDULED.
    pub async fn book_group(
        &self,
        request: BookGroupRequest,
        walk_in: bool,
        actor: &Actor,
        auth_token: &str,
    ) -> Result<BookGroupResponse, AppointmentError> {
        info!(
            "Booking group with {} services (walk_in: {})",
            request.services.len(),
            walk_in
        );

        validate_request(&request)?;

        let data = self.prepare(&request, walk_in, auth_token).await?;
        let legs = layout_legs(&data.calculations, data.start_time);

        // One lock per professional/interval; sorted so two requests
        // contending on the same set acquire in the same order.
        let mut lock_keys: Vec<String> = legs
            .iter()
            .map(|leg| {
                SlotReservationService::slot_lock_key(
                    leg.calculation.professional_id,
                    leg.start_time,
                    leg.end_time,
                )
            })
            .collect();
        lock_keys.sort();
        lock_keys.dedup();

        self.reservations.acquire_with_retry(&lock_keys).await?;

        let result = self.create_group_with_children(&data, &legs, auth_token).await;

        self.reservations.release(&lock_keys).await;

        let response = result?;

        self.audit
            .record(
                AuditEventType::GroupBooked,
                actor,
                response.group.id,
                json!({
                    "client_id": response.group.client_id,
                    "client_created": response.client_created,
                    "services": response.appointments.len(),
                    "total_price": response.group.total_price,
                    "walk_in": walk_in
                }),
                auth_token,
            )
            .await;

        info!(
            "Group {} booked with {} appointments",
            response.group.id,
            response.appointments.len()
        );
        Ok(response)
    }

    /// Resolve and price everything the booking needs before any write.
    pub async fn prepare(
        &self,
        request: &BookGroupRequest,
        walk_in: bool,
        auth_token: &str,
    ) -> Result<AppointmentData, AppointmentError> {
        let client = self.clients.resolve(&request.client, auth_token).await?;

        let mut service_ids: Vec<Uuid> = request.services.iter().filter_map(|e| e.service_id).collect();
        service_ids.sort();
        service_ids.dedup();
        let mut variation_ids: Vec<Uuid> =
            request.services.iter().filter_map(|e| e.variation_id).collect();
        variation_ids.sort();
        variation_ids.dedup();

        let services = self.catalog.load_services(&service_ids, auth_token).await?;
        let variations = self.catalog.load_variations(&variation_ids, auth_token).await?;

        let mut calculations: Vec<ServiceCalculation> = Vec::with_capacity(request.services.len());
        for entry in &request.services {
            let service_id = entry.service_id.ok_or_else(|| {
                AppointmentError::ValidationError("service_id is required".to_string())
            })?;
            let professional_id = entry.professional_id.ok_or_else(|| {
                AppointmentError::ValidationError("professional_id is required".to_string())
            })?;

            let service = services
                .get(&service_id)
                .ok_or(AppointmentError::ServiceNotFound(service_id))?;
            let variation = match entry.variation_id {
                Some(variation_id) => Some(
                    variations
                        .get(&variation_id)
                        .ok_or(AppointmentError::VariationNotFound(variation_id))?,
                ),
                None => None,
            };

            calculations.push(pricing::calculate(service, variation, professional_id));
        }

        if calculations.is_empty() {
            return Err(AppointmentError::ValidationError(
                "No valid services remain after resolution".to_string(),
            ));
        }

        let totals = pricing::group_totals(&calculations);

        // An explicit start time is authoritative; the truncated now() is
        // only the fallback for walk-ins booked without one.
        let start_time = match request.start_time {
            Some(start) => start,
            None => truncate_seconds(Utc::now()),
        };

        if walk_in && start_time.date_naive() != Utc::now().date_naive() {
            return Err(AppointmentError::ValidationError(
                "Walk-in bookings must start today".to_string(),
            ));
        }

        Ok(AppointmentData {
            client,
            calculations,
            totals,
            start_time,
            walk_in,
            notes: request.notes.clone(),
        })
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Fetching appointment {}", appointment_id);

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

    pub async fn get_group(
        &self,
        group_id: Uuid,
        auth_token: &str,
    ) -> Result<(AppointmentGroup, Vec<Appointment>), AppointmentError> {
        debug!("Fetching appointment group {}", group_id);

        let path = format!("/rest/v1/appointment_groups?id=eq.{}", group_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let Some(row) = result.into_iter().next() else {
            return Err(AppointmentError::GroupNotFound);
        };
        let group: AppointmentGroup = serde_json::from_value(row)
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse group: {}", e)))?;

        let children = self.list_group_appointments(group_id, auth_token).await?;
        Ok((group, children))
    }

    pub async fn list_group_appointments(
        &self,
        group_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?group_id=eq.{}&order=start_time.asc",
            group_id
        );
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

    pub async fn search_appointments(
        &self,
        query: AppointmentSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        debug!("Searching appointments with filters: {:?}", query);

        let mut query_parts = Vec::new();

        if let Some(client_id) = query.client_id {
            query_parts.push(format!("client_id=eq.{}", client_id));
        }
        if let Some(professional_id) = query.professional_id {
            query_parts.push(format!("professional_id=eq.{}", professional_id));
        }
        if let Some(group_id) = query.group_id {
            query_parts.push(format!("group_id=eq.{}", group_id));
        }
        if let Some(status) = query.status {
            query_parts.push(format!("status=eq.{}", status));
        }
        if let Some(from_date) = query.from_date {
            query_parts.push(format!("appointment_date=gte.{}", from_date));
        }
        if let Some(to_date) = query.to_date {
            query_parts.push(format!("appointment_date=lte.{}", to_date));
        }

        query_parts.push(format!("limit={}", query.limit.unwrap_or(50)));
        query_parts.push(format!("offset={}", query.offset.unwrap_or(0)));

        let path = format!(
            "/rest/v1/appointments?{}&order=start_time.asc",
            query_parts.join("&")
        );

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

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    /// Runs under the slot locks: final availability and station checks, then
    /// the group insert, the bulk child insert and the station reservations.
    /// Any failure compensates everything written so far.
    async fn create_group_with_children(
        &self,
        data: &AppointmentData,
        legs: &[LegSchedule],
        auth_token: &str,
    ) -> Result<BookGroupResponse, AppointmentError> {
        // Legs in this request are not persisted yet, so the availability
        // read cannot see them; overlapping legs on one professional must be
        // rejected here.
        if legs_overlap_per_professional(legs) {
            return Err(AppointmentError::SlotUnavailable);
        }

        for leg in legs {
            let free = self
                .availability
                .is_interval_free(
                    leg.calculation.professional_id,
                    leg.start_time,
                    leg.end_time,
                    None,
                    auth_token,
                )
                .await?;

            if !free {
                warn!(
                    "Slot {} - {} not available for professional {}",
                    leg.start_time, leg.end_time, leg.calculation.professional_id
                );
                return Err(AppointmentError::SlotUnavailable);
            }
        }

        let mut allocations: Vec<Vec<Uuid>> = Vec::with_capacity(legs.len());
        for leg in legs {
            let stations = self
                .stations
                .allocate(leg.calculation.service_id, leg.start_time, leg.end_time, auth_token)
                .await?;
            allocations.push(stations);
        }

        let Some(group_end) = legs.iter().map(|leg| leg.end_time).max() else {
            return Err(AppointmentError::ValidationError(
                "No valid services remain after resolution".to_string(),
            ));
        };
        let span_minutes = (group_end - data.start_time).num_minutes() as i32;
        let initial_status = if data.walk_in {
            AppointmentStatus::WalkIn
        } else {
            AppointmentStatus::Scheduled
        };

        // Id generated here so the children can reference the group within
        // the same request.
        let group_id = Uuid::new_v4();
        let now = Utc::now();
        let group_row = json!({
            "id": group_id,
            "client_id": data.client.client.id,
            "start_time": data.start_time.to_rfc3339(),
            "end_time": group_end.to_rfc3339(),
            "total_duration_minutes": span_minutes,
            "total_price": data.totals.total_price,
            "status": initial_status,
            "walk_in": data.walk_in,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let group_rows = self
            .supabase
            .insert_returning("/rest/v1/appointment_groups", Some(auth_token), group_row)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;
        let group: AppointmentGroup = parse_single(group_rows, "group")?;

        let appointment_ids: Vec<Uuid> = legs.iter().map(|_| Uuid::new_v4()).collect();
        let appointment_rows: Vec<Value> = legs
            .iter()
            .zip(&appointment_ids)
            .map(|(leg, id)| {
                json!({
                    "id": id,
                    "group_id": group_id,
                    "client_id": data.client.client.id,
                    "professional_id": leg.calculation.professional_id,
                    "service_id": leg.calculation.service_id,
                    "variation_id": leg.calculation.variation_id,
                    "appointment_date": leg.start_time.date_naive(),
                    "start_time": leg.start_time.to_rfc3339(),
                    "end_time": leg.end_time.to_rfc3339(),
                    "duration_minutes": leg.calculation.duration.total,
                    "price_at_booking": leg.calculation.price.final_price,
                    "status": initial_status,
                    "notes": data.notes,
                    "created_at": now.to_rfc3339(),
                    "updated_at": now.to_rfc3339()
                })
            })
            .collect();

        // One array POST: all children insert in a single statement
        let inserted = match self
            .supabase
            .insert_returning("/rest/v1/appointments", Some(auth_token), Value::Array(appointment_rows))
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                self.rollback_booking(group_id, &appointment_ids, auth_token).await;
                return Err(if SupabaseClient::is_conflict_error(&e) {
                    AppointmentError::ConflictDetected
                } else {
                    AppointmentError::DatabaseError(e.to_string())
                });
            }
        };

        let appointments: Vec<Appointment> = match inserted
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
        {
            Ok(appointments) => appointments,
            Err(e) => {
                self.rollback_booking(group_id, &appointment_ids, auth_token).await;
                return Err(AppointmentError::DatabaseError(format!(
                    "Failed to parse appointments: {}",
                    e
                )));
            }
        };

        for (appointment, stations) in appointments.iter().zip(&allocations) {
            if let Err(e) = self
                .stations
                .reserve(appointment.id, stations, appointment.start_time, appointment.end_time, auth_token)
                .await
            {
                self.rollback_booking(group_id, &appointment_ids, auth_token).await;
                return Err(e);
            }
        }

        Ok(BookGroupResponse {
            group,
            appointments,
            client_created: data.client.was_created,
        })
    }

    /// Compensating deletes for a booking that failed half-way. Only rows
    /// written by this request are touched.
    async fn rollback_booking(&self, group_id: Uuid, appointment_ids: &[Uuid], auth_token: &str) {
        warn!("Rolling back partial booking for group {}", group_id);

        if !appointment_ids.is_empty() {
            let ids = appointment_ids
                .iter()
                .map(Uuid::to_string)
                .collect::<Vec<_>>()
                .join(",");
            let reservations_path = format!("/rest/v1/appointment_stations?appointment_id=in.({})", ids);
            if let Err(e) = self
                .supabase
                .request::<Vec<Value>>(Method::DELETE, &reservations_path, Some(auth_token), None)
                .await
            {
                warn!("Rollback of station reservations failed: {}", e);
            }
        }

        let appointments_path = format!("/rest/v1/appointments?group_id=eq.{}", group_id);
        if let Err(e) = self
            .supabase
            .request::<Vec<Value>>(Method::DELETE, &appointments_path, Some(auth_token), None)
            .await
        {
            warn!("Rollback of appointments failed: {}", e);
        }

        let group_path = format!("/rest/v1/appointment_groups?id=eq.{}", group_id);
        if let Err(e) = self
            .supabase
            .request::<Vec<Value>>(Method::DELETE, &group_path, Some(auth_token), None)
            .await
        {
            warn!("Rollback of group failed: {}", e);
        }
    }
}

/// Shape validation before anything is loaded or written.
pub fn validate_request(request: &BookGroupRequest) -> Result<(), AppointmentError> {
    if request.services.is_empty() {
        return Err(AppointmentError::ValidationError(
            "At least one service is required".to_string(),
        ));
    }

    for (index, entry) in request.services.iter().enumerate() {
        if entry.service_id.is_none() {
            return Err(AppointmentError::ValidationError(format!(
                "services[{}] is missing service_id",
                index
            )));
        }
        if entry.professional_id.is_none() {
            return Err(AppointmentError::ValidationError(format!(
                "services[{}] is missing professional_id",
                index
            )));
        }
    }

    Ok(())
}

/// Place legs on the timeline: sequential legs back-to-back in execution
/// order, flexible legs overlapping from the group start.
pub fn layout_legs(calculations: &[ServiceCalculation], start: DateTime<Utc>) -> Vec<LegSchedule> {
    let mut ordered: Vec<&ServiceCalculation> = calculations.iter().collect();
    ordered.sort_by_key(|c| c.execution_order);

    let mut legs = Vec::with_capacity(calculations.len());
    let mut cursor = start;

    for calculation in ordered {
        let duration = ChronoDuration::minutes(calculation.duration.total as i64);
        let (leg_start, leg_end) = if calculation.execution_flexible {
            (start, start + duration)
        } else {
            let leg = (cursor, cursor + duration);
            cursor = leg.1;
            leg
        };

        legs.push(LegSchedule {
            calculation: calculation.clone(),
            start_time: leg_start,
            end_time: leg_end,
        });
    }

    legs
}

/// True when two legs of the same request claim the same professional at
/// overlapping times.
pub fn legs_overlap_per_professional(legs: &[LegSchedule]) -> bool {
    for (i, a) in legs.iter().enumerate() {
        for b in &legs[i + 1..] {
            if a.calculation.professional_id == b.calculation.professional_id
                && a.start_time < b.end_time
                && b.start_time < a.end_time
            {
                return true;
            }
        }
    }
    false
}

pub fn truncate_seconds(time: DateTime<Utc>) -> DateTime<Utc> {
    time.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(time)
}

fn parse_single<T: serde::de::DeserializeOwned>(
    mut rows: Vec<Value>,
    what: &str,
) -> Result<T, AppointmentError> {
    if rows.is_empty() {
        return Err(AppointmentError::DatabaseError(format!("Failed to create {}", what)));
    }
    serde_json::from_value(rows.remove(0))
        .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse {}: {}", what, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ServiceDuration, ServicePrice};

    fn calculation(order: i32, flexible: bool, minutes: i32) -> ServiceCalculation {
        ServiceCalculation {
            service_id: Uuid::new_v4(),
            variation_id: None,
            professional_id: Uuid::new_v4(),
            price: ServicePrice { base: 50.0, variation_delta: 0.0, final_price: 50.0 },
            duration: ServiceDuration {
                base: minutes,
                processing: 0,
                finishing: 0,
                variation_delta: 0,
                total: minutes,
            },
            execution_order: order,
            execution_flexible: flexible,
        }
    }

    fn start() -> DateTime<Utc> {
        "2025-06-02T09:00:00Z".parse().unwrap()
    }

    #[test]
    fn sequential_legs_run_back_to_back_in_execution_order() {
        let legs = layout_legs(
            &[calculation(2, false, 30), calculation(1, false, 60)],
            start(),
        );

        // Order 1 first, 60 minutes, then order 2 for 30
        assert_eq!(legs[0].start_time, start());
        assert_eq!(legs[0].end_time, start() + ChronoDuration::minutes(60));
        assert_eq!(legs[1].start_time, legs[0].end_time);
        assert_eq!(legs[1].end_time, legs[1].start_time + ChronoDuration::minutes(30));
    }

    #[test]
    fn flexible_legs_overlap_from_group_start() {
        let legs = layout_legs(
            &[calculation(1, false, 60), calculation(2, true, 45)],
            start(),
        );

        assert_eq!(legs[1].start_time, start());
        assert_eq!(legs[1].end_time, start() + ChronoDuration::minutes(45));
        // The sequential chain is unaffected by the flexible leg
        assert_eq!(legs[0].end_time, start() + ChronoDuration::minutes(60));
    }

    #[test]
    fn group_span_equals_duration_sum_when_sequential() {
        let calcs = [calculation(1, false, 90), calculation(2, false, 30), calculation(3, false, 15)];
        let legs = layout_legs(&calcs, start());

        let group_end = legs.iter().map(|l| l.end_time).max().unwrap();
        assert_eq!((group_end - start()).num_minutes(), 135);
    }

    #[test]
    fn overlapping_flexible_legs_on_one_professional_are_detected() {
        let professional_id = Uuid::new_v4();
        let mut first = calculation(1, true, 60);
        let mut second = calculation(2, true, 45);
        first.professional_id = professional_id;
        second.professional_id = professional_id;

        let legs = layout_legs(&[first, second], start());
        assert!(legs_overlap_per_professional(&legs));

        // Different professionals may overlap freely
        let legs = layout_legs(&[calculation(1, true, 60), calculation(2, true, 45)], start());
        assert!(!legs_overlap_per_professional(&legs));
    }

    #[test]
    fn empty_service_list_fails_validation() {
        let request = BookGroupRequest {
            client: Default::default(),
            services: vec![],
            start_time: None,
            notes: None,
        };

        assert!(matches!(
            validate_request(&request),
            Err(AppointmentError::ValidationError(_))
        ));
    }

    #[test]
    fn entry_without_professional_fails_validation() {
        let request = BookGroupRequest {
            client: Default::default(),
            services: vec![crate::models::ServiceBookingEntry {
                service_id: Some(Uuid::new_v4()),
                professional_id: None,
                variation_id: None,
            }],
            start_time: None,
            notes: None,
        };

        assert!(matches!(
            validate_request(&request),
            Err(AppointmentError::ValidationError(_))
        ));
    }

    #[test]
    fn truncate_seconds_zeroes_the_clock_tail() {
        let time: DateTime<Utc> = "2025-06-02T09:15:42.123Z".parse().unwrap();
        assert_eq!(truncate_seconds(time), "2025-06-02T09:15:00Z".parse::<DateTime<Utc>>().unwrap());
    }
}
