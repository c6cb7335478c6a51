// libs/appointment-cell/src/services/stations.rs
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{AppointmentError, StationReservation};
use crate::services::catalog::CatalogService;

/// Finds and reserves the physical stations a service needs for the duration
/// of an appointment. Runs under the booking slot locks, so the free check
/// and the reservation insert cannot interleave with a competing booking.
pub struct StationAllocationService {
    supabase: Arc<SupabaseClient>,
    catalog: CatalogService,
}

impl StationAllocationService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        let catalog = CatalogService::new(Arc::clone(&supabase));
        Self { supabase, catalog }
    }

    /// Pick free stations for every requirement of the service, first-fit by
    /// label. Services without requirements allocate nothing.
    pub async fn allocate(
        &self,
        service_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Vec<Uuid>, AppointmentError> {
        let requirements = self
            .catalog
            .load_station_requirements(&[service_id], auth_token)
            .await?;
        let Some(requirements) = requirements.get(&service_id) else {
            return Ok(vec![]);
        };

        let mut allocated = Vec::new();
        for requirement in requirements {
            let stations = self
                .catalog
                .load_stations_of_type(requirement.station_type_id, auth_token)
                .await?;

            let station_ids: Vec<Uuid> = stations.iter().map(|s| s.id).collect();
            let busy = self
                .reserved_station_ids(&station_ids, start_time, end_time, auth_token)
                .await?;

            let mut picked = 0;
            for station in &stations {
                if picked >= requirement.qty {
                    break;
                }
                if !busy.contains(&station.id) {
                    allocated.push(station.id);
                    picked += 1;
                }
            }

            if picked < requirement.qty {
                debug!(
                    "Only {}/{} free stations of type {} between {} and {}",
                    picked, requirement.qty, requirement.station_type_id, start_time, end_time
                );
                return Err(AppointmentError::StationUnavailable);
            }
        }

        Ok(allocated)
    }

    /// Persist reservation rows linking the appointment to its stations.
    /// The array body inserts as one statement.
    pub async fn reserve(
        &self,
        appointment_id: Uuid,
        station_ids: &[Uuid],
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<(), AppointmentError> {
        if station_ids.is_empty() {
            return Ok(());
        }

        let rows: Vec<Value> = station_ids
            .iter()
            .map(|station_id| {
                json!({
                    "id": Uuid::new_v4(),
                    "appointment_id": appointment_id,
                    "station_id": station_id,
                    "start_time": start_time.to_rfc3339(),
                    "end_time": end_time.to_rfc3339()
                })
            })
            .collect();

        self.supabase
            .insert_returning("/rest/v1/appointment_stations", Some(auth_token), Value::Array(rows))
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    /// Current reservations held by an appointment.
    pub async fn list_for_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<StationReservation>, AppointmentError> {
        let path = format!("/rest/v1/appointment_stations?appointment_id=eq.{}", appointment_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<StationReservation>, _>>()
            .map_err(|e| {
                AppointmentError::DatabaseError(format!("Failed to parse reservations: {}", e))
            })
    }

    /// Free the stations held by an appointment (cancellation, reschedule).
    pub async fn release_for_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<(), AppointmentError> {
        let path = format!("/rest/v1/appointment_stations?appointment_id=eq.{}", appointment_id);
        let result: Result<Vec<Value>, _> = self
            .supabase
            .request(Method::DELETE, &path, Some(auth_token), None)
            .await;

        if let Err(e) = result {
            warn!("Failed to release stations for appointment {}: {}", appointment_id, e);
            return Err(AppointmentError::DatabaseError(e.to_string()));
        }

        Ok(())
    }

    async fn reserved_station_ids(
        &self,
        station_ids: &[Uuid],
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<HashSet<Uuid>, AppointmentError> {
        if station_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let ids = station_ids
            .iter()
            .map(Uuid::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let path = format!(
            "/rest/v1/appointment_stations?station_id=in.({})&start_time=lt.{}&end_time=gt.{}",
            ids,
            urlencoding::encode(&end_time.to_rfc3339()),
            urlencoding::encode(&start_time.to_rfc3339())
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let reservations: Vec<StationReservation> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<StationReservation>, _>>()
            .map_err(|e| {
                AppointmentError::DatabaseError(format!("Failed to parse reservations: {}", e))
            })?;

        Ok(reservations.into_iter().map(|r| r.station_id).collect())
    }
}
