// libs/appointment-cell/src/services/catalog.rs
use reqwest::Method;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{AppointmentError, Service, ServiceStationRequirement, ServiceVariation, Station};

/// Batch loaders over the catalog tables. Every loader fetches its whole id
/// set in one `in.(…)` query and returns an id-keyed map, so request handling
/// never falls into per-entry lookups.
pub struct CatalogService {
    supabase: Arc<SupabaseClient>,
}

impl CatalogService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn load_services(
        &self,
        ids: &[Uuid],
        auth_token: &str,
    ) -> Result<HashMap<Uuid, Service>, AppointmentError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        debug!("Batch loading {} services", ids.len());

        let path = format!("/rest/v1/services?id=in.({})&active=eq.true", join_ids(ids));
        let services: Vec<Service> = self.fetch_parsed(&path, auth_token, "services").await?;

        Ok(services.into_iter().map(|s| (s.id, s)).collect())
    }

    pub async fn load_variations(
        &self,
        ids: &[Uuid],
        auth_token: &str,
    ) -> Result<HashMap<Uuid, ServiceVariation>, AppointmentError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        debug!("Batch loading {} variations", ids.len());

        let path = format!("/rest/v1/service_variations?id=in.({})", join_ids(ids));
        let variations: Vec<ServiceVariation> =
            self.fetch_parsed(&path, auth_token, "variations").await?;

        Ok(variations.into_iter().map(|v| (v.id, v)).collect())
    }

    pub async fn load_station_requirements(
        &self,
        service_ids: &[Uuid],
        auth_token: &str,
    ) -> Result<HashMap<Uuid, Vec<ServiceStationRequirement>>, AppointmentError> {
        if service_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let path = format!(
            "/rest/v1/service_station_requirements?service_id=in.({})",
            join_ids(service_ids)
        );
        let requirements: Vec<ServiceStationRequirement> =
            self.fetch_parsed(&path, auth_token, "station requirements").await?;

        let mut by_service: HashMap<Uuid, Vec<ServiceStationRequirement>> = HashMap::new();
        for requirement in requirements {
            by_service.entry(requirement.service_id).or_default().push(requirement);
        }
        Ok(by_service)
    }

    /// Stations of a type in deterministic first-fit order (by label).
    pub async fn load_stations_of_type(
        &self,
        station_type_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Station>, AppointmentError> {
        let path = format!(
            "/rest/v1/stations?station_type_id=eq.{}&active=eq.true&order=label.asc",
            station_type_id
        );
        self.fetch_parsed(&path, auth_token, "stations").await
    }

    async fn fetch_parsed<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        auth_token: &str,
        what: &str,
    ) -> Result<Vec<T>, AppointmentError> {
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<T>, _>>()
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse {}: {}", what, e)))
    }
}

fn join_ids(ids: &[Uuid]) -> String {
    ids.iter()
        .map(Uuid::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
