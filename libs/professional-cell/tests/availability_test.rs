// Integration tests for the availability engine against a mocked PostgREST
// backend. Dates are chosen so 2025-06-02 is a Monday.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use professional_cell::models::SchedulingError;
use professional_cell::services::availability::AvailabilityService;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

const TOKEN: &str = "test-token";

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
}

fn dt(date: NaiveDate, h: u32, m: u32) -> DateTime<Utc> {
    date.and_hms_opt(h, m, 0).unwrap().and_utc()
}

async fn service_for(mock_server: &MockServer) -> AvailabilityService {
    let config = TestConfig::with_base_url(&mock_server.uri()).to_app_config();
    AvailabilityService::new(&config)
}

/// Monday 09:00-17:00 window with a 12:00-13:00 lunch break.
async fn mount_monday_schedule(mock_server: &MockServer, professional_id: &str) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/professional_availability"))
        .and(query_param("professional_id", format!("eq.{}", professional_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::availability_response(professional_id, 1, "09:00:00", "17:00:00")
        ])))
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/professional_breaks"))
        .and(query_param("professional_id", format!("eq.{}", professional_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::break_response(professional_id, 1, "12:00:00", "13:00:00", "Lunch")
        ])))
        .mount(mock_server)
        .await;
}

async fn mount_empty(mock_server: &MockServer, table: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/rest/v1/{}", table)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn slots_skip_the_lunch_break() {
    let mock_server = MockServer::start().await;
    let professional_id = Uuid::new_v4();

    mount_monday_schedule(&mock_server, &professional_id.to_string()).await;
    mount_empty(&mock_server, "professional_blocked_times").await;
    mount_empty(&mock_server, "appointments").await;

    let service = service_for(&mock_server).await;
    let slots = service
        .get_available_slots(professional_id, monday(), 60, Some(60), None, TOKEN)
        .await
        .unwrap();

    let starts: Vec<DateTime<Utc>> = slots.iter().map(|s| s.start_time).collect();
    assert!(starts.contains(&dt(monday(), 9, 0)));
    assert!(starts.contains(&dt(monday(), 13, 0)));
    // Nothing may start inside or run into the break
    assert!(!starts.contains(&dt(monday(), 12, 0)));
    assert!(starts.iter().all(|s| *s != dt(monday(), 11, 30)));
}

#[tokio::test]
async fn booking_hour_at_open_is_free_but_break_overlap_is_not() {
    let mock_server = MockServer::start().await;
    let professional_id = Uuid::new_v4();

    mount_monday_schedule(&mock_server, &professional_id.to_string()).await;
    mount_empty(&mock_server, "professional_blocked_times").await;
    mount_empty(&mock_server, "appointments").await;

    let service = service_for(&mock_server).await;

    // 09:00-10:00 fits inside the morning window
    let free = service
        .is_interval_free(professional_id, dt(monday(), 9, 0), dt(monday(), 10, 0), None, TOKEN)
        .await
        .unwrap();
    assert!(free);

    // 12:15-12:45 lands inside the lunch break
    let blocked = service
        .is_interval_free(professional_id, dt(monday(), 12, 15), dt(monday(), 12, 45), None, TOKEN)
        .await
        .unwrap();
    assert!(!blocked);
}

#[tokio::test]
async fn day_off_zeroes_the_whole_day() {
    let mock_server = MockServer::start().await;
    let professional_id = Uuid::new_v4();

    mount_monday_schedule(&mock_server, &professional_id.to_string()).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/professional_blocked_times"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": Uuid::new_v4().to_string(),
                "professional_id": professional_id.to_string(),
                "block_date": "2025-06-02",
                "block_type": "day_off",
                "start_time": null,
                "end_time": null,
                "reason": "Vacation"
            }
        ])))
        .mount(&mock_server)
        .await;
    mount_empty(&mock_server, "appointments").await;

    let service = service_for(&mock_server).await;
    let slots = service
        .get_available_slots(professional_id, monday(), 30, None, None, TOKEN)
        .await
        .unwrap();

    assert!(slots.is_empty());
}

#[tokio::test]
async fn blocked_slot_removes_only_its_interval() {
    let mock_server = MockServer::start().await;
    let professional_id = Uuid::new_v4();

    mount_monday_schedule(&mock_server, &professional_id.to_string()).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/professional_blocked_times"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": Uuid::new_v4().to_string(),
                "professional_id": professional_id.to_string(),
                "block_date": "2025-06-02",
                "block_type": "blocked_slot",
                "start_time": "09:00:00",
                "end_time": "10:00:00",
                "reason": "Training"
            }
        ])))
        .mount(&mock_server)
        .await;
    mount_empty(&mock_server, "appointments").await;

    let service = service_for(&mock_server).await;

    let blocked = service
        .is_interval_free(professional_id, dt(monday(), 9, 0), dt(monday(), 10, 0), None, TOKEN)
        .await
        .unwrap();
    assert!(!blocked);

    let free = service
        .is_interval_free(professional_id, dt(monday(), 10, 0), dt(monday(), 11, 0), None, TOKEN)
        .await
        .unwrap();
    assert!(free);
}

#[tokio::test]
async fn booked_appointments_occupy_their_interval() {
    let mock_server = MockServer::start().await;
    let professional_id = Uuid::new_v4();

    mount_monday_schedule(&mock_server, &professional_id.to_string()).await;
    mount_empty(&mock_server, "professional_blocked_times").await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": Uuid::new_v4().to_string(),
                "professional_id": professional_id.to_string(),
                "appointment_date": "2025-06-02",
                "start_time": "2025-06-02T09:00:00Z",
                "end_time": "2025-06-02T10:30:00Z",
                "status": "confirmed"
            }
        ])))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server).await;

    let taken = service
        .is_interval_free(professional_id, dt(monday(), 10, 0), dt(monday(), 11, 0), None, TOKEN)
        .await
        .unwrap();
    assert!(!taken);

    let free = service
        .is_interval_free(professional_id, dt(monday(), 10, 30), dt(monday(), 11, 30), None, TOKEN)
        .await
        .unwrap();
    assert!(free);
}

#[tokio::test]
async fn no_windows_means_zero_capacity() {
    let mock_server = MockServer::start().await;
    let professional_id = Uuid::new_v4();

    mount_empty(&mock_server, "professional_availability").await;
    mount_empty(&mock_server, "professional_breaks").await;
    mount_empty(&mock_server, "professional_blocked_times").await;
    mount_empty(&mock_server, "appointments").await;

    let service = service_for(&mock_server).await;
    let slots = service
        .get_available_slots(professional_id, monday(), 30, None, None, TOKEN)
        .await
        .unwrap();

    assert!(slots.is_empty());
}

#[tokio::test]
async fn month_calendar_flags_working_days_only() {
    let mock_server = MockServer::start().await;
    let professional_id = Uuid::new_v4();

    // Works Mondays only, June 2025
    mount_monday_schedule(&mock_server, &professional_id.to_string()).await;
    mount_empty(&mock_server, "professional_blocked_times").await;
    mount_empty(&mock_server, "appointments").await;

    let service = service_for(&mock_server).await;
    let calendar = service
        .month_availability(professional_id, 2025, 6, 60, TOKEN)
        .await
        .unwrap();

    assert_eq!(calendar.len(), 30);

    let mondays = [2, 9, 16, 23, 30];
    for day in calendar {
        let expected = mondays.contains(&day.date.day());
        assert_eq!(day.has_slots, expected, "unexpected flag for {}", day.date);
    }
}

#[tokio::test]
async fn zero_duration_is_rejected() {
    let mock_server = MockServer::start().await;
    let professional_id = Uuid::new_v4();

    let service = service_for(&mock_server).await;
    let err = service
        .get_available_slots(professional_id, monday(), 0, None, None, TOKEN)
        .await
        .unwrap_err();

    assert!(matches!(err, SchedulingError::ValidationError(_)));
}
