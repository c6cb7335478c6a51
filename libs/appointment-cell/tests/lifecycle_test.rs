// Integration tests for lifecycle transitions against a mocked PostgREST
// backend: side-effect ordering, idempotent completion, terminal states.

use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::models::{AppointmentError, LifecycleAction};
use appointment_cell::services::lifecycle::AppointmentLifecycleService;
use shared_models::auth::{Actor, Role};
use shared_utils::test_utils::TestConfig;

const TOKEN: &str = "test-token";

fn manager() -> Actor {
    Actor {
        id: Uuid::new_v4(),
        role: Role::Manager,
        email: Some("manager@salon.test".to_string()),
    }
}

fn appointment_row(
    id: Uuid,
    group_id: Uuid,
    professional_id: Uuid,
    client_id: Uuid,
    status: &str,
) -> serde_json::Value {
    json!({
        "id": id,
        "group_id": group_id,
        "client_id": client_id,
        "professional_id": professional_id,
        "service_id": Uuid::new_v4(),
        "variation_id": null,
        "appointment_date": "2025-06-02",
        "start_time": "2025-06-02T09:00:00Z",
        "end_time": "2025-06-02T10:00:00Z",
        "duration_minutes": 60,
        "price_at_booking": 80.0,
        "status": status,
        "notes": null,
        "created_at": "2025-06-01T00:00:00Z",
        "updated_at": "2025-06-01T00:00:00Z"
    })
}

fn group_row(group_id: Uuid, client_id: Uuid, status: &str) -> serde_json::Value {
    json!({
        "id": group_id,
        "client_id": client_id,
        "start_time": "2025-06-02T09:00:00Z",
        "end_time": "2025-06-02T10:00:00Z",
        "total_duration_minutes": 60,
        "total_price": 80.0,
        "status": status,
        "walk_in": false,
        "created_at": "2025-06-01T00:00:00Z",
        "updated_at": "2025-06-01T00:00:00Z"
    })
}

async fn service_for(mock_server: &MockServer) -> AppointmentLifecycleService {
    let config = TestConfig::with_base_url(&mock_server.uri()).to_app_config();
    AppointmentLifecycleService::new(&config)
}

async fn mount_audit(mock_server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/rest/v1/audit_events"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{}])))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn completing_an_appointment_creates_one_commission() {
    let mock_server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();
    let group_id = Uuid::new_v4();
    let professional_id = Uuid::new_v4();
    let client_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            appointment_row(appointment_id, group_id, professional_id, client_id, "ready_to_pay")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            appointment_row(appointment_id, group_id, professional_id, client_id, "completed")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointment_groups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            group_row(group_id, client_id, "confirmed")
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("group_id", format!("eq.{}", group_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            appointment_row(appointment_id, group_id, professional_id, client_id, "completed")
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointment_groups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            group_row(group_id, client_id, "completed")
        ])))
        .mount(&mock_server)
        .await;

    // No commission yet; exactly one insert expected
    Mock::given(method("GET"))
        .and(path("/rest/v1/commissions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/commissions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "appointment_id": appointment_id,
            "professional_id": professional_id,
            "service_price": 80.0,
            "commission_percentage": 40.0,
            "amount": 32.0,
            "created_at": "2025-06-02T10:00:00Z"
        }])))
        .expect(1)
        .mount(&mock_server)
        .await;

    mount_audit(&mock_server).await;

    let service = service_for(&mock_server).await;
    let updated = service
        .transition(appointment_id, LifecycleAction::Complete, &manager(), TOKEN)
        .await
        .unwrap();

    assert_eq!(updated.status.to_string(), "completed");
}

#[tokio::test]
async fn recompleting_a_completed_appointment_is_a_noop() {
    let mock_server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();
    let group_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            appointment_row(appointment_id, group_id, Uuid::new_v4(), Uuid::new_v4(), "completed")
        ])))
        .mount(&mock_server)
        .await;

    // The no-op must neither update anything nor duplicate the commission
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/commissions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{}])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server).await;
    let result = service
        .transition(appointment_id, LifecycleAction::Complete, &manager(), TOKEN)
        .await
        .unwrap();

    assert_eq!(result.status.to_string(), "completed");
}

#[tokio::test]
async fn cancelling_a_completed_appointment_is_a_state_error() {
    let mock_server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            appointment_row(appointment_id, Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), "completed")
        ])))
        .mount(&mock_server)
        .await;

    // Status must remain untouched
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server).await;
    let err = service
        .transition(appointment_id, LifecycleAction::Cancel, &manager(), TOKEN)
        .await
        .unwrap_err();

    assert!(matches!(err, AppointmentError::InvalidTransition { .. }));
}

#[tokio::test]
async fn professionals_cannot_complete_someone_elses_appointment() {
    let mock_server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            appointment_row(appointment_id, Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), "ready_to_pay")
        ])))
        .mount(&mock_server)
        .await;

    let other_professional = Actor {
        id: Uuid::new_v4(),
        role: Role::Professional,
        email: None,
    };

    let service = service_for(&mock_server).await;
    let err = service
        .transition(appointment_id, LifecycleAction::Complete, &other_professional, TOKEN)
        .await
        .unwrap_err();

    assert!(matches!(err, AppointmentError::Unauthorized(_)));
}

#[tokio::test]
async fn commission_failure_does_not_fail_completion() {
    let mock_server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();
    let group_id = Uuid::new_v4();
    let professional_id = Uuid::new_v4();
    let client_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            appointment_row(appointment_id, group_id, professional_id, client_id, "in_service")
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            appointment_row(appointment_id, group_id, professional_id, client_id, "completed")
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointment_groups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            group_row(group_id, client_id, "completed")
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("group_id", format!("eq.{}", group_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            appointment_row(appointment_id, group_id, professional_id, client_id, "completed")
        ])))
        .mount(&mock_server)
        .await;

    // The commission subsystem is down
    Mock::given(method("GET"))
        .and(path("/rest/v1/commissions"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "boom"})))
        .mount(&mock_server)
        .await;

    mount_audit(&mock_server).await;

    let service = service_for(&mock_server).await;
    let updated = service
        .transition(appointment_id, LifecycleAction::Complete, &manager(), TOKEN)
        .await
        .unwrap();

    assert_eq!(updated.status.to_string(), "completed");
}
