use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use commission_cell::models::CommissionRequest;
use commission_cell::services::commission::CommissionService;
use shared_utils::test_utils::TestConfig;

const TOKEN: &str = "test-token";

fn request(appointment_id: Uuid) -> CommissionRequest {
    CommissionRequest {
        professional_id: Uuid::new_v4(),
        appointment_id,
        service_price: 105.0,
        commission_percentage: 40.0,
    }
}

#[tokio::test]
async fn first_completion_inserts_a_commission() {
    let mock_server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/commissions"))
        .and(query_param("appointment_id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/commissions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "appointment_id": appointment_id,
            "professional_id": Uuid::new_v4(),
            "service_price": 105.0,
            "commission_percentage": 40.0,
            "amount": 42.0,
            "created_at": "2025-06-02T10:00:00Z"
        }])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_base_url(&mock_server.uri()).to_app_config();
    let service = CommissionService::new(&config);

    service.create_for_appointment(request(appointment_id), TOKEN).await.unwrap();
}

#[tokio::test]
async fn existing_commission_is_never_duplicated() {
    let mock_server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/commissions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "appointment_id": appointment_id,
            "professional_id": Uuid::new_v4(),
            "service_price": 105.0,
            "commission_percentage": 40.0,
            "amount": 42.0,
            "created_at": "2025-06-02T10:00:00Z"
        }])))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/commissions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{}])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_base_url(&mock_server.uri()).to_app_config();
    let service = CommissionService::new(&config);

    service.create_for_appointment(request(appointment_id), TOKEN).await.unwrap();
}
