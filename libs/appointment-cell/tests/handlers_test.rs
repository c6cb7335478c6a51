// Role gating at the HTTP handler layer. These rejections fire before any
// backend call, so no mock server is needed.

use axum::extract::{Extension, Path, State};
use axum::Json;
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use uuid::Uuid;

use appointment_cell::handlers;
use appointment_cell::models::{BookGroupRequest, ClientData, ServiceBookingEntry};
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::test_utils::{TestConfig, TestUser};

fn auth_header() -> TypedHeader<Authorization<Bearer>> {
    TypedHeader(Authorization::bearer("test-token").unwrap())
}

fn user_extension(user: &TestUser) -> Extension<User> {
    Extension(user.to_user())
}

fn request_for(client_id: Uuid) -> BookGroupRequest {
    BookGroupRequest {
        client: ClientData {
            id: Some(client_id),
            ..Default::default()
        },
        services: vec![ServiceBookingEntry {
            service_id: Some(Uuid::new_v4()),
            professional_id: Some(Uuid::new_v4()),
            variation_id: None,
        }],
        start_time: None,
        notes: None,
    }
}

#[tokio::test]
async fn clients_cannot_book_for_other_clients() {
    let state = TestConfig::default().to_arc();
    let client = TestUser::client("maria@example.com");

    let result = handlers::book_group(
        State(state),
        auth_header(),
        user_extension(&client),
        Json(request_for(Uuid::new_v4())),
    )
    .await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn professionals_cannot_create_bookings() {
    let state = TestConfig::default().to_arc();
    let professional = TestUser::professional("ana@salon.test");

    let result = handlers::book_group(
        State(state),
        auth_header(),
        user_extension(&professional),
        Json(request_for(Uuid::new_v4())),
    )
    .await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn walk_ins_are_front_desk_only() {
    let state = TestConfig::default().to_arc();
    let client_id = Uuid::new_v4();
    let client = TestUser::with_id(client_id, "maria@example.com", "client");

    let result = handlers::book_walk_in(
        State(state),
        auth_header(),
        user_extension(&client),
        Json(request_for(client_id)),
    )
    .await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn unknown_roles_are_rejected() {
    let state = TestConfig::default().to_arc();
    let stranger = TestUser::new("who@example.com", "janitor");

    let result = handlers::book_group(
        State(state),
        auth_header(),
        user_extension(&stranger),
        Json(request_for(Uuid::new_v4())),
    )
    .await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
}
