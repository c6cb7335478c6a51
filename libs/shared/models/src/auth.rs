use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Role claims the salon backend understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Manager,
    Attendant,
    Professional,
    Client,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "manager" | "admin" => Some(Role::Manager),
            "attendant" | "receptionist" => Some(Role::Attendant),
            "professional" => Some(Role::Professional),
            "client" => Some(Role::Client),
            _ => None,
        }
    }

    /// Managers and attendants run the front desk.
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Manager | Role::Attendant)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Manager => write!(f, "manager"),
            Role::Attendant => write!(f, "attendant"),
            Role::Professional => write!(f, "professional"),
            Role::Client => write!(f, "client"),
        }
    }
}

/// The identity a lifecycle transition or booking is performed as. Passed
/// explicitly into services so authorization never depends on ambient state.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
    pub email: Option<String>,
}

impl Actor {
    pub fn from_user(user: &User) -> Option<Self> {
        let id = Uuid::parse_str(&user.id).ok()?;
        let role = Role::parse(user.role.as_deref()?)?;
        Some(Self {
            id,
            role,
            email: user.email.clone(),
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub valid: bool,
    pub user_id: String,
    pub email: Option<String>,
    pub role: Option<String>,
}
