//! Request/response bodies for the HTTP API.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::NewTask;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    /// Token expiry, unix seconds.
    pub exp: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    /// Client-generated id the optimistic entry carried. The response
    /// returns the server-assigned id; later mutations may use either.
    #[serde(default)]
    pub temp_id: Option<Uuid>,
    #[serde(flatten)]
    pub task: NewTask,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
