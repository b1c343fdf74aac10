use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, patch, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::extract::{AppJson, AppPath, AppQuery};
use crate::middleware::{Admin, OwnAccount};
use crate::models::{
    user::{NewUser, UserPatch},
    Role, UpdateResult, User,
};
use crate::store::UserFilter;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", post(upsert_user).get(list_users).patch(update_profile))
        .route("/users/role", get(get_own_role))
        .route("/members", get(list_members))
        .route("/members/{id}", delete(remove_member))
        .route("/anyUser/role", patch(set_user_role))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpsertUserRequest {
    #[validate(length(min = 1, message = "email is required"))]
    pub email: String,
    pub name: Option<String>,
    pub photo: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
}

// POST /users
// First sign-in creates a plain `user`; later sign-ins only touch last_login.
// Roles change only through booking approval or /anyUser/role.
pub async fn upsert_user(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<UpsertUserRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;
    let last_login = req.last_login.unwrap_or_else(Utc::now);

    if state.store.find_user_by_email(&req.email).await?.is_some() {
        let update = state.store.set_last_login(&req.email, last_login).await?;
        let mut body = serde_json::to_value(update).map_err(anyhow::Error::from)?;
        body["message"] = json!("user already exists");
        body["inserted"] = json!(false);
        return Ok((StatusCode::OK, Json(body)));
    }

    let result = state
        .store
        .insert_user(NewUser {
            email: req.email,
            name: req.name,
            photo: req.photo,
            role: Role::User,
            last_login,
        })
        .await?;
    tracing::info!("user {} created", result.inserted_id);
    let body = serde_json::to_value(result).map_err(anyhow::Error::from)?;
    Ok((StatusCode::CREATED, Json(body)))
}

// GET /users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    _admin: Admin,
    AppQuery(query): AppQuery<SearchQuery>,
) -> AppResult<Json<Vec<User>>> {
    let users = state
        .store
        .list_users(&UserFilter { role: None, search: query.search })
        .await?;
    Ok(Json(users))
}

#[derive(Debug, Serialize)]
pub struct RoleResponse {
    pub role: Option<Role>,
}

// GET /users/role?email=
pub async fn get_own_role(
    State(state): State<Arc<AppState>>,
    caller: OwnAccount,
) -> AppResult<Json<RoleResponse>> {
    let user = state.store.find_user_by_email(caller.email()).await?;
    Ok(Json(RoleResponse { role: user.map(|u| u.role) }))
}

// PATCH /users?email=
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    caller: OwnAccount,
    AppJson(patch): AppJson<UserPatch>,
) -> AppResult<impl IntoResponse> {
    let result = state.store.update_user(caller.email(), patch).await?;
    Ok(Json(result))
}

// GET /members
pub async fn list_members(
    State(state): State<Arc<AppState>>,
    _admin: Admin,
    AppQuery(query): AppQuery<SearchQuery>,
) -> AppResult<Json<Vec<User>>> {
    let members = state
        .store
        .list_users(&UserFilter { role: Some(Role::Member), search: query.search })
        .await?;
    Ok(Json(members))
}

// DELETE /members/{id}
// Membership is revoked, the account itself is kept. Non-members are left alone.
pub async fn remove_member(
    State(state): State<Arc<AppState>>,
    _admin: Admin,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<impl IntoResponse> {
    let user = state.store.find_user(id).await?;
    let Some(user) = user.filter(|u| u.role == Role::Member) else {
        return Ok(Json(UpdateResult::unmatched()));
    };
    let result = state.store.set_role(&user.email, Role::User, None).await?;
    tracing::info!("member {} demoted to user", user.email);
    Ok(Json(result))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetRoleRequest {
    #[validate(length(min = 1, message = "email is required"))]
    pub email: String,
    pub role: String,
}

// PATCH /anyUser/role
pub async fn set_user_role(
    State(state): State<Arc<AppState>>,
    _admin: Admin,
    AppJson(req): AppJson<SetRoleRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;
    let role: Role = req.role.parse().map_err(AppError::BadRequest)?;

    let since = state
        .store
        .find_user_by_email(&req.email)
        .await?
        .and_then(|u| u.member_since);
    let member_since = match role {
        Role::User => None,
        Role::Member => since.or_else(|| Some(Utc::now())),
        Role::Admin => since,
    };
    let result = state.store.set_role(&req.email, role, member_since).await?;
    Ok(Json(result))
}
