use std::sync::Arc;

use axum::{
    extract::Request,
    http::header,
    middleware::Next,
    response::IntoResponse,
    Extension,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ErrorMessage, HttpError},
    utils::token,
    AppState,
};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OperatorRole {
    Admin,
    SuperAdmin,
}

impl OperatorRole {
    pub fn parse(role: &str) -> Option<OperatorRole> {
        match role.trim().to_lowercase().as_str() {
            "admin" => Some(OperatorRole::Admin),
            "super_admin" | "superadmin" => Some(OperatorRole::SuperAdmin),
            _ => None,
        }
    }
}

/// The authenticated caller of an operator endpoint.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OperatorAuth {
    pub operator_id: String,
    pub role: Option<OperatorRole>,
}

pub async fn auth(
    cookie_jar: CookieJar,
    Extension(app_state): Extension<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, HttpError> {
    let token = cookie_jar
        .get("token")
        .map(|cookie| cookie.value().to_string())
        .or_else(|| {
            req.headers()
                .get(header::AUTHORIZATION)
                .and_then(|auth_header| auth_header.to_str().ok())
                .and_then(|auth_value| auth_value.strip_prefix("Bearer "))
                .map(|token| token.trim().to_owned())
        })
        .filter(|token| !token.is_empty());

    let token = token.ok_or_else(|| {
        HttpError::unauthorized(ErrorMessage::TokenNotProvided.to_string())
    })?;

    let claims = token::decode_token(token, app_state.env.jwt_secret.as_bytes())?;

    req.extensions_mut().insert(OperatorAuth {
        operator_id: claims.sub,
        role: OperatorRole::parse(&claims.role),
    });

    Ok(next.run(req).await)
}

pub async fn role_check(
    Extension(_app_state): Extension<Arc<AppState>>,
    req: Request,
    next: Next,
    required_roles: Vec<OperatorRole>,
) -> Result<impl IntoResponse, HttpError> {
    let operator = req
        .extensions()
        .get::<OperatorAuth>()
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::TokenNotProvided.to_string()))?;

    let allowed = operator
        .role
        .map(|role| required_roles.contains(&role))
        .unwrap_or(false);

    if !allowed {
        tracing::warn!("Operator {} denied access to {}", operator.operator_id, req.uri().path());
        return Err(HttpError::forbidden(ErrorMessage::PermissionDenied.to_string()));
    }

    Ok(next.run(req).await)
}
