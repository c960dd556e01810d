//! Principal derivation.
//!
//! The admin role is a server-enforced claim: it is minted only when the
//! request presents the server-held admin token. A client can never flip
//! itself into admin with a local flag — the store layer re-checks the role
//! on every privileged operation.
//!
//! Headers:
//! - `x-suds-user: <uuid>`           — acting account (customer identity)
//! - `authorization: Bearer <token>` — admin token, if the caller holds it

use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use suds_schemas::Principal;
use uuid::Uuid;

use crate::api_types::ErrorResponse;
use crate::state::AppState;

pub const USER_HEADER: &str = "x-suds-user";

/// Extractor handing the acting [`Principal`] to handlers.
pub struct Auth(pub Principal);

#[derive(Debug)]
pub enum AuthRejection {
    /// No identity at all.
    Missing,
    /// `x-suds-user` present but not a UUID.
    BadUserHeader,
    /// Bearer token presented but wrong, or admin minting is disabled.
    BadToken,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            AuthRejection::Missing => (
                StatusCode::UNAUTHORIZED,
                "missing credentials: set x-suds-user or a bearer token",
            ),
            AuthRejection::BadUserHeader => {
                (StatusCode::UNAUTHORIZED, "x-suds-user is not a valid UUID")
            }
            AuthRejection::BadToken => (StatusCode::FORBIDDEN, "admin token not accepted"),
        };
        (
            status,
            Json(ErrorResponse {
                error: msg.to_string(),
                kind: "authorization".to_string(),
            }),
        )
            .into_response()
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Auth {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user_id = match parts.headers.get(USER_HEADER) {
            Some(v) => {
                let raw = v.to_str().map_err(|_| AuthRejection::BadUserHeader)?;
                Some(Uuid::parse_str(raw).map_err(|_| AuthRejection::BadUserHeader)?)
            }
            None => None,
        };

        let bearer = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        match bearer {
            Some(token) => match &state.admin_token {
                // Admins keep their account identity when they send one, so
                // admin-created orders can still name an owner.
                Some(expected) if token == expected => Ok(Auth(Principal::admin(
                    user_id.unwrap_or_else(Uuid::nil),
                ))),
                // Wrong token, or no token configured: fail closed.
                _ => Err(AuthRejection::BadToken),
            },
            None => match user_id {
                Some(u) => Ok(Auth(Principal::customer(u))),
                None => Err(AuthRejection::Missing),
            },
        }
    }
}
