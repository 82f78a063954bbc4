//! Identity supplied by the upstream auth proxy.
//!
//! The proxy authenticates the visitor and forwards their user id in the
//! `X-User-Id` header. Nothing here verifies credentials, so the proxy must
//! strip any `X-User-Id` sent by the client and set its own. The CORS policy
//! never lets browsers on other origins send the header.

use std::future::{ready, Ready};

use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpRequest};
use tb_core::error::AppError;
use uuid::Uuid;

use crate::error::ApiError;

pub const USER_HEADER: &str = "x-user-id";

/// The authenticated user id. Use `Option<CurrentUser>` for pages that
/// also serve signed-out visitors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub Uuid);

impl FromRequest for CurrentUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(user_from_headers(req))
    }
}

fn user_from_headers(req: &HttpRequest) -> Result<CurrentUser, ApiError> {
    let value = req
        .headers()
        .get(USER_HEADER)
        .ok_or_else(|| AppError::Unauthorized("sign in required".into()))?;

    value
        .to_str()
        .ok()
        .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
        .map(CurrentUser)
        .ok_or_else(|| AppError::Unauthorized("malformed user id".into()).into())
}
