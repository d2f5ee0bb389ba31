use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::PrivateCookieJar;
use chrono::Utc;
use tracing::warn;

use crate::db::models::{Role, UserId};
use crate::error::PortalError;
use crate::router::PortalState;
use crate::service::session::{self, Identity};

pub const SESSION_COOKIE: &str = "portal_session";
pub const LOGIN_PATH: &str = "/login";

/// Identity attached to requests that passed the gate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurrentUser {
    pub user_id: UserId,
}

#[derive(Debug)]
pub enum GateRejection {
    /// Anonymous caller; sent to the login page.
    LoginRequired,
    /// Authenticated but not an admin.
    Forbidden,
    Internal(PortalError),
}

impl IntoResponse for GateRejection {
    fn into_response(self) -> Response {
        match self {
            GateRejection::LoginRequired => Redirect::to(LOGIN_PATH).into_response(),
            GateRejection::Forbidden => PortalError::Forbidden.into_response(),
            GateRejection::Internal(e) => e.into_response(),
        }
    }
}

/// First tier: the session cookie must resolve to a user.
pub async fn authenticate(
    state: &PortalState,
    jar: &PrivateCookieJar,
) -> Result<CurrentUser, GateRejection> {
    let token = jar.get(SESSION_COOKIE).map(|c| c.value().to_owned());
    let identity = session::resolve(&*state.store, token.as_deref(), Utc::now())
        .await
        .map_err(GateRejection::Internal)?;
    match identity {
        Identity::Anonymous => Err(GateRejection::LoginRequired),
        Identity::Authenticated { user_id, .. } => Ok(CurrentUser { user_id }),
    }
}

/// Second tier: the role is read from the store on every call, so a role
/// change applies to the very next request.
pub async fn authorize_admin(
    state: &PortalState,
    user: &CurrentUser,
) -> Result<(), GateRejection> {
    match state
        .store
        .user_role(user.user_id)
        .await
        .map_err(GateRejection::Internal)?
    {
        Some(Role::Admin) => Ok(()),
        role => {
            warn!(user_id = user.user_id, ?role, "admin route denied");
            Err(GateRejection::Forbidden)
        }
    }
}

/// `auth` guard: anonymous callers are redirected to the login page.
pub async fn require_auth(
    State(state): State<PortalState>,
    jar: PrivateCookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    match authenticate(&state, &jar).await {
        Ok(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Err(rejection) => rejection.into_response(),
    }
}

/// `authAdmin` guard: `auth` plus a live admin role check (403 otherwise).
pub async fn require_admin(
    State(state): State<PortalState>,
    jar: PrivateCookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let user = match authenticate(&state, &jar).await {
        Ok(user) => user,
        Err(rejection) => return rejection.into_response(),
    };
    if let Err(rejection) = authorize_admin(&state, &user).await {
        return rejection.into_response();
    }
    req.extensions_mut().insert(user);
    next.run(req).await
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = GateRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .copied()
            .ok_or(GateRejection::LoginRequired)
    }
}
