use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use chrono::Utc;
use serde::Deserialize;
use time::Duration;
use tracing::{info, warn};

use crate::error::PortalError;
use crate::handlers::{ErrorQuery, redirect_with_error};
use crate::middleware::auth::{LOGIN_PATH, SESSION_COOKIE};
use crate::router::PortalState;
use crate::service::{accounts, session};
use crate::views::{FormView, Page};

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
}

pub async fn login_page(State(state): State<PortalState>, Query(q): Query<ErrorQuery>) -> Response {
    state.renderer.render(Page::Login(FormView { error: q.error }))
}

pub async fn register_page(
    State(state): State<PortalState>,
    Query(q): Query<ErrorQuery>,
) -> Response {
    state
        .renderer
        .render(Page::Register(FormView { error: q.error }))
}

/// POST /register -> creates a student account and sends the user to the login page.
pub async fn register(State(state): State<PortalState>, Form(form): Form<RegisterForm>) -> Redirect {
    let registration = accounts::Registration {
        email: form.email,
        password: form.password,
        display_name: form.name,
    };
    match accounts::register(&*state.store, &state.verifier, registration).await {
        Ok(_) => Redirect::to(LOGIN_PATH),
        Err(err) => redirect_with_error("/register", &err),
    }
}

/// POST /login -> issues a session cookie and redirects by role.
pub async fn login(
    State(state): State<PortalState>,
    jar: PrivateCookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    let user = match accounts::authenticate(
        &*state.store,
        &state.verifier,
        &form.email,
        &form.password,
    )
    .await
    {
        Ok(user) => user,
        Err(err) => {
            if matches!(err, PortalError::InvalidCredentials) {
                warn!("login rejected");
            }
            return redirect_with_error(LOGIN_PATH, &err).into_response();
        }
    };

    // a fresh login replaces whatever session the browser carried
    if let Some(old) = jar.get(SESSION_COOKIE)
        && let Err(e) = session::revoke(&*state.store, old.value()).await
    {
        warn!(error = %e, "failed to revoke previous session");
    }

    let token = match session::issue(
        &*state.store,
        user.id,
        state.session_ttl,
        Utc::now(),
    )
    .await
    {
        Ok(token) => token,
        Err(err) => return redirect_with_error(LOGIN_PATH, &err).into_response(),
    };

    info!(user_id = user.id, role = user.role.as_str(), "user logged in");
    let jar = jar.add(session_cookie(&state, token.into_inner()));
    let target = if user.role.is_admin() {
        "/admin"
    } else {
        "/dashboard"
    };
    (jar, Redirect::to(target)).into_response()
}

/// GET /logout -> drops the server-side session and clears the cookie.
pub async fn logout(State(state): State<PortalState>, jar: PrivateCookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        match session::revoke(&*state.store, cookie.value()).await {
            Ok(()) => info!("user logged out"),
            Err(e) => warn!(error = %e, "failed to revoke session on logout"),
        }
    }
    let jar = jar.remove(clear_cookie(SESSION_COOKIE));
    (jar, Redirect::to(LOGIN_PATH)).into_response()
}

fn session_cookie(state: &PortalState, token: String) -> Cookie<'static> {
    Cookie::build(Cookie::new(SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(state.secure_cookie)
        .same_site(SameSite::Lax)
        .max_age(Duration::seconds(state.session_ttl.num_seconds()))
        .build()
}

fn clear_cookie(name: &str) -> Cookie<'static> {
    Cookie::build(Cookie::new(name.to_string(), ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}
