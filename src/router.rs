use std::sync::Arc;

use axum::{
    Router,
    extract::FromRef,
    middleware::from_fn_with_state,
    response::Redirect,
    routing::{get, post},
};
use axum_extra::extract::cookie::Key;

use crate::db::store::Store;
use crate::handlers::{admin, auth, student};
use crate::middleware::auth::{LOGIN_PATH, require_admin, require_auth};
use crate::service::password::CredentialVerifier;
use crate::views::{JsonRenderer, Renderer};

#[derive(Clone)]
pub struct PortalState {
    pub store: Arc<dyn Store>,
    pub verifier: CredentialVerifier,
    pub renderer: Arc<dyn Renderer>,
    pub session_ttl: chrono::Duration,
    pub secure_cookie: bool,
    cookie_key: Key,
}

impl PortalState {
    pub fn new(store: Arc<dyn Store>, verifier: CredentialVerifier, cookie_key: Key) -> Self {
        Self {
            store,
            verifier,
            renderer: Arc::new(JsonRenderer),
            session_ttl: chrono::Duration::hours(24),
            secure_cookie: true,
            cookie_key,
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_session_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn with_secure_cookie(mut self, secure: bool) -> Self {
        self.secure_cookie = secure;
        self
    }
}

impl FromRef<PortalState> for Key {
    fn from_ref(state: &PortalState) -> Self {
        state.cookie_key.clone()
    }
}

pub fn portal_router(state: PortalState) -> Router {
    let public: Router<PortalState> = Router::new()
        .route("/", get(|| async { Redirect::to(LOGIN_PATH) }))
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/logout", get(auth::logout));

    let students: Router<PortalState> = Router::new()
        .route("/dashboard", get(student::dashboard))
        .route("/enroll/{id}", post(student::enroll))
        .route("/unenroll/{id}", post(student::unenroll))
        .route("/course/{id}", get(student::course_page))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let admins: Router<PortalState> = Router::new()
        .route("/admin", get(admin::admin_panel))
        .route("/admin/course", post(admin::add_course))
        .route("/admin/course/edit/{id}", post(admin::edit_course))
        .route("/admin/course/delete/{id}", post(admin::delete_course))
        .route("/course/{id}/lesson", post(admin::add_lesson))
        .route_layer(from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .merge(public)
        .merge(students)
        .merge(admins)
        .with_state(state)
}
