use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response, StatusCode, header},
};
use axum_extra::extract::cookie::Key;
use edu_portal::db::models::CourseDraft;
use edu_portal::db::{CourseRepository, EnrollmentLedger, Role, SqliteStore, UserRepository};
use edu_portal::service::{accounts, password::CredentialVerifier};
use edu_portal::{PortalState, portal_router};
use serde_json::Value;
use std::{
    path::PathBuf,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};
use tower::ServiceExt;

struct TestApp {
    app: Router,
    store: SqliteStore,
    path: PathBuf,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", self.path.display()));
        }
    }
}

async fn spawn_app() -> TestApp {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!(
        "edu-portal-test-{}-{}.sqlite",
        std::process::id(),
        nanos
    ));

    let store = SqliteStore::connect(&format!("sqlite:{}", path.display()))
        .await
        .expect("failed to open database");
    store.init_schema().await.expect("failed to init schema");

    let verifier = CredentialVerifier::new(1024, 1, 1).expect("bad argon2 params");
    accounts::bootstrap_admin(&store, &verifier, "admin@edu.com", "admin123")
        .await
        .expect("bootstrap failed");

    let state = PortalState::new(Arc::new(store.clone()), verifier, Key::generate())
        .with_secure_cookie(false);
    TestApp {
        app: portal_router(state),
        store,
        path,
    }
}

impl TestApp {
    async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(req).await.expect("request failed")
    }

    async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(c) = cookie {
            builder = builder.header(header::COOKIE, c);
        }
        self.send(builder.body(Body::empty()).expect("failed to build request"))
            .await
    }

    async fn post_form(&self, uri: &str, form: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(c) = cookie {
            builder = builder.header(header::COOKIE, c);
        }
        self.send(
            builder
                .body(Body::from(form.to_string()))
                .expect("failed to build request"),
        )
        .await
    }

    async fn register(&self, email: &str, password: &str, name: &str) {
        let form = format!("email={email}&password={password}&name={name}");
        let resp = self.post_form("/register", &form, None).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&resp), "/login");
    }

    /// Logs in and returns the `Cookie` header value for later requests.
    async fn login(&self, email: &str, password: &str) -> String {
        let form = format!("email={email}&password={password}");
        let resp = self.post_form("/login", &form, None).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        session_cookie(&resp).expect("login did not set a session cookie")
    }

    async fn course_id(&self, title: &str) -> i64 {
        self.store
            .list_courses()
            .await
            .expect("list courses")
            .into_iter()
            .find(|c| c.title == title)
            .map(|c| c.id)
            .expect("course not found")
    }

    async fn enrollment_rows(&self, course_id: i64) -> i64 {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM enrollments WHERE course_id = ?")
            .bind(course_id)
            .fetch_one(self.store.pool())
            .await
            .expect("count enrollments");
        n
    }
}

fn location(resp: &Response<Body>) -> String {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn session_cookie(resp: &Response<Body>) -> Option<String> {
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("portal_session="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

async fn json_body(resp: Response<Body>) -> Value {
    let body = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    serde_json::from_slice(&body).expect("response body was not json")
}

fn titles(list: &Value) -> Vec<String> {
    list.as_array()
        .expect("expected a list")
        .iter()
        .map(|c| c["title"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn register_then_login_issues_session() {
    let t = spawn_app().await;
    t.register("a@x.com", "pw1", "Alice").await;

    let resp = t
        .post_form("/login", "email=a@x.com&password=wrong", None)
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/login?error=invalid_credentials");
    assert!(session_cookie(&resp).is_none());

    // unknown email gets the same answer
    let resp = t
        .post_form("/login", "email=nobody@x.com&password=pw1", None)
        .await;
    assert_eq!(location(&resp), "/login?error=invalid_credentials");

    let resp = t.post_form("/login", "email=a@x.com&password=pw1", None).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/dashboard");
    let cookie = session_cookie(&resp).expect("missing session cookie");

    let resp = t.get("/dashboard", Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["view"], "dashboard");
    assert_eq!(body["data"]["user_name"], "Alice");
}

#[tokio::test]
async fn registration_errors_redirect_back_to_form() {
    let t = spawn_app().await;
    t.register("a@x.com", "pw1", "Alice").await;

    let resp = t
        .post_form("/register", "email=a@x.com&password=pw2&name=Other", None)
        .await;
    assert_eq!(location(&resp), "/register?error=email_taken");

    let resp = t
        .post_form("/register", "email=b@x.com&password=&name=Bob", None)
        .await;
    assert_eq!(location(&resp), "/register?error=missing_fields");
}

#[tokio::test]
async fn anonymous_requests_are_sent_to_login() {
    let t = spawn_app().await;
    for uri in ["/dashboard", "/course/1", "/admin"] {
        let resp = t.get(uri, None).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER, "{uri}");
        assert_eq!(location(&resp), "/login", "{uri}");
    }
    let resp = t.post_form("/enroll/1", "", None).await;
    assert_eq!(location(&resp), "/login");

    // a forged cookie is just anonymous
    let resp = t.get("/dashboard", Some("portal_session=1")).await;
    assert_eq!(location(&resp), "/login");
}

#[tokio::test]
async fn enrolling_moves_course_between_lists() {
    let t = spawn_app().await;
    let admin = t.login("admin@edu.com", "admin123").await;
    let resp = t
        .post_form("/admin/course", "title=Intro&description=Basics&link=", Some(&admin))
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/admin");
    let intro = t.course_id("Intro").await;

    t.register("a@x.com", "pw1", "Alice").await;
    t.register("b@x.com", "pw2", "Bob").await;
    let alice = t.login("a@x.com", "pw1").await;
    let bob = t.login("b@x.com", "pw2").await;

    for cookie in [&alice, &bob] {
        let body = json_body(t.get("/dashboard", Some(cookie)).await).await;
        assert_eq!(titles(&body["data"]["available_courses"]), vec!["Intro"]);
        assert!(titles(&body["data"]["my_courses"]).is_empty());
    }

    let resp = t
        .post_form(&format!("/enroll/{intro}"), "", Some(&alice))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["view"], "course_enrolled");

    // repeat enroll is a no-op
    let resp = t
        .post_form(&format!("/enroll/{intro}"), "", Some(&alice))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(t.enrollment_rows(intro).await, 1);

    let body = json_body(t.get("/dashboard", Some(&alice)).await).await;
    assert_eq!(titles(&body["data"]["my_courses"]), vec!["Intro"]);
    assert!(titles(&body["data"]["available_courses"]).is_empty());
    assert_eq!(body["data"]["my_count"], 1);
    assert_eq!(body["data"]["available_count"], 0);

    let body = json_body(t.get("/dashboard", Some(&bob)).await).await;
    assert_eq!(titles(&body["data"]["available_courses"]), vec!["Intro"]);

    for _ in 0..2 {
        let resp = t
            .post_form(&format!("/unenroll/{intro}"), "", Some(&alice))
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["view"], "course_available");
    }
    assert_eq!(t.enrollment_rows(intro).await, 0);

    let resp = t.post_form("/enroll/9999", "", Some(&alice)).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn students_cannot_reach_admin_routes() {
    let t = spawn_app().await;
    t.register("a@x.com", "pw1", "Alice").await;
    let alice = t.login("a@x.com", "pw1").await;

    let resp = t
        .post_form("/admin/course", "title=Sneaky&link=", Some(&alice))
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert!(t.store.list_courses().await.unwrap().is_empty());

    let resp = t.get("/admin", Some(&alice)).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn role_changes_apply_on_next_request() {
    let t = spawn_app().await;
    t.register("a@x.com", "pw1", "Alice").await;
    let alice = t.login("a@x.com", "pw1").await;
    let user = t
        .store
        .find_user_by_email("a@x.com")
        .await
        .unwrap()
        .expect("user exists");

    assert_eq!(t.get("/admin", Some(&alice)).await.status(), StatusCode::FORBIDDEN);

    assert!(t.store.set_role(user.id, Role::Admin).await.unwrap());
    assert_eq!(t.get("/admin", Some(&alice)).await.status(), StatusCode::OK);

    assert!(t.store.set_role(user.id, Role::Student).await.unwrap());
    assert_eq!(t.get("/admin", Some(&alice)).await.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn lessons_keep_creation_order() {
    let t = spawn_app().await;
    let admin = t.login("admin@edu.com", "admin123").await;
    t.post_form("/admin/course", "title=Rust&link=", Some(&admin))
        .await;
    let rust = t.course_id("Rust").await;

    for title in ["Ownership", "Borrowing", "Lifetimes"] {
        let resp = t
            .post_form(
                &format!("/course/{rust}/lesson"),
                &format!("title={title}&content=text"),
                Some(&admin),
            )
            .await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&resp), format!("/course/{rust}"));
    }

    let body = json_body(t.get(&format!("/course/{rust}"), Some(&admin)).await).await;
    assert_eq!(body["view"], "course");
    assert_eq!(body["data"]["is_admin"], true);
    let lessons = body["data"]["lessons"].as_array().expect("lessons list");
    let order: Vec<(String, i64)> = lessons
        .iter()
        .map(|l| {
            (
                l["title"].as_str().unwrap_or_default().to_string(),
                l["order_num"].as_i64().unwrap_or_default(),
            )
        })
        .collect();
    assert_eq!(
        order,
        vec![
            ("Ownership".to_string(), 1),
            ("Borrowing".to_string(), 2),
            ("Lifetimes".to_string(), 3),
        ]
    );

    let resp = t
        .post_form("/course/9999/lesson", "title=Orphan", Some(&admin))
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_course_removes_its_enrollments() {
    let t = spawn_app().await;
    let admin = t.login("admin@edu.com", "admin123").await;
    t.post_form("/admin/course", "title=Doomed&link=", Some(&admin))
        .await;
    let doomed = t.course_id("Doomed").await;
    t.post_form(
        &format!("/course/{doomed}/lesson"),
        "title=Only",
        Some(&admin),
    )
    .await;

    t.register("a@x.com", "pw1", "Alice").await;
    let alice = t.login("a@x.com", "pw1").await;
    t.post_form(&format!("/enroll/{doomed}"), "", Some(&alice))
        .await;
    assert_eq!(t.enrollment_rows(doomed).await, 1);

    let resp = t
        .post_form(&format!("/admin/course/delete/{doomed}"), "", Some(&admin))
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(t.enrollment_rows(doomed).await, 0);
    assert!(t.store.list_lessons(doomed).await.unwrap().is_empty());

    let resp = t.get(&format!("/course/{doomed}"), Some(&alice)).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let body = json_body(t.get("/dashboard", Some(&alice)).await).await;
    assert!(titles(&body["data"]["my_courses"]).is_empty());
    assert!(titles(&body["data"]["available_courses"]).is_empty());
}

#[tokio::test]
async fn course_edit_requires_title() {
    let t = spawn_app().await;
    let admin = t.login("admin@edu.com", "admin123").await;
    t.post_form("/admin/course", "title=Old&link=", Some(&admin))
        .await;
    let id = t.course_id("Old").await;

    let resp = t
        .post_form(&format!("/admin/course/edit/{id}"), "title=&link=", Some(&admin))
        .await;
    assert_eq!(location(&resp), "/admin?error=missing_fields");

    let resp = t
        .post_form(
            &format!("/admin/course/edit/{id}"),
            "title=New&description=d&link=https%3A%2F%2Fexample.com",
            Some(&admin),
        )
        .await;
    assert_eq!(location(&resp), "/admin");
    let course = t.store.find_course(id).await.unwrap().expect("course");
    assert_eq!(course.title, "New");
    assert_eq!(course.external_link, "https://example.com");
}

#[tokio::test]
async fn logout_invalidates_session() {
    let t = spawn_app().await;
    t.register("a@x.com", "pw1", "Alice").await;
    let alice = t.login("a@x.com", "pw1").await;
    assert_eq!(t.get("/dashboard", Some(&alice)).await.status(), StatusCode::OK);

    let resp = t.get("/logout", Some(&alice)).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/login");

    // the old cookie value no longer maps to a session
    let resp = t.get("/dashboard", Some(&alice)).await;
    assert_eq!(location(&resp), "/login");
}

#[tokio::test]
async fn admin_login_lands_on_admin_panel() {
    let t = spawn_app().await;
    let resp = t
        .post_form("/login", "email=admin@edu.com&password=admin123", None)
        .await;
    assert_eq!(location(&resp), "/admin");
    let cookie = session_cookie(&resp).expect("cookie");
    let body = json_body(t.get("/admin", Some(&cookie)).await).await;
    assert_eq!(body["view"], "admin");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_enrolls_store_one_row() {
    let t = spawn_app().await;
    t.register("a@x.com", "pw1", "Alice").await;
    let alice = t
        .store
        .find_user_by_email("a@x.com")
        .await
        .unwrap()
        .expect("user")
        .id;
    let intro = t
        .store
        .create_course(CourseDraft {
            title: "Intro".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let store = t.store.clone();
            tokio::spawn(async move { store.enroll(alice, intro).await })
        })
        .collect();

    let mut added = 0;
    for handle in handles {
        if handle.await.expect("enroll task panicked").expect("enroll failed") {
            added += 1;
        }
    }
    assert_eq!(added, 1);
    assert_eq!(t.enrollment_rows(intro).await, 1);
}
