//! View models handed to the rendering layer.
//!
//! Handlers build one struct per page; a [`Renderer`] turns the resulting
//! [`Page`] into a response. Markup lives outside this crate.

use axum::Json;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::db::models::{Course, CourseId, Lesson, LessonId, UserId};
use crate::service::catalog::{CatalogPartition, CourseDetail};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CourseSummary {
    pub id: CourseId,
    pub title: String,
}

impl From<&Course> for CourseSummary {
    fn from(c: &Course) -> Self {
        Self {
            id: c.id,
            title: c.title.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FormView {
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub user_id: UserId,
    pub user_name: String,
    pub my_courses: Vec<CourseSummary>,
    pub available_courses: Vec<CourseSummary>,
    pub my_count: usize,
    pub available_count: usize,
}

impl DashboardView {
    pub fn new(user_id: UserId, user_name: String, partition: &CatalogPartition) -> Self {
        let my_courses: Vec<CourseSummary> =
            partition.enrolled.iter().map(CourseSummary::from).collect();
        let available_courses: Vec<CourseSummary> =
            partition.available.iter().map(CourseSummary::from).collect();
        Self {
            user_id,
            user_name,
            my_count: my_courses.len(),
            available_count: available_courses.len(),
            my_courses,
            available_courses,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LessonView {
    pub id: LessonId,
    pub title: String,
    pub content: String,
    pub order_num: i64,
}

impl From<Lesson> for LessonView {
    fn from(l: Lesson) -> Self {
        Self {
            id: l.id,
            title: l.title,
            content: l.content,
            order_num: l.order_num,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CourseView {
    pub course_id: CourseId,
    pub course_title: String,
    pub description: String,
    pub link: String,
    pub lessons: Vec<LessonView>,
    pub is_admin: bool,
    pub is_enrolled: bool,
}

impl CourseView {
    pub fn new(detail: CourseDetail, is_admin: bool) -> Self {
        Self {
            course_id: detail.course.id,
            course_title: detail.course.title,
            description: detail.course.description,
            link: detail.course.external_link,
            lessons: detail.lessons.into_iter().map(LessonView::from).collect(),
            is_admin,
            is_enrolled: detail.is_enrolled,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminView {
    pub courses: Vec<Course>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "view", content = "data", rename_all = "snake_case")]
pub enum Page {
    Login(FormView),
    Register(FormView),
    Dashboard(DashboardView),
    Course(CourseView),
    /// Fragment shown after enrolling.
    CourseEnrolled(CourseSummary),
    /// Fragment shown after unenrolling.
    CourseAvailable(CourseSummary),
    Admin(AdminView),
}

pub trait Renderer: Send + Sync {
    fn render(&self, page: Page) -> Response;
}

/// Emits the view model as `{"view": ..., "data": ...}` JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn render(&self, page: Page) -> Response {
        Json(page).into_response()
    }
}
