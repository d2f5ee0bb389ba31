use axum::{
    Form,
    extract::{Path, Query, State},
    response::{Redirect, Response},
};
use serde::Deserialize;
use tracing::{debug, info};

use crate::db::models::{CourseDraft, CourseId, LessonDraft};
use crate::error::PortalError;
use crate::handlers::{ErrorQuery, redirect_with_error};
use crate::middleware::auth::CurrentUser;
use crate::router::PortalState;
use crate::views::{AdminView, Page};

const ADMIN_PATH: &str = "/admin";

#[derive(Debug, Deserialize)]
pub struct CourseForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub link: String,
}

impl CourseForm {
    fn into_draft(self) -> Result<CourseDraft, PortalError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(PortalError::MissingFields);
        }
        Ok(CourseDraft {
            title: title.to_string(),
            description: self.description,
            external_link: self.link.trim().to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct LessonForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

/// GET /admin -> every course with its editable fields.
pub async fn admin_panel(
    State(state): State<PortalState>,
    Query(q): Query<ErrorQuery>,
) -> Result<Response, PortalError> {
    let courses = state.store.list_courses().await?;
    Ok(state.renderer.render(Page::Admin(AdminView {
        courses,
        error: q.error,
    })))
}

/// POST /admin/course
pub async fn add_course(
    State(state): State<PortalState>,
    admin: CurrentUser,
    Form(form): Form<CourseForm>,
) -> Result<Redirect, PortalError> {
    let draft = match form.into_draft() {
        Ok(draft) => draft,
        Err(err) => return Ok(redirect_with_error(ADMIN_PATH, &err)),
    };
    let course_id = state.store.create_course(draft).await?;
    info!(admin_id = admin.user_id, course_id, "course created");
    Ok(Redirect::to(ADMIN_PATH))
}

/// POST /admin/course/edit/{id}. Editing a missing course is a no-op.
pub async fn edit_course(
    State(state): State<PortalState>,
    admin: CurrentUser,
    Path(course_id): Path<CourseId>,
    Form(form): Form<CourseForm>,
) -> Result<Redirect, PortalError> {
    let draft = match form.into_draft() {
        Ok(draft) => draft,
        Err(err) => return Ok(redirect_with_error(ADMIN_PATH, &err)),
    };
    if state.store.update_course(course_id, draft).await? {
        info!(admin_id = admin.user_id, course_id, "course updated");
    } else {
        debug!(course_id, "edit of unknown course ignored");
    }
    Ok(Redirect::to(ADMIN_PATH))
}

/// POST /admin/course/delete/{id}. Lessons and enrollments go with the course.
pub async fn delete_course(
    State(state): State<PortalState>,
    admin: CurrentUser,
    Path(course_id): Path<CourseId>,
) -> Result<Redirect, PortalError> {
    if state.store.delete_course(course_id).await? {
        info!(admin_id = admin.user_id, course_id, "course deleted");
    } else {
        debug!(course_id, "delete of unknown course ignored");
    }
    Ok(Redirect::to(ADMIN_PATH))
}

/// POST /course/{id}/lesson -> appends a lesson at the end of the course.
pub async fn add_lesson(
    State(state): State<PortalState>,
    admin: CurrentUser,
    Path(course_id): Path<CourseId>,
    Form(form): Form<LessonForm>,
) -> Result<Redirect, PortalError> {
    let course_path = format!("/course/{course_id}");
    let title = form.title.trim();
    if title.is_empty() {
        return Ok(redirect_with_error(&course_path, &PortalError::MissingFields));
    }
    let lesson = state
        .store
        .add_lesson(
            course_id,
            LessonDraft {
                title: title.to_string(),
                content: form.content,
            },
        )
        .await?
        .ok_or(PortalError::NotFound)?;
    info!(
        admin_id = admin.user_id,
        course_id,
        lesson_id = lesson.id,
        order_num = lesson.order_num,
        "lesson added"
    );
    Ok(Redirect::to(&course_path))
}
