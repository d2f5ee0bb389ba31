use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use tracing::{debug, info};

use crate::db::models::CourseId;
use crate::error::PortalError;
use crate::middleware::auth::{CurrentUser, LOGIN_PATH};
use crate::router::PortalState;
use crate::service::catalog;
use crate::views::{CourseSummary, CourseView, DashboardView, Page};

/// GET /dashboard -> the caller's enrolled and available courses.
pub async fn dashboard(
    State(state): State<PortalState>,
    user: CurrentUser,
) -> Result<Response, PortalError> {
    // sessions may outlive their user
    let Some(profile) = state.store.find_user(user.user_id).await? else {
        return Ok(Redirect::to(LOGIN_PATH).into_response());
    };
    let partition = catalog::partition(&*state.store, user.user_id).await?;
    let view = DashboardView::new(user.user_id, profile.display_name, &partition);
    Ok(state.renderer.render(Page::Dashboard(view)))
}

/// POST /enroll/{id}
pub async fn enroll(
    State(state): State<PortalState>,
    user: CurrentUser,
    Path(course_id): Path<CourseId>,
) -> Result<Response, PortalError> {
    let added = state.store.enroll(user.user_id, course_id).await?;
    if added {
        info!(user_id = user.user_id, course_id, "enrolled");
    } else {
        debug!(user_id = user.user_id, course_id, "enroll was a no-op");
    }
    let course = state
        .store
        .find_course(course_id)
        .await?
        .ok_or(PortalError::NotFound)?;
    Ok(state
        .renderer
        .render(Page::CourseEnrolled(CourseSummary::from(&course))))
}

/// POST /unenroll/{id}
pub async fn unenroll(
    State(state): State<PortalState>,
    user: CurrentUser,
    Path(course_id): Path<CourseId>,
) -> Result<Response, PortalError> {
    let removed = state.store.unenroll(user.user_id, course_id).await?;
    if removed {
        info!(user_id = user.user_id, course_id, "unenrolled");
    } else {
        debug!(user_id = user.user_id, course_id, "unenroll was a no-op");
    }
    let course = state
        .store
        .find_course(course_id)
        .await?
        .ok_or(PortalError::NotFound)?;
    Ok(state
        .renderer
        .render(Page::CourseAvailable(CourseSummary::from(&course))))
}

/// GET /course/{id} -> course details; lessons for enrolled users and admins.
pub async fn course_page(
    State(state): State<PortalState>,
    user: CurrentUser,
    Path(course_id): Path<CourseId>,
) -> Result<Response, PortalError> {
    let is_admin = state
        .store
        .user_role(user.user_id)
        .await?
        .is_some_and(|role| role.is_admin());
    let detail = catalog::course_detail(&*state.store, user.user_id, course_id, is_admin)
        .await?
        .ok_or(PortalError::NotFound)?;
    Ok(state
        .renderer
        .render(Page::Course(CourseView::new(detail, is_admin))))
}
