use crate::db::models::{Course, CourseId, Lesson, UserId};
use crate::db::store::{CourseRepository, EnrollmentLedger};
use crate::error::PortalError;

/// All courses split for one user. Together the two lists hold every course
/// exactly once, in catalog order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogPartition {
    pub enrolled: Vec<Course>,
    pub available: Vec<Course>,
}

pub async fn partition<S>(store: &S, user_id: UserId) -> Result<CatalogPartition, PortalError>
where
    S: CourseRepository + EnrollmentLedger + ?Sized,
{
    let courses = store.list_courses().await?;
    let enrolled_ids = store.list_course_ids_for_user(user_id).await?;

    // ids in the ledger without a catalog row are ignored
    let (enrolled, available): (Vec<Course>, Vec<Course>) = courses
        .into_iter()
        .partition(|course| enrolled_ids.contains(&course.id));
    Ok(CatalogPartition {
        enrolled,
        available,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct CourseDetail {
    pub course: Course,
    pub lessons: Vec<Lesson>,
    pub is_enrolled: bool,
}

/// Course plus its lessons in ascending `order_num`. Lessons are only
/// included for enrolled users or when `full_access` is set.
pub async fn course_detail<S>(
    store: &S,
    user_id: UserId,
    course_id: CourseId,
    full_access: bool,
) -> Result<Option<CourseDetail>, PortalError>
where
    S: CourseRepository + EnrollmentLedger + ?Sized,
{
    let Some(course) = store.find_course(course_id).await? else {
        return Ok(None);
    };
    let is_enrolled = store
        .list_course_ids_for_user(user_id)
        .await?
        .contains(&course_id);
    let lessons = if is_enrolled || full_access {
        store.list_lessons(course_id).await?
    } else {
        Vec::new()
    };
    Ok(Some(CourseDetail {
        course,
        lessons,
        is_enrolled,
    }))
}
