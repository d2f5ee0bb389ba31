//! Store capabilities consumed by the services.
//!
//! Every component receives the store explicitly; `SqliteStore` backs the server
//! and `MemoryStore` substitutes for it in tests. Both must uphold:
//! - email uniqueness on user creation
//! - at most one enrollment per `(user, course)`, enforced by the store itself
//! - enrollments only for existing users and courses (otherwise a no-op)
//! - course deletion removes its lessons and enrollments atomically

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::models::{
    Course, CourseDraft, CourseId, Lesson, LessonDraft, NewUser, Role, SessionRecord, User,
    UserId,
};
use crate::error::PortalError;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with [`PortalError::EmailTaken`] when the email already exists.
    async fn create_user(&self, user: NewUser) -> Result<UserId, PortalError>;
    async fn find_user(&self, id: UserId) -> Result<Option<User>, PortalError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, PortalError>;
    /// Current role read straight from storage.
    async fn user_role(&self, id: UserId) -> Result<Option<Role>, PortalError>;
    /// Out-of-band role change. Returns false when the user does not exist.
    async fn set_role(&self, id: UserId, role: Role) -> Result<bool, PortalError>;
    async fn count_admins(&self) -> Result<i64, PortalError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create_session(
        &self,
        token: &str,
        user_id: UserId,
        expires_at: DateTime<Utc>,
    ) -> Result<(), PortalError>;
    async fn find_session(&self, token: &str) -> Result<Option<SessionRecord>, PortalError>;
    async fn delete_session(&self, token: &str) -> Result<(), PortalError>;
}

#[async_trait]
pub trait CourseRepository: Send + Sync {
    /// All courses in id order.
    async fn list_courses(&self) -> Result<Vec<Course>, PortalError>;
    async fn find_course(&self, id: CourseId) -> Result<Option<Course>, PortalError>;
    async fn create_course(&self, draft: CourseDraft) -> Result<CourseId, PortalError>;
    /// Returns false when no course has this id.
    async fn update_course(&self, id: CourseId, draft: CourseDraft) -> Result<bool, PortalError>;
    /// Deletes the course together with its lessons and enrollments as one unit.
    async fn delete_course(&self, id: CourseId) -> Result<bool, PortalError>;
    /// Appends a lesson with `order_num = max + 1`. `None` when the course is missing.
    async fn add_lesson(
        &self,
        course_id: CourseId,
        draft: LessonDraft,
    ) -> Result<Option<Lesson>, PortalError>;
    /// Lessons of a course by ascending `order_num`.
    async fn list_lessons(&self, course_id: CourseId) -> Result<Vec<Lesson>, PortalError>;
}

#[async_trait]
pub trait EnrollmentLedger: Send + Sync {
    /// Idempotent. Returns true only when a new enrollment was recorded.
    async fn enroll(&self, user_id: UserId, course_id: CourseId) -> Result<bool, PortalError>;
    /// Idempotent. Returns true only when an enrollment was removed.
    async fn unenroll(&self, user_id: UserId, course_id: CourseId) -> Result<bool, PortalError>;
    async fn list_course_ids_for_user(
        &self,
        user_id: UserId,
    ) -> Result<HashSet<CourseId>, PortalError>;
}

pub trait Store: UserRepository + SessionRepository + CourseRepository + EnrollmentLedger {}

impl<T> Store for T where T: UserRepository + SessionRepository + CourseRepository + EnrollmentLedger
{}
