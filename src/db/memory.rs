//! In-process store used as a test substitute for [`SqliteStore`](super::SqliteStore).
//!
//! A single mutex guards all tables so each operation is atomic, mirroring the
//! constraints the SQLite schema enforces.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::models::{
    Course, CourseDraft, CourseId, Lesson, LessonDraft, LessonId, NewUser, Role, SessionRecord,
    User, UserId,
};
use crate::db::store::{CourseRepository, EnrollmentLedger, SessionRepository, UserRepository};
use crate::error::PortalError;

#[derive(Default)]
struct Tables {
    next_user_id: UserId,
    next_course_id: CourseId,
    next_lesson_id: LessonId,
    users: BTreeMap<UserId, User>,
    courses: BTreeMap<CourseId, Course>,
    lessons: BTreeMap<LessonId, Lesson>,
    enrollments: BTreeSet<(UserId, CourseId)>,
    sessions: HashMap<String, SessionRecord>,
}

impl Tables {
    fn cascade_on_course_delete(&mut self, course_id: CourseId) {
        self.enrollments.retain(|(_, c)| *c != course_id);
        self.lessons.retain(|_, l| l.course_id != course_id);
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn enrollments_for_course(&self, course_id: CourseId) -> usize {
        self.lock()
            .enrollments
            .iter()
            .filter(|(_, c)| *c == course_id)
            .count()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<UserId, PortalError> {
        let mut t = self.lock();
        if t.users.values().any(|u| u.email == user.email) {
            return Err(PortalError::EmailTaken);
        }
        t.next_user_id += 1;
        let id = t.next_user_id;
        t.users.insert(
            id,
            User {
                id,
                email: user.email,
                password_hash: user.password_hash,
                display_name: user.display_name,
                role: user.role,
            },
        );
        Ok(id)
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, PortalError> {
        Ok(self.lock().users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, PortalError> {
        Ok(self.lock().users.values().find(|u| u.email == email).cloned())
    }

    async fn user_role(&self, id: UserId) -> Result<Option<Role>, PortalError> {
        Ok(self.lock().users.get(&id).map(|u| u.role))
    }

    async fn set_role(&self, id: UserId, role: Role) -> Result<bool, PortalError> {
        Ok(match self.lock().users.get_mut(&id) {
            Some(user) => {
                user.role = role;
                true
            }
            None => false,
        })
    }

    async fn count_admins(&self) -> Result<i64, PortalError> {
        Ok(self.lock().users.values().filter(|u| u.role.is_admin()).count() as i64)
    }
}

#[async_trait]
impl SessionRepository for MemoryStore {
    async fn create_session(
        &self,
        token: &str,
        user_id: UserId,
        expires_at: DateTime<Utc>,
    ) -> Result<(), PortalError> {
        self.lock().sessions.insert(
            token.to_string(),
            SessionRecord {
                token: token.to_string(),
                user_id,
                expires_at,
            },
        );
        Ok(())
    }

    async fn find_session(&self, token: &str) -> Result<Option<SessionRecord>, PortalError> {
        Ok(self.lock().sessions.get(token).cloned())
    }

    async fn delete_session(&self, token: &str) -> Result<(), PortalError> {
        self.lock().sessions.remove(token);
        Ok(())
    }
}

#[async_trait]
impl CourseRepository for MemoryStore {
    async fn list_courses(&self) -> Result<Vec<Course>, PortalError> {
        Ok(self.lock().courses.values().cloned().collect())
    }

    async fn find_course(&self, id: CourseId) -> Result<Option<Course>, PortalError> {
        Ok(self.lock().courses.get(&id).cloned())
    }

    async fn create_course(&self, draft: CourseDraft) -> Result<CourseId, PortalError> {
        let mut t = self.lock();
        t.next_course_id += 1;
        let id = t.next_course_id;
        t.courses.insert(
            id,
            Course {
                id,
                title: draft.title,
                description: draft.description,
                external_link: draft.external_link,
            },
        );
        Ok(id)
    }

    async fn update_course(&self, id: CourseId, draft: CourseDraft) -> Result<bool, PortalError> {
        Ok(match self.lock().courses.get_mut(&id) {
            Some(course) => {
                course.title = draft.title;
                course.description = draft.description;
                course.external_link = draft.external_link;
                true
            }
            None => false,
        })
    }

    async fn delete_course(&self, id: CourseId) -> Result<bool, PortalError> {
        let mut t = self.lock();
        t.cascade_on_course_delete(id);
        Ok(t.courses.remove(&id).is_some())
    }

    async fn add_lesson(
        &self,
        course_id: CourseId,
        draft: LessonDraft,
    ) -> Result<Option<Lesson>, PortalError> {
        let mut t = self.lock();
        if !t.courses.contains_key(&course_id) {
            return Ok(None);
        }
        let order_num = t
            .lessons
            .values()
            .filter(|l| l.course_id == course_id)
            .map(|l| l.order_num)
            .max()
            .unwrap_or(0)
            + 1;
        t.next_lesson_id += 1;
        let lesson = Lesson {
            id: t.next_lesson_id,
            course_id,
            title: draft.title,
            content: draft.content,
            order_num,
        };
        t.lessons.insert(lesson.id, lesson.clone());
        Ok(Some(lesson))
    }

    async fn list_lessons(&self, course_id: CourseId) -> Result<Vec<Lesson>, PortalError> {
        let mut lessons: Vec<Lesson> = self
            .lock()
            .lessons
            .values()
            .filter(|l| l.course_id == course_id)
            .cloned()
            .collect();
        lessons.sort_by_key(|l| (l.order_num, l.id));
        Ok(lessons)
    }
}

#[async_trait]
impl EnrollmentLedger for MemoryStore {
    async fn enroll(&self, user_id: UserId, course_id: CourseId) -> Result<bool, PortalError> {
        let mut t = self.lock();
        if !t.users.contains_key(&user_id) || !t.courses.contains_key(&course_id) {
            return Ok(false);
        }
        Ok(t.enrollments.insert((user_id, course_id)))
    }

    async fn unenroll(&self, user_id: UserId, course_id: CourseId) -> Result<bool, PortalError> {
        Ok(self.lock().enrollments.remove(&(user_id, course_id)))
    }

    async fn list_course_ids_for_user(
        &self,
        user_id: UserId,
    ) -> Result<HashSet<CourseId>, PortalError> {
        Ok(self
            .lock()
            .enrollments
            .iter()
            .filter(|(u, _)| *u == user_id)
            .map(|(_, c)| *c)
            .collect())
    }
}
