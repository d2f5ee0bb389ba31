use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub type UserId = i64;
pub type CourseId = i64;
pub type LessonId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Admin => "admin",
        }
    }

    /// Unknown role strings map to the least privileged role.
    pub fn from_db(s: &str) -> Self {
        match s {
            "admin" => Role::Admin,
            _ => Role::Student,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Course {
    pub id: CourseId,
    pub title: String,
    pub description: String,
    pub external_link: String,
}

/// Editable fields of a course, used for both create and update.
#[derive(Debug, Clone, Default)]
pub struct CourseDraft {
    pub title: String,
    pub description: String,
    pub external_link: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Lesson {
    pub id: LessonId,
    pub course_id: CourseId,
    pub title: String,
    pub content: String,
    pub order_num: i64,
}

#[derive(Debug, Clone)]
pub struct LessonDraft {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub token: String,
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
}
