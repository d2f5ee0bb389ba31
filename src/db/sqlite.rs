use crate::db::models::{
    Course, CourseDraft, CourseId, Lesson, LessonDraft, NewUser, Role, SessionRecord, User,
    UserId,
};
use crate::db::schema::SQLITE_INIT;
use crate::db::store::{CourseRepository, EnrollmentLedger, SessionRepository, UserRepository};
use crate::error::PortalError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::collections::HashSet;
use std::str::FromStr;

pub type SqlitePool = Pool<Sqlite>;

const COURSE_COLUMNS: &str = "id, title, description, link AS external_link";

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database at `database_url` with foreign keys enforced.
    pub async fn connect(database_url: &str) -> Result<Self, PortalError> {
        let connect_opts = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new().connect_with(connect_opts).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Initialize the schema by executing the bundled DDL.
    pub async fn init_schema(&self) -> Result<(), PortalError> {
        // sqlx::query runs one statement at a time
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&self.pool).await?;
        }
        Ok(())
    }

    fn row_to_user(row: SqliteRow) -> Result<User, PortalError> {
        let id: i64 = row.try_get("id")?;
        let email: String = row.try_get("email")?;
        let password_hash: String = row.try_get("password")?;
        let display_name: String = row.try_get("name")?;
        let role: String = row.try_get("role")?;
        Ok(User {
            id,
            email,
            password_hash,
            display_name,
            role: Role::from_db(&role),
        })
    }

    fn row_to_session(row: SqliteRow) -> Result<SessionRecord, PortalError> {
        let token: String = row.try_get("token")?;
        let user_id: i64 = row.try_get("user_id")?;
        let expires_str: String = row.try_get("expires_at")?;
        let expires_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&expires_str)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?
            .with_timezone(&Utc);
        Ok(SessionRecord {
            token,
            user_id,
            expires_at,
        })
    }
}

/// Remove every enrollment and lesson of a course. Must run inside the
/// transaction that deletes the course row.
pub async fn cascade_on_course_delete(
    conn: &mut SqliteConnection,
    course_id: CourseId,
) -> Result<(), PortalError> {
    sqlx::query("DELETE FROM enrollments WHERE course_id = ?")
        .bind(course_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM lessons WHERE course_id = ?")
        .bind(course_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

#[async_trait]
impl UserRepository for SqliteStore {
    async fn create_user(&self, user: NewUser) -> Result<UserId, PortalError> {
        let res = sqlx::query("INSERT INTO users (email, password, name, role) VALUES (?, ?, ?, ?)")
            .bind(user.email)
            .bind(user.password_hash)
            .bind(user.display_name)
            .bind(user.role.as_str())
            .execute(&self.pool)
            .await;
        match res {
            Ok(done) => Ok(done.last_insert_rowid()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(PortalError::EmailTaken)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, PortalError> {
        let row = sqlx::query("SELECT id, email, password, name, role FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_user).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, PortalError> {
        let row = sqlx::query("SELECT id, email, password, name, role FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_user).transpose()
    }

    async fn user_role(&self, id: UserId) -> Result<Option<Role>, PortalError> {
        let rec: Option<(String,)> = sqlx::query_as("SELECT role FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(rec.map(|(role,)| Role::from_db(&role)))
    }

    async fn set_role(&self, id: UserId, role: Role) -> Result<bool, PortalError> {
        let done = sqlx::query("UPDATE users SET role = ? WHERE id = ?")
            .bind(role.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    async fn count_admins(&self) -> Result<i64, PortalError> {
        let rec: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE role = 'admin'")
            .fetch_one(&self.pool)
            .await?;
        Ok(rec.0)
    }
}

#[async_trait]
impl SessionRepository for SqliteStore {
    async fn create_session(
        &self,
        token: &str,
        user_id: UserId,
        expires_at: DateTime<Utc>,
    ) -> Result<(), PortalError> {
        sqlx::query("INSERT INTO sessions (token, user_id, expires_at) VALUES (?, ?, ?)")
            .bind(token)
            .bind(user_id)
            .bind(expires_at.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_session(&self, token: &str) -> Result<Option<SessionRecord>, PortalError> {
        let row = sqlx::query("SELECT token, user_id, expires_at FROM sessions WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_session).transpose()
    }

    async fn delete_session(&self, token: &str) -> Result<(), PortalError> {
        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl CourseRepository for SqliteStore {
    async fn list_courses(&self) -> Result<Vec<Course>, PortalError> {
        let courses = sqlx::query_as::<_, Course>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(courses)
    }

    async fn find_course(&self, id: CourseId) -> Result<Option<Course>, PortalError> {
        let course = sqlx::query_as::<_, Course>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(course)
    }

    async fn create_course(&self, draft: CourseDraft) -> Result<CourseId, PortalError> {
        let done = sqlx::query("INSERT INTO courses (title, description, link) VALUES (?, ?, ?)")
            .bind(draft.title)
            .bind(draft.description)
            .bind(draft.external_link)
            .execute(&self.pool)
            .await?;
        Ok(done.last_insert_rowid())
    }

    async fn update_course(&self, id: CourseId, draft: CourseDraft) -> Result<bool, PortalError> {
        let done =
            sqlx::query("UPDATE courses SET title = ?, description = ?, link = ? WHERE id = ?")
                .bind(draft.title)
                .bind(draft.description)
                .bind(draft.external_link)
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(done.rows_affected() > 0)
    }

    async fn delete_course(&self, id: CourseId) -> Result<bool, PortalError> {
        let mut tx = self.pool.begin().await?;
        cascade_on_course_delete(&mut *tx, id).await?;
        let done = sqlx::query("DELETE FROM courses WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(done.rows_affected() > 0)
    }

    async fn add_lesson(
        &self,
        course_id: CourseId,
        draft: LessonDraft,
    ) -> Result<Option<Lesson>, PortalError> {
        let mut tx = self.pool.begin().await?;
        // single statement: order_num is computed and written atomically
        let done = sqlx::query(
            r#"
            INSERT INTO lessons (course_id, title, content, order_num)
            SELECT c.id, ?, ?,
                   (SELECT COALESCE(MAX(order_num), 0) + 1 FROM lessons WHERE course_id = c.id)
            FROM courses c WHERE c.id = ?
            "#,
        )
        .bind(draft.title)
        .bind(draft.content)
        .bind(course_id)
        .execute(&mut *tx)
        .await?;

        if done.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let lesson = sqlx::query_as::<_, Lesson>(
            "SELECT id, course_id, title, content, order_num FROM lessons WHERE id = ?",
        )
        .bind(done.last_insert_rowid())
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(Some(lesson))
    }

    async fn list_lessons(&self, course_id: CourseId) -> Result<Vec<Lesson>, PortalError> {
        let lessons = sqlx::query_as::<_, Lesson>(
            r#"SELECT id, course_id, title, content, order_num
               FROM lessons WHERE course_id = ? ORDER BY order_num, id"#,
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(lessons)
    }
}

#[async_trait]
impl EnrollmentLedger for SqliteStore {
    async fn enroll(&self, user_id: UserId, course_id: CourseId) -> Result<bool, PortalError> {
        // The primary key rejects duplicates; the join makes a dangling pair a no-op.
        let done = sqlx::query(
            r#"
            INSERT OR IGNORE INTO enrollments (user_id, course_id)
            SELECT u.id, c.id FROM users u, courses c WHERE u.id = ? AND c.id = ?
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .execute(&self.pool)
        .await?;
        Ok(done.rows_affected() > 0)
    }

    async fn unenroll(&self, user_id: UserId, course_id: CourseId) -> Result<bool, PortalError> {
        let done = sqlx::query("DELETE FROM enrollments WHERE user_id = ? AND course_id = ?")
            .bind(user_id)
            .bind(course_id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    async fn list_course_ids_for_user(
        &self,
        user_id: UserId,
    ) -> Result<HashSet<CourseId>, PortalError> {
        let rows: Vec<(i64,)> =
            sqlx::query_as("SELECT course_id FROM enrollments WHERE user_id = ?")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
