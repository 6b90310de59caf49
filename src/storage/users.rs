use super::schema::Database;
use super::types::{map_unique, NewUser, StoreError, User, UserRow};

impl Database {
    // ========================================================================
    // User Operations
    // ========================================================================

    /// Insert a new user. Fails with `UniqueViolation("users.name")` when the
    /// name is already registered.
    pub async fn create_user(&self, new: NewUser) -> Result<User, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, created_at, updated_at, name)
            VALUES (?, ?, ?, ?)
        "#,
        )
        .bind(new.id.to_string())
        .bind(new.created_at)
        .bind(new.updated_at)
        .bind(&new.name)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique(e, "users.name"))?;

        Ok(User {
            id: new.id,
            created_at: new.created_at,
            updated_at: new.updated_at,
            name: new.name,
        })
    }

    /// Look up a user by exact (case-sensitive) name.
    pub async fn get_user_by_name(&self, name: &str) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, created_at, updated_at, name FROM users WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(UserRow::into_user).transpose()
    }

    pub async fn get_user_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, created_at, updated_at, name FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(UserRow::into_user).transpose()
    }

    /// All users in registration order.
    pub async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let rows: Vec<UserRow> = sqlx::query_as(
            "SELECT id, created_at, updated_at, name FROM users ORDER BY created_at ASC, rowid ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(UserRow::into_user).collect()
    }

    /// Bulk reset: deletes every user, cascading to feeds, follows and posts.
    pub async fn reset_users(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM users").execute(&self.pool).await?;
        Ok(())
    }
}
