use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::store::StoreError;
use crate::users::repo_types::{NewUser, User, UserRow};

/// Persistence capability for users and their XP record.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Find a live user by exact email. `None` when absent.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Find a live user by id. `None` when absent.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Create the XP record and the user that owns it as one unit.
    /// Returns `StoreError::Conflict` when the email is already taken.
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError>;

    /// Save the mutable columns of an existing user.
    async fn update(&self, user: &User) -> Result<(), StoreError>;
}

const SELECT_USER: &str = r#"
    SELECT u.id, u.name, u.email, u.password_hash, u.avatar_url, u.auth_provider,
           u.user_xp_id, x.total_xp, u.created_at, u.updated_at
      FROM users u
      JOIN user_xp x ON x.id = u.user_xp_id
"#;

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "{SELECT_USER} WHERE u.email = $1 AND u.deleted_at IS NULL"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(User::from))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "{SELECT_USER} WHERE u.id = $1 AND u.deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(User::from))
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        // Dropping `tx` on any early return rolls both inserts back.
        let mut tx = self.db.begin().await?;

        let (xp_id, total_xp): (Uuid, i32) = sqlx::query_as(
            r#"
            INSERT INTO user_xp (total_xp)
            VALUES (0)
            RETURNING id, total_xp
            "#,
        )
        .fetch_one(&mut *tx)
        .await?;
        debug!(user_xp_id = %xp_id, "user_xp row created");

        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (name, email, password_hash, avatar_url, auth_provider, user_xp_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, name, email, password_hash, avatar_url, auth_provider,
                      user_xp_id, $7::INTEGER AS total_xp, created_at, updated_at
            "#,
        )
        .bind(&new_user.name)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(&new_user.avatar_url)
        .bind(&new_user.auth_provider)
        .bind(xp_id)
        .bind(total_xp)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(user_id = %row.id, email = %row.email, "user created");
        Ok(row.into())
    }

    async fn update(&self, user: &User) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
               SET name = $2, email = $3, password_hash = $4, avatar_url = $5,
                   auth_provider = $6, updated_at = now()
             WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.avatar_url)
        .bind(&user.auth_provider)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
