use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Running XP total owned by exactly one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserXp {
    pub id: Uuid,
    pub total_xp: i32,
}

/// User with its XP record loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // argon2 PHC string
    pub avatar_url: Option<String>,
    pub auth_provider: Option<String>,
    pub xp: UserXp,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Flat `users JOIN user_xp` row.
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub avatar_url: Option<String>,
    pub auth_provider: Option<String>,
    pub user_xp_id: Uuid,
    pub total_xp: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            email: r.email,
            password_hash: r.password_hash,
            avatar_url: r.avatar_url,
            auth_provider: r.auth_provider,
            xp: UserXp {
                id: r.user_xp_id,
                total_xp: r.total_xp,
            },
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Input for the atomic user + XP creation. `password_hash` must already be hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub avatar_url: Option<String>,
    pub auth_provider: Option<String>,
}
