use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Catalog entry. Seeded at startup, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Achievement {
    pub id: Uuid,
    pub key: String,
    pub name: String,
    pub description: String,
    pub xp_reward: i32,
    pub icon_url: Option<String>,
}

/// An achievement together with the moment a user unlocked it.
#[derive(Debug, Clone, Serialize)]
pub struct UnlockedAchievement {
    #[serde(flatten)]
    pub achievement: Achievement,
    #[serde(with = "time::serde::rfc3339")]
    pub unlocked_at: OffsetDateTime,
}

/// Flat `user_achievements JOIN achievements` row.
#[derive(Debug, FromRow)]
pub struct UnlockedRow {
    pub id: Uuid,
    pub key: String,
    pub name: String,
    pub description: String,
    pub xp_reward: i32,
    pub icon_url: Option<String>,
    pub unlocked_at: OffsetDateTime,
}

impl From<UnlockedRow> for UnlockedAchievement {
    fn from(r: UnlockedRow) -> Self {
        Self {
            achievement: Achievement {
                id: r.id,
                key: r.key,
                name: r.name,
                description: r.description,
                xp_reward: r.xp_reward,
                icon_url: r.icon_url,
            },
            unlocked_at: r.unlocked_at,
        }
    }
}

/// Result of a fresh unlock: when it happened and the XP total after the reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unlock {
    pub unlocked_at: OffsetDateTime,
    pub total_xp: i32,
}
