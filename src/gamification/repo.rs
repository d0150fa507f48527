use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use super::repo_types::{Achievement, Unlock, UnlockedAchievement, UnlockedRow};
use crate::store::StoreError;

#[async_trait]
pub trait AchievementStore: Send + Sync {
    async fn find_by_key(&self, key: &str) -> Result<Option<Achievement>, StoreError>;

    /// Whole catalog, cheapest reward first.
    async fn list(&self) -> Result<Vec<Achievement>, StoreError>;

    /// Unlocks of one user, newest first.
    async fn list_unlocked(&self, user_id: Uuid) -> Result<Vec<UnlockedAchievement>, StoreError>;

    /// Record the unlock and add the reward to the user's XP in one transaction.
    ///
    /// `Ok(None)` means the pair was already unlocked and nothing changed.
    /// `StoreError::NotFound` means the user does not exist.
    async fn unlock(
        &self,
        user_id: Uuid,
        achievement: &Achievement,
    ) -> Result<Option<Unlock>, StoreError>;
}

#[derive(Clone)]
pub struct PgAchievementStore {
    db: PgPool,
}

impl PgAchievementStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AchievementStore for PgAchievementStore {
    async fn find_by_key(&self, key: &str) -> Result<Option<Achievement>, StoreError> {
        let row = sqlx::query_as::<_, Achievement>(
            r#"
            SELECT id, key, name, description, xp_reward, icon_url
            FROM achievements
            WHERE key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn list(&self) -> Result<Vec<Achievement>, StoreError> {
        let rows = sqlx::query_as::<_, Achievement>(
            r#"
            SELECT id, key, name, description, xp_reward, icon_url
            FROM achievements
            ORDER BY xp_reward, name
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn list_unlocked(&self, user_id: Uuid) -> Result<Vec<UnlockedAchievement>, StoreError> {
        let rows = sqlx::query_as::<_, UnlockedRow>(
            r#"
            SELECT a.id, a.key, a.name, a.description, a.xp_reward, a.icon_url, ua.unlocked_at
            FROM user_achievements ua
            JOIN achievements a ON a.id = ua.achievement_id
            WHERE ua.user_id = $1
            ORDER BY ua.unlocked_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn unlock(
        &self,
        user_id: Uuid,
        achievement: &Achievement,
    ) -> Result<Option<Unlock>, StoreError> {
        let mut tx = self.db.begin().await?;

        // Row lock serializes concurrent awards for the same user.
        let xp_id: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT user_xp_id FROM users
            WHERE id = $1 AND deleted_at IS NULL
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(xp_id) = xp_id else {
            return Err(StoreError::NotFound);
        };

        let unlocked_at: Option<OffsetDateTime> = sqlx::query_scalar(
            r#"
            INSERT INTO user_achievements (user_id, achievement_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, achievement_id) DO NOTHING
            RETURNING unlocked_at
            "#,
        )
        .bind(user_id)
        .bind(achievement.id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(unlocked_at) = unlocked_at else {
            tx.commit().await?;
            debug!(%user_id, key = %achievement.key, "achievement already unlocked");
            return Ok(None);
        };

        let total_xp: i32 = sqlx::query_scalar(
            r#"
            UPDATE user_xp
               SET total_xp = total_xp + $2, updated_at = now()
             WHERE id = $1
            RETURNING total_xp
            "#,
        )
        .bind(xp_id)
        .bind(achievement.xp_reward)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(Unlock {
            unlocked_at,
            total_xp,
        }))
    }
}
