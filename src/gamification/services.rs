use std::sync::Arc;

use axum::extract::FromRef;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use super::repo::AchievementStore;
use super::repo_types::Achievement;
use crate::state::AppState;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AwardError {
    #[error("unknown achievement: {0}")]
    UnknownAchievement(String),
    #[error("unknown user: {0}")]
    UnknownUser(Uuid),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AwardOutcome {
    Unlocked {
        achievement: Achievement,
        unlocked_at: OffsetDateTime,
        total_xp: i32,
    },
    /// The user already had it; nothing changed.
    AlreadyUnlocked(Achievement),
}

impl AwardOutcome {
    pub fn achievement(&self) -> &Achievement {
        match self {
            AwardOutcome::Unlocked { achievement, .. } => achievement,
            AwardOutcome::AlreadyUnlocked(achievement) => achievement,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, AwardOutcome::Unlocked { .. })
    }
}

/// Grants achievements at most once per user and applies their XP reward.
#[derive(Clone)]
pub struct Awarder {
    store: Arc<dyn AchievementStore>,
}

impl FromRef<AppState> for Awarder {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.achievements.clone())
    }
}

impl Awarder {
    pub fn new(store: Arc<dyn AchievementStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub async fn award(&self, user_id: Uuid, key: &str) -> Result<AwardOutcome, AwardError> {
        let achievement = self
            .store
            .find_by_key(key)
            .await?
            .ok_or_else(|| AwardError::UnknownAchievement(key.to_string()))?;

        match self.store.unlock(user_id, &achievement).await {
            Ok(Some(unlock)) => {
                info!(
                    %user_id,
                    key = %achievement.key,
                    reward = achievement.xp_reward,
                    total_xp = unlock.total_xp,
                    "achievement unlocked"
                );
                Ok(AwardOutcome::Unlocked {
                    achievement,
                    unlocked_at: unlock.unlocked_at,
                    total_xp: unlock.total_xp,
                })
            }
            Ok(None) => Ok(AwardOutcome::AlreadyUnlocked(achievement)),
            Err(StoreError::NotFound) => Err(AwardError::UnknownUser(user_id)),
            Err(e) => Err(e.into()),
        }
    }
}
