//! In-memory implementations of the storage capabilities for unit and HTTP tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::gamification::catalog::DEFAULT_ACHIEVEMENTS;
use crate::gamification::repo::AchievementStore;
use crate::gamification::repo_types::{Achievement, Unlock, UnlockedAchievement};
use crate::store::StoreError;
use crate::users::repo::UserStore;
use crate::users::repo_types::{NewUser, User, UserXp};

/// Migrated and seeded pool for the Postgres store tests, or `None` when
/// `TEST_DATABASE_URL` is unset and those tests should be skipped.
pub async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .expect("connect to TEST_DATABASE_URL");
    crate::db::migrate(&pool).await.expect("migrate test database");
    crate::db::seed(&pool).await.expect("seed test database");
    Some(pool)
}

/// An email no other test run has used.
pub fn unique_email() -> String {
    format!("{}@store.test", Uuid::new_v4().simple())
}

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    xp: HashMap<Uuid, i32>,
    achievements: Vec<Achievement>,
    unlocks: Vec<(Uuid, Uuid, OffsetDateTime)>,
}

#[derive(Default)]
struct Faults {
    /// Fail the user insert after the XP insert, as a mid-transaction error would.
    fail_user_insert: bool,
    fail_lookups: bool,
    fail_unlocks: bool,
    /// A concurrent registration that commits just before our insert.
    race_winner: Option<NewUser>,
}

/// Both stores over one lock, so an unlock and its XP bump are a single step.
#[derive(Default)]
pub struct MemoryDb {
    tables: Mutex<Tables>,
    faults: Mutex<Faults>,
}

impl MemoryDb {
    /// Empty user tables with the default achievement catalog loaded.
    pub fn seeded() -> Self {
        let db = Self::default();
        db.tables.lock().unwrap().achievements = DEFAULT_ACHIEVEMENTS
            .iter()
            .map(|seed| Achievement {
                id: Uuid::new_v4(),
                key: seed.key.into(),
                name: seed.name.into(),
                description: seed.description.into(),
                xp_reward: seed.xp_reward,
                icon_url: Some(seed.icon.into()),
            })
            .collect();
        db
    }

    pub fn fail_user_insert(&self) {
        self.faults.lock().unwrap().fail_user_insert = true;
    }

    pub fn fail_lookups(&self) {
        self.faults.lock().unwrap().fail_lookups = true;
    }

    pub fn fail_unlocks(&self) {
        self.faults.lock().unwrap().fail_unlocks = true;
    }

    pub fn race_next_create(&self, winner: NewUser) {
        self.faults.lock().unwrap().race_winner = Some(winner);
    }

    pub fn user_count(&self) -> usize {
        self.tables.lock().unwrap().users.len()
    }

    pub fn xp_count(&self) -> usize {
        self.tables.lock().unwrap().xp.len()
    }

    pub fn unlock_count(&self, user_id: Uuid) -> usize {
        let t = self.tables.lock().unwrap();
        t.unlocks.iter().filter(|(u, _, _)| *u == user_id).count()
    }

    pub fn total_xp(&self, user_id: Uuid) -> Option<i32> {
        let t = self.tables.lock().unwrap();
        let user = t.users.get(&user_id)?;
        t.xp.get(&user.xp.id).copied()
    }

    /// Insert a user directly, bypassing faults.
    pub fn insert(&self, new_user: NewUser) -> User {
        let mut t = self.tables.lock().unwrap();
        insert_user(&mut t, new_user)
    }
}

fn insert_user(t: &mut Tables, new_user: NewUser) -> User {
    let xp = insert_xp(t);
    insert_owner(t, new_user, xp)
}

fn insert_xp(t: &mut Tables) -> UserXp {
    let xp = UserXp {
        id: Uuid::new_v4(),
        total_xp: 0,
    };
    t.xp.insert(xp.id, 0);
    xp
}

fn insert_owner(t: &mut Tables, new_user: NewUser, xp: UserXp) -> User {
    let now = OffsetDateTime::now_utc();
    let user = User {
        id: Uuid::new_v4(),
        name: new_user.name,
        email: new_user.email,
        password_hash: new_user.password_hash,
        avatar_url: new_user.avatar_url,
        auth_provider: new_user.auth_provider,
        xp,
        created_at: now,
        updated_at: now,
    };
    t.users.insert(user.id, user.clone());
    user
}

fn with_current_xp(t: &Tables, mut user: User) -> User {
    if let Some(total) = t.xp.get(&user.xp.id) {
        user.xp.total_xp = *total;
    }
    user
}

fn injected() -> StoreError {
    StoreError::Database(sqlx::Error::PoolTimedOut)
}

#[async_trait]
impl UserStore for MemoryDb {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        if self.faults.lock().unwrap().fail_lookups {
            return Err(injected());
        }
        let t = self.tables.lock().unwrap();
        let found = t.users.values().find(|u| u.email == email).cloned();
        Ok(found.map(|u| with_current_xp(&t, u)))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        if self.faults.lock().unwrap().fail_lookups {
            return Err(injected());
        }
        let t = self.tables.lock().unwrap();
        Ok(t.users.get(&id).cloned().map(|u| with_current_xp(&t, u)))
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let (fail, winner) = {
            let mut f = self.faults.lock().unwrap();
            (f.fail_user_insert, f.race_winner.take())
        };
        let mut t = self.tables.lock().unwrap();
        if let Some(winner) = winner {
            insert_user(&mut t, winner);
        }

        // Same order as the Postgres transaction: XP row first, then its owner.
        let xp = insert_xp(&mut t);
        let failure = if fail {
            Some(injected())
        } else if t.users.values().any(|u| u.email == new_user.email) {
            Some(StoreError::Conflict)
        } else {
            None
        };
        if let Some(e) = failure {
            t.xp.remove(&xp.id);
            return Err(e);
        }
        Ok(insert_owner(&mut t, new_user, xp))
    }

    async fn update(&self, user: &User) -> Result<(), StoreError> {
        let mut t = self.tables.lock().unwrap();
        let stored = t.users.get_mut(&user.id).ok_or(StoreError::NotFound)?;
        stored.name = user.name.clone();
        stored.email = user.email.clone();
        stored.password_hash = user.password_hash.clone();
        stored.avatar_url = user.avatar_url.clone();
        stored.auth_provider = user.auth_provider.clone();
        stored.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }
}

#[async_trait]
impl AchievementStore for MemoryDb {
    async fn find_by_key(&self, key: &str) -> Result<Option<Achievement>, StoreError> {
        let t = self.tables.lock().unwrap();
        Ok(t.achievements.iter().find(|a| a.key == key).cloned())
    }

    async fn list(&self) -> Result<Vec<Achievement>, StoreError> {
        let t = self.tables.lock().unwrap();
        let mut all = t.achievements.clone();
        all.sort_by(|a, b| a.xp_reward.cmp(&b.xp_reward).then_with(|| a.name.cmp(&b.name)));
        Ok(all)
    }

    async fn list_unlocked(&self, user_id: Uuid) -> Result<Vec<UnlockedAchievement>, StoreError> {
        let t = self.tables.lock().unwrap();
        let mut out: Vec<_> = t
            .unlocks
            .iter()
            .filter(|(u, _, _)| *u == user_id)
            .filter_map(|(_, a, at)| {
                let achievement = t.achievements.iter().find(|x| x.id == *a)?.clone();
                Some(UnlockedAchievement {
                    achievement,
                    unlocked_at: *at,
                })
            })
            .collect();
        out.sort_by(|a, b| b.unlocked_at.cmp(&a.unlocked_at));
        Ok(out)
    }

    async fn unlock(
        &self,
        user_id: Uuid,
        achievement: &Achievement,
    ) -> Result<Option<Unlock>, StoreError> {
        if self.faults.lock().unwrap().fail_unlocks {
            return Err(injected());
        }
        let mut t = self.tables.lock().unwrap();
        let xp_id = t.users.get(&user_id).ok_or(StoreError::NotFound)?.xp.id;
        if t
            .unlocks
            .iter()
            .any(|(u, a, _)| *u == user_id && *a == achievement.id)
        {
            return Ok(None);
        }
        let unlocked_at = OffsetDateTime::now_utc();
        t.unlocks.push((user_id, achievement.id, unlocked_at));
        let total = t.xp.entry(xp_id).or_insert(0);
        *total += achievement.xp_reward;
        Ok(Some(Unlock {
            unlocked_at,
            total_xp: *total,
        }))
    }
}
