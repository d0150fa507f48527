use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

use crate::config::AppConfig;
use crate::gamification::catalog::{DEFAULT_ACHIEVEMENTS, DEFAULT_ROLES};

pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    let db = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .context("connect to database")?;
    Ok(db)
}

pub async fn migrate(db: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(db)
        .await
        .context("run migrations")?;
    Ok(())
}

/// Insert the achievement and role catalogs. Rows that already exist are left alone.
pub async fn seed(db: &PgPool) -> anyhow::Result<()> {
    let mut tx = db.begin().await?;
    let mut inserted = 0u64;

    for a in DEFAULT_ACHIEVEMENTS {
        inserted += sqlx::query(
            r#"
            INSERT INTO achievements (key, name, description, xp_reward, icon_url)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (key) DO NOTHING
            "#,
        )
        .bind(a.key)
        .bind(a.name)
        .bind(a.description)
        .bind(a.xp_reward)
        .bind(a.icon)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("seed achievement {}", a.key))?
        .rows_affected();
    }

    for r in DEFAULT_ROLES {
        inserted += sqlx::query(
            r#"
            INSERT INTO roles (name, description)
            VALUES ($1, $2)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(r.name)
        .bind(r.description)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("seed role {}", r.name))?
        .rows_affected();
    }

    tx.commit().await?;
    info!(inserted, "reference data seeded");
    Ok(())
}
