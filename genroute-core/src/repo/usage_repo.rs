use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::GenrouteResult;
use crate::models::ProviderUsage;

use super::UsageStore;

pub struct UsageRepository {
    pool: PgPool,
}

impl UsageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UsageStore for UsageRepository {
    async fn increment_usage(&self, provider: &str, cost: f64) -> GenrouteResult<()> {
        sqlx::query(
            r#"
            INSERT INTO provider_usage (provider, current_usage)
            VALUES ($1, $2)
            ON CONFLICT (provider) DO UPDATE
            SET current_usage = provider_usage.current_usage + EXCLUDED.current_usage,
                updated_at = NOW()
            "#,
        )
        .bind(provider)
        .bind(cost)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_usage(&self, provider: &str) -> GenrouteResult<Option<ProviderUsage>> {
        let row = sqlx::query_as::<_, ProviderUsage>(
            r#"
            SELECT provider, current_usage, monthly_limit, is_active
            FROM provider_usage
            WHERE provider = $1
            "#,
        )
        .bind(provider)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn set_active(&self, provider: &str, active: bool) -> GenrouteResult<()> {
        sqlx::query(
            r#"
            INSERT INTO provider_usage (provider, is_active)
            VALUES ($1, $2)
            ON CONFLICT (provider) DO UPDATE
            SET is_active = EXCLUDED.is_active,
                updated_at = NOW()
            "#,
        )
        .bind(provider)
        .bind(active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn reset_monthly_counters(&self) -> GenrouteResult<()> {
        sqlx::query(
            r#"
            UPDATE provider_usage
            SET current_usage = 0, is_active = TRUE, updated_at = NOW()
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_monthly_limit(&self, provider: &str, limit: Option<f64>) -> GenrouteResult<()> {
        sqlx::query(
            r#"
            INSERT INTO provider_usage (provider, monthly_limit)
            VALUES ($1, $2)
            ON CONFLICT (provider) DO UPDATE
            SET monthly_limit = EXCLUDED.monthly_limit,
                updated_at = NOW()
            "#,
        )
        .bind(provider)
        .bind(limit)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_usage(&self) -> GenrouteResult<Vec<ProviderUsage>> {
        let rows = sqlx::query_as::<_, ProviderUsage>(
            r#"
            SELECT provider, current_usage, monthly_limit, is_active
            FROM provider_usage
            ORDER BY provider
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
