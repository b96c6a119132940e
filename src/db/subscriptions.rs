use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{PgStore, StoreError, SubscriptionSource};
use crate::models::CompanySubscription;

#[derive(sqlx::FromRow)]
struct SubscriptionRow {
    company_name: String,
    admin_account_id: Option<Uuid>,
    status: String,
    trial_ends_at: Option<DateTime<Utc>>,
}

#[async_trait]
impl SubscriptionSource for PgStore {
    async fn list_subscriptions(&self) -> Result<Vec<CompanySubscription>, StoreError> {
        let rows = sqlx::query_as::<_, SubscriptionRow>(
            "SELECT company_name, admin_account_id, status, trial_ends_at
             FROM company_subscriptions ORDER BY company_name",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<CompanySubscription, StoreError> {
                Ok(CompanySubscription {
                    company_name: row.company_name,
                    admin_account_id: row.admin_account_id,
                    status: row.status.parse()?,
                    trial_ends_at: row.trial_ends_at,
                })
            })
            .collect()
    }
}
