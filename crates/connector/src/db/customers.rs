//! Customer repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::instrument;

use commerce_connector_core::{CustomerId, Email};

use super::RepositoryError;
use crate::managers::{Customer, CustomerManager, ManagerError, Outcome};

#[derive(FromRow)]
struct CustomerRow {
    id: i32,
    email: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = RepositoryError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        Ok(Self {
            id: CustomerId::new(row.id),
            email,
            created_at: row.created_at,
        })
    }
}

/// Postgres-backed [`CustomerManager`].
#[derive(Debug, Clone)]
pub struct PgCustomerManager {
    pool: PgPool,
}

impl PgCustomerManager {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a customer, or return the existing one with that email in any
    /// letter case. The stored spelling is kept.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn register(&self, email: &Email) -> Result<Customer, RepositoryError> {
        let row: CustomerRow = sqlx::query_as(
            r"
            INSERT INTO connector.customer (email)
            VALUES ($1)
            ON CONFLICT ((lower(email))) DO UPDATE SET email = connector.customer.email
            RETURNING id, email, created_at
            ",
        )
        .bind(email.as_str())
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }
}

#[async_trait]
impl CustomerManager for PgCustomerManager {
    #[instrument(skip(self, email), fields(domain = email.domain()))]
    async fn find_by_email(&self, email: &Email) -> Result<Option<Customer>, ManagerError> {
        let row: Option<CustomerRow> = sqlx::query_as(
            "SELECT id, email, created_at FROM connector.customer WHERE lower(email) = lower($1)",
        )
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.map(Customer::try_from).transpose()?)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: CustomerId) -> Result<Outcome<()>, ManagerError> {
        let result = sqlx::query("DELETE FROM connector.customer WHERE id = $1")
            .bind(id.as_i32())
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        if result.rows_affected() == 0 {
            return Ok(Outcome::NotFound);
        }
        Ok(Outcome::Done(()))
    }
}
