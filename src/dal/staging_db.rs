use async_trait::async_trait;
use sqlx::{postgres::PgQueryResult, Acquire, PgConnection, PgPool, Postgres, Transaction};

use crate::{domain::staging_row::StagingRow, services::StagingStore};

pub async fn create_staging_table(pool: &PgPool) -> Result<PgQueryResult, sqlx::Error> {
    sqlx::query(
        r"
        create table if not exists staging (
            bank_name varchar(255),
            branch_name varchar(1000),
            location varchar(500),
            review_text text,
            rating varchar(255),
            review_date varchar(255),
            scraping_date date
        )
        ",
    )
    .execute(pool)
    .await
}

pub async fn insert_staging_row(
    con: &mut PgConnection,
    row: &StagingRow,
) -> Result<PgQueryResult, sqlx::Error> {
    sqlx::query(
        r"
        insert into staging
            (bank_name, branch_name, location, review_text, rating, review_date, scraping_date)
        values
            ($1, $2, $3, $4, $5, $6, $7)
        ",
    )
    .bind(&row.bank_name)
    .bind(&row.branch_name)
    .bind(&row.location)
    .bind(&row.review_text)
    .bind(&row.rating)
    .bind(&row.review_date)
    .bind(row.scraping_date)
    .execute(con)
    .await
}

pub struct PgStagingStore {
    pool: PgPool,
}

impl PgStagingStore {
    pub fn new(pool: PgPool) -> Self {
        PgStagingStore { pool }
    }
}

#[async_trait]
impl StagingStore for PgStagingStore {
    type Transaction = Transaction<'static, Postgres>;

    async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        create_staging_table(&self.pool).await.map(|_| ())
    }

    async fn begin(&self) -> Result<Self::Transaction, sqlx::Error> {
        self.pool.begin().await
    }

    async fn insert_row(
        &self,
        tx: &mut Self::Transaction,
        row: &StagingRow,
    ) -> Result<(), sqlx::Error> {
        // Postgres refuses every statement after a failed one unless it ran in a savepoint.
        let mut savepoint = tx.begin().await?;
        match insert_staging_row(&mut savepoint, row).await {
            Ok(_) => savepoint.commit().await,
            Err(e) => {
                if let Err(rollback) = savepoint.rollback().await {
                    log::error!("Failed to roll back staging row savepoint: {:?}", rollback);
                }
                Err(e)
            }
        }
    }

    async fn commit(&self, tx: Self::Transaction) -> Result<(), sqlx::Error> {
        tx.commit().await
    }

    async fn rollback(&self, tx: Self::Transaction) -> Result<(), sqlx::Error> {
        tx.rollback().await
    }
}
