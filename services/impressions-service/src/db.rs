use async_trait::async_trait;
use tokio_postgres::{error::SqlState, Client, GenericClient, NoTls};

use crate::error::IngestError;
use crate::models::Impression;

pub const IMPRESSIONS_TABLE: &str = "impressions";

const SQL_TABLE_EXISTS: &str = "SELECT EXISTS (\
SELECT 1 FROM pg_catalog.pg_tables WHERE schemaname = current_schema() AND tablename = $1)";
// `key` and `time` collide with SQL keywords and are always quoted.
const IMPRESSION_COLUMNS: &str = "\"key\" VARCHAR(255), \
split VARCHAR(255), \
environment_id VARCHAR(255), \
environment_name VARCHAR(255), \
treatment VARCHAR(255), \
\"time\" BIGINT, \
label VARCHAR(255), \
split_version_number BIGINT, \
sdk VARCHAR(255), \
sdk_version VARCHAR(255)";
const INSERT_COLUMNS: &str = "\"key\", split, environment_id, environment_name, treatment, \
\"time\", label, split_version_number, sdk, sdk_version";

pub fn create_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (\
id BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY, \
{IMPRESSION_COLUMNS}, \
created_at TIMESTAMPTZ NOT NULL DEFAULT NOW())"
    )
}

pub fn insert_impression_sql(table: &str) -> String {
    format!(
        "INSERT INTO {table} ({INSERT_COLUMNS}) \
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
    )
}

/// Write side of the webhook. Implementations are shared across requests.
#[async_trait]
pub trait ImpressionStore: Send + Sync {
    /// Creates the destination table when it is missing. Repeated and
    /// concurrent calls succeed.
    async fn ensure_schema(&self) -> Result<(), IngestError>;

    /// Inserts every impression in order, one statement each, and returns the
    /// number of rows written. Rows written before a failure stay committed.
    async fn insert_batch(&self, impressions: &[Impression]) -> Result<u64, IngestError>;
}

/// Opens a fresh connection per operation; the connection string is the only
/// state it holds.
pub struct PgImpressionStore {
    database_url: String,
}

impl PgImpressionStore {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
        }
    }

    async fn connect(&self) -> Result<Client, IngestError> {
        let (client, connection) = tokio_postgres::connect(&self.database_url, NoTls)
            .await
            .map_err(|source| IngestError::persistence("connect", source))?;
        tokio::spawn(async move {
            // Drive the connection in the background.
            if let Err(err) = connection.await {
                tracing::error!(error = %err, "database connection error");
            }
        });
        Ok(client)
    }
}

#[async_trait]
impl ImpressionStore for PgImpressionStore {
    async fn ensure_schema(&self) -> Result<(), IngestError> {
        let client = self.connect().await?;
        ensure_table(&client).await
    }

    async fn insert_batch(&self, impressions: &[Impression]) -> Result<u64, IngestError> {
        let client = self.connect().await?;
        insert_impressions(&client, impressions).await
    }
}

pub async fn table_exists(db: &impl GenericClient) -> Result<bool, IngestError> {
    let row = db
        .query_one(SQL_TABLE_EXISTS, &[&IMPRESSIONS_TABLE])
        .await
        .map_err(|source| IngestError::persistence("check table", source))?;
    Ok(row.get(0))
}

pub async fn ensure_table(db: &impl GenericClient) -> Result<(), IngestError> {
    if table_exists(db).await? {
        return Ok(());
    }

    let sql = create_table_sql(IMPRESSIONS_TABLE);
    match db.execute(sql.as_str(), &[]).await {
        Ok(_) => {
            tracing::info!(table = IMPRESSIONS_TABLE, "created table");
            Ok(())
        }
        Err(err) if lost_create_race(&err) => {
            tracing::debug!(table = IMPRESSIONS_TABLE, error = %err, "table created concurrently");
            Ok(())
        }
        Err(source) => Err(IngestError::persistence("create table", source)),
    }
}

// Concurrent CREATE TABLE IF NOT EXISTS can still trip over the catalog's
// unique index on type names.
fn lost_create_race(err: &tokio_postgres::Error) -> bool {
    matches!(
        err.code(),
        Some(code) if *code == SqlState::DUPLICATE_TABLE || *code == SqlState::UNIQUE_VIOLATION
    )
}

pub async fn insert_impressions(
    db: &impl GenericClient,
    impressions: &[Impression],
) -> Result<u64, IngestError> {
    let statement = db
        .prepare(&insert_impression_sql(IMPRESSIONS_TABLE))
        .await
        .map_err(|source| IngestError::persistence("prepare insert", source))?;

    let mut written = 0u64;
    for impression in impressions {
        written += db
            .execute(
                &statement,
                &[
                    &impression.key,
                    &impression.split,
                    &impression.environment_id,
                    &impression.environment_name,
                    &impression.treatment,
                    &impression.time,
                    &impression.label,
                    &impression.split_version_number,
                    &impression.sdk,
                    &impression.sdk_version,
                ],
            )
            .await
            .map_err(|source| IngestError::persistence("insert impression", source))?;
    }
    Ok(written)
}
