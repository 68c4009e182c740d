use crate::errors::BotError;
use crate::services::config::DatabaseSettings;
use crate::services::extraction::EntityKind;
use crate::services::logger::Logger;
use crate::stores::EntityStore;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio_postgres::{Client, Config, NoTls};

const SCHEMA_SQL: &str = "CREATE TABLE IF NOT EXISTS emails (email TEXT PRIMARY KEY);\n\
CREATE TABLE IF NOT EXISTS phones (phone_number TEXT PRIMARY KEY);";

#[derive(Clone)]
pub struct PostgresEntityStore {
    logger: Logger,
    config: Config,
    timeout: Duration,
}

impl PostgresEntityStore {
    pub fn new(logger: Logger, settings: &DatabaseSettings) -> Self {
        Self {
            logger: logger.child("postgres"),
            config: build_config(settings),
            timeout: settings.timeout,
        }
    }

    async fn connect(&self) -> Result<Client, BotError> {
        let (client, connection) = with_timeout(
            self.timeout,
            "PostgreSQL connection timed out",
            self.config.connect(NoTls),
        )
        .await?;
        let logger = self.logger.clone();
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                logger.warn(
                    "connection closed with error",
                    Some(&serde_json::json!({ "error": err.to_string() })),
                );
            }
        });
        Ok(client)
    }
}

#[async_trait]
impl EntityStore for PostgresEntityStore {
    async fn save_all(&self, kind: EntityKind, values: &[String]) -> Result<(), BotError> {
        if values.is_empty() {
            return Ok(());
        }
        let mut client = self.connect().await?;
        let sql = insert_sql(kind);
        with_timeout(
            self.timeout,
            "PostgreSQL insert timed out",
            insert_values(&mut client, &sql, values),
        )
        .await?;
        self.logger.info(
            "saved entities",
            Some(&serde_json::json!({ "kind": kind.to_string(), "count": values.len() })),
        );
        Ok(())
    }

    async fn load_all(&self, kind: EntityKind) -> Result<Vec<String>, BotError> {
        let client = self.connect().await?;
        let sql = select_sql(kind);
        let rows = with_timeout(
            self.timeout,
            "PostgreSQL query timed out",
            client.query(sql.as_str(), &[]),
        )
        .await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.try_get::<usize, Option<String>>(0).ok().flatten())
            .collect())
    }

    async fn ensure_schema(&self) -> Result<(), BotError> {
        let client = self.connect().await?;
        with_timeout(
            self.timeout,
            "PostgreSQL schema setup timed out",
            client.batch_execute(SCHEMA_SQL),
        )
        .await?;
        self.logger.info("schema ready", None);
        Ok(())
    }
}

fn build_config(settings: &DatabaseSettings) -> Config {
    let mut config = Config::new();
    config
        .host(&settings.host)
        .port(settings.port)
        .user(&settings.user)
        .dbname(&settings.database)
        .connect_timeout(settings.timeout);
    if !settings.password.is_empty() {
        config.password(&settings.password);
    }
    config
}

fn insert_sql(kind: EntityKind) -> String {
    format!(
        "INSERT INTO {}({}) VALUES ($1) ON CONFLICT DO NOTHING",
        kind.table(),
        kind.column()
    )
}

fn select_sql(kind: EntityKind) -> String {
    format!("SELECT {} FROM {}", kind.column(), kind.table())
}

async fn insert_values(
    client: &mut Client,
    sql: &str,
    values: &[String],
) -> Result<(), tokio_postgres::Error> {
    let transaction = client.transaction().await?;
    let statement = transaction.prepare(sql).await?;
    for value in values {
        transaction.execute(&statement, &[&value.as_str()]).await?;
    }
    transaction.commit().await
}

async fn with_timeout<T, F>(timeout: Duration, label: &str, fut: F) -> Result<T, BotError>
where
    F: Future<Output = Result<T, tokio_postgres::Error>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| BotError::timeout(label))?
        .map_err(map_pg_error)
}

fn map_pg_error(err: tokio_postgres::Error) -> BotError {
    BotError::transport(format!("PostgreSQL error: {}", err))
}
