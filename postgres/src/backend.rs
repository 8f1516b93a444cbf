//! [`RegistrationBackend`] over `PostgreSQL`.

use crate::config::PostgresConfig;
use crate::error::{is_undefined_table, map_sqlx_error, violates};
use crate::schema::{CATALOG_TABLE, catalog_ddl, event_table_ddl, number_constraint, table_name};
use registration_core::{
    BackendFuture, CollectionHandle, EventName, RegistrationBackend, RegistrationError, RegistrationId,
    RegistrationNumber, RegistrationQuery, RegistrationRecord, Result,
};
use serde_json::Value;
use sqlx::postgres::PgPool;
use sqlx::{Postgres, QueryBuilder};

/// `PostgreSQL` registration backend.
///
/// One table per event, listed in the `registration_collections` catalog.
/// Each row keeps the full record as JSONB next to the columns that
/// listing and lookups filter on.
///
/// # Example
///
/// ```no_run
/// use registration_postgres::{PostgresConfig, PostgresRegistrationBackend};
/// use registration_runtime::RegistrationStore;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = PostgresRegistrationBackend::connect(&PostgresConfig::from_env()?).await?;
/// backend.migrate().await?;
///
/// let store = RegistrationStore::new(Arc::new(backend));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct PostgresRegistrationBackend {
    pool: PgPool,
}

impl PostgresRegistrationBackend {
    /// Use an existing pool.
    ///
    /// The collection catalog is created by [`migrate`](Self::migrate) or,
    /// failing that, by the first collection creation. Until then every
    /// event reads as having no collection.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool from `config`.
    ///
    /// # Errors
    ///
    /// `Unavailable` if the database cannot be reached.
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        let pool = config
            .connect()
            .await
            .map_err(|e| RegistrationError::Unavailable(format!("Failed to connect: {e}")))?;
        tracing::info!(max_connections = config.max_connections, "Connected to PostgreSQL");
        Ok(Self::from_pool(pool))
    }

    /// Create the collection catalog if it does not exist.
    ///
    /// # Errors
    ///
    /// Database errors, mapped as for every other operation.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(&catalog_ddl())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", &e))?;
        tracing::debug!("Registration catalog ready");
        Ok(())
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn open(&self, event_name: &EventName) -> Result<Option<CollectionHandle>> {
        let row: std::result::Result<Option<(String,)>, sqlx::Error> = sqlx::query_as(&format!(
            "SELECT table_name FROM {CATALOG_TABLE} WHERE event_name = $1"
        ))
        .bind(event_name.as_str())
        .fetch_optional(&self.pool)
        .await;

        match row {
            Ok(row) => Ok(row.map(|(table,)| CollectionHandle::new(event_name.clone(), table))),
            // No catalog yet, so no collections either.
            Err(e) if is_undefined_table(&e) => Ok(None),
            Err(e) => Err(map_sqlx_error("open collection", &e)),
        }
    }

    async fn create(&self, event_name: &EventName) -> Result<CollectionHandle> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("create collection", &e))?;

        // Serializes creators across processes; released on commit. The
        // catalog lock is always taken before the event lock.
        for key in [CATALOG_TABLE, event_name.as_str()] {
            sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
                .bind(key)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("create collection", &e))?;
        }
        sqlx::query(&catalog_ddl())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("create collection", &e))?;

        let existing: Option<(String,)> = sqlx::query_as(&format!(
            "SELECT table_name FROM {CATALOG_TABLE} WHERE event_name = $1"
        ))
        .bind(event_name.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("create collection", &e))?;

        let table = if let Some((table,)) = existing {
            table
        } else {
            let table = table_name(event_name);
            for statement in event_table_ddl(&table) {
                sqlx::query(&statement)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error("create collection", &e))?;
            }
            sqlx::query(&format!(
                "INSERT INTO {CATALOG_TABLE} (event_name, table_name) VALUES ($1, $2) ON CONFLICT (event_name) DO NOTHING"
            ))
            .bind(event_name.as_str())
            .bind(&table)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("create collection", &e))?;
            tracing::info!(event = %event_name, table = %table, "Created registration table");
            table
        };

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("create collection", &e))?;
        Ok(CollectionHandle::new(event_name.clone(), table))
    }

    async fn insert_record(&self, collection: &CollectionHandle, record: &RegistrationRecord) -> Result<()> {
        let table = collection.name();
        let row = Row::of(record)?;
        let result = sqlx::query(&format!(
            r"
            INSERT INTO {table} (
                id, registration_number, event_name, email, phone, team_name,
                registration_status, payment_status, checked_in,
                submitted_at, updated_at, revision, document
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "
        ))
        .bind(record.id.0)
        .bind(record.registration_number.as_str())
        .bind(record.event_name.as_str())
        .bind(row.email)
        .bind(row.phone)
        .bind(row.team_name)
        .bind(record.registration_status.as_str())
        .bind(record.payment_status().as_str())
        .bind(record.is_checked_in())
        .bind(record.submitted_at)
        .bind(record.updated_at)
        .bind(row.revision)
        .bind(row.document)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if violates(&e, &number_constraint(table)) => Err(RegistrationError::DuplicateKey {
                event_name: record.event_name.to_string(),
                registration_number: record.registration_number.to_string(),
            }),
            Err(e) => Err(map_sqlx_error("insert", &e)),
        }
    }

    async fn fetch_by_id(&self, collection: &CollectionHandle, id: RegistrationId) -> Result<Option<RegistrationRecord>> {
        let row: Option<(Value,)> = sqlx::query_as(&format!(
            "SELECT document FROM {} WHERE id = $1",
            collection.name()
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch", &e))?;
        row.map(|(document,)| decode(collection, document)).transpose()
    }

    async fn fetch_by_registration_number(
        &self,
        collection: &CollectionHandle,
        number: &RegistrationNumber,
    ) -> Result<Option<RegistrationRecord>> {
        let row: Option<(Value,)> = sqlx::query_as(&format!(
            "SELECT document FROM {} WHERE registration_number = $1",
            collection.name()
        ))
        .bind(number.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch by number", &e))?;
        row.map(|(document,)| decode(collection, document)).transpose()
    }

    async fn replace_record(
        &self,
        collection: &CollectionHandle,
        expected_revision: u64,
        record: &RegistrationRecord,
    ) -> Result<()> {
        let table = collection.name();
        let row = Row::of(record)?;
        let expected = i64::try_from(expected_revision)
            .map_err(|_| RegistrationError::Internal(format!("Revision {expected_revision} out of range")))?;

        let result = sqlx::query(&format!(
            r"
            UPDATE {table} SET
                email = $3, phone = $4, team_name = $5,
                registration_status = $6, payment_status = $7, checked_in = $8,
                updated_at = $9, revision = $10, document = $11
            WHERE id = $1 AND revision = $2
            "
        ))
        .bind(record.id.0)
        .bind(expected)
        .bind(row.email)
        .bind(row.phone)
        .bind(row.team_name)
        .bind(record.registration_status.as_str())
        .bind(record.payment_status().as_str())
        .bind(record.is_checked_in())
        .bind(record.updated_at)
        .bind(row.revision)
        .bind(row.document)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("replace", &e))?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let exists: Option<(i64,)> = sqlx::query_as(&format!("SELECT revision FROM {table} WHERE id = $1"))
            .bind(record.id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("replace", &e))?;
        Err(match exists {
            Some(_) => RegistrationError::ConcurrentModification {
                id: record.id.to_string(),
                expected: expected_revision,
            },
            None => RegistrationError::NotFound {
                event_name: collection.event_name().to_string(),
                id: record.id.to_string(),
            },
        })
    }

    async fn query_records(
        &self,
        collection: &CollectionHandle,
        query: &RegistrationQuery,
    ) -> Result<Vec<RegistrationRecord>> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT document FROM ");
        builder.push(collection.name()).push(" WHERE TRUE");
        if let Some(status) = query.registration_status {
            builder.push(" AND registration_status = ").push_bind(status.as_str());
        }
        if let Some(status) = query.payment_status {
            builder.push(" AND payment_status = ").push_bind(status.as_str());
        }
        if let Some(checked_in) = query.checked_in {
            builder.push(" AND checked_in = ").push_bind(checked_in);
        }
        if let Some(email) = &query.email {
            builder.push(" AND email = ").push_bind(email.clone());
        }
        if let Some(team_name) = &query.team_name {
            builder.push(" AND team_name = ").push_bind(team_name.clone());
        }
        builder.push(" ORDER BY submitted_at DESC, id");
        if let Some(limit) = query.limit {
            builder.push(" LIMIT ").push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let rows: Vec<(Value,)> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("query", &e))?;
        rows.into_iter()
            .map(|(document,)| decode(collection, document))
            .collect()
    }
}

/// Column values derived from a record.
struct Row {
    email: Option<String>,
    phone: Option<String>,
    team_name: Option<String>,
    revision: i64,
    document: Value,
}

impl Row {
    fn of(record: &RegistrationRecord) -> Result<Self> {
        let document = Value::Object(record.to_document()?);
        if let Some(field) = nul_path("", &document) {
            return Err(RegistrationError::validation(field, "must not contain NUL characters"));
        }
        Ok(Self {
            email: record.applicant.email.clone(),
            phone: record.primary_phone().map(str::to_string),
            team_name: record.team.team_name.clone(),
            revision: i64::try_from(record.revision)
                .map_err(|_| RegistrationError::Internal(format!("Revision {} out of range", record.revision)))?,
            document,
        })
    }
}

/// Path of the first string holding `\0`, which neither TEXT nor JSONB accept.
fn nul_path(path: &str, value: &Value) -> Option<String> {
    let child = |key: &dyn std::fmt::Display| {
        if path.is_empty() { key.to_string() } else { format!("{path}.{key}") }
    };
    match value {
        Value::String(s) if s.contains('\0') => Some(path.to_string()),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .find_map(|(index, item)| nul_path(&child(&index), item)),
        Value::Object(map) => map.iter().find_map(|(key, item)| {
            if key.contains('\0') {
                Some(child(&key.escape_default()))
            } else {
                nul_path(&child(key), item)
            }
        }),
        _ => None,
    }
}

fn decode(collection: &CollectionHandle, document: Value) -> Result<RegistrationRecord> {
    match document {
        Value::Object(map) => RegistrationRecord::from_document(map)
            .map_err(|e| RegistrationError::Internal(format!("Corrupt document in {collection}: {e}"))),
        other => Err(RegistrationError::Internal(format!(
            "Corrupt document in {collection}: expected an object, got {other}"
        ))),
    }
}

impl RegistrationBackend for PostgresRegistrationBackend {
    fn open_collection(&self, event_name: EventName) -> BackendFuture<'_, Option<CollectionHandle>> {
        Box::pin(async move { self.open(&event_name).await })
    }

    fn create_collection(&self, event_name: EventName) -> BackendFuture<'_, CollectionHandle> {
        Box::pin(async move { self.create(&event_name).await })
    }

    fn insert(&self, collection: CollectionHandle, record: RegistrationRecord) -> BackendFuture<'_, ()> {
        Box::pin(async move { self.insert_record(&collection, &record).await })
    }

    fn fetch(&self, collection: CollectionHandle, id: RegistrationId) -> BackendFuture<'_, Option<RegistrationRecord>> {
        Box::pin(async move { self.fetch_by_id(&collection, id).await })
    }

    fn fetch_by_number(
        &self,
        collection: CollectionHandle,
        number: RegistrationNumber,
    ) -> BackendFuture<'_, Option<RegistrationRecord>> {
        Box::pin(async move { self.fetch_by_registration_number(&collection, &number).await })
    }

    fn replace(
        &self,
        collection: CollectionHandle,
        expected_revision: u64,
        record: RegistrationRecord,
    ) -> BackendFuture<'_, ()> {
        Box::pin(async move { self.replace_record(&collection, expected_revision, &record).await })
    }

    fn query(&self, collection: CollectionHandle, query: RegistrationQuery) -> BackendFuture<'_, Vec<RegistrationRecord>> {
        Box::pin(async move { self.query_records(&collection, &query).await })
    }
}
