// PostgreSQL backend: payloads live in server-side large objects, names and
// sizes in three side tables, all inside explicit transactions.
use crate::core_db::{DbConnection, DbPool};
use crate::core_storage::{Blob, ObjectStore, Oid, StorageError, StoreTransaction, StoredObject};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, trace, warn};
use sqlx::postgres::types::Oid as PgOid;
use sqlx::{Connection, PgConnection};
use uuid::Uuid;

/// `lo_open` mode flag for read access.
const INV_READ: i32 = 0x40000;
/// `whence` argument of `lo_lseek64` seeking from the end of the object.
const SEEK_END: i32 = 2;

pub struct PgObjectStore {
    pool: DbPool<PgConnection>,
}

impl PgObjectStore {
    /// Opens `pool_size` connections to `url` and makes sure the schema exists.
    pub async fn connect(url: &str, pool_size: usize) -> Result<Self, StorageError> {
        let pool = DbPool::connect(pool_size, |slot| async move {
            debug!("Opening database connection {}", slot);
            PgConnection::connect(url).await
        })
        .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StorageError> {
        let mut conn = self.pool.get().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS entry (
                guid UUID PRIMARY KEY,
                size BIGINT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS storage (
                internal_uid UUID PRIMARY KEY REFERENCES entry(guid) ON DELETE CASCADE,
                external_uid TEXT NOT NULL UNIQUE
            )
            "#,
        )
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bin_storage (
                guid UUID PRIMARY KEY REFERENCES entry(guid) ON DELETE CASCADE,
                oid OID NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await?;

        info!("Database schema ready");
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for PgObjectStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StorageError> {
        let mut conn = self.pool.get().await?;
        trace!("BEGIN, {} connections left", self.pool.available());
        sqlx::query("BEGIN").execute(&mut *conn).await?;
        Ok(Box::new(PgTransaction { conn: Some(conn) }))
    }
}

#[derive(sqlx::FromRow)]
struct ObjectRow {
    entry_id: Uuid,
    name: String,
    oid: PgOid,
    size: i64,
    created_at: DateTime<Utc>,
}

impl From<ObjectRow> for StoredObject {
    fn from(row: ObjectRow) -> Self {
        StoredObject {
            entry_id: row.entry_id,
            name: row.name,
            oid: row.oid.0,
            size: row.size.max(0) as u64,
            created_at: row.created_at,
        }
    }
}

const SELECT_OBJECTS: &str = r#"
    SELECT e.guid AS entry_id, s.external_uid AS name, b.oid AS oid,
           e.size AS size, e.created_at AS created_at
    FROM entry e
    JOIN storage s ON s.internal_uid = e.guid
    JOIN bin_storage b ON b.guid = e.guid
"#;

/// One open transaction on a checked-out connection.
pub struct PgTransaction {
    conn: Option<DbConnection<PgConnection>>,
}

impl PgTransaction {
    fn conn(&mut self) -> Result<&mut PgConnection, StorageError> {
        match self.conn.as_mut() {
            Some(conn) => Ok(&mut **conn),
            None => Err(StorageError::TransactionClosed),
        }
    }

    async fn finish(&mut self, statement: &'static str) -> Result<(), StorageError> {
        let mut conn = self.conn.take().ok_or(StorageError::TransactionClosed)?;
        sqlx::query(statement).execute(&mut *conn).await?;
        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn resolve(&mut self, name: &str) -> Result<Option<StoredObject>, StorageError> {
        let sql = format!("{} WHERE s.external_uid = $1", SELECT_OBJECTS);
        let row = sqlx::query_as::<_, ObjectRow>(&sql)
            .bind(name)
            .fetch_optional(self.conn()?)
            .await?;
        Ok(row.map(StoredObject::from))
    }

    async fn list(&mut self) -> Result<Vec<StoredObject>, StorageError> {
        let sql = format!("{} ORDER BY s.external_uid", SELECT_OBJECTS);
        let rows = sqlx::query_as::<_, ObjectRow>(&sql)
            .fetch_all(self.conn()?)
            .await?;
        Ok(rows.into_iter().map(StoredObject::from).collect())
    }

    async fn create_object(&mut self) -> Result<Oid, StorageError> {
        let oid: PgOid = sqlx::query_scalar("SELECT lo_create(0)")
            .fetch_one(self.conn()?)
            .await?;
        debug!("Created large object {}", oid.0);
        Ok(oid.0)
    }

    async fn object_len(&mut self, oid: Oid) -> Result<u64, StorageError> {
        let conn = self.conn()?;
        let fd: i32 = sqlx::query_scalar("SELECT lo_open($1, $2)")
            .bind(PgOid(oid))
            .bind(INV_READ)
            .fetch_one(&mut *conn)
            .await?;
        let len: i64 = sqlx::query_scalar("SELECT lo_lseek64($1, 0, $2)")
            .bind(fd)
            .bind(SEEK_END)
            .fetch_one(&mut *conn)
            .await?;
        sqlx::query("SELECT lo_close($1)")
            .bind(fd)
            .execute(&mut *conn)
            .await?;
        Ok(len.max(0) as u64)
    }

    async fn read_object(
        &mut self,
        oid: Oid,
        offset: u64,
        len: usize,
    ) -> Result<Blob, StorageError> {
        let len = i32::try_from(len).unwrap_or(i32::MAX);
        let data: Vec<u8> = sqlx::query_scalar("SELECT lo_get($1, $2, $3)")
            .bind(PgOid(oid))
            .bind(offset as i64)
            .bind(len)
            .fetch_one(self.conn()?)
            .await?;
        Ok(Blob::new(data))
    }

    async fn write_object(
        &mut self,
        oid: Oid,
        offset: u64,
        data: &[u8],
    ) -> Result<(), StorageError> {
        sqlx::query("SELECT lo_put($1, $2, $3)")
            .bind(PgOid(oid))
            .bind(offset as i64)
            .bind(data)
            .execute(self.conn()?)
            .await?;
        Ok(())
    }

    async fn insert_entry(
        &mut self,
        entry_id: Uuid,
        name: &str,
        oid: Oid,
        size: u64,
    ) -> Result<(), StorageError> {
        let conn = self.conn()?;

        sqlx::query("INSERT INTO entry (guid, size) VALUES ($1, $2)")
            .bind(entry_id)
            .bind(size as i64)
            .execute(&mut *conn)
            .await?;

        sqlx::query("INSERT INTO storage (internal_uid, external_uid) VALUES ($1, $2)")
            .bind(entry_id)
            .bind(name)
            .execute(&mut *conn)
            .await?;

        sqlx::query("INSERT INTO bin_storage (guid, oid) VALUES ($1, $2)")
            .bind(entry_id)
            .bind(PgOid(oid))
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    async fn update_entry_size(&mut self, entry_id: Uuid, size: u64) -> Result<(), StorageError> {
        let result = sqlx::query("UPDATE entry SET size = $2 WHERE guid = $1")
            .bind(entry_id)
            .bind(size as i64)
            .execute(self.conn()?)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::MissingEntry(entry_id));
        }
        Ok(())
    }

    async fn delete_entry(&mut self, object: &StoredObject) -> Result<(), StorageError> {
        let conn = self.conn()?;

        sqlx::query("SELECT lo_unlink($1)")
            .bind(PgOid(object.oid))
            .execute(&mut *conn)
            .await?;

        sqlx::query("DELETE FROM bin_storage WHERE guid = $1")
            .bind(object.entry_id)
            .execute(&mut *conn)
            .await?;

        sqlx::query("DELETE FROM storage WHERE internal_uid = $1")
            .bind(object.entry_id)
            .execute(&mut *conn)
            .await?;

        let result = sqlx::query("DELETE FROM entry WHERE guid = $1")
            .bind(object.entry_id)
            .execute(&mut *conn)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::MissingEntry(object.entry_id));
        }
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), StorageError> {
        self.finish("COMMIT").await
    }

    async fn rollback(mut self: Box<Self>) -> Result<(), StorageError> {
        self.finish("ROLLBACK").await
    }
}

impl Drop for PgTransaction {
    fn drop(&mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                        warn!("Rollback of abandoned transaction failed: {}", e);
                    }
                });
            }
            Err(_) => warn!("Abandoned transaction dropped outside of a runtime"),
        }
    }
}
