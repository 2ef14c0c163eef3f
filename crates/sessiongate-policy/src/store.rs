//! Durable session registry backed by `SQLite`.
//!
//! # Features
//!
//! - Persistent storage in a single `session_policies` table
//! - Connection pooling via `r2d2`
//! - An LRU read cache that every write refreshes with the row it stored
//! - Counter updates run inside an immediate transaction, so a failed commit
//!   leaves the row untouched
//!
//! Amounts are stored as `0x`-prefixed hex text. Timestamps and intervals are
//! `u64` values stored bit-for-bit in `INTEGER` columns.
//!
//! The cache is per process, so it can serve a row that another process has
//! since changed. [`SessionRegistry::compare_and_commit`] re-reads the row
//! inside its transaction and refuses the write when it no longer matches,
//! which keeps two processes on one file from overwriting each other's usage.
//!
//! # Example
//!
//! ```
//! use sessiongate_policy::registry::SessionRegistry;
//! use sessiongate_policy::store::SqliteRegistry;
//! use sessiongate_core::types::{Asset, PolicyGrant, SessionPolicy};
//! use alloy_primitives::{Address, U256};
//!
//! let registry = SqliteRegistry::in_memory().unwrap();
//! let grant = PolicyGrant::new(Address::repeat_byte(1), Address::repeat_byte(2), Asset::Native)
//!     .with_window(0, 100)
//!     .with_limit(U256::from(10u64));
//!
//! registry.put(SessionPolicy::from_grant(&grant)).unwrap();
//! assert!(registry.get(&grant.key()).unwrap().is_some());
//! ```

use crate::registry::{apply_commit, ensure_unchanged, validate_policy, SessionRegistry};
use alloy_primitives::{Address, U256};
use lru::LruCache;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use sessiongate_core::error::{PolicyError, SessionGateError, StoreError};
use sessiongate_core::types::{Asset, PolicyKey, SessionPolicy, Timestamp};
use std::num::NonZeroUsize;
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;

/// Default number of policies kept in the read cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Connections kept by a file-backed pool.
const FILE_POOL_SIZE: u32 = 8;

/// How long a connection waits on a locked database.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SELECT_COLUMNS: &str = "account, signer, asset, valid_after, valid_until, \
                              limit_amount, limit_used, last_used, refresh_interval";

/// Raw column values of one `session_policies` row.
type RawRow = (String, String, String, i64, i64, String, String, i64, i64);

/// A [`SessionRegistry`] persisted in `SQLite`.
///
/// This type is `Send + Sync`. The pool handles concurrent connections.
/// Writes are serialized by `writes`, which also orders their cache updates.
pub struct SqliteRegistry {
    pool: Pool<SqliteConnectionManager>,
    cache: Mutex<ReadCache>,
    writes: Mutex<()>,
}

/// Cached rows plus a counter bumped by every write.
///
/// A reader that missed only fills the cache if the counter is unchanged
/// since the miss. Otherwise the row it selected may predate a write that
/// has already been published.
struct ReadCache {
    entries: LruCache<PolicyKey, SessionPolicy>,
    generation: u64,
}

impl std::fmt::Debug for SqliteRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteRegistry")
            .field("connections", &self.pool.state().connections)
            .finish_non_exhaustive()
    }
}

impl SqliteRegistry {
    /// Opens (or creates) a registry at `db_path` with the default cache size.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the database cannot be opened or
    /// the schema cannot be created.
    pub fn new(db_path: &Path) -> Result<Self, StoreError> {
        Self::open(db_path, DEFAULT_CACHE_CAPACITY)
    }

    /// Opens (or creates) a registry at `db_path` caching up to
    /// `cache_capacity` policies.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the database cannot be opened or
    /// the schema cannot be created.
    pub fn open(db_path: &Path, cache_capacity: usize) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let manager =
            SqliteConnectionManager::file(db_path).with_init(|conn| conn.busy_timeout(BUSY_TIMEOUT));
        Self::from_manager(manager, FILE_POOL_SIZE, cache_capacity)
    }

    /// Creates a registry in a private in-memory database.
    ///
    /// Every in-memory connection is its own database, so the pool holds a
    /// single connection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the schema cannot be created.
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::from_manager(
            SqliteConnectionManager::memory(),
            1,
            DEFAULT_CACHE_CAPACITY,
        )
    }

    fn from_manager(
        manager: SqliteConnectionManager,
        pool_size: u32,
        cache_capacity: usize,
    ) -> Result<Self, StoreError> {
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e| StoreError::database(format!("failed to build pool: {e}")))?;

        let registry = Self {
            pool,
            cache: Mutex::new(ReadCache {
                entries: LruCache::new(
                    NonZeroUsize::new(cache_capacity).unwrap_or(NonZeroUsize::MIN),
                ),
                generation: 0,
            }),
            writes: Mutex::new(()),
        };

        registry.init_schema()?;
        Ok(registry)
    }

    fn get_conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, StoreError> {
        self.pool
            .get()
            .map_err(|e| StoreError::database(format!("no connection available: {e}")))
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.get_conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS session_policies (
                account TEXT NOT NULL,
                signer TEXT NOT NULL,
                asset TEXT NOT NULL,
                valid_after INTEGER NOT NULL,
                valid_until INTEGER NOT NULL,
                limit_amount TEXT NOT NULL,
                limit_used TEXT NOT NULL,
                last_used INTEGER NOT NULL,
                refresh_interval INTEGER NOT NULL,
                PRIMARY KEY (account, signer, asset)
            );
            CREATE INDEX IF NOT EXISTS idx_session_policies_account
                ON session_policies(account);",
        )
        .map_err(db_err)
    }

    /// Returns the number of stored policies.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    pub fn count(&self) -> Result<usize, StoreError> {
        let conn = self.get_conn()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM session_policies", [], |row| row.get(0))
            .map_err(db_err)?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn lock_writes(&self) -> Result<std::sync::MutexGuard<'_, ()>, StoreError> {
        self.writes
            .lock()
            .map_err(|_| StoreError::database("registry write lock poisoned"))
    }

    /// Records `policy` as the latest stored row. Callers hold `writes`.
    fn publish(&self, policy: &SessionPolicy) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.generation = cache.generation.wrapping_add(1);
            cache.entries.put(policy.key(), policy.clone());
        }
    }

    /// Drops `key` from the cache. Callers hold `writes`.
    fn forget(&self, key: &PolicyKey) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.generation = cache.generation.wrapping_add(1);
            cache.entries.pop(key);
        }
    }

    /// Writes new counters for `key`, optionally only if the row still
    /// equals `expected`.
    fn write_counters(
        &self,
        key: &PolicyKey,
        expected: Option<&SessionPolicy>,
        new_limit_used: U256,
        new_last_used: Timestamp,
    ) -> Result<SessionPolicy, SessionGateError> {
        let _writer = self.lock_writes()?;
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db_err)?;

        let Some(current) = Self::select(&tx, key)? else {
            drop(tx);
            self.forget(key);
            return Err(PolicyError::policy_not_found(*key).into());
        };
        if let Some(expected) = expected {
            if let Err(conflict) = ensure_unchanged(&current, expected) {
                drop(tx);
                // The caller re-reads after a conflict; hand it the row it lost to.
                self.publish(&current);
                tracing::debug!(%key, "Counter write refused, row changed since read");
                return Err(conflict.into());
            }
        }
        let updated = apply_commit(&current, new_limit_used, new_last_used)?;

        tx.execute(
            "UPDATE session_policies SET limit_used = ?1, last_used = ?2
             WHERE account = ?3 AND signer = ?4 AND asset = ?5",
            params![
                format!("{:#x}", updated.limit_used),
                to_sql_int(updated.last_used),
                key.account.to_string(),
                key.signer.to_string(),
                key.asset.to_string()
            ],
        )
        .map_err(db_err)?;
        tx.commit().map_err(db_err)?;

        self.publish(&updated);
        Ok(updated)
    }

    fn select(conn: &Connection, key: &PolicyKey) -> Result<Option<SessionPolicy>, StoreError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM session_policies
             WHERE account = ?1 AND signer = ?2 AND asset = ?3"
        );
        let raw = conn
            .query_row(
                &sql,
                params![
                    key.account.to_string(),
                    key.signer.to_string(),
                    key.asset.to_string()
                ],
                read_row,
            )
            .optional()
            .map_err(db_err)?;

        raw.map(decode_row).transpose()
    }
}

impl SessionRegistry for SqliteRegistry {
    fn get(&self, key: &PolicyKey) -> Result<Option<SessionPolicy>, StoreError> {
        let seen = match self.cache.lock() {
            Ok(mut cache) => {
                if let Some(policy) = cache.entries.get(key) {
                    return Ok(Some(policy.clone()));
                }
                Some(cache.generation)
            }
            Err(_) => None,
        };

        let found = {
            let conn = self.get_conn()?;
            Self::select(&conn, key)?
        };

        if let (Some(policy), Some(seen)) = (&found, seen) {
            if let Ok(mut cache) = self.cache.lock() {
                if cache.generation == seen {
                    cache.entries.put(*key, policy.clone());
                }
            }
        }
        Ok(found)
    }

    fn put(&self, policy: SessionPolicy) -> Result<(), SessionGateError> {
        validate_policy(&policy)?;
        let _writer = self.lock_writes()?;

        let conn = self.get_conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO session_policies
                (account, signer, asset, valid_after, valid_until,
                 limit_amount, limit_used, last_used, refresh_interval)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                policy.account.to_string(),
                policy.signer.to_string(),
                policy.asset.to_string(),
                to_sql_int(policy.valid_after),
                to_sql_int(policy.valid_until),
                format!("{:#x}", policy.limit_amount),
                format!("{:#x}", policy.limit_used),
                to_sql_int(policy.last_used),
                to_sql_int(policy.refresh_interval),
            ],
        )
        .map_err(db_err)?;

        self.publish(&policy);
        Ok(())
    }

    fn commit(
        &self,
        key: &PolicyKey,
        new_limit_used: U256,
        new_last_used: Timestamp,
    ) -> Result<SessionPolicy, SessionGateError> {
        self.write_counters(key, None, new_limit_used, new_last_used)
    }

    fn compare_and_commit(
        &self,
        expected: &SessionPolicy,
        new_limit_used: U256,
        new_last_used: Timestamp,
    ) -> Result<SessionPolicy, SessionGateError> {
        self.write_counters(&expected.key(), Some(expected), new_limit_used, new_last_used)
    }

    fn list(&self, account: Address) -> Result<Vec<SessionPolicy>, StoreError> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM session_policies
             WHERE account = ?1 ORDER BY signer, asset"
        );
        let mut stmt = conn.prepare(&sql).map_err(db_err)?;
        let rows = stmt
            .query_map(params![account.to_string()], read_row)
            .map_err(db_err)?;

        let mut policies = Vec::new();
        for row in rows {
            policies.push(decode_row(row.map_err(db_err)?)?);
        }
        // Checksummed text does not sort like the raw bytes.
        policies.sort_by_key(SessionPolicy::key);
        Ok(policies)
    }
}

// ============================================================================
// Row encoding
// ============================================================================

#[allow(clippy::needless_pass_by_value)]
fn db_err(e: rusqlite::Error) -> StoreError {
    StoreError::database(e.to_string())
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
    ))
}

fn decode_row(raw: RawRow) -> Result<SessionPolicy, StoreError> {
    let (
        account,
        signer,
        asset,
        valid_after,
        valid_until,
        limit_amount,
        limit_used,
        last_used,
        refresh_interval,
    ) = raw;

    Ok(SessionPolicy {
        account: parse_address(&account)?,
        signer: parse_address(&signer)?,
        asset: Asset::from_str(&asset).map_err(|e| StoreError::corrupted(e.to_string()))?,
        valid_after: from_sql_int(valid_after),
        valid_until: from_sql_int(valid_until),
        limit_amount: parse_u256_hex(&limit_amount)?,
        limit_used: parse_u256_hex(&limit_used)?,
        last_used: from_sql_int(last_used),
        refresh_interval: from_sql_int(refresh_interval),
    })
}

fn parse_address(text: &str) -> Result<Address, StoreError> {
    Address::from_str(text)
        .map_err(|e| StoreError::corrupted(format!("invalid address '{text}': {e}")))
}

/// Parses a U256 from a hex string (with or without 0x prefix).
fn parse_u256_hex(hex_str: &str) -> Result<U256, StoreError> {
    let stripped = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    U256::from_str_radix(stripped, 16)
        .map_err(|e| StoreError::corrupted(format!("invalid amount '{hex_str}': {e}")))
}

const fn to_sql_int(value: u64) -> i64 {
    i64::from_ne_bytes(value.to_ne_bytes())
}

const fn from_sql_int(value: i64) -> u64 {
    u64::from_ne_bytes(value.to_ne_bytes())
}
