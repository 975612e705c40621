use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, DatabaseName, OptionalExtension};
use sauce_boss_core::SessionState;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

const LATEST_SCHEMA_VERSION: i64 = 1;

const CREATE_SCHEMA_MIGRATIONS_SQL: &str = r"
CREATE TABLE IF NOT EXISTS schema_migrations (
  version INTEGER PRIMARY KEY,
  applied_at TEXT NOT NULL
);
";

const MIGRATION_001_SQL: &str = r"
CREATE TABLE sessions (
  session_id TEXT PRIMARY KEY,
  state_json TEXT NOT NULL,
  created_at TEXT NOT NULL,
  updated_at TEXT NOT NULL,
  turn_count INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX idx_sessions_updated_at ON sessions(updated_at);
";

pub struct SqliteSessionStore {
    conn: Connection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaStatus {
    pub current_version: i64,
    pub target_version: i64,
    pub pending_versions: Vec<i64>,
}

/// A persisted session with its bookkeeping columns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredSession {
    pub session_id: String,
    pub state: SessionState,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub turn_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionSummary {
    pub session_id: String,
    pub turn_count: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl SqliteSessionStore {
    /// Open a SQLite-backed session store and configure required runtime pragmas.
    ///
    /// # Errors
    /// Returns an error when the database cannot be opened or pragmas cannot be applied.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open sqlite database at {}", path.display()))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to configure sqlite pragmas")?;

        Ok(Self { conn })
    }

    /// Report current and target schema versions plus pending migrations.
    ///
    /// # Errors
    /// Returns an error when schema metadata cannot be read or initialized.
    pub fn schema_status(&self) -> Result<SchemaStatus> {
        self.conn
            .execute_batch(CREATE_SCHEMA_MIGRATIONS_SQL)
            .context("failed to apply schema_migrations table")?;
        let current_version = current_schema_version(&self.conn)?;
        let pending_versions = ((current_version + 1)..=LATEST_SCHEMA_VERSION).collect::<Vec<_>>();

        Ok(SchemaStatus {
            current_version,
            target_version: LATEST_SCHEMA_VERSION,
            pending_versions,
        })
    }

    /// Apply all forward migrations up to the latest supported schema version.
    ///
    /// # Errors
    /// Returns an error when the database holds an unversioned `sessions` table,
    /// was written by a newer schema, or a migration step fails.
    pub fn migrate(&mut self) -> Result<()> {
        self.conn
            .execute_batch(CREATE_SCHEMA_MIGRATIONS_SQL)
            .context("failed to apply schema_migrations table")?;

        let version = current_schema_version(&self.conn)?;
        if version > LATEST_SCHEMA_VERSION {
            return Err(anyhow!(
                "unsupported schema version {version}; expected {LATEST_SCHEMA_VERSION}"
            ));
        }
        if version == 0 {
            if table_exists(&self.conn, "sessions")? {
                return Err(anyhow!(
                    "database has a sessions table without schema_migrations records"
                ));
            }
            self.apply_migration_1()?;
        }
        Ok(())
    }

    fn apply_migration_1(&mut self) -> Result<()> {
        let tx = self.conn.transaction().context("failed to start migration v1 transaction")?;
        tx.execute_batch(MIGRATION_001_SQL).context("failed to create sessions table")?;
        tx.execute(
            "INSERT INTO schema_migrations(version, applied_at) VALUES (?1, ?2)",
            params![1_i64, now_rfc3339()?],
        )
        .context("failed to record migration version 1")?;
        tx.commit().context("failed to commit migration v1")?;
        tracing::info!(version = 1, "applied session schema migration");
        Ok(())
    }

    /// Load one session, or `None` when the id is unknown.
    ///
    /// # Errors
    /// Returns an error when the query fails or the stored row cannot be decoded.
    pub fn load_session(&self, session_id: &str) -> Result<Option<StoredSession>> {
        let row = self
            .conn
            .query_row(
                "SELECT state_json, created_at, updated_at, turn_count
                 FROM sessions WHERE session_id = ?1",
                params![session_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            )
            .optional()
            .with_context(|| format!("failed to load session {session_id}"))?;

        let Some((state_json, created_at, updated_at, turn_count)) = row else {
            return Ok(None);
        };
        let state = serde_json::from_str::<SessionState>(&state_json)
            .with_context(|| format!("session {session_id} has malformed state_json"))?;
        let created_at = parse_rfc3339(&created_at)?;
        let updated_at = parse_rfc3339(&updated_at)?;

        Ok(Some(StoredSession {
            session_id: session_id.to_string(),
            state,
            created_at,
            updated_at,
            turn_count: u32::try_from(turn_count)
                .with_context(|| format!("session {session_id} has invalid turn_count"))?,
        }))
    }

    /// Insert or replace the state of one session and count the turn.
    ///
    /// # Errors
    /// Returns an error when the state cannot be encoded or the write fails.
    pub fn save_session(&mut self, session_id: &str, state: &SessionState) -> Result<()> {
        if session_id.trim().is_empty() {
            return Err(anyhow!("session_id must not be empty"));
        }
        let state_json =
            serde_json::to_string(state).context("failed to encode session state")?;
        let now = now_rfc3339()?;
        self.conn
            .execute(
                "INSERT INTO sessions(session_id, state_json, created_at, updated_at, turn_count)
                 VALUES (?1, ?2, ?3, ?3, 1)
                 ON CONFLICT(session_id) DO UPDATE SET
                   state_json = excluded.state_json,
                   updated_at = excluded.updated_at,
                   turn_count = sessions.turn_count + 1",
                params![session_id, state_json, now],
            )
            .with_context(|| format!("failed to save session {session_id}"))?;
        Ok(())
    }

    /// Delete one session. Returns whether a row was removed.
    ///
    /// # Errors
    /// Returns an error when the delete fails.
    pub fn delete_session(&mut self, session_id: &str) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM sessions WHERE session_id = ?1", params![session_id])
            .with_context(|| format!("failed to delete session {session_id}"))?;
        Ok(deleted > 0)
    }

    /// All sessions, most recently updated first.
    ///
    /// # Errors
    /// Returns an error when the query fails or a row cannot be decoded.
    pub fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT session_id, turn_count, updated_at FROM sessions
                 ORDER BY updated_at DESC, session_id ASC",
            )
            .context("failed to prepare session listing")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, row.get::<_, String>(2)?))
        })?;

        let mut sessions = Vec::new();
        for row in rows {
            let (session_id, turn_count, updated_at) = row?;
            sessions.push(SessionSummary {
                turn_count: u32::try_from(turn_count)
                    .with_context(|| format!("session {session_id} has invalid turn_count"))?,
                updated_at: parse_rfc3339(&updated_at)?,
                session_id,
            });
        }
        Ok(sessions)
    }

    /// Delete sessions not updated since `cutoff`. Returns the number removed.
    ///
    /// # Errors
    /// Returns an error when the delete fails.
    pub fn purge_sessions_before(&mut self, cutoff: OffsetDateTime) -> Result<usize> {
        let cutoff = rfc3339(cutoff)?;
        self.conn
            .execute("DELETE FROM sessions WHERE updated_at < ?1", params![cutoff])
            .context("failed to purge stale sessions")
    }

    /// Create a `SQLite` backup file of the current main database.
    ///
    /// # Errors
    /// Returns an error when backup directories cannot be created or backup fails.
    pub fn backup_database(&self, out_file: &Path) -> Result<()> {
        if let Some(parent) = out_file.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create parent directory for backup file {}", out_file.display())
            })?;
        }

        self.conn
            .backup(DatabaseName::Main, out_file, None)
            .with_context(|| format!("failed to create sqlite backup at {}", out_file.display()))
    }
}

fn table_exists(conn: &Connection, table_name: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            params![table_name],
            |row| row.get::<_, i64>(0),
        )
        .with_context(|| format!("failed to check if table exists: {table_name}"))?;
    Ok(exists == 1)
}

fn current_schema_version(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_migrations", [], |row| {
        row.get::<_, i64>(0)
    })
    .context("failed to read current schema version")
}

fn now_rfc3339() -> Result<String> {
    rfc3339(OffsetDateTime::now_utc())
}

fn rfc3339(value: OffsetDateTime) -> Result<String> {
    value
        .format(&time::format_description::well_known::Rfc3339)
        .context("failed to format RFC3339 timestamp")
}

fn parse_rfc3339(value: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(value, &time::format_description::well_known::Rfc3339)
        .with_context(|| format!("invalid RFC3339 timestamp: {value}"))
}

#[cfg(test)]
mod tests {
    use sauce_boss_core::{HistoryEntry, OutputSpeech, SauceId, SauceSelection};
    use ulid::Ulid;

    use super::*;

    fn memory_store() -> Result<SqliteSessionStore> {
        let mut store = SqliteSessionStore::open(Path::new(":memory:"))?;
        store.migrate()?;
        Ok(store)
    }

    fn sample_state() -> SessionState {
        let mut state = SessionState::default();
        state.actionable_history.record_if_actionable(HistoryEntry::launch());
        state.actionable_history.record_if_actionable(HistoryEntry::recipe_intent(
            SauceSelection::resolved(SauceId::Pesto),
            true,
        ));
        state.speech = Some(OutputSpeech::plain("Blend basil."));
        state
    }

    #[test]
    fn fresh_database_migrates_to_latest() -> Result<()> {
        let store = memory_store()?;
        let status = store.schema_status()?;
        assert_eq!(status.current_version, LATEST_SCHEMA_VERSION);
        assert!(status.pending_versions.is_empty());
        Ok(())
    }

    #[test]
    fn save_and_load_session_round_trip() -> Result<()> {
        let mut store = memory_store()?;
        let state = sample_state();
        store.save_session("session-1", &state)?;

        let loaded = store
            .load_session("session-1")?
            .ok_or_else(|| anyhow!("session-1 should exist after save"))?;
        assert_eq!(loaded.state, state);
        assert_eq!(loaded.turn_count, 1);
        assert_eq!(loaded.created_at, loaded.updated_at);
        Ok(())
    }

    #[test]
    fn saving_again_replaces_state_and_counts_turns() -> Result<()> {
        let mut store = memory_store()?;
        store.save_session("session-1", &SessionState::default())?;
        let state = sample_state();
        store.save_session("session-1", &state)?;

        let loaded = store
            .load_session("session-1")?
            .ok_or_else(|| anyhow!("session-1 should exist after save"))?;
        assert_eq!(loaded.state, state);
        assert_eq!(loaded.turn_count, 2);
        assert_eq!(store.list_sessions()?.len(), 1);
        Ok(())
    }

    #[test]
    fn unknown_session_loads_as_none() -> Result<()> {
        let store = memory_store()?;
        assert!(store.load_session("missing")?.is_none());
        Ok(())
    }

    #[test]
    fn empty_session_id_is_rejected() -> Result<()> {
        let mut store = memory_store()?;
        assert!(store.save_session("  ", &SessionState::default()).is_err());
        Ok(())
    }

    #[test]
    fn delete_session_reports_whether_a_row_was_removed() -> Result<()> {
        let mut store = memory_store()?;
        store.save_session("session-1", &sample_state())?;
        assert!(store.delete_session("session-1")?);
        assert!(!store.delete_session("session-1")?);
        assert!(store.load_session("session-1")?.is_none());
        Ok(())
    }

    #[test]
    fn malformed_state_json_is_an_error() -> Result<()> {
        let store = memory_store()?;
        store.conn.execute(
            "INSERT INTO sessions(session_id, state_json, created_at, updated_at, turn_count)
             VALUES ('bad', '{\"actionable_history\": 7}', ?1, ?1, 1)",
            params![now_rfc3339()?],
        )?;
        assert!(store.load_session("bad").is_err());
        Ok(())
    }

    #[test]
    fn purge_removes_sessions_older_than_cutoff() -> Result<()> {
        let mut store = memory_store()?;
        store.conn.execute(
            "INSERT INTO sessions(session_id, state_json, created_at, updated_at, turn_count)
             VALUES ('old', '{}', ?1, ?1, 3)",
            params![rfc3339(OffsetDateTime::UNIX_EPOCH)?],
        )?;
        store.save_session("new", &SessionState::default())?;

        let cutoff = OffsetDateTime::now_utc() - time::Duration::hours(1);
        assert_eq!(store.purge_sessions_before(cutoff)?, 1);
        let remaining: Vec<_> =
            store.list_sessions()?.into_iter().map(|session| session.session_id).collect();
        assert_eq!(remaining, vec!["new".to_string()]);
        Ok(())
    }

    #[test]
    fn fresh_database_reports_pending_migration() -> Result<()> {
        let store = SqliteSessionStore::open(Path::new(":memory:"))?;
        let status = store.schema_status()?;
        assert_eq!(status.current_version, 0);
        assert_eq!(status.pending_versions, vec![1]);
        Ok(())
    }

    #[test]
    fn migrate_is_idempotent() -> Result<()> {
        let mut store = memory_store()?;
        store.save_session("session-1", &sample_state())?;
        store.migrate()?;
        assert_eq!(store.schema_status()?.current_version, LATEST_SCHEMA_VERSION);
        assert!(store.load_session("session-1")?.is_some());
        Ok(())
    }

    #[test]
    fn migrate_rejects_unversioned_sessions_table() -> Result<()> {
        let mut store = SqliteSessionStore::open(Path::new(":memory:"))?;
        store.conn.execute_batch("CREATE TABLE sessions (session_id TEXT PRIMARY KEY);")?;
        let err = match store.migrate() {
            Ok(()) => return Err(anyhow!("expected migrate to fail")),
            Err(err) => err,
        };
        assert!(err.to_string().contains("without schema_migrations records"));
        Ok(())
    }

    #[test]
    fn migrate_rejects_newer_schema() -> Result<()> {
        let mut store = memory_store()?;
        store.conn.execute(
            "INSERT INTO schema_migrations(version, applied_at) VALUES (?1, ?2)",
            params![LATEST_SCHEMA_VERSION + 1, now_rfc3339()?],
        )?;
        assert!(store.migrate().is_err());
        Ok(())
    }

    #[test]
    fn backup_copies_sessions_to_new_file() -> Result<()> {
        let mut source = memory_store()?;
        source.save_session("session-1", &sample_state())?;
        let backup_path =
            std::env::temp_dir().join(format!("sauce-boss-backup-{}.sqlite3", Ulid::new()));
        source.backup_database(&backup_path)?;

        let restored = SqliteSessionStore::open(&backup_path)?;
        assert!(restored.load_session("session-1")?.is_some());
        let _ = fs::remove_file(&backup_path);
        Ok(())
    }
}
