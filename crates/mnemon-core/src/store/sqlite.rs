//! SQLite-backed observation store and access tracker.
//!
//! Reference adapter for the engine's persistence seams. List-valued fields
//! (facts, concepts, file lists) are kept as JSON text and only decoded here,
//! so the rest of the crate works with typed [`Observation`]s.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::clock::{age_in_days, system_clock, Clock, MS_PER_DAY};
use crate::error::{MnemonError, MnemonResult};
use crate::traits::{AccessStats, AccessTracker, ObservationLookup, ObservationStore};
use crate::types::{
    DateRange, LowImportanceMemory, MetadataPredicate, Observation, ObservationId, ObservationType,
    DEFAULT_IMPORTANCE,
};

const OBSERVATION_COLUMNS: &str = "id, project, type, title, subtitle, narrative, facts, concepts, \
     files_read, files_modified, importance_score, surprise_score, created_at_epoch";

/// SQLite-backed store for observations and their access log.
pub struct SqliteObservationStore {
    conn: Arc<Mutex<Connection>>,
    clock: Arc<dyn Clock>,
}

impl SqliteObservationStore {
    /// Create a new store with the given database path.
    ///
    /// Creates the database file and schema if it doesn't exist.
    pub fn new<P: AsRef<Path>>(path: P) -> MnemonResult<Self> {
        let conn = Connection::open(path).map_err(MnemonError::connection_failed)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            clock: system_clock(),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> MnemonResult<Self> {
        let conn = Connection::open_in_memory().map_err(MnemonError::connection_failed)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            clock: system_clock(),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Use a custom clock for age and window computations.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn lock(&self) -> MnemonResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| MnemonError::database(e.to_string()))
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> MnemonResult<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS observations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project TEXT NOT NULL,
                type TEXT NOT NULL,
                title TEXT,
                subtitle TEXT,
                narrative TEXT,
                facts TEXT NOT NULL DEFAULT '[]',
                concepts TEXT NOT NULL DEFAULT '[]',
                files_read TEXT NOT NULL DEFAULT '[]',
                files_modified TEXT NOT NULL DEFAULT '[]',
                importance_score REAL,
                surprise_score REAL,
                created_at_epoch INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_observations_project ON observations(project);
            CREATE INDEX IF NOT EXISTS idx_observations_created ON observations(created_at_epoch);
            CREATE INDEX IF NOT EXISTS idx_observations_importance ON observations(importance_score);
            CREATE INDEX IF NOT EXISTS idx_observations_type ON observations(type);

            CREATE TABLE IF NOT EXISTS observation_access (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                observation_id INTEGER NOT NULL REFERENCES observations(id) ON DELETE CASCADE,
                accessed_at_epoch INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_observation_access_lookup
                ON observation_access(observation_id, accessed_at_epoch);
            ",
        )?;

        Ok(())
    }

    /// Insert an observation, returning its ID.
    ///
    /// An `id` of 0 or less lets SQLite assign one.
    pub fn insert_observation(&self, observation: &Observation) -> MnemonResult<ObservationId> {
        let conn = self.lock()?;

        let id = (observation.id > 0).then_some(observation.id);
        conn.execute(
            "INSERT INTO observations
             (id, project, type, title, subtitle, narrative, facts, concepts,
              files_read, files_modified, importance_score, surprise_score, created_at_epoch)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                id,
                observation.project,
                observation.obs_type.to_string(),
                observation.title,
                observation.subtitle,
                observation.narrative,
                serde_json::to_string(&observation.facts)?,
                serde_json::to_string(&observation.concepts)?,
                serde_json::to_string(&observation.files_read)?,
                serde_json::to_string(&observation.files_modified)?,
                observation.importance_score,
                observation.surprise_score,
                observation.created_at_epoch,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Record an access at an explicit time.
    pub fn record_access_at(&self, id: ObservationId, accessed_at_epoch: i64) -> MnemonResult<()> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO observation_access (observation_id, accessed_at_epoch) VALUES (?1, ?2)",
            params![id, accessed_at_epoch],
        )?;

        Ok(())
    }

    /// Get count of stored observations.
    pub fn count(&self) -> MnemonResult<usize> {
        let conn = self.lock()?;

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM observations", [], |row| row.get(0))?;

        Ok(count as usize)
    }

    fn query_observations(&self, sql: &str, values: Vec<Value>) -> MnemonResult<Vec<Observation>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(sql)?;
        let observations = stmt
            .query_map(params_from_iter(values.iter()), row_to_observation)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(observations)
    }
}

fn decode_list(raw: Option<String>) -> Vec<String> {
    raw.and_then(|s| serde_json::from_str(&s).ok()).unwrap_or_default()
}

fn row_to_observation(row: &Row<'_>) -> rusqlite::Result<Observation> {
    let type_str: String = row.get(2)?;
    let obs_type = ObservationType::from_str(&type_str)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

    Ok(Observation {
        id: row.get(0)?,
        project: row.get(1)?,
        obs_type,
        title: row.get(3)?,
        subtitle: row.get(4)?,
        narrative: row.get(5)?,
        facts: decode_list(row.get(6)?),
        concepts: decode_list(row.get(7)?),
        files_read: decode_list(row.get(8)?),
        files_modified: decode_list(row.get(9)?),
        importance_score: row.get(10)?,
        surprise_score: row.get(11)?,
        created_at_epoch: row.get(12)?,
    })
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

#[async_trait]
impl ObservationLookup for SqliteObservationStore {
    async fn get_observations_by_ids(
        &self,
        ids: &[ObservationId],
        limit: Option<usize>,
    ) -> MnemonResult<Vec<Observation>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = format!(
            "SELECT {} FROM observations WHERE id IN ({})",
            OBSERVATION_COLUMNS,
            placeholders(ids.len())
        );
        let mut values: Vec<Value> = ids.iter().map(|id| Value::Integer(*id)).collect();
        if let Some(limit) = limit {
            sql.push_str(" LIMIT ?");
            values.push(Value::Integer(limit as i64));
        }

        self.query_observations(&sql, values)
    }
}

#[async_trait]
impl ObservationStore for SqliteObservationStore {
    async fn get_observation(&self, id: ObservationId) -> MnemonResult<Option<Observation>> {
        let conn = self.lock()?;

        let observation = conn
            .query_row(
                &format!("SELECT {} FROM observations WHERE id = ?1", OBSERVATION_COLUMNS),
                params![id],
                row_to_observation,
            )
            .optional()?;

        Ok(observation)
    }

    async fn update_importance(
        &self,
        id: ObservationId,
        importance_score: f64,
        surprise_score: f64,
    ) -> MnemonResult<()> {
        let conn = self.lock()?;

        let updated = conn.execute(
            "UPDATE observations SET importance_score = ?1, surprise_score = ?2 WHERE id = ?3",
            params![importance_score, surprise_score, id],
        )?;

        if updated == 0 {
            return Err(MnemonError::not_found(id));
        }
        Ok(())
    }

    async fn query_low_importance(
        &self,
        threshold: f64,
        older_than_days: u32,
        limit: usize,
    ) -> MnemonResult<Vec<LowImportanceMemory>> {
        let now = self.clock.now_ms();
        let cutoff = now - (older_than_days as f64 * MS_PER_DAY) as i64;
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT id, COALESCE(importance_score, ?1) AS score, created_at_epoch
             FROM observations
             WHERE COALESCE(importance_score, ?1) < ?2
               AND created_at_epoch <= ?3
             ORDER BY score ASC, created_at_epoch DESC
             LIMIT ?4",
        )?;

        let rows = stmt
            .query_map(
                params![DEFAULT_IMPORTANCE, threshold, cutoff, limit as i64],
                |row| {
                    let created_at: i64 = row.get(2)?;
                    Ok(LowImportanceMemory {
                        id: row.get(0)?,
                        score: row.get(1)?,
                        age_days: age_in_days(created_at, now),
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    async fn delete_observation(&self, id: ObservationId) -> MnemonResult<()> {
        let conn = self.lock()?;

        // Access rows go with it through ON DELETE CASCADE
        conn.execute("DELETE FROM observations WHERE id = ?1", params![id])?;

        Ok(())
    }

    async fn query_by_metadata(
        &self,
        predicate: &MetadataPredicate,
        project: Option<&str>,
        date_range: Option<DateRange>,
        limit: usize,
    ) -> MnemonResult<Vec<Observation>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        match predicate {
            MetadataPredicate::Concept(concept) => {
                clauses.push(
                    "EXISTS (SELECT 1 FROM json_each(observations.concepts) WHERE json_each.value = ?)"
                        .to_string(),
                );
                values.push(Value::Text(concept.clone()));
            }
            MetadataPredicate::Types(types) => {
                if types.is_empty() {
                    return Ok(Vec::new());
                }
                clauses.push(format!("type IN ({})", placeholders(types.len())));
                values.extend(types.iter().map(|t| Value::Text(t.to_string())));
            }
            MetadataPredicate::FilePath(fragment) => {
                clauses.push("(instr(files_read, ?) > 0 OR instr(files_modified, ?) > 0)".to_string());
                values.push(Value::Text(fragment.clone()));
                values.push(Value::Text(fragment.clone()));
            }
        }

        if let Some(project) = project {
            clauses.push("project = ?".to_string());
            values.push(Value::Text(project.to_string()));
        }

        if let Some(range) = date_range {
            if let Some(start) = range.start_epoch {
                clauses.push("created_at_epoch >= ?".to_string());
                values.push(Value::Integer(start));
            }
            if let Some(end) = range.end_epoch {
                clauses.push("created_at_epoch <= ?".to_string());
                values.push(Value::Integer(end));
            }
        }

        values.push(Value::Integer(limit as i64));
        let sql = format!(
            "SELECT {} FROM observations WHERE {} ORDER BY created_at_epoch DESC, id DESC LIMIT ?",
            OBSERVATION_COLUMNS,
            clauses.join(" AND ")
        );

        self.query_observations(&sql, values)
    }

    async fn recent_observations(
        &self,
        project: &str,
        since_epoch: i64,
        limit: usize,
    ) -> MnemonResult<Vec<Observation>> {
        let sql = format!(
            "SELECT {} FROM observations
             WHERE project = ? AND created_at_epoch >= ?
             ORDER BY created_at_epoch DESC, id DESC
             LIMIT ?",
            OBSERVATION_COLUMNS
        );

        self.query_observations(
            &sql,
            vec![
                Value::Text(project.to_string()),
                Value::Integer(since_epoch),
                Value::Integer(limit as i64),
            ],
        )
    }
}

#[async_trait]
impl AccessTracker for SqliteObservationStore {
    async fn get_access_stats(
        &self,
        id: ObservationId,
        window_days: u32,
    ) -> MnemonResult<Option<AccessStats>> {
        let window_start = self.clock.now_ms() - (window_days as f64 * MS_PER_DAY) as i64;
        let conn = self.lock()?;

        let (count, last): (i64, Option<i64>) = conn.query_row(
            "SELECT COUNT(*), MAX(accessed_at_epoch)
             FROM observation_access
             WHERE observation_id = ?1 AND accessed_at_epoch >= ?2",
            params![id, window_start],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        if count == 0 {
            return Ok(None);
        }

        Ok(Some(AccessStats {
            access_count: count as u64,
            access_frequency: count as f64 / window_days.max(1) as f64,
            last_accessed_epoch: last,
        }))
    }

    async fn record_access(&self, id: ObservationId) -> MnemonResult<()> {
        self.record_access_at(id, self.clock.now_ms())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const NOW: i64 = 1_700_000_000_000;

    fn store() -> SqliteObservationStore {
        SqliteObservationStore::in_memory()
            .unwrap()
            .with_clock(Arc::new(ManualClock::new(NOW)))
    }

    fn obs(obs_type: ObservationType, days_old: i64) -> Observation {
        Observation::new(0, "proj", obs_type, NOW - days_old * MS_PER_DAY as i64)
    }

    #[tokio::test]
    async fn test_insert_and_get_round_trip() {
        let store = store();
        let original = obs(ObservationType::Bugfix, 3)
            .with_title("Fix token refresh")
            .with_facts(vec!["refresh raced with logout".to_string()])
            .with_concepts(vec!["auth".to_string()])
            .with_files_modified(vec!["src/auth.rs".to_string()])
            .with_surprise(0.4);

        let id = store.insert_observation(&original).unwrap();
        let loaded = store.get_observation(id).await.unwrap().unwrap();

        assert_eq!(loaded.id, id);
        assert_eq!(loaded.title.as_deref(), Some("Fix token refresh"));
        assert_eq!(loaded.concepts, vec!["auth".to_string()]);
        assert_eq!(loaded.files_modified, vec!["src/auth.rs".to_string()]);
        assert_eq!(loaded.importance_score, None);
        assert_eq!(loaded.surprise_score, Some(0.4));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_get_missing_observation() {
        let store = store();
        assert!(store.get_observation(404).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_importance() {
        let store = store();
        let id = store.insert_observation(&obs(ObservationType::Change, 1)).unwrap();

        store.update_importance(id, 0.42, 0.7).await.unwrap();
        let loaded = store.get_observation(id).await.unwrap().unwrap();
        assert_eq!(loaded.importance_score, Some(0.42));
        assert_eq!(loaded.surprise_score, Some(0.7));

        assert!(store.update_importance(9999, 0.1, 0.1).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_cascades_access_and_is_idempotent() {
        let store = store();
        let id = store.insert_observation(&obs(ObservationType::Change, 1)).unwrap();
        store.record_access(id).await.unwrap();

        store.delete_observation(id).await.unwrap();
        assert!(store.get_observation(id).await.unwrap().is_none());
        assert!(store.get_access_stats(id, 30).await.unwrap().is_none());

        // Deleting again is a no-op
        store.delete_observation(id).await.unwrap();
    }

    #[tokio::test]
    async fn test_query_by_concept() {
        let store = store();
        let a = store
            .insert_observation(&obs(ObservationType::Decision, 5).with_concepts(vec!["auth".into()]))
            .unwrap();
        let b = store
            .insert_observation(&obs(ObservationType::Feature, 1).with_concepts(vec!["auth".into(), "ui".into()]))
            .unwrap();
        store
            .insert_observation(&obs(ObservationType::Feature, 1).with_concepts(vec!["authz".into()]))
            .unwrap();

        let results = store
            .query_by_metadata(&MetadataPredicate::Concept("auth".into()), None, None, 10)
            .await
            .unwrap();
        let ids: Vec<_> = results.iter().map(|o| o.id).collect();
        // Newest first
        assert_eq!(ids, vec![b, a]);
    }

    #[tokio::test]
    async fn test_query_by_types_project_and_range() {
        let store = store();
        let bug = store.insert_observation(&obs(ObservationType::Bugfix, 2)).unwrap();
        store.insert_observation(&obs(ObservationType::Refactor, 2)).unwrap();
        store
            .insert_observation(&Observation::new(0, "other", ObservationType::Bugfix, NOW))
            .unwrap();
        store.insert_observation(&obs(ObservationType::Bugfix, 40)).unwrap();

        let predicate = MetadataPredicate::Types(vec![ObservationType::Bugfix]);
        let range = DateRange::since(NOW - 10 * MS_PER_DAY as i64);
        let results = store
            .query_by_metadata(&predicate, Some("proj"), Some(range), 10)
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, bug);

        let none = store
            .query_by_metadata(&MetadataPredicate::Types(vec![]), None, None, 10)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_query_by_file_substring() {
        let store = store();
        let read = store
            .insert_observation(&obs(ObservationType::Discovery, 1).with_files_read(vec!["src/db/pool.rs".into()]))
            .unwrap();
        let modified = store
            .insert_observation(&obs(ObservationType::Change, 2).with_files_modified(vec!["src/db/schema.sql".into()]))
            .unwrap();
        store
            .insert_observation(&obs(ObservationType::Change, 1).with_files_modified(vec!["src/api.rs".into()]))
            .unwrap();

        let results = store
            .query_by_metadata(&MetadataPredicate::FilePath("src/db/".into()), None, None, 10)
            .await
            .unwrap();
        let ids: Vec<_> = results.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![read, modified]);
    }

    #[tokio::test]
    async fn test_get_by_ids_and_limit() {
        let store = store();
        let ids: Vec<_> = (0..5)
            .map(|i| store.insert_observation(&obs(ObservationType::Change, i)).unwrap())
            .collect();

        let all = store.get_observations_by_ids(&ids, None).await.unwrap();
        assert_eq!(all.len(), 5);

        let limited = store.get_observations_by_ids(&ids, Some(2)).await.unwrap();
        assert_eq!(limited.len(), 2);

        assert!(store.get_observations_by_ids(&[], None).await.unwrap().is_empty());
        assert!(store.get_observations_by_ids(&[777], None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recent_observations_window() {
        let store = store();
        let recent = store.insert_observation(&obs(ObservationType::Change, 10)).unwrap();
        store.insert_observation(&obs(ObservationType::Change, 400)).unwrap();

        let since = NOW - 365 * MS_PER_DAY as i64;
        let results = store.recent_observations("proj", since, 500).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, recent);
    }

    #[tokio::test]
    async fn test_access_stats_window() {
        let store = store();
        let id = store.insert_observation(&obs(ObservationType::Change, 100)).unwrap();

        assert!(store.get_access_stats(id, 30).await.unwrap().is_none());

        store.record_access_at(id, NOW - 5 * MS_PER_DAY as i64).unwrap();
        store.record_access_at(id, NOW - 2 * MS_PER_DAY as i64).unwrap();
        store.record_access_at(id, NOW - 60 * MS_PER_DAY as i64).unwrap();

        let stats = store.get_access_stats(id, 30).await.unwrap().unwrap();
        assert_eq!(stats.access_count, 2);
        assert!((stats.access_frequency - 2.0 / 30.0).abs() < 1e-12);
        assert_eq!(stats.last_accessed_epoch, Some(NOW - 2 * MS_PER_DAY as i64));
        assert!(stats.was_accessed());

        let wide = store.get_access_stats(id, 180).await.unwrap().unwrap();
        assert_eq!(wide.access_count, 3);
    }

    #[test]
    fn test_file_backed_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("observations.db");

        {
            let store = SqliteObservationStore::new(&path).unwrap();
            store.insert_observation(&obs(ObservationType::Feature, 1)).unwrap();
        }

        let reopened = SqliteObservationStore::new(&path).unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
    }

    #[test]
    fn test_unopenable_path_is_connection_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("observations.db");

        let err = SqliteObservationStore::new(&path).err().unwrap();
        assert_eq!(err.code(), crate::error::ErrorCode::DbConnectionFailed);
        assert!(err.to_string().contains("Failed to open database"));
    }
}
