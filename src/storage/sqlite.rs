use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::Result;
use crate::models::RepositorySummary;
use crate::orchestrator::OrchestratorState;

/// Summary rows kept per repository; older ones are pruned on insert.
pub const MAX_STORED_SUMMARIES: usize = 20;

/// Durable snapshots of per-repository actor state plus the history of
/// generated summaries.
pub struct StateStore {
    conn: Mutex<Connection>,
}

impl StateStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_db()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_db()?;
        Ok(store)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn init_db(&self) -> Result<()> {
        self.conn().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS repository_state (
                repository TEXT PRIMARY KEY,
                state_json TEXT NOT NULL,
                issue_count INTEGER NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS summaries (
                id INTEGER PRIMARY KEY,
                repository TEXT NOT NULL,
                generated_at TEXT NOT NULL,
                total_issues INTEGER NOT NULL,
                summary_json TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_summaries_repository ON summaries(repository, id);
            "#,
        )?;

        Ok(())
    }

    pub fn save_state(&self, state: &OrchestratorState) -> Result<()> {
        let state_json = serde_json::to_string(state)?;
        self.conn().execute(
            r#"
            INSERT INTO repository_state (repository, state_json, issue_count, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(repository) DO UPDATE SET
                state_json = excluded.state_json,
                issue_count = excluded.issue_count,
                updated_at = excluded.updated_at
            "#,
            params![
                state.repository,
                state_json,
                state.issue_count() as i64,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    pub fn load_state(&self, repository: &str) -> Result<Option<OrchestratorState>> {
        let json: Option<String> = self
            .conn()
            .query_row(
                "SELECT state_json FROM repository_state WHERE repository = ?1",
                params![repository],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub fn save_summary(&self, summary: &RepositorySummary) -> Result<()> {
        let summary_json = serde_json::to_string(summary)?;
        let conn = self.conn();
        conn.execute(
            r#"
            INSERT INTO summaries (repository, generated_at, total_issues, summary_json)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                summary.repository,
                summary.generated_at.to_rfc3339(),
                summary.total_issues,
                summary_json,
            ],
        )?;

        conn.execute(
            r#"
            DELETE FROM summaries
            WHERE repository = ?1 AND id NOT IN (
                SELECT id FROM summaries WHERE repository = ?1 ORDER BY id DESC LIMIT ?2
            )
            "#,
            params![summary.repository, MAX_STORED_SUMMARIES as i64],
        )?;

        Ok(())
    }

    pub fn latest_summary(&self, repository: &str) -> Result<Option<RepositorySummary>> {
        let json: Option<String> = self
            .conn()
            .query_row(
                "SELECT summary_json FROM summaries WHERE repository = ?1 ORDER BY id DESC LIMIT 1",
                params![repository],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub fn summary_count(&self, repository: &str) -> Result<u32> {
        let count: u32 = self.conn().query_row(
            "SELECT COUNT(*) FROM summaries WHERE repository = ?1",
            params![repository],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Repositories with a stored snapshot, most recently updated first.
    pub fn list_repositories(&self) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT repository FROM repository_state ORDER BY updated_at DESC")?;

        let repositories = stmt.query_map([], |row| row.get(0))?;
        repositories
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IssueRecord, IssueState, RangeGranularity};
    use chrono::Utc;

    fn state_with_issue(repository: &str) -> OrchestratorState {
        let mut state = OrchestratorState::new(repository);
        state.upsert_issue(IssueRecord {
            id: "1".into(),
            number: 1,
            title: "Crash".into(),
            description: String::new(),
            labels: Default::default(),
            url: String::new(),
            repository: repository.into(),
            created_at: Utc::now(),
            closed_at: None,
            state: IssueState::Open,
        });
        state.record_tags("1", ["bug"].into_iter().collect()).unwrap();
        state
    }

    fn summary(repository: &str, total: u32) -> RepositorySummary {
        RepositorySummary {
            repository: repository.into(),
            generated_at: Utc::now(),
            total_issues: total,
            open_count: total,
            closed_count: 0,
            top_tags: Vec::new(),
            recommendations: Vec::new(),
            granularity: RangeGranularity::Daily,
            time_ranges: Vec::new(),
        }
    }

    #[test]
    fn test_state_round_trip_and_upsert() {
        let store = StateStore::in_memory().unwrap();
        assert!(store.load_state("o/r").unwrap().is_none());

        let mut state = state_with_issue("o/r");
        store.save_state(&state).unwrap();
        state.ingested_count = 5;
        store.save_state(&state).unwrap();

        let loaded = store.load_state("o/r").unwrap().unwrap();
        assert_eq!(loaded, state);
        assert_eq!(store.list_repositories().unwrap(), vec!["o/r"]);
    }

    #[test]
    fn test_latest_summary() {
        let store = StateStore::in_memory().unwrap();
        assert!(store.latest_summary("o/r").unwrap().is_none());

        store.save_summary(&summary("o/r", 1)).unwrap();
        store.save_summary(&summary("o/r", 2)).unwrap();
        store.save_summary(&summary("x/y", 9)).unwrap();

        assert_eq!(store.latest_summary("o/r").unwrap().unwrap().total_issues, 2);
        assert_eq!(store.summary_count("o/r").unwrap(), 2);
    }

    #[test]
    fn test_summary_history_is_pruned() {
        let store = StateStore::in_memory().unwrap();
        for total in 1..=(MAX_STORED_SUMMARIES as u32 + 5) {
            store.save_summary(&summary("o/r", total)).unwrap();
        }
        store.save_summary(&summary("x/y", 1)).unwrap();

        assert_eq!(store.summary_count("o/r").unwrap(), MAX_STORED_SUMMARIES as u32);
        assert_eq!(
            store.latest_summary("o/r").unwrap().unwrap().total_issues,
            MAX_STORED_SUMMARIES as u32 + 5
        );
        assert_eq!(store.summary_count("x/y").unwrap(), 1);
    }
}
