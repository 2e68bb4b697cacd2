use anyhow::{Result, Context};
use rusqlite::{Connection, params, OptionalExtension};
use std::path::PathBuf;
use std::sync::Arc;
use parking_lot::Mutex;
use tracing::{info, warn};
use serde::{Deserialize, Serialize};

pub type Database = Arc<DatabaseInner>;

pub struct DatabaseInner {
    connection: Mutex<Connection>,
    db_path: PathBuf,
}

/// One stored itinerary event. Times are UTC epoch seconds; `timezone` is
/// the IANA zone the event's local times were entered in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEvent {
    pub id: i64,
    pub plan_id: i64,
    pub position: i64,
    pub title: String,
    pub location: String,
    pub start_time: i64,
    pub end_time: i64,
    pub timezone: String,
    pub place_id: Option<String>,
    pub photo_url: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub travel_minutes: Option<i64>,
    pub completed: bool,
}

/// The raw plan text a day's itinerary was built from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: i64,
    pub plan_date: String, // YYYY-MM-DD in the home timezone
    pub plan_text: String,
    pub created_at: i64,
}

impl DatabaseInner {
    pub async fn new(db_path: &PathBuf) -> Result<Database> {
        // Ensure data directory exists
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await
                .with_context(|| format!("Failed to create data directory: {:?}", parent))?;
        }

        let connection = Connection::open(db_path)
            .with_context(|| format!("Failed to open database: {:?}", db_path))?;

        Self::configure_connection(&connection)
            .context("Failed to configure initial database connection")?;

        let db = Arc::new(DatabaseInner {
            connection: Mutex::new(connection),
            db_path: db_path.clone(),
        });

        db.run_migrations()
            .context("Failed to run database migrations")?;
        info!("Database initialized at {:?}", db_path);

        Ok(db)
    }

    /// Configure a SQLite connection with settings for performance and resilience
    fn configure_connection(connection: &Connection) -> Result<()> {
        connection.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA temp_store = MEMORY;
             PRAGMA busy_timeout = 30000;"
        ).context("Failed to execute PRAGMA configuration statements")?;
        Ok(())
    }

    /// Recover from database connection issues by reopening the connection
    fn recover_connection(&self) -> Result<()> {
        warn!("Attempting to recover database connection");

        let new_connection = Connection::open(&self.db_path)
            .with_context(|| format!("Failed to reopen database: {:?}", self.db_path))?;

        Self::configure_connection(&new_connection)
            .context("Failed to configure recovered database connection")?;

        let mut conn_guard = self.connection.lock();
        *conn_guard = new_connection;

        info!("Database connection recovered successfully");
        Ok(())
    }

    /// Execute a database operation with automatic retry on connection failure
    fn with_connection_retry<F, R>(&self, operation: F) -> Result<R>
    where
        F: Fn(&Connection) -> Result<R> + Copy,
    {
        // First attempt
        {
            let conn = self.connection.lock();
            match operation(&*conn) {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if self.is_connection_error(&e) {
                        warn!("Database connection error detected: {}", e);
                        drop(conn); // Release the mutex before recovery
                    } else {
                        return Err(e);
                    }
                }
            }
        }

        // Attempt recovery
        self.recover_connection()?;

        // Retry the operation
        let conn = self.connection.lock();
        operation(&*conn)
    }

    /// Check if an error indicates a connection issue
    fn is_connection_error(&self, error: &anyhow::Error) -> bool {
        let error_msg = error.to_string().to_lowercase();

        error_msg.contains("database is locked") ||
        error_msg.contains("disk i/o error") ||
        error_msg.contains("database disk image is malformed") ||
        error_msg.contains("database is busy") ||
        error_msg.contains("unable to open database file") ||
        error_msg.contains("database or disk is full") ||
        error_msg.contains("attempt to write a readonly database")
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.connection.lock();

        conn.execute("PRAGMA foreign_keys = ON", [])?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS plans (
                id INTEGER PRIMARY KEY,
                plan_date TEXT NOT NULL UNIQUE,
                plan_text TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY,
                plan_id INTEGER NOT NULL REFERENCES plans(id) ON DELETE CASCADE,
                position INTEGER NOT NULL,
                title TEXT NOT NULL,
                location TEXT NOT NULL,
                start_time INTEGER NOT NULL,
                end_time INTEGER NOT NULL,
                timezone TEXT NOT NULL,
                place_id TEXT,
                photo_url TEXT,
                latitude REAL,
                longitude REAL,
                travel_minutes INTEGER,
                completed INTEGER DEFAULT 0
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_events_plan_position ON events(plan_id, position)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_events_start_time ON events(start_time)",
            [],
        )?;

        info!("Database migrations completed");
        Ok(())
    }

    /// Replace the plan for a date: delete any previous plan and its events,
    /// then insert the new plan and events in one transaction.
    pub fn replace_plan(&self, plan_date: &str, plan_text: &str, events: &[StoredEvent]) -> Result<i64> {
        self.with_connection_retry(|conn| {
            let tx = conn.unchecked_transaction()?;

            tx.execute("DELETE FROM plans WHERE plan_date = ?", params![plan_date])?;

            tx.execute(
                "INSERT INTO plans (plan_date, plan_text, created_at) VALUES (?, ?, ?)",
                params![plan_date, plan_text, chrono::Utc::now().timestamp()],
            )?;
            let plan_id = tx.last_insert_rowid();

            {
                let mut insert_stmt = tx.prepare(
                    "INSERT INTO events (plan_id, position, title, location, start_time, end_time,
                                         timezone, place_id, photo_url, latitude, longitude,
                                         travel_minutes, completed)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0)"
                )?;

                for event in events {
                    insert_stmt.execute(params![
                        plan_id,
                        event.position,
                        event.title,
                        event.location,
                        event.start_time,
                        event.end_time,
                        event.timezone,
                        event.place_id,
                        event.photo_url,
                        event.latitude,
                        event.longitude,
                        event.travel_minutes,
                    ])?;
                }
            }

            tx.commit()?;
            Ok(plan_id)
        })
    }

    /// Look up the plan stored for a date
    pub fn get_plan(&self, plan_date: &str) -> Result<Option<Plan>> {
        self.with_connection_retry(|conn| {
            let plan = conn.query_row(
                "SELECT id, plan_date, plan_text, created_at FROM plans WHERE plan_date = ?",
                params![plan_date],
                |row| Ok(Plan {
                    id: row.get(0)?,
                    plan_date: row.get(1)?,
                    plan_text: row.get(2)?,
                    created_at: row.get(3)?,
                })
            ).optional()?;
            Ok(plan)
        })
    }

    /// Fetch a date's events in itinerary order
    pub fn get_events_for_date(&self, plan_date: &str) -> Result<Vec<StoredEvent>> {
        self.with_connection_retry(|conn| {
            let mut stmt = conn.prepare(
                "SELECT e.id, e.plan_id, e.position, e.title, e.location, e.start_time, e.end_time,
                        e.timezone, e.place_id, e.photo_url, e.latitude, e.longitude,
                        e.travel_minutes, e.completed
                 FROM events e
                 JOIN plans p ON p.id = e.plan_id
                 WHERE p.plan_date = ?
                 ORDER BY e.position"
            )?;

            let events = stmt.query_map(params![plan_date], |row| {
                Ok(StoredEvent {
                    id: row.get(0)?,
                    plan_id: row.get(1)?,
                    position: row.get(2)?,
                    title: row.get(3)?,
                    location: row.get(4)?,
                    start_time: row.get(5)?,
                    end_time: row.get(6)?,
                    timezone: row.get(7)?,
                    place_id: row.get(8)?,
                    photo_url: row.get(9)?,
                    latitude: row.get(10)?,
                    longitude: row.get(11)?,
                    travel_minutes: row.get(12)?,
                    completed: row.get::<_, i64>(13)? != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

            Ok(events)
        })
    }

    /// Mark the event at `position` in a date's itinerary as completed.
    /// Returns false when no such event exists.
    pub fn mark_event_completed(&self, plan_date: &str, position: i64) -> Result<bool> {
        self.with_connection_retry(|conn| {
            let updated = conn.execute(
                "UPDATE events SET completed = 1
                 WHERE position = ?
                   AND plan_id = (SELECT id FROM plans WHERE plan_date = ?)",
                params![position, plan_date],
            )?;
            Ok(updated > 0)
        })
    }

    /// Remove all stored plans and events. Returns the number of plans removed.
    pub fn clear_all(&self) -> Result<usize> {
        self.with_connection_retry(|conn| {
            conn.execute("DELETE FROM events", [])?;
            let count = conn.execute("DELETE FROM plans", [])?;
            Ok(count)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn create_test_database() -> Database {
        let temp_dir = std::env::temp_dir();
        let db_path = temp_dir.join(format!("lark_test_{}.db", uuid::Uuid::new_v4()));
        DatabaseInner::new(&db_path).await.expect("Failed to create test database")
    }

    fn sample_event(position: i64, start: i64) -> StoredEvent {
        StoredEvent {
            id: 0,
            plan_id: 0,
            position,
            title: format!("Event {}", position),
            location: "Ferry Building, San Francisco".to_string(),
            start_time: start,
            end_time: start + 3600,
            timezone: "America/Los_Angeles".to_string(),
            place_id: Some("ChIJ-test".to_string()),
            photo_url: None,
            latitude: Some(37.7955),
            longitude: Some(-122.3937),
            travel_minutes: if position > 0 { Some(20) } else { None },
            completed: false,
        }
    }

    #[tokio::test]
    async fn test_replace_and_fetch_plan() {
        let database = create_test_database().await;
        let events = vec![sample_event(0, 1_700_000_000), sample_event(1, 1_700_007_200)];

        database.replace_plan("2025-06-14", "lunch then museum", &events).unwrap();

        let plan = database.get_plan("2025-06-14").unwrap().unwrap();
        assert_eq!(plan.plan_text, "lunch then museum");

        let stored = database.get_events_for_date("2025-06-14").unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].title, "Event 0");
        assert_eq!(stored[0].travel_minutes, None);
        assert_eq!(stored[1].travel_minutes, Some(20));
        assert_eq!(stored[1].timezone, "America/Los_Angeles");
    }

    #[tokio::test]
    async fn test_resubmitting_replaces_previous_plan() {
        let database = create_test_database().await;

        database.replace_plan("2025-06-14", "first draft", &[sample_event(0, 1_700_000_000)]).unwrap();
        database.replace_plan("2025-06-14", "second draft",
                              &[sample_event(0, 1_700_000_000), sample_event(1, 1_700_007_200)]).unwrap();

        let plan = database.get_plan("2025-06-14").unwrap().unwrap();
        assert_eq!(plan.plan_text, "second draft");
        assert_eq!(database.get_events_for_date("2025-06-14").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_mark_event_completed() {
        let database = create_test_database().await;
        database.replace_plan("2025-06-14", "plan", &[sample_event(0, 1_700_000_000)]).unwrap();

        assert!(database.mark_event_completed("2025-06-14", 0).unwrap());
        assert!(!database.mark_event_completed("2025-06-14", 7).unwrap());

        let events = database.get_events_for_date("2025-06-14").unwrap();
        assert!(events[0].completed);
    }

    #[tokio::test]
    async fn test_clear_all() {
        let database = create_test_database().await;
        database.replace_plan("2025-06-14", "plan", &[sample_event(0, 1_700_000_000)]).unwrap();

        assert_eq!(database.clear_all().unwrap(), 1);
        assert!(database.get_plan("2025-06-14").unwrap().is_none());
        assert!(database.get_events_for_date("2025-06-14").unwrap().is_empty());
    }
}
