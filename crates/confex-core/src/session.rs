//! Typed boundary around the native server session.
//!
//! The builder never talks to a driver directly. It sees a [`Session`] that
//! answers a handful of scalar calls and hands out [`ResultSet`] handles for
//! class queries. [`SnapshotSession`] implements the boundary from a captured
//! JSON document so builds can run offline.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SessionError {
    /// The server or driver does not offer this call.
    #[error("{0} is not supported by this session")]
    Unsupported(String),

    #[error("{method} failed: {message}")]
    Call { method: String, message: String },

    #[error("session is closed")]
    Closed,

    #[error("session unavailable: {0}")]
    Unavailable(String),
}

/// Driver-level handle for one prepared class query.
pub trait ResultSet {
    /// Run the query. An error means the server did not report success.
    fn execute(&mut self) -> SessionResult<()>;

    /// Move to the next row. False once the rows are drained.
    fn next(&mut self) -> bool;

    /// Display value of a column in the current row. `None` for SQL null or an
    /// unknown column.
    fn get(&self, column: &str) -> Option<String>;
}

/// A live connection to the focused server.
pub trait Session {
    /// Whether the native handle is still connected.
    fn is_usable(&self) -> bool;

    /// `$SYSTEM.System.GetUniqueInstanceName(0)`
    fn unique_instance_name(&self) -> SessionResult<String>;

    fn server_version(&self) -> SessionResult<String>;

    /// `SYS.Database:IsSystemDB(directory)`
    fn is_system_database(&self, directory: &str) -> SessionResult<bool>;

    /// Instantiate a result set for `"<Package>.<Class>:<Query>"`.
    fn create_result_set(&self, query: &str) -> SessionResult<Box<dyn ResultSet>>;

    fn close(&mut self);
}

/// Owns a session for the duration of one build and closes it exactly once.
pub struct SessionGuard<S: Session> {
    session: S,
    released: bool,
}

impl<S: Session> SessionGuard<S> {
    pub fn new(session: S) -> Self {
        Self {
            session,
            released: false,
        }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Close the session. Returns false when it was already released.
    pub fn release(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;
        self.session.close();
        tracing::debug!("session released");
        true
    }
}

impl<S: Session> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        self.release();
    }
}

// --- Snapshot adapter ---

/// Captured output of one class query.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueryCapture {
    /// The query was created but Execute reported an error
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub failed: bool,
    /// Rows as column name -> value. Strings, numbers and null are accepted.
    #[serde(default)]
    pub rows: Vec<BTreeMap<String, serde_json::Value>>,
}

/// A captured server: identity, system database directories and query output.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServerSnapshot {
    pub instance_name: String,
    pub version: String,
    /// Directories the server reports as system databases. Omit when the
    /// capture has no answer for the predicate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_directories: Option<Vec<String>>,
    /// Keyed by query name, e.g. "Config.Databases:List". A missing key means
    /// the result set could not be created.
    #[serde(default)]
    pub queries: BTreeMap<String, QueryCapture>,
}

impl ServerSnapshot {
    pub fn new(instance_name: &str, version: &str) -> Self {
        Self {
            instance_name: instance_name.to_string(),
            version: version.to_string(),
            ..Self::default()
        }
    }

    /// Builder-style helper: record rows for a query, columns given in order.
    pub fn with_rows(mut self, query: &str, columns: &[&str], rows: &[&[&str]]) -> Self {
        let captured = rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .zip(row.iter())
                    .map(|(c, v)| (c.to_string(), serde_json::Value::String(v.to_string())))
                    .collect()
            })
            .collect();
        self.queries.insert(
            query.to_string(),
            QueryCapture {
                failed: false,
                rows: captured,
            },
        );
        self
    }

    pub fn with_failed_query(mut self, query: &str) -> Self {
        self.queries.insert(
            query.to_string(),
            QueryCapture {
                failed: true,
                rows: Vec::new(),
            },
        );
        self
    }

    pub fn with_system_directories(mut self, dirs: &[&str]) -> Self {
        self.system_directories = Some(dirs.iter().map(|d| d.to_string()).collect());
        self
    }
}

pub struct SnapshotSession {
    snapshot: ServerSnapshot,
    closed: bool,
}

impl SnapshotSession {
    pub fn new(snapshot: ServerSnapshot) -> Self {
        Self {
            snapshot,
            closed: false,
        }
    }

    pub fn load(path: &Path) -> SessionResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SessionError::Unavailable(format!("{}: {}", path.display(), e)))?;
        let snapshot: ServerSnapshot = serde_json::from_str(&raw)
            .map_err(|e| SessionError::Unavailable(format!("{}: {}", path.display(), e)))?;
        Ok(Self::new(snapshot))
    }

    fn ensure_open(&self) -> SessionResult<()> {
        if self.closed {
            Err(SessionError::Closed)
        } else {
            Ok(())
        }
    }
}

fn normalize_dir(dir: &str) -> &str {
    dir.trim_end_matches(['/', '\\'])
}

impl Session for SnapshotSession {
    fn is_usable(&self) -> bool {
        !self.closed
    }

    fn unique_instance_name(&self) -> SessionResult<String> {
        self.ensure_open()?;
        Ok(self.snapshot.instance_name.clone())
    }

    fn server_version(&self) -> SessionResult<String> {
        self.ensure_open()?;
        Ok(self.snapshot.version.clone())
    }

    fn is_system_database(&self, directory: &str) -> SessionResult<bool> {
        self.ensure_open()?;
        match &self.snapshot.system_directories {
            Some(dirs) => Ok(dirs
                .iter()
                .any(|d| normalize_dir(d) == normalize_dir(directory))),
            None => Err(SessionError::Unsupported("SYS.Database:IsSystemDB".to_string())),
        }
    }

    fn create_result_set(&self, query: &str) -> SessionResult<Box<dyn ResultSet>> {
        self.ensure_open()?;
        match self.snapshot.queries.get(query) {
            Some(capture) => Ok(Box::new(SnapshotResultSet {
                capture: capture.clone(),
                executed: false,
                cursor: None,
            })),
            None => Err(SessionError::Call {
                method: "%ResultSet:%New".to_string(),
                message: format!("no capture for {}", query),
            }),
        }
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

struct SnapshotResultSet {
    capture: QueryCapture,
    executed: bool,
    cursor: Option<usize>,
}

impl ResultSet for SnapshotResultSet {
    fn execute(&mut self) -> SessionResult<()> {
        if self.capture.failed {
            return Err(SessionError::Call {
                method: "Execute".to_string(),
                message: "query reported an error status".to_string(),
            });
        }
        self.executed = true;
        Ok(())
    }

    fn next(&mut self) -> bool {
        if !self.executed {
            return false;
        }
        let next = self.cursor.map_or(0, |i| i + 1);
        if next < self.capture.rows.len() {
            self.cursor = Some(next);
            true
        } else {
            self.cursor = Some(self.capture.rows.len());
            false
        }
    }

    fn get(&self, column: &str) -> Option<String> {
        let row = self.capture.rows.get(self.cursor?)?;
        match row.get(column)? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}
