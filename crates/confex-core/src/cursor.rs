//! Forward-only cursor over a class query.

use crate::session::{ResultSet, Session, SessionError};
use std::iter::FusedIterator;
use thiserror::Error;

/// A class query and the columns read from each of its rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Query {
    pub name: &'static str,
    pub columns: &'static [&'static str],
}

pub const ECP_SERVERS: Query = Query {
    name: "Config.ECPServers:List",
    columns: &["Name", "Address", "Port"],
};

pub const DATABASES: Query = Query {
    name: "Config.Databases:List",
    columns: &["Name", "Directory", "Server"],
};

pub const NAMESPACES: Query = Query {
    name: "Config.Namespaces:List",
    columns: &["Namespace", "Globals", "Routines"],
};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CursorError {
    #[error("error creating result set for {query}: {source}")]
    Creation {
        query: &'static str,
        #[source]
        source: SessionError,
    },

    #[error("error executing {query}: {source}")]
    Execution {
        query: &'static str,
        #[source]
        source: SessionError,
    },
}

/// One row, read as display text. Null columns read as "".
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<(&'static str, String)>,
}

impl Row {
    pub fn column(&self, name: &str) -> &str {
        self.values
            .iter()
            .find(|(c, _)| *c == name)
            .map(|(_, v)| v.as_str())
            .unwrap_or("")
    }
}

pub struct Cursor {
    query: Query,
    result_set: Box<dyn ResultSet>,
    exhausted: bool,
    rows_read: usize,
}

impl Cursor {
    /// Prepare and execute `query`.
    pub fn open<S: Session + ?Sized>(session: &S, query: Query) -> Result<Self, CursorError> {
        let mut result_set = session
            .create_result_set(query.name)
            .map_err(|source| CursorError::Creation {
                query: query.name,
                source,
            })?;
        result_set
            .execute()
            .map_err(|source| CursorError::Execution {
                query: query.name,
                source,
            })?;
        tracing::debug!(query = query.name, "query executed");
        Ok(Self {
            query,
            result_set,
            exhausted: false,
            rows_read: 0,
        })
    }

    pub fn query(&self) -> Query {
        self.query
    }

    pub fn rows_read(&self) -> usize {
        self.rows_read
    }

    /// Step to the next row. Stays false once the rows are drained.
    pub fn advance(&mut self) -> bool {
        if self.exhausted {
            return false;
        }
        if self.result_set.next() {
            self.rows_read += 1;
            true
        } else {
            self.exhausted = true;
            false
        }
    }

    /// Column of the current row; "" for null or unknown.
    pub fn column(&self, name: &str) -> String {
        self.result_set.get(name).unwrap_or_default()
    }

    fn current_row(&self) -> Row {
        Row {
            values: self
                .query
                .columns
                .iter()
                .map(|c| (*c, self.column(c)))
                .collect(),
        }
    }
}

impl Iterator for Cursor {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        if self.advance() {
            Some(self.current_row())
        } else {
            None
        }
    }
}

impl FusedIterator for Cursor {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ServerSnapshot, SnapshotSession};

    #[test]
    fn iterates_rows_in_order_then_stops() {
        let session = SnapshotSession::new(ServerSnapshot::new("X", "1").with_rows(
            DATABASES.name,
            &["Name", "Directory", "Server"],
            &[&["USER", "/db/user/", ""], &["APP", "/db/app/", "ECP1"]],
        ));
        let mut cursor = Cursor::open(&session, DATABASES).unwrap();
        let names: Vec<String> = cursor.by_ref().map(|r| r.column("Name").to_string()).collect();
        assert_eq!(names, vec!["USER", "APP"]);
        assert_eq!(cursor.rows_read(), 2);
        assert!(!cursor.advance());
        assert!(cursor.next().is_none());
    }

    #[test]
    fn missing_columns_read_as_empty() {
        let session = SnapshotSession::new(ServerSnapshot::new("X", "1").with_rows(
            ECP_SERVERS.name,
            &["Name"],
            &[&["ECP1"]],
        ));
        let mut cursor = Cursor::open(&session, ECP_SERVERS).unwrap();
        assert!(cursor.advance());
        assert_eq!(cursor.column("Port"), "");
        assert_eq!(cursor.column("Name"), "ECP1");
    }

    #[test]
    fn creation_and_execution_failures_are_distinct() {
        let session = SnapshotSession::new(
            ServerSnapshot::new("X", "1").with_failed_query(NAMESPACES.name),
        );
        assert!(matches!(
            Cursor::open(&session, NAMESPACES),
            Err(CursorError::Execution { .. })
        ));
        assert!(matches!(
            Cursor::open(&session, DATABASES),
            Err(CursorError::Creation { .. })
        ));
    }

    #[test]
    fn empty_result_is_not_an_error() {
        let session = SnapshotSession::new(ServerSnapshot::new("X", "1").with_rows(
            ECP_SERVERS.name,
            &["Name"],
            &[],
        ));
        let cursor = Cursor::open(&session, ECP_SERVERS).unwrap();
        assert_eq!(cursor.count(), 0);
    }
}
