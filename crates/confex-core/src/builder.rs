//! Turns the configuration queries of a live server into a workspace.
//!
//! A build runs the peer, database and namespace queries strictly in that
//! order, so namespace rows always see every database that was kept. Query
//! failures shrink the model but never stop the build; only an unusable
//! session does.

use crate::cursor::{self, Cursor, Query};
use crate::portal::{self, portal_url};
use crate::registry::{EntityKind, EntityRegistry};
use crate::rules::{self, ACCESSES};
use crate::session::{Session, SessionError, SessionGuard};
use crate::styles::{self, DatabaseClass, NamespaceClass};
use crate::{
    views, Component, Container, Location, Person, Relationship, ServerSpec, SoftwareSystem,
    Workspace,
};
use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;

pub type BuildResult<T> = Result<T, BuildError>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum BuildError {
    #[error("cannot build workspace: {0}")]
    SessionUnusable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Init,
    PeersLoaded,
    DatabasesLoaded,
    NamespacesLoaded,
    Composed,
    Done,
    Aborted,
}

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Include databases the server reports as its own. Hidden by default.
    pub show_system_databases: bool,
}

/// What one build saw and kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSummary {
    pub instance_name: String,
    pub version: String,
    pub peers: usize,
    pub databases: usize,
    pub namespaces: usize,
    pub relationships: usize,
    pub skipped_system_databases: usize,
    pub blank_rows: usize,
    pub duplicate_rows: usize,
    /// Queries that could not be created or executed
    pub failed_queries: Vec<&'static str>,
}

#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub workspace: Workspace,
    pub summary: BuildSummary,
}

/// Elements under construction, assembled into the workspace once every
/// query has been read.
struct Draft {
    workspace: Workspace,
    system: SoftwareSystem,
    focused: Container,
    peers: Vec<Container>,
}

pub struct ConfigModelBuilder<'a, S: Session> {
    guard: SessionGuard<S>,
    spec: &'a ServerSpec,
    options: BuildOptions,
    state: BuildState,
    registry: EntityRegistry,
    /// System databases left out of the model, remembered so repeats count as duplicates
    hidden_databases: HashSet<String>,
    summary: BuildSummary,
}

/// Build the workspace for `spec` from `session`. The session is closed
/// before this returns, whatever the outcome.
pub fn build_workspace<S: Session>(
    session: S,
    spec: &ServerSpec,
    options: BuildOptions,
) -> BuildResult<BuildOutput> {
    ConfigModelBuilder::new(session, spec, options).run()
}

impl<'a, S: Session> ConfigModelBuilder<'a, S> {
    pub fn new(session: S, spec: &'a ServerSpec, options: BuildOptions) -> Self {
        Self {
            guard: SessionGuard::new(session),
            spec,
            options,
            state: BuildState::Init,
            registry: EntityRegistry::new(),
            hidden_databases: HashSet::new(),
            summary: BuildSummary::default(),
        }
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    fn transition(&mut self, next: BuildState) {
        tracing::debug!(from = ?self.state, to = ?next, server = %self.spec.name, "build state");
        self.state = next;
    }

    pub fn run(mut self) -> BuildResult<BuildOutput> {
        let mut draft = match self.init() {
            Ok(draft) => draft,
            Err(e) => {
                tracing::warn!(server = %self.spec.name, error = %e, "aborting build");
                self.guard.release();
                self.transition(BuildState::Aborted);
                return Err(e);
            }
        };

        self.load_peers(&mut draft);
        self.transition(BuildState::PeersLoaded);

        self.load_databases(&mut draft);
        self.transition(BuildState::DatabasesLoaded);

        self.load_namespaces(&mut draft);
        self.transition(BuildState::NamespacesLoaded);

        let workspace = self.compose(draft);
        self.transition(BuildState::Composed);

        self.guard.release();
        self.transition(BuildState::Done);

        tracing::info!(
            server = %self.spec.name,
            peers = self.summary.peers,
            databases = self.summary.databases,
            namespaces = self.summary.namespaces,
            "workspace built"
        );
        Ok(BuildOutput {
            workspace,
            summary: std::mem::take(&mut self.summary),
        })
    }

    fn init(&mut self) -> BuildResult<Draft> {
        let session = self.guard.session();
        if !session.is_usable() {
            return Err(BuildError::SessionUnusable(format!(
                "no usable connection to '{}'",
                self.spec.name
            )));
        }
        let unusable = |e: SessionError| BuildError::SessionUnusable(e.to_string());
        let instance = session.unique_instance_name().map_err(unusable)?;
        let version = session.server_version().map_err(unusable)?;
        tracing::debug!(instance = %instance, version = %version, "connected");

        let server = &self.spec.name;
        let mut workspace = Workspace::new(
            &format!("{} configuration", server),
            &format!("Configuration of {} ({})", instance, version),
        );
        workspace.views.configuration.styles.elements = styles::element_styles();

        let model = &mut workspace.model;
        let user_id = model.next_id();
        let system_id = model.next_id();
        let uses_id = model.next_id();
        let focused_id = model.next_id();

        model.people.push(Person {
            id: user_id.clone(),
            tags: vec!["Element".to_string(), "Person".to_string()],
            name: "User".to_string(),
            description: "uses the server".to_string(),
            location: Location::Unspecified,
            relationships: vec![Relationship::new(
                uses_id,
                &user_id,
                &system_id,
                "uses applications",
                None,
            )],
        });

        let system = SoftwareSystem {
            id: system_id,
            tags: vec!["Element".to_string(), "Software System".to_string()],
            name: format!("'{}'", server),
            description: "Includes ECP data servers used by this server".to_string(),
            location: Location::Internal,
            containers: Vec::new(),
            relationships: Vec::new(),
        };

        let mut focused = Container::new(
            focused_id,
            server,
            &format!("Instance '{}'", instance),
            "InterSystems server",
        );
        focused.url = portal_url(self.spec, portal::HOME_PAGE, "");

        self.summary.instance_name = instance;
        self.summary.version = version;

        Ok(Draft {
            workspace,
            system,
            focused,
            peers: Vec::new(),
        })
    }

    /// Open a query, or log why it contributes no rows.
    fn open(&mut self, query: Query) -> Option<Cursor> {
        match Cursor::open(self.guard.session(), query) {
            Ok(cursor) => Some(cursor),
            Err(e) => {
                tracing::warn!(query = query.name, error = %e, "query unavailable, continuing without it");
                self.summary.failed_queries.push(query.name);
                None
            }
        }
    }

    fn load_peers(&mut self, draft: &mut Draft) {
        let Some(rows) = self.open(cursor::ECP_SERVERS) else {
            return;
        };
        for row in rows {
            let name = row.column("Name").trim();
            let address = row.column("Address");
            let port = row.column("Port");
            tracing::debug!(peer = name, address, port, "ECP server row");
            if name.is_empty() {
                self.summary.blank_rows += 1;
                continue;
            }

            let peer_id = draft.workspace.model.next_id();
            let mut peer = Container::new(
                peer_id,
                name,
                &format!("At {}:{}", address, port),
                "ECP data server",
            );
            peer.url = portal_url(self.spec, portal::ECP_DATA_SERVERS_PAGE, "");

            let rel_id = draft.workspace.model.next_id();
            draft.focused.relationships.push(Relationship::new(
                rel_id,
                &draft.focused.id,
                &peer.id,
                "ECPs to",
                None,
            ));
            draft.peers.push(peer);
            self.summary.peers += 1;
        }
        if self.summary.peers == 0 {
            tracing::debug!("no ECP servers found");
        }
    }

    /// Directory predicate first; name prefixes only when the server cannot
    /// answer it.
    fn is_system_database(&self, name: &str, directory: &str) -> bool {
        match self.guard.session().is_system_database(directory) {
            Ok(is_system) => is_system,
            Err(SessionError::Unsupported(_)) => {
                let is_system = styles::has_system_prefix(name);
                tracing::debug!(database = name, is_system, "predicate unsupported, used name prefix");
                is_system
            }
            Err(e) => {
                tracing::warn!(database = name, error = %e, "system database check failed");
                false
            }
        }
    }

    fn load_databases(&mut self, draft: &mut Draft) {
        let Some(rows) = self.open(cursor::DATABASES) else {
            return;
        };
        for row in rows {
            let name = row.column("Name").trim();
            let directory = row.column("Directory");
            let server = row.column("Server").trim();
            tracing::debug!(database = name, directory, server, "database row");
            if name.is_empty() {
                self.summary.blank_rows += 1;
                continue;
            }
            if self.registry.contains(EntityKind::Database, name)
                || self.hidden_databases.contains(name)
            {
                tracing::warn!(database = name, "duplicate database row ignored");
                self.summary.duplicate_rows += 1;
                continue;
            }

            let class = DatabaseClass::classify(server, || self.is_system_database(name, directory));
            if class == DatabaseClass::System && !self.options.show_system_databases {
                tracing::debug!(database = name, "skipping system database");
                self.summary.skipped_system_databases += 1;
                self.hidden_databases.insert(name.to_string());
                continue;
            }

            let (description, technology, url) = if class == DatabaseClass::Remote {
                (
                    format!("On ECP server {} at {}", server, directory),
                    "Remote database",
                    portal_url(self.spec, portal::REMOTE_DATABASES_PAGE, ""),
                )
            } else {
                (
                    format!("Local at {}", directory),
                    "Local database",
                    portal_url(
                        self.spec,
                        portal::DATABASE_DETAILS_PAGE,
                        &format!("$ID1={}&DBName={}", directory, name),
                    ),
                )
            };

            let id = draft.workspace.model.next_id();
            let mut component = Component::new(
                id,
                &format!("{} database", name),
                &description,
                technology,
                class.tag(),
            );
            component.url = url;
            self.registry.register(EntityKind::Database, name, &component.id);
            draft.focused.components.push(component);
            self.summary.databases += 1;
        }
    }

    fn load_namespaces(&mut self, draft: &mut Draft) {
        let Some(rows) = self.open(cursor::NAMESPACES) else {
            return;
        };
        for row in rows {
            let name = row.column("Namespace").trim();
            let globals = row.column("Globals");
            let routines = row.column("Routines");
            tracing::debug!(namespace = name, globals, routines, "namespace row");
            if name.is_empty() {
                self.summary.blank_rows += 1;
                continue;
            }
            if self.registry.contains(EntityKind::Namespace, name) {
                tracing::warn!(namespace = name, "duplicate namespace row ignored");
                self.summary.duplicate_rows += 1;
                continue;
            }

            let class = NamespaceClass::classify(name);
            let id = draft.workspace.model.next_id();
            let mut component = Component::new(
                id,
                &format!("{} namespace", name),
                &format!("Globals in {}, Routines in {}", globals, routines),
                "Namespace",
                class.tag(),
            );
            if class == NamespaceClass::Ordinary {
                component.url = portal_url(
                    self.spec,
                    portal::GLOBAL_LIST_PAGE,
                    &format!("$NAMESPACE={}", name),
                );
            }

            let edges = rules::access_edges(globals, routines, |db| {
                self.registry.get(EntityKind::Database, db)
            });
            for edge in edges {
                let rel_id = draft.workspace.model.next_id();
                component.relationships.push(Relationship::new(
                    rel_id,
                    &component.id,
                    &edge.database_id,
                    ACCESSES,
                    Some(edge.purpose.as_str()),
                ));
                self.summary.relationships += 1;
            }

            self.registry.register(EntityKind::Namespace, name, &component.id);
            draft.focused.components.push(component);
            self.summary.namespaces += 1;
        }
    }

    fn compose(&mut self, draft: Draft) -> Workspace {
        let Draft {
            mut workspace,
            mut system,
            focused,
            peers,
        } = draft;
        let system_id = system.id.clone();
        let focused_id = focused.id.clone();
        system.containers.push(focused);
        system.containers.extend(peers);
        workspace.model.software_systems.push(system);
        views::compose(&mut workspace, &system_id, &focused_id);
        workspace
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ResultSet, ServerSnapshot, SessionResult, SnapshotSession};
    use std::cell::Cell;
    use std::rc::Rc;

    fn spec() -> ServerSpec {
        ServerSpec::named("iris")
    }

    fn focused(ws: &Workspace) -> &Container {
        ws.model.find_container("iris").unwrap()
    }

    struct DeadSession;

    impl Session for DeadSession {
        fn is_usable(&self) -> bool {
            false
        }
        fn unique_instance_name(&self) -> SessionResult<String> {
            Err(SessionError::Closed)
        }
        fn server_version(&self) -> SessionResult<String> {
            Err(SessionError::Closed)
        }
        fn is_system_database(&self, _directory: &str) -> SessionResult<bool> {
            Err(SessionError::Closed)
        }
        fn create_result_set(&self, _query: &str) -> SessionResult<Box<dyn ResultSet>> {
            Err(SessionError::Closed)
        }
        fn close(&mut self) {}
    }

    #[test]
    fn unusable_session_aborts() {
        let spec = spec();
        let builder = ConfigModelBuilder::new(DeadSession, &spec, BuildOptions::default());
        assert_eq!(builder.state(), BuildState::Init);
        let err = builder.run().unwrap_err();
        assert!(matches!(err, BuildError::SessionUnusable(_)));
    }

    /// Snapshot session that counts `close` calls and system-database checks.
    struct CountingSession {
        inner: SnapshotSession,
        usable: bool,
        closes: Rc<Cell<usize>>,
        predicate_calls: Rc<Cell<usize>>,
    }

    impl CountingSession {
        fn new(snapshot: ServerSnapshot, usable: bool) -> Self {
            Self {
                inner: SnapshotSession::new(snapshot),
                usable,
                closes: Rc::new(Cell::new(0)),
                predicate_calls: Rc::new(Cell::new(0)),
            }
        }
    }

    impl Session for CountingSession {
        fn is_usable(&self) -> bool {
            self.usable && self.inner.is_usable()
        }
        fn unique_instance_name(&self) -> SessionResult<String> {
            self.inner.unique_instance_name()
        }
        fn server_version(&self) -> SessionResult<String> {
            self.inner.server_version()
        }
        fn is_system_database(&self, directory: &str) -> SessionResult<bool> {
            self.predicate_calls.set(self.predicate_calls.get() + 1);
            self.inner.is_system_database(directory)
        }
        fn create_result_set(&self, query: &str) -> SessionResult<Box<dyn ResultSet>> {
            self.inner.create_result_set(query)
        }
        fn close(&mut self) {
            self.closes.set(self.closes.get() + 1);
            self.inner.close();
        }
    }

    #[test]
    fn session_is_closed_once_after_a_build() {
        let snapshot = ServerSnapshot::new("X", "1").with_system_directories(&[]).with_rows(
            cursor::DATABASES.name,
            &["Name", "Directory", "Server"],
            &[&["USER", "/db/user/", ""]],
        );
        let session = CountingSession::new(snapshot, true);
        let closes = Rc::clone(&session.closes);

        let out = build_workspace(session, &spec(), BuildOptions::default());
        assert!(out.is_ok());
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn session_is_closed_once_after_an_abort() {
        let session = CountingSession::new(ServerSnapshot::new("X", "1"), false);
        let closes = Rc::clone(&session.closes);

        let err = build_workspace(session, &spec(), BuildOptions::default()).unwrap_err();
        assert!(matches!(err, BuildError::SessionUnusable(_)));
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn repeated_hidden_system_database_counts_as_duplicate() {
        let snapshot = ServerSnapshot::new("X", "1")
            .with_system_directories(&["/sys/irislib/"])
            .with_rows(
                cursor::DATABASES.name,
                &["Name", "Directory", "Server"],
                &[
                    &["IRISLIB", "/sys/irislib/", ""],
                    &["IRISLIB", "/sys/irislib/", ""],
                    &["USER", "/db/user/", ""],
                ],
            );
        let session = CountingSession::new(snapshot, true);
        let predicate_calls = Rc::clone(&session.predicate_calls);

        let out = build_workspace(session, &spec(), BuildOptions::default()).unwrap();
        assert_eq!(out.summary.skipped_system_databases, 1);
        assert_eq!(out.summary.duplicate_rows, 1);
        assert_eq!(out.summary.databases, 1);
        assert_eq!(predicate_calls.get(), 2);
    }

    #[test]
    fn empty_server_still_has_focused_container_and_views() {
        let session = SnapshotSession::new(ServerSnapshot::new("HOST:IRIS", "2024.1"));
        let out = build_workspace(session, &spec(), BuildOptions::default()).unwrap();
        let ws = &out.workspace;

        assert_eq!(ws.description, "Configuration of HOST:IRIS (2024.1)");
        assert_eq!(ws.model.software_systems.len(), 1);
        assert_eq!(ws.model.software_systems[0].containers.len(), 1);
        assert!(focused(ws).components.is_empty());
        assert_eq!(out.summary.failed_queries.len(), 3);
        assert_eq!(ws.views.system_context_views.len(), 1);
        assert_eq!(ws.views.container_views.len(), 1);
        assert_eq!(ws.views.component_views.len(), 1);
    }

    #[test]
    fn system_databases_are_hidden_unless_requested() {
        let snapshot = ServerSnapshot::new("X", "1")
            .with_system_directories(&["/sys/irislib/"])
            .with_rows(
                cursor::DATABASES.name,
                &["Name", "Directory", "Server"],
                &[&["IRISLIB", "/sys/irislib/", ""], &["USER", "/db/user/", ""]],
            );

        let hidden = build_workspace(
            SnapshotSession::new(snapshot.clone()),
            &spec(),
            BuildOptions::default(),
        )
        .unwrap();
        assert_eq!(hidden.summary.skipped_system_databases, 1);
        assert!(focused(&hidden.workspace).find_component("IRISLIB database").is_none());

        let shown = build_workspace(
            SnapshotSession::new(snapshot),
            &spec(),
            BuildOptions {
                show_system_databases: true,
            },
        )
        .unwrap();
        let irislib = focused(&shown.workspace).find_component("IRISLIB database").unwrap();
        assert!(irislib.has_tag(styles::SYSTEM_DATABASE));
        assert!(!irislib.has_tag(styles::DATABASE));
    }

    #[test]
    fn name_prefix_is_used_when_predicate_is_unsupported() {
        let snapshot = ServerSnapshot::new("X", "1").with_rows(
            cursor::DATABASES.name,
            &["Name", "Directory", "Server"],
            &[&["IRISSYS", "/sys/", ""], &["APP", "/db/app/", ""]],
        );
        let out = build_workspace(
            SnapshotSession::new(snapshot),
            &spec(),
            BuildOptions {
                show_system_databases: true,
            },
        )
        .unwrap();
        let container = focused(&out.workspace);
        assert!(container
            .find_component("IRISSYS database")
            .unwrap()
            .has_tag(styles::SYSTEM_DATABASE));
        assert!(container
            .find_component("APP database")
            .unwrap()
            .has_tag(styles::DATABASE));
    }

    #[test]
    fn hidden_system_database_leaves_namespace_edges_dangling() {
        let snapshot = ServerSnapshot::new("X", "1")
            .with_system_directories(&["/sys/irislib/"])
            .with_rows(
                cursor::DATABASES.name,
                &["Name", "Directory", "Server"],
                &[&["IRISLIB", "/sys/irislib/", ""], &["APP", "/db/app/", ""]],
            )
            .with_rows(
                cursor::NAMESPACES.name,
                &["Namespace", "Globals", "Routines"],
                &[&["APP", "APP", "IRISLIB"]],
            );
        let out = build_workspace(SnapshotSession::new(snapshot), &spec(), BuildOptions::default())
            .unwrap();
        let ns = focused(&out.workspace).find_component("APP namespace").unwrap();
        assert_eq!(ns.relationships.len(), 1);
        assert_eq!(ns.relationships[0].label(), "accesses Globals");
    }

    #[test]
    fn portal_links_follow_web_server() {
        let mut spec = spec();
        spec.web_server = Some(crate::WebServer {
            scheme: "http".to_string(),
            host: "localhost".to_string(),
            port: 52773,
            path_prefix: String::new(),
        });
        let snapshot = ServerSnapshot::new("X", "1")
            .with_system_directories(&[])
            .with_rows(
                cursor::DATABASES.name,
                &["Name", "Directory", "Server"],
                &[&["USER", "/db/user/", ""]],
            )
            .with_rows(
                cursor::NAMESPACES.name,
                &["Namespace", "Globals", "Routines"],
                &[&["USER", "USER", "USER"], &["%ALL", "USER", "USER"]],
            );
        let out = build_workspace(SnapshotSession::new(snapshot), &spec, BuildOptions::default())
            .unwrap();
        let container = focused(&out.workspace);
        assert_eq!(
            container.url.as_deref(),
            Some("http://localhost:52773/csp/sys/UtilHome.csp?")
        );
        assert_eq!(
            container.find_component("USER database").unwrap().url.as_deref(),
            Some("http://localhost:52773/csp/sys/op/%25CSP.UI.Portal.DatabaseDetails.zen?$ID1=/db/user/&DBName=USER")
        );
        assert!(container.find_component("%ALL namespace").unwrap().url.is_none());
        assert!(container.find_component("USER namespace").unwrap().url.is_some());
    }
}
