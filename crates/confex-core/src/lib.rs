pub mod builder;
pub mod cursor;
pub mod diff;
pub mod portal;
pub mod registry;
pub mod rules;
pub mod session;
pub mod styles;
pub mod views;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

// --- Workspace types (Structurizr JSON shape) ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Location {
    #[default]
    Unspecified,
    Internal,
    External,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Shape {
    Box,
    RoundedBox,
    Circle,
    Cylinder,
    Folder,
    Person,
    Pipe,
    Hexagon,
    Component,
}

/// Structurizr stores tags as one comma-separated string.
mod tag_list {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(tags: &[String], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&tags.join(","))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub id: String,
    #[serde(with = "tag_list", default)]
    pub tags: Vec<String>,
    pub source_id: String,
    pub destination_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technology: Option<String>,
}

impl Relationship {
    pub fn new(
        id: String,
        source_id: &str,
        destination_id: &str,
        description: &str,
        technology: Option<&str>,
    ) -> Self {
        Self {
            id,
            tags: vec!["Relationship".to_string()],
            source_id: source_id.to_string(),
            destination_id: destination_id.to_string(),
            description: description.to_string(),
            technology: technology.map(str::to_string),
        }
    }

    /// Description and technology joined, e.g. "accesses Globals and Routines".
    pub fn label(&self) -> String {
        match &self.technology {
            Some(tech) if !self.description.is_empty() => format!("{} {}", self.description, tech),
            Some(tech) => tech.clone(),
            None => self.description.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: String,
    #[serde(with = "tag_list", default)]
    pub tags: Vec<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub location: Location,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<Relationship>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SoftwareSystem {
    pub id: String,
    #[serde(with = "tag_list", default)]
    pub tags: Vec<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub location: Location,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub containers: Vec<Container>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<Relationship>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub id: String,
    #[serde(with = "tag_list", default)]
    pub tags: Vec<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technology: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<Component>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<Relationship>,
}

impl Container {
    pub fn new(id: String, name: &str, description: &str, technology: &str) -> Self {
        Self {
            id,
            tags: vec!["Element".to_string(), "Container".to_string()],
            name: name.to_string(),
            description: description.to_string(),
            technology: Some(technology.to_string()),
            url: None,
            components: Vec::new(),
            relationships: Vec::new(),
        }
    }

    pub fn find_component(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub id: String,
    #[serde(with = "tag_list", default)]
    pub tags: Vec<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technology: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<Relationship>,
}

impl Component {
    /// A component carrying the default tags plus one classification tag.
    pub fn new(id: String, name: &str, description: &str, technology: &str, tag: &str) -> Self {
        Self {
            id,
            tags: vec![
                "Element".to_string(),
                "Component".to_string(),
                tag.to_string(),
            ],
            name: name.to_string(),
            description: description.to_string(),
            technology: Some(technology.to_string()),
            url: None,
            relationships: Vec::new(),
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub people: Vec<Person>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub software_systems: Vec<SoftwareSystem>,
    #[serde(skip)]
    last_id: u64,
}

impl Model {
    /// Allocate the next element or relationship id ("1", "2", ...).
    pub fn next_id(&mut self) -> String {
        self.last_id += 1;
        self.last_id.to_string()
    }

    pub fn containers(&self) -> impl Iterator<Item = &Container> {
        self.software_systems.iter().flat_map(|s| &s.containers)
    }

    pub fn find_container(&self, name: &str) -> Option<&Container> {
        self.containers().find(|c| c.name == name)
    }

    /// Every relationship in the model, in element order.
    pub fn relationships(&self) -> Vec<&Relationship> {
        let mut all: Vec<&Relationship> = Vec::new();
        for person in &self.people {
            all.extend(&person.relationships);
        }
        for system in &self.software_systems {
            all.extend(&system.relationships);
            for container in &system.containers {
                all.extend(&container.relationships);
                for component in &container.components {
                    all.extend(&component.relationships);
                }
            }
        }
        all
    }

    /// Resolve an element id to its name.
    pub fn element_name(&self, id: &str) -> Option<&str> {
        if let Some(p) = self.people.iter().find(|p| p.id == id) {
            return Some(&p.name);
        }
        for system in &self.software_systems {
            if system.id == id {
                return Some(&system.name);
            }
            for container in &system.containers {
                if container.id == id {
                    return Some(&container.name);
                }
                if let Some(c) = container.components.iter().find(|c| c.id == id) {
                    return Some(&c.name);
                }
            }
        }
        None
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RankDirection {
    TopBottom,
    BottomTop,
    LeftRight,
    RightLeft,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AutomaticLayout {
    pub rank_direction: RankDirection,
    pub rank_separation: u32,
    pub node_separation: u32,
    pub edge_separation: u32,
    #[serde(default)]
    pub vertices: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElementView {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelationshipView {
    pub id: String,
}

/// Fields shared by every view kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct View {
    pub key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub elements: Vec<ElementView>,
    #[serde(default)]
    pub relationships: Vec<RelationshipView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub automatic_layout: Option<AutomaticLayout>,
}

impl View {
    pub fn contains_element(&self, id: &str) -> bool {
        self.elements.iter().any(|e| e.id == id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SystemContextView {
    pub software_system_id: String,
    #[serde(flatten)]
    pub view: View,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerView {
    pub software_system_id: String,
    #[serde(flatten)]
    pub view: View,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComponentView {
    pub container_id: String,
    #[serde(flatten)]
    pub view: View,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ElementStyle {
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape: Option<Shape>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Styles {
    #[serde(default)]
    pub elements: Vec<ElementStyle>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Configuration {
    #[serde(default)]
    pub styles: Styles,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ViewSet {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub system_context_views: Vec<SystemContextView>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub container_views: Vec<ContainerView>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub component_views: Vec<ComponentView>,
    #[serde(default)]
    pub configuration: Configuration,
}

/// The document handed to the renderer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub model: Model,
    #[serde(default)]
    pub views: ViewSet,
}

impl Workspace {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            model: Model::default(),
            views: ViewSet::default(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

// --- Servers ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebServer {
    /// "http" or "https"
    pub scheme: String,
    pub host: String,
    pub port: u16,
    /// Prefix inserted before every portal path, e.g. "/iris". Usually empty.
    #[serde(default)]
    pub path_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SuperServer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub port: u16,
}

/// A server the user can explore.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServerSpec {
    /// Unique server name, used as the workspace file name
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Web front end used to build Management Portal links. Omit to leave links out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_server: Option<WebServer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub super_server: Option<SuperServer>,
    /// Path to a captured server snapshot (JSON) used by the offline session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<PathBuf>,
}

impl ServerSpec {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            web_server: None,
            super_server: None,
            snapshot: None,
        }
    }
}

// --- Storage ---

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("workspace '{0}' not found")]
    NotFound(String),

    #[error("invalid server name '{0}': use letters, digits, '-', '_' or '.', not starting with '.'")]
    InvalidName(String),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Resolve the global data directory (~/.confex/).
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".confex")
}

/// Directory holding one `<server>.json` per explored server.
pub fn workspaces_dir() -> PathBuf {
    data_dir().join("workspaces")
}

/// List stored workspace names (without .json extension), sorted.
pub fn list_workspaces(dir: &Path) -> StoreResult<Vec<String>> {
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut names: Vec<String> = fs::read_dir(dir)
        .map_err(io_err(dir))?
        .filter_map(|entry| {
            let entry = entry.ok()?;
            let name = entry.file_name().to_string_lossy().to_string();
            name.strip_suffix(".json")
                .filter(|n| !n.ends_with(".baseline") && !n.starts_with('.'))
                .map(|n| n.to_string())
        })
        .collect();
    names.sort();
    Ok(names)
}

/// Server names double as file names, so they must stay inside one directory.
pub fn is_valid_server_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

pub fn validate_server_name(name: &str) -> StoreResult<()> {
    if is_valid_server_name(name) {
        Ok(())
    } else {
        Err(StoreError::InvalidName(name.to_string()))
    }
}

fn workspace_path(dir: &Path, name: &str) -> StoreResult<PathBuf> {
    validate_server_name(name)?;
    Ok(dir.join(format!("{}.json", name)))
}

fn baseline_path(dir: &Path, name: &str) -> StoreResult<PathBuf> {
    validate_server_name(name)?;
    Ok(dir.join(format!("{}.baseline.json", name)))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> StoreResult<T> {
    let raw = fs::read_to_string(path).map_err(io_err(path))?;
    serde_json::from_str(&raw).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a stored workspace.
pub fn read_workspace(dir: &Path, name: &str) -> StoreResult<Workspace> {
    let path = workspace_path(dir, name)?;
    if !path.exists() {
        return Err(StoreError::NotFound(name.to_string()));
    }
    read_json(&path)
}

/// Read the workspace that was current before the last write. `None` when the
/// server has been written only once.
pub fn read_baseline(dir: &Path, name: &str) -> StoreResult<Option<Workspace>> {
    let path = baseline_path(dir, name)?;
    if !path.exists() {
        return Ok(None);
    }
    read_json(&path).map(Some)
}

/// Write a workspace, keeping the previous one as the baseline.
///
/// Uses atomic write (temp file + rename) so a renderer watching the directory
/// never sees a half-written document.
pub fn write_workspace(dir: &Path, name: &str, workspace: &Workspace) -> StoreResult<PathBuf> {
    let path = workspace_path(dir, name)?;
    let baseline = baseline_path(dir, name)?;
    fs::create_dir_all(dir).map_err(io_err(dir))?;
    if path.exists() {
        fs::copy(&path, &baseline).map_err(io_err(&baseline))?;
    }
    let json = workspace.to_json()?;
    let tmp = dir.join(format!(".{}.json.tmp", name));
    fs::write(&tmp, json).map_err(io_err(&tmp))?;
    fs::rename(&tmp, &path).map_err(io_err(&path))?;
    tracing::debug!(path = %path.display(), "wrote workspace");
    Ok(path)
}

/// Delete a workspace and its baseline.
pub fn delete_workspace(dir: &Path, name: &str) -> StoreResult<()> {
    for path in [workspace_path(dir, name)?, baseline_path(dir, name)?] {
        if path.exists() {
            fs::remove_file(&path).map_err(io_err(&path))?;
        }
    }
    Ok(())
}

fn servers_path(dir: &Path) -> PathBuf {
    dir.join("servers.json")
}

/// Read the configured servers. A missing file means no servers.
pub fn read_servers(dir: &Path) -> StoreResult<Vec<ServerSpec>> {
    let path = servers_path(dir);
    if !path.exists() {
        return Ok(vec![]);
    }
    read_json(&path)
}

pub fn write_servers(dir: &Path, servers: &[ServerSpec]) -> StoreResult<()> {
    fs::create_dir_all(dir).map_err(io_err(dir))?;
    let json = serde_json::to_string_pretty(servers)?;
    let path = servers_path(dir);
    fs::write(&path, json).map_err(io_err(&path))
}

/// Insert or replace a server by name. Returns true when it replaced one.
pub fn upsert_server(dir: &Path, spec: ServerSpec) -> StoreResult<bool> {
    validate_server_name(&spec.name)?;
    let mut servers = read_servers(dir)?;
    let replaced = match servers.iter_mut().find(|s| s.name == spec.name) {
        Some(existing) => {
            *existing = spec;
            true
        }
        None => {
            servers.push(spec);
            false
        }
    };
    write_servers(dir, &servers)?;
    Ok(replaced)
}

pub fn find_server(dir: &Path, name: &str) -> StoreResult<Option<ServerSpec>> {
    Ok(read_servers(dir)?.into_iter().find(|s| s.name == name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_workspace() -> Workspace {
        let mut ws = Workspace::new("demo configuration", "Configuration of DEMO");
        let system_id = ws.model.next_id();
        let container_id = ws.model.next_id();
        let component_id = ws.model.next_id();
        let mut container = Container::new(container_id, "demo", "Instance 'DEMO'", "InterSystems server");
        container.components.push(Component::new(
            component_id,
            "USER database",
            "Local at /db/user/",
            "Local database",
            "aDatabase",
        ));
        ws.model.software_systems.push(SoftwareSystem {
            id: system_id,
            tags: vec!["Element".to_string(), "Software System".to_string()],
            name: "'demo'".to_string(),
            description: String::new(),
            location: Location::Internal,
            containers: vec![container],
            relationships: vec![],
        });
        ws
    }

    #[test]
    fn tags_serialize_as_comma_separated_string() {
        let ws = sample_workspace();
        let json = serde_json::to_value(&ws).unwrap();
        let tags = json
            .pointer("/model/softwareSystems/0/containers/0/components/0/tags")
            .and_then(|v| v.as_str())
            .unwrap();
        assert_eq!(tags, "Element,Component,aDatabase");
    }

    #[test]
    fn workspace_survives_json_round_trip() {
        let ws = sample_workspace();
        let json = ws.to_json().unwrap();
        let parsed: Workspace = serde_json::from_str(&json).unwrap();
        // The id counter is not serialized, so compare documents.
        assert_eq!(parsed.to_json().unwrap(), json);
    }

    #[test]
    fn relationship_label_joins_description_and_technology() {
        let rel = Relationship::new("9".into(), "1", "2", "accesses", Some("Globals"));
        assert_eq!(rel.label(), "accesses Globals");
        let plain = Relationship::new("10".into(), "1", "2", "ECPs to", None);
        assert_eq!(plain.label(), "ECPs to");
    }

    #[test]
    fn element_name_resolves_nested_ids() {
        let ws = sample_workspace();
        assert_eq!(ws.model.element_name("1"), Some("'demo'"));
        assert_eq!(ws.model.element_name("3"), Some("USER database"));
        assert_eq!(ws.model.element_name("42"), None);
    }

    #[test]
    fn write_keeps_previous_version_as_baseline() {
        let tmp = tempfile::tempdir().unwrap();
        let first = sample_workspace();
        write_workspace(tmp.path(), "demo", &first).unwrap();
        assert!(read_baseline(tmp.path(), "demo").unwrap().is_none());

        let mut second = sample_workspace();
        second.description = "changed".to_string();
        write_workspace(tmp.path(), "demo", &second).unwrap();

        assert_eq!(read_workspace(tmp.path(), "demo").unwrap().description, "changed");
        assert_eq!(
            read_baseline(tmp.path(), "demo").unwrap().unwrap().description,
            "Configuration of DEMO"
        );
        assert_eq!(list_workspaces(tmp.path()).unwrap(), vec!["demo".to_string()]);
    }

    #[test]
    fn missing_workspace_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_workspace(tmp.path(), "nope"),
            Err(StoreError::NotFound(_))
        ));
        assert!(list_workspaces(&tmp.path().join("absent")).unwrap().is_empty());
    }

    #[test]
    fn corrupt_baseline_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("demo.baseline.json"), "{not json").unwrap();
        assert!(matches!(
            read_baseline(tmp.path(), "demo"),
            Err(StoreError::Json { .. })
        ));
    }

    #[test]
    fn server_names_stay_inside_the_directory() {
        for name in ["iris", "iris-prod_2", "host.example"] {
            assert!(is_valid_server_name(name), "{name}");
        }
        for name in ["", "..", "../escaped", ".hidden", "a/b", "a\\b", "a b"] {
            assert!(!is_valid_server_name(name), "{name}");
        }
    }

    #[test]
    fn storage_refuses_names_that_leave_the_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("workspaces");
        fs::create_dir_all(&dir).unwrap();
        fs::write(tmp.path().join("escaped.json"), sample_workspace().to_json().unwrap()).unwrap();

        assert!(matches!(
            read_workspace(&dir, "../escaped"),
            Err(StoreError::InvalidName(_))
        ));
        assert!(matches!(
            read_baseline(&dir, "../escaped"),
            Err(StoreError::InvalidName(_))
        ));
        assert!(matches!(
            write_workspace(&dir, "../escaped", &sample_workspace()),
            Err(StoreError::InvalidName(_))
        ));
        assert!(matches!(
            delete_workspace(&dir, "../escaped"),
            Err(StoreError::InvalidName(_))
        ));
        assert!(tmp.path().join("escaped.json").exists());

        assert!(matches!(
            upsert_server(tmp.path(), ServerSpec::named("a/b")),
            Err(StoreError::InvalidName(_))
        ));
        assert!(read_servers(tmp.path()).unwrap().is_empty());
    }

    #[test]
    fn upsert_replaces_server_by_name() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(!upsert_server(tmp.path(), ServerSpec::named("iris")).unwrap());

        let mut updated = ServerSpec::named("iris");
        updated.description = Some("primary".to_string());
        assert!(upsert_server(tmp.path(), updated).unwrap());

        let servers = read_servers(tmp.path()).unwrap();
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].description.as_deref(), Some("primary"));
        assert!(find_server(tmp.path(), "other").unwrap().is_none());
    }
}
