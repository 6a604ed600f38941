//! Change summary between two builds of the same server.
//!
//! Element ids are reassigned on every build, so elements are matched by
//! name path (`container` or `container/component`) and relationships by
//! their endpoints' paths plus label.

use crate::{Component, Workspace};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentChange {
    pub path: String,
    pub changes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceDiff {
    pub containers_added: Vec<String>,
    pub containers_removed: Vec<String>,
    pub components_added: Vec<String>,
    pub components_removed: Vec<String>,
    pub components_changed: Vec<ComponentChange>,
    pub relationships_added: Vec<String>,
    pub relationships_removed: Vec<String>,
}

impl WorkspaceDiff {
    pub fn is_empty(&self) -> bool {
        self.containers_added.is_empty()
            && self.containers_removed.is_empty()
            && self.components_added.is_empty()
            && self.components_removed.is_empty()
            && self.components_changed.is_empty()
            && self.relationships_added.is_empty()
            && self.relationships_removed.is_empty()
    }

    /// Human-readable sections, one per non-empty category.
    pub fn render(&self) -> String {
        fn section(sections: &mut Vec<String>, title: &str, items: &[String]) {
            if items.is_empty() {
                return;
            }
            let mut lines = vec![format!("{} ({}):", title, items.len())];
            lines.extend(items.iter().map(|i| format!("  - {}", i)));
            sections.push(lines.join("\n"));
        }

        let mut sections: Vec<String> = Vec::new();
        section(&mut sections, "Containers added", &self.containers_added);
        section(&mut sections, "Containers removed", &self.containers_removed);
        section(&mut sections, "Components added", &self.components_added);
        section(&mut sections, "Components removed", &self.components_removed);
        let changed: Vec<String> = self
            .components_changed
            .iter()
            .map(|c| format!("{}: {}", c.path, c.changes.join(", ")))
            .collect();
        section(&mut sections, "Components modified", &changed);
        section(&mut sections, "Relationships added", &self.relationships_added);
        section(&mut sections, "Relationships removed", &self.relationships_removed);

        if sections.is_empty() {
            "No changes since the previous build.".to_string()
        } else {
            sections.join("\n\n")
        }
    }
}

/// Path of every container and component, keyed by element id.
fn paths(ws: &Workspace) -> HashMap<&str, String> {
    let mut paths = HashMap::new();
    for person in &ws.model.people {
        paths.insert(person.id.as_str(), person.name.clone());
    }
    for system in &ws.model.software_systems {
        paths.insert(system.id.as_str(), system.name.clone());
        for container in &system.containers {
            paths.insert(container.id.as_str(), container.name.clone());
            for component in &container.components {
                paths.insert(
                    component.id.as_str(),
                    format!("{}/{}", container.name, component.name),
                );
            }
        }
    }
    paths
}

fn container_names(ws: &Workspace) -> Vec<String> {
    ws.model.containers().map(|c| c.name.clone()).collect()
}

fn components(ws: &Workspace) -> Vec<(String, &Component)> {
    ws.model
        .containers()
        .flat_map(|c| {
            c.components
                .iter()
                .map(move |comp| (format!("{}/{}", c.name, comp.name), comp))
        })
        .collect()
}

fn relationship_keys(ws: &Workspace) -> Vec<String> {
    let paths = paths(ws);
    let name = |id: &str| paths.get(id).cloned().unwrap_or_else(|| id.to_string());
    ws.model
        .relationships()
        .into_iter()
        .map(|r| {
            format!(
                "{} -[{}]-> {}",
                name(&r.source_id),
                r.label(),
                name(&r.destination_id)
            )
        })
        .collect()
}

fn added(from: &[String], to: &[String]) -> Vec<String> {
    let known: HashSet<&String> = from.iter().collect();
    to.iter().filter(|k| !known.contains(k)).cloned().collect()
}

fn describe_change(base: &Component, curr: &Component) -> Vec<String> {
    let mut changes = Vec::new();
    if base.tags != curr.tags {
        changes.push(format!("tags {} -> {}", base.tags.join(","), curr.tags.join(",")));
    }
    if base.description != curr.description {
        changes.push(format!(
            "description \"{}\" -> \"{}\"",
            base.description, curr.description
        ));
    }
    if base.technology != curr.technology {
        changes.push("technology changed".to_string());
    }
    if base.url != curr.url {
        changes.push("url changed".to_string());
    }
    changes
}

pub fn compare(baseline: &Workspace, current: &Workspace) -> WorkspaceDiff {
    let base_containers = container_names(baseline);
    let curr_containers = container_names(current);

    let base_components = components(baseline);
    let curr_components = components(current);
    let base_paths: Vec<String> = base_components.iter().map(|(p, _)| p.clone()).collect();
    let curr_paths: Vec<String> = curr_components.iter().map(|(p, _)| p.clone()).collect();

    let base_by_path: HashMap<&str, &Component> = base_components
        .iter()
        .map(|(p, c)| (p.as_str(), *c))
        .collect();
    let components_changed = curr_components
        .iter()
        .filter_map(|(path, curr)| {
            let base = base_by_path.get(path.as_str())?;
            let changes = describe_change(base, curr);
            (!changes.is_empty()).then(|| ComponentChange {
                path: path.clone(),
                changes,
            })
        })
        .collect();

    let base_rels = relationship_keys(baseline);
    let curr_rels = relationship_keys(current);

    WorkspaceDiff {
        containers_added: added(&base_containers, &curr_containers),
        containers_removed: added(&curr_containers, &base_containers),
        components_added: added(&base_paths, &curr_paths),
        components_removed: added(&curr_paths, &base_paths),
        components_changed,
        relationships_added: added(&base_rels, &curr_rels),
        relationships_removed: added(&curr_rels, &base_rels),
    }
}
