//! Diagram views over a finished model.

use crate::{
    AutomaticLayout, ComponentView, ContainerView, ElementView, Model, RankDirection,
    RelationshipView, SystemContextView, View, Workspace,
};
use std::collections::HashSet;

pub const SYSTEM_CONTEXT_KEY: &str = "server-context";
pub const CONTAINER_KEY: &str = "server-containers";
pub const COMPONENT_KEY: &str = "server-components";

/// Layout shared by every view.
pub fn automatic_layout() -> AutomaticLayout {
    AutomaticLayout {
        rank_direction: RankDirection::TopBottom,
        rank_separation: 300,
        node_separation: 300,
        edge_separation: 400,
        vertices: false,
    }
}

/// `center` followed by every element joined to it by a relationship, in
/// relationship order. `accept` filters the neighbours.
fn with_neighbours(model: &Model, center: &str, accept: impl Fn(&str) -> bool) -> Vec<String> {
    let mut ids = vec![center.to_string()];
    for rel in model.relationships() {
        let other = if rel.source_id == center {
            &rel.destination_id
        } else if rel.destination_id == center {
            &rel.source_id
        } else {
            continue;
        };
        if accept(other) && !ids.contains(other) {
            ids.push(other.clone());
        }
    }
    ids
}

fn view(model: &Model, key: &str, description: &str, element_ids: Vec<String>) -> View {
    let included: HashSet<&str> = element_ids.iter().map(String::as_str).collect();
    let relationships = model
        .relationships()
        .into_iter()
        .filter(|r| {
            included.contains(r.source_id.as_str()) && included.contains(r.destination_id.as_str())
        })
        .map(|r| RelationshipView { id: r.id.clone() })
        .collect();
    View {
        key: key.to_string(),
        description: description.to_string(),
        elements: element_ids.into_iter().map(|id| ElementView { id }).collect(),
        relationships,
        automatic_layout: Some(automatic_layout()),
    }
}

/// Declare the system-context, container and component views for the focused
/// server. Replaces any views already present.
pub fn compose(workspace: &mut Workspace, system_id: &str, focused_id: &str) {
    let model = &workspace.model;

    let top_level: HashSet<&str> = model
        .people
        .iter()
        .map(|p| p.id.as_str())
        .chain(model.software_systems.iter().map(|s| s.id.as_str()))
        .collect();
    let context_ids = with_neighbours(model, system_id, |id| top_level.contains(id));

    let containers: HashSet<&str> = model.containers().map(|c| c.id.as_str()).collect();
    let container_ids = with_neighbours(model, focused_id, |id| containers.contains(id));

    let component_ids: Vec<String> = model
        .containers()
        .find(|c| c.id == focused_id)
        .map(|c| c.components.iter().map(|comp| comp.id.clone()).collect())
        .unwrap_or_default();

    let system_context = SystemContextView {
        software_system_id: system_id.to_string(),
        view: view(
            model,
            SYSTEM_CONTEXT_KEY,
            "The system context view for the focused server",
            context_ids,
        ),
    };
    let container = ContainerView {
        software_system_id: system_id.to_string(),
        view: view(
            model,
            CONTAINER_KEY,
            "Container view for the focused server",
            container_ids,
        ),
    };
    let component = ComponentView {
        container_id: focused_id.to_string(),
        view: view(
            model,
            COMPONENT_KEY,
            "Component view for the focused server",
            component_ids,
        ),
    };

    tracing::debug!(
        context = system_context.view.elements.len(),
        containers = container.view.elements.len(),
        components = component.view.elements.len(),
        "views composed"
    );

    workspace.views.system_context_views = vec![system_context];
    workspace.views.container_views = vec![container];
    workspace.views.component_views = vec![component];
}
