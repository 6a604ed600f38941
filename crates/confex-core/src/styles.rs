//! Visual classification tags and their element styles.

use crate::{ElementStyle, Shape};

pub const DATABASE: &str = "aDatabase";
pub const SYSTEM_DATABASE: &str = "aSystemDatabase";
pub const REMOTE_DATABASE: &str = "aRemoteDatabase";
pub const NAMESPACE: &str = "aNamespace";
pub const PSEUDO_NAMESPACE: &str = "aPseudoNamespace";

/// Namespace name standing for "all namespaces".
pub const ALL_NAMESPACES: &str = "%ALL";

/// Name prefixes of databases shipped with the product. Only consulted when
/// the server cannot answer the directory predicate.
pub const SYSTEM_DATABASE_PREFIXES: &[&str] = &["IRIS", "ENSLIB", "HSLIB", "HSSYS"];

const BLACK: &str = "#000000";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseClass {
    Ordinary,
    System,
    Remote,
}

impl DatabaseClass {
    /// Remote when an owning peer is named. Otherwise `is_system` decides, and
    /// it is never called for remote databases.
    pub fn classify(server: &str, is_system: impl FnOnce() -> bool) -> Self {
        if !server.trim().is_empty() {
            DatabaseClass::Remote
        } else if is_system() {
            DatabaseClass::System
        } else {
            DatabaseClass::Ordinary
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            DatabaseClass::Ordinary => DATABASE,
            DatabaseClass::System => SYSTEM_DATABASE,
            DatabaseClass::Remote => REMOTE_DATABASE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceClass {
    Ordinary,
    Pseudo,
}

impl NamespaceClass {
    pub fn classify(name: &str) -> Self {
        if name == ALL_NAMESPACES {
            NamespaceClass::Pseudo
        } else {
            NamespaceClass::Ordinary
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            NamespaceClass::Ordinary => NAMESPACE,
            NamespaceClass::Pseudo => PSEUDO_NAMESPACE,
        }
    }
}

/// Fallback system-database check by name.
pub fn has_system_prefix(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    SYSTEM_DATABASE_PREFIXES.iter().any(|p| upper.starts_with(p))
}

fn style(
    tag: &str,
    shape: Shape,
    stroke: Option<&str>,
    background: Option<&str>,
) -> ElementStyle {
    ElementStyle {
        tag: tag.to_string(),
        shape: Some(shape),
        stroke: stroke.map(str::to_string),
        color: Some(BLACK.to_string()),
        background: background.map(str::to_string),
    }
}

/// The fixed style list attached to every workspace.
pub fn element_styles() -> Vec<ElementStyle> {
    vec![
        style(DATABASE, Shape::Cylinder, Some(BLACK), None),
        // no outline, so system databases read lighter than user ones
        style(SYSTEM_DATABASE, Shape::Cylinder, None, None),
        style(REMOTE_DATABASE, Shape::Cylinder, Some(BLACK), Some("#ffffff")),
        style(NAMESPACE, Shape::Folder, Some(BLACK), Some("#fb9c05")),
        style(PSEUDO_NAMESPACE, Shape::Folder, None, Some("#b0b0b0")),
    ]
}
