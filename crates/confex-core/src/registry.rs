use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Database,
    Namespace,
}

/// Name -> component id, one keyspace per kind. Scoped to a single build.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    databases: HashMap<String, String>,
    namespaces: HashMap<String, String>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn keyspace(&self, kind: EntityKind) -> &HashMap<String, String> {
        match kind {
            EntityKind::Database => &self.databases,
            EntityKind::Namespace => &self.namespaces,
        }
    }

    pub fn get(&self, kind: EntityKind, name: &str) -> Option<&str> {
        self.keyspace(kind).get(name).map(String::as_str)
    }

    pub fn contains(&self, kind: EntityKind, name: &str) -> bool {
        self.keyspace(kind).contains_key(name)
    }

    /// Record `id` for `name`. Blank names are refused and an existing entry
    /// is kept, so the first registration wins. Returns whether it was stored.
    pub fn register(&mut self, kind: EntityKind, name: &str, id: &str) -> bool {
        if name.trim().is_empty() {
            return false;
        }
        let keyspace = match kind {
            EntityKind::Database => &mut self.databases,
            EntityKind::Namespace => &mut self.namespaces,
        };
        if keyspace.contains_key(name) {
            return false;
        }
        keyspace.insert(name.to_string(), id.to_string());
        true
    }

    pub fn len(&self, kind: EntityKind) -> usize {
        self.keyspace(kind).len()
    }
}
