/// How a namespace uses one of its databases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Globals,
    Routines,
    GlobalsAndRoutines,
}

impl Purpose {
    /// Carried as the relationship technology.
    pub fn as_str(self) -> &'static str {
        match self {
            Purpose::Globals => "Globals",
            Purpose::Routines => "Routines",
            Purpose::GlobalsAndRoutines => "Globals and Routines",
        }
    }
}

/// Relationship description shared by every namespace -> database edge.
pub const ACCESSES: &str = "accesses";

/// One namespace -> database edge to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessEdge {
    pub database_id: String,
    pub purpose: Purpose,
}

impl AccessEdge {
    pub fn label(&self) -> String {
        format!("{} {}", ACCESSES, self.purpose.as_str())
    }
}

/// Decide the edges from a namespace to its globals and routines databases.
///
/// `lookup` resolves a database name to its component id. A name it cannot
/// resolve yields no edge. When both names match, one edge covers both.
pub fn access_edges<'a, F>(globals: &str, routines: &str, lookup: F) -> Vec<AccessEdge>
where
    F: Fn(&str) -> Option<&'a str>,
{
    if globals == routines {
        return lookup(globals)
            .map(|id| AccessEdge {
                database_id: id.to_string(),
                purpose: Purpose::GlobalsAndRoutines,
            })
            .into_iter()
            .collect();
    }

    [(globals, Purpose::Globals), (routines, Purpose::Routines)]
        .into_iter()
        .filter_map(|(name, purpose)| {
            lookup(name).map(|id| AccessEdge {
                database_id: id.to_string(),
                purpose,
            })
        })
        .collect()
}
