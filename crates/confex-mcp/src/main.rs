use confex_core::builder::{build_workspace, BuildOptions, BuildOutput};
use confex_core::session::SnapshotSession;
use confex_core::{diff, styles, ServerSpec};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::Deserialize;

// --- Request types ---

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct SetServerRequest {
    /// The server to add, or to replace when a server with the same name exists
    server: ServerSpec,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct ExploreRequest {
    /// Name of a server registered with set_server
    server: String,
    /// Include the server's own system databases (IRISLIB, IRISSYS, ...). Defaults to false.
    show_system_databases: Option<bool>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct GetWorkspaceRequest {
    /// Name of the server whose workspace to read
    name: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct GetChangesRequest {
    /// Name of the server to compare against its previous build
    name: String,
}

fn error_text(text: impl Into<String>) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::error(vec![Content::text(text.into())]))
}

fn success_text(text: impl Into<String>) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(text.into())]))
}

/// Look up `name` in servers.json and build its workspace from the snapshot
/// it points at.
fn explore_server(name: &str, options: BuildOptions) -> Result<(ServerSpec, BuildOutput), String> {
    let spec = confex_core::find_server(&confex_core::data_dir(), name)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("Server '{}' is not configured. Use set_server first.", name))?;
    let snapshot = spec
        .snapshot
        .as_deref()
        .ok_or_else(|| format!("Server '{}' has no snapshot path configured", name))?;
    let session = SnapshotSession::load(snapshot).map_err(|e| e.to_string())?;
    let output = build_workspace(session, &spec, options).map_err(|e| e.to_string())?;
    Ok((spec, output))
}

// --- Server ---

#[derive(Clone)]
pub struct ConfexServer {
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl ConfexServer {
    pub fn new() -> Self {
        Self {
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "List the configured servers with their web and superserver endpoints")]
    fn list_servers(&self) -> Result<CallToolResult, McpError> {
        match confex_core::read_servers(&confex_core::data_dir()) {
            Ok(servers) if servers.is_empty() => {
                success_text("No servers configured. Use set_server to add one.")
            }
            Ok(servers) => match serde_json::to_string_pretty(&servers) {
                Ok(json) => success_text(json),
                Err(e) => error_text(format!("Serialization error: {}", e)),
            },
            Err(e) => error_text(e.to_string()),
        }
    }

    #[tool(
        description = "Add or replace a server. Give it a unique name (letters, digits, '-', '_' or '.'), an optional webServer {scheme, host, port, pathPrefix} used for Management Portal links, and a snapshot path to a captured server JSON used by explore."
    )]
    fn set_server(
        &self,
        Parameters(req): Parameters<SetServerRequest>,
    ) -> Result<CallToolResult, McpError> {
        if let Err(e) = confex_core::validate_server_name(&req.server.name) {
            return error_text(e.to_string());
        }
        let name = req.server.name.clone();
        match confex_core::upsert_server(&confex_core::data_dir(), req.server) {
            Ok(true) => success_text(format!("Updated server '{}'", name)),
            Ok(false) => success_text(format!("Added server '{}'", name)),
            Err(e) => error_text(e.to_string()),
        }
    }

    #[tool(
        description = "Build the configuration workspace of a server: its ECP data servers, databases and namespaces, with namespace-to-database relationships and system context, container and component views. Stores the workspace (the previous one becomes the baseline for get_changes) and returns a build summary."
    )]
    fn explore(&self, Parameters(req): Parameters<ExploreRequest>) -> Result<CallToolResult, McpError> {
        let options = BuildOptions {
            show_system_databases: req.show_system_databases.unwrap_or(false),
        };
        let (spec, output) = match explore_server(&req.server, options) {
            Ok(built) => built,
            Err(e) => return error_text(format!("Failed to explore '{}': {}", req.server, e)),
        };

        let path = match confex_core::write_workspace(
            &confex_core::workspaces_dir(),
            &spec.name,
            &output.workspace,
        ) {
            Ok(path) => path,
            Err(e) => return error_text(e.to_string()),
        };

        let summary = serde_json::to_string_pretty(&output.summary)
            .unwrap_or_else(|e| format!("Serialization error: {}", e));
        success_text(format!("Wrote {}\n{}", path.display(), summary))
    }

    #[tool(description = "List the servers that have a stored workspace")]
    fn list_workspaces(&self) -> Result<CallToolResult, McpError> {
        match confex_core::list_workspaces(&confex_core::workspaces_dir()) {
            Ok(names) if names.is_empty() => {
                success_text("No workspaces found. Use explore to build one.")
            }
            Ok(names) => success_text(names.join("\n")),
            Err(e) => error_text(e.to_string()),
        }
    }

    #[tool(
        description = "Get the stored workspace JSON for a server. Returns {name, description, model: {people, softwareSystems: [{containers: [{components: [{tags, relationships}]}]}]}, views: {systemContextViews, containerViews, componentViews, configuration}}. Tags are comma-separated strings."
    )]
    fn get_workspace(
        &self,
        Parameters(req): Parameters<GetWorkspaceRequest>,
    ) -> Result<CallToolResult, McpError> {
        let workspace = match confex_core::read_workspace(&confex_core::workspaces_dir(), &req.name) {
            Ok(ws) => ws,
            Err(e) => return error_text(format!("Failed to read workspace '{}': {}", req.name, e)),
        };
        match workspace.to_json() {
            Ok(json) => success_text(json),
            Err(e) => error_text(format!("Serialization error: {}", e)),
        }
    }

    #[tool(
        description = "Show what changed on a server between its last two explore runs: containers, components and relationships added or removed, and components whose tags, description or links changed."
    )]
    fn get_changes(
        &self,
        Parameters(req): Parameters<GetChangesRequest>,
    ) -> Result<CallToolResult, McpError> {
        let dir = confex_core::workspaces_dir();
        let current = match confex_core::read_workspace(&dir, &req.name) {
            Ok(ws) => ws,
            Err(e) => return error_text(format!("Failed to read workspace '{}': {}", req.name, e)),
        };
        let baseline = match confex_core::read_baseline(&dir, &req.name) {
            Ok(Some(ws)) => ws,
            Ok(None) => {
                return error_text("No baseline found. Run explore at least twice to compare builds.")
            }
            Err(e) => return error_text(format!("Failed to read baseline for '{}': {}", req.name, e)),
        };
        success_text(diff::compare(&baseline, &current).render())
    }

    #[tool(description = "Get the element styles applied to each component tag")]
    fn get_styles(&self) -> Result<CallToolResult, McpError> {
        match serde_json::to_string_pretty(&styles::element_styles()) {
            Ok(json) => success_text(json),
            Err(e) => error_text(format!("Serialization error: {}", e)),
        }
    }
}

#[tool_handler]
impl ServerHandler for ConfexServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

const INSTRUCTIONS: &str = r#"confex maps the configuration of InterSystems IRIS servers into architecture workspaces (Structurizr JSON).

## Workflow
1. `list_servers` to see what is configured. Add a server with `set_server`.
2. `explore` a server. This reads its ECP data servers, databases and namespaces and stores the workspace.
3. `get_workspace` to read the result. Components are tagged `aDatabase`, `aSystemDatabase`, `aRemoteDatabase`, `aNamespace` or `aPseudoNamespace` (%ALL).
4. After the server configuration changes, `explore` again and call `get_changes`.

## Model
- The focused server is a container. Each ECP data server it uses is a sibling container joined by an "ECPs to" relationship.
- Databases and namespaces are components of the focused server.
- A namespace "accesses" the database holding its globals, its routines, or both ("Globals and Routines").
- System databases are hidden unless explore is called with show_system_databases."#;

fn init_logging() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "confex_core=info,confex_mcp=info".into()),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("explore") => return explore_command(&args[1..]),
        _ => {}
    }

    tracing::info!("starting MCP server on stdio");
    let service = ConfexServer::new()
        .serve(rmcp::transport::io::stdio())
        .await
        .inspect_err(|e| tracing::error!(error = %e, "MCP server error"))?;
    service.waiting().await?;
    Ok(())
}

/// `confex-mcp explore <server> [--show-system-databases]`: build once and
/// print the workspace JSON to stdout.
fn explore_command(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let mut server = None;
    let mut options = BuildOptions::default();
    for arg in args {
        match arg.as_str() {
            "--show-system-databases" => options.show_system_databases = true,
            flag if flag.starts_with("--") => return Err(format!("unknown flag {}", flag).into()),
            name => server = Some(name),
        }
    }
    let Some(server) = server else {
        eprintln!("usage: confex-mcp explore <server> [--show-system-databases]");
        std::process::exit(2);
    };

    let (_, output) = explore_server(server, options)?;
    println!("{}", output.workspace.to_json()?);
    tracing::info!(
        server,
        databases = output.summary.databases,
        namespaces = output.summary.namespaces,
        failed_queries = output.summary.failed_queries.len(),
        "explore finished"
    );
    Ok(())
}
