use anyhow::Result;
use rmcp::model::{
    CallToolRequestParam, CallToolResult, Content, Implementation, ListToolsResult,
    PaginatedRequestParam, ProtocolVersion, ServerCapabilities, ServerInfo, Tool as McpTool,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData as McpError, RoleServer, ServerHandler, ServiceExt};
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::tools::ToolRegistry;

/// Buffer between the stdin filter and the MCP transport.
const INBOUND_BUFFER: usize = 64 * 1024;

/// MCP tool server exposing the registered tools.
pub struct McpServer {
    name: String,
    version: String,
    registry: ToolRegistry,
}

impl McpServer {
    pub fn new(name: String, version: String, registry: ToolRegistry) -> Self {
        Self {
            name,
            version,
            registry,
        }
    }

    /// Tool descriptors as `tools/list` reports them.
    pub fn tool_definitions(&self) -> Vec<McpTool> {
        self.registry
            .definitions()
            .into_iter()
            .map(|definition| {
                let schema = match &definition["inputSchema"] {
                    Value::Object(map) => map.clone(),
                    _ => serde_json::Map::new(),
                };
                McpTool::new(
                    definition["name"].as_str().unwrap_or_default().to_string(),
                    definition["description"]
                        .as_str()
                        .unwrap_or_default()
                        .to_string(),
                    Arc::new(schema),
                )
            })
            .collect()
    }

    /// Run one tool. The `ToolResponse` goes back as a single text item,
    /// flagged as an error when the tool did not succeed.
    pub async fn call(&self, name: &str, arguments: Value) -> Result<CallToolResult, McpError> {
        let tool = self.registry.get(name).ok_or_else(|| {
            log::warn!("Unknown tool requested: {}", name);
            McpError::invalid_params(format!("Unknown tool: {}", name), None)
        })?;

        log::info!("Calling tool {}", name);
        match tool.run(arguments).await {
            Ok(response) => {
                let text = serde_json::to_string_pretty(&response)
                    .map_err(|e| McpError::internal_error(e.to_string(), None))?;
                if response.success {
                    Ok(CallToolResult::success(vec![Content::text(text)]))
                } else {
                    log::warn!(
                        "Tool {} failed: {}",
                        name,
                        response.error.as_deref().unwrap_or_default()
                    );
                    Ok(CallToolResult::error(vec![Content::text(text)]))
                }
            }
            Err(e) => {
                log::warn!("Tool {} rejected arguments: {:#}", name, e);
                Ok(CallToolResult::error(vec![Content::text(format!("{:#}", e))]))
            }
        }
    }

    /// Serve over stdin/stdout until the client disconnects.
    pub async fn run_stdio(self) -> Result<()> {
        log::info!(
            "{} v{} serving {} tools over stdio",
            self.name,
            self.version,
            self.registry.len()
        );

        let (inbound, filtered) = tokio::io::duplex(INBOUND_BUFFER);
        let forward = tokio::spawn(forward_messages(
            BufReader::new(tokio::io::stdin()),
            inbound,
        ));

        let service = self.serve((filtered, tokio::io::stdout())).await?;
        let reason = service.waiting().await?;
        log::info!("MCP session ended: {:?}", reason);

        forward.abort();
        Ok(())
    }
}

impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: self.name.clone(),
                version: self.version.clone(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Sticky notes: add, modify, delete, search and list notes. \
                 Every change regenerates an HTML report."
                    .to_string(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        let tools = self.tool_definitions();
        log::debug!("Listing {} tools", tools.len());
        Ok(ListToolsResult::with_all_items(tools))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let arguments = request.arguments.map_or(Value::Null, Value::Object);
        self.call(&request.name, arguments).await
    }
}

/// Copy line-delimited messages from `input` to `output`. Blank lines are
/// skipped and JSON-RPC batches are dropped with a warning, since the
/// transport only accepts single messages.
pub async fn forward_messages<R, W>(input: R, mut output: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if message.starts_with('[') {
            log::warn!("Dropping JSON-RPC batch; send one message per line");
            continue;
        }
        output.write_all(message.as_bytes()).await?;
        output.write_all(b"\n").await?;
        output.flush().await?;
    }
    log::info!("stdin closed, shutting down");
    output.shutdown().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ReportEvents;
    use crate::render::ReportRenderer;
    use crate::store::NoteStore;
    use crate::tools::{register_sticky_note_tools, NoteBoard};
    use serde_json::json;
    use tokio::io::{DuplexStream, Lines, ReadHalf, WriteHalf};

    fn server(dir: &tempfile::TempDir) -> McpServer {
        let store = NoteStore::open(
            dir.path().join("sticky_notes.json"),
            ReportRenderer::new(dir.path().join("sticky_notes.html")),
        );
        let mut registry = ToolRegistry::new();
        register_sticky_note_tools(
            &mut registry,
            Arc::new(NoteBoard::new(store, ReportEvents::new())),
        );
        McpServer::new("AggregateMCP".to_string(), "0.1.0".to_string(), registry)
    }

    fn text_of(result: &CallToolResult) -> Value {
        let value = serde_json::to_value(result).unwrap();
        let text = value["content"][0]["text"].as_str().unwrap();
        serde_json::from_str(text).unwrap()
    }

    #[test]
    fn test_tool_definitions_carry_schemas() {
        let dir = tempfile::tempdir().unwrap();
        let tools = server(&dir).tool_definitions();
        assert_eq!(tools.len(), 6);

        let add = tools.iter().find(|t| t.name == "add_sticky_note").unwrap();
        assert_eq!(add.input_schema["type"], "object");
        assert_eq!(add.input_schema["required"][0], "content");
    }

    #[test]
    fn test_server_info_uses_configured_name() {
        let dir = tempfile::tempdir().unwrap();
        let info = server(&dir).get_info();
        assert_eq!(info.server_info.name, "AggregateMCP");
        assert_eq!(info.protocol_version, ProtocolVersion::V_2024_11_05);
        assert!(info.capabilities.tools.is_some());
    }

    #[tokio::test]
    async fn test_unknown_tool_is_invalid_params() {
        let dir = tempfile::tempdir().unwrap();
        let err = server(&dir)
            .call("launch_rocket", Value::Null)
            .await
            .unwrap_err();
        assert!(err.message.contains("Unknown tool"));
    }

    #[tokio::test]
    async fn test_tool_failure_sets_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(&dir);

        let result = server
            .call("delete_sticky_note", json!({ "note_id": 1 }))
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(true));
        assert_eq!(text_of(&result)["error"], "No note found with ID 1");

        let result = server
            .call("delete_sticky_note", json!({ "note_id": "x" }))
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(true));
        let value = serde_json::to_value(&result).unwrap();
        assert!(value["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("Invalid tool arguments"));
    }

    #[tokio::test]
    async fn test_note_lifecycle_through_tools() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(&dir);

        let added = server
            .call(
                "add_sticky_note",
                json!({ "content": "Buy milk", "importance": "Urgent", "category": "Life" }),
            )
            .await
            .unwrap();
        assert_eq!(added.is_error, Some(false));
        assert_eq!(text_of(&added)["data"]["note"]["id"], 1);

        let modified = server
            .call(
                "modify_sticky_note",
                json!({ "note_id": 1, "new_content": "Buy milk and eggs" }),
            )
            .await
            .unwrap();
        let modified = text_of(&modified);
        assert_eq!(modified["data"]["note"]["importance"], "Urgent");
        assert_eq!(modified["data"]["note"]["content"], "Buy milk and eggs");

        let found = server
            .call("search_sticky_notes", json!({ "category": "life" }))
            .await
            .unwrap();
        assert_eq!(text_of(&found)["data"]["matches"].as_array().unwrap().len(), 1);

        let deleted = server
            .call("delete_sticky_note", json!({ "note_id": 1 }))
            .await
            .unwrap();
        assert_eq!(text_of(&deleted)["data"]["remaining_notes"], 0);

        let second = server
            .call("add_sticky_note", json!({ "content": "Second" }))
            .await
            .unwrap();
        assert_eq!(text_of(&second)["data"]["note"]["id"], 2);

        let persisted = std::fs::read_to_string(dir.path().join("sticky_notes.json")).unwrap();
        let doc: Value = serde_json::from_str(&persisted).unwrap();
        assert_eq!(doc["notes"][0]["id"], 2);
        assert_eq!(doc["notes"][0]["category"], "Uncategorized");
    }

    struct Client {
        lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
        writer: WriteHalf<DuplexStream>,
    }

    impl Client {
        async fn send(&mut self, message: Value) {
            let line = format!("{}\n", message);
            self.writer.write_all(line.as_bytes()).await.unwrap();
            self.writer.flush().await.unwrap();
        }

        async fn receive(&mut self) -> Value {
            let line = self.lines.next_line().await.unwrap().unwrap();
            serde_json::from_str(&line).unwrap()
        }
    }

    #[tokio::test]
    async fn test_session_over_json_rpc() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(&dir);
        let (client_io, server_io) = tokio::io::duplex(INBOUND_BUFFER);
        let (server_read, server_write) = tokio::io::split(server_io);
        let (client_read, client_write) = tokio::io::split(client_io);
        let mut client = Client {
            lines: BufReader::new(client_read).lines(),
            writer: client_write,
        };

        let running = tokio::spawn(async move { server.serve((server_read, server_write)).await });

        client
            .send(json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize",
                          "params": { "protocolVersion": "2024-11-05", "capabilities": {},
                                      "clientInfo": { "name": "test", "version": "1" } } }))
            .await;
        let reply = client.receive().await;
        assert_eq!(reply["id"], 1);
        assert_eq!(reply["result"]["serverInfo"]["name"], "AggregateMCP");
        assert_eq!(reply["result"]["protocolVersion"], "2024-11-05");

        client
            .send(json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }))
            .await;
        let service = running.await.unwrap().unwrap();

        client
            .send(json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list" }))
            .await;
        let reply = client.receive().await;
        assert_eq!(reply["id"], 2);
        assert_eq!(reply["result"]["tools"].as_array().unwrap().len(), 6);

        client
            .send(json!({ "jsonrpc": "2.0", "id": 3, "method": "tools/call",
                          "params": { "name": "add_sticky_note",
                                      "arguments": { "content": "Buy milk" } } }))
            .await;
        let reply = client.receive().await;
        assert_eq!(reply["id"], 3);
        assert_eq!(reply["result"]["isError"], false);
        let text: Value =
            serde_json::from_str(reply["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(text["data"]["note"]["content"], "Buy milk");

        service.cancel().await.unwrap();
    }

    #[tokio::test]
    async fn test_forward_drops_batches_and_blank_lines() {
        let input = concat!(
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n",
            "\n",
            "  [{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"ping\"}]\n",
            "{\"jsonrpc\":\"2.0\",\"id\":3,\"method\":\"ping\"}\n",
        );
        let mut output = Vec::new();
        forward_messages(input.as_bytes(), &mut output).await.unwrap();

        let forwarded = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = forwarded.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"id\":1"));
        assert!(lines[1].contains("\"id\":3"));
    }
}
