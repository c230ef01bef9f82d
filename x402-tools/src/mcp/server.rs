//! MCP server over newline-delimited JSON-RPC (stdio)

use serde_json::{json, Value};
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use super::protocol::{
    PROTOCOL_VERSION, RpcError, RpcRequest, RpcResponse, ToolCallParams, ToolCallResult,
    JSONRPC_VERSION,
};
use crate::tools::ToolRegistry;

pub struct McpServer {
    registry: Arc<ToolRegistry>,
}

impl McpServer {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Serve until `reader` hits EOF.
    ///
    /// `tools/call` requests run on their own tasks so a slow paid call
    /// doesn't hold up the rest of the session. All output goes through a
    /// single writer task, one JSON message per line. In-flight calls are
    /// always drained before returning, even when reading fails.
    pub async fn serve<R, W>(self: Arc<Self>, mut reader: R, mut writer: W) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<RpcResponse>();

        let writer_task = tokio::spawn(async move {
            while let Some(response) = rx.recv().await {
                let mut line = match serde_json::to_string(&response) {
                    Ok(line) => line,
                    Err(e) => {
                        log::error!("[MCP] Failed to serialize response: {}", e);
                        continue;
                    }
                };
                line.push('\n');
                writer.write_all(line.as_bytes()).await?;
                writer.flush().await?;
            }
            Ok::<(), io::Error>(())
        });

        let mut in_flight = JoinSet::new();
        let mut buf = Vec::new();

        let read_result = loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break Ok(()),
                Ok(_) => {}
                Err(e) => {
                    log::error!("[MCP] Failed to read input: {}", e);
                    break Err(e);
                }
            }

            let line = match std::str::from_utf8(&buf) {
                Ok(line) => line.trim(),
                Err(e) => {
                    log::warn!("[MCP] Message is not valid UTF-8: {}", e);
                    let _ = tx.send(RpcResponse::error(Value::Null, RpcError::parse_error()));
                    continue;
                }
            };
            if line.is_empty() {
                continue;
            }

            let request = match parse_request(line) {
                Ok(request) => request,
                Err(response) => {
                    let _ = tx.send(response);
                    continue;
                }
            };

            if request.method == "tools/call" {
                let server = self.clone();
                let tx = tx.clone();
                in_flight.spawn(async move {
                    if let Some(response) = server.dispatch(request).await {
                        let _ = tx.send(response);
                    }
                });
            } else if let Some(response) = self.dispatch(request).await {
                let _ = tx.send(response);
            }

            while let Some(joined) = in_flight.try_join_next() {
                if let Err(e) = joined {
                    log::error!("[MCP] Tool task failed: {}", e);
                }
            }
        };

        log::info!("[MCP] Input closed, waiting for {} in-flight call(s)", in_flight.len());
        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                log::error!("[MCP] Tool task failed: {}", e);
            }
        }

        drop(tx);
        let write_result = writer_task
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

        read_result.and(write_result)
    }

    /// Handle one raw message. `None` means nothing should be written back.
    pub async fn handle_line(&self, line: &str) -> Option<RpcResponse> {
        match parse_request(line) {
            Ok(request) => self.dispatch(request).await,
            Err(response) => Some(response),
        }
    }

    async fn dispatch(&self, request: RpcRequest) -> Option<RpcResponse> {
        if request.is_notification() {
            log::debug!("[MCP] Notification: {}", request.method);
            return None;
        }

        let id = request.id.clone().unwrap_or(Value::Null);
        let result = self.dispatch_method(&request).await;

        Some(match result {
            Ok(value) => RpcResponse::success(id, value),
            Err(error) => RpcResponse::error(id, error),
        })
    }

    async fn dispatch_method(&self, request: &RpcRequest) -> Result<Value, RpcError> {
        if let Some(version) = &request.jsonrpc {
            if version != JSONRPC_VERSION {
                return Err(RpcError::invalid_request(format!(
                    "Unsupported jsonrpc version '{}'",
                    version
                )));
            }
        }

        match request.method.as_str() {
            "initialize" => Ok(self.handle_initialize()),
            "ping" => Ok(json!({})),
            "tools/list" => self.handle_tools_list(),
            "tools/call" => {
                let params: ToolCallParams = serde_json::from_value(request.params.clone())
                    .map_err(|e| RpcError::invalid_params(format!("Invalid params: {}", e)))?;
                self.handle_tools_call(params).await
            }
            _ => Err(RpcError::method_not_found()),
        }
    }

    fn handle_initialize(&self) -> Value {
        log::info!("[MCP] Client initialized, {} tools available", self.registry.len());
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": { "listChanged": false } },
            "serverInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            },
        })
    }

    fn handle_tools_list(&self) -> Result<Value, RpcError> {
        let tools = self.registry.get_tool_definitions();
        serde_json::to_value(&tools)
            .map(|tools| json!({ "tools": tools }))
            .map_err(|e| RpcError::internal_error(format!("Failed to list tools: {}", e)))
    }

    async fn handle_tools_call(&self, params: ToolCallParams) -> Result<Value, RpcError> {
        if !self.registry.has_tool(&params.name) {
            return Err(RpcError::invalid_params(format!(
                "Unknown tool: {}",
                params.name
            )));
        }

        let arguments = match params.arguments {
            Value::Null => json!({}),
            other => other,
        };

        let result = self.registry.execute(&params.name, arguments).await;
        let call_result = if result.success {
            ToolCallResult::text(result.content)
        } else {
            ToolCallResult::error(result.content)
        };

        serde_json::to_value(&call_result)
            .map_err(|e| RpcError::internal_error(format!("Failed to encode tool result: {}", e)))
    }
}

fn parse_request(line: &str) -> Result<RpcRequest, RpcResponse> {
    serde_json::from_str(line).map_err(|e| {
        log::warn!("[MCP] Unparseable message: {}", e);
        RpcResponse::error(Value::Null, RpcError::parse_error())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{Tool, ToolDefinition, ToolInputSchema, ToolResult};
    use async_trait::async_trait;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use std::time::Duration;
    use tokio::io::{AsyncRead, AsyncReadExt, BufReader, ReadBuf};

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "echo".to_string(),
                description: "Echo the query".to_string(),
                input_schema: ToolInputSchema::default(),
            }
        }

        async fn execute(&self, params: Value) -> ToolResult {
            match params.get("query").and_then(Value::as_str) {
                Some(q) => ToolResult::success(q),
                None => ToolResult::error("'query' is required"),
            }
        }
    }

    /// Echo that takes a while, to keep a call in flight
    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "slow".to_string(),
                description: "Answer after a delay".to_string(),
                input_schema: ToolInputSchema::default(),
            }
        }

        async fn execute(&self, _params: Value) -> ToolResult {
            tokio::time::sleep(Duration::from_millis(100)).await;
            ToolResult::success("slow done")
        }
    }

    /// Yields `data` once, then fails every read
    struct FailingReader {
        data: &'static [u8],
        sent: bool,
    }

    impl AsyncRead for FailingReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if self.sent {
                return Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdin gone")));
            }
            self.sent = true;
            buf.put_slice(self.data);
            Poll::Ready(Ok(()))
        }
    }

    fn server() -> McpServer {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        registry.register(Arc::new(SlowTool));
        McpServer::new(Arc::new(registry))
    }

    fn to_json(response: RpcResponse) -> Value {
        serde_json::to_value(response).unwrap()
    }

    #[tokio::test]
    async fn test_initialize() {
        let response = server()
            .handle_line(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#)
            .await
            .unwrap();
        let value = to_json(response);
        assert_eq!(value["id"], 1);
        assert_eq!(value["result"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(value["result"]["serverInfo"]["name"], "x402-tools");
        assert!(value["result"]["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn test_notification_has_no_response() {
        let response = server()
            .handle_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_tools_list() {
        let response = server()
            .handle_line(r#"{"jsonrpc":"2.0","id":"a","method":"tools/list"}"#)
            .await
            .unwrap();
        let value = to_json(response);
        assert_eq!(value["id"], "a");
        assert_eq!(value["result"]["tools"][0]["name"], "echo");
        assert_eq!(value["result"]["tools"][0]["inputSchema"]["type"], "object");
        assert_eq!(value["result"]["tools"][1]["name"], "slow");
    }

    #[tokio::test]
    async fn test_tools_call_success_and_tool_error() {
        let s = server();
        let ok = to_json(
            s.handle_line(
                r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"echo","arguments":{"query":"hi"}}}"#,
            )
            .await
            .unwrap(),
        );
        assert_eq!(ok["result"]["isError"], false);
        assert_eq!(ok["result"]["content"][0]["type"], "text");
        assert_eq!(ok["result"]["content"][0]["text"], "hi");

        let failed = to_json(
            s.handle_line(
                r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"echo"}}"#,
            )
            .await
            .unwrap(),
        );
        assert_eq!(failed["result"]["isError"], true);
        assert_eq!(failed["result"]["content"][0]["text"], "'query' is required");
    }

    #[tokio::test]
    async fn test_errors() {
        let s = server();

        let unknown_method = s
            .handle_line(r#"{"jsonrpc":"2.0","id":4,"method":"resources/list"}"#)
            .await
            .unwrap();
        assert_eq!(unknown_method.error.unwrap().code, -32601);

        let unknown_tool = s
            .handle_line(r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{"name":"nope"}}"#)
            .await
            .unwrap();
        assert_eq!(unknown_tool.error.unwrap().code, -32602);

        let bad_params = s
            .handle_line(r#"{"jsonrpc":"2.0","id":6,"method":"tools/call","params":{"arguments":{}}}"#)
            .await
            .unwrap();
        assert_eq!(bad_params.error.unwrap().code, -32602);

        let parse = s.handle_line("{not json").await.unwrap();
        assert_eq!(parse.id, Value::Null);
        assert_eq!(parse.error.unwrap().code, -32700);

        let wrong_version = s
            .handle_line(r#"{"jsonrpc":"1.0","id":7,"method":"ping"}"#)
            .await
            .unwrap();
        assert_eq!(wrong_version.error.unwrap().code, -32600);
    }

    #[tokio::test]
    async fn test_serve_session() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#, "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#, "\n",
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"echo","arguments":{"query":"one"}}}"#, "\n",
            r#"{"jsonrpc":"2.0","id":3,"method":"ping"}"#, "\n",
        );

        let (client_end, server_end) = tokio::io::duplex(64 * 1024);
        let server = Arc::new(server());
        server
            .serve(BufReader::new(input.as_bytes()), server_end)
            .await
            .unwrap();

        let mut output = String::new();
        let mut client_end = client_end;
        client_end.read_to_string(&mut output).await.unwrap();

        let responses: Vec<Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(responses.len(), 3);

        let mut ids: Vec<i64> = responses.iter().map(|r| r["id"].as_i64().unwrap()).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2, 3]);

        let call = responses.iter().find(|r| r["id"] == 2).unwrap();
        assert_eq!(call["result"]["content"][0]["text"], "one");
    }

    #[tokio::test]
    async fn test_null_id_is_answered() {
        let response = server()
            .handle_line(r#"{"jsonrpc":"2.0","id":null,"method":"ping"}"#)
            .await
            .expect("a null id is a request, not a notification");
        let value = to_json(response);
        assert_eq!(value["id"], Value::Null);
        assert_eq!(value["result"], json!({}));
    }

    async fn collect_output(client_end: tokio::io::DuplexStream) -> Vec<Value> {
        let mut output = String::new();
        let mut client_end = client_end;
        client_end.read_to_string(&mut output).await.unwrap();
        output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_invalid_utf8_gets_parse_error_and_session_continues() {
        let mut input = Vec::new();
        input.extend_from_slice(
            br#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"slow"}}"#,
        );
        input.push(b'\n');
        input.extend_from_slice(&[0xff, 0xfe, b'\n']);
        input.extend_from_slice(br#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#);
        input.push(b'\n');

        let (client_end, server_end) = tokio::io::duplex(64 * 1024);
        Arc::new(server())
            .serve(BufReader::new(input.as_slice()), server_end)
            .await
            .unwrap();

        let responses = collect_output(client_end).await;
        assert_eq!(responses.len(), 3);

        let parse_error = responses.iter().find(|r| r["id"].is_null()).unwrap();
        assert_eq!(parse_error["error"]["code"], -32700);

        let ping = responses.iter().find(|r| r["id"] == 2).unwrap();
        assert_eq!(ping["result"], json!({}));

        let slow = responses.iter().find(|r| r["id"] == 1).unwrap();
        assert_eq!(slow["result"]["content"][0]["text"], "slow done");
    }

    #[tokio::test]
    async fn test_read_error_drains_in_flight_calls() {
        let reader = FailingReader {
            data: b"{\"jsonrpc\":\"2.0\",\"id\":7,\"method\":\"tools/call\",\"params\":{\"name\":\"slow\"}}\n",
            sent: false,
        };

        let (client_end, server_end) = tokio::io::duplex(64 * 1024);
        let err = Arc::new(server())
            .serve(BufReader::new(reader), server_end)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);

        let responses = collect_output(client_end).await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["id"], 7);
        assert_eq!(responses[0]["result"]["content"][0]["text"], "slow done");
    }
}
