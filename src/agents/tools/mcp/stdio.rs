//! Stdio channel
//!
//! Launches the server as a child process on first use. Each message is one
//! line of JSON on the child's stdin; a reader task matches response lines
//! from its stdout to waiting requests by id. Server-initiated messages are
//! ignored.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{oneshot, Mutex, OnceCell};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{JsonRpcRequest, JsonRpcResponse, RpcChannel};
use crate::agents::config::McpBridgeSettings;
use crate::agents::error::{BridgeError, BridgeResult};

/// Requests waiting for a response; `None` once the server's output closed
type Pending = Arc<Mutex<Option<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>>;

pub(super) struct StdioChannel {
    command: String,
    args: Vec<String>,
    env: HashMap<String, String>,
    cwd: Option<String>,
    target: String,
    connection: OnceCell<Connection>,
}

struct Connection {
    stdin: Mutex<ChildStdin>,
    pending: Pending,
    reader: JoinHandle<()>,
    // Held so the process is killed when the bridge goes away
    _child: Child,
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

fn closed() -> BridgeError {
    BridgeError::Transport("MCP server closed its output".to_string())
}

impl StdioChannel {
    pub(super) fn new(settings: &McpBridgeSettings) -> BridgeResult<Self> {
        let command = settings.command().ok_or_else(|| {
            BridgeError::Transport("STDIO transport requires a command to launch the server".to_string())
        })?;

        let target = std::iter::once(command)
            .chain(settings.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");

        Ok(Self {
            command: command.to_string(),
            args: settings.args.clone(),
            env: settings.env.clone(),
            cwd: settings.cwd.clone().filter(|cwd| !cwd.is_empty()),
            target,
            connection: OnceCell::new(),
        })
    }

    async fn connection(&self) -> BridgeResult<&Connection> {
        self.connection.get_or_try_init(|| self.spawn()).await
    }

    async fn spawn(&self) -> BridgeResult<Connection> {
        let mut command = Command::new(&self.command);
        command
            .args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn().map_err(|e| {
            BridgeError::Transport(format!("Failed to launch MCP server '{}': {}", self.command, e))
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BridgeError::Transport("MCP server stdin is not piped".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BridgeError::Transport("MCP server stdout is not piped".to_string()))?;

        debug!("Launched MCP server: {}", self.target);
        let pending: Pending = Arc::new(Mutex::new(Some(HashMap::new())));
        let reader = tokio::spawn(read_responses(stdout, pending.clone()));

        Ok(Connection {
            stdin: Mutex::new(stdin),
            pending,
            reader,
            _child: child,
        })
    }
}

impl Connection {
    async fn send(&self, message: &JsonRpcRequest<'_>) -> BridgeResult<()> {
        let mut line = serde_json::to_vec(message)?;
        line.push(b'\n');

        let mut stdin = self.stdin.lock().await;
        stdin
            .write_all(&line)
            .await
            .map_err(|e| BridgeError::Transport(format!("Failed to write to MCP server: {}", e)))?;
        stdin
            .flush()
            .await
            .map_err(|e| BridgeError::Transport(format!("Failed to write to MCP server: {}", e)))
    }
}

#[async_trait]
impl RpcChannel for StdioChannel {
    async fn request(&self, request: &JsonRpcRequest<'_>) -> BridgeResult<JsonRpcResponse> {
        let id = request
            .id
            .ok_or_else(|| BridgeError::Protocol(format!("Request {} has no id", request.method)))?;
        let connection = self.connection().await?;

        let (sender, receiver) = oneshot::channel();
        match connection.pending.lock().await.as_mut() {
            Some(waiting) => {
                waiting.insert(id, sender);
            }
            None => return Err(closed()),
        }

        if let Err(e) = connection.send(request).await {
            if let Some(waiting) = connection.pending.lock().await.as_mut() {
                waiting.remove(&id);
            }
            return Err(e);
        }

        receiver.await.map_err(|_| closed())
    }

    async fn notify(&self, notification: &JsonRpcRequest<'_>) -> BridgeResult<()> {
        self.connection().await?.send(notification).await
    }

    fn target(&self) -> &str {
        &self.target
    }
}

async fn read_responses(stdout: ChildStdout, pending: Pending) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => dispatch(&line, &pending).await,
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read from MCP server: {}", e);
                break;
            }
        }
    }

    debug!("MCP server output closed");
    // Dropping the senders fails every request still waiting
    pending.lock().await.take();
}

/// Hand one line of server output to the request waiting for it
async fn dispatch(line: &str, pending: &Pending) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }

    let message: Value = match serde_json::from_str(line) {
        Ok(message) => message,
        Err(_) => {
            debug!("Ignoring non-JSON line from MCP server");
            return;
        }
    };
    if let Some(method) = message.get("method").and_then(Value::as_str) {
        debug!("Ignoring server message {}", method);
        return;
    }
    let Some(id) = message.get("id").and_then(Value::as_u64) else {
        return;
    };
    let Ok(response) = serde_json::from_value::<JsonRpcResponse>(message) else {
        return;
    };

    let sender = pending
        .lock()
        .await
        .as_mut()
        .and_then(|waiting| waiting.remove(&id));
    if let Some(sender) = sender {
        let _ = sender.send(response);
    }
}
