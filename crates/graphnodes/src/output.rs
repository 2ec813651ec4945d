use crate::http::{self, HttpCall};
use crate::settings::ExecutorSettings;
use crate::storage::StorageRoot;
use async_trait::async_trait;
use graphcore::kinds::{OutputKind, SubType};
use graphcore::value::{is_truthy, to_display_string};
use graphcore::{ExecutionContext, Executor, Map, Node, NodeError, NodeInputs, NodeType, Value};
use reqwest::Client;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Terminal sinks: an HTTP response body, a file in storage, or a webhook.
pub struct OutputExecutor {
    storage: StorageRoot,
    client: Option<Client>,
    timeout: Duration,
}

impl OutputExecutor {
    pub fn new(settings: &ExecutorSettings) -> Self {
        Self {
            storage: StorageRoot::new(&settings.storage_path),
            client: None,
            timeout: settings.http_timeout(),
        }
    }

    fn http_response(&self, inputs: &NodeInputs) -> Result<Map, NodeError> {
        let body = inputs.require("body", "Response body is required")?;

        let mut output = Map::new();
        output.insert("body".into(), body.clone());
        output.insert("statusCode".into(), inputs.value_or("statusCode", Value::from(200)));
        output.insert("headers".into(), Value::Object(inputs.object_or_empty("headers")?));
        Ok(output)
    }

    async fn file_writer(&self, node: &Node, inputs: &NodeInputs) -> Result<Map, NodeError> {
        let requested = inputs.require_str("path", "File path is required")?;
        let content = to_display_string(inputs.require("content", "Content is required")?);
        let append = node.config("append").map(is_truthy).unwrap_or(false);
        let path = self.storage.resolve(requested)?;

        let write_error = |e: std::io::Error| {
            NodeError::collaborator(format!("Failed to write file {}: {}", path.display(), e))
        };
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(&path)
            .await
            .map_err(write_error)?;
        file.write_all(content.as_bytes()).await.map_err(write_error)?;
        file.flush().await.map_err(write_error)?;

        tracing::debug!(
            "Wrote {} bytes to {} (append: {})",
            content.len(),
            path.display(),
            append
        );

        let mut output = Map::new();
        output.insert("success".into(), Value::Bool(true));
        output.insert("path".into(), Value::String(path.display().to_string()));
        output.insert("size".into(), Value::from(content.len()));
        Ok(output)
    }

    async fn webhook(&self, inputs: &NodeInputs) -> Result<Map, NodeError> {
        let client = http::initialized(&self.client)?;
        let url = inputs.require_str("url", "Webhook URL is required")?;
        let payload = inputs.require("payload", "Webhook payload is required")?;
        let headers = inputs.object_or_empty("headers")?;

        let reply = http::send(
            client,
            HttpCall::new("POST", url, &headers).with_body(Some(payload)),
        )
        .await?;

        let mut output = Map::new();
        output.insert("success".into(), Value::Bool(reply.is_success()));
        output.insert("url".into(), Value::from(url));
        output.insert("status".into(), Value::from(reply.status));
        Ok(output)
    }
}

#[async_trait]
impl Executor for OutputExecutor {
    fn node_type(&self) -> NodeType {
        NodeType::Output
    }

    async fn initialize(&mut self) -> Result<(), NodeError> {
        self.storage.ensure().await?;
        self.client = Some(http::build_client(self.timeout)?);
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), NodeError> {
        self.client = None;
        Ok(())
    }

    async fn execute(
        &self,
        node: &Node,
        inputs: &NodeInputs,
        _ctx: &ExecutionContext,
    ) -> Result<Map, NodeError> {
        match OutputKind::of(node)? {
            OutputKind::HttpResponse => self.http_response(inputs),
            OutputKind::FileWriter => self.file_writer(node, inputs).await,
            OutputKind::Webhook => self.webhook(inputs).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::Path;

    async fn executor(dir: &Path) -> OutputExecutor {
        let settings = ExecutorSettings {
            storage_path: dir.to_path_buf(),
            ..ExecutorSettings::default()
        };
        let mut executor = OutputExecutor::new(&settings);
        executor.initialize().await.unwrap();
        executor
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::new("exec_test", Map::new())
    }

    #[tokio::test]
    async fn http_response_echoes_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let node = Node::new("o", NodeType::Output);
        let out = executor(dir.path())
            .await
            .execute(&node, &NodeInputs::new().with("body", json!({"ok": true})), &ctx())
            .await
            .unwrap();
        assert_eq!(out["body"], json!({"ok": true}));
        assert_eq!(out["statusCode"], json!(200));
        assert_eq!(out["headers"], json!({}));
    }

    #[tokio::test]
    async fn file_writer_overwrites_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor(dir.path()).await;
        let node = Node::new("o", NodeType::Output).with_kind("file_writer");

        for content in ["first", "second"] {
            executor
                .execute(
                    &node,
                    &NodeInputs::new().with("path", "out.txt").with("content", content),
                    &ctx(),
                )
                .await
                .unwrap();
        }
        let written = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
        assert_eq!(written, "second");
    }

    #[tokio::test]
    async fn file_writer_appends_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor(dir.path()).await;
        let node = Node::new("o", NodeType::Output)
            .with_kind("file_writer")
            .with_config("append", true);

        for content in ["a", "b"] {
            executor
                .execute(
                    &node,
                    &NodeInputs::new().with("path", "log.txt").with("content", content),
                    &ctx(),
                )
                .await
                .unwrap();
        }
        let written = std::fs::read_to_string(dir.path().join("log.txt")).unwrap();
        assert_eq!(written, "ab");
    }

    #[tokio::test]
    async fn file_writer_serializes_json_content() {
        let dir = tempfile::tempdir().unwrap();
        let node = Node::new("o", NodeType::Output).with_kind("file_writer");
        let out = executor(dir.path())
            .await
            .execute(
                &node,
                &NodeInputs::new()
                    .with("path", "../escape.json")
                    .with("content", json!({"k": [1, 2]})),
                &ctx(),
            )
            .await
            .unwrap();

        assert_eq!(out["success"], json!(true));
        assert_eq!(out["size"], json!(11));
        let written = std::fs::read_to_string(dir.path().join("escape.json")).unwrap();
        assert_eq!(written, r#"{"k":[1,2]}"#);
    }

    #[tokio::test]
    async fn webhook_requires_payload() {
        let dir = tempfile::tempdir().unwrap();
        let node = Node::new("o", NodeType::Output).with_kind("webhook");
        let err = executor(dir.path())
            .await
            .execute(
                &node,
                &NodeInputs::new().with("url", "http://localhost/hook"),
                &ctx(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Webhook payload is required");
    }
}
