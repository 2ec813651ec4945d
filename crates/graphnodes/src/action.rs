use crate::http::{self, HttpCall};
use crate::settings::ExecutorSettings;
use async_trait::async_trait;
use chrono::Utc;
use graphcore::kinds::{ActionKind, SubType};
use graphcore::{ExecutionContext, Executor, Map, Node, NodeError, NodeInputs, NodeType, Value};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Validated email handed to a [`MessageSender`]
#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Delivery collaborator for `send_email` actions.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Hand off a message and return its id
    async fn send(&self, message: &EmailMessage) -> Result<String, NodeError>;
}

/// Default sender; records the handoff in the log and delivers nothing.
pub struct LogMessageSender;

#[async_trait]
impl MessageSender for LogMessageSender {
    async fn send(&self, message: &EmailMessage) -> Result<String, NodeError> {
        tracing::info!("Sending email to {}: {}", message.to, message.subject);
        Ok(format!("msg_{}", Utc::now().timestamp_millis()))
    }
}

/// Side-effecting steps: outbound HTTP calls and email handoff.
pub struct ActionExecutor {
    client: Option<Client>,
    timeout: Duration,
    sender: Arc<dyn MessageSender>,
}

impl ActionExecutor {
    pub fn new(settings: &ExecutorSettings) -> Self {
        Self {
            client: None,
            timeout: settings.http_timeout(),
            sender: Arc::new(LogMessageSender),
        }
    }

    pub fn with_sender(mut self, sender: Arc<dyn MessageSender>) -> Self {
        self.sender = sender;
        self
    }

    async fn http_request(
        &self,
        node: &Node,
        inputs: &NodeInputs,
        ctx: &ExecutionContext,
    ) -> Result<Map, NodeError> {
        let client = http::initialized(&self.client)?;
        let url = inputs.require_str("url", "URL is required for HTTP request")?;
        let method = inputs.str_or("method", "GET");
        let headers = inputs.object_or_empty("headers")?;

        ctx.emitter(&node.id).info(format!("{} {}", method, url));

        let reply = http::send(
            client,
            HttpCall::new(method, url, &headers).with_body(inputs.get("body")),
        )
        .await?;

        let mut output = Map::new();
        output.insert("response".into(), reply.body);
        output.insert("status".into(), Value::from(reply.status));
        output.insert("headers".into(), Value::Object(reply.headers));
        Ok(output)
    }

    async fn send_email(&self, inputs: &NodeInputs) -> Result<Map, NodeError> {
        let message = EmailMessage {
            to: inputs.require_str("to", "Recipient (to) is required")?.to_string(),
            subject: inputs.require_str("subject", "Subject is required")?.to_string(),
            body: inputs.require_str("body", "Body is required")?.to_string(),
        };

        let message_id = self.sender.send(&message).await?;

        let mut output = Map::new();
        output.insert("success".into(), Value::Bool(true));
        output.insert("messageId".into(), Value::from(message_id));
        Ok(output)
    }
}

#[async_trait]
impl Executor for ActionExecutor {
    fn node_type(&self) -> NodeType {
        NodeType::Action
    }

    async fn initialize(&mut self) -> Result<(), NodeError> {
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
        ctx: &ExecutionContext,
    ) -> Result<Map, NodeError> {
        match ActionKind::of(node)? {
            ActionKind::HttpRequest => self.http_request(node, inputs, ctx).await,
            ActionKind::SendEmail => self.send_email(inputs).await,
        }
    }
}
