use crate::http::{self, HttpCall, HttpReply};
use crate::settings::ExecutorSettings;
use async_trait::async_trait;
use graphcore::kinds::{ModelKind, SubType};
use graphcore::{ExecutionContext, Executor, Map, Node, NodeError, NodeInputs, NodeType, Value};
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

const DEFAULT_TEXT_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_IMAGE_MODEL: &str = "dall-e-3";

/// Calls a hosted model API for text or image generation.
pub struct ModelCallExecutor {
    client: Option<Client>,
    api_url: String,
    api_key: String,
    timeout: Duration,
}

impl ModelCallExecutor {
    pub fn new(settings: &ExecutorSettings) -> Self {
        Self {
            client: None,
            api_url: settings.model_api_url.trim_end_matches('/').to_string(),
            api_key: settings.model_api_key.clone(),
            timeout: settings.http_timeout(),
        }
    }

    fn model<'a>(node: &'a Node, inputs: &'a NodeInputs, default: &'a str) -> &'a str {
        inputs
            .get("model")
            .or_else(|| node.config("model"))
            .and_then(Value::as_str)
            .unwrap_or(default)
    }

    /// POST to the model API. Generation has no side effects, so the call
    /// is abandoned as soon as the run is cancelled.
    async fn post(
        &self,
        route: &str,
        body: Value,
        ctx: &ExecutionContext,
    ) -> Result<HttpReply, NodeError> {
        let client = http::initialized(&self.client)?;
        let url = format!("{}{}", self.api_url, route);
        let mut headers = Map::new();
        if !self.api_key.is_empty() {
            headers.insert(
                "Authorization".into(),
                Value::from(format!("Bearer {}", self.api_key)),
            );
        }

        let call = HttpCall::new("POST", &url, &headers).with_body(Some(&body));
        let reply = tokio::select! {
            biased;
            _ = ctx.cancellation.cancelled() => return Err(NodeError::Cancelled),
            reply = http::send(client, call) => reply?,
        };

        if !reply.is_success() {
            return Err(NodeError::collaborator(format!(
                "Model API returned {}: {}",
                reply.status,
                graphcore::value::to_display_string(&reply.body)
            )));
        }
        Ok(reply)
    }

    async fn text_generation(
        &self,
        node: &Node,
        inputs: &NodeInputs,
        ctx: &ExecutionContext,
    ) -> Result<Map, NodeError> {
        let prompt = inputs.require_str("prompt", "Prompt is required for text generation")?;
        let model = Self::model(node, inputs, DEFAULT_TEXT_MODEL);
        let max_tokens = inputs
            .get("maxTokens")
            .and_then(Value::as_u64)
            .unwrap_or(100);
        let temperature = inputs
            .get("temperature")
            .and_then(Value::as_f64)
            .unwrap_or(0.7);

        ctx.emitter(&node.id)
            .info(format!("Generating text with {}", model));

        let reply = self
            .post(
                "/api/ai/generate",
                json!({
                    "prompt": prompt,
                    "maxTokens": max_tokens,
                    "temperature": temperature,
                    "model": model,
                }),
                ctx,
            )
            .await?;

        let mut output = Map::new();
        output.insert(
            "text".into(),
            reply.body.get("text").cloned().unwrap_or_else(|| Value::from("")),
        );
        output.insert("model".into(), Value::from(model));
        output.insert(
            "usage".into(),
            reply.body.get("usage").cloned().unwrap_or(Value::Null),
        );
        Ok(output)
    }

    async fn image_generation(
        &self,
        node: &Node,
        inputs: &NodeInputs,
        ctx: &ExecutionContext,
    ) -> Result<Map, NodeError> {
        let prompt = inputs.require_str("prompt", "Prompt is required for image generation")?;
        let model = Self::model(node, inputs, DEFAULT_IMAGE_MODEL);
        let size = inputs.str_or("size", "512x512");

        let reply = self
            .post(
                "/api/ai/generate-image",
                json!({"prompt": prompt, "size": size, "model": model}),
                ctx,
            )
            .await?;

        let mut output = Map::new();
        output.insert(
            "url".into(),
            reply.body.get("url").cloned().unwrap_or(Value::Null),
        );
        output.insert("model".into(), Value::from(model));
        Ok(output)
    }
}

#[async_trait]
impl Executor for ModelCallExecutor {
    fn node_type(&self) -> NodeType {
        NodeType::ModelCall
    }

    async fn initialize(&mut self) -> Result<(), NodeError> {
        if self.api_key.is_empty() {
            tracing::warn!("No model API key configured; requests will be unauthenticated");
        }
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
        match ModelKind::of(node)? {
            ModelKind::TextGeneration => self.text_generation(node, inputs, ctx).await,
            ModelKind::ImageGeneration => self.image_generation(node, inputs, ctx).await,
        }
    }
}
