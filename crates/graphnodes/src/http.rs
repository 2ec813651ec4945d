//! Outbound HTTP shared by the action, data source, model and output executors.

use graphcore::value::to_display_string;
use graphcore::{Map, NodeError, Value};
use reqwest::{Client, Method};
use std::time::Duration;

/// One outbound request, borrowed from a node's resolved inputs.
pub(crate) struct HttpCall<'a> {
    pub method: &'a str,
    pub url: &'a str,
    pub headers: &'a Map,
    pub query: Option<&'a Map>,
    pub body: Option<&'a Value>,
}

impl<'a> HttpCall<'a> {
    pub fn new(method: &'a str, url: &'a str, headers: &'a Map) -> Self {
        Self {
            method,
            url,
            headers,
            query: None,
            body: None,
        }
    }

    pub fn with_query(mut self, query: &'a Map) -> Self {
        self.query = Some(query);
        self
    }

    pub fn with_body(mut self, body: Option<&'a Value>) -> Self {
        self.body = body.filter(|b| !b.is_null());
        self
    }
}

/// Response reduced to what node outputs carry
#[derive(Debug)]
pub(crate) struct HttpReply {
    pub status: u16,
    pub headers: Map,
    /// Parsed JSON, or the raw text when the body is not JSON
    pub body: Value,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub(crate) fn build_client(timeout: Duration) -> Result<Client, NodeError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| NodeError::Initialization(format!("Failed to build HTTP client: {}", e)))
}

/// Client created by `initialize`, or an error for executors used before it.
pub(crate) fn initialized(client: &Option<Client>) -> Result<&Client, NodeError> {
    client
        .as_ref()
        .ok_or_else(|| NodeError::Initialization("HTTP client not initialized".to_string()))
}

pub(crate) async fn send(client: &Client, call: HttpCall<'_>) -> Result<HttpReply, NodeError> {
    let method = Method::from_bytes(call.method.to_uppercase().as_bytes())
        .map_err(|_| NodeError::invalid_type("method", "HTTP method", call.method))?;

    tracing::debug!("{} {}", method, call.url);

    let mut request = client.request(method, call.url);
    for (name, value) in call.headers {
        request = request.header(name.as_str(), to_display_string(value));
    }
    if let Some(query) = call.query {
        let pairs: Vec<(String, String)> = query
            .iter()
            .map(|(k, v)| (k.clone(), to_display_string(v)))
            .collect();
        request = request.query(&pairs);
    }
    if let Some(body) = call.body {
        request = request.json(body);
    }

    let response = request
        .send()
        .await
        .map_err(|e| NodeError::collaborator(format!("HTTP request failed: {}", e)))?;

    let status = response.status().as_u16();
    let headers: Map = response
        .headers()
        .iter()
        .map(|(k, v)| {
            (
                k.to_string(),
                Value::String(v.to_str().unwrap_or("").to_string()),
            )
        })
        .collect();

    let text = response
        .text()
        .await
        .map_err(|e| NodeError::collaborator(format!("Failed to read response: {}", e)))?;
    let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

    Ok(HttpReply {
        status,
        headers,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_body_is_not_sent() {
        let headers = Map::new();
        let body = json!(null);
        let call = HttpCall::new("POST", "http://localhost", &headers).with_body(Some(&body));
        assert!(call.body.is_none());
    }

    #[tokio::test]
    async fn rejects_invalid_method() {
        let client = build_client(Duration::from_secs(1)).unwrap();
        let headers = Map::new();
        let err = send(&client, HttpCall::new("NOT A METHOD", "http://localhost", &headers))
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::InvalidInputType { .. }));
    }

    #[test]
    fn uninitialized_client_is_an_error() {
        assert!(initialized(&None).is_err());
    }
}
