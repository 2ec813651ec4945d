use crate::http::{self, HttpCall};
use crate::settings::ExecutorSettings;
use crate::storage::StorageRoot;
use async_trait::async_trait;
use graphcore::kinds::{DataSourceKind, SubType};
use graphcore::{ExecutionContext, Executor, Map, Node, NodeError, NodeInputs, NodeType, Value};
use reqwest::Client;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, ToSql};
use std::path::Path;
use std::time::Duration;

/// Reads from the local SQLite database, the storage directory, or a remote API.
pub struct DataSourceExecutor {
    storage: StorageRoot,
    database_file: String,
    client: Option<Client>,
    timeout: Duration,
}

impl DataSourceExecutor {
    pub fn new(settings: &ExecutorSettings) -> Self {
        Self {
            storage: StorageRoot::new(&settings.storage_path),
            database_file: settings.database_file.clone(),
            client: None,
            timeout: settings.http_timeout(),
        }
    }

    async fn database_query(&self, node: &Node, inputs: &NodeInputs) -> Result<Map, NodeError> {
        let query = inputs
            .require_str("query", "Query is required for database query")?
            .to_string();
        let parameters = inputs.get("parameters").cloned();
        let database = node
            .config("database")
            .and_then(Value::as_str)
            .unwrap_or(self.database_file.as_str());
        let path = self.storage.resolve(database)?;

        tracing::debug!("Querying {}", path.display());
        let rows = tokio::task::spawn_blocking(move || run_query(&path, &query, parameters))
            .await
            .map_err(|e| NodeError::collaborator(format!("Database task failed: {}", e)))?
            .map_err(|e| NodeError::collaborator(format!("Database query failed: {}", e)))?;

        let mut output = Map::new();
        output.insert("count".into(), Value::from(rows.len()));
        output.insert("results".into(), Value::Array(rows));
        Ok(output)
    }

    async fn file_reader(&self, inputs: &NodeInputs) -> Result<Map, NodeError> {
        let requested = inputs.require_str("path", "File path is required")?;
        let path = self.storage.resolve(requested)?;

        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            NodeError::collaborator(format!("Failed to read file {}: {}", path.display(), e))
        })?;

        let mut output = Map::new();
        output.insert("size".into(), Value::from(content.len()));
        output.insert("content".into(), Value::String(content));
        output.insert("path".into(), Value::from(requested));
        Ok(output)
    }

    async fn api_request(&self, inputs: &NodeInputs) -> Result<Map, NodeError> {
        let client = http::initialized(&self.client)?;
        let url = inputs.require_str("url", "URL is required for API request")?;
        let method = inputs.str_or("method", "GET");
        let headers = inputs.object_or_empty("headers")?;
        let params = inputs.object_or_empty("params")?;

        let reply = http::send(
            client,
            HttpCall::new(method, url, &headers)
                .with_query(&params)
                .with_body(inputs.get("body")),
        )
        .await?;

        let mut output = Map::new();
        output.insert("data".into(), reply.body);
        output.insert("status".into(), Value::from(reply.status));
        output.insert("headers".into(), Value::Object(reply.headers));
        Ok(output)
    }
}

/// Run one statement and collect its rows as JSON objects keyed by column name.
///
/// Object parameters bind by name (`:name` is assumed when no prefix is
/// given); array parameters bind by position.
fn run_query(
    path: &Path,
    query: &str,
    parameters: Option<Value>,
) -> rusqlite::Result<Vec<Value>> {
    let conn = Connection::open(path)?;
    let mut stmt = conn.prepare(query)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let mut rows = match parameters {
        Some(Value::Object(named)) => {
            let bound: Vec<(String, SqlValue)> = named
                .iter()
                .map(|(name, value)| (parameter_name(name), to_sql(value)))
                .collect();
            let refs: Vec<(&str, &dyn ToSql)> = bound
                .iter()
                .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
                .collect();
            stmt.query(refs.as_slice())?
        }
        Some(Value::Array(positional)) => {
            stmt.query(rusqlite::params_from_iter(positional.iter().map(to_sql)))?
        }
        _ => stmt.query([])?,
    };

    let mut results = Vec::new();
    while let Some(row) = rows.next()? {
        let mut object = Map::new();
        for (index, column) in columns.iter().enumerate() {
            object.insert(column.clone(), from_sql(row.get_ref(index)?));
        }
        results.push(Value::Object(object));
    }
    Ok(results)
}

fn parameter_name(name: &str) -> String {
    if name.starts_with([':', '@', '$']) {
        name.to_string()
    } else {
        format!(":{}", name)
    }
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::from(bytes.to_vec()),
    }
}

#[async_trait]
impl Executor for DataSourceExecutor {
    fn node_type(&self) -> NodeType {
        NodeType::DataSource
    }

    async fn initialize(&mut self) -> Result<(), NodeError> {
        self.storage.ensure().await?;
        self.client = Some(http::build_client(self.timeout)?);
        tracing::info!("Data source storage at {}", self.storage.path().display());
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
        match DataSourceKind::of(node)? {
            DataSourceKind::DatabaseQuery => self.database_query(node, inputs).await,
            DataSourceKind::FileReader => self.file_reader(inputs).await,
            DataSourceKind::ApiRequest => self.api_request(inputs).await,
        }
    }
}
