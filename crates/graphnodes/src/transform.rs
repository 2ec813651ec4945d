use async_trait::async_trait;
use graphcore::kinds::{SubType, TransformKind};
use graphcore::value::{to_display_string, type_name};
use graphcore::{ExecutionContext, Executor, Map, Node, NodeError, NodeInputs, NodeType, Value};

/// Pure data reshaping: JSON templates and string templates.
pub struct TransformExecutor;

impl TransformExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TransformExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Expand `template` against `input`.
///
/// In an object template the first reserved key, in written order, replaces
/// the whole object: `$value` with the input, a string `$select` with the
/// selected value and an object `$transform` with its expanded `template`.
/// Other `$` keys are dropped and plain keys are expanded recursively.
/// Arrays expand element-wise and scalars are copied as-is.
pub fn apply_template(template: &Value, input: &Value) -> Result<Value, NodeError> {
    match template {
        Value::Object(map) => {
            let mut expanded = Map::new();
            for (key, value) in map {
                match (key.as_str(), value) {
                    ("$value", _) => return Ok(input.clone()),
                    ("$select", Value::String(path)) => {
                        return Ok(select_path(input, path).cloned().unwrap_or(Value::Null))
                    }
                    ("$transform", Value::Object(transform)) => {
                        let nested = transform.get("template").ok_or_else(|| {
                            NodeError::missing_input("Transform template is required")
                        })?;
                        return apply_template(nested, input);
                    }
                    (k, _) if k.starts_with('$') => {}
                    _ => {
                        expanded.insert(key.clone(), apply_template(value, input)?);
                    }
                }
            }
            Ok(Value::Object(expanded))
        }
        Value::Array(items) => items
            .iter()
            .map(|item| apply_template(item, input))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        scalar => Ok(scalar.clone()),
    }
}

/// Look up a dotted path such as `a.b`, `items[0].name` or `items.0.name`.
pub fn select_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        let (name, indexes) = match segment.find('[') {
            Some(pos) => (&segment[..pos], &segment[pos..]),
            None => (segment, ""),
        };

        if !name.is_empty() {
            current = match current {
                Value::Object(map) => map.get(name)?,
                Value::Array(items) => items.get(name.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }

        let mut rest = indexes;
        while !rest.is_empty() {
            let close = rest.find(']')?;
            let index: usize = rest.get(1..close)?.trim().parse().ok()?;
            current = current.as_array()?.get(index)?;
            rest = &rest[close + 1..];
            if !rest.is_empty() && !rest.starts_with('[') {
                return None;
            }
        }
    }
    Some(current)
}

/// Replace `{{ name }}` placeholders from `variables`.
///
/// Strings are inserted verbatim, other values as compact JSON. Placeholders
/// with no matching variable stay in the output unchanged.
pub fn render_text(template: &str, variables: &Map) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];
        match after_open.find("}}") {
            Some(close) => {
                let placeholder = &rest[open..open + 2 + close + 2];
                match variables.get(after_open[..close].trim()) {
                    Some(value) => out.push_str(&to_display_string(value)),
                    None => out.push_str(placeholder),
                }
                rest = &after_open[close + 2..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[async_trait]
impl Executor for TransformExecutor {
    fn node_type(&self) -> NodeType {
        NodeType::Transformation
    }

    async fn execute(
        &self,
        node: &Node,
        inputs: &NodeInputs,
        _ctx: &ExecutionContext,
    ) -> Result<Map, NodeError> {
        let result = match TransformKind::of(node)? {
            TransformKind::JsonTransform => {
                let input = inputs.require("input", "Input data is required")?;
                let template = inputs.require("template", "Template is required")?;
                apply_template(template, input)?
            }
            TransformKind::TextTemplate => {
                let template = match inputs.require("template", "Template is required")? {
                    Value::String(s) => s,
                    other => {
                        return Err(NodeError::invalid_type(
                            "template",
                            "string",
                            type_name(other),
                        ))
                    }
                };
                let variables = inputs.object_or_empty("variables")?;
                Value::String(render_text(template, &variables))
            }
        };

        let mut output = Map::new();
        output.insert("output".into(), result);
        Ok(output)
    }
}
