//! Command implementations. Each returns the text to print.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use custom_fields::fields::remote_endpoint;
use custom_fields::{
    summarize, FieldDescriptor, FieldGroup, FieldOption, FieldRegistry, FieldsConfig,
    FormContext, FormDescriptor, HttpOptionFetcher, OptionFetcher, OptionQuery, Submission,
};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::debug;

/// Errors specific to the command line front end.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unsupported descriptor format: {path} (expected .json, .yaml or .yml)")]
    UnsupportedFormat { path: PathBuf },

    #[error("no top-level field with id '{id}'")]
    UnknownField { id: String },

    #[error("field '{id}' of type '{field_type}' has no remote options")]
    NotRemote { id: String, field_type: String },

    #[error("{path} must contain a JSON object")]
    NotAnObject { path: PathBuf },
}

/// Load configuration from `path`, or from the discovered file.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<FieldsConfig> {
    let config = match path {
        Some(path) => FieldsConfig::load_from(Some(path))?,
        None => FieldsConfig::load()?,
    };
    Ok(config)
}

/// Load a form document, or a bare list of descriptors, from JSON or YAML.
pub fn load_form(path: &Path) -> anyhow::Result<FormDescriptor> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading descriptor file {}", path.display()))?;
    let raw: Value = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&text)?,
        Some("yaml") | Some("yml") => serde_yaml_ng::from_str(&text)?,
        _ => {
            return Err(CommandError::UnsupportedFormat {
                path: path.to_path_buf(),
            }
            .into())
        }
    };
    let document = match raw {
        Value::Array(items) => json!({"object_type": "options_page", "items": items}),
        other => other,
    };
    serde_json::from_value(document)
        .with_context(|| format!("parsing descriptor file {}", path.display()))
}

fn load_object(path: &Path) -> anyhow::Result<Map<String, Value>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    match serde_json::from_str::<Value>(&text)? {
        Value::Object(map) => Ok(map),
        _ => Err(CommandError::NotAnObject {
            path: path.to_path_buf(),
        }
        .into()),
    }
}

/// Render the form to HTML, one field per line.
///
/// With a non-zero `settle`, the form is rendered, given the debounce window
/// plus `settle` for remote options to arrive, and rendered again.
pub async fn render(form: &FormDescriptor, config: FieldsConfig, settle: Duration) -> String {
    let debounce = config.debounce();
    let ctx = FormContext::builder(config).build();
    let mut group = FieldGroup::root(
        ctx,
        Arc::new(|id: &str, value: Value| debug!(field = id, %value, "value changed")),
    );

    let mut rendered = group.render(&form.items);
    if !settle.is_zero() {
        tokio::time::sleep(debounce + settle).await;
        rendered = group.render(&form.items);
    }
    rendered
        .iter()
        .map(|field| field.node.to_html())
        .collect::<Vec<_>>()
        .join("\n")
}

fn find_field<'a>(form: &'a FormDescriptor, id: &str) -> Result<&'a FieldDescriptor, CommandError> {
    form.items
        .iter()
        .find(|item| item.id == id)
        .ok_or_else(|| CommandError::UnknownField { id: id.to_string() })
}

/// The query a field would send for `search`.
pub fn option_query(form: &FormDescriptor, id: &str, search: &str) -> Result<OptionQuery, CommandError> {
    let field = find_field(form, id)?;
    let endpoint = remote_endpoint(&field.field_type)
        .or_else(|| field.extra_str("list_type").map(|_| "list"))
        .ok_or_else(|| CommandError::NotRemote {
            id: id.to_string(),
            field_type: field.field_type.clone(),
        })?;
    Ok(OptionQuery::new(endpoint, field.to_config(), search))
}

/// Query the remote options of one field. Unlike the form itself, this
/// reports fetch failures.
pub async fn options(
    form: &FormDescriptor,
    config: &FieldsConfig,
    id: &str,
    search: &str,
) -> anyhow::Result<Vec<FieldOption>> {
    let query = option_query(form, id, search)?;
    let fetcher = HttpOptionFetcher::new(config.api.clone());
    Ok(fetcher.fetch(&query).await?)
}

pub fn format_options(options: &[FieldOption], as_json: bool) -> anyhow::Result<String> {
    if as_json {
        return Ok(serde_json::to_string_pretty(options)?);
    }
    Ok(options
        .iter()
        .map(|option| format!("{}\t{}", option.key(), option.label.as_str()))
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Plain-text summary of the form values.
pub fn summary(form: &FormDescriptor, values: Option<&Path>, as_json: bool) -> anyhow::Result<String> {
    let values = match values {
        Some(path) => load_object(path)?,
        None => Map::new(),
    };
    let lines = summarize(&FieldRegistry::with_defaults(), &form.items, &values);
    if as_json {
        return Ok(serde_json::to_string_pretty(&lines)?);
    }
    Ok(lines
        .iter()
        .map(|line| format!("{}: {}", line.id, line.text))
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Decode a posted form into typed values, as pretty JSON.
pub fn decode(form: &FormDescriptor, posted: &Path) -> anyhow::Result<String> {
    let posted: HashMap<String, String> = load_object(posted)?
        .into_iter()
        .map(|(name, value)| {
            let raw = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (name, raw)
        })
        .collect();
    let submission = Submission::decode(&form.items, &posted);
    Ok(serde_json::to_string_pretty(&submission.to_value())?)
}

pub fn kinds() -> String {
    FieldRegistry::with_defaults().field_types().join("\n")
}
