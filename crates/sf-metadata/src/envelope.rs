//! Request envelopes for Metadata API operations.
//!
//! An envelope is built from an [`Operation`] and an insertion-ordered
//! [`Params`] map. Every text value is XML-escaped; base64 payloads contain
//! no escapable characters and come out unchanged.

use sforge_client::security::xml;

const METADATA_NS: &str = "http://soap.sforce.com/2006/04/metadata";

/// Error raised when an envelope cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("missing required parameter `{param}` for {operation}")]
    MissingParam {
        operation: &'static str,
        param: String,
    },
}

/// Metadata API operations this crate can call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Retrieve,
    Deploy,
    CheckStatus,
    CheckRetrieveStatus,
    CheckDeployStatus,
    CancelDeploy,
    RenameMetadata,
    DeployRecentValidation,
}

impl Operation {
    /// Wire name, also used as the `SOAPAction` header.
    pub fn name(self) -> &'static str {
        match self {
            Operation::Retrieve => "retrieve",
            Operation::Deploy => "deploy",
            Operation::CheckStatus => "checkStatus",
            Operation::CheckRetrieveStatus => "checkRetrieveStatus",
            Operation::CheckDeployStatus => "checkDeployStatus",
            Operation::CancelDeploy => "cancelDeploy",
            Operation::RenameMetadata => "renameMetadata",
            Operation::DeployRecentValidation => "deployRecentValidation",
        }
    }

    /// Parameter paths that must be present and non-empty.
    fn required(self) -> &'static [&'static [&'static str]] {
        match self {
            Operation::Retrieve => &[&["retrieveRequest", "apiVersion"]],
            Operation::Deploy => &[&["ZipFile"]],
            Operation::CheckStatus
            | Operation::CheckRetrieveStatus
            | Operation::CheckDeployStatus => &[&["asyncProcessId"]],
            Operation::CancelDeploy => &[&["String"]],
            Operation::RenameMetadata => &[&["type"], &["oldFullName"], &["newFullName"]],
            Operation::DeployRecentValidation => &[&["validationId"]],
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Text(String),
    Flag(bool),
    /// Repeated element with text content.
    List(Vec<String>),
    /// Nested structure.
    Group(Params),
    /// Repeated nested structure.
    Groups(Vec<Params>),
}

impl ParamValue {
    fn is_empty(&self) -> bool {
        match self {
            ParamValue::Text(text) => text.trim().is_empty(),
            ParamValue::Flag(_) => false,
            ParamValue::List(items) => items.is_empty(),
            ParamValue::Group(params) => params.is_empty(),
            ParamValue::Groups(groups) => groups.is_empty(),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Flag(value)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(value: Vec<String>) -> Self {
        ParamValue::List(value)
    }
}

impl From<Params> for ParamValue {
    fn from(value: Params) -> Self {
        ParamValue::Group(value)
    }
}

impl From<Vec<Params>> for ParamValue {
    fn from(value: Vec<Params>) -> Self {
        ParamValue::Groups(value)
    }
}

/// Named parameters, rendered in insertion order.
///
/// The Metadata API schema is sequence-ordered, so order matters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(String, ParamValue)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`. Replacing an existing key keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Builder form of [`Params::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lookup(&self, path: &[&str]) -> Option<&ParamValue> {
        let (last, parents) = path.split_last()?;
        let mut params = self;
        for key in parents {
            match params.get(key)? {
                ParamValue::Group(group) => params = group,
                _ => return None,
            }
        }
        params.get(last)
    }
}

/// Builds request envelopes for one session.
#[derive(Debug, Clone)]
pub struct EnvelopeBuilder {
    session_id: String,
    debug_categories: Vec<(String, String)>,
}

impl EnvelopeBuilder {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            debug_categories: Vec::new(),
        }
    }

    /// Ask the server for a debug log, as `(category, level)` pairs such as
    /// `("Apex_code", "DEBUG")`. The log comes back in the
    /// `DebuggingInfo` response header.
    pub fn with_debug_categories(mut self, categories: Vec<(String, String)>) -> Self {
        self.debug_categories = categories;
        self
    }

    /// Render the envelope for `operation`.
    pub fn build(&self, operation: Operation, params: &Params) -> Result<String, TemplateError> {
        for path in operation.required() {
            let present = params.lookup(path).is_some_and(|v| !v.is_empty());
            if !present {
                return Err(TemplateError::MissingParam {
                    operation: operation.name(),
                    param: path.join("/"),
                });
            }
        }

        let mut body = String::new();
        render_params(&mut body, params, 3);

        Ok(format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:met="{ns}">
  <soapenv:Header>
    <met:SessionHeader>
      <met:sessionId>{session_id}</met:sessionId>
    </met:SessionHeader>{debugging}
  </soapenv:Header>
  <soapenv:Body>
    <met:{operation}>
{body}    </met:{operation}>
  </soapenv:Body>
</soapenv:Envelope>"#,
            ns = METADATA_NS,
            session_id = xml::escape(&self.session_id),
            debugging = self.debugging_header(),
            operation = operation.name(),
            body = body,
        ))
    }

    fn debugging_header(&self) -> String {
        if self.debug_categories.is_empty() {
            return String::new();
        }

        let categories: String = self
            .debug_categories
            .iter()
            .map(|(category, level)| {
                format!(
                    "\n      <met:categories>\n        <met:category>{}</met:category>\n        <met:level>{}</met:level>\n      </met:categories>",
                    xml::escape(category),
                    xml::escape(level)
                )
            })
            .collect();

        format!("\n    <met:DebuggingHeader>{categories}\n    </met:DebuggingHeader>")
    }
}

fn render_params(out: &mut String, params: &Params, depth: usize) {
    for (key, value) in params.iter() {
        render_value(out, key, value, depth);
    }
}

fn render_value(out: &mut String, key: &str, value: &ParamValue, depth: usize) {
    let indent = "  ".repeat(depth);
    match value {
        ParamValue::Text(text) => {
            out.push_str(&format!("{indent}<met:{key}>{}</met:{key}>\n", xml::escape(text)));
        }
        ParamValue::Flag(flag) => {
            out.push_str(&format!("{indent}<met:{key}>{flag}</met:{key}>\n"));
        }
        ParamValue::List(items) => {
            for item in items {
                out.push_str(&format!("{indent}<met:{key}>{}</met:{key}>\n", xml::escape(item)));
            }
        }
        ParamValue::Group(group) => render_group(out, key, group, depth),
        ParamValue::Groups(groups) => {
            for group in groups {
                render_group(out, key, group, depth);
            }
        }
    }
}

fn render_group(out: &mut String, key: &str, group: &Params, depth: usize) {
    let indent = "  ".repeat(depth);
    out.push_str(&format!("{indent}<met:{key}>\n"));
    render_params(out, group, depth + 1);
    out.push_str(&format!("{indent}</met:{key}>\n"));
}
