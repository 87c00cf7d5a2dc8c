//! SOAP response decoding.
//!
//! Responses are decoded into a [`Node`] tree. Namespace prefixes are
//! dropped, and every child key maps to an ordered list of nodes no matter
//! how many times the element occurred on the wire. A `<componentFailures>`
//! element that appears once and one that appears five times are read the
//! same way, through [`Node::all`].

use std::str::FromStr;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Error raised when a payload cannot be decoded into the expected shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The payload is not well-formed XML.
    #[error("malformed XML: {0}")]
    Malformed(String),

    /// A required key is absent. `path` is the key path that was attempted.
    #[error("missing key `{path}`")]
    MissingKey { path: String },

    /// A value is present but not one the protocol allows.
    #[error("unexpected value `{value}` at `{path}`")]
    UnexpectedValue { path: String, value: String },
}

/// A decoded XML element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Node {
    text: Option<String>,
    attributes: Vec<(String, String)>,
    children: Vec<(String, Vec<Node>)>,
}

impl Node {
    /// Leaf node holding only text.
    pub fn leaf(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// Append a child under `key`, keeping encounter order.
    pub fn push_child(&mut self, key: impl Into<String>, child: Node) {
        let key = key.into();
        match self.children.iter_mut().find(|(k, _)| *k == key) {
            Some((_, nodes)) => nodes.push(child),
            None => self.children.push((key, vec![child])),
        }
    }

    /// Builder form of [`Node::push_child`].
    pub fn with_child(mut self, key: impl Into<String>, child: Node) -> Self {
        self.push_child(key, child);
        self
    }

    /// Every child element named `key`, in document order.
    ///
    /// Absent keys yield an empty slice.
    pub fn all(&self, key: &str) -> &[Node] {
        self.children
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, nodes)| nodes.as_slice())
            .unwrap_or(&[])
    }

    /// First child element named `key`.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.all(key).first()
    }

    /// Returns true if at least one child named `key` exists.
    pub fn contains(&self, key: &str) -> bool {
        !self.all(key).is_empty()
    }

    /// Text content of this node. Nil nodes have no text.
    pub fn text(&self) -> Option<&str> {
        if self.is_nil() {
            return None;
        }
        self.text.as_deref()
    }

    /// Text content of the first child named `key`.
    pub fn child_text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Node::text)
    }

    /// Parse the text of the first child named `key`.
    pub fn parse_child<T: FromStr>(&self, key: &str) -> Option<T> {
        self.child_text(key).and_then(|s| s.trim().parse().ok())
    }

    /// Read a `true`/`false` child, defaulting to false.
    pub fn flag(&self, key: &str) -> bool {
        self.child_text(key) == Some("true")
    }

    /// Attribute value by local name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns true for `xsi:nil="true"` elements.
    pub fn is_nil(&self) -> bool {
        self.attribute("nil") == Some("true")
    }

    /// Returns true for a plain label: text, no attributes, no children.
    pub fn is_plain_text(&self) -> bool {
        self.text.is_some() && self.attributes.is_empty() && self.children.is_empty()
    }

    /// Child keys in encounter order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.children.iter().map(|(k, _)| k.as_str())
    }

    /// Walk `keys` from this node, taking the first child at each step.
    ///
    /// On failure the error carries `base` joined with the keys walked so far.
    pub fn path(&self, base: &str, keys: &[&str]) -> Result<&Node, DecodeError> {
        let mut node = self;
        let mut walked = base.to_string();
        for key in keys {
            if !walked.is_empty() {
                walked.push('/');
            }
            walked.push_str(key);
            node = node.get(key).ok_or_else(|| DecodeError::MissingKey {
                path: walked.clone(),
            })?;
        }
        Ok(node)
    }
}

/// SOAP fault carried in a response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapFault {
    pub fault_code: String,
    pub fault_string: String,
}

impl std::fmt::Display for SoapFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SOAP Fault: {} - {}", self.fault_code, self.fault_string)
    }
}

impl std::error::Error for SoapFault {}

/// A decoded SOAP envelope.
#[derive(Debug, Clone)]
pub struct Envelope {
    header: Option<Node>,
    body: Node,
}

impl Envelope {
    /// Decode a raw response payload.
    pub fn decode(raw: &str) -> Result<Self, DecodeError> {
        let (name, root) = parse_document(raw)?;
        if name != "Envelope" {
            return Err(DecodeError::MissingKey {
                path: "Envelope".to_string(),
            });
        }
        let body = root.path("Envelope", &["Body"])?.clone();
        let header = root.get("Header").cloned();
        Ok(Self { header, body })
    }

    /// The `Body` element.
    pub fn body(&self) -> &Node {
        &self.body
    }

    /// The `Header` element, if the response carried one.
    pub fn header(&self) -> Option<&Node> {
        self.header.as_ref()
    }

    /// The `{operation}Response/result` element of the body.
    pub fn result(&self, operation: &str) -> Result<&Node, DecodeError> {
        let response = format!("{operation}Response");
        self.body.path("Envelope/Body", &[&response, "result"])
    }

    /// The SOAP fault, if the body holds one.
    pub fn fault(&self) -> Option<SoapFault> {
        let fault = self.body.get("Fault")?;
        Some(SoapFault {
            fault_code: fault.child_text("faultcode").unwrap_or_default().to_string(),
            fault_string: fault
                .child_text("faultstring")
                .unwrap_or("Unknown error")
                .to_string(),
        })
    }

    /// Debug log returned through the `DebuggingInfo` header.
    pub fn debug_log(&self) -> Option<&str> {
        self.header
            .as_ref()?
            .get("DebuggingInfo")?
            .child_text("debugLog")
    }
}

/// Parse a whole document, returning the root's local name and node.
pub fn parse_document(raw: &str) -> Result<(String, Node), DecodeError> {
    let mut reader = Reader::from_str(raw);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<(String, Node)> = Vec::new();
    let mut root: Option<(String, Node)> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            DecodeError::Malformed(format!("at position {}: {e}", reader.buffer_position()))
        })?;

        match event {
            Event::Start(start) => {
                stack.push(open_element(&start)?);
            }
            Event::Empty(start) => {
                let element = open_element(&start)?;
                close_element(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|e| DecodeError::Malformed(e.to_string()))?;
                append_text(&mut stack, &text);
            }
            Event::CData(data) => {
                let bytes = data.into_inner();
                append_text(&mut stack, &String::from_utf8_lossy(&bytes));
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| DecodeError::Malformed("unbalanced end tag".to_string()))?;
                close_element(&mut stack, &mut root, element)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(DecodeError::Malformed(
            "unexpected end of document".to_string(),
        ));
    }

    root.ok_or_else(|| DecodeError::Malformed("document has no root element".to_string()))
}

fn open_element(start: &BytesStart<'_>) -> Result<(String, Node), DecodeError> {
    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
    let mut node = Node::default();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| DecodeError::Malformed(e.to_string()))?;
        let key = attribute.key;
        // Namespace declarations are not data
        if key.as_ref() == b"xmlns" || key.prefix().is_some_and(|p| p.as_ref() == b"xmlns") {
            continue;
        }
        let value = attribute
            .unescape_value()
            .map_err(|e| DecodeError::Malformed(e.to_string()))?;
        node.attributes.push((
            String::from_utf8_lossy(key.local_name().as_ref()).into_owned(),
            value.into_owned(),
        ));
    }
    Ok((name, node))
}

fn append_text(stack: &mut [(String, Node)], text: &str) {
    if let Some((_, node)) = stack.last_mut() {
        match node.text.as_mut() {
            Some(existing) => existing.push_str(text),
            None => node.text = Some(text.to_string()),
        }
    }
}

fn close_element(
    stack: &mut [(String, Node)],
    root: &mut Option<(String, Node)>,
    element: (String, Node),
) -> Result<(), DecodeError> {
    match stack.last_mut() {
        Some((_, parent)) => {
            parent.push_child(element.0, element.1);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(DecodeError::Malformed(
            "multiple root elements".to_string(),
        )),
    }
}
