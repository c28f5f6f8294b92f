//! Namespace-aware document tree.
//!
//! Elements and attributes are matched by namespace URI and local name, never
//! by the prefix a particular IdP happened to choose. Each element keeps the
//! prefixes it was written with and its in-scope namespace bindings so that
//! the subtree can later be canonicalized.

use std::collections::BTreeMap;

use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{SamlError, SamlResult};
use crate::types::{XMLNS_NS, XML_NS};

/// Deepest element nesting [`Document::parse`] accepts.
pub const MAX_DEPTH: usize = 256;

/// A parsed XML document with a single root element.
#[derive(Debug, Clone)]
pub struct Document {
    root: Element,
}

/// A qualified name as written in the source and as resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedName {
    /// The prefix used in the source, if any.
    pub prefix: Option<String>,
    /// The local part of the name.
    pub local_name: String,
    /// The resolved namespace URI, if the name is in a namespace.
    pub namespace: Option<String>,
}

impl QualifiedName {
    /// Returns the name as written: `prefix:local` or `local`.
    #[must_use]
    pub fn qualified(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{}", self.local_name),
            None => self.local_name.clone(),
        }
    }
}

/// An attribute other than a namespace declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Attribute name.
    pub name: QualifiedName,
    /// Unescaped attribute value.
    pub value: String,
}

/// A child node of an element.
#[derive(Debug, Clone)]
pub enum Node {
    /// A nested element.
    Element(Element),
    /// Character data, CDATA sections included.
    Text(String),
    /// A processing instruction.
    ProcessingInstruction {
        /// PI target.
        target: String,
        /// PI data, possibly empty.
        data: String,
    },
}

/// An element in the document tree.
#[derive(Debug, Clone)]
pub struct Element {
    name: QualifiedName,
    attributes: Vec<Attribute>,
    namespaces: BTreeMap<String, String>,
    children: Vec<Node>,
}

impl Document {
    /// Parses a document.
    ///
    /// DOCTYPE declarations are refused outright, so no entity expansion
    /// beyond the predefined entities ever happens.
    pub fn parse(xml: &str) -> SamlResult<Self> {
        let mut reader = Reader::from_str(xml);
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    check_depth(stack.len())?;
                    let element = Element::open(&e, stack.last().map(|p| &p.namespaces))?;
                    stack.push(element);
                }
                Event::Empty(e) => {
                    check_depth(stack.len())?;
                    let element = Element::open(&e, stack.last().map(|p| &p.namespaces))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| SamlError::XmlParse("unexpected closing tag".to_string()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(e) => {
                    let text = e
                        .unescape()
                        .map_err(|err| SamlError::XmlParse(err.to_string()))?;
                    push_text(&mut stack, normalize_line_endings(&text))?;
                }
                Event::CData(e) => {
                    let text = String::from_utf8(e.into_inner().into_owned())
                        .map_err(|err| SamlError::XmlParse(err.to_string()))?;
                    push_text(&mut stack, normalize_line_endings(&text))?;
                }
                Event::PI(e) => {
                    let raw = std::str::from_utf8(&e)
                        .map_err(|err| SamlError::XmlParse(err.to_string()))?;
                    if let Some(parent) = stack.last_mut() {
                        let (target, data) = raw
                            .split_once(char::is_whitespace)
                            .map_or((raw, ""), |(t, d)| (t, d.trim_start()));
                        parent.children.push(Node::ProcessingInstruction {
                            target: target.to_string(),
                            data: data.to_string(),
                        });
                    }
                }
                Event::DocType(_) => {
                    return Err(SamlError::XmlParse("DOCTYPE is not allowed".to_string()));
                }
                Event::Eof => break,
                Event::Decl(_) | Event::Comment(_) => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(SamlError::XmlParse(format!(
                "unclosed element <{}>",
                open.name.qualified()
            )));
        }

        root.map(|root| Self { root })
            .ok_or_else(|| SamlError::XmlParse("document has no root element".to_string()))
    }

    /// Returns the root element.
    #[must_use]
    pub const fn root(&self) -> &Element {
        &self.root
    }
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> SamlResult<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(Node::Element(element));
    } else if root.is_some() {
        return Err(SamlError::XmlParse("multiple root elements".to_string()));
    } else {
        *root = Some(element);
    }
    Ok(())
}

/// Rejects an element that would open below [`MAX_DEPTH`] levels.
fn check_depth(open_elements: usize) -> SamlResult<()> {
    if open_elements >= MAX_DEPTH {
        return Err(SamlError::XmlParse(format!(
            "elements nested deeper than {MAX_DEPTH} levels"
        )));
    }
    Ok(())
}

fn push_text(stack: &mut [Element], text: String) -> SamlResult<()> {
    match stack.last_mut() {
        Some(parent) => {
            if let Some(Node::Text(previous)) = parent.children.last_mut() {
                previous.push_str(&text);
            } else {
                parent.children.push(Node::Text(text));
            }
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(SamlError::XmlParse("text outside of root element".to_string())),
    }
}

/// Turns literal whitespace characters into spaces. Character references
/// are resolved afterwards and keep their value.
fn normalize_attribute_value(raw: &str) -> String {
    raw.replace("\r\n", " ").replace(['\t', '\n', '\r'], " ")
}

fn normalize_line_endings(text: &str) -> String {
    if text.contains('\r') {
        text.replace("\r\n", "\n").replace('\r', "\n")
    } else {
        text.to_string()
    }
}

fn utf8(bytes: &[u8]) -> SamlResult<&str> {
    std::str::from_utf8(bytes).map_err(|e| SamlError::XmlParse(e.to_string()))
}

impl Element {
    fn open(start: &BytesStart<'_>, inherited: Option<&BTreeMap<String, String>>) -> SamlResult<Self> {
        let mut namespaces = inherited.cloned().unwrap_or_default();
        let mut raw_attributes = Vec::new();

        for attr in start.attributes() {
            let attr = attr.map_err(|e| SamlError::XmlParse(e.to_string()))?;
            let key = utf8(attr.key.as_ref())?.to_string();
            let value = unescape(&normalize_attribute_value(utf8(&attr.value)?))
                .map_err(|e| SamlError::XmlParse(e.to_string()))?
                .into_owned();

            if key == "xmlns" {
                if value.is_empty() {
                    namespaces.remove("");
                } else {
                    namespaces.insert(String::new(), value);
                }
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                if value.is_empty() {
                    return Err(SamlError::XmlParse(format!("prefix '{prefix}' bound to empty namespace")));
                }
                if prefix == "xmlns" || (prefix == "xml" && value != XML_NS) || value == XMLNS_NS {
                    return Err(SamlError::XmlParse(format!("illegal binding for prefix '{prefix}'")));
                }
                namespaces.insert(prefix.to_string(), value);
            } else {
                raw_attributes.push((key, value));
            }
        }

        let name = split_name(utf8(start.name().as_ref())?);
        let namespace = match &name.0 {
            Some(prefix) => Some(resolve_prefix(&namespaces, prefix)?),
            None => namespaces.get("").cloned(),
        };
        let name = QualifiedName {
            prefix: name.0,
            local_name: name.1,
            namespace,
        };

        let mut attributes: Vec<Attribute> = Vec::with_capacity(raw_attributes.len());
        for (key, value) in raw_attributes {
            let (prefix, local_name) = split_name(&key);
            let namespace = match &prefix {
                Some(prefix) => Some(resolve_prefix(&namespaces, prefix)?),
                None => None,
            };
            if attributes
                .iter()
                .any(|a| a.name.local_name == local_name && a.name.namespace == namespace)
            {
                return Err(SamlError::XmlParse(format!("duplicate attribute '{key}'")));
            }
            attributes.push(Attribute {
                name: QualifiedName {
                    prefix,
                    local_name,
                    namespace,
                },
                value,
            });
        }

        Ok(Self {
            name,
            attributes,
            namespaces,
            children: Vec::new(),
        })
    }

    /// Returns the element's name.
    #[must_use]
    pub const fn name(&self) -> &QualifiedName {
        &self.name
    }

    /// Returns the element's local name.
    #[must_use]
    pub fn local_name(&self) -> &str {
        &self.name.local_name
    }

    /// Returns the element's namespace URI.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.name.namespace.as_deref()
    }

    /// Returns true if this element has the given namespace and local name.
    #[must_use]
    pub fn is(&self, namespace: &str, local_name: &str) -> bool {
        self.name.local_name == local_name && self.namespace() == Some(namespace)
    }

    /// Returns the value of an attribute that is not in any namespace.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.namespace.is_none() && a.name.local_name == name)
            .map(|a| a.value.as_str())
    }

    /// Returns all attributes other than namespace declarations.
    #[must_use]
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Returns the namespace bindings in scope at this element.
    ///
    /// The default namespace is keyed by the empty string.
    #[must_use]
    pub const fn namespaces(&self) -> &BTreeMap<String, String> {
        &self.namespaces
    }

    /// Returns the child nodes.
    #[must_use]
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Iterates over child elements.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    /// Iterates over child elements with the given qualified name.
    pub fn children_named<'a, 'n>(
        &'a self,
        namespace: &'n str,
        local_name: &'n str,
    ) -> impl Iterator<Item = &'a Element> + 'n
    where
        'a: 'n,
    {
        self.elements().filter(move |e| e.is(namespace, local_name))
    }

    /// Returns the first child element with the given qualified name.
    #[must_use]
    pub fn child(&self, namespace: &str, local_name: &str) -> Option<&Element> {
        self.children_named(namespace, local_name).next()
    }

    /// Follows a path of qualified names, taking the first match at each step.
    #[must_use]
    pub fn descendant(&self, path: &[(&str, &str)]) -> Option<&Element> {
        path.iter()
            .try_fold(self, |current, (namespace, local_name)| current.child(namespace, local_name))
    }

    /// Returns the concatenated text of this element's direct text children.
    #[must_use]
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Returns the text of the first matching child element.
    #[must_use]
    pub fn child_text(&self, namespace: &str, local_name: &str) -> Option<String> {
        self.child(namespace, local_name).map(Element::text)
    }
}

fn split_name(raw: &str) -> (Option<String>, String) {
    match raw.split_once(':') {
        Some((prefix, local)) => (Some(prefix.to_string()), local.to_string()),
        None => (None, raw.to_string()),
    }
}

fn resolve_prefix(namespaces: &BTreeMap<String, String>, prefix: &str) -> SamlResult<String> {
    if prefix == "xml" {
        return Ok(XML_NS.to_string());
    }
    namespaces
        .get(prefix)
        .cloned()
        .ok_or_else(|| SamlError::XmlParse(format!("unbound namespace prefix '{prefix}'")))
}
