//! Exclusive Canonical XML 1.0 (exc-C14N), without comments.
//!
//! Algorithm URI: `http://www.w3.org/2001/10/xml-exc-c14n#`
//!
//! Only "visibly utilized" namespace declarations are output. A namespace is
//! visibly utilized by an element if:
//! 1. Its prefix is used by the element's tag name, OR
//! 2. Its prefix is used by one of the element's attributes, OR
//! 3. The prefix appears in the InclusiveNamespaces PrefixList.
//!
//! A declaration is emitted only when the nearest output ancestor has not
//! already rendered the same binding.

use std::collections::{BTreeMap, BTreeSet};

use super::document::{Element, Node};
use super::escape;

/// A namespace declaration to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
struct NsDecl {
    prefix: String,
    uri: String,
}

impl NsDecl {
    fn render(&self, out: &mut Vec<u8>) {
        if self.prefix.is_empty() {
            out.extend_from_slice(b" xmlns=\"");
        } else {
            out.extend_from_slice(b" xmlns:");
            out.extend_from_slice(self.prefix.as_bytes());
            out.extend_from_slice(b"=\"");
        }
        out.extend_from_slice(escape::escape_attr(&self.uri).as_bytes());
        out.push(b'"');
    }
}

impl Ord for NsDecl {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // The default namespace sorts first, then prefixes lexicographically.
        match (self.prefix.is_empty(), other.prefix.is_empty()) {
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            _ => self.prefix.cmp(&other.prefix),
        }
    }
}

impl PartialOrd for NsDecl {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// An attribute to be rendered, ordered by (namespace URI, local name).
#[derive(Debug, Clone, PartialEq, Eq)]
struct Attr<'a> {
    ns_uri: &'a str,
    local_name: &'a str,
    qualified_name: String,
    value: &'a str,
}

impl Ord for Attr<'_> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Attributes without a namespace come first.
        match (self.ns_uri.is_empty(), other.ns_uri.is_empty()) {
            (true, true) => self.local_name.cmp(other.local_name),
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            (false, false) => self
                .ns_uri
                .cmp(other.ns_uri)
                .then(self.local_name.cmp(other.local_name)),
        }
    }
}

impl PartialOrd for Attr<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Canonicalizes the subtree rooted at `element`.
///
/// - `excluded`: an element inside the subtree to leave out together with its
///   descendants (the enveloped `Signature`).
/// - `inclusive_prefixes`: the InclusiveNamespaces PrefixList; `#default`
///   stands for the default namespace.
#[must_use]
pub fn canonicalize_exclusive(
    element: &Element,
    excluded: Option<&Element>,
    inclusive_prefixes: &[String],
) -> Vec<u8> {
    let ctx = ExcC14n {
        excluded,
        inclusive_prefixes: inclusive_prefixes
            .iter()
            .map(|p| if p == "#default" { String::new() } else { p.clone() })
            .collect(),
    };
    let mut output = Vec::new();
    ctx.process_element(element, &mut output, &BTreeMap::new());
    output
}

struct ExcC14n<'a> {
    excluded: Option<&'a Element>,
    inclusive_prefixes: BTreeSet<String>,
}

impl ExcC14n<'_> {
    fn is_excluded(&self, element: &Element) -> bool {
        self.excluded.is_some_and(|excluded| std::ptr::eq(excluded, element))
    }

    fn process_element(
        &self,
        element: &Element,
        output: &mut Vec<u8>,
        rendered_ns: &BTreeMap<String, String>,
    ) {
        let name = element.name();

        let mut utilized: BTreeSet<String> = self.inclusive_prefixes.clone();
        utilized.insert(name.prefix.clone().unwrap_or_default());
        for attr in element.attributes() {
            if let Some(prefix) = &attr.name.prefix {
                utilized.insert(prefix.clone());
            }
        }

        let inscope = element.namespaces();
        let mut ns_decls: Vec<NsDecl> = Vec::new();
        for prefix in &utilized {
            if prefix == "xml" {
                continue;
            }
            match inscope.get(prefix) {
                Some(uri) => {
                    if rendered_ns.get(prefix) != Some(uri) {
                        ns_decls.push(NsDecl {
                            prefix: prefix.clone(),
                            uri: uri.clone(),
                        });
                    }
                }
                None if prefix.is_empty() => {
                    // The default namespace was undeclared below an output
                    // ancestor that rendered a non-empty one.
                    if rendered_ns.get("").is_some_and(|uri| !uri.is_empty()) {
                        ns_decls.push(NsDecl {
                            prefix: String::new(),
                            uri: String::new(),
                        });
                    }
                }
                None => {}
            }
        }
        ns_decls.sort();

        let mut attrs: Vec<Attr<'_>> = element
            .attributes()
            .iter()
            .map(|attr| Attr {
                ns_uri: attr.name.namespace.as_deref().unwrap_or(""),
                local_name: &attr.name.local_name,
                qualified_name: attr.name.qualified(),
                value: &attr.value,
            })
            .collect();
        attrs.sort();

        let qname = name.qualified();
        output.push(b'<');
        output.extend_from_slice(qname.as_bytes());
        for decl in &ns_decls {
            decl.render(output);
        }
        for attr in &attrs {
            output.push(b' ');
            output.extend_from_slice(attr.qualified_name.as_bytes());
            output.extend_from_slice(b"=\"");
            output.extend_from_slice(escape::escape_attr(attr.value).as_bytes());
            output.push(b'"');
        }
        output.push(b'>');

        let mut child_rendered_ns = rendered_ns.clone();
        for decl in ns_decls {
            child_rendered_ns.insert(decl.prefix, decl.uri);
        }

        for child in element.children() {
            match child {
                Node::Element(child) => {
                    if !self.is_excluded(child) {
                        self.process_element(child, output, &child_rendered_ns);
                    }
                }
                Node::Text(text) => {
                    output.extend_from_slice(escape::escape_text(text).as_bytes());
                }
                Node::ProcessingInstruction { target, data } => {
                    output.extend_from_slice(b"<?");
                    output.extend_from_slice(target.as_bytes());
                    if !data.is_empty() {
                        output.push(b' ');
                        output.extend_from_slice(escape::escape_pi(data).as_bytes());
                    }
                    output.extend_from_slice(b"?>");
                }
            }
        }

        output.extend_from_slice(b"</");
        output.extend_from_slice(qname.as_bytes());
        output.push(b'>');
    }
}
