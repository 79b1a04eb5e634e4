//! In-memory element tree built from quick-xml events.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;

use crate::error::{NfeError, Result};

/// Index of an element inside an [`XmlDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Text or child element, kept in document order.
#[derive(Debug, Clone)]
enum Content {
    Text(String),
    Element(NodeId),
}

#[derive(Debug, Clone)]
struct Element {
    /// Qualified name as written (`nfe:infNFe`).
    tag_name: String,
    /// Name with any namespace prefix stripped (`infNFe`).
    local_name: String,
    attributes: Vec<(String, String)>,
    content: Vec<Content>,
    parent: Option<NodeId>,
}

/// Read access over a parsed element tree.
///
/// Selectors are whitespace-separated local names with descendant
/// semantics: `"infProt chNFe"` matches a `chNFe` somewhere below an
/// `infProt`. Searches run pre-order and never match the scope itself;
/// ancestor steps may sit above the scope, as with DOM `querySelector`.
pub trait ElementTree {
    /// The document element.
    fn root(&self) -> NodeId;

    /// First element matching `selector` under `scope` (whole document when `None`).
    fn find_first(&self, selector: &str, scope: Option<NodeId>) -> Option<NodeId>;

    /// All elements matching `selector` under `scope`, in document order.
    fn find_all(&self, selector: &str, scope: Option<NodeId>) -> Vec<NodeId>;
}

/// A parsed XML document.
#[derive(Debug, Clone)]
pub struct XmlDocument {
    elements: Vec<Element>,
    root: NodeId,
}

impl XmlDocument {
    /// Parse raw XML text.
    ///
    /// Anything that is not a single well-formed element tree is rejected
    /// with [`NfeError::MalformedDocument`].
    pub fn parse(text: &str) -> Result<Self> {
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(false);
        reader.config_mut().check_end_names = true;

        let mut elements: Vec<Element> = Vec::new();
        let mut stack: Vec<NodeId> = Vec::new();
        let mut root: Option<NodeId> = None;

        loop {
            let event = reader.read_event().map_err(|e| {
                NfeError::MalformedDocument(format!(
                    "{} at position {}",
                    e,
                    reader.error_position()
                ))
            })?;

            match event {
                Event::Start(ref e) => {
                    let id = open_element(&mut elements, &stack, &mut root, e)?;
                    stack.push(id);
                }
                Event::Empty(ref e) => {
                    open_element(&mut elements, &stack, &mut root, e)?;
                }
                Event::End(ref e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                    match stack.pop() {
                        Some(id) if elements[id.0].tag_name == name => {}
                        Some(id) => {
                            return Err(NfeError::MalformedDocument(format!(
                                "expected </{}>, found </{}>",
                                elements[id.0].tag_name, name
                            )));
                        }
                        None => {
                            return Err(NfeError::MalformedDocument(format!(
                                "unexpected closing tag </{}>",
                                name
                            )));
                        }
                    }
                }
                Event::Text(ref e) => {
                    let text = e
                        .unescape()
                        .map_err(|e| NfeError::MalformedDocument(e.to_string()))?;
                    push_text(&mut elements, &stack, &text)?;
                }
                Event::CData(e) => {
                    let text = String::from_utf8_lossy(&e.into_inner()).to_string();
                    push_text(&mut elements, &stack, &text)?;
                }
                Event::Eof => break,
                // Declarations, comments, processing instructions and doctype
                // carry nothing the tree exposes.
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(NfeError::MalformedDocument(format!(
                "unclosed element <{}>",
                elements[open.0].tag_name
            )));
        }

        let root =
            root.ok_or_else(|| NfeError::MalformedDocument("no root element".to_string()))?;

        debug!("Parsed XML tree with {} elements", elements.len());

        Ok(Self { elements, root })
    }

    /// Qualified tag name as written in the source.
    pub fn tag_name(&self, id: NodeId) -> &str {
        &self.elements[id.0].tag_name
    }

    /// Tag name without namespace prefix.
    pub fn local_name(&self, id: NodeId) -> &str {
        &self.elements[id.0].local_name
    }

    /// Attributes in source order.
    pub fn attributes(&self, id: NodeId) -> &[(String, String)] {
        &self.elements[id.0].attributes
    }

    /// Value of the named attribute, if present.
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.elements[id.0]
            .attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Enclosing element, `None` for the root.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.elements[id.0].parent
    }

    /// Child elements in document order.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.elements[id.0].content.iter().filter_map(|c| match c {
            Content::Element(child) => Some(*child),
            Content::Text(_) => None,
        })
    }

    /// Whether the element has no child elements.
    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.children(id).next().is_none()
    }

    /// Concatenated text of the element and all its descendants, untrimmed.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        let mut pending = vec![self.elements[id.0].content.iter()];
        while let Some(contents) = pending.last_mut() {
            match contents.next() {
                Some(Content::Text(text)) => out.push_str(text),
                Some(Content::Element(child)) => pending.push(self.elements[child.0].content.iter()),
                None => {
                    pending.pop();
                }
            }
        }
        out
    }

    /// Pre-order descendants of `scope`, excluding `scope` itself.
    fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut pending: Vec<NodeId> = self.children(scope).collect();
        pending.reverse();
        while let Some(id) = pending.pop() {
            out.push(id);
            let before = pending.len();
            pending.extend(self.children(id));
            pending[before..].reverse();
        }
        out
    }

    /// Whether the ancestors of `id` contain `steps` in order.
    ///
    /// `steps` excludes the last selector step, which the caller already
    /// matched against `id`.
    fn matches_ancestors(&self, id: NodeId, steps: &[&str]) -> bool {
        let mut remaining = steps.len();
        let mut current = self.elements[id.0].parent;
        while remaining > 0 {
            let Some(ancestor) = current else {
                return false;
            };
            if self.elements[ancestor.0].local_name == steps[remaining - 1] {
                remaining -= 1;
            }
            current = self.elements[ancestor.0].parent;
        }
        true
    }

    fn select(&self, selector: &str, scope: Option<NodeId>, first_only: bool) -> Vec<NodeId> {
        let steps: Vec<&str> = selector.split_whitespace().collect();
        let Some((last, ancestors)) = steps.split_last() else {
            return Vec::new();
        };

        // A whole-document search also considers the root element.
        let mut candidates = Vec::new();
        if scope.is_none() {
            candidates.push(self.root);
        }
        candidates.extend(self.descendants(scope.unwrap_or(self.root)));

        let mut out = Vec::new();
        for id in candidates {
            if self.elements[id.0].local_name != *last {
                continue;
            }
            if !ancestors.is_empty() && !self.matches_ancestors(id, ancestors) {
                continue;
            }
            out.push(id);
            if first_only {
                break;
            }
        }
        out
    }
}

impl ElementTree for XmlDocument {
    fn root(&self) -> NodeId {
        self.root
    }

    fn find_first(&self, selector: &str, scope: Option<NodeId>) -> Option<NodeId> {
        self.select(selector, scope, true).into_iter().next()
    }

    fn find_all(&self, selector: &str, scope: Option<NodeId>) -> Vec<NodeId> {
        self.select(selector, scope, false)
    }
}

fn open_element(
    elements: &mut Vec<Element>,
    stack: &[NodeId],
    root: &mut Option<NodeId>,
    start: &BytesStart<'_>,
) -> Result<NodeId> {
    let tag_name = String::from_utf8_lossy(start.name().as_ref()).to_string();
    let local_name = String::from_utf8_lossy(start.local_name().as_ref()).to_string();

    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| NfeError::MalformedDocument(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| NfeError::MalformedDocument(e.to_string()))?
            .to_string();
        attributes.push((key, value));
    }

    let id = NodeId(elements.len());
    elements.push(Element {
        tag_name,
        local_name,
        attributes,
        content: Vec::new(),
        parent: stack.last().copied(),
    });

    match stack.last() {
        Some(parent) => elements[parent.0].content.push(Content::Element(id)),
        None if root.is_none() => *root = Some(id),
        None => {
            return Err(NfeError::MalformedDocument(format!(
                "second root element <{}>",
                elements[id.0].tag_name
            )));
        }
    }

    Ok(id)
}

fn push_text(elements: &mut [Element], stack: &[NodeId], text: &str) -> Result<()> {
    match stack.last() {
        Some(parent) => {
            elements[parent.0].content.push(Content::Text(text.to_string()));
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(NfeError::MalformedDocument(
            "text outside of the root element".to_string(),
        )),
    }
}
