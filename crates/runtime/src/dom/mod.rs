//! Host document abstraction.
//!
//! Page mods never own the document they decorate. They query it, inject
//! elements into it and watch a stream of [`DocumentChange`] notifications,
//! all through [`HostDocument`]. [`MemoryDocument`] is the in-process
//! implementation.

mod memory;
mod selector;

pub use memory::MemoryDocument;
pub use selector::{AttributeOp, Selector, SelectorError};

use std::fmt;

use async_trait::async_trait;
use indexmap::IndexMap;
use tokio::sync::broadcast;

// ── Identifiers and notifications ────────────────────────────────────

/// Opaque handle to an element. Stays valid after the element is detached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Loading,
    Ready,
}

/// One observed mutation of the attached tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentChange {
    /// Children added to or removed from `target`.
    ChildList { target: ElementId },
    /// Attribute `name` of `target` changed.
    Attributes { target: ElementId, name: String },
    /// Text content of `target` replaced.
    Text { target: ElementId },
    /// The document location changed without a reload.
    Navigation { href: String },
}

impl DocumentChange {
    /// Tree-shape changes; these drive reconciliation passes.
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::ChildList { .. } | Self::Text { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DomError {
    #[error("Element {0} does not exist")]
    NoSuchElement(ElementId),

    #[error("Element {0} is not attached to a parent")]
    Detached(ElementId),

    #[error("Cannot insert {node} into its own subtree")]
    Cycle { node: ElementId },

    #[error("Invalid selector: {0}")]
    Selector(#[from] SelectorError),
}

// ── Element construction ─────────────────────────────────────────────

/// Declarative description of an element tree to create.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementSpec {
    pub tag: String,
    pub attributes: IndexMap<String, String>,
    pub text: Option<String>,
    pub children: Vec<ElementSpec>,
}

impl ElementSpec {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            ..Self::default()
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Append a token to the `class` attribute.
    pub fn class(mut self, class: &str) -> Self {
        let entry = self.attributes.entry("class".to_string()).or_default();
        if !entry.is_empty() {
            entry.push(' ');
        }
        entry.push_str(class);
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn child(mut self, child: ElementSpec) -> Self {
        self.children.push(child);
        self
    }
}

// ── HostDocument ─────────────────────────────────────────────────────

/// The document a page mod runs against.
///
/// Queries only see elements attached to the document. Mutations of
/// detached elements are allowed and produce no notifications.
#[async_trait]
pub trait HostDocument: Send + Sync {
    fn ready_state(&self) -> ReadyState;

    /// Resolve once the document has finished loading.
    async fn wait_ready(&self);

    /// Current absolute href.
    fn location(&self) -> String;

    /// Subscribe to change notifications from now on.
    fn subscribe(&self) -> broadcast::Receiver<DocumentChange>;

    /// First attached element matching `selector`, in document order.
    fn query(&self, selector: &Selector) -> Option<ElementId>;

    fn query_all(&self, selector: &Selector) -> Vec<ElementId>;

    /// Descendants of `scope` matching `selector`.
    fn query_within(&self, scope: ElementId, selector: &Selector) -> Vec<ElementId>;

    /// Whether `element` is currently attached to the document.
    fn contains(&self, element: ElementId) -> bool;

    fn tag(&self, element: ElementId) -> Option<String>;

    fn attribute(&self, element: ElementId, name: &str) -> Option<String>;

    fn set_attribute(&self, element: ElementId, name: &str, value: &str) -> Result<(), DomError>;

    fn remove_attribute(&self, element: ElementId, name: &str) -> Result<(), DomError>;

    /// Text content of the element and its descendants.
    fn text(&self, element: ElementId) -> Option<String>;

    /// Replace the element's content with `text`.
    fn set_text(&self, element: ElementId, text: &str) -> Result<(), DomError>;

    fn parent(&self, element: ElementId) -> Option<ElementId>;

    /// Create a detached element tree.
    fn create(&self, spec: &ElementSpec) -> Result<ElementId, DomError>;

    fn append_child(&self, parent: ElementId, child: ElementId) -> Result<(), DomError>;

    /// Insert `node` as the previous sibling of `reference`.
    fn insert_before(&self, reference: ElementId, node: ElementId) -> Result<(), DomError>;

    /// Detach `element` from its parent.
    fn remove(&self, element: ElementId) -> Result<(), DomError>;

    /// Convenience: parse `selector` and query it.
    fn query_str(&self, selector: &str) -> Result<Option<ElementId>, DomError> {
        Ok(self.query(&Selector::parse(selector)?))
    }

    fn query_all_str(&self, selector: &str) -> Result<Vec<ElementId>, DomError> {
        Ok(self.query_all(&Selector::parse(selector)?))
    }
}
