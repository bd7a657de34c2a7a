//! In-process document tree.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use indexmap::IndexMap;
use tokio::sync::{broadcast, watch};

use super::selector::ElementAdapter;
use super::{DocumentChange, DomError, ElementId, ElementSpec, HostDocument, ReadyState, Selector};

const CHANGE_CAPACITY: usize = 1024;

#[derive(Debug)]
struct Node {
    tag: String,
    attributes: IndexMap<String, String>,
    text: String,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
}

impl Node {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: IndexMap::new(),
            text: String::new(),
            parent: None,
            children: Vec::new(),
        }
    }
}

#[derive(Debug)]
struct Tree {
    nodes: HashMap<ElementId, Node>,
    next_id: u64,
    root: ElementId,
    head: ElementId,
    body: ElementId,
}

impl Tree {
    fn new() -> Self {
        let mut tree = Self {
            nodes: HashMap::new(),
            next_id: 0,
            root: ElementId(0),
            head: ElementId(0),
            body: ElementId(0),
        };
        tree.root = tree.alloc(Node::new("html"));
        tree.head = tree.alloc(Node::new("head"));
        tree.body = tree.alloc(Node::new("body"));
        let (root, head, body) = (tree.root, tree.head, tree.body);
        tree.link(root, head, None);
        tree.link(root, body, None);
        tree
    }

    fn alloc(&mut self, node: Node) -> ElementId {
        self.next_id += 1;
        let id = ElementId(self.next_id);
        self.nodes.insert(id, node);
        id
    }

    fn node(&self, id: ElementId) -> Result<&Node, DomError> {
        self.nodes.get(&id).ok_or(DomError::NoSuchElement(id))
    }

    fn node_mut(&mut self, id: ElementId) -> Result<&mut Node, DomError> {
        self.nodes.get_mut(&id).ok_or(DomError::NoSuchElement(id))
    }

    fn is_attached(&self, id: ElementId) -> bool {
        let mut current = Some(id);
        while let Some(node_id) = current {
            if node_id == self.root {
                return true;
            }
            current = self.nodes.get(&node_id).and_then(|n| n.parent);
        }
        false
    }

    fn is_ancestor_or_self(&self, ancestor: ElementId, node: ElementId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(&id).and_then(|n| n.parent);
        }
        false
    }

    /// Detach `id` from its parent. Returns the former parent.
    fn unlink(&mut self, id: ElementId) -> Option<ElementId> {
        let parent = self.nodes.get_mut(&id)?.parent.take()?;
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.retain(|c| *c != id);
        }
        Some(parent)
    }

    /// Attach a detached `child` under `parent`, before `before` if given.
    fn link(&mut self, parent: ElementId, child: ElementId, before: Option<ElementId>) {
        if let Some(p) = self.nodes.get_mut(&parent) {
            let pos = before
                .and_then(|b| p.children.iter().position(|c| *c == b))
                .unwrap_or(p.children.len());
            p.children.insert(pos, child);
        }
        if let Some(c) = self.nodes.get_mut(&child) {
            c.parent = Some(parent);
        }
    }

    fn build(&mut self, spec: &ElementSpec) -> ElementId {
        let mut node = Node::new(&spec.tag);
        node.attributes = spec.attributes.clone();
        node.text = spec.text.clone().unwrap_or_default();
        let id = self.alloc(node);
        for child in &spec.children {
            let child_id = self.build(child);
            self.link(id, child_id, None);
        }
        id
    }

    /// Pre-order walk of the subtree below `scope` (excluding `scope`).
    fn descendants(&self, scope: ElementId) -> Vec<ElementId> {
        let mut out = Vec::new();
        let mut stack: Vec<ElementId> = self
            .nodes
            .get(&scope)
            .map(|n| n.children.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(n) = self.nodes.get(&id) {
                stack.extend(n.children.iter().rev().copied());
            }
        }
        out
    }

    fn text_content(&self, id: ElementId, out: &mut String) {
        if let Some(node) = self.nodes.get(&id) {
            out.push_str(&node.text);
            for child in &node.children {
                self.text_content(*child, out);
            }
        }
    }
}

impl ElementAdapter for Tree {
    fn parent(&self, element: ElementId) -> Option<ElementId> {
        self.nodes.get(&element).and_then(|n| n.parent)
    }

    fn tag_name(&self, element: ElementId) -> Option<&str> {
        self.nodes.get(&element).map(|n| n.tag.as_str())
    }

    fn attr(&self, element: ElementId, name: &str) -> Option<&str> {
        self.nodes
            .get(&element)
            .and_then(|n| n.attributes.get(name))
            .map(String::as_str)
    }
}

// ── MemoryDocument ───────────────────────────────────────────────────

/// A thread-safe document tree with change notifications.
///
/// Starts with `html > head + body`. Notifications are only emitted for
/// mutations of attached elements, and only when something actually changed.
pub struct MemoryDocument {
    tree: Mutex<Tree>,
    location: Mutex<String>,
    ready: watch::Sender<ReadyState>,
    changes: broadcast::Sender<DocumentChange>,
}

impl MemoryDocument {
    /// A document that has finished loading.
    pub fn new(href: impl Into<String>) -> Self {
        Self::with_state(href.into(), ReadyState::Ready)
    }

    /// A document still loading; call [`Self::mark_ready`] to finish.
    pub fn loading(href: impl Into<String>) -> Self {
        Self::with_state(href.into(), ReadyState::Loading)
    }

    fn with_state(href: String, state: ReadyState) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        let (ready, _) = watch::channel(state);
        Self {
            tree: Mutex::new(Tree::new()),
            location: Mutex::new(href),
            ready,
            changes,
        }
    }

    pub fn mark_ready(&self) {
        self.ready.send_replace(ReadyState::Ready);
    }

    /// Change the location in place and notify subscribers.
    pub fn navigate(&self, href: impl Into<String>) {
        let href = href.into();
        {
            let mut location = self.location.lock().expect("location lock poisoned");
            if *location == href {
                return;
            }
            *location = href.clone();
        }
        tracing::debug!(%href, "document navigated");
        self.emit(DocumentChange::Navigation { href });
    }

    pub fn body(&self) -> ElementId {
        self.tree.lock().expect("document lock poisoned").body
    }

    pub fn head(&self) -> ElementId {
        self.tree.lock().expect("document lock poisoned").head
    }

    pub fn root(&self) -> ElementId {
        self.tree.lock().expect("document lock poisoned").root
    }

    /// Build `spec` and append it to `<body>`.
    pub fn append_to_body(&self, spec: &ElementSpec) -> Result<ElementId, DomError> {
        let id = self.create(spec)?;
        self.append_child(self.body(), id)?;
        Ok(id)
    }

    /// Number of elements attached to the document (including `html`).
    pub fn attached_count(&self) -> usize {
        let tree = self.tree.lock().expect("document lock poisoned");
        tree.descendants(tree.root).len() + 1
    }

    fn emit(&self, change: DocumentChange) {
        // No receivers is fine.
        let _ = self.changes.send(change);
    }

    fn with_tree<R>(&self, f: impl FnOnce(&mut Tree) -> R) -> R {
        let mut tree = self.tree.lock().expect("document lock poisoned");
        f(&mut tree)
    }
}

#[async_trait]
impl HostDocument for MemoryDocument {
    fn ready_state(&self) -> ReadyState {
        *self.ready.borrow()
    }

    async fn wait_ready(&self) {
        let mut rx = self.ready.subscribe();
        // The sender is owned by `self`; it cannot close while we borrow it.
        let _ = rx.wait_for(|s| *s == ReadyState::Ready).await;
    }

    fn location(&self) -> String {
        self.location.lock().expect("location lock poisoned").clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<DocumentChange> {
        self.changes.subscribe()
    }

    fn query(&self, selector: &Selector) -> Option<ElementId> {
        self.with_tree(|tree| {
            let root = tree.root;
            std::iter::once(root)
                .chain(tree.descendants(root))
                .find(|id| selector.matches(&*tree, *id))
        })
    }

    fn query_all(&self, selector: &Selector) -> Vec<ElementId> {
        self.with_tree(|tree| {
            let root = tree.root;
            std::iter::once(root)
                .chain(tree.descendants(root))
                .filter(|id| selector.matches(&*tree, *id))
                .collect()
        })
    }

    fn query_within(&self, scope: ElementId, selector: &Selector) -> Vec<ElementId> {
        self.with_tree(|tree| {
            if !tree.is_attached(scope) {
                return Vec::new();
            }
            tree.descendants(scope)
                .into_iter()
                .filter(|id| selector.matches(&*tree, *id))
                .collect()
        })
    }

    fn contains(&self, element: ElementId) -> bool {
        self.with_tree(|tree| tree.is_attached(element))
    }

    fn tag(&self, element: ElementId) -> Option<String> {
        self.with_tree(|tree| tree.nodes.get(&element).map(|n| n.tag.clone()))
    }

    fn attribute(&self, element: ElementId, name: &str) -> Option<String> {
        self.with_tree(|tree| tree.attr(element, name).map(str::to_string))
    }

    fn set_attribute(&self, element: ElementId, name: &str, value: &str) -> Result<(), DomError> {
        let notify = self.with_tree(|tree| -> Result<_, DomError> {
            let node = tree.node_mut(element)?;
            if node.attributes.get(name).map(String::as_str) == Some(value) {
                return Ok(false);
            }
            node.attributes.insert(name.to_string(), value.to_string());
            Ok(tree.is_attached(element))
        })?;
        if notify {
            self.emit(DocumentChange::Attributes {
                target: element,
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn remove_attribute(&self, element: ElementId, name: &str) -> Result<(), DomError> {
        let notify = self.with_tree(|tree| -> Result<_, DomError> {
            let removed = tree.node_mut(element)?.attributes.shift_remove(name).is_some();
            Ok(removed && tree.is_attached(element))
        })?;
        if notify {
            self.emit(DocumentChange::Attributes {
                target: element,
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn text(&self, element: ElementId) -> Option<String> {
        self.with_tree(|tree| {
            tree.nodes.get(&element)?;
            let mut out = String::new();
            tree.text_content(element, &mut out);
            Some(out)
        })
    }

    fn set_text(&self, element: ElementId, text: &str) -> Result<(), DomError> {
        let notify = self.with_tree(|tree| -> Result<_, DomError> {
            let node = tree.node(element)?;
            if node.children.is_empty() && node.text == text {
                return Ok(false);
            }
            let children = std::mem::take(&mut tree.node_mut(element)?.children);
            for child in children {
                if let Some(c) = tree.nodes.get_mut(&child) {
                    c.parent = None;
                }
            }
            tree.node_mut(element)?.text = text.to_string();
            Ok(tree.is_attached(element))
        })?;
        if notify {
            self.emit(DocumentChange::Text { target: element });
        }
        Ok(())
    }

    fn parent(&self, element: ElementId) -> Option<ElementId> {
        self.with_tree(|tree| ElementAdapter::parent(&*tree, element))
    }

    fn create(&self, spec: &ElementSpec) -> Result<ElementId, DomError> {
        Ok(self.with_tree(|tree| tree.build(spec)))
    }

    fn append_child(&self, parent: ElementId, child: ElementId) -> Result<(), DomError> {
        let notify = self.with_tree(|tree| -> Result<_, DomError> {
            tree.node(parent)?;
            tree.node(child)?;
            if tree.is_ancestor_or_self(child, parent) {
                return Err(DomError::Cycle { node: child });
            }
            let old_parent = tree.unlink(child);
            tree.link(parent, child, None);
            let mut targets = Vec::new();
            if let Some(old) = old_parent.filter(|p| tree.is_attached(*p)) {
                targets.push(old);
            }
            if tree.is_attached(parent) {
                targets.push(parent);
            }
            Ok(targets)
        })?;
        for target in notify {
            self.emit(DocumentChange::ChildList { target });
        }
        Ok(())
    }

    fn insert_before(&self, reference: ElementId, node: ElementId) -> Result<(), DomError> {
        let notify = self.with_tree(|tree| -> Result<_, DomError> {
            tree.node(node)?;
            let parent = tree.node(reference)?.parent.ok_or(DomError::Detached(reference))?;
            if tree.is_ancestor_or_self(node, parent) || node == reference {
                return Err(DomError::Cycle { node });
            }
            let old_parent = tree.unlink(node);
            tree.link(parent, node, Some(reference));
            let mut targets = Vec::new();
            if let Some(old) = old_parent.filter(|p| *p != parent && tree.is_attached(*p)) {
                targets.push(old);
            }
            if tree.is_attached(parent) {
                targets.push(parent);
            }
            Ok(targets)
        })?;
        for target in notify {
            self.emit(DocumentChange::ChildList { target });
        }
        Ok(())
    }

    fn remove(&self, element: ElementId) -> Result<(), DomError> {
        let notify = self.with_tree(|tree| -> Result<_, DomError> {
            tree.node(element)?;
            if element == tree.root {
                return Err(DomError::Detached(element));
            }
            let parent = tree.unlink(element);
            Ok(parent.filter(|p| tree.is_attached(*p)))
        })?;
        if let Some(target) = notify {
            self.emit(DocumentChange::ChildList { target });
        }
        Ok(())
    }
}
