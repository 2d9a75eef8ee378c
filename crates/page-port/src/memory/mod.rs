//! In-memory page
//!
//! A small element tree with just enough browser behavior for the engine to
//! be exercised without Chromium: checkbox and radio activation, label
//! forwarding, option-restricted select values, visibility through `hidden`
//! and inline `display:none`, and selector-keyed hooks that let a test play
//! the part of the hosted form's scripts.
//!
//! Fixture conventions:
//! - `data-managed` inputs discard plain `.value` assignment, like inputs
//!   owned by a UI framework
//! - `data-ignore-click` swallows dispatched click events on the subtree
//! - `data-ignore-key` swallows keyboard activation

mod html;
mod selector;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use formflow_core_types::RemoteFile;
use parking_lot::Mutex;
use tracing::trace;

use crate::errors::PageError;
use crate::events::DomEvent;
use crate::port::{NodeId, PagePort};
use html::Fragment;
use selector::SelectorList;

/// Callback run against the tree when a hooked event reaches a matching
/// element. Receives the element that matched the hook's selector.
pub type Hook = Arc<dyn Fn(&mut DomTree, NodeId) + Send + Sync>;

#[derive(Clone, Debug)]
enum NodeData {
    Document,
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Clone, Debug)]
struct DomNode {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    value: Option<String>,
    checked: Option<bool>,
    files: Vec<String>,
}

impl DomNode {
    fn new(data: NodeData, parent: Option<NodeId>) -> Self {
        Self {
            data,
            parent,
            children: Vec::new(),
            value: None,
            checked: None,
            files: Vec::new(),
        }
    }
}

/// Element tree behind a [`MemoryPage`].
#[derive(Clone, Debug)]
pub struct DomTree {
    nodes: HashMap<NodeId, DomNode>,
    root: NodeId,
    next_id: u64,
    url: String,
    focused: Option<NodeId>,
    events: Vec<(NodeId, DomEvent)>,
}

impl Default for DomTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DomTree {
    pub fn new() -> Self {
        let root = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(root, DomNode::new(NodeData::Document, None));
        Self {
            nodes,
            root,
            next_id: 1,
            url: "about:blank".to_string(),
            focused: None,
            events: Vec::new(),
        }
    }

    pub fn parse(html: &str) -> Self {
        let mut tree = Self::new();
        let root = tree.root;
        tree.append_html(root, html);
        tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.focused
    }

    /// Every event delivered so far, in order.
    pub fn events(&self) -> &[(NodeId, DomEvent)] {
        &self.events
    }

    pub fn events_at(&self, node: NodeId) -> Vec<DomEvent> {
        self.events
            .iter()
            .filter(|(target, _)| *target == node)
            .map(|(_, event)| event.clone())
            .collect()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    /// Parse `html` and append the result as the last children of `parent`.
    /// Returns the top-level elements created.
    pub fn append_html(&mut self, parent: NodeId, html: &str) -> Vec<NodeId> {
        if !self.nodes.contains_key(&parent) {
            return Vec::new();
        }
        html::parse_fragment(html)
            .into_iter()
            .filter_map(|fragment| self.graft(parent, fragment))
            .collect()
    }

    /// Insert `fragment` under `parent`; returns the id when it is an element.
    fn graft(&mut self, parent: NodeId, fragment: Fragment) -> Option<NodeId> {
        match fragment {
            Fragment::Text(text) => {
                self.insert(parent, NodeData::Text(text));
                None
            }
            Fragment::Element {
                tag,
                attrs,
                children,
            } => {
                let id = self.insert(parent, NodeData::Element { tag, attrs });
                for child in children {
                    self.graft(id, child);
                }
                Some(id)
            }
        }
    }

    fn insert(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, DomNode::new(data, Some(parent)));
        if let Some(parent) = self.nodes.get_mut(&parent) {
            parent.children.push(id);
        }
        id
    }

    /// Detach `node` and its subtree; later handles to it report detached.
    pub fn remove(&mut self, node: NodeId) {
        if node == self.root {
            return;
        }
        if let Some(parent) = self.nodes.get(&node).and_then(|n| n.parent) {
            if let Some(parent) = self.nodes.get_mut(&parent) {
                parent.children.retain(|child| *child != node);
            }
        }
        let mut pending = vec![node];
        while let Some(id) = pending.pop() {
            if let Some(removed) = self.nodes.remove(&id) {
                pending.extend(removed.children);
            }
            if self.focused == Some(id) {
                self.focused = None;
            }
        }
    }

    /// Replace the children of `node` with a single text node.
    pub fn set_text(&mut self, node: NodeId, text: &str) {
        let children = self
            .nodes
            .get(&node)
            .map(|n| n.children.clone())
            .unwrap_or_default();
        for child in children {
            self.remove(child);
        }
        self.insert(node, NodeData::Text(text.to_string()));
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(&node)?.data {
            NodeData::Element { tag, .. } => Some(tag.as_str()),
            _ => None,
        }
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.nodes.get(&node)?.data {
            NodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }

    pub fn has_attr(&self, node: NodeId, name: &str) -> bool {
        self.attr(node, name).is_some()
    }

    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(DomNode {
            data: NodeData::Element { attrs, .. },
            ..
        }) = self.nodes.get_mut(&node)
        {
            match attrs.iter_mut().find(|(key, _)| key == name) {
                Some(entry) => entry.1 = value.to_string(),
                None => attrs.push((name.to_string(), value.to_string())),
            }
        }
    }

    pub fn remove_attr(&mut self, node: NodeId, name: &str) {
        if let Some(DomNode {
            data: NodeData::Element { attrs, .. },
            ..
        }) = self.nodes.get_mut(&node)
        {
            attrs.retain(|(key, _)| key != name);
        }
    }

    pub fn parent_element(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.nodes.get(&node)?.parent?;
        self.tag(parent).map(|_| parent)
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(&node)
            .map(|n| {
                n.children
                    .iter()
                    .copied()
                    .filter(|child| self.tag(*child).is_some())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self
            .nodes
            .get(&node)
            .map(|n| n.children.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(id) = stack.pop() {
            if let Some(n) = self.nodes.get(&id) {
                if matches!(n.data, NodeData::Element { .. }) {
                    out.push(id);
                }
                stack.extend(n.children.iter().rev().copied());
            }
        }
        out
    }

    /// Elements under `scope` (or the document) matching `selector`, in
    /// document order.
    pub fn select(&self, scope: Option<NodeId>, selector: &str) -> Result<Vec<NodeId>, PageError> {
        let list = SelectorList::parse(selector).map_err(PageError::InvalidSelector)?;
        let base = scope.unwrap_or(self.root);
        if !self.contains(base) {
            return Err(PageError::Detached(base));
        }
        Ok(self
            .descendants(base)
            .into_iter()
            .filter(|node| list.matches(self, *node))
            .collect())
    }

    /// First match anywhere in the document. Invalid selectors match nothing.
    pub fn find(&self, selector: &str) -> Option<NodeId> {
        self.select(None, selector).ok()?.into_iter().next()
    }

    pub fn find_all(&self, selector: &str) -> Vec<NodeId> {
        self.select(None, selector).unwrap_or_default()
    }

    pub fn matches(&self, node: NodeId, selector: &str) -> Result<bool, PageError> {
        let list = SelectorList::parse(selector).map_err(PageError::InvalidSelector)?;
        Ok(list.matches(self, node))
    }

    pub fn closest(&self, node: NodeId, selector: &str) -> Result<Option<NodeId>, PageError> {
        let list = SelectorList::parse(selector).map_err(PageError::InvalidSelector)?;
        let mut current = self.tag(node).map(|_| node);
        while let Some(id) = current {
            if list.matches(self, id) {
                return Ok(Some(id));
            }
            current = self.parent_element(id);
        }
        Ok(None)
    }

    /// Raw text of the node and its descendants.
    pub fn text(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, false, &mut out);
        out
    }

    /// Text a user would see, one chunk per line.
    pub fn visible_text(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, true, &mut out);
        out.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn collect_text(&self, node: NodeId, visible_only: bool, out: &mut String) {
        let Some(n) = self.nodes.get(&node) else {
            return;
        };
        match &n.data {
            NodeData::Text(text) => {
                if visible_only {
                    out.push_str(text.trim());
                    out.push('\n');
                } else {
                    out.push_str(text);
                }
            }
            NodeData::Element { tag, .. } => {
                if visible_only && (!self.is_self_visible(node) || tag == "script" || tag == "style")
                {
                    return;
                }
                for child in &n.children {
                    self.collect_text(*child, visible_only, out);
                }
            }
            NodeData::Document => {
                for child in &n.children {
                    self.collect_text(*child, visible_only, out);
                }
            }
        }
    }

    fn is_self_visible(&self, node: NodeId) -> bool {
        if self.has_attr(node, "hidden") {
            return false;
        }
        if self.tag(node) == Some("input") && self.attr(node, "type") == Some("hidden") {
            return false;
        }
        let style: String = self
            .attr(node, "style")
            .unwrap_or_default()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        !(style.contains("display:none") || style.contains("visibility:hidden"))
    }

    pub fn is_visible(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if !self.is_self_visible(id) {
                return false;
            }
            current = self.parent_element(id);
        }
        self.contains(node)
    }

    pub fn is_disabled(&self, node: NodeId) -> bool {
        self.has_attr(node, "disabled")
    }

    fn input_type(&self, node: NodeId) -> Option<String> {
        if self.tag(node) != Some("input") {
            return None;
        }
        Some(
            self.attr(node, "type")
                .unwrap_or("text")
                .to_ascii_lowercase(),
        )
    }

    pub fn is_checked(&self, node: NodeId) -> bool {
        match self.nodes.get(&node) {
            Some(n) => n.checked.unwrap_or_else(|| self.has_attr(node, "checked")),
            None => false,
        }
    }

    /// Set the checked state; checking a radio clears the rest of its group.
    pub fn set_checked(&mut self, node: NodeId, checked: bool) {
        if checked && self.input_type(node).as_deref() == Some("radio") {
            if let Some(name) = self.attr(node, "name").map(str::to_string) {
                let group: Vec<NodeId> = self
                    .descendants(self.root)
                    .into_iter()
                    .filter(|other| {
                        *other != node
                            && self.input_type(*other).as_deref() == Some("radio")
                            && self.attr(*other, "name") == Some(name.as_str())
                    })
                    .collect();
                for other in group {
                    if let Some(n) = self.nodes.get_mut(&other) {
                        n.checked = Some(false);
                    }
                }
            }
        }
        if let Some(n) = self.nodes.get_mut(&node) {
            n.checked = Some(checked);
        }
    }

    fn option_value(&self, option: NodeId) -> String {
        self.attr(option, "value")
            .map(str::to_string)
            .unwrap_or_else(|| self.text(option).trim().to_string())
    }

    pub fn value(&self, node: NodeId) -> String {
        if let Some(value) = self.nodes.get(&node).and_then(|n| n.value.clone()) {
            return value;
        }
        match self.tag(node) {
            Some("select") => {
                let options = self.select(Some(node), "option").unwrap_or_default();
                options
                    .iter()
                    .find(|option| self.has_attr(**option, "selected"))
                    .or_else(|| options.first())
                    .map(|option| self.option_value(*option))
                    .unwrap_or_default()
            }
            Some("textarea") => self.text(node),
            Some("option") => self.option_value(node),
            _ => self.attr(node, "value").unwrap_or_default().to_string(),
        }
    }

    /// Set the live value. Selects only accept the value of one of their options.
    pub fn set_value(&mut self, node: NodeId, value: &str) {
        let value = if self.tag(node) == Some("select") {
            let known = self
                .select(Some(node), "option")
                .unwrap_or_default()
                .into_iter()
                .any(|option| self.option_value(option) == value);
            if known {
                value.to_string()
            } else {
                String::new()
            }
        } else {
            value.to_string()
        };
        if let Some(n) = self.nodes.get_mut(&node) {
            n.value = Some(value);
        }
    }

    /// Names of files attached to an upload input.
    pub fn files(&self, node: NodeId) -> Vec<String> {
        self.nodes
            .get(&node)
            .map(|n| n.files.clone())
            .unwrap_or_default()
    }

    fn ignores(&self, node: NodeId, marker: &str) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if self.has_attr(id, marker) {
                return true;
            }
            current = self.parent_element(id);
        }
        false
    }

    /// Control a click on `node` would toggle: the node itself, or the
    /// control its enclosing label points at.
    fn activation_target(&self, node: NodeId) -> Option<NodeId> {
        let mut current = Some(node);
        while let Some(id) = current {
            if matches!(self.input_type(id).as_deref(), Some("checkbox") | Some("radio")) {
                return Some(id);
            }
            if self.tag(id) == Some("label") {
                if let Some(target) = self.attr(id, "for") {
                    return self.find(&format!("[id=\"{}\"]", target));
                }
                return self
                    .select(Some(id), "input")
                    .ok()
                    .and_then(|inputs| inputs.into_iter().next());
            }
            current = self.parent_element(id);
        }
        None
    }

    /// Toggle the control behind `node`. Returns the control when its state changed.
    fn activate(&mut self, node: NodeId) -> Option<NodeId> {
        let control = self.activation_target(node)?;
        if self.is_disabled(control) {
            return None;
        }
        match self.input_type(control).as_deref() {
            Some("checkbox") => {
                let next = !self.is_checked(control);
                self.set_checked(control, next);
                Some(control)
            }
            Some("radio") if !self.is_checked(control) => {
                self.set_checked(control, true);
                Some(control)
            }
            _ => None,
        }
    }

    /// Serialize the tree back to HTML.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(self.root, &mut out);
        out
    }

    fn write_html(&self, node: NodeId, out: &mut String) {
        let Some(n) = self.nodes.get(&node) else {
            return;
        };
        match &n.data {
            NodeData::Document => {
                for child in &n.children {
                    self.write_html(*child, out);
                }
            }
            NodeData::Text(text) => out.push_str(&html::escape_text(text)),
            NodeData::Element { tag, attrs } => {
                out.push('<');
                out.push_str(tag);
                for (key, value) in attrs {
                    out.push_str(&format!(" {}=\"{}\"", key, html::escape_attr(value)));
                }
                out.push('>');
                if html::is_void(tag) {
                    return;
                }
                for child in &n.children {
                    self.write_html(*child, out);
                }
                out.push_str(&format!("</{}>", tag));
            }
        }
    }
}

#[derive(Clone)]
struct HookEntry {
    event: String,
    selector: String,
    hook: Hook,
}

struct Inner {
    tree: DomTree,
    hooks: Vec<HookEntry>,
    closed: bool,
}

/// [`PagePort`] over an in-memory [`DomTree`].
#[derive(Clone)]
pub struct MemoryPage {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryPage {
    pub fn from_html(html: &str) -> Self {
        Self::from_tree(DomTree::parse(html))
    }

    pub fn from_tree(tree: DomTree) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                tree,
                hooks: Vec::new(),
                closed: false,
            })),
        }
    }

    pub fn with_url(self, url: impl Into<String>) -> Self {
        self.inner.lock().tree.set_url(url);
        self
    }

    /// Run `hook` whenever `event` reaches an element matching `selector`.
    pub fn on(
        &self,
        event: &str,
        selector: &str,
        hook: impl Fn(&mut DomTree, NodeId) + Send + Sync + 'static,
    ) {
        self.inner.lock().hooks.push(HookEntry {
            event: event.to_string(),
            selector: selector.to_string(),
            hook: Arc::new(hook),
        });
    }

    pub fn on_click(&self, selector: &str, hook: impl Fn(&mut DomTree, NodeId) + Send + Sync + 'static) {
        self.on("click", selector, hook);
    }

    pub fn on_input(&self, selector: &str, hook: impl Fn(&mut DomTree, NodeId) + Send + Sync + 'static) {
        self.on("input", selector, hook);
    }

    pub fn on_change(&self, selector: &str, hook: impl Fn(&mut DomTree, NodeId) + Send + Sync + 'static) {
        self.on("change", selector, hook);
    }

    /// Mutate the tree directly, outside of any event.
    pub fn mutate<R>(&self, f: impl FnOnce(&mut DomTree) -> R) -> R {
        f(&mut self.inner.lock().tree)
    }

    pub fn read<R>(&self, f: impl FnOnce(&DomTree) -> R) -> R {
        f(&self.inner.lock().tree)
    }

    pub fn set_url(&self, url: impl Into<String>) {
        self.inner.lock().tree.set_url(url);
    }

    pub fn find(&self, selector: &str) -> Option<NodeId> {
        self.read(|tree| tree.find(selector))
    }

    pub fn events(&self) -> Vec<(NodeId, DomEvent)> {
        self.read(|tree| tree.events().to_vec())
    }

    /// Make every later call fail as if the tab went away.
    pub fn close(&self) {
        self.inner.lock().closed = true;
    }

    fn with_tree<R>(&self, f: impl FnOnce(&DomTree) -> Result<R, PageError>) -> Result<R, PageError> {
        let inner = self.inner.lock();
        if inner.closed {
            return Err(PageError::Closed("page closed".to_string()));
        }
        f(&inner.tree)
    }

    fn with_tree_mut<R>(
        &self,
        f: impl FnOnce(&mut Inner) -> Result<R, PageError>,
    ) -> Result<R, PageError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(PageError::Closed("page closed".to_string()));
        }
        f(&mut inner)
    }

    fn fire(inner: &mut Inner, node: NodeId, event: DomEvent) {
        trace!(%node, event = %event, "memory page event");
        inner.tree.events.push((node, event.clone()));

        let toggled = match &event {
            DomEvent::Click if !inner.tree.ignores(node, "data-ignore-click") => {
                inner.tree.activate(node)
            }
            DomEvent::KeyUp(key) if key == " " && !inner.tree.ignores(node, "data-ignore-key") => {
                inner.tree.activate(node)
            }
            _ => None,
        };

        Self::run_hooks(inner, node, event.name());

        if let Some(control) = toggled {
            inner.tree.events.push((control, DomEvent::Input));
            Self::run_hooks(inner, control, "input");
            inner.tree.events.push((control, DomEvent::Change));
            Self::run_hooks(inner, control, "change");
        }
    }

    fn run_hooks(inner: &mut Inner, node: NodeId, event: &str) {
        let hooks: Vec<HookEntry> = inner
            .hooks
            .iter()
            .filter(|entry| entry.event == event)
            .cloned()
            .collect();
        for entry in hooks {
            if !inner.tree.contains(node) {
                return;
            }
            if let Ok(Some(matched)) = inner.tree.closest(node, &entry.selector) {
                (entry.hook)(&mut inner.tree, matched);
            }
        }
    }
}

fn ensure(tree: &DomTree, node: NodeId) -> Result<(), PageError> {
    if tree.contains(node) {
        Ok(())
    } else {
        Err(PageError::Detached(node))
    }
}

#[async_trait]
impl PagePort for MemoryPage {
    async fn query_selector(
        &self,
        scope: Option<NodeId>,
        selector: &str,
    ) -> Result<Option<NodeId>, PageError> {
        self.with_tree(|tree| Ok(tree.select(scope, selector)?.into_iter().next()))
    }

    async fn query_selector_all(
        &self,
        scope: Option<NodeId>,
        selector: &str,
    ) -> Result<Vec<NodeId>, PageError> {
        self.with_tree(|tree| tree.select(scope, selector))
    }

    async fn tag_name(&self, node: NodeId) -> Result<String, PageError> {
        self.with_tree(|tree| {
            tree.tag(node)
                .map(str::to_string)
                .ok_or(PageError::Detached(node))
        })
    }

    async fn text_content(&self, node: NodeId) -> Result<String, PageError> {
        self.with_tree(|tree| {
            ensure(tree, node)?;
            Ok(tree.text(node))
        })
    }

    async fn attribute(&self, node: NodeId, name: &str) -> Result<Option<String>, PageError> {
        self.with_tree(|tree| {
            ensure(tree, node)?;
            Ok(tree.attr(node, name).map(str::to_string))
        })
    }

    async fn set_attribute(
        &self,
        node: NodeId,
        name: &str,
        value: &str,
    ) -> Result<(), PageError> {
        self.with_tree_mut(|inner| {
            ensure(&inner.tree, node)?;
            inner.tree.set_attr(node, name, value);
            Ok(())
        })
    }

    async fn parent(&self, node: NodeId) -> Result<Option<NodeId>, PageError> {
        self.with_tree(|tree| {
            ensure(tree, node)?;
            Ok(tree.parent_element(node))
        })
    }

    async fn closest(&self, node: NodeId, selector: &str) -> Result<Option<NodeId>, PageError> {
        self.with_tree(|tree| {
            ensure(tree, node)?;
            tree.closest(node, selector)
        })
    }

    async fn matches(&self, node: NodeId, selector: &str) -> Result<bool, PageError> {
        self.with_tree(|tree| {
            ensure(tree, node)?;
            tree.matches(node, selector)
        })
    }

    async fn is_visible(&self, node: NodeId) -> Result<bool, PageError> {
        self.with_tree(|tree| {
            ensure(tree, node)?;
            Ok(tree.is_visible(node))
        })
    }

    async fn is_disabled(&self, node: NodeId) -> Result<bool, PageError> {
        self.with_tree(|tree| {
            ensure(tree, node)?;
            Ok(tree.is_disabled(node))
        })
    }

    async fn is_checked(&self, node: NodeId) -> Result<bool, PageError> {
        self.with_tree(|tree| {
            ensure(tree, node)?;
            Ok(tree.is_checked(node))
        })
    }

    async fn set_checked_property(&self, node: NodeId, checked: bool) -> Result<(), PageError> {
        self.with_tree_mut(|inner| {
            ensure(&inner.tree, node)?;
            inner.tree.set_checked(node, checked);
            Ok(())
        })
    }

    async fn value(&self, node: NodeId) -> Result<String, PageError> {
        self.with_tree(|tree| {
            ensure(tree, node)?;
            Ok(tree.value(node))
        })
    }

    async fn set_value_property(&self, node: NodeId, value: &str) -> Result<(), PageError> {
        self.with_tree_mut(|inner| {
            ensure(&inner.tree, node)?;
            if !inner.tree.has_attr(node, "data-managed") {
                inner.tree.set_value(node, value);
            }
            Ok(())
        })
    }

    async fn set_native_value(&self, node: NodeId, value: &str) -> Result<(), PageError> {
        self.with_tree_mut(|inner| {
            ensure(&inner.tree, node)?;
            inner.tree.set_value(node, value);
            Ok(())
        })
    }

    async fn scroll_into_view(&self, node: NodeId) -> Result<(), PageError> {
        self.with_tree(|tree| ensure(tree, node))
    }

    async fn focus(&self, node: NodeId) -> Result<(), PageError> {
        self.with_tree_mut(|inner| {
            ensure(&inner.tree, node)?;
            inner.tree.focused = Some(node);
            Self::fire(inner, node, DomEvent::Focus);
            Ok(())
        })
    }

    async fn blur(&self, node: NodeId) -> Result<(), PageError> {
        self.with_tree_mut(|inner| {
            ensure(&inner.tree, node)?;
            if inner.tree.focused == Some(node) {
                inner.tree.focused = None;
            }
            Self::fire(inner, node, DomEvent::Blur);
            Ok(())
        })
    }

    async fn dispatch_event(&self, node: NodeId, event: DomEvent) -> Result<(), PageError> {
        self.with_tree_mut(|inner| {
            ensure(&inner.tree, node)?;
            Self::fire(inner, node, event);
            Ok(())
        })
    }

    async fn native_click(&self, node: NodeId) -> Result<(), PageError> {
        self.with_tree_mut(|inner| {
            ensure(&inner.tree, node)?;
            if inner.tree.is_disabled(node) {
                return Ok(());
            }
            inner.tree.events.push((node, DomEvent::Click));
            let toggled = inner.tree.activate(node);
            Self::run_hooks(inner, node, "click");
            if let Some(control) = toggled {
                inner.tree.events.push((control, DomEvent::Change));
                Self::run_hooks(inner, control, "change");
            }
            Ok(())
        })
    }

    async fn attach_files(&self, input: NodeId, files: &[RemoteFile]) -> Result<(), PageError> {
        self.with_tree_mut(|inner| {
            ensure(&inner.tree, input)?;
            if inner.tree.input_type(input).as_deref() != Some("file") {
                return Err(PageError::Unsupported(format!("{} is not a file input", input)));
            }
            if let Some(n) = inner.tree.nodes.get_mut(&input) {
                n.files = files.iter().map(|f| f.name.clone()).collect();
            }
            Self::fire(inner, input, DomEvent::Input);
            Self::fire(inner, input, DomEvent::Change);
            Ok(())
        })
    }

    async fn current_url(&self) -> Result<String, PageError> {
        self.with_tree(|tree| Ok(tree.url().to_string()))
    }

    async fn body_text(&self) -> Result<String, PageError> {
        self.with_tree(|tree| Ok(tree.visible_text(tree.root())))
    }

    async fn snapshot_html(&self) -> Result<String, PageError> {
        self.with_tree(|tree| Ok(tree.to_html()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_value_is_restricted_to_options() {
        let mut tree = DomTree::parse(
            r#"<select id="s"><option value="">--</option><option value="a">A</option><option>B</option></select>"#,
        );
        let select = tree.find("#s").unwrap();
        assert_eq!(tree.value(select), "");
        tree.set_value(select, "B");
        assert_eq!(tree.value(select), "B");
        tree.set_value(select, "zzz");
        assert_eq!(tree.value(select), "");
    }

    #[test]
    fn hidden_ancestors_hide_descendants() {
        let tree = DomTree::parse(
            r#"<div style="display: none"><span id="a">x</span></div><p hidden><b id="b">y</b></p><i id="c">z</i>"#,
        );
        assert!(!tree.is_visible(tree.find("#a").unwrap()));
        assert!(!tree.is_visible(tree.find("#b").unwrap()));
        assert!(tree.is_visible(tree.find("#c").unwrap()));
        assert_eq!(tree.visible_text(tree.root()), "z");
    }

    #[test]
    fn removal_detaches_subtree() {
        let mut tree = DomTree::parse("<div id=\"a\"><span id=\"b\"></span></div>");
        let a = tree.find("#a").unwrap();
        let b = tree.find("#b").unwrap();
        tree.remove(a);
        assert!(!tree.contains(b));
        assert!(tree.find("span").is_none());
    }
}
