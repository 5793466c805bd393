//! Host document boundary.
//!
//! [`HostDocument`] is everything the lifecycle manager needs from a live document: find request
//! nodes, read them, swap them for markup, dispatch completion events, and watch for inserted
//! subtrees. [`Document`] is an in-memory implementation with DOM-like semantics (element tree,
//! `data-*` attributes, bubbling events, child-list mutation records).

use std::collections::{HashMap, VecDeque};
use std::fmt::Write as _;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::options::{Dataset, dataset_from_attributes};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Identifies one mutation subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Nodes inserted by one batch of document mutations, in insertion order.
pub type MutationRecord = Vec<NodeId>;

/// Text and options read off a request node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestContent {
    pub text: String,
    pub dataset: Dataset,
}

/// A dispatched event, with the nodes it bubbled through (target first).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocEvent {
    pub name: String,
    pub target: NodeId,
    pub path: Vec<NodeId>,
}

pub trait HostDocument: Send + Sync + 'static {
    /// Root of the observed tree.
    fn root(&self) -> NodeId;

    /// Request nodes at or below `within`, in document order.
    fn find_requests(&self, within: NodeId, marker: &str) -> Vec<NodeId>;

    /// Source text (first text child) and dataset of a request node. `None` when the node is gone
    /// or carries no text.
    fn request_content(&self, node: NodeId) -> Option<RequestContent>;

    /// Replace `node` in place with parsed `markup`, returning the replacement node. `None` when
    /// `node` is no longer attached.
    fn replace_with_markup(&self, node: NodeId, markup: &str) -> Option<NodeId>;

    /// Dispatch a bubbling event at `node`.
    fn dispatch_event(&self, node: NodeId, name: &str);

    /// Subscribe to subtree insertions under the root.
    fn observe(&self) -> (ObserverId, async_channel::Receiver<MutationRecord>);

    fn disconnect(&self, id: ObserverId);
}

#[derive(Clone, Debug)]
enum NodeKind {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
    /// Serialized markup inserted by the renderer, kept verbatim.
    Markup(String),
}

#[derive(Clone, Debug)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

struct State {
    nodes: Vec<Node>,
    root: NodeId,
    observers: HashMap<u64, async_channel::Sender<MutationRecord>>,
    next_observer: u64,
    event_log: VecDeque<DocEvent>,
    event_log_capacity: usize,
    event_subs: Vec<async_channel::Sender<DocEvent>>,
}

impl State {
    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn is_connected(&self, mut id: NodeId) -> bool {
        loop {
            if id == self.root {
                return true;
            }
            match self.node(id).and_then(|n| n.parent) {
                Some(p) => id = p,
                None => return false,
            }
        }
    }

    fn notify(&mut self, added: MutationRecord) {
        // Unbounded senders only fail once the receiver is gone.
        self.observers
            .retain(|_, tx| tx.try_send(added.clone()).is_ok());
    }

    fn collect_requests(&self, id: NodeId, marker: &str, out: &mut Vec<NodeId>) {
        let Some(node) = self.node(id) else {
            return;
        };
        if let NodeKind::Element { tag, attrs } = &node.kind
            && tag.eq_ignore_ascii_case("script")
            && attrs.iter().any(|(k, v)| k == "type" && v == marker)
        {
            out.push(id);
        }
        for &child in &node.children {
            self.collect_requests(child, marker, out);
        }
    }

    fn serialize(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };
        match &node.kind {
            NodeKind::Text(t) => out.push_str(&crate::markup::escape_text(t)),
            NodeKind::Markup(m) => out.push_str(m),
            NodeKind::Element { tag, attrs } => {
                let _ = write!(out, "<{tag}");
                for (k, v) in attrs {
                    let _ = write!(out, " {k}=\"{}\"", v.replace('"', "&quot;"));
                }
                out.push('>');
                for &child in &node.children {
                    self.serialize(child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }
}

/// Number of dispatched events [`Document::new`] keeps for [`Document::events`].
pub const DEFAULT_EVENT_LOG_CAPACITY: usize = 256;

/// In-memory live document. Cheap to clone; clones share the same tree.
///
/// Node ids are never reused: detached and replaced nodes stay in the arena, so an id held across
/// a replacement can never alias a newer node.
#[derive(Clone)]
pub struct Document {
    state: Arc<Mutex<State>>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.state.lock().nodes.len())
            .finish_non_exhaustive()
    }
}

impl Document {
    /// Empty document with a `body` root element, keeping the last
    /// [`DEFAULT_EVENT_LOG_CAPACITY`] dispatched events.
    pub fn new() -> Self {
        Self::with_event_log_capacity(DEFAULT_EVENT_LOG_CAPACITY)
    }

    /// Empty document keeping at most `capacity` dispatched events; `0` keeps none.
    /// [`Document::subscribe_events`] is unaffected.
    pub fn with_event_log_capacity(capacity: usize) -> Self {
        let mut state = State {
            nodes: Vec::new(),
            root: NodeId(0),
            observers: HashMap::new(),
            next_observer: 0,
            event_log: VecDeque::new(),
            event_log_capacity: capacity,
            event_subs: Vec::new(),
        };
        state.root = state.push(NodeKind::Element {
            tag: "body".to_string(),
            attrs: Vec::new(),
        });
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn body(&self) -> NodeId {
        self.state.lock().root
    }

    /// Create a detached element.
    pub fn create_element<'a>(
        &self,
        tag: &str,
        attrs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> NodeId {
        let attrs = attrs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.state.lock().push(NodeKind::Element {
            tag: tag.to_string(),
            attrs,
        })
    }

    /// Create a detached text node.
    pub fn create_text(&self, text: &str) -> NodeId {
        self.state.lock().push(NodeKind::Text(text.to_string()))
    }

    /// Create a detached `<script type=marker>` request element holding `source`.
    pub fn create_request<'a>(
        &self,
        marker: &'a str,
        source: &str,
        data_attrs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> NodeId {
        let mut attrs = vec![("type", marker)];
        attrs.extend(data_attrs);
        let script = self.create_element("script", attrs);
        let text = self.create_text(source);
        self.append_child(script, text);
        script
    }

    /// Append `child` (detaching it first if needed). Observers are notified when the child
    /// lands in the connected tree.
    pub fn append_child(&self, parent: NodeId, child: NodeId) {
        let mut state = self.state.lock();
        if state.node(parent).is_none() || state.node(child).is_none() || parent == child {
            return;
        }
        if let Some(old) = state.nodes[child.0].parent.take() {
            state.nodes[old.0].children.retain(|&c| c != child);
        }
        state.nodes[child.0].parent = Some(parent);
        state.nodes[parent.0].children.push(child);
        if state.is_connected(parent) {
            state.notify(vec![child]);
        }
    }

    /// Detach `node` from its parent.
    pub fn remove(&self, node: NodeId) {
        let mut state = self.state.lock();
        let Some(parent) = state.node(node).and_then(|n| n.parent) else {
            return;
        };
        state.nodes[parent.0].children.retain(|&c| c != node);
        state.nodes[node.0].parent = None;
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.state.lock().node(node).and_then(|n| n.parent)
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.state
            .lock()
            .node(node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        self.state.lock().is_connected(node)
    }

    pub fn tag(&self, node: NodeId) -> Option<String> {
        match &self.state.lock().node(node)?.kind {
            NodeKind::Element { tag, .. } => Some(tag.clone()),
            _ => None,
        }
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        match &self.state.lock().node(node)?.kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone()),
            _ => None,
        }
    }

    /// Verbatim markup of a node inserted by [`HostDocument::replace_with_markup`].
    pub fn markup(&self, node: NodeId) -> Option<String> {
        match &self.state.lock().node(node)?.kind {
            NodeKind::Markup(m) => Some(m.clone()),
            _ => None,
        }
    }

    /// Serialize `node` and its subtree.
    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.state.lock().serialize(node, &mut out);
        out
    }

    /// The most recent dispatched events, oldest first.
    pub fn events(&self) -> Vec<DocEvent> {
        self.state.lock().event_log.iter().cloned().collect()
    }

    /// Receive events as they are dispatched.
    pub fn subscribe_events(&self) -> async_channel::Receiver<DocEvent> {
        let (tx, rx) = async_channel::unbounded();
        self.state.lock().event_subs.push(tx);
        rx
    }

    pub fn observer_count(&self) -> usize {
        self.state.lock().observers.len()
    }
}

impl HostDocument for Document {
    fn root(&self) -> NodeId {
        self.body()
    }

    fn find_requests(&self, within: NodeId, marker: &str) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.state.lock().collect_requests(within, marker, &mut out);
        out
    }

    fn request_content(&self, node: NodeId) -> Option<RequestContent> {
        let state = self.state.lock();
        let n = state.node(node)?;
        let NodeKind::Element { attrs, .. } = &n.kind else {
            return None;
        };
        let first = n.children.first().and_then(|&c| state.node(c))?;
        let NodeKind::Text(text) = &first.kind else {
            return None;
        };
        Some(RequestContent {
            text: text.clone(),
            dataset: dataset_from_attributes(attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))),
        })
    }

    fn replace_with_markup(&self, node: NodeId, markup: &str) -> Option<NodeId> {
        let mut state = self.state.lock();
        let parent = state.node(node)?.parent?;
        let replacement = state.push(NodeKind::Markup(markup.to_string()));
        let slot = state.nodes[parent.0]
            .children
            .iter()
            .position(|&c| c == node)?;
        state.nodes[parent.0].children[slot] = replacement;
        state.nodes[replacement.0].parent = Some(parent);
        state.nodes[node.0].parent = None;
        if state.is_connected(parent) {
            state.notify(vec![replacement]);
        }
        Some(replacement)
    }

    fn dispatch_event(&self, node: NodeId, name: &str) {
        let mut state = self.state.lock();
        let mut path = vec![node];
        let mut cur = node;
        while let Some(p) = state.node(cur).and_then(|n| n.parent) {
            path.push(p);
            cur = p;
        }
        let event = DocEvent {
            name: name.to_string(),
            target: node,
            path,
        };
        state.event_subs.retain(|tx| tx.try_send(event.clone()).is_ok());
        if state.event_log_capacity == 0 {
            return;
        }
        if state.event_log.len() == state.event_log_capacity {
            state.event_log.pop_front();
        }
        state.event_log.push_back(event);
    }

    fn observe(&self) -> (ObserverId, async_channel::Receiver<MutationRecord>) {
        let (tx, rx) = async_channel::unbounded();
        let mut state = self.state.lock();
        let id = state.next_observer;
        state.next_observer += 1;
        state.observers.insert(id, tx);
        (ObserverId(id), rx)
    }

    fn disconnect(&self, id: ObserverId) {
        if let Some(tx) = self.state.lock().observers.remove(&id.0) {
            tx.close();
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/document.rs"]
mod tests;
