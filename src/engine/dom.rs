//! Arena document tree with a structural mutation journal
//!
//! Stands in for the host page: the engine reads text units out of it and
//! writes highlight wrappers back into it. Nodes live in generation-tagged
//! slab slots addressed by `NodeId`; removing a node vacates its slot for
//! reuse and bumps the generation, so the arena stays bounded under
//! rewrite churn while a stale id stops resolving instead of silently
//! aliasing the slot's next occupant.
//!
//! Every insertion into the attached tree is journaled. Records carry an
//! `engine_authored` flag set while an engine edit window is open, which
//! is how the change observer tells page activity from the engine's own
//! rewrites.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Types
// =============================================================================

/// Tags whose subtrees never contain highlightable text
pub const SKIPPED_TAGS: [&str; 3] = ["script", "style", "noscript"];

/// Stable handle to a node slot. Ids outlive the node: a removed node's id
/// stops resolving, and the generation keeps it dead even after the slot
/// is reused for a new node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

/// Element payload: tag plus the attributes the engine cares about
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ElementData {
    pub tag: String,
    pub classes: Vec<String>,
    pub style: String,
    pub editable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Element(ElementData),
    Text(String),
}

#[derive(Debug)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
}

/// One arena slot. The generation advances when the occupant is removed,
/// which is what invalidates ids handed out for earlier occupants.
#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// One journaled insertion into the attached tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationRecord {
    pub node: NodeId,
    /// True when the insertion happened inside an engine edit window
    pub engine_authored: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DomError {
    #[error("node {0:?} does not exist or was removed")]
    Missing(NodeId),
    #[error("node {0:?} is not attached to a parent")]
    Detached(NodeId),
    #[error("node {0:?} is already attached")]
    Attached(NodeId),
    #[error("node {0:?} is not an element")]
    NotElement(NodeId),
    #[error("attaching node {0:?} would create a cycle")]
    Cycle(NodeId),
    #[error("the root node cannot be replaced or removed")]
    Root,
}

/// Serializable literal form of a (sub)tree, used at the host boundary
/// and for test fixtures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DomLiteral {
    Element {
        tag: String,
        #[serde(default)]
        classes: Vec<String>,
        #[serde(default)]
        style: String,
        #[serde(default)]
        editable: bool,
        #[serde(default)]
        children: Vec<DomLiteral>,
    },
    Text {
        content: String,
    },
}

// =============================================================================
// Dom
// =============================================================================

pub struct Dom {
    slots: Vec<Slot>,
    free: Vec<usize>,
    root: NodeId,
    journal: Vec<MutationRecord>,
    engine_edits: u32,
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

impl Dom {
    /// Empty document: a bare `body` element.
    pub fn new() -> Self {
        let mut dom = Dom {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
            journal: Vec::new(),
            engine_edits: 0,
        };
        let root = dom.insert_node(Node {
            parent: None,
            children: Vec::new(),
            data: NodeData::Element(ElementData {
                tag: "body".to_string(),
                ..ElementData::default()
            }),
        });
        dom.root = root;
        dom
    }

    /// Build a document from its literal form. A text literal at the top
    /// level becomes a `body` with one text child.
    pub fn from_literal(literal: &DomLiteral) -> Dom {
        match literal {
            DomLiteral::Element {
                tag,
                classes,
                style,
                editable,
                children,
            } => {
                let mut dom = Dom {
                    slots: Vec::new(),
                    free: Vec::new(),
                    root: NodeId {
                        index: 0,
                        generation: 0,
                    },
                    journal: Vec::new(),
                    engine_edits: 0,
                };
                let root = dom.insert_node(Node {
                    parent: None,
                    children: Vec::new(),
                    data: NodeData::Element(ElementData {
                        tag: tag.to_lowercase(),
                        classes: classes.clone(),
                        style: style.clone(),
                        editable: *editable,
                    }),
                });
                dom.root = root;
                for child in children {
                    dom.build_literal(root, child);
                }
                dom
            }
            DomLiteral::Text { .. } => {
                let mut dom = Dom::new();
                let root = dom.root;
                dom.build_literal(root, literal);
                dom
            }
        }
    }

    fn build_literal(&mut self, parent: NodeId, literal: &DomLiteral) {
        let data = match literal {
            DomLiteral::Text { content } => NodeData::Text(content.clone()),
            DomLiteral::Element {
                tag,
                classes,
                style,
                editable,
                ..
            } => NodeData::Element(ElementData {
                tag: tag.to_lowercase(),
                classes: classes.clone(),
                style: style.clone(),
                editable: *editable,
            }),
        };
        let id = self.insert_node(Node {
            parent: Some(parent),
            children: Vec::new(),
            data,
        });
        if let Some(node) = self.node_mut(parent) {
            node.children.push(id);
        }
        if let DomLiteral::Element { children, .. } = literal {
            for child in children {
                self.build_literal(id, child);
            }
        }
    }

    /// Literal form of the whole document.
    pub fn to_literal(&self) -> DomLiteral {
        self.literal_of(self.root).unwrap_or(DomLiteral::Element {
            tag: "body".to_string(),
            classes: Vec::new(),
            style: String::new(),
            editable: false,
            children: Vec::new(),
        })
    }

    fn literal_of(&self, id: NodeId) -> Option<DomLiteral> {
        let node = self.node(id)?;
        Some(match &node.data {
            NodeData::Text(content) => DomLiteral::Text {
                content: content.clone(),
            },
            NodeData::Element(el) => DomLiteral::Element {
                tag: el.tag.clone(),
                classes: el.classes.clone(),
                style: el.style.clone(),
                editable: el.editable,
                children: node
                    .children
                    .iter()
                    .filter_map(|&child| self.literal_of(child))
                    .collect(),
            },
        })
    }

    // =========================================================================
    // Construction and mutation
    // =========================================================================

    fn insert_node(&mut self, node: Node) -> NodeId {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.node = Some(node);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len();
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId {
                    index,
                    generation: 0,
                }
            }
        }
    }

    /// Create a detached element. Tags normalize to lowercase.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.insert_node(Node {
            parent: None,
            children: Vec::new(),
            data: NodeData::Element(ElementData {
                tag: tag.to_lowercase(),
                ..ElementData::default()
            }),
        })
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, content: &str) -> NodeId {
        self.insert_node(Node {
            parent: None,
            children: Vec::new(),
            data: NodeData::Text(content.to_string()),
        })
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) -> Result<(), DomError> {
        let el = self.element_mut(id)?;
        if !el.classes.iter().any(|c| c == class) {
            el.classes.push(class.to_string());
        }
        Ok(())
    }

    pub fn set_style(&mut self, id: NodeId, style: &str) -> Result<(), DomError> {
        self.element_mut(id)?.style = style.to_string();
        Ok(())
    }

    pub fn set_editable(&mut self, id: NodeId, editable: bool) -> Result<(), DomError> {
        self.element_mut(id)?.editable = editable;
        Ok(())
    }

    /// Attach a detached node as the last child of `parent`.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        match self.node(parent) {
            None => return Err(DomError::Missing(parent)),
            Some(node) => {
                if matches!(node.data, NodeData::Text(_)) {
                    return Err(DomError::NotElement(parent));
                }
            }
        }
        match self.node(child) {
            None => return Err(DomError::Missing(child)),
            Some(node) => {
                if node.parent.is_some() || child == self.root {
                    return Err(DomError::Attached(child));
                }
            }
        }
        // The child must not sit above the parent in a detached fragment
        let mut cursor = Some(parent);
        while let Some(cur) = cursor {
            if cur == child {
                return Err(DomError::Cycle(child));
            }
            cursor = self.node(cur).and_then(|n| n.parent);
        }

        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.node_mut(parent) {
            node.children.push(child);
        }
        self.journal_insertion(child);
        Ok(())
    }

    /// Swap `new` into `old`'s position and drop `old`'s subtree.
    pub fn replace_node(&mut self, old: NodeId, new: NodeId) -> Result<(), DomError> {
        if old == self.root {
            return Err(DomError::Root);
        }
        let parent = match self.node(old) {
            None => return Err(DomError::Missing(old)),
            Some(node) => match node.parent {
                Some(parent) => parent,
                None => return Err(DomError::Detached(old)),
            },
        };
        match self.node(new) {
            None => return Err(DomError::Missing(new)),
            Some(node) => {
                if node.parent.is_some() || new == self.root {
                    return Err(DomError::Attached(new));
                }
            }
        }
        let mut cursor = Some(parent);
        while let Some(cur) = cursor {
            if cur == new {
                return Err(DomError::Cycle(new));
            }
            cursor = self.node(cur).and_then(|n| n.parent);
        }

        let slot = match self
            .node(parent)
            .and_then(|node| node.children.iter().position(|&c| c == old))
        {
            Some(slot) => slot,
            None => return Err(DomError::Missing(old)),
        };

        if let Some(node) = self.node_mut(parent) {
            node.children[slot] = new;
        }
        if let Some(node) = self.node_mut(new) {
            node.parent = Some(parent);
        }
        self.tombstone_subtree(old);
        self.journal_insertion(new);
        Ok(())
    }

    /// Detach a node and tombstone its subtree. Works on detached
    /// fragments too, which is how aborted builds get discarded.
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), DomError> {
        if id == self.root {
            return Err(DomError::Root);
        }
        let parent = match self.node(id) {
            None => return Err(DomError::Missing(id)),
            Some(node) => node.parent,
        };
        if let Some(parent) = parent {
            if let Some(node) = self.node_mut(parent) {
                node.children.retain(|&c| c != id);
            }
        }
        self.tombstone_subtree(id);
        Ok(())
    }

    fn tombstone_subtree(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            let taken = match self.slots.get_mut(cur.index) {
                Some(slot) if slot.generation == cur.generation => {
                    let node = slot.node.take();
                    if node.is_some() {
                        slot.generation = slot.generation.wrapping_add(1);
                    }
                    node
                }
                _ => None,
            };
            if let Some(node) = taken {
                self.free.push(cur.index);
                stack.extend(node.children);
            }
        }
    }

    // =========================================================================
    // Mutation journal
    // =========================================================================

    /// Journal an insertion, but only once the node is visible from the
    /// root. Building inside a detached fragment is not a page mutation.
    fn journal_insertion(&mut self, node: NodeId) {
        if self.is_attached(node) {
            self.journal.push(MutationRecord {
                node,
                engine_authored: self.engine_edits > 0,
            });
        }
    }

    /// Drain the journal.
    pub fn take_mutations(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.journal)
    }

    pub fn pending_mutations(&self) -> &[MutationRecord] {
        &self.journal
    }

    /// Open an engine edit window. Insertions made while a window is open
    /// are flagged `engine_authored`. Windows nest.
    pub fn begin_engine_edit(&mut self) {
        self.engine_edits += 1;
    }

    pub fn end_engine_edit(&mut self) {
        self.engine_edits = self.engine_edits.saturating_sub(1);
    }

    pub fn in_engine_edit(&self) -> bool {
        self.engine_edits > 0
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut ElementData, DomError> {
        match self.node_mut(id) {
            None => Err(DomError::Missing(id)),
            Some(node) => match &mut node.data {
                NodeData::Element(el) => Ok(el),
                NodeData::Text(_) => Err(DomError::NotElement(id)),
            },
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn is_alive(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut cursor = id;
        loop {
            if cursor == self.root {
                return true;
            }
            match self.node(cursor).and_then(|n| n.parent) {
                Some(parent) => cursor = parent,
                None => return false,
            }
        }
    }

    pub fn data(&self, id: NodeId) -> Option<&NodeData> {
        self.node(id).map(|n| &n.data)
    }

    /// Text node content, `None` for elements and dead ids.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.node(id)?.data {
            NodeData::Text(ref content) => Some(content),
            NodeData::Element(_) => None,
        }
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match self.node(id)?.data {
            NodeData::Element(ref el) => Some(&el.tag),
            NodeData::Text(_) => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn classes(&self, id: NodeId) -> &[String] {
        match self.node(id).map(|n| &n.data) {
            Some(NodeData::Element(el)) => &el.classes,
            _ => &[],
        }
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.classes(id).iter().any(|c| c == class)
    }

    pub fn style(&self, id: NodeId) -> Option<&str> {
        match self.node(id)?.data {
            NodeData::Element(ref el) => Some(&el.style),
            NodeData::Text(_) => None,
        }
    }

    /// Number of live nodes, including detached fragments.
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.node.is_some()).count()
    }

    /// Number of arena slots, vacant ones included. Bounded over time:
    /// removals vacate slots and later insertions reuse them.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Concatenated text of a subtree in document order.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            if let Some(node) = self.node(cur) {
                match &node.data {
                    NodeData::Text(content) => out.push_str(content),
                    NodeData::Element(_) => {
                        for &child in node.children.iter().rev() {
                            stack.push(child);
                        }
                    }
                }
            }
        }
        out
    }

    /// Attached elements carrying `class`, in document order.
    pub fn find_by_class(&self, class: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.node(id) {
                if let NodeData::Element(el) = &node.data {
                    if el.classes.iter().any(|c| c == class) {
                        found.push(id);
                    }
                }
                for &child in node.children.iter().rev() {
                    stack.push(child);
                }
            }
        }
        found
    }

    // =========================================================================
    // Text units
    // =========================================================================

    /// Lazily walk the document's text units: non-blank text nodes outside
    /// script, style, noscript and editable regions, in document order.
    pub fn text_units(&self) -> TextUnits<'_> {
        self.text_units_under(self.root)
    }

    /// Text units of a subtree. Exclusion applies from `start` downward.
    pub fn text_units_under(&self, start: NodeId) -> TextUnits<'_> {
        TextUnits {
            dom: self,
            stack: vec![start],
        }
    }

    // =========================================================================
    // Debug rendering
    // =========================================================================

    /// Render the document as HTML-ish markup, mostly for tests and logs.
    pub fn render_html(&self) -> String {
        self.render_node(self.root)
    }

    pub fn render_node(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.render_into(id, &mut out);
        out
    }

    fn render_into(&self, id: NodeId, out: &mut String) {
        let node = match self.node(id) {
            Some(n) => n,
            None => return,
        };
        match &node.data {
            NodeData::Text(content) => out.push_str(&escape_text(content)),
            NodeData::Element(el) => {
                out.push('<');
                out.push_str(&el.tag);
                if !el.classes.is_empty() {
                    out.push_str(&format!(" class=\"{}\"", el.classes.join(" ")));
                }
                if !el.style.is_empty() {
                    out.push_str(&format!(" style=\"{}\"", el.style));
                }
                if el.editable {
                    out.push_str(" contenteditable=\"true\"");
                }
                out.push('>');
                for &child in &node.children {
                    self.render_into(child, out);
                }
                out.push_str(&format!("</{}>", el.tag));
            }
        }
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

// =============================================================================
// TextUnits iterator
// =============================================================================

fn is_excluded(el: &ElementData) -> bool {
    el.editable || SKIPPED_TAGS.contains(&el.tag.as_str())
}

/// Depth-first iterator over highlightable text nodes
pub struct TextUnits<'a> {
    dom: &'a Dom,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for TextUnits<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        while let Some(id) = self.stack.pop() {
            let node = match self.dom.node(id) {
                Some(n) => n,
                None => continue,
            };
            match &node.data {
                NodeData::Element(el) => {
                    if is_excluded(el) {
                        continue; // prune the whole subtree
                    }
                    for &child in node.children.iter().rev() {
                        self.stack.push(child);
                    }
                }
                NodeData::Text(content) => {
                    if !content.trim().is_empty() {
                        return Some(id);
                    }
                }
            }
        }
        None
    }
}

// =============================================================================
// Tests
// =============================================================================
