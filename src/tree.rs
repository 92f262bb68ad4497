//! The forest of layer nodes.

use log::{debug, warn};
use std::collections::HashMap;

use crate::LayerTreeError;
use crate::events::{LayerEvent, Listener, Listeners};
use crate::node::{LayerHandle, LayerNode, NodeKey};

/// Owns a forest of [`LayerNode`]s and the listeners interested in them.
///
/// Every node has at most one parent and the tree refuses any change that would create a
/// cycle, so the visibility cascades in [`LayerTree::set_visible`] always terminate.
///
/// # Example
///
/// ```
/// use map_layer_tree::{LayerNode, LayerTree};
///
/// let mut tree = LayerTree::new();
/// let topic = tree.add_layer(LayerNode::new("topic").with_visible(true), None).unwrap();
/// let roads = tree.add_layer(LayerNode::new("roads").with_visible(true), Some(topic)).unwrap();
///
/// tree.set_visible(roads, false);
/// assert!(!tree.node(topic).unwrap().visible());
/// ```
#[derive(Debug, Default)]
pub struct LayerTree {
    nodes: Vec<Option<LayerNode>>,
    roots: Vec<NodeKey>,
    by_id: HashMap<String, NodeKey>,
    pub(crate) listeners: Listeners,
    /// Radio group members chosen by a downward cascade that is still running.
    pub(crate) radio_picks: HashMap<String, NodeKey>,
}

impl LayerTree {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `listener` to `event`. Subscribing the same listener twice is a no-op and
    /// returns `false`.
    pub fn on(&mut self, event: LayerEvent, listener: Listener) -> bool {
        self.listeners.on(event, listener)
    }

    /// Unsubscribes `listener` from `event`. Returns whether it was subscribed.
    pub fn un(&mut self, event: LayerEvent, listener: &Listener) -> bool {
        self.listeners.un(event, listener)
    }

    /// The registered listeners.
    pub fn listeners(&self) -> &Listeners {
        &self.listeners
    }

    /// Appends `node` to the children of `parent`, or to the roots if `parent` is `None`.
    pub fn add_layer(
        &mut self,
        node: LayerNode,
        parent: Option<NodeKey>,
    ) -> Result<NodeKey, LayerTreeError> {
        self.insert_layer(node, parent, usize::MAX)
    }

    /// Inserts `node` at `index` among the children of `parent` (or the roots). An index past
    /// the end appends.
    ///
    /// A visible node joining a radio group that already has a visible member outside the
    /// node's ancestors is inserted hidden.
    pub fn insert_layer(
        &mut self,
        mut node: LayerNode,
        parent: Option<NodeKey>,
        index: usize,
    ) -> Result<NodeKey, LayerTreeError> {
        if self.by_id.contains_key(&node.id) {
            return Err(LayerTreeError::DuplicateId(node.id));
        }
        if let Some(parent) = parent {
            if !self.contains(parent) {
                return Err(LayerTreeError::UnknownLayer(parent.to_string()));
            }
        }

        if node.visible {
            if let Some(other) = self.visible_radio_member(node.radio_group.as_deref(), parent) {
                warn!(
                    "Layer `{}` shares a radio group with visible layer `{}`, adding it hidden",
                    node.id,
                    self.display_id(other)
                );
                node.visible = false;
            }
        }

        let key = NodeKey(self.nodes.len());
        node.parent = parent;
        node.children.clear();
        if let Some(handle) = node.handle.as_mut() {
            handle.attach();
        }
        debug!("Adding layer `{}` as {}", node.id, key);
        self.by_id.insert(node.id.clone(), key);
        self.nodes.push(Some(node));

        let siblings = self.siblings_mut(parent);
        let index = index.min(siblings.len());
        siblings.insert(index, key);
        Ok(key)
    }

    /// Removes the node and its whole subtree. Backing resources of all removed nodes are
    /// detached. The removed node is returned without its children.
    pub fn remove_layer(&mut self, key: NodeKey) -> Result<LayerNode, LayerTreeError> {
        let parent = self
            .node(key)
            .ok_or_else(|| LayerTreeError::UnknownLayer(key.to_string()))?
            .parent;
        self.siblings_mut(parent).retain(|k| *k != key);

        let subtree: Vec<NodeKey> = self.iter_from(&[key]).collect();
        let mut removed = None;
        for k in subtree {
            if let Some(mut node) = self.nodes[k.0].take() {
                self.by_id.remove(&node.id);
                node.detach_handle();
                if k == key {
                    removed = Some(node);
                }
            }
        }

        let mut node = removed.ok_or_else(|| LayerTreeError::UnknownLayer(key.to_string()))?;
        debug!("Removed layer `{}`", node.id);
        node.children.clear();
        node.parent = None;
        Ok(node)
    }

    /// Moves the node under `new_parent` (or to the roots) at `index`. The node is removed from
    /// its old parent first. Moving a node under itself or one of its descendants fails.
    pub fn move_layer(
        &mut self,
        key: NodeKey,
        new_parent: Option<NodeKey>,
        index: usize,
    ) -> Result<(), LayerTreeError> {
        let old_parent = self
            .node(key)
            .ok_or_else(|| LayerTreeError::UnknownLayer(key.to_string()))?
            .parent;
        if let Some(new_parent) = new_parent {
            if !self.contains(new_parent) {
                return Err(LayerTreeError::UnknownLayer(new_parent.to_string()));
            }
            if new_parent == key || self.is_ancestor(key, new_parent) {
                return Err(LayerTreeError::Cycle(self.display_id(key)));
            }
        }

        self.siblings_mut(old_parent).retain(|k| *k != key);
        let siblings = self.siblings_mut(new_parent);
        let index = index.min(siblings.len());
        siblings.insert(index, key);
        if let Some(node) = self.node_mut(key) {
            node.parent = new_parent;
        }
        debug!("Moved layer {} under {:?}", key, new_parent);
        Ok(())
    }

    /// Attaches a backing resource to the node and pushes the current visibility to it. The
    /// previous resource, if any, is detached and returned.
    pub fn set_handle(
        &mut self,
        key: NodeKey,
        mut handle: Box<dyn LayerHandle>,
    ) -> Result<Option<Box<dyn LayerHandle>>, LayerTreeError> {
        let node = self
            .node_mut(key)
            .ok_or_else(|| LayerTreeError::UnknownLayer(key.to_string()))?;
        handle.attach();
        handle.set_visible(node.visible);
        let mut previous = node.handle.replace(handle);
        if let Some(previous) = previous.as_mut() {
            previous.detach();
        }
        Ok(previous)
    }

    /// The node with the given key.
    pub fn node(&self, key: NodeKey) -> Option<&LayerNode> {
        self.nodes.get(key.0).and_then(Option::as_ref)
    }

    /// The node with the given key. Visibility can only be changed through
    /// [`LayerTree::set_visible`].
    pub fn node_mut(&mut self, key: NodeKey) -> Option<&mut LayerNode> {
        self.nodes.get_mut(key.0).and_then(Option::as_mut)
    }

    /// The key of the node with the given id.
    pub fn key_of(&self, id: &str) -> Option<NodeKey> {
        self.by_id.get(id).copied()
    }

    /// The node with the given id.
    pub fn node_by_id(&self, id: &str) -> Option<&LayerNode> {
        self.key_of(id).and_then(|key| self.node(key))
    }

    /// Whether the key refers to a node of this tree.
    pub fn contains(&self, key: NodeKey) -> bool {
        self.node(key).is_some()
    }

    /// The first node in depth-first order with the given name.
    pub fn layer(&self, name: &str) -> Option<NodeKey> {
        self.iter()
            .find(|key| self.node(*key).is_some_and(|node| node.name == name))
    }

    /// The parent of the node. `None` for roots and unknown keys.
    pub fn parent(&self, key: NodeKey) -> Option<NodeKey> {
        self.node(key).and_then(|node| node.parent)
    }

    /// The children of the node. Empty for unknown keys.
    pub fn children(&self, key: NodeKey) -> &[NodeKey] {
        self.node(key).map_or(&[], |node| node.children.as_slice())
    }

    /// The root nodes, in order.
    pub fn roots(&self) -> &[NodeKey] {
        &self.roots
    }

    /// Iterates over all nodes depth-first, each node before its children.
    pub fn iter(&self) -> DepthFirst<'_> {
        DepthFirst::new(self, &self.roots)
    }

    /// Iterates depth-first over the given nodes and their descendants.
    pub fn iter_from(&self, roots: &[NodeKey]) -> DepthFirst<'_> {
        DepthFirst::new(self, roots)
    }

    /// All nodes reachable from `roots` (or from the roots of the tree) as a flat list in
    /// depth-first order.
    pub fn layers_flat(&self, roots: Option<&[NodeKey]>) -> Vec<NodeKey> {
        match roots {
            Some(roots) => self.iter_from(roots).collect(),
            None => self.iter().collect(),
        }
    }

    /// All members of the radio group. `None` if `group` is empty.
    pub fn radio_group_layers(&self, group: &str) -> Option<Vec<NodeKey>> {
        if group.is_empty() {
            return None;
        }
        Some(
            self.iter()
                .filter(|key| {
                    self.node(*key)
                        .is_some_and(|node| node.radio_group.as_deref() == Some(group))
                })
                .collect(),
        )
    }

    /// All base layers.
    pub fn base_layers(&self) -> Vec<NodeKey> {
        self.iter()
            .filter(|key| self.node(*key).is_some_and(|node| node.is_base_layer))
            .collect()
    }

    /// All visible nodes in depth-first order.
    pub fn visible_layers(&self) -> Vec<NodeKey> {
        self.iter()
            .filter(|key| self.node(*key).is_some_and(|node| node.visible))
            .collect()
    }

    /// Number of nodes in the tree.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Whether the tree has no nodes.
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Whether `ancestor` is a proper ancestor of `key`.
    pub fn is_ancestor(&self, ancestor: NodeKey, key: NodeKey) -> bool {
        let mut current = self.parent(key);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.parent(parent);
        }
        false
    }

    /// Detaches every backing resource and drops all nodes and listeners.
    pub fn teardown(&mut self) {
        debug!("Tearing down layer tree with {} layers", self.len());
        for node in self.nodes.iter_mut().flatten() {
            node.detach_handle();
        }
        self.nodes.clear();
        self.roots.clear();
        self.by_id.clear();
        self.listeners.clear();
        self.radio_picks.clear();
    }

    /// A visible member of `group` that is neither `parent` nor one of its ancestors.
    fn visible_radio_member(
        &self,
        group: Option<&str>,
        parent: Option<NodeKey>,
    ) -> Option<NodeKey> {
        let members = self.radio_group_layers(group?)?;
        members.into_iter().find(|member| {
            self.node(*member).is_some_and(|node| node.visible)
                && !parent.is_some_and(|p| *member == p || self.is_ancestor(*member, p))
        })
    }

    fn siblings_mut(&mut self, parent: Option<NodeKey>) -> &mut Vec<NodeKey> {
        match parent.and_then(|key| self.nodes.get_mut(key.0).and_then(Option::as_mut)) {
            Some(node) => &mut node.children,
            None => &mut self.roots,
        }
    }

    pub(crate) fn display_id(&self, key: NodeKey) -> String {
        self.node(key)
            .map_or_else(|| key.to_string(), |node| node.id.clone())
    }
}

impl Drop for LayerTree {
    fn drop(&mut self) {
        for node in self.nodes.iter_mut().flatten() {
            node.detach_handle();
        }
    }
}

/// Depth-first iterator over the nodes of a [`LayerTree`], each node before its children.
///
/// Uses an explicit stack, so deep trees do not grow the call stack.
pub struct DepthFirst<'a> {
    tree: &'a LayerTree,
    stack: Vec<NodeKey>,
}

impl<'a> DepthFirst<'a> {
    fn new(tree: &'a LayerTree, roots: &[NodeKey]) -> Self {
        Self {
            tree,
            stack: roots.iter().rev().copied().collect(),
        }
    }
}

impl Iterator for DepthFirst<'_> {
    type Item = NodeKey;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(key) = self.stack.pop() {
            // Stale keys are skipped.
            if let Some(node) = self.tree.node(key) {
                self.stack.extend(node.children.iter().rev().copied());
                return Some(key);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::tests::RecordingHandle;

    /// root -> [a -> [a1, a2], b]
    fn sample_tree() -> LayerTree {
        let mut tree = LayerTree::new();
        let root = tree.add_layer(LayerNode::new("root"), None).unwrap();
        let a = tree.add_layer(LayerNode::new("a"), Some(root)).unwrap();
        tree.add_layer(LayerNode::new("a1"), Some(a)).unwrap();
        tree.add_layer(LayerNode::new("a2"), Some(a)).unwrap();
        tree.add_layer(LayerNode::new("b"), Some(root)).unwrap();
        tree
    }

    fn ids(tree: &LayerTree, keys: impl IntoIterator<Item = NodeKey>) -> Vec<String> {
        keys.into_iter()
            .map(|key| tree.node(key).unwrap().id.clone())
            .collect()
    }

    #[test]
    fn layers_flat_depth_first() {
        let tree = sample_tree();
        let root = tree.key_of("root").unwrap();

        assert_eq!(
            ids(&tree, tree.layers_flat(None)),
            vec!["root", "a", "a1", "a2", "b"]
        );
        assert_eq!(
            ids(&tree, tree.layers_flat(Some(tree.children(root)))),
            vec!["a", "a1", "a2", "b"]
        );

        // Restartable and reflects the current shape.
        assert_eq!(tree.iter().count(), 5);
        assert_eq!(tree.iter().count(), 5);
    }

    #[test]
    fn layers_flat_of_leaf_and_empty_tree() {
        let tree = sample_tree();
        let a1 = tree.key_of("a1").unwrap();
        assert_eq!(ids(&tree, tree.layers_flat(Some(&[a1]))), vec!["a1"]);

        let empty = LayerTree::new();
        assert!(empty.layers_flat(None).is_empty());
    }

    #[test]
    fn add_layer_duplicate_id() {
        let mut tree = sample_tree();
        let err = tree.add_layer(LayerNode::new("a"), None).unwrap_err();
        assert!(matches!(err, LayerTreeError::DuplicateId(id) if id == "a"));
        assert_eq!(tree.len(), 5);
    }

    #[test]
    fn add_layer_unknown_parent() {
        let mut tree = sample_tree();
        let err = tree
            .add_layer(LayerNode::new("c"), Some(NodeKey(42)))
            .unwrap_err();
        assert!(matches!(err, LayerTreeError::UnknownLayer(_)));
    }

    #[test]
    fn insert_layer_at_index() {
        let mut tree = sample_tree();
        let root = tree.key_of("root").unwrap();
        tree.insert_layer(LayerNode::new("first"), Some(root), 0).unwrap();
        assert_eq!(
            ids(&tree, tree.children(root).to_vec()),
            vec!["first", "a", "b"]
        );
    }

    #[test]
    fn lookups() {
        let mut tree = sample_tree();
        let root = tree.key_of("root").unwrap();
        let a = tree.key_of("a").unwrap();
        let a2 = tree.key_of("a2").unwrap();

        assert_eq!(tree.parent(a2), Some(a));
        assert_eq!(tree.parent(a), Some(root));
        assert_eq!(tree.parent(root), None);
        assert_eq!(tree.parent(NodeKey(99)), None);

        // Names are not unique, the first in depth-first order wins.
        tree.node_mut(a2).unwrap().name = "Roads".to_string();
        let b = tree.key_of("b").unwrap();
        tree.node_mut(b).unwrap().name = "Roads".to_string();
        assert_eq!(tree.layer("Roads"), Some(a2));
        assert_eq!(tree.layer("Rivers"), None);
    }

    #[test]
    fn radio_group_and_base_layers() {
        let mut tree = LayerTree::new();
        let osm = tree
            .add_layer(
                LayerNode::new("osm").with_base_layer(true).with_radio_group("base"),
                None,
            )
            .unwrap();
        let aerial = tree
            .add_layer(LayerNode::new("aerial").with_base_layer(true), None)
            .unwrap();
        tree.add_layer(LayerNode::new("roads"), None).unwrap();

        assert_eq!(tree.radio_group_layers("base"), Some(vec![osm]));
        assert_eq!(tree.radio_group_layers("topics"), Some(vec![]));
        assert_eq!(tree.radio_group_layers(""), None);
        assert_eq!(tree.base_layers(), vec![osm, aerial]);
    }

    #[test]
    fn add_layer_keeps_one_visible_radio_member() {
        let mut tree = LayerTree::new();
        let topic = tree
            .add_layer(
                LayerNode::new("topic").with_radio_group("g").with_visible(true),
                None,
            )
            .unwrap();
        // The own parent does not count as a competing member.
        let roads = tree
            .add_layer(
                LayerNode::new("roads").with_radio_group("g").with_visible(true),
                Some(topic),
            )
            .unwrap();
        let water = tree
            .add_layer(
                LayerNode::new("water").with_radio_group("g").with_visible(true),
                None,
            )
            .unwrap();

        assert!(tree.node(topic).unwrap().visible());
        assert!(tree.node(roads).unwrap().visible());
        assert!(!tree.node(water).unwrap().visible());
        assert_eq!(tree.visible_layers(), vec![topic, roads]);
    }

    #[test]
    fn remove_layer_removes_subtree() {
        let mut tree = sample_tree();
        let a = tree.key_of("a").unwrap();
        let a1 = tree.key_of("a1").unwrap();
        tree.set_handle(a1, Box::new(RecordingHandle::default())).unwrap();

        let removed = tree.remove_layer(a).unwrap();
        assert_eq!(removed.id, "a");
        assert!(removed.children().is_empty());
        assert!(removed.parent().is_none());

        assert_eq!(tree.len(), 2);
        assert!(tree.key_of("a1").is_none());
        assert!(!tree.contains(a1));
        assert_eq!(ids(&tree, tree.iter()), vec!["root", "b"]);

        assert!(matches!(
            tree.remove_layer(a),
            Err(LayerTreeError::UnknownLayer(_))
        ));
        // The id can be used again.
        tree.add_layer(LayerNode::new("a"), None).unwrap();
    }

    #[test]
    fn remove_layer_detaches_handles() {
        let mut tree = sample_tree();
        let a = tree.key_of("a").unwrap();
        tree.set_handle(a, Box::new(RecordingHandle::default())).unwrap();

        let removed = tree.remove_layer(a).unwrap();
        let handle = removed.handle_as::<RecordingHandle>().unwrap();
        assert!(handle.attached);
        assert!(handle.detached);
    }

    #[test]
    fn move_layer_reparents() {
        let mut tree = sample_tree();
        let root = tree.key_of("root").unwrap();
        let a = tree.key_of("a").unwrap();
        let a1 = tree.key_of("a1").unwrap();
        let b = tree.key_of("b").unwrap();

        tree.move_layer(a1, Some(b), 0).unwrap();
        assert_eq!(tree.parent(a1), Some(b));
        assert_eq!(ids(&tree, tree.children(a).to_vec()), vec!["a2"]);
        assert_eq!(tree.children(b), &[a1]);

        tree.move_layer(b, None, 0).unwrap();
        assert_eq!(tree.roots(), &[b, root]);
        assert_eq!(tree.parent(b), None);
    }

    #[test]
    fn move_layer_rejects_cycles() {
        let mut tree = sample_tree();
        let root = tree.key_of("root").unwrap();
        let a = tree.key_of("a").unwrap();
        let a1 = tree.key_of("a1").unwrap();

        assert!(matches!(
            tree.move_layer(root, Some(a1), 0),
            Err(LayerTreeError::Cycle(id)) if id == "root"
        ));
        assert!(matches!(
            tree.move_layer(a, Some(a), 0),
            Err(LayerTreeError::Cycle(_))
        ));
        // Nothing changed.
        assert_eq!(
            ids(&tree, tree.iter()),
            vec!["root", "a", "a1", "a2", "b"]
        );
    }

    #[test]
    fn set_handle_pushes_visibility() {
        let mut tree = LayerTree::new();
        let key = tree
            .add_layer(LayerNode::new("osm").with_visible(true), None)
            .unwrap();

        let previous = tree
            .set_handle(key, Box::new(RecordingHandle::default()))
            .unwrap();
        assert!(previous.is_none());
        let handle = tree.node(key).unwrap().handle_as::<RecordingHandle>().unwrap();
        assert!(handle.attached);
        assert_eq!(handle.visible, Some(true));

        let previous = tree
            .set_handle(key, Box::new(RecordingHandle::default()))
            .unwrap()
            .unwrap();
        let previous = previous.as_any().downcast_ref::<RecordingHandle>().unwrap();
        assert!(previous.detached);
    }

    #[test]
    fn teardown_clears_everything() {
        let mut tree = sample_tree();
        tree.on(LayerEvent::ChangeVisible, crate::events::listener(|_, _| {}));

        tree.teardown();
        assert!(tree.is_empty());
        assert!(tree.roots().is_empty());
        assert!(tree.listeners().is_empty());
        assert_eq!(tree.iter().count(), 0);
    }
}
