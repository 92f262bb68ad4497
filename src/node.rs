//! Layer nodes and the hook to the resources backing them.

use std::any::Any;
use std::fmt;

/// Identity of a node inside a [`LayerTree`](crate::LayerTree).
///
/// Keys are handed out by the tree and never reused, so a key of a removed node simply
/// resolves to nothing.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct NodeKey(pub(crate) usize);

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A resource that renders a layer, e.g. a tile layer of the map view.
///
/// The tree never looks at what the handle does. It only pushes visibility changes to it and
/// tells it when the node enters or leaves the tree.
pub trait LayerHandle: Any {
    /// Called whenever the visibility of the owning node changes.
    fn set_visible(&mut self, visible: bool);

    /// Called when the handle is attached to a node of a tree.
    fn attach(&mut self) {}

    /// Called when the node is removed or the tree is torn down.
    fn detach(&mut self) {}

    /// Gets the handle as a `dyn Any`.
    fn as_any(&self) -> &dyn Any;

    /// Gets the handle as a mutable `dyn Any`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A togglable layer, or a group of layers when it has children.
pub struct LayerNode {
    /// Stable identifier, unique within a tree.
    pub id: String,

    /// Display name. Not necessarily unique.
    pub name: String,

    /// Whether the node represents one of the mutually exclusive base maps.
    pub is_base_layer: bool,

    /// Nodes sharing a radio group are mutually exclusive.
    pub radio_group: Option<String>,

    /// Whether a layer switcher shows the children of this node.
    pub expanded: bool,

    pub(crate) visible: bool,
    pub(crate) children: Vec<NodeKey>,
    pub(crate) parent: Option<NodeKey>,
    pub(crate) handle: Option<Box<dyn LayerHandle>>,
}

impl LayerNode {
    /// Creates a new hidden node with the given id, using the id as name.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            is_base_layer: false,
            radio_group: None,
            expanded: false,
            visible: false,
            children: Vec::new(),
            parent: None,
            handle: None,
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the initial visibility. Nothing is propagated for the initial value.
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Marks the node as a base layer.
    pub fn with_base_layer(mut self, is_base_layer: bool) -> Self {
        self.is_base_layer = is_base_layer;
        self
    }

    /// Puts the node into a radio group.
    pub fn with_radio_group(mut self, group: impl Into<String>) -> Self {
        self.radio_group = Some(group.into());
        self
    }

    /// Sets whether the node is expanded in a layer switcher.
    pub fn with_expanded(mut self, expanded: bool) -> Self {
        self.expanded = expanded;
        self
    }

    /// Current visibility.
    pub fn visible(&self) -> bool {
        self.visible
    }

    /// The children of the node, in order.
    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }

    /// The parent of the node, `None` for roots and nodes not in a tree.
    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    /// The resource backing the node, if any.
    pub fn handle(&self) -> Option<&dyn LayerHandle> {
        self.handle.as_deref()
    }

    /// The resource backing the node, if any.
    pub fn handle_mut(&mut self) -> Option<&mut (dyn LayerHandle + 'static)> {
        self.handle.as_deref_mut()
    }

    /// Returns the backing resource as a concrete type.
    pub fn handle_as<T: LayerHandle>(&self) -> Option<&T> {
        self.handle
            .as_ref()
            .and_then(|handle| handle.as_any().downcast_ref::<T>())
    }

    pub(crate) fn detach_handle(&mut self) {
        if let Some(handle) = self.handle.as_mut() {
            handle.detach();
        }
    }
}

impl fmt::Debug for LayerNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayerNode")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("visible", &self.visible)
            .field("is_base_layer", &self.is_base_layer)
            .field("radio_group", &self.radio_group)
            .field("children", &self.children)
            .field("parent", &self.parent)
            .field("has_handle", &self.handle.is_some())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Handle recording everything the tree tells it.
    #[derive(Default)]
    pub(crate) struct RecordingHandle {
        pub(crate) visible: Option<bool>,
        pub(crate) calls: usize,
        pub(crate) attached: bool,
        pub(crate) detached: bool,
    }

    impl LayerHandle for RecordingHandle {
        fn set_visible(&mut self, visible: bool) {
            self.visible = Some(visible);
            self.calls += 1;
        }

        fn attach(&mut self) {
            self.attached = true;
        }

        fn detach(&mut self) {
            self.detached = true;
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn layer_node_new() {
        let node = LayerNode::new("osm");
        assert_eq!(node.id, "osm");
        assert_eq!(node.name, "osm");
        assert!(!node.visible());
        assert!(node.children().is_empty());
        assert!(node.parent().is_none());
        assert!(node.handle().is_none());
    }

    #[test]
    fn layer_node_builder() {
        let node = LayerNode::new("osm")
            .with_name("OpenStreetMap")
            .with_visible(true)
            .with_base_layer(true)
            .with_radio_group("base");
        assert_eq!(node.name, "OpenStreetMap");
        assert!(node.visible());
        assert!(node.is_base_layer);
        assert_eq!(node.radio_group.as_deref(), Some("base"));
    }

    #[test]
    fn layer_node_handle_downcast() {
        let mut node = LayerNode::new("osm");
        node.handle = Some(Box::new(RecordingHandle::default()));
        assert!(node.handle_as::<RecordingHandle>().is_some());
        assert!(node.handle_mut().unwrap().as_any_mut().is::<RecordingHandle>());
    }
}
