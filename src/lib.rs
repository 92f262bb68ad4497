#![warn(missing_docs)]

//! A layer tree for map applications.
//!
//! This crate keeps track of which map layers are visible. Layers are organized in a forest:
//! group layers own their children, layers in a radio group exclude each other, and base
//! layers can be switched as a set. Changing the visibility of one layer cascades through the
//! tree so that it always ends up in a consistent state, and listeners are told about every
//! layer that changed.
//!
//! The tree does not render anything. Each node can hold a [`LayerHandle`] that the tree tells
//! about visibility changes, e.g. the tile layer of a map widget.
//!
//! # Example
//!
//! ```
//! use map_layer_tree::{LayerEvent, LayerNode, LayerTree, listener};
//!
//! let mut tree = LayerTree::new();
//! let topic = tree.add_layer(LayerNode::new("topic").with_visible(true), None).unwrap();
//! let roads = tree
//!     .add_layer(LayerNode::new("roads").with_radio_group("topic").with_visible(true), Some(topic))
//!     .unwrap();
//! let rails = tree
//!     .add_layer(LayerNode::new("rails").with_radio_group("topic"), Some(topic))
//!     .unwrap();
//!
//! tree.on(
//!     LayerEvent::ChangeVisible,
//!     listener(|tree, change| {
//!         println!("{} visible: {}", tree.node(change.key).unwrap().id, change.visible);
//!     }),
//! );
//!
//! tree.set_visible(rails, true);
//! assert!(!tree.node(roads).unwrap().visible());
//! assert!(tree.node(topic).unwrap().visible());
//! ```

/// Declarative configuration of layer trees.
#[cfg(feature = "config")]
pub mod config;

/// Tree events and their listeners.
pub mod events;

/// Layer nodes.
pub mod node;

/// The layer forest.
pub mod tree;

mod visibility;

use thiserror::Error;

pub use events::{LayerEvent, Listener, Suppress, VisibilityChange, listener};
pub use node::{LayerHandle, LayerNode, NodeKey};
pub use tree::{DepthFirst, LayerTree};

/// Errors that can occur while building or restructuring a layer tree.
#[derive(Error, Debug)]
pub enum LayerTreeError {
    /// A key or id does not refer to a layer of the tree.
    #[error("Layer `{0}` is not part of the tree")]
    UnknownLayer(String),

    /// Layer ids must be unique within a tree.
    #[error("A layer with id `{0}` already exists")]
    DuplicateId(String),

    /// A layer can only have one parent.
    #[error("Layer `{child}` is a child of both `{first}` and `{second}`")]
    SharedChild {
        /// The layer listed twice.
        child: String,
        /// The first parent listing it.
        first: String,
        /// The second parent listing it.
        second: String,
    },

    /// The change would make a layer its own ancestor.
    #[error("Layer `{0}` would become its own ancestor")]
    Cycle(String),

    /// A layer listed as a root is the child of another layer.
    #[error("Layer `{0}` is listed as a root but has a parent")]
    NotARoot(String),

    /// The event name is not known.
    #[error("Unknown layer event `{0}`")]
    UnknownEvent(String),

    /// The configuration could not be parsed.
    #[cfg(feature = "config")]
    #[error("Unable to parse layer configuration")]
    Config(#[from] serde_json::Error),
}
