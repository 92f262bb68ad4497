//! Declarative configuration of a layer tree.
//!
//! The configuration is a map from layer id to an item describing the layer. Items list the
//! ids of their children, so the whole forest is described without nesting:
//!
//! ```
//! use map_layer_tree::config::LayerTreeConfig;
//!
//! let config = LayerTreeConfig::from_json(r#"{
//!     "items": {
//!         "topics": { "children": ["roads", "rivers"], "isChecked": true },
//!         "roads": { "type": "radio", "isChecked": true },
//!         "rivers": { "type": "radio" }
//!     }
//! }"#).unwrap();
//!
//! let mut tree = config.build().unwrap();
//! let rivers = tree.key_of("rivers").unwrap();
//! tree.set_visible(rivers, true);
//! assert!(!tree.node_by_id("roads").unwrap().visible());
//! ```

use eyre::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use crate::LayerTreeError;
use crate::node::{LayerHandle, LayerNode, NodeKey};
use crate::tree::LayerTree;

/// Radio group of `radio` items at the top level of the forest.
pub const ROOT_RADIO_GROUP: &str = "@roots";

/// How an item is presented and grouped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// An independent layer.
    #[default]
    Checkbox,

    /// A member of a radio group. Unless configured otherwise, the group is formed by the
    /// radio items sharing the same parent.
    Radio,
}

/// Configuration of a single layer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayerItemConfig {
    /// Display name. Defaults to the id.
    pub name: Option<String>,

    /// Ids of the children, in order.
    pub children: Vec<String>,

    /// Checkbox or radio.
    #[serde(rename = "type")]
    pub kind: ItemKind,

    /// Initial visibility.
    pub is_checked: bool,

    /// Whether a layer switcher initially shows the children.
    pub is_expanded: bool,

    /// Whether the layer is a base map.
    pub is_base_layer: bool,

    /// Explicit radio group, overriding the one derived from the parent.
    pub radio_group: Option<String>,

    /// Arbitrary data for whoever creates the resources backing the layers.
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub data: serde_json::Value,
}

/// Configuration of a whole layer tree.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerTreeConfig {
    /// Ids of the root layers, in order. If empty, every item that is nobody's child is a
    /// root, ordered by id.
    pub roots: Vec<String>,

    /// Layers by id.
    pub items: BTreeMap<String, LayerItemConfig>,
}

impl LayerTreeConfig {
    /// Parses a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, LayerTreeError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a JSON configuration from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading layer tree configuration from {}", path.display());
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read layer configuration {}", path.display()))?;
        Self::from_json(&json)
            .with_context(|| format!("Failed to parse layer configuration {}", path.display()))
    }

    /// Builds the tree without backing resources.
    pub fn build(&self) -> Result<LayerTree, LayerTreeError> {
        self.build_with(|_, _| None)
    }

    /// Builds the tree. `factory` is called with the id and data of every item and may return
    /// the resource backing it.
    ///
    /// Initial visibilities are taken as they are, nothing is propagated while building.
    pub fn build_with<F>(&self, mut factory: F) -> Result<LayerTree, LayerTreeError>
    where
        F: FnMut(&str, &serde_json::Value) -> Option<Box<dyn LayerHandle>>,
    {
        let roots = self.root_ids()?;
        let mut tree = LayerTree::new();
        for id in roots {
            self.add_item(&mut tree, id, None, &mut factory)?;
        }
        debug!("Built layer tree with {} layers", tree.len());
        Ok(tree)
    }

    /// Validates the configuration and returns the ids of the roots.
    pub fn root_ids(&self) -> Result<Vec<&str>, LayerTreeError> {
        let parents = self.parents()?;

        // Every item with a parent chain ending in a parentless item is reachable from there.
        // Whatever is left over sits on a cycle.
        let parentless: Vec<&str> = self
            .items
            .keys()
            .map(String::as_str)
            .filter(|id| !parents.contains_key(id))
            .collect();
        let mut reached = HashSet::new();
        let mut stack = parentless.clone();
        while let Some(id) = stack.pop() {
            if reached.insert(id) {
                if let Some(item) = self.items.get(id) {
                    stack.extend(item.children.iter().map(String::as_str));
                }
            }
        }
        if let Some(id) = self
            .items
            .keys()
            .find(|id| !reached.contains(id.as_str()))
        {
            return Err(LayerTreeError::Cycle(id.clone()));
        }

        if self.roots.is_empty() {
            return Ok(parentless);
        }

        for id in &self.roots {
            if !self.items.contains_key(id) {
                return Err(LayerTreeError::UnknownLayer(id.clone()));
            }
            if parents.contains_key(id.as_str()) {
                return Err(LayerTreeError::NotARoot(id.clone()));
            }
        }
        for id in &parentless {
            if !self.roots.iter().any(|root| root == id) {
                warn!("Layer `{id}` is neither a root nor a child, skipping it");
            }
        }
        Ok(self.roots.iter().map(String::as_str).collect())
    }

    /// Maps every child id to the id of its parent.
    fn parents(&self) -> Result<HashMap<&str, &str>, LayerTreeError> {
        let mut parents = HashMap::new();
        for (id, item) in &self.items {
            for child in &item.children {
                if !self.items.contains_key(child) {
                    return Err(LayerTreeError::UnknownLayer(child.clone()));
                }
                if let Some(first) = parents.insert(child.as_str(), id.as_str()) {
                    return Err(LayerTreeError::SharedChild {
                        child: child.clone(),
                        first: first.to_string(),
                        second: id.clone(),
                    });
                }
            }
        }
        Ok(parents)
    }

    fn add_item<F>(
        &self,
        tree: &mut LayerTree,
        id: &str,
        parent: Option<(NodeKey, &str)>,
        factory: &mut F,
    ) -> Result<(), LayerTreeError>
    where
        F: FnMut(&str, &serde_json::Value) -> Option<Box<dyn LayerHandle>>,
    {
        let item = self
            .items
            .get(id)
            .ok_or_else(|| LayerTreeError::UnknownLayer(id.to_string()))?;

        let mut node = LayerNode::new(id)
            .with_visible(item.is_checked)
            .with_base_layer(item.is_base_layer)
            .with_expanded(item.is_expanded);
        if let Some(name) = &item.name {
            node = node.with_name(name.clone());
        }
        node.radio_group = match (&item.radio_group, item.kind) {
            (Some(group), _) => Some(group.clone()),
            (None, ItemKind::Radio) => Some(
                parent
                    .map_or(ROOT_RADIO_GROUP, |(_, parent_id)| parent_id)
                    .to_string(),
            ),
            (None, ItemKind::Checkbox) => None,
        };

        let key = tree.add_layer(node, parent.map(|(key, _)| key))?;
        if let Some(handle) = factory(id, &item.data) {
            tree.set_handle(key, handle)?;
        }

        for child in &item.children {
            self.add_item(tree, child, Some((key, id)), factory)?;
        }
        Ok(())
    }
}
