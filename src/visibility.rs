//! Visibility propagation.
//!
//! Setting the visibility of a node cascades through the tree:
//!
//! 1. A node of a radio group that becomes visible hides the other members of its group.
//! 2. The children take the new value of their parent.
//! 3. A node that becomes visible shows its parent. A node that becomes hidden hides its
//!    parent once no sibling is visible anymore.
//!
//! Every nested call carries [`Suppress`] flags that keep the cascade from walking back the
//! way it came. Together with the rule that setting the current value is a no-op, this
//! guarantees termination.

use log::{trace, warn};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use crate::events::{LayerEvent, Suppress, VisibilityChange};
use crate::node::NodeKey;
use crate::tree::LayerTree;

impl LayerTree {
    /// Sets the visibility of the node and propagates it in every direction.
    ///
    /// Returns `false` if the node already had that visibility or is not part of the tree.
    pub fn set_visible(&mut self, key: NodeKey, visible: bool) -> bool {
        self.set_visible_with(key, visible, Suppress::NONE)
    }

    /// Sets the visibility of the node, skipping the propagation directions given in
    /// `suppress`.
    ///
    /// Listeners of [`LayerEvent::ChangeVisible`] are notified once per changed node, after
    /// the cascade below that node settled.
    pub fn set_visible_with(&mut self, key: NodeKey, visible: bool, suppress: Suppress) -> bool {
        let Some(node) = self.node_mut(key) else {
            warn!("Cannot set visibility of {key}, it is not part of the tree");
            return false;
        };
        if node.visible == visible {
            return false;
        }

        node.visible = visible;
        if let Some(handle) = node.handle.as_mut() {
            handle.set_visible(visible);
        }
        trace!("Layer `{}` visible: {} ({:?})", node.id, visible, suppress);

        let radio_group = node.radio_group.clone();
        let parent = node.parent;

        if !suppress.siblings && visible {
            if let Some(group) = radio_group {
                self.hide_radio_siblings(key, &group);
            }
        }

        if !suppress.down {
            self.cascade_down(key, visible);
        }

        if !suppress.up {
            if let Some(parent) = parent {
                // Read the children only now, the steps above may have changed them.
                let any_child_visible = self
                    .children(parent)
                    .iter()
                    .any(|child| self.node(*child).is_some_and(|node| node.visible));
                if visible || !any_child_visible {
                    self.set_visible_with(parent, visible, Suppress::PARENT);
                }
            }
        }

        self.emit_visibility_change(VisibilityChange {
            key,
            visible,
            suppress,
        });
        true
    }

    /// Shows the base layer and hides every other base layer. Returns `false` if the key is
    /// not a base layer of this tree.
    pub fn switch_base_layer(&mut self, key: NodeKey) -> bool {
        if !self.node(key).is_some_and(|node| node.is_base_layer) {
            warn!("Cannot switch to {key}, it is not a base layer");
            return false;
        }
        for other in self.base_layers() {
            if other != key {
                self.set_visible_with(other, false, Suppress::SIBLING);
            }
        }
        self.set_visible(key, true);
        true
    }

    fn hide_radio_siblings(&mut self, key: NodeKey, group: &str) {
        let members = self.radio_group_layers(group).unwrap_or_default();
        for member in members {
            // Own ancestors and descendants stay, the group is about the other branches.
            if member == key || self.is_ancestor(member, key) || self.is_ancestor(key, member) {
                continue;
            }
            self.set_visible_with(member, false, Suppress::SIBLING);
        }
    }

    fn cascade_down(&mut self, key: NodeKey, visible: bool) {
        let children = self.children(key).to_vec();
        if !visible {
            for child in children {
                self.set_visible_with(child, false, Suppress::CHILD);
            }
            return;
        }

        // Nested cascades below see the picks made here, so a radio group spread over several
        // levels of the subtree still ends up with a single visible member.
        let mut scoped = Vec::new();
        for (group, member) in self.pick_radio_members(&children) {
            if let Entry::Vacant(entry) = self.radio_picks.entry(group) {
                scoped.push(entry.key().clone());
                entry.insert(member);
            }
        }

        for child in children {
            let picked = match self.node(child).and_then(|n| n.radio_group.as_ref()) {
                Some(group) => self.radio_picks.get(group).is_none_or(|k| *k == child),
                None => true,
            };
            if picked {
                self.set_visible_with(child, true, Suppress::CHILD);
            } else {
                self.set_visible_with(child, false, Suppress::SIBLING);
            }
        }

        // A pick below a parent that was already visible is not reached by the loop above.
        for group in &scoped {
            let Some(member) = self.radio_picks.get(group).copied() else {
                continue;
            };
            let parent_visible = self
                .parent(member)
                .and_then(|parent| self.node(parent))
                .is_some_and(|parent| parent.visible);
            if parent_visible && !self.node(member).is_some_and(|node| node.visible) {
                self.set_visible_with(member, true, Suppress::CHILD);
            }
        }

        for group in scoped {
            self.radio_picks.remove(&group);
        }
    }

    /// Chooses one member per radio group among `roots` and their descendants: the visible
    /// member if there is one, otherwise the first in depth-first order. Members below a
    /// member that was not chosen are not considered.
    fn pick_radio_members(&self, roots: &[NodeKey]) -> HashMap<String, NodeKey> {
        let visible_groups: HashSet<&str> = self
            .iter_from(roots)
            .filter_map(|key| self.node(key))
            .filter(|node| node.visible)
            .filter_map(|node| node.radio_group.as_deref())
            .collect();

        let mut picks: HashMap<String, NodeKey> = HashMap::new();
        let mut stack: Vec<NodeKey> = roots.iter().rev().copied().collect();
        while let Some(key) = stack.pop() {
            let Some(node) = self.node(key) else {
                continue;
            };
            if let Some(group) = node.radio_group.as_ref() {
                match self.radio_picks.get(group).or_else(|| picks.get(group)) {
                    Some(pick) if *pick != key => continue,
                    Some(_) => {}
                    None if node.visible || !visible_groups.contains(group.as_str()) => {
                        picks.insert(group.clone(), key);
                    }
                    None => continue,
                }
            }
            stack.extend(node.children().iter().rev().copied());
        }
        picks
    }

    fn emit_visibility_change(&self, change: VisibilityChange) {
        for listener in self.listeners.get(LayerEvent::ChangeVisible) {
            listener(self, &change);
        }
    }
}
