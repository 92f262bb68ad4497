//! Events emitted by the layer tree and the registry of their listeners.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use crate::LayerTreeError;
use crate::node::NodeKey;
use crate::tree::LayerTree;

/// Events a [`LayerTree`] emits.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum LayerEvent {
    /// The visibility of a node changed. Named `change:visible`.
    ChangeVisible,
}

impl LayerEvent {
    /// The name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ChangeVisible => "change:visible",
        }
    }
}

impl fmt::Display for LayerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LayerEvent {
    type Err = LayerTreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "change:visible" => Ok(Self::ChangeVisible),
            other => Err(LayerTreeError::UnknownEvent(other.to_string())),
        }
    }
}

/// Directions a visibility change must not propagate to.
///
/// The flags are threaded through the nested calls of a cascade so that it never turns back
/// on itself. Callers normally use [`Suppress::NONE`].
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq)]
pub struct Suppress {
    /// Do not force the children to the new value.
    pub down: bool,

    /// Do not update the parent.
    pub up: bool,

    /// Do not hide the other members of the radio group.
    pub siblings: bool,
}

impl Suppress {
    /// Propagate in every direction.
    pub const NONE: Self = Self {
        down: false,
        up: false,
        siblings: false,
    };

    /// Used when a radio group member is hidden because another one was shown.
    pub const SIBLING: Self = Self {
        down: false,
        up: true,
        siblings: true,
    };

    /// Used when a parent pushes its value to a child.
    pub const CHILD: Self = Self {
        down: false,
        up: true,
        siblings: false,
    };

    /// Used when a child pulls its parent along.
    pub const PARENT: Self = Self {
        down: true,
        up: false,
        siblings: false,
    };
}

/// Payload of [`LayerEvent::ChangeVisible`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct VisibilityChange {
    /// The node that changed.
    pub key: NodeKey,

    /// The new visibility.
    pub visible: bool,

    /// The suppression flags the change was made with.
    pub suppress: Suppress,
}

/// A callback for tree events. Listeners see the tree only after the cascade for the node
/// settled, and cannot mutate it.
pub type Listener = Rc<dyn Fn(&LayerTree, &VisibilityChange)>;

/// Wraps a closure into a [`Listener`]. Keep a clone of the result around to unregister it.
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(&LayerTree, &VisibilityChange) + 'static,
{
    Rc::new(f)
}

/// Listeners registered per event, in registration order.
#[derive(Default)]
pub struct Listeners {
    listeners: HashMap<LayerEvent, Vec<Listener>>,
}

impl Listeners {
    /// Registers `listener` for `event`. Returns `false` if that same listener was registered
    /// already, in which case nothing changes.
    pub fn on(&mut self, event: LayerEvent, listener: Listener) -> bool {
        let entries = self.listeners.entry(event).or_default();
        if entries.iter().any(|l| Rc::ptr_eq(l, &listener)) {
            return false;
        }
        entries.push(listener);
        true
    }

    /// Unregisters `listener` from `event`. Returns whether it was registered.
    pub fn un(&mut self, event: LayerEvent, listener: &Listener) -> bool {
        let Some(entries) = self.listeners.get_mut(&event) else {
            return false;
        };
        let len = entries.len();
        entries.retain(|l| !Rc::ptr_eq(l, listener));
        entries.len() != len
    }

    /// A snapshot of the listeners of `event`, so that they can be invoked while the tree is
    /// borrowed. A listener registered while a cascade is notifying is not part of the
    /// snapshot and fires from the next change on.
    pub fn get(&self, event: LayerEvent) -> Vec<Listener> {
        self.listeners.get(&event).cloned().unwrap_or_default()
    }

    /// Number of listeners registered for `event`.
    pub fn len(&self, event: LayerEvent) -> usize {
        self.listeners.get(&event).map_or(0, Vec::len)
    }

    /// Whether no listener is registered at all.
    pub fn is_empty(&self) -> bool {
        self.listeners.values().all(Vec::is_empty)
    }

    /// Removes all listeners.
    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (event, entries) in &self.listeners {
            map.entry(event, &entries.len());
        }
        map.finish()
    }
}
