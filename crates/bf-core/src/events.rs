//! Change notifications emitted by the component tree.
//!
//! Events flow one way: the tree emits, subscribers observe. Subscribers are
//! registered per event kind and are invoked synchronously before the
//! mutating call returns.

use crate::NodeIndex;
use crate::id::{ComponentName, ComponentUuid};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEvent {
    Added {
        index: NodeIndex,
        name: ComponentName,
        component_type: String,
        uuid: ComponentUuid,
    },
    /// `permanent` is false when the component is only detached for a move.
    Removed {
        name: ComponentName,
        component_type: String,
        uuid: ComponentUuid,
        permanent: bool,
    },
    Renamed {
        index: NodeIndex,
        old_name: ComponentName,
        new_name: ComponentName,
        component_type: String,
        uuid: ComponentUuid,
    },
    PropertyChanged {
        index: NodeIndex,
        name: ComponentName,
        property: String,
        value: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeEventKind {
    Added,
    Removed,
    Renamed,
    PropertyChanged,
}

impl TreeEvent {
    pub fn kind(&self) -> TreeEventKind {
        match self {
            TreeEvent::Added { .. } => TreeEventKind::Added,
            TreeEvent::Removed { .. } => TreeEventKind::Removed,
            TreeEvent::Renamed { .. } => TreeEventKind::Renamed,
            TreeEvent::PropertyChanged { .. } => TreeEventKind::PropertyChanged,
        }
    }
}

pub type Listener = Box<dyn FnMut(&TreeEvent)>;

/// Subscriber lists, one per event kind.
#[derive(Default)]
pub struct Subscribers {
    lists: HashMap<TreeEventKind, Vec<Listener>>,
}

impl Subscribers {
    pub fn subscribe(&mut self, kind: TreeEventKind, listener: Listener) {
        self.lists.entry(kind).or_default().push(listener);
    }

    pub fn emit(&mut self, event: &TreeEvent) {
        if let Some(list) = self.lists.get_mut(&event.kind()) {
            for listener in list.iter_mut() {
                listener(event);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lists.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Subscribers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers")
            .field("count", &self.len())
            .finish()
    }
}
