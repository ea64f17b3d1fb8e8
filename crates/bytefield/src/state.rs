//! Per-instance state of dynamic fields.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use crate::field::FieldKind;
use crate::layout::FieldId;

/// Size, shape or child data of one field in one instance.
#[derive(Clone, Debug)]
pub enum FieldState {
    /// Current byte length of a byte range or string.
    Len(usize),
    /// Current shape of an array.
    Shape(Vec<usize>),
    /// State of a nested struct instance.
    Nested(InstanceState),
    /// Concrete type of a variable field, once assigned.
    Variable(Option<Box<VariableChild>>),
}

/// Concrete kind assigned to a variable field, with its own state.
#[derive(Clone, Debug)]
pub struct VariableChild {
    pub kind: FieldKind,
    pub state: Option<FieldState>,
}

/// Field states of one struct instance, created lazily on first mutable access.
#[derive(Clone, Debug, Default)]
pub struct InstanceState {
    entries: BTreeMap<FieldId, FieldState>,
}

/// Shared empty store for reads of fields that were never touched.
pub(crate) static EMPTY_STATE: InstanceState = InstanceState::new();

impl InstanceState {
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn get(&self, id: FieldId) -> Option<&FieldState> {
        self.entries.get(&id)
    }

    /// State of the field, created from the kind's defaults on first access.
    ///
    /// Returns `None` for kinds that keep no state.
    pub fn get_or_create(&mut self, id: FieldId, kind: &FieldKind) -> Option<&mut FieldState> {
        match self.entries.entry(id) {
            Entry::Occupied(entry) => Some(entry.into_mut()),
            Entry::Vacant(entry) => kind.initial_state().map(|state| entry.insert(state)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
