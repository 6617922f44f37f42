use std::collections::VecDeque;

use crate::model::property::PropertyValue;
use crate::model::tree::WidgetId;
use crate::session::collab::UndoLog;

/// One committed tree edit, with enough information to reverse it. Indices are path indices
/// (0 is the last child).
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// `parent` is None when the widget became the root.
    Add { widget: WidgetId, parent: Option<WidgetId>, index: usize, text: Option<String> },
    Remove { widget: WidgetId, parent: Option<WidgetId>, index: usize, text: Option<String> },
    Move { widget: WidgetId, from_parent: WidgetId, from_index: usize, to_parent: WidgetId, to_index: usize },
    SetProperty { widget: WidgetId, name: String, old: Option<PropertyValue>, new: Option<PropertyValue> },
}

impl Operation {
    pub fn inverse(&self) -> Operation {
        match self.clone() {
            Operation::Add { widget, parent, index, text } => Operation::Remove { widget, parent, index, text },
            Operation::Remove { widget, parent, index, text } => Operation::Add { widget, parent, index, text },
            Operation::Move { widget, from_parent, from_index, to_parent, to_index } => Operation::Move {
                widget,
                from_parent: to_parent,
                from_index: to_index,
                to_parent: from_parent,
                to_index: from_index,
            },
            Operation::SetProperty { widget, name, old, new } => Operation::SetProperty { widget, name, old: new, new: old },
        }
    }
}

/// Bounded undo stack with a redo stack that is discarded on every new edit.
#[derive(Debug, Clone)]
pub struct History {
    undo: VecDeque<Operation>,
    redo: Vec<Operation>,
    depth: usize,
}

impl History {
    pub fn new(depth: usize) -> History {
        History {
            undo: VecDeque::new(),
            redo: Vec::new(),
            depth: depth.max(1),
        }
    }
}

impl Default for History {
    fn default() -> History {
        History::new(256)
    }
}

impl UndoLog for History {
    fn push(&mut self, operation: Operation) {
        self.redo.clear();
        self.undo.push_back(operation);
        while self.undo.len() > self.depth {
            self.undo.pop_front();
        }
    }

    fn undo(&mut self) -> Option<Operation> {
        let op = self.undo.pop_back()?;
        self.redo.push(op.clone());
        Some(op)
    }

    fn redo(&mut self) -> Option<Operation> {
        let op = self.redo.pop()?;
        self.undo.push_back(op.clone());
        Some(op)
    }

    fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }
}
