//! A drag gesture from start to drop. Nothing touches the tree or the text until the drop, which
//! commits exactly one session operation.

use tracing::{event, Level};

use crate::model::tree::WidgetId;
use crate::session::{error, EditFlags, Session};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragSource {
    /// A new widget dragged out of the palette. It exists detached until dropped.
    Palette { widget: WidgetId },
    /// A widget already in the tree.
    Existing { widget: WidgetId },
}

/// Where the dragged widget would land if released now. `parent` is None when hovering an empty
/// canvas, which would make the widget the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropTarget {
    pub parent: Option<WidgetId>,
    pub index: usize,
    pub allowed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    Nothing,
    Added(WidgetId),
    Moved(WidgetId),
    /// An existing widget was dragged off the canvas. Carries the cut text.
    Removed(Option<String>),
}

#[derive(Debug)]
pub struct DragTransaction {
    source: DragSource,
    target: Option<DropTarget>,
}

impl DragTransaction {
    pub fn from_palette(session: &mut Session, class: &str) -> DragTransaction {
        let widget = session.create_widget(class);
        event!(Level::TRACE, "drag started from palette with {} {}", class, widget);
        DragTransaction {
            source: DragSource::Palette { widget },
            target: None,
        }
    }

    pub fn moving(widget: WidgetId) -> DragTransaction {
        event!(Level::TRACE, "drag started on {}", widget);
        DragTransaction {
            source: DragSource::Existing { widget },
            target: None,
        }
    }

    pub fn source(&self) -> &DragSource {
        &self.source
    }

    pub fn widget(&self) -> WidgetId {
        match &self.source {
            DragSource::Palette { widget, .. } | DragSource::Existing { widget } => *widget,
        }
    }

    pub fn target(&self) -> Option<DropTarget> {
        self.target
    }

    /// Updates the drop position while the pointer moves. Only checks whether the drop would be
    /// allowed, for highlighting.
    pub fn hover(&mut self, session: &Session, parent: WidgetId, index: usize) -> bool {
        let widget = self.widget();
        let len = session.tree().children(parent).iter().filter(|c| **c != widget).count();
        let allowed = session.is_live(parent)
            && index <= len
            && session.is_allowed_target(parent, widget);

        self.target = Some(DropTarget { parent: Some(parent), index, allowed });
        allowed
    }

    /// Hovering over an empty canvas.
    pub fn hover_root(&mut self, session: &Session) -> bool {
        let allowed = session.root().is_none() && matches!(self.source, DragSource::Palette { .. });
        self.target = Some(DropTarget { parent: None, index: 0, allowed });
        allowed
    }

    /// The pointer left every possible target.
    pub fn leave(&mut self) {
        self.target = None;
    }

    /// Commits the gesture at the last hovered target.
    pub fn drop(self, session: &mut Session) -> Result<DropOutcome, error::Error> {
        let target = match self.target {
            Some(target) if target.allowed => target,
            _ => {
                event!(Level::DEBUG, "dropped {} outside any target", self.widget());
                return Ok(DropOutcome::Nothing);
            },
        };

        match self.source {
            DragSource::Palette { widget, .. } => {
                session.add_child(widget, target.parent, Some(target.index), EditFlags::empty())?;
                Ok(DropOutcome::Added(widget))
            },
            DragSource::Existing { widget } => match target.parent {
                Some(parent) => {
                    session.move_child(widget, parent, target.index, EditFlags::empty())?;
                    Ok(DropOutcome::Moved(widget))
                },
                None => Ok(DropOutcome::Nothing),
            },
        }
    }

    /// Ends the gesture by throwing the widget away. A widget fresh from the palette was never
    /// placed, so there is nothing to undo.
    pub fn discard(self, session: &mut Session) -> Result<DropOutcome, error::Error> {
        match self.source {
            DragSource::Palette { .. } => Ok(DropOutcome::Nothing),
            DragSource::Existing { widget } => Ok(DropOutcome::Removed(session.remove_child(widget, EditFlags::empty())?)),
        }
    }

    pub fn cancel(self) {
        event!(Level::TRACE, "drag of {} cancelled", self.widget());
    }
}
