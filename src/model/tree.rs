use std::collections::BTreeMap;
use std::fmt;

use crate::model::catalog;
use crate::model::property;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WidgetId(usize);

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Widget {
    pub class: String,
    pub container: catalog::ContainerKind,
    pub properties: BTreeMap<String, property::PropertyValue>,

    parent: Option<WidgetId>,
    /* retained after detachment so undo can put the widget back */
    last_parent: Option<WidgetId>,
    /* declaration order; path indices count from the end of this list */
    children: Vec<WidgetId>,
    /* for switching containers, the child that is showing */
    active: Option<WidgetId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacementError {
    NoSuchWidget(WidgetId),
    NotAContainer { container: String },
    ChildRejected { container: String, child: String },
    ContainerFull { container: String, max: usize },
    WouldCycle,
    AlreadyAttached,
    NotAttached,
    RootOccupied,
    IndexOutOfRange { index: usize, len: usize },
}

impl fmt::Display for PlacementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlacementError::NoSuchWidget(id) => write!(f, "widget {} doesn't exist", id),
            PlacementError::NotAContainer { container } => write!(f, "{} can't have children", container),
            PlacementError::ChildRejected { container, child } => write!(f, "{} doesn't accept {} as a child", container, child),
            PlacementError::ContainerFull { container, max } => write!(f, "{} can't have more than {} children", container, max),
            PlacementError::WouldCycle => write!(f, "a widget can't be placed inside itself"),
            PlacementError::AlreadyAttached => write!(f, "widget is already attached somewhere"),
            PlacementError::NotAttached => write!(f, "widget isn't attached to anything"),
            PlacementError::RootOccupied => write!(f, "there is already a root widget"),
            PlacementError::IndexOutOfRange { index, len } => write!(f, "index {} is out of range for {} children", index, len),
        }
    }
}

/// Widgets live in a flat table; relationships are ids into the same table. Detached widgets stay
/// in the table until the whole tree is replaced.
#[derive(Debug, Clone, Default)]
pub struct WidgetTree {
    widgets: Vec<Widget>,
    root: Option<WidgetId>,
}

impl WidgetTree {
    pub fn new() -> WidgetTree {
        WidgetTree::default()
    }

    pub fn create(&mut self, class: &str, catalog: &catalog::Catalog) -> WidgetId {
        let id = WidgetId(self.widgets.len());
        self.widgets.push(Widget {
            class: class.to_string(),
            container: catalog.container(class),
            properties: BTreeMap::new(),
            parent: None,
            last_parent: None,
            children: Vec::new(),
            active: None,
        });
        id
    }

    pub fn root(&self) -> Option<WidgetId> {
        self.root
    }

    pub fn set_root(&mut self, root: Option<WidgetId>) -> Result<(), PlacementError> {
        if let Some(root) = root {
            let widget = self.try_get(root)?;
            if widget.parent.is_some() {
                return Err(PlacementError::AlreadyAttached);
            }
        }
        self.root = root;
        Ok(())
    }

    pub fn contains(&self, id: WidgetId) -> bool {
        id.0 < self.widgets.len()
    }

    pub fn get(&self, id: WidgetId) -> Option<&Widget> {
        self.widgets.get(id.0)
    }

    pub fn get_mut(&mut self, id: WidgetId) -> Option<&mut Widget> {
        self.widgets.get_mut(id.0)
    }

    fn try_get(&self, id: WidgetId) -> Result<&Widget, PlacementError> {
        self.widgets.get(id.0).ok_or(PlacementError::NoSuchWidget(id))
    }

    pub fn class(&self, id: WidgetId) -> Option<&str> {
        self.get(id).map(|w| w.class.as_str())
    }

    pub fn parent(&self, id: WidgetId) -> Option<WidgetId> {
        self.get(id).and_then(|w| w.parent)
    }

    pub fn last_parent(&self, id: WidgetId) -> Option<WidgetId> {
        self.get(id).and_then(|w| w.last_parent)
    }

    pub fn children(&self, id: WidgetId) -> &[WidgetId] {
        match self.get(id) {
            Some(w) => &w.children,
            None => &[],
        }
    }

    pub fn active(&self, id: WidgetId) -> Option<WidgetId> {
        self.get(id).and_then(|w| w.active)
    }

    pub fn set_active(&mut self, container: WidgetId, child: WidgetId) -> Result<(), PlacementError> {
        if self.parent(child) != Some(container) {
            return Err(PlacementError::NotAttached);
        }
        if let Some(w) = self.get_mut(container) {
            w.active = Some(child);
        }
        Ok(())
    }

    /// Position of `child` in its parent's declaration-order child list.
    pub fn position(&self, child: WidgetId) -> Option<usize> {
        let parent = self.parent(child)?;
        self.children(parent).iter().position(|c| *c == child)
    }

    pub fn is_ancestor(&self, ancestor: WidgetId, mut of: WidgetId) -> bool {
        loop {
            if of == ancestor {
                return true;
            }
            match self.parent(of) {
                Some(p) => of = p,
                None => return false,
            }
        }
    }

    /// Checks whether `child` could be attached to `container`, ignoring where `child` currently
    /// lives (so it can be used to validate moves).
    pub fn check_placement(&self, container: WidgetId, child: WidgetId, catalog: &catalog::Catalog) -> Result<(), PlacementError> {
        let c = self.try_get(container)?;
        let w = self.try_get(child)?;

        if self.is_ancestor(child, container) {
            return Err(PlacementError::WouldCycle);
        }

        if !c.container.accepts_children() {
            return Err(PlacementError::NotAContainer { container: c.class.clone() });
        }

        let accepts = catalog.accepts(&c.class);
        if !accepts.is_empty() && !accepts.iter().any(|a| catalog.is_subclass(&w.class, a)) {
            return Err(PlacementError::ChildRejected { container: c.class.clone(), child: w.class.clone() });
        }

        if let Some(max) = catalog.max_children(&c.class) {
            let others = c.children.iter().filter(|id| **id != child).count();
            if others >= max {
                return Err(PlacementError::ContainerFull { container: c.class.clone(), max });
            }
        }

        Ok(())
    }

    /// Attaches a detached widget at `position` in declaration order.
    pub fn attach(&mut self, child: WidgetId, container: WidgetId, position: usize) -> Result<(), PlacementError> {
        let w = self.try_get(child)?;
        if w.parent.is_some() || self.root == Some(child) {
            return Err(PlacementError::AlreadyAttached);
        }
        if self.is_ancestor(child, container) {
            return Err(PlacementError::WouldCycle);
        }

        let c = self.try_get(container)?;
        if position > c.children.len() {
            return Err(PlacementError::IndexOutOfRange { index: position, len: c.children.len() });
        }

        let switching = c.container.is_switching();
        let c = &mut self.widgets[container.0];
        c.children.insert(position, child);
        if switching && c.active.is_none() {
            c.active = Some(child);
        }

        let w = &mut self.widgets[child.0];
        w.parent = Some(container);
        w.last_parent = Some(container);
        Ok(())
    }

    /// Detaches a widget from its parent, returning its former declaration-order position.
    pub fn detach(&mut self, child: WidgetId) -> Result<usize, PlacementError> {
        let parent = match self.try_get(child)?.parent {
            Some(p) => p,
            None => return Err(PlacementError::NotAttached),
        };

        let position = self.position(child).ok_or(PlacementError::NotAttached)?;
        let p = &mut self.widgets[parent.0];
        p.children.remove(position);
        if p.active == Some(child) {
            p.active = p.children.last().copied();
        }

        self.widgets[child.0].parent = None;
        Ok(position)
    }

    /// Pre-order walk starting at the root.
    pub fn iter(&self) -> impl Iterator<Item = WidgetId> + '_ {
        let mut stack: Vec<WidgetId> = self.root.into_iter().collect();
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            stack.extend(self.children(next).iter().rev());
            Some(next)
        })
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Class names in pre-order with depth, for comparing tree shapes.
    pub fn shape(&self) -> Vec<(usize, String)> {
        let mut out = Vec::new();
        if let Some(root) = self.root {
            self.shape_into(root, 0, &mut out);
        }
        out
    }

    fn shape_into(&self, id: WidgetId, depth: usize, out: &mut Vec<(usize, String)>) {
        if let Some(w) = self.get(id) {
            out.push((depth, w.class.clone()));
            for child in &w.children {
                self.shape_into(*child, depth + 1, out);
            }
        }
    }
}
