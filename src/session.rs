//! The editing session: one markup document, the widget tree it describes, and the plumbing that
//! keeps the two in step.
//!
//! Tree edits (adding, removing, moving widgets, setting properties) change the tree first and
//! then patch the text to match, telling the reload coordinator to ignore the resulting text
//! change. Text edits go the other way: they arm the coordinator, and once typing stops the whole
//! document is re-interpreted into a fresh tree. A failed re-interpretation leaves the old tree in
//! place.

use std::ops;
use std::time;

use bitflags::bitflags;
use tracing::{event, instrument, Level};

pub mod collab;
pub mod drag;
pub mod error;
pub mod history;
pub mod reload;
pub mod watch;

use crate::config::Config;
use crate::logic::interpret::{ParsedDocument, ParsedWidget};
use crate::logic::locate;
use crate::logic::mutate::{MutateError, TextMutator};
use crate::model::catalog::Catalog;
use crate::model::document::{MarkupDocument, RootRule};
use crate::model::path;
use crate::model::property::PropertyValue;
use crate::model::tree::{PlacementError, WidgetId, WidgetTree};
use crate::util;

use collab::{Collaborators, MarkupInterpreter, ProjectFileWatcher, RuleRegistry, TreeView, UndoLog};
use error::{Action, Trouble};
use history::Operation;
use reload::{ReloadCoordinator, ReloadState};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EditFlags: u8 {
        /// The text already says this, so only the tree changes. Used for changes that came from
        /// the text in the first place.
        const TEXT_SYNCED = 1 << 0;
        /// Replaying history; don't record the edit again.
        const REPLAY = 1 << 1;
    }
}

/// Runs a text mutation with the coordinator told to expect the change it makes.
fn guarded<T>(coordinator: &mut ReloadCoordinator, document: &mut MarkupDocument, edit: impl FnOnce(&mut MarkupDocument) -> Result<T, MutateError>) -> Result<T, MutateError> {
    let generation = document.generation();
    coordinator.suppress();
    let result = edit(document);
    if document.generation() != generation {
        coordinator.text_changed(time::Instant::now());
    } else {
        coordinator.unsuppress();
    }
    result
}

fn build_widget(tree: &mut WidgetTree, catalog: &Catalog, parsed: &ParsedWidget) -> Result<WidgetId, PlacementError> {
    let id = tree.create(&parsed.class, catalog);

    if let Some(widget) = tree.get_mut(id) {
        for (name, text) in &parsed.properties {
            let kind = catalog.property_kind(&parsed.class, name);
            widget.properties.insert(name.clone(), PropertyValue::from_markup(kind, text));
        }
    }

    /* the text is the authority here, so the catalog's placement rules aren't consulted */
    for (position, child) in parsed.children.iter().enumerate() {
        let child = build_widget(tree, catalog, child)?;
        tree.attach(child, id, position)?;
    }

    Ok(id)
}

pub struct Session {
    config: Config,
    document: MarkupDocument,
    tree: WidgetTree,
    root_rule: Option<RootRule>,
    catalog: Catalog,

    mutator: TextMutator,
    coordinator: ReloadCoordinator,

    interpreter: Box<dyn MarkupInterpreter>,
    rules: Box<dyn RuleRegistry>,
    watcher: Box<dyn ProjectFileWatcher>,
    undo_log: Box<dyn UndoLog>,
    view: Box<dyn TreeView>,

    status: Option<error::Status>,
    reload_failed: bool,
}

impl Session {
    /// A session with the built-in collaborators and the built-in catalog, extended by the
    /// configured catalog file if there is one.
    pub fn new(config: Config) -> Session {
        let mut catalog = Catalog::builtin();
        if let Some(extra) = &config.catalog {
            if let Err(e) = catalog.merge_file(extra) {
                event!(Level::WARN, "couldn't load widget catalog {}: {:?}", extra.display(), e);
            }
        }

        let collaborators = Collaborators::standard(&config);
        Session::with_collaborators(config, catalog, collaborators)
    }

    pub fn with_collaborators(config: Config, catalog: Catalog, collaborators: Collaborators) -> Session {
        Session {
            document: MarkupDocument::new(""),
            tree: WidgetTree::new(),
            root_rule: None,
            catalog,

            mutator: TextMutator::new(config.indent_width),
            coordinator: ReloadCoordinator::new(config.reload_delay()),

            interpreter: collaborators.interpreter,
            rules: collaborators.rules,
            watcher: collaborators.watcher,
            undo_log: collaborators.undo_log,
            view: collaborators.view,

            status: None,
            reload_failed: false,

            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn document(&self) -> &MarkupDocument {
        &self.document
    }

    pub fn tree(&self) -> &WidgetTree {
        &self.tree
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn root(&self) -> Option<WidgetId> {
        self.tree.root()
    }

    pub fn root_rule(&self) -> Option<&RootRule> {
        self.root_rule.as_ref()
    }

    pub fn reload_state(&self) -> ReloadState {
        self.coordinator.state()
    }

    pub fn reload_deadline(&self) -> Option<time::Instant> {
        self.coordinator.deadline()
    }

    /// The last problem reported to the user, cleared by the next successful reload.
    pub fn status(&self) -> Option<&error::Status> {
        self.status.as_ref()
    }

    /// Whether the last attempt to re-interpret the text failed.
    pub fn reload_failed(&self) -> bool {
        self.reload_failed
    }

    pub fn can_undo(&self) -> bool {
        self.undo_log.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.undo_log.can_redo()
    }

    pub fn named_rules(&self) -> std::collections::BTreeSet<String> {
        self.rules.list_named_rules()
    }

    pub fn path_of(&self, widget: WidgetId) -> path::Path {
        path::compute_path(&self.tree, widget)
    }

    pub fn widget_at(&self, at: &[usize]) -> Option<WidgetId> {
        path::resolve_path(&self.tree, self.tree.root()?, at)
    }

    /// Whether the widget is part of the displayed tree, as opposed to detached or never placed.
    pub fn is_live(&self, widget: WidgetId) -> bool {
        match self.tree.root() {
            Some(root) => self.tree.is_ancestor(root, widget),
            None => false,
        }
    }

    pub fn is_allowed_target(&self, target: WidgetId, widget: WidgetId) -> bool {
        self.tree.check_placement(target, widget, &self.catalog).is_ok()
    }

    fn report(&mut self, error: error::Error) -> error::Error {
        match error.level {
            error::Level::Warning => event!(Level::WARN, "{}", error),
            error::Level::Error => event!(Level::ERROR, "{}", error),
        }
        self.status = Some(error.status());
        error
    }

    fn class_of(&self, widget: WidgetId) -> Result<String, Trouble> {
        self.tree.class(widget).map(str::to_string).ok_or(Trouble::NoSuchWidget(widget))
    }

    /// Root the text edits are anchored on, unless the edit doesn't touch the text.
    fn text_root(&self, flags: EditFlags) -> Result<Option<RootRule>, Trouble> {
        if flags.contains(EditFlags::TEXT_SYNCED) {
            Ok(None)
        } else {
            self.root_rule.clone().map(Some).ok_or(Trouble::NoRoot)
        }
    }

    /// Makes a new, detached widget. It joins the tree through `add_child`.
    pub fn create_widget(&mut self, class: &str) -> WidgetId {
        self.tree.create(class, &self.catalog)
    }

    /// Attaches `widget` under `parent` at path index `index` (0, the default, is after every
    /// existing child), or makes it the root if `parent` is None.
    pub fn add_child(&mut self, widget: WidgetId, parent: Option<WidgetId>, index: Option<usize>, flags: EditFlags) -> Result<(), error::Error> {
        self.attach_widget(widget, parent, index.unwrap_or(0), None, flags)
            .map_err(|t| self.report(error::Error::new(Action::AddChild, t)))
    }

    /// Builds a widget from a block of markup (typically something cut earlier) and adds it the
    /// same way `add_child` does, writing the block itself rather than a stub.
    pub fn add_child_from_text(&mut self, literal: &str, parent: Option<WidgetId>, index: Option<usize>, flags: EditFlags) -> Result<WidgetId, error::Error> {
        self.paste(literal, parent, index.unwrap_or(0), flags)
            .map_err(|t| self.report(error::Error::new(Action::AddChild, t)))
    }

    fn paste(&mut self, literal: &str, parent: Option<WidgetId>, index: usize, flags: EditFlags) -> Result<WidgetId, Trouble> {
        let literal = util::reindent(literal, 0);
        let parsed = self.interpreter.parse(&literal)?;
        let body = parsed.root.ok_or_else(|| Trouble::Other("the text doesn't declare a widget".to_string()))?;

        let widget = build_widget(&mut self.tree, &self.catalog, &body)?;
        self.attach_widget(widget, parent, index, Some(&literal), flags)?;
        Ok(widget)
    }

    fn attach_widget(&mut self, widget: WidgetId, parent: Option<WidgetId>, index: usize, literal: Option<&str>, flags: EditFlags) -> Result<(), Trouble> {
        let class = self.class_of(widget)?;
        let mutator = self.mutator;

        match parent {
            None => {
                if self.tree.root().is_some() {
                    return Err(PlacementError::RootOccupied.into());
                }
                self.tree.set_root(Some(widget))?;

                if flags.contains(EditFlags::TEXT_SYNCED) {
                    if self.root_rule.is_none() {
                        self.root_rule = Some(RootRule::instance(&class));
                    }
                } else {
                    match guarded(&mut self.coordinator, &mut self.document, |doc| mutator.insert_root(doc, &class, literal)) {
                        Ok(root_rule) => self.root_rule = Some(root_rule),
                        Err(e) => {
                            self.tree.set_root(None)?;
                            return Err(e.into());
                        },
                    }
                }
            },
            Some(parent) => {
                let root_rule = self.text_root(flags)?;
                if !self.is_live(parent) {
                    return Err(PlacementError::NotAttached.into());
                }
                self.tree.check_placement(parent, widget, &self.catalog)?;

                let len = self.tree.children(parent).len();
                if index > len {
                    return Err(PlacementError::IndexOutOfRange { index, len }.into());
                }
                self.tree.attach(widget, parent, len - index)?;

                if let Some(root_rule) = root_rule {
                    let parent_path = path::compute_path(&self.tree, parent);
                    let parent_class = self.tree.class(parent).map(str::to_string);
                    let result = guarded(&mut self.coordinator, &mut self.document, |doc| {
                        mutator.insert_child(doc, &root_rule, &parent_path, parent_class.as_deref(), &class, literal, index)
                    });

                    if let Err(e) = result {
                        self.tree.detach(widget)?;
                        return Err(e.into());
                    }
                }
            },
        }

        if !flags.contains(EditFlags::REPLAY) {
            self.undo_log.push(Operation::Add { widget, parent, index, text: literal.map(str::to_string) });
        }

        event!(Level::DEBUG, "added {} {} at {}", class, widget, path::format(&self.path_of(widget)));
        self.view.refresh(&self.tree);
        Ok(())
    }

    /// Takes `widget` (and everything under it) out of the tree and the text. Returns the text
    /// that was cut, which is None if nothing was written (the widget is the body of a rule, or the
    /// text was already in sync).
    pub fn remove_child(&mut self, widget: WidgetId, flags: EditFlags) -> Result<Option<String>, error::Error> {
        self.detach_widget(widget, flags)
            .map_err(|t| self.report(error::Error::new(Action::RemoveChild, t)))
    }

    fn detach_widget(&mut self, widget: WidgetId, flags: EditFlags) -> Result<Option<String>, Trouble> {
        let class = self.class_of(widget)?;
        let root_rule = self.text_root(flags)?;
        let parent = self.tree.parent(widget);
        if !self.is_live(widget) {
            return Err(PlacementError::NotAttached.into());
        }

        /* computed before the tree changes, since that's what the text still describes */
        let at = path::compute_path(&self.tree, widget);
        let index = at.last().copied().unwrap_or(0);

        let position = match parent {
            Some(_) => Some(self.tree.detach(widget)?),
            None => {
                self.tree.set_root(None)?;
                None
            },
        };

        let removed = match root_rule {
            Some(root_rule) => {
                let mutator = self.mutator;
                let rules = &*self.rules;
                let result = guarded(&mut self.coordinator, &mut self.document, |doc| {
                    mutator.remove_child(doc, &root_rule, rules, &at, Some(&class))
                });

                match result {
                    Ok(removed) => removed,
                    Err(e) => {
                        match (parent, position) {
                            (Some(parent), Some(position)) => self.tree.attach(widget, parent, position)?,
                            _ => self.tree.set_root(Some(widget))?,
                        }
                        return Err(e.into());
                    },
                }
            },
            None => None,
        };

        if parent.is_none() && removed.is_some() {
            self.root_rule = None;
        }

        if !flags.contains(EditFlags::REPLAY) {
            self.undo_log.push(Operation::Remove { widget, parent, index, text: removed.clone() });
        }

        event!(Level::DEBUG, "removed {} {} from {}", class, widget, path::format(&at));
        self.view.refresh(&self.tree);
        Ok(removed)
    }

    /// Moves an attached widget to path index `index` under `new_parent`, which may be its current
    /// parent.
    pub fn move_child(&mut self, widget: WidgetId, new_parent: WidgetId, index: usize, flags: EditFlags) -> Result<(), error::Error> {
        self.move_widget(widget, new_parent, index, flags)
            .map_err(|t| self.report(error::Error::new(Action::MoveChild, t)))
    }

    fn move_widget(&mut self, widget: WidgetId, new_parent: WidgetId, index: usize, flags: EditFlags) -> Result<(), Trouble> {
        let class = self.class_of(widget)?;
        let root_rule = self.text_root(flags)?;
        let old_parent = self.tree.parent(widget).ok_or(PlacementError::NotAttached)?;
        if !self.is_live(widget) || !self.is_live(new_parent) {
            return Err(PlacementError::NotAttached.into());
        }
        self.tree.check_placement(new_parent, widget, &self.catalog)?;

        let old_path = path::compute_path(&self.tree, widget);
        let old_index = old_path.last().copied().unwrap_or(0);
        if old_parent == new_parent && old_index == index {
            return Ok(());
        }

        let old_position = self.tree.detach(widget)?;
        let len = self.tree.children(new_parent).len();
        if index > len {
            self.tree.attach(widget, old_parent, old_position)?;
            return Err(PlacementError::IndexOutOfRange { index, len }.into());
        }
        self.tree.attach(widget, new_parent, len - index)?;

        if let Some(root_rule) = root_rule {
            let mutator = self.mutator;
            let parent_path = path::compute_path(&self.tree, new_parent);
            let parent_class = self.tree.class(new_parent).map(str::to_string);

            let result = guarded(&mut self.coordinator, &mut self.document, |doc| {
                if old_parent == new_parent {
                    mutator.shift_child(doc, &root_rule, &parent_path, parent_class.as_deref(), Some(&class), old_index, index)
                } else {
                    mutator.relocate(doc, &root_rule, &old_path, Some(&class), &parent_path, parent_class.as_deref(), index)
                }
            });

            if let Err(e) = result {
                self.tree.detach(widget)?;
                self.tree.attach(widget, old_parent, old_position)?;
                return Err(e.into());
            }
        }

        if !flags.contains(EditFlags::REPLAY) {
            self.undo_log.push(Operation::Move { widget, from_parent: old_parent, from_index: old_index, to_parent: new_parent, to_index: index });
        }

        event!(Level::DEBUG, "moved {} {} from {} to {}", class, widget, path::format(&old_path), path::format(&self.path_of(widget)));
        self.view.refresh(&self.tree);
        Ok(())
    }

    /// Sets a property on a widget in the tree and in its declaration. Returns whether anything
    /// changed.
    pub fn set_property(&mut self, widget: WidgetId, name: &str, value: PropertyValue, flags: EditFlags) -> Result<bool, error::Error> {
        self.write_property(widget, name, Some(value), flags)
            .map_err(|t| self.report(error::Error::new(Action::SetProperty, t)))
    }

    /// Drops a property back to its default, deleting its line from the declaration.
    pub fn clear_property(&mut self, widget: WidgetId, name: &str, flags: EditFlags) -> Result<bool, error::Error> {
        self.write_property(widget, name, None, flags)
            .map_err(|t| self.report(error::Error::new(Action::SetProperty, t)))
    }

    fn write_property(&mut self, widget: WidgetId, name: &str, value: Option<PropertyValue>, flags: EditFlags) -> Result<bool, Trouble> {
        let class = self.class_of(widget)?;
        let root_rule = self.text_root(flags)?;
        if !self.is_live(widget) {
            return Err(PlacementError::NotAttached.into());
        }

        let properties = &mut self.tree.get_mut(widget).ok_or(Trouble::NoSuchWidget(widget))?.properties;
        let old = properties.get(name).cloned();
        if old == value {
            return Ok(false);
        }
        match &value {
            Some(v) => properties.insert(name.to_string(), v.clone()),
            None => properties.remove(name),
        };

        if let Some(root_rule) = root_rule {
            let mutator = self.mutator;
            let at = path::compute_path(&self.tree, widget);
            let result = guarded(&mut self.coordinator, &mut self.document, |doc| match &value {
                Some(v) => mutator.set_property_text(doc, &root_rule, &at, Some(&class), name, v),
                None => mutator.remove_property_text(doc, &root_rule, &at, Some(&class), name),
            });

            if let Err(e) = result {
                if let Some(w) = self.tree.get_mut(widget) {
                    match &old {
                        Some(v) => w.properties.insert(name.to_string(), v.clone()),
                        None => w.properties.remove(name),
                    };
                }
                return Err(e.into());
            }
        }

        if !flags.contains(EditFlags::REPLAY) {
            self.undo_log.push(Operation::SetProperty { widget, name: name.to_string(), old, new: value });
        }

        self.view.refresh(&self.tree);
        Ok(true)
    }

    /// The property's value in the tree, falling back to the catalog's default for the class.
    pub fn property(&self, widget: WidgetId, name: &str) -> Option<PropertyValue> {
        let w = self.tree.get(widget)?;
        if let Some(value) = w.properties.get(name) {
            return Some(value.clone());
        }

        let descriptor = self.catalog.property(&w.class, name)?;
        descriptor.default.as_deref().map(|d| PropertyValue::from_markup(descriptor.kind, d))
    }

    /// The property's value as currently written in the widget's declaration.
    pub fn get_property_text(&mut self, widget: WidgetId, name: &str) -> Result<Option<String>, error::Error> {
        self.property_text(widget, name)
            .map_err(|t| self.report(error::Error::new(Action::GetProperty, t)))
    }

    fn property_text(&self, widget: WidgetId, name: &str) -> Result<Option<String>, Trouble> {
        let class = self.class_of(widget)?;
        let root_rule = self.root_rule.as_ref().ok_or(Trouble::NoRoot)?;
        let at = path::compute_path(&self.tree, widget);
        Ok(self.mutator.get_property_text(&self.document, root_rule, &at, Some(&class), name)?)
    }

    /// Replaces the whole text the way an editor keystroke would, arming the reload timer.
    pub fn user_edit(&mut self, text: &str, now: time::Instant) -> ReloadState {
        self.document.set_text(text);
        self.coordinator.text_changed(now)
    }

    pub fn user_splice(&mut self, range: ops::Range<usize>, with: &str, now: time::Instant) -> ReloadState {
        self.document.splice(range, with);
        self.coordinator.text_changed(now)
    }

    /// Drives the debounce timer. Returns the outcome of a reload if one was due.
    pub fn tick(&mut self, now: time::Instant) -> Option<Result<bool, error::Error>> {
        if self.coordinator.poll(now) {
            Some(self.force_reload(false))
        } else {
            None
        }
    }

    /// Re-interprets the text now, without waiting for the debounce. With `rescan`, the project's
    /// rules are re-read first. Returns false if a reload was already underway.
    #[instrument(skip(self))]
    pub fn force_reload(&mut self, rescan: bool) -> Result<bool, error::Error> {
        if !self.coordinator.begin_reload() {
            event!(Level::DEBUG, "reload already in progress");
            return Ok(false);
        }

        if rescan {
            if let Err(e) = self.rules.rescan() {
                event!(Level::WARN, "couldn't rescan project rules: {}", e);
            }
        }

        let result = match self.interpreter.parse(self.document.text()) {
            Ok(parsed) => self.rebuild(parsed),
            Err(e) => Err(Trouble::from(e)),
        };
        self.coordinator.finish_reload();

        match result {
            Ok(()) => {
                self.reload_failed = false;
                self.status = None;
                Ok(true)
            },
            Err(t) => {
                self.reload_failed = true;
                Err(self.report(error::Error::new(Action::ReloadFromText, t)))
            },
        }
    }

    /// Which widget to display: the selected rule if it still exists, then the root instance, then
    /// the first rule.
    fn choose_root<'p>(&self, parsed: &'p ParsedDocument) -> Option<(RootRule, &'p ParsedWidget)> {
        if let Some(RootRule { class, is_rule: true }) = &self.root_rule {
            if let Some(rule) = parsed.rule(class) {
                return Some((RootRule::rule(class), &rule.body));
            }
        }

        match (&parsed.root, parsed.rules.first()) {
            (Some(root), _) => Some((RootRule::instance(&root.class), root)),
            (None, Some(rule)) => Some((RootRule::rule(&rule.name), &rule.body)),
            (None, None) => None,
        }
    }

    fn rebuild(&mut self, parsed: ParsedDocument) -> Result<(), Trouble> {
        self.rules.update_from_document(&parsed);

        let mut catalog = self.catalog.clone();
        catalog.forget_rules();
        for name in self.rules.list_named_rules() {
            catalog.register_rule(&name, None);
        }
        for rule in &parsed.rules {
            catalog.register_rule(&rule.name, rule.base.as_deref());
        }

        let mut tree = WidgetTree::new();
        let root_rule = match self.choose_root(&parsed) {
            Some((root_rule, body)) => {
                let root = build_widget(&mut tree, &catalog, body)?;
                tree.set_root(Some(root))?;
                Some(root_rule)
            },
            None => None,
        };

        /* ids from the old tree mean nothing in the new one */
        self.undo_log.clear();
        self.catalog = catalog;
        self.tree = tree;
        self.root_rule = root_rule;

        event!(Level::INFO, "reloaded {} widgets", self.tree.len());
        self.view.refresh(&self.tree);
        Ok(())
    }

    /// Switches the displayed root to a named rule or to the root instance.
    pub fn select_root(&mut self, root_rule: RootRule) -> Result<bool, error::Error> {
        if let Err(e) = locate::find_root_line(&self.document.lines(self.config.indent_width), &root_rule) {
            return Err(self.report(error::Error::new(Action::SelectRoot, MutateError::Locate(e))));
        }

        self.root_rule = Some(root_rule);
        self.force_reload(false)
    }

    /// Replaces the document with text that didn't come from a file.
    pub fn load_text(&mut self, text: &str) -> Result<bool, error::Error> {
        self.document = MarkupDocument::new(text);
        self.root_rule = None;
        self.coordinator.cancel();
        self.force_reload(true)
    }

    pub fn open<P: AsRef<std::path::Path>>(&mut self, file: P) -> Result<bool, error::Error> {
        let document = match MarkupDocument::load(file.as_ref()) {
            Ok(document) => document,
            Err(e) => return Err(self.report(error::Error::new(Action::OpenDocument, e))),
        };

        event!(Level::INFO, "opened {}", file.as_ref().display());
        self.watcher.watch(file.as_ref());
        self.document = document;
        self.root_rule = None;
        self.coordinator.cancel();
        self.force_reload(true)
    }

    /// Writes the document to its file, with the project watcher paused so the write doesn't
    /// come back as an external change.
    pub fn save(&mut self) -> Result<(), error::Error> {
        let result = {
            let _pause = collab::WatchPause::new(&mut *self.watcher);
            self.document.save()
        };

        match result {
            Ok(()) => {
                event!(Level::INFO, "saved {:?}", self.document.path);
                Ok(())
            },
            Err(e) => Err(self.report(error::Error::new(Action::SaveDocument, e))),
        }
    }

    pub fn save_as<P: AsRef<std::path::Path>>(&mut self, file: P) -> Result<(), error::Error> {
        self.document.path = Some(file.as_ref().to_path_buf());
        self.save()?;
        self.watcher.watch(file.as_ref());
        Ok(())
    }

    /// Checks the watcher for changes made outside the session. A change to the open file
    /// replaces the text with what's on disk; a change to any other project file may have
    /// changed the available rules. Either way the tree is rebuilt.
    pub fn poll_external(&mut self) -> Result<bool, error::Error> {
        let changed = self.watcher.poll();
        if changed.is_empty() {
            return Ok(false);
        }

        let own = self.document.path.as_ref().map_or(false, |p| {
            let p = std::fs::canonicalize(p).unwrap_or_else(|_| p.clone());
            changed.contains(&p)
        });
        if own {
            let file = self.document.path.clone().unwrap_or_default();
            match std::fs::read_to_string(&file) {
                Ok(text) => {
                    if self.document.is_dirty() {
                        event!(Level::WARN, "{} changed on disk; discarding unsaved edits", file.display());
                    }
                    self.document.set_text(text);
                    self.document.mark_saved();
                    self.coordinator.cancel();
                },
                Err(e) => return Err(self.report(error::Error::new(Action::WatchProject, e))),
            }
        }

        self.force_reload(true)
    }

    fn apply(&mut self, operation: Operation) -> Result<(), Trouble> {
        match operation {
            Operation::Add { widget, parent, index, text } => self.attach_widget(widget, parent, index, text.as_deref(), EditFlags::REPLAY),
            Operation::Remove { widget, .. } => self.detach_widget(widget, EditFlags::REPLAY).map(|_| ()),
            Operation::Move { widget, to_parent, to_index, .. } => self.move_widget(widget, to_parent, to_index, EditFlags::REPLAY),
            Operation::SetProperty { widget, name, new, .. } => self.write_property(widget, &name, new, EditFlags::REPLAY).map(|_| ()),
        }
    }

    /// Reverses the most recent tree edit. Returns false if there was nothing to undo.
    pub fn undo(&mut self) -> Result<bool, error::Error> {
        let operation = match self.undo_log.undo() {
            Some(operation) => operation,
            None => return Ok(false),
        };

        match self.apply(operation.inverse()) {
            Ok(()) => Ok(true),
            Err(t) => {
                /* the log no longer describes the tree */
                self.undo_log.clear();
                Err(self.report(error::Error::new(Action::Undo, t)))
            },
        }
    }

    pub fn redo(&mut self) -> Result<bool, error::Error> {
        let operation = match self.undo_log.redo() {
            Some(operation) => operation,
            None => return Ok(false),
        };

        match self.apply(operation) {
            Ok(()) => Ok(true),
            Err(t) => {
                self.undo_log.clear();
                Err(self.report(error::Error::new(Action::Redo, t)))
            },
        }
    }
}
