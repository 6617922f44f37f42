//! Everything the session talks to but doesn't own the behavior of. Each is handed in at
//! construction so tests and hosts can substitute their own.

use std::path;

use crate::config::Config;
use crate::logic::interpret;
use crate::model::tree::WidgetTree;
use crate::session::history;
use crate::session::watch;

pub use crate::logic::interpret::{MarkupInterpreter, RuleRegistry};

pub trait ProjectFileWatcher {
    /// Adds a file to watch besides the project's markup files.
    fn watch(&mut self, path: &path::Path);

    /// Stops reporting changes until the matching `resume`. Pauses nest.
    fn pause(&mut self);
    fn resume(&mut self);

    /// Files that changed since the last poll. Always empty while paused.
    fn poll(&mut self) -> Vec<path::PathBuf>;
}

pub trait UndoLog {
    fn push(&mut self, operation: history::Operation);

    /// Takes the most recent operation, moving it to the redo stack. The caller applies its inverse.
    fn undo(&mut self) -> Option<history::Operation>;

    /// Takes the most recently undone operation, moving it back to the undo stack. The caller
    /// applies it again.
    fn redo(&mut self) -> Option<history::Operation>;

    fn clear(&mut self);
    fn can_undo(&self) -> bool;
    fn can_redo(&self) -> bool;
}

/// Whatever displays the tree outline.
pub trait TreeView {
    fn refresh(&mut self, tree: &WidgetTree);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullView;

impl TreeView for NullView {
    fn refresh(&mut self, _tree: &WidgetTree) {
    }
}

/// Doesn't watch anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullWatcher;

impl ProjectFileWatcher for NullWatcher {
    fn watch(&mut self, _path: &path::Path) {
    }

    fn pause(&mut self) {
    }

    fn resume(&mut self) {
    }

    fn poll(&mut self) -> Vec<path::PathBuf> {
        Vec::new()
    }
}

pub struct Collaborators {
    pub interpreter: Box<dyn MarkupInterpreter>,
    pub rules: Box<dyn RuleRegistry>,
    pub watcher: Box<dyn ProjectFileWatcher>,
    pub undo_log: Box<dyn UndoLog>,
    pub view: Box<dyn TreeView>,
}

impl Collaborators {
    /// The built-in implementations, configured from `config`.
    pub fn standard(config: &Config) -> Collaborators {
        Collaborators {
            interpreter: Box::new(interpret::BasicInterpreter { indent_width: config.indent_width }),
            rules: Box::new(interpret::ProjectRules::new(config.project_dir.clone(), config.indent_width)),
            watcher: Box::new(watch::ProjectWatcher::new(config.project_dir.clone())),
            undo_log: Box::new(history::History::new(config.undo_depth)),
            view: Box::new(NullView),
        }
    }

    pub fn with_view(mut self, view: Box<dyn TreeView>) -> Collaborators {
        self.view = view;
        self
    }

    pub fn with_watcher(mut self, watcher: Box<dyn ProjectFileWatcher>) -> Collaborators {
        self.watcher = watcher;
        self
    }
}

/// Keeps the watcher paused for as long as it lives, so our own writes aren't reported back to
/// us as external edits.
pub struct WatchPause<'a> {
    watcher: &'a mut dyn ProjectFileWatcher,
}

impl<'a> WatchPause<'a> {
    pub fn new(watcher: &'a mut dyn ProjectFileWatcher) -> WatchPause<'a> {
        watcher.pause();
        WatchPause { watcher }
    }
}

impl<'a> Drop for WatchPause<'a> {
    fn drop(&mut self) {
        self.watcher.resume();
    }
}
