use std::collections::BTreeSet;
use std::path;
use std::sync::mpsc;
use std::time;

use notify::event::ModifyKind;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{event, Level};

use crate::session::collab::ProjectFileWatcher;

/// How long after a pause ends notifications are still put down to our own writes. They arrive
/// from the watcher's thread some time after the write that caused them.
pub const SETTLE: time::Duration = time::Duration::from_millis(250);

/* stamped when the watcher's thread hands the event over */
type Stamped = (time::Instant, notify::Result<notify::Event>);

#[derive(Debug, Clone, Copy)]
struct Quiet {
    from: time::Instant,
    until: Option<time::Instant>,
}

impl Quiet {
    fn covers(&self, at: time::Instant) -> bool {
        at >= self.from && self.until.map_or(true, |until| at < until)
    }
}

fn interesting(kind: &EventKind) -> bool {
    match kind {
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_) => true,
        _ => false,
    }
}

fn canonical(path: &path::Path) -> path::PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Reports changes to the project's `.kv` and `.py` files, and to any file registered with
/// `watch`, as the operating system announces them.
pub struct ProjectWatcher {
    inner: Option<RecommendedWatcher>,
    events: mpsc::Receiver<Stamped>,
    project_dir: Option<path::PathBuf>,
    watched: BTreeSet<path::PathBuf>,
    dirs: BTreeSet<path::PathBuf>,
    quiet: Vec<Quiet>,
    paused: usize,
}

impl ProjectWatcher {
    pub fn new(project_dir: Option<path::PathBuf>) -> ProjectWatcher {
        let (tx, rx) = mpsc::channel();

        let inner = RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| {
                let _ = tx.send((time::Instant::now(), res));
            },
            notify::Config::default(),
        );

        let inner = match inner {
            Ok(w) => Some(w),
            Err(e) => {
                event!(Level::WARN, "can't watch files, outside changes won't be noticed: {}", e);
                None
            },
        };

        let mut watcher = ProjectWatcher::with_channel(inner, rx);
        if let Some(dir) = project_dir {
            let dir = canonical(&dir);
            watcher.add_dir(&dir, RecursiveMode::Recursive);
            watcher.project_dir = Some(dir);
        }
        watcher
    }

    fn with_channel(inner: Option<RecommendedWatcher>, events: mpsc::Receiver<Stamped>) -> ProjectWatcher {
        ProjectWatcher {
            inner,
            events,
            project_dir: None,
            watched: BTreeSet::new(),
            dirs: BTreeSet::new(),
            quiet: Vec::new(),
            paused: 0,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused > 0
    }

    fn add_dir(&mut self, dir: &path::Path, mode: RecursiveMode) {
        if !self.dirs.insert(dir.to_path_buf()) {
            return;
        }

        if let Some(inner) = &mut self.inner {
            match inner.watch(dir, mode) {
                Ok(()) => event!(Level::DEBUG, "watching {}", dir.display()),
                Err(e) => event!(Level::WARN, "can't watch {}: {}", dir.display(), e),
            }
        }
    }

    fn is_relevant(&self, path: &path::Path) -> bool {
        self.watched.contains(path) || path.extension().map_or(false, |e| e == "kv" || e == "py")
    }
}

impl ProjectFileWatcher for ProjectWatcher {
    fn watch(&mut self, path: &path::Path) {
        let path = canonical(path);

        /* editors that save by renaming replace the file, so watch the directory it lives in */
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => path::PathBuf::from("."),
        };
        let covered = self.project_dir.as_ref().map_or(false, |p| dir.starts_with(p));
        if !covered {
            self.add_dir(&dir, RecursiveMode::NonRecursive);
        }

        self.watched.insert(path);
    }

    fn pause(&mut self) {
        if self.paused == 0 {
            self.quiet.push(Quiet { from: time::Instant::now(), until: None });
        }
        self.paused+= 1;
    }

    fn resume(&mut self) {
        if self.paused == 0 {
            return;
        }

        self.paused-= 1;
        if self.paused == 0 {
            if let Some(q) = self.quiet.last_mut() {
                q.until = Some(time::Instant::now() + SETTLE);
            }
        }
    }

    fn poll(&mut self) -> Vec<path::PathBuf> {
        if self.is_paused() {
            return Vec::new();
        }

        let mut changed = BTreeSet::new();
        for (at, result) in self.events.try_iter() {
            let ev = match result {
                Ok(ev) => ev,
                Err(e) => {
                    event!(Level::WARN, "file watcher error: {}", e);
                    continue;
                },
            };

            if !interesting(&ev.kind) {
                continue;
            }
            if self.quiet.iter().any(|q| q.covers(at)) {
                event!(Level::TRACE, "ignoring our own change to {:?}", ev.paths);
                continue;
            }

            changed.extend(ev.paths.into_iter().filter(|p| self.is_relevant(p)));
        }

        let now = time::Instant::now();
        self.quiet.retain(|q| q.until.map_or(true, |until| until > now));

        if !changed.is_empty() {
            event!(Level::DEBUG, "{} watched files changed", changed.len());
        }
        changed.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind, RemoveKind};
    use pretty_assertions::assert_eq;

    fn detached() -> (ProjectWatcher, mpsc::Sender<Stamped>) {
        let (tx, rx) = mpsc::channel();
        (ProjectWatcher::with_channel(None, rx), tx)
    }

    fn send(tx: &mpsc::Sender<Stamped>, at: time::Instant, kind: EventKind, path: &str) {
        tx.send((at, Ok(notify::Event::new(kind).add_path(path::PathBuf::from(path))))).unwrap();
    }

    fn modified() -> EventKind {
        EventKind::Modify(ModifyKind::Data(DataChange::Content))
    }

    #[test]
    fn test_keeps_markup_changes() {
        let (mut w, tx) = detached();
        let now = time::Instant::now();

        send(&tx, now, modified(), "/p/a.kv");
        send(&tx, now, EventKind::Create(CreateKind::File), "/p/b.py");
        send(&tx, now, modified(), "/p/notes.txt");
        send(&tx, now, EventKind::Access(AccessKind::Read), "/p/c.kv");
        send(&tx, now, EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions)), "/p/d.kv");
        send(&tx, now, EventKind::Remove(RemoveKind::File), "/p/e.kv");
        send(&tx, now, modified(), "/p/a.kv");
        tx.send((now, Err(notify::Error::generic("overflow")))).unwrap();

        assert_eq!(w.poll(), vec![path::PathBuf::from("/p/a.kv"), path::PathBuf::from("/p/b.py"), path::PathBuf::from("/p/e.kv")]);
        assert_eq!(w.poll(), Vec::<path::PathBuf>::new());
    }

    #[test]
    fn test_registered_files_are_reported() {
        let (mut w, tx) = detached();
        w.watch(path::Path::new("/nowhere/layout.txt"));

        send(&tx, time::Instant::now(), modified(), "/nowhere/layout.txt");
        assert_eq!(w.poll(), vec![path::PathBuf::from("/nowhere/layout.txt")]);
    }

    #[test]
    fn test_pause_hides_own_writes() {
        let (mut w, tx) = detached();

        let before = time::Instant::now();
        std::thread::sleep(time::Duration::from_millis(2));

        w.pause();
        w.pause();
        send(&tx, before, modified(), "/p/earlier.kv");
        send(&tx, time::Instant::now(), modified(), "/p/main.kv");
        assert!(w.poll().is_empty());
        w.resume();
        assert!(w.is_paused());
        w.resume();
        assert!(!w.is_paused());

        /* stragglers from the write still count as ours */
        send(&tx, time::Instant::now(), modified(), "/p/main.kv");
        assert_eq!(w.poll(), vec![path::PathBuf::from("/p/earlier.kv")]);

        send(&tx, time::Instant::now() + SETTLE * 2, modified(), "/p/main.kv");
        assert_eq!(w.poll(), vec![path::PathBuf::from("/p/main.kv")]);
    }

    #[test]
    fn test_sees_real_files() {
        let dir = std::env::temp_dir().join(format!("kvweave-watch-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        let mut w = ProjectWatcher::new(Some(dir.clone()));
        let file = canonical(&dir).join("a.kv");
        std::fs::write(&file, "Label:\n").unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let mut seen = Vec::new();
        for _ in 0..100 {
            seen.extend(w.poll());
            if seen.contains(&file) {
                break;
            }
            std::thread::sleep(time::Duration::from_millis(20));
        }
        assert!(seen.contains(&file));
        assert!(seen.iter().all(|p| p.extension().map_or(false, |e| e == "kv")));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
