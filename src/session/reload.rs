//! Decides when typing in the markup should turn into a new widget tree.

use std::time;

use tracing::{event, Level};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadState {
    Idle,
    /// The user typed something and the debounce deadline is running.
    Armed,
    /// The next text change is one we made ourselves.
    Suppressed,
}

#[derive(Debug, Clone)]
pub struct ReloadCoordinator {
    delay: time::Duration,
    suppressed: bool,
    /* there is only ever one pending deadline; rearming moves it */
    deadline: Option<time::Instant>,
    reloading: bool,
}

impl ReloadCoordinator {
    pub fn new(delay: time::Duration) -> ReloadCoordinator {
        ReloadCoordinator {
            delay,
            suppressed: false,
            deadline: None,
            reloading: false,
        }
    }

    pub fn state(&self) -> ReloadState {
        if self.suppressed {
            ReloadState::Suppressed
        } else if self.deadline.is_some() {
            ReloadState::Armed
        } else {
            ReloadState::Idle
        }
    }

    pub fn delay(&self) -> time::Duration {
        self.delay
    }

    pub fn deadline(&self) -> Option<time::Instant> {
        self.deadline
    }

    /// Call right before the text is mutated to match the tree.
    pub fn suppress(&mut self) {
        self.suppressed = true;
    }

    /// Withdraws a suppression whose mutation never happened, so it can't swallow the user's next
    /// keystroke.
    pub fn unsuppress(&mut self) {
        self.suppressed = false;
    }

    /// Reports a change to the text.
    pub fn text_changed(&mut self, now: time::Instant) -> ReloadState {
        if self.suppressed {
            self.suppressed = false;
            event!(Level::TRACE, "ignoring self-inflicted text change");
        } else if self.reloading {
            event!(Level::TRACE, "ignoring text change during reload");
        } else {
            self.deadline = Some(now + self.delay);
        }
        self.state()
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Whether the debounce deadline has passed. Fires once per deadline.
    pub fn poll(&mut self, now: time::Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now && !self.reloading => {
                self.deadline = None;
                true
            },
            _ => false,
        }
    }

    /// Marks the start of a re-interpretation. Returns false if one is already underway, in which
    /// case the caller must not start another.
    pub fn begin_reload(&mut self) -> bool {
        if self.reloading {
            return false;
        }
        self.reloading = true;
        self.deadline = None;
        true
    }

    pub fn finish_reload(&mut self) {
        self.reloading = false;
        self.suppressed = false;
    }
}
