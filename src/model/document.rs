use std::ops;
use std::path;

use crate::logic::scan;

/// The live markup buffer for one open file.
#[derive(Clone)]
pub struct MarkupDocument {
    text: String,
    pub path: Option<path::PathBuf>,
    generation: u64, //< bumped on every edit
    saved_generation: u64,
}

/// Which widget the canvas is showing: the document's root instance, or the body of a named rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootRule {
    pub class: String,
    pub is_rule: bool,
}

impl RootRule {
    pub fn instance(class: &str) -> RootRule {
        RootRule { class: class.to_string(), is_rule: false }
    }

    pub fn rule(class: &str) -> RootRule {
        RootRule { class: class.to_string(), is_rule: true }
    }
}

impl MarkupDocument {
    pub fn new(text: impl Into<String>) -> MarkupDocument {
        MarkupDocument {
            text: text.into(),
            path: None,
            generation: 0,
            saved_generation: 0,
        }
    }

    pub fn load<P: AsRef<path::Path>>(path: P) -> Result<MarkupDocument, std::io::Error> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let mut doc = MarkupDocument::new(text);
        doc.path = Some(path.as_ref().to_path_buf());
        Ok(doc)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_dirty(&self) -> bool {
        self.generation != self.saved_generation
    }

    pub fn lines(&self, indent_width: usize) -> scan::Lines<'_> {
        scan::Lines::new(&self.text, indent_width)
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.generation+= 1;
    }

    pub fn splice(&mut self, range: ops::Range<usize>, with: &str) {
        self.text.replace_range(range, with);
        self.generation+= 1;
    }

    pub fn insert(&mut self, at: usize, text: &str) {
        self.splice(at..at, text);
    }

    pub fn slice(&self, range: ops::Range<usize>) -> &str {
        &self.text[range]
    }

    /// Records that the buffer matches its backing file, e.g. after re-reading it from disk.
    pub fn mark_saved(&mut self) {
        self.saved_generation = self.generation;
    }

    /// Writes the buffer to its backing file. The caller is responsible for muting any file
    /// watcher first.
    pub fn save(&mut self) -> Result<(), std::io::Error> {
        match &self.path {
            Some(path) => std::fs::write(path, &self.text)?,
            None => return Err(std::io::Error::new(std::io::ErrorKind::NotFound, "document has no backing file")),
        }
        self.saved_generation = self.generation;
        Ok(())
    }
}

impl std::fmt::Debug for MarkupDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkupDocument")
            .field("generation", &self.generation)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
