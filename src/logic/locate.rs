//! Finding a widget's declaration in markup text from its structural path.

use std::fmt;

use crate::logic::scan;
use crate::model::document::RootRule;
use crate::model::path;

/// Half-open byte range of one widget's whole declaration, children included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextRegion {
    pub start: usize,
    pub end: usize,
}

impl TextRegion {
    pub fn range(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, other: &TextRegion) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// The text no longer lines up with the tree we think it describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocateError {
    RootNotFound { class: String },
    PathOutOfRange { depth: usize, index: usize, siblings: usize },
    ClassMismatch { line: usize, expected: String, found: String },
}

impl fmt::Display for LocateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocateError::RootNotFound { class } => write!(f, "couldn't find the declaration of root {}", class),
            LocateError::PathOutOfRange { depth, index, siblings } => write!(f, "path wants child {} at depth {}, but the text only declares {}", index, depth, siblings),
            LocateError::ClassMismatch { line, expected, found } => write!(f, "expected {} on line {}, found {}", expected, line + 1, found),
        }
    }
}

/// Finds the line that heads the root's block: the `<Name>:` header for a rule, or the top-level
/// `Name:` declaration for the root instance.
pub fn find_root_line(lines: &scan::Lines<'_>, root: &RootRule) -> Result<usize, LocateError> {
    let found = lines.iter().find(|line| {
        if line.indent != 0 {
            return false;
        }
        if root.is_rule {
            line.rule_names().iter().any(|(name, _)| *name == root.class)
        } else {
            line.declared_class() == Some(root.class.as_str())
        }
    });

    found.map(|l| l.number).ok_or_else(|| LocateError::RootNotFound { class: root.class.clone() })
}

/// Indentation of the lines directly inside the block opened on `line`. Taken from the block's
/// first line if it has one, otherwise one step in from `line`.
pub fn block_indent(lines: &scan::Lines<'_>, line: usize) -> usize {
    let parent = match lines.get(line) {
        Some(l) => l,
        None => return 0,
    };

    lines.iter()
        .skip(line + 1)
        .find(|l| l.is_structural())
        .filter(|l| l.indent > parent.indent)
        .map_or(parent.indent + lines.indent_width(), |l| l.indent)
}

/// Line numbers of the child declarations directly inside the block opened on `line`, in
/// declaration order.
pub fn child_declarations(lines: &scan::Lines<'_>, line: usize) -> Vec<usize> {
    let parent_indent = match lines.get(line) {
        Some(l) => l.indent,
        None => return Vec::new(),
    };
    let indent = block_indent(lines, line);

    lines.iter()
        .skip(line + 1)
        .filter(|l| l.is_structural())
        .take_while(|l| l.indent > parent_indent)
        .filter(|l| l.indent == indent && l.declared_class().is_some())
        .map(|l| l.number)
        .collect()
}

/// Follows `path` down from the block opened on `start`, one level per component. Path index 0
/// selects the last child declared at that level.
pub fn find_declaration_line(path: &[usize], lines: &scan::Lines<'_>, start: usize) -> Result<usize, LocateError> {
    let mut line = start;

    for (depth, index) in path.iter().enumerate() {
        let siblings = child_declarations(lines, line);
        if *index >= siblings.len() {
            return Err(LocateError::PathOutOfRange { depth, index: *index, siblings: siblings.len() });
        }
        line = siblings[path::flip(*index, siblings.len())];
    }

    Ok(line)
}

/// Last line belonging to the block opened on `line`: everything more deeply indented. Blank lines
/// and comments that aren't indented past the block's own line are left out.
pub fn block_end_line(lines: &scan::Lines<'_>, line: usize) -> usize {
    let indent = match lines.get(line) {
        Some(l) => l.indent,
        None => return line,
    };

    let mut last = line;
    for l in lines.iter().skip(line + 1) {
        if !l.is_structural() {
            if !l.is_blank() && l.indent > indent {
                last = l.number;
            }
            continue;
        }
        if l.indent <= indent {
            break;
        }
        last = l.number;
    }
    last
}

/// Region of the block opened on `line`, ending after its last line of content. Whatever follows
/// that (blank lines, a comment belonging to an outer block) stays outside.
pub fn line_region(lines: &scan::Lines<'_>, line: usize) -> TextRegion {
    let start = lines.get(line).map_or(lines.text().len(), |l| l.start);
    let end = lines.after(block_end_line(lines, line));

    TextRegion { start, end }
}

/// Declaration line for the widget at `path` under `root`, optionally checking that it declares
/// the class we expect to find there.
pub fn locate(lines: &scan::Lines<'_>, root: &RootRule, path: &[usize], expected_class: Option<&str>) -> Result<usize, LocateError> {
    let root_line = find_root_line(lines, root)?;
    let line = find_declaration_line(path, lines, root_line)?;

    if let Some(expected) = expected_class {
        /* the root line of a rule is its header, which doesn't declare a class of its own */
        let found = match lines.get(line) {
            Some(_) if path.is_empty() && root.is_rule => Some(root.class.as_str()),
            Some(l) => l.declared_class(),
            None => None,
        };

        if found != Some(expected) {
            return Err(LocateError::ClassMismatch {
                line,
                expected: expected.to_string(),
                found: found.unwrap_or("nothing").to_string(),
            });
        }
    }

    Ok(line)
}

pub fn find_region(lines: &scan::Lines<'_>, root: &RootRule, path: &[usize], expected_class: Option<&str>) -> Result<TextRegion, LocateError> {
    let line = locate(lines, root, path, expected_class)?;
    Ok(line_region(lines, line))
}
