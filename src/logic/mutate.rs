//! Targeted edits to markup text that keep it describing the same tree as the in-memory model.
//!
//! None of these re-interpret the document. Each one locates what it needs from a fresh line scan,
//! computes a single splice, and leaves every byte it doesn't have to touch alone.

use std::fmt;

use tracing::{event, Level};

use crate::logic::interpret::RuleRegistry;
use crate::logic::locate;
use crate::logic::locate::{LocateError, TextRegion};
use crate::logic::scan;
use crate::model::document::{MarkupDocument, RootRule};
use crate::model::path;
use crate::model::property::PropertyValue;
use crate::util;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutateError {
    Locate(LocateError),
    LineOutOfRange { line: usize },
    IndexOutOfRange { index: usize, len: usize },
    RootAlreadyPresent { class: String },
}

impl From<LocateError> for MutateError {
    fn from(e: LocateError) -> MutateError {
        MutateError::Locate(e)
    }
}

impl fmt::Display for MutateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutateError::Locate(e) => write!(f, "{}", e),
            MutateError::LineOutOfRange { line } => write!(f, "line {} is past the end of the document", line + 1),
            MutateError::IndexOutOfRange { index, len } => write!(f, "can't insert at index {} among {} children", index, len),
            MutateError::RootAlreadyPresent { class } => write!(f, "the document already has a root ({})", class),
        }
    }
}

fn line<'l, 'a>(lines: &'l scan::Lines<'a>, number: usize) -> Result<&'l scan::Line<'a>, MutateError> {
    lines.get(number).ok_or(MutateError::LineOutOfRange { line: number })
}

/// Where a colon needs to go if a declaration is about to grow a block.
fn missing_colon(line: &scan::Line<'_>) -> Option<usize> {
    match line.kind {
        scan::LineKind::Declaration { opens_block: false, .. } => Some(line.content_end),
        _ => None,
    }
}

struct PropertySpan<'a> {
    line: usize,
    colon: usize,
    /* first byte of the value on the property's own line */
    value_start: usize,
    /* end of the value, including continuation lines */
    value_end: usize,
    first: &'a str,
    continued: bool,
}

fn find_property<'a>(lines: &scan::Lines<'a>, decl: usize, name: &str) -> Option<PropertySpan<'a>> {
    let decl_indent = lines.get(decl)?.indent;
    let indent = locate::block_indent(lines, decl);

    let l = lines.iter()
        .skip(decl + 1)
        .filter(|l| l.is_structural())
        .take_while(|l| l.indent > decl_indent)
        .find(|l| l.indent == indent && l.property().map_or(false, |(n, _)| n == name))?;
    let (_, first) = l.property()?;

    let colon = l.content_start + l.content.find(':')?;
    let after = &lines.text()[colon + 1..l.end];
    let value_start = colon + 1 + after.len() - after.trim_start_matches([' ', '\t']).len();

    let last = locate::block_end_line(lines, l.number);
    let (value_end, continued) = if last > l.number {
        (lines.get(last)?.end, true)
    } else {
        (l.content_end, false)
    };

    Some(PropertySpan { line: l.number, colon, value_start, value_end, first, continued })
}

#[derive(Debug, Clone, Copy)]
pub struct TextMutator {
    pub indent_width: usize,
}

impl TextMutator {
    pub fn new(indent_width: usize) -> TextMutator {
        TextMutator { indent_width }
    }

    fn declares_rule(&self, doc: &MarkupDocument, class: &str) -> bool {
        locate::find_root_line(&doc.lines(self.indent_width), &RootRule::rule(class)).is_ok()
    }

    /// Makes `class` the root of the document. A class with its own rule in this document becomes
    /// the root without any text changing; anything else gets its declaration (`literal`, or a bare
    /// `Class:`) after the leading directives.
    pub fn insert_root(&self, doc: &mut MarkupDocument, class: &str, literal: Option<&str>) -> Result<RootRule, MutateError> {
        if self.declares_rule(doc, class) {
            event!(Level::DEBUG, "{} is declared as a rule, editing its body as the root", class);
            return Ok(RootRule::rule(class));
        }

        let at = {
            let lines = doc.lines(self.indent_width);
            if let Some(existing) = lines.iter().filter(|l| l.indent == 0).find_map(|l| l.declared_class()) {
                return Err(MutateError::RootAlreadyPresent { class: existing.to_string() });
            }

            let mut at = 0;
            for l in lines.iter() {
                match l.kind {
                    scan::LineKind::Directive => at = l.next,
                    scan::LineKind::Blank | scan::LineKind::Comment => continue,
                    _ => break,
                }
            }
            at
        };

        let mut text = match literal.map(|l| util::reindent(l, 0)) {
            Some(l) if !l.is_empty() => l,
            _ => format!("{}:\n", class),
        };
        if at > 0 && !doc.text()[..at].ends_with('\n') {
            text.insert(0, '\n');
        }
        doc.insert(at, &text);

        event!(Level::DEBUG, "declared new root {}", class);
        Ok(RootRule::instance(class))
    }

    /// Places `block` among the children of the declaration on `parent_line` so that it ends up
    /// with path index `index` there.
    fn insert_block(&self, doc: &mut MarkupDocument, parent_line: usize, index: usize, block: &str) -> Result<TextRegion, MutateError> {
        let (at, text, colon) = {
            let lines = doc.lines(self.indent_width);
            let parent = line(&lines, parent_line)?;
            let siblings = locate::child_declarations(&lines, parent_line);
            if index > siblings.len() {
                return Err(MutateError::IndexOutOfRange { index, len: siblings.len() });
            }

            let mut text = util::reindent(block, locate::block_indent(&lines, parent_line));
            let at = if index == 0 {
                let anchor = siblings.last().copied().unwrap_or(parent_line);
                let last = line(&lines, locate::block_end_line(&lines, anchor))?;
                if last.next == last.end {
                    /* final line of a document with no trailing line break */
                    text.insert(0, '\n');
                }
                last.next
            } else {
                line(&lines, siblings[siblings.len() - index])?.start
            };

            (at, text, missing_colon(parent))
        };

        doc.insert(at, &text);

        let mut start = at;
        let mut len = text.len();
        if text.starts_with('\n') {
            start+= 1;
            len-= 1;
        }

        /* the colon always sits before the insertion point */
        if let Some(colon) = colon {
            doc.insert(colon, ":");
            start+= 1;
        }

        Ok(TextRegion { start, end: start + len })
    }

    /// Adds a child declaration under the widget at `parent_path`. `literal` is the full text of
    /// the new block; without it a bare `Class:` stub is written.
    #[allow(clippy::too_many_arguments)]
    pub fn insert_child(&self, doc: &mut MarkupDocument, root: &RootRule, parent_path: &[usize], parent_class: Option<&str>, class: &str, literal: Option<&str>, index: usize) -> Result<TextRegion, MutateError> {
        let parent_line = locate::locate(&doc.lines(self.indent_width), root, parent_path, parent_class)?;

        let stub = format!("{}:", class);
        let block = literal.filter(|l| !l.trim().is_empty()).unwrap_or(stub.as_str());
        let region = self.insert_block(doc, parent_line, index, block)?;

        event!(Level::DEBUG, "inserted {} under {} at {}..{}", class, path::format(parent_path), region.start, region.end);
        Ok(region)
    }

    /// Cuts the whole declaration of the widget at `path` out of the document and returns it. The
    /// root is left alone when it is the body of a rule, since the rule exists whether or not it is
    /// being displayed; that case returns `None`.
    pub fn remove_child(&self, doc: &mut MarkupDocument, root: &RootRule, rules: &dyn RuleRegistry, path: &[usize], class: Option<&str>) -> Result<Option<String>, MutateError> {
        if path.is_empty() && (root.is_rule || (rules.is_named_rule(&root.class) && self.declares_rule(doc, &root.class))) {
            event!(Level::DEBUG, "not removing the declaration of rule {}", root.class);
            return Ok(None);
        }

        let region = locate::find_region(&doc.lines(self.indent_width), root, path, class)?;
        let removed = doc.slice(region.range()).to_string();
        doc.splice(region.range(), "");

        event!(Level::DEBUG, "removed {} ({} bytes)", path::format(path), removed.len());
        Ok(Some(removed))
    }

    /// Moves the declaration at `old_path` so it becomes child `new_index` of the widget at
    /// `new_parent_path`. The new parent's path is taken in the text after the old declaration has
    /// been cut, which is the same as its path in a tree that already reflects the move. If the
    /// new location can't be found, the cut is undone before returning the error.
    #[allow(clippy::too_many_arguments)]
    pub fn relocate(&self, doc: &mut MarkupDocument, root: &RootRule, old_path: &[usize], class: Option<&str>, new_parent_path: &[usize], new_parent_class: Option<&str>, new_index: usize) -> Result<TextRegion, MutateError> {
        let region = locate::find_region(&doc.lines(self.indent_width), root, old_path, class)?;
        let removed = doc.slice(region.range()).to_string();
        doc.splice(region.range(), "");

        let parent_line = locate::locate(&doc.lines(self.indent_width), root, new_parent_path, new_parent_class);
        let result = match parent_line {
            Ok(parent_line) => self.insert_block(doc, parent_line, new_index, &removed),
            Err(e) => Err(e.into()),
        };

        match &result {
            Ok(new) => event!(Level::DEBUG, "moved {} to {}.{} at {}..{}", path::format(old_path), path::format(new_parent_path), new_index, new.start, new.end),
            Err(e) => {
                event!(Level::WARN, "couldn't move {}: {}", path::format(old_path), e);
                doc.insert(region.start, &removed);
            },
        }

        result
    }

    /// Reorders a child among its siblings, from path index `from_index` to `to_index`.
    #[allow(clippy::too_many_arguments)]
    pub fn shift_child(&self, doc: &mut MarkupDocument, root: &RootRule, parent_path: &[usize], parent_class: Option<&str>, class: Option<&str>, from_index: usize, to_index: usize) -> Result<TextRegion, MutateError> {
        let mut old_path = parent_path.to_vec();
        old_path.push(from_index);
        self.relocate(doc, root, &old_path, class, parent_path, parent_class, to_index)
    }

    /// Text of a property written directly in the widget's block, with continuation lines joined.
    pub fn get_property_text(&self, doc: &MarkupDocument, root: &RootRule, path: &[usize], class: Option<&str>, name: &str) -> Result<Option<String>, MutateError> {
        let lines = doc.lines(self.indent_width);
        let decl = locate::locate(&lines, root, path, class)?;

        Ok(find_property(&lines, decl, name).map(|span| {
            if !span.continued {
                return doc.slice(span.value_start..span.value_end).to_string();
            }

            let end = locate::block_end_line(&lines, span.line);
            std::iter::once(span.first)
                .chain(lines.iter().skip(span.line + 1).take(end - span.line).filter(|l| l.is_structural()).map(|l| l.content))
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join("\n")
        }))
    }

    /// Text that follows the colon for a value.
    fn layout_value(&self, markup: &str, indent: usize) -> String {
        if markup.contains('\n') {
            let body = util::reindent(markup, indent + self.indent_width);
            format!("\n{}", body.trim_end_matches('\n'))
        } else {
            format!(" {}", markup)
        }
    }

    /// Writes a property into the widget's block. An existing line has only its value replaced; a
    /// missing one is added right after the declaration, unless the value is a default that isn't
    /// worth writing. Returns whether the text changed.
    #[allow(clippy::too_many_arguments)]
    pub fn set_property_text(&self, doc: &mut MarkupDocument, root: &RootRule, path: &[usize], class: Option<&str>, name: &str, value: &PropertyValue) -> Result<bool, MutateError> {
        let markup = value.to_markup();

        let (range, text, colon) = {
            let lines = doc.lines(self.indent_width);
            let decl = locate::locate(&lines, root, path, class)?;
            let decl_line = line(&lines, decl)?;
            let indent = locate::block_indent(&lines, decl);

            match find_property(&lines, decl, name) {
                Some(span) => {
                    let laid_out = self.layout_value(&markup, indent);
                    let (from, text) = if !laid_out.starts_with('\n') && span.value_start > span.colon + 1 {
                        (span.value_start, markup)
                    } else {
                        (span.colon + 1, laid_out)
                    };

                    if doc.slice(from..span.value_end) == text {
                        return Ok(false);
                    }
                    (from..span.value_end, text, None)
                },
                None if value.is_elidable() => {
                    event!(Level::TRACE, "not writing default {} = {}", name, markup);
                    return Ok(false);
                },
                None => {
                    let mut text = format!("{}{}:{}\n", " ".repeat(indent), name, self.layout_value(&markup, indent));
                    if decl_line.next == decl_line.end {
                        text.insert(0, '\n');
                    }
                    (decl_line.next..decl_line.next, text, missing_colon(decl_line))
                },
            }
        };

        doc.splice(range, &text);
        if let Some(colon) = colon {
            doc.insert(colon, ":");
        }

        event!(Level::DEBUG, "set {} on {}", name, path::format(path));
        Ok(true)
    }

    /// Deletes a property line (and its continuation lines) from the widget's block, so the
    /// property falls back to its default. Returns whether there was anything to delete.
    pub fn remove_property_text(&self, doc: &mut MarkupDocument, root: &RootRule, path: &[usize], class: Option<&str>, name: &str) -> Result<bool, MutateError> {
        let range = {
            let lines = doc.lines(self.indent_width);
            let decl = locate::locate(&lines, root, path, class)?;
            match find_property(&lines, decl, name) {
                Some(span) => line(&lines, span.line)?.start..lines.after(locate::block_end_line(&lines, span.line)),
                None => return Ok(false),
            }
        };

        doc.splice(range, "");
        event!(Level::DEBUG, "cleared {} on {}", name, path::format(path));
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use crate::logic::interpret::{BasicInterpreter, MarkupInterpreter, ProjectRules};

    fn mutator() -> TextMutator {
        TextMutator::new(4)
    }

    fn rules_for(text: &str) -> ProjectRules {
        let mut rules = ProjectRules::default();
        rules.update_from_document(&BasicInterpreter::default().parse(text).unwrap());
        rules
    }

    fn shape(text: &str) -> Vec<(usize, String)> {
        BasicInterpreter::default().parse(text).unwrap().root.unwrap().shape()
    }

    #[test]
    fn test_insert_into_empty_root() {
        let mut doc = MarkupDocument::new("FloatLayout:\n");
        let region = mutator().insert_child(&mut doc, &RootRule::instance("FloatLayout"), &[], Some("FloatLayout"), "Button", None, 0).unwrap();
        assert_eq!(doc.text(), "FloatLayout:\n    Button:\n");
        assert_eq!(doc.slice(region.range()), "    Button:\n");
    }

    #[test]
    fn test_insert_positions() {
        let root = RootRule::instance("BoxLayout");
        let original = "BoxLayout:\n    Button:\n    Label:\n\n# end\n";

        let mut doc = MarkupDocument::new(original);
        mutator().insert_child(&mut doc, &root, &[], None, "CheckBox", None, 0).unwrap();
        assert_eq!(doc.text(), "BoxLayout:\n    Button:\n    Label:\n    CheckBox:\n\n# end\n");

        let mut doc = MarkupDocument::new(original);
        mutator().insert_child(&mut doc, &root, &[], None, "CheckBox", None, 1).unwrap();
        assert_eq!(doc.text(), "BoxLayout:\n    Button:\n    CheckBox:\n    Label:\n\n# end\n");

        let mut doc = MarkupDocument::new(original);
        mutator().insert_child(&mut doc, &root, &[], None, "CheckBox", None, 2).unwrap();
        assert_eq!(doc.text(), "BoxLayout:\n    CheckBox:\n    Button:\n    Label:\n\n# end\n");

        let mut doc = MarkupDocument::new(original);
        assert_eq!(mutator().insert_child(&mut doc, &root, &[], None, "CheckBox", None, 3), Err(MutateError::IndexOutOfRange { index: 3, len: 2 }));
        assert_eq!(doc.text(), original);
    }

    #[test]
    fn test_insert_literal_is_reindented() {
        let mut doc = MarkupDocument::new("BoxLayout:\n    AnchorLayout:\n");
        let region = mutator().insert_child(&mut doc, &RootRule::instance("BoxLayout"), &[0], Some("AnchorLayout"), "Label", Some("Label:\n    text: 'pasted'\n"), 0).unwrap();
        assert_eq!(doc.text(), "BoxLayout:\n    AnchorLayout:\n        Label:\n            text: 'pasted'\n");
        assert_eq!(doc.slice(region.range()), "        Label:\n            text: 'pasted'\n");
    }

    #[test]
    fn test_insert_adds_missing_colon_and_line_break() {
        let mut doc = MarkupDocument::new("BoxLayout\n");
        let region = mutator().insert_child(&mut doc, &RootRule::instance("BoxLayout"), &[], None, "Button", None, 0).unwrap();
        assert_eq!(doc.text(), "BoxLayout:\n    Button:\n");
        assert_eq!(doc.slice(region.range()), "    Button:\n");

        let mut doc = MarkupDocument::new("Box:\n    Button:");
        let region = mutator().insert_child(&mut doc, &RootRule::instance("Box"), &[], None, "Label", None, 0).unwrap();
        assert_eq!(doc.text(), "Box:\n    Button:\n    Label:\n");
        assert_eq!(doc.slice(region.range()), "    Label:\n");
    }

    #[test]
    fn test_insert_follows_existing_indentation() {
        let mut doc = MarkupDocument::new("Box:\n  text: 'x'\n");
        mutator().insert_child(&mut doc, &RootRule::instance("Box"), &[], None, "Label", None, 0).unwrap();
        assert_eq!(doc.text(), "Box:\n  text: 'x'\n  Label:\n");
    }

    #[test]
    fn test_insert_into_rule_body() {
        let text = "<Fancy@BoxLayout>:\n    Label:\n\nFancy:\n";
        let mut doc = MarkupDocument::new(text);
        mutator().insert_child(&mut doc, &RootRule::rule("Fancy"), &[], Some("Fancy"), "Button", None, 0).unwrap();
        assert_eq!(doc.text(), "<Fancy@BoxLayout>:\n    Label:\n    Button:\n\nFancy:\n");
    }

    #[test]
    fn test_insert_root() {
        let mut doc = MarkupDocument::new("");
        assert_eq!(mutator().insert_root(&mut doc, "Button", None), Ok(RootRule::instance("Button")));
        assert_eq!(doc.text(), "Button:\n");
        assert_matches!(mutator().insert_root(&mut doc, "Label", None), Err(MutateError::RootAlreadyPresent { class }) if class == "Button");

        let text = "#:kivy 1.0\n<Fancy@Button>:\n    text: 'f'\n";
        let mut doc = MarkupDocument::new(text);
        assert_eq!(mutator().insert_root(&mut doc, "Fancy", None), Ok(RootRule::rule("Fancy")));
        assert_eq!(doc.text(), text);

        assert_eq!(mutator().insert_root(&mut doc, "Label", None), Ok(RootRule::instance("Label")));
        assert_eq!(doc.text(), "#:kivy 1.0\nLabel:\n<Fancy@Button>:\n    text: 'f'\n");

        let mut doc = MarkupDocument::new("#:kivy 1.0");
        mutator().insert_root(&mut doc, "Label", None).unwrap();
        assert_eq!(doc.text(), "#:kivy 1.0\nLabel:\n");
    }

    #[test]
    fn test_remove_last_child() {
        let text = "BoxLayout:\n    Button:\n    Label:\n";
        let mut doc = MarkupDocument::new(text);
        let removed = mutator().remove_child(&mut doc, &RootRule::instance("BoxLayout"), &rules_for(text), &[0], Some("Label")).unwrap();
        assert_eq!(removed.as_deref(), Some("    Label:\n"));
        assert_eq!(doc.text(), "BoxLayout:\n    Button:\n");
    }

    #[test]
    fn test_remove_last_child_keeps_following_comment() {
        let text = "BoxLayout:\n    Button:\n    Label:\n\n# keep me\n";
        let mut doc = MarkupDocument::new(text);
        let removed = mutator().remove_child(&mut doc, &RootRule::instance("BoxLayout"), &rules_for(text), &[0], Some("Label")).unwrap();
        assert_eq!(removed.as_deref(), Some("    Label:\n"));
        assert_eq!(doc.text(), "BoxLayout:\n    Button:\n\n# keep me\n");
    }

    #[test]
    fn test_remove_nested_keeps_surroundings() {
        let text = "BoxLayout:\n    Button:\n        text: 'a'\n\n    # note\n    Label:\n";
        let mut doc = MarkupDocument::new(text);
        let removed = mutator().remove_child(&mut doc, &RootRule::instance("BoxLayout"), &rules_for(text), &[1], Some("Button")).unwrap();
        assert_eq!(removed.as_deref(), Some("    Button:\n        text: 'a'\n"));
        assert_eq!(doc.text(), "BoxLayout:\n\n    # note\n    Label:\n");
    }

    #[test]
    fn test_remove_class_mismatch_writes_nothing() {
        let text = "BoxLayout:\n    Button:\n";
        let mut doc = MarkupDocument::new(text);
        let result = mutator().remove_child(&mut doc, &RootRule::instance("BoxLayout"), &rules_for(text), &[0], Some("Label"));
        assert_matches!(result, Err(MutateError::Locate(LocateError::ClassMismatch { .. })));
        assert_eq!(doc.text(), text);
    }

    #[test]
    fn test_remove_rule_root_is_refused() {
        let text = "<Fancy@BoxLayout>:\n    Label:\n";
        let mut doc = MarkupDocument::new(text);
        let removed = mutator().remove_child(&mut doc, &RootRule::rule("Fancy"), &rules_for(text), &[], Some("Fancy")).unwrap();
        assert_eq!(removed, None);
        assert_eq!(doc.text(), text);
    }

    #[test]
    fn test_insert_then_remove_restores_shape() {
        let text = "BoxLayout:\n    Label:\n        text: 'x'\n    AnchorLayout:\n";
        let root = RootRule::instance("BoxLayout");
        let before = shape(text);

        let mut doc = MarkupDocument::new(text);
        mutator().insert_child(&mut doc, &root, &[0], Some("AnchorLayout"), "Button", None, 0).unwrap();
        assert_ne!(shape(doc.text()), before);
        mutator().remove_child(&mut doc, &root, &rules_for(text), &[0, 0], Some("Button")).unwrap();
        assert_eq!(shape(doc.text()), before);
    }

    #[test]
    fn test_shift_child() {
        let text = "BoxLayout:\n    Button:\n        text: 'a'\n    Label:\n    CheckBox:\n";
        let root = RootRule::instance("BoxLayout");

        let mut doc = MarkupDocument::new(text);
        mutator().shift_child(&mut doc, &root, &[], Some("BoxLayout"), Some("Button"), 2, 0).unwrap();
        assert_eq!(doc.text(), "BoxLayout:\n    Label:\n    CheckBox:\n    Button:\n        text: 'a'\n");

        mutator().shift_child(&mut doc, &root, &[], Some("BoxLayout"), Some("Button"), 0, 1).unwrap();
        assert_eq!(doc.text(), "BoxLayout:\n    Label:\n    Button:\n        text: 'a'\n    CheckBox:\n");
    }

    #[test]
    fn test_relocate_across_parents() {
        let text = "BoxLayout:\n    AnchorLayout:\n    Button:\n        text: 'a'\n";
        let root = RootRule::instance("BoxLayout");

        let mut doc = MarkupDocument::new(text);
        let region = mutator().relocate(&mut doc, &root, &[0], Some("Button"), &[0], Some("AnchorLayout"), 0).unwrap();
        assert_eq!(doc.text(), "BoxLayout:\n    AnchorLayout:\n        Button:\n            text: 'a'\n");
        assert_eq!(doc.slice(region.range()), "        Button:\n            text: 'a'\n");
    }

    #[test]
    fn test_relocate_leaves_trailing_comment_behind() {
        let text = "BoxLayout:\n    AnchorLayout:\n    Label:\n# footer\n";
        let root = RootRule::instance("BoxLayout");

        let mut doc = MarkupDocument::new(text);
        let region = mutator().relocate(&mut doc, &root, &[0], Some("Label"), &[0], Some("AnchorLayout"), 0).unwrap();
        assert_eq!(doc.text(), "BoxLayout:\n    AnchorLayout:\n        Label:\n# footer\n");
        assert_eq!(doc.slice(region.range()), "        Label:\n");

        let text = "BoxLayout:\n    Label:\n    Button:\n\n    # between\n";
        let mut doc = MarkupDocument::new(text);
        mutator().shift_child(&mut doc, &root, &[], Some("BoxLayout"), Some("Button"), 0, 1).unwrap();
        assert_eq!(doc.text(), "BoxLayout:\n    Button:\n    Label:\n\n    # between\n");
    }

    #[test]
    fn test_relocate_failure_restores_text() {
        let text = "BoxLayout:\n    AnchorLayout:\n    Button:\n";
        let root = RootRule::instance("BoxLayout");

        let mut doc = MarkupDocument::new(text);
        let result = mutator().relocate(&mut doc, &root, &[0], Some("Button"), &[4], None, 0);
        assert_matches!(result, Err(MutateError::Locate(LocateError::PathOutOfRange { .. })));
        assert_eq!(doc.text(), text);
    }

    #[test]
    fn test_set_existing_property() {
        let mut doc = MarkupDocument::new("Button:\n    text: 'Hi'\n");
        let changed = mutator().set_property_text(&mut doc, &RootRule::instance("Button"), &[], Some("Button"), "text", &PropertyValue::String("Bye".to_string())).unwrap();
        assert!(changed);
        assert_eq!(doc.text(), "Button:\n    text: 'Bye'\n");

        let changed = mutator().set_property_text(&mut doc, &RootRule::instance("Button"), &[], Some("Button"), "text", &PropertyValue::String("Bye".to_string())).unwrap();
        assert!(!changed);
    }

    #[test]
    fn test_set_property_only_touches_its_own_line() {
        let text = "BoxLayout:\n    Label:\n        text: 'inner'\n    text: 'outer'  \n    Button:\n";
        let mut doc = MarkupDocument::new(text);
        mutator().set_property_text(&mut doc, &RootRule::instance("BoxLayout"), &[], None, "text", &PropertyValue::String("Hello".to_string())).unwrap();
        assert_eq!(doc.text(), "BoxLayout:\n    Label:\n        text: 'inner'\n    text: 'Hello'  \n    Button:\n");

        let (prefix, suffix) = util::common_affixes(text, doc.text());
        assert_eq!(prefix, text.find("'outer'").unwrap() + 1);
        assert_eq!(suffix, text.len() - text.find("'  \n    Button").unwrap());
    }

    #[test]
    fn test_set_absent_property() {
        let mut doc = MarkupDocument::new("BoxLayout:\n    Label:\n        text: 'inner'\n");
        let root = RootRule::instance("BoxLayout");

        mutator().set_property_text(&mut doc, &root, &[], None, "text", &PropertyValue::String("Hello".to_string())).unwrap();
        assert_eq!(doc.text(), "BoxLayout:\n    text: 'Hello'\n    Label:\n        text: 'inner'\n");

        /* defaults aren't written */
        assert!(!mutator().set_property_text(&mut doc, &root, &[0], Some("Label"), "bold", &PropertyValue::Bool(false)).unwrap());
        assert!(mutator().set_property_text(&mut doc, &root, &[0], Some("Label"), "bold", &PropertyValue::Bool(true)).unwrap());
        assert_eq!(doc.text(), "BoxLayout:\n    text: 'Hello'\n    Label:\n        bold: True\n        text: 'inner'\n");

        /* empty strings are */
        let mut doc = MarkupDocument::new("Label");
        mutator().set_property_text(&mut doc, &RootRule::instance("Label"), &[], None, "text", &PropertyValue::String(String::new())).unwrap();
        assert_eq!(doc.text(), "Label:\n    text: ''\n");
    }

    #[test]
    fn test_multi_line_property() {
        let mut doc = MarkupDocument::new("Button:\n    on_press:\n        print('a')\n        print('b')\n    text: 'x'\n");
        let root = RootRule::instance("Button");

        assert_eq!(mutator().get_property_text(&doc, &root, &[], None, "on_press").unwrap().as_deref(), Some("print('a')\nprint('b')"));
        assert_eq!(mutator().get_property_text(&doc, &root, &[], None, "text").unwrap().as_deref(), Some("'x'"));
        assert_eq!(mutator().get_property_text(&doc, &root, &[], None, "size").unwrap(), None);

        mutator().set_property_text(&mut doc, &root, &[], None, "on_press", &PropertyValue::Expression("pass".to_string())).unwrap();
        assert_eq!(doc.text(), "Button:\n    on_press: pass\n    text: 'x'\n");

        mutator().set_property_text(&mut doc, &root, &[], None, "on_press", &PropertyValue::Expression("a()\nb()".to_string())).unwrap();
        assert_eq!(doc.text(), "Button:\n    on_press:\n        a()\n        b()\n    text: 'x'\n");

        assert!(mutator().remove_property_text(&mut doc, &root, &[], None, "on_press").unwrap());
        assert_eq!(doc.text(), "Button:\n    text: 'x'\n");
        assert!(!mutator().remove_property_text(&mut doc, &root, &[], None, "on_press").unwrap());
    }

    #[test]
    fn test_insert_root_literal() {
        let mut doc = MarkupDocument::new("#:kivy 1.0\n");
        mutator().insert_root(&mut doc, "BoxLayout", Some("    BoxLayout:\n        Label:\n")).unwrap();
        assert_eq!(doc.text(), "#:kivy 1.0\nBoxLayout:\n    Label:\n");
    }
}
