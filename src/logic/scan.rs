//! Line-oriented view of a markup document.
//!
//! The classification here has to agree with what the interpreter accepts, otherwise text edits
//! land somewhere the interpreter doesn't consider part of the same block.

use lazy_static::lazy_static;
use regex::Regex;

/// Property blocks holding drawing instructions rather than widgets. Never counted as children.
pub const EXCLUDED_BLOCKS: &[&str] = &["canvas", "canvas.before", "canvas.after"];

lazy_static! {
    static ref RULE: Regex = Regex::new(r"^<\s*(.+?)\s*>\s*:\s*(#.*)?$").unwrap();
    static ref DECLARATION: Regex = Regex::new(r"^([A-Z][A-Za-z0-9_.@+]*)\s*(:)?\s*(#.*)?$").unwrap();
    static ref PROPERTY: Regex = Regex::new(r"^([a-z_][A-Za-z0-9_.]*)\s*:[ \t]*(.*)$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind<'a> {
    Blank,
    Comment,
    Directive,
    /// `<Name>:` and friends. Holds whatever is between the angle brackets.
    Rule { names: &'a str },
    /// `ClassName:`, or a bare `ClassName` that hasn't grown its colon yet.
    Declaration { class: &'a str, opens_block: bool },
    /// `name: value`. The value may be empty if it continues on deeper lines.
    Property { name: &'a str, value: &'a str },
    Other,
}

#[derive(Debug, Clone)]
pub struct Line<'a> {
    pub number: usize,
    pub start: usize,
    pub content_start: usize,
    /// End of the content, not counting trailing whitespace or comments on declaration lines.
    pub content_end: usize,
    /// End of the line, not counting the line break.
    pub end: usize,
    /// Start of the following line, or the end of the text.
    pub next: usize,
    pub indent: usize,
    pub content: &'a str,
    pub kind: LineKind<'a>,
}

impl<'a> Line<'a> {
    /// Blank lines and comments don't take part in block structure.
    pub fn is_structural(&self) -> bool {
        !matches!(self.kind, LineKind::Blank | LineKind::Comment)
    }

    pub fn is_blank(&self) -> bool {
        matches!(self.kind, LineKind::Blank)
    }

    pub fn declared_class(&self) -> Option<&'a str> {
        match self.kind {
            LineKind::Declaration { class, .. } if !EXCLUDED_BLOCKS.contains(&class) => Some(class),
            _ => None,
        }
    }

    pub fn opens_block(&self) -> bool {
        match self.kind {
            LineKind::Declaration { opens_block, .. } => opens_block,
            LineKind::Rule { .. } => true,
            LineKind::Property { value, .. } => value.is_empty(),
            _ => false,
        }
    }

    pub fn property(&self) -> Option<(&'a str, &'a str)> {
        match self.kind {
            LineKind::Property { name, value } => Some((name, value)),
            _ => None,
        }
    }

    /// Names declared by a rule header. `<A@B,C>` declares A and C; `<-A>` redefines A.
    pub fn rule_names(&self) -> Vec<(&'a str, Option<&'a str>)> {
        match self.kind {
            LineKind::Rule { names } => parse_rule_names(names),
            _ => Vec::new(),
        }
    }
}

pub fn parse_rule_names(names: &str) -> Vec<(&str, Option<&str>)> {
    names.split(',')
        .map(|n| n.trim().trim_start_matches('-'))
        .filter(|n| !n.is_empty())
        .map(|n| match n.split_once('@') {
            Some((name, bases)) => (name.trim(), bases.split('+').next().map(str::trim)),
            None => (n, None),
        })
        .collect()
}

fn classify(content: &str) -> (LineKind<'_>, usize) {
    if content.is_empty() {
        return (LineKind::Blank, 0);
    }
    if content.starts_with("#:") {
        return (LineKind::Directive, content.len());
    }
    if content.starts_with('#') {
        return (LineKind::Comment, content.len());
    }

    if let Some(c) = RULE.captures(content) {
        let names = c.get(1).map_or("", |m| m.as_str());
        let end = content.find(':').map_or(content.len(), |i| i + 1);
        return (LineKind::Rule { names }, end);
    }

    if let Some(c) = DECLARATION.captures(content) {
        let class = c.get(1).map_or("", |m| m.as_str());
        let colon = c.get(2);
        let end = colon.map_or(class.len(), |m| m.end());
        return (LineKind::Declaration { class, opens_block: colon.is_some() }, end);
    }

    if let Some(c) = PROPERTY.captures(content) {
        let name = c.get(1).map_or("", |m| m.as_str());
        let value = c.get(2).map_or("", |m| m.as_str().trim_end());
        return (LineKind::Property { name, value }, content.trim_end().len());
    }

    (LineKind::Other, content.trim_end().len())
}

#[derive(Debug, Clone)]
pub struct Lines<'a> {
    text: &'a str,
    lines: Vec<Line<'a>>,
    indent_width: usize,
}

impl<'a> Lines<'a> {
    pub fn new(text: &'a str, indent_width: usize) -> Lines<'a> {
        let mut lines = Vec::new();
        let mut start = 0;

        for (number, raw) in text.split_inclusive('\n').enumerate() {
            let next = start + raw.len();
            let body = raw.trim_end_matches('\n').trim_end_matches('\r');
            let end = start + body.len();

            let mut indent = 0;
            let mut skipped = 0;
            for c in body.chars() {
                match c {
                    ' ' => indent+= 1,
                    '\t' => indent+= indent_width,
                    _ => break,
                }
                skipped+= 1;
            }

            let content = body[skipped..].trim_end();
            let (kind, content_len) = classify(content);
            let content_start = start + skipped;

            lines.push(Line {
                number,
                start,
                content_start,
                content_end: content_start + content_len,
                end,
                next,
                indent,
                content,
                kind,
            });

            start = next;
        }

        Lines { text, lines, indent_width }
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    pub fn indent_width(&self) -> usize {
        self.indent_width
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn get(&self, number: usize) -> Option<&Line<'a>> {
        self.lines.get(number)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Line<'a>> {
        self.lines.iter()
    }

    /// Offset just past the given line, including its line break.
    pub fn after(&self, number: usize) -> usize {
        self.lines.get(number).map_or(self.text.len(), |l| l.next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    fn kinds(text: &str) -> Vec<LineKind<'_>> {
        Lines::new(text, 4).iter().map(|l| l.kind).collect()
    }

    #[test]
    fn test_classification() {
        assert_eq!(kinds("#:kivy 1.0\n# hello\n\n<Foo@Button>:\nBoxLayout:\n    orientation: 'vertical'\n    Button\n    canvas:\n    Label:  # comment\n    on_press:\n    Button: 'x'\n"), vec![
            LineKind::Directive,
            LineKind::Comment,
            LineKind::Blank,
            LineKind::Rule { names: "Foo@Button" },
            LineKind::Declaration { class: "BoxLayout", opens_block: true },
            LineKind::Property { name: "orientation", value: "'vertical'" },
            LineKind::Declaration { class: "Button", opens_block: false },
            LineKind::Property { name: "canvas", value: "" },
            LineKind::Declaration { class: "Label", opens_block: true },
            LineKind::Property { name: "on_press", value: "" },
            LineKind::Other,
        ]);
    }

    #[test]
    fn test_offsets() {
        let text = "Box:\n    text: 'Hi'  \n\tButton:\nLast";
        let lines = Lines::new(text, 4);
        assert_eq!(lines.len(), 4);

        let l = lines.get(1).unwrap();
        assert_eq!(l.indent, 4);
        assert_eq!(&text[l.start..l.end], "    text: 'Hi'  ");
        assert_eq!(&text[l.content_start..l.content_end], "text: 'Hi'");
        assert_eq!(l.next, lines.get(2).unwrap().start);

        let l = lines.get(2).unwrap();
        assert_eq!(l.indent, 4);
        assert_eq!(&text[l.content_start..l.content_end], "Button:");

        let l = lines.get(3).unwrap();
        assert_eq!(l.next, text.len());
        assert_eq!(lines.after(3), text.len());
    }

    #[test]
    fn test_declaration_content_excludes_trailing_comment() {
        let text = "Label  # no colon yet\n";
        let lines = Lines::new(text, 4);
        let l = lines.get(0).unwrap();
        assert_eq!(l.kind, LineKind::Declaration { class: "Label", opens_block: false });
        assert_eq!(&text[l.content_start..l.content_end], "Label");
    }

    #[test]
    fn test_rule_names() {
        assert_eq!(parse_rule_names("Foo@Button"), vec![("Foo", Some("Button"))]);
        assert_eq!(parse_rule_names("-Foo, Bar@Label+Behavior"), vec![("Foo", None), ("Bar", Some("Label"))]);
        assert_eq!(parse_rule_names("Foo"), vec![("Foo", None)]);
    }

    #[test]
    fn test_canvas_is_not_a_declaration() {
        let lines = Lines::new("canvas.before:\n", 4);
        assert_eq!(lines.get(0).unwrap().declared_class(), None);
        assert!(lines.get(0).unwrap().opens_block());
    }

    #[test]
    fn test_empty_text() {
        assert!(Lines::new("", 4).is_empty());
        assert_eq!(Lines::new("A:\n", 4).len(), 1);
    }
}
