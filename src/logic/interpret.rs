//! Structural interpretation of markup text.
//!
//! The designer doesn't run the markup; it only needs the shape the toolkit would build from it:
//! which rules are declared, and the tree of widgets under the root instance.

use std::collections::BTreeSet;
use std::fmt;

use tracing::{event, Level};

use crate::logic::scan;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: usize, //< zero-based
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line + 1, self.message)
    }
}

impl ParseError {
    fn new(line: usize, message: impl Into<String>) -> ParseError {
        ParseError { line, message: message.into() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedWidget {
    pub class: String,
    pub line: usize,
    pub properties: Vec<(String, String)>,
    pub children: Vec<ParsedWidget>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRule {
    pub name: String,
    pub base: Option<String>,
    pub body: ParsedWidget,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedDocument {
    pub directives: Vec<String>,
    pub rules: Vec<ParsedRule>,
    pub root: Option<ParsedWidget>,
}

impl ParsedDocument {
    pub fn rule(&self, name: &str) -> Option<&ParsedRule> {
        self.rules.iter().find(|r| r.name == name)
    }

    pub fn rule_names(&self) -> BTreeSet<String> {
        self.rules.iter().map(|r| r.name.clone()).collect()
    }
}

impl ParsedWidget {
    /// Class names in pre-order with depth, comparable with `WidgetTree::shape`.
    pub fn shape(&self) -> Vec<(usize, String)> {
        let mut out = Vec::new();
        self.shape_into(0, &mut out);
        out
    }

    fn shape_into(&self, depth: usize, out: &mut Vec<(usize, String)>) {
        out.push((depth, self.class.clone()));
        for child in &self.children {
            child.shape_into(depth + 1, out);
        }
    }
}

/// Turns markup text into a widget structure, or says why it can't.
pub trait MarkupInterpreter {
    fn parse(&self, text: &str) -> Result<ParsedDocument, ParseError>;
}

/// Knows which class names are declared as rules, in this document or elsewhere in the project.
pub trait RuleRegistry {
    fn is_named_rule(&self, name: &str) -> bool;
    fn list_named_rules(&self) -> BTreeSet<String>;

    /// Picks up rules from a freshly interpreted document.
    fn update_from_document(&mut self, document: &ParsedDocument);

    /// Re-reads whatever project files back the registry.
    fn rescan(&mut self) -> Result<(), std::io::Error> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BasicInterpreter {
    pub indent_width: usize,
}

impl Default for BasicInterpreter {
    fn default() -> Self {
        BasicInterpreter { indent_width: 4 }
    }
}

struct Parser<'a, 'b> {
    lines: &'b scan::Lines<'a>,
    pos: usize,
}

impl<'a, 'b> Parser<'a, 'b> {
    /// Next line that takes part in the structure, without consuming it.
    fn peek(&mut self) -> Option<&'b scan::Line<'a>> {
        while let Some(line) = self.lines.get(self.pos) {
            if line.is_structural() {
                return Some(line);
            }
            self.pos+= 1;
        }
        None
    }

    fn skip_deeper_than(&mut self, indent: usize) -> Vec<&'b scan::Line<'a>> {
        let mut skipped = Vec::new();
        while let Some(line) = self.peek() {
            if line.indent <= indent {
                break;
            }
            skipped.push(line);
            self.pos+= 1;
        }
        skipped
    }

    fn parse_document(&mut self) -> Result<ParsedDocument, ParseError> {
        let mut doc = ParsedDocument::default();

        while let Some(line) = self.peek() {
            if line.indent != 0 {
                return Err(ParseError::new(line.number, "unexpected indentation"));
            }
            self.pos+= 1;

            match line.kind {
                scan::LineKind::Directive => doc.directives.push(line.content.to_string()),
                scan::LineKind::Rule { names } => {
                    let names = scan::parse_rule_names(names);
                    if names.is_empty() {
                        return Err(ParseError::new(line.number, "rule declares no names"));
                    }

                    let mut body = ParsedWidget {
                        class: names[0].0.to_string(),
                        line: line.number,
                        properties: Vec::new(),
                        children: Vec::new(),
                    };
                    self.parse_block(&mut body, 0)?;

                    for (name, base) in names {
                        let mut body = body.clone();
                        body.class = name.to_string();
                        doc.rules.push(ParsedRule {
                            name: name.to_string(),
                            base: base.map(str::to_string),
                            body,
                        });
                    }
                },
                scan::LineKind::Declaration { class, opens_block: true } => {
                    if let Some(root) = &doc.root {
                        return Err(ParseError::new(line.number, format!("only one root object is allowed, but {} is already declared on line {}", root.class, root.line + 1)));
                    }

                    let mut root = ParsedWidget {
                        class: class.to_string(),
                        line: line.number,
                        properties: Vec::new(),
                        children: Vec::new(),
                    };
                    self.parse_block(&mut root, 0)?;
                    doc.root = Some(root);
                },
                scan::LineKind::Declaration { class, opens_block: false } => {
                    return Err(ParseError::new(line.number, format!("expected ':' after {}", class)));
                },
                scan::LineKind::Property { name, .. } => {
                    return Err(ParseError::new(line.number, format!("property {} is outside of any widget", name)));
                },
                _ => return Err(ParseError::new(line.number, format!("invalid syntax: {}", line.content))),
            }
        }

        Ok(doc)
    }

    fn parse_block(&mut self, widget: &mut ParsedWidget, parent_indent: usize) -> Result<(), ParseError> {
        let mut block_indent = None;

        while let Some(line) = self.peek() {
            if line.indent <= parent_indent {
                return Ok(());
            }

            let indent = *block_indent.get_or_insert(line.indent);
            if line.indent != indent {
                return Err(ParseError::new(line.number, "inconsistent indentation"));
            }
            self.pos+= 1;

            match line.kind {
                scan::LineKind::Declaration { class, opens_block: true } => {
                    let mut child = ParsedWidget {
                        class: class.to_string(),
                        line: line.number,
                        properties: Vec::new(),
                        children: Vec::new(),
                    };
                    self.parse_block(&mut child, indent)?;
                    widget.children.push(child);
                },
                scan::LineKind::Declaration { class, opens_block: false } => {
                    return Err(ParseError::new(line.number, format!("expected ':' after {}", class)));
                },
                scan::LineKind::Property { name, value } => {
                    let continuation = self.skip_deeper_than(indent);
                    if scan::EXCLUDED_BLOCKS.contains(&name) {
                        continue;
                    }

                    let mut value = value.to_string();
                    for l in continuation {
                        if !value.is_empty() {
                            value.push('\n');
                        }
                        value.push_str(l.content);
                    }

                    if value.is_empty() {
                        return Err(ParseError::new(line.number, format!("property {} has no value", name)));
                    }
                    widget.properties.push((name.to_string(), value));
                },
                scan::LineKind::Rule { .. } => return Err(ParseError::new(line.number, "rules can only be declared at the top level")),
                scan::LineKind::Directive => return Err(ParseError::new(line.number, "directives can only appear at the top level")),
                _ => return Err(ParseError::new(line.number, format!("invalid syntax: {}", line.content))),
            }
        }

        Ok(())
    }
}

impl MarkupInterpreter for BasicInterpreter {
    fn parse(&self, text: &str) -> Result<ParsedDocument, ParseError> {
        let lines = scan::Lines::new(text, self.indent_width);
        let result = Parser { lines: &lines, pos: 0 }.parse_document();

        if let Err(e) = &result {
            event!(Level::DEBUG, "interpretation failed: {}", e);
        }

        result
    }
}

/// Rules found in the open document, plus whatever the project's other markup files declare.
#[derive(Debug, Clone, Default)]
pub struct ProjectRules {
    pub project_dir: Option<std::path::PathBuf>,
    document: BTreeSet<String>,
    project: BTreeSet<String>,
    interpreter: BasicInterpreter,
}

impl ProjectRules {
    pub fn new(project_dir: Option<std::path::PathBuf>, indent_width: usize) -> ProjectRules {
        ProjectRules {
            project_dir,
            document: BTreeSet::new(),
            project: BTreeSet::new(),
            interpreter: BasicInterpreter { indent_width },
        }
    }

    fn scan_dir(&self, dir: &std::path::Path, into: &mut BTreeSet<String>) -> Result<(), std::io::Error> {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                self.scan_dir(&path, into)?;
            } else if path.extension().map_or(false, |e| e == "kv") {
                /* a broken file elsewhere in the project shouldn't hide the rules in the rest */
                let bytes = match std::fs::read(&path) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        event!(Level::WARN, "skipping {}: {}", path.display(), e);
                        continue;
                    },
                };
                let text = String::from_utf8_lossy(&bytes);
                let lines = scan::Lines::new(&text, self.interpreter.indent_width);
                for line in lines.iter().filter(|l| l.indent == 0) {
                    into.extend(line.rule_names().into_iter().map(|(name, _)| name.to_string()));
                }
            }
        }
        Ok(())
    }
}

impl RuleRegistry for ProjectRules {
    fn is_named_rule(&self, name: &str) -> bool {
        self.document.contains(name) || self.project.contains(name)
    }

    fn list_named_rules(&self) -> BTreeSet<String> {
        self.document.union(&self.project).cloned().collect()
    }

    fn update_from_document(&mut self, document: &ParsedDocument) {
        self.document = document.rule_names();
    }

    fn rescan(&mut self) -> Result<(), std::io::Error> {
        let mut project = BTreeSet::new();
        if let Some(dir) = &self.project_dir {
            self.scan_dir(dir, &mut project)?;
        }
        event!(Level::DEBUG, "rescanned project rules: {} found", project.len());
        self.project = project;
        Ok(())
    }
}
