use itertools::Itertools;
use serde_derive::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    String,
    Number,
    Bool,
    Option,
    List,
    /// Anything we don't have a descriptor for. Written back verbatim.
    Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    String(String),
    Number(f64),
    Bool(bool),
    Option(String),
    List(Vec<String>),
    Expression(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct PropertyDescriptor {
    pub name: String,
    pub kind: PropertyKind,
    #[serde(default)]
    pub default: Option<String>, //< markup text of the default value
}

impl PropertyValue {
    pub fn kind(&self) -> PropertyKind {
        match self {
            PropertyValue::String(_) => PropertyKind::String,
            PropertyValue::Number(_) => PropertyKind::Number,
            PropertyValue::Bool(_) => PropertyKind::Bool,
            PropertyValue::Option(_) => PropertyKind::Option,
            PropertyValue::List(_) => PropertyKind::List,
            PropertyValue::Expression(_) => PropertyKind::Expression,
        }
    }

    /// Values that are not worth writing into the markup when the property line doesn't exist yet.
    /// Strings are never elided since an empty string is a legitimate, non-default value.
    pub fn is_elidable(&self) -> bool {
        match self {
            PropertyValue::String(_) => false,
            PropertyValue::Number(n) => *n == 0.0,
            PropertyValue::Bool(b) => !b,
            PropertyValue::Option(o) => o.is_empty(),
            PropertyValue::List(l) => l.is_empty(),
            PropertyValue::Expression(e) => e.trim().is_empty() || e.trim() == "None",
        }
    }

    pub fn to_markup(&self) -> String {
        match self {
            PropertyValue::String(s) | PropertyValue::Option(s) => quote(s),
            PropertyValue::Number(n) => format!("{}", n),
            PropertyValue::Bool(true) => "True".to_string(),
            PropertyValue::Bool(false) => "False".to_string(),
            PropertyValue::List(items) => format!("[{}]", items.iter().join(", ")),
            PropertyValue::Expression(e) => e.trim().to_string(),
        }
    }

    /// Interprets markup text as a value of the given kind. Text that doesn't fit the kind (a
    /// binding like `root.width` for a number property, say) comes back as an expression.
    pub fn from_markup(kind: PropertyKind, text: &str) -> PropertyValue {
        let text = text.trim();
        let fallback = || PropertyValue::Expression(text.to_string());

        match kind {
            PropertyKind::String => unquote(text).map(PropertyValue::String).unwrap_or_else(fallback),
            PropertyKind::Option => unquote(text).map(PropertyValue::Option).unwrap_or_else(fallback),
            PropertyKind::Number => text.parse::<f64>().map(PropertyValue::Number).unwrap_or_else(|_| fallback()),
            PropertyKind::Bool => match text {
                "True" => PropertyValue::Bool(true),
                "False" => PropertyValue::Bool(false),
                _ => fallback(),
            },
            PropertyKind::List => {
                let inner = text.strip_prefix('[').and_then(|t| t.strip_suffix(']'))
                    .or_else(|| text.strip_prefix('(').and_then(|t| t.strip_suffix(')')));
                match inner {
                    Some(inner) if inner.trim().is_empty() => PropertyValue::List(Vec::new()),
                    Some(inner) => PropertyValue::List(inner.split(',').map(|i| i.trim().to_string()).filter(|i| !i.is_empty()).collect()),
                    None => fallback(),
                }
            },
            PropertyKind::Expression => fallback(),
        }
    }
}

pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

pub fn unquote(s: &str) -> Option<String> {
    let q = s.chars().next()?;
    if (q != '\'' && q != '"') || s.len() < 2 || !s.ends_with(q) {
        return None;
    }

    let mut out = String::new();
    let mut chars = s[1..s.len()-1].chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some(e) => out.push(e),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    Some(out)
}
