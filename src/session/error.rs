use std::fmt;
use std::fmt::Write;

use crate::logic::interpret::ParseError;
use crate::logic::locate::LocateError;
use crate::logic::mutate::MutateError;
use crate::model::tree::{PlacementError, WidgetId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /* Tree operations */
    AddChild,
    RemoveChild,
    MoveChild,
    SetProperty,
    GetProperty,
    SelectRoot,

    /* Text */
    ReloadFromText,

    /* Files */
    OpenDocument,
    SaveDocument,
    WatchProject,

    Undo,
    Redo,
}

#[derive(Debug)]
pub enum Trouble {
    Placement(PlacementError),
    /// The text no longer lines up with the tree, so the edit was abandoned before writing anything.
    StaleLocation(LocateError),
    TextMutation(MutateError),
    Parse(ParseError),
    StdIoError(std::io::Error),
    NoSuchWidget(WidgetId),
    NoRoot,
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Warning,
    Error,
}

/// Something that went wrong while doing what the user asked. Never fatal; the session keeps going
/// with the tree and text it had before.
#[derive(Debug)]
pub struct Error {
    pub while_attempting: Action,
    pub trouble: Trouble,
    pub level: Level,
    pub is_bug: bool,
}

/// What's left of an error once it has been reported: enough to show in a status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub while_attempting: Action,
    pub level: Level,
    pub message: String,
    pub detail: String,
}

impl From<PlacementError> for Trouble {
    fn from(e: PlacementError) -> Trouble {
        Trouble::Placement(e)
    }
}

impl From<MutateError> for Trouble {
    fn from(e: MutateError) -> Trouble {
        match e {
            MutateError::Locate(e) => Trouble::StaleLocation(e),
            e => Trouble::TextMutation(e),
        }
    }
}

impl From<ParseError> for Trouble {
    fn from(e: ParseError) -> Trouble {
        Trouble::Parse(e)
    }
}

impl From<std::io::Error> for Trouble {
    fn from(e: std::io::Error) -> Trouble {
        Trouble::StdIoError(e)
    }
}

impl Error {
    pub fn new(while_attempting: Action, trouble: impl Into<Trouble>) -> Error {
        let trouble = trouble.into();
        let level = match &trouble {
            Trouble::Placement(_) | Trouble::NoRoot => Level::Warning,
            _ => Level::Error,
        };
        /* the mutator found the line itself a moment earlier */
        let is_bug = matches!(trouble, Trouble::TextMutation(MutateError::LineOutOfRange { .. }));

        Error {
            while_attempting,
            trouble,
            level,
            is_bug,
        }
    }

    pub fn status(&self) -> Status {
        Status {
            while_attempting: self.while_attempting,
            level: self.level,
            message: self.message(),
            detail: self.detail(),
        }
    }

    pub fn message(&self) -> String {
        if let Trouble::StaleLocation(_) = self.trouble {
            return "Cannot reload from text.".to_string();
        }

        match self.while_attempting {
            Action::AddChild => "Failed to add widget.",
            Action::RemoveChild => "Failed to remove widget.",
            Action::MoveChild => "Failed to move widget.",
            Action::SetProperty => "Failed to set property.",
            Action::GetProperty => "Failed to read property.",
            Action::SelectRoot => "Failed to change the displayed root.",

            Action::ReloadFromText => "Cannot reload from text.",

            Action::OpenDocument => "Failed to open document.",
            Action::SaveDocument => "Failed to save document.",
            Action::WatchProject => "Failed to check project files for changes.",

            Action::Undo => "Failed to undo.",
            Action::Redo => "Failed to redo.",
        }.to_string()
    }

    pub fn detail(&self) -> String {
        let mut msg = String::new();
        if self.write_detail(&mut msg).is_err() {
            msg+= "Failed to format details.\n";
        }
        msg
    }

    fn write_detail(&self, msg: &mut String) -> Result<(), fmt::Error> {
        match &self.trouble {
            Trouble::Placement(e) => writeln!(msg, "Placement not allowed: {}.", e)?,
            Trouble::StaleLocation(e) => {
                writeln!(msg, "The markup text doesn't match the widget tree anymore ({}).", e)?;
                writeln!(msg, "The text was left unchanged.")?;
            },
            Trouble::TextMutation(e) => writeln!(msg, "Couldn't update the markup text: {}.", e)?,
            Trouble::Parse(e) => {
                writeln!(msg, "Markup is invalid at {}.", e)?;
                writeln!(msg, "The previous widget tree is still displayed.")?;
            },
            Trouble::StdIoError(e) => writeln!(msg, "I/O error: {}", e)?,
            Trouble::NoSuchWidget(id) => writeln!(msg, "Widget {} doesn't exist.", id)?,
            Trouble::NoRoot => writeln!(msg, "The document doesn't have a root widget yet.")?,
            Trouble::Other(e) => writeln!(msg, "{}", e)?,
        };

        if self.is_bug {
            writeln!(msg, "This is a bug.")?;
        }

        Ok(())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.message(), self.detail().trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn test_stale_location_message() {
        let e = Error::new(Action::MoveChild, MutateError::Locate(LocateError::RootNotFound { class: "BoxLayout".to_string() }));
        assert_eq!(e.message(), "Cannot reload from text.");
        assert_eq!(e.level, Level::Error);
        assert!(e.detail().contains("BoxLayout"));
    }

    #[test]
    fn test_levels() {
        assert_eq!(Error::new(Action::AddChild, PlacementError::WouldCycle).level, Level::Warning);
        assert_eq!(Error::new(Action::ReloadFromText, ParseError { line: 0, message: "bad".to_string() }).level, Level::Error);
        assert_eq!(Error::new(Action::RemoveChild, Trouble::NoRoot).level, Level::Warning);
    }

    #[test]
    fn test_internal_inconsistency_is_a_bug() {
        let e = Error::new(Action::AddChild, MutateError::LineOutOfRange { line: 7 });
        assert!(e.is_bug);
        assert!(e.detail().ends_with("This is a bug.\n"));

        let e = Error::new(Action::AddChild, MutateError::IndexOutOfRange { index: 3, len: 1 });
        assert!(!e.is_bug);
        assert!(!e.detail().contains("bug"));
    }

    #[test]
    fn test_read_failure_message() {
        let e = Error::new(Action::GetProperty, Trouble::NoRoot);
        assert_eq!(e.message(), "Failed to read property.");
    }

    #[test]
    fn test_display() {
        let e = Error::new(Action::ReloadFromText, ParseError { line: 2, message: "expected ':' after Button".to_string() });
        assert_eq!(e.to_string(), "Cannot reload from text. Markup is invalid at line 3: expected ':' after Button.\nThe previous widget tree is still displayed.");
    }
}
