//! Boundaries to the presentation layer. Rendering, dialogs and the system
//! clipboard live outside this crate and plug in through these traits.

use chrono::NaiveDate;

/// Free-text input dialog.
pub trait NotePrompt {
    /// Asks for note text for `date`. `None` means the user cancelled.
    /// `error` carries the message from a rejected previous attempt.
    fn request_text(&mut self, date: NaiveDate, error: Option<&str>) -> Option<String>;
}

/// Yes/no question.
pub trait Confirm {
    fn confirm(&mut self, title: &str, message: &str) -> bool;
}

pub trait Clipboard {
    fn set_text(&mut self, label: &str, text: &str);
}
