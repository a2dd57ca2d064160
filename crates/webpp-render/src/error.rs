//! The stacked error used throughout the engine.
//!
//! Every failure carries a primary message plus a list of frames
//! recording the path the error took through the renderer: the fragment,
//! the template node, the attribute. Frames are attached with
//! [`ResultExt::frame`], which records the caller's file and line, so a
//! failing render produces a trace like:
//!
//! ```text
//! Exception: output: required variable 'user.name' not found in render context
//!     1. crates/webpp-render/src/renderer.rs:241 - node webpp://xml:a at line 3
//!     2. crates/webpp-render/src/renderer.rs:120 - fragment 'index'
//! ```

use std::fmt;
use std::panic::Location;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// An error with a stack of location-annotated frames.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct Error {
    message: String,
    frames: Vec<Frame>,
}

/// One decoration frame, innermost first.
#[derive(Debug, Clone)]
pub struct Frame {
    pub file: &'static str,
    pub line: u32,
    pub annotation: String,
}

impl Error {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            frames: Vec::new(),
        }
    }

    /// The primary message, without frames.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Decoration frames, bottom-up (innermost first).
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Append a frame recorded at the caller's location.
    #[track_caller]
    pub fn push_frame(mut self, annotation: impl Into<String>) -> Self {
        let location = Location::caller();
        self.frames.push(Frame {
            file: location.file(),
            line: location.line(),
            annotation: annotation.into(),
        });
        self
    }

    /// Render the primary message and the numbered frame trace.
    pub fn format(&self) -> String {
        let mut out = String::new();
        out.push_str("Exception: ");
        out.push_str(&self.message);
        out.push('\n');
        for (i, frame) in self.frames.iter().enumerate() {
            let _ = fmt::Write::write_fmt(
                &mut out,
                format_args!(
                    "\t{}. {}:{} - {}\n",
                    i + 1,
                    frame.file,
                    frame.line,
                    frame.annotation
                ),
            );
        }
        out
    }
}

impl From<webpp_xml::Error> for Error {
    fn from(err: webpp_xml::Error) -> Self {
        Error::new(err.to_string())
    }
}

/// Frame-attaching combinator for `Result`.
///
/// Mirrors the scope-guard decoration pattern: wrap the body of a public
/// entry point so any propagating failure picks up the entry's
/// annotation on its way out.
pub trait ResultExt<T> {
    #[track_caller]
    fn frame(self, annotation: impl FnOnce() -> String) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    #[track_caller]
    fn frame(self, annotation: impl FnOnce() -> String) -> Result<T> {
        match self {
            Ok(value) => Ok(value),
            Err(err) => Err(err.push_frame(annotation())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_accumulate_bottom_up() {
        let err: Result<()> = Err(Error::new("boom"));
        let err = err
            .frame(|| "inner".to_string())
            .frame(|| "outer".to_string())
            .unwrap_err();

        assert_eq!(err.message(), "boom");
        assert_eq!(err.frames().len(), 2);
        assert_eq!(err.frames()[0].annotation, "inner");
        assert_eq!(err.frames()[1].annotation, "outer");
    }

    #[test]
    fn format_lists_numbered_frames() {
        let err = Error::new("boom").push_frame("step");
        let formatted = err.format();
        assert!(formatted.starts_with("Exception: boom\n"));
        assert!(formatted.contains("\t1. "));
        assert!(formatted.contains("- step\n"));
    }

    #[test]
    fn ok_results_pass_through_untouched() {
        let ok: Result<i32> = Ok(7);
        assert_eq!(ok.frame(|| unreachable!()).unwrap(), 7);
    }

    #[test]
    fn frame_records_this_file() {
        let err: Result<()> = Err(Error::new("x"));
        let err = err.frame(|| "here".to_string()).unwrap_err();
        assert!(err.frames()[0].file.ends_with("error.rs"));
    }
}
