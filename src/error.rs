//! Structured error types.
//!
//! Nothing in the rewrite path is fatal to page generation: these errors are
//! either absorbed into "inject nothing" with a log line, or surface only from
//! file I/O in the pipeline and CLI.

extern crate alloc;

use alloc::boxed::Box;
use alloc::string::String;
use core::fmt;
use std::path::Path;

/// Processing phase where an error originated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorPhase {
    /// Applying an edit list to a text buffer.
    Splice,
    /// Reading or decoding image pixel dimensions.
    Probe,
    /// Reading or writing generated pages.
    Io,
}

impl fmt::Display for ErrorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Splice => "splice",
            Self::Probe => "probe",
            Self::Io => "io",
        };
        f.write_str(name)
    }
}

/// Edit application failure.
///
/// Positions are always reported in original-text coordinates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpliceError {
    /// Edit position lies past the end of the text.
    OutOfBounds {
        /// Offending offset.
        position: usize,
        /// Length of the original text.
        len: usize,
    },
    /// Edit position splits a UTF-8 sequence.
    NotCharBoundary {
        /// Offending offset.
        position: usize,
    },
    /// A replace span starts before the end of the previous edit.
    Overlap {
        /// Start of the rejected edit.
        position: usize,
        /// End of the edit it collides with.
        previous_end: usize,
    },
}

impl SpliceError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::OutOfBounds { .. } => "SPLICE_OUT_OF_BOUNDS",
            Self::NotCharBoundary { .. } => "SPLICE_NOT_CHAR_BOUNDARY",
            Self::Overlap { .. } => "SPLICE_OVERLAP",
        }
    }
}

impl fmt::Display for SpliceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: ", ErrorPhase::Splice, self.code())?;
        match self {
            Self::OutOfBounds { position, len } => {
                write!(f, "edit at {} is past end of text ({})", position, len)
            }
            Self::NotCharBoundary { position } => {
                write!(f, "edit at {} is not on a char boundary", position)
            }
            Self::Overlap {
                position,
                previous_end,
            } => write!(
                f,
                "edit at {} overlaps previous edit ending at {}",
                position, previous_end
            ),
        }
    }
}

impl std::error::Error for SpliceError {}

/// Image dimension probe failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeError {
    /// Stable machine-readable code.
    pub code: &'static str,
    /// Human-readable message.
    pub message: Box<str>,
    /// Image path being probed.
    pub path: Option<Box<str>>,
}

impl ProbeError {
    pub(crate) fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into().into_boxed_str(),
            path: None,
        }
    }

    pub(crate) fn with_path(mut self, path: &Path) -> Self {
        self.path = Some(path.display().to_string().into_boxed_str());
        self
    }
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", ErrorPhase::Probe, self.code, self.message)?;
        if let Some(path) = self.path.as_deref() {
            write!(f, " [path={}]", path)?;
        }
        Ok(())
    }
}

impl std::error::Error for ProbeError {}

/// Pipeline and CLI failure.
#[derive(Debug)]
pub enum SiteError {
    /// Filesystem error while reading or writing a page.
    Io {
        /// Path being accessed.
        path: Box<str>,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Page bytes are not valid UTF-8.
    NotUtf8 {
        /// Page path.
        path: Box<str>,
    },
}

impl SiteError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string().into_boxed_str(),
            source,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io { .. } => "SITE_IO",
            Self::NotUtf8 { .. } => "SITE_NOT_UTF8",
        }
    }
}

impl fmt::Display for SiteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(
                f,
                "{}:{}: {} [path={}]",
                ErrorPhase::Io,
                self.code(),
                source,
                path
            ),
            Self::NotUtf8 { path } => write!(
                f,
                "{}:{}: page is not valid UTF-8 [path={}]",
                ErrorPhase::Io,
                self.code(),
                path
            ),
        }
    }
}

impl std::error::Error for SiteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::NotUtf8 { .. } => None,
        }
    }
}
