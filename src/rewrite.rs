//! Text splicing with offset bookkeeping.
//!
//! Two strategies are provided:
//!
//! - [`EditList`] collects edits expressed in original-text coordinates and
//!   builds a new buffer in one pass, tracking the running shift so the output
//!   position of every edit is known.
//! - [`LiveBuffer`] splices into a growing buffer while a scan cursor walks it;
//!   inserts at or before the cursor move the cursor forward.

extern crate alloc;

use alloc::string::String;
use alloc::vec::Vec;
use core::ops::Range;

use crate::error::SpliceError;

/// One change in original-text coordinates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Edit {
    /// Insert `text` before byte `at`.
    Insert {
        /// Original offset.
        at: usize,
        /// Inserted text.
        text: String,
    },
    /// Replace the original bytes in `span` with `text`.
    Replace {
        /// Original span.
        span: Range<usize>,
        /// Replacement text.
        text: String,
    },
}

impl Edit {
    /// Original span covered by this edit (empty for inserts).
    pub fn span(&self) -> Range<usize> {
        match self {
            Self::Insert { at, .. } => *at..*at,
            Self::Replace { span, .. } => span.clone(),
        }
    }

    /// Text written into the output.
    pub fn text(&self) -> &str {
        match self {
            Self::Insert { text, .. } | Self::Replace { text, .. } => text,
        }
    }
}

/// Decision returned by a per-element callback.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Splice {
    /// Leave the element untouched.
    #[default]
    Keep,
    /// Insert attribute text inside the start tag.
    Insert(String),
    /// Surround the whole element.
    Wrap {
        /// Text placed before the element.
        before: String,
        /// Text placed after the element.
        after: String,
    },
}

impl Splice {
    /// `Insert`, or `Keep` when `text` is empty.
    pub fn insert(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.is_empty() {
            Self::Keep
        } else {
            Self::Insert(text)
        }
    }
}

/// Where an edit landed in the output buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppliedEdit {
    /// Original offset of the edit.
    pub original: usize,
    /// Output span holding the edit's text.
    pub output: Range<usize>,
}

/// Result of [`EditList::apply`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spliced {
    /// Rewritten text.
    pub text: String,
    /// Output location of every edit, in application order.
    pub applied: Vec<AppliedEdit>,
}

/// Deferred edits against an unmodified text.
///
/// Edits may be pushed in any order. They are applied by ascending original
/// position; edits at the same position keep their push order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EditList {
    edits: Vec<Edit>,
}

impl EditList {
    /// Empty edit list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an insertion before original byte `at`. Empty text is dropped.
    pub fn insert(&mut self, at: usize, text: impl Into<String>) {
        let text = text.into();
        if !text.is_empty() {
            self.edits.push(Edit::Insert { at, text });
        }
    }

    /// Queue a replacement of the original bytes in `span`.
    pub fn replace(&mut self, span: Range<usize>, text: impl Into<String>) {
        self.edits.push(Edit::Replace {
            span,
            text: text.into(),
        });
    }

    /// Queue `before` and `after` around the original bytes in `span`.
    pub fn wrap(&mut self, span: Range<usize>, before: impl Into<String>, after: impl Into<String>) {
        self.insert(span.start, before);
        self.insert(span.end, after);
    }

    /// Number of queued edits.
    pub fn len(&self) -> usize {
        self.edits.len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Queued edits in push order.
    pub fn edits(&self) -> &[Edit] {
        &self.edits
    }

    /// Build the rewritten text.
    ///
    /// Each edit's output position is `original + shift`, where `shift` is the
    /// net growth from every edit applied before it.
    pub fn apply(&self, text: &str) -> Result<Spliced, SpliceError> {
        let mut order: Vec<&Edit> = self.edits.iter().collect();
        order.sort_by_key(|edit| edit.span().start);

        let growth: usize = order.iter().map(|edit| edit.text().len()).sum();
        let mut out = String::with_capacity(text.len() + growth);
        let mut applied = Vec::with_capacity(order.len());
        let mut copied = 0usize;
        let mut shift = 0isize;

        for edit in order {
            let span = edit.span();
            check_position(text, span.start)?;
            check_position(text, span.end)?;
            if span.start < copied {
                return Err(SpliceError::Overlap {
                    position: span.start,
                    previous_end: copied,
                });
            }
            out.push_str(&text[copied..span.start]);
            let start = out.len();
            debug_assert_eq!(start as isize, span.start as isize + shift);
            out.push_str(edit.text());
            applied.push(AppliedEdit {
                original: span.start,
                output: start..out.len(),
            });
            shift += edit.text().len() as isize - span.len() as isize;
            copied = span.end;
        }
        out.push_str(&text[copied..]);

        Ok(Spliced { text: out, applied })
    }
}

fn check_position(text: &str, position: usize) -> Result<(), SpliceError> {
    if position > text.len() {
        return Err(SpliceError::OutOfBounds {
            position,
            len: text.len(),
        });
    }
    if !text.is_char_boundary(position) {
        return Err(SpliceError::NotCharBoundary { position });
    }
    Ok(())
}

/// Buffer rewritten in place while a scan cursor walks it.
///
/// The cursor is the single source of truth for "where in the current buffer
/// the scan is"; edits behind or at the cursor shift it forward.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LiveBuffer {
    text: String,
    cursor: usize,
    inserted: usize,
}

impl LiveBuffer {
    /// Start scanning `text` from offset zero.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            cursor: 0,
            inserted: 0,
        }
    }

    /// Current buffer contents.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Scan cursor in current-buffer coordinates.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Move the scan cursor (clamped to the buffer length).
    pub fn set_cursor(&mut self, cursor: usize) {
        self.cursor = cursor.min(self.text.len());
    }

    /// Total bytes inserted so far.
    pub fn inserted(&self) -> usize {
        self.inserted
    }

    /// Insert `text` at current-buffer offset `at`.
    pub fn insert(&mut self, at: usize, text: &str) -> Result<(), SpliceError> {
        check_position(&self.text, at)?;
        if text.is_empty() {
            return Ok(());
        }
        self.text.insert_str(at, text);
        if at <= self.cursor {
            self.cursor += text.len();
        }
        self.inserted += text.len();
        Ok(())
    }

    /// Finish and return the buffer.
    pub fn into_string(self) -> String {
        self.text
    }
}
