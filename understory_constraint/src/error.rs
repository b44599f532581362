// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types.

use alloc::string::String;
use core::ops::Range;

use thiserror::Error;

use crate::constraint::{Constraint, ConstraintId};

/// A required constraint made the required subset infeasible.
#[derive(Clone, Debug, PartialEq, Error)]
#[error("required constraint at batch index {index} conflicts with the active constraints")]
pub struct ConflictError {
    /// Position of the offending constraint within the batch (zero for single-constraint calls).
    pub index: usize,
    /// The offending constraint, detached.
    pub constraint: Constraint,
}

/// What went wrong while parsing a visual format string.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum FormatErrorKind {
    /// The string ended in the middle of a construct.
    #[error("unexpected end of format string")]
    UnexpectedEnd,
    /// A character that cannot start or continue the current construct.
    #[error("unexpected character `{0}`")]
    UnexpectedCharacter(char),
    /// The string names no views.
    #[error("format string contains no views")]
    NoViews,
    /// A number could not be read.
    #[error("invalid number")]
    InvalidNumber,
    /// A name that is neither a bound metric nor a bound view.
    #[error("unknown metric or view name")]
    UnknownName,
    /// A view name used where only metrics and numbers are allowed.
    #[error("views cannot be used inside a connection")]
    ViewInConnection,
    /// A predicate with more than one `@priority` suffix.
    #[error("predicate has more than one priority")]
    DuplicatePriority,
    /// A relation or priority with nothing to relate to.
    #[error("predicate is missing its object")]
    MissingObject,
    /// A priority outside `(0, 1000]`.
    #[error("priority must be in (0, 1000]")]
    InvalidPriority,
    /// A `|` edge next to a view that has no parent.
    #[error("view has no superview for a `|` edge")]
    MissingSuperview,
    /// Alignment options parallel to the orientation, or conflicting direction options.
    #[error("alignment options must be perpendicular to the orientation")]
    InvalidOptions,
}

/// A malformed visual format string.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{kind} at bytes {span:?}: `{fragment}`")]
pub struct FormatParseError {
    /// What went wrong.
    pub kind: FormatErrorKind,
    /// Byte range of the offending token within the format string.
    pub span: Range<usize>,
    /// The offending substring.
    pub fragment: String,
}

impl FormatParseError {
    pub(crate) fn new(kind: FormatErrorKind, format: &str, span: Range<usize>) -> Self {
        let start = span.start.min(format.len());
        let end = span.end.clamp(start, format.len());
        let fragment = format.get(start..end).unwrap_or_default().into();
        Self {
            kind,
            span: start..end,
            fragment,
        }
    }
}

/// Errors returned by [`ConstraintLayout`](crate::ConstraintLayout).
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConstraintError {
    /// Attaching would make the required constraints infeasible.
    #[error(transparent)]
    Conflict(#[from] ConflictError),
    /// The visual format string could not be parsed.
    #[error(transparent)]
    Format(#[from] FormatParseError),
    /// The constraint id is stale or was never issued.
    #[error("constraint {0:?} is not attached")]
    UnknownConstraint(ConstraintId),
    /// The constraint at `index` references a removed item.
    #[error("constraint at batch index {index} references a removed item")]
    StaleItem {
        /// Position within the batch.
        index: usize,
    },
    /// The constraint at `index` is malformed.
    #[error("constraint at batch index {index} is invalid: {reason}")]
    InvalidConstraint {
        /// Position within the batch.
        index: usize,
        /// Human-readable reason.
        reason: &'static str,
    },
}
