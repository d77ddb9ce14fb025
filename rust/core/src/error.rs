// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for element processing.

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while decoding, discovering or matching elements.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// A raw record could not be decoded into an element.
    #[error("malformed element at position {index}: {reason}")]
    MalformedElement { index: usize, reason: String },

    /// Discovery or pipeline options are out of range.
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// Parameter discovery failed as a whole.
    #[error("parameter discovery failed: {0}")]
    Discovery(String),

    /// Two category definitions share the same id.
    #[error("duplicate category id: {0}")]
    DuplicateCategory(String),

    /// A category references a parent that does not exist.
    #[error("category {id} references unknown parent {parent}")]
    UnknownParent { id: String, parent: String },

    /// The parent chain of a category loops back on itself.
    #[error("category hierarchy contains a cycle through {0}")]
    HierarchyCycle(String),

    /// A category id was not found in the hierarchy.
    #[error("unknown category: {0}")]
    UnknownCategory(String),

    /// An equation could not be parsed.
    #[error("cannot parse expression at offset {offset}: {message}")]
    ExpressionParse { offset: usize, message: String },

    /// An equation references a variable the element does not carry.
    #[error("unknown variable in expression: {0}")]
    UnknownVariable(String),

    /// An equation variable resolved to a non-numeric value.
    #[error("variable {0} is not numeric")]
    NonNumericVariable(String),

    /// Division or remainder by zero during evaluation.
    #[error("division by zero")]
    DivisionByZero,

    /// An equation calls a function outside the supported set.
    #[error("unknown function: {0}")]
    UnknownFunction(String),

    /// A function was called with the wrong number of arguments.
    #[error("function {name} expects {expected} argument(s), got {got}")]
    Arity {
        name: String,
        expected: &'static str,
        got: usize,
    },
}
