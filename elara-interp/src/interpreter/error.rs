use std::fmt;

use crate::lexer::Position;

/// What a failed name lookup was looking for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NameCategory {
    Variable,
    Type,
    Member,
    Extension,
    Namespace,
}

impl NameCategory {
    pub fn name(self) -> &'static str {
        match self {
            NameCategory::Variable => "variable",
            NameCategory::Type => "type",
            NameCategory::Member => "member",
            NameCategory::Extension => "extension",
            NameCategory::Namespace => "namespace",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EvalErrorKind {
    TypeMismatch { expected: String, actual: String },
    Unresolved { category: NameCategory, name: String },
    ImmutableAssignment(String),
    NotCallable(String),
    ArityMismatch { expected: usize, got: usize },
    DivisionByZero,
    IndexOutOfBounds { index: i64, len: usize },
    CallDepthExceeded(usize),
    RecursiveType(String),
    InvalidOperation(String),
    StaleContext,
    /// Host-side failure; stops the run.
    Runtime(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvalError {
    pub kind: EvalErrorKind,
    pub position: Option<Position>,
}

impl EvalError {
    pub fn new(kind: EvalErrorKind) -> Self {
        Self {
            kind,
            position: None,
        }
    }

    pub fn type_mismatch(expected: impl fmt::Display, actual: impl fmt::Display) -> Self {
        Self::new(EvalErrorKind::TypeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        })
    }

    pub fn unresolved(category: NameCategory, name: impl Into<String>) -> Self {
        Self::new(EvalErrorKind::Unresolved {
            category,
            name: name.into(),
        })
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(EvalErrorKind::InvalidOperation(message.into()))
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(EvalErrorKind::Runtime(message.into()))
    }

    /// Attaches `position` unless an inner statement already did.
    pub fn at(mut self, position: Position) -> Self {
        if self.position.is_none() {
            self.position = Some(position);
        }
        self
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self.kind, EvalErrorKind::Runtime(_))
    }
}

impl fmt::Display for EvalErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalErrorKind::TypeMismatch { expected, actual } => {
                write!(f, "type mismatch: expected {expected}, found {actual}")
            }
            EvalErrorKind::Unresolved { category, name } => {
                write!(f, "unresolved {} '{name}'", category.name())
            }
            EvalErrorKind::ImmutableAssignment(name) => {
                write!(f, "cannot assign to immutable binding '{name}'")
            }
            EvalErrorKind::NotCallable(ty) => write!(f, "value of type {ty} is not callable"),
            EvalErrorKind::ArityMismatch { expected, got } => {
                write!(f, "expected {expected} argument(s), got {got}")
            }
            EvalErrorKind::DivisionByZero => write!(f, "division by zero"),
            EvalErrorKind::IndexOutOfBounds { index, len } => {
                write!(f, "index {index} out of bounds for length {len}")
            }
            EvalErrorKind::CallDepthExceeded(limit) => {
                write!(f, "call depth exceeded the limit of {limit}")
            }
            EvalErrorKind::RecursiveType(name) => {
                write!(f, "type '{name}' is defined in terms of itself")
            }
            EvalErrorKind::InvalidOperation(message) => write!(f, "{message}"),
            EvalErrorKind::StaleContext => write!(f, "context used after cleanup"),
            EvalErrorKind::Runtime(message) => write!(f, "runtime failure: {message}"),
        }
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(position) => write!(f, "{position}: {}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for EvalError {}

pub type EvalResult<T> = Result<T, EvalError>;
