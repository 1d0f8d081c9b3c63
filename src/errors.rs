//! Error types for expression parsing/evaluation, schema loading, bit reading
//! and decoding.

use std::error::Error;
use std::fmt;

/// Error from lexing or parsing an expression, carrying the offending byte
/// span in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub message: String,
    pub start: usize,
    pub end: usize,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}..{}", self.message, self.start, self.end)
    }
}

impl Error for SyntaxError {}

/// Errors produced when evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    /// Operator applied to operand kinds it does not accept. The message names
    /// the operator and both operand renderings.
    InvalidOperation(String),
    /// Nonzero numerator divided by zero. Distinct from the NaN that a
    /// zero-over-zero division yields, which is a value, not an error.
    DivisionByZero { lhs: String, rhs: String },
    /// An elementwise array comparison failed at the given index.
    AtIndex(usize, Box<EvalError>),
    /// Index applied to a non-array, or an out-of-range/non-integer index.
    BadIndex(String),
    /// The resolver callback could not resolve an identifier.
    Resolve(String),
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::InvalidOperation(msg) => write!(f, "invalid operation {}", msg),
            EvalError::DivisionByZero { lhs, rhs } => {
                write!(f, "division by zero: {} / {}", lhs, rhs)
            }
            EvalError::AtIndex(i, err) => write!(f, "at index {}: {}", i, err),
            EvalError::BadIndex(msg) => write!(f, "invalid index: {}", msg),
            EvalError::Resolve(msg) => write!(f, "{}", msg),
        }
    }
}

impl Error for EvalError {}

/// Errors produced when loading a schema document.
#[derive(Debug)]
pub enum SchemaError {
    /// The document itself failed to deserialize.
    Document(serde_yaml::Error),
    /// An expression attribute failed to parse. Reported at load time so
    /// malformed expressions never reach decoding.
    Expr { text: String, err: SyntaxError },
    /// An enum key failed to evaluate against the empty context.
    EnumKey { text: String, err: EvalError },
    /// `contents` holds something other than strings and 0..=255 integers.
    Contents(String),
    /// `repeat:` names an unknown mode or lacks its companion expression.
    Repeat { id: String, detail: String },
    /// A construct has the wrong shape (non-string switch case, malformed
    /// enum entry, ...).
    Shape(String),
    /// An instance declares neither `value` nor `pos`, or both.
    Instance { id: String, detail: String },
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaError::Document(err) => write!(f, "schema: {}", err),
            SchemaError::Expr { text, err } => {
                write!(f, "failed to parse '{}': {}", text, err)
            }
            SchemaError::EnumKey { text, err } => {
                write!(f, "failed to eval enum key '{}': {}", text, err)
            }
            SchemaError::Contents(msg) => write!(f, "contents: {}", msg),
            SchemaError::Repeat { id, detail } => write!(f, "{}: repeat: {}", id, detail),
            SchemaError::Shape(msg) => write!(f, "{}", msg),
            SchemaError::Instance { id, detail } => write!(f, "{}: instance: {}", id, detail),
        }
    }
}

impl Error for SchemaError {}

/// Errors produced when reading bits from the underlying byte region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    /// Requested bits extend beyond the end of the current region.
    OutOfBounds,
    /// More than 64 bits were requested in a single integer read.
    TooManyBitsRead,
    /// A string field holds invalid UTF-8.
    InvalidUtf8,
    /// A terminated string ran to the end of the region without a terminator.
    UnterminatedString,
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadError::OutOfBounds => write!(f, "read past end of region"),
            ReadError::TooManyBitsRead => write!(f, "more than 64 bits in one read"),
            ReadError::InvalidUtf8 => write!(f, "invalid utf-8"),
            ReadError::UnterminatedString => write!(f, "missing string terminator"),
        }
    }
}

impl Error for ReadError {}

/// Errors produced while decoding. Any of these aborts the whole decode.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeError {
    Read(ReadError),
    /// An expression failed to evaluate, annotated with the field it belongs
    /// to, the attribute role (`size`, `if`, `repeat-until`, ...) and the
    /// expression's original text.
    Eval {
        field: String,
        role: &'static str,
        text: String,
        err: EvalError,
    },
    /// An expression evaluated to the wrong kind for its role.
    ExprType {
        field: String,
        role: &'static str,
        text: String,
        expected: &'static str,
    },
    /// A type name matched no built-in encoding and no ancestor-scoped type.
    UnknownType { field: String, name: String },
    /// An instance name was not found in the type's instance dictionary.
    UnknownInstance(String),
    /// An instance depends on itself, directly or through other instances.
    InstanceCycle(String),
    /// A switch discriminant matched no case and the switch declares no `_`
    /// default.
    UnmatchedSwitch { field: String, value: String },
    /// Bytes read for a `contents` field differ from the declared literal.
    ContentsMismatch {
        field: String,
        expected: Vec<u8>,
        actual: Vec<u8>,
    },
    /// A byte-range field declares neither `size`, `size-eos` nor `contents`.
    MissingSize { field: String },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Read(err) => write!(f, "{}", err),
            DecodeError::Eval {
                field,
                role,
                text,
                err,
            } => write!(f, "{}: {}: {}: {}", field, role, text, err),
            DecodeError::ExprType {
                field,
                role,
                text,
                expected,
            } => write!(
                f,
                "{}: {}: {}: did not evaluate to {}",
                field, role, text, expected
            ),
            DecodeError::UnknownType { field, name } => {
                write!(f, "{}: can't find type {}", field, name)
            }
            DecodeError::UnknownInstance(name) => write!(f, "{}: instance not found", name),
            DecodeError::InstanceCycle(name) => {
                write!(f, "{}: instance depends on itself", name)
            }
            DecodeError::UnmatchedSwitch { field, value } => {
                write!(f, "{}: no switch case matches {}", field, value)
            }
            DecodeError::ContentsMismatch {
                field,
                expected,
                actual,
            } => write!(
                f,
                "{}: contents mismatch: expected {:02x?}, got {:02x?}",
                field, expected, actual
            ),
            DecodeError::MissingSize { field } => {
                write!(f, "{}: needs size, size-eos or contents", field)
            }
        }
    }
}

impl Error for DecodeError {}

impl From<ReadError> for DecodeError {
    fn from(err: ReadError) -> DecodeError {
        DecodeError::Read(err)
    }
}
