//! malrs - a minimal Lisp-family interpreter
//!
//! This crate reads textual source, parses it into an expression tree, evaluates
//! that tree under a lexically scoped environment model and renders the result
//! back to text:
//!
//! ```text
//! text -> tokens -> Expr -> evaluate(Expr, Environment) -> Expr -> text
//! ```
//!
//! ```lisp
//! (def! inc (fn* [x] (+ x 1)))   ; closures capture their defining scope
//! (let* [a 1 b (inc a)] [a b])   ; sequential bindings, vectors keep their tag
//! (if false "no" nil "no" "yes") ; multi-branch if, falls through to the else
//! {"a" 1 :b [1 2]}               ; maps keep insertion order
//! ```
//!
//! ## Modules
//!
//! - `lexer`: lazy token stream over one buffer of text
//! - `reader`: recursive-descent parser producing [`ast::Expr`] trees
//! - `env`: chained, reference-counted environment frames
//! - `evaluator`: special forms, closures and application
//! - `printer`: readable and display renderings of expressions
//! - `builtinops`: the primitive library installed into the root environment
//! - `completion`: symbol-name queries for line editors
//! - `repl` (feature `repl`): the interactive loop

use std::fmt;
use std::rc::Rc;

/// Maximum reader nesting depth.
/// Deeper input is rejected with a [`ReadError`] instead of exhausting the stack.
pub const MAX_PARSE_DEPTH: usize = 512;

/// Categorizes the different kinds of reader failures.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ReadErrorKind {
    /// Unexpected token (stray closer, mismatched delimiter)
    InvalidSyntax,
    /// Input ended before the expression was complete (unclosed collection, unterminated string)
    Incomplete,
    /// A numeric literal that does not fit the number type
    InvalidNumber,
    /// Extra input found after a complete expression
    TrailingContent,
    /// Nesting exceeded [`MAX_PARSE_DEPTH`]
    TooDeeplyNested,
}

/// A lexical or syntactic failure, positioned at a byte offset of the input.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ReadError {
    pub kind: ReadErrorKind,
    pub message: String,
    pub position: usize,
}

impl ReadError {
    pub fn new(kind: ReadErrorKind, message: impl Into<String>, position: usize) -> Self {
        ReadError {
            kind,
            message: message.into(),
            position,
        }
    }
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} at position {}", self.message, self.position)
    }
}

/// Error types for the interpreter
///
/// Every variant except [`Error::ReadError`] is reported as an `EvalError`
/// at the REPL boundary, see [`Error::kind_name`].
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    ReadError(ReadError),
    EvalError(String),
    TypeError(String),
    UnboundSymbol(String),
    ArityError {
        expected: evaluator::Arity,
        got: usize,
        callee: Option<String>,
    },
    NotCallable(String),
    MalformedForm {
        form: &'static str,
        expected: &'static str,
    },
}

impl Error {
    pub(crate) fn read(kind: ReadErrorKind, message: impl Into<String>, position: usize) -> Self {
        Error::ReadError(ReadError::new(kind, message, position))
    }

    /// Create an ArityError naming the callable that rejected the call
    pub fn arity_error_for(expected: evaluator::Arity, got: usize, callee: impl Into<String>) -> Self {
        Error::ArityError {
            expected,
            got,
            callee: Some(callee.into()),
        }
    }

    /// The boundary kind reported by the REPL: `ReadError` or `EvalError`.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Error::ReadError(_) => "ReadError",
            Error::EvalError(_)
            | Error::TypeError(_)
            | Error::UnboundSymbol(_)
            | Error::ArityError { .. }
            | Error::NotCallable(_)
            | Error::MalformedForm { .. } => "EvalError",
        }
    }
}

impl From<ReadError> for Error {
    fn from(e: ReadError) -> Self {
        Error::ReadError(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ReadError(e) => write!(f, "{e}"),
            Error::EvalError(msg) => write!(f, "{msg}"),
            Error::TypeError(msg) => write!(f, "type error: {msg}"),
            Error::UnboundSymbol(name) => write!(f, "'{name}' not found"),
            Error::ArityError {
                expected,
                got,
                callee,
            } => match callee {
                Some(name) => write!(
                    f,
                    "{name}: expected {expected} arguments, got {got}"
                ),
                None => write!(f, "expected {expected} arguments, got {got}"),
            },
            Error::NotCallable(value) => write!(f, "{value} is not callable"),
            Error::MalformedForm { form, expected } => {
                write!(f, "malformed {form}, expected {expected}")
            }
        }
    }
}

impl std::error::Error for Error {}

pub mod ast;
pub mod builtinops;
pub mod completion;
pub mod env;
pub mod evaluator;
pub mod lexer;
pub mod printer;
pub mod reader;
pub mod symbol;

#[cfg(feature = "repl")]
pub mod repl;

pub use ast::Expr;
pub use builtinops::create_global_env;
pub use env::Environment;
pub use evaluator::evaluate;
pub use printer::print;
pub use reader::read;

/// Read one line, evaluate it against `env` and print the result readably.
///
/// This is the unit of work of the REPL: a failure leaves every binding made
/// by earlier lines intact.
pub fn rep(line: &str, env: &Rc<Environment>) -> Result<String, Error> {
    let expr = read(line)?;
    let value = evaluate(&expr, env)?;
    Ok(print(&value, true))
}
