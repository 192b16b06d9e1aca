//! Rendering of expressions back to text.
//!
//! Readable output (`readable = true`) quotes and escapes strings so that
//! every literal form reads back to an equal value. Display output writes
//! strings verbatim. Callables have an opaque rendering that does not read
//! back.

use std::fmt::{self, Write};

use crate::ast::Expr;

/// Render `expr` as text.
pub fn print(expr: &Expr, readable: bool) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_expr(&mut out, expr, readable);
    out
}

/// Render each expression and join the results with `separator`.
pub fn print_joined(exprs: &[Expr], readable: bool, separator: &str) -> String {
    exprs
        .iter()
        .map(|expr| print(expr, readable))
        .collect::<Vec<_>>()
        .join(separator)
}

fn write_expr(out: &mut impl Write, expr: &Expr, readable: bool) -> fmt::Result {
    match expr {
        Expr::Number(n) => write!(out, "{n}"),
        Expr::String(s) if readable => write_escaped(out, s),
        Expr::String(s) => out.write_str(s),
        Expr::Symbol(symbol) => write!(out, "{symbol}"),
        Expr::List(items) => write_sequence(out, items.iter(), ('(', ')'), readable),
        Expr::Vector(items) => write_sequence(out, items.iter(), ('[', ']'), readable),
        Expr::Map(map) => write_sequence(
            out,
            map.iter().flat_map(|(k, v)| [k, v]),
            ('{', '}'),
            readable,
        ),
        Expr::Closure(_) => out.write_str("#<function>"),
        Expr::Builtin(builtin) => write!(out, "#<builtin:{}>", builtin.name),
    }
}

fn write_sequence<'a>(
    out: &mut impl Write,
    items: impl Iterator<Item = &'a Expr>,
    (open, close): (char, char),
    readable: bool,
) -> fmt::Result {
    out.write_char(open)?;
    for (i, item) in items.enumerate() {
        if i > 0 {
            out.write_char(' ')?;
        }
        write_expr(out, item, readable)?;
    }
    out.write_char(close)
}

fn write_escaped(out: &mut impl Write, s: &str) -> fmt::Result {
    out.write_char('"')?;
    for ch in s.chars() {
        match ch {
            '"' => out.write_str("\\\"")?,
            '\\' => out.write_str("\\\\")?,
            '\n' => out.write_str("\\n")?,
            c => out.write_char(c)?,
        }
    }
    out.write_char('"')
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_expr(f, self, true)
    }
}
