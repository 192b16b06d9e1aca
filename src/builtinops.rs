//! Built-in operations installed into the root environment.
//!
//! Every primitive is a [`BuiltinFn`] entry in one static table: its name, its
//! [`Arity`] and a function over already evaluated arguments. Arity is checked
//! by [`BuiltinFn::call`] before the implementation runs; implementations check
//! argument types themselves and report the offending position.
//!
//! ```lisp
//! (+ 1 2 3)            ; 6, left-to-right fold
//! (- 5)                ; -5, unary negation
//! (< 1 2 3)            ; true, chained over adjacent pairs
//! (= [1 2] (list 1 2)) ; true, structural equality
//! (count nil)          ; 0
//! (pr-str "a" [1])     ; "\"a\" [1]"
//! ```
//!
//! ## Adding New Operations
//!
//! 1. Implement `fn(args: &[Expr]) -> Result<Expr, Error>`
//! 2. Add it to `BUILTIN_OPS` with its name and arity
//! 3. Add table-driven tests below

use std::io::{self, Write};
use std::rc::Rc;
use std::sync::LazyLock;

use crate::Error;
use crate::ast::{BuiltinFn, Expr, NumberType, nil};
use crate::env::Environment;
use crate::evaluator::Arity;
use crate::printer::print_joined;
use crate::symbol::Symbol;

fn number_arg(name: &str, args: &[Expr], index: usize) -> Result<NumberType, Error> {
    match &args[index] {
        Expr::Number(n) => Ok(*n),
        other => Err(Error::TypeError(format!(
            "{name}: argument {} must be a number, got {}",
            index + 1,
            other.type_name()
        ))),
    }
}

fn numbers(name: &str, args: &[Expr]) -> Result<Vec<NumberType>, Error> {
    (0..args.len()).map(|i| number_arg(name, args, i)).collect()
}

fn overflow(name: &str) -> Error {
    Error::EvalError(format!("{name}: integer overflow"))
}

fn builtin_add(args: &[Expr]) -> Result<Expr, Error> {
    let mut sum: NumberType = 0;
    for n in numbers("+", args)? {
        sum = sum.checked_add(n).ok_or_else(|| overflow("+"))?;
    }
    Ok(Expr::Number(sum))
}

fn builtin_sub(args: &[Expr]) -> Result<Expr, Error> {
    let nums = numbers("-", args)?;
    let [first, rest @ ..] = nums.as_slice() else {
        return Err(Error::arity_error_for(Arity::AtLeast(1), 0, "-"));
    };
    if rest.is_empty() {
        return first.checked_neg().map(Expr::Number).ok_or_else(|| overflow("-"));
    }

    let mut result = *first;
    for n in rest {
        result = result.checked_sub(*n).ok_or_else(|| overflow("-"))?;
    }
    Ok(Expr::Number(result))
}

fn builtin_mul(args: &[Expr]) -> Result<Expr, Error> {
    let mut product: NumberType = 1;
    for n in numbers("*", args)? {
        product = product.checked_mul(n).ok_or_else(|| overflow("*"))?;
    }
    Ok(Expr::Number(product))
}

fn checked_div(dividend: NumberType, divisor: NumberType) -> Result<NumberType, Error> {
    if divisor == 0 {
        return Err(Error::EvalError("/: division by zero".into()));
    }
    dividend.checked_div(divisor).ok_or_else(|| overflow("/"))
}

fn builtin_div(args: &[Expr]) -> Result<Expr, Error> {
    let nums = numbers("/", args)?;
    let [first, rest @ ..] = nums.as_slice() else {
        return Err(Error::arity_error_for(Arity::AtLeast(1), 0, "/"));
    };
    if rest.is_empty() {
        return checked_div(1, *first).map(Expr::Number);
    }

    let mut result = *first;
    for n in rest {
        result = checked_div(result, *n)?;
    }
    Ok(Expr::Number(result))
}

// Macro to generate chained numeric comparison functions
macro_rules! numeric_comparison {
    ($name:ident, $op:tt, $op_str:expr) => {
        fn $name(args: &[Expr]) -> Result<Expr, Error> {
            let nums = numbers($op_str, args)?;
            Ok(Expr::bool(nums.windows(2).all(|pair| pair[0] $op pair[1])))
        }
    };
}

numeric_comparison!(builtin_lt, <, "<");
numeric_comparison!(builtin_le, <=, "<=");
numeric_comparison!(builtin_gt, >, ">");
numeric_comparison!(builtin_ge, >=, ">=");

fn builtin_eq(args: &[Expr]) -> Result<Expr, Error> {
    Ok(Expr::bool(args.windows(2).all(|pair| pair[0] == pair[1])))
}

fn builtin_list(args: &[Expr]) -> Result<Expr, Error> {
    Ok(Expr::list(args.to_vec()))
}

fn builtin_is_list(args: &[Expr]) -> Result<Expr, Error> {
    Ok(Expr::bool(matches!(args[0], Expr::List(_))))
}

fn count_of(expr: &Expr) -> usize {
    match expr {
        Expr::List(items) | Expr::Vector(items) => items.len(),
        Expr::Map(map) => map.len(),
        other if other.is_nil() => 0,
        _ => 1,
    }
}

fn builtin_count(args: &[Expr]) -> Result<Expr, Error> {
    NumberType::try_from(count_of(&args[0]))
        .map(Expr::Number)
        .map_err(|_| overflow("count"))
}

fn builtin_is_empty(args: &[Expr]) -> Result<Expr, Error> {
    Ok(Expr::bool(count_of(&args[0]) == 0))
}

fn builtin_not(args: &[Expr]) -> Result<Expr, Error> {
    Ok(Expr::bool(!args[0].is_truthy()))
}

fn builtin_pr_str(args: &[Expr]) -> Result<Expr, Error> {
    Ok(Expr::string(&print_joined(args, true, " ")))
}

fn builtin_str(args: &[Expr]) -> Result<Expr, Error> {
    Ok(Expr::string(&print_joined(args, false, "")))
}

/// Write `args` space-separated on one line.
fn print_line(out: &mut impl Write, args: &[Expr], readable: bool) -> Result<Expr, Error> {
    writeln!(out, "{}", print_joined(args, readable, " "))
        .and_then(|()| out.flush())
        .map_err(|e| Error::EvalError(format!("failed to write output: {e}")))?;
    Ok(nil())
}

fn builtin_prn(args: &[Expr]) -> Result<Expr, Error> {
    print_line(&mut io::stdout().lock(), args, true)
}

fn builtin_println(args: &[Expr]) -> Result<Expr, Error> {
    print_line(&mut io::stdout().lock(), args, false)
}

/// Global registry of all built-in operations.
static BUILTIN_OPS: LazyLock<Vec<BuiltinFn>> = LazyLock::new(|| {
    fn op(name: &'static str, arity: Arity, func: crate::ast::BuiltinImpl) -> BuiltinFn {
        BuiltinFn { name, arity, func }
    }

    vec![
        // Arithmetic operations
        op("+", Arity::Any, builtin_add),
        op("-", Arity::AtLeast(1), builtin_sub),
        op("*", Arity::Any, builtin_mul),
        op("/", Arity::AtLeast(1), builtin_div),
        // Comparison operations
        op("<", Arity::AtLeast(2), builtin_lt),
        op("<=", Arity::AtLeast(2), builtin_le),
        op(">", Arity::AtLeast(2), builtin_gt),
        op(">=", Arity::AtLeast(2), builtin_ge),
        op("=", Arity::AtLeast(2), builtin_eq),
        // Sequence operations
        op("list", Arity::Any, builtin_list),
        op("list?", Arity::Exact(1), builtin_is_list),
        op("count", Arity::Exact(1), builtin_count),
        op("empty?", Arity::Exact(1), builtin_is_empty),
        // Logical operations
        op("not", Arity::Exact(1), builtin_not),
        // Printing
        op("pr-str", Arity::Any, builtin_pr_str),
        op("str", Arity::Any, builtin_str),
        op("prn", Arity::Any, builtin_prn),
        op("println", Arity::Any, builtin_println),
    ]
});

/// Get all builtin operations
pub fn get_builtin_ops() -> &'static [BuiltinFn] {
    BUILTIN_OPS.as_slice()
}

/// Create the root environment holding every builtin.
pub fn create_global_env() -> Rc<Environment> {
    let env = Environment::new();
    for builtin in get_builtin_ops() {
        env.define(Symbol::intern(builtin.name), Expr::Builtin(builtin));
    }
    env
}
