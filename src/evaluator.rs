//! Tree-walking evaluation of [`Expr`] trees.
//!
//! [`evaluate`] dispatches on the shape of the expression: maps and vectors
//! evaluate their elements, lists are special forms or applications, symbols
//! are looked up, and everything else evaluates to itself.
//!
//! Tail positions (the last body expression of `do`, `let*` and closures, and
//! the branch chosen by `if`) do not recurse: the special form hands back the
//! next expression and environment and the main loop continues with them, so
//! tail-recursive programs run in constant host stack.

use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::Error;
use crate::ast::{Closure, Expr, ExprMap, nil};
use crate::env::Environment;
use crate::printer::print;
use crate::symbol::{Symbol, WELL_KNOWN};

/// Number of arguments a callable accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Any,
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == n,
            Arity::AtLeast(n) => count >= n,
            Arity::Any => true,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "exactly {n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
            Arity::Any => write!(f, "any number of"),
        }
    }
}

/// The fixed set of forms that receive their arguments unevaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialForm {
    Def,
    Let,
    Do,
    If,
    Fn,
}

impl SpecialForm {
    pub const ALL: [SpecialForm; 5] = [
        SpecialForm::Def,
        SpecialForm::Let,
        SpecialForm::Do,
        SpecialForm::If,
        SpecialForm::Fn,
    ];

    pub fn from_symbol(symbol: Symbol) -> Option<Self> {
        let known = &*WELL_KNOWN;
        match symbol {
            s if s == known.def => Some(SpecialForm::Def),
            s if s == known.let_star => Some(SpecialForm::Let),
            s if s == known.do_ => Some(SpecialForm::Do),
            s if s == known.if_ => Some(SpecialForm::If),
            s if s == known.fn_star => Some(SpecialForm::Fn),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SpecialForm::Def => "def!",
            SpecialForm::Let => "let*",
            SpecialForm::Do => "do",
            SpecialForm::If => "if",
            SpecialForm::Fn => "fn*",
        }
    }

    /// Shape reported when the form is malformed.
    fn shape(self) -> &'static str {
        match self {
            SpecialForm::Def => "(def! name value ...)",
            SpecialForm::Let => "(let* [name value ...] body ...)",
            SpecialForm::Do => "(do expr ...)",
            SpecialForm::If => "(if cond then ... [else])",
            SpecialForm::Fn => "(fn* [param ... [& rest]] body ...)",
        }
    }

    fn malformed(self) -> Error {
        Error::MalformedForm {
            form: self.name(),
            expected: self.shape(),
        }
    }

    /// Run the form against its unevaluated arguments.
    fn apply(self, args: &[Expr], env: &Rc<Environment>) -> Result<Step, Error> {
        trace!(form = self.name(), args = args.len(), "special form");
        match self {
            SpecialForm::Def => eval_def(args, env).map(Step::Done),
            SpecialForm::Let => eval_let(args, env),
            SpecialForm::Do => eval_do(args, env),
            SpecialForm::If => eval_if(args, env),
            SpecialForm::Fn => eval_fn(args, env).map(Step::Done),
        }
    }
}

/// Outcome of a special form or closure application.
enum Step {
    /// A final value.
    Done(Expr),
    /// Continue by evaluating `expr` in `env` (tail position).
    Continue(Expr, Rc<Environment>),
}

/// Evaluate `expr` in `env`.
pub fn evaluate(expr: &Expr, env: &Rc<Environment>) -> Result<Expr, Error> {
    let mut expr = expr.clone();
    let mut env = Rc::clone(env);

    loop {
        let step = match &expr {
            Expr::Map(map) => {
                let mut evaluated = ExprMap::new();
                for (key, value) in map.iter() {
                    evaluated.insert(evaluate(key, &env)?, evaluate(value, &env)?);
                }
                return Ok(Expr::map(evaluated));
            }
            Expr::Vector(items) => {
                return Ok(Expr::vector(eval_each(items, &env)?));
            }
            Expr::List(items) if !items.is_empty() => {
                let items = Rc::clone(items);
                let (head, args) = (&items[0], &items[1..]);
                let special = match head {
                    Expr::Symbol(symbol) => SpecialForm::from_symbol(*symbol),
                    _ => None,
                };
                match special {
                    Some(form) => form.apply(args, &env)?,
                    None => {
                        let callee = evaluate(head, &env)?;
                        let args = eval_each(args, &env)?;
                        apply(&callee, args)?
                    }
                }
            }
            Expr::Symbol(symbol) => return resolve_symbol(*symbol, &env),
            _ => return Ok(expr.clone()),
        };

        match step {
            Step::Done(value) => return Ok(value),
            Step::Continue(next, next_env) => {
                expr = next;
                env = next_env;
            }
        }
    }
}

fn resolve_symbol(symbol: Symbol, env: &Environment) -> Result<Expr, Error> {
    let known = &*WELL_KNOWN;
    if symbol == known.nil || symbol == known.true_ || symbol == known.false_ || symbol.is_keyword()
    {
        return Ok(Expr::Symbol(symbol));
    }
    env.lookup(symbol)
}

fn eval_each(exprs: &[Expr], env: &Rc<Environment>) -> Result<Vec<Expr>, Error> {
    exprs.iter().map(|expr| evaluate(expr, env)).collect()
}

/// Call an already evaluated callable with evaluated arguments.
///
/// Builtins run to completion; closures bind their parameters in a child of
/// the captured environment and continue with their body.
fn apply(callee: &Expr, args: Vec<Expr>) -> Result<Step, Error> {
    match callee {
        Expr::Builtin(builtin) => builtin.call(&args).map(Step::Done),
        Expr::Closure(closure) => {
            trace!(args = args.len(), "apply closure");
            let frame = bind_arguments(closure, args)?;
            eval_body(&closure.body, frame)
        }
        other => Err(Error::NotCallable(print(other, true))),
    }
}

fn bind_arguments(closure: &Closure, mut args: Vec<Expr>) -> Result<Rc<Environment>, Error> {
    let arity = closure.arity();
    if !arity.accepts(args.len()) {
        return Err(Error::arity_error_for(arity, args.len(), "fn*"));
    }

    let rest = args.split_off(closure.params.len());
    let mut bindings: Vec<(Symbol, Expr)> = closure.params.iter().copied().zip(args).collect();
    if let Some(rest_param) = closure.rest {
        bindings.push((rest_param, Expr::list(rest)));
    }

    let frame = closure.env.extend();
    bind_all(&frame, bindings);
    Ok(frame)
}

/// Binding routine shared by `def!` and closure parameters.
fn bind_all(env: &Environment, bindings: impl IntoIterator<Item = (Symbol, Expr)>) -> Option<Expr> {
    let mut last = None;
    for (symbol, value) in bindings {
        env.define(symbol, value.clone());
        last = Some(value);
    }
    last
}

/// Evaluate all but the last expression, then continue with the last in tail position.
fn eval_body(body: &[Expr], env: Rc<Environment>) -> Result<Step, Error> {
    match body.split_last() {
        None => Ok(Step::Done(nil())),
        Some((last, init)) => {
            for expr in init {
                evaluate(expr, &env)?;
            }
            Ok(Step::Continue(last.clone(), env))
        }
    }
}

/// Evaluate `def!` special form
fn eval_def(args: &[Expr], env: &Rc<Environment>) -> Result<Expr, Error> {
    if args.is_empty() || args.len() % 2 != 0 {
        return Err(SpecialForm::Def.malformed());
    }

    let mut last = nil();
    for pair in args.chunks_exact(2) {
        let Expr::Symbol(name) = &pair[0] else {
            return Err(Error::TypeError(format!(
                "def! requires a symbol, got {}",
                print(&pair[0], true)
            )));
        };
        let value = evaluate(&pair[1], env)?;
        debug!(symbol = %name, "def!");
        if let Some(bound) = bind_all(env.definition_frame(), [(*name, value)]) {
            last = bound;
        }
    }
    Ok(last)
}

/// Evaluate `let*` special form
fn eval_let(args: &[Expr], env: &Rc<Environment>) -> Result<Step, Error> {
    let [bindings, body @ ..] = args else {
        return Err(SpecialForm::Let.malformed());
    };
    let Some(bindings) = bindings.as_sequence() else {
        return Err(SpecialForm::Let.malformed());
    };
    if bindings.len() % 2 != 0 || body.is_empty() {
        return Err(SpecialForm::Let.malformed());
    }

    let frame = env.extend_local();
    for pair in bindings.chunks_exact(2) {
        let Expr::Symbol(name) = &pair[0] else {
            return Err(Error::TypeError(format!(
                "let* binding name must be a symbol, got {}",
                print(&pair[0], true)
            )));
        };
        let value = evaluate(&pair[1], &frame)?;
        frame.define(*name, value);
    }
    eval_body(body, frame)
}

/// Evaluate `do` special form
fn eval_do(args: &[Expr], env: &Rc<Environment>) -> Result<Step, Error> {
    eval_body(args, Rc::clone(env))
}

/// Evaluate `if` special form: `(if c1 t1 c2 t2 ... [else])`
fn eval_if(args: &[Expr], env: &Rc<Environment>) -> Result<Step, Error> {
    if args.len() < 2 {
        return Err(SpecialForm::If.malformed());
    }

    let mut clauses = args.chunks_exact(2);
    for clause in clauses.by_ref() {
        if evaluate(&clause[0], env)?.is_truthy() {
            return Ok(Step::Continue(clause[1].clone(), Rc::clone(env)));
        }
    }
    match clauses.remainder() {
        [otherwise] => Ok(Step::Continue(otherwise.clone(), Rc::clone(env))),
        _ => Ok(Step::Done(nil())),
    }
}

/// Evaluate `fn*` special form
fn eval_fn(args: &[Expr], env: &Rc<Environment>) -> Result<Expr, Error> {
    let [params, body @ ..] = args else {
        return Err(SpecialForm::Fn.malformed());
    };
    let Some(params) = params.as_sequence() else {
        return Err(SpecialForm::Fn.malformed());
    };

    let (params, rest) = parse_params(params)?;
    Ok(Expr::Closure(Rc::new(Closure {
        params,
        rest,
        body: body.into(),
        env: Rc::clone(env),
    })))
}

/// Split a parameter list into fixed parameters and an optional `& rest` parameter.
fn parse_params(params: &[Expr]) -> Result<(Vec<Symbol>, Option<Symbol>), Error> {
    let ampersand = WELL_KNOWN.ampersand;
    let mut symbols = Vec::with_capacity(params.len());
    for param in params {
        match param {
            Expr::Symbol(symbol) => symbols.push(*symbol),
            other => {
                return Err(Error::TypeError(format!(
                    "fn* parameters must be symbols, got {}",
                    print(other, true)
                )));
            }
        }
    }

    match symbols.iter().position(|s| *s == ampersand) {
        None => Ok((symbols, None)),
        Some(index) if index + 2 == symbols.len() && symbols[index + 1] != ampersand => {
            let rest = symbols[index + 1];
            symbols.truncate(index);
            Ok((symbols, Some(rest)))
        }
        Some(_) => Err(Error::EvalError(
            "invalid fn* arity definition: '&' must be followed by exactly one rest parameter at the end".to_owned(),
        )),
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{list, num, sym, vector};
    use crate::builtinops::create_global_env;
    use crate::reader::read;

    /// Test result variants for comprehensive testing
    #[derive(Debug)]
    enum TestResult {
        EvalResult(Expr),            // Evaluation should succeed with this value
        Printed(&'static str),       // Evaluation should succeed and print readably as this
        SpecificError(&'static str), // Evaluation should fail with error containing this string
        AnyError,                    // Evaluation should fail (any error)
    }
    use TestResult::*;

    /// Test environment containing test cases that share state
    struct TestEnvironment(Vec<(&'static str, TestResult)>);

    fn success(value: Expr) -> TestResult {
        EvalResult(value)
    }

    /// Execute a single test case with detailed error reporting
    fn execute_test_case(input: &str, expected: &TestResult, env: &Rc<Environment>, test_id: &str) {
        let expr = match read(input) {
            Ok(expr) => expr,
            Err(read_err) => {
                panic!("{test_id}: unexpected read error for '{input}': {read_err:?}");
            }
        };

        match (evaluate(&expr, env), expected) {
            (Ok(actual), EvalResult(expected_val)) => {
                assert_eq!(actual, *expected_val, "{test_id}: '{input}'");
            }
            (Ok(actual), Printed(text)) => {
                assert_eq!(print(&actual, true), *text, "{test_id}: '{input}'");
            }
            (Err(_), AnyError) => {}
            (Err(e), SpecificError(expected_text)) => {
                let error_msg = format!("{e}");
                assert!(
                    error_msg.contains(expected_text),
                    "{test_id}: error should contain '{expected_text}', got: {error_msg}"
                );
            }
            (Ok(actual), AnyError | SpecificError(_)) => {
                panic!("{test_id}: expected error for '{input}', got {actual:?}");
            }
            (Err(err), EvalResult(_) | Printed(_)) => {
                panic!("{test_id}: expected {expected:?} for '{input}', got error {err:?}");
            }
        }
    }

    /// Each case runs in a fresh global environment
    fn run_comprehensive_tests(test_cases: Vec<(&str, TestResult)>) {
        for (i, (input, expected)) in test_cases.iter().enumerate() {
            let env = create_global_env().extend();
            execute_test_case(input, expected, &env, &format!("#{}", i + 1));
        }
    }

    /// Cases inside one environment share state
    fn run_tests_in_environment(test_environments: Vec<TestEnvironment>) {
        for (env_idx, TestEnvironment(test_cases)) in test_environments.iter().enumerate() {
            let env = create_global_env().extend();
            for (test_idx, (input, expected)) in test_cases.iter().enumerate() {
                let test_id = format!("Environment #{} test #{}", env_idx + 1, test_idx + 1);
                execute_test_case(input, expected, &env, &test_id);
            }
        }
    }

    #[test]
    fn test_self_evaluating_forms() {
        run_comprehensive_tests(vec![
            ("42", success(num(42))),
            ("\"s\"", success(Expr::string("s"))),
            ("nil", success(crate::ast::nil())),
            ("true", success(Expr::bool(true))),
            ("false", success(Expr::bool(false))),
            (":keyword", success(sym(":keyword"))),
            ("()", success(list([]))),
            ("[1 (+ 1 1) [3]]", success(vector([num(1), num(2), vector([num(3)])]))),
            ("{\"a\" (+ 1 1) :b [1 (* 2 2)]}", Printed("{\"a\" 2 :b [1 4]}")),
            ("{(+ 1 1) 1 2 3}", Printed("{2 3}")),
            ("unknown", SpecificError("'unknown' not found")),
        ]);
    }

    #[test]
    fn test_special_forms() {
        run_comprehensive_tests(vec![
            // === def! ===
            ("(def! x 3)", success(num(3))),
            ("(def! a 1 b 2)", success(num(2))),
            ("(def! a 1 b (+ a 1))", success(num(2))),
            ("(def!)", SpecificError("malformed def!")),
            ("(def! a)", SpecificError("malformed def!")),
            ("(def! 1 2)", SpecificError("requires a symbol")),
            // === let* ===
            ("(let* [x 1] x)", success(num(1))),
            ("(let* (x 1 y (+ x 1)) y)", success(num(2))),
            ("(let* [x 1] (let* [x 2] x))", success(num(2))),
            ("(let* [x 1] (do (let* [x 2] x) x))", success(num(1))),
            ("(let* [x 1] 5 6 x)", success(num(1))),
            ("(let* [] 7)", success(num(7))),
            ("(let* [x] x)", SpecificError("malformed let*")),
            ("(let* [x 1])", SpecificError("malformed let*")),
            ("(let* x 1)", SpecificError("malformed let*")),
            ("(let* [1 2] 3)", SpecificError("must be a symbol")),
            // === do ===
            ("(do)", success(crate::ast::nil())),
            ("(do 1 2 3)", success(num(3))),
            // === if ===
            ("(if 0 \"yes\" \"no\")", success(Expr::string("yes"))),
            ("(if false \"yes\" \"no\")", success(Expr::string("no"))),
            ("(if nil \"yes\" \"no\")", success(Expr::string("no"))),
            ("(if [] 1 2)", success(num(1))),
            ("(if \"\" 1 2)", success(num(1))),
            ("(if false 1)", success(crate::ast::nil())),
            ("(if false 1 false 2 3)", success(num(3))),
            ("(if false 1 true 2 3)", success(num(2))),
            ("(if false 1 false 2)", success(crate::ast::nil())),
            ("(if true 1 (undefined))", success(num(1))),
            ("(if false (undefined) 2)", success(num(2))),
            ("(if)", SpecificError("malformed if")),
            ("(if true)", SpecificError("malformed if")),
            // === fn* ===
            ("((fn* [a b] (+ a b)) 1 2)", success(num(3))),
            ("((fn* (a) a) 1)", success(num(1))),
            ("((fn* []))", success(crate::ast::nil())),
            ("((fn* [] 1 2 3))", success(num(3))),
            ("((fn* [a & rest] rest) 1 2 3)", success(list([num(2), num(3)]))),
            ("((fn* [a & rest] rest) 1)", success(list([]))),
            ("((fn* [& all] all))", success(list([]))),
            ("((fn* [a b] a) 1)", SpecificError("expected exactly 2 arguments, got 1")),
            ("((fn* [a & r] a))", SpecificError("expected at least 1 arguments, got 0")),
            ("(fn* [a &] a)", SpecificError("invalid fn* arity definition")),
            ("(fn* [& a b] a)", SpecificError("invalid fn* arity definition")),
            ("(fn* [& & a] a)", SpecificError("invalid fn* arity definition")),
            ("(fn* [1] 1)", SpecificError("parameters must be symbols")),
            ("(fn* x x)", SpecificError("malformed fn*")),
            ("(fn*)", SpecificError("malformed fn*")),
            ("(fn* [] 1)", Printed("#<function>")),
        ]);
    }

    #[test]
    fn test_application() {
        run_comprehensive_tests(vec![
            ("(+ 1 2)", success(num(3))),
            ("((if true + *) 2 3)", success(num(5))),
            ("((if false + *) 2 3)", success(num(6))),
            ("(1 2 3)", SpecificError("1 is not callable")),
            ("(\"f\" 1)", SpecificError("\"f\" is not callable")),
            ("([1] 1)", SpecificError("[1] is not callable")),
            ("(undefined-symbol)", SpecificError("'undefined-symbol' not found")),
            ("(+ 1 (undefined))", AnyError),
            ("(nil)", SpecificError("nil is not callable")),
        ]);
    }

    #[test]
    fn test_stateful_environments() {
        run_tests_in_environment(vec![
            // Lexical scoping: the closure sees its defining x, not the caller's
            TestEnvironment(vec![
                ("(let* [x 1] (def! f (fn* [] x)))", Printed("#<function>")),
                ("(let* [x 2] (f))", success(num(1))),
                ("(def! x 3)", success(num(3))),
                ("(f)", success(num(1))),
            ]),
            // def! inside let* binds past the let* frame, def! inside a call stays in it
            TestEnvironment(vec![
                ("(let* [y 1] (def! z y))", success(num(1))),
                ("z", success(num(1))),
                ("y", SpecificError("'y' not found")),
                ("(def! g (fn* [] (do (def! inner 7) inner)))", Printed("#<function>")),
                ("(g)", success(num(7))),
                ("inner", SpecificError("'inner' not found")),
                ("(let* [w 1] (def! w 5) w)", success(num(1))),
                ("w", success(num(5))),
            ]),
            // Closures over closures
            TestEnvironment(vec![
                ("(def! adder (fn* [n] (fn* [x] (+ x n))))", Printed("#<function>")),
                ("(def! add5 (adder 5))", Printed("#<function>")),
                ("(add5 10)", success(num(15))),
            ]),
            // Recursion through the global environment
            TestEnvironment(vec![
                (
                    "(def! fib (fn* [n] (if (< n 2) n (+ (fib (- n 1)) (fib (- n 2))))))",
                    Printed("#<function>"),
                ),
                ("(fib 10)", success(num(55))),
            ]),
            // Failed lines leave earlier bindings alone
            TestEnvironment(vec![
                ("(def! a 1)", success(num(1))),
                ("(def! a (undefined))", AnyError),
                ("a", success(num(1))),
                ("(def! b 2 c (undefined))", AnyError),
                ("b", success(num(2))),
            ]),
            // Parameters shadow globals without touching them
            TestEnvironment(vec![
                ("(def! x 10)", success(num(10))),
                ("((fn* [x] (* x 2)) 4)", success(num(8))),
                ("x", success(num(10))),
            ]),
        ]);
    }

    #[test]
    fn test_tail_calls_run_in_constant_stack() {
        let env = create_global_env().extend();
        let define = read("(def! count-down (fn* [n acc] (if (= n 0) acc (count-down (- n 1) (+ acc 1)))))").unwrap();
        evaluate(&define, &env).unwrap();
        let run = read("(count-down 100000 0)").unwrap();
        assert_eq!(evaluate(&run, &env).unwrap(), num(100000));

        let define = read("(def! loop (fn* [n] (do (let* [m (- n 1)] (if (> m 0) (loop m) :done)))))").unwrap();
        evaluate(&define, &env).unwrap();
        let run = read("(loop 100000)").unwrap();
        assert_eq!(evaluate(&run, &env).unwrap(), sym(":done"));

        // The accumulated value nests one level per iteration
        let define = read("(def! nest (fn* [n acc] (if (= n 0) (count acc) (nest (- n 1) (list acc)))))").unwrap();
        evaluate(&define, &env).unwrap();
        let run = read("(nest 200000 ())").unwrap();
        assert_eq!(evaluate(&run, &env).unwrap(), num(1));
    }

    #[test]
    fn test_arity_display() {
        assert_eq!(format!("{}", Arity::Exact(2)), "exactly 2");
        assert_eq!(format!("{}", Arity::AtLeast(1)), "at least 1");
        assert!(Arity::Any.accepts(0));
        assert!(!Arity::AtLeast(2).accepts(1));
        assert!(Arity::Exact(0).accepts(0));
    }

    #[test]
    fn test_special_form_names() {
        for form in SpecialForm::ALL {
            assert_eq!(SpecialForm::from_symbol(Symbol::intern(form.name())), Some(form));
        }
        assert_eq!(SpecialForm::from_symbol(Symbol::intern("quote")), None);
    }
}
