//! Core expression types.
//!
//! [`Expr`] is a closed sum type covering every value the reader can produce and
//! every value the evaluator can compute: numbers, strings, interned symbols,
//! lists, vectors, insertion-ordered maps, closures and builtin callables.
//! Collections share their storage through `Rc`, so cloning an expression is
//! cheap regardless of its size. Helper constructors ([`num`], [`sym`], [`list`],
//! [`vector`], [`nil`]) keep tests and builtins terse.

use std::fmt;
use std::rc::Rc;

use crate::Error;
use crate::env::Environment;
use crate::evaluator::Arity;
use crate::symbol::{Symbol, WELL_KNOWN};

/// Type alias for number values in interpreter
pub type NumberType = i64;

/// Core expression type
#[derive(Clone)]
pub enum Expr {
    Number(NumberType),
    String(Rc<str>),
    Symbol(Symbol),
    List(Rc<[Expr]>),
    Vector(Rc<[Expr]>),
    Map(Rc<ExprMap>),
    Closure(Rc<Closure>),
    Builtin(&'static BuiltinFn),
}

/// Insertion-ordered associative collection with structurally unique keys.
#[derive(Clone, Default, PartialEq)]
pub struct ExprMap {
    entries: Vec<(Expr, Expr)>,
}

impl ExprMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. A replaced key keeps its original position.
    pub fn insert(&mut self, key: Expr, value: Expr) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &Expr) -> Option<&Expr> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Expr, &Expr)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    /// Pair up consecutive items. A trailing unpaired key is bound to nil.
    pub fn from_items(items: Vec<Expr>) -> Self {
        let mut map = ExprMap::new();
        let mut items = items.into_iter();
        while let Some(key) = items.next() {
            map.insert(key, items.next().unwrap_or_else(nil));
        }
        map
    }
}

/// A user-defined function together with the environment it was defined in.
pub struct Closure {
    pub params: Vec<Symbol>,
    /// Collects surplus arguments when the parameter list ends in `& rest`
    pub rest: Option<Symbol>,
    pub body: Rc<[Expr]>,
    pub env: Rc<Environment>,
}

impl Closure {
    pub fn arity(&self) -> Arity {
        match self.rest {
            Some(_) => Arity::AtLeast(self.params.len()),
            None => Arity::Exact(self.params.len()),
        }
    }
}

// The captured environment is left out: it usually contains the closure itself.
impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("params", &self.params)
            .field("rest", &self.rest)
            .field("body", &self.body)
            .finish_non_exhaustive()
    }
}

/// Canonical builtin signature: arguments are already evaluated and arity-checked.
pub type BuiltinImpl = fn(&[Expr]) -> Result<Expr, Error>;

/// A primitive callable installed in the root environment.
pub struct BuiltinFn {
    pub name: &'static str,
    pub arity: Arity,
    pub func: BuiltinImpl,
}

impl BuiltinFn {
    pub fn call(&self, args: &[Expr]) -> Result<Expr, Error> {
        if !self.arity.accepts(args.len()) {
            return Err(Error::arity_error_for(self.arity, args.len(), self.name));
        }
        (self.func)(args)
    }
}

impl fmt::Debug for BuiltinFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BuiltinFn({})", self.name)
    }
}

/// Dismantle nested collections with an explicit work list, so dropping a
/// deeply nested value does not recurse once per level.
impl Drop for Expr {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        take_children(self, &mut pending);
        while let Some(mut expr) = pending.pop() {
            take_children(&mut expr, &mut pending);
        }
    }
}

/// Move the children of a uniquely owned collection onto `pending`.
fn take_children(expr: &mut Expr, pending: &mut Vec<Expr>) {
    let placeholder = || Expr::Number(0);
    match expr {
        Expr::List(items) | Expr::Vector(items) => {
            if let Some(items) = Rc::get_mut(items) {
                pending.extend(items.iter_mut().map(|item| std::mem::replace(item, placeholder())));
            }
        }
        Expr::Map(map) => {
            if let Some(map) = Rc::get_mut(map) {
                pending.extend(map.entries.drain(..).flat_map(|(k, v)| [k, v]));
            }
        }
        _ => {}
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "Number({n})"),
            Expr::String(s) => write!(f, "String({s:?})"),
            Expr::Symbol(s) => write!(f, "{s:?}"),
            Expr::List(items) => f.debug_tuple("List").field(items).finish(),
            Expr::Vector(items) => f.debug_tuple("Vector").field(items).finish(),
            Expr::Map(map) => f.debug_map().entries(map.iter()).finish(),
            Expr::Closure(closure) => write!(f, "{closure:?}"),
            Expr::Builtin(builtin) => write!(f, "{builtin:?}"),
        }
    }
}

impl Expr {
    pub fn list(items: Vec<Expr>) -> Self {
        Expr::List(items.into())
    }

    pub fn vector(items: Vec<Expr>) -> Self {
        Expr::Vector(items.into())
    }

    pub fn map(map: ExprMap) -> Self {
        Expr::Map(Rc::new(map))
    }

    pub fn string(s: &str) -> Self {
        Expr::String(s.into())
    }

    pub fn bool(b: bool) -> Self {
        Expr::Symbol(if b { WELL_KNOWN.true_ } else { WELL_KNOWN.false_ })
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Expr::Symbol(s) if *s == WELL_KNOWN.nil)
    }

    /// Everything except nil and false is truthy, including 0 and empty collections.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Expr::Symbol(s) if *s == WELL_KNOWN.nil || *s == WELL_KNOWN.false_)
    }

    /// Elements of a List or Vector.
    pub fn as_sequence(&self) -> Option<&[Expr]> {
        match self {
            Expr::List(items) | Expr::Vector(items) => Some(items),
            _ => None,
        }
    }

    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Expr::Number(_) => "number",
            Expr::String(_) => "string",
            Expr::Symbol(_) => "symbol",
            Expr::List(_) => "list",
            Expr::Vector(_) => "vector",
            Expr::Map(_) => "map",
            Expr::Closure(_) | Expr::Builtin(_) => "function",
        }
    }
}

impl From<NumberType> for Expr {
    fn from(n: NumberType) -> Self {
        Expr::Number(n)
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        Expr::string(s)
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        Expr::bool(b)
    }
}

/// Structural equality: numbers and strings by value, symbols by identity,
/// lists and vectors interchangeably element by element, maps by their entry
/// sequences, closures by identity and builtins by name.
impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Expr::Number(a), Expr::Number(b)) => a == b,
            (Expr::String(a), Expr::String(b)) => a == b,
            (Expr::Symbol(a), Expr::Symbol(b)) => a == b,
            (
                Expr::List(a) | Expr::Vector(a),
                Expr::List(b) | Expr::Vector(b),
            ) => a == b,
            (Expr::Map(a), Expr::Map(b)) => a == b,
            (Expr::Closure(a), Expr::Closure(b)) => Rc::ptr_eq(a, b),
            (Expr::Builtin(a), Expr::Builtin(b)) => a.name == b.name,
            _ => false,
        }
    }
}

pub fn num(n: NumberType) -> Expr {
    Expr::Number(n)
}

pub fn sym(name: &str) -> Expr {
    Expr::Symbol(Symbol::intern(name))
}

pub fn list<const N: usize>(items: [Expr; N]) -> Expr {
    Expr::list(items.into())
}

pub fn vector<const N: usize>(items: [Expr; N]) -> Expr {
    Expr::vector(items.into())
}

pub fn nil() -> Expr {
    Expr::Symbol(WELL_KNOWN.nil)
}
