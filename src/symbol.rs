//! Process-wide symbol interning.
//!
//! Every spelling maps to exactly one [`Symbol`], so symbol comparison is an
//! integer comparison. The table is created on first use and lives for the rest
//! of the process; it is never reset.

use std::fmt;
use std::sync::{LazyLock, Mutex, PoisonError};

use string_interner::{DefaultBackend, DefaultSymbol, StringInterner};

static INTERNER: LazyLock<Mutex<StringInterner<DefaultBackend>>> =
    LazyLock::new(|| Mutex::new(StringInterner::<DefaultBackend>::new()));

/// An interned identifier. Equality is identity of the interned spelling.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol(DefaultSymbol);

impl Symbol {
    /// Intern `name`, returning the existing symbol if it was seen before.
    pub fn intern(name: &str) -> Self {
        let mut interner = INTERNER.lock().unwrap_or_else(PoisonError::into_inner);
        Symbol(interner.get_or_intern(name))
    }

    /// Run `f` against the interned spelling without allocating.
    pub fn with_name<R>(self, f: impl FnOnce(&str) -> R) -> R {
        let interner = INTERNER.lock().unwrap_or_else(PoisonError::into_inner);
        // Symbols can only be created through `intern`, so resolution cannot miss.
        f(interner.resolve(self.0).unwrap_or_default())
    }

    pub fn name(self) -> String {
        self.with_name(str::to_owned)
    }

    /// Keywords are symbols spelled with a leading `:`; they evaluate to themselves.
    pub fn is_keyword(self) -> bool {
        self.with_name(|name| name.starts_with(':'))
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.with_name(|name| f.write_str(name))
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.with_name(|name| write!(f, "Symbol({name})"))
    }
}

/// Symbols the evaluator and printer look at, interned once.
pub(crate) struct WellKnown {
    pub nil: Symbol,
    pub true_: Symbol,
    pub false_: Symbol,
    pub ampersand: Symbol,
    pub def: Symbol,
    pub let_star: Symbol,
    pub do_: Symbol,
    pub if_: Symbol,
    pub fn_star: Symbol,
}

pub(crate) static WELL_KNOWN: LazyLock<WellKnown> = LazyLock::new(|| WellKnown {
    nil: Symbol::intern("nil"),
    true_: Symbol::intern("true"),
    false_: Symbol::intern("false"),
    ampersand: Symbol::intern("&"),
    def: Symbol::intern("def!"),
    let_star: Symbol::intern("let*"),
    do_: Symbol::intern("do"),
    if_: Symbol::intern("if"),
    fn_star: Symbol::intern("fn*"),
});
