use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use crate::Error;
use crate::ast::Expr;
use crate::symbol::Symbol;

/// A frame of symbol bindings chained to an optional parent frame.
///
/// Frames are shared through `Rc`: a closure keeps its defining frame alive for
/// as long as the closure itself is reachable. Bindings are only ever written
/// through the frame that owns them, so a child can shadow but never modify an
/// ancestor.
///
/// Frames made with [`Environment::extend_local`] hold `let*` bindings only:
/// `def!` passes through them to the nearest ordinary frame, see
/// [`Environment::definition_frame`].
#[derive(Default)]
pub struct Environment {
    bindings: RefCell<HashMap<Symbol, Expr>>,
    parent: Option<Rc<Environment>>,
    local: bool,
}

impl Environment {
    pub fn new() -> Rc<Self> {
        Rc::new(Environment::default())
    }

    /// Create a child frame whose parent is `self`.
    pub fn extend(self: &Rc<Self>) -> Rc<Self> {
        self.child(false)
    }

    /// Create a child frame for `let*` bindings.
    pub fn extend_local(self: &Rc<Self>) -> Rc<Self> {
        self.child(true)
    }

    fn child(self: &Rc<Self>, local: bool) -> Rc<Self> {
        Rc::new(Environment {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(Rc::clone(self)),
            local,
        })
    }

    /// The frame `def!` writes to: `self`, or the first ancestor that is not
    /// a `let*` frame.
    pub fn definition_frame(&self) -> &Environment {
        let mut frame = self;
        while frame.local {
            match frame.parent.as_deref() {
                Some(parent) => frame = parent,
                None => break,
            }
        }
        frame
    }

    /// Insert or overwrite a binding in this frame only.
    pub fn define(&self, symbol: Symbol, value: Expr) {
        self.bindings.borrow_mut().insert(symbol, value);
    }

    pub fn get(&self, symbol: Symbol) -> Option<Expr> {
        if let Some(value) = self.bindings.borrow().get(&symbol) {
            return Some(value.clone());
        }
        let mut frame = self.parent.as_deref();
        while let Some(env) = frame {
            if let Some(value) = env.bindings.borrow().get(&symbol) {
                return Some(value.clone());
            }
            frame = env.parent.as_deref();
        }
        None
    }

    /// Resolve `symbol` through the frame chain; running out of frames is an error.
    pub fn lookup(&self, symbol: Symbol) -> Result<Expr, Error> {
        self.get(symbol)
            .ok_or_else(|| Error::UnboundSymbol(symbol.name()))
    }

    /// Names bound anywhere in the chain, sorted and without duplicates.
    pub fn bound_names(&self) -> Vec<String> {
        let mut names = BTreeSet::new();
        let mut frame = Some(self);
        while let Some(env) = frame {
            names.extend(env.bindings.borrow().keys().map(|s| s.name()));
            frame = env.parent.as_deref();
        }
        names.into_iter().collect()
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("bindings", &self.bindings.borrow().len())
            .field("parent", &self.parent.is_some())
            .field("local", &self.local)
            .finish()
    }
}
