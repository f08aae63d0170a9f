//! Environment for variable bindings
//!
//! An Environment is a lexical scope. Scopes form a chain, with each child
//! frame referencing the frame it extends. Every frame in a chain shares one
//! `Shared` block holding the symbol table, the protected-symbol set and the
//! evaluation depth counter.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{LispError, Result};
use crate::interner::{Symbol, SymbolTable};
use crate::language::{Closure, Value};

pub const DEFAULT_MAX_DEPTH: usize = 512;

// Remaining stack below which recursion continues on a fresh segment
const STACK_RED_ZONE: usize = 128 * 1024;
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

/// Run `f`, moving to a new stack segment first if the current one is nearly full.
///
/// Every recursive walk over values goes through this, so nesting is bounded by
/// `max_depth` (or by memory) rather than by the host thread's stack size.
pub fn with_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, f)
}

// ============================================================================
// Environment
// ============================================================================

// State common to every frame created from one global environment
struct Shared {
    symbols: SymbolTable,
    protected: RefCell<FxHashSet<Symbol>>,
    depth: Cell<usize>,
    max_depth: Cell<usize>,
}

struct Frame {
    values: RefCell<FxHashMap<Symbol, Value>>,
    macros: RefCell<FxHashMap<Symbol, Rc<Closure>>>,
    outer: Option<Environment>,
    shared: Rc<Shared>,
}

/// A scope frame plus the chain of frames it extends.
///
/// Cloning is cheap (an Rc increment) and clones share the same frame, so a
/// binding made through one handle is visible through all of them.
#[derive(Clone)]
pub struct Environment {
    frame: Rc<Frame>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new_global(SymbolTable::default())
    }
}

impl Environment {
    /// Create a new, empty global environment owning `symbols`
    pub fn new_global(symbols: SymbolTable) -> Self {
        Environment {
            frame: Rc::new(Frame {
                values: RefCell::new(FxHashMap::default()),
                macros: RefCell::new(FxHashMap::default()),
                outer: None,
                shared: Rc::new(Shared {
                    symbols,
                    protected: RefCell::new(FxHashSet::default()),
                    depth: Cell::new(0),
                    max_depth: Cell::new(DEFAULT_MAX_DEPTH),
                }),
            }),
        }
    }

    /// Create an empty child frame extending this one
    pub fn extend(&self) -> Self {
        Environment {
            frame: Rc::new(Frame {
                values: RefCell::new(FxHashMap::default()),
                macros: RefCell::new(FxHashMap::default()),
                outer: Some(self.clone()),
                shared: self.frame.shared.clone(),
            }),
        }
    }

    /// The outermost frame of this chain
    pub fn global(&self) -> Environment {
        let mut env = self;
        while let Some(outer) = &env.frame.outer {
            env = outer;
        }
        env.clone()
    }

    pub fn is_global(&self) -> bool {
        self.frame.outer.is_none()
    }

    /// True when both handles refer to the same frame
    pub fn same_frame(&self, other: &Environment) -> bool {
        Rc::ptr_eq(&self.frame, &other.frame)
    }

    pub fn symbol_table(&self) -> &SymbolTable {
        &self.frame.shared.symbols
    }

    pub fn intern(&self, name: &str) -> Symbol {
        self.frame.shared.symbols.intern(name)
    }

    // ========================================================================
    // Bindings
    // ========================================================================

    /// Bind `symbol` in the current frame, replacing any existing binding
    pub fn define(&self, symbol: &Symbol, value: Value) -> Result<()> {
        self.check_mutable(symbol)?;
        self.frame.values.borrow_mut().insert(symbol.clone(), value);
        Ok(())
    }

    /// Overwrite the nearest existing binding of `symbol`
    pub fn set(&self, symbol: &Symbol, value: Value) -> Result<()> {
        self.check_mutable(symbol)?;
        let mut env = self;
        loop {
            if let Some(slot) = env.frame.values.borrow_mut().get_mut(symbol) {
                *slot = value;
                return Ok(());
            }
            match &env.frame.outer {
                Some(outer) => env = outer,
                None => return Err(LispError::UndefinedSymbol(symbol.to_string())),
            }
        }
    }

    /// Look up a variable, walking up the parent chain
    pub fn lookup(&self, symbol: &Symbol) -> Option<Value> {
        let mut env = self;
        loop {
            if let Some(value) = env.frame.values.borrow().get(symbol) {
                return Some(value.clone());
            }
            env = env.frame.outer.as_ref()?;
        }
    }

    pub fn get(&self, symbol: &Symbol) -> Result<Value> {
        self.lookup(symbol)
            .ok_or_else(|| LispError::UndefinedSymbol(symbol.to_string()))
    }

    /// Promote `symbol` to a constant for every frame sharing this chain's state
    pub fn make_constant(&self, symbol: &Symbol) {
        self.frame.shared.protected.borrow_mut().insert(symbol.clone());
    }

    pub fn is_constant(&self, symbol: &Symbol) -> bool {
        self.frame.shared.protected.borrow().contains(symbol)
    }

    fn check_mutable(&self, symbol: &Symbol) -> Result<()> {
        if self.is_constant(symbol) {
            return Err(LispError::ConstantViolation(symbol.to_string()));
        }
        Ok(())
    }

    // ========================================================================
    // Macros
    // ========================================================================

    pub fn define_macro(&self, symbol: &Symbol, expander: Rc<Closure>) {
        self.frame.macros.borrow_mut().insert(symbol.clone(), expander);
    }

    pub fn get_macro(&self, symbol: &Symbol) -> Option<Rc<Closure>> {
        let mut env = self;
        loop {
            if let Some(expander) = env.frame.macros.borrow().get(symbol) {
                return Some(expander.clone());
            }
            env = env.frame.outer.as_ref()?;
        }
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Symbols bound in this frame only, sorted by name
    pub fn symbols(&self) -> Vec<Symbol> {
        let mut symbols: Vec<Symbol> = self.frame.values.borrow().keys().cloned().collect();
        symbols.sort_by(|a, b| a.name().cmp(b.name()));
        symbols
    }

    /// Macros registered in this frame only, sorted by name
    pub fn macros(&self) -> Vec<Symbol> {
        let mut symbols: Vec<Symbol> = self.frame.macros.borrow().keys().cloned().collect();
        symbols.sort_by(|a, b| a.name().cmp(b.name()));
        symbols
    }

    /// Drop every binding and macro in this frame.
    ///
    /// Closures stored in a frame hold that frame alive; clearing breaks the cycle.
    pub fn clear(&self) {
        let values = std::mem::take(&mut *self.frame.values.borrow_mut());
        let macros = std::mem::take(&mut *self.frame.macros.borrow_mut());
        drop(values);
        drop(macros);
    }

    // ========================================================================
    // Depth accounting
    // ========================================================================

    pub fn max_depth(&self) -> usize {
        self.frame.shared.max_depth.get()
    }

    pub fn set_max_depth(&self, depth: usize) {
        self.frame.shared.max_depth.set(depth);
    }

    /// Count one nested evaluation; the guard releases it when dropped.
    pub fn enter(&self) -> Result<DepthGuard> {
        let shared = &self.frame.shared;
        let depth = shared.depth.get() + 1;
        if depth > shared.max_depth.get() {
            return Err(LispError::StackExhausted {
                depth: shared.max_depth.get(),
            });
        }
        shared.depth.set(depth);
        Ok(DepthGuard {
            shared: shared.clone(),
        })
    }
}

pub struct DepthGuard {
    shared: Rc<Shared>,
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        self.shared.depth.set(self.shared.depth.get().saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Value {
        Value::Number(n)
    }

    #[test]
    fn test_define_and_get() {
        let env = Environment::default();
        let x = env.intern("x");
        env.define(&x, num(1.0)).unwrap();
        assert_eq!(env.get(&x).unwrap(), num(1.0));
    }

    #[test]
    fn test_get_undefined_fails() {
        let env = Environment::default();
        let err = env.get(&env.intern("missing")).unwrap_err();
        assert_eq!(err, LispError::UndefinedSymbol("missing".into()));
    }

    #[test]
    fn test_define_shadows_in_child_only() {
        let global = Environment::default();
        let x = global.intern("x");
        global.define(&x, num(1.0)).unwrap();

        let child = global.extend();
        child.define(&x, num(2.0)).unwrap();
        assert_eq!(child.get(&x).unwrap(), num(2.0));
        assert_eq!(global.get(&x).unwrap(), num(1.0));
    }

    #[test]
    fn test_set_updates_nearest_binding() {
        let global = Environment::default();
        let x = global.intern("x");
        global.define(&x, num(1.0)).unwrap();

        let child = global.extend();
        child.set(&x, num(5.0)).unwrap();
        assert_eq!(global.get(&x).unwrap(), num(5.0));
        assert!(child.symbols().is_empty());
    }

    #[test]
    fn test_set_undefined_fails() {
        let env = Environment::default();
        let y = env.intern("y");
        assert_eq!(
            env.set(&y, num(1.0)).unwrap_err(),
            LispError::UndefinedSymbol("y".into())
        );
    }

    #[test]
    fn test_constant_blocks_define_and_set_everywhere() {
        let global = Environment::default();
        let x = global.intern("x");
        global.define(&x, num(1.0)).unwrap();
        global.make_constant(&x);

        let child = global.extend();
        assert!(matches!(child.define(&x, num(2.0)), Err(LispError::ConstantViolation(_))));
        assert!(matches!(global.set(&x, num(2.0)), Err(LispError::ConstantViolation(_))));
        assert_eq!(global.get(&x).unwrap(), num(1.0));
    }

    #[test]
    fn test_macros_live_in_separate_namespace() {
        let global = Environment::default();
        let m = global.intern("m");
        global.define(&m, num(1.0)).unwrap();
        let closure = Closure {
            name: None,
            params: vec![],
            rest: None,
            body: vec![],
            env: global.clone(),
        };
        global.define_macro(&m, Rc::new(closure));

        assert!(global.extend().get_macro(&m).is_some());
        assert_eq!(global.get(&m).unwrap(), num(1.0));
        assert_eq!(global.macros(), vec![m.clone()]);
        global.clear();
    }

    #[test]
    fn test_symbols_lists_current_frame_only() {
        let global = Environment::default();
        let a = global.intern("a");
        let b = global.intern("b");
        global.define(&b, num(1.0)).unwrap();
        global.define(&a, num(1.0)).unwrap();
        let child = global.extend();
        child.define(&a, num(2.0)).unwrap();

        assert_eq!(global.symbols(), vec![a.clone(), b]);
        assert_eq!(child.symbols(), vec![a]);
    }

    #[test]
    fn test_global_walks_to_root() {
        let global = Environment::default();
        let inner = global.extend().extend();
        assert!(inner.global().same_frame(&global));
        assert!(global.is_global());
        assert!(!inner.is_global());
    }

    #[test]
    fn test_depth_limit() {
        let env = Environment::default();
        env.set_max_depth(2);
        let g1 = env.enter().unwrap();
        let g2 = env.enter().unwrap();
        assert!(matches!(env.enter(), Err(LispError::StackExhausted { depth: 2 })));
        drop(g2);
        assert!(env.enter().is_ok());
        drop(g1);
    }
}
