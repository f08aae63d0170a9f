//! Symbol interning
//!
//! Every engine owns one `SymbolTable`. Interning the same name twice yields
//! the same `Symbol` object, so symbol equality is pointer identity.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use rustc_hash::FxHashMap;
use string_interner::{DefaultBackend, DefaultSymbol, StringInterner, Symbol as _};
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// Case Rules
// ============================================================================

/// How symbol names are folded before interning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SymbolCase {
    /// Names are case-sensitive: `foo` and `FOO` are different symbols
    #[default]
    Preserve,
    /// Names are upper-cased: `foo` and `FOO` are both `FOO`
    Upper,
}

impl SymbolCase {
    /// NFC-normalize a name, then apply the case rule.
    pub fn fold(self, name: &str) -> String {
        let normalized: String = name.nfc().collect();
        match self {
            SymbolCase::Preserve => normalized,
            SymbolCase::Upper => normalized.to_uppercase(),
        }
    }
}

// ============================================================================
// Keywords
// ============================================================================

/// Names the reader and evaluator treat structurally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Quote,
    If,
    Progn,
    Define,
    Setq,
    Lambda,
    Defun,
    While,
    Defmacro,
    Rest,
    Nil,
    T,
}

impl Keyword {
    const ALL: [Keyword; 12] = [
        Keyword::Quote,
        Keyword::If,
        Keyword::Progn,
        Keyword::Define,
        Keyword::Setq,
        Keyword::Lambda,
        Keyword::Defun,
        Keyword::While,
        Keyword::Defmacro,
        Keyword::Rest,
        Keyword::Nil,
        Keyword::T,
    ];

    /// Source spelling of the keyword (before case folding)
    pub fn text(self) -> &'static str {
        match self {
            Keyword::Quote => "quote",
            Keyword::If => "if",
            Keyword::Progn => "progn",
            Keyword::Define => "define",
            Keyword::Setq => "setq",
            Keyword::Lambda => "lambda",
            Keyword::Defun => "defun",
            Keyword::While => "while",
            Keyword::Defmacro => "defmacro",
            Keyword::Rest => "&rest",
            Keyword::Nil => "nil",
            Keyword::T => "t",
        }
    }

    /// Special forms are dispatched by the evaluator instead of being called.
    pub fn is_special_form(self) -> bool {
        matches!(
            self,
            Keyword::Quote
                | Keyword::If
                | Keyword::Progn
                | Keyword::Define
                | Keyword::Setq
                | Keyword::Lambda
                | Keyword::Defun
                | Keyword::While
        )
    }

    fn recognize(folded: &str, case: SymbolCase) -> Option<Keyword> {
        Keyword::ALL
            .iter()
            .copied()
            .find(|kw| case.fold(kw.text()) == folded)
    }
}

// ============================================================================
// Symbol
// ============================================================================

struct SymbolData {
    id: usize,
    name: Box<str>,
    keyword: Option<Keyword>,
}

/// An interned identifier. Cheap to clone; compares by identity.
#[derive(Clone)]
pub struct Symbol(Rc<SymbolData>);

impl Symbol {
    /// The folded name this symbol was interned under
    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn keyword(&self) -> Option<Keyword> {
        self.0.keyword
    }

    pub fn is(&self, keyword: Keyword) -> bool {
        self.0.keyword == Some(keyword)
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.0.name)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.name)
    }
}

// ============================================================================
// Symbol Table
// ============================================================================

/// Append-only intern table. Symbols live as long as the table.
pub struct SymbolTable {
    case: SymbolCase,
    interner: RefCell<StringInterner<DefaultBackend>>,
    symbols: RefCell<FxHashMap<DefaultSymbol, Symbol>>,
    gensym_counter: Cell<usize>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new(SymbolCase::default())
    }
}

impl SymbolTable {
    pub fn new(case: SymbolCase) -> Self {
        SymbolTable {
            case,
            interner: RefCell::new(StringInterner::default()),
            symbols: RefCell::new(FxHashMap::default()),
            gensym_counter: Cell::new(0),
        }
    }

    pub fn case(&self) -> SymbolCase {
        self.case
    }

    /// Intern a name and return its unique symbol
    pub fn intern(&self, name: &str) -> Symbol {
        let folded = self.case.fold(name);
        let key = self.interner.borrow_mut().get_or_intern(&folded);

        let mut symbols = self.symbols.borrow_mut();
        if let Some(symbol) = symbols.get(&key) {
            return symbol.clone();
        }

        let keyword = Keyword::recognize(&folded, self.case);
        let symbol = Symbol(Rc::new(SymbolData {
            id: key.to_usize(),
            name: folded.into_boxed_str(),
            keyword,
        }));
        symbols.insert(key, symbol.clone());
        symbol
    }

    /// Find an already-interned symbol without creating one
    pub fn lookup(&self, name: &str) -> Option<Symbol> {
        let folded = self.case.fold(name);
        let key = self.interner.borrow().get(&folded)?;
        self.symbols.borrow().get(&key).cloned()
    }

    /// Intern a fresh `#:G<n>` symbol that no earlier call has produced
    pub fn gensym(&self) -> Symbol {
        loop {
            let n = self.gensym_counter.get().max(self.len());
            self.gensym_counter.set(n + 1);
            let name = format!("#:G{n}");
            if self.lookup(&name).is_none() {
                return self.intern(&name);
            }
        }
    }

    /// Number of interned symbols
    pub fn len(&self) -> usize {
        self.symbols.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
