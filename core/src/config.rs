//! Engine configuration

use std::path::{Path, PathBuf};

use crate::environment::DEFAULT_MAX_DEPTH;
use crate::interner::SymbolCase;

pub const DEFAULT_INIT_FILE: &str = "Init.lsp";

/// Settings fixed at engine construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub symbol_case: SymbolCase,
    /// Bootstrap script evaluated at construction when it exists
    pub init_file: Option<PathBuf>,
    /// Nested evaluation steps allowed before `StackExhausted`
    pub max_eval_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            symbol_case: SymbolCase::default(),
            init_file: Some(PathBuf::from(DEFAULT_INIT_FILE)),
            max_eval_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn symbol_case(mut self, case: SymbolCase) -> Self {
        self.symbol_case = case;
        self
    }

    pub fn init_file(mut self, path: impl AsRef<Path>) -> Self {
        self.init_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn without_init_file(mut self) -> Self {
        self.init_file = None;
        self
    }

    pub fn max_eval_depth(mut self, depth: usize) -> Self {
        self.max_eval_depth = depth;
        self
    }
}
