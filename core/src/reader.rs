//! Reader
//!
//! Turns tokens into values. Lists read outside of quoted data are
//! macro-expanded as soon as they are complete, and `defmacro` forms are
//! evaluated and registered on the spot, so the reader needs the global
//! environment that owns the macro table.

use std::rc::Rc;

use tracing::debug;

use crate::environment::{Environment, with_stack};
use crate::error::{LispError, Result};
use crate::expand;
use crate::interner::Keyword;
use crate::interpreter::make_closure;
use crate::language::Value;
use crate::lexer::{Lexer, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Code: macros are defined and expanded
    Normal,
    /// Data: read verbatim
    Quoting,
}

pub struct Reader {
    global: Environment,
}

impl Reader {
    pub fn new(env: &Environment) -> Self {
        Reader {
            global: env.global(),
        }
    }

    /// Read the next complete form, defining and expanding macros.
    ///
    /// Fails with `UnexpectedEndOfStream` when the lexer has no form left.
    pub fn read(&self, lexer: &mut Lexer) -> Result<Value> {
        let token = lexer.next_token()?;
        self.parse(token, lexer, Mode::Normal)
    }

    /// Read the next form as plain data
    pub fn read_without_expansion(&self, lexer: &mut Lexer) -> Result<Value> {
        let token = lexer.next_token()?;
        self.parse(token, lexer, Mode::Quoting)
    }

    /// Read the first form of `text` as code
    pub fn read_str(&self, text: &str) -> Result<Value> {
        self.read(&mut Lexer::new(text))
    }

    /// Read the first form of `text` as data
    pub fn read_data(&self, text: &str) -> Result<Value> {
        self.read_without_expansion(&mut Lexer::new(text))
    }

    /// Read every form in `text` as code
    pub fn read_all(&self, text: &str) -> Result<Vec<Value>> {
        let mut lexer = Lexer::new(text);
        let mut forms = Vec::new();
        while lexer.skip_atmosphere() {
            forms.push(self.read(&mut lexer)?);
        }
        Ok(forms)
    }

    fn parse(&self, token: Token, lexer: &mut Lexer, mode: Mode) -> Result<Value> {
        match token {
            Token::Eof => Err(LispError::UnexpectedEndOfStream),
            Token::RParen => Err(LispError::ExtraneousClosingParen),
            Token::LParen => {
                let _guard = self.global.enter()?;
                with_stack(|| self.read_list(lexer, mode))
            }
            Token::Quote => {
                let token = lexer.next_token()?;
                let quoted = self.parse(token, lexer, Mode::Quoting)?;
                let quote = Value::Symbol(self.global.intern(Keyword::Quote.text()));
                Ok(Value::list([quote, quoted]))
            }
            Token::Number(n) => Ok(Value::Number(n)),
            Token::Text(s) => Ok(Value::text(s)),
            Token::Symbol(name) => Ok(self.atom(&name)),
        }
    }

    fn atom(&self, name: &str) -> Value {
        let symbol = self.global.intern(name);
        match symbol.keyword() {
            Some(Keyword::Nil) => Value::Nil,
            Some(Keyword::T) => Value::True,
            _ => Value::Symbol(symbol),
        }
    }

    fn read_list(&self, lexer: &mut Lexer, mode: Mode) -> Result<Value> {
        let mut items = Vec::new();
        loop {
            let token = match lexer.next_token()? {
                Token::RParen => break,
                Token::Eof => return Err(LispError::UnexpectedEndOfStream),
                token => token,
            };
            let element_mode = match mode {
                Mode::Quoting => Mode::Quoting,
                Mode::Normal => element_mode(&items),
            };
            items.push(self.parse(token, lexer, element_mode)?);
        }

        match mode {
            Mode::Quoting => Ok(Value::list(items)),
            Mode::Normal => self.finish_code_list(items),
        }
    }

    fn finish_code_list(&self, items: Vec<Value>) -> Result<Value> {
        let head = match items.first() {
            Some(Value::Symbol(head)) => head.clone(),
            _ => return Ok(Value::list(items)),
        };

        if head.is(Keyword::Defmacro) {
            return self.define_macro(&items);
        }

        let form = Value::list(items);
        if self.global.get_macro(&head).is_some() {
            // Elements were expanded while they were read; only the expansion is new
            return expand::expand_all(&form, &self.global);
        }
        Ok(form)
    }

    // (defmacro name params body...) becomes (lambda params body...) evaluated globally
    fn define_macro(&self, items: &[Value]) -> Result<Value> {
        if items.len() < 3 {
            return Err(LispError::arity_at_least(
                Keyword::Defmacro.text(),
                2,
                items.len() - 1,
            ));
        }
        let name = items[1]
            .as_symbol()
            .ok_or_else(|| LispError::SymbolExpected(items[1].to_string()))?;
        let expander = make_closure(Some(name.clone()), &items[2], &items[3..], &self.global)?;

        debug!(macro_name = %name, "registered macro");
        self.global.define_macro(name, Rc::new(expander));
        Ok(Value::True)
    }
}

// Parameter lists of lambda/defun/defmacro and everything under quote are data
fn element_mode(items: &[Value]) -> Mode {
    let Some(Value::Symbol(head)) = items.first() else {
        return Mode::Normal;
    };
    match (head.keyword(), items.len()) {
        (Some(Keyword::Quote), _) => Mode::Quoting,
        (Some(Keyword::Lambda), 1) => Mode::Quoting,
        (Some(Keyword::Defun | Keyword::Defmacro), 2) => Mode::Quoting,
        _ => Mode::Normal,
    }
}
