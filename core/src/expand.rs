//! Macro expansion
//!
//! Expanders are closures applied to the unevaluated argument forms of a
//! macro call. The reader uses `expand_all` on the forms it produces; the
//! `macroexpand` builtins expose the single-form entry points.

use tracing::trace;

use crate::environment::{Environment, with_stack};
use crate::error::Result;
use crate::interner::Keyword;
use crate::interpreter::call_expander;
use crate::language::Value;

/// Expand `form` once if its head names a macro.
///
/// Returns the (possibly unchanged) form and whether an expansion happened.
pub fn macroexpand_1(form: &Value, env: &Environment) -> Result<(Value, bool)> {
    let Value::Cons(cell) = form else {
        return Ok((form.clone(), false));
    };
    let Value::Symbol(head) = &cell.car else {
        return Ok((form.clone(), false));
    };
    let Some(expander) = env.get_macro(head) else {
        return Ok((form.clone(), false));
    };

    let args = cell.cdr.to_vec()?;
    let expansion = call_expander(&expander, &args)?;
    trace!(macro_name = %head, expansion = %expansion, "expanded macro");
    Ok((expansion, true))
}

/// Expand the outermost form until its head no longer names a macro
pub fn macroexpand(form: &Value, env: &Environment) -> Result<Value> {
    let mut current = form.clone();
    loop {
        let (next, expanded) = macroexpand_1(&current, env)?;
        if !expanded {
            return Ok(next);
        }
        current = next;
    }
}

/// Expand every macro call in `form`, outermost first.
///
/// Quoted data is left alone, as are the parameter lists of `lambda` and the
/// name and parameter list of `defun`.
pub fn expand_all(form: &Value, env: &Environment) -> Result<Value> {
    if !matches!(form, Value::Cons(_)) {
        return Ok(form.clone());
    }

    let _guard = env.enter()?;
    let form = macroexpand(form, env)?;
    let Value::Cons(cell) = &form else {
        return Ok(form);
    };

    let keep = match cell.car.as_symbol().and_then(|s| s.keyword()) {
        Some(Keyword::Quote) => return Ok(form.clone()),
        Some(Keyword::Lambda) => 2,
        Some(Keyword::Defun) => 3,
        _ => 0,
    };
    map_elements(&form, keep, |element| with_stack(|| expand_all(element, env)))
}

// Rebuild a list, transforming elements after the first `keep`; a dotted tail is kept as-is
fn map_elements<F>(list: &Value, keep: usize, mut f: F) -> Result<Value>
where
    F: FnMut(&Value) -> Result<Value>,
{
    let mut items = Vec::new();
    let mut current = list.clone();
    while let Value::Cons(cell) = &current {
        if items.len() < keep {
            items.push(cell.car.clone());
        } else {
            items.push(f(&cell.car)?);
        }
        let next = cell.cdr.clone();
        current = next;
    }
    Ok(Value::list_with_tail(items, current))
}
