//! Expression language for the privileged `eval` command.
//!
//! A small tree-walking evaluator covering:
//!
//! - integer, float and string values with implicit coercion
//! - arithmetic, comparison, logical and ternary operators
//! - glob (`=~`) and regex (`=/`) matching
//! - assignment into the user's bangtag variables
//! - a handful of built-in string and math functions
//!
//! # Quick start
//!
//! ```rust
//! use bangtags::script::{eval_str, VarContext};
//! use bangtags::var::VarStore;
//!
//! let mut vars = VarStore::new();
//! vars.set("x", "6");
//! let value = eval_str("x * 7", &mut VarContext::new(&mut vars)).unwrap();
//! assert_eq!(value.to_string(), "42");
//! ```

pub mod builtins;
pub mod expr;
pub mod value;

pub use expr::{eval_str, EvalContext};
pub use value::Value;

use crate::error::EvalError;
use crate::var::{is_reserved, VarStore};

/// Evaluation context backed by a user's variable working copy.
///
/// Expressions may read every variable but never write interpreter-internal
/// (`_`-prefixed) keys.
pub struct VarContext<'a> {
    vars: &'a mut VarStore,
}

impl<'a> VarContext<'a> {
    pub fn new(vars: &'a mut VarStore) -> Self {
        Self { vars }
    }
}

impl EvalContext for VarContext<'_> {
    fn get_var(&self, name: &str) -> Option<Value> {
        self.vars.get(name).map(Value::from_stored)
    }

    fn set_var(&mut self, name: &str, value: Value) -> Result<(), EvalError> {
        if is_reserved(name) {
            return Err(EvalError::Reserved(name.to_owned()));
        }
        self.vars.set(name, value.to_string());
        Ok(())
    }

    fn call_fn(&mut self, name: &str, args: Vec<Value>) -> Result<Value, EvalError> {
        builtins::call_builtin(name, args)
            .unwrap_or_else(|| Err(EvalError::UnknownFunction(name.to_owned())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_and_writes_variables() {
        let mut vars = VarStore::new();
        vars.set("hp", "10");
        let v = eval_str("hp -= 3, strcat(\"hp=\", hp)", &mut VarContext::new(&mut vars));
        assert_eq!(v, Ok(Value::Str("hp=7".into())));
        assert_eq!(vars.get("hp"), Some("7"));
    }

    #[test]
    fn reserved_variables_are_read_only() {
        let mut vars = VarStore::new();
        vars.set("_they:are:cat", "a cat");
        let mut cx = VarContext::new(&mut vars);
        assert_eq!(eval_str("_x = 1", &mut cx), Err(EvalError::Reserved("_x".into())));
        assert_eq!(eval_str("strlen(_x)", &mut cx), Ok(Value::Int(0)));
    }

    #[test]
    fn unknown_function() {
        let mut vars = VarStore::new();
        assert_eq!(
            eval_str("nope()", &mut VarContext::new(&mut vars)),
            Err(EvalError::UnknownFunction("nope".into()))
        );
    }
}
