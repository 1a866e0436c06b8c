//! Built-in functions available to `eval` expressions.
//!
//! Each function receives already-evaluated arguments.  The dispatcher is
//! called from [`VarContext`](super::VarContext)'s `call_fn`.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

use super::value::Value;
use crate::error::EvalError;

/// Dispatch a built-in function call.
///
/// Returns `None` if `name` is not a built-in.
pub fn call_builtin(name: &str, args: Vec<Value>) -> Option<Result<Value, EvalError>> {
    // Ok(None) → not a builtin; `.transpose()` flips it into the outer Option.
    fn inner(name: &str, args: Vec<Value>) -> Result<Option<Value>, EvalError> {
        Ok(Some(match name {
            // ── String functions ─────────────────────────────────────────────
            "strlen" => {
                let s = get_str(&args, 0, name)?;
                Value::Int(s.chars().count() as i64)
            }
            "strcat" => Value::Str(args.iter().map(Value::to_string).collect()),
            "substr" => {
                let s = get_str(&args, 0, name)?;
                let pos = usize::try_from(get_int(&args, 1, name)?).unwrap_or(0);
                let len = args.get(2).map(|v| usize::try_from(v.as_int()).unwrap_or(0));
                let chars = s.chars().skip(pos);
                Value::Str(match len {
                    Some(n) => chars.take(n).collect(),
                    None => chars.collect(),
                })
            }
            "toupper" => Value::Str(get_str(&args, 0, name)?.to_uppercase()),
            "tolower" => Value::Str(get_str(&args, 0, name)?.to_lowercase()),
            "strstr" => {
                let haystack = get_str(&args, 0, name)?;
                let needle = get_str(&args, 1, name)?;
                Value::Int(match haystack.find(&needle) {
                    Some(i) => haystack[..i].chars().count() as i64,
                    None => -1,
                })
            }
            "strrep" => {
                let s = get_str(&args, 0, name)?;
                let n = usize::try_from(get_int(&args, 1, name)?).unwrap_or(0);
                Value::Str(s.repeat(n.min(1024)))
            }
            "replace" => {
                let haystack = get_str(&args, 0, name)?;
                let needle = get_str(&args, 1, name)?;
                let repl = get_str(&args, 2, name)?;
                if needle.is_empty() {
                    Value::Str(haystack)
                } else {
                    Value::Str(haystack.replace(&needle, &repl))
                }
            }

            // ── Math functions ───────────────────────────────────────────────
            "abs" => match Value::from_stored(&get_str(&args, 0, name)?) {
                Value::Int(n) => n.checked_abs().map_or(Value::Float((n as f64).abs()), Value::Int),
                Value::Float(x) => Value::Float(x.abs()),
                Value::Str(_) => Value::Int(0),
            },
            "min" | "max" => {
                arity(&args, 1, name)?;
                let want = if name == "min" {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Greater
                };
                let mut best = args[0].clone();
                for v in &args[1..] {
                    if v.cmp_value(&best) == want {
                        best = v.clone();
                    }
                }
                best
            }
            "mod" => {
                arity(&args, 2, name)?;
                args[0].arith_rem(&args[1])?
            }
            "rand" => {
                let mut rng = rand::thread_rng();
                match args.len() {
                    0 => Value::Int(rng.gen_range(0..i64::from(i32::MAX))),
                    1 => Value::Int(rng.gen_range(0..args[0].as_int().max(1))),
                    _ => {
                        let lo = args[0].as_int();
                        let hi = args[1].as_int().max(lo);
                        Value::Int(rng.gen_range(lo..=hi))
                    }
                }
            }
            "trunc" => Value::Int(get_float(&args, 0, name)?.trunc() as i64),
            "sqrt" => Value::Float(get_float(&args, 0, name)?.sqrt()),
            "pow" => {
                let base = get_float(&args, 0, name)?;
                let exp = get_float(&args, 1, name)?;
                Value::Float(base.powf(exp))
            }

            // ── Type inspection ──────────────────────────────────────────────
            "whatis" => {
                arity(&args, 1, name)?;
                Value::Str(args[0].type_name().to_owned())
            }

            "time" => {
                let secs = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_secs())
                    .unwrap_or(0);
                Value::Int(i64::try_from(secs).unwrap_or(i64::MAX))
            }

            _ => return Ok(None),
        }))
    }

    inner(name, args).transpose()
}

// ── Argument helpers ──────────────────────────────────────────────────────────

fn arity(args: &[Value], min: usize, name: &str) -> Result<(), EvalError> {
    if args.len() < min {
        return Err(EvalError::Arity { name: name.to_owned(), min });
    }
    Ok(())
}

fn get_str(args: &[Value], idx: usize, name: &str) -> Result<String, EvalError> {
    arity(args, idx + 1, name)?;
    Ok(args[idx].to_string())
}

fn get_int(args: &[Value], idx: usize, name: &str) -> Result<i64, EvalError> {
    arity(args, idx + 1, name)?;
    Ok(args[idx].as_int())
}

fn get_float(args: &[Value], idx: usize, name: &str) -> Result<f64, EvalError> {
    arity(args, idx + 1, name)?;
    Ok(args[idx].as_float())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
