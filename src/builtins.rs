//! Native built-in functions and constants.
//!
//! Every built-in is a typed multi-arity function sharing the
//! curry/placeholder protocol with user closures. Operators desugar to the
//! same natives, so `_ + 1` and `1 + 1` run identical code.

use std::io::Write;

use bigdecimal::BigDecimal;
use num_traits::FromPrimitive;

use crate::{
    diagnostics::{Diagnostic, ErrorKind, NumFuError, Result, SourceSpan},
    environment::EnvironmentRef,
    number::{self, Number},
    reconstruct,
    runtime::Interpreter,
    value::{Arity, Builtin, NativeFn, Value, ValueKind},
};

// 100 digits each; rounded into the configured precision at startup.
const PI_DIGITS: &str = "3.1415926535897932384626433832795028841971693993751058209749445923078164062862089986280348253421170679";
const E_DIGITS: &str = "2.7182818284590452353602874713526624977572470936999595749669676277240766303535475945713821785251664274";

/// Register every native and constant into the root environment. Called
/// before the NumFu-level prelude is evaluated.
pub fn install(env: &EnvironmentRef) {
    let mut scope = env.borrow_mut();
    for &(name, arity, func) in NATIVES {
        scope.define(
            name,
            Value::new(ValueKind::Builtin(Builtin::new(name, arity, func))),
        );
    }
    scope.define("inf", Value::number(Number::PosInf));
    scope.define("nan", Value::number(Number::NaN));
    if let Some(pi) = Number::parse(PI_DIGITS) {
        scope.define("pi", Value::number(pi));
    }
    if let Some(e) = Number::parse(E_DIGITS) {
        scope.define("e", Value::number(e));
    }
}

type NativeEntry = (&'static str, Arity, NativeFn);

const NATIVES: &[NativeEntry] = &[
    ("map", Arity::Exact(2), native_map),
    ("filter", Arity::Exact(2), native_filter),
    ("length", Arity::Exact(1), native_length),
    ("append", Arity::Exact(2), native_append),
    ("contains", Arity::Exact(2), native_contains),
    ("set", Arity::Exact(3), native_set),
    ("reverse", Arity::Exact(1), native_reverse),
    ("sort", Arity::Exact(1), native_sort),
    ("slice", Arity::Exact(3), native_slice),
    ("join", Arity::Exact(2), native_join),
    ("split", Arity::Exact(2), native_split),
    ("format", Arity::AtLeast(1), native_format),
    ("trim", Arity::Exact(1), native_trim),
    ("toLowerCase", Arity::Exact(1), native_to_lower),
    ("toUpperCase", Arity::Exact(1), native_to_upper),
    ("replace", Arity::Exact(3), native_replace),
    ("count", Arity::Exact(2), native_count),
    ("range", Arity::Exact(2), native_range),
    ("abs", Arity::Exact(1), native_abs),
    ("floor", Arity::Exact(1), native_floor),
    ("ceil", Arity::Exact(1), native_ceil),
    ("round", Arity::Between(1, 2), native_round),
    ("sign", Arity::Exact(1), native_sign),
    ("sqrt", Arity::Exact(1), native_sqrt),
    ("min", Arity::AtLeast(1), native_min),
    ("max", Arity::AtLeast(1), native_max),
    ("sum", Arity::Exact(1), native_sum),
    ("isnan", Arity::Exact(1), native_isnan),
    ("isinf", Arity::Exact(1), native_isinf),
    ("xor", Arity::Exact(2), op_xor),
    ("Bool", Arity::Exact(1), native_bool),
    ("Number", Arity::Exact(1), native_number),
    ("List", Arity::Exact(1), native_list),
    ("String", Arity::Exact(1), native_string),
    ("print", Arity::Exact(1), native_print),
    ("println", Arity::Exact(1), native_println),
    ("input", Arity::Between(0, 1), native_input),
    ("error", Arity::Between(1, 2), native_error),
    ("assert", Arity::Between(1, 2), native_assert),
    ("exit", Arity::Between(0, 1), native_exit),
    ("time", Arity::Exact(0), native_time),
];

/// The native behind an operator symbol, for desugared operator expressions
/// and placeholder sections.
pub fn operator(symbol: &str) -> Builtin {
    let (name, arity, func): (&'static str, Arity, NativeFn) = match symbol {
        "+" => ("+", Arity::Exact(2), op_add),
        "-" => ("-", Arity::Between(1, 2), op_sub),
        "*" => ("*", Arity::Exact(2), op_mul),
        "/" => ("/", Arity::Exact(2), op_div),
        "%" => ("%", Arity::Exact(2), op_mod),
        "^" => ("^", Arity::Exact(2), op_pow),
        "&&" => ("&&", Arity::Exact(2), op_and),
        "||" => ("||", Arity::Exact(2), op_or),
        "!" => ("!", Arity::Exact(1), op_not),
        "==" => ("==", Arity::Exact(2), op_eq),
        "!=" => ("!=", Arity::Exact(2), op_ne),
        "<" => ("<", Arity::Exact(2), op_lt),
        "<=" => ("<=", Arity::Exact(2), op_le),
        ">" => (">", Arity::Exact(2), op_gt),
        ">=" => (">=", Arity::Exact(2), op_ge),
        other => unreachable!("unknown operator `{other}`"),
    };
    Builtin::new(name, arity, func)
}

fn diagnostic(kind: ErrorKind, message: impl Into<String>, span: SourceSpan) -> NumFuError {
    NumFuError::from(Diagnostic::new(kind, message).with_span(span))
}

fn invalid_arg(name: &str, index: usize, expected: &str, got: &Value, span: SourceSpan) -> NumFuError {
    let prefix = if name.chars().next().map(char::is_alphabetic).unwrap_or(false) {
        format!("'{name}'")
    } else {
        format!("operator '{name}'")
    };
    diagnostic(
        ErrorKind::Type,
        format!(
            "Invalid argument type for {prefix}: argument {} must be {expected}, got {}",
            index + 1,
            got.type_name()
        ),
        span,
    )
}

fn number_arg(name: &str, args: &[Value], index: usize, span: SourceSpan) -> Result<Number> {
    match &*args[index].0 {
        ValueKind::Number(n) => Ok(n.clone()),
        _ => Err(invalid_arg(name, index, "Number", &args[index], span)),
    }
}

fn string_arg(name: &str, args: &[Value], index: usize, span: SourceSpan) -> Result<String> {
    match &*args[index].0 {
        ValueKind::Str(s) => Ok(s.clone()),
        _ => Err(invalid_arg(name, index, "String", &args[index], span)),
    }
}

fn list_arg(name: &str, args: &[Value], index: usize, span: SourceSpan) -> Result<Vec<Value>> {
    match &*args[index].0 {
        ValueKind::List(values) => Ok(values.clone()),
        _ => Err(invalid_arg(name, index, "List", &args[index], span)),
    }
}

fn integer_arg(name: &str, args: &[Value], index: usize, span: SourceSpan) -> Result<i64> {
    let number = number_arg(name, args, index, span)?;
    number.to_i64().ok_or_else(|| {
        diagnostic(
            ErrorKind::Type,
            format!(
                "Invalid argument type for '{name}': argument {} must be an integer",
                index + 1
            ),
            span,
        )
    })
}

fn callable_arg<'a>(name: &str, args: &'a [Value], index: usize, span: SourceSpan) -> Result<&'a Value> {
    match &*args[index].0 {
        ValueKind::Closure(_) | ValueKind::Builtin(_) => Ok(&args[index]),
        _ => Err(invalid_arg(name, index, "Function", &args[index], span)),
    }
}

fn display(value: &Value) -> String {
    reconstruct::value_repr(value, number::precision())
}

// ---------------------------------------------------------------------------
// operators

fn op_add(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    match (&*args[0].0, &*args[1].0) {
        (ValueKind::Number(a), ValueKind::Number(b)) => Ok(Value::number(a.add(b))),
        (ValueKind::Str(a), ValueKind::Str(b)) => Ok(Value::string(format!("{a}{b}"))),
        (ValueKind::List(a), ValueKind::List(b)) => {
            let mut joined = a.clone();
            joined.extend(b.iter().cloned());
            Ok(Value::list(joined))
        }
        (ValueKind::Number(_), _) => Err(invalid_arg("+", 1, "Number", &args[1], span)),
        (ValueKind::Str(_), _) => Err(invalid_arg("+", 1, "String", &args[1], span)),
        (ValueKind::List(_), _) => Err(invalid_arg("+", 1, "List", &args[1], span)),
        _ => Err(invalid_arg("+", 0, "Number, String or List", &args[0], span)),
    }
}

fn op_sub(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    if args.len() == 1 {
        let a = number_arg("-", args, 0, span)?;
        return Ok(Value::number(a.neg()));
    }
    let a = number_arg("-", args, 0, span)?;
    let b = number_arg("-", args, 1, span)?;
    Ok(Value::number(a.sub(&b)))
}

fn repeat_count(name: &str, args: &[Value], index: usize, span: SourceSpan) -> Result<usize> {
    let number = number_arg(name, args, index, span)?;
    match number.to_i64() {
        Some(n) => Ok(n.max(0) as usize),
        None => Err(diagnostic(
            ErrorKind::Type,
            "Can't multiply by non-integer",
            span,
        )),
    }
}

fn op_mul(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    match (&*args[0].0, &*args[1].0) {
        (ValueKind::Number(a), ValueKind::Number(b)) => Ok(Value::number(a.mul(b))),
        (ValueKind::Str(_), ValueKind::Str(_)) => Err(diagnostic(
            ErrorKind::Type,
            "Cannot multiply two strings",
            span,
        )),
        (ValueKind::List(_), ValueKind::List(_)) => Err(diagnostic(
            ErrorKind::Type,
            "Cannot multiply two lists",
            span,
        )),
        (ValueKind::Str(s), ValueKind::Number(_)) => {
            let n = repeat_count("*", args, 1, span)?;
            Ok(Value::string(s.repeat(n)))
        }
        (ValueKind::Number(_), ValueKind::Str(s)) => {
            let n = repeat_count("*", args, 0, span)?;
            Ok(Value::string(s.repeat(n)))
        }
        (ValueKind::List(items), ValueKind::Number(_)) => {
            let n = repeat_count("*", args, 1, span)?;
            Ok(Value::list(repeat_list(items, n)))
        }
        (ValueKind::Number(_), ValueKind::List(items)) => {
            let n = repeat_count("*", args, 0, span)?;
            Ok(Value::list(repeat_list(items, n)))
        }
        (ValueKind::Number(_), _) | (ValueKind::Str(_), _) | (ValueKind::List(_), _) => {
            Err(invalid_arg("*", 1, "Number", &args[1], span))
        }
        _ => Err(invalid_arg("*", 0, "Number, String or List", &args[0], span)),
    }
}

fn repeat_list(items: &[Value], n: usize) -> Vec<Value> {
    let mut out = Vec::with_capacity(items.len() * n);
    for _ in 0..n {
        out.extend(items.iter().cloned());
    }
    out
}

fn op_div(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    let a = number_arg("/", args, 0, span)?;
    let b = number_arg("/", args, 1, span)?;
    Ok(Value::number(a.div(&b)))
}

fn op_mod(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    let a = number_arg("%", args, 0, span)?;
    let b = number_arg("%", args, 1, span)?;
    Ok(Value::number(a.rem(&b)))
}

fn op_pow(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    let a = number_arg("^", args, 0, span)?;
    let b = number_arg("^", args, 1, span)?;
    Ok(Value::number(a.pow(&b)))
}

fn op_and(_interp: &mut Interpreter, args: &[Value], _span: SourceSpan) -> Result<Value> {
    Ok(Value::bool(args[0].is_truthy() && args[1].is_truthy()))
}

fn op_or(_interp: &mut Interpreter, args: &[Value], _span: SourceSpan) -> Result<Value> {
    Ok(Value::bool(args[0].is_truthy() || args[1].is_truthy()))
}

fn op_not(_interp: &mut Interpreter, args: &[Value], _span: SourceSpan) -> Result<Value> {
    Ok(Value::bool(!args[0].is_truthy()))
}

fn op_xor(_interp: &mut Interpreter, args: &[Value], _span: SourceSpan) -> Result<Value> {
    Ok(Value::bool(args[0].is_truthy() ^ args[1].is_truthy()))
}

fn op_eq(_interp: &mut Interpreter, args: &[Value], _span: SourceSpan) -> Result<Value> {
    Ok(Value::bool(args[0].deep_eq(&args[1])))
}

fn op_ne(_interp: &mut Interpreter, args: &[Value], _span: SourceSpan) -> Result<Value> {
    Ok(Value::bool(!args[0].deep_eq(&args[1])))
}

fn compare(
    name: &str,
    args: &[Value],
    span: SourceSpan,
    accept: fn(std::cmp::Ordering) -> bool,
) -> Result<Value> {
    let a = number_arg(name, args, 0, span)?;
    let b = number_arg(name, args, 1, span)?;
    Ok(Value::bool(
        a.partial_cmp_number(&b).map(accept).unwrap_or(false),
    ))
}

fn op_lt(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    compare("<", args, span, std::cmp::Ordering::is_lt)
}

fn op_le(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    compare("<=", args, span, std::cmp::Ordering::is_le)
}

fn op_gt(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    compare(">", args, span, std::cmp::Ordering::is_gt)
}

fn op_ge(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    compare(">=", args, span, std::cmp::Ordering::is_ge)
}

// ---------------------------------------------------------------------------
// lists and strings

fn native_map(interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    let items = list_arg("map", args, 0, span)?;
    let func = callable_arg("map", args, 1, span)?.clone();
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        out.push(interp.call_value(func.clone(), vec![item], span)?);
    }
    Ok(Value::list(out))
}

fn native_filter(interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    let items = list_arg("filter", args, 0, span)?;
    let func = callable_arg("filter", args, 1, span)?.clone();
    let mut out = Vec::new();
    for item in items {
        let keep = interp.call_value(func.clone(), vec![item.clone()], span)?;
        if keep.is_truthy() {
            out.push(item);
        }
    }
    Ok(Value::list(out))
}

fn native_length(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    match &*args[0].0 {
        ValueKind::List(values) => Ok(Value::number(Number::from_usize(values.len()))),
        ValueKind::Str(s) => Ok(Value::number(Number::from_usize(s.chars().count()))),
        _ => Err(invalid_arg("length", 0, "List or String", &args[0], span)),
    }
}

fn native_append(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    let mut items = list_arg("append", args, 0, span)?;
    items.push(args[1].clone());
    Ok(Value::list(items))
}

fn native_contains(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    match (&*args[0].0, &*args[1].0) {
        (ValueKind::List(values), _) => {
            Ok(Value::bool(values.iter().any(|v| v.deep_eq(&args[1]))))
        }
        (ValueKind::Str(text), ValueKind::Str(needle)) => Ok(Value::bool(text.contains(needle))),
        (ValueKind::Str(_), _) => Err(invalid_arg("contains", 1, "String", &args[1], span)),
        _ => Err(invalid_arg("contains", 0, "List or String", &args[0], span)),
    }
}

fn normalize_index(raw: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let idx = if raw < 0 { len + raw } else { raw };
    if idx < 0 || idx >= len {
        None
    } else {
        Some(idx as usize)
    }
}

fn native_set(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    let raw = integer_arg("set", args, 1, span)?;
    match &*args[0].0 {
        ValueKind::List(values) => {
            let idx = normalize_index(raw, values.len()).ok_or_else(|| {
                diagnostic(ErrorKind::Index, "List index out of range", span)
            })?;
            let mut out = values.clone();
            out[idx] = args[2].clone();
            Ok(Value::list(out))
        }
        ValueKind::Str(text) => {
            let replacement = match &*args[2].0 {
                ValueKind::Str(s) => s.clone(),
                _ => {
                    return Err(diagnostic(
                        ErrorKind::Value,
                        format!(
                            "'set' on a String needs a String replacement, got {}",
                            args[2].type_name()
                        ),
                        span,
                    ));
                }
            };
            let chars: Vec<char> = text.chars().collect();
            let idx = normalize_index(raw, chars.len()).ok_or_else(|| {
                diagnostic(ErrorKind::Index, "String index out of range", span)
            })?;
            let mut out: String = chars[..idx].iter().collect();
            out.push_str(&replacement);
            out.extend(chars[idx + 1..].iter());
            Ok(Value::string(out))
        }
        _ => Err(invalid_arg("set", 0, "List or String", &args[0], span)),
    }
}

fn native_reverse(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    match &*args[0].0 {
        ValueKind::List(values) => {
            let mut out = values.clone();
            out.reverse();
            Ok(Value::list(out))
        }
        ValueKind::Str(text) => Ok(Value::string(text.chars().rev().collect::<String>())),
        _ => Err(invalid_arg("reverse", 0, "List or String", &args[0], span)),
    }
}

fn native_sort(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    match &*args[0].0 {
        ValueKind::Str(text) => {
            let mut chars: Vec<char> = text.chars().collect();
            chars.sort_unstable();
            Ok(Value::string(chars.into_iter().collect::<String>()))
        }
        ValueKind::List(values) => {
            let all_numbers = values
                .iter()
                .all(|v| matches!(&*v.0, ValueKind::Number(_)));
            let all_strings = values.iter().all(|v| matches!(&*v.0, ValueKind::Str(_)));
            if !all_numbers && !all_strings {
                return Err(diagnostic(
                    ErrorKind::Type,
                    "'sort' expects a list of numbers or a list of strings",
                    span,
                ));
            }
            let mut out = values.clone();
            if all_numbers {
                out.sort_by(|a, b| match (&*a.0, &*b.0) {
                    (ValueKind::Number(x), ValueKind::Number(y)) => x
                        .partial_cmp_number(y)
                        .unwrap_or(std::cmp::Ordering::Equal),
                    _ => std::cmp::Ordering::Equal,
                });
            } else {
                out.sort_by(|a, b| match (&*a.0, &*b.0) {
                    (ValueKind::Str(x), ValueKind::Str(y)) => x.cmp(y),
                    _ => std::cmp::Ordering::Equal,
                });
            }
            Ok(Value::list(out))
        }
        _ => Err(invalid_arg("sort", 0, "List or String", &args[0], span)),
    }
}

fn native_slice(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    let start = integer_arg("slice", args, 1, span)?;
    let end = integer_arg("slice", args, 2, span)?;
    match &*args[0].0 {
        ValueKind::List(values) => {
            let (from, to) = slice_bounds(start, end, values.len());
            Ok(Value::list(values[from..to].to_vec()))
        }
        ValueKind::Str(text) => {
            let chars: Vec<char> = text.chars().collect();
            let (from, to) = slice_bounds(start, end, chars.len());
            Ok(Value::string(chars[from..to].iter().collect::<String>()))
        }
        _ => Err(invalid_arg("slice", 0, "List or String", &args[0], span)),
    }
}

/// End-inclusive bounds with negative indices counted from the back:
/// `slice(l, 1, -1)` runs from index 1 through the last element.
fn slice_bounds(start: i64, end: i64, len: usize) -> (usize, usize) {
    let len_i = len as i64;
    let from = if start < 0 { len_i + start } else { start }.clamp(0, len_i);
    let last = if end < 0 { len_i + end } else { end };
    let to = (last + 1).clamp(0, len_i);
    if to <= from {
        (0, 0)
    } else {
        (from as usize, to as usize)
    }
}

fn native_join(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    let items = list_arg("join", args, 0, span)?;
    let separator = string_arg("join", args, 1, span)?;
    let mut parts = Vec::with_capacity(items.len());
    for item in &items {
        match &*item.0 {
            ValueKind::Str(s) => parts.push(s.clone()),
            _ => {
                return Err(diagnostic(
                    ErrorKind::Type,
                    format!("'join' expects a list of strings, found {}", item.type_name()),
                    span,
                ));
            }
        }
    }
    Ok(Value::string(parts.join(&separator)))
}

fn native_split(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    let text = string_arg("split", args, 0, span)?;
    let separator = string_arg("split", args, 1, span)?;
    let parts: Vec<Value> = if separator.is_empty() {
        text.split_whitespace().map(Value::string).collect()
    } else {
        text.split(&separator).map(Value::string).collect()
    };
    Ok(Value::list(parts))
}

fn native_format(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    let template = string_arg("format", args, 0, span)?;
    let mut out = String::with_capacity(template.len());
    let mut used = 0;
    let mut chars = template.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' if chars.peek() == Some(&'}') => {
                chars.next();
                used += 1;
                match args.get(used) {
                    Some(value) => out.push_str(&display(value)),
                    None => {
                        return Err(diagnostic(
                            ErrorKind::Index,
                            format!(
                                "wrong number of format arguments: the template needs at least {used}, got {}",
                                args.len() - 1
                            ),
                            span,
                        ));
                    }
                }
            }
            other => out.push(other),
        }
    }
    if used != args.len() - 1 {
        return Err(diagnostic(
            ErrorKind::Index,
            format!(
                "wrong number of format arguments: the template needs {used}, got {}",
                args.len() - 1
            ),
            span,
        ));
    }
    Ok(Value::string(out))
}

fn native_trim(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    let text = string_arg("trim", args, 0, span)?;
    Ok(Value::string(text.trim().to_string()))
}

fn native_to_lower(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    let text = string_arg("toLowerCase", args, 0, span)?;
    Ok(Value::string(text.to_lowercase()))
}

fn native_to_upper(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    let text = string_arg("toUpperCase", args, 0, span)?;
    Ok(Value::string(text.to_uppercase()))
}

fn native_replace(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    let text = string_arg("replace", args, 0, span)?;
    let from = string_arg("replace", args, 1, span)?;
    let to = string_arg("replace", args, 2, span)?;
    Ok(Value::string(text.replace(&from, &to)))
}

fn native_count(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    let text = string_arg("count", args, 0, span)?;
    let needle = string_arg("count", args, 1, span)?;
    let count = if needle.is_empty() {
        text.chars().count() + 1
    } else {
        text.matches(&needle).count()
    };
    Ok(Value::number(Number::from_usize(count)))
}

fn native_range(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    let start = integer_arg("range", args, 0, span)?;
    let end = integer_arg("range", args, 1, span)?;
    let mut out = Vec::new();
    let mut current = start;
    while current < end {
        out.push(Value::number(Number::from_i64(current)));
        current += 1;
    }
    Ok(Value::list(out))
}

// ---------------------------------------------------------------------------
// math

fn native_abs(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    Ok(Value::number(number_arg("abs", args, 0, span)?.abs()))
}

fn native_floor(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    Ok(Value::number(number_arg("floor", args, 0, span)?.floor()))
}

fn native_ceil(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    Ok(Value::number(number_arg("ceil", args, 0, span)?.ceil()))
}

fn native_round(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    let value = number_arg("round", args, 0, span)?;
    let digits = if args.len() == 2 {
        integer_arg("round", args, 1, span)?
    } else {
        0
    };
    Ok(Value::number(value.round(digits)))
}

fn native_sign(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    Ok(Value::number(number_arg("sign", args, 0, span)?.sign()))
}

fn native_sqrt(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    Ok(Value::number(number_arg("sqrt", args, 0, span)?.sqrt()))
}

/// `min`/`max` accept either numbers directly or a single list of numbers.
fn extremum_args(name: &str, args: &[Value], span: SourceSpan) -> Result<Vec<Number>> {
    let values: Vec<Value> = if args.len() == 1 {
        match &*args[0].0 {
            ValueKind::List(values) => values.clone(),
            _ => args.to_vec(),
        }
    } else {
        args.to_vec()
    };
    if values.is_empty() {
        return Err(diagnostic(
            ErrorKind::Value,
            format!("'{name}' of an empty list"),
            span,
        ));
    }
    values
        .iter()
        .enumerate()
        .map(|(i, v)| match &*v.0 {
            ValueKind::Number(n) => Ok(n.clone()),
            _ => Err(invalid_arg(name, i, "Number", v, span)),
        })
        .collect()
}

fn native_min(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    let numbers = extremum_args("min", args, span)?;
    let mut best = numbers[0].clone();
    for n in &numbers[1..] {
        if n.is_nan() {
            return Ok(Value::number(Number::NaN));
        }
        if n.partial_cmp_number(&best) == Some(std::cmp::Ordering::Less) {
            best = n.clone();
        }
    }
    Ok(Value::number(best))
}

fn native_max(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    let numbers = extremum_args("max", args, span)?;
    let mut best = numbers[0].clone();
    for n in &numbers[1..] {
        if n.is_nan() {
            return Ok(Value::number(Number::NaN));
        }
        if n.partial_cmp_number(&best) == Some(std::cmp::Ordering::Greater) {
            best = n.clone();
        }
    }
    Ok(Value::number(best))
}

fn native_sum(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    let items = list_arg("sum", args, 0, span)?;
    let mut total = Number::zero();
    for (i, item) in items.iter().enumerate() {
        match &*item.0 {
            ValueKind::Number(n) => total = total.add(n),
            _ => return Err(invalid_arg("sum", i, "Number", item, span)),
        }
    }
    Ok(Value::number(total))
}

fn native_isnan(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    Ok(Value::bool(number_arg("isnan", args, 0, span)?.is_nan()))
}

fn native_isinf(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    Ok(Value::bool(
        number_arg("isinf", args, 0, span)?.is_infinite(),
    ))
}

// ---------------------------------------------------------------------------
// conversions

fn native_bool(_interp: &mut Interpreter, args: &[Value], _span: SourceSpan) -> Result<Value> {
    Ok(Value::bool(args[0].is_truthy()))
}

fn native_number(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    match &*args[0].0 {
        ValueKind::Number(n) => Ok(Value::number(n.clone())),
        ValueKind::Bool(b) => Ok(Value::int(i64::from(*b))),
        ValueKind::Str(text) => {
            let resolved = resolve_sign_chain(text.trim());
            Number::parse(&resolved)
                .map(Value::number)
                .ok_or_else(|| {
                    diagnostic(
                        ErrorKind::Value,
                        format!("invalid literal for Number: '{text}'"),
                        span,
                    )
                })
        }
        _ => Err(invalid_arg(
            "Number",
            0,
            "Number, Boolean or String",
            &args[0],
            span,
        )),
    }
}

/// `Number("--+-5")` resolves the leading sign chain: an odd count of minus
/// signs makes the value negative.
fn resolve_sign_chain(text: &str) -> String {
    let rest = text.trim_start_matches(['+', '-']);
    let signs = &text[..text.len() - rest.len()];
    let minuses = signs.matches('-').count();
    if minuses % 2 == 1 {
        format!("-{rest}")
    } else {
        rest.to_string()
    }
}

fn native_list(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    match &*args[0].0 {
        ValueKind::List(values) => Ok(Value::list(values.clone())),
        ValueKind::Str(text) => Ok(Value::list(
            text.chars().map(|c| Value::string(c.to_string())).collect(),
        )),
        other => Err(diagnostic(
            ErrorKind::Type,
            format!("Type '{}' is not iterable", type_label(other)),
            span,
        )),
    }
}

fn native_string(_interp: &mut Interpreter, args: &[Value], _span: SourceSpan) -> Result<Value> {
    Ok(Value::string(display(&args[0])))
}

fn type_label(kind: &ValueKind) -> &'static str {
    match kind {
        ValueKind::Unit => "Unit",
        ValueKind::Bool(_) => "Boolean",
        ValueKind::Number(_) => "Number",
        ValueKind::Str(_) => "String",
        ValueKind::List(_) => "List",
        ValueKind::Closure(_) | ValueKind::Builtin(_) => "Function",
        ValueKind::Placeholder => "Placeholder",
    }
}

// ---------------------------------------------------------------------------
// io and control

fn native_print(interp: &mut Interpreter, args: &[Value], _span: SourceSpan) -> Result<Value> {
    let text = display(&args[0]);
    interp.put(text);
    Ok(Value::unit())
}

fn native_println(interp: &mut Interpreter, args: &[Value], _span: SourceSpan) -> Result<Value> {
    let text = display(&args[0]);
    interp.put(format!("{text}\n"));
    Ok(Value::unit())
}

fn native_input(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    if !args.is_empty() {
        let prompt = string_arg("input", args, 0, span)?;
        print!("{prompt}");
        std::io::stdout().flush()?;
    }
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    Ok(Value::string(line))
}

fn native_error(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    let message = string_arg("error", args, 0, span)?;
    let kind = if args.len() == 2 {
        ErrorKind::Custom(string_arg("error", args, 1, span)?)
    } else {
        ErrorKind::Runtime
    };
    Err(diagnostic(kind, message, span))
}

fn native_assert(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    if args[0].is_truthy() {
        return Ok(args.get(1).cloned().unwrap_or_else(|| Value::bool(true)));
    }
    Err(diagnostic(ErrorKind::Assertion, "assertion failed", span))
}

fn native_exit(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    let code = if args.is_empty() {
        0
    } else {
        integer_arg("exit", args, 0, span)? as i32
    };
    Err(NumFuError::Exit(code))
}

fn native_time(_interp: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    let _ = args;
    match std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH) {
        Ok(duration) => {
            let seconds = BigDecimal::from_f64(duration.as_secs_f64())
                .unwrap_or_else(|| BigDecimal::from(0));
            Ok(Value::number(Number::Finite(seconds)))
        }
        Err(_) => Err(diagnostic(
            ErrorKind::Runtime,
            "system clock went backwards",
            span,
        )),
    }
}
