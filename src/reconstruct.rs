//! Syntactic reconstruction of runtime values.
//!
//! Closures print as source again: the stored lambda AST is walked with the
//! already-bound arguments substituted back in as literals, so
//! `{x,y -> x+y}(5)` renders as `{y -> 5 + y}`. The printer knows operator
//! precedence and emits the minimal parenthesization.

use indexmap::IndexMap;

use crate::{
    ast::{BinaryOp, Expr, ExprKind, UnaryOp},
    environment::{Environment, EnvironmentRef},
    value::{Applied, Builtin, Closure, ClosureBody, Value, ValueKind},
};

const PREC_NONE: u8 = 0;
const PREC_COMPOSE: u8 = 2;
const PREC_OR: u8 = 3;
const PREC_AND: u8 = 4;
const PREC_CMP: u8 = 5;
const PREC_ADD: u8 = 6;
const PREC_MUL: u8 = 7;
const PREC_UNARY: u8 = 8;
const PREC_POW: u8 = 9;
const PREC_POSTFIX: u8 = 10;

const MAX_INLINE_DEPTH: usize = 3;

/// Top-level rendering: strings print bare, unit prints as nothing.
pub fn value_repr(value: &Value, digits: usize) -> String {
    match &*value.0 {
        ValueKind::Unit => String::new(),
        ValueKind::Str(s) => s.clone(),
        _ => value_display(value, digits, 0),
    }
}

/// Structural rendering, as used inside lists: strings keep their quotes.
pub fn value_display(value: &Value, digits: usize, depth: usize) -> String {
    match &*value.0 {
        ValueKind::Unit => "()".into(),
        ValueKind::Bool(b) => if *b { "true" } else { "false" }.into(),
        ValueKind::Number(n) => n.to_repr(digits),
        ValueKind::Str(s) => quote(s),
        ValueKind::List(values) => {
            if depth >= MAX_INLINE_DEPTH {
                return "[...]".into();
            }
            let parts: Vec<String> = values
                .iter()
                .map(|v| value_display(v, digits, depth + 1))
                .collect();
            format!("[{}]", parts.join(", "))
        }
        ValueKind::Closure(closure) => closure_repr(closure, digits, depth),
        ValueKind::Builtin(builtin) => builtin_repr(builtin, digits),
        ValueKind::Placeholder => "_".into(),
    }
}

pub fn closure_repr(closure: &Closure, digits: usize, depth: usize) -> String {
    if depth >= MAX_INLINE_DEPTH {
        return "<function>".into();
    }
    match &closure.body {
        ClosureBody::Compose(f, g) => format!(
            "{} >> {}",
            value_display(f, digits, depth + 1),
            value_display(g, digits, depth + 1)
        ),
        ClosureBody::Expr(body) => {
            let mut subst: IndexMap<String, Value> = IndexMap::new();
            let mut remaining: Vec<String> = Vec::new();
            for (i, param) in closure.params.iter().enumerate() {
                if param.rest {
                    let tail = &closure.applied[i.min(closure.applied.len())..];
                    let values: Vec<Value> = tail
                        .iter()
                        .filter_map(|slot| match slot {
                            Applied::Value(v) => Some(v.clone()),
                            Applied::Open => None,
                        })
                        .collect();
                    if !tail.is_empty() && values.len() == tail.len() {
                        subst.insert(param.name.clone(), Value::list(values));
                    } else {
                        remaining.push(format!("...{}", param.name));
                    }
                } else {
                    match closure.applied.get(i) {
                        Some(Applied::Value(v)) => {
                            subst.insert(param.name.clone(), v.clone());
                        }
                        _ => remaining.push(param.name.clone()),
                    }
                }
            }

            let mut blocked: Vec<String> = remaining
                .iter()
                .map(|p| p.trim_start_matches("...").to_string())
                .collect();
            if let Some(name) = &closure.self_name {
                blocked.push(name.clone());
            }

            let ctx = ReprCtx {
                subst: &subst,
                env: Some(&closure.env),
                blocked,
                digits,
                depth,
            };
            let body_text = expr_repr(body, &ctx, PREC_NONE);
            let header = match &closure.self_name {
                Some(name) if remaining.is_empty() => format!("{name}:"),
                Some(name) => format!("{name}: {}", remaining.join(", ")),
                None => remaining.join(", "),
            };
            format!("{{{header} -> {body_text}}}")
        }
    }
}

/// Partially applied built-ins render as the lambda they behave like:
/// `_ + 1` prints `{x -> x + 1}`.
pub fn builtin_repr(builtin: &Builtin, digits: usize) -> String {
    if builtin.applied.is_empty() {
        return format!("<builtin {}>", builtin.name);
    }
    let mut fresh = FreshNames::new();
    let mut params: Vec<String> = Vec::new();
    let mut parts: Vec<String> = Vec::new();
    for slot in &builtin.applied {
        match slot {
            Applied::Open => {
                let name = fresh.next();
                params.push(name.clone());
                parts.push(name);
            }
            Applied::Value(v) => parts.push(value_display(v, digits, 1)),
        }
    }
    for _ in builtin.applied.len()..builtin.arity.min() {
        let name = fresh.next();
        params.push(name.clone());
        parts.push(name);
    }
    let body = if is_operator(builtin.name) && parts.len() == 2 {
        format!("{} {} {}", parts[0], builtin.name, parts[1])
    } else if is_operator(builtin.name) && parts.len() == 1 {
        format!("{}{}", builtin.name, parts[0])
    } else {
        format!("{}({})", builtin.name, parts.join(", "))
    };
    format!("{{{} -> {}}}", params.join(", "), body)
}

fn is_operator(name: &str) -> bool {
    !name.chars().next().map(char::is_alphabetic).unwrap_or(false)
}

struct FreshNames {
    index: usize,
}

impl FreshNames {
    fn new() -> Self {
        Self { index: 0 }
    }

    fn next(&mut self) -> String {
        const POOL: [&str; 6] = ["x", "y", "z", "u", "v", "w"];
        let name = if self.index < POOL.len() {
            POOL[self.index].to_string()
        } else {
            format!("x{}", self.index - POOL.len() + 2)
        };
        self.index += 1;
        name
    }
}

struct ReprCtx<'a> {
    subst: &'a IndexMap<String, Value>,
    env: Option<&'a EnvironmentRef>,
    /// Names that must never be inlined: the still-unbound parameters and the
    /// closure's own recursion name.
    blocked: Vec<String>,
    digits: usize,
    depth: usize,
}

impl ReprCtx<'_> {
    fn resolve(&self, name: &str) -> Option<String> {
        if self.blocked.iter().any(|b| b == name) {
            return None;
        }
        if let Some(value) = self.subst.get(name) {
            return Some(self.inline(value));
        }
        if let Some(env) = self.env {
            if let Some(value) = Environment::lookup(env, name) {
                // Captured bindings are only inlined when their rendering is
                // unambiguous; callables keep their name.
                match &*value.0 {
                    ValueKind::Number(_) | ValueKind::Bool(_) | ValueKind::Str(_) => {
                        return Some(self.inline(&value));
                    }
                    ValueKind::List(_) if self.depth < MAX_INLINE_DEPTH => {
                        return Some(self.inline(&value));
                    }
                    _ => return None,
                }
            }
        }
        None
    }

    fn inline(&self, value: &Value) -> String {
        value_display(value, self.digits, self.depth + 1)
    }
}

fn expr_repr(expr: &Expr, ctx: &ReprCtx<'_>, parent: u8) -> String {
    match &expr.kind {
        ExprKind::Number(text) => text.clone(),
        ExprKind::Bool(b) => if *b { "true" } else { "false" }.into(),
        ExprKind::Str(s) => quote(s),
        ExprKind::Placeholder => "_".into(),
        ExprKind::Variable(name) => ctx.resolve(name).unwrap_or_else(|| name.clone()),
        ExprKind::List(elements) => {
            let parts: Vec<String> = elements
                .iter()
                .map(|e| expr_repr(e, ctx, PREC_NONE))
                .collect();
            format!("[{}]", parts.join(", "))
        }
        ExprKind::Spread(inner) => format!("...{}", expr_repr(inner, ctx, PREC_POSTFIX)),
        ExprKind::Lambda { name, params, body } => {
            let mut inner_blocked = ctx.blocked.clone();
            inner_blocked.extend(params.iter().map(|p| p.name.clone()));
            if let Some(name) = name {
                inner_blocked.push(name.clone());
            }
            let inner_ctx = ReprCtx {
                subst: ctx.subst,
                env: ctx.env,
                blocked: inner_blocked,
                digits: ctx.digits,
                depth: ctx.depth,
            };
            let header: Vec<String> = params
                .iter()
                .map(|p| {
                    if p.rest {
                        format!("...{}", p.name)
                    } else {
                        p.name.clone()
                    }
                })
                .collect();
            let prefix = match name {
                Some(name) if header.is_empty() => format!("{name}:"),
                Some(name) => format!("{name}: {}", header.join(", ")),
                None => header.join(", "),
            };
            format!("{{{prefix} -> {}}}", expr_repr(body, &inner_ctx, PREC_NONE))
        }
        ExprKind::Call { func, args } => {
            let parts: Vec<String> = args.iter().map(|a| expr_repr(a, ctx, PREC_NONE)).collect();
            let callee = expr_repr(func, ctx, PREC_POSTFIX);
            format!("{callee}({})", parts.join(", "))
        }
        ExprKind::Index { target, index } => {
            format!(
                "{}[{}]",
                expr_repr(target, ctx, PREC_POSTFIX),
                expr_repr(index, ctx, PREC_NONE)
            )
        }
        ExprKind::Unary { op, expr: operand } => {
            let symbol = match op {
                UnaryOp::Neg => "-",
                UnaryOp::Not => "!",
            };
            let text = format!("{symbol}{}", expr_repr(operand, ctx, PREC_UNARY));
            wrap(text, PREC_UNARY, parent)
        }
        ExprKind::Binary { op, left, right } => {
            let prec = match op {
                BinaryOp::Add | BinaryOp::Sub => PREC_ADD,
                BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => PREC_MUL,
                BinaryOp::Pow => PREC_POW,
                BinaryOp::And => PREC_AND,
                BinaryOp::Or => PREC_OR,
            };
            let text = if *op == BinaryOp::Pow {
                format!(
                    "{} ^ {}",
                    expr_repr(left, ctx, prec + 1),
                    expr_repr(right, ctx, prec)
                )
            } else {
                format!(
                    "{} {} {}",
                    expr_repr(left, ctx, prec),
                    op.symbol(),
                    expr_repr(right, ctx, prec + 1)
                )
            };
            wrap(text, prec, parent)
        }
        ExprKind::Compare { first, rest } => {
            let mut text = expr_repr(first, ctx, PREC_CMP + 1);
            for (op, operand) in rest {
                text.push_str(&format!(
                    " {} {}",
                    op.symbol(),
                    expr_repr(operand, ctx, PREC_CMP + 1)
                ));
            }
            wrap(text, PREC_CMP, parent)
        }
        ExprKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            let text = format!(
                "if {} then {} else {}",
                expr_repr(cond, ctx, PREC_NONE),
                expr_repr(then_branch, ctx, PREC_NONE),
                expr_repr(else_branch, ctx, PREC_NONE)
            );
            wrap(text, PREC_NONE + 1, parent)
        }
        ExprKind::LetIn { bindings, body } => {
            let mut inner_blocked = ctx.blocked.clone();
            inner_blocked.extend(bindings.iter().map(|(name, _)| name.clone()));
            let parts: Vec<String> = bindings
                .iter()
                .map(|(name, value)| format!("{name} = {}", expr_repr(value, ctx, PREC_NONE)))
                .collect();
            let inner_ctx = ReprCtx {
                subst: ctx.subst,
                env: ctx.env,
                blocked: inner_blocked,
                digits: ctx.digits,
                depth: ctx.depth,
            };
            let text = format!(
                "let {} in {}",
                parts.join(", "),
                expr_repr(body, &inner_ctx, PREC_NONE)
            );
            wrap(text, PREC_NONE + 1, parent)
        }
        ExprKind::Compose { left, right } => {
            let text = format!(
                "{} >> {}",
                expr_repr(left, ctx, PREC_COMPOSE + 1),
                expr_repr(right, ctx, PREC_COMPOSE)
            );
            wrap(text, PREC_COMPOSE, parent)
        }
    }
}

fn wrap(text: String, prec: u8, parent: u8) -> String {
    if prec < parent {
        format!("({text})")
    } else {
        text
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}
