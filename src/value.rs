use std::rc::Rc;

use crate::{
    ast::{Expr, Param},
    diagnostics::{NumFuError, SourceSpan},
    environment::EnvironmentRef,
    number::Number,
    runtime::Interpreter,
};

#[derive(Clone)]
pub struct Value(pub Rc<ValueKind>);

impl Value {
    pub fn new(kind: ValueKind) -> Self {
        Self(Rc::new(kind))
    }

    pub fn unit() -> Self {
        Self::new(ValueKind::Unit)
    }

    pub fn bool(value: bool) -> Self {
        Self::new(ValueKind::Bool(value))
    }

    pub fn number(value: Number) -> Self {
        Self::new(ValueKind::Number(value))
    }

    pub fn int(value: i64) -> Self {
        Self::new(ValueKind::Number(Number::from_i64(value)))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(ValueKind::Str(value.into()))
    }

    pub fn list(values: Vec<Value>) -> Self {
        Self::new(ValueKind::List(values))
    }

    pub fn placeholder() -> Self {
        Self::new(ValueKind::Placeholder)
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(&*self.0, ValueKind::Placeholder)
    }

    pub fn is_unit(&self) -> bool {
        matches!(&*self.0, ValueKind::Unit)
    }

    /// `false`, `0`, `""`, `[]` and the unit value are falsy; everything else
    /// (including `nan`, `inf` and any callable) is truthy.
    pub fn is_truthy(&self) -> bool {
        match &*self.0 {
            ValueKind::Unit => false,
            ValueKind::Bool(b) => *b,
            ValueKind::Number(n) => !n.is_zero(),
            ValueKind::Str(s) => !s.is_empty(),
            ValueKind::List(values) => !values.is_empty(),
            ValueKind::Closure(_) | ValueKind::Builtin(_) => true,
            ValueKind::Placeholder => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match &*self.0 {
            ValueKind::Unit => "Unit",
            ValueKind::Bool(_) => "Boolean",
            ValueKind::Number(_) => "Number",
            ValueKind::Str(_) => "String",
            ValueKind::List(_) => "List",
            ValueKind::Closure(_) | ValueKind::Builtin(_) => "Function",
            ValueKind::Placeholder => "Placeholder",
        }
    }

    /// Structural equality: same variant, same contents. Cross-type
    /// comparisons and anything involving NaN are false. Closures compare by
    /// identity of body and captured frame plus their bound-argument tuples.
    pub fn deep_eq(&self, other: &Value) -> bool {
        match (&*self.0, &*other.0) {
            (ValueKind::Unit, ValueKind::Unit) => true,
            (ValueKind::Bool(a), ValueKind::Bool(b)) => a == b,
            (ValueKind::Number(a), ValueKind::Number(b)) => a == b,
            (ValueKind::Str(a), ValueKind::Str(b)) => a == b,
            (ValueKind::List(a), ValueKind::List(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(l, r)| l.deep_eq(r))
            }
            (ValueKind::Closure(a), ValueKind::Closure(b)) => {
                a.same_identity(b) && applied_eq(&a.applied, &b.applied)
            }
            (ValueKind::Builtin(a), ValueKind::Builtin(b)) => {
                a.name == b.name && applied_eq(&a.applied, &b.applied)
            }
            _ => false,
        }
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &*self.0 {
            ValueKind::Unit => write!(f, "Unit"),
            ValueKind::Bool(b) => write!(f, "{b}"),
            ValueKind::Number(n) => write!(f, "{}", n.to_repr(crate::number::precision())),
            ValueKind::Str(s) => write!(f, "{s:?}"),
            ValueKind::List(values) => f.debug_list().entries(values.iter()).finish(),
            ValueKind::Closure(_) => write!(f, "<closure>"),
            ValueKind::Builtin(b) => write!(f, "<builtin {}>", b.name),
            ValueKind::Placeholder => write!(f, "_"),
        }
    }
}

pub enum ValueKind {
    Unit,
    Bool(bool),
    Number(Number),
    Str(String),
    List(Vec<Value>),
    Closure(Closure),
    Builtin(Builtin),
    /// Sentinel produced by a `_` argument while a call is being assembled.
    /// Never stored in an environment or returned to user code.
    Placeholder,
}

/// One argument slot of a partially applied callable: either a bound value or
/// a position reserved by `_` that a later call must fill.
#[derive(Clone)]
pub enum Applied {
    Value(Value),
    Open,
}

impl Applied {
    pub fn is_open(&self) -> bool {
        matches!(self, Applied::Open)
    }
}

/// Fold a new argument vector into the existing slot state: each argument
/// fills the earliest remaining reserved slot (a placeholder argument
/// re-reserves it), and anything left over is appended.
pub fn merge_applied(applied: &[Applied], args: &[Value]) -> Vec<Applied> {
    let mut merged = applied.to_vec();
    let mut cursor = 0;
    for arg in args {
        while cursor < merged.len() && !merged[cursor].is_open() {
            cursor += 1;
        }
        let slot = if arg.is_placeholder() {
            Applied::Open
        } else {
            Applied::Value(arg.clone())
        };
        if cursor < merged.len() {
            merged[cursor] = slot;
            cursor += 1;
        } else {
            merged.push(slot);
        }
    }
    merged
}

fn applied_eq(a: &[Applied], b: &[Applied]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b.iter()).all(|(l, r)| match (l, r) {
            (Applied::Open, Applied::Open) => true,
            (Applied::Value(l), Applied::Value(r)) => l.deep_eq(r),
            _ => false,
        })
}

#[derive(Clone)]
pub enum ClosureBody {
    Expr(Rc<Expr>),
    /// `f >> g`: apply the left callable, then tail-call the right one.
    Compose(Box<Value>, Box<Value>),
}

#[derive(Clone)]
pub struct Closure {
    /// Parameter names straight from the lambda header; together with the
    /// body AST these drive syntactic reconstruction when the closure prints.
    pub params: Rc<Vec<Param>>,
    pub body: ClosureBody,
    pub env: EnvironmentRef,
    /// Name the closure can call itself by, from the `{name: … -> …}` form.
    pub self_name: Option<String>,
    pub applied: Vec<Applied>,
}

impl Closure {
    pub fn has_rest(&self) -> bool {
        self.params.last().map(|p| p.rest).unwrap_or(false)
    }

    /// Number of arguments needed before the body may run. The rest
    /// parameter collects zero or more, so it does not count.
    pub fn min_arity(&self) -> usize {
        self.params.len() - usize::from(self.has_rest())
    }

    /// Identity comparison: same body AST and same captured frame.
    fn same_identity(&self, other: &Closure) -> bool {
        let body_eq = match (&self.body, &other.body) {
            (ClosureBody::Expr(a), ClosureBody::Expr(b)) => Rc::ptr_eq(a, b),
            (ClosureBody::Compose(fa, ga), ClosureBody::Compose(fb, gb)) => {
                fa.deep_eq(fb) && ga.deep_eq(gb)
            }
            _ => false,
        };
        body_eq && Rc::ptr_eq(&self.env, &other.env)
    }

    /// A fresh, unapplied copy of this closure, used to bind the self-name
    /// when a named lambda recurses.
    pub fn unapplied(&self) -> Closure {
        Closure {
            params: Rc::clone(&self.params),
            body: self.body.clone(),
            env: Rc::clone(&self.env),
            self_name: self.self_name.clone(),
            applied: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Between(usize, usize),
}

impl Arity {
    pub fn min(&self) -> usize {
        match self {
            Arity::Exact(n) | Arity::AtLeast(n) | Arity::Between(n, _) => *n,
        }
    }

    pub fn max(&self) -> Option<usize> {
        match self {
            Arity::Exact(n) => Some(*n),
            Arity::AtLeast(_) => None,
            Arity::Between(_, n) => Some(*n),
        }
    }
}

pub type NativeFn = fn(&mut Interpreter, &[Value], SourceSpan) -> Result<Value, NumFuError>;

/// A native operation sharing the curry/placeholder protocol with `Closure`.
#[derive(Clone)]
pub struct Builtin {
    pub name: &'static str,
    pub arity: Arity,
    pub applied: Vec<Applied>,
    pub func: NativeFn,
}

impl Builtin {
    pub fn new(name: &'static str, arity: Arity, func: NativeFn) -> Self {
        Self {
            name,
            arity,
            applied: Vec::new(),
            func,
        }
    }
}
