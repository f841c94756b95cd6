use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::diagnostics::SourceSpan;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub rest: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "^",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
        }
    }

    /// Relational operators require numeric operands; equality accepts any.
    pub fn is_relational(self) -> bool {
        !matches!(self, CompareOp::Eq | CompareOp::Ne)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExprKind {
    /// Numeric literal, kept as written so reconstruction and precision
    /// handling stay faithful to the source.
    Number(String),
    Bool(bool),
    Str(String),
    Variable(String),
    Placeholder,
    List(Vec<Expr>),
    Spread(Box<Expr>),
    Lambda {
        name: Option<String>,
        params: Rc<Vec<Param>>,
        body: Rc<Expr>,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `a < b <= c` with every operand held once; desugaring to `&&` happens
    /// in the evaluator so the middle operands are evaluated exactly once.
    Compare {
        first: Box<Expr>,
        rest: Vec<(CompareOp, Expr)>,
    },
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    LetIn {
        bindings: Vec<(String, Expr)>,
        body: Box<Expr>,
    },
    Compose {
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportNames {
    /// `import a, b from "path"`
    Named(Vec<String>),
    /// `import * from "path"`
    Star,
    /// `import "path"` — exports become `prefix.name` bindings.
    Module,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StmtKind {
    /// Top-level `let NAME = EXPR` (single binding, no `in`).
    Let { name: String, value: Expr },
    Del { name: String },
    Import { names: ImportNames, path: String },
    Export { names: Vec<String> },
    ExportLet { name: String, value: Expr },
    /// `EXPR ---> PRED`; `$` is bound to the value of `EXPR` inside `PRED`.
    Assert { value: Expr, pred: Expr },
    Expr(Expr),
}
