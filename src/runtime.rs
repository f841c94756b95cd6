use std::{
    fs,
    path::{Path, PathBuf},
    rc::Rc,
};

use indexmap::IndexMap;

use crate::{
    ast::{BinaryOp, CompareOp, Expr, ExprKind, ImportNames, Stmt, StmtKind, UnaryOp},
    builtins,
    diagnostics::{Diagnostic, ErrorKind, NumFuError, Result, SourceSpan},
    environment::{Environment, EnvironmentRef},
    modules::{self, ModuleRecord, ModuleState, Resolved},
    number::{self, Number},
    parser, reconstruct, treefile,
    value::{merge_applied, Applied, Builtin, Closure, ClosureBody, Value, ValueKind},
};

pub const DEFAULT_REC_DEPTH: usize = 10_000;

/// Where a module's statements are being executed: its directory anchors
/// relative imports, and only the entry module prints top-level results.
struct ModuleCtx {
    dir: PathBuf,
    file: Option<PathBuf>,
    is_main: bool,
}

/// One reduction step: either a finished value, or a call in tail position
/// for the trampoline in `invoke_closure` to iterate on.
enum Step {
    Done(Value),
    Tail(PendingCall),
}

struct PendingCall {
    callee: Value,
    args: Vec<Value>,
    span: SourceSpan,
}

pub struct Interpreter {
    root: EnvironmentRef,
    modules: IndexMap<String, ModuleRecord>,
    rec_depth: usize,
    iter_depth: Option<usize>,
    depth: usize,
    print_directly: bool,
    output: Vec<String>,
    repl_env: Option<EnvironmentRef>,
}

impl Interpreter {
    pub fn new() -> Result<Self> {
        let root = Environment::new();
        builtins::install(&root);
        let mut interpreter = Self {
            root,
            modules: IndexMap::new(),
            rec_depth: DEFAULT_REC_DEPTH,
            iter_depth: None,
            depth: 0,
            print_directly: true,
            output: Vec::new(),
            repl_env: None,
        };
        interpreter.load_prelude()?;
        Ok(interpreter)
    }

    pub fn set_rec_depth(&mut self, depth: usize) {
        self.rec_depth = depth.max(1);
    }

    /// `None` leaves tail-call iteration unbounded.
    pub fn set_iter_depth(&mut self, depth: Option<usize>) {
        self.iter_depth = depth;
    }

    /// When disabled, top-level results and `print` output are only collected
    /// into the returned output list.
    pub fn set_print_directly(&mut self, print: bool) {
        self.print_directly = print;
    }

    /// Evaluate the NumFu prelude and merge its exports into the root
    /// environment, after the natives have been registered.
    fn load_prelude(&mut self) -> Result<()> {
        for &(name, source) in modules::STDLIB {
            if name != "builtins" {
                continue;
            }
            let stmts = parser::parse_program(source).map_err(NumFuError::from)?;
            let env = Environment::with_parent(Rc::clone(&self.root));
            let ctx = ModuleCtx {
                dir: PathBuf::from("."),
                file: None,
                is_main: false,
            };
            let exports = self.exec_statements(&stmts, &env, &ctx)?;
            self.modules.insert(
                format!("<stdlib>/{name}"),
                ModuleRecord {
                    exports: exports.clone(),
                    state: ModuleState::Ready,
                },
            );
            for (name, value) in exports {
                self.root.borrow_mut().define(name, value);
            }
        }
        Ok(())
    }

    /// Run a file to completion and return everything it printed. `.nfut`
    /// tree files produced by `numfu ast` run the same way as sources.
    pub fn run_file(&mut self, path: &Path) -> Result<Vec<String>> {
        self.output.clear();
        self.depth = 0;
        let bytes = fs::read(path)?;
        let stmts = if treefile::is_tree_file(&bytes) {
            treefile::decode(&bytes).map_err(|err| err.attach_file(path))?
        } else {
            let source = String::from_utf8(bytes).map_err(|_| {
                NumFuError::from(Diagnostic::new(
                    ErrorKind::Value,
                    "source file is not valid UTF-8",
                ))
                .attach_file(path)
            })?;
            parser::parse_program(&source)
                .map_err(|diag| NumFuError::from(diag).attach_file(path))?
        };

        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        let key = modules::canonical_key(path);
        self.modules.insert(key.clone(), ModuleRecord::loading());

        let ctx = ModuleCtx {
            dir,
            file: Some(path.to_path_buf()),
            is_main: true,
        };
        let env = Environment::with_parent(Rc::clone(&self.root));
        match self.exec_statements(&stmts, &env, &ctx) {
            Ok(exports) => {
                if let Some(record) = self.modules.get_mut(&key) {
                    record.exports = exports;
                    record.state = ModuleState::Ready;
                }
                Ok(self.output.clone())
            }
            Err(err) => {
                if let Some(record) = self.modules.get_mut(&key) {
                    record.state = ModuleState::Failed;
                }
                Err(err.attach_file(path))
            }
        }
    }

    /// Evaluate a source string in the persistent top frame. Each REPL line
    /// goes through here, so `let` bindings survive between calls.
    pub fn run_source(&mut self, source: &str, dir: &Path) -> Result<Vec<String>> {
        self.output.clear();
        self.depth = 0;
        let stmts = parser::parse_program(source).map_err(NumFuError::from)?;
        let env = match &self.repl_env {
            Some(env) => Rc::clone(env),
            None => {
                let env = Environment::with_parent(Rc::clone(&self.root));
                self.repl_env = Some(Rc::clone(&env));
                env
            }
        };
        let ctx = ModuleCtx {
            dir: dir.to_path_buf(),
            file: None,
            is_main: true,
        };
        self.exec_statements(&stmts, &env, &ctx)?;
        Ok(self.output.clone())
    }

    pub(crate) fn put(&mut self, text: impl Into<String>) {
        let text = text.into();
        if self.print_directly {
            print!("{text}");
        }
        self.output.push(text);
    }

    fn exec_statements(
        &mut self,
        stmts: &[Stmt],
        env: &EnvironmentRef,
        ctx: &ModuleCtx,
    ) -> Result<IndexMap<String, Value>> {
        let mut export_names: Vec<(String, SourceSpan)> = Vec::new();
        for stmt in stmts {
            match &stmt.kind {
                StmtKind::Let { name, value } => {
                    let evaluated = self.eval(value, env)?;
                    env.borrow_mut().define(name.clone(), evaluated);
                }
                StmtKind::Del { name } => {
                    if !env.borrow_mut().remove(name) {
                        return Err(self.name_error(name, stmt.span));
                    }
                }
                StmtKind::Import { names, path } => {
                    self.exec_import(names, path, stmt.span, env, ctx)?;
                }
                StmtKind::Export { names } => {
                    for name in names {
                        if !env.borrow().contains(name) {
                            return Err(self.name_error(name, stmt.span));
                        }
                        export_names.push((name.clone(), stmt.span));
                    }
                }
                StmtKind::ExportLet { name, value } => {
                    let evaluated = self.eval(value, env)?;
                    env.borrow_mut().define(name.clone(), evaluated);
                    export_names.push((name.clone(), stmt.span));
                }
                StmtKind::Assert { value, pred } => {
                    let evaluated = self.eval(value, env)?;
                    let frame = Environment::with_parent(Rc::clone(env));
                    frame.borrow_mut().define("$", evaluated);
                    let verdict = self.eval(pred, &frame)?;
                    if !matches!(&*verdict.0, ValueKind::Bool(true)) {
                        return Err(NumFuError::from(
                            Diagnostic::new(ErrorKind::Assertion, "assertion failed")
                                .with_span(value.span),
                        ));
                    }
                }
                StmtKind::Expr(expr) => {
                    // A named lambda at the top level is a declaration: it
                    // binds its name and prints nothing.
                    if let ExprKind::Lambda {
                        name: Some(name), ..
                    } = &expr.kind
                    {
                        let value = self.eval(expr, env)?;
                        env.borrow_mut().define(name.clone(), value);
                        continue;
                    }
                    let value = self.eval(expr, env)?;
                    if ctx.is_main && !value.is_unit() {
                        let text = reconstruct::value_repr(&value, number::precision());
                        self.put(format!("{text}\n"));
                    }
                }
            }
        }

        let mut exports = IndexMap::new();
        for (name, span) in export_names {
            match Environment::lookup(env, &name) {
                Some(value) => {
                    exports.insert(name, value);
                }
                None => return Err(self.name_error(&name, span)),
            }
        }
        Ok(exports)
    }

    fn exec_import(
        &mut self,
        names: &ImportNames,
        path: &str,
        span: SourceSpan,
        env: &EnvironmentRef,
        ctx: &ModuleCtx,
    ) -> Result<()> {
        let exports = self.import_module(path, &ctx.dir, span)?;
        match names {
            ImportNames::Named(list) => {
                for name in list {
                    match exports.get(name) {
                        Some(value) => env.borrow_mut().define(name.clone(), value.clone()),
                        None => {
                            return Err(NumFuError::from(
                                Diagnostic::new(
                                    ErrorKind::Import,
                                    format!(
                                        "module {path} does not export an identifier named {name}"
                                    ),
                                )
                                .with_span(span),
                            ));
                        }
                    }
                }
            }
            ImportNames::Star => {
                for (name, value) in exports {
                    env.borrow_mut().define(name, value);
                }
            }
            ImportNames::Module => {
                let prefix = modules::module_prefix(path);
                for (name, value) in exports {
                    env.borrow_mut().define(format!("{prefix}.{name}"), value);
                }
            }
        }
        Ok(())
    }

    /// Locate, parse and evaluate a module (once per process), returning its
    /// export table.
    fn import_module(
        &mut self,
        path: &str,
        dir: &Path,
        span: SourceSpan,
    ) -> Result<IndexMap<String, Value>> {
        if !modules::valid_module_name(path) {
            return Err(NumFuError::from(
                Diagnostic::new(
                    ErrorKind::Import,
                    format!("\"{path}\" is an invalid module name"),
                )
                .with_span(span),
            ));
        }
        let resolved = modules::resolve(path, dir).ok_or_else(|| {
            NumFuError::from(
                Diagnostic::new(ErrorKind::Import, format!("Cannot find module {path}"))
                    .with_span(span),
            )
        })?;
        let (key, source, file, module_dir) = match resolved {
            Resolved::File(file_path) => {
                let key = modules::canonical_key(&file_path);
                if let Some(hit) = self.cache_lookup(&key, path, span)? {
                    return Ok(hit);
                }
                // the file handle is closed here, before evaluation starts
                let source = fs::read_to_string(&file_path)?;
                let module_dir = file_path
                    .parent()
                    .unwrap_or_else(|| Path::new("."))
                    .to_path_buf();
                (key, source, Some(file_path), module_dir)
            }
            Resolved::Stdlib(name, source) => {
                let key = format!("<stdlib>/{name}");
                if let Some(hit) = self.cache_lookup(&key, path, span)? {
                    return Ok(hit);
                }
                (key, source.to_string(), None, PathBuf::from("."))
            }
        };

        self.modules.insert(key.clone(), ModuleRecord::loading());
        let result = self.load_module_source(&source, &module_dir, file.as_deref());
        match result {
            Ok(exports) => {
                if let Some(record) = self.modules.get_mut(&key) {
                    record.exports = exports.clone();
                    record.state = ModuleState::Ready;
                }
                Ok(exports)
            }
            Err(err) => {
                if let Some(record) = self.modules.get_mut(&key) {
                    record.state = ModuleState::Failed;
                }
                let err = match &file {
                    Some(file) => err.attach_file(file),
                    None => err,
                };
                Err(err)
            }
        }
    }

    fn cache_lookup(
        &self,
        key: &str,
        path: &str,
        span: SourceSpan,
    ) -> Result<Option<IndexMap<String, Value>>> {
        match self.modules.get(key) {
            Some(record) => match record.state {
                ModuleState::Ready => Ok(Some(record.exports.clone())),
                ModuleState::Loading => Err(NumFuError::from(
                    Diagnostic::new(ErrorKind::Import, "cyclic import").with_span(span),
                )),
                ModuleState::Failed => Err(NumFuError::from(
                    Diagnostic::new(
                        ErrorKind::Import,
                        format!("module {path} previously failed to load"),
                    )
                    .with_span(span),
                )),
            },
            None => Ok(None),
        }
    }

    fn load_module_source(
        &mut self,
        source: &str,
        dir: &Path,
        file: Option<&Path>,
    ) -> Result<IndexMap<String, Value>> {
        let stmts = parser::parse_program(source).map_err(NumFuError::from)?;
        let env = Environment::with_parent(Rc::clone(&self.root));
        let ctx = ModuleCtx {
            dir: dir.to_path_buf(),
            file: file.map(Path::to_path_buf),
            is_main: false,
        };
        self.exec_statements(&stmts, &env, &ctx)
    }

    /// Full evaluation of an expression: any tail call the step produces is
    /// resolved before returning.
    pub fn eval(&mut self, expr: &Expr, env: &EnvironmentRef) -> Result<Value> {
        match self.eval_step(expr, env, false)? {
            Step::Done(value) => Ok(value),
            Step::Tail(call) => self.finish_call(call),
        }
    }

    /// Evaluate a callable value applied to arguments, resolving the
    /// curry/placeholder protocol. Built-ins like `map` re-enter through
    /// this.
    pub fn call_value(&mut self, callee: Value, args: Vec<Value>, span: SourceSpan) -> Result<Value> {
        match self.dispatch_call(callee, args, span, false)? {
            Step::Done(value) => Ok(value),
            Step::Tail(call) => self.finish_call(call),
        }
    }

    fn finish_call(&mut self, call: PendingCall) -> Result<Value> {
        match self.dispatch_call(call.callee, call.args, call.span, false)? {
            Step::Done(value) => Ok(value),
            Step::Tail(_) => Err(NumFuError::from(Diagnostic::new(
                ErrorKind::Runtime,
                "internal error: unresolved tail call",
            ))),
        }
    }

    fn eval_step(&mut self, expr: &Expr, env: &EnvironmentRef, tail: bool) -> Result<Step> {
        match &expr.kind {
            ExprKind::Number(text) => match Number::parse(text) {
                Some(number) => Ok(Step::Done(Value::number(number))),
                None => Err(NumFuError::from(
                    Diagnostic::new(ErrorKind::Value, format!("invalid numeric literal `{text}`"))
                        .with_span(expr.span),
                )),
            },
            ExprKind::Bool(b) => Ok(Step::Done(Value::bool(*b))),
            ExprKind::Str(s) => Ok(Step::Done(Value::string(s.clone()))),
            ExprKind::Placeholder => Ok(Step::Done(Value::placeholder())),
            ExprKind::Variable(name) => match Environment::lookup(env, name) {
                Some(value) => Ok(Step::Done(value)),
                None => Err(self.name_error(name, expr.span)),
            },
            ExprKind::List(elements) => {
                let mut values = Vec::new();
                for element in elements {
                    if let ExprKind::Spread(inner) = &element.kind {
                        let spread = self.eval(inner, env)?;
                        match &*spread.0 {
                            ValueKind::List(items) => values.extend(items.iter().cloned()),
                            other => {
                                return Err(NumFuError::from(
                                    Diagnostic::new(
                                        ErrorKind::Type,
                                        format!("Type '{}' is not iterable", type_name(other)),
                                    )
                                    .with_span(element.span),
                                ));
                            }
                        }
                        continue;
                    }
                    let value = self.eval(element, env)?;
                    if value.is_placeholder() {
                        return Err(NumFuError::from(
                            Diagnostic::new(
                                ErrorKind::Type,
                                "argument placeholder is only allowed in call arguments",
                            )
                            .with_span(element.span),
                        ));
                    }
                    values.push(value);
                }
                Ok(Step::Done(Value::list(values)))
            }
            ExprKind::Spread(_) => Err(NumFuError::from(
                Diagnostic::new(
                    ErrorKind::Syntax,
                    "spread is only allowed in calls and list literals",
                )
                .with_span(expr.span),
            )),
            ExprKind::Lambda { name, params, body } => {
                let closure = Closure {
                    params: Rc::clone(params),
                    body: ClosureBody::Expr(Rc::clone(body)),
                    env: Rc::clone(env),
                    self_name: name.clone(),
                    applied: Vec::new(),
                };
                Ok(Step::Done(Value::new(ValueKind::Closure(closure))))
            }
            ExprKind::Call { func, args } => {
                let callee = self.eval(func, env)?;
                let argv = self.eval_call_args(args, env)?;
                self.dispatch_call(callee, argv, expr.span, tail)
            }
            ExprKind::Index { target, index } => {
                let target_value = self.eval(target, env)?;
                let index_value = self.eval(index, env)?;
                Ok(Step::Done(self.index(target_value, index_value, expr.span)?))
            }
            ExprKind::Unary { op, expr: operand } => {
                let value = self.eval(operand, env)?;
                let symbol = match op {
                    UnaryOp::Neg => "-",
                    UnaryOp::Not => "!",
                };
                if value.is_placeholder() {
                    let builtin = builtins::operator(symbol);
                    return Ok(Step::Done(partial_builtin(builtin, &[value])));
                }
                let native = builtins::operator(symbol);
                Ok(Step::Done((native.func)(self, &[value], expr.span)?))
            }
            ExprKind::Binary { op, left, right } => {
                self.eval_binary(*op, left, right, env, expr.span)
            }
            ExprKind::Compare { first, rest } => self.eval_compare(first, rest, env, expr.span),
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let condition = self.eval(cond, env)?;
                if condition.is_truthy() {
                    self.eval_step(then_branch, env, tail)
                } else {
                    self.eval_step(else_branch, env, tail)
                }
            }
            ExprKind::LetIn { bindings, body } => {
                // The new frame exists while the right-hand sides evaluate so
                // closures capture it, but names are only added afterwards:
                // bindings never see each other's values.
                let frame = Environment::with_parent(Rc::clone(env));
                let mut values = Vec::with_capacity(bindings.len());
                for (_, rhs) in bindings {
                    values.push(self.eval(rhs, &frame)?);
                }
                for ((name, _), value) in bindings.iter().zip(values) {
                    frame.borrow_mut().define(name.clone(), value);
                }
                self.eval_step(body, &frame, tail)
            }
            ExprKind::Compose { left, right } => {
                let f = self.eval(left, env)?;
                let g = self.eval(right, env)?;
                for value in [&f, &g] {
                    if !matches!(&*value.0, ValueKind::Closure(_) | ValueKind::Builtin(_)) {
                        return Err(NumFuError::from(
                            Diagnostic::new(
                                ErrorKind::Type,
                                format!("{} is not callable", value.type_name()),
                            )
                            .with_span(expr.span),
                        ));
                    }
                }
                let closure = Closure {
                    params: Rc::new(vec![crate::ast::Param {
                        name: "x".into(),
                        rest: false,
                    }]),
                    body: ClosureBody::Compose(Box::new(f), Box::new(g)),
                    env: Rc::clone(env),
                    self_name: None,
                    applied: Vec::new(),
                };
                Ok(Step::Done(Value::new(ValueKind::Closure(closure))))
            }
        }
    }

    fn eval_binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        env: &EnvironmentRef,
        span: SourceSpan,
    ) -> Result<Step> {
        let has_placeholder = matches!(left.kind, ExprKind::Placeholder)
            || matches!(right.kind, ExprKind::Placeholder);

        if matches!(op, BinaryOp::And | BinaryOp::Or) && !has_placeholder {
            let left_value = self.eval(left, env)?;
            let outcome = match op {
                BinaryOp::And => {
                    if !left_value.is_truthy() {
                        Value::bool(false)
                    } else {
                        Value::bool(self.eval(right, env)?.is_truthy())
                    }
                }
                _ => {
                    if left_value.is_truthy() {
                        Value::bool(true)
                    } else {
                        Value::bool(self.eval(right, env)?.is_truthy())
                    }
                }
            };
            return Ok(Step::Done(outcome));
        }

        let left_value = self.eval(left, env)?;
        let right_value = self.eval(right, env)?;
        if left_value.is_placeholder() || right_value.is_placeholder() {
            let builtin = builtins::operator(op.symbol());
            return Ok(Step::Done(partial_builtin(
                builtin,
                &[left_value, right_value],
            )));
        }
        let native = builtins::operator(op.symbol());
        Ok(Step::Done((native.func)(
            self,
            &[left_value, right_value],
            span,
        )?))
    }

    fn eval_compare(
        &mut self,
        first: &Expr,
        rest: &[(CompareOp, Expr)],
        env: &EnvironmentRef,
        span: SourceSpan,
    ) -> Result<Step> {
        if rest.len() == 1 {
            let (op, second) = &rest[0];
            if matches!(first.kind, ExprKind::Placeholder)
                || matches!(second.kind, ExprKind::Placeholder)
            {
                let left = self.eval(first, env)?;
                let right = self.eval(second, env)?;
                let builtin = builtins::operator(op.symbol());
                return Ok(Step::Done(partial_builtin(builtin, &[left, right])));
            }
        }

        // Every operand evaluates exactly once; a failing link short-circuits
        // the rest of the chain like the `&&` desugaring it stands for.
        let mut previous = self.eval(first, env)?;
        for (op, operand) in rest {
            let current = self.eval(operand, env)?;
            let native = builtins::operator(op.symbol());
            let verdict = (native.func)(self, &[previous, current.clone()], span)?;
            if !verdict.is_truthy() {
                return Ok(Step::Done(Value::bool(false)));
            }
            previous = current;
        }
        Ok(Step::Done(Value::bool(true)))
    }

    fn eval_call_args(&mut self, args: &[Expr], env: &EnvironmentRef) -> Result<Vec<Value>> {
        let mut out = Vec::new();
        let mut spread_span: Option<SourceSpan> = None;
        for arg in args {
            if let ExprKind::Spread(inner) = &arg.kind {
                let value = self.eval(inner, env)?;
                match &*value.0 {
                    ValueKind::List(items) => out.extend(items.iter().cloned()),
                    ValueKind::Placeholder => {
                        return Err(spread_placeholder_error(arg.span));
                    }
                    other => {
                        return Err(NumFuError::from(
                            Diagnostic::new(
                                ErrorKind::Type,
                                format!("Type '{}' is not iterable", type_name(other)),
                            )
                            .with_span(arg.span),
                        ));
                    }
                }
                spread_span = Some(arg.span);
            } else {
                out.push(self.eval(arg, env)?);
            }
        }
        if let Some(span) = spread_span {
            if out.iter().any(Value::is_placeholder) {
                return Err(spread_placeholder_error(span));
            }
        }
        Ok(out)
    }

    /// Merge new arguments into a callable's slot state; return a partial
    /// value, invoke, or hand a tail call back to the trampoline.
    fn dispatch_call(
        &mut self,
        callee: Value,
        args: Vec<Value>,
        span: SourceSpan,
        tail: bool,
    ) -> Result<Step> {
        match &*callee.0 {
            ValueKind::Closure(closure) => {
                let merged = merge_applied(&closure.applied, &args);
                let open = merged.iter().any(Applied::is_open);
                if open || merged.len() < closure.min_arity() {
                    let partial = Closure {
                        applied: merged,
                        ..closure.clone()
                    };
                    return Ok(Step::Done(Value::new(ValueKind::Closure(partial))));
                }
                let final_args = collect_values(merged);
                if tail {
                    let pending = Closure {
                        applied: Vec::new(),
                        ..closure.clone()
                    };
                    Ok(Step::Tail(PendingCall {
                        callee: Value::new(ValueKind::Closure(pending)),
                        args: final_args,
                        span,
                    }))
                } else {
                    Ok(Step::Done(self.invoke_closure(
                        closure.unapplied(),
                        final_args,
                        span,
                    )?))
                }
            }
            ValueKind::Builtin(builtin) => {
                let merged = merge_applied(&builtin.applied, &args);
                if let Some(max) = builtin.arity.max() {
                    if merged.len() > max {
                        return Err(NumFuError::from(
                            Diagnostic::new(
                                ErrorKind::Type,
                                format!(
                                    "'{}' expected {} argument{}, got {}",
                                    builtin.name,
                                    max,
                                    if max == 1 { "" } else { "s" },
                                    merged.len()
                                ),
                            )
                            .with_span(span),
                        ));
                    }
                }
                let open = merged.iter().any(Applied::is_open);
                if open || merged.len() < builtin.arity.min() {
                    let partial = Builtin {
                        applied: merged,
                        ..builtin.clone()
                    };
                    return Ok(Step::Done(Value::new(ValueKind::Builtin(partial))));
                }
                let final_args = collect_values(merged);
                let value = (builtin.func)(self, &final_args, span)?;
                Ok(Step::Done(value))
            }
            other => Err(NumFuError::from(
                Diagnostic::new(
                    ErrorKind::Type,
                    format!("{} is not callable", type_name(other)),
                )
                .with_span(span),
            )),
        }
    }

    /// The trampoline. Non-tail invocations nest on the host stack (bounded
    /// by `rec_depth`); tail calls feed back into this loop (bounded by
    /// `iter_depth`) without growing it.
    fn invoke_closure(
        &mut self,
        closure: Closure,
        args: Vec<Value>,
        span: SourceSpan,
    ) -> Result<Value> {
        self.depth += 1;
        if self.depth > self.rec_depth {
            self.depth -= 1;
            return Err(NumFuError::from(
                Diagnostic::new(ErrorKind::Recursion, "maximum recursion depth exceeded")
                    .with_span(span),
            ));
        }
        let result = self.closure_loop(closure, args, span);
        self.depth -= 1;
        result
    }

    fn closure_loop(
        &mut self,
        mut current: Closure,
        mut args: Vec<Value>,
        span: SourceSpan,
    ) -> Result<Value> {
        let mut iterations: usize = 0;
        loop {
            iterations += 1;
            if let Some(limit) = self.iter_depth {
                if iterations > limit {
                    return Err(NumFuError::from(
                        Diagnostic::new(
                            ErrorKind::Recursion,
                            "maximum tail-call iterations exceeded",
                        )
                        .with_span(span),
                    ));
                }
            }

            // Without a rest parameter, surplus arguments wait for whatever
            // the body evaluates to.
            let param_count = current.params.len();
            let leftover = if !current.has_rest() && args.len() > param_count {
                args.split_off(param_count)
            } else {
                Vec::new()
            };

            let frame = Environment::with_parent(Rc::clone(&current.env));
            {
                let mut frame_mut = frame.borrow_mut();
                for (i, param) in current.params.iter().enumerate() {
                    if param.rest {
                        let tail_args: Vec<Value> =
                            args.get(i..).map(|s| s.to_vec()).unwrap_or_default();
                        frame_mut.define(param.name.clone(), Value::list(tail_args));
                    } else if let Some(value) = args.get(i) {
                        frame_mut.define(param.name.clone(), value.clone());
                    }
                }
                if let Some(self_name) = &current.self_name {
                    frame_mut.define(
                        self_name.clone(),
                        Value::new(ValueKind::Closure(current.unapplied())),
                    );
                }
            }

            let step = match &current.body {
                ClosureBody::Expr(body) => {
                    let body = Rc::clone(body);
                    self.eval_step(&body, &frame, true)?
                }
                ClosureBody::Compose(f, g) => {
                    let first = match args.first() {
                        Some(value) => value.clone(),
                        None => Value::unit(),
                    };
                    let mid = self.call_value((**f).clone(), vec![first], span)?;
                    Step::Tail(PendingCall {
                        callee: (**g).clone(),
                        args: vec![mid],
                        span,
                    })
                }
            };

            match step {
                Step::Done(value) => {
                    if leftover.is_empty() {
                        return Ok(value);
                    }
                    match self.apply_leftover(value, leftover, span)? {
                        LeftoverOutcome::Finished(value) => return Ok(value),
                        LeftoverOutcome::Continue(next, next_args) => {
                            current = next;
                            args = next_args;
                        }
                    }
                }
                Step::Tail(call) => {
                    let mut call_args = call.args;
                    call_args.extend(leftover);
                    match &*call.callee.0 {
                        ValueKind::Closure(next) => {
                            let merged = merge_applied(&next.applied, &call_args);
                            let open = merged.iter().any(Applied::is_open);
                            if open || merged.len() < next.min_arity() {
                                let partial = Closure {
                                    applied: merged,
                                    ..next.clone()
                                };
                                return Ok(Value::new(ValueKind::Closure(partial)));
                            }
                            args = collect_values(merged);
                            current = next.unapplied();
                        }
                        ValueKind::Builtin(_) => {
                            let callee = call.callee.clone();
                            return self.call_value(callee, call_args, call.span);
                        }
                        other => {
                            return Err(NumFuError::from(
                                Diagnostic::new(
                                    ErrorKind::Type,
                                    format!("{} is not callable", type_name(other)),
                                )
                                .with_span(call.span),
                            ));
                        }
                    }
                }
            }
        }
    }

    fn apply_leftover(
        &mut self,
        value: Value,
        leftover: Vec<Value>,
        span: SourceSpan,
    ) -> Result<LeftoverOutcome> {
        match &*value.0 {
            ValueKind::Closure(next) => {
                let merged = merge_applied(&next.applied, &leftover);
                let open = merged.iter().any(Applied::is_open);
                if open || merged.len() < next.min_arity() {
                    let partial = Closure {
                        applied: merged,
                        ..next.clone()
                    };
                    return Ok(LeftoverOutcome::Finished(Value::new(ValueKind::Closure(
                        partial,
                    ))));
                }
                Ok(LeftoverOutcome::Continue(
                    next.unapplied(),
                    collect_values(merged),
                ))
            }
            ValueKind::Builtin(_) => {
                let callee = value.clone();
                Ok(LeftoverOutcome::Finished(
                    self.call_value(callee, leftover, span)?,
                ))
            }
            _ => Err(NumFuError::from(
                Diagnostic::new(
                    ErrorKind::Type,
                    format!(
                        "Cannot apply {} more argument{} to non-callable result",
                        leftover.len(),
                        if leftover.len() == 1 { "" } else { "s" }
                    ),
                )
                .with_span(span),
            )),
        }
    }

    fn index(&mut self, target: Value, index: Value, span: SourceSpan) -> Result<Value> {
        let (len, kind_name) = match &*target.0 {
            ValueKind::List(values) => (values.len(), "List"),
            ValueKind::Str(text) => (text.chars().count(), "String"),
            other => {
                return Err(NumFuError::from(
                    Diagnostic::new(
                        ErrorKind::Type,
                        format!("'{}' object is not subscriptable", type_name(other)),
                    )
                    .with_span(span),
                ));
            }
        };
        let number = match &*index.0 {
            ValueKind::Number(n) => n.clone(),
            other => {
                return Err(NumFuError::from(
                    Diagnostic::new(
                        ErrorKind::Type,
                        format!(
                            "{kind_name} index must be an integer, not '{}'",
                            type_name(other)
                        ),
                    )
                    .with_span(span),
                ));
            }
        };
        let raw = number.to_i64().ok_or_else(|| {
            NumFuError::from(
                Diagnostic::new(
                    ErrorKind::Type,
                    format!("{kind_name} index must be an integer, not a floating-point number"),
                )
                .with_span(span),
            )
        })?;
        let len_i = len as i64;
        if raw >= len_i || raw < -len_i {
            return Err(NumFuError::from(
                Diagnostic::new(ErrorKind::Index, format!("{kind_name} index out of range"))
                    .with_span(span),
            ));
        }
        let idx = if raw < 0 { (len_i + raw) as usize } else { raw as usize };
        match &*target.0 {
            ValueKind::List(values) => Ok(values[idx].clone()),
            ValueKind::Str(text) => Ok(Value::string(
                text.chars().nth(idx).map(String::from).unwrap_or_default(),
            )),
            _ => unreachable!("subscript target checked above"),
        }
    }

    fn name_error(&self, name: &str, span: SourceSpan) -> NumFuError {
        NumFuError::from(
            Diagnostic::new(
                ErrorKind::Name,
                format!("'{name}' is not defined in the current scope"),
            )
            .with_span(span),
        )
    }
}

enum LeftoverOutcome {
    Finished(Value),
    Continue(Closure, Vec<Value>),
}

fn collect_values(applied: Vec<Applied>) -> Vec<Value> {
    applied
        .into_iter()
        .map(|slot| match slot {
            Applied::Value(value) => value,
            Applied::Open => Value::placeholder(),
        })
        .collect()
}

fn partial_builtin(builtin: Builtin, args: &[Value]) -> Value {
    let merged = merge_applied(&builtin.applied, args);
    Value::new(ValueKind::Builtin(Builtin {
        applied: merged,
        ..builtin
    }))
}

fn spread_placeholder_error(span: SourceSpan) -> NumFuError {
    NumFuError::from(
        Diagnostic::new(
            ErrorKind::Type,
            "Cannot combine spread operator with argument placeholder",
        )
        .with_span(span),
    )
}

fn type_name(kind: &ValueKind) -> &'static str {
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
