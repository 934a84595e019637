use std::cell::Cell;
use std::io::{self, BufRead, Write};
use std::panic;
use std::sync::Arc;
use std::thread;

use tracing::{debug, trace, warn};

use crate::SourceError;
use crate::ast::{Block, ContractDecl, Expr, FieldDecl, Stmt, StmtKind, TypeExpr};
use crate::config::InterpreterConfig;
use crate::lexer::Position;
use crate::parser::parse_source;
use crate::types::Type;

mod builtins;
pub mod context;
pub mod error;
mod expressions;
mod resolve;
pub mod value;

pub use context::{Capture, Context, ContextId, ContextPool, Contexts, Tables};
pub use error::{EvalError, EvalErrorKind, EvalResult, NameCategory};
pub use value::{
    Body, Function, NativeOp, Parameter, Payload, Signature, StructField, Value, Variable,
};

/// Non-local exits while walking the tree.
pub(crate) enum Signal {
    Return(Value),
    Error(EvalError),
}

impl Signal {
    fn at(self, position: Position) -> Self {
        match self {
            Signal::Error(err) => Signal::Error(err.at(position)),
            other => other,
        }
    }
}

impl From<EvalError> for Signal {
    fn from(value: EvalError) -> Self {
        Signal::Error(value)
    }
}

pub(crate) type Flow = Result<Value, Signal>;

thread_local! {
    /// Set on threads already running with the evaluator stack.
    static ON_EVAL_STACK: Cell<bool> = const { Cell::new(false) };
}

pub struct Interpreter {
    contexts: Contexts,
    root: ContextId,
    config: InterpreterConfig,
    depth: usize,
    input: Box<dyn BufRead + Send>,
    output: Box<dyn Write + Send>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_config(InterpreterConfig::default())
    }

    pub fn with_config(config: InterpreterConfig) -> Self {
        let pool = ContextPool::new(config.pool_retain);
        Self::with_pool(config, pool)
    }

    /// Builds an interpreter whose contexts recycle tables through `pool`.
    pub fn with_pool(config: InterpreterConfig, pool: ContextPool) -> Self {
        let mut contexts = Contexts::new(pool);
        let root = contexts.acquire(None);
        let mut interpreter = Self {
            contexts,
            root,
            config,
            depth: 0,
            input: Box::new(io::BufReader::new(io::stdin())),
            output: Box::new(io::stdout()),
        };
        if let Err(err) = builtins::install(&mut interpreter) {
            warn!("failed to install builtins: {err}");
        }
        interpreter
    }

    pub fn with_io(
        mut self,
        input: impl BufRead + Send + 'static,
        output: impl Write + Send + 'static,
    ) -> Self {
        self.input = Box::new(input);
        self.output = Box::new(output);
        self
    }

    pub fn set_output(&mut self, output: Box<dyn Write + Send>) {
        self.output = output;
    }

    pub fn root(&self) -> ContextId {
        self.root
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    pub fn contexts(&self) -> &Contexts {
        &self.contexts
    }

    pub fn contexts_mut(&mut self) -> &mut Contexts {
        &mut self.contexts
    }

    /// Current value of a top-level binding.
    pub fn value_of(&self, name: &str) -> EvalResult<Value> {
        Ok(self.contexts.lookup(self.root, name)?.value.clone())
    }

    /// Evaluates one top-level statement against the root context.
    pub fn execute(&mut self, stmt: &Stmt) -> EvalResult<Value> {
        self.with_eval_stack(|this| {
            debug!(position = %stmt.position, "executing statement");
            this.depth = 0;
            let mut declared = Vec::new();
            let result = match this.exec(this.root, stmt, &mut declared) {
                Ok(value) | Err(Signal::Return(value)) => Ok(value),
                Err(Signal::Error(err)) => Err(err),
            };
            if this.contexts.retained_count() > 0 {
                this.contexts.collect();
            }
            result
        })
    }

    /// Runs statements in order, stopping at the first failure. Yields the
    /// value of the last statement.
    pub fn execute_all(&mut self, stmts: &[Stmt]) -> EvalResult<Value> {
        self.with_eval_stack(|this| {
            let mut last = Value::unit();
            for stmt in stmts {
                last = this.execute(stmt)?;
            }
            Ok(last)
        })
    }

    /// Runs `work` on a thread with `eval_stack_size` bytes of native stack,
    /// unless the current thread already is one. Deep recursion then ends in
    /// the call-depth error rather than a stack overflow.
    pub(crate) fn with_eval_stack<T, E>(
        &mut self,
        work: impl FnOnce(&mut Self) -> Result<T, E> + Send,
    ) -> Result<T, E>
    where
        T: Send,
        E: Send + From<EvalError>,
    {
        let stack_size = self.config.eval_stack_size;
        if stack_size == 0 || ON_EVAL_STACK.get() {
            return work(self);
        }
        thread::scope(|scope| {
            let worker = thread::Builder::new()
                .name("elara-eval".to_string())
                .stack_size(stack_size)
                .spawn_scoped(scope, move || {
                    ON_EVAL_STACK.set(true);
                    work(self)
                })
                .map_err(|err| {
                    EvalError::runtime(format!("failed to start evaluator thread: {err}"))
                })?;
            worker
                .join()
                .unwrap_or_else(|payload| panic::resume_unwind(payload))
        })
    }

    /// Parses all of `source` and runs it only when it parsed cleanly.
    pub fn eval_source(&mut self, source: &str) -> Result<Value, SourceError> {
        let output = parse_source(source);
        if !output.is_ok() {
            return Err(SourceError::Parse(output.errors));
        }
        Ok(self.execute_all(&output.statements)?)
    }

    /// Calls a function value from the root context.
    pub fn call_value(&mut self, callee: &Value, args: Vec<Value>) -> EvalResult<Value> {
        let function = expressions::callable(callee)?;
        self.with_eval_stack(|this| this.call_function(this.root, &function, None, args))
    }

    pub(crate) fn write_output(&mut self, text: &str) -> EvalResult<()> {
        self.output
            .write_all(text.as_bytes())
            .and_then(|()| self.output.flush())
            .map_err(|err| EvalError::runtime(format!("failed to write output: {err}")))
    }

    pub(crate) fn read_line(&mut self) -> EvalResult<String> {
        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .map_err(|err| EvalError::runtime(format!("failed to read input: {err}")))?;
        if read == 0 {
            return Err(EvalError::runtime("input reached end of file"));
        }
        while line.ends_with(['\n', '\r']) {
            line.pop();
        }
        Ok(line)
    }

    fn exec(&mut self, ctx: ContextId, stmt: &Stmt, declared: &mut Vec<String>) -> Flow {
        self.exec_kind(ctx, stmt, declared)
            .map_err(|signal| signal.at(stmt.position))
    }

    fn exec_kind(&mut self, ctx: ContextId, stmt: &Stmt, declared: &mut Vec<String>) -> Flow {
        match &stmt.kind {
            StmtKind::Expression(expr) => self.eval(ctx, expr),
            StmtKind::Let {
                name,
                mutable,
                ty,
                value,
            } => {
                self.exec_let(ctx, name, *mutable, ty.as_ref(), value)?;
                declared.push(name.clone());
                Ok(Value::unit())
            }
            StmtKind::Block(block) => self.exec_block(ctx, block),
            StmtKind::While { condition, body } => {
                loop {
                    let test = self.eval(ctx, condition)?;
                    if !expressions::expect_bool(&test, "while condition")? {
                        break;
                    }
                    self.exec_block(ctx, body)?;
                }
                Ok(Value::unit())
            }
            StmtKind::Struct { name, fields } => {
                self.exec_struct(ctx, name, fields)?;
                declared.push(name.clone());
                Ok(Value::unit())
            }
            StmtKind::TypeAlias { name, ty } => {
                if ty.mentions(name) {
                    return Err(recursive(name).into());
                }
                let resolved = self.resolve_type(ctx, ty)?;
                self.contexts.define_type(ctx, name, resolved)?;
                Ok(Value::unit())
            }
            StmtKind::Generic { contracts, body } => {
                self.exec_generic(ctx, contracts, body, declared)
            }
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(ctx, expr)?,
                    None => Value::unit(),
                };
                Err(Signal::Return(value))
            }
            StmtKind::Extend {
                target,
                alias,
                body,
            } => {
                self.exec_extend(ctx, target, alias.as_deref(), body)?;
                Ok(Value::unit())
            }
            StmtKind::Namespace { path, body } => self.exec_namespace(ctx, path, body),
        }
    }

    /// Runs a block in `ctx`, popping whatever it declared on the way out.
    /// A block that makes closures runs in a child context instead, which
    /// the closures keep alive.
    pub(crate) fn exec_block(&mut self, ctx: ContextId, block: &Block) -> Flow {
        if block.makes_closures {
            let scope = self.contexts.acquire_child(ctx)?;
            let result = self.exec_sequence(scope, &block.stmts, &mut Vec::new());
            let released = self.contexts.release(scope);
            let value = result?;
            released?;
            return Ok(value);
        }
        let mut declared = Vec::new();
        let result = self.exec_sequence(ctx, &block.stmts, &mut declared);
        for name in declared.iter().rev() {
            if let Err(err) = self.contexts.undefine(ctx, name) {
                trace!("could not pop block binding '{name}': {err}");
            }
        }
        result
    }

    pub(crate) fn exec_sequence(
        &mut self,
        ctx: ContextId,
        stmts: &[Stmt],
        declared: &mut Vec<String>,
    ) -> Flow {
        let mut last = Value::unit();
        for stmt in stmts {
            last = self.exec(ctx, stmt, declared)?;
        }
        Ok(last)
    }

    fn exec_let(
        &mut self,
        ctx: ContextId,
        name: &str,
        mutable: bool,
        annotation: Option<&TypeExpr>,
        value: &Expr,
    ) -> Result<Variable, Signal> {
        let declared = match annotation {
            Some(ty) => Some(self.resolve_type(ctx, ty)?),
            None => None,
        };
        let mut value = self.eval_expected(ctx, value, declared.as_ref())?;
        if let Some(expected) = &declared
            && !expected.accepts(&value.ty)
        {
            return Err(EvalError::type_mismatch(expected, &value.ty).into());
        }
        if let Payload::Function(function) = &mut value.payload
            && function.name.is_none()
        {
            Arc::make_mut(function).name = Some(name.to_string());
        }
        let ty = declared.unwrap_or_else(|| value.ty.clone());
        let variable = Variable::new(name, mutable, ty, value);
        self.contexts.define(ctx, variable.clone())?;
        Ok(variable)
    }

    /// Defines the struct type and a constructor taking the fields in order.
    fn exec_struct(
        &mut self,
        ctx: ContextId,
        name: &str,
        fields: &[FieldDecl],
    ) -> Result<(), Signal> {
        let mut field_types = Vec::with_capacity(fields.len());
        let mut parameters = Vec::with_capacity(fields.len());
        for field in fields {
            if field.ty.mentions(name) {
                return Err(recursive(name).into());
            }
            let ty = self.resolve_type(ctx, &field.ty)?;
            let default = match &field.default {
                Some(expr) => {
                    let value = self.eval_expected(ctx, expr, Some(&ty))?;
                    if !ty.accepts(&value.ty) {
                        return Err(EvalError::type_mismatch(&ty, &value.ty).into());
                    }
                    Some(value)
                }
                None => None,
            };
            field_types.push((field.name.clone(), ty.clone()));
            parameters.push(Parameter {
                name: field.name.clone(),
                ty,
                mutable: field.mutable,
                default,
            });
        }
        if let Some(first) = parameters.iter().position(|param| param.default.is_some())
            && parameters[first..].iter().any(|param| param.default.is_none())
        {
            return Err(EvalError::invalid(format!(
                "struct '{name}': fields without defaults must come before fields with defaults"
            ))
            .into());
        }

        let struct_type = Type::Struct {
            name: name.to_string(),
            fields: field_types,
        };
        self.contexts.define_type(ctx, name, struct_type.clone())?;

        let layout: Vec<(String, bool)> = fields
            .iter()
            .map(|field| (field.name.clone(), field.mutable))
            .collect();
        let instance_type = struct_type.clone();
        let constructor = Function::native(
            name,
            Signature::new(parameters, struct_type),
            move |interp, frame| {
                let args = interp.contexts().parameters(frame)?;
                let fields = layout
                    .iter()
                    .zip(args)
                    .map(|((name, mutable), value)| StructField {
                        name: name.clone(),
                        mutable: *mutable,
                        value: value.clone(),
                    })
                    .collect();
                Ok(Value {
                    ty: instance_type.clone(),
                    payload: Payload::Struct(fields),
                })
            },
        );
        self.contexts
            .define(ctx, Variable::constant(name, Value::function(constructor)))?;
        debug!(name, "declared struct");
        Ok(())
    }

    /// Binds each contract name as a generic type for the duration of `body`.
    fn exec_generic(
        &mut self,
        ctx: ContextId,
        contracts: &[ContractDecl],
        body: &Stmt,
        declared: &mut Vec<String>,
    ) -> Flow {
        let mut saved = Vec::with_capacity(contracts.len());
        let result = self
            .bind_contracts(ctx, contracts, &mut saved)
            .and_then(|()| self.exec(ctx, body, declared));
        for (name, previous) in saved.into_iter().rev() {
            let restored = match previous {
                Some(ty) => self.contexts.define_type(ctx, &name, ty),
                None => self.contexts.remove_type(ctx, &name),
            };
            if let Err(err) = restored {
                trace!("could not restore type '{name}': {err}");
            }
        }
        result
    }

    fn bind_contracts(
        &mut self,
        ctx: ContextId,
        contracts: &[ContractDecl],
        saved: &mut Vec<(String, Option<Type>)>,
    ) -> Result<(), Signal> {
        for contract in contracts {
            let bounds = match &contract.bound {
                Some(bound) if bound.mentions(&contract.name) => {
                    return Err(recursive(&contract.name).into());
                }
                Some(bound) => vec![self.resolve_type(ctx, bound)?],
                None => Vec::new(),
            };
            let generic = Type::generic(contract.name.clone(), bounds);
            let previous = self.contexts.define_type(ctx, &contract.name, generic)?;
            saved.push((contract.name.clone(), previous));
        }
        Ok(())
    }

    /// Registers every `let` in the body as a method of the target type.
    fn exec_extend(
        &mut self,
        ctx: ContextId,
        target: &TypeExpr,
        alias: Option<&str>,
        body: &Block,
    ) -> Result<(), Signal> {
        let target = self.resolve_type(ctx, target)?;
        let alias = alias
            .map(str::to_string)
            .unwrap_or_else(|| self.config.extension_alias.clone());
        for stmt in &body.stmts {
            let StmtKind::Let {
                name,
                mutable,
                ty,
                value,
            } = &stmt.kind
            else {
                return Err(EvalError::invalid("extend bodies may only contain let declarations")
                    .at(stmt.position)
                    .into());
            };
            let mut method = self
                .eval_extension_member(ctx, name, *mutable, ty.as_ref(), value)
                .map_err(|signal| signal.at(stmt.position))?;
            if let Payload::Function(function) = &mut method.value.payload {
                Arc::make_mut(function).receiver = Some(alias.clone());
            }
            debug!(ty = %target, method = %name, "registered extension");
            self.contexts.register_extension(ctx, target.clone(), method)?;
        }
        Ok(())
    }

    fn eval_extension_member(
        &mut self,
        ctx: ContextId,
        name: &str,
        mutable: bool,
        annotation: Option<&TypeExpr>,
        value: &Expr,
    ) -> Result<Variable, Signal> {
        // evaluated like a `let`, then lifted out of the scope again
        let variable = self.exec_let(ctx, name, mutable, annotation, value)?;
        self.contexts.undefine(ctx, name)?;
        Ok(variable)
    }

    fn exec_namespace(&mut self, ctx: ContextId, path: &[String], body: &Block) -> Flow {
        let full = path.join(".");
        let child = self.contexts.acquire_child(ctx)?;
        {
            let context = self.contexts.get_mut(child)?;
            context.name = path.last().cloned().unwrap_or_default();
            context.namespace = full.clone();
        }
        self.contexts.pin(child)?;
        self.contexts.register_path(ctx, &full, child)?;
        debug!(namespace = %full, "opened namespace");
        let mut declared = Vec::new();
        self.exec_sequence(child, &body.stmts, &mut declared)?;
        Ok(Value::unit())
    }
}

fn recursive(name: &str) -> EvalError {
    EvalError::new(EvalErrorKind::RecursiveType(name.to_string()))
}
