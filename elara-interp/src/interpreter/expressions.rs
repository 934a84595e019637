use std::cmp::Ordering;
use std::sync::Arc;

use crate::ast::{BinaryOp, Expr, Lambda, LambdaBody, UnaryOp};
use crate::types::Type;

use super::context::ContextId;
use super::error::{EvalError, EvalErrorKind, EvalResult, NameCategory};
use super::value::{Body, Function, Parameter, Payload, Signature, Value, Variable};
use super::{Flow, Interpreter, Signal};

/// One step from an assignment's root variable to the slot it writes.
enum PathStep {
    Field(String),
    Index(Value),
}

impl Interpreter {
    pub(crate) fn eval(&mut self, ctx: ContextId, expr: &Expr) -> Flow {
        self.eval_expected(ctx, expr, None)
    }

    /// Evaluates `expr`; lambdas and collection literals take unstated
    /// types from `expected`.
    pub(crate) fn eval_expected(
        &mut self,
        ctx: ContextId,
        expr: &Expr,
        expected: Option<&Type>,
    ) -> Flow {
        match expr {
            Expr::Int(value) => Ok(Value::int(*value)),
            Expr::Float(value) => Ok(Value::float(*value)),
            Expr::Str(value) => Ok(Value::string(value.clone())),
            Expr::Char(value) => Ok(Value::char(*value)),
            Expr::Bool(value) => Ok(Value::boolean(*value)),
            Expr::Variable(name) => Ok(self.contexts.lookup(ctx, name)?.value.clone()),
            Expr::Collection(items) => self.eval_collection(ctx, items, expected),
            Expr::Map(entries) => self.eval_map(ctx, entries, expected),
            Expr::Unary { op, operand } => {
                let value = self.eval(ctx, operand)?;
                Ok(unary(*op, value)?)
            }
            Expr::Binary { op, left, right } => self.eval_binary(ctx, *op, left, right),
            Expr::Call { callee, args } => self.eval_call(ctx, callee, args),
            Expr::Index { target, index } => {
                let target = self.eval(ctx, target)?;
                let index = self.eval(ctx, index)?;
                Ok(index_value(&target, &index)?)
            }
            Expr::Access { target, member } => self.eval_access(ctx, target, member),
            Expr::Assign { target, value } => self.eval_assign(ctx, target, value),
            Expr::Is { value, ty } => {
                let value = self.eval(ctx, value)?;
                let ty = self.resolve_type(ctx, ty)?;
                Ok(Value::boolean(ty.accepts(&value.ty)))
            }
            Expr::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let test = self.eval(ctx, condition)?;
                if expect_bool(&test, "if condition")? {
                    self.exec_block(ctx, then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.exec_block(ctx, else_branch)
                } else {
                    Ok(Value::unit())
                }
            }
            Expr::Lambda(lambda) => Ok(self.eval_lambda(ctx, lambda, expected)?),
        }
    }

    fn eval_collection(
        &mut self,
        ctx: ContextId,
        items: &[Expr],
        expected: Option<&Type>,
    ) -> Flow {
        let hint = match expected {
            Some(Type::Collection(element)) => Some(element.as_ref()),
            _ => None,
        };
        let mut elements = Vec::with_capacity(items.len());
        for item in items {
            elements.push(self.eval_expected(ctx, item, hint)?);
        }
        let element_type = literal_type(hint, elements.iter().map(|value| &value.ty));
        Ok(Value::collection(element_type, elements))
    }

    fn eval_map(
        &mut self,
        ctx: ContextId,
        entries: &[(Expr, Expr)],
        expected: Option<&Type>,
    ) -> Flow {
        let (key_hint, value_hint) = match expected {
            Some(Type::Map { key, value }) => (Some(key.as_ref()), Some(value.as_ref())),
            _ => (None, None),
        };
        let mut pairs = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let key = self.eval_expected(ctx, key, key_hint)?;
            let value = self.eval_expected(ctx, value, value_hint)?;
            pairs.push((key, value));
        }
        let key_type = literal_type(key_hint, pairs.iter().map(|(key, _)| &key.ty));
        let value_type = literal_type(value_hint, pairs.iter().map(|(_, value)| &value.ty));
        Ok(Value::map(key_type, value_type, pairs))
    }

    fn eval_binary(&mut self, ctx: ContextId, op: BinaryOp, left: &Expr, right: &Expr) -> Flow {
        if matches!(op, BinaryOp::And | BinaryOp::Or) {
            let left = self.eval(ctx, left)?;
            let left = expect_bool(&left, op.symbol())?;
            if left == (op == BinaryOp::Or) {
                return Ok(Value::boolean(left));
            }
            let right = self.eval(ctx, right)?;
            return Ok(Value::boolean(expect_bool(&right, op.symbol())?));
        }
        let left = self.eval(ctx, left)?;
        let right = self.eval(ctx, right)?;
        Ok(binary(op, &left, &right)?)
    }

    fn eval_call(&mut self, ctx: ContextId, callee: &Expr, args: &[Expr]) -> Flow {
        let (function, receiver) = match callee {
            Expr::Access { target, member } => self.resolve_method(ctx, target, member)?,
            _ => {
                let value = self.eval(ctx, callee)?;
                (callable(&value)?, None)
            }
        };
        let mut arguments = Vec::with_capacity(args.len());
        for (index, arg) in args.iter().enumerate() {
            let hint = function
                .signature
                .parameters
                .get(index)
                .map(|param| &param.ty);
            arguments.push(self.eval_expected(ctx, arg, hint)?);
        }
        Ok(self.call_function(ctx, &function, receiver, arguments)?)
    }

    /// Resolves `target.member` as a callee, with the receiver to bind when
    /// it names an extension method.
    fn resolve_method(
        &mut self,
        ctx: ContextId,
        target: &Expr,
        member: &str,
    ) -> Result<(Arc<Function>, Option<Value>), Signal> {
        if let Some(value) = self.resolve_qualified(ctx, target, member)? {
            return Ok((callable(&value)?, None));
        }
        let receiver = self.eval(ctx, target)?;
        if let Some(field) = receiver.field(member) {
            return Ok((callable(field)?, None));
        }
        let method = self.extension(ctx, &receiver, member)?;
        Ok((callable(&method)?, Some(receiver)))
    }

    fn extension(&self, ctx: ContextId, receiver: &Value, member: &str) -> EvalResult<Value> {
        self.contexts
            .find_extension(ctx, &receiver.ty, member)?
            .map(|variable| variable.value.clone())
            .ok_or_else(|| {
                EvalError::unresolved(NameCategory::Extension, format!("{}.{member}", receiver.ty))
            })
    }

    /// `a.b.name` where `a` is not a variable but a namespace path.
    fn resolve_qualified(
        &self,
        ctx: ContextId,
        target: &Expr,
        member: &str,
    ) -> EvalResult<Option<Value>> {
        let mut segments = Vec::new();
        if !qualified_segments(target, &mut segments)
            || self.contexts.is_defined(ctx, &segments[0])
        {
            return Ok(None);
        }
        let Some((namespaces, consumed)) = self.contexts.resolve_path(ctx, &segments)? else {
            return Ok(None);
        };
        segments.push(member.to_string());
        let name = &segments[consumed];
        let mut value = namespaces
            .iter()
            .find_map(|namespace| self.contexts.lookup_local(*namespace, name))
            .map(|variable| variable.value.clone())
            .ok_or_else(|| EvalError::unresolved(NameCategory::Variable, segments.join(".")))?;
        for member in &segments[consumed + 1..] {
            value = self.member_value(ctx, value, member)?;
        }
        Ok(Some(value))
    }

    fn eval_access(&mut self, ctx: ContextId, target: &Expr, member: &str) -> Flow {
        if let Some(value) = self.resolve_qualified(ctx, target, member)? {
            return Ok(value);
        }
        let value = self.eval(ctx, target)?;
        Ok(self.member_value(ctx, value, member)?)
    }

    /// Struct field, else extension member. Extension functions come back
    /// bound to `value`.
    fn member_value(&self, ctx: ContextId, value: Value, member: &str) -> EvalResult<Value> {
        if let Some(field) = value.field(member) {
            return Ok(field.clone());
        }
        let method = self
            .contexts
            .find_extension(ctx, &value.ty, member)?
            .map(|variable| variable.value.clone())
            .ok_or_else(|| {
                EvalError::unresolved(NameCategory::Member, format!("{}.{member}", value.ty))
            })?;
        match method.as_function() {
            Some(function) => Ok(Value::function(bind_receiver(function.clone(), value))),
            None => Ok(method),
        }
    }

    fn eval_assign(&mut self, ctx: ContextId, target: &Expr, value: &Expr) -> Flow {
        if let Expr::Variable(name) = target {
            let declared = self.contexts.lookup(ctx, name)?.ty.clone();
            let value = self.eval_expected(ctx, value, Some(&declared))?;
            let variable = self.contexts.lookup_mut(ctx, name)?;
            if !variable.mutable {
                return Err(EvalError::new(EvalErrorKind::ImmutableAssignment(name.clone())).into());
            }
            if !variable.ty.accepts(&value.ty) {
                return Err(EvalError::type_mismatch(&variable.ty, &value.ty).into());
            }
            variable.value = value.clone();
            return Ok(value);
        }

        let mut path = Vec::new();
        let root = self.assignment_path(ctx, target, &mut path)?;
        let value = self.eval(ctx, value)?;
        let variable = self.contexts.lookup_mut(ctx, &root)?;
        let root_mutable = variable.mutable;
        let mut slot = &mut variable.value;
        let mut expected = variable.ty.clone();
        for step in &path {
            let (next, ty) = step_mut(slot, step, &root, root_mutable)?;
            slot = next;
            expected = ty;
        }
        if !expected.accepts(&value.ty) {
            return Err(EvalError::type_mismatch(&expected, &value.ty).into());
        }
        *slot = value.clone();
        Ok(value)
    }

    fn assignment_path(
        &mut self,
        ctx: ContextId,
        target: &Expr,
        path: &mut Vec<PathStep>,
    ) -> Result<String, Signal> {
        match target {
            Expr::Variable(name) => Ok(name.clone()),
            Expr::Access { target, member } => {
                let root = self.assignment_path(ctx, target, path)?;
                path.push(PathStep::Field(member.clone()));
                Ok(root)
            }
            Expr::Index { target, index } => {
                let root = self.assignment_path(ctx, target, path)?;
                let index = self.eval(ctx, index)?;
                path.push(PathStep::Index(index));
                Ok(root)
            }
            _ => Err(EvalError::invalid("invalid assignment target").into()),
        }
    }

    fn eval_lambda(
        &mut self,
        ctx: ContextId,
        lambda: &Arc<Lambda>,
        expected: Option<&Type>,
    ) -> EvalResult<Value> {
        let hint = match expected {
            Some(Type::Function {
                parameters,
                return_type,
            }) if parameters.len() == lambda.params.len() => Some((parameters, return_type)),
            _ => None,
        };
        let mut parameters = Vec::with_capacity(lambda.params.len());
        for (index, param) in lambda.params.iter().enumerate() {
            let ty = match (&param.ty, hint) {
                (Some(ty), _) => self.resolve_type(ctx, ty)?,
                (None, Some((expected, _))) => expected[index].clone(),
                (None, None) => Type::Any,
            };
            parameters.push(Parameter {
                name: param.name.clone(),
                ty,
                mutable: param.mutable,
                default: None,
            });
        }
        let return_type = hint
            .map(|(_, return_type)| Type::clone(return_type))
            .unwrap_or(Type::Any);
        let captured = self.contexts.capture(ctx)?;
        Ok(Value::function(Function {
            name: None,
            signature: Signature::new(parameters, return_type),
            body: Body::Tree {
                lambda: lambda.clone(),
                captured,
            },
            receiver: None,
        }))
    }

    /// Checks arity and argument types, runs the body and checks the result
    /// against the declared return type.
    pub(crate) fn call_function(
        &mut self,
        caller: ContextId,
        function: &Arc<Function>,
        receiver: Option<Value>,
        mut args: Vec<Value>,
    ) -> EvalResult<Value> {
        let signature = &function.signature;
        if args.len() < signature.required() || args.len() > signature.parameters.len() {
            return Err(EvalError::new(EvalErrorKind::ArityMismatch {
                expected: signature.parameters.len(),
                got: args.len(),
            }));
        }
        for (param, arg) in signature.parameters.iter().zip(&args) {
            if !param.ty.accepts(&arg.ty) {
                return Err(EvalError::type_mismatch(&param.ty, &arg.ty));
            }
        }
        for param in &signature.parameters[args.len()..] {
            if let Some(default) = &param.default {
                args.push(default.clone());
            }
        }
        if self.depth >= self.config.max_call_depth {
            return Err(EvalError::new(EvalErrorKind::CallDepthExceeded(
                self.config.max_call_depth,
            )));
        }

        self.depth += 1;
        let result = match &function.body {
            Body::Native(op) => self.call_native(caller, function, op.clone(), receiver, args),
            Body::Tree { lambda, captured } => {
                self.call_tree(function, lambda, captured.id(), receiver, args)
            }
        };
        self.depth -= 1;

        let value = result?;
        if !signature.return_type.accepts(&value.ty) {
            return Err(EvalError::type_mismatch(&signature.return_type, &value.ty));
        }
        Ok(value)
    }

    /// Native bodies run in a clone of the caller with the receiver and the
    /// arguments as positional parameters. The clone copies the caller's
    /// whole parent chain, so a native call at call depth `d` takes `d`
    /// slots until it returns.
    fn call_native(
        &mut self,
        caller: ContextId,
        function: &Arc<Function>,
        op: Arc<super::value::NativeOp>,
        receiver: Option<Value>,
        args: Vec<Value>,
    ) -> EvalResult<Value> {
        let frame = self.contexts.clone_context(caller)?;
        {
            let context = self.contexts.get_mut(frame)?;
            context.parameters = receiver.into_iter().chain(args).collect();
            context.function = Some(function.clone());
        }
        let result = op(self, frame);
        let cleaned = self.contexts.cleanup(frame);
        let value = result?;
        cleaned?;
        Ok(value)
    }

    fn call_tree(
        &mut self,
        function: &Arc<Function>,
        lambda: &Lambda,
        captured: ContextId,
        receiver: Option<Value>,
        args: Vec<Value>,
    ) -> EvalResult<Value> {
        let frame = self.contexts.acquire_child(captured)?;
        let result = self.run_frame(frame, function, lambda, receiver, args);
        let released = self.contexts.release(frame);
        let value = result?;
        released?;
        Ok(value)
    }

    fn run_frame(
        &mut self,
        frame: ContextId,
        function: &Arc<Function>,
        lambda: &Lambda,
        receiver: Option<Value>,
        args: Vec<Value>,
    ) -> EvalResult<Value> {
        {
            let context = self.contexts.get_mut(frame)?;
            context.name = function.name.clone().unwrap_or_default();
            context.function = Some(function.clone());
            context.parameters = args.clone();
        }
        if let (Some(alias), Some(receiver)) = (&function.receiver, receiver) {
            self.contexts
                .define(frame, Variable::constant(alias, receiver))?;
        }
        for (param, arg) in function.signature.parameters.iter().zip(args) {
            let variable = Variable::new(&param.name, param.mutable, param.ty.clone(), arg);
            self.contexts.define(frame, variable)?;
        }
        let flow = match &lambda.body {
            LambdaBody::Expr(expr) => self.eval(frame, expr),
            LambdaBody::Block(block) => self.exec_sequence(frame, &block.stmts, &mut Vec::new()),
        };
        match flow {
            Ok(value) | Err(Signal::Return(value)) => Ok(value),
            Err(Signal::Error(err)) => Err(err),
        }
    }
}

pub(crate) fn callable(value: &Value) -> EvalResult<Arc<Function>> {
    value
        .as_function()
        .cloned()
        .ok_or_else(|| EvalError::new(EvalErrorKind::NotCallable(value.ty.to_string())))
}

pub(crate) fn expect_bool(value: &Value, context: &str) -> EvalResult<bool> {
    value.as_bool().ok_or_else(|| {
        EvalError::type_mismatch(format!("Boolean for {context}"), &value.ty)
    })
}

/// A native wrapper that calls `method` with `receiver` already bound.
fn bind_receiver(method: Arc<Function>, receiver: Value) -> Function {
    let signature = method.signature.clone();
    let name = method.name.clone();
    Function {
        name,
        signature,
        body: Body::Native(Arc::new(move |interp: &mut Interpreter, frame| {
            let args = interp.contexts().parameters(frame)?.to_vec();
            interp.call_function(frame, &method, Some(receiver.clone()), args)
        })),
        receiver: None,
    }
}

fn qualified_segments(expr: &Expr, segments: &mut Vec<String>) -> bool {
    match expr {
        Expr::Variable(name) => {
            segments.push(name.clone());
            true
        }
        Expr::Access { target, member } => {
            let rooted = qualified_segments(target, segments);
            segments.push(member.clone());
            rooted
        }
        _ => false,
    }
}

/// Element type of a literal: the expected one when it fits every element,
/// else the shared element type, else `Any`.
fn literal_type<'a>(hint: Option<&Type>, types: impl Iterator<Item = &'a Type> + Clone) -> Type {
    if let Some(hint) = hint
        && types.clone().all(|ty| hint.accepts(ty))
    {
        return hint.clone();
    }
    let mut types = types;
    let Some(first) = types.next() else {
        return Type::Any;
    };
    if types.all(|ty| ty == first) {
        first.clone()
    } else {
        Type::Any
    }
}

fn step_mut<'v>(
    value: &'v mut Value,
    step: &PathStep,
    root: &str,
    root_mutable: bool,
) -> EvalResult<(&'v mut Value, Type)> {
    match step {
        PathStep::Field(name) => {
            let declared = match &value.ty {
                Type::Struct { fields, .. } => fields
                    .iter()
                    .find(|(field, _)| field == name)
                    .map(|(_, ty)| ty.clone()),
                _ => None,
            };
            let Payload::Struct(fields) = &mut value.payload else {
                return Err(EvalError::unresolved(NameCategory::Member, name.clone()));
            };
            let field = fields
                .iter_mut()
                .find(|field| field.name == *name)
                .ok_or_else(|| EvalError::unresolved(NameCategory::Member, name.clone()))?;
            if !field.mutable {
                return Err(EvalError::new(EvalErrorKind::ImmutableAssignment(
                    format!("{root}.{name}"),
                )));
            }
            Ok((&mut field.value, declared.unwrap_or(Type::Any)))
        }
        PathStep::Index(index) => {
            if !root_mutable {
                return Err(EvalError::new(EvalErrorKind::ImmutableAssignment(
                    root.to_string(),
                )));
            }
            let container = value.ty.clone();
            match (&mut value.payload, container) {
                (Payload::Collection(elements), Type::Collection(element)) => {
                    let position = checked_index(index, elements.len())?;
                    Ok((&mut elements[position], *element))
                }
                (Payload::Map(entries), Type::Map { key, value: value_type }) => {
                    if !key.accepts(&index.ty) {
                        return Err(EvalError::type_mismatch(&key, &index.ty));
                    }
                    let entry = entries
                        .iter_mut()
                        .find(|(candidate, _)| candidate == index)
                        .ok_or_else(|| {
                            EvalError::unresolved(NameCategory::Member, index.to_string())
                        })?;
                    Ok((&mut entry.1, *value_type))
                }
                (_, container) => Err(EvalError::invalid(format!(
                    "cannot assign through an index into {container}"
                ))),
            }
        }
    }
}

fn checked_index(index: &Value, len: usize) -> EvalResult<usize> {
    let Some(raw) = index.as_int() else {
        return Err(EvalError::type_mismatch(Type::INT, &index.ty));
    };
    usize::try_from(raw)
        .ok()
        .filter(|position| *position < len)
        .ok_or(EvalError::new(EvalErrorKind::IndexOutOfBounds { index: raw, len }))
}

fn index_value(target: &Value, index: &Value) -> EvalResult<Value> {
    match &target.payload {
        Payload::Collection(elements) => {
            let position = checked_index(index, elements.len())?;
            Ok(elements[position].clone())
        }
        Payload::Map(_) => target
            .map_get(index)
            .cloned()
            .ok_or_else(|| EvalError::unresolved(NameCategory::Member, index.to_string())),
        Payload::String(text) => {
            let chars: Vec<char> = text.chars().collect();
            let position = checked_index(index, chars.len())?;
            Ok(Value::char(chars[position]))
        }
        _ => Err(EvalError::invalid(format!("cannot index into {}", target.ty))),
    }
}

fn unary(op: UnaryOp, value: Value) -> EvalResult<Value> {
    match (op, &value.payload) {
        (UnaryOp::Negate, Payload::Int(number)) => number
            .checked_neg()
            .map(Value::int)
            .ok_or_else(|| EvalError::invalid("integer overflow")),
        (UnaryOp::Negate, Payload::Float(number)) => Ok(Value::float(-number)),
        (UnaryOp::Not, Payload::Boolean(flag)) => Ok(Value::boolean(!flag)),
        (UnaryOp::Negate, _) => Err(EvalError::type_mismatch("Int | Float", &value.ty)),
        (UnaryOp::Not, _) => Err(EvalError::type_mismatch(Type::BOOLEAN, &value.ty)),
    }
}

fn as_float(payload: &Payload) -> Option<f64> {
    match payload {
        Payload::Int(number) => Some(*number as f64),
        Payload::Float(number) => Some(*number),
        _ => None,
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> EvalResult<Value> {
    match op {
        BinaryOp::Equals => Ok(Value::boolean(left == right)),
        BinaryOp::NotEquals => Ok(Value::boolean(left != right)),
        BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => logical(op, left, right),
        BinaryOp::Add
            if matches!(left.payload, Payload::String(_))
                || matches!(right.payload, Payload::String(_)) =>
        {
            Ok(Value::string(format!("{left}{right}")))
        }
        BinaryOp::Add
        | BinaryOp::Subtract
        | BinaryOp::Multiply
        | BinaryOp::Divide
        | BinaryOp::Modulo => arithmetic(op, left, right),
        BinaryOp::Less | BinaryOp::Greater | BinaryOp::LessEqual | BinaryOp::GreaterEqual => {
            compare(op, left, right)
        }
    }
}

fn operand_error(op: BinaryOp, left: &Value, right: &Value) -> EvalError {
    EvalError::invalid(format!(
        "cannot apply '{}' to {} and {}",
        op.symbol(),
        left.ty,
        right.ty
    ))
}

fn logical(op: BinaryOp, left: &Value, right: &Value) -> EvalResult<Value> {
    match (&left.payload, &right.payload) {
        (Payload::Boolean(a), Payload::Boolean(b)) => Ok(Value::boolean(match op {
            BinaryOp::And => *a && *b,
            BinaryOp::Or => *a || *b,
            _ => a ^ b,
        })),
        (Payload::Int(a), Payload::Int(b)) if op == BinaryOp::Xor => Ok(Value::int(a ^ b)),
        _ => Err(operand_error(op, left, right)),
    }
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> EvalResult<Value> {
    if let (Payload::Int(a), Payload::Int(b)) = (&left.payload, &right.payload) {
        let (a, b) = (*a, *b);
        if matches!(op, BinaryOp::Divide | BinaryOp::Modulo) && b == 0 {
            return Err(EvalError::new(EvalErrorKind::DivisionByZero));
        }
        let result = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Subtract => a.checked_sub(b),
            BinaryOp::Multiply => a.checked_mul(b),
            BinaryOp::Divide => a.checked_div(b),
            _ => a.checked_rem(b),
        };
        return result
            .map(Value::int)
            .ok_or_else(|| EvalError::invalid("integer overflow"));
    }
    let (Some(a), Some(b)) = (as_float(&left.payload), as_float(&right.payload)) else {
        return Err(operand_error(op, left, right));
    };
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Subtract => a - b,
        BinaryOp::Multiply => a * b,
        BinaryOp::Divide => a / b,
        _ => a % b,
    };
    Ok(Value::float(result))
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> EvalResult<Value> {
    let ordering = match (&left.payload, &right.payload) {
        (Payload::Int(a), Payload::Int(b)) => Some(a.cmp(b)),
        (Payload::Char(a), Payload::Char(b)) => Some(a.cmp(b)),
        (Payload::String(a), Payload::String(b)) => Some(a.cmp(b)),
        (l, r) => match (as_float(l), as_float(r)) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => return Err(operand_error(op, left, right)),
        },
    };
    // NaN compares false against everything
    let Some(ordering) = ordering else {
        return Ok(Value::boolean(false));
    };
    let result = match op {
        BinaryOp::Less => ordering == Ordering::Less,
        BinaryOp::Greater => ordering == Ordering::Greater,
        BinaryOp::LessEqual => ordering != Ordering::Greater,
        _ => ordering != Ordering::Less,
    };
    Ok(Value::boolean(result))
}
