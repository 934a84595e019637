use std::fmt;
use std::sync::Arc;

use crate::ast::Lambda;
use crate::types::Type;

use super::Interpreter;
use super::context::{Capture, ContextId};
use super::error::EvalResult;

/// Host operation behind a native function. It reads its arguments from the
/// positional parameters of the frame it is handed.
pub type NativeOp = dyn Fn(&mut Interpreter, ContextId) -> EvalResult<Value> + Send + Sync;

#[derive(Clone)]
pub enum Body {
    Native(Arc<NativeOp>),
    Tree {
        lambda: Arc<Lambda>,
        captured: Capture,
    },
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Native(_) => f.write_str("Native"),
            Body::Tree { captured, .. } => f
                .debug_struct("Tree")
                .field("captured", &captured.id())
                .finish(),
        }
    }
}

impl PartialEq for Body {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Body::Native(left), Body::Native(right)) => Arc::ptr_eq(left, right),
            (
                Body::Tree {
                    lambda: left,
                    captured: left_captured,
                },
                Body::Tree {
                    lambda: right,
                    captured: right_captured,
                },
            ) => Arc::ptr_eq(left, right) && left_captured == right_captured,
            _ => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub ty: Type,
    pub mutable: bool,
    /// Filled in when a call omits this (trailing) argument.
    pub default: Option<Value>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            mutable: false,
            default: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Signature {
    pub parameters: Vec<Parameter>,
    pub return_type: Type,
}

impl Signature {
    pub fn new(parameters: Vec<Parameter>, return_type: Type) -> Self {
        Self {
            parameters,
            return_type,
        }
    }

    pub fn ty(&self) -> Type {
        Type::function(
            self.parameters.iter().map(|param| param.ty.clone()).collect(),
            self.return_type.clone(),
        )
    }

    pub fn required(&self) -> usize {
        self.parameters
            .iter()
            .take_while(|param| param.default.is_none())
            .count()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Function {
    pub name: Option<String>,
    pub signature: Signature,
    pub body: Body,
    /// Name the receiver is bound to when called as an extension method.
    pub receiver: Option<String>,
}

impl Function {
    pub fn native<F>(name: &str, signature: Signature, op: F) -> Self
    where
        F: Fn(&mut Interpreter, ContextId) -> EvalResult<Value> + Send + Sync + 'static,
    {
        Self {
            name: Some(name.to_string()),
            signature,
            body: Body::Native(Arc::new(op)),
            receiver: None,
        }
    }

    pub fn ty(&self) -> Type {
        self.signature.ty()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StructField {
    pub name: String,
    pub mutable: bool,
    pub value: Value,
}

#[derive(Clone, Debug)]
pub enum Payload {
    Unit,
    Int(i64),
    Float(f64),
    Boolean(bool),
    Char(char),
    String(String),
    Output,
    Function(Arc<Function>),
    Collection(Vec<Value>),
    /// Entries in insertion order. Keys are not deduplicated.
    Map(Vec<(Value, Value)>),
    Struct(Vec<StructField>),
}

impl PartialEq for Payload {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Payload::Unit, Payload::Unit) | (Payload::Output, Payload::Output) => true,
            (Payload::Int(left), Payload::Int(right)) => left == right,
            (Payload::Float(left), Payload::Float(right)) => left == right,
            (Payload::Boolean(left), Payload::Boolean(right)) => left == right,
            (Payload::Char(left), Payload::Char(right)) => left == right,
            (Payload::String(left), Payload::String(right)) => left == right,
            (Payload::Function(left), Payload::Function(right)) => {
                Arc::ptr_eq(left, right) || left == right
            }
            (Payload::Collection(left), Payload::Collection(right)) => left == right,
            (Payload::Map(left), Payload::Map(right)) => left == right,
            (Payload::Struct(left), Payload::Struct(right)) => left == right,
            _ => false,
        }
    }
}

/// A payload tagged with its runtime type. Equality looks at the payload only.
#[derive(Clone, Debug)]
pub struct Value {
    pub ty: Type,
    pub payload: Payload,
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.payload == other.payload
    }
}

impl Value {
    pub fn unit() -> Self {
        Self {
            ty: Type::UNIT,
            payload: Payload::Unit,
        }
    }

    pub fn int(value: i64) -> Self {
        Self {
            ty: Type::INT,
            payload: Payload::Int(value),
        }
    }

    pub fn float(value: f64) -> Self {
        Self {
            ty: Type::FLOAT,
            payload: Payload::Float(value),
        }
    }

    pub fn boolean(value: bool) -> Self {
        Self {
            ty: Type::BOOLEAN,
            payload: Payload::Boolean(value),
        }
    }

    pub fn char(value: char) -> Self {
        Self {
            ty: Type::CHAR,
            payload: Payload::Char(value),
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self {
            ty: Type::STRING,
            payload: Payload::String(value.into()),
        }
    }

    pub fn output() -> Self {
        Self {
            ty: Type::OUTPUT,
            payload: Payload::Output,
        }
    }

    pub fn function(function: Function) -> Self {
        Self::from_function(Arc::new(function))
    }

    pub fn from_function(function: Arc<Function>) -> Self {
        Self {
            ty: function.ty(),
            payload: Payload::Function(function),
        }
    }

    pub fn collection(element_type: Type, elements: Vec<Value>) -> Self {
        Self {
            ty: Type::collection(element_type),
            payload: Payload::Collection(elements),
        }
    }

    pub fn map(key_type: Type, value_type: Type, entries: Vec<(Value, Value)>) -> Self {
        Self {
            ty: Type::map(key_type, value_type),
            payload: Payload::Map(entries),
        }
    }

    pub fn is_unit(&self) -> bool {
        matches!(self.payload, Payload::Unit)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self.payload {
            Payload::Int(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.payload {
            Payload::Boolean(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.payload {
            Payload::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Arc<Function>> {
        match &self.payload {
            Payload::Function(function) => Some(function),
            _ => None,
        }
    }

    pub fn element_type(&self) -> Option<&Type> {
        match &self.ty {
            Type::Collection(element) => Some(element),
            _ => None,
        }
    }

    /// First entry whose key equals `key`; later duplicates are shadowed.
    pub fn map_get(&self, key: &Value) -> Option<&Value> {
        match &self.payload {
            Payload::Map(entries) => entries
                .iter()
                .find(|(candidate, _)| candidate == key)
                .map(|(_, value)| value),
            _ => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        match &self.payload {
            Payload::Struct(fields) => fields
                .iter()
                .find(|field| field.name == name)
                .map(|field| &field.value),
            _ => None,
        }
    }

    /// Rendering used inside collections: strings and chars are quoted.
    fn fmt_nested(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            Payload::String(value) => write!(f, "{value:?}"),
            Payload::Char(value) => write!(f, "{value:?}"),
            _ => write!(f, "{self}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            Payload::Unit => f.write_str("()"),
            Payload::Int(value) => write!(f, "{value}"),
            Payload::Float(value) => {
                if value.is_finite() && value.fract() == 0.0 {
                    write!(f, "{value:.1}")
                } else {
                    write!(f, "{value}")
                }
            }
            Payload::Boolean(value) => write!(f, "{value}"),
            Payload::Char(value) => write!(f, "{value}"),
            Payload::String(value) => f.write_str(value),
            Payload::Output => f.write_str("<output>"),
            Payload::Function(function) => match &function.name {
                Some(name) => write!(f, "<function {name}>"),
                None => write!(f, "<lambda {}>", self.ty),
            },
            Payload::Collection(elements) => {
                f.write_str("[")?;
                for (index, element) in elements.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    element.fmt_nested(f)?;
                }
                f.write_str("]")
            }
            Payload::Map(entries) => {
                f.write_str("{")?;
                for (index, (key, value)) in entries.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    key.fmt_nested(f)?;
                    f.write_str(": ")?;
                    value.fmt_nested(f)?;
                }
                f.write_str("}")
            }
            Payload::Struct(fields) => {
                write!(f, "{} {{", self.ty)?;
                for (index, field) in fields.iter().enumerate() {
                    f.write_str(if index > 0 { ", " } else { " " })?;
                    write!(f, "{}: ", field.name)?;
                    field.value.fmt_nested(f)?;
                }
                f.write_str(" }")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Variable {
    pub name: String,
    pub mutable: bool,
    pub ty: Type,
    pub value: Value,
}

impl Variable {
    pub fn new(name: impl Into<String>, mutable: bool, ty: Type, value: Value) -> Self {
        Self {
            name: name.into(),
            mutable,
            ty,
            value,
        }
    }

    /// Immutable binding whose declared type is the value's own type.
    pub fn constant(name: impl Into<String>, value: Value) -> Self {
        let ty = value.ty.clone();
        Self::new(name, false, ty, value)
    }
}
