use crate::types::Type;

use super::Interpreter;
use super::error::{EvalError, EvalErrorKind, EvalResult, NameCategory};
use super::value::{Function, Parameter, Payload, Signature, Value, Variable};

/// Native function reading its arguments (receiver first, for methods) from
/// the frame's positional parameters.
fn native<F>(name: &str, parameters: Vec<Parameter>, return_type: Type, op: F) -> Variable
where
    F: Fn(&mut Interpreter, &[Value]) -> EvalResult<Value> + Send + Sync + 'static,
{
    let function = Function::native(
        name,
        Signature::new(parameters, return_type),
        move |interp, frame| {
            let args = interp.contexts().parameters(frame)?.to_vec();
            op(interp, &args)
        },
    );
    Variable::constant(name, Value::function(function))
}

fn bad_receiver(method: &str, args: &[Value]) -> EvalError {
    match args.first() {
        Some(receiver) => EvalError::invalid(format!(
            "'{method}' cannot be called on a value of type {}",
            receiver.ty
        )),
        None => EvalError::new(EvalErrorKind::ArityMismatch {
            expected: 1,
            got: 0,
        }),
    }
}

fn any_collection() -> Type {
    Type::collection(Type::Any)
}

fn any_map() -> Type {
    Type::map(Type::Any, Type::Any)
}

/// Installs `stdout`, `input`, `empty` and the native extensions into the
/// root context.
pub(super) fn install(interpreter: &mut Interpreter) -> EvalResult<()> {
    let root = interpreter.root();
    let contexts = interpreter.contexts_mut();

    contexts.define(root, Variable::constant("stdout", Value::output()))?;
    contexts.define(
        root,
        native("input", Vec::new(), Type::STRING, |interp, _| {
            interp.read_line().map(Value::string)
        }),
    )?;
    contexts.define(
        root,
        native("empty", Vec::new(), any_collection(), |_, _| {
            Ok(Value::collection(Type::Any, Vec::new()))
        }),
    )?;

    for (name, newline) in [("print", false), ("println", true)] {
        let method = native(
            name,
            vec![Parameter::new("value", Type::Any)],
            Type::UNIT,
            move |interp, args| match args {
                [_, value] => {
                    let mut text = value.to_string();
                    if newline {
                        text.push('\n');
                    }
                    interp.write_output(&text)?;
                    Ok(Value::unit())
                }
                _ => Err(bad_receiver(name, args)),
            },
        );
        contexts.register_extension(root, Type::OUTPUT, method)?;
    }

    contexts.register_extension(
        root,
        any_collection(),
        native("size", Vec::new(), Type::INT, |_, args| match args {
            [Value {
                payload: Payload::Collection(elements),
                ..
            }] => Ok(Value::int(elements.len() as i64)),
            _ => Err(bad_receiver("size", args)),
        }),
    )?;
    contexts.register_extension(
        root,
        any_collection(),
        native(
            "append",
            vec![Parameter::new("element", Type::Any)],
            any_collection(),
            |_, args| match args {
                [
                    receiver @ Value {
                        payload: Payload::Collection(elements),
                        ..
                    },
                    element,
                ] => {
                    let element_type = match receiver.element_type() {
                        Some(ty) if ty.accepts(&element.ty) => ty.clone(),
                        _ => Type::Any,
                    };
                    let mut elements = elements.clone();
                    elements.push(element.clone());
                    Ok(Value::collection(element_type, elements))
                }
                _ => Err(bad_receiver("append", args)),
            },
        ),
    )?;

    contexts.register_extension(
        root,
        any_map(),
        native(
            "get",
            vec![Parameter::new("key", Type::Any)],
            Type::Any,
            |_, args| match args {
                [map @ Value {
                    payload: Payload::Map(_),
                    ..
                }, key] => map
                    .map_get(key)
                    .cloned()
                    .ok_or_else(|| EvalError::unresolved(NameCategory::Member, key.to_string())),
                _ => Err(bad_receiver("get", args)),
            },
        ),
    )?;
    contexts.register_extension(
        root,
        any_map(),
        native("size", Vec::new(), Type::INT, |_, args| match args {
            [Value {
                payload: Payload::Map(entries),
                ..
            }] => Ok(Value::int(entries.len() as i64)),
            _ => Err(bad_receiver("size", args)),
        }),
    )?;
    contexts.register_extension(
        root,
        any_map(),
        native(
            "with",
            vec![
                Parameter::new("key", Type::Any),
                Parameter::new("value", Type::Any),
            ],
            any_map(),
            |_, args| match args {
                [
                    map @ Value {
                        payload: Payload::Map(entries),
                        ..
                    },
                    key,
                    value,
                ] => {
                    let (key_type, value_type) = match &map.ty {
                        Type::Map {
                            key: key_type,
                            value: value_type,
                        } => (
                            widen(key_type, &key.ty),
                            widen(value_type, &value.ty),
                        ),
                        _ => (Type::Any, Type::Any),
                    };
                    // appended, so an existing equal key keeps shadowing it
                    let mut entries = entries.clone();
                    entries.push((key.clone(), value.clone()));
                    Ok(Value::map(key_type, value_type, entries))
                }
                _ => Err(bad_receiver("with", args)),
            },
        ),
    )?;

    contexts.register_extension(
        root,
        Type::STRING,
        native("size", Vec::new(), Type::INT, |_, args| match args {
            [Value {
                payload: Payload::String(text),
                ..
            }] => Ok(Value::int(text.chars().count() as i64)),
            _ => Err(bad_receiver("size", args)),
        }),
    )?;
    Ok(())
}

fn widen(current: &Type, incoming: &Type) -> Type {
    if current.accepts(incoming) {
        current.clone()
    } else {
        Type::Any
    }
}
