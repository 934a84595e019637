use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Primitive {
    Int,
    Float,
    Boolean,
    Char,
    String,
    Unit,
    Output,
}

impl Primitive {
    pub const ALL: [Primitive; 7] = [
        Primitive::Int,
        Primitive::Float,
        Primitive::Boolean,
        Primitive::Char,
        Primitive::String,
        Primitive::Unit,
        Primitive::Output,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Primitive::Int => "Int",
            Primitive::Float => "Float",
            Primitive::Boolean => "Boolean",
            Primitive::Char => "Char",
            Primitive::String => "String",
            Primitive::Unit => "Unit",
            Primitive::Output => "Output",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|primitive| primitive.name() == name)
    }
}

/// Runtime types. Every variant is a finite tree: recursive definitions are
/// rejected while resolving type syntax, so `accepts` always terminates.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Any,
    Primitive(Primitive),
    Function {
        parameters: Vec<Type>,
        return_type: Box<Type>,
    },
    Collection(Box<Type>),
    Map {
        key: Box<Type>,
        value: Box<Type>,
    },
    Generic {
        name: String,
        bounds: Vec<Type>,
    },
    Union(Vec<Type>),
    Intersection(Vec<Type>),
    Struct {
        name: String,
        fields: Vec<(String, Type)>,
    },
}

impl Type {
    pub const INT: Type = Type::Primitive(Primitive::Int);
    pub const FLOAT: Type = Type::Primitive(Primitive::Float);
    pub const BOOLEAN: Type = Type::Primitive(Primitive::Boolean);
    pub const CHAR: Type = Type::Primitive(Primitive::Char);
    pub const STRING: Type = Type::Primitive(Primitive::String);
    pub const UNIT: Type = Type::Primitive(Primitive::Unit);
    pub const OUTPUT: Type = Type::Primitive(Primitive::Output);

    pub fn function(parameters: Vec<Type>, return_type: Type) -> Self {
        Type::Function {
            parameters,
            return_type: Box::new(return_type),
        }
    }

    pub fn collection(element: Type) -> Self {
        Type::Collection(Box::new(element))
    }

    pub fn map(key: Type, value: Type) -> Self {
        Type::Map {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn generic(name: impl Into<String>, bounds: Vec<Type>) -> Self {
        Type::Generic {
            name: name.into(),
            bounds,
        }
    }

    /// Whether a value of type `candidate` may be used where `self` is expected.
    pub fn accepts(&self, candidate: &Type) -> bool {
        if self == candidate || matches!(self, Type::Any) {
            return true;
        }
        match candidate {
            Type::Any => return false,
            Type::Union(members) => {
                return !members.is_empty() && members.iter().all(|member| self.accepts(member));
            }
            Type::Generic { bounds, .. } if bounds.iter().any(|bound| self.accepts(bound)) => {
                return true;
            }
            Type::Intersection(members) if members.iter().any(|member| self.accepts(member)) => {
                return true;
            }
            _ => {}
        }

        match self {
            Type::Any => true,
            Type::Primitive(expected) => {
                matches!(candidate, Type::Primitive(actual) if actual == expected)
            }
            Type::Function {
                parameters,
                return_type,
            } => match candidate {
                Type::Function {
                    parameters: candidate_parameters,
                    return_type: candidate_return,
                } => {
                    parameters.len() == candidate_parameters.len()
                        && parameters
                            .iter()
                            .zip(candidate_parameters)
                            .all(|(expected, actual)| expected.accepts(actual))
                        && return_type.accepts(candidate_return)
                }
                _ => false,
            },
            Type::Collection(element) => match candidate {
                Type::Collection(candidate_element) => element.accepts(candidate_element),
                _ => false,
            },
            Type::Map { key, value } => match candidate {
                Type::Map {
                    key: candidate_key,
                    value: candidate_value,
                } => key.accepts(candidate_key) && value.accepts(candidate_value),
                _ => false,
            },
            Type::Generic { bounds, .. } => bounds.iter().all(|bound| bound.accepts(candidate)),
            Type::Union(members) => members.iter().any(|member| member.accepts(candidate)),
            Type::Intersection(members) => members.iter().all(|member| member.accepts(candidate)),
            Type::Struct { name, fields } => match candidate {
                Type::Struct {
                    name: candidate_name,
                    fields: candidate_fields,
                } => {
                    name == candidate_name
                        && fields.len() == candidate_fields.len()
                        && fields.iter().all(|(field, expected)| {
                            candidate_fields
                                .iter()
                                .find(|(candidate_field, _)| candidate_field == field)
                                .is_some_and(|(_, actual)| expected.accepts(actual))
                        })
                }
                _ => false,
            },
        }
    }

    pub fn name(&self) -> String {
        self.to_string()
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Type::Function { .. })
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, members: &[Type], separator: &str) -> fmt::Result {
    for (index, member) in members.iter().enumerate() {
        if index > 0 {
            f.write_str(separator)?;
        }
        write!(f, "{member}")?;
    }
    Ok(())
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Any => f.write_str("Any"),
            Type::Primitive(primitive) => f.write_str(primitive.name()),
            Type::Function {
                parameters,
                return_type,
            } => {
                f.write_str("(")?;
                write_joined(f, parameters, ", ")?;
                write!(f, ") -> {return_type}")
            }
            Type::Collection(element) => write!(f, "[{element}]"),
            Type::Map { key, value } => write!(f, "{{{key}: {value}}}"),
            Type::Generic { name, bounds } => {
                if bounds.is_empty() {
                    return f.write_str(name);
                }
                write!(f, "{name}: ")?;
                write_joined(f, bounds, " & ")
            }
            Type::Union(members) => write_joined(f, members, " | "),
            Type::Intersection(members) => write_joined(f, members, " & "),
            Type::Struct { name, .. } => f.write_str(name),
        }
    }
}
