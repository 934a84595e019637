use crate::ast::TypeExpr;
use crate::types::{Primitive, Type};

use super::context::ContextId;
use super::error::{EvalError, EvalResult, NameCategory};
use super::Interpreter;

impl Interpreter {
    /// Turns type syntax into a runtime type, looking names up through the
    /// context chain. Aliases are stored already resolved.
    pub fn resolve_type(&self, ctx: ContextId, expr: &TypeExpr) -> EvalResult<Type> {
        match expr {
            TypeExpr::Named(name) => {
                if name == "Any" {
                    return Ok(Type::Any);
                }
                if let Some(primitive) = Primitive::from_name(name) {
                    return Ok(Type::Primitive(primitive));
                }
                self.contexts
                    .lookup_type(ctx, name)?
                    .cloned()
                    .ok_or_else(|| EvalError::unresolved(NameCategory::Type, name))
            }
            TypeExpr::Function { params, ret } => {
                let parameters = self.resolve_all(ctx, params)?;
                Ok(Type::function(parameters, self.resolve_type(ctx, ret)?))
            }
            TypeExpr::Collection(element) => Ok(Type::collection(self.resolve_type(ctx, element)?)),
            TypeExpr::Map { key, value } => Ok(Type::map(
                self.resolve_type(ctx, key)?,
                self.resolve_type(ctx, value)?,
            )),
            TypeExpr::Union(members) => Ok(Type::Union(self.resolve_all(ctx, members)?)),
            TypeExpr::Intersection(members) => {
                Ok(Type::Intersection(self.resolve_all(ctx, members)?))
            }
            TypeExpr::Applied { base, args } => match (base.as_str(), args.as_slice()) {
                ("Collection", [element]) => Ok(Type::collection(self.resolve_type(ctx, element)?)),
                ("Map", [key, value]) => Ok(Type::map(
                    self.resolve_type(ctx, key)?,
                    self.resolve_type(ctx, value)?,
                )),
                _ => Err(EvalError::invalid(format!(
                    "'{base}' does not take {} type argument(s)",
                    args.len()
                ))),
            },
        }
    }

    fn resolve_all(&self, ctx: ContextId, exprs: &[TypeExpr]) -> EvalResult<Vec<Type>> {
        exprs
            .iter()
            .map(|expr| self.resolve_type(ctx, expr))
            .collect()
    }
}
