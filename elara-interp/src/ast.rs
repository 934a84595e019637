use std::sync::Arc;

use crate::lexer::Position;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    And,
    Or,
    Xor,
    Equals,
    NotEquals,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Xor => "^",
            BinaryOp::Equals => "==",
            BinaryOp::NotEquals => "!=",
            BinaryOp::Less => "<",
            BinaryOp::Greater => ">",
            BinaryOp::LessEqual => "<=",
            BinaryOp::GreaterEqual => ">=",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Int(i64),
    Float(f64),
    Str(String),
    Char(char),
    Bool(bool),
    Variable(String),
    Collection(Vec<Expr>),
    Map(Vec<(Expr, Expr)>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Access {
        target: Box<Expr>,
        member: String,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Is {
        value: Box<Expr>,
        ty: TypeExpr,
    },
    If {
        condition: Box<Expr>,
        then_branch: Block,
        else_branch: Option<Block>,
    },
    Lambda(Arc<Lambda>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Lambda {
    pub params: Vec<Param>,
    pub body: LambdaBody,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub name: String,
    pub mutable: bool,
    pub ty: Option<TypeExpr>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum LambdaBody {
    Expr(Expr),
    Block(Block),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    /// Some statement in the block evaluates a lambda, so its bindings can
    /// outlive the block.
    pub makes_closures: bool,
}

impl Block {
    pub fn new(stmts: Vec<Stmt>) -> Self {
        let makes_closures = stmts.iter().any(Stmt::makes_closures);
        Self {
            stmts,
            makes_closures,
        }
    }
}

impl Expr {
    pub fn makes_closures(&self) -> bool {
        match self {
            Expr::Int(_)
            | Expr::Float(_)
            | Expr::Str(_)
            | Expr::Char(_)
            | Expr::Bool(_)
            | Expr::Variable(_) => false,
            Expr::Lambda(_) => true,
            Expr::Collection(items) => items.iter().any(Expr::makes_closures),
            Expr::Map(entries) => entries
                .iter()
                .any(|(key, value)| key.makes_closures() || value.makes_closures()),
            Expr::Unary { operand, .. } => operand.makes_closures(),
            Expr::Binary { left, right, .. } => left.makes_closures() || right.makes_closures(),
            Expr::Call { callee, args } => {
                callee.makes_closures() || args.iter().any(Expr::makes_closures)
            }
            Expr::Index { target, index } => target.makes_closures() || index.makes_closures(),
            Expr::Access { target, .. } => target.makes_closures(),
            Expr::Assign { target, value } => target.makes_closures() || value.makes_closures(),
            Expr::Is { value, .. } => value.makes_closures(),
            Expr::If {
                condition,
                then_branch,
                else_branch,
            } => {
                condition.makes_closures()
                    || then_branch.makes_closures
                    || else_branch.as_ref().is_some_and(|block| block.makes_closures)
            }
        }
    }
}

/// Type syntax as written; resolved against a context before use.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeExpr {
    Named(String),
    Function {
        params: Vec<TypeExpr>,
        ret: Box<TypeExpr>,
    },
    Collection(Box<TypeExpr>),
    Map {
        key: Box<TypeExpr>,
        value: Box<TypeExpr>,
    },
    Union(Vec<TypeExpr>),
    Intersection(Vec<TypeExpr>),
    Applied {
        base: String,
        args: Vec<TypeExpr>,
    },
}

impl TypeExpr {
    /// True when `name` appears anywhere inside this type expression.
    pub fn mentions(&self, name: &str) -> bool {
        match self {
            TypeExpr::Named(named) => named == name,
            TypeExpr::Function { params, ret } => {
                params.iter().any(|param| param.mentions(name)) || ret.mentions(name)
            }
            TypeExpr::Collection(element) => element.mentions(name),
            TypeExpr::Map { key, value } => key.mentions(name) || value.mentions(name),
            TypeExpr::Union(members) | TypeExpr::Intersection(members) => {
                members.iter().any(|member| member.mentions(name))
            }
            TypeExpr::Applied { base, args } => {
                base == name || args.iter().any(|arg| arg.mentions(name))
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub mutable: bool,
    pub ty: TypeExpr,
    pub default: Option<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ContractDecl {
    pub name: String,
    pub bound: Option<TypeExpr>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub position: Position,
}

impl Stmt {
    pub fn makes_closures(&self) -> bool {
        match &self.kind {
            StmtKind::Expression(expr) | StmtKind::Let { value: expr, .. } => expr.makes_closures(),
            StmtKind::Block(block)
            | StmtKind::Extend { body: block, .. }
            | StmtKind::Namespace { body: block, .. } => block.makes_closures,
            StmtKind::While { condition, body } => {
                condition.makes_closures() || body.makes_closures
            }
            StmtKind::Struct { fields, .. } => fields
                .iter()
                .filter_map(|field| field.default.as_ref())
                .any(Expr::makes_closures),
            StmtKind::TypeAlias { .. } => false,
            StmtKind::Generic { body, .. } => body.makes_closures(),
            StmtKind::Return(value) => value.as_ref().is_some_and(Expr::makes_closures),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum StmtKind {
    Expression(Expr),
    Let {
        name: String,
        mutable: bool,
        ty: Option<TypeExpr>,
        value: Expr,
    },
    Block(Block),
    While {
        condition: Expr,
        body: Block,
    },
    Struct {
        name: String,
        fields: Vec<FieldDecl>,
    },
    TypeAlias {
        name: String,
        ty: TypeExpr,
    },
    Generic {
        contracts: Vec<ContractDecl>,
        body: Box<Stmt>,
    },
    Return(Option<Expr>),
    Extend {
        target: TypeExpr,
        /// Receiver name; the configured default when absent.
        alias: Option<String>,
        body: Block,
    },
    Namespace {
        path: Vec<String>,
        body: Block,
    },
}
