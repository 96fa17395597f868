//! The abstract syntax tree produced by the parser.
//!
//! Every node carries its [`SourcePos`]. Child ownership is a plain tree:
//! `Box` everywhere except `TemplateFunctionDefinition`, whose body is
//! shared (`Rc`) because the translator keeps it alive across every
//! specialization it later codegens.

use std::rc::Rc;

use crate::diagnostics::SourcePos;

/// A type as written in source, before name resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Named(String),
    Void,
    Templated(String, Vec<TypeExpr>),
    Pointer(Box<TypeExpr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum BinOp {
    Assign,
    Or,
    And,
    BitOr,
    BitXor,
    BitAnd,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    Shl,
    Shr,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinOp {
    pub fn from_str(s: &str) -> Option<BinOp> {
        use BinOp::*;
        Some(match s {
            "=" => Assign,
            "||" => Or,
            "&&" => And,
            "|" => BitOr,
            "^" => BitXor,
            "&" => BitAnd,
            "==" => Eq,
            "!=" => Neq,
            "<" => Lt,
            "<=" => Le,
            ">" => Gt,
            ">=" => Ge,
            "<<" => Shl,
            ">>" => Shr,
            "+" => Add,
            "-" => Sub,
            "*" => Mul,
            "/" => Div,
            "%" => Mod,
            _ => return None,
        })
    }
}

/// Binding power for infix operators; higher binds tighter. Mirrors the
/// original compiler's `get_token_precedence` table exactly.
pub fn precedence(op: &str) -> Option<i32> {
    Some(match op {
        "=" => 200,
        "||" => 300,
        "&&" => 400,
        "|" => 500,
        "^" => 600,
        "&" => 700,
        "==" | "!=" => 800,
        "<" | "<=" | ">" | ">=" => 900,
        "<<" | ">>" => 1000,
        "+" | "-" => 1100,
        "*" | "/" | "%" => 1200,
        "." | "->" => 1400,
        _ => return None,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    IntLiteral(i64, SourcePos),
    UIntLiteral(u64, SourcePos),
    FloatLiteral(f64, SourcePos),
    StringLiteral(String, SourcePos),
    Variable(String, SourcePos),
    Reference(Box<LValue>, SourcePos),
    Dereference(Box<Expression>, SourcePos),
    FieldAccess(Box<Expression>, String, SourcePos),
    Binop(BinOp, Box<Expression>, Box<Expression>, SourcePos),
    FunctionCall(String, Vec<Expression>, SourcePos),
    TemplateFunctionCall(String, Vec<TypeExpr>, Vec<Expression>, SourcePos),
    Cast(TypeExpr, Box<Expression>, SourcePos),
}

impl Expression {
    pub fn pos(&self) -> &SourcePos {
        match self {
            Expression::IntLiteral(_, p)
            | Expression::UIntLiteral(_, p)
            | Expression::FloatLiteral(_, p)
            | Expression::StringLiteral(_, p)
            | Expression::Variable(_, p)
            | Expression::Reference(_, p)
            | Expression::Dereference(_, p)
            | Expression::FieldAccess(_, _, p)
            | Expression::Binop(_, _, _, p)
            | Expression::FunctionCall(_, _, p)
            | Expression::TemplateFunctionCall(_, _, _, p)
            | Expression::Cast(_, _, p) => p,
        }
    }
}

/// The subset of `Expression` that can appear on the left of `=`, behind
/// `&`, or receive a store.
#[derive(Debug, Clone, PartialEq)]
pub enum LValue {
    Variable(String, SourcePos),
    Dereference(Box<Expression>, SourcePos),
    FieldAccess(Box<Expression>, String, SourcePos),
}

impl LValue {
    pub fn pos(&self) -> &SourcePos {
        match self {
            LValue::Variable(_, p) | LValue::Dereference(_, p) | LValue::FieldAccess(_, _, p) => p,
        }
    }

    pub fn into_expression(self) -> Expression {
        match self {
            LValue::Variable(n, p) => Expression::Variable(n, p),
            LValue::Dereference(e, p) => Expression::Dereference(e, p),
            LValue::FieldAccess(e, f, p) => Expression::FieldAccess(e, f, p),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Expression(Expression),
    Return(Expression),
    VoidReturn(SourcePos),
    Assignment(LValue, Expression),
    Declaration(TypeExpr, String, SourcePos),
    CompoundDeclaration(TypeExpr, String, Expression, SourcePos),
    If {
        cond: Expression,
        then_block: Vec<Statement>,
        else_block: Vec<Statement>,
        pos: SourcePos,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub ty: TypeExpr,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    pub name: String,
    pub ret: TypeExpr,
    pub args: Vec<Param>,
    pub pos: SourcePos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDefinition {
    pub signature: FunctionSignature,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateFunctionDefinition {
    pub type_params: Vec<String>,
    pub signature: FunctionSignature,
    pub body: Rc<Vec<Statement>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Toplevel {
    TypeDeclaration(String, SourcePos),
    StructDeclaration {
        name: String,
        fields: Vec<Param>,
        pos: SourcePos,
    },
    TemplateStructDeclaration {
        name: String,
        type_params: Vec<String>,
        fields: Vec<Param>,
        pos: SourcePos,
    },
    FunctionDeclaration(FunctionSignature),
    FunctionDefinition(FunctionDefinition),
    TemplateFunctionDefinition(TemplateFunctionDefinition),
}
