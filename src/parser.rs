//! Recursive-descent parser: tokens to AST, with precedence-climbing
//! operator parsing and post-hoc l-value recovery.
//!
//! Grounded throughout on
//! `examples/original_source/src/ParserImpl.cpp` /
//! `include/ParserImpl.hh`: the precedence table, the `.`/`->` special
//! casing inside `parse_binop`, `to_lvalue`, and the assignment-factoring
//! pass that turns a top-level `=` expression into an `Assignment`
//! statement.

use std::rc::Rc;

use log::trace;

use crate::ast::*;
use crate::diagnostics::{CraeftError, CraeftResult, SourcePos};
use crate::lexer::Lexer;
use crate::token::TokenKind;

pub struct Parser<'a> {
    lexer: Lexer<'a>,
}

impl<'a> Parser<'a> {
    pub fn new(file: impl Into<std::rc::Rc<str>>, input: &'a str) -> CraeftResult<Self> {
        Ok(Parser {
            lexer: Lexer::new(file, input)?,
        })
    }

    pub fn at_eof(&self) -> bool {
        self.lexer.at_eof()
    }

    fn pos(&self) -> SourcePos {
        self.lexer.current.pos.clone()
    }

    fn kind(&self) -> &TokenKind {
        &self.lexer.current.kind
    }

    fn shift(&mut self) -> CraeftResult<()> {
        self.lexer.shift()
    }

    fn expect_operator(&mut self, op: &str, context: &str) -> CraeftResult<()> {
        match self.kind() {
            TokenKind::Operator(s) if s == op => {
                self.shift()?;
                Ok(())
            }
            other => Err(CraeftError::parser(
                format!("expected \"{op}\" {context}, found \"{other}\""),
                self.pos(),
            )),
        }
    }

    fn expect(&mut self, expected: TokenKind, context: &str) -> CraeftResult<()> {
        if std::mem::discriminant(self.kind()) == std::mem::discriminant(&expected) {
            self.shift()?;
            Ok(())
        } else {
            Err(CraeftError::parser(
                format!("expected \"{expected}\" {context}, found \"{}\"", self.kind()),
                self.pos(),
            ))
        }
    }

    fn expect_identifier(&mut self, context: &str) -> CraeftResult<String> {
        match self.kind().clone() {
            TokenKind::Identifier(s) => {
                self.shift()?;
                Ok(s)
            }
            other => Err(CraeftError::parser(
                format!("expected identifier {context}, found \"{other}\""),
                self.pos(),
            )),
        }
    }

    fn expect_type_name(&mut self, context: &str) -> CraeftResult<String> {
        match self.kind().clone() {
            TokenKind::TypeName(s) => {
                self.shift()?;
                Ok(s)
            }
            other => Err(CraeftError::parser(
                format!("expected type name {context}, found \"{other}\""),
                self.pos(),
            )),
        }
    }

    fn at_operator(&self, op: &str) -> bool {
        matches!(self.kind(), TokenKind::Operator(s) if s == op)
    }

    // ----- top level -----------------------------------------------------

    pub fn parse_program(&mut self) -> CraeftResult<Vec<Toplevel>> {
        let mut out = Vec::new();
        while !self.at_eof() {
            out.push(self.parse_toplevel()?);
        }
        Ok(out)
    }

    pub fn parse_toplevel(&mut self) -> CraeftResult<Toplevel> {
        match self.kind().clone() {
            TokenKind::Fn => self.parse_function(),
            TokenKind::Struct => self.parse_struct_declaration(),
            TokenKind::Type => self.parse_type_declaration(),
            other => Err(CraeftError::parser(
                format!("expected toplevel declaration, found \"{other}\""),
                self.pos(),
            )),
        }
    }

    fn parse_type_declaration(&mut self) -> CraeftResult<Toplevel> {
        let pos = self.pos();
        self.shift()?; // `type`
        let name = self.expect_type_name("after \"type\"")?;
        self.expect(TokenKind::Semicolon, "after type declaration")?;
        Ok(Toplevel::TypeDeclaration(name, pos))
    }

    fn parse_template_params(&mut self) -> CraeftResult<Vec<String>> {
        // `<: T, U :>`
        self.expect_operator("<:", "opening a template parameter list")?;
        let mut params = Vec::new();
        loop {
            params.push(self.expect_type_name("in template parameter list")?);
            if matches!(self.kind(), TokenKind::Comma) {
                self.shift()?;
                continue;
            }
            break;
        }
        self.expect_operator(":>", "closing a template parameter list")?;
        Ok(params)
    }

    fn parse_struct_declaration(&mut self) -> CraeftResult<Toplevel> {
        let pos = self.pos();
        self.shift()?; // `struct`
        let name = self.expect_type_name("after \"struct\"")?;
        let type_params = if self.at_operator("<:") {
            self.parse_template_params()?
        } else {
            Vec::new()
        };
        self.expect(TokenKind::OpenBrace, "opening struct body")?;
        let mut fields = Vec::new();
        while !matches!(self.kind(), TokenKind::CloseBrace) {
            let field = self.parse_param()?;
            self.expect(TokenKind::Semicolon, "after struct field")?;
            fields.push(field);
        }
        self.shift()?; // `}`
        if type_params.is_empty() {
            Ok(Toplevel::StructDeclaration { name, fields, pos })
        } else {
            Ok(Toplevel::TemplateStructDeclaration {
                name,
                type_params,
                fields,
                pos,
            })
        }
    }

    fn parse_param(&mut self) -> CraeftResult<Param> {
        let ty = self.parse_type()?;
        let name = self.expect_identifier("in parameter")?;
        Ok(Param { ty, name })
    }

    fn parse_function(&mut self) -> CraeftResult<Toplevel> {
        let pos = self.pos();
        self.shift()?; // `fn`
        let name = self.expect_identifier("after \"fn\"")?;
        let type_params = if self.at_operator("<:") {
            self.parse_template_params()?
        } else {
            Vec::new()
        };
        self.expect(TokenKind::OpenParen, "opening parameter list")?;
        let args = self.parse_arg_list()?;
        self.expect(TokenKind::CloseParen, "closing parameter list")?;
        let ret = if self.at_operator("->") {
            self.shift()?;
            self.parse_type()?
        } else {
            TypeExpr::Void
        };
        let signature = FunctionSignature {
            name,
            ret,
            args,
            pos,
        };
        if matches!(self.kind(), TokenKind::Semicolon) {
            self.shift()?;
            return Ok(Toplevel::FunctionDeclaration(signature));
        }
        let body = self.parse_block()?;
        if type_params.is_empty() {
            Ok(Toplevel::FunctionDefinition(FunctionDefinition {
                signature,
                body,
            }))
        } else {
            Ok(Toplevel::TemplateFunctionDefinition(TemplateFunctionDefinition {
                type_params,
                signature,
                body: Rc::new(body),
            }))
        }
    }

    fn parse_arg_list(&mut self) -> CraeftResult<Vec<Param>> {
        let mut out = Vec::new();
        if matches!(self.kind(), TokenKind::CloseParen) {
            return Ok(out);
        }
        loop {
            out.push(self.parse_param()?);
            if matches!(self.kind(), TokenKind::Comma) {
                self.shift()?;
                continue;
            }
            break;
        }
        Ok(out)
    }

    // ----- types -----------------------------------------------------

    fn parse_type(&mut self) -> CraeftResult<TypeExpr> {
        let name = self.expect_type_name("in type")?;
        let mut ty = if name == "Void" {
            TypeExpr::Void
        } else if self.at_operator("<:") {
            let args = self.parse_type_args()?;
            TypeExpr::Templated(name, args)
        } else {
            TypeExpr::Named(name)
        };
        while self.at_operator("*") {
            self.shift()?;
            ty = TypeExpr::Pointer(Box::new(ty));
        }
        Ok(ty)
    }

    fn parse_type_args(&mut self) -> CraeftResult<Vec<TypeExpr>> {
        self.expect_operator("<:", "opening a template argument list")?;
        let mut args = Vec::new();
        loop {
            args.push(self.parse_type()?);
            if matches!(self.kind(), TokenKind::Comma) {
                self.shift()?;
                continue;
            }
            break;
        }
        self.expect_operator(":>", "closing a template argument list")?;
        Ok(args)
    }

    // ----- statements -----------------------------------------------------

    fn parse_block(&mut self) -> CraeftResult<Vec<Statement>> {
        self.expect(TokenKind::OpenBrace, "opening a block")?;
        let mut out = Vec::new();
        while !matches!(self.kind(), TokenKind::CloseBrace) {
            out.push(self.parse_statement()?);
        }
        self.shift()?; // `}`
        Ok(out)
    }

    fn parse_statement(&mut self) -> CraeftResult<Statement> {
        match self.kind().clone() {
            TokenKind::TypeName(_) => {
                let stmt = self.parse_declaration()?;
                self.expect(TokenKind::Semicolon, "after declaration")?;
                Ok(stmt)
            }
            TokenKind::Return => {
                let pos = self.pos();
                self.shift()?;
                if matches!(self.kind(), TokenKind::Semicolon) {
                    self.shift()?;
                    return Ok(Statement::VoidReturn(pos));
                }
                let expr = self.parse_expression()?;
                self.expect(TokenKind::Semicolon, "after return statement")?;
                Ok(Statement::Return(expr))
            }
            TokenKind::If => self.parse_if_statement(),
            TokenKind::While => Err(CraeftError::parser(
                "\"while\" is reserved and not yet implemented",
                self.pos(),
            )),
            _ => {
                let expr = self.parse_expression()?;
                self.expect(TokenKind::Semicolon, "after expression statement")?;
                extract_assignment(expr)
            }
        }
    }

    fn parse_declaration(&mut self) -> CraeftResult<Statement> {
        let pos = self.pos();
        let ty = self.parse_type()?;
        let name = self.expect_identifier("in declaration")?;
        if self.at_operator("=") {
            self.shift()?;
            let rhs = self.parse_expression()?;
            Ok(Statement::CompoundDeclaration(ty, name, rhs, pos))
        } else {
            Ok(Statement::Declaration(ty, name, pos))
        }
    }

    fn parse_if_statement(&mut self) -> CraeftResult<Statement> {
        let pos = self.pos();
        self.shift()?; // `if`
        let cond = self.parse_expression()?;
        let then_block = self.parse_block()?;
        let else_block = if matches!(self.kind(), TokenKind::Else) {
            self.shift()?;
            if matches!(self.kind(), TokenKind::If) {
                vec![self.parse_if_statement()?]
            } else {
                self.parse_block()?
            }
        } else {
            Vec::new()
        };
        Ok(Statement::If {
            cond,
            then_block,
            else_block,
            pos,
        })
    }

    // ----- expressions -----------------------------------------------------

    fn parse_expression(&mut self) -> CraeftResult<Expression> {
        let lhs = self.parse_unary()?;
        self.parse_binop(0, lhs)
    }

    fn parse_binop(&mut self, min_prec: i32, mut lhs: Expression) -> CraeftResult<Expression> {
        loop {
            let op = match self.kind() {
                TokenKind::Operator(s) => s.clone(),
                _ => break,
            };
            let prec = match precedence(&op) {
                Some(p) if p >= min_prec => p,
                _ => break,
            };
            let op_pos = self.pos();
            self.shift()?;

            if op == "." || op == "->" {
                let field = self.expect_identifier("as a field name")?;
                lhs = if op == "." {
                    Expression::FieldAccess(Box::new(lhs), field, op_pos)
                } else {
                    Expression::FieldAccess(
                        Box::new(Expression::Dereference(Box::new(lhs), op_pos.clone())),
                        field,
                        op_pos,
                    )
                };
                continue;
            }

            let mut rhs = self.parse_unary()?;
            loop {
                let next_prec = match self.kind() {
                    TokenKind::Operator(s) => precedence(s),
                    _ => None,
                };
                match next_prec {
                    Some(p) if p > prec => {
                        rhs = self.parse_binop(prec + 1, rhs)?;
                    }
                    _ => break,
                }
            }

            let binop = BinOp::from_str(&op).ok_or_else(|| {
                CraeftError::parser(format!("unrecognized operator \"{op}\""), op_pos.clone())
            })?;
            lhs = Expression::Binop(binop, Box::new(lhs), Box::new(rhs), op_pos);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> CraeftResult<Expression> {
        if let TokenKind::Operator(op) = self.kind().clone() {
            let pos = self.pos();
            match op.as_str() {
                "*" => {
                    self.shift()?;
                    let inner = self.parse_unary()?;
                    return Ok(Expression::Dereference(Box::new(inner), pos));
                }
                "&" => {
                    self.shift()?;
                    let inner = self.parse_unary()?;
                    let lvalue = to_lvalue(inner)?;
                    return Ok(Expression::Reference(Box::new(lvalue), pos));
                }
                other => {
                    return Err(CraeftError::parser(
                        format!("unrecognized operator \"{other}\""),
                        pos,
                    ));
                }
            }
        }
        self.parse_cast_or_primary()
    }

    fn parse_cast_or_primary(&mut self) -> CraeftResult<Expression> {
        if matches!(self.kind(), TokenKind::OpenParen) {
            // Disambiguate a cast `(Type) expr` from a parenthesized
            // expression by peeking for a TypeName right after `(`.
            let pos = self.pos();
            self.shift()?;
            if matches!(self.kind(), TokenKind::TypeName(_)) {
                let ty = self.parse_type()?;
                self.expect(TokenKind::CloseParen, "closing a cast")?;
                let arg = self.parse_unary()?;
                return Ok(Expression::Cast(ty, Box::new(arg), pos));
            }
            let inner = self.parse_expression()?;
            self.expect(TokenKind::CloseParen, "closing a parenthesized expression")?;
            return Ok(inner);
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> CraeftResult<Expression> {
        let pos = self.pos();
        match self.kind().clone() {
            TokenKind::IntLiteral(i) => {
                self.shift()?;
                Ok(Expression::IntLiteral(i, pos))
            }
            TokenKind::UIntLiteral(i) => {
                self.shift()?;
                Ok(Expression::UIntLiteral(i, pos))
            }
            TokenKind::FloatLiteral(v) => {
                self.shift()?;
                Ok(Expression::FloatLiteral(v, pos))
            }
            TokenKind::StringLiteral(s) => {
                self.shift()?;
                Ok(Expression::StringLiteral(s, pos))
            }
            TokenKind::Identifier(name) => {
                self.shift()?;
                if matches!(self.kind(), TokenKind::OpenParen) {
                    self.shift()?;
                    let args = self.parse_call_args()?;
                    self.expect(TokenKind::CloseParen, "closing a call")?;
                    Ok(Expression::FunctionCall(name, args, pos))
                } else if self.at_operator("<:") {
                    let type_args = self.parse_type_args()?;
                    self.expect(TokenKind::OpenParen, "opening a template call")?;
                    let args = self.parse_call_args()?;
                    self.expect(TokenKind::CloseParen, "closing a template call")?;
                    Ok(Expression::TemplateFunctionCall(name, type_args, args, pos))
                } else {
                    Ok(Expression::Variable(name, pos))
                }
            }
            other => Err(CraeftError::parser(
                format!("unexpected token \"{other}\" in expression"),
                pos,
            )),
        }
    }

    fn parse_call_args(&mut self) -> CraeftResult<Vec<Expression>> {
        let mut out = Vec::new();
        if matches!(self.kind(), TokenKind::CloseParen) {
            return Ok(out);
        }
        loop {
            out.push(self.parse_expression()?);
            if matches!(self.kind(), TokenKind::Comma) {
                self.shift()?;
                continue;
            }
            break;
        }
        Ok(out)
    }
}

/// Convert an already-parsed expression into an l-value, the way
/// `to_lvalue` does in the original parser: only `Variable`, `Dereference`
/// and `FieldAccess` qualify.
fn to_lvalue(expr: Expression) -> CraeftResult<LValue> {
    match expr {
        Expression::Variable(n, p) => Ok(LValue::Variable(n, p)),
        Expression::Dereference(e, p) => Ok(LValue::Dereference(e, p)),
        Expression::FieldAccess(e, f, p) => Ok(LValue::FieldAccess(e, f, p)),
        other => Err(CraeftError::parser(
            "expected l-value",
            other.pos().clone(),
        )),
    }
}

/// Post-hoc assignment factoring, mirroring `AssignmentFactorizer`: a
/// top-level `lhs = rhs` expression-statement becomes an `Assignment`
/// statement; any `=` appearing anywhere else in the tree is rejected,
/// mirroring `ExpressionVerifier`'s ban on nested assignment.
fn extract_assignment(expr: Expression) -> CraeftResult<Statement> {
    if let Expression::Binop(BinOp::Assign, lhs, rhs, _) = expr {
        reject_nested_assignment(&rhs)?;
        reject_nested_assignment(&lhs)?;
        trace!("factored assignment statement");
        return Ok(Statement::Assignment(to_lvalue(*lhs)?, *rhs));
    }
    reject_nested_assignment(&expr)?;
    Ok(Statement::Expression(expr))
}

fn reject_nested_assignment(expr: &Expression) -> CraeftResult<()> {
    match expr {
        Expression::Binop(BinOp::Assign, ..) => Err(CraeftError::parser(
            "assignment is only allowed as a full statement",
            expr.pos().clone(),
        )),
        Expression::Binop(_, lhs, rhs, _) => {
            reject_nested_assignment(lhs)?;
            reject_nested_assignment(rhs)
        }
        Expression::Dereference(e, _) => reject_nested_assignment(e),
        Expression::FieldAccess(e, _, _) => reject_nested_assignment(e),
        Expression::Reference(lv, _) => reject_nested_assignment(&lv.clone().into_expression()),
        Expression::Cast(_, e, _) => reject_nested_assignment(e),
        Expression::FunctionCall(_, args, _) => {
            args.iter().try_for_each(reject_nested_assignment)
        }
        Expression::TemplateFunctionCall(_, _, args, _) => {
            args.iter().try_for_each(reject_nested_assignment)
        }
        Expression::IntLiteral(..)
        | Expression::UIntLiteral(..)
        | Expression::FloatLiteral(..)
        | Expression::StringLiteral(..)
        | Expression::Variable(..) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_expr(src: &str) -> Expression {
        let mut p = Parser::new("t.cr", src).unwrap();
        p.parse_expression().unwrap()
    }

    #[test]
    fn test_precedence_mul_binds_tighter_than_add() {
        let expr = parse_expr("1 + 2 * 3");
        match expr {
            Expression::Binop(BinOp::Add, _, rhs, _) => {
                assert!(matches!(*rhs, Expression::Binop(BinOp::Mul, ..)));
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn test_field_access_chains_left_to_right() {
        let expr = parse_expr("a.b.c");
        match expr {
            Expression::FieldAccess(inner, field, _) => {
                assert_eq!(field, "c");
                assert!(matches!(*inner, Expression::FieldAccess(_, ref f, _) if f == "b"));
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn test_arrow_desugars_to_deref_then_field() {
        let expr = parse_expr("p->x");
        match expr {
            Expression::FieldAccess(inner, field, _) => {
                assert_eq!(field, "x");
                assert!(matches!(*inner, Expression::Dereference(..)));
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn test_cast_vs_parenthesized_expression() {
        let expr = parse_expr("(I64)x");
        assert!(matches!(expr, Expression::Cast(TypeExpr::Named(ref n), _, _) if n == "I64"));
        let expr = parse_expr("(x)");
        assert!(matches!(expr, Expression::Variable(..)));
    }

    #[test]
    fn test_assignment_is_factored_out_of_expression_statement() {
        let mut p = Parser::new("t.cr", "x = 1;").unwrap();
        let stmt = p.parse_statement().unwrap();
        assert!(matches!(stmt, Statement::Assignment(LValue::Variable(ref n, _), _) if n == "x"));
    }

    #[test]
    fn test_nested_assignment_rejected() {
        let mut p = Parser::new("t.cr", "x = (y = 1);").unwrap();
        assert!(p.parse_statement().is_err());
    }

    #[test]
    fn test_while_is_rejected() {
        let mut p = Parser::new("t.cr", "while { }").unwrap();
        assert!(p.parse_statement().is_err());
    }

    #[test]
    fn test_template_function_definition() {
        let src = "fn id<: T :>(T x) -> T { return x; }";
        let mut p = Parser::new("t.cr", src).unwrap();
        let toplevel = p.parse_toplevel().unwrap();
        assert!(matches!(toplevel, Toplevel::TemplateFunctionDefinition(_)));
    }

    #[test]
    fn test_struct_declaration() {
        let src = "struct Point { I64 x; I64 y; }";
        let mut p = Parser::new("t.cr", src).unwrap();
        let toplevel = p.parse_toplevel().unwrap();
        match toplevel {
            Toplevel::StructDeclaration { name, fields, .. } => {
                assert_eq!(name, "Point");
                assert_eq!(fields.len(), 2);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
