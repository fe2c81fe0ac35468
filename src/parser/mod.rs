//! Single-lookahead recursive-descent parser: token stream → AST.
//!
//! No semantic checks happen here at all (no type checking, no scope
//! resolution) — that is entirely the type checker's job (§4.3). The parser
//! only enforces the grammar's shape.

pub mod error;

pub use error::ParseError;

use crate::ast::{
    Assign, BinOp, CatchClause, CatchMatcher, CondBranch, Decl, Expr, ExprKind, ForStmt,
    FunctionDecl, IfStmt, Param, Primary, Program, RValue, ReturnStmt, Stmt, ThrowStmt, TryStmt,
    TypeDecl, VarDecl, WhileStmt,
};
use crate::token::{Token, TokenKind};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

type PResult<T> = Result<T, ParseError>;

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    pub fn parse_program(mut self) -> PResult<Program> {
        let mut decls = Vec::new();
        while self.peek().kind != TokenKind::Eos {
            decls.push(match &self.peek().kind {
                TokenKind::Type => Decl::Type(self.parse_type_decl()?),
                TokenKind::Fun => Decl::Function(self.parse_function_decl()?),
                _ => {
                    return Err(ParseError::unexpected(
                        "a 'type' or 'fun' declaration",
                        self.peek(),
                    ))
                }
            });
        }
        Ok(Program { decls })
    }

    // --- cursor helpers ------------------------------------------------

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.tokens
            .get(self.pos + offset)
            .unwrap_or_else(|| self.tokens.last().unwrap())
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, kind: TokenKind) -> PResult<Token> {
        if self.peek().kind == kind {
            Ok(self.advance())
        } else {
            Err(ParseError::unexpected(&format!("{kind}"), self.peek()))
        }
    }

    fn expect_id(&mut self) -> PResult<Token> {
        if matches!(self.peek().kind, TokenKind::Id(_)) {
            Ok(self.advance())
        } else {
            Err(ParseError::unexpected("an identifier", self.peek()))
        }
    }

    fn is_dtype_start(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::BoolType
                | TokenKind::IntType
                | TokenKind::DoubleType
                | TokenKind::CharType
                | TokenKind::StringType
                | TokenKind::Id(_)
        )
    }

    fn parse_dtype(&mut self) -> PResult<Token> {
        if self.is_dtype_start() {
            Ok(self.advance())
        } else {
            Err(ParseError::unexpected("a type name", self.peek()))
        }
    }

    /// Matches a function return type, which may also be the bare `nil`
    /// keyword for a function that returns no value.
    fn parse_return_type(&mut self) -> PResult<Token> {
        if self.peek().kind == TokenKind::Nil {
            Ok(self.advance())
        } else {
            self.parse_dtype()
        }
    }

    // --- declarations ----------------------------------------------------

    fn parse_type_decl(&mut self) -> PResult<TypeDecl> {
        self.expect(TokenKind::Type)?;
        let name = self.expect_id()?;
        let mut fields = Vec::new();
        while self.peek().kind != TokenKind::End {
            fields.push(self.parse_var_decl_stmt()?);
        }
        self.expect(TokenKind::End)?;
        Ok(TypeDecl { name, fields })
    }

    fn parse_function_decl(&mut self) -> PResult<FunctionDecl> {
        self.expect(TokenKind::Fun)?;
        let return_type = self.parse_return_type()?;
        let name = self.expect_id()?;
        self.expect(TokenKind::LParen)?;
        let params = self.parse_params()?;
        self.expect(TokenKind::RParen)?;
        let body = self.parse_stmts_until(&[TokenKind::End])?;
        self.expect(TokenKind::End)?;
        Ok(FunctionDecl {
            name,
            return_type,
            params,
            body,
        })
    }

    fn parse_params(&mut self) -> PResult<Vec<Param>> {
        let mut params = Vec::new();
        if self.peek().kind == TokenKind::RParen {
            return Ok(params);
        }
        loop {
            let name = self.expect_id()?;
            self.expect(TokenKind::Colon)?;
            let ty = self.parse_dtype()?;
            params.push(Param { name, ty });
            if self.peek().kind == TokenKind::Comma {
                self.advance();
            } else {
                break;
            }
        }
        Ok(params)
    }

    // --- statements ------------------------------------------------------

    fn parse_stmts_until(&mut self, terminators: &[TokenKind]) -> PResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        while !terminators.contains(&self.peek().kind) {
            stmts.push(self.parse_stmt()?);
        }
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        match &self.peek().kind {
            TokenKind::Var => Ok(Stmt::VarDecl(self.parse_var_decl_stmt()?)),
            TokenKind::If => Ok(Stmt::If(self.parse_if_stmt()?)),
            TokenKind::While => Ok(Stmt::While(self.parse_while_stmt()?)),
            TokenKind::For => Ok(Stmt::For(self.parse_for_stmt()?)),
            TokenKind::Return => Ok(Stmt::Return(self.parse_return_stmt()?)),
            TokenKind::Try => Ok(Stmt::Try(self.parse_try_stmt()?)),
            TokenKind::Throw => Ok(Stmt::Throw(self.parse_throw_stmt()?)),
            TokenKind::Id(_) => self.parse_assign_or_call(),
            _ => Err(ParseError::unexpected("a statement", self.peek())),
        }
    }

    fn parse_var_decl_stmt(&mut self) -> PResult<VarDecl> {
        self.expect(TokenKind::Var)?;
        let name = self.expect_id()?;
        let declared_type = if self.peek().kind == TokenKind::Colon {
            self.advance();
            Some(self.parse_dtype()?)
        } else {
            None
        };
        self.expect(TokenKind::Assign)?;
        let init = self.parse_expr()?;
        Ok(VarDecl {
            name,
            declared_type,
            init,
        })
    }

    fn parse_assign_or_call(&mut self) -> PResult<Stmt> {
        let head = self.expect_id()?;
        if self.peek().kind == TokenKind::LParen {
            let call_token = head.clone();
            self.advance();
            let args = self.parse_args()?;
            self.expect(TokenKind::RParen)?;
            return Ok(Stmt::Call(Expr {
                token: call_token.clone(),
                kind: ExprKind::Primary(Primary::RValue(RValue::Call {
                    callee: call_token,
                    args,
                })),
            }));
        }

        let mut path = vec![head];
        while self.peek().kind == TokenKind::Dot {
            self.advance();
            path.push(self.expect_id()?);
        }
        self.expect(TokenKind::Assign)?;
        let value = self.parse_expr()?;
        Ok(Stmt::Assign(Assign { path, value }))
    }

    fn parse_args(&mut self) -> PResult<Vec<Expr>> {
        let mut args = Vec::new();
        if self.peek().kind == TokenKind::RParen {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            if self.peek().kind == TokenKind::Comma {
                self.advance();
            } else {
                break;
            }
        }
        Ok(args)
    }

    fn parse_if_stmt(&mut self) -> PResult<IfStmt> {
        self.expect(TokenKind::If)?;
        let condition = self.parse_expr()?;
        self.expect(TokenKind::Then)?;
        let body = self.parse_stmts_until(&[TokenKind::ElseIf, TokenKind::Else, TokenKind::End])?;
        let primary = CondBranch { condition, body };

        let mut elseifs = Vec::new();
        while self.peek().kind == TokenKind::ElseIf {
            self.advance();
            let condition = self.parse_expr()?;
            self.expect(TokenKind::Then)?;
            let body =
                self.parse_stmts_until(&[TokenKind::ElseIf, TokenKind::Else, TokenKind::End])?;
            elseifs.push(CondBranch { condition, body });
        }

        let else_body = if self.peek().kind == TokenKind::Else {
            self.advance();
            Some(self.parse_stmts_until(&[TokenKind::End])?)
        } else {
            None
        };

        self.expect(TokenKind::End)?;
        Ok(IfStmt {
            primary,
            elseifs,
            else_body,
        })
    }

    fn parse_while_stmt(&mut self) -> PResult<WhileStmt> {
        self.expect(TokenKind::While)?;
        let condition = self.parse_expr()?;
        self.expect(TokenKind::Do)?;
        let body = self.parse_stmts_until(&[TokenKind::End])?;
        self.expect(TokenKind::End)?;
        Ok(WhileStmt { condition, body })
    }

    fn parse_for_stmt(&mut self) -> PResult<ForStmt> {
        self.expect(TokenKind::For)?;
        let var = self.expect_id()?;
        self.expect(TokenKind::Assign)?;
        let start = self.parse_expr()?;
        self.expect(TokenKind::To)?;
        let end = self.parse_expr()?;
        self.expect(TokenKind::Do)?;
        let body = self.parse_stmts_until(&[TokenKind::End])?;
        self.expect(TokenKind::End)?;
        Ok(ForStmt {
            var,
            start,
            end,
            body,
        })
    }

    fn parse_return_stmt(&mut self) -> PResult<ReturnStmt> {
        let keyword = self.expect(TokenKind::Return)?;
        let value = self.parse_expr()?;
        Ok(ReturnStmt { keyword, value })
    }

    fn parse_try_stmt(&mut self) -> PResult<TryStmt> {
        self.expect(TokenKind::Try)?;
        let body = self.parse_stmts_until(&[TokenKind::Catch])?;
        let catch = self.parse_catch_stmt()?;
        Ok(TryStmt { body, catch })
    }

    fn parse_catch_stmt(&mut self) -> PResult<CatchClause> {
        self.expect(TokenKind::Catch)?;
        self.expect(TokenKind::LParen)?;
        let matcher = self.parse_catch_matcher()?;
        self.expect(TokenKind::RParen)?;
        let body = self.parse_stmts_until(&[TokenKind::End])?;
        self.expect(TokenKind::End)?;
        Ok(CatchClause { matcher, body })
    }

    /// `catch`'s parenthesized contents are either one of the two built-in
    /// error-kind identifiers or an arbitrary matching expression; both
    /// parse as a bare identifier at the token level, so we only commit to
    /// `ErrorKind` when the identifier's name matches a built-in kind *and*
    /// nothing else follows before the closing paren.
    fn parse_catch_matcher(&mut self) -> PResult<CatchMatcher> {
        if let TokenKind::Id(name) = &self.peek().kind {
            let is_builtin_kind = name == "ZeroDivision" || name == "IndexOutOfBounds";
            if is_builtin_kind && self.peek_at(1).kind == TokenKind::RParen {
                return Ok(CatchMatcher::ErrorKind(self.advance()));
            }
        }
        Ok(CatchMatcher::Expr(self.parse_expr()?))
    }

    fn parse_throw_stmt(&mut self) -> PResult<ThrowStmt> {
        let keyword = self.expect(TokenKind::Throw)?;
        let value = self.parse_expr()?;
        Ok(ThrowStmt { keyword, value })
    }

    // --- expressions -----------------------------------------------------

    /// `expr := ['neg'] ['not'] ( '(' expr ')' | rvalue ) [ op expr ]`
    ///
    /// `neg`/`not` bind to the immediately following primary term only
    /// (not to the rest of the operator chain); see DESIGN.md for why this
    /// reading was chosen over negating the whole right-leaning chain.
    fn parse_expr(&mut self) -> PResult<Expr> {
        let token = self.peek().clone();

        let mut primary = if self.peek().kind == TokenKind::Neg {
            self.advance();
            let inner = self.parse_unary_operand()?;
            Expr {
                token: token.clone(),
                kind: ExprKind::Neg(Box::new(inner)),
            }
        } else if self.peek().kind == TokenKind::Not {
            self.advance();
            let inner = self.parse_unary_operand()?;
            Expr {
                token: token.clone(),
                kind: ExprKind::Not(Box::new(inner)),
            }
        } else {
            self.parse_unary_operand()?
        };

        if let Some(op) = binary_op_for(&self.peek().kind) {
            let op_token = self.advance();
            let right = self.parse_expr()?;
            primary = Expr {
                token,
                kind: ExprKind::Binary {
                    left: Box::new(primary),
                    op,
                    op_token,
                    right: Box::new(right),
                },
            };
        }

        Ok(primary)
    }

    /// The `'(' expr ')' | rvalue` part of the grammar, i.e. an `expr` with
    /// no leading `neg`/`not` and no trailing operator chain.
    fn parse_unary_operand(&mut self) -> PResult<Expr> {
        let token = self.peek().clone();
        if self.peek().kind == TokenKind::LParen {
            self.advance();
            let inner = self.parse_expr()?;
            self.expect(TokenKind::RParen)?;
            Ok(Expr {
                token,
                kind: ExprKind::Primary(Primary::Paren(Box::new(inner))),
            })
        } else {
            let rvalue = self.parse_rvalue()?;
            Ok(Expr {
                token,
                kind: ExprKind::Primary(Primary::RValue(rvalue)),
            })
        }
    }

    fn parse_rvalue(&mut self) -> PResult<RValue> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Nil => {
                self.advance();
                Ok(RValue::Nil)
            }
            TokenKind::New => {
                self.advance();
                let name = self.expect_id()?;
                Ok(RValue::New(name))
            }
            TokenKind::IntVal(v) => {
                self.advance();
                Ok(RValue::IntLit(v))
            }
            TokenKind::DoubleVal(v) => {
                self.advance();
                Ok(RValue::DoubleLit(v))
            }
            TokenKind::CharVal(v) => {
                self.advance();
                Ok(RValue::CharLit(v))
            }
            TokenKind::StringVal(v) => {
                self.advance();
                Ok(RValue::StringLit(v))
            }
            TokenKind::BoolVal(v) => {
                self.advance();
                Ok(RValue::BoolLit(v))
            }
            TokenKind::Id(_) => {
                let head = self.advance();
                if self.peek().kind == TokenKind::LParen {
                    self.advance();
                    let args = self.parse_args()?;
                    self.expect(TokenKind::RParen)?;
                    Ok(RValue::Call { callee: head, args })
                } else {
                    let mut path = vec![head];
                    while self.peek().kind == TokenKind::Dot {
                        self.advance();
                        path.push(self.expect_id()?);
                    }
                    Ok(RValue::Path(path))
                }
            }
            _ => Err(ParseError::unexpected("a value", &token)),
        }
    }
}

fn binary_op_for(kind: &TokenKind) -> Option<BinOp> {
    Some(match kind {
        TokenKind::Plus => BinOp::Add,
        TokenKind::Minus => BinOp::Sub,
        TokenKind::Times => BinOp::Mul,
        TokenKind::Divide => BinOp::Div,
        TokenKind::Modulo => BinOp::Mod,
        TokenKind::Less => BinOp::Lt,
        TokenKind::LessEqual => BinOp::Le,
        TokenKind::Greater => BinOp::Gt,
        TokenKind::GreaterEqual => BinOp::Ge,
        TokenKind::Equal => BinOp::Eq,
        TokenKind::NotEqual => BinOp::Ne,
        TokenKind::And => BinOp::And,
        TokenKind::Or => BinOp::Or,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Decl;
    use crate::lexer::Lexer;

    fn parse(src: &str) -> Program {
        let tokens = Lexer::new(src).tokenize().unwrap();
        Parser::new(tokens).parse_program().unwrap()
    }

    #[test]
    fn parses_empty_main() {
        let program = parse("fun int main() return 0 end");
        assert_eq!(program.decls.len(), 1);
        match &program.decls[0] {
            Decl::Function(f) => {
                assert_eq!(f.name.lexeme, "main");
                assert_eq!(f.body.len(), 1);
            }
            _ => panic!("expected function decl"),
        }
    }

    #[test]
    fn parses_type_decl_with_fields() {
        let program = parse("type P var x:int = 0 end fun int main() return 0 end");
        match &program.decls[0] {
            Decl::Type(t) => {
                assert_eq!(t.name.lexeme, "P");
                assert_eq!(t.fields.len(), 1);
            }
            _ => panic!("expected type decl"),
        }
    }

    #[test]
    fn parses_field_assignment_path() {
        let program = parse(
            "fun int main() var p = new P p.x = 5 return p.x end",
        );
        match &program.decls[0] {
            Decl::Function(f) => {
                assert_eq!(f.body.len(), 3);
                match &f.body[1] {
                    Stmt::Assign(a) => assert_eq!(a.path.len(), 2),
                    _ => panic!("expected assignment"),
                }
            }
            _ => panic!("expected function decl"),
        }
    }

    #[test]
    fn parses_try_catch() {
        let program = parse(
            "fun int main() try var x = 1/0 catch (ZeroDivision) print(\"caught\") end return 0 end",
        );
        match &program.decls[0] {
            Decl::Function(f) => match &f.body[0] {
                Stmt::Try(t) => match &t.catch.matcher {
                    CatchMatcher::ErrorKind(tok) => assert_eq!(tok.lexeme, "ZeroDivision"),
                    _ => panic!("expected error-kind matcher"),
                },
                _ => panic!("expected try statement"),
            },
            _ => panic!("expected function decl"),
        }
    }

    #[test]
    fn rejects_unexpected_token() {
        let tokens = Lexer::new("fun int main() ) end").tokenize().unwrap();
        assert!(Parser::new(tokens).parse_program().is_err());
    }
}
