//! Static type checker: AST walk assigning each expression an inferred
//! type, verifying declarations, calls, assignments, control conditions
//! and record paths (§4.3).
//!
//! The checker owns its own [`SymbolTable`] instance, independent from the
//! interpreter's (§2: "The checker and interpreter each own an independent
//! symbol-table instance"). Its payload type is [`TypeBinding`] rather than
//! a runtime [`crate::value::Value`].

mod error;
mod types;

pub use error::TypeError;
pub use types::{FunctionSig, Type, TypeBinding};

use std::collections::HashMap;

use crate::ast::{
    Decl, Expr, ExprKind, Primary, Program, RValue, Stmt, TryStmt, TypeDecl, VarDecl,
};
use crate::ast::{Assign, CatchMatcher, ForStmt, FunctionDecl, IfStmt, WhileStmt};
use crate::symtab::SymbolTable;
use crate::token::{Position, Token, TokenKind};

type TResult<T> = Result<T, TypeError>;

/// `print(string)`, `read()`, `stoi(string)`, `itos(int)`, `stod(string)`,
/// `dtos(double)`, `get(int,string)`, `length(string)` — seeded into the
/// global environment before any user declaration is visited (§4.3).
const BUILTINS: &[(&str, &[Type], Type)] = &[
    ("print", &[Type::String], Type::Nil),
    ("read", &[], Type::String),
    ("stoi", &[Type::String], Type::Int),
    ("itos", &[Type::Int], Type::String),
    ("stod", &[Type::String], Type::Double),
    ("dtos", &[Type::Double], Type::String),
    ("get", &[Type::Int, Type::String], Type::Char),
    ("length", &[Type::String], Type::Int),
];

pub struct Typechecker {
    table: SymbolTable<TypeBinding>,
    current_return: Option<Type>,
}

impl Default for Typechecker {
    fn default() -> Self {
        Self::new()
    }
}

impl Typechecker {
    pub fn new() -> Self {
        let mut table = SymbolTable::new();
        for (name, params, ret) in BUILTINS {
            table.define(
                (*name).to_owned(),
                TypeBinding::Function(FunctionSig {
                    params: params.to_vec(),
                    return_type: ret.clone(),
                }),
            );
        }
        Typechecker {
            table,
            current_return: None,
        }
    }

    pub fn check_program(&mut self, program: &Program) -> TResult<()> {
        // Pass A: register every function signature and record name so
        // declarations may forward-reference one another.
        for decl in &program.decls {
            match decl {
                Decl::Function(f) => self.register_function_sig(f)?,
                Decl::Type(t) => self.register_type_name(t)?,
            }
        }

        // Pass B: resolve each record's field types now that every type
        // name in the program is known.
        for decl in &program.decls {
            if let Decl::Type(t) = decl {
                self.fill_type_fields(t)?;
            }
        }

        self.check_main_signature()?;

        // Pass C: check every function body.
        for decl in &program.decls {
            if let Decl::Function(f) = decl {
                self.check_function_body(f)?;
            }
        }

        Ok(())
    }

    // --- declaration registration ---------------------------------------

    fn register_function_sig(&mut self, f: &FunctionDecl) -> TResult<()> {
        if self.table.defined_in_current(&f.name.lexeme) {
            return Err(TypeError::new(
                format!("'{}' is already declared", f.name.lexeme),
                f.name.position(),
            ));
        }
        let params = f
            .params
            .iter()
            .map(|p| self.type_from_dtype_token(&p.ty))
            .collect::<TResult<Vec<_>>>()?;
        let return_type = self.type_from_return_token(&f.return_type)?;
        self.table.define(
            f.name.lexeme.clone(),
            TypeBinding::Function(FunctionSig {
                params,
                return_type,
            }),
        );
        Ok(())
    }

    fn register_type_name(&mut self, t: &TypeDecl) -> TResult<()> {
        if self.table.defined_in_current(&t.name.lexeme) {
            return Err(TypeError::new(
                format!("'{}' is already declared", t.name.lexeme),
                t.name.position(),
            ));
        }
        self.table
            .define(t.name.lexeme.clone(), TypeBinding::Record(HashMap::new()));
        Ok(())
    }

    fn fill_type_fields(&mut self, t: &TypeDecl) -> TResult<()> {
        let mut fields = HashMap::new();
        for field in &t.fields {
            let (name, ty) = self.check_vardecl_type(field)?;
            fields.insert(name, ty);
        }
        self.table
            .define(t.name.lexeme.clone(), TypeBinding::Record(fields));
        Ok(())
    }

    fn check_main_signature(&self) -> TResult<()> {
        match self.table.lookup("main") {
            Some(TypeBinding::Function(sig))
                if sig.params.is_empty() && sig.return_type == Type::Int =>
            {
                Ok(())
            }
            Some(TypeBinding::Function(_)) => Err(TypeError::new(
                "'main' must take no parameters and return 'int'",
                Position { line: 1, column: 1 },
            )),
            _ => Err(TypeError::new(
                "program must declare a function 'main' with no parameters returning 'int'",
                Position { line: 1, column: 1 },
            )),
        }
    }

    fn check_function_body(&mut self, f: &FunctionDecl) -> TResult<()> {
        let sig = match self.table.lookup(&f.name.lexeme) {
            Some(TypeBinding::Function(sig)) => sig.clone(),
            _ => unreachable!("function signature registered in pass A"),
        };
        self.current_return = Some(sig.return_type.clone());
        self.table.enter_scope();
        for (param, ty) in f.params.iter().zip(sig.params.iter()) {
            if self.table.defined_in_current(&param.name.lexeme) {
                self.table.exit_scope();
                return Err(TypeError::new(
                    format!("duplicate parameter '{}'", param.name.lexeme),
                    param.name.position(),
                ));
            }
            self.table
                .define(param.name.lexeme.clone(), TypeBinding::Var(ty.clone()));
        }
        let result = self.check_stmts(&f.body);
        self.table.exit_scope();
        self.current_return = None;
        result
    }

    // --- type-name resolution -------------------------------------------

    fn type_from_dtype_token(&self, token: &Token) -> TResult<Type> {
        if let TokenKind::Id(name) = &token.kind {
            return match self.table.lookup(name) {
                Some(TypeBinding::Record(_)) => Ok(Type::Record(name.clone())),
                _ => Err(TypeError::new(
                    format!("undeclared type '{name}'"),
                    token.position(),
                )),
            };
        }
        Type::from_type_name(primitive_name(&token.kind))
            .ok_or_else(|| TypeError::new(format!("'{token}' is not a type"), token.position()))
    }

    fn type_from_return_token(&self, token: &Token) -> TResult<Type> {
        if token.kind == TokenKind::Nil {
            return Ok(Type::Nil);
        }
        self.type_from_dtype_token(token)
    }

    // --- statements -------------------------------------------------------

    fn check_stmts(&mut self, stmts: &[Stmt]) -> TResult<()> {
        for stmt in stmts {
            self.check_stmt(stmt)?;
        }
        Ok(())
    }

    fn check_stmt(&mut self, stmt: &Stmt) -> TResult<()> {
        match stmt {
            Stmt::VarDecl(vd) => self.check_var_decl_stmt(vd),
            Stmt::Assign(a) => self.check_assign(a),
            Stmt::Call(expr) => self.infer_expr(expr).map(|_| ()),
            Stmt::Return(r) => self.check_return(r),
            Stmt::If(i) => self.check_if(i),
            Stmt::While(w) => self.check_while(w),
            Stmt::For(f) => self.check_for(f),
            Stmt::Try(t) => self.check_try(t),
            Stmt::Throw(t) => self.check_throw(t),
        }
    }

    fn check_vardecl_type(&mut self, vd: &VarDecl) -> TResult<(String, Type)> {
        let explicit = match &vd.declared_type {
            Some(tok) => Some(self.type_from_dtype_token(tok)?),
            None => None,
        };
        let init_ty = self.infer_expr(&vd.init)?;
        let final_ty = if init_ty == Type::Nil {
            match explicit {
                Some(t) => t,
                None => {
                    return Err(TypeError::new(
                        "a 'nil' initializer requires an explicit type annotation",
                        vd.init.token.position(),
                    ))
                }
            }
        } else {
            match explicit {
                Some(t) if t != init_ty => {
                    return Err(TypeError::new(
                        format!(
                            "cannot initialize '{}' of type '{t}' with a value of type '{init_ty}'",
                            vd.name.lexeme
                        ),
                        vd.init.token.position(),
                    ))
                }
                Some(t) => t,
                None => init_ty,
            }
        };
        Ok((vd.name.lexeme.clone(), final_ty))
    }

    fn check_var_decl_stmt(&mut self, vd: &VarDecl) -> TResult<()> {
        if self.table.defined_in_current(&vd.name.lexeme) {
            return Err(TypeError::new(
                format!("'{}' is already declared in this scope", vd.name.lexeme),
                vd.name.position(),
            ));
        }
        let (name, ty) = self.check_vardecl_type(vd)?;
        self.table.define(name, TypeBinding::Var(ty));
        Ok(())
    }

    fn check_assign(&mut self, assign: &Assign) -> TResult<()> {
        let lvalue_ty = self.resolve_path(&assign.path)?;
        let rhs_ty = self.infer_expr(&assign.value)?;
        if rhs_ty == Type::Nil {
            if !lvalue_ty.is_record() {
                return Err(TypeError::new(
                    format!("cannot assign 'nil' to non-record-typed '{lvalue_ty}'"),
                    assign.value.token.position(),
                ));
            }
        } else if rhs_ty != lvalue_ty {
            return Err(TypeError::new(
                format!("cannot assign value of type '{rhs_ty}' to '{lvalue_ty}'"),
                assign.value.token.position(),
            ));
        }
        Ok(())
    }

    fn check_return(&mut self, r: &crate::ast::ReturnStmt) -> TResult<()> {
        let ty = self.infer_expr(&r.value)?;
        let expected = self
            .current_return
            .clone()
            .expect("return only checked inside a function body");
        if ty != Type::Nil && ty != expected {
            return Err(TypeError::new(
                format!("expected return type '{expected}', found '{ty}'"),
                r.value.token.position(),
            ));
        }
        Ok(())
    }

    fn check_if(&mut self, i: &IfStmt) -> TResult<()> {
        self.check_condition(&i.primary.condition)?;
        self.table.enter_scope();
        let result = self.check_stmts(&i.primary.body);
        self.table.exit_scope();
        result?;

        for branch in &i.elseifs {
            self.check_condition(&branch.condition)?;
            self.table.enter_scope();
            let result = self.check_stmts(&branch.body);
            self.table.exit_scope();
            result?;
        }

        if let Some(else_body) = &i.else_body {
            self.table.enter_scope();
            let result = self.check_stmts(else_body);
            self.table.exit_scope();
            result?;
        }
        Ok(())
    }

    fn check_while(&mut self, w: &WhileStmt) -> TResult<()> {
        self.check_condition(&w.condition)?;
        self.table.enter_scope();
        let result = self.check_stmts(&w.body);
        self.table.exit_scope();
        result
    }

    fn check_for(&mut self, f: &ForStmt) -> TResult<()> {
        let start_ty = self.infer_expr(&f.start)?;
        if start_ty != Type::Int {
            return Err(TypeError::new(
                format!("for-loop start must be 'int', found '{start_ty}'"),
                f.start.token.position(),
            ));
        }
        let end_ty = self.infer_expr(&f.end)?;
        if end_ty != Type::Int {
            return Err(TypeError::new(
                format!("for-loop end must be 'int', found '{end_ty}'"),
                f.end.token.position(),
            ));
        }
        self.table.enter_scope();
        self.table
            .define(f.var.lexeme.clone(), TypeBinding::Var(Type::Int));
        let result = self.check_stmts(&f.body);
        self.table.exit_scope();
        result
    }

    fn check_try(&mut self, t: &TryStmt) -> TResult<()> {
        self.table.enter_scope();
        let result = self.check_stmts(&t.body);
        self.table.exit_scope();
        result?;

        if let CatchMatcher::Expr(expr) = &t.catch.matcher {
            let ty = self.infer_expr(expr)?;
            if !matches!(ty, Type::Int | Type::Double | Type::Bool) {
                return Err(TypeError::new(
                    format!("catch expression must be 'int', 'double' or 'bool', found '{ty}'"),
                    expr.token.position(),
                ));
            }
        }

        self.table.enter_scope();
        let result = self.check_stmts(&t.catch.body);
        self.table.exit_scope();
        result
    }

    fn check_throw(&mut self, t: &crate::ast::ThrowStmt) -> TResult<()> {
        let ty = self.infer_expr(&t.value)?;
        if !matches!(ty, Type::Int | Type::Double | Type::Bool) {
            return Err(TypeError::new(
                format!("thrown value must be 'int', 'double' or 'bool', found '{ty}'"),
                t.value.token.position(),
            ));
        }
        Ok(())
    }

    fn check_condition(&mut self, expr: &Expr) -> TResult<()> {
        let ty = self.infer_expr(expr)?;
        if ty != Type::Bool {
            return Err(TypeError::new(
                format!("condition must be 'bool', found '{ty}'"),
                expr.token.position(),
            ));
        }
        Ok(())
    }

    // --- expressions -------------------------------------------------------

    fn infer_expr(&mut self, expr: &Expr) -> TResult<Type> {
        match &expr.kind {
            ExprKind::Not(inner) => {
                let ty = self.infer_expr(inner)?;
                if ty != Type::Bool {
                    return Err(TypeError::new(
                        format!("'not' requires 'bool', found '{ty}'"),
                        expr.token.position(),
                    ));
                }
                Ok(Type::Bool)
            }
            ExprKind::Neg(inner) => {
                let ty = self.infer_expr(inner)?;
                if !ty.is_numeric() {
                    return Err(TypeError::new(
                        format!("'neg' requires 'int' or 'double', found '{ty}'"),
                        expr.token.position(),
                    ));
                }
                Ok(ty)
            }
            ExprKind::Primary(Primary::Paren(inner)) => self.infer_expr(inner),
            ExprKind::Primary(Primary::RValue(rvalue)) => self.infer_rvalue(rvalue),
            ExprKind::Binary {
                left,
                op,
                op_token,
                right,
            } => {
                let lt = self.infer_expr(left)?;
                let rt = self.infer_expr(right)?;
                check_binary(*op, &lt, &rt, op_token.position())
            }
        }
    }

    fn infer_rvalue(&mut self, rvalue: &RValue) -> TResult<Type> {
        match rvalue {
            RValue::IntLit(_) => Ok(Type::Int),
            RValue::DoubleLit(_) => Ok(Type::Double),
            RValue::CharLit(_) => Ok(Type::Char),
            RValue::StringLit(_) => Ok(Type::String),
            RValue::BoolLit(_) => Ok(Type::Bool),
            RValue::Nil => Ok(Type::Nil),
            RValue::New(name) => match self.table.lookup(&name.lexeme) {
                Some(TypeBinding::Record(_)) => Ok(Type::Record(name.lexeme.clone())),
                _ => Err(TypeError::new(
                    format!("undeclared type '{}'", name.lexeme),
                    name.position(),
                )),
            },
            RValue::Call { callee, args } => self.check_call(callee, args),
            RValue::Path(path) => self.resolve_path(path),
        }
    }

    fn check_call(&mut self, callee: &Token, args: &[Expr]) -> TResult<Type> {
        let sig = match self.table.lookup(&callee.lexeme) {
            Some(TypeBinding::Function(sig)) => sig.clone(),
            Some(_) => {
                return Err(TypeError::new(
                    format!("'{}' is not callable", callee.lexeme),
                    callee.position(),
                ))
            }
            None => {
                return Err(TypeError::new(
                    format!("call to undeclared function '{}'", callee.lexeme),
                    callee.position(),
                ))
            }
        };
        if args.len() != sig.params.len() {
            return Err(TypeError::new(
                format!(
                    "'{}' expects {} argument(s), found {}",
                    callee.lexeme,
                    sig.params.len(),
                    args.len()
                ),
                callee.position(),
            ));
        }
        for (arg, param_ty) in args.iter().zip(sig.params.iter()) {
            let arg_ty = self.infer_expr(arg)?;
            if arg_ty == Type::Nil {
                if !param_ty.is_record() {
                    return Err(TypeError::new(
                        format!("cannot pass 'nil' for non-record parameter of type '{param_ty}'"),
                        arg.token.position(),
                    ));
                }
            } else if arg_ty != *param_ty {
                return Err(TypeError::new(
                    format!("expected argument of type '{param_ty}', found '{arg_ty}'"),
                    arg.token.position(),
                ));
            }
        }
        Ok(sig.return_type)
    }

    /// Shared by [`Self::check_assign`] and [`RValue::Path`]: resolves a
    /// non-empty dotted identifier path, walking field maps for every
    /// segment past the first (§4.3 "Assignment" / "Record path r-value").
    fn resolve_path(&mut self, path: &[Token]) -> TResult<Type> {
        let head = &path[0];
        let mut ty = match self.table.lookup(&head.lexeme) {
            Some(TypeBinding::Var(ty)) => ty.clone(),
            Some(_) => {
                return Err(TypeError::new(
                    format!("'{}' is not a variable", head.lexeme),
                    head.position(),
                ))
            }
            None => {
                return Err(TypeError::new(
                    format!("undefined variable '{}'", head.lexeme),
                    head.position(),
                ))
            }
        };

        for segment in &path[1..] {
            let record_name = match &ty {
                Type::Record(name) => name.clone(),
                other => {
                    return Err(TypeError::new(
                        format!(
                            "cannot access field '{}' on non-record type '{other}'",
                            segment.lexeme
                        ),
                        segment.position(),
                    ))
                }
            };
            let fields = match self.table.lookup(&record_name) {
                Some(TypeBinding::Record(fields)) => fields.clone(),
                _ => unreachable!("record type registered during pass A/B"),
            };
            ty = match fields.get(&segment.lexeme) {
                Some(field_ty) => field_ty.clone(),
                None => {
                    return Err(TypeError::new(
                        format!("type '{record_name}' has no field '{}'", segment.lexeme),
                        segment.position(),
                    ))
                }
            };
        }
        Ok(ty)
    }
}

fn primitive_name(kind: &TokenKind) -> &'static str {
    match kind {
        TokenKind::BoolType => "bool",
        TokenKind::IntType => "int",
        TokenKind::DoubleType => "double",
        TokenKind::CharType => "char",
        TokenKind::StringType => "string",
        _ => "",
    }
}

fn check_binary(op: crate::ast::BinOp, lt: &Type, rt: &Type, pos: Position) -> TResult<Type> {
    use crate::ast::BinOp::*;
    use Type::*;

    match op {
        Add => match (lt, rt) {
            (Int, Int) => Ok(Int),
            (Double, Double) => Ok(Double),
            (Char | String, Char | String) => Ok(String),
            _ => Err(TypeError::new(
                format!("'+' is not defined for '{lt}' and '{rt}'"),
                pos,
            )),
        },
        Sub | Mul | Div => match (lt, rt) {
            (Int, Int) => Ok(Int),
            (Double, Double) => Ok(Double),
            _ => Err(TypeError::new(
                format!(
                    "'{op:?}' requires matching 'int' or 'double' operands, found '{lt}' and '{rt}'"
                ),
                pos,
            )),
        },
        Mod => match (lt, rt) {
            (Int, Int) => Ok(Int),
            _ => Err(TypeError::new(
                format!("'%' requires 'int' operands, found '{lt}' and '{rt}'"),
                pos,
            )),
        },
        Lt | Le | Gt | Ge => match (lt, rt) {
            (Int, Int) | (Double, Double) => Ok(Bool),
            _ => Err(TypeError::new(
                format!(
                    "comparison requires matching 'int' or 'double' operands, found '{lt}' and '{rt}'"
                ),
                pos,
            )),
        },
        Eq | Ne => {
            if *lt == Nil || *rt == Nil {
                Ok(Bool)
            } else if lt == rt {
                Ok(Bool)
            } else {
                Err(TypeError::new(
                    format!("'==' / '!=' requires identical types, found '{lt}' and '{rt}'"),
                    pos,
                ))
            }
        }
        And | Or => match (lt, rt) {
            (Bool, Bool) => Ok(Bool),
            _ => Err(TypeError::new(
                format!("'and'/'or' requires 'bool' operands, found '{lt}' and '{rt}'"),
                pos,
            )),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn check(src: &str) -> TResult<()> {
        let tokens = Lexer::new(src).tokenize().unwrap();
        let program = Parser::new(tokens).parse_program().unwrap();
        Typechecker::new().check_program(&program)
    }

    #[test]
    fn accepts_minimal_main() {
        assert!(check("fun int main() return 0 end").is_ok());
    }

    #[test]
    fn rejects_missing_main() {
        assert!(check("fun int foo() return 0 end").is_err());
    }

    #[test]
    fn rejects_shadowing_in_same_scope() {
        assert!(check("fun int main() var x = 1 var x = 2 return 0 end").is_err());
    }

    #[test]
    fn allows_shadowing_in_nested_scope() {
        assert!(check(
            "fun int main() var x = 1 if true then var x = 2 end return x end"
        )
        .is_ok());
    }

    #[test]
    fn record_field_assignment_and_path_type_check() {
        assert!(check(
            "type P var x:int = 0 end fun int main() var p = new P p.x = 5 return p.x end"
        )
        .is_ok());
    }

    #[test]
    fn rejects_mismatched_field_assignment() {
        assert!(check(
            "type P var x:int = 0 end fun int main() var p = new P p.x = true return 0 end"
        )
        .is_err());
    }

    #[test]
    fn nil_allowed_only_for_record_typed_var_decl() {
        assert!(
            check("type P var x:int = 0 end fun int main() var p: P = nil return 0 end").is_ok()
        );
        assert!(check("fun int main() var x = nil return 0 end").is_err());
    }

    #[test]
    fn nil_assignment_rejected_into_primitive_lvalue() {
        assert!(check("fun int main() var x: int = 0 x = nil return 0 end").is_err());
    }

    #[test]
    fn string_plus_char_concatenates() {
        assert!(check("fun int main() var s = \"ab\" + 'c' return 0 end").is_ok());
    }

    #[test]
    fn for_loop_requires_integer_bounds() {
        assert!(check("fun int main() for i = 0 to 10 do end return 0 end").is_ok());
        assert!(check("fun int main() for i = 0.0 to 10 do end return 0 end").is_err());
    }

    #[test]
    fn catch_by_builtin_error_kind_type_checks() {
        assert!(check(
            "fun int main() try var x = 1/0 catch (ZeroDivision) print(\"caught\") end return 0 end"
        )
        .is_ok());
    }

    #[test]
    fn throw_requires_primitive_payload() {
        assert!(check("fun int main() throw 1 return 0 end").is_ok());
        assert!(check("fun int main() throw \"nope\" return 0 end").is_err());
    }

    #[test]
    fn call_argument_count_and_types_are_checked() {
        assert!(check("fun int main() print(\"ok\") return 0 end").is_ok());
        assert!(check("fun int main() print(1) return 0 end").is_err());
        assert!(check("fun int main() print() return 0 end").is_err());
    }
}
