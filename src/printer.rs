//! AST → source-text pretty printer (§4.5, supplemented from
//! `original_source/FinalProject/printer.h`).
//!
//! Renders a [`Program`] back into the language's concrete syntax with
//! 3-space indentation, the same step size the original printer used. The
//! output is canonical (its own spacing, not a reproduction of whatever
//! whitespace the source happened to use) — the only property that matters
//! is that re-lexing and re-parsing it yields a structurally equal AST
//! (§8 invariant 2).

use std::fmt::Write;

use crate::ast::{
    Assign, BinOp, CatchMatcher, CondBranch, Decl, Expr, ExprKind, ForStmt, FunctionDecl, IfStmt,
    Primary, Program, RValue, ReturnStmt, Stmt, ThrowStmt, TryStmt, TypeDecl, VarDecl, WhileStmt,
};

const INDENT_STEP: usize = 3;

pub fn print_program(program: &Program) -> String {
    let mut p = Printer::default();
    p.program(program);
    p.out
}

#[derive(Default)]
struct Printer {
    out: String,
    indent: usize,
}

impl Printer {
    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push(' ');
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn inc(&mut self) {
        self.indent += INDENT_STEP;
    }

    fn dec(&mut self) {
        self.indent -= INDENT_STEP;
    }

    fn program(&mut self, program: &Program) {
        for decl in &program.decls {
            match decl {
                Decl::Function(f) => self.function_decl(f),
                Decl::Type(t) => self.type_decl(t),
            }
        }
    }

    fn function_decl(&mut self, f: &FunctionDecl) {
        let params = f
            .params
            .iter()
            .map(|p| format!("{}:{}", p.name.lexeme, p.ty.lexeme))
            .collect::<Vec<_>>()
            .join(", ");
        self.line(&format!(
            "fun {} {}({})",
            f.return_type.lexeme, f.name.lexeme, params
        ));
        self.inc();
        self.stmts(&f.body);
        self.dec();
        self.line("end");
    }

    fn type_decl(&mut self, t: &TypeDecl) {
        self.line(&format!("type {}", t.name.lexeme));
        self.inc();
        for field in &t.fields {
            self.var_decl(field);
        }
        self.dec();
        self.line("end");
    }

    fn stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::VarDecl(vd) => self.var_decl(vd),
            Stmt::Assign(a) => self.assign(a),
            Stmt::Call(expr) => {
                let line = self.expr_str(expr);
                self.line(&line);
            }
            Stmt::Return(r) => self.return_stmt(r),
            Stmt::If(i) => self.if_stmt(i),
            Stmt::While(w) => self.while_stmt(w),
            Stmt::For(f) => self.for_stmt(f),
            Stmt::Try(t) => self.try_stmt(t),
            Stmt::Throw(t) => self.throw_stmt(t),
        }
    }

    fn var_decl(&mut self, vd: &VarDecl) {
        let ty_suffix = match &vd.declared_type {
            Some(tok) => format!(":{}", tok.lexeme),
            None => String::new(),
        };
        let init = self.expr_str(&vd.init);
        self.line(&format!("var {}{ty_suffix} = {init}", vd.name.lexeme));
    }

    fn assign(&mut self, a: &Assign) {
        let path = a
            .path
            .iter()
            .map(|t| t.lexeme.as_str())
            .collect::<Vec<_>>()
            .join(".");
        let value = self.expr_str(&a.value);
        self.line(&format!("{path} = {value}"));
    }

    fn return_stmt(&mut self, r: &ReturnStmt) {
        let value = self.expr_str(&r.value);
        self.line(&format!("return {value}"));
    }

    fn cond_branch(&mut self, keyword: &str, branch: &CondBranch) {
        let cond = self.expr_str(&branch.condition);
        self.line(&format!("{keyword} {cond} then"));
        self.inc();
        self.stmts(&branch.body);
        self.dec();
    }

    fn if_stmt(&mut self, i: &IfStmt) {
        self.cond_branch("if", &i.primary);
        for branch in &i.elseifs {
            self.cond_branch("elseif", branch);
        }
        if let Some(else_body) = &i.else_body {
            self.line("else");
            self.inc();
            self.stmts(else_body);
            self.dec();
        }
        self.line("end");
    }

    fn while_stmt(&mut self, w: &WhileStmt) {
        let cond = self.expr_str(&w.condition);
        self.line(&format!("while {cond} do"));
        self.inc();
        self.stmts(&w.body);
        self.dec();
        self.line("end");
    }

    fn for_stmt(&mut self, f: &ForStmt) {
        let start = self.expr_str(&f.start);
        let end = self.expr_str(&f.end);
        self.line(&format!("for {} = {start} to {end} do", f.var.lexeme));
        self.inc();
        self.stmts(&f.body);
        self.dec();
        self.line("end");
    }

    fn try_stmt(&mut self, t: &TryStmt) {
        self.line("try");
        self.inc();
        self.stmts(&t.body);
        self.dec();
        let matcher = match &t.catch.matcher {
            CatchMatcher::Expr(expr) => self.expr_str(expr),
            CatchMatcher::ErrorKind(tok) => tok.lexeme.clone(),
        };
        self.line(&format!("catch ({matcher})"));
        self.inc();
        self.stmts(&t.catch.body);
        self.dec();
        self.line("end");
    }

    fn throw_stmt(&mut self, t: &ThrowStmt) {
        let value = self.expr_str(&t.value);
        self.line(&format!("throw {value}"));
    }

    fn expr_str(&self, expr: &Expr) -> String {
        let mut s = String::new();
        write_expr(&mut s, expr);
        s
    }
}

fn write_expr(out: &mut String, expr: &Expr) {
    match &expr.kind {
        ExprKind::Not(inner) => {
            out.push_str("not ");
            write_expr(out, inner);
        }
        ExprKind::Neg(inner) => {
            out.push_str("neg ");
            write_expr(out, inner);
        }
        ExprKind::Primary(Primary::Paren(inner)) => {
            out.push('(');
            write_expr(out, inner);
            out.push(')');
        }
        ExprKind::Primary(Primary::RValue(rvalue)) => write_rvalue(out, rvalue),
        ExprKind::Binary {
            left, op, right, ..
        } => {
            write_expr(out, left);
            let _ = write!(out, " {} ", binop_lexeme(*op));
            write_expr(out, right);
        }
    }
}

fn write_rvalue(out: &mut String, rvalue: &RValue) {
    match rvalue {
        RValue::IntLit(v) => {
            let _ = write!(out, "{v}");
        }
        RValue::DoubleLit(v) => {
            let _ = write!(out, "{v}");
        }
        RValue::CharLit(v) => {
            let _ = write!(out, "'{v}'");
        }
        RValue::StringLit(v) => {
            let _ = write!(out, "\"{v}\"");
        }
        RValue::BoolLit(v) => {
            let _ = write!(out, "{v}");
        }
        RValue::Nil => out.push_str("nil"),
        RValue::New(name) => {
            let _ = write!(out, "new {}", name.lexeme);
        }
        RValue::Call { callee, args } => {
            let _ = write!(out, "{}(", callee.lexeme);
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_expr(out, arg);
            }
            out.push(')');
        }
        RValue::Path(path) => {
            let rendered = path
                .iter()
                .map(|t| t.lexeme.as_str())
                .collect::<Vec<_>>()
                .join(".");
            out.push_str(&rendered);
        }
    }
}

fn binop_lexeme(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Mod => "%",
        BinOp::Lt => "<",
        BinOp::Le => "<=",
        BinOp::Gt => ">",
        BinOp::Ge => ">=",
        BinOp::Eq => "==",
        BinOp::Ne => "!=",
        BinOp::And => "and",
        BinOp::Or => "or",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn roundtrip(src: &str) {
        let tokens = Lexer::new(src).tokenize().unwrap();
        let program = Parser::new(tokens).parse_program().unwrap();
        let printed = print_program(&program);

        let tokens2 = Lexer::new(&printed).tokenize().unwrap_or_else(|e| {
            panic!("printed source failed to re-lex: {e:?}\n---\n{printed}")
        });
        let reparsed = Parser::new(tokens2).parse_program().unwrap_or_else(|e| {
            panic!("printed source failed to re-parse: {e:?}\n---\n{printed}")
        });

        assert_eq!(program, reparsed, "printed source:\n{printed}");
    }

    #[test]
    fn roundtrips_minimal_main() {
        roundtrip("fun int main() return 0 end");
    }

    #[test]
    fn roundtrips_record_type_and_field_access() {
        roundtrip(
            "type P var x:int = 0 end fun int main() var p = new P p.x = 5 return p.x end",
        );
    }

    #[test]
    fn roundtrips_control_flow() {
        roundtrip(
            "fun int main() var total = 0 for i = 0 to 5 do if i == 2 then total = total + 1 elseif i == 3 then total = total + 2 else total = total + i end end return total end",
        );
    }

    #[test]
    fn roundtrips_try_catch_and_throw() {
        roundtrip(
            "fun int main() try throw 1 catch (ZeroDivision) print(\"caught\") end return 0 end",
        );
    }

    #[test]
    fn roundtrips_unary_and_binary_chains() {
        roundtrip("fun int main() var x = neg 1 + 2 var y = not true and false return x end");
    }
}
