//! Tree-walking evaluator (§4.4).
//!
//! The interpreter owns its own [`SymbolTable`], independent of the
//! checker's, plus a monotonically-growing [`Heap`] and the program's own
//! standard I/O handles. Control flow that is not plain statement-by-
//! statement execution — `return`, `throw`, and the two built-in runtime
//! error kinds — is modeled as [`Flow`], a discriminated result threaded
//! through every recursive `exec_*`/`eval_*` call via `?` rather than a
//! shared mutable "current value" slot.

mod error;

pub use error::{Flow, RuntimeError, RuntimeErrorKind, Thrown};

use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::rc::Rc;

use crate::ast::{
    Assign, CatchMatcher, Decl, Expr, ExprKind, ForStmt, FunctionDecl, IfStmt, Primary, Program,
    RValue, Stmt, ThrowStmt, TryStmt, TypeDecl, WhileStmt,
};
use crate::symtab::SymbolTable;
use crate::token::{Position, Token};
use crate::value::{Heap, Value};

type EvalResult<T> = Result<T, Flow>;

pub struct Interpreter<R, W> {
    table: SymbolTable<Value>,
    heap: Heap,
    functions: HashMap<String, Rc<FunctionDecl>>,
    types: HashMap<String, Rc<TypeDecl>>,
    stdin: R,
    stdout: W,
}

impl<R: BufRead, W: Write> Interpreter<R, W> {
    pub fn new(program: &Program, stdin: R, stdout: W) -> Self {
        let mut functions = HashMap::new();
        let mut types = HashMap::new();
        for decl in &program.decls {
            match decl {
                Decl::Function(f) => {
                    functions.insert(f.name.lexeme.clone(), Rc::new(f.clone()));
                }
                Decl::Type(t) => {
                    types.insert(t.name.lexeme.clone(), Rc::new(t.clone()));
                }
            }
        }
        Interpreter {
            table: SymbolTable::new(),
            heap: Heap::new(),
            functions,
            types,
            stdin,
            stdout,
        }
    }

    /// Runs `main` with no arguments and returns its `int` result as the
    /// process exit code. An uncaught `throw` or runtime error, or any I/O
    /// failure on the injected handles, is returned as a fatal [`Flow`].
    pub fn run(&mut self) -> EvalResult<i64> {
        let start = Position { line: 1, column: 1 };
        let result = self.call_function("main", Vec::new(), start)?;
        match result {
            Value::Int(code) => Ok(code),
            // `main` ran to completion with no explicit `return` (§6: exit 0).
            _ => Ok(0),
        }
    }

    // --- scoping ----------------------------------------------------------

    /// Enters a fresh frame, runs `body`, and always leaves the frame again
    /// before returning — even when `body` propagates a [`Flow`] — so the
    /// symbol-table depth stays correct no matter how many levels an error
    /// or return unwinds through.
    fn in_scope<T>(&mut self, body: impl FnOnce(&mut Self) -> EvalResult<T>) -> EvalResult<T> {
        self.table.enter_scope();
        let result = body(self);
        self.table.exit_scope();
        result
    }

    fn call_function(&mut self, name: &str, args: Vec<Value>, pos: Position) -> EvalResult<Value> {
        let decl = self
            .functions
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::generic(format!("undefined function '{name}'"), pos))?;

        let saved = self.table.enter_global();
        self.table.enter_scope();
        for (param, value) in decl.params.iter().zip(args) {
            self.table.define(param.name.lexeme.clone(), value);
        }
        let result = self.exec_stmts(&decl.body);
        self.table.exit_scope();
        self.table.jump(saved);

        match result {
            Ok(()) => Ok(Value::Nil),
            Err(Flow::Return(value)) => Ok(value),
            Err(other) => Err(other),
        }
    }

    // --- statements ---------------------------------------------------------

    fn exec_stmts(&mut self, stmts: &[Stmt]) -> EvalResult<()> {
        for stmt in stmts {
            self.exec_stmt(stmt)?;
        }
        Ok(())
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> EvalResult<()> {
        match stmt {
            Stmt::VarDecl(vd) => {
                let value = self.eval_expr(&vd.init)?;
                self.table.define(vd.name.lexeme.clone(), value);
                Ok(())
            }
            Stmt::Assign(a) => self.exec_assign(a),
            Stmt::Call(expr) => self.eval_expr(expr).map(|_| ()),
            Stmt::Return(r) => {
                let value = self.eval_expr(&r.value)?;
                Err(Flow::Return(value))
            }
            Stmt::If(i) => self.exec_if(i),
            Stmt::While(w) => self.exec_while(w),
            Stmt::For(f) => self.exec_for(f),
            Stmt::Try(t) => self.exec_try(t),
            Stmt::Throw(t) => self.exec_throw(t),
        }
    }

    fn exec_assign(&mut self, assign: &Assign) -> EvalResult<()> {
        let value = self.eval_expr(&assign.value)?;
        if assign.path.len() == 1 {
            self.table.assign(&assign.path[0].lexeme, value);
            return Ok(());
        }

        let head = &assign.path[0];
        let mut obj_id = self.object_id_of(head)?;
        for segment in &assign.path[1..assign.path.len() - 1] {
            obj_id = self.field_object_id(obj_id, segment)?;
        }
        let last = assign.path.last().expect("path is non-empty");
        if let Some(obj) = self.heap.get_mut(obj_id) {
            obj.fields.insert(last.lexeme.clone(), value);
        }
        Ok(())
    }

    fn object_id_of(&self, name: &Token) -> EvalResult<u64> {
        match self.table.lookup(&name.lexeme) {
            Some(Value::Object(id)) => Ok(*id),
            Some(Value::Nil) | None => Err(RuntimeError::generic(
                format!("'{}' is nil", name.lexeme),
                name.position(),
            )
            .into()),
            Some(_) => unreachable!("type checker guarantees a record-typed path head"),
        }
    }

    fn field_object_id(&self, obj_id: u64, segment: &Token) -> EvalResult<u64> {
        match self.heap.get(obj_id).and_then(|o| o.fields.get(&segment.lexeme)) {
            Some(Value::Object(id)) => Ok(*id),
            Some(Value::Nil) | None => Err(RuntimeError::generic(
                format!("field '{}' is nil", segment.lexeme),
                segment.position(),
            )
            .into()),
            Some(_) => unreachable!("type checker guarantees a record-typed field"),
        }
    }

    fn exec_if(&mut self, i: &IfStmt) -> EvalResult<()> {
        if self.eval_expr(&i.primary.condition)?.as_bool() {
            return self.in_scope(|me| me.exec_stmts(&i.primary.body));
        }
        for branch in &i.elseifs {
            if self.eval_expr(&branch.condition)?.as_bool() {
                return self.in_scope(|me| me.exec_stmts(&branch.body));
            }
        }
        if let Some(else_body) = &i.else_body {
            return self.in_scope(|me| me.exec_stmts(else_body));
        }
        Ok(())
    }

    fn exec_while(&mut self, w: &WhileStmt) -> EvalResult<()> {
        while self.eval_expr(&w.condition)?.as_bool() {
            self.in_scope(|me| me.exec_stmts(&w.body))?;
        }
        Ok(())
    }

    fn exec_for(&mut self, f: &ForStmt) -> EvalResult<()> {
        let start = self.eval_expr(&f.start)?.as_int();
        let end = self.eval_expr(&f.end)?.as_int();
        self.in_scope(|me| {
            me.table.define(f.var.lexeme.clone(), Value::Int(start));
            let mut i = start;
            while i < end {
                me.table.assign(&f.var.lexeme, Value::Int(i));
                me.in_scope(|me2| me2.exec_stmts(&f.body))?;
                i += 1;
            }
            Ok(())
        })
    }

    fn exec_try(&mut self, t: &TryStmt) -> EvalResult<()> {
        let result = self.in_scope(|me| me.exec_stmts(&t.body));
        match result {
            Ok(()) => Ok(()),
            Err(Flow::Return(value)) => Err(Flow::Return(value)),
            Err(Flow::Thrown(thrown)) => {
                if let CatchMatcher::Expr(expr) = &t.catch.matcher {
                    let expected = self.eval_expr(expr)?;
                    if expected == thrown.value {
                        return self.in_scope(|me| me.exec_stmts(&t.catch.body));
                    }
                }
                Err(Flow::Thrown(thrown))
            }
            Err(Flow::Error(err)) => {
                if let CatchMatcher::ErrorKind(name) = &t.catch.matcher {
                    if err.kind.catch_name() == Some(name.lexeme.as_str()) {
                        return self.in_scope(|me| me.exec_stmts(&t.catch.body));
                    }
                }
                Err(Flow::Error(err))
            }
        }
    }

    fn exec_throw(&mut self, t: &ThrowStmt) -> EvalResult<()> {
        let value = self.eval_expr(&t.value)?;
        Err(Flow::Thrown(Thrown {
            value,
            position: t.keyword.position(),
        }))
    }

    // --- expressions --------------------------------------------------------

    fn eval_expr(&mut self, expr: &Expr) -> EvalResult<Value> {
        match &expr.kind {
            ExprKind::Not(inner) => Ok(Value::Bool(!self.eval_expr(inner)?.as_bool())),
            ExprKind::Neg(inner) => match self.eval_expr(inner)? {
                Value::Int(n) => Ok(Value::Int(-n)),
                Value::Double(d) => Ok(Value::Double(-d)),
                other => unreachable!("type checker guarantees a numeric operand, found {other:?}"),
            },
            ExprKind::Primary(Primary::Paren(inner)) => self.eval_expr(inner),
            ExprKind::Primary(Primary::RValue(rvalue)) => {
                self.eval_rvalue(rvalue, expr.token.position())
            }
            ExprKind::Binary {
                left,
                op,
                op_token,
                right,
            } => {
                let l = self.eval_expr(left)?;
                let r = self.eval_expr(right)?;
                self.eval_binary(*op, l, r, op_token.position())
            }
        }
    }

    fn eval_rvalue(&mut self, rvalue: &RValue, pos: Position) -> EvalResult<Value> {
        match rvalue {
            RValue::IntLit(v) => Ok(Value::Int(*v)),
            RValue::DoubleLit(v) => Ok(Value::Double(*v)),
            RValue::CharLit(v) => Ok(Value::Char(*v)),
            RValue::StringLit(v) => Ok(Value::String(v.clone())),
            RValue::BoolLit(v) => Ok(Value::Bool(*v)),
            RValue::Nil => Ok(Value::Nil),
            RValue::New(name) => self.eval_new(name),
            RValue::Call { callee, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval_expr(arg)?);
                }
                if is_builtin(&callee.lexeme) {
                    self.call_builtin(&callee.lexeme, &values, pos)
                } else {
                    self.call_function(&callee.lexeme, values, pos)
                }
            }
            RValue::Path(path) => self.eval_path(path),
        }
    }

    fn eval_new(&mut self, name: &Token) -> EvalResult<Value> {
        let decl = self
            .types
            .get(&name.lexeme)
            .cloned()
            .expect("type checker guarantees a declared type");
        let mut fields = HashMap::with_capacity(decl.fields.len());
        for field in &decl.fields {
            let value = self.eval_expr(&field.init)?;
            fields.insert(field.name.lexeme.clone(), value);
        }
        let id = self.heap.allocate(name.lexeme.clone(), fields);
        Ok(Value::Object(id))
    }

    fn eval_path(&mut self, path: &[Token]) -> EvalResult<Value> {
        let head = &path[0];
        let mut value = self
            .table
            .lookup(&head.lexeme)
            .cloned()
            .expect("type checker guarantees the variable is defined");
        for segment in &path[1..] {
            let obj_id = match value {
                Value::Object(id) => id,
                Value::Nil => {
                    return Err(RuntimeError::generic(
                        format!("field '{}' accessed on nil", segment.lexeme),
                        segment.position(),
                    )
                    .into())
                }
                _ => unreachable!("type checker guarantees a record-typed path segment"),
            };
            value = self
                .heap
                .get(obj_id)
                .and_then(|o| o.fields.get(&segment.lexeme))
                .cloned()
                .expect("type checker guarantees the field exists");
        }
        Ok(value)
    }

    fn eval_binary(
        &mut self,
        op: crate::ast::BinOp,
        l: Value,
        r: Value,
        pos: Position,
    ) -> EvalResult<Value> {
        use crate::ast::BinOp::*;

        match op {
            Add => match (&l, &r) {
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
                (Value::Double(a), Value::Double(b)) => Ok(Value::Double(a + b)),
                (Value::Char(_) | Value::String(_), Value::Char(_) | Value::String(_)) => {
                    Ok(Value::String(format!("{}{}", l.display_string(), r.display_string())))
                }
                _ => unreachable!("type checker guarantees matching '+' operands"),
            },
            Sub => arith(l, r, |a, b| a - b, |a, b| a - b),
            Mul => arith(l, r, |a, b| a * b, |a, b| a * b),
            Div => match (&l, &r) {
                (Value::Int(_), Value::Int(0)) | (Value::Double(_), Value::Double(0.0)) => {
                    Err(RuntimeError::zero_division(pos).into())
                }
                _ => arith(l, r, |a, b| a / b, |a, b| a / b),
            },
            Mod => match (l, r) {
                (Value::Int(_), Value::Int(0)) => Err(RuntimeError::zero_division(pos).into()),
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a % b)),
                _ => unreachable!("type checker guarantees int operands for '%'"),
            },
            Lt => compare(l, r, |o| o.is_lt()),
            Le => compare(l, r, |o| o.is_le()),
            Gt => compare(l, r, |o| o.is_gt()),
            Ge => compare(l, r, |o| o.is_ge()),
            Eq => Ok(Value::Bool(l == r)),
            Ne => Ok(Value::Bool(l != r)),
            And => Ok(Value::Bool(l.as_bool() && r.as_bool())),
            Or => Ok(Value::Bool(l.as_bool() || r.as_bool())),
        }
    }

    // --- built-ins ------------------------------------------------------------

    fn call_builtin(&mut self, name: &str, args: &[Value], pos: Position) -> EvalResult<Value> {
        match name {
            "print" => {
                let rendered = render_escapes(&args[0].display_string());
                self.stdout
                    .write_all(rendered.as_bytes())
                    .map_err(|e| RuntimeError::generic(e.to_string(), pos))?;
                Ok(Value::Nil)
            }
            "read" => Ok(Value::String(self.read_token(pos)?)),
            "stoi" => args[0]
                .display_string()
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| RuntimeError::generic("'stoi' expects an integer string", pos).into()),
            "itos" => Ok(Value::String(args[0].as_int().to_string())),
            "stod" => args[0]
                .display_string()
                .trim()
                .parse::<f64>()
                .map(Value::Double)
                .map_err(|_| RuntimeError::generic("'stod' expects a double string", pos).into()),
            "dtos" => match &args[0] {
                Value::Double(d) => Ok(Value::String(d.to_string())),
                other => unreachable!("type checker guarantees a double, found {other:?}"),
            },
            "get" => {
                let index = args[0].as_int();
                let s = args[1].display_string();
                let index = usize::try_from(index).ok();
                match index.and_then(|i| s.chars().nth(i)) {
                    Some(c) => Ok(Value::Char(c)),
                    None => Err(RuntimeError::index_out_of_bounds(pos).into()),
                }
            }
            "length" => Ok(Value::Int(args[0].display_string().chars().count() as i64)),
            other => unreachable!("'{other}' is not a registered builtin"),
        }
    }

    fn read_token(&mut self, pos: Position) -> EvalResult<String> {
        let mut token = String::new();
        loop {
            let buf = self
                .stdin
                .fill_buf()
                .map_err(|e| RuntimeError::generic(e.to_string(), pos))?;
            if buf.is_empty() {
                break;
            }
            let mut consumed = 0;
            let mut done = false;
            for &byte in buf {
                consumed += 1;
                let c = byte as char;
                if c.is_whitespace() {
                    if !token.is_empty() {
                        done = true;
                        break;
                    }
                } else {
                    token.push(c);
                }
            }
            self.stdin.consume(consumed);
            if done {
                break;
            }
        }
        Ok(token)
    }
}

fn is_builtin(name: &str) -> bool {
    matches!(
        name,
        "print" | "read" | "stoi" | "itos" | "stod" | "dtos" | "get" | "length"
    )
}

fn render_escapes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                Some('n') => {
                    out.push('\n');
                    chars.next();
                    continue;
                }
                Some('t') => {
                    out.push('\t');
                    chars.next();
                    continue;
                }
                _ => {}
            }
        }
        out.push(c);
    }
    out
}

fn arith(
    l: Value,
    r: Value,
    int_op: impl Fn(i64, i64) -> i64,
    double_op: impl Fn(f64, f64) -> f64,
) -> EvalResult<Value> {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(int_op(a, b))),
        (Value::Double(a), Value::Double(b)) => Ok(Value::Double(double_op(a, b))),
        _ => unreachable!("type checker guarantees matching numeric operands"),
    }
}

fn compare(l: Value, r: Value, test: impl Fn(std::cmp::Ordering) -> bool) -> EvalResult<Value> {
    let ordering = match (l, r) {
        (Value::Int(a), Value::Int(b)) => a.cmp(&b),
        (Value::Double(a), Value::Double(b)) => {
            a.partial_cmp(&b).expect("type checker guarantees non-NaN numeric operands")
        }
        _ => unreachable!("type checker guarantees matching numeric operands"),
    };
    Ok(Value::Bool(test(ordering)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use crate::typechecker::Typechecker;
    use std::io::Cursor;

    fn run(src: &str, stdin: &str) -> (i64, String) {
        let tokens = Lexer::new(src).tokenize().unwrap();
        let program = Parser::new(tokens).parse_program().unwrap();
        Typechecker::new().check_program(&program).unwrap();

        let mut stdout = Vec::new();
        let code = {
            let mut interp = Interpreter::new(&program, Cursor::new(stdin.as_bytes()), &mut stdout);
            interp.run().unwrap()
        };
        (code, String::from_utf8(stdout).unwrap())
    }

    #[test]
    fn prints_and_returns_exit_code() {
        let (code, out) = run(
            r#"fun int main() print("hello") return 7 end"#,
            "",
        );
        assert_eq!(code, 7);
        assert_eq!(out, "hello");
    }

    #[test]
    fn print_renders_escape_sequences() {
        let (_, out) = run(r#"fun int main() print("a\nb") return 0 end"#, "");
        assert_eq!(out, "a\nb");
    }

    #[test]
    fn record_field_mutation_is_visible() {
        let (code, _) = run(
            "type P var x: int = 0 end fun int main() var p = new P p.x = 41 p.x = p.x + 1 return p.x end",
            "",
        );
        assert_eq!(code, 42);
    }

    #[test]
    fn for_loop_is_start_inclusive_end_exclusive() {
        let (code, _) = run(
            "fun int main() var total = 0 for i = 0 to 5 do total = total + i end return total end",
            "",
        );
        assert_eq!(code, 10);
    }

    #[test]
    fn division_by_zero_is_catchable() {
        let (code, _) = run(
            "fun int main() var x = 0 try x = 1 / 0 catch (ZeroDivision) x = 99 end return x end",
            "",
        );
        assert_eq!(code, 99);
    }

    #[test]
    fn uncaught_throw_propagates_to_top_level() {
        let tokens = Lexer::new("fun int main() throw 1 return 0 end").tokenize().unwrap();
        let program = Parser::new(tokens).parse_program().unwrap();
        Typechecker::new().check_program(&program).unwrap();
        let mut stdout = Vec::new();
        let mut interp = Interpreter::new(&program, Cursor::new(&b""[..]), &mut stdout);
        assert!(matches!(interp.run(), Err(Flow::Thrown(_))));
    }

    #[test]
    fn read_returns_whitespace_delimited_token() {
        let (code, _) = run(
            "fun int main() var s = read() return length(s) end",
            "  hello world",
        );
        assert_eq!(code, 5);
    }

    #[test]
    fn recursive_function_calls_use_global_scope_chain() {
        let (code, _) = run(
            "fun int fact(n: int) if n <= 1 then return 1 end return n * fact(n - 1) end fun int main() var n = 5 return fact(n) end",
            "",
        );
        assert_eq!(code, 120);
    }

    #[test]
    fn get_out_of_bounds_is_catchable() {
        let (code, _) = run(
            "fun int main() var caught = 0 var c = 'x' try c = get(10, \"hi\") catch (IndexOutOfBounds) caught = 1 end return caught end",
            "",
        );
        assert_eq!(code, 1);
    }
}
