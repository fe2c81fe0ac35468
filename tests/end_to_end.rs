//! Black-box end-to-end tests (§8 "End-to-end scenarios"): lex, parse,
//! type-check and interpret a full source string, asserting on captured
//! stdout and exit code. This exercises the public pipeline the same way
//! `src/main.rs` wires it, but in-process against injected `Read`/`Write`
//! handles instead of shelling out to a built binary.

use std::io::Cursor;

use lumen_lang::interpreter::{Flow, Interpreter};
use lumen_lang::lexer::Lexer;
use lumen_lang::parser::Parser;
use lumen_lang::typechecker::Typechecker;

fn run_ok(src: &str, stdin: &str) -> (i64, String) {
    let tokens = Lexer::new(src).tokenize().expect("lex");
    let program = Parser::new(tokens).parse_program().expect("parse");
    Typechecker::new().check_program(&program).expect("type check");

    let mut stdout = Vec::new();
    let code = Interpreter::new(&program, Cursor::new(stdin.as_bytes()), &mut stdout)
        .run()
        .expect("run");
    (code, String::from_utf8(stdout).unwrap())
}

fn run_flow(src: &str, stdin: &str) -> Flow {
    let tokens = Lexer::new(src).tokenize().expect("lex");
    let program = Parser::new(tokens).parse_program().expect("parse");
    Typechecker::new().check_program(&program).expect("type check");

    let mut stdout = Vec::new();
    Interpreter::new(&program, Cursor::new(stdin.as_bytes()), &mut stdout)
        .run()
        .expect_err("expected the program to fail at runtime")
}

#[test]
fn returns_exit_code_with_no_output() {
    let (code, out) = run_ok("fun int main() return 0 end", "");
    assert_eq!(code, 0);
    assert_eq!(out, "");
}

#[test]
fn prints_then_returns() {
    let (code, out) = run_ok(r#"fun int main() print("hi") return 0 end"#, "");
    assert_eq!(code, 0);
    assert_eq!(out, "hi");
}

#[test]
fn arithmetic_on_a_declared_variable() {
    let (code, _) = run_ok("fun int main() var x = 7 return x + 3 end", "");
    assert_eq!(code, 10);
}

#[test]
fn string_plus_char_concatenation() {
    let (code, out) = run_ok(
        r#"fun int main() var s = "ab" + 'c' print(s) return 0 end"#,
        "",
    );
    assert_eq!(code, 0);
    assert_eq!(out, "abc");
}

#[test]
fn division_by_zero_is_a_fatal_runtime_error_when_uncaught() {
    let flow = run_flow("fun int main() var x = 10 / 0 return 0 end", "");
    let err = flow.into_runtime_error();
    assert!(err.message.contains("division by zero"));
}

#[test]
fn record_field_write_then_read() {
    let (code, _) = run_ok(
        "type P var x:int = 0 end fun int main() var p = new P p.x = 5 return p.x end",
        "",
    );
    assert_eq!(code, 5);
}

#[test]
fn zero_division_is_catchable_by_built_in_error_kind() {
    let (code, out) = run_ok(
        r#"fun int main() try var x = 1/0 catch (ZeroDivision) print("caught") end return 0 end"#,
        "",
    );
    assert_eq!(code, 0);
    assert_eq!(out, "caught");
}

#[test]
fn uncaught_throw_reports_as_a_runtime_error() {
    let flow = run_flow("fun int main() throw 42 return 0 end", "");
    let err = flow.into_runtime_error();
    assert!(err.message.contains("42"));
}

#[test]
fn lexer_stage_rejects_malformed_character_literals() {
    let err = Lexer::new("fun int main() var c = '' return 0 end")
        .tokenize()
        .expect_err("empty character literal must fail lexing");
    assert!(err.position.line >= 1);
}

#[test]
fn parser_stage_rejects_a_missing_end_keyword() {
    let tokens = Lexer::new("fun int main() return 0").tokenize().unwrap();
    assert!(Parser::new(tokens).parse_program().is_err());
}

#[test]
fn type_checker_stage_rejects_mismatched_return_type() {
    let tokens = Lexer::new(r#"fun int main() return "oops" end"#)
        .tokenize()
        .unwrap();
    let program = Parser::new(tokens).parse_program().unwrap();
    assert!(Typechecker::new().check_program(&program).is_err());
}

#[test]
fn counted_for_loop_is_start_inclusive_end_exclusive() {
    let (code, _) = run_ok(
        "fun int main() var total = 0 for i = 0 to 4 do total = total + 1 end return total end",
        "",
    );
    assert_eq!(code, 4);
}

#[test]
fn get_out_of_bounds_is_catchable_by_built_in_error_kind() {
    let (code, _) = run_ok(
        r#"fun int main() var caught = 0 var c = 'x' try c = get(99, "hi") catch (IndexOutOfBounds) caught = 1 end return caught end"#,
        "",
    );
    assert_eq!(code, 1);
}
