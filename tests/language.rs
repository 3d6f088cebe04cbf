use pretty_assertions::assert_eq;

use loxwalk::error::Location;
use loxwalk::{Diagnostic, Lox, OutputBuffer, RunOutcome, RuntimeError, StaticError};

fn session() -> (Lox, OutputBuffer) {
    let output = OutputBuffer::default();
    (Lox::with_output(Box::new(output.clone())), output)
}

/// Run a whole program in a fresh session, returning what it printed and how it ended
fn run(code: &str) -> (String, RunOutcome) {
    let (mut lox, output) = session();
    let outcome = lox.run(code);
    (output.contents(), outcome)
}

fn runtime_error(code: &str) -> RuntimeError {
    let (_, outcome) = run(code);
    assert!(outcome.had_runtime_error, "expected a runtime error from {:?}", code);
    match outcome.diagnostics.as_slice() {
        [Diagnostic::Runtime(error)] => error.clone(),
        other => panic!("expected exactly one runtime error, got {:?}", other),
    }
}

fn static_errors(code: &str) -> Vec<StaticError> {
    let (output, outcome) = run(code);
    assert!(outcome.had_static_error, "expected a static error from {:?}", code);
    assert!(!outcome.had_runtime_error);
    assert_eq!("", output, "nothing may run after a static error");
    outcome
        .diagnostics
        .into_iter()
        .map(|diagnostic| match diagnostic {
            Diagnostic::Static(error) => error,
            Diagnostic::Runtime(error) => panic!("unexpected runtime error {}", error),
        })
        .collect()
}

#[test]
fn arithmetic_precedence() {
    let (output, outcome) = run("print 1 + 2 * 3;");
    assert!(outcome.is_ok());
    assert_eq!("7\n", output);
}

#[test]
fn grouping_and_negation() {
    let (output, _) = run("print -(1 + 2) * 3; print 10 / 4; print !nil;");
    assert_eq!("-9\n2.5\ntrue\n", output);
}

#[test]
fn string_concatenation() {
    let (output, _) = run("print \"foo\" + \"bar\";");
    assert_eq!("foobar\n", output);
}

#[test]
fn mixed_addition_is_a_runtime_error() {
    let error = runtime_error("print 1 + \"a\";");
    assert_eq!(RuntimeError::OperandsNotNumbersOrStrings { line: 1 }, error);
    assert_eq!("Operands must be a numbers or strings.\n[line 1]", error.to_string());
}

#[test]
fn runtime_error_stops_the_program() {
    let (output, outcome) = run("print 1;\nprint -\"x\";\nprint 3;");
    assert_eq!("1\n", output);
    assert_eq!(
        vec![Diagnostic::Runtime(RuntimeError::OperandNotNumber { line: 2 })],
        outcome.diagnostics
    );
}

#[test]
fn zero_is_truthy() {
    let (output, _) = run("if (0) print \"a\"; else print \"b\";");
    assert_eq!("a\n", output);
}

#[test]
fn nil_and_false_are_the_only_falsy_values() {
    let (output, _) = run(
        "if (\"\") print 1; if (nil) print 2; else print 3; if (false) print 4; else print 5;",
    );
    assert_eq!("1\n3\n5\n", output);
}

#[test]
fn equality_does_not_coerce() {
    let (output, _) = run("print 1 == \"1\"; print nil == false; print \"a\" == \"a\"; print nil == nil;");
    assert_eq!("false\nfalse\ntrue\ntrue\n", output);
}

#[test]
fn closures_bind_at_definition() {
    let (output, outcome) = run(
        r#"
var a = "global";
{
  fun showA() { print a; }
  showA();
  var a = "block";
  showA();
}
"#,
    );
    assert!(outcome.is_ok());
    assert_eq!("global\nglobal\n", output);
}

#[test]
fn reading_local_in_own_initializer() {
    let errors = static_errors("var a = 1; { var a = a; }");
    assert_eq!(
        vec![StaticError::new(
            1,
            Location::At("a".to_string()),
            "Can't read local variable in its own initializer."
        )],
        errors
    );
}

#[test]
fn global_self_initializer_reads_the_old_value() {
    let (output, _) = run("var a = 1; var a = a + 1; print a;");
    assert_eq!("2\n", output);
}

#[test]
fn duplicate_local_declaration() {
    let errors = static_errors("{ var a = 1; var a = 2; }");
    assert_eq!(1, errors.len());
    assert_eq!("Already a variable with this name in this scope.", errors[0].message);
}

#[test]
fn top_level_return() {
    let errors = static_errors("return 1;");
    assert_eq!("[line 1] Error at 'return': Can't return from top-level code.", errors[0].to_string());
}

#[test]
fn counter_shares_captured_state() {
    let (output, _) = run(
        r#"
fun makeCounter() {
  var i = 0;
  fun count() {
    i = i + 1;
    print i;
  }
  return count;
}
var counter = makeCounter();
counter();
counter();
"#,
    );
    assert_eq!("1\n2\n", output);
}

#[test]
fn recursion() {
    let (output, _) = run(
        r#"
fun fib(n) {
  if (n < 2) return n;
  return fib(n - 2) + fib(n - 1);
}
print fib(15);
"#,
    );
    assert_eq!("610\n", output);
}

#[test]
fn deep_recursion_does_not_exhaust_the_stack() {
    let (output, outcome) = run(
        r#"
fun countdown(n) {
  if (n > 0) return countdown(n - 1);
  return 0;
}
print countdown(10000);
"#,
    );
    assert!(outcome.is_ok());
    assert_eq!("0\n", output);
}

#[test]
fn function_without_return_yields_nil() {
    let (output, _) = run("fun f() { 1; } print f();");
    assert_eq!("nil\n", output);
}

#[test]
fn arity_is_checked() {
    let too_few = runtime_error("fun f(a) { print a; }\nf();");
    assert_eq!(
        RuntimeError::ArityMismatch {
            expected: 1,
            actual: 0,
            line: 2
        },
        too_few
    );
    assert_eq!("Expected 1 arguments but got 0.\n[line 2]", too_few.to_string());

    let too_many = runtime_error("fun f(a) { print a; }\nf(1, 2);");
    assert_eq!("Expected 1 arguments but got 2.\n[line 2]", too_many.to_string());
}

#[test]
fn calling_a_non_function() {
    assert_eq!(RuntimeError::NotCallable { line: 1 }, runtime_error("\"not a fn\"();"));
}

#[test]
fn undefined_variables() {
    assert_eq!(
        "Undefined variable 'x'.\n[line 1]",
        runtime_error("print x;").to_string()
    );
    assert_eq!(
        RuntimeError::UndefinedVariable {
            name: "y".to_string(),
            line: 2
        },
        runtime_error("var x = 1;\ny = 2;")
    );
    let (output, outcome) = run("var x; print x; x = 3; print x;");
    assert!(outcome.is_ok());
    assert_eq!("nil\n3\n", output);
}

#[test]
fn frame_is_restored_after_error_in_block() {
    let (mut lox, output) = session();
    lox.run("var a = \"global\";");
    let outcome = lox.run("{ var a = \"inner\"; { print a + 1; } }");
    assert!(outcome.had_runtime_error);
    let outcome = lox.run("print a;");
    assert!(outcome.is_ok());
    assert_eq!("global\n", output.contents());
    assert!(lox.interpreter().in_global_scope());
}

#[test]
fn missing_semicolon_reports_exactly_one_error() {
    let errors = static_errors("print 1\nprint 2;");
    assert_eq!(
        vec![StaticError::new(
            2,
            Location::At("print".to_string()),
            "Expect ';' after value."
        )],
        errors
    );
}

#[test]
fn every_statement_error_is_reported() {
    let errors = static_errors("var = 1;\nprint (;\nvar ok = 2;\n1 = 2;");
    let rendered: Vec<String> = errors.iter().map(ToString::to_string).collect();
    assert_eq!(
        vec![
            "[line 1] Error at '=': Expect variable name.".to_string(),
            "[line 2] Error at ';': Expect expression.".to_string(),
            "[line 4] Error at '=': Invalid assignment target.".to_string(),
        ],
        rendered
    );
}

#[test]
fn identifiers_start_with_a_letter() {
    let errors = static_errors("var _a = 1; print _a;");
    assert_eq!(2, errors.len());
    assert_eq!("[line 1] Error: Unexpected character.", errors[0].to_string());
}

#[test]
fn scan_errors_are_static() {
    let errors = static_errors("print \"open;");
    assert_eq!("[line 1] Error: Unterminated string.", errors[0].to_string());
}

#[test]
fn logical_operators_return_the_deciding_operand() {
    let (output, _) = run("print nil or \"a\"; print 1 and 2; print false and missing; print \"x\" or missing;");
    assert_eq!("a\n2\nfalse\nx\n", output);
}

#[test]
fn loops() {
    let (output, _) = run(
        "var i = 0; while (i < 3) { print i; i = i + 1; } for (var j = 0; j < 2; j = j + 1) print j * 10;",
    );
    assert_eq!("0\n1\n2\n0\n10\n", output);
}

#[test]
fn for_loop_variable_is_scoped_to_the_loop() {
    assert_eq!(
        RuntimeError::UndefinedVariable {
            name: "j".to_string(),
            line: 1
        },
        runtime_error("for (var j = 0; j < 1; j = j + 1) {} print j;")
    );
}

#[test]
fn functions_render() {
    let (output, _) = run("fun add(a, b) { return a + b; } print add; print clock; print add(1, 2);");
    assert_eq!("<fn add>\n<native fn>\n3\n", output);
}

#[test]
fn clock_counts_seconds() {
    let (output, _) = run("var t = clock(); print t > 1000000000; print clock() >= t;");
    assert_eq!("true\ntrue\n", output);
}

#[test]
fn prompt_lines_share_globals() {
    let (mut lox, output) = session();
    assert!(lox.run_prompt_line("var a = 40;").is_ok());
    assert!(lox.run_prompt_line("a + 2;").is_ok());
    assert!(lox.run_prompt_line("nil;").is_ok());
    assert!(lox.run_prompt_line("fun twice(x) { return x * 2; }").is_ok());
    assert!(lox.run_prompt_line("twice(a);").is_ok());
    assert_eq!("42\n80\n", output.contents());
}

#[test]
fn static_error_does_not_poison_later_prompt_lines() {
    let (mut lox, output) = session();
    assert!(lox.run_prompt_line("var a = 1;").is_ok());
    assert!(lox.run_prompt_line("var = ;").had_static_error);
    assert!(lox.run_prompt_line("print a;").is_ok());
    assert_eq!("1\n", output.contents());
}

#[test]
fn closures_from_earlier_prompt_lines_still_resolve() {
    let (mut lox, output) = session();
    lox.run_prompt_line("fun make() { var n = 0; fun inc() { n = n + 1; return n; } return inc; }");
    lox.run_prompt_line("var inc = make();");
    lox.run_prompt_line("inc();");
    lox.run_prompt_line("inc();");
    assert_eq!("1\n2\n", output.contents());
}
