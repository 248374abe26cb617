// ABOUTME: End-to-end tests running full Lox programs through the Lox driver

use lox_interpreter::interpreter::Output;
use lox_interpreter::lox::Lox;
use std::cell::RefCell;
use std::rc::Rc;

fn run(src: &str) -> (String, Lox) {
    let buffer = Rc::new(RefCell::new(Vec::<u8>::new()));
    let output: Output = buffer.clone();
    let mut lox = Lox::new(output);
    lox.run_source(src);
    (String::from_utf8_lossy(&buffer.borrow()).into_owned(), lox)
}

#[test]
fn closures_capture_by_environment() {
    let (out, lox) = run(
        r#"
        fun makeCounter(){ var i = 0; fun count(){ i = i+1; print i; } return count; }
        var c = makeCounter(); c(); c();
        "#,
    );
    assert!(!lox.had_error());
    assert!(!lox.had_runtime_error());
    assert_eq!(out, "1\n2\n");
}

#[test]
fn resolver_pins_binding_at_definition_site() {
    let (out, lox) = run(
        r#"
        var a = "global";
        { fun show(){ print a; } show(); var a = "local"; show(); }
        "#,
    );
    assert!(!lox.had_error());
    assert_eq!(out, "global\nglobal\n");
}

#[test]
fn inheritance_and_super_dispatch_through_grandparent() {
    let (out, lox) = run(
        r#"
        class A { m(){ return "A"; } }
        class B < A { m(){ return "B"; } test(){ return super.m(); } }
        class C < B {}
        print C().test();
        "#,
    );
    assert!(!lox.had_error());
    assert!(!lox.had_runtime_error());
    assert_eq!(out, "A\n");
}

#[test]
fn getter_property_reads_like_a_field() {
    let (out, lox) = run(
        r#"
        class Circle { init(r){ this.r = r; } area { return 3*this.r*this.r; } }
        print Circle(2).area;
        "#,
    );
    assert!(!lox.had_error());
    assert!(!lox.had_runtime_error());
    assert_eq!(out, "12\n");
}

#[test]
fn for_desugar_with_break() {
    let (out, lox) = run("for (var i=0; i<5; i=i+1) { if (i==3) break; print i; }");
    assert!(!lox.had_error());
    assert_eq!(out, "0\n1\n2\n");
}

#[test]
fn arity_mismatch_reports_a_runtime_error() {
    let (_, lox) = run("fun f(a,b){} f(1);");
    assert!(!lox.had_error());
    assert!(lox.had_runtime_error());
}

#[test]
fn divide_by_zero_is_a_runtime_error() {
    let (_, lox) = run("print 1 / 0;");
    assert!(lox.had_runtime_error());
}

#[test]
fn zero_and_empty_string_are_truthy() {
    let (out, lox) = run(r#"print 0 ? "yes" : "no"; print "" ? "yes" : "no";"#);
    assert!(!lox.had_error());
    assert!(!lox.had_runtime_error());
    assert_eq!(out, "yes\nyes\n");
}

#[test]
fn nil_and_false_are_falsey() {
    let (out, lox) = run(r#"print nil ? "yes" : "no"; print false ? "yes" : "no";"#);
    assert!(!lox.had_error());
    assert_eq!(out, "no\nno\n");
}

#[test]
fn string_concatenation_governed_by_left_operand() {
    let (out, lox) = run(r#"print "a" + 1;"#);
    assert!(!lox.had_error());
    assert!(!lox.had_runtime_error());
    assert_eq!(out, "a1\n");
}

#[test]
fn number_plus_string_is_a_runtime_error() {
    let (_, lox) = run(r#"print 1 + "a";"#);
    assert!(lox.had_runtime_error());
}

#[test]
fn nine_parameters_is_a_static_error_eight_is_fine() {
    let nine_params = (0..9).map(|i| format!("p{i}")).collect::<Vec<_>>().join(", ");
    let (_, lox) = run(&format!("fun f({nine_params}) {{}}"));
    assert!(lox.had_error());

    let eight_params = (0..8).map(|i| format!("p{i}")).collect::<Vec<_>>().join(", ");
    let eight_args = (0..8).map(|i| i.to_string()).collect::<Vec<_>>().join(", ");
    let (out, lox) = run(&format!(
        "fun f({eight_params}) {{ return p7; }} print f({eight_args});"
    ));
    assert!(!lox.had_error());
    assert!(!lox.had_runtime_error());
    assert_eq!(out, "7\n");
}

#[test]
fn return_from_init_yields_this_return_with_value_is_static_error() {
    let (out, lox) = run(
        r#"
        class Box { init(v) { this.v = v; return; } }
        print Box(5).v;
        "#,
    );
    assert!(!lox.had_error());
    assert_eq!(out, "5\n");

    let (_, lox) = run("class C { init() { return 1; } }");
    assert!(lox.had_error());
}

#[test]
fn lambda_expression_usable_as_assignment_rhs() {
    let (out, lox) = run("var add = fun (a, b) { return a + b; }; print add(2, 3);");
    assert!(!lox.had_error());
    assert!(!lox.had_runtime_error());
    assert_eq!(out, "5\n");
}

#[test]
fn static_class_method_binds_this_to_the_class_itself() {
    let (out, lox) = run(
        r#"
        class Math { class square(n) { return n * n; } }
        print Math.square(5);
        "#,
    );
    assert!(!lox.had_error());
    assert_eq!(out, "25\n");
}

#[test]
fn undefined_variable_read_is_a_runtime_error() {
    let (_, lox) = run("print nonexistent;");
    assert!(lox.had_runtime_error());
}

#[test]
fn globals_persist_across_repl_lines_within_one_session() {
    let buffer = Rc::new(RefCell::new(Vec::<u8>::new()));
    let output: Output = buffer.clone();
    let mut lox = Lox::new(output);
    lox.run_source("var x = 10;");
    lox.run_source("x = x + 5; print x;");
    assert!(!lox.had_error());
    assert_eq!(String::from_utf8_lossy(&buffer.borrow()).into_owned(), "15\n");
}
