// ABOUTME: Tree-walking evaluator: executes the resolved AST against a live environment chain

use crate::env::Environment;
use crate::error::RuntimeError;
use crate::expr::{Expr, ExprId, LiteralValue};
use crate::stmt::{ClassDecl, FunctionDecl, Stmt};
use crate::token::{Token, TokenKind};
use crate::value::{Callable, Instance, LoxClass, LoxFunction, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

/// Non-local control flow threaded through evaluation as the `Err` arm of
/// every statement/expression result. `?` does the unwinding; `Call`
/// intercepts `Return`, `While` intercepts `Break`, and `interpret` is the
/// only place a bare `Error` is allowed to surface.
pub enum Signal {
    Return(Value),
    Break,
    Error(RuntimeError),
}

impl From<RuntimeError> for Signal {
    fn from(e: RuntimeError) -> Self {
        Signal::Error(e)
    }
}

type EvalResult<T> = Result<T, Signal>;

/// Where `print` statements and REPL value echoes go. Defaults to real
/// stdout; tests swap in an in-memory buffer to assert on output.
pub type Output = Rc<RefCell<dyn std::io::Write>>;

pub fn stdout_sink() -> Output {
    Rc::new(RefCell::new(std::io::stdout()))
}

pub struct Interpreter {
    pub globals: Rc<Environment>,
    environment: Rc<Environment>,
    locals: HashMap<ExprId, usize>,
    output: Output,
}

impl Interpreter {
    pub fn new(globals: Rc<Environment>, locals: HashMap<ExprId, usize>, output: Output) -> Self {
        Interpreter {
            environment: globals.clone(),
            globals,
            locals,
            output,
        }
    }

    pub fn define_global(&self, name: &str, value: Value) {
        self.globals.define(name.to_string(), value);
    }

    /// Runs a whole program. A `Return`/`Break` escaping to this point would
    /// mean the resolver failed to reject a top-level `return`/`break`, which
    /// it always does before this is ever called.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<(), RuntimeError> {
        for stmt in statements {
            match self.execute(stmt) {
                Ok(()) => {}
                Err(Signal::Error(e)) => return Err(e),
                Err(Signal::Return(_)) | Err(Signal::Break) => {
                    unreachable!("resolver guarantees return/break never escape to top level")
                }
            }
        }
        Ok(())
    }

    fn execute(&mut self, stmt: &Stmt) -> EvalResult<()> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(())
            }
            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                let _ = writeln!(self.output.borrow_mut(), "{value}");
                Ok(())
            }
            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(e) => self.evaluate(e)?,
                    None => Value::Nil,
                };
                self.environment.define(name.lexeme.clone(), value);
                Ok(())
            }
            Stmt::Block(statements) => {
                let scope = Environment::with_parent(self.environment.clone());
                self.execute_block(statements, scope)
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(branch) = else_branch {
                    self.execute(branch)
                } else {
                    Ok(())
                }
            }
            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute(body) {
                        Ok(()) => {}
                        Err(Signal::Break) => break,
                        Err(other) => return Err(other),
                    }
                }
                Ok(())
            }
            Stmt::Break { .. } => Err(Signal::Break),
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(e) => self.evaluate(e)?,
                    None => Value::Nil,
                };
                Err(Signal::Return(value))
            }
            Stmt::Function(decl) => {
                let function = LoxFunction::new(decl.clone(), self.environment.clone(), false);
                self.environment
                    .define(decl.name.lexeme.clone(), Value::Callable(Callable::Function(function)));
                Ok(())
            }
            Stmt::Class(decl) => self.execute_class(decl),
        }
    }

    /// Replaces the current environment with `scope`, runs `statements`, and
    /// restores the previous environment on every exit path (normal, error,
    /// or non-local control flow) so closures formed inside never observe a
    /// scope that outlived its block.
    pub fn execute_block(&mut self, statements: &[Stmt], scope: Rc<Environment>) -> EvalResult<()> {
        let previous = std::mem::replace(&mut self.environment, scope);
        let result = statements.iter().try_for_each(|s| self.execute(s));
        self.environment = previous;
        result
    }

    fn execute_class(&mut self, decl: &Rc<ClassDecl>) -> EvalResult<()> {
        self.environment.define(decl.name.lexeme.clone(), Value::Nil);

        let superclass = match &decl.superclass {
            Some(expr) => {
                let value = self.evaluate(expr)?;
                match value {
                    Value::Callable(Callable::Class(class)) => Some(class),
                    _ => {
                        let line = superclass_line(expr);
                        return Err(Signal::Error(RuntimeError::new(line, "Superclass must be a class.")));
                    }
                }
            }
            None => None,
        };

        let method_scope = match &superclass {
            Some(class) => {
                let scope = Environment::with_parent(self.environment.clone());
                scope.define("super".to_string(), Value::Callable(Callable::Class(class.clone())));
                scope
            }
            None => self.environment.clone(),
        };

        let build = |decls: &[Rc<FunctionDecl>], initializers_allowed: bool| -> HashMap<String, Rc<LoxFunction>> {
            decls
                .iter()
                .map(|d| {
                    let is_initializer = initializers_allowed && d.name.lexeme == "init";
                    (d.name.lexeme.clone(), LoxFunction::new(d.clone(), method_scope.clone(), is_initializer))
                })
                .collect()
        };

        let class = Rc::new(LoxClass {
            name: decl.name.lexeme.clone(),
            superclass,
            methods: build(&decl.methods, true),
            properties: build(&decl.properties, false),
            class_methods: build(&decl.class_methods, false),
        });

        self.environment
            .assign(&decl.name.lexeme, Value::Callable(Callable::Class(class)), decl.name.line)
            .map_err(Signal::Error)
    }

    fn evaluate(&mut self, expr: &Expr) -> EvalResult<Value> {
        match expr {
            Expr::Literal { value } => Ok(literal_value(value)),
            Expr::Grouping { expression } => self.evaluate(expression),
            Expr::Variable { name } => self.look_up_variable(name, expr.id()).map_err(Signal::Error),
            Expr::Assign { name, value } => {
                let value = self.evaluate(value)?;
                match self.locals.get(&expr.id()) {
                    Some(&distance) => self.environment.assign_at(distance, &name.lexeme, value.clone()),
                    None => self
                        .globals
                        .assign(&name.lexeme, value.clone(), name.line)
                        .map_err(Signal::Error)?,
                }
                Ok(value)
            }
            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),
            Expr::Binary { left, operator, right } => self.evaluate_binary(left, operator, right),
            Expr::Logical { left, operator, right } => self.evaluate_logical(left, operator, right),
            Expr::Ternary {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.evaluate(then_branch)
                } else {
                    self.evaluate(else_branch)
                }
            }
            Expr::Call { callee, paren, arguments } => {
                let callee = self.evaluate(callee)?;
                let mut args = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    args.push(self.evaluate(arg)?);
                }
                self.call_value(callee, args, paren)
            }
            Expr::Get { object, name } => self.evaluate_get(object, name),
            Expr::Set { object, name, value } => self.evaluate_set(object, name, value),
            Expr::This { keyword } => self.look_up_synthetic(keyword, expr.id()).map_err(Signal::Error),
            Expr::Super { keyword, method } => self.evaluate_super(keyword, method, expr.id()),
            Expr::Lambda { params, body } => Ok(self.evaluate_lambda(params, body)),
        }
    }

    fn look_up_variable(&self, name: &Token, expr_id: ExprId) -> Result<Value, RuntimeError> {
        match self.locals.get(&expr_id) {
            Some(&distance) => Ok(self.environment.get_at(distance, &name.lexeme)),
            None => self.globals.get(&name.lexeme, name.line),
        }
    }

    fn look_up_synthetic(&self, keyword: &Token, expr_id: ExprId) -> Result<Value, RuntimeError> {
        match self.locals.get(&expr_id) {
            Some(&distance) => Ok(self.environment.get_at(distance, &keyword.lexeme)),
            None => Err(RuntimeError::new(
                keyword.line,
                format!("Undefined variable '{}'.", keyword.lexeme),
            )),
        }
    }

    fn evaluate_unary(&mut self, operator: &Token, right: &Expr) -> EvalResult<Value> {
        let right = self.evaluate(right)?;
        match operator.kind {
            TokenKind::Bang => Ok(Value::Bool(!right.is_truthy())),
            TokenKind::Minus => Ok(Value::Number(-number_operand(&right, operator.line)?)),
            _ => unreachable!("parser only produces Bang/Minus unary operators"),
        }
    }

    fn evaluate_binary(&mut self, left: &Expr, operator: &Token, right: &Expr) -> EvalResult<Value> {
        let left = self.evaluate(left)?;
        let right = self.evaluate(right)?;
        let line = operator.line;
        match operator.kind {
            TokenKind::Plus => match (&left, &right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::String(_), _) => Ok(Value::string(format!("{left}{right}"))),
                _ => Err(Signal::Error(RuntimeError::new(
                    line,
                    "Operands must be two numbers, or the left operand must be a string.",
                ))),
            },
            TokenKind::Minus => Ok(Value::Number(number_operand(&left, line)? - number_operand(&right, line)?)),
            TokenKind::Star => Ok(Value::Number(number_operand(&left, line)? * number_operand(&right, line)?)),
            TokenKind::Slash => {
                let a = number_operand(&left, line)?;
                let b = number_operand(&right, line)?;
                if b == 0.0 {
                    return Err(Signal::Error(RuntimeError::new(line, "Division by zero.")));
                }
                Ok(Value::Number(a / b))
            }
            TokenKind::Greater => Ok(Value::Bool(number_operand(&left, line)? > number_operand(&right, line)?)),
            TokenKind::GreaterEqual => Ok(Value::Bool(number_operand(&left, line)? >= number_operand(&right, line)?)),
            TokenKind::Less => Ok(Value::Bool(number_operand(&left, line)? < number_operand(&right, line)?)),
            TokenKind::LessEqual => Ok(Value::Bool(number_operand(&left, line)? <= number_operand(&right, line)?)),
            TokenKind::EqualEqual => Ok(Value::Bool(left == right)),
            TokenKind::BangEqual => Ok(Value::Bool(left != right)),
            _ => unreachable!("parser only produces arithmetic/comparison/equality binary operators"),
        }
    }

    fn evaluate_logical(&mut self, left: &Expr, operator: &Token, right: &Expr) -> EvalResult<Value> {
        let left = self.evaluate(left)?;
        match operator.kind {
            TokenKind::Or if left.is_truthy() => Ok(left),
            TokenKind::And if !left.is_truthy() => Ok(left),
            _ => self.evaluate(right),
        }
    }

    fn evaluate_lambda(&mut self, params: &[Token], body: &[Stmt]) -> Value {
        let name = Token::new(TokenKind::Fun, "lambda", crate::token::Literal::None, params.first().map(|p| p.line).unwrap_or(0));
        let decl = Rc::new(FunctionDecl {
            name,
            params: params.to_vec(),
            body: body.to_vec(),
            is_property: false,
        });
        Value::Callable(Callable::Function(LoxFunction::new(decl, self.environment.clone(), false)))
    }

    fn call_value(&mut self, callee: Value, args: Vec<Value>, paren: &Token) -> EvalResult<Value> {
        let Value::Callable(callable) = callee else {
            return Err(Signal::Error(RuntimeError::new(paren.line, "Can only call functions and classes.")));
        };
        let arity = callable.arity();
        if args.len() != arity {
            return Err(Signal::Error(RuntimeError::new(
                paren.line,
                format!("Expected {arity} arguments but got {}.", args.len()),
            )));
        }
        match callable {
            Callable::Function(f) => self.call_function(&f, args),
            Callable::Class(c) => self.instantiate(&c, args),
            Callable::Native(n) => n.call(self, args).map_err(Signal::Error),
        }
    }

    fn call_function(&mut self, function: &Rc<LoxFunction>, args: Vec<Value>) -> EvalResult<Value> {
        let scope = Environment::with_parent(function.closure.clone());
        for (param, arg) in function.declaration.params.iter().zip(args) {
            scope.define(param.lexeme.clone(), arg);
        }
        match self.execute_block(&function.declaration.body, scope) {
            Ok(()) => Ok(if function.is_initializer {
                function.closure.get_at(0, "this")
            } else {
                Value::Nil
            }),
            Err(Signal::Return(value)) => Ok(if function.is_initializer {
                function.closure.get_at(0, "this")
            } else {
                value
            }),
            Err(other) => Err(other),
        }
    }

    fn instantiate(&mut self, class: &Rc<LoxClass>, args: Vec<Value>) -> EvalResult<Value> {
        let instance = Instance::new(class.clone());
        if let Some(initializer) = class.find_method("init") {
            let bound = initializer.bind(instance.clone());
            self.call_function(&bound, args)?;
        }
        Ok(Value::Instance(instance))
    }

    fn evaluate_get(&mut self, object: &Expr, name: &Token) -> EvalResult<Value> {
        let object = self.evaluate(object)?;
        match object {
            Value::Instance(instance) => {
                if let Some(value) = instance.fields.borrow().get(&name.lexeme) {
                    return Ok(value.clone());
                }
                if let Some(method) = instance.class.find_method(&name.lexeme) {
                    return Ok(Value::Callable(Callable::Function(method.bind(instance.clone()))));
                }
                if let Some(property) = instance.class.find_property(&name.lexeme) {
                    let bound = property.bind(instance.clone());
                    return self.call_function(&bound, vec![]);
                }
                Err(Signal::Error(RuntimeError::new(
                    name.line,
                    format!("Undefined property '{}'.", name.lexeme),
                )))
            }
            Value::Callable(Callable::Class(class)) => match class.find_class_method(&name.lexeme) {
                Some(method) => Ok(Value::Callable(Callable::Function(
                    method.bind_this(Value::Callable(Callable::Class(class.clone()))),
                ))),
                None => Err(Signal::Error(RuntimeError::new(
                    name.line,
                    format!("Undefined property '{}'.", name.lexeme),
                ))),
            },
            _ => Err(Signal::Error(RuntimeError::new(name.line, "Only instances have properties."))),
        }
    }

    fn evaluate_set(&mut self, object: &Expr, name: &Token, value: &Expr) -> EvalResult<Value> {
        let object = self.evaluate(object)?;
        let Value::Instance(instance) = object else {
            return Err(Signal::Error(RuntimeError::new(name.line, "Only instances have fields.")));
        };
        let value = self.evaluate(value)?;
        instance.fields.borrow_mut().insert(name.lexeme.clone(), value.clone());
        Ok(value)
    }

    fn evaluate_super(&mut self, keyword: &Token, method: &Token, expr_id: ExprId) -> EvalResult<Value> {
        let distance = *self
            .locals
            .get(&expr_id)
            .unwrap_or_else(|| panic!("resolver always records a depth for a valid 'super' reference"));
        let superclass = self.environment.get_at(distance, "super");
        let Value::Callable(Callable::Class(superclass)) = superclass else {
            panic!("'super' scope always binds a class value");
        };
        let this = self.environment.get_at(distance - 1, "this");
        let Value::Instance(instance) = this else {
            panic!("'this' scope immediately enclosing 'super' always binds an instance");
        };

        match superclass.find_method(&method.lexeme) {
            Some(m) => Ok(Value::Callable(Callable::Function(m.bind(instance)))),
            None => Err(Signal::Error(RuntimeError::new(
                keyword.line,
                format!("Undefined property '{}'.", method.lexeme),
            ))),
        }
    }
}

fn literal_value(value: &LiteralValue) -> Value {
    match value {
        LiteralValue::Number(n) => Value::Number(*n),
        LiteralValue::Str(s) => Value::string(s.clone()),
        LiteralValue::Bool(b) => Value::Bool(*b),
        LiteralValue::Nil => Value::Nil,
    }
}

fn number_operand(value: &Value, line: usize) -> Result<f64, Signal> {
    match value {
        Value::Number(n) => Ok(*n),
        _ => Err(Signal::Error(RuntimeError::new(line, "Operand must be a number."))),
    }
}

/// Best-effort line number for a "Superclass must be a class." diagnostic;
/// superclass references are always parsed as a bare `Expr::Variable`.
fn superclass_line(expr: &Expr) -> usize {
    match expr {
        Expr::Variable { name } => name.line,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::resolver::Resolver;
    use crate::scanner::Scanner;

    fn run(src: &str) -> (String, Result<(), RuntimeError>) {
        let (tokens, scan_errors) = Scanner::new(src).scan_tokens();
        assert!(scan_errors.is_empty(), "scan errors: {scan_errors:?}");
        let (statements, parse_errors) = Parser::new(tokens).parse();
        assert!(parse_errors.is_empty(), "parse errors: {parse_errors:?}");
        let (locals, resolve_errors) = Resolver::new().resolve(&statements);
        assert!(resolve_errors.is_empty(), "resolve errors: {resolve_errors:?}");

        let buffer = Rc::new(RefCell::new(Vec::<u8>::new()));
        let sink: Output = buffer.clone();
        let globals = Environment::new();
        let mut interpreter = Interpreter::new(globals, locals, sink);
        let result = interpreter.interpret(&statements);
        let output = String::from_utf8_lossy(&buffer.borrow()).into_owned();
        (output, result)
    }

    #[test]
    fn arithmetic_and_print() {
        let (out, result) = run("print 1 + 2 * 3;");
        assert!(result.is_ok());
        assert_eq!(out, "7\n");
    }

    #[test]
    fn string_concatenation_stringifies_right_operand() {
        let (out, result) = run("print \"count: \" + 4;");
        assert!(result.is_ok());
        assert_eq!(out, "count: 4\n");
    }

    #[test]
    fn division_by_zero_is_a_runtime_error() {
        let (_, result) = run("print 1 / 0;");
        assert!(result.is_err());
    }

    #[test]
    fn closures_capture_by_environment_not_by_value() {
        let src = r#"
            fun makeCounter() {
                var count = 0;
                fun inc() {
                    count = count + 1;
                    return count;
                }
                return inc;
            }
            var counter = makeCounter();
            print counter();
            print counter();
        "#;
        let (out, result) = run(src);
        assert!(result.is_ok());
        assert_eq!(out, "1\n2\n");
    }

    #[test]
    fn for_loop_desugars_and_break_stops_it() {
        let src = r#"
            var seen = "";
            for (var i = 0; i < 5; i = i + 1) {
                if (i == 3) break;
                seen = seen + i;
            }
            print seen;
        "#;
        let (out, result) = run(src);
        assert!(result.is_ok());
        assert_eq!(out, "012\n");
    }

    #[test]
    fn inheritance_and_super_dispatch() {
        let src = r#"
            class Animal {
                speak() { return "..."; }
            }
            class Dog < Animal {
                speak() { return "Woof, " + super.speak(); }
            }
            print Dog().speak();
        "#;
        let (out, result) = run(src);
        assert!(result.is_ok());
        assert_eq!(out, "Woof, ...\n");
    }

    #[test]
    fn getter_property_is_invoked_without_parens() {
        let src = r#"
            class Circle {
                init(r) { this.r = r; }
                area { return 3.14 * this.r * this.r; }
            }
            print Circle(2).area;
        "#;
        let (out, result) = run(src);
        assert!(result.is_ok());
        assert_eq!(out, "12.56\n");
    }

    #[test]
    fn init_always_returns_this_even_with_explicit_return() {
        let src = r#"
            class Box {
                init(v) { this.v = v; return; }
            }
            var b = Box(5);
            print b.v;
        "#;
        let (out, result) = run(src);
        assert!(result.is_ok());
        assert_eq!(out, "5\n");
    }

    #[test]
    fn calling_a_non_callable_is_a_runtime_error() {
        let (_, result) = run("var x = 5; x();");
        assert!(result.is_err());
    }

    #[test]
    fn arity_mismatch_is_a_runtime_error() {
        let (_, result) = run("fun f(a, b) { return a + b; } print f(1);");
        assert!(result.is_err());
    }

    #[test]
    fn static_class_method_binds_this_to_the_class() {
        let src = r#"
            class Math {
                class square(n) { return n * n; }
            }
            print Math.square(5);
        "#;
        let (out, result) = run(src);
        assert!(result.is_ok());
        assert_eq!(out, "25\n");
    }

    #[test]
    fn ternary_and_truthiness() {
        let (out, result) = run(r#"print 0 == 0 ? "yes" : "no";"#);
        assert!(result.is_ok());
        assert_eq!(out, "yes\n");
    }
}
