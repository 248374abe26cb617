// ABOUTME: Static resolver: annotates variable references with lexical depth

use crate::error::StaticError;
use crate::expr::{Expr, ExprId};
use crate::stmt::{ClassDecl, FunctionDecl, Stmt};
use crate::token::Token;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Clone, Copy, PartialEq, Debug)]
enum VarState {
    Declared,
    Defined,
    Assigned,
    Accessed,
    Ignore,
}

struct VarInfo {
    state: VarState,
    token: Token,
}

#[derive(Clone, Copy, PartialEq)]
enum FunctionType {
    None,
    Function,
    Lambda,
    Method,
    Initializer,
    ClassMethod,
}

#[derive(Clone, Copy, PartialEq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

pub struct Resolver {
    scopes: Vec<HashMap<String, VarInfo>>,
    locals: HashMap<ExprId, usize>,
    errors: Vec<StaticError>,
    current_function: FunctionType,
    current_class: ClassType,
    loop_depth: usize,
}

impl Resolver {
    pub fn new() -> Self {
        Resolver {
            scopes: Vec::new(),
            locals: HashMap::new(),
            errors: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
            loop_depth: 0,
        }
    }

    pub fn resolve(mut self, statements: &[Stmt]) -> (HashMap<ExprId, usize>, Vec<StaticError>) {
        self.resolve_stmts(statements);
        (self.locals, self.errors)
    }

    fn error(&mut self, token: &Token, message: impl Into<String>) {
        self.errors.push(StaticError::at(token.line, token.lexeme.clone(), message.into()));
    }

    // ---- scope stack ----

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        if let Some(scope) = self.scopes.pop() {
            for (name, info) in scope {
                match info.state {
                    VarState::Defined => self.error(&info.token, format!("Variable '{name}' defined but never assigned.")),
                    VarState::Assigned => self.error(&info.token, format!("Variable '{name}' assigned to but never accessed.")),
                    VarState::Declared | VarState::Accessed | VarState::Ignore => {}
                }
            }
        }
    }

    fn declare(&mut self, name: &Token) {
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };
        if scope.contains_key(&name.lexeme) {
            self.error(name, "Variable with this name already declared in this scope.");
        }
        scope.insert(
            name.lexeme.clone(),
            VarInfo {
                state: VarState::Declared,
                token: name.clone(),
            },
        );
    }

    fn set_state(&mut self, name: &str, state: VarState) {
        if let Some(scope) = self.scopes.last_mut() {
            if let Some(info) = scope.get_mut(name) {
                info.state = state;
            }
        }
    }

    /// Declares and immediately marks assigned: functions, parameters, and
    /// class names are usable as soon as they are declared.
    fn declare_and_assign(&mut self, name: &Token) {
        self.declare(name);
        self.set_state(&name.lexeme, VarState::Assigned);
    }

    fn declare_ignored(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(
                name.to_string(),
                VarInfo {
                    state: VarState::Ignore,
                    token: Token::new(crate::token::TokenKind::Identifier, name, crate::token::Literal::None, 0),
                },
            );
        }
    }

    /// Resolves a reference, walking the scope stack from innermost outward.
    /// Returns the matched state so callers can enforce read/write rules.
    fn resolve_local(&mut self, expr_id: ExprId, name: &str) -> Option<VarState> {
        let depth = self.scopes.len();
        for (offset, scope) in self.scopes.iter().enumerate().rev() {
            if scope.contains_key(name) {
                self.locals.insert(expr_id, depth - 1 - offset);
                return Some(scope[name].state);
            }
        }
        None
    }

    /// Resolves a read of `name` and transitions its state to `Accessed`,
    /// wherever in the scope stack it is actually bound (not necessarily the
    /// innermost scope).
    fn resolve_read(&mut self, expr_id: ExprId, name: &str) -> Option<VarState> {
        let found = self.scopes.iter().rposition(|scope| scope.contains_key(name));
        let state = found.map(|offset| self.scopes[offset].get(name).unwrap().state);
        if let Some(offset) = found {
            let depth = self.scopes.len() - 1 - offset;
            self.locals.insert(expr_id, depth);
            self.scopes[offset].get_mut(name).unwrap().state = VarState::Accessed;
        }
        state
    }

    /// Resolves a write of `name` (a bare `x = e`), advancing its state to
    /// `Assigned` only if it had not yet been read or written.
    fn resolve_write(&mut self, expr_id: ExprId, name: &str) {
        let found = self.scopes.iter().rposition(|scope| scope.contains_key(name));
        if let Some(offset) = found {
            let depth = self.scopes.len() - 1 - offset;
            self.locals.insert(expr_id, depth);
            let info = self.scopes[offset].get_mut(name).unwrap();
            if matches!(info.state, VarState::Declared | VarState::Defined) {
                info.state = VarState::Assigned;
            }
        }
    }

    // ---- statements ----

    fn resolve_stmts(&mut self, statements: &[Stmt]) {
        for stmt in statements {
            self.resolve_stmt(stmt);
        }
    }

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(statements) => {
                self.begin_scope();
                self.resolve_stmts(statements);
                self.end_scope();
            }
            Stmt::Var { name, initializer } => {
                self.declare(name);
                if let Some(init) = initializer {
                    self.resolve_expr(init);
                    self.set_state(&name.lexeme, VarState::Assigned);
                } else {
                    self.set_state(&name.lexeme, VarState::Defined);
                }
            }
            Stmt::Function(decl) => {
                self.declare_and_assign(&decl.name);
                self.resolve_function(decl, FunctionType::Function);
            }
            Stmt::Class(decl) => self.resolve_class(decl),
            Stmt::Expression(expr) => self.resolve_expr(expr),
            Stmt::Print(expr) => self.resolve_expr(expr),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(else_branch);
                }
            }
            Stmt::While { condition, body } => {
                self.resolve_expr(condition);
                self.loop_depth += 1;
                self.resolve_stmt(body);
                self.loop_depth -= 1;
            }
            Stmt::Break { keyword } => {
                if self.loop_depth == 0 {
                    self.error(keyword, "Can't use 'break' outside of a loop.");
                }
            }
            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.error(keyword, "Can't return from top-level code.");
                }
                if let Some(value) = value {
                    if self.current_function == FunctionType::Initializer {
                        self.error(keyword, "Can't return a value from an initializer.");
                    }
                    self.resolve_expr(value);
                }
            }
        }
    }

    fn resolve_function(&mut self, decl: &FunctionDecl, kind: FunctionType) {
        let enclosing_function = self.current_function;
        self.current_function = kind;

        self.begin_scope();
        for param in &decl.params {
            self.declare_and_assign(param);
        }
        self.resolve_stmts(&decl.body);
        self.end_scope();

        self.current_function = enclosing_function;
    }

    fn resolve_class(&mut self, decl: &ClassDecl) {
        let enclosing_class = self.current_class;
        self.current_class = ClassType::Class;

        self.declare(&decl.name);

        if let Some(superclass) = &decl.superclass {
            self.current_class = ClassType::Subclass;
            self.resolve_expr(superclass);
        }

        self.set_state(&decl.name.lexeme, VarState::Assigned);

        if decl.superclass.is_some() {
            self.begin_scope();
            self.declare_ignored("super");
        }

        self.begin_scope();
        self.declare_ignored("this");

        for prop in &decl.properties {
            self.resolve_function(prop, FunctionType::Method);
        }
        for method in &decl.methods {
            let kind = if method.name.lexeme == "init" {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };
            self.resolve_function(method, kind);
        }
        for class_method in &decl.class_methods {
            self.resolve_function(class_method, FunctionType::ClassMethod);
        }

        self.end_scope(); // this

        if decl.superclass.is_some() {
            self.end_scope(); // super
        }

        self.current_class = enclosing_class;
    }

    // ---- expressions ----

    fn resolve_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Variable { name } => match self.resolve_read(expr.id(), &name.lexeme) {
                Some(VarState::Declared) => self.error(name, "Can't read local variable in its own initializer."),
                Some(VarState::Defined) => {
                    self.error(name, format!("Variable '{}' is read before being assigned a value.", name.lexeme))
                }
                _ => {}
            },
            Expr::Assign { name, value } => {
                self.resolve_expr(value);
                self.resolve_write(expr.id(), &name.lexeme);
            }
            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            Expr::Ternary {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_expr(then_branch);
                self.resolve_expr(else_branch);
            }
            Expr::Unary { right, .. } => self.resolve_expr(right),
            Expr::Call { callee, arguments, .. } => {
                self.resolve_expr(callee);
                for arg in arguments {
                    self.resolve_expr(arg);
                }
            }
            Expr::Get { object, .. } => self.resolve_expr(object),
            Expr::Set { object, value, .. } => {
                self.resolve_expr(value);
                self.resolve_expr(object);
            }
            Expr::This { keyword } => {
                if self.current_class == ClassType::None {
                    self.error(keyword, "Can't use 'this' outside of a class.");
                    return;
                }
                if self.current_function == FunctionType::ClassMethod {
                    self.error(keyword, "Can't use 'this' inside a class method.");
                    return;
                }
                self.resolve_local(expr.id(), "this");
            }
            Expr::Super { keyword, .. } => {
                if self.current_class == ClassType::None {
                    self.error(keyword, "Can't use 'super' outside of a class.");
                    return;
                }
                if self.current_class != ClassType::Subclass {
                    self.error(keyword, "Can't use 'super' in a class with no superclass.");
                    return;
                }
                self.resolve_local(expr.id(), "super");
            }
            Expr::Grouping { expression } => self.resolve_expr(expression),
            Expr::Literal { .. } => {}
            Expr::Lambda { params, body } => {
                let enclosing_function = self.current_function;
                self.current_function = FunctionType::Lambda;
                self.begin_scope();
                for param in params {
                    self.declare_and_assign(param);
                }
                self.resolve_stmts(body);
                self.end_scope();
                self.current_function = enclosing_function;
            }
        }
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}
