// ABOUTME: Recursive-descent parser turning a token stream into an AST

use crate::error::StaticError;
use crate::expr::{Expr, LiteralValue};
use crate::stmt::{ClassDecl, FunctionDecl, Stmt};
use crate::token::{Literal, Token, TokenKind};
use std::rc::Rc;

const MAX_ARGS: usize = 8;

#[derive(Clone, Copy, PartialEq)]
enum FunctionKind {
    Function,
    Method,
    ClassMethod,
}

impl FunctionKind {
    fn label(self) -> &'static str {
        match self {
            FunctionKind::Function => "function",
            FunctionKind::Method => "method",
            FunctionKind::ClassMethod => "class method",
        }
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    errors: Vec<StaticError>,
}

type ExprResult = Result<Expr, ()>;
type StmtResult = Result<Stmt, ()>;

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            current: 0,
            errors: Vec::new(),
        }
    }

    pub fn parse(mut self) -> (Vec<Stmt>, Vec<StaticError>) {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),
                Err(()) => self.synchronize(),
            }
        }
        (statements, self.errors)
    }

    // ---- token stream helpers ----

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous().clone()
    }

    fn check(&self, kind: TokenKind) -> bool {
        !self.is_at_end() && self.peek().kind == kind
    }

    fn matches(&mut self, kinds: &[TokenKind]) -> bool {
        for &kind in kinds {
            if self.check(kind) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<Token, ()> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error_at_current(message))
        }
    }

    fn error_at_current(&mut self, message: impl Into<String>) {
        let token = self.peek().clone();
        self.error_at(&token, message);
    }

    fn error_at(&mut self, token: &Token, message: impl Into<String>) {
        let lexeme = if token.kind == TokenKind::Eof {
            String::new()
        } else {
            token.lexeme.clone()
        };
        self.errors.push(StaticError::at(token.line, lexeme, message.into()));
    }

    fn synchronize(&mut self) {
        self.advance();
        while !self.is_at_end() {
            if self.previous().kind == TokenKind::Semicolon {
                return;
            }
            use TokenKind::*;
            if matches!(
                self.peek().kind,
                Class | Fun | Var | For | If | While | Print | Return
            ) {
                return;
            }
            self.advance();
        }
    }

    // ---- declarations ----

    fn declaration(&mut self) -> StmtResult {
        if self.matches(&[TokenKind::Class]) {
            return self.class_declaration();
        }
        if self.check(TokenKind::Fun) && self.check_next(TokenKind::Identifier) {
            self.advance();
            return self.function(FunctionKind::Function).map(Stmt::Function);
        }
        if self.matches(&[TokenKind::Var]) {
            return self.var_declaration();
        }
        self.statement()
    }

    fn check_next(&self, kind: TokenKind) -> bool {
        if self.is_at_end() {
            return false;
        }
        self.tokens
            .get(self.current + 1)
            .map(|t| t.kind == kind)
            .unwrap_or(false)
    }

    fn class_declaration(&mut self) -> StmtResult {
        let name = self.consume(TokenKind::Identifier, "Expect class name.")?;

        let superclass = if self.matches(&[TokenKind::Less]) {
            self.consume(TokenKind::Identifier, "Expect superclass name.")?;
            Some(Expr::Variable {
                name: self.previous().clone(),
            })
        } else {
            None
        };

        self.consume(TokenKind::LeftBrace, "Expect '{' before class body.")?;

        let mut properties = Vec::new();
        let mut methods = Vec::new();
        let mut class_methods = Vec::new();

        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            if self.matches(&[TokenKind::Class]) {
                class_methods.push(Rc::new(self.function(FunctionKind::ClassMethod)?));
            } else {
                let decl = Rc::new(self.function(FunctionKind::Method)?);
                if decl.is_property {
                    properties.push(decl);
                } else {
                    methods.push(decl);
                }
            }
        }

        self.consume(TokenKind::RightBrace, "Expect '}' after class body.")?;

        Ok(Stmt::Class(Rc::new(ClassDecl {
            name,
            superclass,
            properties,
            methods,
            class_methods,
        })))
    }

    /// `function → IDENT ( "(" params? ")" )? block`. Parens are mandatory for
    /// `Function` and `ClassMethod` kinds; optional only for a `Method`
    /// (absence makes it a getter property).
    fn function(&mut self, kind: FunctionKind) -> Result<FunctionDecl, ()> {
        let name = self.consume(TokenKind::Identifier, &format!("Expect {} name.", kind.label()))?;

        let is_property = kind == FunctionKind::Method && !self.check(TokenKind::LeftParen);

        let params = if is_property {
            Vec::new()
        } else {
            self.consume(
                TokenKind::LeftParen,
                &format!("Expect '(' after {} name.", kind.label()),
            )?;
            let mut params = Vec::new();
            if !self.check(TokenKind::RightParen) {
                loop {
                    if params.len() >= MAX_ARGS {
                        self.error_at_current(format!("Can't have more than {MAX_ARGS} parameters."));
                    }
                    params.push(self.consume(TokenKind::Identifier, "Expect parameter name.")?);
                    if !self.matches(&[TokenKind::Comma]) {
                        break;
                    }
                }
            }
            self.consume(TokenKind::RightParen, "Expect ')' after parameters.")?;
            params
        };

        self.consume(
            TokenKind::LeftBrace,
            &format!("Expect '{{' before {} body.", kind.label()),
        )?;
        let body = self.block_statements()?;

        Ok(FunctionDecl {
            name,
            params,
            body,
            is_property,
        })
    }

    fn var_declaration(&mut self) -> StmtResult {
        let name = self.consume(TokenKind::Identifier, "Expect variable name.")?;
        let initializer = if self.matches(&[TokenKind::Equal]) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenKind::Semicolon, "Expect ';' after variable declaration.")?;
        Ok(Stmt::Var { name, initializer })
    }

    // ---- statements ----

    fn statement(&mut self) -> StmtResult {
        if self.matches(&[TokenKind::For]) {
            return self.for_statement();
        }
        if self.matches(&[TokenKind::If]) {
            return self.if_statement();
        }
        if self.matches(&[TokenKind::Print]) {
            return self.print_statement();
        }
        if self.matches(&[TokenKind::Return]) {
            return self.return_statement();
        }
        if self.matches(&[TokenKind::While]) {
            return self.while_statement();
        }
        if self.matches(&[TokenKind::Break]) {
            return self.break_statement();
        }
        if self.matches(&[TokenKind::LeftBrace]) {
            return Ok(Stmt::Block(self.block_statements()?));
        }
        self.expression_statement()
    }

    fn for_statement(&mut self) -> StmtResult {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'for'.")?;

        let initializer = if self.matches(&[TokenKind::Semicolon]) {
            None
        } else if self.matches(&[TokenKind::Var]) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if self.check(TokenKind::Semicolon) {
            Expr::Literal {
                value: LiteralValue::Bool(true),
            }
        } else {
            self.expression()?
        };
        self.consume(TokenKind::Semicolon, "Expect ';' after loop condition.")?;

        let increment = if self.check(TokenKind::RightParen) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenKind::RightParen, "Expect ')' after for clauses.")?;

        let mut body = self.statement()?;

        if let Some(increment) = increment {
            body = Stmt::Block(vec![body, Stmt::Expression(increment)]);
        }
        body = Stmt::While {
            condition,
            body: Box::new(body),
        };
        if let Some(initializer) = initializer {
            body = Stmt::Block(vec![initializer, body]);
        }

        Ok(body)
    }

    fn if_statement(&mut self) -> StmtResult {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after if condition.")?;

        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.matches(&[TokenKind::Else]) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn print_statement(&mut self) -> StmtResult {
        let value = self.expression()?;
        self.consume(TokenKind::Semicolon, "Expect ';' after value.")?;
        Ok(Stmt::Print(value))
    }

    fn return_statement(&mut self) -> StmtResult {
        let keyword = self.previous().clone();
        let value = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenKind::Semicolon, "Expect ';' after return value.")?;
        Ok(Stmt::Return { keyword, value })
    }

    fn while_statement(&mut self) -> StmtResult {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after condition.")?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::While { condition, body })
    }

    fn break_statement(&mut self) -> StmtResult {
        let keyword = self.previous().clone();
        self.consume(TokenKind::Semicolon, "Expect ';' after 'break'.")?;
        Ok(Stmt::Break { keyword })
    }

    fn block_statements(&mut self) -> Result<Vec<Stmt>, ()> {
        let mut statements = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            statements.push(self.declaration()?);
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after block.")?;
        Ok(statements)
    }

    fn expression_statement(&mut self) -> StmtResult {
        let expr = self.expression()?;
        self.consume(TokenKind::Semicolon, "Expect ';' after expression.")?;
        Ok(Stmt::Expression(expr))
    }

    // ---- expressions ----

    fn expression(&mut self) -> ExprResult {
        self.assignment()
    }

    fn assignment(&mut self) -> ExprResult {
        if self.matches(&[TokenKind::Fun]) {
            return self.lambda();
        }

        let expr = self.ternary()?;

        if self.matches(&[TokenKind::Equal]) {
            let equals = self.previous().clone();
            let value = self.assignment()?;

            return match expr {
                Expr::Variable { name } => Ok(Expr::Assign {
                    name,
                    value: Box::new(value),
                }),
                Expr::Get { object, name } => Ok(Expr::Set {
                    object,
                    name,
                    value: Box::new(value),
                }),
                other => {
                    self.error_at(&equals, "Invalid assignment target.");
                    Ok(other)
                }
            };
        }

        Ok(expr)
    }

    fn ternary(&mut self) -> ExprResult {
        let expr = self.or()?;
        if self.matches(&[TokenKind::Question]) {
            let then_branch = self.expression()?;
            self.consume(TokenKind::Colon, "Expect ':' in ternary expression.")?;
            let else_branch = self.expression()?;
            return Ok(Expr::Ternary {
                condition: Box::new(expr),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            });
        }
        Ok(expr)
    }

    fn or(&mut self) -> ExprResult {
        let mut expr = self.and()?;
        while self.matches(&[TokenKind::Or]) {
            let operator = self.previous().clone();
            let right = self.and()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn and(&mut self) -> ExprResult {
        let mut expr = self.equality()?;
        while self.matches(&[TokenKind::And]) {
            let operator = self.previous().clone();
            let right = self.equality()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn equality(&mut self) -> ExprResult {
        let mut expr = self.comparison()?;
        while self.matches(&[TokenKind::BangEqual, TokenKind::EqualEqual]) {
            let operator = self.previous().clone();
            let right = self.comparison()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> ExprResult {
        let mut expr = self.addition()?;
        while self.matches(&[
            TokenKind::Greater,
            TokenKind::GreaterEqual,
            TokenKind::Less,
            TokenKind::LessEqual,
        ]) {
            let operator = self.previous().clone();
            let right = self.addition()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn addition(&mut self) -> ExprResult {
        let mut expr = self.multiplication()?;
        while self.matches(&[TokenKind::Minus, TokenKind::Plus]) {
            let operator = self.previous().clone();
            let right = self.multiplication()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn multiplication(&mut self) -> ExprResult {
        let mut expr = self.unary()?;
        while self.matches(&[TokenKind::Slash, TokenKind::Star]) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn unary(&mut self) -> ExprResult {
        if self.matches(&[TokenKind::Bang, TokenKind::Minus]) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            return Ok(Expr::Unary {
                operator,
                right: Box::new(right),
            });
        }
        self.call()
    }

    fn call(&mut self) -> ExprResult {
        let mut expr = self.primary()?;
        loop {
            if self.matches(&[TokenKind::LeftParen]) {
                expr = self.finish_call(expr)?;
            } else if self.matches(&[TokenKind::Dot]) {
                let name = self.consume(TokenKind::Identifier, "Expect property name after '.'.")?;
                expr = Expr::Get {
                    object: Box::new(expr),
                    name,
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> ExprResult {
        let mut arguments = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if arguments.len() >= MAX_ARGS {
                    self.error_at_current(format!("Can't have more than {MAX_ARGS} arguments."));
                }
                arguments.push(self.expression()?);
                if !self.matches(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        let paren = self.consume(TokenKind::RightParen, "Expect ')' after arguments.")?;
        Ok(Expr::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }

    fn primary(&mut self) -> ExprResult {
        use TokenKind::*;

        if self.matches(&[False]) {
            return Ok(Expr::Literal {
                value: LiteralValue::Bool(false),
            });
        }
        if self.matches(&[True]) {
            return Ok(Expr::Literal {
                value: LiteralValue::Bool(true),
            });
        }
        if self.matches(&[Nil]) {
            return Ok(Expr::Literal {
                value: LiteralValue::Nil,
            });
        }
        if self.matches(&[Number]) {
            let value = match &self.previous().literal {
                Literal::Number(n) => *n,
                _ => unreachable!("scanner always attaches a numeric literal to a NUMBER token"),
            };
            return Ok(Expr::Literal {
                value: LiteralValue::Number(value),
            });
        }
        if self.matches(&[TokenKind::String]) {
            let value = match &self.previous().literal {
                Literal::Str(s) => s.clone(),
                _ => unreachable!("scanner always attaches a string literal to a STRING token"),
            };
            return Ok(Expr::Literal {
                value: LiteralValue::Str(value),
            });
        }
        if self.matches(&[This]) {
            return Ok(Expr::This {
                keyword: self.previous().clone(),
            });
        }
        if self.matches(&[Super]) {
            let keyword = self.previous().clone();
            self.consume(Dot, "Expect '.' after 'super'.")?;
            let method = self.consume(Identifier, "Expect superclass method name.")?;
            return Ok(Expr::Super { keyword, method });
        }
        if self.matches(&[Identifier]) {
            return Ok(Expr::Variable {
                name: self.previous().clone(),
            });
        }
        if self.matches(&[LeftParen]) {
            let expr = self.expression()?;
            self.consume(RightParen, "Expect ')' after expression.")?;
            return Ok(Expr::Grouping {
                expression: Box::new(expr),
            });
        }
        if self.matches(&[Fun]) {
            return self.lambda();
        }

        Err(self.error_at_current("Expect expression."))
    }

    fn lambda(&mut self) -> ExprResult {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'fun'.")?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if params.len() >= MAX_ARGS {
                    self.error_at_current(format!("Can't have more than {MAX_ARGS} parameters."));
                }
                params.push(self.consume(TokenKind::Identifier, "Expect parameter name.")?);
                if !self.matches(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after parameters.")?;
        self.consume(TokenKind::LeftBrace, "Expect '{' before lambda body.")?;
        let body = self.block_statements()?;
        Ok(Expr::Lambda { params, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::Scanner;

    fn parse(src: &str) -> (Vec<Stmt>, Vec<StaticError>) {
        let (tokens, scan_errors) = Scanner::new(src).scan_tokens();
        assert!(scan_errors.is_empty(), "unexpected scan errors: {scan_errors:?}");
        Parser::new(tokens).parse()
    }

    #[test]
    fn parses_var_declaration_with_initializer() {
        let (stmts, errors) = parse("var x = 1 + 2;");
        assert!(errors.is_empty());
        assert_eq!(stmts.len(), 1);
        assert!(matches!(stmts[0], Stmt::Var { .. }));
    }

    #[test]
    fn parses_ternary_and_logical_precedence() {
        let (stmts, errors) = parse("var x = 1 < 2 ? \"a\" : \"b\" or nil;");
        assert!(errors.is_empty());
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn desugars_for_into_block_while() {
        let (stmts, errors) = parse("for (var i = 0; i < 5; i = i + 1) print i;");
        assert!(errors.is_empty());
        match &stmts[0] {
            Stmt::Block(body) => {
                assert_eq!(body.len(), 2);
                assert!(matches!(body[0], Stmt::Var { .. }));
                assert!(matches!(body[1], Stmt::While { .. }));
            }
            other => panic!("expected desugared block, got {other:?}"),
        }
    }

    #[test]
    fn class_member_without_parens_is_a_property() {
        let (stmts, errors) = parse("class C { area { return 1; } }");
        assert!(errors.is_empty());
        match &stmts[0] {
            Stmt::Class(decl) => {
                assert_eq!(decl.properties.len(), 1);
                assert!(decl.methods.is_empty());
            }
            other => panic!("expected class decl, got {other:?}"),
        }
    }

    #[test]
    fn static_class_method_requires_parens() {
        let (_, errors) = parse("class C { class bad { return 1; } }");
        assert!(!errors.is_empty());
    }

    #[test]
    fn arity_cap_is_enforced_on_params_and_args() {
        let nine_params = (0..9).map(|i| format!("p{i}")).collect::<Vec<_>>().join(", ");
        let src = format!("fun f({nine_params}) {{}}");
        let (_, errors) = parse(&src);
        assert!(!errors.is_empty());

        let nine_args = (0..9).map(|i| i.to_string()).collect::<Vec<_>>().join(", ");
        let src = format!("f({nine_args});");
        let (_, errors) = parse(&src);
        assert!(!errors.is_empty());
    }

    #[test]
    fn invalid_assignment_target_is_non_fatal() {
        let (stmts, errors) = parse("1 + 2 = 3; print 1;");
        assert!(!errors.is_empty());
        assert_eq!(stmts.len(), 2);
    }

    #[test]
    fn lambda_parses_as_primary_expression() {
        let (stmts, errors) = parse("var f = fun (a, b) { return a + b; };");
        assert!(errors.is_empty());
        match &stmts[0] {
            Stmt::Var { initializer: Some(Expr::Lambda { params, .. }), .. } => {
                assert_eq!(params.len(), 2);
            }
            other => panic!("expected lambda initializer, got {other:?}"),
        }
    }

    #[test]
    fn superclass_reference_is_parsed() {
        let (stmts, errors) = parse("class A {} class B < A {}");
        assert!(errors.is_empty());
        match &stmts[1] {
            Stmt::Class(decl) => assert!(decl.superclass.is_some()),
            other => panic!("expected class decl, got {other:?}"),
        }
    }
}
