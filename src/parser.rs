use crate::ast::*;
use crate::diagnostic::Diagnostic;
use crate::lexeme::Lexeme;
use crate::span::{Span, Spanned};

pub struct Parser {
    tokens: Vec<Spanned<Lexeme>>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Spanned<Lexeme>>) -> Self {
        Self { tokens, pos: 0 }
    }

    /// Parse a translation unit: a sequence of function declarations.
    pub fn parse_program(mut self) -> Result<Program, Diagnostic> {
        let mut functions = Vec::new();
        while !self.at(&Lexeme::Eof) {
            functions.push(self.parse_function_decl()?);
        }
        Ok(Program { functions })
    }

    /// `int name "(" params ")" ( block | ";" )`
    fn parse_function_decl(&mut self) -> Result<FunctionDecl, Diagnostic> {
        self.expect(&Lexeme::Int)?;
        let name = self.expect_ident()?;
        self.expect(&Lexeme::LParen)?;
        let params = self.parse_params()?;
        self.expect(&Lexeme::RParen)?;

        let body = if self.at(&Lexeme::LBrace) {
            Some(self.parse_block()?)
        } else {
            self.expect(&Lexeme::Semicolon)?;
            None
        };

        Ok(FunctionDecl { name, params, body })
    }

    /// `void` (empty) or `int name ("," int name)*`
    fn parse_params(&mut self) -> Result<Vec<Spanned<String>>, Diagnostic> {
        if self.eat(&Lexeme::Void) {
            return Ok(Vec::new());
        }
        if self.at(&Lexeme::RParen) {
            return Err(self
                .error_at_current("expected parameter list or 'void'")
                .with_help("an empty parameter list is written `(void)`".to_string()));
        }

        let mut params = Vec::new();
        loop {
            self.expect(&Lexeme::Int)?;
            params.push(self.expect_ident()?);
            if !self.eat(&Lexeme::Comma) {
                break;
            }
        }
        Ok(params)
    }

    fn parse_block(&mut self) -> Result<Block, Diagnostic> {
        self.expect(&Lexeme::LBrace)?;
        let mut items = Vec::new();
        while !self.at(&Lexeme::RBrace) && !self.at(&Lexeme::Eof) {
            items.push(self.parse_block_item()?);
        }
        self.expect(&Lexeme::RBrace)?;
        Ok(Block { items })
    }

    fn parse_block_item(&mut self) -> Result<BlockItem, Diagnostic> {
        if self.at(&Lexeme::Int) {
            Ok(BlockItem::Declaration(self.parse_declaration()?))
        } else {
            let stmt = self.parse_statement()?;
            Ok(BlockItem::Statement(stmt))
        }
    }

    /// Either a variable declaration or a nested function declaration;
    /// the token after the identifier disambiguates.
    fn parse_declaration(&mut self) -> Result<Declaration, Diagnostic> {
        if self.peek_ahead(2) == Some(&Lexeme::LParen) {
            Ok(Declaration::Func(self.parse_function_decl()?))
        } else {
            Ok(Declaration::Var(self.parse_var_decl()?))
        }
    }

    /// `int name ("=" expr)? ";"`
    fn parse_var_decl(&mut self) -> Result<VarDecl, Diagnostic> {
        self.expect(&Lexeme::Int)?;
        let name = self.expect_ident()?;
        let init = if self.eat(&Lexeme::Eq) {
            Some(self.parse_expr(0)?)
        } else {
            None
        };
        self.expect(&Lexeme::Semicolon)?;
        Ok(VarDecl { name, init })
    }

    fn parse_statement(&mut self) -> Result<Spanned<Stmt>, Diagnostic> {
        let start = self.current_span();
        let stmt = match self.peek() {
            Lexeme::Return => {
                self.advance();
                let expr = self.parse_expr(0)?;
                self.expect(&Lexeme::Semicolon)?;
                Stmt::Return(expr)
            }
            Lexeme::Semicolon => {
                self.advance();
                Stmt::Null
            }
            Lexeme::LBrace => Stmt::Compound(self.parse_block()?),
            Lexeme::If => {
                self.advance();
                self.expect(&Lexeme::LParen)?;
                let cond = self.parse_expr(0)?;
                self.expect(&Lexeme::RParen)?;
                let then_stmt = Box::new(self.parse_statement()?);
                let else_stmt = if self.eat(&Lexeme::Else) {
                    Some(Box::new(self.parse_statement()?))
                } else {
                    None
                };
                Stmt::If {
                    cond,
                    then_stmt,
                    else_stmt,
                }
            }
            Lexeme::Break => {
                self.advance();
                self.expect(&Lexeme::Semicolon)?;
                Stmt::Break { label: None }
            }
            Lexeme::Continue => {
                self.advance();
                self.expect(&Lexeme::Semicolon)?;
                Stmt::Continue { label: None }
            }
            Lexeme::While => {
                self.advance();
                self.expect(&Lexeme::LParen)?;
                let cond = self.parse_expr(0)?;
                self.expect(&Lexeme::RParen)?;
                let body = Box::new(self.parse_statement()?);
                Stmt::While {
                    cond,
                    body,
                    label: None,
                }
            }
            Lexeme::Do => {
                self.advance();
                let body = Box::new(self.parse_statement()?);
                self.expect(&Lexeme::While)?;
                self.expect(&Lexeme::LParen)?;
                let cond = self.parse_expr(0)?;
                self.expect(&Lexeme::RParen)?;
                self.expect(&Lexeme::Semicolon)?;
                Stmt::DoWhile {
                    body,
                    cond,
                    label: None,
                }
            }
            Lexeme::For => {
                self.advance();
                self.expect(&Lexeme::LParen)?;
                let init = self.parse_for_init()?;
                let cond = if self.at(&Lexeme::Semicolon) {
                    None
                } else {
                    Some(self.parse_expr(0)?)
                };
                self.expect(&Lexeme::Semicolon)?;
                let post = if self.at(&Lexeme::RParen) {
                    None
                } else {
                    Some(self.parse_expr(0)?)
                };
                self.expect(&Lexeme::RParen)?;
                let body = Box::new(self.parse_statement()?);
                Stmt::For {
                    init,
                    cond,
                    post,
                    body,
                    label: None,
                }
            }
            _ => {
                let expr = self.parse_expr(0)?;
                self.expect(&Lexeme::Semicolon)?;
                Stmt::Expression(expr)
            }
        };
        let span = start.merge(self.prev_span());
        Ok(Spanned::new(stmt, span))
    }

    /// `for-init` is a variable declaration (consumes its own `;`) or an
    /// optional expression followed by `;`.
    fn parse_for_init(&mut self) -> Result<ForInit, Diagnostic> {
        if self.at(&Lexeme::Int) {
            Ok(ForInit::Declaration(self.parse_var_decl()?))
        } else if self.eat(&Lexeme::Semicolon) {
            Ok(ForInit::Expression(None))
        } else {
            let expr = self.parse_expr(0)?;
            self.expect(&Lexeme::Semicolon)?;
            Ok(ForInit::Expression(Some(expr)))
        }
    }

    // --- Expression parsing (precedence climbing) ---

    fn parse_expr(&mut self, min_prec: u8) -> Result<Spanned<Expr>, Diagnostic> {
        let mut lhs = self.parse_factor()?;

        loop {
            if self.at(&Lexeme::MinusMinus) {
                return Err(self.decrement_unsupported());
            }

            // Right-associative operators recurse with min_prec = prec;
            // left-associative with prec + 1.
            match self.peek() {
                Lexeme::Eq => {
                    let prec = 1;
                    if prec < min_prec {
                        break;
                    }
                    self.advance();
                    let rhs = self.parse_expr(prec)?;
                    let span = lhs.span.merge(rhs.span);
                    lhs = Spanned::new(
                        Expr::Assignment {
                            lhs: Box::new(lhs),
                            rhs: Box::new(rhs),
                        },
                        span,
                    );
                }
                Lexeme::Question => {
                    let prec = 3;
                    if prec < min_prec {
                        break;
                    }
                    self.advance();
                    let then_expr = self.parse_expr(0)?;
                    self.expect(&Lexeme::Colon)?;
                    let else_expr = self.parse_expr(prec)?;
                    let span = lhs.span.merge(else_expr.span);
                    lhs = Spanned::new(
                        Expr::Conditional {
                            cond: Box::new(lhs),
                            then_expr: Box::new(then_expr),
                            else_expr: Box::new(else_expr),
                        },
                        span,
                    );
                }
                other => {
                    let Some(op) = binary_op_for(other) else {
                        break;
                    };
                    let prec = precedence(op);
                    if prec < min_prec {
                        break;
                    }
                    self.advance();
                    let rhs = self.parse_expr(prec + 1)?;
                    let span = lhs.span.merge(rhs.span);
                    lhs = Spanned::new(
                        Expr::Binary {
                            op,
                            lhs: Box::new(lhs),
                            rhs: Box::new(rhs),
                        },
                        span,
                    );
                }
            }
        }

        Ok(lhs)
    }

    /// A factor: constant, variable, call, unary over a factor, or a
    /// parenthesized expression.
    fn parse_factor(&mut self) -> Result<Spanned<Expr>, Diagnostic> {
        let start = self.current_span();

        match self.peek().clone() {
            Lexeme::Constant(n) => {
                self.advance();
                Ok(Spanned::new(Expr::Constant(n), start))
            }
            Lexeme::Ident(name) => {
                self.advance();
                let name = Spanned::new(name, start);
                if self.eat(&Lexeme::LParen) {
                    let args = self.parse_call_args()?;
                    self.expect(&Lexeme::RParen)?;
                    let span = start.merge(self.prev_span());
                    Ok(Spanned::new(Expr::Call { name, args }, span))
                } else {
                    Ok(Spanned::new(Expr::Var(name), start))
                }
            }
            Lexeme::Tilde | Lexeme::Minus | Lexeme::Bang => {
                let op = match self.peek() {
                    Lexeme::Tilde => UnaryOp::Complement,
                    Lexeme::Minus => UnaryOp::Negate,
                    _ => UnaryOp::Not,
                };
                self.advance();
                let operand = self.parse_factor()?;
                let span = start.merge(operand.span);
                Ok(Spanned::new(
                    Expr::Unary {
                        op,
                        operand: Box::new(operand),
                    },
                    span,
                ))
            }
            Lexeme::MinusMinus => Err(self.decrement_unsupported()),
            Lexeme::LParen => {
                self.advance();
                let inner = self.parse_expr(0)?;
                self.expect(&Lexeme::RParen)?;
                let span = start.merge(self.prev_span());
                Ok(Spanned::new(inner.node, span))
            }
            other => Err(Diagnostic::error(
                format!("expected expression, found {}", other.description()),
                start,
            )
            .with_help(
                "expressions are constants, variables, function calls, unary and binary \
                 operations"
                    .to_string(),
            )),
        }
    }

    fn parse_call_args(&mut self) -> Result<Vec<Spanned<Expr>>, Diagnostic> {
        let mut args = Vec::new();
        if self.at(&Lexeme::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr(0)?);
            if !self.eat(&Lexeme::Comma) {
                break;
            }
        }
        Ok(args)
    }

    fn decrement_unsupported(&self) -> Diagnostic {
        Diagnostic::error(
            "decrement operator '--' is not supported".to_string(),
            self.current_span(),
        )
        .with_help("write `x = x - 1` instead".to_string())
    }

    // --- Utility methods ---

    fn peek(&self) -> &Lexeme {
        &self.tokens[self.pos].node
    }

    fn peek_ahead(&self, n: usize) -> Option<&Lexeme> {
        self.tokens.get(self.pos + n).map(|t| &t.node)
    }

    fn current_span(&self) -> Span {
        self.tokens[self.pos].span
    }

    fn prev_span(&self) -> Span {
        if self.pos > 0 {
            self.tokens[self.pos - 1].span
        } else {
            self.current_span()
        }
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
    }

    fn at(&self, token: &Lexeme) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(token)
    }

    fn eat(&mut self, token: &Lexeme) -> bool {
        if self.at(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Lexeme) -> Result<Span, Diagnostic> {
        if self.at(token) {
            let span = self.current_span();
            self.advance();
            Ok(span)
        } else {
            Err(Diagnostic::error(
                format!(
                    "expected {}, found {}",
                    token.description(),
                    self.peek().description()
                ),
                self.current_span(),
            ))
        }
    }

    fn expect_ident(&mut self) -> Result<Spanned<String>, Diagnostic> {
        if let Lexeme::Ident(name) = self.peek().clone() {
            let span = self.current_span();
            self.advance();
            Ok(Spanned::new(name, span))
        } else {
            Err(Diagnostic::error(
                format!("expected identifier, found {}", self.peek().description()),
                self.current_span(),
            ))
        }
    }

    fn error_at_current(&self, msg: &str) -> Diagnostic {
        Diagnostic::error(msg.to_string(), self.current_span())
    }
}

fn binary_op_for(token: &Lexeme) -> Option<BinaryOp> {
    match token {
        Lexeme::Plus => Some(BinaryOp::Add),
        Lexeme::Minus => Some(BinaryOp::Subtract),
        Lexeme::Star => Some(BinaryOp::Multiply),
        Lexeme::Slash => Some(BinaryOp::Divide),
        Lexeme::Percent => Some(BinaryOp::Remainder),
        Lexeme::AmpAmp => Some(BinaryOp::And),
        Lexeme::PipePipe => Some(BinaryOp::Or),
        Lexeme::EqEq => Some(BinaryOp::Equal),
        Lexeme::BangEq => Some(BinaryOp::NotEqual),
        Lexeme::Lt => Some(BinaryOp::LessThan),
        Lexeme::LtEq => Some(BinaryOp::LessOrEqual),
        Lexeme::Gt => Some(BinaryOp::GreaterThan),
        Lexeme::GtEq => Some(BinaryOp::GreaterOrEqual),
        _ => None,
    }
}

/// Higher precedence binds tighter. `=` (1) and `?:` (3) are handled
/// separately in `parse_expr` because they are right-associative.
fn precedence(op: BinaryOp) -> u8 {
    match op {
        BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Remainder => 50,
        BinaryOp::Add | BinaryOp::Subtract => 45,
        BinaryOp::LessThan
        | BinaryOp::LessOrEqual
        | BinaryOp::GreaterThan
        | BinaryOp::GreaterOrEqual => 35,
        BinaryOp::Equal | BinaryOp::NotEqual => 30,
        BinaryOp::And => 10,
        BinaryOp::Or => 5,
    }
}
