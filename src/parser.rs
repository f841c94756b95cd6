use std::rc::Rc;

use crate::{
    ast::{BinaryOp, CompareOp, Expr, ExprKind, ImportNames, Param, Stmt, StmtKind, UnaryOp},
    diagnostics::{Diagnostic, ErrorKind, SourceSpan},
    lexer::{Keyword, Lexer, Token, TokenKind},
};

/// Parse a whole module or REPL line into a list of top-level statements.
pub fn parse_program(source: &str) -> Result<Vec<Stmt>, Diagnostic> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens).parse_program()
}

struct Parser {
    tokens: Vec<Token>,
    current: usize,
    in_assertion: bool,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            current: 0,
            in_assertion: false,
        }
    }

    fn parse_program(&mut self) -> Result<Vec<Stmt>, Diagnostic> {
        let mut stmts = Vec::new();
        while !self.check(TokenKind::Eof) {
            stmts.push(self.parse_statement()?);
        }
        Ok(stmts)
    }

    fn parse_statement(&mut self) -> Result<Stmt, Diagnostic> {
        if let Some(token) = self.peek() {
            match &token.kind {
                TokenKind::Keyword(Keyword::Let) => return self.parse_let_statement(),
                TokenKind::Keyword(Keyword::Del) => return self.parse_del(),
                TokenKind::Keyword(Keyword::Import) => return self.parse_import(),
                TokenKind::Keyword(Keyword::Export) => return self.parse_export(),
                _ => {}
            }
        }
        let expr = self.parse_expression()?;
        self.finish_expr_statement(expr)
    }

    /// `let` at the top level: either the single-binding statement form
    /// `let NAME = EXPR`, or an ordinary `let … in …` expression.
    fn parse_let_statement(&mut self) -> Result<Stmt, Diagnostic> {
        let let_token = self.consume_keyword(Keyword::Let)?;
        let bindings = self.parse_let_bindings()?;
        if self.matches_keyword(Keyword::In) {
            let body = self.parse_expression()?;
            let span = SourceSpan {
                start: let_token.span.start,
                end: body.span.end,
            };
            let expr = Expr {
                kind: ExprKind::LetIn {
                    bindings,
                    body: Box::new(body),
                },
                span,
            };
            return self.finish_expr_statement(expr);
        }
        if bindings.len() != 1 {
            return Err(Diagnostic::new(
                ErrorKind::Syntax,
                "a bare `let` statement binds exactly one name",
            )
            .with_span(let_token.span));
        }
        self.consume_optional_semicolon();
        let (name, value) = bindings.into_iter().next().unwrap();
        let span = SourceSpan {
            start: let_token.span.start,
            end: value.span.end,
        };
        Ok(Stmt {
            kind: StmtKind::Let { name, value },
            span,
        })
    }

    fn parse_let_bindings(&mut self) -> Result<Vec<(String, Expr)>, Diagnostic> {
        let mut bindings = Vec::new();
        loop {
            let name = self.consume_identifier("expected binding name after `let`")?;
            self.consume(TokenKind::Assign, "expected `=` in `let` binding")?;
            let value = self.parse_expression()?;
            bindings.push((name.lexeme.clone(), value));
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        Ok(bindings)
    }

    fn parse_del(&mut self) -> Result<Stmt, Diagnostic> {
        let del_token = self.consume_keyword(Keyword::Del)?;
        let name = self.consume_identifier("expected name after `del`")?;
        self.consume_optional_semicolon();
        Ok(Stmt {
            span: SourceSpan {
                start: del_token.span.start,
                end: name.span.end,
            },
            kind: StmtKind::Del {
                name: name.lexeme.clone(),
            },
        })
    }

    fn parse_import(&mut self) -> Result<Stmt, Diagnostic> {
        let import_token = self.consume_keyword(Keyword::Import)?;
        let (names, path_token) = if self.check(TokenKind::Str) {
            (ImportNames::Module, self.advance())
        } else if self.matches(TokenKind::Star) {
            self.consume_keyword(Keyword::From)?;
            let path = self.consume(TokenKind::Str, "expected module path string")?;
            (ImportNames::Star, path)
        } else {
            let mut names = vec![self
                .consume_identifier("expected import name")?
                .lexeme
                .clone()];
            while self.matches(TokenKind::Comma) {
                names.push(self.consume_identifier("expected import name")?.lexeme.clone());
            }
            self.consume_keyword(Keyword::From)?;
            let path = self.consume(TokenKind::Str, "expected module path string")?;
            (ImportNames::Named(names), path)
        };
        self.consume_optional_semicolon();
        Ok(Stmt {
            span: SourceSpan {
                start: import_token.span.start,
                end: path_token.span.end,
            },
            kind: StmtKind::Import {
                names,
                path: path_token.lexeme.clone(),
            },
        })
    }

    fn parse_export(&mut self) -> Result<Stmt, Diagnostic> {
        let export_token = self.consume_keyword(Keyword::Export)?;
        let first = self.consume_identifier("expected export name")?;
        if self.matches(TokenKind::Assign) {
            let value = self.parse_expression()?;
            self.consume_optional_semicolon();
            let span = SourceSpan {
                start: export_token.span.start,
                end: value.span.end,
            };
            return Ok(Stmt {
                kind: StmtKind::ExportLet {
                    name: first.lexeme.clone(),
                    value,
                },
                span,
            });
        }
        let mut names = vec![first.lexeme.clone()];
        let mut end = first.span.end;
        while self.matches(TokenKind::Comma) {
            let name = self.consume_identifier("expected export name")?;
            end = name.span.end;
            names.push(name.lexeme.clone());
        }
        self.consume_optional_semicolon();
        Ok(Stmt {
            span: SourceSpan {
                start: export_token.span.start,
                end,
            },
            kind: StmtKind::Export { names },
        })
    }

    fn finish_expr_statement(&mut self, expr: Expr) -> Result<Stmt, Diagnostic> {
        if self.matches(TokenKind::AssertArrow) {
            self.in_assertion = true;
            let pred = self.parse_expression();
            self.in_assertion = false;
            let pred = pred?;
            self.consume_optional_semicolon();
            let span = expr.span.merge(pred.span);
            return Ok(Stmt {
                kind: StmtKind::Assert { value: expr, pred },
                span,
            });
        }
        self.consume_optional_semicolon();
        Ok(Stmt {
            span: expr.span,
            kind: StmtKind::Expr(expr),
        })
    }

    fn parse_expression(&mut self) -> Result<Expr, Diagnostic> {
        if self.check(TokenKind::Keyword(Keyword::Let)) {
            return self.parse_let_expression();
        }
        if self.check(TokenKind::Keyword(Keyword::If)) {
            return self.parse_if();
        }
        self.parse_pipe()
    }

    fn parse_let_expression(&mut self) -> Result<Expr, Diagnostic> {
        let let_token = self.consume_keyword(Keyword::Let)?;
        let bindings = self.parse_let_bindings()?;
        if !self.matches_keyword(Keyword::In) {
            return Err(Diagnostic::new(
                ErrorKind::Syntax,
                "expected `in` after `let` bindings (a bare `let` is only allowed at the top level)",
            )
            .with_span(let_token.span));
        }
        let body = self.parse_expression()?;
        let span = SourceSpan {
            start: let_token.span.start,
            end: body.span.end,
        };
        Ok(Expr {
            kind: ExprKind::LetIn {
                bindings,
                body: Box::new(body),
            },
            span,
        })
    }

    fn parse_if(&mut self) -> Result<Expr, Diagnostic> {
        let if_token = self.consume_keyword(Keyword::If)?;
        let cond = self.parse_expression()?;
        self.consume_keyword(Keyword::Then)?;
        let then_branch = self.parse_expression()?;
        self.consume_keyword(Keyword::Else)?;
        let else_branch = self.parse_expression()?;
        let span = SourceSpan {
            start: if_token.span.start,
            end: else_branch.span.end,
        };
        Ok(Expr {
            kind: ExprKind::If {
                cond: Box::new(cond),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            },
            span,
        })
    }

    fn parse_pipe(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_compose()?;
        while self.matches(TokenKind::PipeInto) {
            let callee = self.parse_compose()?;
            let span = expr.span.merge(callee.span);
            expr = Expr {
                kind: ExprKind::Call {
                    func: Box::new(callee),
                    args: vec![expr],
                },
                span,
            };
        }
        Ok(expr)
    }

    fn parse_compose(&mut self) -> Result<Expr, Diagnostic> {
        let left = self.parse_or()?;
        if self.matches(TokenKind::Compose) {
            let right = self.parse_compose()?;
            let span = left.span.merge(right.span);
            return Ok(Expr {
                kind: ExprKind::Compose {
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            });
        }
        Ok(left)
    }

    fn parse_or(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_and()?;
        while self.matches(TokenKind::PipePipe) {
            let right = self.parse_and()?;
            let span = expr.span.merge(right.span);
            expr = Expr {
                kind: ExprKind::Binary {
                    op: BinaryOp::Or,
                    left: Box::new(expr),
                    right: Box::new(right),
                },
                span,
            };
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_comparison()?;
        while self.matches(TokenKind::AmpAmp) {
            let right = self.parse_comparison()?;
            let span = expr.span.merge(right.span);
            expr = Expr {
                kind: ExprKind::Binary {
                    op: BinaryOp::And,
                    left: Box::new(expr),
                    right: Box::new(right),
                },
                span,
            };
        }
        Ok(expr)
    }

    fn parse_comparison(&mut self) -> Result<Expr, Diagnostic> {
        let first = self.parse_term()?;
        let mut rest = Vec::new();
        loop {
            let op = if self.matches(TokenKind::LessEqual) {
                CompareOp::Le
            } else if self.matches(TokenKind::GreaterEqual) {
                CompareOp::Ge
            } else if self.matches(TokenKind::Less) {
                CompareOp::Lt
            } else if self.matches(TokenKind::Greater) {
                CompareOp::Gt
            } else if self.matches(TokenKind::EqualEqual) {
                CompareOp::Eq
            } else if self.matches(TokenKind::BangEqual) {
                CompareOp::Ne
            } else {
                break;
            };
            rest.push((op, self.parse_term()?));
        }
        if rest.is_empty() {
            return Ok(first);
        }
        let span = SourceSpan {
            start: first.span.start,
            end: rest.last().map(|(_, e)| e.span.end).unwrap_or(first.span.end),
        };
        Ok(Expr {
            kind: ExprKind::Compare {
                first: Box::new(first),
                rest,
            },
            span,
        })
    }

    fn parse_term(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_factor()?;
        loop {
            let op = if self.matches(TokenKind::Plus) {
                BinaryOp::Add
            } else if self.matches(TokenKind::Minus) {
                BinaryOp::Sub
            } else {
                break;
            };
            let right = self.parse_factor()?;
            let span = expr.span.merge(right.span);
            expr = Expr {
                kind: ExprKind::Binary {
                    op,
                    left: Box::new(expr),
                    right: Box::new(right),
                },
                span,
            };
        }
        Ok(expr)
    }

    fn parse_factor(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_unary()?;
        loop {
            let op = if self.matches(TokenKind::Star) {
                BinaryOp::Mul
            } else if self.matches(TokenKind::Slash) {
                BinaryOp::Div
            } else if self.matches(TokenKind::Percent) {
                BinaryOp::Mod
            } else {
                break;
            };
            let right = self.parse_unary()?;
            let span = expr.span.merge(right.span);
            expr = Expr {
                kind: ExprKind::Binary {
                    op,
                    left: Box::new(expr),
                    right: Box::new(right),
                },
                span,
            };
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr, Diagnostic> {
        if self.matches(TokenKind::Plus) {
            // unary plus is the identity
            return self.parse_unary();
        }
        if self.matches(TokenKind::Minus) {
            let operator = self.previous().span;
            let operand = self.parse_unary()?;
            let span = operator.merge(operand.span);
            return Ok(Expr {
                kind: ExprKind::Unary {
                    op: UnaryOp::Neg,
                    expr: Box::new(operand),
                },
                span,
            });
        }
        if self.matches(TokenKind::Bang) {
            let operator = self.previous().span;
            let operand = self.parse_unary()?;
            let span = operator.merge(operand.span);
            return Ok(Expr {
                kind: ExprKind::Unary {
                    op: UnaryOp::Not,
                    expr: Box::new(operand),
                },
                span,
            });
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<Expr, Diagnostic> {
        let base = self.parse_postfix()?;
        if self.matches(TokenKind::Caret) {
            let exponent = self.parse_unary()?;
            let span = base.span.merge(exponent.span);
            return Ok(Expr {
                kind: ExprKind::Binary {
                    op: BinaryOp::Pow,
                    left: Box::new(base),
                    right: Box::new(exponent),
                },
                span,
            });
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_primary()?;
        loop {
            // Postfix call/index only attach on the same logical line, so
            // `xs` and `[3]` on consecutive lines stay separate statements.
            if self.check(TokenKind::LParen) && self.same_line() {
                self.advance();
                let args = self.parse_call_args(TokenKind::RParen)?;
                let close = self.consume(TokenKind::RParen, "expected `)` after arguments")?;
                let span = SourceSpan {
                    start: expr.span.start,
                    end: close.span.end,
                };
                expr = Expr {
                    kind: ExprKind::Call {
                        func: Box::new(expr),
                        args,
                    },
                    span,
                };
            } else if self.check(TokenKind::LBracket) && self.same_line() {
                self.advance();
                let index = self.parse_expression()?;
                let close = self.consume(TokenKind::RBracket, "expected `]` after index")?;
                let span = SourceSpan {
                    start: expr.span.start,
                    end: close.span.end,
                };
                expr = Expr {
                    kind: ExprKind::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                    },
                    span,
                };
            } else if self.check(TokenKind::Dot) && matches!(expr.kind, ExprKind::Variable(_)) {
                self.advance();
                let field = self.consume_identifier("expected name after `.`")?;
                let span = SourceSpan {
                    start: expr.span.start,
                    end: field.span.end,
                };
                // Dotted access is sugar for the qualified names created by
                // `import "path"` and resolves as a single identifier.
                if let ExprKind::Variable(base) = expr.kind {
                    expr = Expr {
                        kind: ExprKind::Variable(format!("{base}.{}", field.lexeme)),
                        span,
                    };
                }
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_call_args(&mut self, terminator: TokenKind) -> Result<Vec<Expr>, Diagnostic> {
        let mut args = Vec::new();
        if self.check(terminator.clone()) {
            return Ok(args);
        }
        loop {
            if self.check(TokenKind::Ellipsis) {
                let spread_token = self.advance();
                let inner = self.parse_expression()?;
                if matches!(inner.kind, ExprKind::Placeholder) {
                    return Err(Diagnostic::new(
                        ErrorKind::Syntax,
                        "cannot spread an argument placeholder",
                    )
                    .with_span(spread_token.span.merge(inner.span)));
                }
                let span = spread_token.span.merge(inner.span);
                args.push(Expr {
                    kind: ExprKind::Spread(Box::new(inner)),
                    span,
                });
            } else {
                args.push(self.parse_expression()?);
            }
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, Diagnostic> {
        let token = match self.peek() {
            Some(token) => token.clone(),
            None => return Err(self.error_eof("unexpected end of expression")),
        };
        match &token.kind {
            TokenKind::Number => {
                let tok = self.advance();
                Ok(Expr {
                    span: tok.span,
                    kind: ExprKind::Number(tok.lexeme.replace('_', "")),
                })
            }
            TokenKind::Str => {
                let tok = self.advance();
                Ok(Expr {
                    span: tok.span,
                    kind: ExprKind::Str(tok.lexeme.clone()),
                })
            }
            TokenKind::Keyword(Keyword::True) => {
                let tok = self.advance();
                Ok(Expr {
                    span: tok.span,
                    kind: ExprKind::Bool(true),
                })
            }
            TokenKind::Keyword(Keyword::False) => {
                let tok = self.advance();
                Ok(Expr {
                    span: tok.span,
                    kind: ExprKind::Bool(false),
                })
            }
            TokenKind::Underscore => {
                let tok = self.advance();
                Ok(Expr {
                    span: tok.span,
                    kind: ExprKind::Placeholder,
                })
            }
            TokenKind::Dollar => {
                let tok = self.advance();
                if !self.in_assertion {
                    return Err(Diagnostic::new(
                        ErrorKind::Syntax,
                        "`$` is only valid on the right-hand side of `--->`",
                    )
                    .with_span(tok.span));
                }
                Ok(Expr {
                    span: tok.span,
                    kind: ExprKind::Variable("$".into()),
                })
            }
            TokenKind::Identifier => {
                let tok = self.advance();
                Ok(Expr {
                    span: tok.span,
                    kind: ExprKind::Variable(tok.lexeme.clone()),
                })
            }
            TokenKind::LParen => {
                let open = self.advance();
                let inner = self.parse_expression()?;
                let close = self.consume(TokenKind::RParen, "expected `)` after expression")?;
                Ok(Expr {
                    span: SourceSpan {
                        start: open.span.start,
                        end: close.span.end,
                    },
                    kind: inner.kind,
                })
            }
            TokenKind::LBracket => {
                let open = self.advance();
                let elements = self.parse_call_args(TokenKind::RBracket)?;
                let close = self.consume(TokenKind::RBracket, "expected `]` after list literal")?;
                Ok(Expr {
                    span: SourceSpan {
                        start: open.span.start,
                        end: close.span.end,
                    },
                    kind: ExprKind::List(elements),
                })
            }
            TokenKind::LBrace => self.parse_lambda(),
            _ => Err(self.error(&token, "unexpected token in expression")),
        }
    }

    fn parse_lambda(&mut self) -> Result<Expr, Diagnostic> {
        let open = self.consume(TokenKind::LBrace, "expected `{` to start lambda")?;

        let name = if self.check(TokenKind::Identifier)
            && matches!(
                self.tokens.get(self.current + 1).map(|t| &t.kind),
                Some(TokenKind::Colon)
            ) {
            let name_token = self.advance();
            self.advance();
            Some(name_token.lexeme.clone())
        } else {
            None
        };

        let mut params: Vec<Param> = Vec::new();
        if !self.check(TokenKind::Arrow) {
            loop {
                let rest = self.matches(TokenKind::Ellipsis);
                let param = self.consume_identifier("expected parameter name")?;
                if params.iter().any(|p| p.name == param.lexeme) {
                    return Err(Diagnostic::new(
                        ErrorKind::Syntax,
                        format!("duplicate parameter `{}`", param.lexeme),
                    )
                    .with_span(param.span));
                }
                if params.last().map(|p| p.rest).unwrap_or(false) {
                    return Err(Diagnostic::new(
                        ErrorKind::Syntax,
                        "a rest parameter must be the last parameter",
                    )
                    .with_span(param.span));
                }
                params.push(Param {
                    name: param.lexeme.clone(),
                    rest,
                });
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::Arrow, "expected `->` in lambda")?;
        let body = self.parse_expression()?;
        let close = self.consume(TokenKind::RBrace, "expected `}` to close lambda")?;
        Ok(Expr {
            span: SourceSpan {
                start: open.span.start,
                end: close.span.end,
            },
            kind: ExprKind::Lambda {
                name,
                params: Rc::new(params),
                body: Rc::new(body),
            },
        })
    }

    fn consume_optional_semicolon(&mut self) {
        let _ = self.matches(TokenKind::Semicolon);
    }

    /// True when the next token sits on the same source line as the
    /// previously consumed one.
    fn same_line(&self) -> bool {
        if self.current == 0 {
            return true;
        }
        match (self.tokens.get(self.current - 1), self.tokens.get(self.current)) {
            (Some(prev), Some(next)) => prev.line == next.line,
            _ => false,
        }
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn matches_keyword(&mut self, keyword: Keyword) -> bool {
        if let Some(Token {
            kind: TokenKind::Keyword(k),
            ..
        }) = self.peek()
        {
            if *k == keyword {
                self.advance();
                return true;
            }
        }
        false
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<Token, Diagnostic> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self
                .peek()
                .cloned()
                .map(|tok| self.error(&tok, message))
                .unwrap_or_else(|| self.error_eof(message)))
        }
    }

    fn consume_keyword(&mut self, keyword: Keyword) -> Result<Token, Diagnostic> {
        if let Some(token) = self.peek() {
            if token.kind == TokenKind::Keyword(keyword.clone()) {
                Ok(self.advance())
            } else {
                let token = token.clone();
                Err(self.error(&token, &format!("expected `{}`", keyword_text(&keyword))))
            }
        } else {
            Err(self.error_eof("unexpected end of input"))
        }
    }

    fn consume_identifier(&mut self, message: &str) -> Result<Token, Diagnostic> {
        if self.check(TokenKind::Identifier) {
            Ok(self.advance())
        } else {
            Err(self
                .peek()
                .cloned()
                .map(|tok| self.error(&tok, message))
                .unwrap_or_else(|| self.error_eof(message)))
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().map(|token| token.kind == kind).unwrap_or(false)
    }

    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous().clone()
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.current)
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Eof) | None)
    }

    fn error(&self, token: &Token, message: &str) -> Diagnostic {
        let shown = if token.kind == TokenKind::Eof {
            format!("{message}, found end of input")
        } else {
            format!("{message}, found `{}`", token.lexeme)
        };
        Diagnostic::new(ErrorKind::Syntax, shown).with_span(token.span)
    }

    fn error_eof(&self, message: &str) -> Diagnostic {
        Diagnostic::new(ErrorKind::Syntax, message.to_string())
    }
}

fn keyword_text(keyword: &Keyword) -> &'static str {
    match keyword {
        Keyword::Let => "let",
        Keyword::In => "in",
        Keyword::Const => "const",
        Keyword::If => "if",
        Keyword::Then => "then",
        Keyword::Else => "else",
        Keyword::True => "true",
        Keyword::False => "false",
        Keyword::Import => "import",
        Keyword::Export => "export",
        Keyword::From => "from",
        Keyword::Del => "del",
    }
}
