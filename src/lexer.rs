use crate::diagnostics::{Diagnostic, ErrorKind, SourceSpan};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyword {
    Let,
    In,
    Const,
    If,
    Then,
    Else,
    True,
    False,
    Import,
    Export,
    From,
    Del,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Number,
    Str,
    Keyword(Keyword),
    Underscore,
    Dollar,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Semicolon,
    Dot,
    Ellipsis,
    Arrow,
    AssertArrow,
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Bang,
    BangEqual,
    EqualEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    AmpAmp,
    PipePipe,
    Compose,
    PipeInto,
    Unknown,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub span: SourceSpan,
    /// 1-based source line of the token start; the parser uses this to keep
    /// `a[i]` indexing from reaching across statement boundaries.
    pub line: usize,
}

pub struct Lexer<'a> {
    source: &'a str,
    chars: std::str::CharIndices<'a>,
    current: usize,
    line: usize,
    peeked: Option<(usize, char)>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices(),
            current: 0,
            line: 1,
            peeked: None,
        }
    }

    fn bump(&mut self) -> Option<(usize, char)> {
        let next = if let Some(pair) = self.peeked.take() {
            Some(pair)
        } else {
            self.chars.next()
        };
        if let Some((idx, ch)) = next {
            self.current = idx + ch.len_utf8();
            if ch == '\n' {
                self.line += 1;
            }
            Some((idx, ch))
        } else {
            None
        }
    }

    fn peek(&mut self) -> Option<(usize, char)> {
        if self.peeked.is_none() {
            self.peeked = self.chars.next();
        }
        self.peeked
    }

    /// True when the source at the current token start continues with `rest`
    /// (beyond the character already consumed).
    fn continues_with(&self, start: usize, consumed: char, rest: &str) -> bool {
        self.source[start + consumed.len_utf8()..].starts_with(rest)
    }

    fn eat(&mut self, count: usize) {
        for _ in 0..count {
            self.bump();
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            let mut progressed = false;

            while let Some((_, ch)) = self.peek() {
                if ch.is_whitespace() {
                    self.bump();
                    progressed = true;
                } else {
                    break;
                }
            }

            let mut handled_comment = false;
            if let Some((start, '/')) = self.peek() {
                if self.source[start..].starts_with("//") {
                    self.eat(2);
                    while let Some((_, ch)) = self.peek() {
                        if ch == '\n' {
                            break;
                        }
                        self.bump();
                    }
                    handled_comment = true;
                } else if self.source[start..].starts_with("/*") {
                    self.eat(2);
                    let mut depth = 1;
                    while let Some((_, ch)) = self.bump() {
                        if ch == '/' {
                            if let Some((_, '*')) = self.peek() {
                                self.bump();
                                depth += 1;
                            }
                        } else if ch == '*' {
                            if let Some((_, '/')) = self.peek() {
                                self.bump();
                                depth -= 1;
                                if depth == 0 {
                                    break;
                                }
                            }
                        }
                    }
                    handled_comment = true;
                }
            }

            if handled_comment {
                progressed = true;
            }
            if !progressed {
                break;
            }
        }
    }

    fn identifier_or_keyword(&mut self, start: usize, line: usize) -> Token {
        while let Some((_, ch)) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                self.bump();
            } else {
                break;
            }
        }
        let end = self.current;
        let lexeme = self.source[start..end].to_string();
        let kind = if lexeme == "_" {
            TokenKind::Underscore
        } else {
            keyword_for(&lexeme).unwrap_or(TokenKind::Identifier)
        };
        Token {
            kind,
            lexeme,
            span: SourceSpan { start, end },
            line,
        }
    }

    fn number_literal(&mut self, start: usize, line: usize) -> Token {
        let mut seen_dot = false;
        let mut seen_exp = false;
        while let Some((idx, ch)) = self.peek() {
            match ch {
                '0'..='9' | '_' => {
                    self.bump();
                }
                '.' if !seen_dot && !seen_exp => {
                    // a dot only continues the number when a digit follows;
                    // otherwise it belongs to the next token
                    if !self.source[idx + 1..].starts_with(|c: char| c.is_ascii_digit()) {
                        break;
                    }
                    seen_dot = true;
                    self.bump();
                }
                'e' | 'E' if !seen_exp => {
                    let follows = &self.source[idx + 1..];
                    let ok = follows.starts_with(|c: char| c.is_ascii_digit())
                        || (follows.starts_with(['+', '-'])
                            && follows[1..].starts_with(|c: char| c.is_ascii_digit()));
                    if !ok {
                        break;
                    }
                    seen_exp = true;
                    self.bump();
                    if let Some((_, '+' | '-')) = self.peek() {
                        self.bump();
                    }
                }
                _ => break,
            }
        }
        let end = self.current;
        Token {
            kind: TokenKind::Number,
            lexeme: self.source[start..end].to_string(),
            span: SourceSpan { start, end },
            line,
        }
    }

    fn string_literal(&mut self, start: usize, line: usize) -> Result<Token, Diagnostic> {
        let mut end = self.current;
        let mut value = String::new();
        while let Some((idx, ch)) = self.bump() {
            end = idx + ch.len_utf8();
            match ch {
                '"' => {
                    return Ok(Token {
                        kind: TokenKind::Str,
                        lexeme: value,
                        span: SourceSpan { start, end },
                        line,
                    });
                }
                '\\' => {
                    if let Some((esc_idx, esc)) = self.bump() {
                        end = esc_idx + esc.len_utf8();
                        match esc {
                            'n' => value.push('\n'),
                            'r' => value.push('\r'),
                            't' => value.push('\t'),
                            '"' => value.push('"'),
                            '\\' => value.push('\\'),
                            other => value.push(other),
                        }
                    } else {
                        break;
                    }
                }
                _ => value.push(ch),
            }
        }
        Err(
            Diagnostic::new(ErrorKind::Syntax, "unterminated string literal")
                .with_span(SourceSpan { start, end }),
        )
    }

    fn simple_token(&mut self, start: usize, line: usize, kind: TokenKind) -> Token {
        let end = self.current;
        Token {
            kind,
            lexeme: self.source[start..end].to_string(),
            span: SourceSpan { start, end },
            line,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, Diagnostic> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            let line = self.line;
            let (start, ch) = match self.bump() {
                Some(pair) => pair,
                None => {
                    tokens.push(Token {
                        kind: TokenKind::Eof,
                        lexeme: String::new(),
                        span: SourceSpan {
                            start: self.current,
                            end: self.current,
                        },
                        line,
                    });
                    break;
                }
            };

            let token = match ch {
                'a'..='z' | 'A'..='Z' | '_' => self.identifier_or_keyword(start, line),
                '0'..='9' => self.number_literal(start, line),
                '"' => self.string_literal(start, line)?,
                '$' => self.simple_token(start, line, TokenKind::Dollar),
                '(' => self.simple_token(start, line, TokenKind::LParen),
                ')' => self.simple_token(start, line, TokenKind::RParen),
                '[' => self.simple_token(start, line, TokenKind::LBracket),
                ']' => self.simple_token(start, line, TokenKind::RBracket),
                '{' => self.simple_token(start, line, TokenKind::LBrace),
                '}' => self.simple_token(start, line, TokenKind::RBrace),
                ',' => self.simple_token(start, line, TokenKind::Comma),
                ':' => self.simple_token(start, line, TokenKind::Colon),
                ';' => self.simple_token(start, line, TokenKind::Semicolon),
                '.' => {
                    if self.continues_with(start, '.', "..") {
                        self.eat(2);
                        self.simple_token(start, line, TokenKind::Ellipsis)
                    } else {
                        self.simple_token(start, line, TokenKind::Dot)
                    }
                }
                '+' => self.simple_token(start, line, TokenKind::Plus),
                '-' => {
                    if self.continues_with(start, '-', "-->") {
                        self.eat(3);
                        self.simple_token(start, line, TokenKind::AssertArrow)
                    } else if self.continues_with(start, '-', ">") {
                        self.eat(1);
                        self.simple_token(start, line, TokenKind::Arrow)
                    } else {
                        self.simple_token(start, line, TokenKind::Minus)
                    }
                }
                '*' => self.simple_token(start, line, TokenKind::Star),
                '/' => self.simple_token(start, line, TokenKind::Slash),
                '%' => self.simple_token(start, line, TokenKind::Percent),
                '^' => self.simple_token(start, line, TokenKind::Caret),
                '=' => {
                    if self.continues_with(start, '=', "=") {
                        self.eat(1);
                        self.simple_token(start, line, TokenKind::EqualEqual)
                    } else {
                        self.simple_token(start, line, TokenKind::Assign)
                    }
                }
                '!' => {
                    if self.continues_with(start, '!', "=") {
                        self.eat(1);
                        self.simple_token(start, line, TokenKind::BangEqual)
                    } else {
                        self.simple_token(start, line, TokenKind::Bang)
                    }
                }
                '<' => {
                    if self.continues_with(start, '<', "=") {
                        self.eat(1);
                        self.simple_token(start, line, TokenKind::LessEqual)
                    } else {
                        self.simple_token(start, line, TokenKind::Less)
                    }
                }
                '>' => {
                    if self.continues_with(start, '>', "=") {
                        self.eat(1);
                        self.simple_token(start, line, TokenKind::GreaterEqual)
                    } else if self.continues_with(start, '>', ">") {
                        self.eat(1);
                        self.simple_token(start, line, TokenKind::Compose)
                    } else {
                        self.simple_token(start, line, TokenKind::Greater)
                    }
                }
                '&' => {
                    if self.continues_with(start, '&', "&") {
                        self.eat(1);
                        self.simple_token(start, line, TokenKind::AmpAmp)
                    } else {
                        self.simple_token(start, line, TokenKind::Unknown)
                    }
                }
                '|' => {
                    if self.continues_with(start, '|', "|") {
                        self.eat(1);
                        self.simple_token(start, line, TokenKind::PipePipe)
                    } else if self.continues_with(start, '|', ">") {
                        self.eat(1);
                        self.simple_token(start, line, TokenKind::PipeInto)
                    } else {
                        self.simple_token(start, line, TokenKind::Unknown)
                    }
                }
                _ => self.simple_token(start, line, TokenKind::Unknown),
            };
            tokens.push(token);
        }
        Ok(tokens)
    }
}

fn keyword_for(ident: &str) -> Option<TokenKind> {
    use self::Keyword as Kw;
    let keyword = match ident {
        "let" => Kw::Let,
        "in" => Kw::In,
        "const" => Kw::Const,
        "if" => Kw::If,
        "then" => Kw::Then,
        "else" => Kw::Else,
        "true" => Kw::True,
        "false" => Kw::False,
        "import" => Kw::Import,
        "export" => Kw::Export,
        "from" => Kw::From,
        "del" => Kw::Del,
        _ => return None,
    };
    Some(TokenKind::Keyword(keyword))
}
