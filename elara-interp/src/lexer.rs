use std::fmt;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Illegal,
    Eof,
    Newline,

    LParen,
    RParen,
    LBrace,
    RBrace,
    LAngle,
    RAngle,
    LSquare,
    RSquare,

    Let,
    Mut,
    Extend,
    Return,
    While,
    Struct,
    Namespace,
    Type,
    If,
    Else,
    As,
    Is,

    Add,
    Subtract,
    Multiply,
    Slash,
    Mod,
    And,
    Or,
    Xor,
    Equals,
    NotEquals,
    GreaterEqual,
    LesserEqual,
    Not,
    TypeOr,
    TypeAnd,

    Equal,
    Arrow,
    Dot,
    Comma,
    Colon,

    BooleanTrue,
    BooleanFalse,
    String,
    Char,
    Int,
    Float,

    Identifier,
    Underscore,
}

impl TokenKind {
    pub fn name(self) -> &'static str {
        match self {
            TokenKind::Illegal => "illegal token",
            TokenKind::Eof => "end of input",
            TokenKind::Newline => "newline",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::LAngle => "'<'",
            TokenKind::RAngle => "'>'",
            TokenKind::LSquare => "'['",
            TokenKind::RSquare => "']'",
            TokenKind::Let => "'let'",
            TokenKind::Mut => "'mut'",
            TokenKind::Extend => "'extend'",
            TokenKind::Return => "'return'",
            TokenKind::While => "'while'",
            TokenKind::Struct => "'struct'",
            TokenKind::Namespace => "'namespace'",
            TokenKind::Type => "'type'",
            TokenKind::If => "'if'",
            TokenKind::Else => "'else'",
            TokenKind::As => "'as'",
            TokenKind::Is => "'is'",
            TokenKind::Add => "'+'",
            TokenKind::Subtract => "'-'",
            TokenKind::Multiply => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Mod => "'%'",
            TokenKind::And => "'&&'",
            TokenKind::Or => "'||'",
            TokenKind::Xor => "'^'",
            TokenKind::Equals => "'=='",
            TokenKind::NotEquals => "'!='",
            TokenKind::GreaterEqual => "'>='",
            TokenKind::LesserEqual => "'<='",
            TokenKind::Not => "'!'",
            TokenKind::TypeOr => "'|'",
            TokenKind::TypeAnd => "'&'",
            TokenKind::Equal => "'='",
            TokenKind::Arrow => "'->'",
            TokenKind::Dot => "'.'",
            TokenKind::Comma => "','",
            TokenKind::Colon => "':'",
            TokenKind::BooleanTrue => "'true'",
            TokenKind::BooleanFalse => "'false'",
            TokenKind::String => "string literal",
            TokenKind::Char => "char literal",
            TokenKind::Int => "integer literal",
            TokenKind::Float => "float literal",
            TokenKind::Identifier => "identifier",
            TokenKind::Underscore => "'_'",
        }
    }

    /// Tokens that end an expression or statement.
    pub fn is_terminator(self) -> bool {
        matches!(self, TokenKind::Newline | TokenKind::Eof | TokenKind::RBrace)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub position: Position,
    /// Set on tokens spliced in by the parser rather than read from source.
    pub synthetic: bool,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, position: Position) -> Self {
        Self {
            kind,
            text: text.into(),
            position,
            synthetic: false,
        }
    }

    pub fn synthetic(kind: TokenKind, text: &str, position: Position) -> Self {
        Self {
            kind,
            text: text.to_string(),
            position,
            synthetic: true,
        }
    }

    pub fn eof(position: Position) -> Self {
        Self::new(TokenKind::Eof, "", position)
    }
}

pub struct Lexer {
    chars: Vec<char>,
    index: usize,
    line: usize,
    column: usize,
    finished: bool,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            index: 0,
            line: 1,
            column: 1,
            finished: false,
        }
    }

    /// Reads every token up to and including end of input.
    pub fn tokenize(source: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();
        let position = Position::new(self.line, self.column);
        let Some(ch) = self.current() else {
            self.finished = true;
            return Token::eof(position);
        };

        let (kind, text) = match ch {
            '\n' | ';' => {
                self.advance();
                (TokenKind::Newline, ch.to_string())
            }
            '(' => self.single(TokenKind::LParen),
            ')' => self.single(TokenKind::RParen),
            '{' => self.single(TokenKind::LBrace),
            '}' => self.single(TokenKind::RBrace),
            '[' => self.single(TokenKind::LSquare),
            ']' => self.single(TokenKind::RSquare),
            ',' => self.single(TokenKind::Comma),
            ':' => self.single(TokenKind::Colon),
            '.' => self.single(TokenKind::Dot),
            '+' => self.single(TokenKind::Add),
            '*' => self.single(TokenKind::Multiply),
            '/' => self.single(TokenKind::Slash),
            '%' => self.single(TokenKind::Mod),
            '^' => self.single(TokenKind::Xor),
            '-' => self.pair('>', TokenKind::Arrow, TokenKind::Subtract),
            '=' => self.pair('=', TokenKind::Equals, TokenKind::Equal),
            '!' => self.pair('=', TokenKind::NotEquals, TokenKind::Not),
            '<' => self.pair('=', TokenKind::LesserEqual, TokenKind::LAngle),
            '>' => self.pair('=', TokenKind::GreaterEqual, TokenKind::RAngle),
            '&' => self.pair('&', TokenKind::And, TokenKind::TypeAnd),
            '|' => self.pair('|', TokenKind::Or, TokenKind::TypeOr),
            '"' => self.consume_string(),
            '\'' => self.consume_char(),
            c if c.is_ascii_digit() => self.consume_number(),
            c if is_ident_start(c) => {
                let ident = self.consume_ident();
                let kind = keyword(&ident).unwrap_or(TokenKind::Identifier);
                (kind, ident)
            }
            other => {
                self.advance();
                (TokenKind::Illegal, other.to_string())
            }
        };

        Token::new(kind, text, position)
    }

    fn current(&self) -> Option<char> {
        self.chars.get(self.index).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.index + 1).copied()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current() {
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            self.index += 1;
        }
    }

    fn single(&mut self, kind: TokenKind) -> (TokenKind, String) {
        let text = self.current().map(String::from).unwrap_or_default();
        self.advance();
        (kind, text)
    }

    fn pair(&mut self, second: char, matched: TokenKind, lone: TokenKind) -> (TokenKind, String) {
        let mut text = self.current().map(String::from).unwrap_or_default();
        self.advance();
        if self.current() == Some(second) {
            text.push(second);
            self.advance();
            (matched, text)
        } else {
            (lone, text)
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while matches!(self.current(), Some(c) if c != '\n' && c.is_whitespace()) {
                self.advance();
            }
            if self.current() == Some('#') {
                while matches!(self.current(), Some(c) if c != '\n') {
                    self.advance();
                }
                continue;
            }
            break;
        }
    }

    fn consume_number(&mut self) -> (TokenKind, String) {
        let mut text = String::new();
        while let Some(ch) = self.current() {
            if ch.is_ascii_digit() {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        let fraction_follows = self.current() == Some('.')
            && matches!(self.peek_next(), Some(c) if c.is_ascii_digit());
        if !fraction_follows {
            return (TokenKind::Int, text);
        }
        text.push('.');
        self.advance();
        while let Some(ch) = self.current() {
            if ch.is_ascii_digit() {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        (TokenKind::Float, text)
    }

    fn consume_string(&mut self) -> (TokenKind, String) {
        self.advance();
        let mut out = String::new();
        loop {
            let Some(ch) = self.current() else {
                return (TokenKind::Illegal, format!("\"{out}"));
            };
            match ch {
                '"' => {
                    self.advance();
                    break;
                }
                '\\' => {
                    self.advance();
                    let Some(escaped) = self.current() else {
                        return (TokenKind::Illegal, format!("\"{out}\\"));
                    };
                    match unescape(escaped) {
                        Some(mapped) => out.push(mapped),
                        None => {
                            self.advance();
                            return (TokenKind::Illegal, format!("\\{escaped}"));
                        }
                    }
                    self.advance();
                }
                '\n' => return (TokenKind::Illegal, format!("\"{out}")),
                other => {
                    out.push(other);
                    self.advance();
                }
            }
        }
        (TokenKind::String, out)
    }

    fn consume_char(&mut self) -> (TokenKind, String) {
        self.advance();
        let value = match self.current() {
            Some('\\') => {
                self.advance();
                let escaped = self.current().and_then(unescape);
                self.advance();
                escaped
            }
            Some('\'') | Some('\n') | None => None,
            Some(other) => {
                self.advance();
                Some(other)
            }
        };
        match (value, self.current()) {
            (Some(value), Some('\'')) => {
                self.advance();
                (TokenKind::Char, value.to_string())
            }
            (value, _) => (
                TokenKind::Illegal,
                format!("'{}", value.map(String::from).unwrap_or_default()),
            ),
        }
    }

    fn consume_ident(&mut self) -> String {
        let mut text = String::new();
        while let Some(ch) = self.current() {
            if is_ident_continue(ch) {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        text
    }
}

impl Iterator for Lexer {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.finished {
            return None;
        }
        Some(self.next_token())
    }
}

fn keyword(ident: &str) -> Option<TokenKind> {
    let kind = match ident {
        "let" => TokenKind::Let,
        "mut" => TokenKind::Mut,
        "extend" => TokenKind::Extend,
        "return" => TokenKind::Return,
        "while" => TokenKind::While,
        "struct" => TokenKind::Struct,
        "namespace" => TokenKind::Namespace,
        "type" => TokenKind::Type,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "as" => TokenKind::As,
        "is" => TokenKind::Is,
        "true" => TokenKind::BooleanTrue,
        "false" => TokenKind::BooleanFalse,
        "_" => TokenKind::Underscore,
        _ => return None,
    };
    Some(kind)
}

fn unescape(ch: char) -> Option<char> {
    match ch {
        'n' => Some('\n'),
        'r' => Some('\r'),
        't' => Some('\t'),
        '\\' => Some('\\'),
        '"' => Some('"'),
        '\'' => Some('\''),
        '0' => Some('\0'),
        _ => None,
    }
}

fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

fn is_ident_continue(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}
