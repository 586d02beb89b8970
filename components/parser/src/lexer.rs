//! Lexer - tokenizes source code into tokens

use core_types::{ScriptError, SourcePosition};

use crate::error::syntax_error;

/// Reserved words
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    /// null literal
    Null,
    /// true literal
    True,
    /// false literal
    False,
    /// let declaration
    Let,
    /// if statement
    If,
    /// else branch
    Else,
    /// while loop
    While,
    /// do-while loop
    Do,
    /// for loop
    For,
    /// in (for-in)
    In,
    /// of (for-of)
    Of,
    /// break statement
    Break,
    /// continue statement
    Continue,
    /// function declaration or expression
    Function,
    /// return statement
    Return,
    /// typeof operator
    Typeof,
    /// delete statement
    Delete,
    /// try statement
    Try,
    /// catch clause
    Catch,
    /// finally clause
    Finally,
    /// throw statement
    Throw,
}

impl Keyword {
    fn from_str(word: &str) -> Option<Keyword> {
        let keyword = match word {
            "null" => Keyword::Null,
            "true" => Keyword::True,
            "false" => Keyword::False,
            "let" => Keyword::Let,
            "if" => Keyword::If,
            "else" => Keyword::Else,
            "while" => Keyword::While,
            "do" => Keyword::Do,
            "for" => Keyword::For,
            "in" => Keyword::In,
            "of" => Keyword::Of,
            "break" => Keyword::Break,
            "continue" => Keyword::Continue,
            "function" => Keyword::Function,
            "return" => Keyword::Return,
            "typeof" => Keyword::Typeof,
            "delete" => Keyword::Delete,
            "try" => Keyword::Try,
            "catch" => Keyword::Catch,
            "finally" => Keyword::Finally,
            "throw" => Keyword::Throw,
            _ => return None,
        };
        Some(keyword)
    }
}

/// Operators and delimiters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Punctuator {
    /// (
    LParen,
    /// )
    RParen,
    /// {
    LBrace,
    /// }
    RBrace,
    /// [
    LBracket,
    /// ]
    RBracket,
    /// ;
    Semicolon,
    /// ,
    Comma,
    /// .
    Dot,
    /// ...
    Spread,
    /// ?.
    OptionalChain,
    /// :
    Colon,
    /// ::
    Bind,
    /// ?
    Question,
    /// =
    Assign,
    /// +=
    PlusAssign,
    /// -=
    MinusAssign,
    /// *=
    StarAssign,
    /// /=
    SlashAssign,
    /// %=
    PercentAssign,
    /// **=
    StarStarAssign,
    /// +
    Plus,
    /// -
    Minus,
    /// *
    Star,
    /// /
    Slash,
    /// %
    Percent,
    /// **
    StarStar,
    /// ++
    PlusPlus,
    /// --
    MinusMinus,
    /// ==
    EqEq,
    /// !=
    NotEq,
    /// <
    Lt,
    /// <=
    LtEq,
    /// >
    Gt,
    /// >=
    GtEq,
    /// !
    Bang,
    /// &&
    AndAnd,
    /// ||
    OrOr,
}

/// Token types
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifier
    Identifier(String),
    /// Number literal
    Number(f64),
    /// String literal with escapes already decoded
    String(String),
    /// Keyword
    Keyword(Keyword),
    /// Punctuator/operator
    Punctuator(Punctuator),
    /// End of input
    EOF,
}

/// Lexer over a source string
pub struct Lexer<'a> {
    source: &'a str,
    chars: Vec<char>,
    position: usize,
    line: u32,
    column: u32,
    peeked: Option<(Token, SourcePosition)>,
    token_position: SourcePosition,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source code
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
            peeked: None,
            token_position: SourcePosition::new(1, 1, 0),
        }
    }

    /// The source being tokenized
    pub fn source(&self) -> &'a str {
        self.source
    }

    /// Consume and return the next token
    pub fn next_token(&mut self) -> Result<Token, ScriptError> {
        if let Some((token, position)) = self.peeked.take() {
            self.token_position = position;
            return Ok(token);
        }
        let (token, position) = self.scan_token()?;
        self.token_position = position;
        Ok(token)
    }

    /// Look at the next token without consuming it
    pub fn peek_token(&mut self) -> Result<&Token, ScriptError> {
        if self.peeked.is_none() {
            let scanned = self.scan_token()?;
            self.peeked = Some(scanned);
        }
        match &self.peeked {
            Some((token, _)) => Ok(token),
            None => Err(syntax_error("Unexpected end of input", None)),
        }
    }

    /// Position of the token that `peek_token` would return
    pub fn peek_position(&mut self) -> Result<SourcePosition, ScriptError> {
        self.peek_token()?;
        Ok(self
            .peeked
            .as_ref()
            .map(|(_, position)| *position)
            .unwrap_or(self.token_position))
    }

    /// Position of the most recently consumed token
    pub fn token_position(&self) -> SourcePosition {
        self.token_position
    }

    fn scan_token(&mut self) -> Result<(Token, SourcePosition), ScriptError> {
        self.skip_whitespace_and_comments()?;
        let start = self.current_position();
        if self.is_at_end() {
            return Ok((Token::EOF, start));
        }
        let c = self.advance();
        let token = match c {
            '(' => Token::Punctuator(Punctuator::LParen),
            ')' => Token::Punctuator(Punctuator::RParen),
            '{' => Token::Punctuator(Punctuator::LBrace),
            '}' => Token::Punctuator(Punctuator::RBrace),
            '[' => Token::Punctuator(Punctuator::LBracket),
            ']' => Token::Punctuator(Punctuator::RBracket),
            ';' => Token::Punctuator(Punctuator::Semicolon),
            ',' => Token::Punctuator(Punctuator::Comma),
            '.' => {
                if self.peek() == '.' && self.peek_next() == Some('.') {
                    self.advance();
                    self.advance();
                    Token::Punctuator(Punctuator::Spread)
                } else if self.peek().is_ascii_digit() {
                    return Ok((self.scan_number(c, start)?, start));
                } else {
                    Token::Punctuator(Punctuator::Dot)
                }
            }
            ':' => {
                if self.match_char(':') {
                    Token::Punctuator(Punctuator::Bind)
                } else {
                    Token::Punctuator(Punctuator::Colon)
                }
            }
            '?' => {
                // `a?.5:b` is a conditional, not optional chaining
                if self.peek() == '.' && !self.peek_next().map_or(false, |n| n.is_ascii_digit()) {
                    self.advance();
                    Token::Punctuator(Punctuator::OptionalChain)
                } else {
                    Token::Punctuator(Punctuator::Question)
                }
            }
            '=' => {
                if self.match_char('=') {
                    Token::Punctuator(Punctuator::EqEq)
                } else {
                    Token::Punctuator(Punctuator::Assign)
                }
            }
            '!' => {
                if self.match_char('=') {
                    Token::Punctuator(Punctuator::NotEq)
                } else {
                    Token::Punctuator(Punctuator::Bang)
                }
            }
            '<' => {
                if self.match_char('=') {
                    Token::Punctuator(Punctuator::LtEq)
                } else {
                    Token::Punctuator(Punctuator::Lt)
                }
            }
            '>' => {
                if self.match_char('=') {
                    Token::Punctuator(Punctuator::GtEq)
                } else {
                    Token::Punctuator(Punctuator::Gt)
                }
            }
            '+' => {
                if self.match_char('+') {
                    Token::Punctuator(Punctuator::PlusPlus)
                } else if self.match_char('=') {
                    Token::Punctuator(Punctuator::PlusAssign)
                } else {
                    Token::Punctuator(Punctuator::Plus)
                }
            }
            '-' => {
                if self.match_char('-') {
                    Token::Punctuator(Punctuator::MinusMinus)
                } else if self.match_char('=') {
                    Token::Punctuator(Punctuator::MinusAssign)
                } else {
                    Token::Punctuator(Punctuator::Minus)
                }
            }
            '*' => {
                if self.match_char('*') {
                    if self.match_char('=') {
                        Token::Punctuator(Punctuator::StarStarAssign)
                    } else {
                        Token::Punctuator(Punctuator::StarStar)
                    }
                } else if self.match_char('=') {
                    Token::Punctuator(Punctuator::StarAssign)
                } else {
                    Token::Punctuator(Punctuator::Star)
                }
            }
            '/' => {
                if self.match_char('=') {
                    Token::Punctuator(Punctuator::SlashAssign)
                } else {
                    Token::Punctuator(Punctuator::Slash)
                }
            }
            '%' => {
                if self.match_char('=') {
                    Token::Punctuator(Punctuator::PercentAssign)
                } else {
                    Token::Punctuator(Punctuator::Percent)
                }
            }
            '&' => {
                if self.match_char('&') {
                    Token::Punctuator(Punctuator::AndAnd)
                } else {
                    return Err(syntax_error("Unexpected character '&'", Some(start)));
                }
            }
            '|' => {
                if self.match_char('|') {
                    Token::Punctuator(Punctuator::OrOr)
                } else {
                    return Err(syntax_error("Unexpected character '|'", Some(start)));
                }
            }
            '"' | '\'' => self.scan_string(c, start)?,
            c if c.is_ascii_digit() => self.scan_number(c, start)?,
            c if is_id_start(c) => self.scan_identifier(c),
            other => {
                return Err(syntax_error(
                    format!("Unexpected character '{}'", other),
                    Some(start),
                ))
            }
        };
        Ok((token, start))
    }

    fn scan_string(&mut self, quote: char, start: SourcePosition) -> Result<Token, ScriptError> {
        let mut value = String::new();
        loop {
            if self.is_at_end() || self.peek() == '\n' {
                return Err(syntax_error("Unterminated string", Some(start)));
            }
            let c = self.advance();
            if c == quote {
                break;
            }
            if c != '\\' {
                value.push(c);
                continue;
            }
            if self.is_at_end() {
                return Err(syntax_error("Unterminated string", Some(start)));
            }
            let escaped = self.advance();
            match escaped {
                'n' => value.push('\n'),
                't' => value.push('\t'),
                'r' => value.push('\r'),
                'b' => value.push('\u{8}'),
                'f' => value.push('\u{c}'),
                '0' => value.push('\0'),
                '\\' => value.push('\\'),
                '/' => value.push('/'),
                '\'' => value.push('\''),
                '"' => value.push('"'),
                'u' => value.push(self.scan_unicode_escape(start)?),
                other => {
                    return Err(syntax_error(
                        format!("Invalid escape sequence '\\{}'", other),
                        Some(self.current_position()),
                    ))
                }
            }
        }
        Ok(Token::String(value))
    }

    fn scan_unicode_escape(&mut self, start: SourcePosition) -> Result<char, ScriptError> {
        let mut code = 0u32;
        for _ in 0..4 {
            let digit = if self.is_at_end() { None } else { self.advance().to_digit(16) };
            match digit {
                Some(d) => code = code * 16 + d,
                None => return Err(syntax_error("Invalid \\u escape", Some(start))),
            }
        }
        char::from_u32(code).ok_or_else(|| syntax_error("Invalid \\u escape", Some(start)))
    }

    fn scan_number(&mut self, first: char, start: SourcePosition) -> Result<Token, ScriptError> {
        if first == '0' && (self.peek() == 'x' || self.peek() == 'X') {
            self.advance();
            let mut digits = String::new();
            while self.peek().is_ascii_hexdigit() {
                digits.push(self.advance());
            }
            return u64::from_str_radix(&digits, 16)
                .map(|n| Token::Number(n as f64))
                .map_err(|_| syntax_error("Invalid hexadecimal literal", Some(start)));
        }

        let mut text = String::new();
        text.push(first);
        while self.peek().is_ascii_digit() {
            text.push(self.advance());
        }
        if first != '.' && self.peek() == '.' && self.peek_next().map_or(false, |c| c.is_ascii_digit()) {
            text.push(self.advance());
            while self.peek().is_ascii_digit() {
                text.push(self.advance());
            }
        }
        if self.peek() == 'e' || self.peek() == 'E' {
            text.push(self.advance());
            if self.peek() == '+' || self.peek() == '-' {
                text.push(self.advance());
            }
            if !self.peek().is_ascii_digit() {
                return Err(syntax_error("Invalid number literal", Some(start)));
            }
            while self.peek().is_ascii_digit() {
                text.push(self.advance());
            }
        }
        if is_id_start(self.peek()) {
            return Err(syntax_error("Identifier directly after number", Some(start)));
        }
        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| syntax_error("Invalid number literal", Some(start)))
    }

    fn scan_identifier(&mut self, first: char) -> Token {
        let mut name = String::new();
        name.push(first);
        while !self.is_at_end() && is_id_continue(self.peek()) {
            name.push(self.advance());
        }
        match Keyword::from_str(&name) {
            Some(keyword) => Token::Keyword(keyword),
            None => Token::Identifier(name),
        }
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), ScriptError> {
        while !self.is_at_end() {
            match self.peek() {
                '\n' => {
                    self.advance();
                    self.line += 1;
                    self.column = 1;
                }
                c if c.is_whitespace() => {
                    self.advance();
                }
                '/' if self.peek_next() == Some('/') => {
                    while !self.is_at_end() && self.peek() != '\n' {
                        self.advance();
                    }
                }
                '/' if self.peek_next() == Some('*') => {
                    let start = self.current_position();
                    self.advance();
                    self.advance();
                    loop {
                        if self.is_at_end() {
                            return Err(syntax_error("Unterminated multi-line comment", Some(start)));
                        }
                        if self.peek() == '*' && self.peek_next() == Some('/') {
                            self.advance();
                            self.advance();
                            break;
                        }
                        if self.advance() == '\n' {
                            self.line += 1;
                            self.column = 1;
                        }
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.chars.len()
    }

    fn peek(&self) -> char {
        if self.is_at_end() {
            '\0'
        } else {
            self.chars[self.position]
        }
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.position + 1).copied()
    }

    fn advance(&mut self) -> char {
        let ch = self.chars[self.position];
        self.position += 1;
        self.column += 1;
        ch
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == expected && !self.is_at_end() {
            self.advance();
            true
        } else {
            false
        }
    }

    fn current_position(&self) -> SourcePosition {
        SourcePosition::new(self.line, self.column, self.position)
    }
}

fn is_id_start(ch: char) -> bool {
    ch == '_' || ch == '$' || ch.is_alphabetic()
}

fn is_id_continue(ch: char) -> bool {
    ch == '_' || ch == '$' || ch.is_alphanumeric()
}
