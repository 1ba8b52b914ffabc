//! ECMAScript tokenizer used by the lexical engine

use super::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    PrivateName,
    Keyword,
    Punct,
    Number,
    String,
    /// Template literal without substitutions.
    Template,
    /// `` `...${ ``
    TemplateHead,
    /// `}...${`
    TemplateMiddle,
    /// `` }...` ``
    TemplateTail,
    Regex,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// 1-based line of the first character.
    pub line: usize,
    /// 0-based column of the first character, counted in chars.
    pub column: usize,
    /// Whitespace that preceded the token, with comments removed.
    pub leading: String,
    pub newline_before: bool,
}

impl Token {
    pub fn is_punct(&self, p: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == p
    }

    pub fn is_keyword(&self, k: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text == k
    }

    pub fn is_ident(&self, name: &str) -> bool {
        self.kind == TokenKind::Identifier && self.text == name
    }

    /// Token ends an expression, so a following `/` is division.
    pub fn ends_expression(&self) -> bool {
        match self.kind {
            TokenKind::Identifier
            | TokenKind::PrivateName
            | TokenKind::Number
            | TokenKind::String
            | TokenKind::Template
            | TokenKind::TemplateTail
            | TokenKind::Regex => true,
            TokenKind::Keyword => matches!(
                self.text.as_str(),
                "this" | "super" | "null" | "true" | "false"
            ),
            TokenKind::Punct => matches!(self.text.as_str(), ")" | "]" | "}" | "++" | "--"),
            TokenKind::TemplateHead | TokenKind::TemplateMiddle => false,
        }
    }
}

/// Result of tokenizing a whole program.
#[derive(Debug, Clone, Default)]
pub struct Lexed {
    pub hashbang: Option<String>,
    pub tokens: Vec<Token>,
}

pub const KEYWORDS: &[&str] = &[
    "await", "break", "case", "catch", "class", "const", "continue", "debugger", "default",
    "delete", "do", "else", "enum", "export", "extends", "false", "finally", "for", "function",
    "if", "import", "in", "instanceof", "let", "new", "null", "return", "super", "switch", "this",
    "throw", "true", "try", "typeof", "var", "void", "while", "with", "yield",
];

/// Longest first, so the first match wins.
const PUNCTUATORS: &[&str] = &[
    ">>>=", "...", "===", "!==", "**=", "<<=", ">>=", ">>>", "&&=", "||=", "??=", "=>", "==",
    "!=", "<=", ">=", "&&", "||", "??", "?.", "++", "--", "+=", "-=", "*=", "/=", "%=", "&=",
    "|=", "^=", "**", "<<", ">>", "{", "}", "(", ")", "[", "]", ";", ",", "<", ">", "+", "-",
    "*", "/", "%", "&", "|", "^", "!", "~", "?", ":", "=", ".", "@",
];

const REGEX_AFTER_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "new", "delete", "void", "throw", "case", "do",
    "else", "yield", "await",
];

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

pub fn is_id_start(c: char) -> bool {
    c == '$' || c == '_' || c.is_ascii_alphabetic() || (!c.is_ascii() && c.is_alphabetic())
}

pub fn is_id_part(c: char) -> bool {
    is_id_start(c)
        || c.is_ascii_digit()
        || c == '\u{200c}'
        || c == '\u{200d}'
        || (!c.is_ascii() && c.is_alphanumeric())
}

fn is_line_terminator(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Brace,
    Template,
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    tokens: Vec<Token>,
    frames: Vec<Frame>,
}

pub fn tokenize(source: &str) -> Result<Lexed, EngineError> {
    let mut lexer = Lexer {
        chars: source.chars().collect(),
        pos: 0,
        line: 1,
        column: 0,
        tokens: Vec::new(),
        frames: Vec::new(),
    };
    let hashbang = lexer.hashbang();
    lexer.run()?;
    Ok(Lexed {
        hashbang,
        tokens: lexer.tokens,
    })
}

impl Lexer {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\r' && self.peek() == Some('\n') {
            self.column += 1;
        } else if is_line_terminator(c) {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, line: usize, column: usize, message: impl Into<String>) -> EngineError {
        EngineError::Syntax {
            line,
            column,
            message: message.into(),
        }
    }

    fn hashbang(&mut self) -> Option<String> {
        if self.peek() == Some('#') && self.peek_at(1) == Some('!') {
            let mut text = String::new();
            while let Some(c) = self.peek() {
                if is_line_terminator(c) {
                    break;
                }
                text.push(c);
                self.bump();
            }
            Some(text)
        } else {
            None
        }
    }

    fn run(&mut self) -> Result<(), EngineError> {
        loop {
            let (leading, newline_before) = self.skip_trivia()?;
            let Some(c) = self.peek() else { break };
            let (line, column) = (self.line, self.column);

            let (kind, text) = if c == '}' && self.frames.last() == Some(&Frame::Template) {
                self.frames.pop();
                self.bump();
                self.template_chunk('}', line, column)?
            } else if is_id_start(c) || c == '\\' {
                let word = self.identifier(line, column)?;
                let kind = if is_keyword(&word) {
                    TokenKind::Keyword
                } else {
                    TokenKind::Identifier
                };
                (kind, word)
            } else if c == '#' && self.peek_at(1).is_some_and(is_id_start) {
                self.bump();
                let word = self.identifier(line, column)?;
                (TokenKind::PrivateName, format!("#{}", word))
            } else if c.is_ascii_digit()
                || (c == '.' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit()))
            {
                (TokenKind::Number, self.number(line, column)?)
            } else if c == '\'' || c == '"' {
                (TokenKind::String, self.string(c, line, column)?)
            } else if c == '`' {
                self.bump();
                self.template_chunk('`', line, column)?
            } else if c == '/' && self.regex_allowed() {
                (TokenKind::Regex, self.regex(line, column)?)
            } else {
                (TokenKind::Punct, self.punctuator(line, column)?)
            };

            match (kind, text.as_str()) {
                (TokenKind::Punct, "{") => self.frames.push(Frame::Brace),
                (TokenKind::Punct, "}") => {
                    self.frames.pop();
                }
                (TokenKind::TemplateHead, _) | (TokenKind::TemplateMiddle, _) => {
                    self.frames.push(Frame::Template)
                }
                _ => {}
            }

            self.tokens.push(Token {
                kind,
                text,
                line,
                column,
                leading,
                newline_before,
            });
        }

        if self.frames.contains(&Frame::Template) {
            return Err(self.error(self.line, self.column, "unterminated template literal"));
        }
        Ok(())
    }

    fn skip_trivia(&mut self) -> Result<(String, bool), EngineError> {
        let mut leading = String::new();
        let mut newline = false;
        while let Some(c) = self.peek() {
            if is_line_terminator(c) {
                newline = true;
                leading.push('\n');
                if c == '\r' && self.peek_at(1) == Some('\n') {
                    self.bump();
                }
                self.bump();
            } else if c.is_whitespace() || c == '\u{feff}' {
                leading.push(c);
                self.bump();
            } else if c == '/' && self.peek_at(1) == Some('/') {
                while let Some(c) = self.peek() {
                    if is_line_terminator(c) {
                        break;
                    }
                    self.bump();
                }
            } else if c == '/' && self.peek_at(1) == Some('*') {
                let (line, column) = (self.line, self.column);
                self.bump();
                self.bump();
                let mut spans_lines = false;
                loop {
                    match self.peek() {
                        None => return Err(self.error(line, column, "unterminated comment")),
                        Some('*') if self.peek_at(1) == Some('/') => {
                            self.bump();
                            self.bump();
                            break;
                        }
                        Some(c) => {
                            if is_line_terminator(c) {
                                spans_lines = true;
                            }
                            self.bump();
                        }
                    }
                }
                if spans_lines {
                    newline = true;
                    leading.push('\n');
                } else {
                    leading.push(' ');
                }
            } else {
                break;
            }
        }
        Ok((leading, newline))
    }

    fn regex_allowed(&self) -> bool {
        match self.tokens.last() {
            None => true,
            Some(prev) if prev.kind == TokenKind::Keyword => {
                REGEX_AFTER_KEYWORDS.contains(&prev.text.as_str()) || !prev.ends_expression()
            }
            Some(prev) => !prev.ends_expression(),
        }
    }

    fn identifier(&mut self, line: usize, column: usize) -> Result<String, EngineError> {
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if c == '\\' {
                // unicode escape inside an identifier, kept verbatim
                if self.peek_at(1) != Some('u') {
                    return Err(self.error(line, column, "invalid escape in identifier"));
                }
                word.push(c);
                self.bump();
                word.push('u');
                self.bump();
                if self.peek() == Some('{') {
                    while let Some(c) = self.bump() {
                        word.push(c);
                        if c == '}' {
                            break;
                        }
                    }
                } else {
                    for _ in 0..4 {
                        match self.bump() {
                            Some(h) if h.is_ascii_hexdigit() => word.push(h),
                            _ => {
                                return Err(self.error(line, column, "invalid escape in identifier"))
                            }
                        }
                    }
                }
            } else if is_id_part(c) {
                word.push(c);
                self.bump();
            } else {
                break;
            }
        }
        Ok(word)
    }

    fn number(&mut self, line: usize, column: usize) -> Result<String, EngineError> {
        let mut text = String::new();
        let first = self.peek().unwrap_or('0');
        let radix_prefix = first == '0'
            && matches!(self.peek_at(1), Some('x' | 'X' | 'o' | 'O' | 'b' | 'B'));

        if radix_prefix {
            for _ in 0..2 {
                if let Some(c) = self.bump() {
                    text.push(c);
                }
            }
            while let Some(c) = self.peek() {
                if c.is_ascii_hexdigit() || c == '_' {
                    text.push(c);
                    self.bump();
                } else {
                    break;
                }
            }
            if text.len() == 2 {
                return Err(self.error(line, column, "missing digits after radix prefix"));
            }
        } else {
            self.digits(&mut text);
            if self.peek() == Some('.') {
                text.push('.');
                self.bump();
                self.digits(&mut text);
            }
            if matches!(self.peek(), Some('e' | 'E')) {
                text.push('e');
                self.bump();
                if let Some(sign @ ('+' | '-')) = self.peek() {
                    text.push(sign);
                    self.bump();
                }
                let before = text.len();
                self.digits(&mut text);
                if text.len() == before {
                    return Err(self.error(line, column, "missing exponent digits"));
                }
            }
        }

        if self.peek() == Some('n') {
            text.push('n');
            self.bump();
        }
        if self.peek().is_some_and(|c| is_id_start(c) || c.is_ascii_digit()) {
            return Err(self.error(
                line,
                column,
                "identifier starts immediately after numeric literal",
            ));
        }
        Ok(text)
    }

    fn digits(&mut self, text: &mut String) {
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '_' {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
    }

    fn string(&mut self, quote: char, line: usize, column: usize) -> Result<String, EngineError> {
        let mut text = String::new();
        text.push(quote);
        self.bump();
        loop {
            match self.peek() {
                None => return Err(self.error(line, column, "unterminated string literal")),
                Some(c) if c == quote => {
                    text.push(c);
                    self.bump();
                    return Ok(text);
                }
                Some('\\') => {
                    text.push('\\');
                    self.bump();
                    match self.peek() {
                        None => {
                            return Err(self.error(line, column, "unterminated string literal"))
                        }
                        Some('\r') if self.peek_at(1) == Some('\n') => {
                            text.push('\r');
                            self.bump();
                            text.push('\n');
                            self.bump();
                        }
                        Some(c) => {
                            text.push(c);
                            self.bump();
                        }
                    }
                }
                Some('\n' | '\r') => {
                    return Err(self.error(line, column, "unterminated string literal"))
                }
                Some(c) => {
                    text.push(c);
                    self.bump();
                }
            }
        }
    }

    /// Scan template characters after an opening `` ` `` or a closing `}`.
    fn template_chunk(
        &mut self,
        opener: char,
        line: usize,
        column: usize,
    ) -> Result<(TokenKind, String), EngineError> {
        let mut text = String::new();
        text.push(opener);
        loop {
            match self.peek() {
                None => return Err(self.error(line, column, "unterminated template literal")),
                Some('`') => {
                    text.push('`');
                    self.bump();
                    let kind = if opener == '`' {
                        TokenKind::Template
                    } else {
                        TokenKind::TemplateTail
                    };
                    return Ok((kind, text));
                }
                Some('$') if self.peek_at(1) == Some('{') => {
                    text.push_str("${");
                    self.bump();
                    self.bump();
                    let kind = if opener == '`' {
                        TokenKind::TemplateHead
                    } else {
                        TokenKind::TemplateMiddle
                    };
                    return Ok((kind, text));
                }
                Some('\\') => {
                    text.push('\\');
                    self.bump();
                    if let Some(c) = self.bump() {
                        text.push(c);
                    }
                }
                Some(c) => {
                    text.push(c);
                    self.bump();
                }
            }
        }
    }

    fn regex(&mut self, line: usize, column: usize) -> Result<String, EngineError> {
        let mut text = String::from("/");
        self.bump();
        let mut in_class = false;
        loop {
            match self.peek() {
                None => {
                    return Err(self.error(line, column, "unterminated regular expression"))
                }
                Some(c) if is_line_terminator(c) => {
                    return Err(self.error(line, column, "unterminated regular expression"))
                }
                Some('\\') => {
                    text.push('\\');
                    self.bump();
                    match self.peek() {
                        Some(c) if !is_line_terminator(c) => {
                            text.push(c);
                            self.bump();
                        }
                        _ => {
                            return Err(self.error(line, column, "unterminated regular expression"))
                        }
                    }
                }
                Some('[') => {
                    in_class = true;
                    text.push('[');
                    self.bump();
                }
                Some(']') => {
                    in_class = false;
                    text.push(']');
                    self.bump();
                }
                Some('/') if !in_class => {
                    text.push('/');
                    self.bump();
                    break;
                }
                Some(c) => {
                    text.push(c);
                    self.bump();
                }
            }
        }
        while let Some(c) = self.peek() {
            if is_id_part(c) {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        Ok(text)
    }

    fn punctuator(&mut self, line: usize, column: usize) -> Result<String, EngineError> {
        for p in PUNCTUATORS {
            let matched = p
                .chars()
                .enumerate()
                .all(|(i, pc)| self.peek_at(i) == Some(pc));
            if !matched {
                continue;
            }
            // `a?.5:b` is a conditional, not optional chaining
            if *p == "?." && self.peek_at(2).is_some_and(|c| c.is_ascii_digit()) {
                continue;
            }
            for _ in 0..p.chars().count() {
                self.bump();
            }
            return Ok((*p).to_string());
        }
        let c = self.peek().unwrap_or('\0');
        Err(self.error(line, column, format!("unexpected character '{}'", c)))
    }
}
