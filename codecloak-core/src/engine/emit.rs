//! Joining output pieces into program text

use super::lexer::is_id_part;
use super::rewrite::Piece;

/// Position of one emitted piece, for the source map. Lines are 0-based on
/// the generated side and 1-based on the source side; columns count chars.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub generated_line: usize,
    pub generated_column: usize,
    pub source_line: usize,
    pub source_column: usize,
    pub name: Option<String>,
}

#[derive(Debug, Default)]
pub struct Emitted {
    pub code: String,
    pub mappings: Vec<Mapping>,
}

/// Tokens that continue the expression before them, so a line break in
/// front of them never ends a statement.
const CONTINUATIONS: &[&str] = &[
    ".", "?.", ",", ")", "]", "}", ";", "?", "??", ":", "=", "==", "===", "!=", "!==", "=>", "*",
    "**", "%", "&", "&&", "|", "||", "^", "<", ">", "<=", ">=", "<<", ">>", ">>>", "+=", "-=",
    "*=", "/=", "%=", "**=", "<<=", ">>=", ">>>=", "&=", "|=", "^=", "&&=", "||=", "??=", "in",
    "instanceof",
];

struct Writer {
    emitted: Emitted,
    line: usize,
    column: usize,
}

impl Writer {
    fn write(&mut self, text: &str) {
        for c in text.chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
        self.emitted.code.push_str(text);
    }
}

pub fn emit(hashbang: Option<&str>, pieces: &[Piece], compact: bool) -> Emitted {
    let mut writer = Writer {
        emitted: Emitted::default(),
        line: 0,
        column: 0,
    };
    let mut after_hashbang = false;
    if let Some(hashbang) = hashbang {
        writer.write(hashbang);
        after_hashbang = true;
    }

    let mut prev: Option<&Piece> = None;
    for piece in pieces {
        let mut gap = match prev {
            None if compact || writer.emitted.code.is_empty() => String::new(),
            None => piece.leading.clone(),
            Some(prev) => separator(prev, piece, compact),
        };
        if after_hashbang {
            if !gap.contains('\n') {
                gap.insert(0, '\n');
            }
            after_hashbang = false;
        }
        writer.write(&gap);

        if let Some(origin) = &piece.origin {
            let mapping = Mapping {
                generated_line: writer.line,
                generated_column: writer.column,
                source_line: origin.line,
                source_column: origin.column,
                name: origin.name.clone(),
            };
            writer.emitted.mappings.push(mapping);
        }
        writer.write(&piece.text);
        prev = Some(piece);
    }
    writer.emitted
}

fn separator(prev: &Piece, next: &Piece, compact: bool) -> String {
    let space = needs_space(&prev.text, &next.text);
    let newline = needs_newline(prev, next);
    if compact {
        return if newline {
            "\n".to_string()
        } else if space {
            " ".to_string()
        } else {
            String::new()
        };
    }
    if newline && !next.leading.contains('\n') {
        "\n".to_string()
    } else if space && next.leading.is_empty() {
        " ".to_string()
    } else {
        next.leading.clone()
    }
}

/// Joining `prev` and `next` directly would change how they tokenize.
fn needs_space(prev: &str, next: &str) -> bool {
    let (Some(a), Some(b)) = (prev.chars().last(), next.chars().next()) else {
        return false;
    };
    let word = |c: char| is_id_part(c) || c == '\\';
    (word(a) && word(b))
        || (a == '+' && b == '+')
        || (a == '-' && (b == '-' || b == '>'))
        || (a == '/' && (b == '/' || b == '*'))
        || (a == '<' && b == '!')
        || (a.is_ascii_digit() && b == '.')
}

/// A source line break that automatic semicolon insertion may depend on.
fn needs_newline(prev: &Piece, next: &Piece) -> bool {
    next.newline_before && prev.ends_expression && !CONTINUATIONS.contains(&next.text.as_str())
}
