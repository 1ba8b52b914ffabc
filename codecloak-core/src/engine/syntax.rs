//! Structural validation over the token stream

use super::lexer::{Token, TokenKind};
use super::EngineError;

/// For every opening or closing bracket token, the index of its partner.
pub type Matches = Vec<Option<usize>>;

fn syntax_error(token: &Token, message: impl Into<String>) -> EngineError {
    EngineError::Syntax {
        line: token.line,
        column: token.column,
        message: message.into(),
    }
}

/// Pair up brackets and reject obviously malformed declarations.
pub fn check(tokens: &[Token]) -> Result<Matches, EngineError> {
    let matches = match_brackets(tokens)?;
    check_declarations(tokens)?;
    Ok(matches)
}

fn match_brackets(tokens: &[Token]) -> Result<Matches, EngineError> {
    let mut matches = vec![None; tokens.len()];
    // (token index, expected closer)
    let mut stack: Vec<(usize, &str)> = Vec::new();

    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::Punct => match token.text.as_str() {
                "(" => stack.push((i, ")")),
                "[" => stack.push((i, "]")),
                "{" => stack.push((i, "}")),
                closer @ (")" | "]" | "}") => match stack.pop() {
                    Some((open, expected)) if expected == closer => {
                        matches[open] = Some(i);
                        matches[i] = Some(open);
                    }
                    Some((open, expected)) => {
                        return Err(syntax_error(
                            token,
                            format!(
                                "unexpected '{}', expected '{}' to close line {}",
                                closer, expected, tokens[open].line
                            ),
                        ))
                    }
                    None => return Err(syntax_error(token, format!("unexpected '{}'", closer))),
                },
                _ => {}
            },
            TokenKind::TemplateHead => stack.push((i, "}`")),
            TokenKind::TemplateMiddle | TokenKind::TemplateTail => match stack.pop() {
                Some((_, "}`")) => {
                    if token.kind == TokenKind::TemplateMiddle {
                        stack.push((i, "}`"));
                    }
                }
                _ => return Err(syntax_error(token, "unbalanced template substitution")),
            },
            _ => {}
        }
    }

    if let Some((open, _)) = stack.pop() {
        return Err(syntax_error(
            &tokens[open],
            format!("unclosed '{}'", tokens[open].text),
        ));
    }
    Ok(matches)
}

fn check_declarations(tokens: &[Token]) -> Result<(), EngineError> {
    for (i, token) in tokens.iter().enumerate() {
        if token.kind != TokenKind::Keyword {
            continue;
        }
        // `a.var` / `{ const: 1 }` use keywords as property names
        let prev = i.checked_sub(1).map(|p| &tokens[p]);
        if prev.is_some_and(|p| p.is_punct(".") || p.is_punct("?.")) {
            continue;
        }
        if tokens.get(i + 1).is_some_and(|n| n.is_punct(":") || n.is_punct("(")) {
            continue;
        }
        let next = tokens.get(i + 1);
        match token.text.as_str() {
            "var" | "const" => match next {
                Some(n)
                    if n.kind == TokenKind::Identifier
                        || n.is_punct("{")
                        || n.is_punct("[")
                        || n.is_keyword("yield")
                        || n.is_keyword("await")
                        || n.is_keyword("let") => {}
                Some(n) => {
                    return Err(syntax_error(
                        n,
                        format!("unexpected '{}' after '{}'", n.text, token.text),
                    ))
                }
                None => {
                    return Err(syntax_error(
                        token,
                        format!("unexpected end of input after '{}'", token.text),
                    ))
                }
            },
            "function" => match next {
                Some(n)
                    if n.kind == TokenKind::Identifier
                        || n.is_punct("(")
                        || n.is_punct("*")
                        || n.is_keyword("yield")
                        || n.is_keyword("await") => {}
                Some(n) => {
                    return Err(syntax_error(n, format!("unexpected '{}' after 'function'", n.text)))
                }
                None => {
                    return Err(syntax_error(token, "unexpected end of input after 'function'"))
                }
            },
            "class" => match next {
                Some(n)
                    if n.kind == TokenKind::Identifier
                        || n.is_punct("{")
                        || n.is_keyword("extends") => {}
                Some(n) => {
                    return Err(syntax_error(n, format!("unexpected '{}' after 'class'", n.text)))
                }
                None => return Err(syntax_error(token, "unexpected end of input after 'class'")),
            },
            _ => {}
        }
    }
    Ok(())
}
