//! Token stream rewriting
//!
//! Turns the analysed token stream into output pieces: renamed identifiers,
//! bracketed member access, string array calls, rewritten numbers, dead
//! branches and the prologue carrying the runtime helpers.

use super::lexer::{Token, TokenKind};
use super::names::NameGenerator;
use super::numbers;
use super::prologue;
use super::rename::Renames;
use super::scope::{Analysis, BraceKind, Role};
use super::settings::EngineSettings;
use super::strings::{cook, quote, StringArray, StringArrayBuilder};
use super::syntax::Matches;
use rand::Rng;
use std::collections::HashMap;
use tracing::debug;

/// Dead branches injected into one program at most.
const MAX_DEAD_BRANCHES: usize = 100;

/// Where an output piece came from in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub line: usize,
    pub column: usize,
    /// Original identifier, for renamed names.
    pub name: Option<String>,
}

/// One unit of output text.
#[derive(Debug, Clone)]
pub struct Piece {
    pub text: String,
    /// Source whitespace before the piece, used when not compacting.
    pub leading: String,
    pub newline_before: bool,
    /// A line break before the following piece may end a statement.
    pub ends_expression: bool,
    pub origin: Option<Origin>,
}

impl Piece {
    fn synthetic(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            leading: String::new(),
            newline_before: false,
            ends_expression: false,
            origin: None,
        }
    }

    fn statement(text: impl Into<String>) -> Self {
        Self {
            leading: "\n".to_string(),
            ..Self::synthetic(text)
        }
    }

    fn from_token(token: &Token, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            leading: token.leading.clone(),
            newline_before: token.newline_before,
            ends_expression: token.ends_expression()
                || matches!(token.kind, TokenKind::Identifier | TokenKind::Keyword),
            origin: Some(Origin {
                line: token.line,
                column: token.column,
                name: None,
            }),
        }
    }

    /// Continue the previous piece on the same line.
    fn attached(mut self) -> Self {
        self.leading.clear();
        self.newline_before = false;
        self
    }

    fn named(mut self, name: &str) -> Self {
        if let Some(origin) = self.origin.as_mut() {
            origin.name = Some(name.to_string());
        }
        self
    }
}

pub fn rewrite<R: Rng>(
    tokens: &[Token],
    matches: &Matches,
    analysis: &Analysis,
    renames: &Renames,
    settings: &EngineSettings,
    names: &mut NameGenerator,
    rng: &mut R,
) -> Vec<Piece> {
    let mut builder = StringArrayBuilder::new();
    let mut plans = HashMap::new();
    for i in 0..tokens.len() {
        if let Some(value) = string_value(tokens, &analysis.roles, i) {
            plans.insert(i, builder.plan(&value, settings, rng));
        }
    }
    let array = builder.finish(settings, names, rng);
    let prologue = build_prologue(&array, settings, names, rng);
    if !array.is_empty() {
        debug!(statements = prologue.len(), "string array prepared");
    }

    let prologue_at = directive_prologue_end(tokens, &analysis.roles);
    let mut out: Vec<Piece> = Vec::with_capacity(tokens.len() + prologue.len());
    let mut dead_branches = 0;
    let mut i = 0;

    while i < tokens.len() {
        if i == prologue_at {
            push_prologue(&mut out, tokens, prologue_at, &prologue);
        }
        let token = &tokens[i];
        let role = analysis.roles[i];
        let fresh = analysis.resolved[i].and_then(|binding| renames.get(&binding));

        match token.kind {
            TokenKind::Identifier => match (role, fresh) {
                (Role::Reference, Some(fresh)) => {
                    out.push(Piece::from_token(token, fresh.as_str()).named(&token.text));
                }
                (Role::Shorthand, Some(fresh)) => {
                    out.push(Piece::from_token(token, token.text.as_str()));
                    out.push(Piece::synthetic(":"));
                    out.push(
                        Piece::from_token(token, fresh.as_str())
                            .attached()
                            .named(&token.text),
                    );
                }
                _ => out.push(Piece::from_token(token, token.text.as_str())),
            },
            TokenKind::Punct
                if (token.text == "." || token.text == "?.")
                    && is_rewritable_member(tokens, i + 1) =>
            {
                let property = &tokens[i + 1];
                let open = if token.text == "." { "[" } else { "?.[" };
                let mut bracket = Piece::from_token(token, open);
                bracket.newline_before = false;
                bracket.ends_expression = false;
                out.push(bracket);

                let text = match plans.get(&(i + 1)) {
                    Some(chunks) => array.render(chunks, settings.unicode_escape_sequence, rng),
                    None => quote(&property.text, settings.unicode_escape_sequence),
                };
                out.push(Piece::from_token(property, text).attached());
                out.push(Piece {
                    ends_expression: true,
                    ..Piece::synthetic("]")
                });
                i += 2;
                continue;
            }
            TokenKind::String => {
                let text = match plans.get(&i) {
                    Some(chunks) => array.render(chunks, settings.unicode_escape_sequence, rng),
                    None => token.text.clone(),
                };
                out.push(Piece::from_token(token, text));
            }
            TokenKind::Number if role == Role::Reference => {
                let text = numbers::render(&token.text, settings.numbers_to_expressions, rng)
                    .unwrap_or_else(|| token.text.clone());
                out.push(Piece::from_token(token, text));
            }
            TokenKind::Punct if token.text == "{" => {
                out.push(Piece::from_token(token, "{"));
                if settings.dead_code_injection
                    && dead_branches < MAX_DEAD_BRANCHES
                    && accepts_dead_code(tokens, matches, analysis, i)
                    && rng.gen_bool(settings.dead_code_injection_threshold)
                {
                    out.push(Piece::synthetic(prologue::dead_branch(names, rng)));
                    dead_branches += 1;
                }
            }
            _ => out.push(Piece::from_token(token, token.text.as_str())),
        }
        i += 1;
    }

    if prologue_at >= tokens.len() {
        push_prologue(&mut out, tokens, prologue_at, &prologue);
    }
    out
}

/// Value of a token that goes through the string pipeline.
fn string_value(tokens: &[Token], roles: &[Role], i: usize) -> Option<String> {
    let token = &tokens[i];
    match token.kind {
        TokenKind::String if roles[i] == Role::Reference => cook(&token.text),
        TokenKind::Identifier | TokenKind::Keyword if is_rewritable_member(tokens, i) => {
            Some(token.text.clone())
        }
        _ => None,
    }
}

/// `a.b` where `b` can become `a['b']`.
fn is_rewritable_member(tokens: &[Token], i: usize) -> bool {
    let Some(token) = tokens.get(i) else {
        return false;
    };
    if !matches!(token.kind, TokenKind::Identifier | TokenKind::Keyword)
        || token.text.contains('\\')
    {
        return false;
    }
    let Some(dot) = i.checked_sub(1).map(|p| &tokens[p]) else {
        return false;
    };
    if !(dot.is_punct(".") || dot.is_punct("?.")) {
        return false;
    }
    // new.target, import.meta
    !i.checked_sub(2)
        .is_some_and(|p| tokens[p].is_keyword("new") || tokens[p].is_keyword("import"))
}

fn accepts_dead_code(tokens: &[Token], matches: &Matches, analysis: &Analysis, i: usize) -> bool {
    if analysis.braces[i] != Some(BraceKind::Block) {
        return false;
    }
    let switch_body = i
        .checked_sub(1)
        .filter(|&p| tokens[p].is_punct(")"))
        .and_then(|p| matches[p])
        .and_then(|open| open.checked_sub(1))
        .is_some_and(|k| tokens[k].is_keyword("switch"));
    let directive_follows = analysis.roles.get(i + 1) == Some(&Role::Directive);
    !switch_body && !directive_follows
}

/// Index of the first token after the hashbang and directive prologue.
fn directive_prologue_end(tokens: &[Token], roles: &[Role]) -> usize {
    let mut i = 0;
    while i < tokens.len() && roles[i] == Role::Directive {
        i += 1;
        if tokens.get(i).is_some_and(|t| t.is_punct(";")) {
            i += 1;
        }
    }
    i
}

fn build_prologue<R: Rng>(
    array: &StringArray,
    settings: &EngineSettings,
    names: &mut NameGenerator,
    rng: &mut R,
) -> Vec<String> {
    let mut statements: Vec<String> = array.declarations().to_vec();
    if settings.self_defending {
        if settings.compact {
            statements.push(prologue::self_defending(names, rng));
        } else {
            debug!("selfDefending needs compact output; skipped");
        }
    }
    if settings.debug_protection {
        statements.push(prologue::debug_protection(
            settings.debug_protection_interval,
            names,
            rng,
        ));
    }
    if settings.disable_console_output {
        statements.push(prologue::disable_console_output(names, rng));
    }
    statements
}

fn push_prologue(out: &mut Vec<Piece>, tokens: &[Token], at: usize, statements: &[String]) {
    if statements.is_empty() {
        return;
    }
    // a directive without its semicolon
    if at > 0 && !tokens[at - 1].is_punct(";") {
        out.push(Piece::synthetic(";"));
    }
    out.extend(statements.iter().map(|s| Piece::statement(s.as_str())));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::emit::emit;
    use crate::engine::lexer::tokenize;
    use crate::engine::scope::analyze;
    use crate::engine::syntax::check;
    use crate::engine::{rename, IdentifierNamesGenerator};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn bare() -> EngineSettings {
        EngineSettings {
            string_array: false,
            string_array_shuffle: false,
            string_array_rotate: false,
            string_array_index_shift: false,
            string_array_wrappers_count: 0,
            ..EngineSettings::default()
        }
    }

    fn transform(source: &str, settings: &EngineSettings) -> String {
        let mut rng = StdRng::seed_from_u64(21);
        let lexed = tokenize(source).unwrap();
        let matches = check(&lexed.tokens).unwrap();
        let analysis = analyze(&lexed.tokens, &matches);
        let mut names = NameGenerator::new(
            IdentifierNamesGenerator::Mangled,
            "",
            &[],
            analysis.identifiers.clone(),
            &mut rng,
        );
        let renames = rename::plan(&analysis, settings, &mut names, &mut rng);
        let pieces = rewrite(
            &lexed.tokens,
            &matches,
            &analysis,
            &renames,
            settings,
            &mut names,
            &mut rng,
        );
        emit(lexed.hashbang.as_deref(), &pieces, settings.compact).code
    }

    #[test]
    fn renames_and_brackets_members() {
        let out = transform(
            "function add(x, y) { return x + y; } console.log(add(5, 3));",
            &bare(),
        );
        assert_eq!(out, "function a(b,c){return b+c;}console['log'](a(0x5,0x3));");
    }

    #[test]
    fn expands_renamed_shorthand_properties() {
        let out = transform("var total = 1; var o = { total };", &bare());
        assert!(out.contains("{total:"), "{}", out);
        assert!(!out.contains("var total"), "{}", out);
    }

    #[test]
    fn free_names_keep_their_spelling() {
        let out = transform(
            "function ep() { const URL = 'u'; return URL; } var o = { URL }; new URL(ep());",
            &bare(),
        );
        assert!(out.contains("new URL("), "{}", out);
        assert!(out.contains("{URL}"), "{}", out);
        assert!(!out.contains("const URL"), "{}", out);
        assert!(!out.contains("return URL"), "{}", out);
    }

    #[test]
    fn keeps_directives_ahead_of_the_prologue() {
        let settings = EngineSettings {
            disable_console_output: true,
            ..bare()
        };
        let out = transform("'use strict'\nrun();", &settings);
        assert!(out.starts_with("'use strict';(function(){"), "{}", out);
    }

    #[test]
    fn extracts_strings_into_the_array() {
        let settings = EngineSettings {
            string_array: true,
            string_array_threshold: 1.0,
            ..bare()
        };
        let out = transform("var greeting = 'hello';", &settings);
        assert!(out.contains("=['hello'];"), "{}", out);
        assert_eq!(out.matches("'hello'").count(), 1, "{}", out);
    }

    #[test]
    fn module_specifiers_and_keys_stay_put() {
        let settings = EngineSettings {
            string_array: true,
            string_array_threshold: 1.0,
            ..bare()
        };
        let out = transform("import a from 'lib'; var o = { 'key': 1 };", &settings);
        assert!(out.contains("from'lib'"), "{}", out);
        assert!(out.contains("{'key':0x1}"), "{}", out);
    }

    #[test]
    fn new_target_is_untouched() {
        let out = transform("function F() { if (!new.target) throw 1; }", &bare());
        assert!(out.contains("new.target"), "{}", out);
    }

    #[test]
    fn dead_code_skips_switch_bodies() {
        let settings = EngineSettings {
            dead_code_injection: true,
            dead_code_injection_threshold: 1.0,
            ..bare()
        };
        let out = transform("switch (k) { case 1: f(); }", &settings);
        assert!(out.starts_with("switch(k){case"), "{}", out);
        let out = transform("function f() { return 1; }", &settings);
        assert!(out.contains("{if("), "{}", out);
    }
}
