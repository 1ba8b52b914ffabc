//! Binding discovery and identifier classification
//!
//! The lexical engine has no syntax tree. Instead it works out, token by
//! token, in which role every identifier, string and number appears, which
//! token ranges form function and block scopes, and which declaration each
//! identifier occurrence refers to. Occurrences that resolve to no
//! declaration are free (globals, implicit globals, host names) and are
//! never renamed.

use super::lexer::{Token, TokenKind};
use super::syntax::Matches;
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

/// How a token is used at its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Variable reference or binding occurrence; renamable / extractable.
    Reference,
    /// Name after `.` or `?.`.
    Property,
    /// Object literal, pattern or class member key.
    Key,
    /// `{ a }` in an object literal or pattern.
    Shorthand,
    /// `'use strict'` and friends.
    Directive,
    /// Source string of an `import`/`export ... from`.
    ModuleSpecifier,
    Other,
}

/// Kind of a `{` ... `}` region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BraceKind {
    Block,
    Object,
    Class,
}

/// Index into [`Analysis::bindings`].
pub type BindingId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Program,
    /// Function, method or arrow: parameters, `var` and function declarations.
    Function,
    /// Block, loop head, catch clause or named class expression.
    Block,
}

/// A name declared in one scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub name: String,
    pub scope: usize,
}

#[derive(Debug, Clone)]
pub struct Analysis {
    pub roles: Vec<Role>,
    /// Kind of each `{` token, by index.
    pub braces: Vec<Option<BraceKind>>,
    /// Declared names in order of first declaration.
    pub bindings: Vec<Binding>,
    /// Binding each identifier token refers to, by index; `None` for free
    /// names and for tokens that are not variable occurrences.
    pub resolved: Vec<Option<BindingId>>,
    /// Names that take part in `import`/`export` declarations.
    pub module_names: HashSet<String>,
    /// Every identifier spelled anywhere in the source.
    pub identifiers: HashSet<String>,
    /// `eval` or `with` makes name resolution dynamic.
    pub dynamic_scope: bool,
}

/// Identifiers that are never renamed, not even where a program declares
/// them: contextual keywords and well-known globals.
pub const PRESERVED_NAMES: &[&str] = &[
    // contextual keywords
    "of", "get", "set", "static", "async", "from", "as", "target", "meta", "accessor",
    "arguments", "undefined", "NaN", "Infinity", "eval",
    // host and language globals
    "globalThis", "window", "self", "document", "navigator", "location", "console", "process",
    "require", "module", "exports", "global", "Buffer", "__dirname", "__filename", "Object",
    "Array", "String", "Number", "Boolean", "Symbol", "BigInt", "Function", "Math", "JSON",
    "Date", "RegExp", "Error", "TypeError", "RangeError", "SyntaxError", "ReferenceError",
    "Promise", "Proxy", "Reflect", "Map", "Set", "WeakMap", "WeakSet", "ArrayBuffer",
    "Uint8Array", "Int8Array", "Uint16Array", "Int16Array", "Uint32Array", "Int32Array",
    "Float32Array", "Float64Array", "DataView", "parseInt", "parseFloat", "isNaN", "isFinite",
    "encodeURIComponent", "decodeURIComponent", "encodeURI", "decodeURI", "escape", "unescape",
    "setTimeout", "clearTimeout", "setInterval", "clearInterval", "setImmediate",
    "queueMicrotask", "fetch", "atob", "btoa", "alert",
];

const KEYWORDS_BEFORE_OBJECT: &[&str] = &[
    "return", "typeof", "void", "delete", "throw", "case", "yield", "await", "in", "instanceof",
    "new", "export", "import", "var", "let", "const", "extends",
];

const MEMBER_MODIFIERS: &[&str] = &["static", "get", "set", "async", "accessor"];

pub fn analyze(tokens: &[Token], matches: &Matches) -> Analysis {
    let colons = mark_statement_colons(tokens);
    let class_bodies = mark_class_bodies(tokens);
    let braces = classify_braces(tokens, &colons, &class_bodies);
    let roles = assign_roles(tokens, &braces);

    let tree = ScopeTree::build(tokens, matches, &roles, &braces, &colons, &class_bodies);
    let mut resolver = Resolver {
        tree,
        bindings: Vec::new(),
        sites: HashMap::new(),
    };
    collect_bindings(tokens, matches, &colons, &mut resolver);
    let resolved = resolver.resolve(tokens, &roles);
    let module_names = collect_module_names(tokens, matches);

    let identifiers = tokens
        .iter()
        .filter(|t| t.kind == TokenKind::Identifier)
        .map(|t| t.text.clone())
        .collect();
    let dynamic_scope = tokens
        .iter()
        .any(|t| t.is_ident("eval") || t.is_keyword("with"));

    Analysis {
        roles,
        braces,
        bindings: resolver.bindings,
        resolved,
        module_names,
        identifiers,
        dynamic_scope,
    }
}

/// Colons closing `case x:`, `default:` and labels, which open statements.
fn mark_statement_colons(tokens: &[Token]) -> Vec<bool> {
    let mut marks = vec![false; tokens.len()];
    for (i, token) in tokens.iter().enumerate() {
        if token.is_keyword("case") || token.is_keyword("default") {
            let mut depth = 0i32;
            for (j, t) in tokens.iter().enumerate().skip(i + 1) {
                match t.text.as_str() {
                    "(" | "[" | "{" if t.kind == TokenKind::Punct => depth += 1,
                    ")" | "]" | "}" if t.kind == TokenKind::Punct => {
                        depth -= 1;
                        if depth < 0 {
                            break;
                        }
                    }
                    ";" if t.kind == TokenKind::Punct && depth == 0 => break,
                    ":" if t.kind == TokenKind::Punct && depth == 0 => {
                        marks[j] = true;
                        break;
                    }
                    _ => {}
                }
            }
        } else if token.kind == TokenKind::Identifier
            && tokens.get(i + 1).is_some_and(|n| n.is_punct(":"))
        {
            let at_statement_start = match i.checked_sub(1) {
                None => true,
                Some(p) if tokens[p].is_punct(";") || tokens[p].is_punct("}") => true,
                // only a block brace starts a statement
                Some(p) if tokens[p].is_punct("{") => p.checked_sub(1).map_or(true, |b| {
                    let before = &tokens[b];
                    before.is_punct(")")
                        || before.is_punct("=>")
                        || before.is_punct(";")
                        || before.is_punct("{")
                        || before.is_punct("}")
                        || before.is_keyword("else")
                        || before.is_keyword("do")
                        || before.is_keyword("try")
                        || before.is_keyword("finally")
                }),
                Some(_) => false,
            };
            if at_statement_start {
                marks[i + 1] = true;
            }
        }
    }
    marks
}

/// `{` tokens that open a class body.
fn mark_class_bodies(tokens: &[Token]) -> Vec<bool> {
    let mut marks = vec![false; tokens.len()];
    for (i, token) in tokens.iter().enumerate() {
        if !token.is_keyword("class") {
            continue;
        }
        let mut depth = 0i32;
        for (j, t) in tokens.iter().enumerate().skip(i + 1) {
            if t.kind != TokenKind::Punct {
                continue;
            }
            match t.text.as_str() {
                "{" if depth == 0 => {
                    marks[j] = true;
                    break;
                }
                "(" | "[" | "{" => depth += 1,
                ")" | "]" | "}" => {
                    depth -= 1;
                    if depth < 0 {
                        break;
                    }
                }
                _ => {}
            }
        }
    }
    marks
}

fn classify_braces(
    tokens: &[Token],
    statement_colons: &[bool],
    class_bodies: &[bool],
) -> Vec<Option<BraceKind>> {
    let mut kinds = vec![None; tokens.len()];
    for (i, token) in tokens.iter().enumerate() {
        if !token.is_punct("{") {
            continue;
        }
        let kind = if class_bodies[i] {
            BraceKind::Class
        } else {
            match i.checked_sub(1) {
                None => BraceKind::Block,
                Some(p) => brace_after(&tokens[p], statement_colons[p]),
            }
        };
        kinds[i] = Some(kind);
    }
    kinds
}

fn brace_after(prev: &Token, statement_colon: bool) -> BraceKind {
    match prev.kind {
        TokenKind::Punct => match prev.text.as_str() {
            ")" | "]" | "}" | ";" | "=>" | "{" | "++" | "--" => BraceKind::Block,
            ":" if statement_colon => BraceKind::Block,
            _ => BraceKind::Object,
        },
        TokenKind::Keyword if KEYWORDS_BEFORE_OBJECT.contains(&prev.text.as_str()) => {
            BraceKind::Object
        }
        TokenKind::Identifier if prev.text == "of" => BraceKind::Object,
        TokenKind::TemplateHead | TokenKind::TemplateMiddle => BraceKind::Object,
        _ => BraceKind::Block,
    }
}

fn assign_roles(tokens: &[Token], braces: &[Option<BraceKind>]) -> Vec<Role> {
    let mut roles = vec![Role::Other; tokens.len()];
    // Innermost enclosing brace kind; parens and brackets reset to expression context.
    let mut stack: Vec<Option<BraceKind>> = Vec::new();

    for (i, token) in tokens.iter().enumerate() {
        let prev = i.checked_sub(1).map(|p| &tokens[p]);
        let prev2 = i.checked_sub(2).map(|p| &tokens[p]);
        let next = tokens.get(i + 1);
        let top = stack.last().copied().flatten();

        match token.kind {
            TokenKind::Identifier | TokenKind::Keyword | TokenKind::String | TokenKind::Number => {
                roles[i] = classify(token, prev, prev2, next, top);
            }
            TokenKind::Punct => match token.text.as_str() {
                "{" => stack.push(braces[i]),
                "(" | "[" => stack.push(None),
                "}" | ")" | "]" => {
                    stack.pop();
                }
                _ => {}
            },
            TokenKind::TemplateHead => stack.push(None),
            TokenKind::TemplateTail => {
                stack.pop();
            }
            _ => {}
        }
    }
    roles
}

fn classify(
    token: &Token,
    prev: Option<&Token>,
    prev2: Option<&Token>,
    next: Option<&Token>,
    top: Option<BraceKind>,
) -> Role {
    let after_dot = prev.is_some_and(|p| p.is_punct(".") || p.is_punct("?."));
    if after_dot {
        return if token.kind == TokenKind::Number {
            Role::Other
        } else {
            Role::Property
        };
    }

    let next_is = |s: &str| next.is_some_and(|n| n.is_punct(s));
    let prev_is = |s: &str| prev.is_some_and(|p| p.is_punct(s));

    match top {
        Some(BraceKind::Object) => {
            let entry_start = prev_is("{") || prev_is(",");
            let after_modifier = prev.is_some_and(|p| {
                (p.kind == TokenKind::Identifier && MEMBER_MODIFIERS.contains(&p.text.as_str()))
                    || p.is_punct("*")
            }) && prev2.is_some_and(|p| p.is_punct("{") || p.is_punct(","));
            if entry_start || after_modifier {
                if next_is(":") || next_is("(") {
                    return Role::Key;
                }
                if entry_start
                    && token.kind == TokenKind::Identifier
                    && (next_is(",") || next_is("}") || next_is("="))
                {
                    return Role::Shorthand;
                }
            }
            if token.kind == TokenKind::Keyword && entry_start {
                return Role::Key;
            }
        }
        Some(BraceKind::Class) => {
            let member_start = prev.is_some_and(|p| {
                p.is_punct("{")
                    || p.is_punct(";")
                    || p.is_punct("}")
                    || p.is_punct("*")
                    || (p.kind == TokenKind::Identifier
                        && MEMBER_MODIFIERS.contains(&p.text.as_str()))
            }) || (token.newline_before
                && prev.is_some_and(|p| {
                    matches!(
                        p.kind,
                        TokenKind::Identifier | TokenKind::Number | TokenKind::String
                    ) || p.is_punct(")")
                        || p.is_punct("]")
                }));
            if member_start {
                return Role::Key;
            }
        }
        _ => {}
    }

    match token.kind {
        TokenKind::Identifier => Role::Reference,
        TokenKind::String if is_directive(token, prev, next) => Role::Directive,
        TokenKind::String
            if prev.is_some_and(|p| p.is_ident("from") || p.is_keyword("import"))
                || prev.is_some_and(|p| p.is_keyword("export")) =>
        {
            Role::ModuleSpecifier
        }
        TokenKind::String | TokenKind::Number => Role::Reference,
        _ => Role::Other,
    }
}

fn is_directive(token: &Token, prev: Option<&Token>, next: Option<&Token>) -> bool {
    let value = &token.text[1..token.text.len().saturating_sub(1)];
    if value != "use strict" && value != "use asm" {
        return false;
    }
    let starts_statement = prev.map_or(true, |p| p.is_punct(";") || p.is_punct("{"));
    let ends_statement = next.map_or(true, |n| {
        n.is_punct(";") || n.is_punct("}") || n.newline_before
    });
    starts_statement && ends_statement
}

/// Function and block scopes as token ranges.
#[derive(Debug)]
struct ScopeTree {
    scopes: Vec<Scope>,
    /// Innermost scope around each token.
    scope_of: Vec<usize>,
    /// Scope opened at a function or loop `(`, an arrow's `=>`, a catch
    /// `(`, a block `{` or a named class expression's `class`.
    opened_at: HashMap<usize, usize>,
}

#[derive(Debug)]
struct Scope {
    kind: ScopeKind,
    parent: Option<usize>,
    start: usize,
    /// Last token inside, inclusive.
    end: usize,
    declared: HashMap<String, BindingId>,
}

impl Scope {
    fn new(kind: ScopeKind, start: usize, end: usize) -> Self {
        Self {
            kind,
            parent: None,
            start,
            end: end.max(start),
            declared: HashMap::new(),
        }
    }
}

impl ScopeTree {
    fn build(
        tokens: &[Token],
        matches: &Matches,
        roles: &[Role],
        braces: &[Option<BraceKind>],
        colons: &[bool],
        class_bodies: &[bool],
    ) -> Self {
        let last = tokens.len().saturating_sub(1);
        let mut tree = ScopeTree {
            scopes: vec![Scope::new(ScopeKind::Program, 0, last)],
            scope_of: vec![0; tokens.len()],
            opened_at: HashMap::new(),
        };

        for (i, token) in tokens.iter().enumerate() {
            let region = match token.kind {
                TokenKind::Punct => match token.text.as_str() {
                    "{" if braces[i] == Some(BraceKind::Block) => {
                        matches[i].map(|close| (ScopeKind::Block, i, close))
                    }
                    "(" => matches[i].and_then(|close| {
                        if is_function_head(tokens, roles, i, close) {
                            matches[close + 1].map(|end| (ScopeKind::Function, i, end))
                        } else if opens_loop_or_catch(tokens, i) {
                            Some((ScopeKind::Block, i, statement_end(tokens, matches, close + 1)))
                        } else {
                            None
                        }
                    }),
                    "=>" => arrow_start(tokens, matches, i)
                        .map(|start| (ScopeKind::Function, start, arrow_end(tokens, matches, i))),
                    _ => None,
                },
                TokenKind::Keyword
                    if token.text == "class"
                        && tokens
                            .get(i + 1)
                            .is_some_and(|t| t.kind == TokenKind::Identifier)
                        && !starts_statement(tokens, colons, i) =>
                {
                    (i + 1..tokens.len())
                        .find(|&j| class_bodies[j])
                        .and_then(|body| matches[body])
                        .map(|close| (ScopeKind::Block, i, close))
                }
                _ => None,
            };
            if let Some((kind, start, end)) = region {
                tree.opened_at.insert(i, tree.scopes.len());
                tree.scopes.push(Scope::new(kind, start, end));
            }
        }

        tree.nest();
        tree
    }

    /// Link every scope to the one around it and record the innermost scope
    /// of each token.
    fn nest(&mut self) {
        let mut order: Vec<usize> = (0..self.scopes.len()).collect();
        order.sort_by_key(|&s| (self.scopes[s].start, Reverse(self.scopes[s].end)));
        let mut pending = order.into_iter().peekable();
        let mut stack: Vec<usize> = Vec::new();

        for i in 0..self.scope_of.len() {
            while stack.last().is_some_and(|&s| self.scopes[s].end < i) {
                stack.pop();
            }
            while let Some(s) = pending.next_if(|&s| self.scopes[s].start <= i) {
                self.scopes[s].parent = stack.last().copied();
                stack.push(s);
            }
            self.scope_of[i] = stack.last().copied().unwrap_or(0);
        }
    }

    /// Nearest scope that takes `var` and function declarations.
    fn var_scope(&self, mut scope: usize) -> usize {
        while self.scopes[scope].kind == ScopeKind::Block {
            match self.scopes[scope].parent {
                Some(parent) => scope = parent,
                None => break,
            }
        }
        scope
    }
}

/// `(` ... `)` followed by a body: function, method or accessor parameters.
fn is_function_head(tokens: &[Token], roles: &[Role], open: usize, close: usize) -> bool {
    if !tokens.get(close + 1).is_some_and(|t| t.is_punct("{")) {
        return false;
    }
    let Some(p) = open.checked_sub(1) else {
        return false;
    };
    let prev = &tokens[p];
    prev.kind == TokenKind::Identifier
        || prev.is_keyword("function")
        || roles[p] == Role::Key
        || (prev.is_punct("*")
            && p.checked_sub(1).is_some_and(|q| tokens[q].is_keyword("function")))
}

fn opens_loop_or_catch(tokens: &[Token], open: usize) -> bool {
    let Some(p) = open.checked_sub(1) else {
        return false;
    };
    tokens[p].is_keyword("for")
        || tokens[p].is_keyword("catch")
        || (tokens[p].is_keyword("await")
            && p.checked_sub(1).is_some_and(|q| tokens[q].is_keyword("for")))
}

/// Last token of the statement starting at `from`.
fn statement_end(tokens: &[Token], matches: &Matches, from: usize) -> usize {
    if tokens.get(from).is_some_and(|t| t.is_punct("{")) {
        if let Some(close) = matches[from] {
            return close;
        }
    }
    let mut i = from;
    while let Some(token) = tokens.get(i) {
        if token.kind == TokenKind::Punct {
            match token.text.as_str() {
                "(" | "[" | "{" => {
                    i = matches[i].map_or(i + 1, |c| c + 1);
                    continue;
                }
                ")" | "]" | "}" => return i.saturating_sub(1),
                ";" => return i,
                _ => {}
            }
        }
        i += 1;
    }
    tokens.len().saturating_sub(1)
}

/// First parameter token of the arrow function at `arrow`.
fn arrow_start(tokens: &[Token], matches: &Matches, arrow: usize) -> Option<usize> {
    let p = arrow.checked_sub(1)?;
    let prev = &tokens[p];
    if prev.is_punct(")") {
        matches[p]
    } else if prev.kind == TokenKind::Identifier {
        Some(p)
    } else {
        None
    }
}

/// Last token of an arrow function's body.
fn arrow_end(tokens: &[Token], matches: &Matches, arrow: usize) -> usize {
    match tokens.get(arrow + 1) {
        Some(t) if t.is_punct("{") => matches[arrow + 1].unwrap_or(arrow + 1),
        _ => skip_expression(tokens, matches, arrow + 1, true)
            .saturating_sub(1)
            .max(arrow),
    }
}

/// A `function` or `class` at `i` is a declaration rather than an
/// expression.
fn starts_statement(tokens: &[Token], colons: &[bool], i: usize) -> bool {
    let Some(p) = i.checked_sub(1) else {
        return true;
    };
    let prev = &tokens[p];
    match prev.kind {
        TokenKind::Punct => match prev.text.as_str() {
            ";" | "}" | "{" | ")" => true,
            ":" => colons[p],
            _ => false,
        },
        TokenKind::Keyword => matches!(prev.text.as_str(), "export" | "default" | "else" | "do"),
        _ => tokens[i].newline_before && prev.ends_expression(),
    }
}

struct Resolver {
    tree: ScopeTree,
    bindings: Vec<Binding>,
    /// Declaring occurrences, by token index.
    sites: HashMap<usize, BindingId>,
}

impl Resolver {
    fn declare(&mut self, tokens: &[Token], scope: usize, sites: &[usize]) {
        for &i in sites {
            let name = &tokens[i].text;
            let id = match self.tree.scopes[scope].declared.get(name) {
                Some(&id) => id,
                None => {
                    let id = self.bindings.len();
                    self.bindings.push(Binding {
                        name: name.clone(),
                        scope,
                    });
                    self.tree.scopes[scope].declared.insert(name.clone(), id);
                    id
                }
            };
            self.sites.insert(i, id);
        }
    }

    fn lookup(&self, mut scope: usize, name: &str) -> Option<BindingId> {
        loop {
            if let Some(&id) = self.tree.scopes[scope].declared.get(name) {
                return Some(id);
            }
            scope = self.tree.scopes[scope].parent?;
        }
    }

    fn resolve(&self, tokens: &[Token], roles: &[Role]) -> Vec<Option<BindingId>> {
        tokens
            .iter()
            .enumerate()
            .map(|(i, token)| {
                if token.kind != TokenKind::Identifier {
                    return None;
                }
                if let Some(&id) = self.sites.get(&i) {
                    return Some(id);
                }
                match roles[i] {
                    Role::Reference | Role::Shorthand => {
                        self.lookup(self.tree.scope_of[i], &token.text)
                    }
                    _ => None,
                }
            })
            .collect()
    }
}

/// Token indices of the names a pattern walk declares.
fn pattern<F>(tokens: &[Token], matches: &Matches, visit: F) -> Vec<usize>
where
    F: FnOnce(&mut PatternWalker<'_>),
{
    let mut out = Vec::new();
    visit(&mut PatternWalker {
        tokens,
        matches,
        out: &mut out,
    });
    out
}

fn collect_bindings(tokens: &[Token], matches: &Matches, colons: &[bool], resolver: &mut Resolver) {
    for (i, token) in tokens.iter().enumerate() {
        let prev = i.checked_sub(1).map(|p| &tokens[p]);
        if prev.is_some_and(|p| p.is_punct(".") || p.is_punct("?.")) {
            continue;
        }
        let here = resolver.tree.scope_of[i];
        match token.kind {
            TokenKind::Keyword => match token.text.as_str() {
                "var" => {
                    let sites = pattern(tokens, matches, |w| w.declarations(i + 1));
                    let scope = resolver.tree.var_scope(here);
                    resolver.declare(tokens, scope, &sites);
                }
                "const" | "let" => {
                    let sites = pattern(tokens, matches, |w| w.declarations(i + 1));
                    resolver.declare(tokens, here, &sites);
                }
                "function" => {
                    let mut j = i + 1;
                    if tokens.get(j).is_some_and(|t| t.is_punct("*")) {
                        j += 1;
                    }
                    if !tokens.get(j).is_some_and(|t| t.kind == TokenKind::Identifier) {
                        continue;
                    }
                    let start = match prev {
                        Some(p) if p.is_ident("async") => i - 1,
                        _ => i,
                    };
                    // a named function expression sees its name only inside
                    let scope = match resolver.tree.opened_at.get(&(j + 1)) {
                        Some(&own) if !starts_statement(tokens, colons, start) => own,
                        _ => resolver.tree.var_scope(here),
                    };
                    resolver.declare(tokens, scope, &[j]);
                }
                "class" => {
                    if tokens.get(i + 1).is_some_and(|t| t.kind == TokenKind::Identifier) {
                        let scope = resolver.tree.opened_at.get(&i).copied().unwrap_or(here);
                        resolver.declare(tokens, scope, &[i + 1]);
                    }
                }
                "catch" => {
                    if let Some(&own) = resolver.tree.opened_at.get(&(i + 1)) {
                        let sites = pattern(tokens, matches, |w| {
                            w.binding(i + 2, false);
                        });
                        resolver.declare(tokens, own, &sites);
                    }
                }
                _ => {}
            },
            TokenKind::Punct if token.text == "=>" => {
                let Some(&own) = resolver.tree.opened_at.get(&i) else {
                    continue;
                };
                let sites = match (prev, matches[i - 1]) {
                    (Some(p), Some(open)) if p.is_punct(")") => {
                        pattern(tokens, matches, |w| w.parameters(open, i - 1))
                    }
                    _ => vec![i - 1],
                };
                resolver.declare(tokens, own, &sites);
            }
            TokenKind::Punct if token.text == "(" => {
                let Some(&own) = resolver.tree.opened_at.get(&i) else {
                    continue;
                };
                if resolver.tree.scopes[own].kind != ScopeKind::Function {
                    continue;
                }
                if let Some(close) = matches[i] {
                    let sites = pattern(tokens, matches, |w| w.parameters(i, close));
                    resolver.declare(tokens, own, &sites);
                }
            }
            _ => {}
        }
    }
}

struct PatternWalker<'a> {
    tokens: &'a [Token],
    matches: &'a Matches,
    /// Token index of every declared name.
    out: &'a mut Vec<usize>,
}

impl PatternWalker<'_> {
    fn is_punct(&self, i: usize, p: &str) -> bool {
        self.tokens.get(i).is_some_and(|t| t.is_punct(p))
    }

    /// `a = 1, {b} = c, [d] = e` after a declaration keyword.
    fn declarations(&mut self, mut i: usize) {
        loop {
            let next = self.binding(i, true);
            if next == i {
                return;
            }
            if self.is_punct(next, ",") {
                i = next + 1;
            } else {
                return;
            }
        }
    }

    fn parameters(&mut self, open: usize, close: usize) {
        let mut i = open + 1;
        while i < close {
            if self.is_punct(i, "...") {
                i += 1;
            }
            let next = self.binding(i, false);
            if next == i {
                return;
            }
            if self.is_punct(next, ",") {
                i = next + 1;
            } else {
                return;
            }
        }
    }

    /// Walk one binding element; returns the index after it, including any
    /// default value or initializer.
    fn binding(&mut self, i: usize, declaration: bool) -> usize {
        let Some(token) = self.tokens.get(i) else {
            return i;
        };
        let mut next = match token.kind {
            TokenKind::Identifier => {
                self.out.push(i);
                i + 1
            }
            TokenKind::Keyword if matches!(token.text.as_str(), "yield" | "await" | "let") => i + 1,
            TokenKind::Punct if token.text == "{" => match self.matches[i] {
                Some(close) => {
                    self.object_pattern(i + 1, close);
                    close + 1
                }
                None => return i,
            },
            TokenKind::Punct if token.text == "[" => match self.matches[i] {
                Some(close) => {
                    self.array_pattern(i + 1, close);
                    close + 1
                }
                None => return i,
            },
            _ => return i,
        };
        if self.is_punct(next, "=") {
            next = skip_expression(self.tokens, self.matches, next + 1, declaration);
        }
        next
    }

    fn object_pattern(&mut self, mut i: usize, end: usize) {
        while i < end {
            let token = &self.tokens[i];
            if token.is_punct("...") {
                i = self.binding(i + 1, false);
            } else if token.is_punct("[") {
                let after = self.matches[i].map_or(end, |c| c + 1);
                i = if self.is_punct(after, ":") {
                    self.binding(after + 1, false)
                } else {
                    after
                };
            } else if matches!(
                token.kind,
                TokenKind::Identifier | TokenKind::Keyword | TokenKind::String | TokenKind::Number
            ) {
                if self.is_punct(i + 1, ":") {
                    i = self.binding(i + 2, false);
                } else if token.kind == TokenKind::Identifier {
                    i = self.binding(i, false);
                } else {
                    i += 1;
                }
            } else {
                i += 1;
            }

            if self.is_punct(i, ",") {
                i += 1;
            } else if i < end {
                return;
            }
        }
    }

    fn array_pattern(&mut self, mut i: usize, end: usize) {
        while i < end {
            if self.is_punct(i, ",") {
                i += 1;
                continue;
            }
            let start = i;
            if self.is_punct(i, "...") {
                i += 1;
            }
            let next = self.binding(i, false);
            if next == i {
                // not a pattern element we understand
                return;
            }
            i = next;
            if self.is_punct(i, ",") {
                i += 1;
            } else if i < end || start == i {
                return;
            }
        }
    }
}

/// Skip an initializer, default value or arrow body up to the `,`, `;` or
/// closing bracket that ends it.
fn skip_expression(tokens: &[Token], matches: &Matches, mut i: usize, declaration: bool) -> usize {
    let start = i;
    let mut template_depth = 0usize;
    while let Some(token) = tokens.get(i) {
        match token.kind {
            TokenKind::Punct => match token.text.as_str() {
                "(" | "[" | "{" => {
                    i = matches[i].map_or(i + 1, |c| c + 1);
                    continue;
                }
                ")" | "]" | "}" | "," | ";" if template_depth == 0 => return i,
                _ => {}
            },
            TokenKind::TemplateHead => template_depth += 1,
            TokenKind::TemplateTail => template_depth = template_depth.saturating_sub(1),
            _ => {}
        }
        if declaration && template_depth == 0 && i > start && ends_by_asi(tokens, i) {
            return i;
        }
        if declaration
            && template_depth == 0
            && (token.is_keyword("in") || token.is_ident("of"))
            && i == start
        {
            return i;
        }
        i += 1;
    }
    i
}

/// A line break between two tokens that cannot be joined into one expression.
fn ends_by_asi(tokens: &[Token], i: usize) -> bool {
    let token = &tokens[i];
    if !token.newline_before {
        return false;
    }
    let prev = &tokens[i - 1];
    let starts_new = matches!(
        token.kind,
        TokenKind::Identifier | TokenKind::Number | TokenKind::String | TokenKind::Template
    ) || (token.kind == TokenKind::Keyword
        && !matches!(token.text.as_str(), "in" | "instanceof"));
    starts_new && prev.ends_expression()
}

fn collect_module_names(tokens: &[Token], matches: &Matches) -> HashSet<String> {
    let mut names = HashSet::new();
    for (i, token) in tokens.iter().enumerate() {
        let prev = i.checked_sub(1).map(|p| &tokens[p]);
        if prev.is_some_and(|p| p.is_punct(".") || p.is_punct("?.")) {
            continue;
        }
        if token.is_keyword("import") {
            let next = tokens.get(i + 1);
            if next.is_some_and(|n| n.is_punct("(") || n.is_punct(".")) {
                continue;
            }
            for t in tokens.iter().skip(i + 1) {
                if t.kind == TokenKind::String || t.is_punct(";") {
                    break;
                }
                if t.kind == TokenKind::Identifier {
                    names.insert(t.text.clone());
                }
            }
        } else if token.is_keyword("export") {
            let Some(next) = tokens.get(i + 1) else { continue };
            if next.is_punct("{") {
                let end = matches[i + 1].unwrap_or(i + 1);
                for t in &tokens[i + 2..end] {
                    if t.kind == TokenKind::Identifier {
                        names.insert(t.text.clone());
                    }
                }
            } else if matches!(next.text.as_str(), "var" | "let" | "const")
                && next.kind == TokenKind::Keyword
            {
                let declared = pattern(tokens, matches, |w| w.declarations(i + 2));
                names.extend(declared.into_iter().map(|j| tokens[j].text.clone()));
            } else {
                // export [default] [async] function|class name
                for t in tokens.iter().skip(i + 1).take(4) {
                    if t.kind == TokenKind::Identifier && t.text != "async" {
                        names.insert(t.text.clone());
                        break;
                    }
                    if t.is_punct("(") || t.is_punct("{") {
                        break;
                    }
                }
            }
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{lexer::tokenize, syntax::check};

    fn analysis(source: &str) -> (Vec<Token>, Analysis) {
        let tokens = tokenize(source).unwrap().tokens;
        let matches = check(&tokens).unwrap();
        let analysis = analyze(&tokens, &matches);
        (tokens, analysis)
    }

    fn index_of(tokens: &[Token], text: &str, nth: usize) -> usize {
        tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| t.text == text)
            .nth(nth)
            .map(|(i, _)| i)
            .unwrap()
    }

    fn role_of(tokens: &[Token], analysis: &Analysis, text: &str, nth: usize) -> Role {
        analysis.roles[index_of(tokens, text, nth)]
    }

    fn binding_of(
        tokens: &[Token],
        analysis: &Analysis,
        text: &str,
        nth: usize,
    ) -> Option<BindingId> {
        analysis.resolved[index_of(tokens, text, nth)]
    }

    fn names(analysis: &Analysis) -> Vec<&str> {
        let unique: std::collections::BTreeSet<&str> =
            analysis.bindings.iter().map(|b| b.name.as_str()).collect();
        unique.into_iter().collect()
    }

    #[test]
    fn finds_declarations_and_parameters() {
        let (_, a) = analysis(
            "function add(a, b = c) { var x = 1, y; let [p, , ...q] = z; const {k, m: n = 2} = o; }",
        );
        assert_eq!(names(&a), vec!["a", "add", "b", "k", "n", "p", "q", "x", "y"]);
    }

    #[test]
    fn finds_arrow_catch_and_class_bindings() {
        let (_, a) = analysis(
            "const f = (u, {v}) => u + v; list.map(w => w); try {} catch (err) {} class Shape {}",
        );
        assert_eq!(names(&a), vec!["Shape", "err", "f", "u", "v", "w"]);
    }

    #[test]
    fn methods_have_parameters() {
        let (_, a) =
            analysis("var o = { run(speed) { return speed; } }; class K { walk(pace) {} }");
        assert!(names(&a).contains(&"speed"));
        assert!(names(&a).contains(&"pace"));
        assert!(!names(&a).contains(&"run"));
    }

    #[test]
    fn classifies_keys_properties_and_shorthands() {
        let (tokens, a) =
            analysis("var o = { a: 1, b, c() {} }; o.a = b; switch (x) { case 1: { y; } }");
        assert_eq!(role_of(&tokens, &a, "a", 0), Role::Key);
        assert_eq!(role_of(&tokens, &a, "b", 0), Role::Shorthand);
        assert_eq!(role_of(&tokens, &a, "c", 0), Role::Key);
        assert_eq!(role_of(&tokens, &a, "a", 1), Role::Property);
        assert_eq!(role_of(&tokens, &a, "b", 1), Role::Reference);
        assert_eq!(role_of(&tokens, &a, "y", 0), Role::Reference);
    }

    #[test]
    fn class_members_are_keys() {
        let (tokens, a) =
            analysis("class A { static make(v) { return v; } size = limit; get area() {} }");
        assert_eq!(role_of(&tokens, &a, "make", 0), Role::Key);
        assert_eq!(role_of(&tokens, &a, "size", 0), Role::Key);
        assert_eq!(role_of(&tokens, &a, "limit", 0), Role::Reference);
        assert_eq!(role_of(&tokens, &a, "area", 0), Role::Key);
        assert_eq!(role_of(&tokens, &a, "v", 1), Role::Reference);
    }

    #[test]
    fn string_roles() {
        let (tokens, a) = analysis("'use strict'; import x from 'lib'; var o = {'k': 'v'};");
        assert_eq!(role_of(&tokens, &a, "'use strict'", 0), Role::Directive);
        assert_eq!(role_of(&tokens, &a, "'lib'", 0), Role::ModuleSpecifier);
        assert_eq!(role_of(&tokens, &a, "'k'", 0), Role::Key);
        assert_eq!(role_of(&tokens, &a, "'v'", 0), Role::Reference);
        assert!(a.module_names.contains("x"));
    }

    #[test]
    fn export_names_are_collected() {
        let (_, a) =
            analysis("export const api = 1; export function boot() {} export { helper as h };");
        assert!(a.module_names.contains("api"));
        assert!(a.module_names.contains("boot"));
        assert!(a.module_names.contains("helper"));
    }

    #[test]
    fn eval_marks_dynamic_scope() {
        let (_, a) = analysis("function f(s) { return eval(s); }");
        assert!(a.dynamic_scope);
    }

    #[test]
    fn initializer_ends_at_line_break() {
        let (_, a) = analysis("var a = 1\nfoo(b, c)");
        assert_eq!(names(&a), vec!["a"]);
    }

    #[test]
    fn local_declaration_does_not_capture_the_global() {
        let (tokens, a) = analysis(
            "function endpoint() { const URL = 'x'; return URL; } new URL(endpoint());",
        );
        let local = binding_of(&tokens, &a, "URL", 0);
        assert!(local.is_some());
        assert_eq!(binding_of(&tokens, &a, "URL", 1), local);
        assert_eq!(binding_of(&tokens, &a, "URL", 2), None);
        assert!(binding_of(&tokens, &a, "endpoint", 1).is_some());
    }

    #[test]
    fn implicit_globals_stay_free() {
        let (tokens, a) = analysis(
            "function helper() { var total = 1; return total; } total = 5; helper();",
        );
        assert!(binding_of(&tokens, &a, "total", 1).is_some());
        assert_eq!(binding_of(&tokens, &a, "total", 2), None);
    }

    #[test]
    fn let_is_block_scoped_and_var_is_hoisted() {
        let (tokens, a) = analysis(
            "let v = 1; { let v = 2; v; } v; function f() { if (x) { var n = 1; } return n; }",
        );
        let outer = binding_of(&tokens, &a, "v", 0);
        let inner = binding_of(&tokens, &a, "v", 1);
        assert_ne!(outer, inner);
        assert_eq!(binding_of(&tokens, &a, "v", 2), inner);
        assert_eq!(binding_of(&tokens, &a, "v", 3), outer);
        assert!(binding_of(&tokens, &a, "n", 1).is_some());
        assert_eq!(binding_of(&tokens, &a, "n", 0), binding_of(&tokens, &a, "n", 1));
    }

    #[test]
    fn parameters_are_local_to_their_function() {
        let (tokens, a) = analysis("const sq = v => v * v; v;");
        assert!(binding_of(&tokens, &a, "v", 1).is_some());
        assert_eq!(binding_of(&tokens, &a, "v", 3), None);

        let (tokens, a) =
            analysis("for (let i = 0; i < 2; i++) g(i); i; try {} catch (e) { e; } e;");
        assert!(binding_of(&tokens, &a, "i", 3).is_some());
        assert_eq!(binding_of(&tokens, &a, "i", 4), None);
        assert!(binding_of(&tokens, &a, "e", 1).is_some());
        assert_eq!(binding_of(&tokens, &a, "e", 2), None);
    }

    #[test]
    fn named_function_expression_binds_inside_only() {
        let (tokens, a) = analysis("var g = function fact(n) { return fact(n); }; fact;");
        assert!(binding_of(&tokens, &a, "fact", 0).is_some());
        assert_eq!(binding_of(&tokens, &a, "fact", 1), binding_of(&tokens, &a, "fact", 0));
        assert_eq!(binding_of(&tokens, &a, "fact", 2), None);
    }

    #[test]
    fn function_declarations_are_visible_before_their_position() {
        let (tokens, a) = analysis("run(); function run() {} Object.keys(run);");
        let run = binding_of(&tokens, &a, "run", 1);
        assert!(run.is_some());
        assert_eq!(binding_of(&tokens, &a, "run", 0), run);
        assert_eq!(binding_of(&tokens, &a, "run", 2), run);
        assert_eq!(binding_of(&tokens, &a, "Object", 0), None);
    }
}
