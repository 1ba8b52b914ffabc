//! String literals: decoding, quoting, splitting and the string array
//!
//! Extracted strings are stored once per (value, encoding) in a single array
//! declared at the top of the program and read back through an accessor
//! function, optionally behind wrapper functions that shift the index.

use super::names::NameGenerator;
use super::settings::{EngineSettings, IndexesType, StringEncoding, WrappersType};
use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine as _;
use rand::distributions::Alphanumeric;
use rand::seq::{index, SliceRandom};
use rand::Rng;
use std::collections::HashMap;

const BASE64_ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Decode a quoted string literal into its value.
///
/// Returns `None` for values a Rust string cannot hold (lone surrogates) or
/// malformed escapes; such literals are left untouched.
pub fn cook(raw: &str) -> Option<String> {
    let inner: Vec<char> = raw.chars().collect();
    if inner.len() < 2 {
        return None;
    }
    let chars = &inner[1..inner.len() - 1];
    let mut out = String::with_capacity(chars.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        i += 1;
        if c != '\\' {
            out.push(c);
            continue;
        }
        let e = *chars.get(i)?;
        i += 1;
        match e {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0'..='7' => {
                let mut value = e.to_digit(8)?;
                let max_len = if e <= '3' { 3 } else { 2 };
                let mut len = 1;
                while len < max_len {
                    match chars.get(i).and_then(|d| d.to_digit(8)) {
                        Some(d) => {
                            value = value * 8 + d;
                            i += 1;
                            len += 1;
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(value)?);
            }
            'x' => {
                let hex: String = chars.get(i..i + 2)?.iter().collect();
                i += 2;
                out.push(char::from_u32(u32::from_str_radix(&hex, 16).ok()?)?);
            }
            'u' => {
                let (unit, next) = unicode_escape(chars, i)?;
                i = next;
                if (0xd800..0xdc00).contains(&unit) {
                    // high surrogate; only valid as part of a pair
                    if chars.get(i) != Some(&'\\') || chars.get(i + 1) != Some(&'u') {
                        return None;
                    }
                    let (low, next) = unicode_escape(chars, i + 2)?;
                    if !(0xdc00..0xe000).contains(&low) {
                        return None;
                    }
                    i = next;
                    let combined = 0x10000 + ((unit - 0xd800) << 10) + (low - 0xdc00);
                    out.push(char::from_u32(combined)?);
                } else {
                    out.push(char::from_u32(unit)?);
                }
            }
            '\r' => {
                if chars.get(i) == Some(&'\n') {
                    i += 1;
                }
            }
            '\n' | '\u{2028}' | '\u{2029}' => {}
            other => out.push(other),
        }
    }
    Some(out)
}

/// Parse the digits of `\uXXXX` or `\u{X...}` starting at `i`.
fn unicode_escape(chars: &[char], i: usize) -> Option<(u32, usize)> {
    if chars.get(i) == Some(&'{') {
        let close = chars[i..].iter().position(|c| *c == '}')? + i;
        let hex: String = chars[i + 1..close].iter().collect();
        let value = u32::from_str_radix(&hex, 16).ok()?;
        Some((value, close + 1))
    } else {
        let hex: String = chars.get(i..i + 4)?.iter().collect();
        Some((u32::from_str_radix(&hex, 16).ok()?, i + 4))
    }
}

/// Render `value` as a single-quoted JavaScript literal.
pub fn quote(value: &str, unicode_escape: bool) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        if unicode_escape {
            push_escaped(&mut out, c);
            continue;
        }
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' | '\u{2029}' => push_escaped(&mut out, c),
            c if c.is_control() => push_escaped(&mut out, c),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn push_escaped(out: &mut String, c: char) {
    let code = c as u32;
    if code < 0x100 {
        out.push_str(&format!("\\x{:02x}", code));
    } else {
        let mut units = [0u16; 2];
        for unit in c.encode_utf16(&mut units) {
            out.push_str(&format!("\\u{:04x}", unit));
        }
    }
}

/// Cut `value` into chunks of at most `chunk_length` characters.
pub fn split(value: &str, chunk_length: usize) -> Vec<String> {
    let chars: Vec<char> = value.chars().collect();
    if chars.is_empty() || chunk_length == 0 {
        return vec![value.to_string()];
    }
    chars
        .chunks(chunk_length)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

pub fn rc4(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut s: Vec<u8> = (0..=255).collect();
    let mut j = 0usize;
    for i in 0..256 {
        j = (j + s[i] as usize + key[i % key.len()] as usize) % 256;
        s.swap(i, j);
    }
    let (mut i, mut j) = (0usize, 0usize);
    data.iter()
        .map(|byte| {
            i = (i + 1) % 256;
            j = (j + s[i] as usize) % 256;
            s.swap(i, j);
            byte ^ s[(s[i] as usize + s[j] as usize) % 256]
        })
        .collect()
}

fn encode(value: &str, encoding: StringEncoding, key: Option<&str>) -> String {
    match (encoding, key) {
        (StringEncoding::Base64, _) => STANDARD_NO_PAD.encode(value.as_bytes()),
        (StringEncoding::Rc4, Some(key)) => {
            STANDARD_NO_PAD.encode(rc4(key.as_bytes(), value.as_bytes()))
        }
        _ => value.to_string(),
    }
}

/// One piece of a planned string: emitted as a literal or read from the array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    Literal(String),
    Entry(usize),
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    encoding: StringEncoding,
    key: Option<String>,
}

/// Collects extracted strings while the program is scanned.
#[derive(Debug, Default)]
pub struct StringArrayBuilder {
    entries: Vec<Entry>,
    lookup: HashMap<(String, StringEncoding), usize>,
}

impl StringArrayBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide how one string literal value is emitted.
    pub fn plan<R: Rng>(
        &mut self,
        value: &str,
        settings: &EngineSettings,
        rng: &mut R,
    ) -> Vec<Chunk> {
        let forced = settings.force_transform_strings.iter().any(|re| re.is_match(value));
        let reserved = settings.reserved_strings.iter().any(|re| re.is_match(value));
        if reserved && !forced {
            return vec![Chunk::Literal(value.to_string())];
        }

        let pieces = if settings.split_strings {
            split(value, settings.split_strings_chunk_length)
        } else {
            vec![value.to_string()]
        };

        pieces
            .into_iter()
            .map(|piece| {
                let extract = settings.string_array
                    && !piece.is_empty()
                    && (forced || rng.gen_bool(settings.string_array_threshold));
                if extract {
                    Chunk::Entry(self.intern(&piece, &settings.string_array_encoding, rng))
                } else {
                    Chunk::Literal(piece)
                }
            })
            .collect()
    }

    fn intern<R: Rng>(&mut self, value: &str, encodings: &[StringEncoding], rng: &mut R) -> usize {
        let encoding = encodings.choose(rng).copied().unwrap_or(StringEncoding::None);
        let lookup_key = (value.to_string(), encoding);
        if let Some(&entry) = self.lookup.get(&lookup_key) {
            return entry;
        }
        let key = (encoding == StringEncoding::Rc4).then(|| {
            (0..4)
                .map(|_| char::from(rng.sample(Alphanumeric)))
                .collect::<String>()
        });
        self.entries.push(Entry {
            value: value.to_string(),
            encoding,
            key,
        });
        let entry = self.entries.len() - 1;
        self.lookup.insert(lookup_key, entry);
        entry
    }

    pub fn finish<R: Rng>(
        self,
        settings: &EngineSettings,
        names: &mut NameGenerator,
        rng: &mut R,
    ) -> StringArray {
        let count = self.entries.len();
        let mut order: Vec<usize> = (0..count).collect();
        if settings.string_array_shuffle {
            order.shuffle(rng);
        }
        let mut positions = vec![0; count];
        for (position, &entry) in order.iter().enumerate() {
            positions[entry] = position;
        }

        let shift = if settings.string_array_index_shift && count > 0 {
            rng.gen_range(0x64..=0x3e8)
        } else {
            0
        };
        let rotation = if settings.string_array_rotate && count > 1 {
            rng.gen_range(0x64..=0x1f4)
        } else {
            0
        };

        let mut stored = vec![String::new(); count];
        for (position, &entry) in order.iter().enumerate() {
            let e = &self.entries[entry];
            stored[(position + rotation) % count.max(1)] =
                encode(&e.value, e.encoding, e.key.as_deref());
        }

        let encoded = self.entries.iter().any(|e| e.encoding != StringEncoding::None);
        let mut array = StringArray {
            array_name: String::new(),
            accessor: Callable::accessor(String::new()),
            wrappers: Vec::new(),
            declarations: Vec::new(),
            entries: self.entries,
            positions,
            shift,
            indexes_types: settings.string_array_indexes_type.clone(),
        };
        if count == 0 {
            return array;
        }

        array.array_name = names.next(rng);
        array.accessor = Callable::accessor(names.next(rng));

        let quoted: Vec<String> = stored
            .iter()
            .map(|s| quote(s, settings.unicode_escape_sequence))
            .collect();
        array
            .declarations
            .push(format!("var {}=[{}];", array.array_name, quoted.join(",")));

        if rotation > 0 {
            let (a, n) = (names.next(rng), names.next(rng));
            array.declarations.push(format!(
                "(function({a},{n}){{while({n}--){{{a}['push']({a}['shift']());}}}})({},0x{:x});",
                array.array_name, rotation
            ));
        }

        let decoders = encoded.then(|| Decoders::declare(&mut array.declarations, names, rng));
        let accessor = accessor_declaration(&array, shift, decoders.as_ref(), names, rng);
        array.declarations.push(accessor);

        for _ in 0..settings.string_array_wrappers_count {
            let target = if settings.string_array_wrappers_chained_calls
                && !array.wrappers.is_empty()
            {
                array.wrappers.choose(rng).cloned().unwrap_or_else(|| array.accessor.clone())
            } else {
                array.accessor.clone()
            };
            let name = names.next(rng);
            let wrapper = match settings.string_array_wrappers_type {
                WrappersType::Variable => {
                    array
                        .declarations
                        .push(format!("var {}={};", name, target.name));
                    Callable { name, direct: false, ..target }
                }
                WrappersType::Function => {
                    let (declaration, wrapper) = function_wrapper(
                        name,
                        &target,
                        settings.string_array_wrappers_parameters_max_count,
                        names,
                        rng,
                    );
                    array.declarations.push(declaration);
                    wrapper
                }
            };
            array.wrappers.push(wrapper);
        }

        array
    }
}

/// A function that reads the array: the accessor itself or a wrapper.
#[derive(Debug, Clone)]
struct Callable {
    name: String,
    arity: usize,
    index_at: usize,
    mode_at: usize,
    key_at: usize,
    /// Added to the real index by callers, subtracted again inside.
    offset: usize,
    /// The accessor, called with only the arguments it needs.
    direct: bool,
}

impl Callable {
    fn accessor(name: String) -> Self {
        Self {
            name,
            arity: 3,
            index_at: 0,
            mode_at: 1,
            key_at: 2,
            offset: 0,
            direct: true,
        }
    }
}

fn function_wrapper<R: Rng>(
    name: String,
    target: &Callable,
    max_parameters: usize,
    names: &mut NameGenerator,
    rng: &mut R,
) -> (String, Callable) {
    let arity = rng.gen_range(3..=max_parameters.max(3));
    let slots = index::sample(rng, arity, 3).into_vec();
    let (index_at, mode_at, key_at) = (slots[0], slots[1], slots[2]);
    let offset = rng.gen_range(0x1..=0x1ff);
    let params: Vec<String> = (0..arity).map(|_| names.next(rng)).collect();

    let args: Vec<String> = (0..target.arity)
        .map(|slot| {
            if slot == target.index_at {
                format!("{}-0x{:x}", params[index_at], offset)
            } else if slot == target.mode_at {
                params[mode_at].clone()
            } else if slot == target.key_at {
                params[key_at].clone()
            } else {
                decoy(rng)
            }
        })
        .collect();

    let declaration = format!(
        "function {}({}){{return {}({});}}",
        name,
        params.join(","),
        target.name,
        args.join(",")
    );
    let wrapper = Callable {
        name,
        arity,
        index_at,
        mode_at,
        key_at,
        offset: target.offset + offset,
        direct: false,
    };
    (declaration, wrapper)
}

fn decoy<R: Rng>(rng: &mut R) -> String {
    format!("0x{:x}", rng.gen_range(0..0x400))
}

/// Names of the runtime helpers that undo base64 and RC4.
struct Decoders {
    base64: String,
    utf8: String,
    rc4: String,
}

impl Decoders {
    fn declare<R: Rng>(out: &mut Vec<String>, names: &mut NameGenerator, rng: &mut R) -> Self {
        let decoders = Self {
            base64: names.next(rng),
            utf8: names.next(rng),
            rc4: names.next(rng),
        };

        let [s, c, r, b, n, x, j] = fresh(names, rng);
        out.push(format!(
            "function {f}({s}){{var {c}='{alphabet}',{r}=[],{b}=0x0,{n}=0x0,{x},{j};\
             for({j}=0x0;{j}<{s}.length;{j}++){{{x}={c}.indexOf({s}.charAt({j}));if({x}<0x0){{continue;}}\
             {b}=(({b}<<0x6)|{x})&0xffff;{n}+=0x6;if({n}>=0x8){{{n}-=0x8;{r}.push(({b}>>{n})&0xff);}}}}return {r};}}",
            f = decoders.base64,
            alphabet = BASE64_ALPHABET,
        ));

        let [r, o, j] = fresh(names, rng);
        out.push(format!(
            "function {f}({r}){{var {o}='',{j};for({j}=0x0;{j}<{r}.length;{j}++){{\
             {o}+='%'+('0'+{r}[{j}].toString(0x10)).slice(-0x2);}}return decodeURIComponent({o});}}",
            f = decoders.utf8,
        ));

        let [r, k, t, q, j, z, o] = fresh(names, rng);
        out.push(format!(
            "function {f}({r},{k}){{var {t}=[],{q},{j}=0x0,{z},{o}=[],{y};\
             for({q}=0x0;{q}<0x100;{q}++){{{t}[{q}]={q};}}\
             for({q}=0x0;{q}<0x100;{q}++){{{j}=({j}+{t}[{q}]+{k}.charCodeAt({q}%{k}.length))%0x100;{z}={t}[{q}];{t}[{q}]={t}[{j}];{t}[{j}]={z};}}\
             {q}=0x0;{j}=0x0;for({y}=0x0;{y}<{r}.length;{y}++){{{q}=({q}+0x1)%0x100;{j}=({j}+{t}[{q}])%0x100;\
             {z}={t}[{q}];{t}[{q}]={t}[{j}];{t}[{j}]={z};{o}.push({r}[{y}]^{t}[({t}[{q}]+{t}[{j}])%0x100]);}}return {o};}}",
            f = decoders.rc4,
            y = names.next(rng),
        ));

        decoders
    }
}

fn fresh<R: Rng, const N: usize>(names: &mut NameGenerator, rng: &mut R) -> [String; N] {
    std::array::from_fn(|_| names.next(rng))
}

fn accessor_declaration<R: Rng>(
    array: &StringArray,
    shift: usize,
    decoders: Option<&Decoders>,
    names: &mut NameGenerator,
    rng: &mut R,
) -> String {
    let [i, m, k, s] = fresh(names, rng);
    let decode = match decoders {
        Some(d) => format!(
            "if({m}===0x1){{{s}={u}({b}({s}));}}else if({m}===0x2){{{s}={u}({rc}({b}({s}),{k}));}}",
            u = d.utf8,
            b = d.base64,
            rc = d.rc4,
        ),
        None => String::new(),
    };
    format!(
        "function {f}({i},{m},{k}){{{i}={i}-0x{shift:x};var {s}={arr}[{i}];{decode}return {s};}}",
        f = array.accessor.name,
        arr = array.array_name,
    )
}

/// The finished array: its declarations and how to call into it.
#[derive(Debug)]
pub struct StringArray {
    array_name: String,
    accessor: Callable,
    wrappers: Vec<Callable>,
    declarations: Vec<String>,
    entries: Vec<Entry>,
    positions: Vec<usize>,
    shift: usize,
    indexes_types: Vec<IndexesType>,
}

impl StringArray {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Statements to place at the top of the program.
    pub fn declarations(&self) -> &[String] {
        &self.declarations
    }

    /// Source text of a planned string.
    pub fn render<R: Rng>(&self, chunks: &[Chunk], unicode_escape: bool, rng: &mut R) -> String {
        let parts: Vec<String> = chunks
            .iter()
            .map(|chunk| match chunk {
                Chunk::Literal(value) => quote(value, unicode_escape),
                Chunk::Entry(entry) => self.call(*entry, rng),
            })
            .collect();
        if parts.len() == 1 {
            parts.into_iter().next().unwrap_or_default()
        } else {
            format!("({})", parts.join("+"))
        }
    }

    fn call<R: Rng>(&self, entry: usize, rng: &mut R) -> String {
        let callable = self.wrappers.choose(rng).unwrap_or(&self.accessor);
        let e = &self.entries[entry];
        let index = self.positions[entry] + self.shift + callable.offset;
        let index = match self.indexes_types.choose(rng) {
            Some(IndexesType::HexadecimalNumericString) => format!("'0x{:x}'", index),
            _ => format!("0x{:x}", index),
        };
        let mode = match e.encoding {
            StringEncoding::None => "0x0",
            StringEncoding::Base64 => "0x1",
            StringEncoding::Rc4 => "0x2",
        };
        let key = e.key.as_deref().map(|k| quote(k, false));

        if callable.direct {
            return match (e.encoding, key) {
                (StringEncoding::None, _) => format!("{}({})", callable.name, index),
                (_, Some(key)) => format!("{}({},{},{})", callable.name, index, mode, key),
                (_, None) => format!("{}({},{})", callable.name, index, mode),
            };
        }

        let args: Vec<String> = (0..callable.arity)
            .map(|slot| {
                if slot == callable.index_at {
                    index.clone()
                } else if slot == callable.mode_at {
                    mode.to_string()
                } else if slot == callable.key_at {
                    key.clone().unwrap_or_else(|| decoy(rng))
                } else {
                    decoy(rng)
                }
            })
            .collect();
        format!("{}({})", callable.name, args.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::IdentifierNamesGenerator;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn names(rng: &mut StdRng) -> NameGenerator {
        NameGenerator::new(IdentifierNamesGenerator::Hexadecimal, "", &[], HashSet::new(), rng)
    }

    #[test]
    fn cooks_escapes() {
        assert_eq!(cook(r"'a\'b'").as_deref(), Some("a'b"));
        assert_eq!(cook(r#""tab\there\n""#).as_deref(), Some("tab\there\n"));
        assert_eq!(cook(r"'\x41B\u{43}'").as_deref(), Some("ABC"));
        assert_eq!(cook(r"'😀'").as_deref(), Some("\u{1f600}"));
        assert_eq!(cook(r"'\101'").as_deref(), Some("A"));
        assert_eq!(cook("'line\\\ncontinued'").as_deref(), Some("linecontinued"));
        assert_eq!(cook(r"'\ud83d'"), None);
    }

    #[test]
    fn quotes_and_escapes() {
        assert_eq!(quote("it's", false), r"'it\'s'");
        assert_eq!(quote("a\nb", false), r"'a\nb'");
        assert_eq!(quote("hi", true), r"'\x68\x69'");
        assert_eq!(quote("\u{1f600}", true), r"'\ud83d\ude00'");
    }

    #[test]
    fn splits_by_characters() {
        assert_eq!(split("abcdefg", 3), vec!["abc", "def", "g"]);
        assert_eq!(split("", 3), vec![""]);
        assert_eq!(split("é€x", 2), vec!["é€", "x"]);
    }

    #[test]
    fn rc4_is_symmetric() {
        let cipher = rc4(b"Key", b"Plaintext");
        assert_eq!(cipher, vec![0xbb, 0xf3, 0x16, 0xe8, 0xd9, 0x40, 0xaf, 0x0a, 0xd3]);
        assert_eq!(rc4(b"Key", &cipher), b"Plaintext");
    }

    #[test]
    fn reserved_strings_stay_literal() {
        let settings = EngineSettings {
            string_array_threshold: 1.0,
            reserved_strings: vec![regex::Regex::new("^keep").unwrap()],
            ..EngineSettings::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let mut builder = StringArrayBuilder::new();
        assert_eq!(
            builder.plan("keep me", &settings, &mut rng),
            vec![Chunk::Literal("keep me".into())]
        );
        assert_eq!(builder.plan("take me", &settings, &mut rng), vec![Chunk::Entry(0)]);
        assert_eq!(builder.plan("take me", &settings, &mut rng), vec![Chunk::Entry(0)]);
    }

    #[test]
    fn direct_calls_use_shifted_positions() {
        let settings = EngineSettings {
            string_array_threshold: 1.0,
            string_array_shuffle: false,
            string_array_rotate: false,
            string_array_index_shift: false,
            string_array_wrappers_count: 0,
            ..EngineSettings::default()
        };
        let mut rng = StdRng::seed_from_u64(9);
        let mut builder = StringArrayBuilder::new();
        let first = builder.plan("alpha", &settings, &mut rng);
        let second = builder.plan("beta", &settings, &mut rng);
        let mut names = names(&mut rng);
        let array = builder.finish(&settings, &mut names, &mut rng);

        assert!(array.declarations()[0].ends_with("=['alpha','beta'];"));
        let call = array.render(&second, false, &mut rng);
        assert!(call.ends_with("(0x1)"), "{}", call);
        let call = array.render(&first, false, &mut rng);
        assert!(call.ends_with("(0x0)"), "{}", call);
    }

    #[test]
    fn wrappers_carry_their_offsets() {
        let settings = EngineSettings {
            string_array_threshold: 1.0,
            string_array_wrappers_count: 3,
            string_array_wrappers_type: WrappersType::Function,
            string_array_wrappers_parameters_max_count: 5,
            ..EngineSettings::default()
        };
        let mut rng = StdRng::seed_from_u64(4);
        let mut builder = StringArrayBuilder::new();
        let chunks = builder.plan("value", &settings, &mut rng);
        let mut names = names(&mut rng);
        let array = builder.finish(&settings, &mut names, &mut rng);

        assert_eq!(array.wrappers.len(), 3);
        for wrapper in &array.wrappers {
            assert!(wrapper.offset > 0);
            assert!((3..=5).contains(&wrapper.arity));
        }
        let call = array.render(&chunks, false, &mut rng);
        assert!(array.wrappers.iter().any(|w| call.starts_with(&w.name)));
    }

    #[test]
    fn split_strings_render_as_concatenation() {
        let settings = EngineSettings {
            string_array: false,
            split_strings: true,
            split_strings_chunk_length: 2,
            ..EngineSettings::default()
        };
        let mut rng = StdRng::seed_from_u64(2);
        let mut builder = StringArrayBuilder::new();
        let chunks = builder.plan("abcde", &settings, &mut rng);
        let mut names = names(&mut rng);
        let array = builder.finish(&settings, &mut names, &mut rng);
        assert!(array.is_empty());
        assert_eq!(array.render(&chunks, false, &mut rng), "('ab'+'cd'+'e')");
    }
}
