//! Identifier name generation

use super::lexer::{is_id_part, is_id_start, is_keyword};
use super::settings::IdentifierNamesGenerator;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;

const FIRST_CHARS: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const OTHER_CHARS: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Reserved in strict mode code only.
const STRICT_RESERVED: &[&str] = &[
    "implements", "interface", "package", "private", "protected", "public", "static",
];

/// Produces fresh identifiers that collide neither with each other nor with
/// any name already present in the program.
pub struct NameGenerator {
    kind: IdentifierNamesGenerator,
    prefix: String,
    taken: HashSet<String>,
    first_chars: Vec<char>,
    counter: usize,
    dictionary: Vec<String>,
}

impl NameGenerator {
    pub fn new<R: Rng>(
        kind: IdentifierNamesGenerator,
        prefix: &str,
        dictionary: &[String],
        taken: HashSet<String>,
        rng: &mut R,
    ) -> Self {
        let mut first_chars: Vec<char> = FIRST_CHARS.chars().collect();
        if kind == IdentifierNamesGenerator::MangledShuffled {
            first_chars.shuffle(rng);
        }
        let mut dictionary = dictionary.to_vec();
        dictionary.shuffle(rng);
        Self {
            kind,
            prefix: prefix.to_string(),
            taken,
            first_chars,
            counter: 0,
            dictionary,
        }
    }

    pub fn next<R: Rng>(&mut self, rng: &mut R) -> String {
        loop {
            let candidate = match self.kind {
                IdentifierNamesGenerator::Hexadecimal => {
                    format!("{}_0x{:x}", self.prefix, rng.gen_range(0x10000u32..=0xffffff))
                }
                IdentifierNamesGenerator::Mangled | IdentifierNamesGenerator::MangledShuffled => {
                    let name = format!("{}{}", self.prefix, self.mangled(self.counter));
                    self.counter += 1;
                    name
                }
                IdentifierNamesGenerator::Dictionary => {
                    let name = self.dictionary_name();
                    self.counter += 1;
                    name
                }
            };
            if !is_keyword(&candidate)
                && !STRICT_RESERVED.contains(&candidate.as_str())
                && self.taken.insert(candidate.clone())
            {
                return candidate;
            }
        }
    }

    fn mangled(&self, mut index: usize) -> String {
        let other: Vec<char> = OTHER_CHARS.chars().collect();
        let mut name = String::new();
        name.push(self.first_chars[index % self.first_chars.len()]);
        index /= self.first_chars.len();
        while index > 0 {
            index -= 1;
            name.push(other[index % other.len()]);
            index /= other.len();
        }
        name
    }

    fn dictionary_name(&self) -> String {
        if self.dictionary.is_empty() {
            return format!("{}{}", self.prefix, self.mangled(self.counter));
        }
        let word = &self.dictionary[self.counter % self.dictionary.len()];
        let round = self.counter / self.dictionary.len();
        if round == 0 {
            format!("{}{}", self.prefix, word)
        } else {
            format!("{}{}{}", self.prefix, word, round)
        }
    }
}

/// True when `name` is usable as a plain identifier.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if is_id_start(c) => chars.all(is_id_part) && !is_keyword(name),
        _ => false,
    }
}
