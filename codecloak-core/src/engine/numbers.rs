//! Numeric literal rewriting

use rand::Rng;

/// Largest integer a JavaScript number holds exactly.
const MAX_SAFE_INTEGER: u64 = (1 << 53) - 1;

/// Above this, arithmetic replacements could lose precision.
const MAX_EXPRESSION_VALUE: u64 = 1 << 48;

/// Integer value of a numeric literal, if it is a plain safe integer.
pub fn integer_value(text: &str) -> Option<u64> {
    let digits: String = text.chars().filter(|c| *c != '_').collect();
    let lower = digits.to_ascii_lowercase();
    let value = if let Some(hex) = lower.strip_prefix("0x") {
        u64::from_str_radix(hex, 16).ok()?
    } else if let Some(oct) = lower.strip_prefix("0o") {
        u64::from_str_radix(oct, 8).ok()?
    } else if let Some(bin) = lower.strip_prefix("0b") {
        u64::from_str_radix(bin, 2).ok()?
    } else if lower.len() > 1 && lower.starts_with('0') {
        // legacy octal or `08`
        return None;
    } else if lower.chars().all(|c| c.is_ascii_digit()) && !lower.is_empty() {
        lower.parse().ok()?
    } else {
        return None;
    };
    (value <= MAX_SAFE_INTEGER).then_some(value)
}

/// Replacement text for a numeric literal, or `None` to keep it.
pub fn render<R: Rng>(text: &str, to_expressions: bool, rng: &mut R) -> Option<String> {
    let value = integer_value(text)?;
    if to_expressions && value <= MAX_EXPRESSION_VALUE {
        Some(expression(value, rng))
    } else {
        Some(format!("0x{:x}", value))
    }
}

/// `(0x1f+0x2a0-0x28e)`-style sum that evaluates to `value`.
fn expression<R: Rng>(value: u64, rng: &mut R) -> String {
    let count = rng.gen_range(2..=4);
    let mut terms: Vec<i64> = (0..count - 1)
        .map(|_| rng.gen_range(-0xfffff..=0xfffff))
        .collect();
    let rest = value as i64 - terms.iter().sum::<i64>();
    terms.push(rest);

    let mut out = String::from("(");
    for (i, term) in terms.iter().enumerate() {
        match (i, *term < 0) {
            (0, true) => out.push('-'),
            (0, false) => {}
            (_, true) => out.push('-'),
            (_, false) => out.push('+'),
        }
        out.push_str(&format!("0x{:x}", term.unsigned_abs()));
    }
    out.push(')');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn evaluate(expr: &str) -> i64 {
        let body = expr.trim_start_matches('(').trim_end_matches(')');
        let mut total = 0i64;
        let mut sign = 1i64;
        let mut current = String::new();
        let flush = |current: &mut String, sign: i64, total: &mut i64| {
            if !current.is_empty() {
                *total += sign * i64::from_str_radix(current.trim_start_matches("0x"), 16).unwrap();
                current.clear();
            }
        };
        for c in body.chars() {
            match c {
                '+' | '-' => {
                    flush(&mut current, sign, &mut total);
                    sign = if c == '-' { -1 } else { 1 };
                }
                c => current.push(c),
            }
        }
        flush(&mut current, sign, &mut total);
        total
    }

    #[test]
    fn reads_integer_forms() {
        assert_eq!(integer_value("42"), Some(42));
        assert_eq!(integer_value("0xFF"), Some(255));
        assert_eq!(integer_value("0o17"), Some(15));
        assert_eq!(integer_value("0b101"), Some(5));
        assert_eq!(integer_value("1_000"), Some(1000));
        assert_eq!(integer_value("0"), Some(0));
        assert_eq!(integer_value("1.5"), None);
        assert_eq!(integer_value("1e3"), None);
        assert_eq!(integer_value("10n"), None);
        assert_eq!(integer_value("017"), None);
        assert_eq!(integer_value("9007199254740993"), None);
    }

    #[test]
    fn hexifies_without_expressions() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(render("255", false, &mut rng).as_deref(), Some("0xff"));
        assert_eq!(render("3.14", false, &mut rng), None);
    }

    proptest! {
        #[test]
        fn expressions_evaluate_to_the_literal(value in 0u64..=MAX_EXPRESSION_VALUE, seed: u64) {
            let mut rng = StdRng::seed_from_u64(seed);
            let expr = render(&value.to_string(), true, &mut rng).unwrap();
            prop_assert!(expr.starts_with('(') && expr.ends_with(')'));
            prop_assert_eq!(evaluate(&expr), value as i64);
        }
    }
}
