//! Render-key suffix encodings.
//!
//! A suffix serializes the live values of a page's declared parameters, in the
//! order of its [`ParameterSet`](crate::domain::params::ParameterSet), so it
//! can be appended to the host's base cache key. Encodings are swappable
//! without touching the registry.

use serde::Deserialize;

pub const DEFAULT_SEPARATOR: char = '|';

const LENGTH_DELIMITER: char = ':';
const LENGTH_TERMINATOR: char = ';';

/// Reversible serialization of an ordered list of parameter values.
pub trait KeyEncoder {
    /// Encode `values`; an empty list always yields an empty suffix.
    fn encode(&self, values: &[String]) -> String;

    /// Recover `count` values from a suffix produced by [`KeyEncoder::encode`].
    ///
    /// `count` is the number of declared parameters the suffix was built from.
    /// Returns `None` when the input is not well formed or holds a different
    /// number of values.
    fn decode(&self, suffix: &str, count: usize) -> Option<Vec<String>>;
}

/// Separator-delimited encoding that escapes a literal separator by doubling it.
///
/// Each value is preceded by the separator and a non-empty suffix ends with
/// one more, so `["en"]` becomes `|en|` and `["a|b"]` becomes `|a||b|`.
///
/// Decoding needs the number of encoded values: a run of separators is split
/// into escaped literals and value boundaries so that the count comes out
/// right, with later runs taking boundaries first. Empty values therefore
/// decode exactly (`["a", ""]` is `|a||`, `["a", "", "c"]` is `|a||c|`).
/// Values can still collide when one ends with the separator and the next
/// starts with it (`["a|", "b"]` and `["a", "|b"]` both encode to `|a|||b|`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoublingEncoder {
    separator: char,
}

impl DoublingEncoder {
    pub fn new(separator: char) -> Self {
        Self { separator }
    }

    pub fn separator(&self) -> char {
        self.separator
    }

    fn escape_into(&self, value: &str, out: &mut String) {
        for ch in value.chars() {
            if ch == self.separator {
                out.push(ch);
            }
            out.push(ch);
        }
    }
}

impl Default for DoublingEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_SEPARATOR)
    }
}

impl KeyEncoder for DoublingEncoder {
    fn encode(&self, values: &[String]) -> String {
        if values.is_empty() {
            return String::new();
        }

        let capacity = values.iter().map(|value| value.len() + 1).sum::<usize>() + 1;
        let mut out = String::with_capacity(capacity);
        for value in values {
            out.push(self.separator);
            self.escape_into(value, &mut out);
        }
        out.push(self.separator);
        out
    }

    fn decode(&self, suffix: &str, count: usize) -> Option<Vec<String>> {
        if count == 0 {
            return suffix.is_empty().then(Vec::new);
        }

        let body = suffix
            .strip_prefix(self.separator)?
            .strip_suffix(self.separator)?;
        let chars: Vec<char> = body.chars().collect();

        // Each run of separators holds escaped literals (pairs) and value
        // boundaries. Start every run at its fewest boundaries, then hand the
        // remaining ones out in pairs from the last run backwards.
        let runs = separator_runs(&chars, self.separator);
        let mut cuts: Vec<usize> = runs.iter().map(|&len| len % 2).collect();
        let mut missing = (count - 1).checked_sub(cuts.iter().sum())?;
        if missing % 2 != 0 {
            return None;
        }
        for (cut, &len) in cuts.iter_mut().zip(&runs).rev() {
            let extra = (len - *cut).min(missing);
            *cut += extra;
            missing -= extra;
        }
        if missing != 0 {
            return None;
        }

        let mut values = Vec::with_capacity(count);
        let mut current = String::new();
        let mut runs = runs.iter().zip(&cuts);
        let mut pos = 0;
        while pos < chars.len() {
            if chars[pos] != self.separator {
                current.push(chars[pos]);
                pos += 1;
                continue;
            }
            let (&len, &cut) = runs.next()?;
            current.extend(std::iter::repeat_n(self.separator, (len - cut) / 2));
            for _ in 0..cut {
                values.push(std::mem::take(&mut current));
            }
            pos += len;
        }
        values.push(current);
        Some(values)
    }
}

fn separator_runs(chars: &[char], separator: char) -> Vec<usize> {
    let mut runs = Vec::new();
    let mut pos = 0;
    while pos < chars.len() {
        if chars[pos] != separator {
            pos += 1;
            continue;
        }
        let start = pos;
        while pos < chars.len() && chars[pos] == separator {
            pos += 1;
        }
        runs.push(pos - start);
    }
    runs
}

/// Length-prefixed encoding: `<bytes>:<value>` per value, then `;`.
///
/// Unambiguous for any values, at the cost of longer keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LengthPrefixedEncoder;

impl KeyEncoder for LengthPrefixedEncoder {
    fn encode(&self, values: &[String]) -> String {
        if values.is_empty() {
            return String::new();
        }

        let mut out = String::new();
        for value in values {
            out.push_str(&value.len().to_string());
            out.push(LENGTH_DELIMITER);
            out.push_str(value);
        }
        out.push(LENGTH_TERMINATOR);
        out
    }

    fn decode(&self, suffix: &str, count: usize) -> Option<Vec<String>> {
        if count == 0 {
            return suffix.is_empty().then(Vec::new);
        }

        let mut rest = suffix;
        let mut values = Vec::with_capacity(count);
        loop {
            if rest == ";" {
                return (values.len() == count).then_some(values);
            }
            let (len, tail) = rest.split_once(LENGTH_DELIMITER)?;
            if len.is_empty() || !len.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let len: usize = len.parse().ok()?;
            let value = tail.get(..len)?;
            values.push(value.to_string());
            rest = &tail[len..];
        }
    }
}

/// Encoding selected in configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyEncoding {
    #[default]
    Doubling,
    LengthPrefixed,
}

/// Concrete encoder used by the render-key deriver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuffixEncoder {
    Doubling(DoublingEncoder),
    LengthPrefixed(LengthPrefixedEncoder),
}

impl SuffixEncoder {
    pub fn from_encoding(encoding: KeyEncoding, separator: char) -> Self {
        match encoding {
            KeyEncoding::Doubling => Self::Doubling(DoublingEncoder::new(separator)),
            KeyEncoding::LengthPrefixed => Self::LengthPrefixed(LengthPrefixedEncoder),
        }
    }
}

impl Default for SuffixEncoder {
    fn default() -> Self {
        Self::Doubling(DoublingEncoder::default())
    }
}

impl KeyEncoder for SuffixEncoder {
    fn encode(&self, values: &[String]) -> String {
        match self {
            Self::Doubling(encoder) => encoder.encode(values),
            Self::LengthPrefixed(encoder) => encoder.encode(values),
        }
    }

    fn decode(&self, suffix: &str, count: usize) -> Option<Vec<String>> {
        match self {
            Self::Doubling(encoder) => encoder.decode(suffix, count),
            Self::LengthPrefixed(encoder) => encoder.decode(suffix, count),
        }
    }
}
