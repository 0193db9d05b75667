//! Label sequences used for image numbering and axis ticks.
//!
//! A [`LabelScheme`] describes *which* labels to produce; calling
//! [`LabelScheme::sequence`] with a count yields a [`LabelSequence`], a lazy
//! iterator of exactly that many labels that can be restarted and cloned.
//!
//! Alphabetic schemes run through their alphabet once and then continue
//! with a numeric pass suffix (`A … Z, A1 … Z1, A2 …`) so every label in a
//! sequence is unique regardless of length.

use crate::error::ScienceHelperError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest value expressible with standard Roman numerals.
pub const ROMAN_MAX: usize = 3999;

const LATIN_LOWER: &[&str] = &[
    "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p", "q", "r", "s",
    "t", "u", "v", "w", "x", "y", "z",
];

const CYRILLIC_LOWER: &[&str] = &[
    "а", "б", "в", "г", "д", "е", "ё", "ж", "з", "и", "й", "к", "л", "м", "н", "о", "п", "р", "с",
    "т", "у", "ф", "х", "ц", "ч", "ш", "щ", "ъ", "ы", "ь", "э", "ю", "я",
];

const ROMAN_TABLE: &[(usize, &str)] = &[
    (1000, "M"),
    (900, "CM"),
    (500, "D"),
    (400, "CD"),
    (100, "C"),
    (90, "XC"),
    (50, "L"),
    (40, "XL"),
    (10, "X"),
    (9, "IX"),
    (5, "V"),
    (4, "IV"),
    (1, "I"),
];

/// Numbering style for images or axis ticks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LabelScheme {
    LatinLower,
    #[default]
    LatinUpper,
    CyrillicLower,
    CyrillicUpper,
    Arabic,
    Roman,
    /// Caller-supplied labels, used verbatim and in order.
    Custom(Vec<String>),
}

impl LabelScheme {
    /// Produce a sequence of exactly `n` labels.
    ///
    /// # Errors
    /// * [`ScienceHelperError::RangeError`]: Roman numerals past 3999.
    /// * [`ScienceHelperError::InvalidConfig`]: a custom list whose length
    ///   differs from `n`.
    pub fn sequence(&self, n: usize) -> Result<LabelSequence, ScienceHelperError> {
        match self {
            LabelScheme::Roman if n > ROMAN_MAX => Err(ScienceHelperError::RangeError(format!(
                "cannot number {n} items with Roman numerals (max {ROMAN_MAX})"
            ))),
            LabelScheme::Custom(list) if list.len() != n => {
                Err(ScienceHelperError::InvalidConfig(format!(
                    "custom label list has {} entries but {n} are needed",
                    list.len()
                )))
            }
            _ => Ok(LabelSequence {
                scheme: self.clone(),
                len: n,
                pos: 0,
            }),
        }
    }

    /// The label at 0-based position `index`, without range checks.
    fn label_at(&self, index: usize) -> String {
        match self {
            LabelScheme::LatinLower => alphabetic(LATIN_LOWER, index, false),
            LabelScheme::LatinUpper => alphabetic(LATIN_LOWER, index, true),
            LabelScheme::CyrillicLower => alphabetic(CYRILLIC_LOWER, index, false),
            LabelScheme::CyrillicUpper => alphabetic(CYRILLIC_LOWER, index, true),
            LabelScheme::Arabic => (index + 1).to_string(),
            LabelScheme::Roman => to_roman(index + 1),
            LabelScheme::Custom(list) => list.get(index).cloned().unwrap_or_default(),
        }
    }
}

impl fmt::Display for LabelScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LabelScheme::LatinLower => "latin-lower",
            LabelScheme::LatinUpper => "latin-upper",
            LabelScheme::CyrillicLower => "cyrillic-lower",
            LabelScheme::CyrillicUpper => "cyrillic-upper",
            LabelScheme::Arabic => "arabic",
            LabelScheme::Roman => "roman",
            LabelScheme::Custom(_) => "custom",
        };
        f.write_str(name)
    }
}

impl FromStr for LabelScheme {
    type Err = ScienceHelperError;

    /// Parse a scheme name, or a comma-separated custom list prefixed with
    /// `custom:` (e.g. `custom:α,β,γ`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(list) = s.strip_prefix("custom:") {
            return Ok(LabelScheme::Custom(
                list.split(',').map(|l| l.trim().to_string()).collect(),
            ));
        }
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "latin-lower" => Ok(LabelScheme::LatinLower),
            "latin-upper" | "latin" => Ok(LabelScheme::LatinUpper),
            "cyrillic-lower" => Ok(LabelScheme::CyrillicLower),
            "cyrillic-upper" | "cyrillic" => Ok(LabelScheme::CyrillicUpper),
            "arabic" | "numeric" => Ok(LabelScheme::Arabic),
            "roman" => Ok(LabelScheme::Roman),
            other => Err(ScienceHelperError::InvalidConfig(format!(
                "unknown label scheme '{other}'"
            ))),
        }
    }
}

/// A finite, restartable iterator over the labels of one scheme.
#[derive(Debug, Clone)]
pub struct LabelSequence {
    scheme: LabelScheme,
    len: usize,
    pos: usize,
}

impl LabelSequence {
    /// Rewind to the first label.
    pub fn restart(&mut self) {
        self.pos = 0;
    }

    pub fn scheme(&self) -> &LabelScheme {
        &self.scheme
    }

    /// Random access into the sequence.
    pub fn get(&self, index: usize) -> Option<String> {
        (index < self.len).then(|| self.scheme.label_at(index))
    }
}

impl Iterator for LabelSequence {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let label = self.get(self.pos)?;
        self.pos += 1;
        Some(label)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.len.saturating_sub(self.pos);
        (left, Some(left))
    }
}

impl ExactSizeIterator for LabelSequence {}

fn alphabetic(alphabet: &[&str], index: usize, upper: bool) -> String {
    let letter = alphabet[index % alphabet.len()];
    let letter = if upper {
        letter.to_uppercase()
    } else {
        letter.to_string()
    };
    match index / alphabet.len() {
        0 => letter,
        pass => format!("{letter}{pass}"),
    }
}

/// Standard subtractive Roman notation for `1..=3999`.
pub fn to_roman(mut value: usize) -> String {
    let mut out = String::new();
    for &(step, symbol) in ROMAN_TABLE {
        while value >= step {
            out.push_str(symbol);
            value -= step;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn collect(scheme: LabelScheme, n: usize) -> Vec<String> {
        scheme.sequence(n).unwrap().collect()
    }

    #[test]
    fn latin_upper_first_four() {
        assert_eq!(collect(LabelScheme::LatinUpper, 4), ["A", "B", "C", "D"]);
    }

    #[test]
    fn latin_wraps_with_pass_suffix() {
        let labels = collect(LabelScheme::LatinLower, 28);
        assert_eq!(labels[25], "z");
        assert_eq!(labels[26], "a1");
        assert_eq!(labels[27], "b1");
        let unique: HashSet<_> = labels.iter().collect();
        assert_eq!(unique.len(), 28);
    }

    #[test]
    fn cyrillic_alphabet_has_yo() {
        let labels = collect(LabelScheme::CyrillicUpper, 33);
        assert_eq!(labels[0], "А");
        assert_eq!(labels[6], "Ё");
        assert_eq!(labels[32], "Я");
        assert_eq!(collect(LabelScheme::CyrillicLower, 2), ["а", "б"]);
    }

    #[test]
    fn arabic_counts_from_one() {
        assert_eq!(collect(LabelScheme::Arabic, 3), ["1", "2", "3"]);
    }

    #[test]
    fn roman_known_values() {
        assert_eq!(to_roman(4), "IV");
        assert_eq!(to_roman(9), "IX");
        assert_eq!(to_roman(14), "XIV");
        assert_eq!(to_roman(1994), "MCMXCIV");
        assert_eq!(to_roman(3999), "MMMCMXCIX");
    }

    #[test]
    fn roman_unique_up_to_max() {
        let labels = collect(LabelScheme::Roman, ROMAN_MAX);
        assert_eq!(labels.len(), ROMAN_MAX);
        let unique: HashSet<_> = labels.iter().collect();
        assert_eq!(unique.len(), ROMAN_MAX);
        assert!(labels
            .iter()
            .all(|l| l.chars().all(|c| "IVXLCDM".contains(c))));
    }

    #[test]
    fn roman_past_max_is_range_error() {
        let err = LabelScheme::Roman.sequence(ROMAN_MAX + 1).unwrap_err();
        assert!(matches!(err, ScienceHelperError::RangeError(_)));
    }

    #[test]
    fn custom_length_must_match() {
        let scheme = LabelScheme::Custom(vec!["α".into(), "β".into()]);
        assert!(matches!(
            scheme.sequence(3),
            Err(ScienceHelperError::InvalidConfig(_))
        ));
        assert_eq!(collect(scheme, 2), ["α", "β"]);
    }

    #[test]
    fn sequence_is_exact_size_and_restartable() {
        let mut seq = LabelScheme::LatinUpper.sequence(3).unwrap();
        assert_eq!(seq.len(), 3);
        assert_eq!(seq.next().as_deref(), Some("A"));
        assert_eq!(seq.len(), 2);
        let rest: Vec<_> = seq.by_ref().collect();
        assert_eq!(rest, ["B", "C"]);
        assert_eq!(seq.next(), None);
        seq.restart();
        assert_eq!(seq.next().as_deref(), Some("A"));
    }

    #[test]
    fn empty_sequence_is_valid() {
        assert_eq!(LabelScheme::Roman.sequence(0).unwrap().count(), 0);
    }

    #[test]
    fn scheme_parses_cli_names() {
        assert_eq!(
            "latin-lower".parse::<LabelScheme>().unwrap(),
            LabelScheme::LatinLower
        );
        assert_eq!(
            "CYRILLIC_UPPER".parse::<LabelScheme>().unwrap(),
            LabelScheme::CyrillicUpper
        );
        assert_eq!(
            "custom:x, y".parse::<LabelScheme>().unwrap(),
            LabelScheme::Custom(vec!["x".into(), "y".into()])
        );
        assert!("greek".parse::<LabelScheme>().is_err());
    }
}
