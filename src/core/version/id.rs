// ─── Version Id ───
// Parses and compares dotted/dashed version-ids with optional `+` / `*` modifiers.

use std::cmp::Ordering;
use std::fmt;

/// Characters that split a version-id into elements.
const SEPARATORS: [char; 3] = ['.', '-', '_'];

/// Trailing modifier of a version-id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    None,
    /// `+`: greater-than-or-equal match.
    AtLeast,
    /// `*`: prefix match.
    Prefix,
}

impl Modifier {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(Modifier::AtLeast),
            '*' => Some(Modifier::Prefix),
            _ => None,
        }
    }
}

/// A version-id reduced to a tuple of elements.
///
/// `"1.3.0-rc2_001"` becomes `(1, 3, 0, rc2, 001)`. Elements compare
/// numerically when both parse as integers and lexicographically otherwise.
/// Equality is defined by [`Version::compare`], so it honours modifiers and is
/// not transitive; `Version` deliberately implements neither `Eq` nor `Hash`.
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    modifier: Modifier,
    elements: Vec<String>,
}

impl Version {
    /// The version-id with no value.
    pub fn empty() -> Self {
        Self::parse("")
    }

    /// Parse a version-id. The id ends at the first space.
    pub fn parse(input: &str) -> Self {
        let raw = input.split(' ').next().unwrap_or_default();

        let (prefix, modifier) = match raw.chars().last().and_then(Modifier::from_char) {
            Some(modifier) => (&raw[..raw.len() - 1], modifier),
            None => (raw, Modifier::None),
        };

        let elements = prefix
            .split(SEPARATORS)
            .filter(|element| !element.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            raw: raw.to_string(),
            modifier,
            elements,
        }
    }

    pub fn modifier(&self) -> Modifier {
        self.modifier
    }

    /// The version-id without its modifier.
    pub fn prefix(&self) -> &str {
        match self.modifier {
            Modifier::None => &self.raw,
            _ => &self.raw[..self.raw.len() - 1],
        }
    }

    pub fn elements(&self) -> &[String] {
        &self.elements
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Compare two version-ids, taking modifiers into account.
    ///
    /// Both tuples are padded with `"0"` to the longer length, except that a
    /// `*` side caps the length at its own element count. A `+` on the left
    /// turns "less" into "equal"; a `+` on the right turns "greater" into
    /// "equal".
    pub fn compare(&self, other: &Version) -> Ordering {
        let mut len = self.elements.len().max(other.elements.len());

        if self.modifier == Modifier::Prefix {
            len = len.min(self.elements.len());
        }
        if other.modifier == Modifier::Prefix {
            len = len.min(other.elements.len());
        }

        let a = normalized(&self.elements, len);
        let b = normalized(&other.elements, len);

        match compare_tuples(&a, &b) {
            Ordering::Less if self.modifier == Modifier::AtLeast => Ordering::Equal,
            Ordering::Greater if other.modifier == Modifier::AtLeast => Ordering::Equal,
            ordering => ordering,
        }
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.compare(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Parse a space-separated list of version-ids.
///
/// An absent or blank list yields a single empty version-id.
pub fn parse_versions(input: Option<&str>) -> Vec<Version> {
    let versions: Vec<Version> = input
        .map(|s| s.split(' ').filter(|v| !v.is_empty()).map(Version::parse).collect())
        .unwrap_or_default();

    if versions.is_empty() {
        vec![Version::empty()]
    } else {
        versions
    }
}

/// Pad with `"0"` or truncate to exactly `len` elements.
fn normalized(elements: &[String], len: usize) -> Vec<&str> {
    (0..len)
        .map(|idx| elements.get(idx).map(String::as_str).unwrap_or("0"))
        .collect()
}

/// Head/tail comparison of two normalized tuples of equal length.
fn compare_tuples(a: &[&str], b: &[&str]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        match compare_elements(x, y) {
            Ordering::Equal => continue,
            non_eq => return non_eq,
        }
    }

    a.len().cmp(&b.len())
}

fn compare_elements(a: &str, b: &str) -> Ordering {
    match (a.parse::<i32>(), b.parse::<i32>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: &[&str] = &[
        "", "1", "1.0", "1.3", "1.3.0", "1.3.1", "1.3.0-rc2_001", "1.4+", "1.4*", "2", "2.0a",
        "10", "1.10", "1.9", "beta", "1.0+", "0.9",
    ];

    #[test]
    fn parse_splits_on_all_separators() {
        let v = Version::parse("1.3.0-rc2_001");
        assert_eq!(v.elements(), &["1", "3", "0", "rc2", "001"]);
        assert_eq!(v.modifier(), Modifier::None);
        assert_eq!(v.to_string(), "1.3.0-rc2_001");
    }

    #[test]
    fn parse_detects_modifiers_and_stops_at_space() {
        let plus = Version::parse("1.4+ trailing");
        assert_eq!(plus.modifier(), Modifier::AtLeast);
        assert_eq!(plus.prefix(), "1.4");
        assert_eq!(plus.to_string(), "1.4+");

        let splat = Version::parse("1.4*");
        assert_eq!(splat.modifier(), Modifier::Prefix);
        assert_eq!(splat.elements(), &["1", "4"]);
    }

    #[test]
    fn padding_makes_trailing_zeros_equal() {
        assert_eq!(
            Version::parse("1.3.0").compare(&Version::parse("1.3")),
            Ordering::Equal
        );
        assert_eq!(Version::parse("1.3.0"), Version::parse("1.3"));
    }

    #[test]
    fn numeric_elements_compare_numerically() {
        assert!(Version::parse("1.10") > Version::parse("1.9"));
        assert!(Version::parse("10") > Version::parse("9"));
    }

    #[test]
    fn non_numeric_elements_fall_back_to_lexicographic() {
        assert!(Version::parse("1.0a") < Version::parse("1.0b"));
        // overflows an i32, so it compares as text
        assert!(Version::parse("10000000000") < Version::parse("9"));
    }

    #[test]
    fn plus_modifier_only_coerces_less_than() {
        let at_least = Version::parse("1.0+");
        assert_eq!(at_least.compare(&Version::parse("1.5")), Ordering::Equal);
        assert_eq!(at_least.compare(&Version::parse("0.9")), Ordering::Greater);
        assert_eq!(Version::parse("1.5").compare(&at_least), Ordering::Equal);
        assert_eq!(Version::parse("0.9").compare(&at_least), Ordering::Less);
    }

    #[test]
    fn splat_modifier_matches_prefix() {
        let prefix = Version::parse("1.4*");
        assert_eq!(prefix.compare(&Version::parse("1.4.2")), Ordering::Equal);
        assert_eq!(prefix.compare(&Version::parse("1.4.2_05")), Ordering::Equal);
        assert_eq!(prefix.compare(&Version::parse("1.5.0")), Ordering::Less);
    }

    #[test]
    fn comparison_is_reflexive_and_antisymmetric() {
        for a in SAMPLES {
            let va = Version::parse(a);
            assert_eq!(va.compare(&va), Ordering::Equal, "{a} vs itself");

            for b in SAMPLES {
                let vb = Version::parse(b);
                // `+` coercion is one-sided, so antisymmetry only holds without it
                if va.modifier() == Modifier::AtLeast || vb.modifier() == Modifier::AtLeast {
                    continue;
                }
                assert_eq!(
                    va.compare(&vb),
                    vb.compare(&va).reverse(),
                    "{a} vs {b}"
                );
            }
        }
    }

    #[test]
    fn parse_versions_defaults_to_empty() {
        let none = parse_versions(None);
        assert_eq!(none.len(), 1);
        assert!(none[0].is_empty());

        let blank = parse_versions(Some("  "));
        assert_eq!(blank.len(), 1);

        let list = parse_versions(Some("1.0 2.0+"));
        assert_eq!(list.len(), 2);
        assert_eq!(list[1].modifier(), Modifier::AtLeast);
    }

    #[test]
    fn empty_versions_are_equal() {
        assert_eq!(Version::empty(), Version::parse(""));
        assert!(Version::empty() < Version::parse("1.0"));
    }
}
