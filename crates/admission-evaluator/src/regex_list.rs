use regex::Regex;
use std::fmt;

use crate::errors::RegexListError;

/// An ordered list of compiled patterns, parsed from a comma separated
/// string. The patterns are not anchored unless they anchor themselves.
#[derive(Clone, Default)]
pub struct RegexList(Vec<Regex>);

impl RegexList {
    /// Parse a comma separated list of patterns. Every entry is trimmed
    /// before being compiled, blank entries are skipped. The empty string
    /// produces an empty list, which matches nothing.
    pub fn parse(patterns: &str) -> Result<Self, RegexListError> {
        patterns
            .split(',')
            .map(str::trim)
            .filter(|pattern| !pattern.is_empty())
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| RegexListError::InvalidPattern {
                    pattern: pattern.to_owned(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(RegexList)
    }

    /// True when at least one pattern matches `value`
    pub fn matches_any(&self, value: &str) -> bool {
        self.0.iter().any(|regex| regex.is_match(value))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(Regex::as_str)
    }
}

impl fmt::Debug for RegexList {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.patterns()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn empty_pattern_matches_nothing() {
        let list = RegexList::parse("").expect("empty list should parse");
        assert!(list.is_empty());
        assert!(!list.matches_any(""));
        assert!(!list.matches_any("anything"));
    }

    #[rstest]
    #[case::exact("test", true)]
    #[case::suffix("testx", false)]
    #[case::prefix("xtest", false)]
    fn anchored_pattern(#[case] value: &str, #[case] expected: bool) {
        let list = RegexList::parse("^test$").unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list.matches_any(value), expected);
    }

    #[test]
    fn compound_pattern_is_trimmed() {
        let list = RegexList::parse(" ^this$, ^that$ ").unwrap();
        assert_eq!(list.patterns().collect::<Vec<_>>(), vec!["^this$", "^that$"]);
        assert!(list.matches_any("this"));
        assert!(list.matches_any("that"));
        assert!(!list.matches_any("other"));
    }

    #[test]
    fn escaped_pattern() {
        let list = RegexList::parse(r"^a\s+b$").unwrap();
        assert_eq!(list.len(), 1);
        assert!(list.matches_any("a \t b"));
        assert!(!list.matches_any("ab"));
    }

    #[test]
    fn unanchored_pattern_matches_partially() {
        let list = RegexList::parse("kube").unwrap();
        assert!(list.matches_any("x-kube-system"));
    }

    #[test]
    fn blank_entries_are_skipped() {
        let list = RegexList::parse("^a$, ,,^b$").unwrap();
        assert_eq!(list.len(), 2);
        assert!(!list.matches_any("c"));
    }

    #[test]
    fn bad_pattern_is_reported() {
        let err = RegexList::parse("^ok$,^($").expect_err("bad pattern should fail");
        match &err {
            RegexListError::InvalidPattern { pattern, .. } => assert_eq!(pattern, "^($"),
        }
        assert!(err.to_string().contains("error parsing regexp"));
    }
}
