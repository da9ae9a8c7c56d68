//! Pattern filter used to disable registered plugins by name.
//!
//! A filter is a comma-separated list of patterns. Each pattern names a
//! method as `Type.method`, where both sides may contain `*` wildcards;
//! the split is at the last `.`, so `demo.Math.abs` filters method `abs`
//! of type `demo.Math`. A pattern without a dot matches the method name
//! in any declaring type. The type side matches against the full dotted
//! name first and falls back to the simple name, so `Math.abs` also hits
//! `demo.Math.abs`.
//!
//! # Example
//!
//! ```
//! use trellis_core::TypeName;
//! use trellis_registry::filter::MethodFilter;
//!
//! let filter = MethodFilter::parse("Math.abs,demo.*.min*");
//! assert!(filter.matches(&TypeName::new("demo.Math"), "abs"));
//! assert!(filter.matches(&TypeName::new("demo.Integer"), "min_unsigned"));
//! assert!(!filter.matches(&TypeName::new("demo.Math"), "sqrt"));
//! ```

use trellis_core::TypeName;

/// One parsed `Type.method` pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Pattern {
    /// `None` when the pattern had no dot and matches any type.
    type_pattern: Option<String>,
    method_pattern: String,
}

impl Pattern {
    fn matches(&self, declaring: &TypeName, name: &str) -> bool {
        if !glob(&self.method_pattern, name) {
            return false;
        }
        match &self.type_pattern {
            None => true,
            Some(pattern) => {
                glob(pattern, declaring.as_str()) || glob(pattern, declaring.simple_name())
            }
        }
    }
}

/// A compiled disabled-plugin filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodFilter {
    patterns: Vec<Pattern>,
}

impl MethodFilter {
    /// Parse a comma-separated pattern list. Empty items are skipped, so
    /// trailing commas are harmless.
    pub fn parse(spec: &str) -> Self {
        let patterns = spec
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| match item.rsplit_once('.') {
                Some((type_pattern, method_pattern)) => Pattern {
                    type_pattern: Some(type_pattern.to_string()),
                    method_pattern: method_pattern.to_string(),
                },
                None => Pattern {
                    type_pattern: None,
                    method_pattern: item.to_string(),
                },
            })
            .collect();
        Self { patterns }
    }

    /// Whether any pattern matches `declaring.name`.
    pub fn matches(&self, declaring: &TypeName, name: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(declaring, name))
    }

    /// Whether the filter contains no patterns at all.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// `*`-wildcard match over bytes; `*` spans any run including the empty one.
fn glob(pattern: &str, text: &str) -> bool {
    fn step(p: &[u8], t: &[u8]) -> bool {
        match p.split_first() {
            None => t.is_empty(),
            Some((b'*', rest)) => (0..=t.len()).any(|skip| step(rest, &t[skip..])),
            Some((&c, rest)) => t
                .split_first()
                .is_some_and(|(&tc, t_rest)| tc == c && step(rest, t_rest)),
        }
    }
    step(pattern.as_bytes(), text.as_bytes())
}
