//! Run configuration: mode, match rules, fill policy.
//!
//! A [`RunConfig`] is immutable for the duration of a run and is handed to
//! the pipeline at the Configuring transition. Regex rules are compiled
//! eagerly so that a bad pattern fails the run before any page is touched.

use crate::error::{RedactError, Result};
use crate::geometry::FillPolicy;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Matching mode, selected once per run and applied uniformly to all pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedactionMode {
    /// Rules are literal strings, matched by geometric search alone.
    ExactText,
    /// Rules are regexes scanned over the page's logical text layer.
    Regex,
    /// Rules are regexes scanned over an OCR transcript of the rasterized
    /// page. Matched substrings are still located on the native text layer.
    OcrRegex,
}

/// One redaction rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum MatchRule {
    LiteralTerm(String),
    RegexPattern {
        pattern: String,
        /// Per-rule override; `None` inherits [`RunConfig::case_sensitive`].
        #[serde(default)]
        case_sensitive: Option<bool>,
    },
}

impl MatchRule {
    pub fn literal(term: impl Into<String>) -> Self {
        MatchRule::LiteralTerm(term.into())
    }

    pub fn pattern(pattern: impl Into<String>) -> Self {
        MatchRule::RegexPattern {
            pattern: pattern.into(),
            case_sensitive: None,
        }
    }

    pub fn pattern_with_case(pattern: impl Into<String>, case_sensitive: bool) -> Self {
        MatchRule::RegexPattern {
            pattern: pattern.into(),
            case_sensitive: Some(case_sensitive),
        }
    }

    fn raw(&self) -> &str {
        match self {
            MatchRule::LiteralTerm(term) => term,
            MatchRule::RegexPattern { pattern, .. } => pattern,
        }
    }

    /// Blank entries are ignored rather than treated as match-everything.
    fn is_blank(&self) -> bool {
        self.raw().trim().is_empty()
    }
}

/// Immutable configuration for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    pub mode: RedactionMode,
    pub rules: Vec<MatchRule>,
    /// Default case sensitivity for regex rules without a per-rule override.
    #[serde(default)]
    pub case_sensitive: bool,
    /// Paint committed regions solid black instead of leaving them blank.
    #[serde(default = "default_fill_black")]
    pub fill_black: bool,
}

fn default_fill_black() -> bool {
    true
}

impl RunConfig {
    pub fn new(mode: RedactionMode, rules: Vec<MatchRule>) -> Self {
        Self {
            mode,
            rules,
            case_sensitive: false,
            fill_black: true,
        }
    }

    /// Compiles the rule set for this run. Fails fast on the first invalid
    /// pattern; an invalid rule applies to all pages uniformly, so no page
    /// may be processed under it.
    pub(crate) fn compile(&self) -> Result<CompiledRun> {
        let mut rules = Vec::new();

        for rule in self.rules.iter().filter(|r| !r.is_blank()) {
            let compiled = match self.mode {
                // Geometric search only understands literals; every rule's
                // raw string is taken verbatim.
                RedactionMode::ExactText => CompiledRule::Literal(rule.raw().trim().to_string()),
                RedactionMode::Regex | RedactionMode::OcrRegex => {
                    let (pattern, case_sensitive) = match rule {
                        MatchRule::LiteralTerm(term) => {
                            (regex::escape(term.trim()), self.case_sensitive)
                        }
                        MatchRule::RegexPattern {
                            pattern,
                            case_sensitive,
                        } => (
                            pattern.trim().to_string(),
                            case_sensitive.unwrap_or(self.case_sensitive),
                        ),
                    };
                    let regex = RegexBuilder::new(&pattern)
                        .case_insensitive(!case_sensitive)
                        .build()
                        .map_err(|source| RedactError::Pattern {
                            pattern: pattern.clone(),
                            source,
                        })?;
                    CompiledRule::Pattern(regex)
                }
            };
            rules.push(compiled);
        }

        Ok(CompiledRun {
            mode: self.mode,
            rules,
            fill: if self.fill_black {
                FillPolicy::SolidBlack
            } else {
                FillPolicy::NoFill
            },
        })
    }
}

/// Loads a rule list from its JSON representation.
pub fn rules_from_json(raw: &str) -> Result<Vec<MatchRule>> {
    serde_json::from_str(raw)
        .map_err(|e| RedactError::DocumentOpen(format!("invalid rule json: {}", e)))
}

#[derive(Debug, Clone)]
pub(crate) enum CompiledRule {
    Literal(String),
    Pattern(Regex),
}

#[derive(Debug, Clone)]
pub(crate) struct CompiledRun {
    pub mode: RedactionMode,
    pub rules: Vec<CompiledRule>,
    pub fill: FillPolicy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_pattern_fails_compilation() {
        let config = RunConfig::new(RedactionMode::Regex, vec![MatchRule::pattern("[unclosed")]);
        match config.compile() {
            Err(RedactError::Pattern { pattern, .. }) => assert_eq!(pattern, "[unclosed"),
            other => panic!("expected Pattern error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn bad_pattern_is_harmless_in_exact_mode() {
        let config = RunConfig::new(
            RedactionMode::ExactText,
            vec![MatchRule::pattern("[unclosed")],
        );
        let run = config.compile().unwrap();
        assert!(matches!(&run.rules[0], CompiledRule::Literal(s) if s == "[unclosed"));
    }

    #[test]
    fn blank_rules_are_dropped() {
        let config = RunConfig::new(
            RedactionMode::ExactText,
            vec![
                MatchRule::literal("  "),
                MatchRule::literal(""),
                MatchRule::literal("Confidential"),
            ],
        );
        let run = config.compile().unwrap();
        assert_eq!(run.rules.len(), 1);
    }

    #[test]
    fn literal_rule_is_escaped_in_regex_mode() {
        let config = RunConfig::new(RedactionMode::Regex, vec![MatchRule::literal("1.2.3")]);
        let run = config.compile().unwrap();
        let CompiledRule::Pattern(re) = &run.rules[0] else {
            panic!("expected compiled pattern");
        };
        assert!(re.is_match("1.2.3"));
        assert!(!re.is_match("1x2y3"));
    }

    #[test]
    fn per_rule_case_overrides_run_default() {
        let mut config = RunConfig::new(
            RedactionMode::Regex,
            vec![
                MatchRule::pattern("abc"),
                MatchRule::pattern_with_case("abc", true),
            ],
        );
        config.case_sensitive = false;
        let run = config.compile().unwrap();
        let patterns: Vec<&Regex> = run
            .rules
            .iter()
            .map(|r| match r {
                CompiledRule::Pattern(re) => re,
                CompiledRule::Literal(_) => panic!("expected pattern"),
            })
            .collect();
        assert!(patterns[0].is_match("ABC"));
        assert!(!patterns[1].is_match("ABC"));
        assert!(patterns[1].is_match("abc"));
    }

    #[test]
    fn fill_black_selects_fill_policy() {
        let mut config = RunConfig::new(RedactionMode::ExactText, vec![MatchRule::literal("x")]);
        assert_eq!(config.compile().unwrap().fill, FillPolicy::SolidBlack);
        config.fill_black = false;
        assert_eq!(config.compile().unwrap().fill, FillPolicy::NoFill);
    }

    #[test]
    fn rules_round_trip_through_json() {
        let rules = vec![
            MatchRule::literal("Confidential"),
            MatchRule::pattern_with_case(r"\d{3}-\d{2}-\d{4}", false),
        ];
        let raw = serde_json::to_string(&rules).unwrap();
        let parsed = rules_from_json(&raw).unwrap();
        assert_eq!(parsed.len(), 2);
        assert!(matches!(&parsed[0], MatchRule::LiteralTerm(t) if t == "Confidential"));
    }
}
