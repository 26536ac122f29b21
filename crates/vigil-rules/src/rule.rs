//! Rule pack documents, compiled rules and predicates.

use crate::error::{Result, RuleError};
use crate::expr::Expression;
use crate::query::Query;
use crate::value::is_truthy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use vigil_core::Severity;

/// Dialect a rule's `test` is written in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestType {
    /// JMESPath-style structured query (the default)
    #[default]
    #[serde(rename = "structured-query", alias = "jmespath")]
    StructuredQuery,
    /// Constrained boolean/arithmetic expression over `result`
    #[serde(rename = "expression", alias = "python")]
    Expression,
}

impl std::fmt::Display for TestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StructuredQuery => write!(f, "structured-query"),
            Self::Expression => write!(f, "expression"),
        }
    }
}

fn default_severity() -> Severity {
    Severity::Medium
}

/// One rule as written in a rule pack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDocument {
    /// Rule identifier, reported as the violation id
    pub id: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Severity of a violation
    #[serde(default = "default_severity")]
    pub severity: Severity,
    /// Predicate source text
    pub test: String,
    /// Dialect of `test`
    #[serde(default)]
    pub test_type: TestType,
}

/// A rule pack document (`*.json` or `*.toml`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulePackDocument {
    /// What the pack checks
    #[serde(default)]
    pub description: String,
    /// Rules in evaluation order
    #[serde(default)]
    pub rules: Vec<RuleDocument>,
}

/// Compiled rule test.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Structured query; satisfied when its value is truthy
    StructuredQuery(Query),
    /// Constrained expression; satisfied when its value is truthy
    Expression(Expression),
}

impl Predicate {
    /// Compile `source` in the given dialect.
    pub fn compile(test_type: TestType, source: &str) -> Result<Self> {
        match test_type {
            TestType::StructuredQuery => Query::compile(source).map(Self::StructuredQuery),
            TestType::Expression => Expression::compile(source).map(Self::Expression),
        }
    }

    /// Whether the predicate holds for a serialized scan result.
    pub fn evaluate(&self, data: &Value) -> Result<bool> {
        let value = match self {
            Self::StructuredQuery(query) => query.search(data)?,
            Self::Expression(expr) => expr.evaluate(data)?,
        };
        Ok(is_truthy(&value))
    }

    /// Dialect of this predicate.
    #[must_use]
    pub fn test_type(&self) -> TestType {
        match self {
            Self::StructuredQuery(_) => TestType::StructuredQuery,
            Self::Expression(_) => TestType::Expression,
        }
    }

    /// Source text of the test.
    #[must_use]
    pub fn source(&self) -> &str {
        match self {
            Self::StructuredQuery(query) => query.source(),
            Self::Expression(expr) => expr.source(),
        }
    }
}

/// A compliance rule ready for evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// Rule identifier
    pub id: String,
    /// Human-readable description
    pub description: String,
    /// Severity of a violation
    pub severity: Severity,
    /// Compiled test
    pub predicate: Predicate,
}

impl Rule {
    /// Compile a rule document.
    pub fn compile(doc: &RuleDocument) -> Result<Self> {
        let predicate =
            Predicate::compile(doc.test_type, &doc.test).map_err(|e| RuleError::Compile {
                rule_id: doc.id.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            id: doc.id.clone(),
            description: doc.description.clone(),
            severity: doc.severity,
            predicate,
        })
    }
}

/// Immutable, ordered set of rules produced by one load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Wrap rules in evaluation order.
    #[must_use]
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Rules in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    /// Look up a rule by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.id == id)
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the set holds no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_defaults() {
        let doc: RulePackDocument = serde_json::from_value(json!({
            "description": "Baseline",
            "rules": [{"id": "missing_cookie_banner", "test": "cookie_banner_detected == false"}]
        }))
        .expect("parse pack");

        let rule = &doc.rules[0];
        assert_eq!(rule.severity, Severity::Medium);
        assert_eq!(rule.test_type, TestType::StructuredQuery);
        assert!(rule.description.is_empty());
    }

    #[test]
    fn test_test_type_aliases() {
        for (raw, expected) in [
            ("jmespath", TestType::StructuredQuery),
            ("structured-query", TestType::StructuredQuery),
            ("python", TestType::Expression),
            ("expression", TestType::Expression),
        ] {
            let parsed: TestType =
                serde_json::from_value(json!(raw)).expect("parse test type");
            assert_eq!(parsed, expected);
        }
        assert!(serde_json::from_value::<TestType>(json!("lua")).is_err());
    }

    #[test]
    fn test_compile_failure_names_rule() {
        let doc = RuleDocument {
            id: "broken".to_string(),
            description: String::new(),
            severity: Severity::Low,
            test: "cookies[".to_string(),
            test_type: TestType::StructuredQuery,
        };
        let err = Rule::compile(&doc).unwrap_err();
        assert!(matches!(err, RuleError::Compile { ref rule_id, .. } if rule_id == "broken"));
    }

    #[test]
    fn test_predicate_truthiness() {
        let data = json!({"cookies": [], "third_party_domains": ["a.example"], "scan_time_ms": 0});
        let query = |src: &str| {
            Predicate::compile(TestType::StructuredQuery, src)
                .expect("compile")
                .evaluate(&data)
                .expect("evaluate")
        };
        assert!(!query("cookies"));
        assert!(query("third_party_domains"));
        assert!(!query("scan_time_ms"));
        assert!(!query("missing"));

        let expr = Predicate::compile(TestType::Expression, "len(result.third_party_domains)")
            .expect("compile");
        assert!(expr.evaluate(&data).expect("evaluate"));
        assert_eq!(expr.test_type(), TestType::Expression);
        assert_eq!(expr.source(), "len(result.third_party_domains)");
    }
}
