//! Structured scan predicates
//!
//! A [`Predicate`] is the translated form of a query's label matchers. It can
//! be rendered as a parameterized ClickHouse `WHERE` fragment, where every label
//! name and value travels as a typed query parameter and never as SQL text, or
//! compiled for in-process evaluation against [`SampleRow`]s.

use crate::error::GatewayError;
use crate::model::MatchKind;
use crate::schema::{SampleRow, LABELS_FIELD, METRIC_NAME_FIELD};

use regex::Regex;

/// Column a condition applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Column {
    /// The dedicated `metric_name` column (the `__name__` label)
    MetricName,
    /// An entry of the `labels` map
    Label(String),
}

/// A single label condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub column: Column,
    pub kind: MatchKind,
    pub value: String,
}

/// Conjunction of label conditions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Predicate {
    conditions: Vec<Condition>,
}

impl Predicate {
    pub fn new(conditions: Vec<Condition>) -> Self {
        Self { conditions }
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// An empty predicate selects every row in the time range.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// The metric name pinned by an equality condition, if any.
    pub fn metric_name(&self) -> Option<&str> {
        self.conditions.iter().find_map(|c| match (&c.column, c.kind) {
            (Column::MetricName, MatchKind::Equal) => Some(c.value.as_str()),
            _ => None,
        })
    }

    /// Render as a SQL boolean expression, binding all literals into `params`.
    ///
    /// Returns `None` for an empty predicate.
    pub fn render(&self, params: &mut QueryParams) -> Option<String> {
        if self.conditions.is_empty() {
            return None;
        }

        let clauses: Vec<String> = self
            .conditions
            .iter()
            .map(|c| {
                let column = match &c.column {
                    Column::MetricName => METRIC_NAME_FIELD.to_string(),
                    Column::Label(name) => {
                        format!("{}[{}]", LABELS_FIELD, params.bind(name, "String"))
                    }
                };
                match c.kind {
                    MatchKind::Equal => {
                        format!("{} = {}", column, params.bind(&c.value, "String"))
                    }
                    MatchKind::NotEqual => {
                        format!("{} != {}", column, params.bind(&c.value, "String"))
                    }
                    MatchKind::RegexMatch => format!(
                        "match({}, {})",
                        column,
                        params.bind(&anchored(&c.value), "String")
                    ),
                    MatchKind::RegexNotMatch => format!(
                        "NOT match({}, {})",
                        column,
                        params.bind(&anchored(&c.value), "String")
                    ),
                }
            })
            .collect();

        Some(clauses.join(" AND "))
    }

    /// Compile regex conditions for in-process evaluation.
    pub fn compile(&self) -> Result<CompiledPredicate, GatewayError> {
        let conditions = self
            .conditions
            .iter()
            .map(|c| {
                let test = match c.kind {
                    MatchKind::Equal => ValueTest::Equal(c.value.clone()),
                    MatchKind::NotEqual => ValueTest::NotEqual(c.value.clone()),
                    MatchKind::RegexMatch => ValueTest::Regex(compile_regex(&c.value)?),
                    MatchKind::RegexNotMatch => ValueTest::NotRegex(compile_regex(&c.value)?),
                };
                Ok((c.column.clone(), test))
            })
            .collect::<Result<Vec<_>, GatewayError>>()?;

        Ok(CompiledPredicate { conditions })
    }
}

/// Regexes match the whole value, as in PromQL.
fn anchored(pattern: &str) -> String {
    format!("^(?:{})$", pattern)
}

fn compile_regex(pattern: &str) -> Result<Regex, GatewayError> {
    Regex::new(&anchored(pattern)).map_err(|e| GatewayError::InvalidRegex {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

#[derive(Debug)]
enum ValueTest {
    Equal(String),
    NotEqual(String),
    Regex(Regex),
    NotRegex(Regex),
}

impl ValueTest {
    fn test(&self, value: &str) -> bool {
        match self {
            ValueTest::Equal(v) => value == v,
            ValueTest::NotEqual(v) => value != v,
            ValueTest::Regex(re) => re.is_match(value),
            ValueTest::NotRegex(re) => !re.is_match(value),
        }
    }
}

/// A predicate ready to be evaluated against rows
#[derive(Debug)]
pub struct CompiledPredicate {
    conditions: Vec<(Column, ValueTest)>,
}

impl CompiledPredicate {
    /// A label absent from the row compares as the empty string.
    pub fn matches(&self, row: &SampleRow) -> bool {
        self.conditions.iter().all(|(column, test)| {
            let value = match column {
                Column::MetricName => &*row.metric_name,
                Column::Label(name) => row.labels.get(name).unwrap_or(""),
            };
            test.test(value)
        })
    }
}

/// Typed query parameters for the ClickHouse HTTP interface.
///
/// Each bound value gets a generated name `pN` and is referenced in SQL as
/// `{pN:Type}`. Values are sent as `param_pN` URL parameters.
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    values: Vec<String>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value and return its SQL placeholder.
    pub fn bind(&mut self, value: &str, ty: &str) -> String {
        let placeholder = format!("{{p{}:{}}}", self.values.len(), ty);
        self.values.push(value.to_string());
        placeholder
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(url_parameter_name, escaped_value)` pairs.
    pub fn url_pairs(&self) -> impl Iterator<Item = (String, String)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(|(i, v)| (format!("param_p{}", i), escape_param(v)))
    }
}

/// Escape a parameter value for ClickHouse's escaped (TSV) parsing.
pub fn escape_param(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LabelSet;
    use std::sync::Arc;

    fn cond(column: Column, kind: MatchKind, value: &str) -> Condition {
        Condition {
            column,
            kind,
            value: value.to_string(),
        }
    }

    fn row(labels: &[(&str, &str)]) -> SampleRow {
        let labels: LabelSet = labels.iter().copied().collect();
        SampleRow {
            metric_name: Arc::from(labels.metric_name().unwrap_or("")),
            labels: Arc::new(labels),
            timestamp_ms: 0,
            value: 0.0,
        }
    }

    #[test]
    fn test_render_binds_every_literal() {
        let hostile = "x' OR 1=1 --";
        let predicate = Predicate::new(vec![
            cond(Column::MetricName, MatchKind::Equal, "up"),
            cond(Column::Label(hostile.to_string()), MatchKind::RegexMatch, hostile),
        ]);

        let mut params = QueryParams::new();
        let sql = predicate.render(&mut params).unwrap();

        assert_eq!(
            sql,
            "metric_name = {p0:String} AND match(labels[{p1:String}], {p2:String})"
        );
        assert!(!sql.contains(hostile));

        let pairs: Vec<_> = params.url_pairs().collect();
        assert_eq!(pairs[0], ("param_p0".to_string(), "up".to_string()));
        assert_eq!(pairs[1].1, hostile);
        assert_eq!(pairs[2].1, format!("^(?:{})$", hostile));
    }

    #[test]
    fn test_render_negations() {
        let predicate = Predicate::new(vec![
            cond(Column::Label("env".into()), MatchKind::NotEqual, "dev"),
            cond(Column::Label("job".into()), MatchKind::RegexNotMatch, "test.*"),
        ]);
        let mut params = QueryParams::new();
        let sql = predicate.render(&mut params).unwrap();
        assert_eq!(
            sql,
            "labels[{p0:String}] != {p1:String} AND NOT match(labels[{p2:String}], {p3:String})"
        );
    }

    #[test]
    fn test_empty_predicate_renders_nothing() {
        let mut params = QueryParams::new();
        assert!(Predicate::default().render(&mut params).is_none());
        assert!(params.is_empty());
    }

    #[test]
    fn test_escape_handles_control_characters() {
        assert_eq!(escape_param("a\\b\tc\nd"), "a\\\\b\\tc\\nd");
        assert_eq!(escape_param("plain 'quoted'"), "plain 'quoted'");
    }

    #[test]
    fn test_metric_name_only_from_equality() {
        let regex_only = Predicate::new(vec![cond(Column::MetricName, MatchKind::RegexMatch, "up")]);
        assert_eq!(regex_only.metric_name(), None);

        let eq = Predicate::new(vec![
            cond(Column::Label("job".into()), MatchKind::Equal, "api"),
            cond(Column::MetricName, MatchKind::Equal, "up"),
        ]);
        assert_eq!(eq.metric_name(), Some("up"));
    }

    #[test]
    fn test_compiled_regex_is_fully_anchored() {
        let predicate = Predicate::new(vec![cond(
            Column::Label("job".into()),
            MatchKind::RegexMatch,
            "api|web",
        )])
        .compile()
        .unwrap();

        assert!(predicate.matches(&row(&[("__name__", "up"), ("job", "api")])));
        assert!(predicate.matches(&row(&[("__name__", "up"), ("job", "web")])));
        assert!(!predicate.matches(&row(&[("__name__", "up"), ("job", "api-2")])));
    }

    #[test]
    fn test_missing_label_compares_as_empty() {
        let not_eq = Predicate::new(vec![cond(Column::Label("env".into()), MatchKind::NotEqual, "prod")])
            .compile()
            .unwrap();
        assert!(not_eq.matches(&row(&[("__name__", "up")])));

        let eq_empty = Predicate::new(vec![cond(Column::Label("env".into()), MatchKind::Equal, "")])
            .compile()
            .unwrap();
        assert!(eq_empty.matches(&row(&[("__name__", "up")])));
        assert!(!eq_empty.matches(&row(&[("__name__", "up"), ("env", "prod")])));
    }

    #[test]
    fn test_invalid_regex_is_reported() {
        let err = Predicate::new(vec![cond(Column::MetricName, MatchKind::RegexMatch, "(")])
            .compile()
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidRegex { ref pattern, .. } if pattern == "("));
    }
}
