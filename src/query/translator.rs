//! Label matcher translation
//!
//! Turns a remote-read query's matchers into a [`Predicate`] over the sample
//! table. The `__name__` matcher is mapped to the `metric_name` column and
//! placed first so the scan can use the primary key prefix.

use super::predicate::{Column, Condition, Predicate};
use crate::error::TranslationError;
use crate::model::{MatchKind, Matcher, METRIC_NAME_LABEL};

use std::fmt;
use std::str::FromStr;

/// A `name=value` pair whose equality matchers are dropped from every query.
///
/// Prometheus adds external labels (for example `remote="clickhouse"`) to
/// remote-read selectors. Those labels are not stored with the samples, so
/// filtering on them would match nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreLabel {
    pub name: String,
    pub value: String,
}

impl IgnoreLabel {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    fn covers(&self, matcher: &Matcher) -> bool {
        matcher.kind == MatchKind::Equal && matcher.name == self.name && matcher.value == self.value
    }
}

impl FromStr for IgnoreLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((name, value)) if !name.trim().is_empty() => {
                Ok(IgnoreLabel::new(name.trim(), value.trim()))
            }
            _ => Err(format!("expected name=value, got {:?}", s)),
        }
    }
}

impl fmt::Display for IgnoreLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Converts label matchers into scan predicates
#[derive(Debug, Clone, Default)]
pub struct MatcherTranslator {
    ignore_label: Option<IgnoreLabel>,
}

impl MatcherTranslator {
    pub fn new(ignore_label: Option<IgnoreLabel>) -> Self {
        Self { ignore_label }
    }

    pub fn ignore_label(&self) -> Option<&IgnoreLabel> {
        self.ignore_label.as_ref()
    }

    /// Translate a query's matchers into an ANDed predicate.
    ///
    /// A query with no matchers is rejected. A query whose only matcher is the
    /// ignore label is accepted and selects everything in its time range.
    pub fn translate(&self, matchers: &[Matcher]) -> Result<Predicate, TranslationError> {
        if matchers.is_empty() {
            return Err(TranslationError::NoMatchers);
        }

        let mut name_conditions = Vec::new();
        let mut label_conditions = Vec::new();

        for matcher in matchers {
            if self.ignore_label.as_ref().is_some_and(|l| l.covers(matcher)) {
                continue;
            }

            if matcher.name == METRIC_NAME_LABEL {
                name_conditions.push(Condition {
                    column: Column::MetricName,
                    kind: matcher.kind,
                    value: matcher.value.clone(),
                });
            } else {
                label_conditions.push(Condition {
                    column: Column::Label(matcher.name.clone()),
                    kind: matcher.kind,
                    value: matcher.value.clone(),
                });
            }
        }

        name_conditions.extend(label_conditions);
        Ok(Predicate::new(name_conditions))
    }
}
