// refguard-core/src/domain/expectations/mod.rs

pub mod column_pair;
pub mod membership;
pub mod nullity;
mod params;
pub mod pattern;
pub mod range;
pub mod result;
pub mod uniqueness;

pub use column_pair::{PairCheck, PairComparison};
pub use membership::SetCheck;
pub use nullity::{IsNullCheck, NotNullCheck};
pub use pattern::RegexCheck;
pub use range::RangeCheck;
pub use result::{
    DEFAULT_SAMPLE_SIZE, ExpectationResult, ResultDetails, ScanCounts, UnexpectedValueCount,
    percent,
};
pub use uniqueness::UniqueCheck;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::dataset::{Dataset, is_missing};
use crate::domain::expectations::result::UnexpectedSampler;
use crate::domain::rules::{ResolvedRuleSet, RuleDefinition};

/// Problems local to one rule. Never propagated: encoded as a failed result.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuleEvaluationError {
    #[error("unsupported expectation type '{0}'")]
    Unsupported(String),

    #[error("invalid parameter '{param}': {reason}")]
    InvalidParameter { param: String, reason: String },

    #[error("invalid regex '{pattern}': {reason}")]
    InvalidRegex { pattern: String, reason: String },

    #[error("column '{0}' not found in dataset")]
    ColumnNotFound(String),
}

/// The check families the executor knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpectationKind {
    Unique,
    NotNull,
    IsNull,
    InSet,
    NotInSet,
    Between,
    MatchRegex,
    PairEqual,
    PairGreater,
}

impl ExpectationKind {
    pub const ALL: [ExpectationKind; 9] = [
        ExpectationKind::Unique,
        ExpectationKind::NotNull,
        ExpectationKind::IsNull,
        ExpectationKind::InSet,
        ExpectationKind::NotInSet,
        ExpectationKind::Between,
        ExpectationKind::MatchRegex,
        ExpectationKind::PairEqual,
        ExpectationKind::PairGreater,
    ];

    pub fn canonical_name(self) -> &'static str {
        match self {
            ExpectationKind::Unique => "expect_column_values_to_be_unique",
            ExpectationKind::NotNull => "expect_column_values_to_not_be_null",
            ExpectationKind::IsNull => "expect_column_values_to_be_null",
            ExpectationKind::InSet => "expect_column_values_to_be_in_set",
            ExpectationKind::NotInSet => "expect_column_values_to_not_be_in_set",
            ExpectationKind::Between => "expect_column_values_to_be_between",
            ExpectationKind::MatchRegex => "expect_column_values_to_match_regex",
            ExpectationKind::PairEqual => "expect_column_pair_values_to_be_equal",
            ExpectationKind::PairGreater => "expect_column_pair_values_a_to_be_greater_than_b",
        }
    }

    fn aliases(self) -> &'static [&'static str] {
        match self {
            ExpectationKind::Unique => &["unique"],
            ExpectationKind::NotNull => &["not_null"],
            ExpectationKind::IsNull => &["is_null"],
            ExpectationKind::InSet => &["in_set", "accepted_values"],
            ExpectationKind::NotInSet => &["not_in_set"],
            ExpectationKind::Between => &["between", "range"],
            ExpectationKind::MatchRegex => &["regex"],
            ExpectationKind::PairEqual => &["column_pair_equal"],
            ExpectationKind::PairGreater => &["column_pair_greater"],
        }
    }

    pub fn from_type_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.into_iter().find(|kind| {
            kind.canonical_name().eq_ignore_ascii_case(name)
                || kind.aliases().iter().any(|a| a.eq_ignore_ascii_case(name))
        })
    }

    /// Canonical name for known types, the trimmed input otherwise.
    pub fn canonical_type(name: &str) -> String {
        Self::from_type_name(name)
            .map(|kind| kind.canonical_name().to_string())
            .unwrap_or_else(|| name.trim().to_string())
    }
}

/// Uniform scanning contract shared by every family.
pub trait ColumnCheck {
    /// Raw counts plus the bounded sample of offending values.
    fn scan(&self, dataset: &Dataset, sample_size: usize) -> (ScanCounts, ResultDetails);
}

/// Shared loop for single-column value checks: missing rows are counted apart and
/// left out of `element_count`, present values failing `accepts` are unexpected.
pub(crate) fn scan_values<F>(
    dataset: &Dataset,
    column: &str,
    sample_size: usize,
    accepts: F,
) -> (ScanCounts, ResultDetails)
where
    F: Fn(&Value) -> bool,
{
    let mut counts = ScanCounts::over_rows(dataset.len());
    let mut sampler = UnexpectedSampler::new(sample_size);

    for (row, record) in dataset.iter().enumerate() {
        let value = record.get(column);
        match value {
            Some(v) if !is_missing(value) => {
                if !accepts(v) {
                    counts.unexpected_count += 1;
                    sampler.record(row, v);
                }
            }
            _ => counts.missing_count += 1,
        }
    }

    (counts.present_values_only(), sampler.into_details())
}

/// One variant per family, plus an explicit variant for types we cannot run.
#[derive(Debug, Clone)]
pub enum Check {
    Unique(UniqueCheck),
    NotNull(NotNullCheck),
    IsNull(IsNullCheck),
    SetMembership(SetCheck),
    Range(RangeCheck),
    Regex(RegexCheck),
    ColumnPair(PairCheck),
    Unsupported { rule_type: String },
}

/// A rule definition compiled into a runnable check.
#[derive(Debug, Clone)]
pub struct Expectation {
    pub column: String,
    pub expectation_type: String,
    pub mostly: f64,
    pub check: Check,
}

impl Expectation {
    pub fn compile(rule: &RuleDefinition) -> Result<Self, RuleEvaluationError> {
        let column = rule.column.clone();

        let Some(kind) = ExpectationKind::from_type_name(&rule.rule_type) else {
            return Ok(Self {
                column,
                expectation_type: rule.rule_type.clone(),
                mostly: 1.0,
                check: Check::Unsupported {
                    rule_type: rule.rule_type.clone(),
                },
            });
        };

        let check = match kind {
            ExpectationKind::Unique => Check::Unique(UniqueCheck {
                column: column.clone(),
            }),
            ExpectationKind::NotNull => Check::NotNull(NotNullCheck {
                column: column.clone(),
            }),
            ExpectationKind::IsNull => Check::IsNull(IsNullCheck {
                column: column.clone(),
            }),
            ExpectationKind::InSet | ExpectationKind::NotInSet => Check::SetMembership(SetCheck {
                column: column.clone(),
                value_set: params::value_set(rule)?,
                exclude: kind == ExpectationKind::NotInSet,
            }),
            ExpectationKind::Between => {
                let min_value = params::optional_number(rule, "min_value")?;
                let max_value = params::optional_number(rule, "max_value")?;
                match (min_value, max_value) {
                    (None, None) => {
                        return Err(RuleEvaluationError::InvalidParameter {
                            param: "min_value/max_value".into(),
                            reason: "at least one bound is required".into(),
                        });
                    }
                    (Some(min), Some(max)) if min > max => {
                        return Err(RuleEvaluationError::InvalidParameter {
                            param: "min_value".into(),
                            reason: format!("{} is greater than max_value {}", min, max),
                        });
                    }
                    _ => {}
                }
                Check::Range(RangeCheck {
                    column: column.clone(),
                    min_value,
                    max_value,
                    strict_min: params::flag(rule, "strict_min")?,
                    strict_max: params::flag(rule, "strict_max")?,
                })
            }
            ExpectationKind::MatchRegex => {
                let pattern = params::required_str(rule, "regex")?;
                let regex =
                    Regex::new(&pattern).map_err(|e| RuleEvaluationError::InvalidRegex {
                        pattern: pattern.clone(),
                        reason: e.to_string(),
                    })?;
                Check::Regex(RegexCheck {
                    column: column.clone(),
                    regex,
                })
            }
            ExpectationKind::PairEqual | ExpectationKind::PairGreater => {
                let comparison = if kind == ExpectationKind::PairEqual {
                    PairComparison::Equal
                } else {
                    PairComparison::GreaterThan {
                        or_equal: params::flag(rule, "or_equal")?,
                    }
                };
                Check::ColumnPair(PairCheck {
                    column: column.clone(),
                    column_b: params::required_str(rule, "column_b")?,
                    comparison,
                })
            }
        };

        Ok(Self {
            column,
            expectation_type: kind.canonical_name().to_string(),
            mostly: params::mostly(rule)?,
            check,
        })
    }

    fn columns(&self) -> Vec<&str> {
        match &self.check {
            Check::ColumnPair(pair) => vec![pair.column.as_str(), pair.column_b.as_str()],
            _ => vec![self.column.as_str()],
        }
    }

    fn scanner(&self) -> Option<&dyn ColumnCheck> {
        match &self.check {
            Check::Unique(c) => Some(c as &dyn ColumnCheck),
            Check::NotNull(c) => Some(c as &dyn ColumnCheck),
            Check::IsNull(c) => Some(c as &dyn ColumnCheck),
            Check::SetMembership(c) => Some(c as &dyn ColumnCheck),
            Check::Range(c) => Some(c as &dyn ColumnCheck),
            Check::Regex(c) => Some(c as &dyn ColumnCheck),
            Check::ColumnPair(c) => Some(c as &dyn ColumnCheck),
            Check::Unsupported { .. } => None,
        }
    }

    /// NotNull judges missing values; every other family judges unexpected ones.
    /// `mostly` is the fraction of `element_count` that must pass.
    pub fn passes(&self, counts: &ScanCounts) -> bool {
        let violations = match self.check {
            Check::NotNull(_) => counts.missing_count,
            _ => counts.unexpected_count,
        };
        within_tolerance(violations, counts.element_count, self.mostly)
    }

    /// An absent column is only meaningful for the null families (every row missing).
    fn requires_columns(&self) -> bool {
        !matches!(self.check, Check::NotNull(_) | Check::IsNull(_))
    }

    pub fn evaluate(&self, dataset: &Dataset, sample_size: usize) -> ExpectationResult {
        let Some(scanner) = self.scanner() else {
            let error = RuleEvaluationError::Unsupported(self.expectation_type.clone());
            return ExpectationResult::rule_error(
                &self.column,
                &self.expectation_type,
                error.to_string(),
            );
        };

        if !dataset.is_empty()
            && self.requires_columns()
            && let Some(missing) = self.columns().into_iter().find(|c| !dataset.has_column(c))
        {
            let error = RuleEvaluationError::ColumnNotFound(missing.to_string());
            return ExpectationResult::rule_error(
                &self.column,
                &self.expectation_type,
                error.to_string(),
            );
        }

        let (counts, details) = scanner.scan(dataset, sample_size);
        let success = self.passes(&counts);
        ExpectationResult::from_counts(
            &self.column,
            &self.expectation_type,
            success,
            &counts,
            details,
        )
    }
}

fn within_tolerance(violations: usize, judged: usize, mostly: f64) -> bool {
    if violations == 0 {
        return true;
    }
    if judged == 0 {
        return false;
    }
    let passing = (judged - violations.min(judged)) as f64 / judged as f64;
    passing + 1e-9 >= mostly
}

/// Runs a resolved rule set against one dataset, one result per rule, in rule order.
#[derive(Debug, Clone, Copy)]
pub struct ValidationExecutor {
    sample_size: usize,
}

impl Default for ValidationExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_SIZE)
    }
}

impl ValidationExecutor {
    pub fn new(sample_size: usize) -> Self {
        Self {
            sample_size: sample_size.max(1),
        }
    }

    pub fn evaluate_rule(&self, rule: &RuleDefinition, dataset: &Dataset) -> ExpectationResult {
        match Expectation::compile(rule) {
            Ok(expectation) => expectation.evaluate(dataset, self.sample_size),
            Err(e) => ExpectationResult::rule_error(&rule.column, &rule.rule_type, e.to_string()),
        }
    }

    pub fn execute(&self, rules: &ResolvedRuleSet, dataset: &Dataset) -> Vec<ExpectationResult> {
        rules
            .rules
            .iter()
            .map(|rule| {
                let result = self.evaluate_rule(rule, dataset);
                if let Some(error) = &result.result_details.rule_error {
                    warn!(
                        column = %rule.column,
                        rule_type = %rule.rule_type,
                        source = %rule.source_path,
                        "Rule could not be evaluated: {}",
                        error
                    );
                } else {
                    debug!(
                        column = %result.column_name,
                        expectation = %result.expectation_type,
                        success = result.success,
                        unexpected = result.unexpected_count,
                        "Expectation evaluated"
                    );
                }
                result
            })
            .collect()
    }
}
