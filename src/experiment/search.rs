//! Run search: filter and order-by strings over the runs of experiments
//!
//! ## Supported subset
//!
//! - Keys: `run_id`, `run_name`, `status`, `start_time`, `end_time`
//!   (optionally `attributes.` prefixed), `metrics.<key>`, `params.<key>`,
//!   `tags.<key>`
//! - Filter: comparisons joined by `AND` (`=`, `!=`, `<>`, `<`, `<=`, `>`,
//!   `>=`, `LIKE`, `NOT LIKE`)
//! - Order: `<key> [ASC|DESC]`, missing values last, `run_id` as final tie-breaker
//!
//! Filters and order clauses are parsed with sqlparser by embedding them in
//! `SELECT * FROM runs WHERE ...` / `SELECT * FROM runs ORDER BY ...`.
//!
//! References:
//! - sqlparser-rs: <https://docs.rs/sqlparser>

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use sqlparser::ast::{BinaryOperator, Expr, Query, SetExpr, Statement, UnaryOperator, Value};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use super::RunRecord;
use crate::{Error, Result};

/// Default page size of a search.
pub const DEFAULT_MAX_RESULTS: usize = 1000;

/// Upper bound accepted for `max_results`.
pub const MAX_RESULTS_LIMIT: usize = 50_000;

/// Search request over the runs of one or more experiments.
///
/// ```rust
/// use rastreo::experiment::RunSearch;
///
/// let search = RunSearch::new(["0"])
///     .filter("metrics.r2 > 0.8 AND params.alpha = '0.5'")
///     .order_by("start_time DESC")
///     .max_results(1);
/// assert!(search.compile().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSearch {
    experiment_ids: Vec<String>,
    filter: Option<String>,
    order_by: Vec<String>,
    max_results: usize,
}

impl RunSearch {
    /// Search the runs of the given experiments.
    #[must_use]
    pub fn new<I, T>(experiment_ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            experiment_ids: experiment_ids.into_iter().map(Into::into).collect(),
            filter: None,
            order_by: Vec::new(),
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    /// Restrict results with a filter expression.
    #[must_use]
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Append an order-by clause such as `start_time DESC`.
    #[must_use]
    pub fn order_by(mut self, clause: impl Into<String>) -> Self {
        self.order_by.push(clause.into());
        self
    }

    /// Cap the number of returned runs.
    #[must_use]
    pub const fn max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Experiment IDs in request order, duplicates removed.
    #[must_use]
    pub fn experiment_ids(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.experiment_ids
            .iter()
            .map(String::as_str)
            .filter(|id| seen.insert(*id))
            .collect()
    }

    /// Get the raw filter string.
    #[must_use]
    pub fn filter_string(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    /// Get the raw order-by clauses.
    #[must_use]
    pub fn order_by_clauses(&self) -> &[String] {
        &self.order_by
    }

    /// Get the result cap.
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.max_results
    }

    /// Validate the request and parse its filter and ordering.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if no experiment is named or `max_results` is out of range
    /// - `ParseError` if the filter or an order clause is not in the supported subset
    pub fn compile(&self) -> Result<SearchPlan> {
        if self.experiment_ids.is_empty() {
            return Err(Error::InvalidInput(
                "run search needs at least one experiment id".to_string(),
            ));
        }
        if self.max_results == 0 || self.max_results > MAX_RESULTS_LIMIT {
            return Err(Error::InvalidInput(format!(
                "max_results must be between 1 and {MAX_RESULTS_LIMIT}, got {}",
                self.max_results
            )));
        }

        let predicates = match self.filter.as_deref().map(str::trim) {
            Some(filter) if !filter.is_empty() => parse_filter(filter)?,
            _ => Vec::new(),
        };

        let mut order = Vec::with_capacity(self.order_by.len() + 1);
        for clause in &self.order_by {
            order.push(parse_order_clause(clause)?);
        }
        if order.is_empty() {
            order.push(OrderKey {
                key: SearchKey::Attribute(RunAttribute::StartTime),
                direction: OrderDirection::Desc,
            });
        }

        Ok(SearchPlan {
            predicates,
            order,
            max_results: self.max_results,
        })
    }
}

/// Run attributes addressable in searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunAttribute {
    /// `run_id`
    RunId,
    /// `run_name`
    RunName,
    /// `status`
    Status,
    /// `start_time`, epoch milliseconds
    StartTime,
    /// `end_time`, epoch milliseconds
    EndTime,
}

/// A value of a run that filters and orderings can refer to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchKey {
    /// Built-in run attribute
    Attribute(RunAttribute),
    /// Latest value of a metric
    Metric(String),
    /// Logged parameter
    Param(String),
    /// Run tag
    Tag(String),
}

impl SearchKey {
    fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Metric(_)
                | Self::Attribute(RunAttribute::StartTime | RunAttribute::EndTime)
        )
    }
}

/// Comparison operator of a filter predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    /// `=`
    Eq,
    /// `!=` or `<>`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
    /// `LIKE`
    Like,
    /// `NOT LIKE`
    NotLike,
}

/// Right-hand side of a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Numeric literal
    Number(f64),
    /// String literal
    Text(String),
}

/// One `key <op> literal` comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    /// Compared key
    pub key: SearchKey,
    /// Operator
    pub comparator: Comparator,
    /// Compared literal
    pub literal: Literal,
}

/// Sort order direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    /// Ascending order (smallest first)
    Asc,
    /// Descending order (largest first)
    Desc,
}

/// One ordering clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderKey {
    /// Sorted key
    pub key: SearchKey,
    /// Direction
    pub direction: OrderDirection,
}

/// A run together with the latest value of each of its metrics.
#[derive(Debug, Clone)]
pub struct RunCandidate {
    run: RunRecord,
    metrics: HashMap<String, f64>,
}

impl RunCandidate {
    /// Pair a run with its latest metric values.
    #[must_use]
    pub fn new(run: RunRecord, metrics: HashMap<String, f64>) -> Self {
        Self { run, metrics }
    }

    fn number(&self, key: &SearchKey) -> Option<f64> {
        #[allow(clippy::cast_precision_loss)]
        let millis = |ts: DateTime<Utc>| ts.timestamp_millis() as f64;
        match key {
            SearchKey::Metric(name) => self.metrics.get(name).copied(),
            SearchKey::Attribute(RunAttribute::StartTime) => self.run.started_at().map(millis),
            SearchKey::Attribute(RunAttribute::EndTime) => self.run.ended_at().map(millis),
            _ => None,
        }
    }

    /// Full-precision timestamp, used for ordering on time attributes.
    fn timestamp(&self, key: &SearchKey) -> Option<DateTime<Utc>> {
        match key {
            SearchKey::Attribute(RunAttribute::StartTime) => self.run.started_at(),
            SearchKey::Attribute(RunAttribute::EndTime) => self.run.ended_at(),
            _ => None,
        }
    }

    fn text(&self, key: &SearchKey) -> Option<&str> {
        match key {
            SearchKey::Attribute(RunAttribute::RunId) => Some(self.run.run_id()),
            SearchKey::Attribute(RunAttribute::RunName) => self.run.run_name(),
            SearchKey::Attribute(RunAttribute::Status) => Some(self.run.status().as_str()),
            SearchKey::Param(name) => self.run.param(name),
            SearchKey::Tag(name) => self.run.tags().get(name).map(String::as_str),
            _ => None,
        }
    }
}

/// A validated search, ready to run over candidates.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPlan {
    predicates: Vec<Predicate>,
    order: Vec<OrderKey>,
    max_results: usize,
}

impl SearchPlan {
    /// Filter predicates (all must hold).
    #[must_use]
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Ordering clauses, before the implicit `run_id` tie-breaker.
    #[must_use]
    pub fn order(&self) -> &[OrderKey] {
        &self.order
    }

    /// Whether evaluating the plan needs metric values.
    #[must_use]
    pub fn uses_metrics(&self) -> bool {
        self.predicates
            .iter()
            .map(|p| &p.key)
            .chain(self.order.iter().map(|o| &o.key))
            .any(|key| matches!(key, SearchKey::Metric(_)))
    }

    /// Whether `candidate` satisfies every predicate.
    #[must_use]
    pub fn matches(&self, candidate: &RunCandidate) -> bool {
        self.predicates.iter().all(|p| predicate_holds(p, candidate))
    }

    /// Filter, sort and truncate candidates.
    #[must_use]
    pub fn apply(&self, candidates: Vec<RunCandidate>) -> Vec<RunRecord> {
        let mut selected: Vec<RunCandidate> =
            candidates.into_iter().filter(|c| self.matches(c)).collect();

        selected.sort_by(|a, b| {
            self.order
                .iter()
                .map(|o| compare_on(o, a, b))
                .find(|ord| ord.is_ne())
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.run.run_id().cmp(b.run.run_id()))
        });

        selected
            .into_iter()
            .take(self.max_results)
            .map(|c| c.run)
            .collect()
    }
}

fn predicate_holds(predicate: &Predicate, candidate: &RunCandidate) -> bool {
    match &predicate.literal {
        Literal::Number(expected) => candidate
            .number(&predicate.key)
            .is_some_and(|actual| compare_numbers(predicate.comparator, actual, *expected)),
        Literal::Text(expected) => candidate.text(&predicate.key).is_some_and(|actual| {
            compare_text(predicate.comparator, &predicate.key, actual, expected)
        }),
    }
}

#[allow(clippy::float_cmp)]
fn compare_numbers(comparator: Comparator, actual: f64, expected: f64) -> bool {
    match comparator {
        Comparator::Eq => actual == expected,
        Comparator::NotEq => actual != expected,
        Comparator::Lt => actual < expected,
        Comparator::LtEq => actual <= expected,
        Comparator::Gt => actual > expected,
        Comparator::GtEq => actual >= expected,
        Comparator::Like | Comparator::NotLike => false,
    }
}

fn compare_text(comparator: Comparator, key: &SearchKey, actual: &str, expected: &str) -> bool {
    // status values are stored upper-case; accept any case in filters
    let status = matches!(key, SearchKey::Attribute(RunAttribute::Status));
    let (actual, expected) = if status {
        (actual.to_ascii_uppercase(), expected.to_ascii_uppercase())
    } else {
        (actual.to_string(), expected.to_string())
    };
    match comparator {
        Comparator::Eq => actual == expected,
        Comparator::NotEq => actual != expected,
        Comparator::Like => like_match(&actual, &expected),
        Comparator::NotLike => !like_match(&actual, &expected),
        _ => false,
    }
}

fn compare_on(order: &OrderKey, a: &RunCandidate, b: &RunCandidate) -> Ordering {
    let key = &order.key;
    match key {
        // Filters compare milliseconds; ordering must not collapse sub-millisecond gaps
        SearchKey::Attribute(RunAttribute::StartTime | RunAttribute::EndTime) => {
            compare_present(a.timestamp(key), b.timestamp(key), order.direction, Ord::cmp)
        }
        _ if key.is_numeric() => {
            compare_present(a.number(key), b.number(key), order.direction, f64::total_cmp)
        }
        _ => compare_present(a.text(key), b.text(key), order.direction, Ord::cmp),
    }
}

/// Present values sort in `direction`; missing values always sort last.
fn compare_present<T>(
    a: Option<T>,
    b: Option<T>,
    direction: OrderDirection,
    cmp: impl FnOnce(&T, &T) -> Ordering,
) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => directed(cmp(&x, &y), direction),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

const fn directed(ordering: Ordering, direction: OrderDirection) -> Ordering {
    match direction {
        OrderDirection::Asc => ordering,
        OrderDirection::Desc => ordering.reverse(),
    }
}

/// SQL `LIKE` with `%` (any run) and `_` (any single character).
fn like_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();

    let (mut t, mut p) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) {
            t += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            backtrack = Some((p, t));
            p += 1;
        } else if let Some((star_p, star_t)) = backtrack {
            p = star_p + 1;
            t = star_t + 1;
            backtrack = Some((star_p, star_t + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|&c| c == '%')
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

fn parse_runs_query(sql: &str) -> Result<Box<Query>> {
    let statements = Parser::parse_sql(&GenericDialect {}, sql)
        .map_err(|e| Error::ParseError(format!("{e}")))?;

    if statements.len() != 1 {
        return Err(Error::ParseError(
            "Only single expressions supported".to_string(),
        ));
    }

    match statements.into_iter().next() {
        Some(Statement::Query(query)) => Ok(query),
        _ => Err(Error::ParseError("Unsupported search expression".to_string())),
    }
}

fn parse_filter(filter: &str) -> Result<Vec<Predicate>> {
    let query = parse_runs_query(&format!("SELECT * FROM runs WHERE {filter}"))?;
    if query.order_by.is_some() || query.limit.is_some() {
        return Err(Error::ParseError(format!(
            "ORDER BY / LIMIT not allowed in a filter: {filter}"
        )));
    }
    let SetExpr::Select(select) = query.body.as_ref() else {
        return Err(Error::ParseError(format!("Unsupported filter: {filter}")));
    };
    let Some(selection) = select.selection.as_ref() else {
        return Err(Error::ParseError(format!("Empty filter: {filter}")));
    };

    let mut predicates = Vec::new();
    collect_predicates(selection, &mut predicates)?;
    Ok(predicates)
}

fn collect_predicates(expr: &Expr, out: &mut Vec<Predicate>) -> Result<()> {
    match expr {
        Expr::Nested(inner) => collect_predicates(inner, out),
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } => {
            collect_predicates(left, out)?;
            collect_predicates(right, out)
        }
        Expr::BinaryOp { left, op, right } => {
            let comparator = match op {
                BinaryOperator::Eq => Comparator::Eq,
                BinaryOperator::NotEq => Comparator::NotEq,
                BinaryOperator::Lt => Comparator::Lt,
                BinaryOperator::LtEq => Comparator::LtEq,
                BinaryOperator::Gt => Comparator::Gt,
                BinaryOperator::GtEq => Comparator::GtEq,
                other => {
                    return Err(Error::ParseError(format!(
                        "Unsupported operator '{other}' in filter"
                    )))
                }
            };
            out.push(typed_predicate(parse_key(left)?, comparator, parse_literal(right)?)?);
            Ok(())
        }
        Expr::Like {
            negated,
            expr,
            pattern,
            ..
        } => {
            let comparator = if *negated {
                Comparator::NotLike
            } else {
                Comparator::Like
            };
            out.push(typed_predicate(parse_key(expr)?, comparator, parse_literal(pattern)?)?);
            Ok(())
        }
        other => Err(Error::ParseError(format!(
            "Unsupported filter expression: {other}"
        ))),
    }
}

fn typed_predicate(key: SearchKey, comparator: Comparator, literal: Literal) -> Result<Predicate> {
    let like = matches!(comparator, Comparator::Like | Comparator::NotLike);
    let ordering = matches!(
        comparator,
        Comparator::Lt | Comparator::LtEq | Comparator::Gt | Comparator::GtEq
    );

    match (&literal, key.is_numeric()) {
        (Literal::Number(_), true) if !like => {}
        (Literal::Text(_), false) if !ordering => {}
        (Literal::Number(_), true) => {
            return Err(Error::ParseError(format!(
                "LIKE is not supported on numeric key {key:?}"
            )))
        }
        (Literal::Text(_), false) => {
            return Err(Error::ParseError(format!(
                "Ordering comparisons are not supported on string key {key:?}"
            )))
        }
        (Literal::Text(text), true) => {
            return Err(Error::ParseError(format!(
                "Expected a number for {key:?}, got '{text}'"
            )))
        }
        (Literal::Number(n), false) => {
            return Err(Error::ParseError(format!(
                "Expected a quoted string for {key:?}, got {n}"
            )))
        }
    }

    Ok(Predicate {
        key,
        comparator,
        literal,
    })
}

fn parse_key(expr: &Expr) -> Result<SearchKey> {
    let parts: Vec<&str> = match expr {
        Expr::Identifier(ident) => vec![ident.value.as_str()],
        Expr::CompoundIdentifier(idents) => idents.iter().map(|i| i.value.as_str()).collect(),
        other => {
            return Err(Error::ParseError(format!(
                "Expected a run key, got '{other}'"
            )))
        }
    };

    let (prefix, name) = match parts.as_slice() {
        [single] => (None, (*single).to_string()),
        [prefix, rest @ ..] => (Some(*prefix), rest.join(".")),
        [] => return Err(Error::ParseError("Empty key".to_string())),
    };

    match prefix.map(str::to_ascii_lowercase).as_deref() {
        None | Some("attribute" | "attributes") => parse_attribute(&name).map(SearchKey::Attribute),
        Some("metric" | "metrics") => Ok(SearchKey::Metric(name)),
        Some("param" | "params" | "parameter" | "parameters") => Ok(SearchKey::Param(name)),
        Some("tag" | "tags") => Ok(SearchKey::Tag(name)),
        Some(other) => Err(Error::ParseError(format!(
            "Unknown key type '{other}' (expected attributes, metrics, params or tags)"
        ))),
    }
}

fn parse_attribute(name: &str) -> Result<RunAttribute> {
    match name.to_ascii_lowercase().as_str() {
        "run_id" => Ok(RunAttribute::RunId),
        "run_name" => Ok(RunAttribute::RunName),
        "status" => Ok(RunAttribute::Status),
        "start_time" => Ok(RunAttribute::StartTime),
        "end_time" => Ok(RunAttribute::EndTime),
        other => Err(Error::ParseError(format!("Unknown run attribute '{other}'"))),
    }
}

fn parse_literal(expr: &Expr) -> Result<Literal> {
    match expr {
        Expr::Value(Value::Number(n, _)) => n
            .parse::<f64>()
            .map(Literal::Number)
            .map_err(|e| Error::ParseError(format!("Invalid number '{n}': {e}"))),
        Expr::Value(Value::SingleQuotedString(s) | Value::DoubleQuotedString(s)) => {
            Ok(Literal::Text(s.clone()))
        }
        // GenericDialect reads "abc" as a quoted identifier
        Expr::Identifier(ident) if ident.quote_style == Some('"') => {
            Ok(Literal::Text(ident.value.clone()))
        }
        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr,
        } => match parse_literal(expr)? {
            Literal::Number(n) => Ok(Literal::Number(-n)),
            Literal::Text(t) => Err(Error::ParseError(format!("Cannot negate '{t}'"))),
        },
        Expr::UnaryOp {
            op: UnaryOperator::Plus,
            expr,
        } => parse_literal(expr),
        Expr::Nested(inner) => parse_literal(inner),
        other => Err(Error::ParseError(format!(
            "Expected a literal, got '{other}'"
        ))),
    }
}

fn parse_order_clause(clause: &str) -> Result<OrderKey> {
    let query = parse_runs_query(&format!("SELECT * FROM runs ORDER BY {clause}"))?;
    if query.limit.is_some() {
        return Err(Error::ParseError(format!(
            "LIMIT not allowed in an order clause: {clause}"
        )));
    }
    let exprs = query.order_by.as_ref().map(|ob| ob.exprs.as_slice()).unwrap_or_default();
    let [order_expr] = exprs else {
        return Err(Error::ParseError(format!(
            "Expected exactly one order-by key, got '{clause}'"
        )));
    };

    let direction = if order_expr.asc.unwrap_or(true) {
        OrderDirection::Asc
    } else {
        OrderDirection::Desc
    };
    Ok(OrderKey {
        key: parse_key(&order_expr.expr)?,
        direction,
    })
}
