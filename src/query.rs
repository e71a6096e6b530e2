//! The query expression tree: a composable predicate language over a
//! [Point]'s four attributes (time, measurement, tag value, field
//! value), plus `not`/`and`/`or` combinators.
//!
//! [Query] is a plain algebraic data type (`Leaf`, `Not`, `And`, `Or`);
//! short-circuiting lives entirely in [Query::eval], not in operator
//! overloading — the `&`/`|`/`!` impls below are sugar that builds the
//! same tree. Each leaf additionally knows whether it admits an index
//! fast path: [Leaf::index_support] returns the exact row-id set when
//! it can, leaving [Query::partial_eval] to stitch per-leaf results
//! into a `(candidates, residual)` pair per spec.md §4.2.

use std::fmt;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::index::{set_complement, set_intersect, set_union, Index, RowIdSet};
use crate::point::{Point, Value};

/// An attribute path a leaf navigates to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Path {
    Time,
    Measurement,
    Tag(String),
    Field(String),
}

/// Comparison operators available to simple comparison and transform leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Op {
    fn apply(self, ord: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match (self, ord) {
            (Op::Eq, Equal) => true,
            (Op::Ne, Equal) => false,
            (Op::Ne, _) => true,
            (Op::Lt, Less) => true,
            (Op::Le, Less) | (Op::Le, Equal) => true,
            (Op::Gt, Greater) => true,
            (Op::Ge, Greater) | (Op::Ge, Equal) => true,
            _ => false,
        }
    }
}

/// A literal operand compared against an attribute value. Carries its
/// own kind so a leaf can be built generically; mismatched kinds (e.g.
/// comparing a field to `Literal::Time`) simply never match.
#[derive(Debug, Clone)]
pub enum Literal {
    Time(DateTime<Utc>),
    Str(String),
    Val(Value),
}

/// The raw value found at a [Path] when it is present on a point.
#[derive(Debug, Clone)]
pub enum AttrValue {
    Time(DateTime<Utc>),
    Str(String),
    Val(Value),
}

pub(crate) fn lookup(path: &Path, p: &Point) -> Option<AttrValue> {
    match path {
        Path::Time => p.time.map(AttrValue::Time),
        Path::Measurement => Some(AttrValue::Str(p.measurement.clone())),
        Path::Tag(k) => p.tags.get(k).map(|v| AttrValue::Str(v.clone())),
        Path::Field(k) => p.fields.get(k).cloned().map(AttrValue::Val),
    }
}

fn compare(attr: &AttrValue, op: Op, operand: &Literal) -> bool {
    match (attr, operand) {
        (AttrValue::Time(a), Literal::Time(b)) => op.apply(a.cmp(b)),
        (AttrValue::Str(a), Literal::Str(b)) => op.apply(a.as_str().cmp(b.as_str())),
        (AttrValue::Val(a), Literal::Val(b)) => a
            .partial_compare(b)
            .map(|ord| op.apply(ord))
            .unwrap_or(false),
        _ => false,
    }
}

/// Regex matching mode: full-string match vs. substring search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegexMode {
    Matches,
    Search,
}

pub type TransformFn = Rc<dyn Fn(&AttrValue) -> AttrValue>;
pub type PredicateFn = Rc<dyn Fn(&AttrValue) -> bool>;

/// A single predicate node. See the module doc for the evaluation and
/// index-support semantics of each variant.
#[derive(Clone)]
pub enum Leaf {
    Compare(Path, Op, Literal),
    Exists(Path),
    Regex(Path, RegexMode, Regex),
    Transform(Path, TransformFn, Op, Literal),
    Predicate(Path, PredicateFn),
}

impl fmt::Debug for Leaf {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Leaf::Compare(p, op, lit) => write!(f, "Compare({:?}, {:?}, {:?})", p, op, lit),
            Leaf::Exists(p) => write!(f, "Exists({:?})", p),
            Leaf::Regex(p, m, re) => write!(f, "Regex({:?}, {:?}, {:?})", p, m, re.as_str()),
            Leaf::Transform(p, _, op, lit) => write!(f, "Transform({:?}, <fn>, {:?}, {:?})", p, op, lit),
            Leaf::Predicate(p, _) => write!(f, "Predicate({:?}, <fn>)", p),
        }
    }
}

/// Three-valued evaluation result. `Undefined` arises only from
/// regex/transform/predicate leaves applied to a missing attribute;
/// plain comparisons and existence checks collapse missing straight to
/// `False` (spec.md §4.2). `not` flips `True`/`False` but leaves
/// `Undefined` as `Undefined`, so a negated-missing leaf is still never
/// `True` — this is the three-valued (Kleene) logic DeMorgan's law in
/// spec.md §8 relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tri {
    True,
    False,
    Undefined,
}

impl Tri {
    pub fn from_bool(b: bool) -> Tri {
        if b {
            Tri::True
        } else {
            Tri::False
        }
    }

    pub fn is_true(self) -> bool {
        matches!(self, Tri::True)
    }

    fn negate(self) -> Tri {
        match self {
            Tri::True => Tri::False,
            Tri::False => Tri::True,
            Tri::Undefined => Tri::Undefined,
        }
    }

    fn and(self, other: impl FnOnce() -> Tri) -> Tri {
        match self {
            Tri::False => Tri::False,
            Tri::True => other(),
            Tri::Undefined => match other() {
                Tri::False => Tri::False,
                _ => Tri::Undefined,
            },
        }
    }

    fn or(self, other: impl FnOnce() -> Tri) -> Tri {
        match self {
            Tri::True => Tri::True,
            Tri::False => other(),
            Tri::Undefined => match other() {
                Tri::True => Tri::True,
                _ => Tri::Undefined,
            },
        }
    }
}

impl Leaf {
    fn eval(&self, p: &Point) -> Tri {
        match self {
            Leaf::Compare(path, op, operand) => match lookup(path, p) {
                None => Tri::False,
                Some(attr) => Tri::from_bool(compare(&attr, *op, operand)),
            },
            Leaf::Exists(path) => {
                let present = match path {
                    Path::Tag(k) => p.tags.contains_key(k),
                    Path::Field(k) => p.fields.contains_key(k),
                    Path::Time => p.time.is_some(),
                    Path::Measurement => true,
                };
                Tri::from_bool(present)
            }
            Leaf::Regex(path, mode, re) => match lookup(path, p) {
                None => Tri::Undefined,
                Some(AttrValue::Str(s)) => Tri::from_bool(match mode {
                    RegexMode::Search => re.is_match(&s),
                    RegexMode::Matches => re
                        .find(&s)
                        .map(|m| m.start() == 0 && m.end() == s.len())
                        .unwrap_or(false),
                }),
                Some(_) => Tri::False,
            },
            Leaf::Transform(path, f, op, operand) => match lookup(path, p) {
                None => Tri::Undefined,
                Some(attr) => Tri::from_bool(compare(&f(&attr), *op, operand)),
            },
            Leaf::Predicate(path, f) => match lookup(path, p) {
                None => Tri::Undefined,
                Some(attr) => Tri::from_bool(f(&attr)),
            },
        }
    }

    /// Returns the exact row-id set this leaf matches, if the index
    /// can answer it without a scan. See spec.md §4.2 for the table of
    /// which leaf shapes admit a fast path.
    fn index_support(&self, index: &Index) -> Option<RowIdSet> {
        match self {
            Leaf::Compare(Path::Time, op, Literal::Time(t)) => Some(match op {
                Op::Eq => index.rows_in_time_range(Some(*t), Some(*t), true, true),
                Op::Ne => set_complement(
                    &index.all_rows(),
                    &index.rows_in_time_range(Some(*t), Some(*t), true, true),
                ),
                Op::Lt => index.rows_in_time_range(None, Some(*t), true, false),
                Op::Le => index.rows_in_time_range(None, Some(*t), true, true),
                Op::Gt => index.rows_in_time_range(Some(*t), None, false, true),
                Op::Ge => index.rows_in_time_range(Some(*t), None, true, true),
            }),
            Leaf::Compare(Path::Measurement, Op::Eq, Literal::Str(name)) => {
                Some(index.rows_for_measurement(name))
            }
            Leaf::Compare(Path::Measurement, Op::Ne, Literal::Str(name)) => Some(set_complement(
                &index.all_rows(),
                &index.rows_for_measurement(name),
            )),
            Leaf::Compare(Path::Tag(key), Op::Eq, Literal::Str(value)) => {
                Some(index.rows_for_tag(key, value))
            }
            Leaf::Exists(Path::Tag(key)) => Some(index.rows_with_tag_key(key)),
            Leaf::Exists(Path::Field(key)) => Some(index.rows_with_field_key(key)),
            _ => None,
        }
    }
}

/// The composed predicate tree.
#[derive(Debug, Clone)]
pub enum Query {
    Leaf(Leaf),
    Not(Box<Query>),
    And(Box<Query>, Box<Query>),
    Or(Box<Query>, Box<Query>),
}

/// Result of [Query::partial_eval]: the row-ids the index can
/// guarantee are candidates, plus whatever residual predicate must
/// still be checked against the materialized point. `residual = None`
/// means the candidate set is already exact — no further filtering
/// needed.
pub struct PartialEval {
    pub candidates: RowIdSet,
    pub residual: Option<Query>,
}

fn and_residual(a: Option<Query>, b: Option<Query>) -> Option<Query> {
    match (a, b) {
        (None, None) => None,
        (None, Some(b)) => Some(b),
        (Some(a), None) => Some(a),
        (Some(a), Some(b)) => Some(Query::And(Box::new(a), Box::new(b))),
    }
}

impl Query {
    pub fn leaf(l: Leaf) -> Query {
        Query::Leaf(l)
    }

    pub fn negate(self) -> Query {
        Query::Not(Box::new(self))
    }

    pub fn and(self, other: Query) -> Query {
        Query::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Query) -> Query {
        Query::Or(Box::new(self), Box::new(other))
    }

    /// Evaluate directly against a materialized point (no index involved).
    pub fn eval(&self, p: &Point) -> bool {
        self.eval_tri(p).is_true()
    }

    fn eval_tri(&self, p: &Point) -> Tri {
        match self {
            Query::Leaf(l) => l.eval(p),
            Query::Not(q) => q.eval_tri(p).negate(),
            Query::And(a, b) => a.eval_tri(p).and(|| b.eval_tri(p)),
            Query::Or(a, b) => a.eval_tri(p).or(|| b.eval_tri(p)),
        }
    }

    /// Partial evaluation against a valid index, per spec.md §4.2.
    pub fn partial_eval(&self, index: &Index) -> PartialEval {
        match self {
            Query::Leaf(l) => match l.index_support(index) {
                Some(exact) => PartialEval {
                    candidates: exact,
                    residual: None,
                },
                None => PartialEval {
                    candidates: index.all_rows(),
                    residual: Some(self.clone()),
                },
            },
            Query::Not(inner) => {
                let sub = inner.partial_eval(index);
                match sub.residual {
                    None => PartialEval {
                        candidates: set_complement(&index.all_rows(), &sub.candidates),
                        residual: None,
                    },
                    Some(_) => PartialEval {
                        candidates: index.all_rows(),
                        residual: Some(self.clone()),
                    },
                }
            }
            Query::And(a, b) => {
                let sa = a.partial_eval(index);
                let sb = b.partial_eval(index);
                PartialEval {
                    candidates: set_intersect(&sa.candidates, &sb.candidates),
                    residual: and_residual(sa.residual, sb.residual),
                }
            }
            Query::Or(a, b) => {
                let sa = a.partial_eval(index);
                let sb = b.partial_eval(index);
                match (sa.residual, sb.residual) {
                    (None, None) => PartialEval {
                        candidates: set_union(&sa.candidates, &sb.candidates),
                        residual: None,
                    },
                    _ => PartialEval {
                        candidates: index.all_rows(),
                        residual: Some(self.clone()),
                    },
                }
            }
        }
    }
}

impl std::ops::Not for Query {
    type Output = Query;
    fn not(self) -> Query {
        self.negate()
    }
}

impl std::ops::BitAnd for Query {
    type Output = Query;
    fn bitand(self, rhs: Query) -> Query {
        self.and(rhs)
    }
}

impl std::ops::BitOr for Query {
    type Output = Query;
    fn bitor(self, rhs: Query) -> Query {
        self.or(rhs)
    }
}

/// Builder entry point for `time` leaves.
pub struct TimeQuery;

impl TimeQuery {
    pub fn compare(op: Op, t: DateTime<Utc>) -> Query {
        Query::leaf(Leaf::Compare(Path::Time, op, Literal::Time(t)))
    }
    pub fn eq(t: DateTime<Utc>) -> Query {
        Self::compare(Op::Eq, t)
    }
    pub fn ne(t: DateTime<Utc>) -> Query {
        Self::compare(Op::Ne, t)
    }
    pub fn lt(t: DateTime<Utc>) -> Query {
        Self::compare(Op::Lt, t)
    }
    pub fn le(t: DateTime<Utc>) -> Query {
        Self::compare(Op::Le, t)
    }
    pub fn gt(t: DateTime<Utc>) -> Query {
        Self::compare(Op::Gt, t)
    }
    pub fn ge(t: DateTime<Utc>) -> Query {
        Self::compare(Op::Ge, t)
    }
}

/// Builder entry point for `measurement` leaves.
pub struct MeasurementQuery;

impl MeasurementQuery {
    pub fn eq<S: Into<String>>(name: S) -> Query {
        Query::leaf(Leaf::Compare(Path::Measurement, Op::Eq, Literal::Str(name.into())))
    }
    pub fn ne<S: Into<String>>(name: S) -> Query {
        Query::leaf(Leaf::Compare(Path::Measurement, Op::Ne, Literal::Str(name.into())))
    }
    pub fn matches(pattern: &str) -> crate::error::Result<Query> {
        build_regex(Path::Measurement, RegexMode::Matches, pattern)
    }
    pub fn search(pattern: &str) -> crate::error::Result<Query> {
        build_regex(Path::Measurement, RegexMode::Search, pattern)
    }
}

/// Builder entry point for `tags.<key>` leaves. `key_raw` supports keys
/// that are not valid identifiers (spec.md §9's `[""]` form).
pub struct TagQuery {
    path: Path,
}

impl TagQuery {
    pub fn key(key: &str) -> TagQuery {
        TagQuery::key_raw(key)
    }

    pub fn key_raw(key: &str) -> TagQuery {
        TagQuery {
            path: Path::Tag(key.to_string()),
        }
    }

    fn compare<S: Into<String>>(self, op: Op, value: S) -> Query {
        Query::leaf(Leaf::Compare(self.path, op, Literal::Str(value.into())))
    }
    pub fn eq<S: Into<String>>(self, value: S) -> Query {
        self.compare(Op::Eq, value)
    }
    pub fn ne<S: Into<String>>(self, value: S) -> Query {
        self.compare(Op::Ne, value)
    }
    pub fn lt<S: Into<String>>(self, value: S) -> Query {
        self.compare(Op::Lt, value)
    }
    pub fn le<S: Into<String>>(self, value: S) -> Query {
        self.compare(Op::Le, value)
    }
    pub fn gt<S: Into<String>>(self, value: S) -> Query {
        self.compare(Op::Gt, value)
    }
    pub fn ge<S: Into<String>>(self, value: S) -> Query {
        self.compare(Op::Ge, value)
    }
    pub fn exists(self) -> Query {
        Query::leaf(Leaf::Exists(self.path))
    }
    pub fn matches(self, pattern: &str) -> crate::error::Result<Query> {
        build_regex(self.path, RegexMode::Matches, pattern)
    }
    pub fn search(self, pattern: &str) -> crate::error::Result<Query> {
        build_regex(self.path, RegexMode::Search, pattern)
    }
    pub fn map(self, f: impl Fn(&AttrValue) -> AttrValue + 'static) -> TagTransform {
        TagTransform {
            path: self.path,
            f: Rc::new(f),
        }
    }
    pub fn test(self, f: impl Fn(&AttrValue) -> bool + 'static) -> Query {
        Query::leaf(Leaf::Predicate(self.path, Rc::new(f)))
    }
}

/// Builder entry point for `fields.<key>` leaves.
pub struct FieldQuery {
    path: Path,
}

impl FieldQuery {
    pub fn key(key: &str) -> FieldQuery {
        FieldQuery::key_raw(key)
    }

    pub fn key_raw(key: &str) -> FieldQuery {
        FieldQuery {
            path: Path::Field(key.to_string()),
        }
    }

    fn compare(self, op: Op, value: Value) -> Query {
        Query::leaf(Leaf::Compare(self.path, op, Literal::Val(value)))
    }
    pub fn eq(self, value: Value) -> Query {
        self.compare(Op::Eq, value)
    }
    pub fn ne(self, value: Value) -> Query {
        self.compare(Op::Ne, value)
    }
    pub fn lt(self, value: Value) -> Query {
        self.compare(Op::Lt, value)
    }
    pub fn le(self, value: Value) -> Query {
        self.compare(Op::Le, value)
    }
    pub fn gt(self, value: Value) -> Query {
        self.compare(Op::Gt, value)
    }
    pub fn ge(self, value: Value) -> Query {
        self.compare(Op::Ge, value)
    }
    pub fn exists(self) -> Query {
        Query::leaf(Leaf::Exists(self.path))
    }
    pub fn map(self, f: impl Fn(&AttrValue) -> AttrValue + 'static) -> FieldTransform {
        FieldTransform {
            path: self.path,
            f: Rc::new(f),
        }
    }
    pub fn test(self, f: impl Fn(&AttrValue) -> bool + 'static) -> Query {
        Query::leaf(Leaf::Predicate(self.path, Rc::new(f)))
    }
}

/// Intermediate builder for `TagQuery::map(..)`; never takes the index
/// fast path (spec.md §9).
pub struct TagTransform {
    path: Path,
    f: TransformFn,
}

impl TagTransform {
    fn compare<S: Into<String>>(self, op: Op, value: S) -> Query {
        Query::leaf(Leaf::Transform(self.path, self.f, op, Literal::Str(value.into())))
    }
    pub fn eq<S: Into<String>>(self, value: S) -> Query {
        self.compare(Op::Eq, value)
    }
    pub fn ne<S: Into<String>>(self, value: S) -> Query {
        self.compare(Op::Ne, value)
    }
    pub fn lt<S: Into<String>>(self, value: S) -> Query {
        self.compare(Op::Lt, value)
    }
    pub fn le<S: Into<String>>(self, value: S) -> Query {
        self.compare(Op::Le, value)
    }
    pub fn gt<S: Into<String>>(self, value: S) -> Query {
        self.compare(Op::Gt, value)
    }
    pub fn ge<S: Into<String>>(self, value: S) -> Query {
        self.compare(Op::Ge, value)
    }
}

/// Intermediate builder for `FieldQuery::map(..)`.
pub struct FieldTransform {
    path: Path,
    f: TransformFn,
}

impl FieldTransform {
    fn compare(self, op: Op, value: Value) -> Query {
        Query::leaf(Leaf::Transform(self.path, self.f, op, Literal::Val(value)))
    }
    pub fn eq(self, value: Value) -> Query {
        self.compare(Op::Eq, value)
    }
    pub fn ne(self, value: Value) -> Query {
        self.compare(Op::Ne, value)
    }
    pub fn lt(self, value: Value) -> Query {
        self.compare(Op::Lt, value)
    }
    pub fn le(self, value: Value) -> Query {
        self.compare(Op::Le, value)
    }
    pub fn gt(self, value: Value) -> Query {
        self.compare(Op::Gt, value)
    }
    pub fn ge(self, value: Value) -> Query {
        self.compare(Op::Ge, value)
    }
}

fn build_regex(path: Path, mode: RegexMode, pattern: &str) -> crate::error::Result<Query> {
    match Regex::new(pattern) {
        Ok(re) => Ok(Query::leaf(Leaf::Regex(path, mode, re))),
        Err(err) => crate::err_at!(Query, msg: "bad regex {:?}: {}", pattern, err),
    }
}

/// Parse a dotted attribute path string (`"time"`, `"measurement"`,
/// `"tags.city"`, `"fields.aqi"`) as used by [crate::engine::Engine::select].
pub fn parse_path(spec: &str) -> crate::error::Result<Path> {
    match spec {
        "time" => Ok(Path::Time),
        "measurement" => Ok(Path::Measurement),
        _ => {
            if let Some(k) = spec.strip_prefix("tags.") {
                Ok(Path::Tag(k.to_string()))
            } else if let Some(k) = spec.strip_prefix("fields.") {
                Ok(Path::Field(k.to_string()))
            } else {
                crate::err_at!(Lookup, msg: "unknown attribute path {:?}", spec)
            }
        }
    }
}

#[cfg(test)]
#[path = "query_test.rs"]
mod query_test;
