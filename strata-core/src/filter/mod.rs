//! Time and value predicates with statistics-based pruning
//!
//! A filter is evaluated on three surfaces: single points, block
//! statistics (may-contain semantics, so a rejected block provably holds
//! no satisfying point), and bare time ranges for resource-level checks
//! where only the end-time map is known.

use crate::statistics::Statistics;
use crate::types::{Timestamp, TsValue};
use std::cmp::Ordering;

/// Predicate over `(timestamp, value)` points
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    TimeGt(Timestamp),
    TimeGtEq(Timestamp),
    TimeLt(Timestamp),
    TimeLtEq(Timestamp),
    ValueGt(TsValue),
    ValueGtEq(TsValue),
    ValueLt(TsValue),
    ValueLtEq(TsValue),
    And(Box<Filter>, Box<Filter>),
    Or(Box<Filter>, Box<Filter>),
}

impl Filter {
    /// Conjunction of two filters
    pub fn and(self, other: Filter) -> Filter {
        Filter::And(Box::new(self), Box::new(other))
    }

    /// Disjunction of two filters
    pub fn or(self, other: Filter) -> Filter {
        Filter::Or(Box::new(self), Box::new(other))
    }

    /// Exact evaluation on a single point.
    ///
    /// Value comparisons across mismatched types are never satisfied.
    pub fn accepts_point(&self, ts: Timestamp, value: &TsValue) -> bool {
        match self {
            Filter::TimeGt(k) => ts > *k,
            Filter::TimeGtEq(k) => ts >= *k,
            Filter::TimeLt(k) => ts < *k,
            Filter::TimeLtEq(k) => ts <= *k,
            Filter::ValueGt(v) => value.compare(v) == Some(Ordering::Greater),
            Filter::ValueGtEq(v) => {
                matches!(value.compare(v), Some(Ordering::Greater | Ordering::Equal))
            }
            Filter::ValueLt(v) => value.compare(v) == Some(Ordering::Less),
            Filter::ValueLtEq(v) => {
                matches!(value.compare(v), Some(Ordering::Less | Ordering::Equal))
            }
            Filter::And(a, b) => a.accepts_point(ts, value) && b.accepts_point(ts, value),
            Filter::Or(a, b) => a.accepts_point(ts, value) || b.accepts_point(ts, value),
        }
    }

    /// May-contain evaluation on a block summary.
    ///
    /// Returns false only when no point of the block can satisfy the
    /// filter; empty statistics never reject on value predicates.
    pub fn accepts_stats(&self, stats: &Statistics, start: Timestamp, end: Timestamp) -> bool {
        match self {
            Filter::TimeGt(k) => end > *k,
            Filter::TimeGtEq(k) => end >= *k,
            Filter::TimeLt(k) => start < *k,
            Filter::TimeLtEq(k) => start <= *k,
            Filter::ValueGt(v) => match stats.max() {
                Some(max) => max.compare(v) == Some(Ordering::Greater),
                None => true,
            },
            Filter::ValueGtEq(v) => match stats.max() {
                Some(max) => matches!(max.compare(v), Some(Ordering::Greater | Ordering::Equal)),
                None => true,
            },
            Filter::ValueLt(v) => match stats.min() {
                Some(min) => min.compare(v) == Some(Ordering::Less),
                None => true,
            },
            Filter::ValueLtEq(v) => match stats.min() {
                Some(min) => matches!(min.compare(v), Some(Ordering::Less | Ordering::Equal)),
                None => true,
            },
            Filter::And(a, b) => {
                a.accepts_stats(stats, start, end) && b.accepts_stats(stats, start, end)
            }
            Filter::Or(a, b) => {
                a.accepts_stats(stats, start, end) || b.accepts_stats(stats, start, end)
            }
        }
    }

    /// May-contain evaluation when only a time range is known.
    ///
    /// Value predicates are vacuously true here; this backs the
    /// resource-level skip check over the end-time map.
    pub fn accepts_time_range(&self, start: Timestamp, end: Timestamp) -> bool {
        match self {
            Filter::TimeGt(k) => end > *k,
            Filter::TimeGtEq(k) => end >= *k,
            Filter::TimeLt(k) => start < *k,
            Filter::TimeLtEq(k) => start <= *k,
            Filter::ValueGt(_)
            | Filter::ValueGtEq(_)
            | Filter::ValueLt(_)
            | Filter::ValueLtEq(_) => true,
            Filter::And(a, b) => a.accepts_time_range(start, end) && b.accepts_time_range(start, end),
            Filter::Or(a, b) => a.accepts_time_range(start, end) || b.accepts_time_range(start, end),
        }
    }
}
