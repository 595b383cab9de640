//! Date alignment of two return series.
//!
//! Reduces two series to the dates they share, preserving chronological
//! order. Works as a merge-join, so it also verifies that both inputs are
//! strictly ascending.

use chrono::NaiveDate;

use super::error::AnalyticsError;
use super::series::{DateRange, ReturnPoint, ReturnSeries};

/// Two return series restricted to their common dates.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedPair {
    pub subject: String,
    pub range: DateRange,
    pub dates: Vec<NaiveDate>,
    pub left: Vec<f64>,
    pub right: Vec<f64>,
}

impl AlignedPair {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

pub fn align(a: &ReturnSeries, b: &ReturnSeries) -> Result<AlignedPair, AnalyticsError> {
    align_points(a.portfolio_id(), a.points(), b.portfolio_id(), b.points()).map(
        |(dates, left, right)| AlignedPair {
            subject: format!("{}/{}", a.portfolio_id(), b.portfolio_id()),
            range: a.range().span(&b.range()),
            dates,
            left,
            right,
        },
    )
}

/// Merge-join on raw points. Fails with `MalformedSeries` on the first
/// duplicate or out-of-order date in either side.
pub fn align_points(
    left_id: &str,
    left: &[ReturnPoint],
    right_id: &str,
    right: &[ReturnPoint],
) -> Result<(Vec<NaiveDate>, Vec<f64>, Vec<f64>), AnalyticsError> {
    let capacity = left.len().min(right.len());
    let mut dates = Vec::with_capacity(capacity);
    let mut xs = Vec::with_capacity(capacity);
    let mut ys = Vec::with_capacity(capacity);

    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        check_step(left_id, left, i)?;
        check_step(right_id, right, j)?;

        let (l, r) = (&left[i], &right[j]);
        if l.date < r.date {
            i += 1;
        } else if r.date < l.date {
            j += 1;
        } else {
            dates.push(l.date);
            xs.push(l.value);
            ys.push(r.value);
            i += 1;
            j += 1;
        }
    }

    // The tails never match but must still be well-formed.
    for k in i..left.len() {
        check_step(left_id, left, k)?;
    }
    for k in j..right.len() {
        check_step(right_id, right, k)?;
    }

    Ok((dates, xs, ys))
}

fn check_step(id: &str, points: &[ReturnPoint], idx: usize) -> Result<(), AnalyticsError> {
    if idx == 0 {
        return Ok(());
    }
    let (prev, cur) = (points[idx - 1].date, points[idx].date);
    if cur == prev {
        return Err(AnalyticsError::malformed(id, format!("duplicate date {cur}")));
    }
    if cur < prev {
        return Err(AnalyticsError::malformed(
            id,
            format!("date {cur} follows {prev}"),
        ));
    }
    Ok(())
}
