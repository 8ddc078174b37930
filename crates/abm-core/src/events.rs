//! Discrete-event selection by propensity (Gillespie-style branching).
//!
//! The selection itself is a pure function of the rates and a uniform draw,
//! so branch choices can be tested without a generator.

use crate::{Error, Result};
use rand::Rng;

/// Sum of all propensities, rejecting negative or non-finite rates.
pub fn total_propensity(rates: &[f64]) -> Result<f64> {
    let mut total = 0.0;
    for (index, &rate) in rates.iter().enumerate() {
        if !rate.is_finite() || rate < 0.0 {
            return Err(Error::InvalidPropensity(format!(
                "rate {index} is {rate}, expected a finite non-negative number"
            )));
        }
        total += rate;
    }
    Ok(total)
}

/// Select the event whose cumulative range contains `draw * total`.
///
/// `draw` must lie in `[0, 1)`. Returns `None` when every rate is zero.
/// Zero-rate events are never selected.
pub fn select_event(rates: &[f64], draw: f64) -> Result<Option<usize>> {
    if !(0.0..1.0).contains(&draw) {
        return Err(Error::InvalidPropensity(format!(
            "draw {draw} is outside [0, 1)"
        )));
    }
    let total = total_propensity(rates)?;
    if total == 0.0 {
        return Ok(None);
    }

    let target = draw * total;
    let mut cumulative = 0.0;
    let mut last_positive = None;
    for (index, &rate) in rates.iter().enumerate() {
        if rate == 0.0 {
            continue;
        }
        cumulative += rate;
        last_positive = Some(index);
        if target < cumulative {
            return Ok(Some(index));
        }
    }
    // Rounding can leave target == cumulative on the last range.
    Ok(last_positive)
}

/// Exponentially distributed time until the next event.
///
/// Uses `1 - draw` so a draw of zero maps to a finite waiting time.
pub fn waiting_time(total: f64, draw: f64) -> f64 {
    if total <= 0.0 {
        return f64::INFINITY;
    }
    -(1.0 - draw).ln() / total
}

/// Draw one event index from `rng`, proportional to `rates`.
pub fn next_event<R: Rng + ?Sized>(rates: &[f64], rng: &mut R) -> Result<Option<usize>> {
    let draw: f64 = rng.gen();
    select_event(rates, draw)
}
