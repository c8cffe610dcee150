use crate::error::{ReceiptSearchError, Result};
use crate::references::ReferenceStore;
use crate::schema::{ReceiptFinderConfig, Reference};
use crate::utils::days_between;
use chrono::NaiveDate;
use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

/// Noise added to predictions that fall outside the span of known references.
///
/// `Uniform` draws an integer in `±min(days_from_edge, max_spread)`. With a seed
/// the sequence is reproducible.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtrapolationJitter {
    #[default]
    None,
    Uniform {
        max_spread: i64,
        #[serde(default)]
        seed: Option<u64>,
    },
}

/// Linear interpolation (or extrapolation) through two references, rounded to
/// the nearest integer with halves going up.
pub fn interpolate(target: NaiveDate, before: &Reference, after: &Reference) -> i64 {
    let span = days_between(before.date, after.date);
    if span == 0 {
        return before.number;
    }
    let elapsed = days_between(before.date, target);
    let rise = (after.number - before.number) as f64;
    // Halves round up, also below the first reference.
    (before.number as f64 + rise * elapsed as f64 / span as f64 + 0.5).floor() as i64
}

/// Two-point forecast over references sorted by date with unique dates.
///
/// Between references the closest pair around `target` is interpolated; outside
/// them the first or last pair is extrapolated. A lone reference is returned as is.
pub fn two_point_forecast(target: NaiveDate, sorted: &[Reference]) -> Result<i64> {
    match sorted {
        [] => Err(ReceiptSearchError::EmptyReferences),
        [only] => Ok(only.number),
        _ => {
            let split = sorted.partition_point(|r| r.date <= target);
            let (before, after) = if split == 0 {
                (&sorted[0], &sorted[1])
            } else if split == sorted.len() {
                (&sorted[split - 2], &sorted[split - 1])
            } else {
                (&sorted[split - 1], &sorted[split])
            };
            Ok(interpolate(target, before, after))
        }
    }
}

/// Predicts receipt numbers for arbitrary dates.
///
/// One instance serves one search request: it owns the jitter RNG, while the
/// reference points live in the request's [`ReferenceStore`].
pub struct Forecaster {
    reference_meter_id: i64,
    monthly_increment: i64,
    jitter: ExtrapolationJitter,
    rng: StdRng,
}

impl Forecaster {
    pub fn new(config: &ReceiptFinderConfig) -> Self {
        let rng = match &config.extrapolation_jitter {
            ExtrapolationJitter::Uniform {
                seed: Some(seed), ..
            } => StdRng::seed_from_u64(*seed),
            _ => StdRng::from_entropy(),
        };
        Self {
            reference_meter_id: config.reference_meter_id,
            monthly_increment: config.monthly_increment,
            jitter: config.extrapolation_jitter.clone(),
            rng,
        }
    }

    /// Offset between the reference meter's receipt stream and `meter_id`'s,
    /// clamped to one monthly increment either way.
    pub fn meter_offset(&self, meter_id: Option<i64>) -> i64 {
        match meter_id {
            Some(meter) => (self.reference_meter_id - meter)
                .clamp(-self.monthly_increment, self.monthly_increment),
            None => 0,
        }
    }

    /// Receipt number expected on `target`.
    ///
    /// Generic references are first moved down by `calibration_offset`. When the
    /// store holds priority references, the generic set is then shifted again so
    /// that it passes through the priority reference closest to `target`; this
    /// supersedes the meter offset. Priority references replace generic ones on
    /// the same date before the final two-point forecast.
    pub fn forecast(
        &mut self,
        target: NaiveDate,
        store: &ReferenceStore,
        calibration_offset: i64,
    ) -> Result<i64> {
        if store.is_empty() {
            return Err(ReceiptSearchError::EmptyReferences);
        }

        let mut shift = -calibration_offset;
        if let Some(anchor) = store.closest_priority(target) {
            if !store.generic().is_empty() {
                let generic_guess = two_point_forecast(anchor.date, store.generic())? + shift;
                let delta = anchor.number - generic_guess;
                debug!(
                    "Calibrating on {} (confirmed {}, generic {}, delta {})",
                    anchor.date, anchor.number, generic_guess, delta
                );
                shift += delta;
            }
        }

        let merged = store.merged(shift);
        let value = two_point_forecast(target, &merged)?;
        Ok(value + self.extrapolation_noise(target, &merged))
    }

    fn extrapolation_noise(&mut self, target: NaiveDate, merged: &[Reference]) -> i64 {
        let max_spread = match self.jitter {
            ExtrapolationJitter::Uniform { max_spread, .. } => max_spread,
            ExtrapolationJitter::None => return 0,
        };
        let (Some(first), Some(last)) = (merged.first(), merged.last()) else {
            return 0;
        };
        let days_from_edge = if target < first.date {
            days_between(target, first.date)
        } else if target > last.date {
            days_between(last.date, target)
        } else {
            0
        };
        let spread = days_from_edge.min(max_spread);
        if spread <= 0 {
            return 0;
        }
        Uniform::new_inclusive(-spread, spread).sample(&mut self.rng)
    }
}
