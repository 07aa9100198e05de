//! Timeline Windower: everything recorded within `range_hours` of a
//! center observation, oldest first. Both bounds are inclusive.

use chrono::{DateTime, TimeDelta, Utc};
use mnemo_core::error::{Error, Result};
use mnemo_core::observation::{Observation, ObservationId};
use serde::{Deserialize, Serialize};

use crate::MemoryEngine;

pub const DEFAULT_RANGE_HOURS: f64 = 2.0;

/// Widest accepted window half-width (ten years).
pub const MAX_RANGE_HOURS: f64 = 87_600.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub center_id: ObservationId,
    pub range_hours: f64,
    pub observations: Vec<Observation>,
}

/// Half-width of the window as a duration.
fn half_width(range_hours: f64) -> Result<TimeDelta> {
    if !range_hours.is_finite() || range_hours < 0.0 {
        return Err(Error::validation(format!(
            "range_hours must be a non-negative number, got {range_hours}"
        )));
    }
    if range_hours > MAX_RANGE_HOURS {
        return Err(Error::validation(format!(
            "range_hours must be at most {MAX_RANGE_HOURS}"
        )));
    }
    let millis = (range_hours * 3_600_000.0).round() as i64;
    TimeDelta::try_milliseconds(millis)
        .ok_or_else(|| Error::validation(format!("range_hours out of range: {range_hours}")))
}

/// The inclusive `[center - range, center + range]` window.
pub fn window(center: DateTime<Utc>, range_hours: f64) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let delta = half_width(range_hours)?;
    let from = center
        .checked_sub_signed(delta)
        .ok_or_else(|| Error::validation("timeline window starts before the representable range"))?;
    let to = center
        .checked_add_signed(delta)
        .ok_or_else(|| Error::validation("timeline window ends after the representable range"))?;
    Ok((from, to))
}

impl MemoryEngine {
    /// The window around `center_id`. An unknown center yields an empty list.
    pub async fn timeline(
        &self,
        center_id: ObservationId,
        range_hours: Option<f64>,
    ) -> Result<Timeline> {
        let range_hours = range_hours.unwrap_or(DEFAULT_RANGE_HOURS);
        half_width(range_hours)?;

        let observations = match self.store.get_observation(center_id).await? {
            Some(center) => {
                let (from, to) = window(center.created_at, range_hours)?;
                self.store.observations_between(from, to).await?
            }
            None => vec![],
        };

        Ok(Timeline {
            center_id,
            range_hours,
            observations,
        })
    }
}
