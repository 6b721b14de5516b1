// src/nav/avoidance.rs - Escape maneuver selection and confirmation
//
// Entered only after a positive intersection. Picks an escape maneuver from
// the dominant separation axis, then keeps re-testing the travel ray against
// the same obstacle until the path is clear, reversing the maneuver if the
// vessel is closing on the impact point instead of pulling away.
use super::state::NavState;
use super::{CancelFlag, NavError};
use crate::geometry::{RayBox, Vector3, NUM_AXES};
use crate::transport::QueryLink;

/// Which escape maneuver is currently applied for the active obstacle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Maneuver {
    Pitch,
    Roll,
}

/// How one collision-handling pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvoidanceOutcome {
    /// The travel ray no longer intersects the obstacle.
    Cleared,
    /// The collision reading was implausible and was ignored.
    DegenerateReading,
}

/// Axis with the greatest absolute separation. Strict greater-than keeps the
/// lowest index on ties.
pub(crate) fn dominant_axis(separation: Vector3) -> usize {
    let mut dominant = 0;
    for axis in 1..NUM_AXES {
        if separation[axis].abs() > separation[dominant].abs() {
            dominant = axis;
        }
    }
    dominant
}

pub struct AvoidanceController {
    offset: f64,
    distance_sentinel: f64,
    max_retest_passes: u32,
    applied: Option<Maneuver>,
}

impl AvoidanceController {
    pub fn new(config: &crate::config::NavConfig) -> Self {
        Self {
            offset: config.avoidance_offset,
            distance_sentinel: config.distance_sentinel,
            max_retest_passes: config.max_retest_passes,
            applied: None,
        }
    }

    pub fn applied(&self) -> Option<Maneuver> {
        self.applied
    }

    /// Steer away from an obstacle the travel ray currently intersects and
    /// keep re-sampling until the path is clear. `collision` must be the
    /// intersector that just reported the hit.
    pub async fn handle<L: QueryLink>(
        &mut self,
        state: &mut NavState<L>,
        collision: &RayBox,
        obstacle_centre: Vector3,
        obstacle_radius: f64,
        cancel: &CancelFlag,
    ) -> Result<AvoidanceOutcome, NavError> {
        let Some(coord) = collision.collision_coordinate() else {
            // a positive test always caches a coordinate; treat the absence
            // as corrupt obstacle data
            return Ok(AvoidanceOutcome::DegenerateReading);
        };

        let mut prev_distance = (coord - state.vessel.current_position).magnitude();
        tracing::info!(
            x = coord.x,
            y = coord.y,
            z = coord.z,
            distance = prev_distance,
            "collision point on current path"
        );
        if prev_distance > self.distance_sentinel {
            tracing::warn!(distance = prev_distance, "implausible collision distance, ignoring");
            return Ok(AvoidanceOutcome::DegenerateReading);
        }

        let separation = obstacle_centre - state.vessel.current_position;
        match dominant_axis(separation) {
            0 => {
                // widest gap along x: climb away
                state.set_pitch(self.offset).await?;
                self.applied = Some(Maneuver::Pitch);
            }
            1 => {
                // widest gap along y: roll away
                state.set_roll(self.offset).await?;
                self.applied = Some(Maneuver::Roll);
            }
            _ => {
                // z is the depth axis; only a face of the obstacle is ever
                // presented, so no lateral escape is required
                self.applied = None;
            }
        }

        let mut passes = 0u32;
        loop {
            cancel.check()?;
            if passes >= self.max_retest_passes {
                return Err(NavError::RetestExhausted(passes));
            }
            passes += 1;

            let ray = state.travel_ray().await?;
            let mut retest = RayBox::new(obstacle_centre, obstacle_radius);
            if !retest.intersect(&ray) {
                tracing::info!(passes, "collision avoided");
                break;
            }
            let Some(next_coord) = retest.collision_coordinate() else {
                break;
            };
            let next_distance = (next_coord - state.vessel.current_position).magnitude();
            tracing::debug!(prev = prev_distance, next = next_distance, "still on collision course");

            // Closing on the impact point despite the maneuver: undo it
            if next_distance < prev_distance {
                match self.applied.take() {
                    Some(Maneuver::Pitch) => {
                        tracing::info!("losing separation, inverting pitch maneuver");
                        state.set_pitch(-self.offset).await?;
                    }
                    Some(Maneuver::Roll) => {
                        tracing::info!("losing separation, inverting roll maneuver");
                        state.set_roll(-self.offset).await?;
                    }
                    None => {}
                }
            }
            prev_distance = next_distance;
        }

        // hand control back with the escape surfaces zeroed
        state.set_pitch_rate(0.0).await?;
        state.set_bank_rate(0.0).await?;
        self.applied = None;
        Ok(AvoidanceOutcome::Cleared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dominant_axis_tie_keeps_lowest_index() {
        assert_eq!(dominant_axis(Vector3::new(3.0, 3.0, 1.0)), 0);
    }

    #[test]
    fn dominant_axis_uses_absolute_separation() {
        assert_eq!(dominant_axis(Vector3::new(3.0, -4.0, 1.0)), 1);
        assert_eq!(dominant_axis(Vector3::new(0.0, 1.0, -2.0)), 2);
    }
}
