// src/nav/course.rs - Bearing alignment and fine-trim hold
//
// Two bearing components are derived from each position vector and nulled
// against the destination's independently: the first with yaw commands, the
// second with pitch. Both alignment passes are bang-bang loops. Once both
// errors are inside tolerance the controller latches on-course and only the
// small-signal trim loop runs, damping residual rotation with angular
// velocity feedback until the errors drift back out.
use super::state::NavState;
use super::{CancelFlag, NavError};
use crate::config::NavConfig;
use crate::geometry::Vector3;
use crate::transport::QueryLink;
use tokio::time::{sleep, Duration};

/// Bearing pair of one position vector. The two components deliberately use
/// the same x/y pair in swapped argument order: they are two independent
/// error signals in two angular planes, compared only against values derived
/// the same way, never against a conventional azimuth.
pub(crate) fn bearing_angles(position: Vector3) -> (f64, f64) {
    (position.y.atan2(position.x), position.x.atan2(position.y))
}

/// Bang-bang engage/flip bookkeeping: a fixed-magnitude command is issued
/// when the loop first engages and again whenever the error changes side.
#[derive(Debug, Default)]
pub(crate) struct BangBang {
    engaged: bool,
    // 1 = negative command active, 2 = positive command active
    polarity: u8,
}

impl BangBang {
    /// Next command for the given error, or `None` to hold the current one.
    pub(crate) fn command(&mut self, error: f64, rate: f64) -> Option<f64> {
        if error > 0.0 && !self.engaged {
            self.engaged = true;
            self.polarity = 1;
            Some(-rate)
        } else if error < 0.0 && self.polarity == 1 {
            self.polarity = 2;
            Some(rate)
        } else if error < 0.0 && !self.engaged {
            self.engaged = true;
            self.polarity = 2;
            Some(rate)
        } else if error > 0.0 && self.polarity == 2 {
            self.polarity = 1;
            Some(-rate)
        } else {
            None
        }
    }
}

pub struct CourseController {
    tolerance: f64,
    rate: f64,
    max_alignment_passes: u32,
    max_trim_passes: u32,
    command_delay: Duration,
    settle_delay: Duration,
    on_course: bool,
}

impl CourseController {
    pub fn new(config: &NavConfig) -> Self {
        Self {
            tolerance: config.bearing_tolerance,
            rate: config.bearing_rate,
            max_alignment_passes: config.max_alignment_passes,
            max_trim_passes: config.max_trim_passes,
            command_delay: Duration::from_millis(config.trim_command_delay_ms),
            settle_delay: Duration::from_millis(config.trim_settle_delay_ms),
            on_course: false,
        }
    }

    pub fn on_course(&self) -> bool {
        self.on_course
    }

    /// Align the vessel bearing with the destination, then hold. Returns
    /// when the trim stage observes the errors drifting back out of
    /// tolerance (or its pass cap runs out), so the caller re-checks
    /// arrival and re-enters.
    pub async fn align<L: QueryLink>(
        &mut self,
        state: &mut NavState<L>,
        cancel: &CancelFlag,
    ) -> Result<(), NavError> {
        let position = state.refresh_vessel_position().await?;
        let (mut angle_a, mut angle_b) = bearing_angles(position);
        let (dest_a, dest_b) = bearing_angles(state.dest.current_position);
        tracing::debug!(angle_a, angle_b, dest_a, dest_b, "bearing components");

        if !self.on_course {
            // first component, nulled with yaw
            let mut control = BangBang::default();
            let mut passes = 0u32;
            while (angle_a - dest_a).abs() > self.tolerance {
                cancel.check()?;
                if passes >= self.max_alignment_passes {
                    return Err(NavError::AlignmentExhausted(passes));
                }
                passes += 1;
                if let Some(command) = control.command(angle_a - dest_a, self.rate) {
                    state.set_yaw_rate(command).await?;
                }
                // cut thrust so the turn continues unpowered
                state.stop_thrust().await?;
                let position = state.refresh_vessel_position().await?;
                angle_a = bearing_angles(position).0;
                tracing::debug!(error = angle_a - dest_a, "first bearing error");
            }
            tracing::info!("first bearing component aligned");
            state.stop_thrust().await?;

            // second component, nulled with pitch
            let mut control = BangBang::default();
            let mut passes = 0u32;
            while (angle_b - dest_b).abs() > self.tolerance {
                cancel.check()?;
                if passes >= self.max_alignment_passes {
                    return Err(NavError::AlignmentExhausted(passes));
                }
                passes += 1;
                if let Some(command) = control.command(angle_b - dest_b, self.rate) {
                    state.set_pitch_rate(command).await?;
                }
                state.stop_thrust().await?;
                let position = state.refresh_vessel_position().await?;
                angle_b = bearing_angles(position).1;
                tracing::debug!(error = angle_b - dest_b, "second bearing error");
            }
            tracing::info!("second bearing component aligned");
        }

        self.on_course = true;
        state.stop_thrust().await?;

        // fine trim: damp residual rotation while both errors stay inside
        // tolerance, alternating command polarity around short settle waits
        let mut passes = 0u32;
        while (angle_a - dest_a).abs() <= self.tolerance && (angle_b - dest_b).abs() <= self.tolerance
        {
            cancel.check()?;
            if passes >= self.max_trim_passes {
                tracing::debug!(passes, "trim pass cap reached, handing back");
                break;
            }
            passes += 1;
            tracing::debug!("on course, performing minor adjustments");

            let rot = state.angular_velocity().await?;
            state.set_pitch_rate(rot.x).await?;
            sleep(self.command_delay).await;
            state.set_yaw_rate(-rot.y).await?;
            sleep(self.settle_delay).await;
            state.stop_thrust().await?;
            state.set_pitch_rate(rot.x).await?;
            sleep(self.command_delay).await;
            state.set_yaw_rate(rot.y).await?;
            sleep(self.settle_delay).await;

            let position = state.refresh_vessel_position().await?;
            (angle_a, angle_b) = bearing_angles(position);
        }
        Ok(())
    }
}
