// src/nav/mod.rs - Navigation autopilot orchestration
pub mod avoidance;
pub mod course;
pub mod state;

pub use avoidance::{AvoidanceController, AvoidanceOutcome, Maneuver};
pub use course::CourseController;
pub use state::{NavState, ObjectKinematics, RcsRecord};

use crate::config::NavConfig;
use crate::geometry::{RayBox, NUM_AXES};
use crate::transport::{QueryLink, TransportError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NavError {
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
    #[error("session cancelled")]
    Cancelled,
    #[error("avoidance re-test cap reached after {0} passes")]
    RetestExhausted(u32),
    #[error("bearing alignment cap reached after {0} passes")]
    AlignmentExhausted(u32),
}

/// Cooperative cancellation flag, checked at the top of the outer loop and
/// of every inner control loop. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<(), NavError> {
        if self.is_cancelled() {
            Err(NavError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// One navigation session: steers the vessel to the destination fix while
/// avoiding whatever the host reports in range. Create one per session and
/// drop it when the session ends; it owns all session state.
pub struct Autopilot<L: QueryLink> {
    state: NavState<L>,
    avoidance: AvoidanceController,
    course: CourseController,
    destination_object: u32,
    arrival_tolerance: f64,
    cancel: CancelFlag,
}

impl<L: QueryLink> Autopilot<L> {
    pub fn new(link: L, config: &NavConfig, cancel: CancelFlag) -> Self {
        Self {
            state: NavState::new(link),
            avoidance: AvoidanceController::new(config),
            course: CourseController::new(config),
            destination_object: config.destination_object,
            arrival_tolerance: config.arrival_tolerance,
            cancel,
        }
    }

    /// Hand the link back for the next session.
    pub fn into_link(self) -> L {
        self.state.into_link()
    }

    pub fn state(&self) -> &NavState<L> {
        &self.state
    }

    /// Run the session to arrival. On any failure the vessel is left in a
    /// safe hold (thrust and attitude rates zeroed, best effort) before the
    /// error is surfaced.
    pub async fn run(&mut self) -> Result<(), NavError> {
        match self.navigate().await {
            Ok(()) => Ok(()),
            Err(error) => {
                self.safe_hold().await;
                Err(error)
            }
        }
    }

    async fn navigate(&mut self) -> Result<(), NavError> {
        self.init_session().await?;
        self.state.refresh_vessel_position().await?;
        self.state.engage_main_thrust(1.0).await?;

        while !self.arrived() {
            self.cancel.check()?;
            self.scan_objects().await?;
            // hold attitude work and thrust apart
            self.state.stop_thrust().await?;
            if let Some(angle) = self.state.relative_heading_angle().await? {
                tracing::debug!(angle, "heading offset from destination");
            }
            self.course.align(&mut self.state, &self.cancel).await?;
        }
        tracing::info!("destination reached");
        Ok(())
    }

    /// Zero the session kinematics and take the destination fix.
    async fn init_session(&mut self) -> Result<(), NavError> {
        self.state.vessel = ObjectKinematics::default();
        self.state.dest = ObjectKinematics::default();
        let fix = self.state.object_position(self.destination_object).await?;
        self.state.set_destination(fix);
        tracing::info!(x = fix.x, y = fix.y, z = fix.z, "destination fix acquired");
        Ok(())
    }

    /// Inside the arrival box on every axis.
    fn arrived(&self) -> bool {
        let position = self.state.vessel.current_position;
        let destination = self.state.dest.current_position;
        (0..NUM_AXES).all(|axis| (position[axis] - destination[axis]).abs() < self.arrival_tolerance)
    }

    /// Ray-test every object the host reports and hand intersections to the
    /// avoidance controller. The vessel itself is skipped before any
    /// intersection test can run against it.
    async fn scan_objects(&mut self) -> Result<(), NavError> {
        let count = self.state.object_count().await?;
        tracing::debug!(count, "objects in range");
        for index in 0..count {
            self.cancel.check()?;
            if self.state.is_vessel(index).await? {
                tracing::trace!(index, "skipping the vessel itself");
                continue;
            }
            let obstacle_centre = self.state.object_position(index).await?;
            let obstacle_radius = self.state.object_size(index).await?;
            let ray = self.state.travel_ray().await?;
            let mut check = RayBox::new(obstacle_centre, obstacle_radius);
            if check.intersect(&ray) {
                tracing::warn!(index, "collision course detected");
                self.avoidance
                    .handle(
                        &mut self.state,
                        &check,
                        obstacle_centre,
                        obstacle_radius,
                        &self.cancel,
                    )
                    .await?;
            }
        }
        Ok(())
    }

    /// Best-effort safe default: stop thrusting and hold attitude.
    async fn safe_hold(&mut self) {
        tracing::warn!("entering safe hold");
        if let Err(error) = self.state.stop_thrust().await {
            tracing::error!(%error, "safe hold: stop thrust failed");
            return;
        }
        for result in [
            self.state.set_pitch_rate(0.0).await,
            self.state.set_bank_rate(0.0).await,
            self.state.set_yaw_rate(0.0).await,
        ] {
            if let Err(error) = result {
                tracing::error!(%error, "safe hold: rate zeroing failed");
            }
        }
    }
}
