// src/nav/state.rs - Navigation state and query facade
//
// Every piece of live simulation state the controllers consume goes through
// here: one session object owning the link, the vessel snapshot and the
// destination fix. Each call is one blocking round trip to the host.
use crate::geometry::{angle_from_dot, Ray, Vector3};
use crate::protocol::{Operation, Request};
use crate::transport::{QueryLink, TransportError};

/// Attitude targets are clamped to this band before a delta is computed.
const ATTITUDE_TARGET_LIMIT: f64 = 1.5;
/// Gain from attitude error to commanded rate.
const ATTITUDE_GAIN: f64 = 0.1;
/// Commanded attitude rates never exceed this magnitude.
const ATTITUDE_RATE_LIMIT: f64 = 0.04;

/// The controlled vessel is always object index 0 on the host.
const VESSEL_INDEX: u32 = 0;

/// Kinematic snapshot of one tracked object (the vessel or the destination).
/// `previous_position` trails `current_position` by exactly one refresh so
/// headings can be taken by finite difference.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectKinematics {
    pub current_position: Vector3,
    pub previous_position: Vector3,
    pub direction: Vector3,
    pub length: f64,
}

/// Last RCS deltas sent to the host, one slot per control axis, retained so
/// an avoidance reversal can invert exactly what was applied.
#[derive(Debug, Clone, Copy, Default)]
pub struct RcsRecord {
    pub bank: f64,
    pub pitch: f64,
    pub yaw: f64,
}

/// Session-scoped navigation state. One instance per active session, owned
/// by the control loop; nothing here is shared.
pub struct NavState<L: QueryLink> {
    link: L,
    pub vessel: ObjectKinematics,
    pub dest: ObjectKinematics,
    last_rcs: RcsRecord,
}

impl<L: QueryLink> NavState<L> {
    pub fn new(link: L) -> Self {
        Self {
            link,
            vessel: ObjectKinematics::default(),
            dest: ObjectKinematics::default(),
            last_rcs: RcsRecord::default(),
        }
    }

    pub fn into_link(self) -> L {
        self.link
    }

    pub fn last_rcs(&self) -> RcsRecord {
        self.last_rcs
    }

    /// Store the destination fix for this session.
    pub fn set_destination(&mut self, position: Vector3) {
        self.dest.current_position = position;
    }

    /// Refresh the vessel position. The previous reading is rolled into
    /// `previous_position` before it is overwritten.
    pub async fn refresh_vessel_position(&mut self) -> Result<Vector3, TransportError> {
        self.vessel.previous_position = self.vessel.current_position;
        self.vessel.current_position = self
            .link
            .vector(Request::indexed(Operation::GetPos, VESSEL_INDEX))
            .await?;
        Ok(self.vessel.current_position)
    }

    /// Refresh the vessel position and rebuild the travel ray from the
    /// displacement since the previous reading.
    pub async fn travel_ray(&mut self) -> Result<Ray, TransportError> {
        self.refresh_vessel_position().await?;
        let direction = self.vessel.current_position - self.vessel.previous_position;
        self.vessel.direction = direction;
        Ok(Ray {
            origin: self.vessel.current_position,
            direction,
        })
    }

    pub async fn object_position(&mut self, index: u32) -> Result<Vector3, TransportError> {
        self.link
            .vector(Request::indexed(Operation::GetPos, index))
            .await
    }

    pub async fn object_count(&mut self) -> Result<u32, TransportError> {
        let count = self.link.scalar(Request::plain(Operation::GetObjCount)).await?;
        Ok(count.max(0.0) as u32)
    }

    pub async fn is_vessel(&mut self, index: u32) -> Result<bool, TransportError> {
        let flag = self
            .link
            .scalar(Request::indexed(Operation::IsVessel, index))
            .await?;
        Ok(flag == 1.0)
    }

    pub async fn object_size(&mut self, index: u32) -> Result<f64, TransportError> {
        self.link
            .scalar(Request::indexed(Operation::GetSize, index))
            .await
    }

    pub async fn angular_velocity(&mut self) -> Result<Vector3, TransportError> {
        self.link.vector(Request::plain(Operation::GetAngVel)).await
    }

    pub async fn pitch(&mut self) -> Result<f64, TransportError> {
        self.link.scalar(Request::plain(Operation::GetPitch)).await
    }

    pub async fn bank(&mut self) -> Result<f64, TransportError> {
        self.link.scalar(Request::plain(Operation::GetBank)).await
    }

    pub async fn yaw(&mut self) -> Result<f64, TransportError> {
        self.link.scalar(Request::plain(Operation::GetYaw)).await
    }

    /// Command a pitch rate. The host takes a delta against the current
    /// angular velocity, so the rotation is only ever driven from one side.
    pub async fn set_pitch_rate(&mut self, value: f64) -> Result<(), TransportError> {
        let rot = self.angular_velocity().await?;
        let delta = value - rot.x;
        self.link
            .scalar(Request::valued(Operation::SetPitch, delta))
            .await?;
        self.last_rcs.pitch = delta;
        Ok(())
    }

    pub async fn set_bank_rate(&mut self, value: f64) -> Result<(), TransportError> {
        let rot = self.angular_velocity().await?;
        let delta = value - rot.z;
        self.link
            .scalar(Request::valued(Operation::SetBank, delta))
            .await?;
        self.last_rcs.bank = delta;
        Ok(())
    }

    /// Yaw angular velocity is reported with the opposite sign convention.
    pub async fn set_yaw_rate(&mut self, value: f64) -> Result<(), TransportError> {
        let rot = self.angular_velocity().await?;
        let delta = value - (-rot.y);
        self.link
            .scalar(Request::valued(Operation::SetYaw, delta))
            .await?;
        self.last_rcs.yaw = delta;
        Ok(())
    }

    /// Steer the pitch attitude toward a target angle with a rate-limited
    /// proportional command.
    pub async fn set_pitch(&mut self, pitch: f64) -> Result<(), TransportError> {
        let target = pitch.clamp(-ATTITUDE_TARGET_LIMIT, ATTITUDE_TARGET_LIMIT);
        let current = self.pitch().await?;
        let rate = ((current - target) * ATTITUDE_GAIN).clamp(-ATTITUDE_RATE_LIMIT, ATTITUDE_RATE_LIMIT);
        self.set_pitch_rate(-rate).await
    }

    /// Steer the bank attitude toward a roll target. Roll is commanded
    /// opposite to the reported bank angle.
    pub async fn set_roll(&mut self, roll: f64) -> Result<(), TransportError> {
        let target = -roll;
        let current = self.bank().await?;
        let rate = ((current - target) * ATTITUDE_GAIN).clamp(-ATTITUDE_RATE_LIMIT, ATTITUDE_RATE_LIMIT);
        self.set_bank_rate(rate).await
    }

    pub async fn set_yaw(&mut self, yaw: f64) -> Result<(), TransportError> {
        let target = yaw.clamp(-ATTITUDE_TARGET_LIMIT, ATTITUDE_TARGET_LIMIT);
        let current = self.yaw().await?;
        let rate = ((current - target) * ATTITUDE_GAIN).clamp(-ATTITUDE_RATE_LIMIT, ATTITUDE_RATE_LIMIT);
        self.set_yaw_rate(rate).await
    }

    /// Engage the main thrusters at the given level.
    pub async fn engage_main_thrust(&mut self, level: f64) -> Result<(), TransportError> {
        self.link
            .scalar(Request::valued(Operation::SetThrust, level))
            .await?;
        Ok(())
    }

    /// Authoritative stop for all thruster groups.
    pub async fn stop_thrust(&mut self) -> Result<(), TransportError> {
        self.link.scalar(Request::plain(Operation::StopThrust)).await?;
        Ok(())
    }

    /// Heading vector from the vessel to the destination fix.
    pub async fn heading_to_destination(&mut self) -> Result<Vector3, TransportError> {
        let position = self.refresh_vessel_position().await?;
        Ok(self.dest.current_position - position)
    }

    /// Current heading by finite difference of consecutive position fixes.
    pub async fn current_heading(&mut self) -> Result<Vector3, TransportError> {
        self.refresh_vessel_position().await?;
        Ok(self.vessel.current_position - self.vessel.previous_position)
    }

    /// Angle between the vessel's current heading and the destination
    /// direction, or `None` while either vector is degenerate (for example
    /// before the vessel has moved between fixes).
    pub async fn relative_heading_angle(&mut self) -> Result<Option<f64>, TransportError> {
        let to_dest = self.heading_to_destination().await?.normalized();
        let heading = self.current_heading().await?.normalized();
        Ok(match (to_dest, heading) {
            (Some(a), Some(b)) => Some(angle_from_dot(a.dot(&b))),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;

    /// Scripted link: answers vector queries from a queue, logs every
    /// scalar-producing request.
    #[derive(Default)]
    struct ScriptedLink {
        positions: VecDeque<Vector3>,
        angular_velocity: Vector3,
        pitch: f64,
        commands: Vec<(String, f64)>,
    }

    #[async_trait]
    impl QueryLink for ScriptedLink {
        async fn scalar(&mut self, request: Request) -> Result<f64, TransportError> {
            let value = request.detail_value();
            match request.operation.as_str() {
                "GET_PITCH" => return Ok(self.pitch),
                "GET_BANK" | "GET_YAW" => return Ok(0.0),
                _ => self.commands.push((request.operation.clone(), value)),
            }
            Ok(1.0)
        }

        async fn vector(&mut self, request: Request) -> Result<Vector3, TransportError> {
            match request.operation.as_str() {
                "GET_ANG_VEL" => Ok(self.angular_velocity),
                _ => Ok(self.positions.pop_front().unwrap_or_default()),
            }
        }
    }

    #[tokio::test]
    async fn refresh_rolls_previous_position() {
        let link = ScriptedLink {
            positions: VecDeque::from([Vector3::new(1.0, 0.0, 0.0), Vector3::new(2.0, 0.0, 0.0)]),
            ..Default::default()
        };
        let mut state = NavState::new(link);
        state.refresh_vessel_position().await.unwrap();
        state.refresh_vessel_position().await.unwrap();
        assert_eq!(state.vessel.previous_position, Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(state.vessel.current_position, Vector3::new(2.0, 0.0, 0.0));
    }

    #[tokio::test]
    async fn rate_commands_send_delta_against_angular_velocity() {
        let link = ScriptedLink {
            angular_velocity: Vector3::new(0.01, 0.02, 0.03),
            ..Default::default()
        };
        let mut state = NavState::new(link);
        state.set_pitch_rate(0.05).await.unwrap();
        state.set_yaw_rate(0.05).await.unwrap();
        state.set_bank_rate(0.05).await.unwrap();

        let commands = &state.link.commands;
        assert_eq!(commands[0].0, "SET_PITCH");
        assert!((commands[0].1 - 0.04).abs() < 1e-12);
        // yaw velocity is sign-flipped by the host convention
        assert_eq!(commands[1].0, "SET_YAW");
        assert!((commands[1].1 - 0.07).abs() < 1e-12);
        assert_eq!(commands[2].0, "SET_BANK");
        assert!((commands[2].1 - 0.02).abs() < 1e-12);
        assert!((state.last_rcs().pitch - 0.04).abs() < 1e-12);
    }

    #[tokio::test]
    async fn attitude_offset_is_rate_limited() {
        // Large error: (0 - 1.5) * 0.1 = -0.15, clamped to -0.04, negated
        let link = ScriptedLink::default();
        let mut state = NavState::new(link);
        state.set_pitch(3.0).await.unwrap();
        let (operation, delta) = state.link.commands.last().unwrap().clone();
        assert_eq!(operation, "SET_PITCH");
        assert!((delta - 0.04).abs() < 1e-12);

        // yaw target commands are rate-limited the same way, without the
        // pitch negation
        state.set_yaw(0.5).await.unwrap();
        let (operation, delta) = state.link.commands.last().unwrap().clone();
        assert_eq!(operation, "SET_YAW");
        assert!((delta + 0.04).abs() < 1e-12);
    }
}
