// src/sim/mod.rs - Deterministic host stub for the harness binary and tests
//
// Answers the full query/command protocol from a scripted world: an object
// table, first-order attitude bookkeeping and a constant-velocity vessel.
// This is not a physics simulation (the real host owns that); it is just
// enough of one to drive the client end to end.
use crate::geometry::Vector3;
use crate::protocol::Request;
use crate::transport::MAX_DATAGRAM;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tokio::time::Duration;

/// One simulated object visible to the autopilot. Index 0 is the vessel.
#[derive(Debug, Clone)]
pub struct SimObject {
    pub position: Vector3,
    pub radius: f64,
    pub is_vessel: bool,
}

/// Reply to one request: a single scalar datagram or three in sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reply {
    Scalar(f64),
    Vector(Vector3),
}

/// Scripted host-side world.
#[derive(Debug, Clone)]
pub struct HostModel {
    pub objects: Vec<SimObject>,
    /// Vessel displacement applied on every position query while thrusting.
    pub velocity: Vector3,
    pub angular_velocity: Vector3,
    pub pitch: f64,
    pub bank: f64,
    pub yaw: f64,
    pub thrust: f64,
}

impl HostModel {
    pub fn new(objects: Vec<SimObject>) -> Self {
        Self {
            objects,
            velocity: Vector3::zero(),
            angular_velocity: Vector3::zero(),
            pitch: 0.0,
            bank: 0.0,
            yaw: 0.0,
            thrust: 0.0,
        }
    }

    /// Answer one request, mutating the world where the operation demands
    /// it. Unknown operations yield no reply, like a host that ignores them.
    pub fn answer(&mut self, request: &Request) -> Option<Reply> {
        let detail = request.detail_value();
        let index = detail.max(0.0) as usize;
        match request.operation.as_str() {
            "GET_POS" => {
                if index == 0 && self.thrust > 0.0 {
                    let velocity = self.velocity;
                    if let Some(vessel) = self.objects.first_mut() {
                        vessel.position = vessel.position + velocity;
                    }
                }
                Some(Reply::Vector(self.objects.get(index)?.position))
            }
            "GET_OBJ_COUNT" => Some(Reply::Scalar(self.objects.len() as f64)),
            "IS_VESSEL" => {
                let flag = self.objects.get(index)?.is_vessel;
                Some(Reply::Scalar(if flag { 1.0 } else { 0.0 }))
            }
            "GET_SIZE" => Some(Reply::Scalar(self.objects.get(index)?.radius)),
            "GET_ANG_VEL" => Some(Reply::Vector(self.angular_velocity)),
            "GET_PITCH" => Some(Reply::Scalar(self.pitch)),
            "GET_BANK" => Some(Reply::Scalar(self.bank)),
            "GET_YAW" => Some(Reply::Scalar(self.yaw)),
            "SET_PITCH" => {
                self.angular_velocity.x += detail;
                self.pitch += detail;
                Some(Reply::Scalar(1.0))
            }
            "SET_BANK" => {
                self.angular_velocity.z += detail;
                self.bank += detail;
                Some(Reply::Scalar(1.0))
            }
            "SET_YAW" => {
                self.angular_velocity.y -= detail;
                self.yaw += detail;
                Some(Reply::Scalar(1.0))
            }
            "SET_THRUST" => {
                self.thrust = detail;
                Some(Reply::Scalar(1.0))
            }
            "STOP_THRUST" => {
                self.angular_velocity = Vector3::zero();
                Some(Reply::Scalar(1.0))
            }
            _ => None,
        }
    }
}

/// Serve the protocol on a socket until the task is dropped. Each reply is
/// sent back to the requesting address; vector replies go out as three
/// datagrams in x, y, z order. `jitter` delays each reply by a random slice
/// of the given window, to exercise the client's timeout handling.
pub async fn serve(
    socket: UdpSocket,
    mut model: HostModel,
    jitter: Option<Duration>,
) -> Result<(), std::io::Error> {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        let (len, addr) = socket.recv_from(&mut buf).await?;
        let request: Request = match serde_json::from_slice(&buf[..len]) {
            Ok(request) => request,
            Err(error) => {
                tracing::debug!(%error, "ignoring undecodable datagram");
                continue;
            }
        };
        if let Some(window) = jitter {
            let slice = window.mul_f64(rand::random::<f64>());
            tokio::time::sleep(slice).await;
        }
        match model.answer(&request) {
            Some(Reply::Scalar(value)) => {
                send_scalar(&socket, addr, value).await?;
            }
            Some(Reply::Vector(vector)) => {
                send_scalar(&socket, addr, vector.x).await?;
                send_scalar(&socket, addr, vector.y).await?;
                send_scalar(&socket, addr, vector.z).await?;
            }
            None => {
                tracing::warn!(operation = %request.operation, "unknown operation, no reply");
            }
        }
    }
}

async fn send_scalar(
    socket: &UdpSocket,
    addr: SocketAddr,
    value: f64,
) -> Result<(), std::io::Error> {
    socket.send_to(format!("{value}").as_bytes(), addr).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Operation;

    fn demo_model() -> HostModel {
        HostModel::new(vec![
            SimObject {
                position: Vector3::zero(),
                radius: 1.0,
                is_vessel: true,
            },
            SimObject {
                position: Vector3::new(50.0, 0.0, 0.0),
                radius: 5.0,
                is_vessel: false,
            },
        ])
    }

    #[test]
    fn answers_object_queries() {
        let mut model = demo_model();
        assert_eq!(
            model.answer(&Request::plain(Operation::GetObjCount)),
            Some(Reply::Scalar(2.0))
        );
        assert_eq!(
            model.answer(&Request::indexed(Operation::IsVessel, 0)),
            Some(Reply::Scalar(1.0))
        );
        assert_eq!(
            model.answer(&Request::indexed(Operation::GetSize, 1)),
            Some(Reply::Scalar(5.0))
        );
    }

    #[test]
    fn vessel_advances_only_while_thrusting() {
        let mut model = demo_model();
        model.velocity = Vector3::new(1.0, 0.0, 0.0);
        model.answer(&Request::indexed(Operation::GetPos, 0));
        assert_eq!(model.objects[0].position, Vector3::zero());

        model.answer(&Request::valued(Operation::SetThrust, 1.0));
        model.answer(&Request::indexed(Operation::GetPos, 0));
        assert_eq!(model.objects[0].position, Vector3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn rate_commands_integrate_into_attitude_state() {
        let mut model = demo_model();
        model.answer(&Request::valued(Operation::SetPitch, 0.04));
        assert_eq!(model.angular_velocity.x, 0.04);
        assert_eq!(model.pitch, 0.04);

        model.answer(&Request::plain(Operation::StopThrust));
        assert_eq!(model.angular_velocity, Vector3::zero());
    }

    #[test]
    fn unknown_operation_gets_no_reply() {
        let mut model = demo_model();
        let request = Request {
            operation: "GET_AIRSPEED".to_string(),
            detail: serde_json::Number::from(0),
        };
        assert_eq!(model.answer(&request), None);
    }
}
