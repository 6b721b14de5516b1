// src/lib.rs - Remote navigation autopilot for a simulated spacecraft
//
// A client process queries a simulator host over a UDP JSON protocol for
// vessel and object state, runs a collision-avoidance and course-correction
// loop, and issues RCS commands back to the host.
pub mod config;
pub mod geometry;
pub mod nav;
pub mod protocol;
pub mod sim;
pub mod transport;

pub use config::{load_config, Config};
pub use nav::{Autopilot, CancelFlag, NavError};
pub use transport::{QueryLink, TransportError, UdpLink};
