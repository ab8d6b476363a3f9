// src/lib.rs

pub mod control_plane;
pub mod presence;
pub mod verifier;

pub use control_plane::{ControlPlane, ControlPlaneClient};
pub use presence::{find_by_nickname_substring, first_match, PresenceProbe, Ts3PresenceProbe};
pub use sinuscheck_common::error::Error;
pub use verifier::{Stage, StageFailure, VerificationReport, Verifier};
