use serde::{Deserialize, Serialize};

use crate::domain::{CraneId, UserId};

/// Discrete held intents an operator can express. Serialized by variant name
/// so the wire carries `"LiftUp"`, `"SwingLeft"`, etc. The `Ord` derive gives
/// the aggregator a stable enumeration order for deterministic payloads.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Command {
    LiftUp,
    LiftDown,
    SwingLeft,
    SwingRight,
    ElbowLeft,
    ElbowRight,
    WristLeft,
    WristRight,
    GripperOpen,
    GripperClose,
}

/// Pose of the crane at an instant. Degrees are kept in `[0, 360)`;
/// millimeter axes stay within the travel ranges of [`CraneLimits`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CraneState {
    pub swing_deg: f64,
    pub lift_mm: f64,
    pub elbow_deg: f64,
    pub wrist_deg: f64,
    pub gripper_mm: f64,
}

impl Default for CraneState {
    fn default() -> Self {
        Self {
            swing_deg: 0.0,
            lift_mm: 0.0,
            elbow_deg: 0.0,
            wrist_deg: 0.0,
            gripper_mm: 0.0,
        }
    }
}

/// Static geometry of one crane, in meters. Consumed by the rendering
/// collaborator only; never changes during a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CraneDimensions {
    pub base_height: f64,
    pub base_radius_top: f64,
    pub base_radius_bottom: f64,

    pub column_height: f64,
    pub column_width: f64,
    pub column_thickness: f64,

    pub upper_arm_length: f64,
    pub upper_arm_width: f64,
    pub upper_arm_thickness: f64,

    pub lower_arm_length: f64,
    pub lower_arm_width: f64,
    pub lower_arm_thickness: f64,

    pub swing_joint_radius: f64,
    pub swing_joint_height: f64,
    pub lift_joint_radius: f64,
    pub lift_joint_height: f64,
    pub elbow_joint_radius: f64,
    pub elbow_joint_height: f64,
    pub wrist_joint_radius: f64,
    pub wrist_joint_height: f64,

    pub gripper_length: f64,
    pub gripper_width: f64,
    pub gripper_thickness: f64,
    pub gripper_max_open: f64,
    pub wrist_extension_length: f64,
}

impl Default for CraneDimensions {
    fn default() -> Self {
        Self {
            base_height: 0.1,
            base_radius_top: 0.25,
            base_radius_bottom: 0.35,

            column_height: 2.0,
            column_width: 0.18,
            column_thickness: 0.04,

            upper_arm_length: 0.75,
            upper_arm_width: 0.18,
            upper_arm_thickness: 0.04,

            lower_arm_length: 0.5,
            lower_arm_width: 0.12,
            lower_arm_thickness: 0.03,

            swing_joint_radius: 0.13,
            swing_joint_height: 0.1,
            lift_joint_radius: 0.1,
            lift_joint_height: 0.12,
            elbow_joint_radius: 0.09,
            elbow_joint_height: 0.08,
            wrist_joint_radius: 0.07,
            wrist_joint_height: 0.02,

            gripper_length: 0.15,
            gripper_width: 0.08,
            gripper_thickness: 0.05,
            gripper_max_open: 0.1,
            wrist_extension_length: 0.15,
        }
    }
}

/// Mechanical travel ranges per joint. Degrees for the rotary joints,
/// millimeters for lift and gripper.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CraneLimits {
    pub swing_min: f64,
    pub swing_max: f64,
    pub lift_min: f64,
    pub lift_max: f64,
    pub elbow_min: f64,
    pub elbow_max: f64,
    pub wrist_min: f64,
    pub wrist_max: f64,
    pub gripper_min: f64,
    pub gripper_max: f64,
}

impl Default for CraneLimits {
    fn default() -> Self {
        Self {
            swing_min: 0.0,
            swing_max: 360.0,
            lift_min: 0.0,
            lift_max: 2000.0,
            elbow_min: -90.0,
            elbow_max: 90.0,
            wrist_min: -90.0,
            wrist_max: 90.0,
            gripper_min: 0.0,
            gripper_max: 100.0,
        }
    }
}

/// Everything a client needs to render and control one crane, returned by
/// `GET /v1/robot/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CraneDetails {
    pub id: CraneId,
    pub state: CraneState,
    pub dimensions: CraneDimensions,
    pub limits: CraneLimits,
}

/// Absolute target for the gripper tip, in millimeters, in the crane's base
/// frame (x/y horizontal, z vertical).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoveTarget {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// The closed set of messages exchanged over a crane session, one JSON object
/// per frame: `{"type": <tag>, "payload": <payload>}`.
///
/// `connect` and `debug-mode` are local-only: the connection layer dispatches
/// them into the reducer and never puts them on the wire, and an authority
/// must not send them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum Action {
    /// Transport liveness, local-only.
    Connect(bool),
    /// Presence add, authority to client.
    Join(UserId),
    /// Presence remove, authority to client.
    Leave(UserId),
    /// The full set of currently held intents, client to authority. An empty
    /// set means all intents have been released.
    Command(Vec<Command>),
    /// Absolute target request, client to authority.
    Move(MoveTarget),
    /// Authoritative pose replacement, authority to client.
    Update(CraneState),
    /// Local UI flag, local-only, never synchronized.
    DebugMode(bool),
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
