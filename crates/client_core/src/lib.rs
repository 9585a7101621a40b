pub mod api;
pub mod connection;
pub mod input;
pub mod reducer;

pub use api::{ApiClientError, RobotApi};
pub use connection::{CraneSession, Updater, MAX_RECONNECT_ATTEMPTS};
pub use input::{Axis, CommandAggregator, CoordinateForm, GripperMode, Key};
pub use reducer::{reduce, SceneState};
