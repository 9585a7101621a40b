use shared::{
    domain::UserId,
    protocol::{Action, CraneLimits, CraneState},
};

/// Local view model of one crane session. Owned exclusively by the reducer:
/// the only legal way to change it is applying an [`Action`].
#[derive(Debug, Clone, PartialEq)]
pub struct SceneState {
    pub connected: bool,
    pub crane: CraneState,
    pub users: Vec<UserId>,
    pub debug_mode: bool,
    /// Static travel ranges used to normalize incoming poses; loaded once
    /// with the crane details, never updated by actions.
    pub limits: CraneLimits,
}

impl SceneState {
    /// `connected` starts out true so the first rendered frame does not flash
    /// a reconnect indicator before the session has had a chance to open.
    pub fn new(crane: CraneState, limits: CraneLimits) -> Self {
        Self {
            connected: true,
            crane: normalize(crane, &limits),
            users: Vec::new(),
            debug_mode: false,
            limits,
        }
    }
}

impl Default for SceneState {
    fn default() -> Self {
        Self::new(CraneState::default(), CraneLimits::default())
    }
}

/// Folds one action into the view model. Pure and total: every variant maps
/// to a new state, and anything the local view does not interpret leaves the
/// state unchanged rather than failing.
pub fn reduce(state: &SceneState, action: &Action) -> SceneState {
    match action {
        Action::Connect(connected) => SceneState {
            connected: *connected,
            ..state.clone()
        },
        Action::Join(user) => {
            if state.users.contains(user) {
                return state.clone();
            }
            let mut next = state.clone();
            next.users.push(*user);
            next
        }
        Action::Leave(user) => {
            let mut next = state.clone();
            next.users.retain(|present| present != user);
            next
        }
        // Last-writer-wins replacement. Smoothing between poses belongs to
        // the renderer, not here.
        Action::Update(crane) => SceneState {
            crane: normalize(*crane, &state.limits),
            ..state.clone()
        },
        Action::DebugMode(enabled) => SceneState {
            debug_mode: *enabled,
            ..state.clone()
        },
        // Held intents and move targets are resolved by the authority; the
        // local view only changes when the resulting `update` arrives.
        Action::Command(_) | Action::Move(_) => state.clone(),
    }
}

pub(crate) fn normalize(mut crane: CraneState, limits: &CraneLimits) -> CraneState {
    crane.swing_deg = wrap_degrees(crane.swing_deg);
    crane.elbow_deg = wrap_degrees(crane.elbow_deg);
    crane.wrist_deg = wrap_degrees(crane.wrist_deg);
    crane.lift_mm = crane.lift_mm.clamp(limits.lift_min, limits.lift_max);
    crane.gripper_mm = crane.gripper_mm.clamp(limits.gripper_min, limits.gripper_max);
    crane
}

fn wrap_degrees(deg: f64) -> f64 {
    deg.rem_euclid(360.0)
}

#[cfg(test)]
#[path = "tests/reducer_tests.rs"]
mod tests;
