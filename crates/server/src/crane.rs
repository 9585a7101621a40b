use std::{
    collections::{BTreeSet, HashMap},
    time::Duration,
};

use shared::{
    domain::{CraneId, UserId},
    protocol::{
        Action, Command, CraneDetails, CraneDimensions, CraneLimits, CraneState, MoveTarget,
    },
};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{info, warn};

/// Joint speeds applied while an intent is held.
const SWING_DEG_PER_SEC: f64 = 45.0;
const LIFT_MM_PER_SEC: f64 = 250.0;
const ELBOW_DEG_PER_SEC: f64 = 45.0;
const WRIST_DEG_PER_SEC: f64 = 60.0;
const GRIPPER_MM_PER_SEC: f64 = 40.0;

pub(crate) const TICK: Duration = Duration::from_millis(50);

const EVENT_CAPACITY: usize = 256;

/// Static profile of one crane: identity, geometry, travel ranges.
#[derive(Debug, Clone)]
pub struct CraneProfile {
    pub id: CraneId,
    pub dimensions: CraneDimensions,
    pub limits: CraneLimits,
}

impl CraneProfile {
    /// Profile handed to crane ids the fleet does not know about.
    pub fn with_defaults(id: CraneId) -> Self {
        Self {
            id,
            dimensions: CraneDimensions::default(),
            limits: CraneLimits::default(),
        }
    }
}

enum Op {
    Join {
        user: UserId,
        replay: oneshot::Sender<Vec<Action>>,
    },
    Leave {
        user: UserId,
    },
    SetIntents {
        user: UserId,
        commands: Vec<Command>,
    },
    MoveTo {
        target: MoveTarget,
    },
    Details {
        reply: oneshot::Sender<CraneDetails>,
    },
}

/// Handle to one crane room. The room task exclusively owns the crane state
/// and the presence roster; everything talks to it through this handle.
#[derive(Clone)]
pub struct CraneHandle {
    ops: mpsc::UnboundedSender<Op>,
    events: broadcast::Sender<Action>,
}

impl CraneHandle {
    pub fn spawn(profile: CraneProfile) -> Self {
        let (ops_tx, ops_rx) = mpsc::unbounded_channel();
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
        tokio::spawn(run(profile, ops_rx, events_tx.clone()));
        Self {
            ops: ops_tx,
            events: events_tx,
        }
    }

    /// Fan-out stream of everything the room broadcasts. Subscribe before
    /// joining so no event between the replay and the live stream is missed.
    pub fn subscribe(&self) -> broadcast::Receiver<Action> {
        self.events.subscribe()
    }

    /// Registers a presence and returns the replay a joining client must see
    /// first: the current roster as `join` actions plus the latest pose.
    pub async fn join(&self, user: UserId) -> Vec<Action> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .ops
            .send(Op::Join {
                user,
                replay: reply_tx,
            })
            .is_err()
        {
            return Vec::new();
        }
        reply_rx.await.unwrap_or_default()
    }

    pub fn leave(&self, user: UserId) {
        let _ = self.ops.send(Op::Leave { user });
    }

    /// Replaces the user's held intents with the given set; an empty set
    /// means every intent has been released.
    pub fn set_intents(&self, user: UserId, commands: Vec<Command>) {
        let _ = self.ops.send(Op::SetIntents { user, commands });
    }

    pub fn move_to(&self, target: MoveTarget) {
        let _ = self.ops.send(Op::MoveTo { target });
    }

    pub async fn details(&self) -> Option<CraneDetails> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.ops.send(Op::Details { reply: reply_tx }).ok()?;
        reply_rx.await.ok()
    }
}

async fn run(
    profile: CraneProfile,
    mut ops: mpsc::UnboundedReceiver<Op>,
    events: broadcast::Sender<Action>,
) {
    let mut state = clamp(CraneState::default(), &profile.limits);
    let mut users: Vec<UserId> = Vec::new();
    let mut intents: HashMap<UserId, BTreeSet<Command>> = HashMap::new();

    let mut ticker = tokio::time::interval(TICK);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            op = ops.recv() => match op {
                None => {
                    info!(id = %profile.id, "crane room shutting down");
                    return;
                }
                Some(Op::Join { user, replay }) => {
                    if !users.contains(&user) {
                        users.push(user);
                    }
                    intents.entry(user).or_default();
                    let _ = events.send(Action::Join(user));
                    let mut history: Vec<Action> =
                        users.iter().map(|present| Action::Join(*present)).collect();
                    history.push(Action::Update(state));
                    let _ = replay.send(history);
                    info!(id = %profile.id, %user, operators = users.len(), "operator joined");
                }
                Some(Op::Leave { user }) => {
                    users.retain(|present| *present != user);
                    intents.remove(&user);
                    let _ = events.send(Action::Leave(user));
                    info!(id = %profile.id, %user, operators = users.len(), "operator left");
                }
                Some(Op::SetIntents { user, commands }) => {
                    intents.insert(user, commands.into_iter().collect());
                }
                Some(Op::MoveTo { target }) => {
                    state = clamp(solve_move(&profile.dimensions, state, target), &profile.limits);
                    if events.send(Action::Update(state)).is_err() {
                        warn!(id = %profile.id, "no subscribers for move update");
                    }
                }
                Some(Op::Details { reply }) => {
                    let _ = reply.send(CraneDetails {
                        id: profile.id.clone(),
                        state,
                        dimensions: profile.dimensions,
                        limits: profile.limits,
                    });
                }
            },
            _ = ticker.tick() => {
                let held: BTreeSet<Command> = intents.values().flatten().copied().collect();
                if held.is_empty() {
                    continue;
                }
                let next = clamp(step(state, &held, TICK.as_secs_f64()), &profile.limits);
                if next != state {
                    state = next;
                    let _ = events.send(Action::Update(state));
                }
            }
        }
    }
}

fn step(mut state: CraneState, held: &BTreeSet<Command>, dt: f64) -> CraneState {
    for command in held {
        match command {
            Command::LiftUp => state.lift_mm += LIFT_MM_PER_SEC * dt,
            Command::LiftDown => state.lift_mm -= LIFT_MM_PER_SEC * dt,
            Command::SwingLeft => state.swing_deg += SWING_DEG_PER_SEC * dt,
            Command::SwingRight => state.swing_deg -= SWING_DEG_PER_SEC * dt,
            Command::ElbowLeft => state.elbow_deg += ELBOW_DEG_PER_SEC * dt,
            Command::ElbowRight => state.elbow_deg -= ELBOW_DEG_PER_SEC * dt,
            Command::WristLeft => state.wrist_deg += WRIST_DEG_PER_SEC * dt,
            Command::WristRight => state.wrist_deg -= WRIST_DEG_PER_SEC * dt,
            Command::GripperOpen => state.gripper_mm += GRIPPER_MM_PER_SEC * dt,
            Command::GripperClose => state.gripper_mm -= GRIPPER_MM_PER_SEC * dt,
        }
    }
    state
}

/// Keeps a pose inside the mechanical envelope. The swing axis slews
/// continuously and wraps; the remaining joints clamp to their ranges.
fn clamp(mut state: CraneState, limits: &CraneLimits) -> CraneState {
    state.swing_deg = state.swing_deg.rem_euclid(360.0);
    state.lift_mm = state.lift_mm.clamp(limits.lift_min, limits.lift_max);
    state.elbow_deg = state.elbow_deg.clamp(limits.elbow_min, limits.elbow_max);
    state.wrist_deg = state.wrist_deg.clamp(limits.wrist_min, limits.wrist_max);
    state.gripper_mm = state.gripper_mm.clamp(limits.gripper_min, limits.gripper_max);
    state
}

/// Planar two-link inverse kinematics for an absolute target: swing from the
/// target bearing corrected for the elbow bend, elbow from the law of
/// cosines, lift straight from the target height. Out-of-reach targets are
/// pulled onto the reachable annulus.
fn solve_move(dimensions: &CraneDimensions, state: CraneState, target: MoveTarget) -> CraneState {
    let upper = dimensions.upper_arm_length * 1000.0;
    let lower = dimensions.lower_arm_length * 1000.0;

    let radial = (target.x * target.x + target.y * target.y).sqrt();
    let reach = radial.clamp((upper - lower).abs().max(1e-6), upper + lower);

    let cos_elbow =
        ((reach * reach - upper * upper - lower * lower) / (2.0 * upper * lower)).clamp(-1.0, 1.0);
    let elbow = cos_elbow.acos();

    let bearing = target.y.atan2(target.x);
    let swing = bearing - (lower * elbow.sin()).atan2(upper + lower * elbow.cos());

    CraneState {
        swing_deg: swing.to_degrees(),
        lift_mm: target.z,
        elbow_deg: elbow.to_degrees(),
        wrist_deg: state.wrist_deg,
        gripper_mm: state.gripper_mm,
    }
}

#[cfg(test)]
#[path = "tests/crane_tests.rs"]
mod tests;
