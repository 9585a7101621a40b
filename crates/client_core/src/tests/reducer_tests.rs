use super::*;
use shared::protocol::{Command, MoveTarget};

fn pose(swing: f64, lift: f64, elbow: f64, wrist: f64, gripper: f64) -> CraneState {
    CraneState {
        swing_deg: swing,
        lift_mm: lift,
        elbow_deg: elbow,
        wrist_deg: wrist,
        gripper_mm: gripper,
    }
}

#[test]
fn starts_connected_to_avoid_initial_flicker() {
    let state = SceneState::default();
    assert!(state.connected);
    assert!(!state.debug_mode);
    assert!(state.users.is_empty());
}

#[test]
fn connect_action_sets_transport_liveness() {
    let state = SceneState::default();
    let state = reduce(&state, &Action::Connect(false));
    assert!(!state.connected);
    let state = reduce(&state, &Action::Connect(true));
    assert!(state.connected);
}

#[test]
fn join_is_idempotent_and_preserves_insertion_order() {
    let alice = UserId::random();
    let bob = UserId::random();

    let state = SceneState::default();
    let state = reduce(&state, &Action::Join(alice));
    let state = reduce(&state, &Action::Join(bob));
    let rejoined = reduce(&state, &Action::Join(alice));

    assert_eq!(rejoined.users, vec![alice, bob]);
    assert_eq!(rejoined, state);
}

#[test]
fn leave_of_absent_user_is_a_no_op() {
    let alice = UserId::random();
    let state = reduce(&SceneState::default(), &Action::Join(alice));
    let state = reduce(&state, &Action::Leave(UserId::random()));
    assert_eq!(state.users, vec![alice]);
}

#[test]
fn leave_removes_only_the_named_user() {
    let alice = UserId::random();
    let bob = UserId::random();
    let state = SceneState::default();
    let state = reduce(&state, &Action::Join(alice));
    let state = reduce(&state, &Action::Join(bob));
    let state = reduce(&state, &Action::Leave(alice));
    assert_eq!(state.users, vec![bob]);
}

#[test]
fn update_replaces_the_pose_wholesale() {
    let state = SceneState::default();
    let next = pose(90.0, 1200.0, 45.0, 10.0, 55.0);
    let state = reduce(&state, &Action::Update(next));
    assert_eq!(state.crane, next);
}

#[test]
fn update_wraps_degrees_into_zero_to_360() {
    let state = SceneState::default();
    let state = reduce(&state, &Action::Update(pose(-90.0, 0.0, 370.0, 720.0, 0.0)));
    assert_eq!(state.crane.swing_deg, 270.0);
    assert!((state.crane.elbow_deg - 10.0).abs() < 1e-9);
    assert_eq!(state.crane.wrist_deg, 0.0);
}

#[test]
fn update_clamps_lift_and_gripper_to_limits() {
    let state = SceneState::default();
    let state = reduce(
        &state,
        &Action::Update(pose(0.0, 9999.0, 0.0, 0.0, -5.0)),
    );
    assert_eq!(state.crane.lift_mm, state.limits.lift_max);
    assert_eq!(state.crane.gripper_mm, state.limits.gripper_min);
}

#[test]
fn normalization_holds_over_any_update_sequence() {
    let mut state = SceneState::default();
    let poses = [
        pose(-720.5, -100.0, 359.9, 360.0, 200.0),
        pose(12345.0, 2500.0, -0.1, -359.9, 50.0),
        pose(0.0, 1000.0, 180.0, 90.0, 0.0),
    ];
    for p in poses {
        state = reduce(&state, &Action::Update(p));
        for deg in [
            state.crane.swing_deg,
            state.crane.elbow_deg,
            state.crane.wrist_deg,
        ] {
            assert!((0.0..360.0).contains(&deg), "degrees out of range: {deg}");
        }
        assert!(state.crane.lift_mm >= state.limits.lift_min);
        assert!(state.crane.lift_mm <= state.limits.lift_max);
    }
}

#[test]
fn debug_mode_is_a_local_flag() {
    let state = reduce(&SceneState::default(), &Action::DebugMode(true));
    assert!(state.debug_mode);
}

#[test]
fn authority_bound_intents_leave_the_state_unchanged() {
    let base = reduce(&SceneState::default(), &Action::Join(UserId::random()));

    let after_command = reduce(&base, &Action::Command(vec![Command::LiftUp]));
    assert_eq!(after_command, base);

    let after_move = reduce(
        &base,
        &Action::Move(MoveTarget {
            x: 1.0,
            y: 2.0,
            z: 3.0,
        }),
    );
    assert_eq!(after_move, base);
}
