use super::*;
use serde_json::json;

#[test]
fn update_action_uses_type_payload_envelope_with_camel_case_pose() {
    let action = Action::Update(CraneState {
        swing_deg: 90.0,
        lift_mm: 1200.0,
        elbow_deg: 15.5,
        wrist_deg: 0.0,
        gripper_mm: 42.0,
    });

    let value = serde_json::to_value(&action).expect("serialize");
    assert_eq!(
        value,
        json!({
            "type": "update",
            "payload": {
                "swingDeg": 90.0,
                "liftMm": 1200.0,
                "elbowDeg": 15.5,
                "wristDeg": 0.0,
                "gripperMm": 42.0,
            }
        })
    );
}

#[test]
fn debug_mode_tag_is_kebab_case() {
    let value = serde_json::to_value(Action::DebugMode(true)).expect("serialize");
    assert_eq!(value, json!({"type": "debug-mode", "payload": true}));
}

#[test]
fn command_payload_carries_variant_names() {
    let action = Action::Command(vec![Command::LiftUp, Command::SwingLeft]);
    let value = serde_json::to_value(&action).expect("serialize");
    assert_eq!(
        value,
        json!({"type": "command", "payload": ["LiftUp", "SwingLeft"]})
    );
}

#[test]
fn join_payload_is_a_plain_user_id_string() {
    let user = UserId::random();
    let value = serde_json::to_value(Action::Join(user)).expect("serialize");
    assert_eq!(
        value,
        json!({"type": "join", "payload": user.0.to_string()})
    );
}

#[test]
fn move_action_round_trips() {
    let action = Action::Move(MoveTarget {
        x: 12.5,
        y: 0.0,
        z: 3.0,
    });
    let text = serde_json::to_string(&action).expect("serialize");
    let decoded: Action = serde_json::from_str(&text).expect("decode");
    assert_eq!(decoded, action);
}

#[test]
fn unknown_type_tag_fails_decode() {
    let result = serde_json::from_str::<Action>(r#"{"type":"teleport","payload":{}}"#);
    assert!(result.is_err());
}

#[test]
fn command_order_follows_declaration_order() {
    assert!(Command::LiftUp < Command::SwingLeft);
    assert!(Command::SwingLeft < Command::GripperClose);
}
