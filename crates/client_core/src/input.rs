use std::collections::BTreeSet;

use shared::protocol::{Action, Command, MoveTarget};

use crate::connection::Updater;

/// Physical inputs the aggregator understands. Hosts translate whatever
/// their input stack delivers (DOM events, crossterm, egui) into these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Char(char),
    Space,
    /// Meta/Control gesture; toggles the gripper mode on press.
    Modifier,
}

/// Which gripper command a single activation gesture maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GripperMode {
    Open,
    Close,
}

impl GripperMode {
    fn toggled(self) -> Self {
        match self {
            GripperMode::Open => GripperMode::Close,
            GripperMode::Close => GripperMode::Open,
        }
    }

    fn command(self) -> Command {
        match self {
            GripperMode::Open => Command::GripperOpen,
            GripperMode::Close => Command::GripperClose,
        }
    }
}

/// Maintains the active command set from raw press/release events and emits
/// one `command` action per effective change, de-duplicating repeated
/// physical events into idempotent logical intents.
///
/// The full current set is emitted on every change, including the empty set
/// when the last intent is released, so the authority sees cessation
/// explicitly instead of having to infer it.
pub struct CommandAggregator {
    updater: Updater,
    active: BTreeSet<Command>,
    gripper_mode: GripperMode,
}

impl CommandAggregator {
    pub fn new(updater: Updater) -> Self {
        Self {
            updater,
            active: BTreeSet::new(),
            gripper_mode: GripperMode::Close,
        }
    }

    pub fn gripper_mode(&self) -> GripperMode {
        self.gripper_mode
    }

    pub fn active(&self) -> Vec<Command> {
        self.active.iter().copied().collect()
    }

    pub fn key_down(&mut self, key: Key) {
        if let Key::Modifier = key {
            self.gripper_mode = self.gripper_mode.toggled();
            return;
        }
        if let Some(command) = self.map(key) {
            self.press(command);
        }
    }

    pub fn key_up(&mut self, key: Key) {
        if let Some(command) = self.map(key) {
            self.release(command);
        }
    }

    /// Pointer-down on an on-screen control; same set semantics as keys.
    pub fn press(&mut self, command: Command) {
        if self.active.insert(command) {
            self.emit();
        }
    }

    pub fn release(&mut self, command: Command) {
        if self.active.remove(&command) {
            self.emit();
        }
    }

    pub fn release_all(&mut self) {
        if !self.active.is_empty() {
            self.active.clear();
            self.emit();
        }
    }

    fn emit(&self) {
        self.updater
            .update(Action::Command(self.active.iter().copied().collect()));
    }

    fn map(&self, key: Key) -> Option<Command> {
        match key {
            Key::Char(c) => match c.to_ascii_lowercase() {
                'w' => Some(Command::LiftUp),
                's' => Some(Command::LiftDown),
                'a' => Some(Command::SwingLeft),
                'd' => Some(Command::SwingRight),
                'j' => Some(Command::ElbowRight),
                'l' => Some(Command::ElbowLeft),
                'i' => Some(Command::WristRight),
                'k' => Some(Command::WristLeft),
                _ => None,
            },
            Key::Space => Some(self.gripper_mode.command()),
            Key::Modifier => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// Coordinate-entry form. Fields are gated while typing to partial signed
/// decimals; submission parses all three or dispatches nothing.
#[derive(Debug, Clone)]
pub struct CoordinateForm {
    x: String,
    y: String,
    z: String,
}

impl CoordinateForm {
    pub fn new(x: impl Into<String>, y: impl Into<String>, z: impl Into<String>) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
            z: z.into(),
        }
    }

    pub fn get(&self, axis: Axis) -> &str {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
            Axis::Z => &self.z,
        }
    }

    /// Accepts the edit only when `value` is still a partial signed decimal;
    /// returns whether the field changed.
    pub fn set(&mut self, axis: Axis, value: &str) -> bool {
        if !is_partial_decimal(value) {
            return false;
        }
        let field = match axis {
            Axis::X => &mut self.x,
            Axis::Y => &mut self.y,
            Axis::Z => &mut self.z,
        };
        *field = value.to_string();
        true
    }

    /// The move target this form describes, if every field parses.
    pub fn target(&self) -> Option<MoveTarget> {
        Some(MoveTarget {
            x: self.x.parse().ok()?,
            y: self.y.parse().ok()?,
            z: self.z.parse().ok()?,
        })
    }

    /// Dispatches a single `move` action, or nothing when any field fails to
    /// parse. Returns whether a request was sent.
    pub fn submit(&self, updater: &Updater) -> bool {
        match self.target() {
            Some(target) => {
                updater.update(Action::Move(target));
                true
            }
            None => false,
        }
    }
}

impl Default for CoordinateForm {
    fn default() -> Self {
        Self::new("800", "800", "500")
    }
}

/// Mirrors the entry gate `^-?\d*\.?\d*$`: optional leading sign, at most one
/// decimal point, digits everywhere else. The empty string is allowed so a
/// field can be cleared mid-edit.
fn is_partial_decimal(value: &str) -> bool {
    let rest = value.strip_prefix('-').unwrap_or(value);
    let mut seen_dot = false;
    rest.chars().all(|c| match c {
        '0'..='9' => true,
        '.' if !seen_dot => {
            seen_dot = true;
            true
        }
        _ => false,
    })
}

#[cfg(test)]
#[path = "tests/input_tests.rs"]
mod tests;
