use std::{collections::HashMap, fs, path::Path};

use anyhow::{Context, Result};
use serde::Deserialize;
use shared::{
    domain::CraneId,
    protocol::{CraneDimensions, CraneLimits},
};
use tracing::{info, warn};

use crate::crane::CraneProfile;

#[derive(Debug, Deserialize)]
struct RobotConfig {
    id: String,
    base: BaseConfig,
    column: ColumnConfig,
    upper_arm: ArmConfig,
    lower_arm: ArmConfig,
    swing_joint: JointConfig,
    lift_joint: JointConfig,
    elbow_joint: JointConfig,
    wrist_joint: JointConfig,
    gripper: GripperConfig,
    limits: LimitsConfig,
}

#[derive(Debug, Deserialize)]
struct BaseConfig {
    height: f64,
    radius_bottom: f64,
    radius_top: f64,
}

#[derive(Debug, Deserialize)]
struct ColumnConfig {
    height: f64,
    width: f64,
    thickness: f64,
}

#[derive(Debug, Deserialize)]
struct ArmConfig {
    length: f64,
    width: f64,
    thickness: f64,
}

#[derive(Debug, Deserialize)]
struct JointConfig {
    radius: f64,
    height: f64,
}

#[derive(Debug, Deserialize)]
struct GripperConfig {
    length: f64,
    width: f64,
    thickness: f64,
    max_open: f64,
    #[serde(default = "default_wrist_extension")]
    wrist_extension_length: f64,
}

fn default_wrist_extension() -> f64 {
    0.15
}

#[derive(Debug, Deserialize)]
struct LimitsConfig {
    swing_min: f64,
    swing_max: f64,
    lift_min: f64,
    lift_max: f64,
    elbow_min: f64,
    elbow_max: f64,
    wrist_min: f64,
    wrist_max: f64,
    gripper_min: f64,
    gripper_max: f64,
}

impl RobotConfig {
    fn into_profile(self) -> CraneProfile {
        CraneProfile {
            id: CraneId::new(self.id),
            dimensions: CraneDimensions {
                base_height: self.base.height,
                base_radius_top: self.base.radius_top,
                base_radius_bottom: self.base.radius_bottom,
                column_height: self.column.height,
                column_width: self.column.width,
                column_thickness: self.column.thickness,
                upper_arm_length: self.upper_arm.length,
                upper_arm_width: self.upper_arm.width,
                upper_arm_thickness: self.upper_arm.thickness,
                lower_arm_length: self.lower_arm.length,
                lower_arm_width: self.lower_arm.width,
                lower_arm_thickness: self.lower_arm.thickness,
                swing_joint_radius: self.swing_joint.radius,
                swing_joint_height: self.swing_joint.height,
                lift_joint_radius: self.lift_joint.radius,
                lift_joint_height: self.lift_joint.height,
                elbow_joint_radius: self.elbow_joint.radius,
                elbow_joint_height: self.elbow_joint.height,
                wrist_joint_radius: self.wrist_joint.radius,
                wrist_joint_height: self.wrist_joint.height,
                gripper_length: self.gripper.length,
                gripper_width: self.gripper.width,
                gripper_thickness: self.gripper.thickness,
                gripper_max_open: self.gripper.max_open,
                wrist_extension_length: self.gripper.wrist_extension_length,
            },
            limits: CraneLimits {
                swing_min: self.limits.swing_min,
                swing_max: self.limits.swing_max,
                lift_min: self.limits.lift_min,
                lift_max: self.limits.lift_max,
                elbow_min: self.limits.elbow_min,
                elbow_max: self.limits.elbow_max,
                wrist_min: self.limits.wrist_min,
                wrist_max: self.limits.wrist_max,
                gripper_min: self.limits.gripper_min,
                gripper_max: self.limits.gripper_max,
            },
        }
    }
}

/// The set of cranes this server is configured to expose, keyed by id. Loaded
/// once at startup from TOML files in the config directory.
#[derive(Debug, Default)]
pub struct Fleet {
    cranes: HashMap<CraneId, CraneProfile>,
}

impl Fleet {
    pub fn load(config_dir: &Path) -> Result<Self> {
        if !config_dir.is_dir() {
            warn!(
                dir = %config_dir.display(),
                "robot config directory not found; starting with an empty fleet"
            );
            return Ok(Self::default());
        }

        let mut cranes = HashMap::new();
        for entry in fs::read_dir(config_dir)
            .with_context(|| format!("failed to read config dir {}", config_dir.display()))?
        {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) != Some("toml") {
                continue;
            }
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            let config: RobotConfig = toml::from_str(&content)
                .with_context(|| format!("failed to parse config file {}", path.display()))?;
            let profile = config.into_profile();
            info!(id = %profile.id, file = %path.display(), "loaded crane profile");
            cranes.insert(profile.id.clone(), profile);
        }

        Ok(Self { cranes })
    }

    #[cfg(test)]
    pub(crate) fn from_profiles(profiles: impl IntoIterator<Item = CraneProfile>) -> Self {
        Self {
            cranes: profiles
                .into_iter()
                .map(|profile| (profile.id.clone(), profile))
                .collect(),
        }
    }

    pub fn profile(&self, id: &CraneId) -> Option<CraneProfile> {
        self.cranes.get(id).cloned()
    }

    /// Configured ids in stable order, for deterministic listings.
    pub fn ids(&self) -> Vec<CraneId> {
        let mut ids: Vec<CraneId> = self.cranes.keys().cloned().collect();
        ids.sort_by(|a, b| a.0.cmp(&b.0));
        ids
    }

    pub fn len(&self) -> usize {
        self.cranes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cranes.is_empty()
    }
}

#[cfg(test)]
#[path = "tests/fleet_tests.rs"]
mod tests;
