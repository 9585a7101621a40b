use std::{collections::HashMap, fs};

/// Server settings: defaults, overlaid by an optional `server.toml`, overlaid
/// by environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server_bind: String,
    pub robot_config_dir: String,
    pub cors_allow_origin: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:7777".into(),
            robot_config_dir: "config".into(),
            cors_allow_origin: "http://localhost:3000".into(),
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("server.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            overlay(&mut settings, &file_cfg);
        }
    }

    if let Ok(v) = std::env::var("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Ok(v) = std::env::var("ROBOT_CONFIG_DIR") {
        settings.robot_config_dir = v;
    }
    if let Ok(v) = std::env::var("CORS_ALLOW_ORIGIN") {
        settings.cors_allow_origin = v;
    }

    settings
}

fn overlay(settings: &mut Settings, file_cfg: &HashMap<String, String>) {
    if let Some(v) = file_cfg.get("bind_addr") {
        settings.server_bind = v.clone();
    }
    if let Some(v) = file_cfg.get("robot_config_dir") {
        settings.robot_config_dir = v.clone();
    }
    if let Some(v) = file_cfg.get("cors_allow_origin") {
        settings.cors_allow_origin = v.clone();
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
