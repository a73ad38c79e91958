use std::{collections::HashMap, fs};

use shared::domain::RobotHost;

const DEFAULT_ROBOT_PORT: u16 = 31950;

/// Known robots, name → host. Loaded from `robots.toml` (a flat
/// `name = "address[:port]"` table) and overridable per robot through
/// `ROBOT_HOST_<NAME>` environment variables.
pub fn load_hosts() -> Vec<RobotHost> {
    let mut entries: HashMap<String, String> = HashMap::new();

    if let Ok(raw) = fs::read_to_string("robots.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            entries.extend(file_cfg);
        }
    }

    for (key, value) in std::env::vars() {
        if let Some(name) = key.strip_prefix("ROBOT_HOST_") {
            entries.insert(name.to_ascii_lowercase(), value);
        }
    }

    entries
        .into_iter()
        .map(|(name, target)| parse_host(&name, &target))
        .collect()
}

pub fn parse_host(name: &str, target: &str) -> RobotHost {
    match target.rsplit_once(':') {
        Some((address, port)) => match port.parse::<u16>() {
            Ok(port) => RobotHost::new(name, address, port),
            Err(_) => RobotHost::new(name, target, DEFAULT_ROBOT_PORT),
        },
        None => RobotHost::new(name, target, DEFAULT_ROBOT_PORT),
    }
}
