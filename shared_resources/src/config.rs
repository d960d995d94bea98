use std::env;
use std::fs;

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
pub struct ElevatorSection {
    pub motor_speed: u32,
    pub use_simulator: bool,
    pub simulator_port: u16,
    pub simulator_ip: String,
}

impl ElevatorSection {
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.simulator_ip, self.simulator_port)
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
pub struct NetworkSection {
    pub interface: String,
    pub protocol: String,
    pub port: u16,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
pub struct WatchdogSection {
    pub socket: String,
    pub elev_socket: String,
    pub backupfile: String,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
pub struct ConfigFile {
    pub elevator: ElevatorSection,
    pub network: NetworkSection,
    pub watchdog: WatchdogSection,
}

impl ConfigFile {
    pub fn from_str(contents: &str) -> Result<ConfigFile, serde_json::Error> {
        serde_json::from_str(contents)
    }
}

fn read_config_file() -> Result<ConfigFile, serde_json::Error> {
    let file_path = "./config.json";
    let fallback_file_path = "../config.json";
    let config_contents = match fs::read_to_string(file_path) {
        Ok(content) => content,
        Err(_) => fs::read_to_string(fallback_file_path)
            .expect("no config.json found in . or .."),
    };
    ConfigFile::from_str(&config_contents)
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub elevator: ElevatorSection,
    pub network: NetworkSection,
    pub watchdog: WatchdogSection,
    pub nowatchdog: bool,
}

impl ControllerConfig {
    pub fn get() -> Self {
        let config_file = read_config_file().unwrap();
        let mut nowatchdog = false;
        for arg in env::args().skip(1) {
            match arg.as_str() {
                "--nowatchdog" | "-nowatchdog" => nowatchdog = true,
                _ => println!("illegal argument {}, skipping...", arg),
            }
        }

        ControllerConfig {
            elevator: config_file.elevator,
            network: config_file.network,
            watchdog: config_file.watchdog,
            nowatchdog,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    pub watchdog: WatchdogSection,
}

impl WatchdogConfig {
    pub fn get() -> Self {
        let config_file = read_config_file().unwrap();
        WatchdogConfig {
            watchdog: config_file.watchdog,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = r#"{
        "elevator": {
            "motor_speed": 2800,
            "use_simulator": true,
            "simulator_port": 15657,
            "simulator_ip": "localhost"
        },
        "network": {
            "interface": "",
            "protocol": "udp",
            "port": 2048
        },
        "watchdog": {
            "socket": "/tmp/wd.sock",
            "elev_socket": "/tmp/elev.sock",
            "backupfile": "./backup.dat"
        }
    }"#;

    #[test]
    fn parses_all_sections() {
        let config = ConfigFile::from_str(EXAMPLE).unwrap();
        assert_eq!(config.elevator.server_addr(), "localhost:15657");
        assert_eq!(config.network.protocol, "udp");
        assert_eq!(config.network.port, 2048);
        assert_eq!(config.watchdog.backupfile, "./backup.dat");
    }

    #[test]
    fn rejects_missing_section() {
        assert!(ConfigFile::from_str(r#"{"elevator": {}}"#).is_err());
    }
}
