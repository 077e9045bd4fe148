use std::path::Path;

use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::config::IniFile;
use crate::error::{CommonError, CommonResult};

/// The INI section holding the base identifier and ports of the node.
pub const BASE_CONFIG_SECTION: &str = "DERECHO";

/// The five base ports every worker derives its own ports from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSet {
    pub gms: u16,
    pub state_transfer: u16,
    pub sst: u16,
    pub rdmc: u16,
    pub external: u16,
}

impl PortSet {
    pub fn iter(&self) -> impl Iterator<Item = (PortKind, u16)> {
        [
            (PortKind::Gms, self.gms),
            (PortKind::StateTransfer, self.state_transfer),
            (PortKind::Sst, self.sst),
            (PortKind::Rdmc, self.rdmc),
            (PortKind::External, self.external),
        ]
        .into_iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortKind {
    Gms,
    StateTransfer,
    Sst,
    Rdmc,
    External,
}

impl PortKind {
    /// The configuration key of the port, which is also the worker flag name.
    pub fn key(&self) -> &'static str {
        match self {
            PortKind::Gms => "gms_port",
            PortKind::StateTransfer => "state_transfer_port",
            PortKind::Sst => "sst_port",
            PortKind::Rdmc => "rdmc_port",
            PortKind::External => "external_port",
        }
    }
}

impl std::fmt::Display for PortKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Every key is required. There are no defaults for the base configuration.
#[derive(Debug, Clone, Deserialize)]
struct BaseConfigSection {
    local_id: u64,
    gms_port: u16,
    state_transfer_port: u16,
    sst_port: u16,
    rdmc_port: u16,
    external_port: u16,
}

/// The configuration shared by all workers of this node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseConfig {
    pub local_id: u64,
    pub ports: PortSet,
    pub fleet_size: usize,
}

impl BaseConfig {
    pub fn new(local_id: u64, ports: PortSet, fleet_size: usize) -> CommonResult<Self> {
        if fleet_size == 0 {
            return Err(CommonError::invalid("fleet size must be positive"));
        }
        Ok(Self {
            local_id,
            ports,
            fleet_size,
        })
    }

    /// Loads the base configuration from the [`BASE_CONFIG_SECTION`] section of an INI file.
    pub fn load(path: impl AsRef<Path>, fleet_size: usize) -> CommonResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(CommonError::missing(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let section: BaseConfigSection = Figment::from(IniFile::file(path))
            .extract_inner(BASE_CONFIG_SECTION)
            .map_err(|e| CommonError::invalid(format!("{}: {e}", path.display())))?;
        let ports = PortSet {
            gms: section.gms_port,
            state_transfer: section.state_transfer_port,
            sst: section.sst_port,
            rdmc: section.rdmc_port,
            external: section.external_port,
        };
        Self::new(section.local_id, ports, fleet_size)
    }
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    const CONFIG: &str = r#"
[DERECHO]
contact_ip = 127.0.0.1
local_id = 2
gms_port = 23580
state_transfer_port = 28366
sst_port = 37683
rdmc_port = 31675
external_port = 32645
max_payload_size = 10240

[RDMA]
provider = sockets
"#;

    #[test]
    fn test_load_base_config() {
        Jail::expect_with(|jail| {
            jail.create_file("derecho.cfg", CONFIG)?;
            let config = BaseConfig::load("derecho.cfg", 8).map_err(|e| e.to_string())?;
            assert_eq!(config.local_id, 2);
            assert_eq!(config.fleet_size, 8);
            assert_eq!(
                config.ports,
                PortSet {
                    gms: 23580,
                    state_transfer: 28366,
                    sst: 37683,
                    rdmc: 31675,
                    external: 32645,
                }
            );
            Ok(())
        });
    }

    #[test]
    fn test_missing_file() {
        Jail::expect_with(|_| {
            let result = BaseConfig::load("derecho.cfg", 8);
            assert!(matches!(result, Err(CommonError::MissingArgument(_))));
            Ok(())
        });
    }

    #[test]
    fn test_missing_section() {
        Jail::expect_with(|jail| {
            jail.create_file("derecho.cfg", "[RDMA]\nprovider = sockets\n")?;
            let result = BaseConfig::load("derecho.cfg", 8);
            assert!(matches!(result, Err(CommonError::InvalidArgument(_))));
            Ok(())
        });
    }

    #[test]
    fn test_missing_key() {
        Jail::expect_with(|jail| {
            jail.create_file("derecho.cfg", &CONFIG.replace("sst_port = 37683", ""))?;
            let result = BaseConfig::load("derecho.cfg", 8);
            let Err(CommonError::InvalidArgument(message)) = result else {
                panic!("expected an invalid argument error");
            };
            assert!(message.contains("sst_port"), "{message}");
            Ok(())
        });
    }

    #[test]
    fn test_non_integer_value() {
        Jail::expect_with(|jail| {
            jail.create_file("derecho.cfg", &CONFIG.replace("local_id = 2", "local_id = two"))?;
            let result = BaseConfig::load("derecho.cfg", 8);
            assert!(matches!(result, Err(CommonError::InvalidArgument(_))));
            Ok(())
        });
    }

    #[test]
    fn test_port_out_of_range() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "derecho.cfg",
                &CONFIG.replace("rdmc_port = 31675", "rdmc_port = 70000"),
            )?;
            let result = BaseConfig::load("derecho.cfg", 8);
            assert!(matches!(result, Err(CommonError::InvalidArgument(_))));
            Ok(())
        });
    }

    #[test]
    fn test_zero_fleet_size() {
        let ports = PortSet {
            gms: 1,
            state_transfer: 2,
            sst: 3,
            rdmc: 4,
            external: 5,
        };
        assert!(matches!(
            BaseConfig::new(0, ports, 0),
            Err(CommonError::InvalidArgument(_))
        ));
    }
}
