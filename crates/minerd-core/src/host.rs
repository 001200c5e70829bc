//! Logical backend hosts.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A backend the control plane can forward requests to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostType {
    /// The mining pool the rig submits to.
    Pool,
    /// The wallet node (block explorer and account queries).
    Wallet,
}

impl HostType {
    /// All host types, in configuration order.
    pub const ALL: [HostType; 2] = [HostType::Pool, HostType::Wallet];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pool => "pool",
            Self::Wallet => "wallet",
        }
    }
}

impl fmt::Display for HostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HostType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pool" => Ok(Self::Pool),
            "wallet" => Ok(Self::Wallet),
            _ => Err(CoreError::UnknownHostType(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!("Pool".parse::<HostType>().unwrap(), HostType::Pool);
        assert_eq!("WALLET".parse::<HostType>().unwrap(), HostType::Wallet);
        assert!("miner".parse::<HostType>().is_err());
    }

    #[test]
    fn test_display_matches_serde() {
        for host in HostType::ALL {
            let json = serde_json::to_string(&host).unwrap();
            assert_eq!(json, format!("\"{host}\""));
        }
    }
}
