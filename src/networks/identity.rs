use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::networks::profile::FeeModel;
use crate::utils::HarnessError;

/// Concrete network a connection talks to. Selects the adapter variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NetworkIdentity {
    /// Any post-London EVM chain without special handling.
    DefaultPostLondon,
    /// Local ganache-style test chain.
    Ganache,
    Goerli,
    Sepolia,
    ArbitrumSepolia,
    /// The Ten L2 on a managed deployment (sepolia, uat, dev).
    TenManaged,
    /// The Ten L2 run locally (local, sim).
    TenLocal,
    /// The geth L1 underneath a managed or local Ten deployment.
    TenL1Geth,
    /// Sepolia acting as the L1 of the Ten testnet.
    TenL1Sepolia,
}

impl NetworkIdentity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DefaultPostLondon => "default",
            Self::Ganache => "ganache",
            Self::Goerli => "goerli",
            Self::Sepolia => "sepolia",
            Self::ArbitrumSepolia => "arbitrum-sepolia",
            Self::TenManaged => "ten",
            Self::TenLocal => "ten-local",
            Self::TenL1Geth => "ten-l1-geth",
            Self::TenL1Sepolia => "ten-l1-sepolia",
        }
    }

    pub fn fee_model(&self) -> FeeModel {
        match self {
            Self::Ganache | Self::TenManaged | Self::TenLocal => FeeModel::Legacy,
            _ => FeeModel::Eip1559,
        }
    }

    /// Block time used when the properties file does not give one.
    pub fn default_block_time(&self) -> Duration {
        match self {
            Self::Ganache | Self::TenLocal => Duration::from_secs(1),
            Self::ArbitrumSepolia => Duration::from_millis(250),
            Self::TenManaged => Duration::from_secs(1),
            Self::TenL1Geth => Duration::from_secs(2),
            Self::DefaultPostLondon | Self::Goerli | Self::Sepolia | Self::TenL1Sepolia => {
                Duration::from_secs(12)
            }
        }
    }

    /// True for the adapters that reach the L1 underneath Ten.
    pub fn is_l1_view(&self) -> bool {
        matches!(self, Self::TenL1Geth | Self::TenL1Sepolia)
    }
}

impl fmt::Display for NetworkIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The mode the suite runs in, as named on the command line (`ten.local`, `sepolia`, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Environment {
    TenSepolia,
    TenUat,
    TenDev,
    TenLocal,
    TenSim,
    Goerli,
    Ganache,
    Sepolia,
    ArbitrumSepolia,
    Default,
}

impl Environment {
    pub const ALL: [Environment; 10] = [
        Self::TenSepolia,
        Self::TenUat,
        Self::TenDev,
        Self::TenLocal,
        Self::TenSim,
        Self::Goerli,
        Self::Ganache,
        Self::Sepolia,
        Self::ArbitrumSepolia,
        Self::Default,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TenSepolia => "ten.sepolia",
            Self::TenUat => "ten.uat",
            Self::TenDev => "ten.dev",
            Self::TenLocal => "ten.local",
            Self::TenSim => "ten.sim",
            Self::Goerli => "goerli",
            Self::Ganache => "ganache",
            Self::Sepolia => "sepolia",
            Self::ArbitrumSepolia => "arbitrum.sepolia",
            Self::Default => "default",
        }
    }

    pub fn is_ten(&self) -> bool {
        matches!(self, Self::TenSepolia | Self::TenUat | Self::TenDev | Self::TenLocal | Self::TenSim)
    }

    pub fn is_local_ten(&self) -> bool {
        matches!(self, Self::TenLocal)
    }

    pub fn is_sepolia_ten(&self) -> bool {
        matches!(self, Self::TenSepolia)
    }

    /// Managed Ten deployments hand out funds through a faucet service.
    pub fn is_managed_ten(&self) -> bool {
        matches!(self, Self::TenSepolia | Self::TenUat | Self::TenDev)
    }

    /// Network the tests transact against.
    pub fn network(&self) -> NetworkIdentity {
        match self {
            Self::TenSepolia | Self::TenUat | Self::TenDev => NetworkIdentity::TenManaged,
            Self::TenLocal | Self::TenSim => NetworkIdentity::TenLocal,
            Self::Goerli => NetworkIdentity::Goerli,
            Self::Ganache => NetworkIdentity::Ganache,
            Self::Sepolia => NetworkIdentity::Sepolia,
            Self::ArbitrumSepolia => NetworkIdentity::ArbitrumSepolia,
            Self::Default => NetworkIdentity::DefaultPostLondon,
        }
    }

    /// Network acting as layer 1 for this environment.
    pub fn l1_network(&self) -> NetworkIdentity {
        match self {
            Self::TenSepolia => NetworkIdentity::TenL1Sepolia,
            e if e.is_ten() => NetworkIdentity::TenL1Geth,
            _ => NetworkIdentity::DefaultPostLondon,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| HarnessError::Config(format!("unknown environment '{s}'")))
    }
}
