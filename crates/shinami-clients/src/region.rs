/*
[INPUT]:  Region, chain and service identifiers; access keys
[OUTPUT]: Regional Shinami service URLs
[POS]:    Endpoint layer - URL construction shared by Sui and Aptos clients
[UPDATE]: When Shinami adds regions, chains or services
*/

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::rpc::ShinamiError;

/// Shinami deployment region
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    #[default]
    Us1,
    Eu1,
    Apac1,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Us1 => "us1",
            Region::Eu1 => "eu1",
            Region::Apac1 => "apac1",
        }
    }

    /// Infer the region an access key was issued for.
    ///
    /// Regional keys are prefixed with the region name, e.g. `us1_sui_testnet_...`.
    pub fn from_access_key(access_key: &str) -> Option<Region> {
        access_key
            .split_once('_')
            .and_then(|(prefix, _)| prefix.parse().ok())
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = ShinamiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "us1" => Ok(Region::Us1),
            "eu1" => Ok(Region::Eu1),
            "apac1" => Ok(Region::Apac1),
            other => Err(ShinamiError::InvalidInput(format!("unknown region: {other}"))),
        }
    }
}

/// Chain served by a Shinami endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Sui,
    Aptos,
}

impl Chain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Sui => "sui",
            Chain::Aptos => "aptos",
        }
    }
}

/// Shinami service behind a regional endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Node,
    Gas,
    Wallet,
    Key,
    ZkWallet,
    ZkProver,
    Graphql,
}

impl Service {
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Node => "node",
            Service::Gas => "gas",
            Service::Wallet => "wallet",
            Service::Key => "key",
            Service::ZkWallet => "zkwallet",
            Service::ZkProver => "zkprover",
            Service::Graphql => "graphql",
        }
    }
}

/// Build `https://api.{region}.shinami.com/{chain}/{service}/v1`
pub fn regional_api_url(region: Region, chain: Chain, service: Service) -> String {
    format!(
        "https://api.{}.shinami.com/{}/{}/v1",
        region.as_str(),
        chain.as_str(),
        service.as_str()
    )
}

/// Regional URL for `service`, using the region encoded in `access_key` or us1
pub fn url_for_access_key(access_key: &str, chain: Chain, service: Service) -> String {
    let region = Region::from_access_key(access_key).unwrap_or_default();
    regional_api_url(region, chain, service)
}
