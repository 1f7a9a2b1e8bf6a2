use std::time::Duration;

use ethers_contract::BaseContract;
use ethers_core::abi::Abi;
use ethers_core::types::{Address, U256};
use serde::{Deserialize, Serialize};

mod client;
mod contract;
mod errors;
mod net;

#[cfg(test)]
mod mock;

pub use client::{Session, VotingClient};
pub use contract::{EthVotingContract, VotingContract};
pub use errors::VoteError;
pub use net::{JsonRpcWallet, WalletProvider};

/// Chain id the client refuses to operate without (Sepolia).
pub const VOTING_CHAIN_ID: u64 = 11155111;
/// Deployed voting contract.
pub const VOTING_CONTRACT: &str = "0x9fc930ab59428A2862EF9F4116FFd8129360fF04";

pub const POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const CELEBRATION: Duration = Duration::from_secs(5);

lazy_static::lazy_static! {
    /// The contract interface, fixed at build time.
    pub static ref VOTING_ABI: BaseContract = {
        let abi: Abi = serde_json::from_str(include_str!("voting_abi.json")).unwrap();
        BaseContract::from(abi)
    };
}

/// Address, interface and timing of one client instance. Immutable once the
/// client is constructed.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub contract: Address,
    pub abi: BaseContract,
    pub chain_id: u64,
    pub poll_interval: Duration,
    pub celebration: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            contract: VOTING_CONTRACT.parse().unwrap(),
            abi: VOTING_ABI.clone(),
            chain_id: VOTING_CHAIN_ID,
            poll_interval: POLL_INTERVAL,
            celebration: CELEBRATION,
        }
    }
}

/// A row of the contract's candidate table. Replaced wholesale on refresh,
/// never mutated locally.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub votes: U256,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Winner {
    pub name: String,
    pub votes: U256,
}
