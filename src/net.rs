use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use ethers_core::types::Address;
use ethers_middleware::SignerMiddleware;
use ethers_providers::{Http, Middleware, Provider};
use ethers_signers::{LocalWallet, Signer};
use tokio::sync::watch;

use crate::contract::EthVotingContract;
use crate::{ClientConfig, VoteError, VotingContract, VOTING_CHAIN_ID};

/// Account, network and signing surface of a wallet. The single seam between
/// the client and whatever holds the keys.
#[async_trait]
pub trait WalletProvider: Send + Sync + 'static {
    type Contract: VotingContract;

    async fn request_accounts(&self) -> Result<Vec<Address>, VoteError>;
    async fn chain_id(&self) -> Result<u64, VoteError>;
    async fn switch_chain(&self, chain_id: u64) -> Result<(), VoteError>;
    /// Stream of chain ids; a new value means the active network changed.
    fn network_changes(&self) -> watch::Receiver<u64>;
    /// Derive a fresh contract handle bound to the active signer.
    fn contract(&self, config: &ClientConfig) -> Result<Self::Contract, VoteError>;
}

/// Wallet backed by a JSON-RPC endpoint per chain and a locally held signing
/// key. Switching chains re-targets the provider and notifies subscribers.
pub struct JsonRpcWallet {
    endpoints: HashMap<u64, String>,
    signer: LocalWallet,
    provider: RwLock<Provider<Http>>,
    changes: watch::Sender<u64>,
}

impl JsonRpcWallet {
    pub fn new(
        endpoints: HashMap<u64, String>,
        chain_id: u64,
        signer: LocalWallet,
    ) -> Result<Self, VoteError> {
        let provider = connect(&endpoints, chain_id)?;
        let (changes, _) = watch::channel(chain_id);
        Ok(JsonRpcWallet {
            endpoints,
            signer,
            provider: RwLock::new(provider),
            changes,
        })
    }

    /// Build a wallet from the environment: `ETH_RPC_URL` (Sepolia endpoint),
    /// `ETH_SIGNING_KEY` (hex key), and optional `ETH_EXTRA_NETWORKS`
    /// (`chain_id=url` pairs, comma separated).
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();
        let url = std::env::var("ETH_RPC_URL")?;
        let signer: LocalWallet = std::env::var("ETH_SIGNING_KEY")?.parse()?;
        let mut endpoints = HashMap::new();
        endpoints.insert(VOTING_CHAIN_ID, url);
        if let Ok(extra) = std::env::var("ETH_EXTRA_NETWORKS") {
            for pair in extra.split(',') {
                if let Some((chain, url)) = pair.split_once('=') {
                    endpoints.insert(chain.trim().parse()?, url.trim().to_string());
                }
            }
        }
        Ok(JsonRpcWallet::new(endpoints, VOTING_CHAIN_ID, signer)?)
    }
}

fn connect(endpoints: &HashMap<u64, String>, chain_id: u64) -> Result<Provider<Http>, VoteError> {
    let url = endpoints.get(&chain_id).ok_or(VoteError::ProviderUnavailable)?;
    Provider::<Http>::try_from(url.as_str()).map_err(|_| VoteError::ProviderUnavailable)
}

#[async_trait]
impl WalletProvider for JsonRpcWallet {
    type Contract = EthVotingContract;

    async fn request_accounts(&self) -> Result<Vec<Address>, VoteError> {
        // The key lives with the wallet; there is nothing to prompt for.
        Ok(vec![self.signer.address()])
    }

    async fn chain_id(&self) -> Result<u64, VoteError> {
        let provider = self.provider.read().unwrap().clone();
        let id = provider
            .get_chainid()
            .await
            .map_err(|_| VoteError::ProviderUnavailable)?;
        Ok(id.as_u64())
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), VoteError> {
        let provider = connect(&self.endpoints, chain_id)?;
        *self.provider.write().unwrap() = provider;
        self.changes.send_replace(chain_id);
        Ok(())
    }

    fn network_changes(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    fn contract(&self, config: &ClientConfig) -> Result<Self::Contract, VoteError> {
        let provider = self.provider.read().unwrap().clone();
        let signer = self.signer.clone().with_chain_id(*self.changes.borrow());
        let client = SignerMiddleware::new(provider, signer);
        Ok(EthVotingContract::new(
            config.contract,
            config.abi.clone(),
            client,
        ))
    }
}
