use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ethers_core::types::{Address, U256};
use tokio::sync::watch;

use crate::net::WalletProvider;
use crate::{Candidate, ClientConfig, VoteError, VotingContract, VOTING_CHAIN_ID};

/// In-memory stand-in for the deployed contract, enforcing the same rules
/// the real one reverts on.
pub struct MockChain {
    pub candidates: Mutex<Vec<Candidate>>,
    pub registered: Mutex<HashSet<Address>>,
    pub voted: Mutex<HashSet<Address>>,
    pub winner: Mutex<(String, U256)>,
    pub window: (u64, u64),
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
    pub writes: AtomicUsize,
    pub write_delay: Mutex<Duration>,
}

impl MockChain {
    pub fn with_candidates(names: &[&str]) -> Arc<MockChain> {
        let candidates = names
            .iter()
            .map(|name| Candidate {
                name: name.to_string(),
                votes: U256::zero(),
            })
            .collect();
        Arc::new(MockChain {
            candidates: Mutex::new(candidates),
            registered: Mutex::new(HashSet::new()),
            voted: Mutex::new(HashSet::new()),
            winner: Mutex::new((String::new(), U256::zero())),
            window: (1_700_000_000, 1_700_003_600),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            writes: AtomicUsize::new(0),
            write_delay: Mutex::new(Duration::ZERO),
        })
    }

    pub fn set_winner(&self, name: &str, votes: u64) {
        *self.winner.lock().unwrap() = (name.to_string(), U256::from(votes));
    }

    pub fn votes(&self, index: usize) -> u64 {
        self.candidates.lock().unwrap()[index].votes.as_u64()
    }

    fn read_guard(&self) -> Result<(), VoteError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(VoteError::ReadFailed("mock read failure".to_string()));
        }
        Ok(())
    }

    async fn begin_write(&self) -> Result<(), VoteError> {
        let delay = *self.write_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(VoteError::TransactionFailed("mock rejection".to_string()));
        }
        Ok(())
    }
}

/// Contract handle bound to one caller, like the real signer-bound handle.
pub struct MockContract {
    chain: Arc<MockChain>,
    caller: Address,
}

#[async_trait]
impl VotingContract for MockContract {
    async fn register_voter(&self, voter: Address) -> Result<(), VoteError> {
        self.chain.begin_write().await?;
        self.chain.registered.lock().unwrap().insert(voter);
        Ok(())
    }

    async fn vote(&self, candidate_index: u64) -> Result<(), VoteError> {
        self.chain.begin_write().await?;
        if !self.chain.registered.lock().unwrap().contains(&self.caller) {
            return Err(VoteError::TransactionFailed("not registered".to_string()));
        }
        if !self.chain.voted.lock().unwrap().insert(self.caller) {
            return Err(VoteError::TransactionFailed("already voted".to_string()));
        }
        let mut candidates = self.chain.candidates.lock().unwrap();
        let row = candidates
            .get_mut(candidate_index as usize)
            .ok_or_else(|| VoteError::TransactionFailed("bad candidate".to_string()))?;
        row.votes = row.votes + U256::one();
        Ok(())
    }

    async fn is_registered(&self, voter: Address) -> Result<bool, VoteError> {
        self.chain.read_guard()?;
        Ok(self.chain.registered.lock().unwrap().contains(&voter))
    }

    async fn has_voted(&self, voter: Address) -> Result<bool, VoteError> {
        self.chain.read_guard()?;
        Ok(self.chain.voted.lock().unwrap().contains(&voter))
    }

    async fn candidates_count(&self) -> Result<u64, VoteError> {
        self.chain.read_guard()?;
        Ok(self.chain.candidates.lock().unwrap().len() as u64)
    }

    async fn candidate(&self, index: u64) -> Result<Candidate, VoteError> {
        self.chain.read_guard()?;
        self.chain
            .candidates
            .lock()
            .unwrap()
            .get(index as usize)
            .cloned()
            .ok_or_else(|| VoteError::ReadFailed(format!("no candidate {index}")))
    }

    async fn winner(&self) -> Result<(String, U256), VoteError> {
        self.chain.read_guard()?;
        Ok(self.chain.winner.lock().unwrap().clone())
    }

    async fn voting_window(&self) -> Result<(u64, u64), VoteError> {
        self.chain.read_guard()?;
        Ok(self.chain.window)
    }
}

pub struct MockWallet {
    pub accounts: Vec<Address>,
    pub chain: Mutex<u64>,
    pub known_chains: HashSet<u64>,
    pub available: AtomicBool,
    pub switch_requests: AtomicUsize,
    pub switch_fails: AtomicBool,
    pub changes: watch::Sender<u64>,
    pub state: Arc<MockChain>,
}

impl MockWallet {
    pub fn new(chain_id: u64, accounts: Vec<Address>, state: Arc<MockChain>) -> Arc<MockWallet> {
        let (changes, _) = watch::channel(chain_id);
        Arc::new(MockWallet {
            accounts,
            chain: Mutex::new(chain_id),
            known_chains: HashSet::from([chain_id, VOTING_CHAIN_ID]),
            available: AtomicBool::new(true),
            switch_requests: AtomicUsize::new(0),
            switch_fails: AtomicBool::new(false),
            changes,
            state,
        })
    }

    /// An externally-triggered network change, as a wallet UI would emit.
    pub fn change_network(&self, chain_id: u64) {
        *self.chain.lock().unwrap() = chain_id;
        self.changes.send_replace(chain_id);
    }
}

#[async_trait]
impl WalletProvider for Arc<MockWallet> {
    type Contract = MockContract;

    async fn request_accounts(&self) -> Result<Vec<Address>, VoteError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(VoteError::ProviderUnavailable);
        }
        Ok(self.accounts.clone())
    }

    async fn chain_id(&self) -> Result<u64, VoteError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(VoteError::ProviderUnavailable);
        }
        Ok(*self.chain.lock().unwrap())
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), VoteError> {
        self.switch_requests.fetch_add(1, Ordering::SeqCst);
        if self.switch_fails.load(Ordering::SeqCst) || !self.known_chains.contains(&chain_id) {
            return Err(VoteError::ProviderUnavailable);
        }
        self.change_network(chain_id);
        Ok(())
    }

    fn network_changes(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    fn contract(&self, _config: &ClientConfig) -> Result<Self::Contract, VoteError> {
        Ok(MockContract {
            chain: self.state.clone(),
            caller: self.accounts.first().copied().unwrap_or_default(),
        })
    }
}
