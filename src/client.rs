use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use ethers_core::types::Address;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::net::WalletProvider;
use crate::{Candidate, ClientConfig, VoteError, VotingContract, Winner};

/// UI-facing snapshot of the connection.
#[derive(Clone, Serialize, Debug, Default)]
pub struct Session {
    pub account: Option<Address>,
    pub busy: bool,
    pub status: String,
}

#[derive(Default)]
struct ClientState {
    account: Option<Address>,
    status: String,
    candidates: Vec<Candidate>,
    winner: Option<Winner>,
    window: Option<(u64, u64)>,
    celebration_until: Option<Instant>,
}

#[derive(Default)]
struct Tasks {
    poller: Option<JoinHandle<()>>,
    listener: Option<JoinHandle<()>>,
}

/// Client for the deployed voting contract. Proxies user intents to the
/// contract and mirrors the last successfully read contract state; it never
/// tallies anything itself. Failures surface as a status line, never as a
/// panic or an error the UI has to unwind.
pub struct VotingClient<W: WalletProvider> {
    inner: Arc<Inner<W>>,
}

impl<W: WalletProvider> Clone for VotingClient<W> {
    fn clone(&self) -> Self {
        VotingClient {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<W: WalletProvider> {
    wallet: W,
    config: ClientConfig,
    state: Mutex<ClientState>,
    busy: AtomicBool,
    tasks: Mutex<Tasks>,
}

impl<W: WalletProvider> Drop for Inner<W> {
    fn drop(&mut self) {
        let tasks = self.tasks.get_mut().unwrap();
        if let Some(poller) = tasks.poller.take() {
            poller.abort();
        }
        if let Some(listener) = tasks.listener.take() {
            listener.abort();
        }
    }
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<W: WalletProvider> VotingClient<W> {
    pub fn new(wallet: W, config: ClientConfig) -> Self {
        VotingClient {
            inner: Arc::new(Inner {
                wallet,
                config,
                state: Mutex::new(ClientState::default()),
                busy: AtomicBool::new(false),
                tasks: Mutex::new(Tasks::default()),
            }),
        }
    }

    /// Connect the wallet. Verifies the chain id first; on a mismatch the
    /// client requests a single network switch and returns without an
    /// account, it never retries the connection on its own.
    pub async fn connect(&self) {
        let Some(_busy) = self.inner.try_busy() else {
            return;
        };
        self.spawn_network_listener();
        if let Err(e) = self.try_connect().await {
            log::error!("connect failed: {e}");
            self.inner.set_status(e.status());
        }
    }

    async fn try_connect(&self) -> Result<(), VoteError> {
        let inner = &self.inner;
        let chain = inner.wallet.chain_id().await?;
        if chain != inner.config.chain_id {
            let mismatch = VoteError::WrongNetwork {
                expected: inner.config.chain_id,
                actual: chain,
            };
            log::warn!("{mismatch}");
            inner.set_status(mismatch.status());
            if let Err(e) = inner.wallet.switch_chain(inner.config.chain_id).await {
                log::warn!("network switch failed: {e}");
                inner.set_status("Network switch failed!".to_string());
            }
            return Ok(());
        }

        let accounts = inner.wallet.request_accounts().await?;
        let account = accounts
            .into_iter()
            .next()
            .ok_or(VoteError::ProviderUnavailable)?;
        {
            let mut state = inner.lock_state();
            state.account = Some(account);
            state.status = "Wallet connected!".to_string();
        }

        match inner.contract()?.voting_window().await {
            Ok(window) => inner.lock_state().window = Some(window),
            Err(e) => log::warn!("voting window read failed: {e}"),
        }
        inner.refresh_candidates().await;
        inner.refresh_winner().await;
        self.spawn_poller();
        Ok(())
    }

    /// Register the connected account as a voter. Pre-checks the registration
    /// flag to avoid a doomed transaction; the contract stays authoritative.
    pub async fn register(&self) {
        let Some(_busy) = self.inner.try_busy() else {
            return;
        };
        self.inner.set_status("Registering...".to_string());
        match self.inner.try_register().await {
            Ok(()) => {
                self.inner.set_status("Registered successfully!".to_string());
                self.inner.refresh_candidates().await;
                self.inner.refresh_winner().await;
            }
            Err(e) => {
                log::error!("registration failed: {e}");
                self.inner.set_status(e.status());
            }
        }
    }

    /// Cast a vote for the candidate at `index`. Out-of-range indices are
    /// rejected before anything is submitted.
    pub async fn vote(&self, index: u64) {
        let Some(_busy) = self.inner.try_busy() else {
            return;
        };
        self.inner.set_status("Voting...".to_string());
        match self.inner.try_vote(index).await {
            Ok(()) => {
                self.inner.set_status("Vote successful!".to_string());
                self.inner.refresh_candidates().await;
                self.inner.refresh_winner().await;
            }
            Err(e) => {
                log::error!("vote failed: {e}");
                self.inner.set_status(e.status());
            }
        }
    }

    pub async fn refresh_candidates(&self) {
        self.inner.refresh_candidates().await;
    }

    pub async fn refresh_winner(&self) {
        self.inner.refresh_winner().await;
    }

    /// Drop the session: stops polling and clears every piece of mirrored
    /// state. Submitted transactions are beyond recall and keep confirming.
    pub fn disconnect(&self) {
        self.inner.reset("Disconnected.");
    }

    pub fn session(&self) -> Session {
        let state = self.inner.lock_state();
        Session {
            account: state.account,
            busy: self.inner.busy.load(Ordering::SeqCst),
            status: state.status.clone(),
        }
    }

    pub fn account(&self) -> Option<Address> {
        self.inner.lock_state().account
    }

    pub fn status(&self) -> String {
        self.inner.lock_state().status.clone()
    }

    pub fn busy(&self) -> bool {
        self.inner.busy.load(Ordering::SeqCst)
    }

    pub fn candidates(&self) -> Vec<Candidate> {
        self.inner.lock_state().candidates.clone()
    }

    pub fn winner(&self) -> Option<Winner> {
        self.inner.lock_state().winner.clone()
    }

    pub fn voting_window(&self) -> Option<(u64, u64)> {
        self.inner.lock_state().window
    }

    /// True while the one-shot winner cue is on screen.
    pub fn celebrating(&self) -> bool {
        self.inner
            .lock_state()
            .celebration_until
            .map_or(false, |until| Instant::now() < until)
    }

    /// Reload the whole client state when the wallet reports a network
    /// change mid-session. Registered once, kept for the client's lifetime.
    fn spawn_network_listener(&self) {
        let mut tasks = self.inner.tasks.lock().unwrap();
        if tasks.listener.is_some() {
            return;
        }
        let mut changes = self.inner.wallet.network_changes();
        let weak = Arc::downgrade(&self.inner);
        tasks.listener = Some(tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let chain = *changes.borrow();
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                log::info!("network changed to chain {chain}, reloading session");
                inner.reset("Network changed, please reconnect.");
            }
        }));
    }

    fn spawn_poller(&self) {
        let interval = self.inner.config.poll_interval;
        let weak = Arc::downgrade(&self.inner);
        let mut tasks = self.inner.tasks.lock().unwrap();
        if let Some(poller) = tasks.poller.take() {
            poller.abort();
        }
        tasks.poller = Some(tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            // connect already refreshed once
            tick.tick().await;
            loop {
                tick.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                inner.refresh_candidates().await;
                inner.refresh_winner().await;
            }
        }));
    }
}

impl<W: WalletProvider> Inner<W> {
    fn lock_state(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap()
    }

    fn set_status(&self, status: String) {
        self.lock_state().status = status;
    }

    /// One user-initiated action at a time; a second trigger is a no-op.
    fn try_busy(&self) -> Option<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()?;
        Some(BusyGuard(&self.busy))
    }

    fn contract(&self) -> Result<W::Contract, VoteError> {
        self.wallet.contract(&self.config)
    }

    async fn try_register(&self) -> Result<(), VoteError> {
        let account = self.lock_state().account.ok_or(VoteError::NotConnected)?;
        let contract = self.contract()?;
        match contract.is_registered(account).await {
            Ok(true) => return Err(VoteError::AlreadyRegistered),
            Ok(false) => {}
            // the contract decides; a failed pre-check is not a reason to stop
            Err(e) => log::warn!("registration pre-check failed: {e}"),
        }
        contract.register_voter(account).await
    }

    async fn try_vote(&self, index: u64) -> Result<(), VoteError> {
        let (account, count) = {
            let state = self.lock_state();
            (state.account, state.candidates.len() as u64)
        };
        account.ok_or(VoteError::NotConnected)?;
        if index >= count {
            return Err(VoteError::InvalidCandidate(index));
        }
        self.contract()?.vote(index).await
    }

    /// Read the candidate table in storage order. A failed read keeps the
    /// previous list on screen.
    async fn refresh_candidates(&self) {
        match self.fetch_candidates().await {
            Ok(candidates) => self.lock_state().candidates = candidates,
            Err(e) => log::warn!("candidate refresh failed: {e}"),
        }
    }

    async fn fetch_candidates(&self) -> Result<Vec<Candidate>, VoteError> {
        let contract = self.contract()?;
        let count = contract.candidates_count().await?;
        let mut candidates = Vec::with_capacity(count as usize);
        for index in 0..count {
            candidates.push(contract.candidate(index).await?);
        }
        Ok(candidates)
    }

    /// An empty winner name means the vote is still open; it clears any
    /// previously shown winner. The first transition to a winner arms the
    /// one-shot celebration cue.
    async fn refresh_winner(&self) {
        let result = match self.contract() {
            Ok(contract) => contract.winner().await,
            Err(e) => Err(e),
        };
        match result {
            Ok((name, votes)) => {
                let celebration = self.config.celebration;
                let mut state = self.lock_state();
                if name.is_empty() {
                    state.winner = None;
                } else {
                    let first = state.winner.is_none();
                    state.winner = Some(Winner { name, votes });
                    if first {
                        state.celebration_until = Some(Instant::now() + celebration);
                    }
                }
            }
            Err(e) => log::warn!("winner refresh failed: {e}"),
        }
    }

    fn reset(&self, status: &str) {
        if let Some(poller) = self.tasks.lock().unwrap().poller.take() {
            poller.abort();
        }
        let mut state = self.lock_state();
        *state = ClientState::default();
        state.status = status.to_string();
    }
}
