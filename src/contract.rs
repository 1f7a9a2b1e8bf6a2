use async_trait::async_trait;
use ethers_contract::BaseContract;
use ethers_core::abi::{Detokenize, Tokenize};
use ethers_core::types::transaction::eip2718::TypedTransaction;
use ethers_core::types::{Address, Eip1559TransactionRequest, U256, U64};
use ethers_middleware::SignerMiddleware;
use ethers_providers::{Http, Middleware, Provider};
use ethers_signers::LocalWallet;

use crate::{Candidate, VoteError};

pub(crate) type EthClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// The fixed call surface of the deployed voting contract. Writes suspend
/// until the transaction is confirmed; the transport defines the latency.
#[async_trait]
pub trait VotingContract: Send + Sync {
    async fn register_voter(&self, voter: Address) -> Result<(), VoteError>;
    async fn vote(&self, candidate_index: u64) -> Result<(), VoteError>;
    async fn is_registered(&self, voter: Address) -> Result<bool, VoteError>;
    async fn has_voted(&self, voter: Address) -> Result<bool, VoteError>;
    async fn candidates_count(&self) -> Result<u64, VoteError>;
    async fn candidate(&self, index: u64) -> Result<Candidate, VoteError>;
    /// Raw (name, votes) pair; an empty name means no winner yet.
    async fn winner(&self) -> Result<(String, U256), VoteError>;
    /// Deployment-fixed (startTime, endTime) timestamps.
    async fn voting_window(&self) -> Result<(u64, u64), VoteError>;
}

/// Contract handle bound to the signer it was derived from.
pub struct EthVotingContract {
    address: Address,
    abi: BaseContract,
    client: EthClient,
}

impl EthVotingContract {
    pub fn new(address: Address, abi: BaseContract, client: EthClient) -> Self {
        EthVotingContract {
            address,
            abi,
            client,
        }
    }

    async fn view<T: Tokenize + Send, D: Detokenize>(
        &self,
        name: &str,
        args: T,
    ) -> Result<D, VoteError> {
        let data = self.abi.encode(name, args)?;
        let tx = Eip1559TransactionRequest::new().to(self.address).data(data);
        let output = self
            .client
            .call(&TypedTransaction::Eip1559(tx), None)
            .await
            .map_err(|e| VoteError::ReadFailed(e.to_string()))?;
        Ok(self.abi.decode_output(name, &output)?)
    }

    async fn write<T: Tokenize + Send>(&self, name: &str, args: T) -> Result<(), VoteError> {
        let data = self.abi.encode(name, args)?;
        let tx = Eip1559TransactionRequest::new()
            .from(self.client.address())
            .to(self.address)
            .data(data);
        let pending = self
            .client
            .send_transaction(TypedTransaction::Eip1559(tx), None)
            .await
            .map_err(|e| VoteError::TransactionFailed(e.to_string()))?;
        let receipt = pending
            .await
            .map_err(|e| VoteError::TransactionFailed(e.to_string()))?
            .ok_or_else(|| VoteError::TransactionFailed("transaction dropped".to_string()))?;
        if receipt.status != Some(U64::from(1)) {
            return Err(VoteError::TransactionFailed(format!(
                "{} reverted in block {:?}",
                name, receipt.block_number
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl VotingContract for EthVotingContract {
    async fn register_voter(&self, voter: Address) -> Result<(), VoteError> {
        self.write("registerVoter", voter).await
    }

    async fn vote(&self, candidate_index: u64) -> Result<(), VoteError> {
        self.write("vote", U256::from(candidate_index)).await
    }

    async fn is_registered(&self, voter: Address) -> Result<bool, VoteError> {
        self.view("isRegistered", voter).await
    }

    async fn has_voted(&self, voter: Address) -> Result<bool, VoteError> {
        self.view("hasVoted", voter).await
    }

    async fn candidates_count(&self) -> Result<u64, VoteError> {
        let count: U256 = self.view("getCandidatesCount", ()).await?;
        Ok(count.as_u64())
    }

    async fn candidate(&self, index: u64) -> Result<Candidate, VoteError> {
        let (name, votes): (String, U256) = self.view("candidates", U256::from(index)).await?;
        Ok(Candidate { name, votes })
    }

    async fn winner(&self) -> Result<(String, U256), VoteError> {
        self.view("getWinner", ()).await
    }

    async fn voting_window(&self) -> Result<(u64, u64), VoteError> {
        let start: U256 = self.view("startTime", ()).await?;
        let end: U256 = self.view("endTime", ()).await?;
        Ok((start.as_u64(), end.as_u64()))
    }
}
