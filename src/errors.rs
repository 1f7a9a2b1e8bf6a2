use thiserror::Error;

#[derive(Debug, Error)]
pub enum VoteError {
    #[error("No wallet provider available")]
    ProviderUnavailable,
    #[error("Wrong network: expected chain {expected}, got chain {actual}")]
    WrongNetwork { expected: u64, actual: u64 },
    #[error("No connected account")]
    NotConnected,
    #[error("Voter is already registered")]
    AlreadyRegistered,
    #[error("Candidate index {0} is out of range")]
    InvalidCandidate(u64),
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),
    #[error("Read failed: {0}")]
    ReadFailed(String),
    #[error(transparent)]
    Abi(#[from] ethers_core::abi::AbiError),
}

impl VoteError {
    /// Short user-facing status line. The underlying cause is logged, not shown.
    pub fn status(&self) -> String {
        match self {
            VoteError::ProviderUnavailable => "No wallet provider detected!".to_string(),
            VoteError::WrongNetwork { expected, .. } => {
                format!("Please switch to the voting network (chain {})!", expected)
            }
            VoteError::NotConnected => "Connect a wallet first!".to_string(),
            VoteError::AlreadyRegistered => "You are already registered!".to_string(),
            VoteError::InvalidCandidate(_) => "Invalid candidate!".to_string(),
            VoteError::TransactionFailed(_) => "Transaction failed!".to_string(),
            VoteError::ReadFailed(_) | VoteError::Abi(_) => {
                "Could not read the contract!".to_string()
            }
        }
    }
}
