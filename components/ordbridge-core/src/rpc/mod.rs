pub mod bitcoind;

use std::fmt::{self, Display};

use async_trait::async_trait;
use ordbridge_types::BitcoinBlockData;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockFetchError {
    /// The chain has not produced a block at the requested height yet.
    BlockNotFound,
    Rpc(String),
}

impl Display for BlockFetchError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BlockFetchError::BlockNotFound => write!(f, "block not found"),
            BlockFetchError::Rpc(e) => write!(f, "rpc error: {e}"),
        }
    }
}

#[async_trait]
pub trait BlockSource: Send + Sync {
    /// Fetches the block at `height` with its full transaction list.
    async fn fetch_block(&self, height: u64) -> Result<BitcoinBlockData, BlockFetchError>;
}
