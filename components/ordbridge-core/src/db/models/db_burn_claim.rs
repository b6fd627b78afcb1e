use std::fmt::{self, Display};
use std::str::FromStr;

use ordbridge_postgres::FromPgRow;
use tokio_postgres::Row;

/// Lifecycle of a burn claim. `detected` and `confirmed` are the only
/// states the indexer and worker move claims out of; the rest are terminal
/// except for the explicit `failed -> confirmed` retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    Detected,
    Underpaid,
    Confirmed,
    Attested,
    Failed,
}

impl ClaimStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Detected => "detected",
            ClaimStatus::Underpaid => "underpaid",
            ClaimStatus::Confirmed => "confirmed",
            ClaimStatus::Attested => "attested",
            ClaimStatus::Failed => "failed",
        }
    }

}

impl Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ClaimStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "detected" => Ok(ClaimStatus::Detected),
            "underpaid" => Ok(ClaimStatus::Underpaid),
            "confirmed" => Ok(ClaimStatus::Confirmed),
            "attested" => Ok(ClaimStatus::Attested),
            "failed" => Ok(ClaimStatus::Failed),
            _ => Err(format!("unknown claim status '{s}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbBurnClaim {
    pub inscription_id: String,
    pub collection_name: String,
    pub token_id: i64,
    pub sender_address: String,
    pub burn_txid: String,
    pub burn_block_height: i64,
    pub burn_block_hash: String,
    pub status: ClaimStatus,
    pub attest_txid: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl FromPgRow for DbBurnClaim {
    fn from_pg_row(row: &Row) -> Self {
        let status: String = row.get("status");
        DbBurnClaim {
            inscription_id: row.get("inscription_id"),
            collection_name: row.get("collection_name"),
            token_id: row.get("token_id"),
            sender_address: row.get("sender_address"),
            burn_txid: row.get("burn_txid"),
            burn_block_height: row.get("burn_block_height"),
            burn_block_hash: row.get("burn_block_hash"),
            status: status.parse().unwrap_or(ClaimStatus::Failed),
            attest_txid: row.get("attest_txid"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}
