mod db_burn_claim;
mod db_inscription;

pub use db_burn_claim::{ClaimStatus, DbBurnClaim};
pub use db_inscription::DbInscription;
