pub mod attestation;
pub mod collection;
pub mod transport;

use config::BridgeConfig;
use ordbridge_types::{BitcoinNetwork, BitcoinTransactionData, BlockIdentifier};
use tokio_postgres::GenericClient;

use crate::core::protocol::burn_detection::detect_burn;
use crate::db::bridge_pg;
use crate::db::models::{ClaimStatus, DbBurnClaim};
use crate::utils::now_ms;
use self::collection::CollectionRegistry;

/// Burn claim lifecycle management. The claims table is the single
/// serialization point: no derived state about other claims is kept in
/// memory between calls.
pub struct BridgeService {
    config: BridgeConfig,
    network: BitcoinNetwork,
    registry: CollectionRegistry,
}

#[derive(Debug, Clone, Serialize)]
pub struct BridgeStats {
    pub total_claims: i64,
    pub detected: i64,
    pub underpaid: i64,
    pub confirmed: i64,
    pub attested: i64,
    pub failed: i64,
    pub collection_size: usize,
    pub burn_address: String,
    pub required_confirmations: u32,
    pub min_fee_sats: u64,
}

impl BridgeService {
    pub fn new(config: BridgeConfig, network: BitcoinNetwork) -> Result<Self, String> {
        let registry = CollectionRegistry::from_file(&config.collection_file)?;
        Ok(BridgeService {
            config,
            network,
            registry,
        })
    }

    #[cfg(test)]
    pub fn with_registry(
        config: BridgeConfig,
        network: BitcoinNetwork,
        registry: CollectionRegistry,
    ) -> Self {
        BridgeService {
            config,
            network,
            registry,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn network(&self) -> BitcoinNetwork {
        self.network
    }

    pub fn registry(&self) -> &CollectionRegistry {
        &self.registry
    }

    /// Inspects one transaction for a collection burn and records a claim
    /// for it. Returns the status of the newly created claim, or `None` when
    /// the transaction is not a burn of a registered inscription or the
    /// claim already exists.
    pub async fn process_transaction<T: GenericClient>(
        &self,
        tx: &BitcoinTransactionData,
        block: &BlockIdentifier,
        client: &T,
    ) -> Result<Option<(String, ClaimStatus)>, String> {
        let Some(candidate) = detect_burn(
            tx,
            &self.config.burn_address,
            self.config.oracle_fee_address.as_deref(),
            self.network.to_bitcoin_network(),
        ) else {
            return Ok(None);
        };
        let Some(token_id) = self.registry.token_id_for(&candidate.inscription_id) else {
            return Ok(None);
        };

        let status = if self.config.min_fee_sats > 0 && candidate.fee_paid < self.config.min_fee_sats
        {
            ClaimStatus::Underpaid
        } else {
            ClaimStatus::Detected
        };
        let now = now_ms();
        let claim = DbBurnClaim {
            inscription_id: candidate.inscription_id.clone(),
            collection_name: self.config.collection_name.clone(),
            token_id: token_id as i64,
            sender_address: candidate.sender_address,
            burn_txid: candidate.burn_txid,
            burn_block_height: block.index as i64,
            burn_block_hash: block.hash.clone(),
            status,
            attest_txid: None,
            created_at: now,
            updated_at: now,
        };
        let inserted = bridge_pg::insert_claim(&claim, client).await?;
        Ok(inserted.then_some((candidate.inscription_id, status)))
    }

    /// Confirmation sweep, run after each indexed block.
    pub async fn confirm<T: GenericClient>(
        &self,
        current_height: u64,
        client: &T,
    ) -> Result<u64, String> {
        bridge_pg::confirm_eligible_claims(
            current_height,
            self.config.required_confirmations,
            client,
        )
        .await
    }

    pub async fn retry_failed<T: GenericClient>(&self, client: &T) -> Result<u64, String> {
        bridge_pg::retry_failed_claims(client).await
    }

    pub async fn ready_for_attestation<T: GenericClient>(
        &self,
        client: &T,
    ) -> Result<Vec<DbBurnClaim>, String> {
        bridge_pg::get_claims_by_status(ClaimStatus::Confirmed, client).await
    }

    /// Terminal transition; a no-op when the claim was already attested.
    pub async fn mark_attested<T: GenericClient>(
        &self,
        inscription_id: &str,
        attest_txid: &str,
        client: &T,
    ) -> Result<(), String> {
        bridge_pg::mark_claim_attested(inscription_id, attest_txid, client).await?;
        Ok(())
    }

    pub async fn mark_failed<T: GenericClient>(
        &self,
        inscription_id: &str,
        client: &T,
    ) -> Result<(), String> {
        bridge_pg::update_claim_status(
            inscription_id,
            &[ClaimStatus::Confirmed],
            ClaimStatus::Failed,
            client,
        )
        .await?;
        Ok(())
    }

    pub async fn get_claim<T: GenericClient>(
        &self,
        inscription_id: &str,
        client: &T,
    ) -> Result<Option<DbBurnClaim>, String> {
        bridge_pg::get_claim(inscription_id, client).await
    }

    pub async fn get_claims_by_sender<T: GenericClient>(
        &self,
        sender_address: &str,
        limit: i64,
        offset: i64,
        client: &T,
    ) -> Result<Vec<DbBurnClaim>, String> {
        bridge_pg::get_claims_by_sender(sender_address, limit, offset, client).await
    }

    /// Drops `detected` claims orphaned by a reorg at `block_height`.
    /// Everything else is preserved: underpaid and failed claims are
    /// user-visible records, confirmed and attested claims may already have
    /// a mint broadcast on the other chain.
    pub async fn rollback<T: GenericClient>(
        &self,
        block_height: u64,
        client: &T,
    ) -> Result<u64, String> {
        bridge_pg::delete_detected_claims_from_height(block_height, client).await
    }

    pub async fn stats<T: GenericClient>(&self, client: &T) -> Result<BridgeStats, String> {
        let total_claims = bridge_pg::get_claim_count(client).await?;
        let counts = bridge_pg::get_claim_status_counts(client).await?;
        let count_for = |status: ClaimStatus| {
            counts
                .iter()
                .find(|(s, _)| *s == status)
                .map(|(_, count)| *count)
                .unwrap_or(0)
        };
        Ok(BridgeStats {
            total_claims,
            detected: count_for(ClaimStatus::Detected),
            underpaid: count_for(ClaimStatus::Underpaid),
            confirmed: count_for(ClaimStatus::Confirmed),
            attested: count_for(ClaimStatus::Attested),
            failed: count_for(ClaimStatus::Failed),
            collection_size: self.registry.len(),
            burn_address: self.config.burn_address.clone(),
            required_confirmations: self.config.required_confirmations,
            min_fee_sats: self.config.min_fee_sats,
        })
    }
}
