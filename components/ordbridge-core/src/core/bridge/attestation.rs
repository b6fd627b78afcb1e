//! Worker turning confirmed burn claims into mint calls on the contract
//! chain, at most once per claim.

use std::sync::Arc;
use std::time::Duration;

use deadpool_postgres::Pool;
use sha3::{Digest, Keccak256};
use tokio::sync::watch;
use tokio_postgres::GenericClient;

use super::transport::{ContractCallParams, ContractTransport, UnspentOutput};
use super::BridgeService;
use crate::utils::Context;
use crate::{try_error, try_info, try_warn};
use ordbridge_postgres::pg_pool_client;

/// Claims attested per cycle. Chained unconfirmed outputs keep every call of
/// a cycle below Bitcoin's 25-ancestor mempool policy.
pub const MAX_BATCH_SIZE: usize = 20;

/// Ceiling on sats a single attestation may spend, bounding runaway fee
/// estimation on the transport side.
pub const MAX_SATS_PER_ATTESTATION: u64 = 100_000;

/// keccak256 of the inscription id bytes, the contract's 256-bit big-endian
/// claim key.
pub fn inscription_hash(inscription_id: &str) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(inscription_id.as_bytes());
    hasher.finalize().into()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleOutcome {
    pub attested: u64,
    pub failed: u64,
}

pub struct AttestationWorker {
    bridge: Arc<BridgeService>,
    transport: Arc<dyn ContractTransport>,
    pg_pool: Pool,
    ctx: Context,
}

impl AttestationWorker {
    pub fn new(
        bridge: Arc<BridgeService>,
        transport: Arc<dyn ContractTransport>,
        pg_pool: Pool,
        ctx: Context,
    ) -> Self {
        AttestationWorker {
            bridge,
            transport,
            pg_pool,
            ctx,
        }
    }

    /// Sweeps on an interval until the stop signal flips. The first sweep
    /// runs immediately so claims confirmed while the process was down are
    /// not delayed by a full interval.
    pub async fn run(
        &self,
        interval: Duration,
        mut stop_receiver: watch::Receiver<bool>,
    ) -> Result<(), String> {
        let mut timer = tokio::time::interval(interval);
        while !*stop_receiver.borrow_and_update() {
            tokio::select! {
                _ = timer.tick() => {}
                _ = stop_receiver.changed() => break,
            }
            let client = match pg_pool_client(&self.pg_pool).await {
                Ok(client) => client,
                Err(e) => {
                    try_error!(self.ctx, "Attestation worker: {e}");
                    continue;
                }
            };
            match self.run_cycle(&**client).await {
                Ok(outcome) if outcome.attested > 0 || outcome.failed > 0 => {
                    try_info!(
                        self.ctx,
                        "Attestation cycle complete: {} attested, {} failed",
                        outcome.attested,
                        outcome.failed
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    try_error!(self.ctx, "Attestation cycle error: {e}");
                }
            }
        }
        try_info!(self.ctx, "Stop signal received, attestation worker is shutting down");
        Ok(())
    }

    /// One sweep over the confirmed queue. Every claim's error is isolated:
    /// conversion, simulation and broadcast failures mark that claim failed
    /// and move on to the next.
    pub async fn run_cycle<T: GenericClient>(&self, client: &T) -> Result<CycleOutcome, String> {
        let mut claims = self.bridge.ready_for_attestation(client).await?;
        claims.truncate(MAX_BATCH_SIZE);
        if claims.is_empty() {
            return Ok(CycleOutcome::default());
        }

        let network = self.bridge.network().to_bitcoin_network();
        let mut outcome = CycleOutcome::default();
        let mut pending_utxos: Vec<UnspentOutput> = vec![];

        for claim in claims.iter() {
            let sender = match ord::address::taproot_witness_program(&claim.sender_address, network)
            {
                Ok(sender) => sender,
                Err(e) => {
                    try_warn!(
                        self.ctx,
                        "Claim {} has no usable sender: {e}",
                        claim.inscription_id
                    );
                    self.bridge.mark_failed(&claim.inscription_id, client).await?;
                    outcome.failed += 1;
                    continue;
                }
            };
            let hash = inscription_hash(&claim.inscription_id);
            let token_id = claim.token_id as u64;

            match self
                .transport
                .simulate_attest_burn(&sender, &hash, token_id)
                .await
            {
                Ok(simulation) if simulation.reverted => {
                    try_warn!(
                        self.ctx,
                        "Attestation of {} reverted in simulation: {}",
                        claim.inscription_id,
                        simulation.revert_reason.as_deref().unwrap_or("no reason")
                    );
                    self.bridge.mark_failed(&claim.inscription_id, client).await?;
                    outcome.failed += 1;
                    continue;
                }
                Ok(_) => {}
                Err(e) => {
                    try_warn!(
                        self.ctx,
                        "Attestation of {} failed to simulate: {e}",
                        claim.inscription_id
                    );
                    self.bridge.mark_failed(&claim.inscription_id, client).await?;
                    outcome.failed += 1;
                    continue;
                }
            }

            let params = ContractCallParams {
                max_sats_to_spend: MAX_SATS_PER_ATTESTATION,
                fee_rate: 0,
                priority_fee: 0,
                utxos: pending_utxos.clone(),
            };
            match self
                .transport
                .broadcast_attest_burn(&sender, &hash, token_id, params)
                .await
            {
                Ok(receipt) => {
                    // Chain the next call on this call's unconfirmed change.
                    pending_utxos = receipt.new_utxos;
                    self.bridge
                        .mark_attested(&claim.inscription_id, &receipt.txid, client)
                        .await?;
                    outcome.attested += 1;
                }
                Err(e) => {
                    try_warn!(
                        self.ctx,
                        "Attestation of {} failed to broadcast: {e}",
                        claim.inscription_id
                    );
                    self.bridge.mark_failed(&claim.inscription_id, client).await?;
                    outcome.failed += 1;
                }
            }
        }
        Ok(outcome)
    }
}
