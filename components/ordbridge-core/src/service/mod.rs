pub mod http;

use std::sync::Arc;
use std::time::Duration;

use config::{Config, DEFAULT_PG_POOL_SIZE};
use deadpool_postgres::Pool;
use ordbridge_types::BitcoinBlockData;
use tokio::sync::watch;
use tokio_postgres::GenericClient;

use crate::core::bridge::attestation::AttestationWorker;
use crate::core::bridge::transport::{ContractTransport, JsonRpcContractTransport};
use crate::core::bridge::BridgeService;
use crate::core::protocol::inscription_indexing::collect_transaction_reveals;
use crate::db::inscriptions_pg;
use crate::db::models::DbInscription;
use crate::rpc::{BlockFetchError, BlockSource};
use crate::utils::Context;
use crate::{try_debug, try_error, try_info, try_warn};
use ordbridge_postgres::{pg_pool, pg_pool_client};

/// Wait before re-requesting a block the chain has not produced yet.
const BLOCK_NOT_FOUND_SLEEP: Duration = Duration::from_secs(10);
/// Back-off after a transient RPC or database error.
const RETRY_SLEEP: Duration = Duration::from_secs(5);
pub const ATTESTATION_INTERVAL: Duration = Duration::from_secs(30);

/// The indexer's local position in the chain. `last_block_hash` stays empty
/// until the first block succeeds and after every rollback, which makes the
/// next block at `current_height` accepted unconditionally.
#[derive(Debug, Clone)]
pub struct IndexerCursor {
    pub current_height: u64,
    pub last_block_hash: String,
    pub inscription_counter: i64,
}

pub struct Service {
    pub config: Config,
    pub ctx: Context,
    pub pg_pool: Pool,
    pub bridge: Option<Arc<BridgeService>>,
}

impl Service {
    pub fn new(config: &Config, ctx: &Context) -> Result<Self, String> {
        let pg_pool = pg_pool(&config.database_url, DEFAULT_PG_POOL_SIZE)?;
        let bridge = match &config.bridge {
            Some(bridge_config) => Some(Arc::new(BridgeService::new(
                bridge_config.clone(),
                config.network,
            )?)),
            None => None,
        };
        Ok(Service {
            config: config.clone(),
            ctx: ctx.clone(),
            pg_pool,
            bridge,
        })
    }

    fn contract_transport(&self) -> Option<Arc<dyn ContractTransport>> {
        let worker = self.config.bridge.as_ref()?.worker.as_ref()?;
        Some(Arc::new(JsonRpcContractTransport::new(
            &self.config.rpc_url,
            &worker.contract_address,
            &worker.deployer_mnemonic,
        )))
    }

    /// Starts the HTTP surface and the attestation worker, then blocks on
    /// the indexer loop until the stop signal flips.
    pub async fn run(
        &self,
        block_source: Arc<dyn BlockSource>,
        stop_receiver: watch::Receiver<bool>,
    ) -> Result<(), String> {
        if self.config.api.enabled {
            let api = http::RestApi::new(
                self.pg_pool.clone(),
                self.bridge.clone(),
                self.ctx.clone(),
            );
            let port = self.config.api.port;
            let ctx = self.ctx.clone();
            let stop = stop_receiver.clone();
            tokio::spawn(async move {
                if let Err(e) = http::start_api_server(api, port, stop, &ctx).await {
                    try_error!(ctx, "API server error: {e}");
                }
            });
        }

        if let (Some(bridge), Some(transport)) = (self.bridge.clone(), self.contract_transport()) {
            let worker = AttestationWorker::new(
                bridge,
                transport,
                self.pg_pool.clone(),
                self.ctx.clone(),
            );
            let stop = stop_receiver.clone();
            tokio::spawn(async move {
                let _ = worker.run(ATTESTATION_INTERVAL, stop).await;
            });
        }

        self.run_indexer(block_source, stop_receiver).await
    }

    async fn run_indexer(
        &self,
        block_source: Arc<dyn BlockSource>,
        mut stop_receiver: watch::Receiver<bool>,
    ) -> Result<(), String> {
        let mut cursor = {
            let client = pg_pool_client(&self.pg_pool).await?;
            IndexerCursor {
                current_height: self.config.start_height,
                last_block_hash: String::new(),
                inscription_counter: inscriptions_pg::get_inscription_count(&**client).await?,
            }
        };
        try_info!(
            self.ctx,
            "Indexer starting at block #{} with {} inscriptions indexed",
            cursor.current_height,
            cursor.inscription_counter
        );

        while !*stop_receiver.borrow_and_update() {
            let block = match block_source.fetch_block(cursor.current_height).await {
                Ok(block) => block,
                Err(BlockFetchError::BlockNotFound) => {
                    try_debug!(
                        self.ctx,
                        "Block #{} not available yet",
                        cursor.current_height
                    );
                    sleep_or_stop(BLOCK_NOT_FOUND_SLEEP, &mut stop_receiver).await;
                    continue;
                }
                Err(BlockFetchError::Rpc(e)) => {
                    try_warn!(
                        self.ctx,
                        "Unable to fetch block #{}: {e}",
                        cursor.current_height
                    );
                    sleep_or_stop(RETRY_SLEEP, &mut stop_receiver).await;
                    continue;
                }
            };
            let client = match pg_pool_client(&self.pg_pool).await {
                Ok(client) => client,
                Err(e) => {
                    try_error!(self.ctx, "Database unavailable: {e}");
                    sleep_or_stop(RETRY_SLEEP, &mut stop_receiver).await;
                    continue;
                }
            };
            if let Err(e) = self.process_block(&block, &mut cursor, &**client).await {
                try_error!(
                    self.ctx,
                    "Error processing {}: {e}",
                    block.block_identifier
                );
                sleep_or_stop(RETRY_SLEEP, &mut stop_receiver).await;
            }
        }
        try_info!(self.ctx, "Stop signal received, indexer is shutting down");
        Ok(())
    }

    /// Indexes one block: inscriptions, burn claims, confirmation sweep,
    /// advance. When the block does not extend the last processed block the
    /// current height is rolled back instead and the cursor does not
    /// advance.
    pub async fn process_block<T: GenericClient>(
        &self,
        block: &BitcoinBlockData,
        cursor: &mut IndexerCursor,
        client: &T,
    ) -> Result<(), String> {
        if !cursor.last_block_hash.is_empty()
            && block.parent_block_identifier.hash != cursor.last_block_hash
        {
            try_warn!(
                self.ctx,
                "Chain tip diverged at block #{}, rolling back",
                cursor.current_height
            );
            return self.rollback(cursor, client).await;
        }

        let network = self.config.network.to_bitcoin_network();
        for tx in block.transactions.iter() {
            for reveal in collect_transaction_reveals(tx, network) {
                // A replayed block must not consume new inscription numbers.
                if inscriptions_pg::get_inscription(&reveal.id, client)
                    .await?
                    .is_some()
                {
                    continue;
                }
                let row = DbInscription::from_reveal(
                    &reveal,
                    &block.block_identifier,
                    block.timestamp,
                    cursor.inscription_counter,
                );
                if inscriptions_pg::insert_inscription(&row, client).await? {
                    cursor.inscription_counter += 1;
                    try_info!(
                        self.ctx,
                        "Inscription {} (#{}) revealed at block #{}",
                        row.id,
                        row.inscription_number,
                        block.block_identifier.index
                    );
                }
            }
            if let Some(bridge) = &self.bridge {
                if let Some((inscription_id, status)) = bridge
                    .process_transaction(tx, &block.block_identifier, client)
                    .await?
                {
                    try_info!(
                        self.ctx,
                        "Burn of {inscription_id} recorded as {status} at block #{}",
                        block.block_identifier.index
                    );
                }
            }
        }

        if let Some(bridge) = &self.bridge {
            let promoted = bridge
                .confirm(block.block_identifier.index, client)
                .await?;
            if promoted > 0 {
                try_info!(
                    self.ctx,
                    "{promoted} burn claims confirmed at block #{}",
                    block.block_identifier.index
                );
            }
        }

        cursor.last_block_hash = block.block_identifier.hash.clone();
        cursor.current_height += 1;
        Ok(())
    }

    /// Drops everything indexed at or above the cursor height and re-seeds
    /// the inscription counter from the surviving rows. The height is not
    /// advanced: the next iteration re-fetches it and gets the canonical
    /// block.
    pub async fn rollback<T: GenericClient>(
        &self,
        cursor: &mut IndexerCursor,
        client: &T,
    ) -> Result<(), String> {
        let height = cursor.current_height;
        let deleted = inscriptions_pg::delete_inscriptions_from_height(height, client).await?;
        cursor.inscription_counter = inscriptions_pg::get_inscription_count(client).await?;
        cursor.last_block_hash = String::new();
        let dropped_claims = match &self.bridge {
            Some(bridge) => bridge.rollback(height, client).await?,
            None => 0,
        };
        try_warn!(
            self.ctx,
            "Rolled back to block #{height}: {deleted} inscriptions and {dropped_claims} unconfirmed claims dropped"
        );
        Ok(())
    }
}

async fn sleep_or_stop(duration: Duration, stop_receiver: &mut watch::Receiver<bool>) {
    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = stop_receiver.changed() => {}
    }
}

#[cfg(test)]
mod test {
    use ordbridge_types::{
        BitcoinTransactionData, BlockIdentifier, OutPoint, TransactionIdentifier, TxIn, TxOut,
    };

    use super::*;
    use crate::core::protocol::inscription_indexing::test::envelope_witness;
    use crate::db::{pg_test_connection, pg_test_reset_and_migrate};

    fn test_service() -> Service {
        let mut config = Config::devnet_default();
        config.database_url = crate::db::pg_test_database_url();
        Service::new(&config, &Context::empty()).unwrap()
    }

    fn fresh_cursor(height: u64) -> IndexerCursor {
        IndexerCursor {
            current_height: height,
            last_block_hash: String::new(),
            inscription_counter: 0,
        }
    }

    fn reveal_tx(txid: &str, body: &[u8]) -> BitcoinTransactionData {
        BitcoinTransactionData {
            transaction_identifier: TransactionIdentifier::new(txid),
            inputs: vec![TxIn {
                previous_output: OutPoint {
                    txid: TransactionIdentifier::new(&"0".repeat(64)),
                    vout: 0,
                },
                witness: envelope_witness(b"text/plain", body),
            }],
            outputs: vec![TxOut {
                value: 546,
                script_pubkey: vec![],
                address: Some("bcrt1qowner".to_string()),
            }],
        }
    }

    fn block_with(
        height: u64,
        hash: &str,
        parent_hash: &str,
        transactions: Vec<BitcoinTransactionData>,
    ) -> BitcoinBlockData {
        BitcoinBlockData {
            block_identifier: BlockIdentifier {
                index: height,
                hash: hash.to_string(),
            },
            parent_block_identifier: BlockIdentifier {
                index: height.saturating_sub(1),
                hash: parent_hash.to_string(),
            },
            timestamp: 1_700_000_000,
            transactions,
        }
    }

    #[tokio::test]
    async fn assigns_dense_inscription_numbers_across_blocks() {
        let mut pg_client = pg_test_connection().await;
        pg_test_reset_and_migrate(&mut pg_client).await;
        let service = test_service();
        let mut cursor = fresh_cursor(100);

        let block_100 = block_with(
            100,
            "aaa",
            "parent",
            vec![reveal_tx(&"1".repeat(64), b"one"), reveal_tx(&"2".repeat(64), b"two")],
        );
        service
            .process_block(&block_100, &mut cursor, &pg_client)
            .await
            .unwrap();
        assert_eq!(cursor.current_height, 101);
        assert_eq!(cursor.inscription_counter, 2);

        let block_101 = block_with(101, "bbb", "aaa", vec![reveal_tx(&"3".repeat(64), b"three")]);
        service
            .process_block(&block_101, &mut cursor, &pg_client)
            .await
            .unwrap();
        assert_eq!(cursor.inscription_counter, 3);

        let third = inscriptions_pg::get_inscription(&format!("{}i0", "3".repeat(64)), &pg_client)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(third.inscription_number, 2);
        assert_eq!(third.block_height, 101);
        assert_eq!(third.owner, "bcrt1qowner");
    }

    #[tokio::test]
    async fn replayed_blocks_do_not_consume_numbers() {
        let mut pg_client = pg_test_connection().await;
        pg_test_reset_and_migrate(&mut pg_client).await;
        let service = test_service();
        let mut cursor = fresh_cursor(100);

        let block = block_with(100, "aaa", "parent", vec![reveal_tx(&"1".repeat(64), b"one")]);
        service
            .process_block(&block, &mut cursor, &pg_client)
            .await
            .unwrap();

        // Same block again, as after a crash before the height advanced.
        cursor.current_height = 100;
        cursor.last_block_hash = String::new();
        service
            .process_block(&block, &mut cursor, &pg_client)
            .await
            .unwrap();
        assert_eq!(cursor.inscription_counter, 1);
        assert_eq!(
            inscriptions_pg::get_inscription_count(&pg_client).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn diverged_parent_hash_rolls_back_without_advancing() {
        let mut pg_client = pg_test_connection().await;
        pg_test_reset_and_migrate(&mut pg_client).await;
        let service = test_service();
        let mut cursor = fresh_cursor(100);

        let block_100 = block_with(100, "aaa", "parent", vec![reveal_tx(&"1".repeat(64), b"one")]);
        let block_101 = block_with(101, "bbb", "aaa", vec![reveal_tx(&"2".repeat(64), b"two")]);
        service
            .process_block(&block_100, &mut cursor, &pg_client)
            .await
            .unwrap();
        service
            .process_block(&block_101, &mut cursor, &pg_client)
            .await
            .unwrap();
        assert_eq!(cursor.current_height, 102);

        // A competing block 102 whose parent is not block 101.
        let fork = block_with(102, "ccc", "not-bbb", vec![]);
        service
            .process_block(&fork, &mut cursor, &pg_client)
            .await
            .unwrap();
        assert_eq!(cursor.current_height, 102);
        assert_eq!(cursor.last_block_hash, "");
        assert_eq!(cursor.inscription_counter, 2);

        // The canonical 102 is accepted on the next pass.
        let canonical = block_with(102, "ddd", "bbb2", vec![reveal_tx(&"4".repeat(64), b"four")]);
        service
            .process_block(&canonical, &mut cursor, &pg_client)
            .await
            .unwrap();
        assert_eq!(cursor.current_height, 103);
        assert_eq!(cursor.inscription_counter, 3);
    }

    #[tokio::test]
    async fn rollback_resets_the_counter_to_the_surviving_count() {
        let mut pg_client = pg_test_connection().await;
        pg_test_reset_and_migrate(&mut pg_client).await;
        let service = test_service();
        let mut cursor = fresh_cursor(100);

        for (height, hash, parent, txid) in [
            (100u64, "aaa", "parent", "1"),
            (101, "bbb", "aaa", "2"),
            (102, "ccc", "bbb", "3"),
        ] {
            let block = block_with(height, hash, parent, vec![reveal_tx(&txid.repeat(64), b"x")]);
            service
                .process_block(&block, &mut cursor, &pg_client)
                .await
                .unwrap();
        }
        assert_eq!(cursor.inscription_counter, 3);

        cursor.current_height = 101;
        service.rollback(&mut cursor, &pg_client).await.unwrap();
        assert_eq!(cursor.inscription_counter, 1);
        assert_eq!(
            inscriptions_pg::get_inscription_count(&pg_client).await.unwrap(),
            1
        );
        assert_eq!(
            inscriptions_pg::get_highest_inscription_number(&pg_client)
                .await
                .unwrap(),
            Some(0)
        );
    }
}
