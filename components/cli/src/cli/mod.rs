use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use commands::{DatabaseCommand, IndexCommand, Opts, ServiceCommand};
use config::{Config, DEFAULT_RPC_TIMEOUT_SECS};
use ordbridge::db::{inscriptions_pg, migrate_db};
use ordbridge::rpc::bitcoind::BitcoindRpcClient;
use ordbridge::service::Service;
use ordbridge::try_info;
use ordbridge::utils::Context;
use tokio::sync::watch;

mod commands;

pub fn main() {
    let logger = hiro_system_kit::log::setup_logger();
    let _guard = hiro_system_kit::log::setup_global_logger(logger.clone());
    let ctx = Context {
        logger: Some(logger),
        tracer: false,
    };

    let opts: Opts = match Opts::try_parse() {
        Ok(opts) => opts,
        Err(e) => {
            println!("{}", e);
            process::exit(1);
        }
    };

    if let Err(e) = hiro_system_kit::nestable_block_on(handle_command(opts, &ctx)) {
        error!(ctx.expect_logger(), "{e}");
        std::thread::sleep(std::time::Duration::from_millis(500));
        process::exit(1);
    }
}

fn confirm_rollback(current_chain_tip: i64, blocks_to_rollback: u32) -> Result<(), String> {
    println!("Index chain tip is at #{current_chain_tip}");
    println!(
        "{} blocks will be dropped. New index chain tip will be at #{}. Confirm? [Y/n]",
        blocks_to_rollback,
        current_chain_tip - blocks_to_rollback as i64
    );
    let mut buffer = String::new();
    std::io::stdin()
        .read_line(&mut buffer)
        .map_err(|e| e.to_string())?;
    if buffer.starts_with('n') {
        return Err("Rollback aborted".to_string());
    }
    Ok(())
}

/// Flips the stop signal on SIGINT/SIGTERM so every runloop drains at its
/// next safe point.
fn install_stop_signal_handler(ctx: &Context) -> watch::Receiver<bool> {
    let (stop_tx, stop_rx) = watch::channel(false);
    let moved_ctx = ctx.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        try_info!(moved_ctx, "Termination signal received, shutting down");
        let _ = stop_tx.send(true);
    }) {
        try_info!(ctx, "Unable to install signal handler: {e}");
    }
    stop_rx
}

async fn handle_command(opts: Opts, ctx: &Context) -> Result<(), String> {
    match opts {
        Opts::Service(subcmd) => match subcmd {
            ServiceCommand::Start(_) => {
                let config = Config::from_env()?;
                migrate_db(&config.database_url, ctx).await?;

                let stop_rx = install_stop_signal_handler(ctx);
                let block_source = Arc::new(BitcoindRpcClient::new(
                    &config.rpc_url,
                    Duration::from_secs(DEFAULT_RPC_TIMEOUT_SECS),
                )?);
                let service = Service::new(&config, ctx)?;
                try_info!(
                    ctx,
                    "Starting service on {} (bridge: {}, worker: {})",
                    config.network,
                    config.bridge_enabled(),
                    config.worker_enabled()
                );
                service.run(block_source, stop_rx).await
            }
        },
        Opts::Index(subcmd) => match subcmd {
            IndexCommand::Rollback(cmd) => {
                let config = Config::from_env()?;
                let mut pg_client = ordbridge_postgres::pg_connect(&config.database_url).await?;
                let chain_tip = inscriptions_pg::get_indexed_block_height(&pg_client)
                    .await?
                    .ok_or("Index is empty, nothing to rollback".to_string())?;
                confirm_rollback(chain_tip, cmd.blocks)?;

                let rollback_height = (chain_tip - cmd.blocks as i64 + 1).max(0) as u64;
                let service = Service::new(&config, ctx)?;
                let mut cursor = ordbridge::service::IndexerCursor {
                    current_height: rollback_height,
                    last_block_hash: String::new(),
                    inscription_counter: 0,
                };
                service.rollback(&mut cursor, &pg_client).await?;
                println!("{} blocks dropped", cmd.blocks);
                Ok(())
            }
        },
        Opts::Database(subcmd) => match subcmd {
            DatabaseCommand::Migrate(_) => {
                let config = Config::from_env()?;
                migrate_db(&config.database_url, ctx).await
            }
        },
    }
}
