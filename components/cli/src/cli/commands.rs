use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[clap(name = "ordbridge", author, version, about, long_about = None)]
pub enum Opts {
    /// Run the indexer, bridge and API
    #[clap(subcommand)]
    Service(ServiceCommand),
    /// Perform maintenance operations on the local index
    #[clap(subcommand)]
    Index(IndexCommand),
    /// Database operations
    #[clap(subcommand)]
    Database(DatabaseCommand),
}

#[derive(Subcommand, PartialEq, Clone, Debug)]
pub enum ServiceCommand {
    /// Start the service
    #[clap(name = "start", bin_name = "start")]
    Start(StartServiceCommand),
}

#[derive(Parser, PartialEq, Clone, Debug)]
pub struct StartServiceCommand {}

#[derive(Subcommand, PartialEq, Clone, Debug)]
pub enum IndexCommand {
    /// Rollback index blocks
    #[clap(name = "rollback", bin_name = "rollback")]
    Rollback(RollbackIndexCommand),
}

#[derive(Parser, PartialEq, Clone, Debug)]
pub struct RollbackIndexCommand {
    /// Number of blocks to rollback from the index tip
    pub blocks: u32,
}

#[derive(Subcommand, PartialEq, Clone, Debug)]
pub enum DatabaseCommand {
    /// Migrates the database
    #[clap(name = "migrate", bin_name = "migrate")]
    Migrate(MigrateDatabaseCommand),
}

#[derive(Parser, PartialEq, Clone, Debug)]
pub struct MigrateDatabaseCommand {}
