use ordbridge_postgres::FromPgRow;
use ordbridge_types::BlockIdentifier;
use tokio_postgres::Row;

use crate::core::protocol::inscription_indexing::InscriptionReveal;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbInscription {
    pub id: String,
    pub content_type: String,
    pub content: Vec<u8>,
    pub block_height: i64,
    pub block_hash: String,
    pub txid: String,
    pub vout: i32,
    pub owner: String,
    pub timestamp: i64,
    pub inscription_number: i64,
}

impl DbInscription {
    pub fn from_reveal(
        reveal: &InscriptionReveal,
        block: &BlockIdentifier,
        timestamp: u32,
        inscription_number: i64,
    ) -> Self {
        DbInscription {
            id: reveal.id.clone(),
            content_type: reveal
                .inscription
                .content_type()
                .unwrap_or_default()
                .to_string(),
            content: reveal.inscription.body().unwrap_or_default().to_vec(),
            block_height: block.index as i64,
            block_hash: block.hash.clone(),
            txid: reveal.txid.clone(),
            vout: 0,
            owner: reveal.owner.clone(),
            timestamp: timestamp as i64,
            inscription_number,
        }
    }
}

impl FromPgRow for DbInscription {
    fn from_pg_row(row: &Row) -> Self {
        DbInscription {
            id: row.get("id"),
            content_type: row.get("content_type"),
            content: row.get("content"),
            block_height: row.get("block_height"),
            block_hash: row.get("block_hash"),
            txid: row.get("txid"),
            vout: row.get("vout"),
            owner: row.get("owner"),
            timestamp: row.get("timestamp"),
            inscription_number: row.get("inscription_number"),
        }
    }
}
