use std::collections::HashMap;

use ordbridge_postgres::FromPgRow;
use tokio_postgres::GenericClient;

use super::models::DbInscription;

pub const MAX_QUERY_LIMIT: i64 = 1000;
pub const MAX_LATEST_LIMIT: i64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InscriptionStats {
    pub inscriptions: i64,
    pub owners: i64,
    pub content_types: HashMap<String, i64>,
}

/// Inserts an inscription row. Returns `false` when a row with the same id
/// already exists; the caller must not consume an inscription number in that
/// case.
pub async fn insert_inscription<T: GenericClient>(
    inscription: &DbInscription,
    client: &T,
) -> Result<bool, String> {
    let affected = client
        .execute(
            "INSERT INTO inscriptions
            (id, content_type, content, block_height, block_hash, txid, vout, owner, timestamp, inscription_number)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO NOTHING",
            &[
                &inscription.id,
                &inscription.content_type,
                &inscription.content,
                &inscription.block_height,
                &inscription.block_hash,
                &inscription.txid,
                &inscription.vout,
                &inscription.owner,
                &inscription.timestamp,
                &inscription.inscription_number,
            ],
        )
        .await
        .map_err(|e| format!("insert_inscription: {e}"))?;
    Ok(affected == 1)
}

pub async fn get_inscription<T: GenericClient>(
    id: &str,
    client: &T,
) -> Result<Option<DbInscription>, String> {
    let row = client
        .query_opt("SELECT * FROM inscriptions WHERE id = $1", &[&id])
        .await
        .map_err(|e| format!("get_inscription: {e}"))?;
    Ok(row.map(|row| DbInscription::from_pg_row(&row)))
}

pub async fn get_inscriptions_by_owner<T: GenericClient>(
    owner: &str,
    limit: i64,
    offset: i64,
    client: &T,
) -> Result<Vec<DbInscription>, String> {
    let rows = client
        .query(
            "SELECT * FROM inscriptions WHERE owner = $1
            ORDER BY inscription_number DESC
            LIMIT $2 OFFSET $3",
            &[&owner, &limit.clamp(0, MAX_QUERY_LIMIT), &offset.max(0)],
        )
        .await
        .map_err(|e| format!("get_inscriptions_by_owner: {e}"))?;
    Ok(rows.iter().map(DbInscription::from_pg_row).collect())
}

pub async fn get_latest_inscriptions<T: GenericClient>(
    limit: i64,
    client: &T,
) -> Result<Vec<DbInscription>, String> {
    let rows = client
        .query(
            "SELECT * FROM inscriptions ORDER BY inscription_number DESC LIMIT $1",
            &[&limit.clamp(0, MAX_LATEST_LIMIT)],
        )
        .await
        .map_err(|e| format!("get_latest_inscriptions: {e}"))?;
    Ok(rows.iter().map(DbInscription::from_pg_row).collect())
}

pub async fn get_inscriptions_by_content_type<T: GenericClient>(
    content_type: &str,
    limit: i64,
    client: &T,
) -> Result<Vec<DbInscription>, String> {
    let rows = client
        .query(
            "SELECT * FROM inscriptions WHERE content_type = $1
            ORDER BY inscription_number DESC
            LIMIT $2",
            &[&content_type, &limit.clamp(0, MAX_QUERY_LIMIT)],
        )
        .await
        .map_err(|e| format!("get_inscriptions_by_content_type: {e}"))?;
    Ok(rows.iter().map(DbInscription::from_pg_row).collect())
}

pub async fn get_inscription_count<T: GenericClient>(client: &T) -> Result<i64, String> {
    let row = client
        .query_one("SELECT COUNT(*) AS count FROM inscriptions", &[])
        .await
        .map_err(|e| format!("get_inscription_count: {e}"))?;
    Ok(row.get("count"))
}

pub async fn get_highest_inscription_number<T: GenericClient>(
    client: &T,
) -> Result<Option<i64>, String> {
    let row = client
        .query_one(
            "SELECT MAX(inscription_number) AS max FROM inscriptions",
            &[],
        )
        .await
        .map_err(|e| format!("get_highest_inscription_number: {e}"))?;
    Ok(row.get("max"))
}

/// Highest indexed block height, if any block brought inscriptions.
pub async fn get_indexed_block_height<T: GenericClient>(client: &T) -> Result<Option<i64>, String> {
    let row = client
        .query_one("SELECT MAX(block_height) AS max FROM inscriptions", &[])
        .await
        .map_err(|e| format!("get_indexed_block_height: {e}"))?;
    Ok(row.get("max"))
}

pub async fn get_inscription_stats<T: GenericClient>(
    client: &T,
) -> Result<InscriptionStats, String> {
    let totals = client
        .query_one(
            "SELECT COUNT(*) AS inscriptions, COUNT(DISTINCT owner) AS owners FROM inscriptions",
            &[],
        )
        .await
        .map_err(|e| format!("get_inscription_stats: {e}"))?;
    let rows = client
        .query(
            "SELECT content_type, COUNT(*) AS count FROM inscriptions GROUP BY content_type",
            &[],
        )
        .await
        .map_err(|e| format!("get_inscription_stats: {e}"))?;
    Ok(InscriptionStats {
        inscriptions: totals.get("inscriptions"),
        owners: totals.get("owners"),
        content_types: rows
            .iter()
            .map(|row| (row.get("content_type"), row.get("count")))
            .collect(),
    })
}

/// Removes every inscription at or above `block_height`. Returns the number
/// of rows deleted.
pub async fn delete_inscriptions_from_height<T: GenericClient>(
    block_height: u64,
    client: &T,
) -> Result<u64, String> {
    client
        .execute(
            "DELETE FROM inscriptions WHERE block_height >= $1",
            &[&(block_height as i64)],
        )
        .await
        .map_err(|e| format!("delete_inscriptions_from_height: {e}"))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db::{pg_test_connection, pg_test_reset_and_migrate};

    fn test_inscription(id: &str, number: i64, height: i64, owner: &str) -> DbInscription {
        DbInscription {
            id: id.to_string(),
            content_type: "text/plain".to_string(),
            content: b"Hello".to_vec(),
            block_height: height,
            block_hash: format!("hash{height}"),
            txid: id.split('i').next().unwrap().to_string(),
            vout: 0,
            owner: owner.to_string(),
            timestamp: 1_700_000_000,
            inscription_number: number,
        }
    }

    #[tokio::test]
    async fn insert_is_idempotent_and_reports_conflicts() {
        let mut pg_client = pg_test_connection().await;
        pg_test_reset_and_migrate(&mut pg_client).await;

        let inscription = test_inscription(&format!("{}i0", "a".repeat(64)), 0, 100, "bcrt1qowner");
        assert!(insert_inscription(&inscription, &pg_client).await.unwrap());
        assert!(!insert_inscription(&inscription, &pg_client).await.unwrap());
        assert_eq!(get_inscription_count(&pg_client).await.unwrap(), 1);

        let found = get_inscription(&inscription.id, &pg_client)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found, inscription);
    }

    #[tokio::test]
    async fn rollback_deletes_from_height_and_preserves_earlier_rows() {
        let mut pg_client = pg_test_connection().await;
        pg_test_reset_and_migrate(&mut pg_client).await;

        for (index, height) in [(0i64, 100i64), (1, 101), (2, 102), (3, 102)] {
            let id = format!("{:064}i0", index);
            insert_inscription(&test_inscription(&id, index, height, "bcrt1qowner"), &pg_client)
                .await
                .unwrap();
        }

        let deleted = delete_inscriptions_from_height(102, &pg_client)
            .await
            .unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(get_inscription_count(&pg_client).await.unwrap(), 2);
        assert_eq!(
            get_highest_inscription_number(&pg_client).await.unwrap(),
            Some(1)
        );
        assert_eq!(
            get_indexed_block_height(&pg_client).await.unwrap(),
            Some(101)
        );
    }

    #[tokio::test]
    async fn queries_filter_and_cap_results() {
        let mut pg_client = pg_test_connection().await;
        pg_test_reset_and_migrate(&mut pg_client).await;

        for index in 0..5i64 {
            let id = format!("{:064}i0", index);
            let owner = if index % 2 == 0 { "alice" } else { "bob" };
            let mut inscription = test_inscription(&id, index, 100 + index, owner);
            if index == 4 {
                inscription.content_type = "image/png".to_string();
            }
            insert_inscription(&inscription, &pg_client).await.unwrap();
        }

        let alices = get_inscriptions_by_owner("alice", 10, 0, &pg_client)
            .await
            .unwrap();
        assert_eq!(alices.len(), 3);
        assert!(alices.windows(2).all(|w| w[0].inscription_number > w[1].inscription_number));

        let latest = get_latest_inscriptions(2, &pg_client).await.unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].inscription_number, 4);

        let images = get_inscriptions_by_content_type("image/png", 10, &pg_client)
            .await
            .unwrap();
        assert_eq!(images.len(), 1);

        let stats = get_inscription_stats(&pg_client).await.unwrap();
        assert_eq!(stats.inscriptions, 5);
        assert_eq!(stats.owners, 2);
        assert_eq!(stats.content_types.get("text/plain"), Some(&4));
        assert_eq!(stats.content_types.get("image/png"), Some(&1));
    }
}
