use ordbridge_postgres::FromPgRow;
use tokio_postgres::GenericClient;

use super::models::{ClaimStatus, DbBurnClaim};
use crate::utils::now_ms;

/// Inserts a claim. Returns `false` when a claim for the inscription already
/// exists, in which case the row is left untouched.
pub async fn insert_claim<T: GenericClient>(
    claim: &DbBurnClaim,
    client: &T,
) -> Result<bool, String> {
    let affected = client
        .execute(
            "INSERT INTO burn_claims
            (inscription_id, collection_name, token_id, sender_address, burn_txid, burn_block_height,
            burn_block_hash, status, attest_txid, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (inscription_id) DO NOTHING",
            &[
                &claim.inscription_id,
                &claim.collection_name,
                &claim.token_id,
                &claim.sender_address,
                &claim.burn_txid,
                &claim.burn_block_height,
                &claim.burn_block_hash,
                &claim.status.as_str(),
                &claim.attest_txid,
                &claim.created_at,
                &claim.updated_at,
            ],
        )
        .await
        .map_err(|e| format!("insert_claim: {e}"))?;
    Ok(affected == 1)
}

pub async fn get_claim<T: GenericClient>(
    inscription_id: &str,
    client: &T,
) -> Result<Option<DbBurnClaim>, String> {
    let row = client
        .query_opt(
            "SELECT * FROM burn_claims WHERE inscription_id = $1",
            &[&inscription_id],
        )
        .await
        .map_err(|e| format!("get_claim: {e}"))?;
    Ok(row.map(|row| DbBurnClaim::from_pg_row(&row)))
}

pub async fn get_claims_by_sender<T: GenericClient>(
    sender_address: &str,
    limit: i64,
    offset: i64,
    client: &T,
) -> Result<Vec<DbBurnClaim>, String> {
    let rows = client
        .query(
            "SELECT * FROM burn_claims WHERE sender_address = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3",
            &[&sender_address, &limit.max(0), &offset.max(0)],
        )
        .await
        .map_err(|e| format!("get_claims_by_sender: {e}"))?;
    Ok(rows.iter().map(DbBurnClaim::from_pg_row).collect())
}

/// Claims in `status`, oldest burns first so attestation order follows burn
/// order.
pub async fn get_claims_by_status<T: GenericClient>(
    status: ClaimStatus,
    client: &T,
) -> Result<Vec<DbBurnClaim>, String> {
    let rows = client
        .query(
            "SELECT * FROM burn_claims WHERE status = $1 ORDER BY burn_block_height ASC, inscription_id ASC",
            &[&status.as_str()],
        )
        .await
        .map_err(|e| format!("get_claims_by_status: {e}"))?;
    Ok(rows.iter().map(DbBurnClaim::from_pg_row).collect())
}

/// Promotes every `detected` claim with enough confirmations at
/// `current_height`. Returns the count promoted.
pub async fn confirm_eligible_claims<T: GenericClient>(
    current_height: u64,
    required_confirmations: u32,
    client: &T,
) -> Result<u64, String> {
    let eligible_height = current_height as i64 - required_confirmations as i64;
    if eligible_height < 0 {
        return Ok(0);
    }
    client
        .execute(
            "UPDATE burn_claims SET status = 'confirmed', updated_at = $1
            WHERE status = 'detected' AND burn_block_height <= $2",
            &[&now_ms(), &eligible_height],
        )
        .await
        .map_err(|e| format!("confirm_eligible_claims: {e}"))
}

/// Flips every `failed` claim back to `confirmed` so the attestation worker
/// picks it up on its next cycle. Returns the count flipped.
pub async fn retry_failed_claims<T: GenericClient>(client: &T) -> Result<u64, String> {
    client
        .execute(
            "UPDATE burn_claims SET status = 'confirmed', updated_at = $1 WHERE status = 'failed'",
            &[&now_ms()],
        )
        .await
        .map_err(|e| format!("retry_failed_claims: {e}"))
}

/// Transitions one claim from any of `from` to `to`. Returns `false` when
/// the claim is missing or not in an accepted source status.
pub async fn update_claim_status<T: GenericClient>(
    inscription_id: &str,
    from: &[ClaimStatus],
    to: ClaimStatus,
    client: &T,
) -> Result<bool, String> {
    let from: Vec<&str> = from.iter().map(|status| status.as_str()).collect();
    let affected = client
        .execute(
            "UPDATE burn_claims SET status = $1, updated_at = $2
            WHERE inscription_id = $3 AND status = ANY($4)",
            &[&to.as_str(), &now_ms(), &inscription_id, &from],
        )
        .await
        .map_err(|e| format!("update_claim_status: {e}"))?;
    Ok(affected == 1)
}

/// Marks a confirmed claim attested with the mint transaction id.
pub async fn mark_claim_attested<T: GenericClient>(
    inscription_id: &str,
    attest_txid: &str,
    client: &T,
) -> Result<bool, String> {
    let affected = client
        .execute(
            "UPDATE burn_claims SET status = 'attested', attest_txid = $1, updated_at = $2
            WHERE inscription_id = $3 AND status = 'confirmed'",
            &[&attest_txid, &now_ms(), &inscription_id],
        )
        .await
        .map_err(|e| format!("mark_claim_attested: {e}"))?;
    Ok(affected == 1)
}

/// Reorg rollback: deletes only `detected` claims at or above
/// `block_height`. Underpaid, confirmed, attested and failed claims are
/// preserved.
pub async fn delete_detected_claims_from_height<T: GenericClient>(
    block_height: u64,
    client: &T,
) -> Result<u64, String> {
    client
        .execute(
            "DELETE FROM burn_claims WHERE status = 'detected' AND burn_block_height >= $1",
            &[&(block_height as i64)],
        )
        .await
        .map_err(|e| format!("delete_detected_claims_from_height: {e}"))
}

pub async fn get_claim_count<T: GenericClient>(client: &T) -> Result<i64, String> {
    let row = client
        .query_one("SELECT COUNT(*) AS count FROM burn_claims", &[])
        .await
        .map_err(|e| format!("get_claim_count: {e}"))?;
    Ok(row.get("count"))
}

pub async fn get_claim_status_counts<T: GenericClient>(
    client: &T,
) -> Result<Vec<(ClaimStatus, i64)>, String> {
    let rows = client
        .query(
            "SELECT status, COUNT(*) AS count FROM burn_claims GROUP BY status",
            &[],
        )
        .await
        .map_err(|e| format!("get_claim_status_counts: {e}"))?;
    Ok(rows
        .iter()
        .filter_map(|row| {
            let status: String = row.get("status");
            Some((status.parse().ok()?, row.get("count")))
        })
        .collect())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db::{pg_test_connection, pg_test_reset_and_migrate};

    pub fn test_claim(inscription_id: &str, height: i64, status: ClaimStatus) -> DbBurnClaim {
        DbBurnClaim {
            inscription_id: inscription_id.to_string(),
            collection_name: "Test Apes".to_string(),
            token_id: 7,
            sender_address: "bcrt1psender".to_string(),
            burn_txid: "f".repeat(64),
            burn_block_height: height,
            burn_block_hash: format!("hash{height}"),
            status,
            attest_txid: None,
            created_at: now_ms(),
            updated_at: now_ms(),
        }
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_claims() {
        let mut pg_client = pg_test_connection().await;
        pg_test_reset_and_migrate(&mut pg_client).await;

        let claim = test_claim("abci0", 100, ClaimStatus::Detected);
        assert!(insert_claim(&claim, &pg_client).await.unwrap());
        let mut duplicate = claim.clone();
        duplicate.status = ClaimStatus::Underpaid;
        assert!(!insert_claim(&duplicate, &pg_client).await.unwrap());

        let stored = get_claim("abci0", &pg_client).await.unwrap().unwrap();
        assert_eq!(stored.status, ClaimStatus::Detected);
    }

    #[tokio::test]
    async fn confirmation_sweep_promotes_only_mature_detected_claims() {
        let mut pg_client = pg_test_connection().await;
        pg_test_reset_and_migrate(&mut pg_client).await;

        insert_claim(&test_claim("maturei0", 100, ClaimStatus::Detected), &pg_client)
            .await
            .unwrap();
        insert_claim(&test_claim("freshi0", 103, ClaimStatus::Detected), &pg_client)
            .await
            .unwrap();
        insert_claim(
            &test_claim("underpaidi0", 90, ClaimStatus::Underpaid),
            &pg_client,
        )
        .await
        .unwrap();

        let promoted = confirm_eligible_claims(106, 6, &pg_client).await.unwrap();
        assert_eq!(promoted, 1);
        let mature = get_claim("maturei0", &pg_client).await.unwrap().unwrap();
        assert_eq!(mature.status, ClaimStatus::Confirmed);
        let fresh = get_claim("freshi0", &pg_client).await.unwrap().unwrap();
        assert_eq!(fresh.status, ClaimStatus::Detected);

        // An underpaid claim never matures, no matter the height.
        let promoted = confirm_eligible_claims(1_000_000, 6, &pg_client)
            .await
            .unwrap();
        assert_eq!(promoted, 1);
        let underpaid = get_claim("underpaidi0", &pg_client).await.unwrap().unwrap();
        assert_eq!(underpaid.status, ClaimStatus::Underpaid);
    }

    #[tokio::test]
    async fn attested_transition_requires_confirmed_status() {
        let mut pg_client = pg_test_connection().await;
        pg_test_reset_and_migrate(&mut pg_client).await;

        insert_claim(&test_claim("claimi0", 100, ClaimStatus::Detected), &pg_client)
            .await
            .unwrap();
        assert!(!mark_claim_attested("claimi0", "mint_tx", &pg_client)
            .await
            .unwrap());

        confirm_eligible_claims(106, 6, &pg_client).await.unwrap();
        assert!(mark_claim_attested("claimi0", "mint_tx", &pg_client)
            .await
            .unwrap());
        let claim = get_claim("claimi0", &pg_client).await.unwrap().unwrap();
        assert_eq!(claim.status, ClaimStatus::Attested);
        assert_eq!(claim.attest_txid.as_deref(), Some("mint_tx"));

        // Terminal no-op under retry.
        assert!(!mark_claim_attested("claimi0", "other_tx", &pg_client)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn retry_flips_failed_claims_back_to_confirmed() {
        let mut pg_client = pg_test_connection().await;
        pg_test_reset_and_migrate(&mut pg_client).await;

        insert_claim(&test_claim("claimi0", 100, ClaimStatus::Detected), &pg_client)
            .await
            .unwrap();
        confirm_eligible_claims(106, 6, &pg_client).await.unwrap();
        assert!(update_claim_status(
            "claimi0",
            &[ClaimStatus::Confirmed],
            ClaimStatus::Failed,
            &pg_client
        )
        .await
        .unwrap());

        assert_eq!(retry_failed_claims(&pg_client).await.unwrap(), 1);
        let claim = get_claim("claimi0", &pg_client).await.unwrap().unwrap();
        assert_eq!(claim.status, ClaimStatus::Confirmed);
    }

    #[tokio::test]
    async fn reorg_deletes_only_detected_claims_at_or_above_height() {
        let mut pg_client = pg_test_connection().await;
        pg_test_reset_and_migrate(&mut pg_client).await;

        insert_claim(&test_claim("detectedi0", 110, ClaimStatus::Detected), &pg_client)
            .await
            .unwrap();
        insert_claim(&test_claim("attestedi0", 108, ClaimStatus::Attested), &pg_client)
            .await
            .unwrap();
        insert_claim(&test_claim("earlieri0", 90, ClaimStatus::Detected), &pg_client)
            .await
            .unwrap();

        let deleted = delete_detected_claims_from_height(109, &pg_client)
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert!(get_claim("detectedi0", &pg_client).await.unwrap().is_none());
        assert!(get_claim("attestedi0", &pg_client).await.unwrap().is_some());
        assert!(get_claim("earlieri0", &pg_client).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn status_counts_cover_every_state() {
        let mut pg_client = pg_test_connection().await;
        pg_test_reset_and_migrate(&mut pg_client).await;

        for (id, status) in [
            ("ai0", ClaimStatus::Detected),
            ("bi0", ClaimStatus::Detected),
            ("ci0", ClaimStatus::Underpaid),
            ("di0", ClaimStatus::Attested),
        ] {
            insert_claim(&test_claim(id, 100, status), &pg_client)
                .await
                .unwrap();
        }

        assert_eq!(get_claim_count(&pg_client).await.unwrap(), 4);
        let counts = get_claim_status_counts(&pg_client).await.unwrap();
        let get = |status: ClaimStatus| {
            counts
                .iter()
                .find(|(s, _)| *s == status)
                .map(|(_, count)| *count)
                .unwrap_or(0)
        };
        assert_eq!(get(ClaimStatus::Detected), 2);
        assert_eq!(get(ClaimStatus::Underpaid), 1);
        assert_eq!(get(ClaimStatus::Attested), 1);
        assert_eq!(get(ClaimStatus::Failed), 0);
    }
}
