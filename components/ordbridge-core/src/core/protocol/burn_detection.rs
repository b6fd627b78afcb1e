use bitcoin::Network;
use ord::inscription_id::InscriptionId;
use ordbridge_types::BitcoinTransactionData;

use super::inscription_indexing::output_address;

/// A transaction shaped like a collection burn: the first output pays the
/// burn address and the first input spends the inscription-bearing outpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurnCandidate {
    /// `<prev_txid>i<prev_vout>` of the first input.
    pub inscription_id: String,
    /// Address of the second output; empty when the transaction has none.
    pub sender_address: String,
    /// Sats paid to the oracle fee address, 0 when no fee output matched or
    /// no oracle fee address is configured.
    pub fee_paid: u64,
    pub burn_txid: String,
}

pub fn detect_burn(
    tx: &BitcoinTransactionData,
    burn_address: &str,
    oracle_fee_address: Option<&str>,
    network: Network,
) -> Option<BurnCandidate> {
    let first_output = tx.outputs.first()?;
    if output_address(first_output, network) != burn_address {
        return None;
    }
    let first_input = tx.inputs.first()?;
    let inscription_id = InscriptionId::new(
        &first_input.previous_output.txid.hash,
        first_input.previous_output.vout,
    )
    .to_string();

    let (sender_address, fee_paid) = match tx.outputs.get(1) {
        Some(second_output) => {
            let address = output_address(second_output, network);
            let fee_paid = match oracle_fee_address {
                Some(oracle) if !address.is_empty() && address == oracle => second_output.value,
                _ => 0,
            };
            (address, fee_paid)
        }
        None => (String::new(), 0),
    };

    Some(BurnCandidate {
        inscription_id,
        sender_address,
        fee_paid,
        burn_txid: tx.transaction_identifier.hash.clone(),
    })
}

#[cfg(test)]
mod test {
    use ordbridge_types::{OutPoint, TransactionIdentifier, TxIn, TxOut};

    use super::*;

    const BURN: &str = "bcrt1qburnburnburn";
    const ORACLE: &str = "bcrt1qoracle";

    fn output_to(address: &str, value: u64) -> TxOut {
        TxOut {
            value,
            script_pubkey: vec![],
            address: Some(address.to_string()),
        }
    }

    fn burn_tx(outputs: Vec<TxOut>) -> BitcoinTransactionData {
        BitcoinTransactionData {
            transaction_identifier: TransactionIdentifier::new(&"d".repeat(64)),
            inputs: vec![TxIn {
                previous_output: OutPoint {
                    txid: TransactionIdentifier::new(&"e".repeat(64)),
                    vout: 3,
                },
                witness: vec![],
            }],
            outputs,
        }
    }

    #[test]
    fn detects_a_burn_with_sender_and_fee() {
        let tx = burn_tx(vec![output_to(BURN, 546), output_to(ORACLE, 5_000)]);
        let candidate = detect_burn(&tx, BURN, Some(ORACLE), Network::Regtest).unwrap();
        assert_eq!(candidate.inscription_id, format!("{}i3", "e".repeat(64)));
        assert_eq!(candidate.sender_address, ORACLE);
        assert_eq!(candidate.fee_paid, 5_000);
        assert_eq!(candidate.burn_txid, "d".repeat(64));
    }

    #[test]
    fn fee_is_zero_when_second_output_pays_someone_else() {
        let tx = burn_tx(vec![output_to(BURN, 546), output_to("bcrt1qchange", 5_000)]);
        let candidate = detect_burn(&tx, BURN, Some(ORACLE), Network::Regtest).unwrap();
        assert_eq!(candidate.sender_address, "bcrt1qchange");
        assert_eq!(candidate.fee_paid, 0);
    }

    #[test]
    fn fee_check_is_skipped_without_an_oracle_address() {
        let tx = burn_tx(vec![output_to(BURN, 546), output_to(ORACLE, 5_000)]);
        let candidate = detect_burn(&tx, BURN, None, Network::Regtest).unwrap();
        assert_eq!(candidate.fee_paid, 0);
    }

    #[test]
    fn sender_is_empty_without_a_second_output() {
        let tx = burn_tx(vec![output_to(BURN, 546)]);
        let candidate = detect_burn(&tx, BURN, Some(ORACLE), Network::Regtest).unwrap();
        assert_eq!(candidate.sender_address, "");
        assert_eq!(candidate.fee_paid, 0);
    }

    #[test]
    fn ignores_transactions_not_paying_the_burn_address() {
        let tx = burn_tx(vec![output_to("bcrt1qsomeone", 546)]);
        assert_eq!(detect_burn(&tx, BURN, Some(ORACLE), Network::Regtest), None);
    }

    #[test]
    fn ignores_transactions_without_outputs_or_inputs() {
        let tx = burn_tx(vec![]);
        assert_eq!(detect_burn(&tx, BURN, None, Network::Regtest), None);

        let mut no_inputs = burn_tx(vec![output_to(BURN, 546)]);
        no_inputs.inputs.clear();
        assert_eq!(detect_burn(&no_inputs, BURN, None, Network::Regtest), None);
    }
}
