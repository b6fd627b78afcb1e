use bitcoin::Network;
use ord::inscription::Inscription;
use ord::inscription_id::InscriptionId;
use ordbridge_types::{BitcoinTransactionData, TxOut};

/// An inscription revealed by a transaction, before an inscription number
/// has been assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InscriptionReveal {
    /// `<txid>i<index>`, where the index counts envelopes found in this
    /// transaction.
    pub id: String,
    pub inscription: Inscription,
    pub txid: String,
    /// Address of the transaction's first output; empty when unrecoverable.
    pub owner: String,
}

/// Extracts every inscription revealed by `tx`, scanning each input's
/// witness in order. Each witness contributes at most one envelope.
pub fn collect_transaction_reveals(
    tx: &BitcoinTransactionData,
    network: Network,
) -> Vec<InscriptionReveal> {
    let txid = &tx.transaction_identifier.hash;
    let owner = tx
        .outputs
        .first()
        .map(|output| output_address(output, network))
        .unwrap_or_default();

    let mut reveals = vec![];
    for input in tx.inputs.iter() {
        let Some(inscription) = ord::envelope::parse_witness(&input.witness) else {
            continue;
        };
        reveals.push(InscriptionReveal {
            id: InscriptionId::new(txid, reveals.len() as u32).to_string(),
            inscription,
            txid: txid.clone(),
            owner: owner.clone(),
        });
    }
    reveals
}

/// Address paying `output`, preferring the block source's pre-decoded
/// address over classifying the script ourselves.
pub fn output_address(output: &TxOut, network: Network) -> String {
    match &output.address {
        Some(address) => address.clone(),
        None => ord::address::address_from_script(&output.script_pubkey, network),
    }
}
