//! Output script classification and address rendering.

use std::str::FromStr;

use bitcoin::{Address, Network, Script};

/// Renders the address paying `script`, or an empty string when the script
/// is not one of the recognized standard shapes. Never errors: callers treat
/// the owner address as informational.
pub fn address_from_script(script: &[u8], network: Network) -> String {
    if !is_supported_script(script) {
        return String::new();
    }
    Address::from_script(Script::from_bytes(script), network)
        .map(|address| address.to_string())
        .unwrap_or_default()
}

/// P2TR, P2WPKH, P2WSH, P2PKH and P2SH output scripts.
fn is_supported_script(script: &[u8]) -> bool {
    match script {
        [0x51, 0x20, program @ ..] => program.len() == 32,
        [0x00, 0x14, program @ ..] => program.len() == 20,
        [0x00, 0x20, program @ ..] => program.len() == 32,
        [0x76, 0xa9, 0x14, rest @ ..] => rest.len() == 22 && rest[20..] == [0x88, 0xac],
        [0xa9, 0x14, rest @ ..] => rest.len() == 21 && rest[20] == 0x87,
        _ => false,
    }
}

/// Decodes a bech32m taproot address into its 32-byte witness program, the
/// layout the bridge contract uses for Bitcoin senders.
pub fn taproot_witness_program(address: &str, network: Network) -> Result<[u8; 32], String> {
    let address = Address::from_str(address)
        .map_err(|e| format!("invalid address {address}: {e}"))?
        .require_network(network)
        .map_err(|e| format!("address {address} is not valid for {network}: {e}"))?;
    let program = address
        .witness_program()
        .ok_or_else(|| format!("address {address} is not segwit"))?;
    if !program.is_p2tr() {
        return Err(format!("address {address} is not taproot"));
    }
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(program.program().as_bytes());
    Ok(bytes)
}
