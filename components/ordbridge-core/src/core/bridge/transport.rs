//! Transport used to reach the bridge contract on the secondary chain. The
//! transport builds, signs and broadcasts the actual transaction; this crate
//! only decides what to call and with which spending constraints.

use async_trait::async_trait;
use serde_json::json;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SimulationOutcome {
    #[serde(default)]
    pub reverted: bool,
    #[serde(default)]
    pub revert_reason: Option<String>,
}

/// An unconfirmed output usable as an input for the next contract call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnspentOutput {
    pub txid: String,
    pub vout: u32,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractCallParams {
    pub max_sats_to_spend: u64,
    pub fee_rate: u64,
    pub priority_fee: u64,
    /// Unconfirmed change from the previous call in this cycle; empty on the
    /// first call, letting the transport pick funding outputs itself.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub utxos: Vec<UnspentOutput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContractCallReceipt {
    pub txid: String,
    #[serde(default)]
    pub new_utxos: Vec<UnspentOutput>,
}

#[async_trait]
pub trait ContractTransport: Send + Sync {
    /// Dry-runs `attestBurn(sender, inscription_hash, token_id)` against the
    /// contract.
    async fn simulate_attest_burn(
        &self,
        sender: &[u8; 32],
        inscription_hash: &[u8; 32],
        token_id: u64,
    ) -> Result<SimulationOutcome, String>;

    /// Signs and broadcasts the call, returning the transaction id and the
    /// unconfirmed outputs the next call may chain on.
    async fn broadcast_attest_burn(
        &self,
        sender: &[u8; 32],
        inscription_hash: &[u8; 32],
        token_id: u64,
        params: ContractCallParams,
    ) -> Result<ContractCallReceipt, String>;
}

/// JSON-RPC transport against the contract chain's node. The deployer's key
/// material never leaves the node's signing endpoint configuration.
pub struct JsonRpcContractTransport {
    http_client: reqwest::Client,
    rpc_url: String,
    contract_address: String,
    deployer_mnemonic: String,
}

impl JsonRpcContractTransport {
    pub fn new(rpc_url: &str, contract_address: &str, deployer_mnemonic: &str) -> Self {
        JsonRpcContractTransport {
            http_client: reqwest::Client::new(),
            rpc_url: rpc_url.to_string(),
            contract_address: contract_address.to_string(),
            deployer_mnemonic: deployer_mnemonic.to_string(),
        }
    }

    async fn rpc_call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, String> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 0,
            "method": method,
            "params": params,
        });
        let response = self
            .http_client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("contract rpc unreachable: {e}"))?;
        let response: serde_json::Value = response
            .json()
            .await
            .map_err(|e| format!("contract rpc returned malformed json: {e}"))?;
        if let Some(error) = response.get("error") {
            return Err(format!("contract rpc error: {error}"));
        }
        serde_json::from_value(response.get("result").cloned().unwrap_or_default())
            .map_err(|e| format!("contract rpc returned unexpected result: {e}"))
    }

    fn call_args(&self, sender: &[u8; 32], inscription_hash: &[u8; 32], token_id: u64) -> serde_json::Value {
        json!({
            "to": self.contract_address,
            "method": "attestBurn",
            "args": {
                "sender": hex::encode(sender),
                "inscription_hash": hex::encode(inscription_hash),
                "token_id": token_id,
            },
        })
    }
}

#[async_trait]
impl ContractTransport for JsonRpcContractTransport {
    async fn simulate_attest_burn(
        &self,
        sender: &[u8; 32],
        inscription_hash: &[u8; 32],
        token_id: u64,
    ) -> Result<SimulationOutcome, String> {
        self.rpc_call(
            "btc_simulate",
            self.call_args(sender, inscription_hash, token_id),
        )
        .await
    }

    async fn broadcast_attest_burn(
        &self,
        sender: &[u8; 32],
        inscription_hash: &[u8; 32],
        token_id: u64,
        params: ContractCallParams,
    ) -> Result<ContractCallReceipt, String> {
        let mut args = self.call_args(sender, inscription_hash, token_id);
        args["signer_mnemonic"] = json!(self.deployer_mnemonic);
        args["params"] = serde_json::to_value(&params).map_err(|e| e.to_string())?;
        self.rpc_call("btc_sendCall", args).await
    }
}
