//! Ethereum JSON-RPC backend for [`ChainClient`].

use std::time::Duration;

use alloy_core::primitives::{Address, B256, Bytes};
use anyhow::Context;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use url::Url;

use crate::chain::{ChainClient, ChainError, TransactionRequest, TxReceipt};

/// Default timeout for RPC requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Create an HTTP client configured for JSON-RPC requests.
pub fn create_client() -> Result<reqwest::Client, anyhow::Error> {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")
}

/// Make a JSON-RPC call and deserialize the result.
///
/// # Arguments
/// * `client` - The HTTP client to use
/// * `url` - The RPC endpoint URL
/// * `method` - The RPC method name
/// * `params` - The method parameters
///
/// # Returns
/// The deserialized result, or an error if the request failed or returned an error response.
/// Answers the node will repeat are reported as [`ChainError`].
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Vec<Value>,
) -> Result<T, anyhow::Error> {
    let response = client
        .post(url)
        .json(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .send()
        .await
        .with_context(|| format!("Failed to send {} request", method))?;

    let body: Value = response
        .json()
        .await
        .with_context(|| format!("Failed to parse {} response", method))?;

    Ok(decode_response(method, body)?)
}

/// Extract the `result` of a JSON-RPC response body.
///
/// Node error messages (including revert reasons) are kept verbatim.
fn decode_response<T: DeserializeOwned>(method: &str, body: Value) -> Result<T, ChainError> {
    if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
        return Err(ChainError::Rejected(
            error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown")
                .to_string(),
        ));
    }

    let malformed = |reason: String| ChainError::MalformedResponse {
        method: method.to_string(),
        reason,
    };
    let result = body
        .get("result")
        .cloned()
        .ok_or_else(|| malformed("no result in response".to_string()))?;

    serde_json::from_value(result).map_err(|e| malformed(e.to_string()))
}

/// Deserialize a u64 from a hex string (with 0x prefix).
fn deserialize_u64_from_hex<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    u64::from_str_radix(s.trim_start_matches("0x"), 16).map_err(serde::de::Error::custom)
}

/// Receipt fields we care about, as returned by `eth_getTransactionReceipt`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: B256,
    #[serde(deserialize_with = "deserialize_u64_from_hex")]
    block_number: u64,
    #[serde(deserialize_with = "deserialize_u64_from_hex")]
    status: u64,
    contract_address: Option<Address>,
}

impl From<RpcReceipt> for TxReceipt {
    fn from(receipt: RpcReceipt) -> Self {
        Self {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            success: receipt.status == 1,
            contract_address: receipt.contract_address,
        }
    }
}

/// A [`ChainClient`] talking to a node over HTTP JSON-RPC.
///
/// Transactions go through `eth_sendTransaction`, so the sending accounts must
/// be unlocked on the node (Hardhat, Anvil and other development nodes).
#[derive(Debug, Clone)]
pub struct RpcClient {
    client: reqwest::Client,
    url: Url,
}

impl RpcClient {
    pub fn new(url: Url) -> Result<Self, anyhow::Error> {
        Ok(Self {
            client: create_client()?,
            url,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, anyhow::Error> {
        json_rpc_call(&self.client, self.url.as_str(), method, params).await
    }
}

impl ChainClient for RpcClient {
    async fn chain_id(&self) -> anyhow::Result<u64> {
        let raw: String = self.request("eth_chainId", vec![]).await?;
        u64::from_str_radix(raw.trim_start_matches("0x"), 16)
            .with_context(|| format!("Invalid eth_chainId response: {raw}"))
    }

    async fn accounts(&self) -> anyhow::Result<Vec<Address>> {
        self.request("eth_accounts", vec![]).await
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> anyhow::Result<B256> {
        let params = serde_json::to_value(&tx).context("Failed to encode transaction")?;
        self.request("eth_sendTransaction", vec![params]).await
    }

    async fn transaction_receipt(&self, tx_hash: B256) -> anyhow::Result<Option<TxReceipt>> {
        let receipt: Option<RpcReceipt> = self
            .request(
                "eth_getTransactionReceipt",
                vec![serde_json::json!(tx_hash)],
            )
            .await?;
        Ok(receipt.map(TxReceipt::from))
    }

    async fn call(&self, to: Address, data: Bytes) -> anyhow::Result<Bytes> {
        self.request(
            "eth_call",
            vec![
                serde_json::json!({ "to": to, "data": data }),
                serde_json::json!("latest"),
            ],
        )
        .await
    }

    async fn code_at(&self, address: Address) -> anyhow::Result<Bytes> {
        self.request(
            "eth_getCode",
            vec![serde_json::json!(address), serde_json::json!("latest")],
        )
        .await
    }
}
