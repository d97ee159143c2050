//! Target network description.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::blockchain::ChainId;
use crate::provider::ProviderError;

/// Native currency metadata of a network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Everything a wallet needs to add or switch to a network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkDescriptor {
    pub chain_id: ChainId,
    pub chain_name: String,
    pub rpc_urls: Vec<String>,
    pub native_currency: NativeCurrency,
    pub block_explorer_urls: Vec<String>,
}

impl Default for NetworkDescriptor {
    /// UZH Ethereum PoW.
    fn default() -> Self {
        Self {
            chain_id: ChainId(702),
            chain_name: "UZH Ethereum PoW".to_string(),
            rpc_urls: vec!["https://rpc.uzhethw.ifi.uzh.ch".to_string()],
            native_currency: NativeCurrency {
                name: "UZHETHw".to_string(),
                symbol: "UZHETHw".to_string(),
                decimals: 18,
            },
            block_explorer_urls: vec!["https://uzhethw.ifi.uzh.ch".to_string()],
        }
    }
}

/// `wallet_addEthereumChain` parameter object (EIP-3085).
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddEthereumChainParameter {
    chain_id: String,
    chain_name: String,
    rpc_urls: Vec<String>,
    native_currency: NativeCurrency,
    #[serde(default)]
    block_explorer_urls: Vec<String>,
}

impl NetworkDescriptor {
    /// Params array for `wallet_switchEthereumChain`.
    pub fn switch_chain_params(&self) -> Value {
        json!([{ "chainId": self.chain_id.to_hex() }])
    }

    /// Params array for `wallet_addEthereumChain`.
    pub fn add_chain_params(&self) -> Value {
        let param = AddEthereumChainParameter {
            chain_id: self.chain_id.to_hex(),
            chain_name: self.chain_name.clone(),
            rpc_urls: self.rpc_urls.clone(),
            native_currency: self.native_currency.clone(),
            block_explorer_urls: self.block_explorer_urls.clone(),
        };
        json!([param])
    }

    /// Read the first element of a `wallet_addEthereumChain` params array.
    pub fn from_add_chain_params(params: &Value) -> Result<Self, ProviderError> {
        let first = params
            .get(0)
            .cloned()
            .ok_or_else(|| ProviderError::invalid_params("expected one chain parameter object"))?;
        let param: AddEthereumChainParameter = serde_json::from_value(first)
            .map_err(|e| ProviderError::invalid_params(format!("malformed chain parameter: {}", e)))?;
        let chain_id = ChainId::parse(&param.chain_id)
            .ok_or_else(|| ProviderError::invalid_params(format!("invalid chainId '{}'", param.chain_id)))?;

        Ok(Self {
            chain_id,
            chain_name: param.chain_name,
            rpc_urls: param.rpc_urls,
            native_currency: param.native_currency,
            block_explorer_urls: param.block_explorer_urls,
        })
    }

    /// Read the target chain of a `wallet_switchEthereumChain` params array.
    pub fn chain_from_switch_params(params: &Value) -> Result<ChainId, ProviderError> {
        params
            .get(0)
            .and_then(|p| p.get("chainId"))
            .and_then(ChainId::from_json)
            .ok_or_else(|| ProviderError::invalid_params("expected [{ chainId }]"))
    }
}
