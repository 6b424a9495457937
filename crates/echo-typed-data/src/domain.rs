// domain.rs — EIP-712 domain and the deployment a policy is signed for.

use alloy_primitives::{address, keccak256, Address, B256, U256};
use serde::{Deserialize, Serialize};

/// Type string of the EIP-712 domain struct.
pub const DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

/// The EIP-712 domain separating Echo policy signatures from any other
/// typed data the same key might sign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Eip712Domain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: Address,
}

impl Eip712Domain {
    /// `hashStruct(domain)`.
    pub fn separator(&self) -> B256 {
        let mut buf = Vec::with_capacity(32 * 5);
        buf.extend_from_slice(keccak256(DOMAIN_TYPE.as_bytes()).as_slice());
        buf.extend_from_slice(keccak256(self.name.as_bytes()).as_slice());
        buf.extend_from_slice(keccak256(self.version.as_bytes()).as_slice());
        buf.extend_from_slice(&U256::from(self.chain_id).to_be_bytes::<32>());
        buf.extend_from_slice(self.verifying_contract.into_word().as_slice());
        keccak256(&buf)
    }
}

impl Default for Eip712Domain {
    fn default() -> Self {
        Self {
            name: "Echo Policy Demo".to_string(),
            version: "1".to_string(),
            chain_id: 11_155_111,
            verifying_contract: Address::ZERO,
        }
    }
}

/// The token every spend limit is denominated in.
///
/// `decimals` must equal `TokenAmount::DECIMALS`; config loading rejects
/// anything else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementToken {
    pub symbol: String,
    pub address: Address,
    pub decimals: u32,
}

impl Default for SettlementToken {
    /// USDC on Sepolia.
    fn default() -> Self {
        Self {
            symbol: "USDC".to_string(),
            address: address!("1c7D4B196Cb0C7B01d743Fbc6116a902379C7238"),
            decimals: 6,
        }
    }
}

/// Everything about the target deployment that ends up in a signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Deployment {
    pub domain: Eip712Domain,
    pub token: SettlementToken,
    pub endpoint_tag: String,
}

impl Default for Deployment {
    fn default() -> Self {
        Self {
            domain: Eip712Domain::default(),
            token: SettlementToken::default(),
            endpoint_tag: "demo-merchant".to_string(),
        }
    }
}
