//! Transaction request and receipt types.
//!
//! `TransactionRequest` is the JSON shape wallets accept for
//! `eth_sendTransaction`: camelCase keys, hex quantities, `data` for calldata.

use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

/// Transaction hash alias used across the derived modules.
pub type TxHash = B256;

/// Unsigned transaction handed to the wallet for signing and broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    /// Sender; filled from the connected session when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    /// Recipient; `None` deploys a contract.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    /// Calldata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,
    /// Wei attached to the call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    /// Gas limit; left to the wallet when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas: Option<U256>,
}

impl TransactionRequest {
    pub fn to(mut self, to: Address) -> Self {
        self.to = Some(to);
        self
    }

    pub fn data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn value(mut self, value: U256) -> Self {
        self.value = Some(value);
        self
    }

    /// Return a copy with `from` set, keeping an explicit sender if present.
    pub fn with_default_sender(mut self, sender: Address) -> Self {
        self.from.get_or_insert(sender);
        self
    }
}

/// Minimal view of an included transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    /// Transaction hash.
    pub hash: TxHash,
    /// Execution status (`true` = success).
    pub success: bool,
    /// Block the transaction was included in.
    pub block_number: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    #[test]
    fn test_serializes_wallet_shape() {
        let tx = TransactionRequest::default()
            .to(address!("00000000000000000000000000000000000000aa"))
            .data(vec![0xde, 0xad])
            .value(U256::from(16))
            .with_default_sender(address!("00000000000000000000000000000000000000bb"));

        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["data"], "0xdead");
        assert_eq!(json["value"], "0x10");
        assert!(json.get("gas").is_none());
        assert_eq!(
            json["from"].as_str().unwrap().to_lowercase(),
            "0x00000000000000000000000000000000000000bb"
        );
    }

    #[test]
    fn test_explicit_sender_is_kept() {
        let explicit = address!("00000000000000000000000000000000000000cc");
        let tx = TransactionRequest {
            from: Some(explicit),
            ..Default::default()
        }
        .with_default_sender(Address::ZERO);
        assert_eq!(tx.from, Some(explicit));
    }
}
