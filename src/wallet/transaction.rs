// src/wallet/transaction.rs
//! Transaction options prepared by the wallet for a single submission.

use crate::utils::serialization::deserialize_u256;
use ethers_core::types::transaction::eip2718::TypedTransaction;
use ethers_core::types::{Address, U256};
use serde::{Deserialize, Serialize};

/// Caller supplied EIP-1559 fee caps.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeRequest {
    #[serde(deserialize_with = "deserialize_u256")]
    pub max_fee_per_gas: U256,
    #[serde(deserialize_with = "deserialize_u256")]
    pub max_priority_fee_per_gas: U256,
}

/// Fee model of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fee {
    /// Single gas price, taken from the node's suggestion
    Legacy { gas_price: U256 },
    /// EIP-1559 caps, taken from the request
    Dynamic {
        max_fee_per_gas: U256,
        max_priority_fee_per_gas: U256,
    },
}

impl From<FeeRequest> for Fee {
    fn from(fee: FeeRequest) -> Self {
        Fee::Dynamic {
            max_fee_per_gas: fee.max_fee_per_gas,
            max_priority_fee_per_gas: fee.max_priority_fee_per_gas,
        }
    }
}

/// Everything needed to sign a transaction except its call data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOptions {
    pub from: Address,
    pub nonce: U256,
    pub gas_limit: U256,
    pub fee: Fee,
    pub chain_id: u64,
}

impl TxOptions {
    pub fn is_legacy(&self) -> bool {
        matches!(self.fee, Fee::Legacy { .. })
    }

    /// Writes the options into a prepared transaction.
    ///
    /// Legacy fees are applied as a gas price on any envelope. Dynamic fees are
    /// only applied to EIP-1559 envelopes; callers switch the envelope with
    /// [`TxOptions::is_legacy`] before applying.
    pub fn apply(&self, tx: &mut TypedTransaction) {
        tx.set_from(self.from);
        tx.set_nonce(self.nonce);
        tx.set_gas(self.gas_limit);
        tx.set_chain_id(self.chain_id);

        match (self.fee, tx) {
            (
                Fee::Dynamic {
                    max_fee_per_gas,
                    max_priority_fee_per_gas,
                },
                TypedTransaction::Eip1559(inner),
            ) => {
                inner.max_fee_per_gas = Some(max_fee_per_gas);
                inner.max_priority_fee_per_gas = Some(max_priority_fee_per_gas);
            }
            (Fee::Dynamic { max_fee_per_gas, .. }, tx) => {
                tx.set_gas_price(max_fee_per_gas);
            }
            (Fee::Legacy { gas_price }, tx) => {
                tx.set_gas_price(gas_price);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers_core::types::{Eip1559TransactionRequest, TransactionRequest};

    fn options(fee: Fee) -> TxOptions {
        TxOptions {
            from: Address::repeat_byte(1),
            nonce: U256::from(7),
            gas_limit: U256::from(8_000_000u64),
            fee,
            chain_id: 31337,
        }
    }

    #[test]
    fn test_legacy_options_set_gas_price() {
        let mut tx: TypedTransaction = TransactionRequest::new().into();
        options(Fee::Legacy { gas_price: U256::from(5) }).apply(&mut tx);

        assert_eq!(tx.nonce(), Some(&U256::from(7)));
        assert_eq!(tx.gas(), Some(&U256::from(8_000_000u64)));
        assert_eq!(tx.gas_price(), Some(U256::from(5)));
        assert_eq!(tx.chain_id().map(|id| id.as_u64()), Some(31337));
        assert_eq!(tx.from(), Some(&Address::repeat_byte(1)));
    }

    #[test]
    fn test_dynamic_options_set_fee_caps() {
        let mut tx: TypedTransaction = Eip1559TransactionRequest::new().into();
        let fee = FeeRequest {
            max_fee_per_gas: U256::from(100),
            max_priority_fee_per_gas: U256::from(2),
        };
        options(fee.into()).apply(&mut tx);

        match tx {
            TypedTransaction::Eip1559(inner) => {
                assert_eq!(inner.max_fee_per_gas, Some(U256::from(100)));
                assert_eq!(inner.max_priority_fee_per_gas, Some(U256::from(2)));
            }
            other => panic!("unexpected envelope {:?}", other),
        }
    }

    #[test]
    fn test_fee_request_accepts_hex_and_decimal() {
        let fee: FeeRequest =
            serde_json::from_str(r#"{"max_fee_per_gas":"0x64","max_priority_fee_per_gas":"2"}"#).unwrap();
        assert_eq!(fee.max_fee_per_gas, U256::from(100));
        assert_eq!(fee.max_priority_fee_per_gas, U256::from(2));
    }
}
