//! Contract call descriptor.
//!
//! Pairs a contract address with its JSON ABI, a function name, and the
//! dynamically-typed arguments. Used by both the read and write modules so
//! that encoding and overload resolution live in one place.

use std::sync::Arc;

use alloy::dyn_abi::{DynSolValue, FunctionExt, JsonAbiExt};
use alloy::json_abi::{Function, JsonAbi};
use alloy::primitives::{Address, Bytes};

use super::error::SessionError;

/// A single contract function invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractCall {
    /// Target contract.
    pub address: Address,
    /// Contract ABI (shared; usually parsed once per contract).
    pub abi: Arc<JsonAbi>,
    /// Function name; overloads are resolved by argument count.
    pub function_name: String,
    /// Positional arguments.
    pub args: Vec<DynSolValue>,
}

impl ContractCall {
    pub fn new(
        address: Address,
        abi: impl Into<Arc<JsonAbi>>,
        function_name: impl Into<String>,
        args: Vec<DynSolValue>,
    ) -> Self {
        Self {
            address,
            abi: abi.into(),
            function_name: function_name.into(),
            args,
        }
    }

    /// Resolve the ABI entry for this call.
    pub fn function(&self) -> Result<&Function, SessionError> {
        let overloads = self.abi.function(&self.function_name).ok_or_else(|| {
            SessionError::InvalidCall(format!(
                "function `{}` not found in ABI",
                self.function_name
            ))
        })?;

        overloads
            .iter()
            .find(|f| f.inputs.len() == self.args.len())
            .ok_or_else(|| {
                SessionError::InvalidCall(format!(
                    "no overload of `{}` takes {} argument(s)",
                    self.function_name,
                    self.args.len()
                ))
            })
    }

    /// Selector-prefixed calldata.
    pub fn calldata(&self) -> Result<Bytes, SessionError> {
        let function = self.function()?;
        function
            .abi_encode_input(&self.args)
            .map(Bytes::from)
            .map_err(|e| {
                SessionError::InvalidCall(format!("encoding `{}`: {e}", function.signature()))
            })
    }

    /// Decode the raw `eth_call` return data.
    pub fn decode_output(&self, data: &[u8]) -> Result<Vec<DynSolValue>, SessionError> {
        let function = self.function()?;
        function.abi_decode_output(data, true).map_err(|e| {
            SessionError::InvalidCall(format!("decoding `{}` output: {e}", function.signature()))
        })
    }
}
