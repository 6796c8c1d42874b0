//! Domain layer - Session and chain types.
//!
//! Pure data types for the session layer: the chain registry, the
//! lifecycle state machine, the error taxonomy, and the request/result
//! records shared by every derived module. No I/O happens here.

pub mod amount;
pub mod call;
pub mod chain;
pub mod error;
pub mod session;
pub mod transaction;

// Re-export core types for convenience
pub use amount::{Balance, GasPrice, GasPriceSource};
pub use call::ContractCall;
pub use chain::{ChainDescriptor, ChainId, ChainRegistry, RegistryError};
pub use error::SessionError;
pub use session::{SessionSnapshot, SessionStatus};
pub use transaction::{TransactionRequest, TxHash, TxReceipt};
