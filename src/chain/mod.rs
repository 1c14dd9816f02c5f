pub mod keys;
pub mod node;
pub mod rpc;

pub use node::{ChainError, LedgerBalance, LedgerNode, MockLedgerNode};
