pub mod ledger;
pub mod position;

pub use ledger::{ClosedPosition, Ledger, LedgerError};
pub use position::Position;
