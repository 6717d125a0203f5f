pub mod ledger;
pub mod movements;
pub mod picker;
