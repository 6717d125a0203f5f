pub mod orders;
pub mod stock_release;
pub mod transfers;
pub mod warehouses;
