pub mod billing;
pub mod finance;
pub mod hours;
pub mod payment;
pub mod records;
pub mod status;
pub mod total;

pub(crate) mod serde_helpers;
