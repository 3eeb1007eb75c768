#![forbid(unsafe_code)]

pub mod alert;
pub mod classification;
pub mod common;
pub mod notify;
pub mod user;

pub use common::{ContractViolation, ReasonCodeId, Validate};
