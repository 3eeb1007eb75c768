#![forbid(unsafe_code)]

pub mod alerts;
pub mod repo;
pub mod users;
