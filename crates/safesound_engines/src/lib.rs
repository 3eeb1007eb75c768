#![forbid(unsafe_code)]

pub mod classifier;
pub mod email;
pub mod gate;
pub mod message;
pub mod transport;
pub mod voice;
