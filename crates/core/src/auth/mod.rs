//! Identity provider ports and session events

pub mod events;
pub mod ports;
