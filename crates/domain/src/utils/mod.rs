//! Pure helper functions for domain identifiers

pub mod user_id;
