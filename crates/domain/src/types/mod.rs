//! Domain types and models

pub mod user;

pub use user::UserProfile;
