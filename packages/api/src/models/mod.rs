//! Data models shared by the backend and its clients.

mod identity;
mod wire;

pub use identity::IdentityClaims;
pub use wire::{LoginStart, SessionResponse};
