//! Request guards implemented as extractors.
//!
//! - [`peer::BroadcastCaller`] -- Admits allow-listed peers to `/api/broadcast`.

pub mod peer;
