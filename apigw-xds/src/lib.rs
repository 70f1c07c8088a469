//! The discovery protocol server: accepts state-of-the-world streams,
//! incremental (delta) streams and one-shot fetches over the Aggregated
//! Discovery Service contract, serves responses out of the combined cache,
//! and tracks acknowledgements per stream.

mod callbacks;
mod delta;
mod server;
mod sotw;

pub use callbacks::{Callbacks, LoggingCallbacks, NoopCallbacks};
pub use server::{AdsServer, serve};
