//! Forwarding gateway to the upstream contact API.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐      ┌───────────┐      ┌──────────────┐
//! │   Handler   │ ───▶ │  Gateway  │ ───▶ │   Upstream   │
//! └─────────────┘      └─────┬─────┘      └──────┬───────┘
//!        ▲                   │                   │
//!        │             intercept(resp) ◀─────────┘
//!        └───────────────────┘
//! ```
//!
//! Handlers pass a callback to [`Gateway::forward_with`]; it sees the upstream
//! response (status, headers, streaming body) before the client does and may
//! replace the body. The read-through handler uses it to cache `200` bodies,
//! the write handler to invalidate the cache.

pub mod error;
pub mod proxy;

pub use error::GatewayError;
pub use proxy::{Gateway, UpstreamResponse};
