//! Skyweave Mesh - message dissemination over intermittent inter-agent links
//!
//! Agents are connected only during contact windows. This crate decides when and
//! through whom a broadcast should travel so that every agent receives it as early as
//! possible, and handles relaying and deduplication on the receiving side.
//!
//! # Core Components
//!
//! - **Relay Routing**: exhaustive minimum-delay search over relay orders
//! - **Broadcast Scheduling**: broadcast actions timed to contact windows, relay
//!   forwarding and content-id deduplication
//!
//! # Example Usage
//!
//! ```rust
//! use skyweave_core::{TabulatedOracle, TimeInterval};
//! use skyweave_mesh::RelayRouter;
//!
//! let mut oracle = TabulatedOracle::new(1.0);
//! oracle.add_contact("sat-1", "sat-2", TimeInterval::new(10.0, 20.0));
//!
//! let route = RelayRouter::new("sat-1").route_to_all(&oracle, 0.0);
//! assert_eq!(route.t_start, 10.0);
//! ```

#![warn(missing_docs)]

pub mod broadcast;
pub mod error;
pub mod relay;

// Re-export main types
pub use broadcast::{BroadcastScheduler, RelayResult, DEFAULT_MAX_HOPS};
pub use error::{MeshError, MeshResult};
pub use relay::{RelayRoute, RelayRouter};
