//! Atrium Common
//!
//! Shared building blocks for the Atrium control plane:
//!
//! - **Identifiers**: type-safe newtypes for users, organizations, and
//!   session tokens
//! - **Circuit breaker**: failure tracking for best-effort collaborators
//!   (the session cache) so an outage degrades instead of cascading

pub mod breaker;
pub mod ids;
pub mod types;

pub use breaker::CircuitBreaker;
pub use ids::{OrgId, SessionToken, UserId};
pub use types::{BreakerConfig, BreakerState};
