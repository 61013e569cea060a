//! Reconcile Module - cross-homeserver room state comparison.
//!
//! Brings every homeserver session into the target room, fetches each view of
//! the room state, and reduces the views to a [`DivergenceReport`].
//!
//! ```text
//! rooms ──► ensure_joined ──► fetch_state ──► diff ──► DivergenceReport
//!           (per session)     (per session)   (per room)
//! ```

pub mod diff;
pub mod engine;
pub mod fetch;
pub mod membership;
pub mod session;

pub use diff::{Agreement, Classification, DivergenceReport, Reachability, SessionDiff, diff};
pub use engine::{EXIT_DIVERGED, Reconciler, RunOutcome, normalize_rooms, run};
pub use fetch::{SessionOutcome, collect_outcome, fetch_state};
pub use membership::{MembershipStatus, ensure_joined};
pub use session::{EndpointSession, home_domain};
