//! Transparent local cache.
//!
//! [`locate`] partitions candidate paths by filesystem permission over an
//! ordered root list, yielding at most one read path and one write path.
//! [`store`] moves entries on and off disk atomically. Neither knows about
//! URLs; the handle layer derives the relative entry path and reacts to
//! resolution outcomes.

pub mod locate;
pub mod store;

pub use locate::{CacheRoots, Candidate, ResolvedPaths, resolve, user_readable, user_writable};
pub use store::{remove, save};
