//! Participant registry for stakegate.
//!
//! * [`RegistrySnapshot`]: immutable membership and stake view with indices.
//! * [`RegistryStore`]: atomic holder of the current snapshot.
//! * [`RegistrySource`]: upstream providers of the authoritative listing.
//! * [`RegistryRefresher`]: startup bootstrap and periodic background refresh.

mod identity;
pub mod refresh;
mod snapshot;
pub mod source;
mod store;

pub use identity::{Identity, InvalidStake, Stake};
pub use refresh::{RefreshConfig, RefreshConfigError, RefreshError, RefreshEvent, RefreshOutcome, RefreshStatus, RefresherHandle, RegistryRefresher};
pub use snapshot::{Participant, RegistrySnapshot, SnapshotEntry, SnapshotError};
pub use source::{FetchError, RegistrySource};
pub use store::{NotReady, RegistryStore};
