//! Client side of the mbyte manager: typed REST access plus the two
//! "start something, then poll until it settles" controllers the console
//! drives (store provisioning and app commands).

pub mod api;
pub mod command;
pub mod error;
pub mod poll;
pub mod provisioning;
pub mod session;
pub mod status;
pub mod store_api;

pub use api::{HttpManagerApi, ManagerApi};
pub use command::{AppCommand, CommandPhase, CommandView, ProcessKey};
pub use error::ClientError;
pub use poll::{PollTarget, PollTracker, TrackPhase, TrackState, POLL_INTERVAL};
pub use provisioning::{
    ProvisioningPhase, ProvisioningView, StoreKey, StoreProvisioning, StoreSnapshot,
};
pub use session::{load_profile, PrincipalProvider, TokenPrincipal};
pub use status::{StatusCache, StatusRefresher, StatusView};
pub use store_api::{store_base_url, StoreClient, StoreLocator};

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
