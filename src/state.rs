//! State management module - local picture of the lock server's channels
//!
//! The store tracks lock/active status and parameters per channel, the
//! selected channel and the latest channel-table event. All mutations go
//! through the StoreActor so updates from polls, streams and commands are
//! applied one at a time in arrival order.

mod actor;
mod actor_handle;
mod commands;
mod parameters;
mod snapshot;
mod store;
mod types;

pub use actor::StoreActor;
pub use actor_handle::StoreHandle;
pub use parameters::{EditField, EditForm, ParameterSet, ReadingState, DEFAULT_READING_STATE};
pub use snapshot::{parse_digit, Reading, StreamSnapshot};
pub use store::{ChannelStateStore, SubscriberFn};
pub use types::{
    Channel, ChannelStatus, ChannelUpdate, IndicatorChange, StatusField, TableState, UpdateSource,
};
