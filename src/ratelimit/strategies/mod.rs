//! The six classification strategies.
//!
//! Each strategy embeds a [`StrategyBase`](super::strategy::StrategyBase) for
//! limit, window and target filter, and adds its own matching on top.

mod address;
mod country;
mod host;
mod path;
mod query;
mod user_agent;

pub use address::AddressStrategy;
pub use country::CountryStrategy;
pub use host::HostStrategy;
pub use path::PathStrategy;
pub use query::QueryParameterStrategy;
pub use user_agent::UserAgentStrategy;
