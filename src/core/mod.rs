//! Hub core: owner context, builder and configuration.
//!
//! - [`hub`]: `Hub`, the owner that creates handles and posts/asks through them;
//! - [`builder`]: `HubBuilder`, wires observers to the notice bus;
//! - [`config`]: `Config`, defaults for new handles.

mod builder;
mod config;
mod hub;

pub use builder::HubBuilder;
pub use config::Config;
pub use hub::{Hub, HubId};
