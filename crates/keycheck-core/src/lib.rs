pub mod config;
pub mod logging;

pub mod checker;
pub mod classify;
pub mod control;
pub mod events;
pub mod fetch;
pub mod model;
pub mod probe;
pub mod relay;
pub mod session;
pub mod store;
pub mod tabular;
