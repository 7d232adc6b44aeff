pub mod action;
pub mod clusters;
pub mod config;
pub mod contender;
pub mod controller;
pub mod count;
pub mod model;
pub mod store;

pub use controller::*;

#[cfg(test)]
pub mod fixtures;
