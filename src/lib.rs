pub mod ai;
pub mod auth;
pub mod config;
pub mod email;
pub mod operator;
pub mod payments;
pub mod shared;
pub mod tickets;
pub mod users;
