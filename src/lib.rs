pub mod cache;
pub mod classify;
pub mod config;
pub mod credentials;
pub mod fetch;
pub mod handle;
pub mod links;
pub mod resource;
