//! Client for a remote Stagecast instance.
//!
//! [`RemoteInstance`] is the query surface the sync reconcilers consume;
//! [`CloudClient`] implements it over HTTP with the connection's bearer token.

mod client;
pub mod queries;
mod remote;
pub mod types;

pub use client::CloudClient;
pub use remote::RemoteInstance;
pub use types::{
    RemoteCategory, RemoteMedia, RemoteMediaInfo, RemoteProject, RemoteProjectMedia,
    RemoteProjectStamp, RemoteTag,
};
