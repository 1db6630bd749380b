//! Browser-based OAuth 2.0 authorization-code login with per-session token storage and a
//! calendar-events client that spends the granted token on the user's behalf.
//!
//! The crate is organised leaf-first:
//!
//! - [`auth`] holds the anti-forgery state, session identifiers, scopes, and token models.
//! - [`oauth`] exchanges authorization codes through the `oauth2` crate.
//! - [`store`] persists pending authorizations and tokens per browser session.
//! - [`resource`] calls the protected user-info and calendar APIs with a bearer token.
//! - [`flows`] sequences the above into the login state machine.
//! - `web` (behind the `server` feature) exposes the flow as axum routes.

#![cfg_attr(not(test), deny(unused_crate_dependencies))]
#![deny(clippy::all, missing_docs)]

pub mod auth;
pub mod config;
pub mod error;
pub mod flows;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod resource;
pub mod store;
#[cfg(feature = "server")] pub mod web;

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(feature = "server")] use color_eyre as _;
