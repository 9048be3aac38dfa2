//! Single-origin request scheduler: queued dispatch under a concurrency ceiling, a shared
//! single-flight credential, bounded retries, and origin-driven backoff freezes.
//!
//! ```no_run
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use origin_scheduler::{RequestOptions, Scheduler, SchedulerConfig, url::Url};
//!
//! let config = SchedulerConfig::new(Url::parse("https://api.example.com")?);
//! let scheduler = Scheduler::new(config)?;
//! let response = scheduler.submit(RequestOptions::get("/status")).await?;
//!
//! println!("{} after {} attempt(s)", response.status, response.attempts);
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod backoff;
pub mod config;
pub mod error;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod queue;
pub mod request;
pub mod retry;
pub mod scheduler;

mod _prelude {
	pub use std::{
		collections::{BTreeMap, VecDeque},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use auth::{AuthStrategy, CredentialManager, RawCredential};
pub use backoff::BackoffController;
pub use config::SchedulerConfig;
pub use error::{Error, Result};
pub use queue::PendingResponse;
pub use request::{Method, RequestAuth, RequestBody, RequestOptions, Response, ResponseBody};
pub use scheduler::Scheduler;

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
