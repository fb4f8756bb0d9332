//! Cached data-access layer for an NHL ticker/widget service.
//!
//! The crate fetches schedule, live-score and standings data from the NHL
//! web API, caches each dataset independently with its own TTL, and composes
//! query-parameterized view snapshots for an embedding presentation layer.
//! Route registration, templating and theming live outside this crate; the
//! boundary is [`ticker::Ticker::get_view`].

pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod nhl;
pub mod ticker;
