//! # Event subscribers.
//!
//! Any `Fn(&Event)` can subscribe to the [`EventChannel`](crate::EventChannel);
//! this module ships the built-in ones.
//!
//! ```text
//! component ── emit(Event) ──► EventChannel ──► topic callbacks
//!                                   │
//!                                   └──► "*" callbacks ──► LogWriter, custom, ...
//! ```
//!
//! ## Implementing custom subscribers
//! ```
//! use stagehand::{Event, EventChannel, EventKind};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let bus = EventChannel::new();
//! let failures = Arc::new(AtomicUsize::new(0));
//! let seen = Arc::clone(&failures);
//! bus.subscribe(EventKind::TaskFailed.topic(), move |_: &Event| {
//!     seen.fetch_add(1, Ordering::Relaxed);
//! });
//!
//! bus.emit(Event::new(EventKind::TaskFailed).with_subject("task-1"));
//! assert_eq!(failures.load(Ordering::Relaxed), 1);
//! ```

#[cfg(feature = "logging")]
mod log;

#[cfg(feature = "logging")]
pub use log::LogWriter;
