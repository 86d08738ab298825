//! Background Tasks Module
//!
//! Contains background tasks that run alongside a cache instance.
//!
//! # Tasks
//! - Expiry reaper: removes expired cache entries at a configured interval

mod reaper;

pub use reaper::{Reaper, Sweep};
