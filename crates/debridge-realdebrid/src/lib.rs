// SPDX-License-Identifier: GPL-3.0-or-later

//! Real-Debrid REST client.
//!
//! Wraps the four remote operations the bridge needs: adding a magnet (and
//! selecting all of its files), listing torrents, reading a torrent's file
//! links, and unrestricting a link into a direct download URL.

pub mod client;
pub mod error;
pub mod models;
pub mod rate_limiter;

pub use client::{DebridApi, RealDebridClient, RealDebridClientBuilder};
pub use error::{DebridError, Result};
pub use models::{AddMagnetResponse, TorrentInfo, TorrentSummary, UnrestrictedLink};
