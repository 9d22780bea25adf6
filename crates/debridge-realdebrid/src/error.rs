// SPDX-License-Identifier: GPL-3.0-or-later

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DebridError>;

#[derive(Debug, Error)]
pub enum DebridError {
    #[error("Real-Debrid rejected the API token (status {status})")]
    Auth { status: u16 },

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Error in sending magnet link to RD. Code: {status}, Text: {body}")]
    Submission { status: u16, body: String },

    #[error("Failed to unrestrict {link}: {reason}")]
    Resolution { link: String, reason: String },

    #[error("API error: {status} - {body}")]
    Api { status: u16, body: String },

    #[error("Invalid response from Real-Debrid API: {0}")]
    InvalidResponse(String),
}

impl DebridError {
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
