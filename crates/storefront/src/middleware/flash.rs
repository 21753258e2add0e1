//! One-shot flash notices stored in the session.
//!
//! Handlers push a notice before redirecting; the next rendered page takes
//! every pending notice out of the session and shows it once.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::models::session_keys;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashLevel {
    Success,
    Info,
    Error,
}

impl FlashLevel {
    /// CSS modifier used by the notice banner.
    #[must_use]
    pub const fn css_class(self) -> &'static str {
        match self {
            Self::Success => "flash--success",
            Self::Info => "flash--info",
            Self::Error => "flash--error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Error,
            message: message.into(),
        }
    }
}

/// Queue a notice for the next rendered page.
///
/// # Errors
///
/// Returns an error if the session cannot be read or written.
pub async fn push_flash(session: &Session, flash: Flash) -> Result<(), tower_sessions::session::Error> {
    let mut pending = session
        .get::<Vec<Flash>>(session_keys::FLASHES)
        .await?
        .unwrap_or_default();
    pending.push(flash);
    session.insert(session_keys::FLASHES, pending).await
}

/// Take every pending notice, leaving none behind.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn take_flashes(session: &Session) -> Result<Vec<Flash>, tower_sessions::session::Error> {
    Ok(session
        .remove::<Vec<Flash>>(session_keys::FLASHES)
        .await?
        .unwrap_or_default())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use tower_sessions::MemoryStore;

    use super::*;

    #[tokio::test]
    async fn test_flashes_are_shown_once() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);

        push_flash(&session, Flash::success("Added to cart")).await.unwrap();
        push_flash(&session, Flash::error("Out of stock")).await.unwrap();

        let shown = take_flashes(&session).await.unwrap();
        assert_eq!(shown.len(), 2);
        assert_eq!(shown.first().unwrap().level, FlashLevel::Success);
        assert!(take_flashes(&session).await.unwrap().is_empty());
    }
}
