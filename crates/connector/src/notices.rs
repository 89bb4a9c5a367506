//! Transient user-facing notices.
//!
//! Notices are held in memory until the next read drains them, the way a
//! flash message lives until the next page view. The queue is bounded; the
//! oldest notice is dropped when it is full.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::Serialize;

/// Maximum number of undrained notices kept.
pub const MAX_PENDING_NOTICES: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Status,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Bounded FIFO of pending notices.
#[derive(Debug, Default)]
pub struct Notices {
    pending: Mutex<VecDeque<Notice>>,
}

impl Notices {
    /// Queue a notice, dropping the oldest one if the queue is full.
    pub fn push(&self, level: NoticeLevel, message: impl Into<String>) {
        let notice = Notice {
            level,
            message: message.into(),
        };
        // A poisoned lock only means another thread panicked mid-push; the
        // queue itself is still usable.
        let mut pending = self
            .pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if pending.len() >= MAX_PENDING_NOTICES {
            pending.pop_front();
        }
        pending.push_back(notice);
    }

    /// Take every pending notice, oldest first.
    pub fn drain(&self) -> Vec<Notice> {
        self.pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .drain(..)
            .collect()
    }
}
