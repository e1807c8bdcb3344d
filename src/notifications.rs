//! User-facing notifications emitted at each phase of an airdrop run.

use std::collections::VecDeque;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Success,
    Error,
}

impl NotificationLevel {
    pub fn tag(&self) -> &'static str {
        match self {
            NotificationLevel::Info => "[..]",
            NotificationLevel::Success => "[OK]",
            NotificationLevel::Error => "[!!]",
        }
    }
}

/// A notification entry with message and timestamp
#[derive(Debug, Clone)]
pub struct NotificationEntry {
    pub level: NotificationLevel,
    pub message: String,
    pub timestamp: chrono::DateTime<chrono::Local>,
}

impl NotificationEntry {
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: chrono::Local::now(),
        }
    }

    pub fn time_ago(&self) -> String {
        let now = chrono::Local::now();
        let duration = now.signed_duration_since(self.timestamp);
        if duration.num_seconds() < 60 {
            "just now".to_string()
        } else if duration.num_minutes() < 60 {
            format!("{}m ago", duration.num_minutes())
        } else if duration.num_hours() < 24 {
            format!("{}h ago", duration.num_hours())
        } else {
            self.timestamp.format("%m/%d %H:%M").to_string()
        }
    }
}

/// Receives progress messages from the executor.
pub trait Notifier {
    fn notify(&mut self, level: NotificationLevel, message: &str);

    fn info(&mut self, message: &str) {
        self.notify(NotificationLevel::Info, message);
    }

    fn success(&mut self, message: &str) {
        self.notify(NotificationLevel::Success, message);
    }

    fn error(&mut self, message: &str) {
        self.notify(NotificationLevel::Error, message);
    }
}

/// Keeps the most recent notifications in memory.
#[derive(Debug, Clone)]
pub struct NotificationLog {
    entries: VecDeque<NotificationEntry>,
    capacity: usize,
}

impl NotificationLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.message.clone()).collect()
    }

    pub fn count(&self, level: NotificationLevel) -> usize {
        self.entries.iter().filter(|e| e.level == level).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for NotificationLog {
    fn default() -> Self {
        Self::new(200)
    }
}

impl Notifier for NotificationLog {
    fn notify(&mut self, level: NotificationLevel, message: &str) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(NotificationEntry::new(level, message));
    }
}

/// Forwards notifications to the tracing subscriber and prints them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&mut self, level: NotificationLevel, message: &str) {
        match level {
            NotificationLevel::Error => error!("{}", message),
            _ => info!("{}", message),
        }
        println!("{} {}", level.tag(), message);
    }
}
