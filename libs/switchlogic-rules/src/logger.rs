//! Rule transition logger
//!
//! Provides independent log files for each rule, capturing every transition
//! the rule fires together with the value it delivered.

use std::{
    collections::HashMap,
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::{Local, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::warn;

use crate::rule::Action;
use switchlogic_bus::DeliveryMode;

/// Logger for an individual rule
pub struct RuleLogger {
    rule_key: String,
    log_dir: PathBuf,
    current: Mutex<(String, Option<File>)>,
}

impl RuleLogger {
    /// Create a new RuleLogger for a specific rule
    ///
    /// Log files will be created in: `{log_root}/rules/{rule_key}/`
    /// with naming format: `{YYYYMMDD}.log`
    pub fn new(log_root: &Path, rule_key: &str) -> Self {
        let rule_dir = log_root.join("rules").join(rule_key);
        if let Err(e) = fs::create_dir_all(&rule_dir) {
            warn!("Log dir err {:?}: {}", rule_dir, e);
        }

        Self {
            rule_key: rule_key.to_string(),
            log_dir: rule_dir,
            current: Mutex::new((String::new(), None)),
        }
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Log a fired transition
    ///
    /// Format: `timestamp [RULE] key description | ACTION | delivery`
    pub fn log_transition(
        &self,
        description: &str,
        action: Action,
        delivery: Option<(DeliveryMode, &str, &Value)>,
    ) {
        let delivery_str = match delivery {
            Some((mode, path, value)) => format!("{} {} <= {}", mode, path, value),
            None => "no delivery".to_string(),
        };
        let message = format!("{} | {} | {}", description, action, delivery_str);
        self.write_line(&message);
    }

    /// Log a transition that could not be delivered
    pub fn log_error(&self, description: &str, action: Action, error: &str) {
        self.write_line(&format!("{} | {} | {}", description, action, error));
    }

    fn write_line(&self, message: &str) {
        let today = Local::now().format("%Y%m%d").to_string();
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ");

        let mut current = self.current.lock();
        let (current_date, file_slot) = &mut *current;

        // New day - open new file
        if *current_date != today {
            *current_date = today.clone();
            let file_path = self.log_dir.join(format!("{}.log", today));

            match OpenOptions::new()
                .create(true)
                .append(true)
                .open(&file_path)
            {
                Ok(file) => *file_slot = Some(file),
                Err(e) => {
                    warn!("Log open err {:?}: {}", file_path, e);
                    *file_slot = None;
                    return;
                },
            }
        }

        if let Some(file) = file_slot.as_mut() {
            let line = format!("{} [RULE] {} {}\n", timestamp, self.rule_key, message);
            if let Err(e) = file.write_all(line.as_bytes()) {
                warn!("Log write err: {}", e);
            }
        }
    }
}

/// Manager for multiple rule loggers
pub struct RuleLoggerManager {
    log_root: PathBuf,
    loggers: Mutex<HashMap<String, Arc<RuleLogger>>>,
}

impl RuleLoggerManager {
    /// Create a new logger manager
    pub fn new(log_root: PathBuf) -> Self {
        Self {
            log_root,
            loggers: Mutex::new(HashMap::new()),
        }
    }

    pub fn log_root(&self) -> &Path {
        &self.log_root
    }

    /// Get or create a logger for a specific rule
    pub fn get_logger(&self, rule_key: &str) -> Arc<RuleLogger> {
        let key = sanitize_key(rule_key);
        let mut loggers = self.loggers.lock();

        if let Some(logger) = loggers.get(&key) {
            return Arc::clone(logger);
        }

        let logger = Arc::new(RuleLogger::new(&self.log_root, &key));
        loggers.insert(key, Arc::clone(&logger));
        logger
    }

    /// Remove a logger (e.g., when rule is unregistered)
    pub fn remove_logger(&self, rule_key: &str) {
        self.loggers.lock().remove(&sanitize_key(rule_key));
    }

    /// Clear all loggers
    pub fn clear(&self) {
        self.loggers.lock().clear();
    }
}

/// Directory-safe form of a rule key
fn sanitize_key(key: &str) -> String {
    let cleaned: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    match cleaned.trim_matches('.') {
        "" => "_".to_string(),
        trimmed => trimmed.to_string(),
    }
}
