//! Test doubles for the cache's collaborators.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::{Clock, SecretStore};

/// A clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Replays queued responses in order; fails once the script runs out.
#[derive(Default)]
pub struct ScriptedSecretStore {
    responses: Mutex<VecDeque<Result<String, String>>>,
    fetches: Mutex<Vec<String>>,
}

impl ScriptedSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(self, value: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(value.to_string()));
        self
    }

    pub fn with_failure(self, message: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }
}

#[async_trait]
impl SecretStore for ScriptedSecretStore {
    async fn fetch(&self, name: &str) -> anyhow::Result<String> {
        self.fetches.lock().unwrap().push(name.to_string());
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            None => Err(anyhow::anyhow!("secret store unavailable")),
        }
    }
}
