//! Mock process for unit testing groups

use async_trait::async_trait;
use drover_util::{DroverError, Result, env_entry};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::{Process, Signal};

/// Mock process that records every call
#[derive(Default)]
pub struct MockProcess {
    run_calls: AtomicUsize,
    kill_calls: AtomicUsize,
    signals: Mutex<Vec<Signal>>,
    env: Mutex<Vec<String>>,

    /// Configure run to fail with this message
    pub fail_run: Arc<Mutex<Option<String>>>,

    /// Configure signal delivery to fail with this message
    pub fail_signal: Arc<Mutex<Option<String>>>,

    /// Simulated runtime before run returns
    pub run_delay: Arc<Mutex<Option<Duration>>>,
}

impl MockProcess {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_run(message: impl Into<String>) -> Self {
        let mock = Self::new();
        *mock.fail_run.lock().unwrap() = Some(message.into());
        mock
    }

    pub fn failing_signal(message: impl Into<String>) -> Self {
        let mock = Self::new();
        *mock.fail_signal.lock().unwrap() = Some(message.into());
        mock
    }

    pub fn with_run_delay(self, delay: Duration) -> Self {
        *self.run_delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn run_calls(&self) -> usize {
        self.run_calls.load(Ordering::SeqCst)
    }

    pub fn kill_calls(&self) -> usize {
        self.kill_calls.load(Ordering::SeqCst)
    }

    /// Signals received, in delivery order
    pub fn signals(&self) -> Vec<Signal> {
        self.signals.lock().unwrap().clone()
    }

    pub fn env(&self) -> Vec<String> {
        self.env.lock().unwrap().clone()
    }
}

#[async_trait]
impl Process for MockProcess {
    async fn run(&self) -> Result<()> {
        self.run_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.run_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.fail_run.lock().unwrap().clone() {
            Some(message) => Err(DroverError::Internal(message)),
            None => Ok(()),
        }
    }

    fn add_env(&self, key: &str, value: &str) -> Result<()> {
        self.env.lock().unwrap().push(env_entry(key, value));
        Ok(())
    }

    fn signal(&self, signal: Signal) -> Result<()> {
        self.signals.lock().unwrap().push(signal);

        match self.fail_signal.lock().unwrap().clone() {
            Some(message) => Err(DroverError::Internal(message)),
            None => Ok(()),
        }
    }

    fn kill(&self) -> Result<()> {
        self.kill_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_records_calls() {
        let mock = MockProcess::new();

        mock.run().await.unwrap();
        mock.signal(Signal::SIGHUP).unwrap();
        mock.add_env("PORT", "6773").unwrap();
        mock.kill().unwrap();

        assert_eq!(mock.run_calls(), 1);
        assert_eq!(mock.signals(), vec![Signal::SIGHUP]);
        assert_eq!(mock.env(), vec!["PORT=6773".to_string()]);
        assert_eq!(mock.kill_calls(), 1);
    }

    #[tokio::test]
    async fn mock_failures() {
        let mock = MockProcess::failing_run("foo");
        let err = mock.run().await.unwrap_err();
        assert_eq!(err.to_string(), "Internal error: foo");

        let mock = MockProcess::failing_signal("bar");
        assert!(mock.signal(Signal::SIGTERM).is_err());
        assert_eq!(mock.signals(), vec![Signal::SIGTERM]);
    }
}
