use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use derive_new::new;
use survey_x_std::event::ResponseEvent;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::ChannelError;
use crate::types::{ComputationResult, ResourceId};

/// Delivers the MPC executor's output for a computation offset.
#[async_trait]
pub trait ResultChannel: Send + Sync {
    async fn register(&self, computation_offset: u64) -> Result<oneshot::Receiver<ComputationResult>, ChannelError>;
}

/// Unclaimed results kept by default before the oldest is dropped.
pub const DEFAULT_READY_CAPACITY: usize = 1024;

struct ChannelInner {
    waiters: HashMap<u64, oneshot::Sender<ComputationResult>>,
    ready: HashMap<u64, ComputationResult>,
    arrival: VecDeque<u64>,
    ready_capacity: usize,
}

impl ChannelInner {
    fn new(ready_capacity: usize) -> Self {
        Self {
            waiters: HashMap::new(),
            ready: HashMap::new(),
            arrival: VecDeque::new(),
            ready_capacity,
        }
    }

    /// Drops watchers whose receiver was dropped, e.g. after a watch timed out.
    fn prune_closed(&mut self) {
        self.waiters.retain(|_, waiter| !waiter.is_closed());
    }

    fn hold(&mut self, result: ComputationResult) {
        let offset = result.computation_offset;
        if self.ready.insert(offset, result).is_none() {
            self.arrival.push_back(offset);
        }
        while self.ready.len() > self.ready_capacity {
            let Some(oldest) = self.arrival.pop_front() else {
                break;
            };
            if self.ready.remove(&oldest).is_some() {
                debug!(computation_offset = oldest, "dropping unclaimed result");
            }
        }
    }

    fn claim(&mut self, computation_offset: u64) -> Option<ComputationResult> {
        let result = self.ready.remove(&computation_offset)?;
        self.arrival.retain(|offset| *offset != computation_offset);
        Some(result)
    }
}

/// Push channel fed by whatever watches the MPC program's logs. Results that arrive
/// before anyone registers are held until they are claimed, up to a fixed number.
#[derive(Clone)]
pub struct MemoryResultChannel {
    inner: Arc<Mutex<ChannelInner>>,
}

impl Default for MemoryResultChannel {
    fn default() -> Self {
        Self::with_ready_capacity(DEFAULT_READY_CAPACITY)
    }
}

impl MemoryResultChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ready_capacity(ready_capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ChannelInner::new(ready_capacity))),
        }
    }

    pub fn publish(&self, result: ComputationResult) -> Result<(), ChannelError> {
        let mut inner = self.lock_inner()?;
        inner.prune_closed();
        match inner.waiters.remove(&result.computation_offset) {
            Some(waiter) => {
                if let Err(result) = waiter.send(result) {
                    debug!(computation_offset = result.computation_offset, "result watcher went away");
                }
            }
            None => inner.hold(result),
        }
        Ok(())
    }

    /// Publishes every `ResponseEvent` found in the log messages of the transaction
    /// that finalized `computation_offset`.
    pub fn publish_program_logs<S: AsRef<str>>(
        &self,
        computation_offset: u64,
        logs: &[S],
    ) -> Result<usize, ChannelError> {
        let mut published = 0;
        for event in logs
            .iter()
            .filter_map(|line| ResponseEvent::from_program_log(line.as_ref()))
        {
            self.publish(ComputationResult::from_event(computation_offset, event))?;
            published += 1;
        }
        Ok(published)
    }

    /// Live watchers still waiting on a result.
    pub fn watching(&self) -> Result<usize, ChannelError> {
        Ok(self.lock_inner()?.waiters.len())
    }

    /// Results published before anyone registered for them.
    pub fn buffered(&self) -> Result<usize, ChannelError> {
        Ok(self.lock_inner()?.ready.len())
    }

    fn lock_inner(&self) -> Result<MutexGuard<'_, ChannelInner>, ChannelError> {
        self.inner
            .lock()
            .map_err(|_| ChannelError::Unavailable("result channel lock poisoned".to_string()))
    }
}

#[async_trait]
impl ResultChannel for MemoryResultChannel {
    async fn register(&self, computation_offset: u64) -> Result<oneshot::Receiver<ComputationResult>, ChannelError> {
        let mut inner = self.lock_inner()?;
        let (sender, receiver) = oneshot::channel();

        if let Some(result) = inner.claim(computation_offset) {
            let _ = sender.send(result);
            return Ok(receiver);
        }
        inner.prune_closed();
        if inner.waiters.contains_key(&computation_offset) {
            return Err(ChannelError::AlreadyRegistered(computation_offset));
        }

        inner.waiters.insert(computation_offset, sender);
        Ok(receiver)
    }
}

/// Finalized computation lookup, e.g. an account or log reader on the cluster.
#[async_trait]
pub trait ComputationSource: Send + Sync {
    async fn fetch(&self, computation_offset: u64) -> Result<Option<ComputationResult>, ChannelError>;
}

/// Polls a [`ComputationSource`] until the result shows up or the watcher goes away.
#[derive(Clone, new)]
pub struct PollingResultChannel {
    source: Arc<dyn ComputationSource>,
    interval: Duration,
}

#[async_trait]
impl ResultChannel for PollingResultChannel {
    async fn register(&self, computation_offset: u64) -> Result<oneshot::Receiver<ComputationResult>, ChannelError> {
        let (sender, receiver) = oneshot::channel();
        let source = self.source.clone();
        let interval = self.interval;

        tokio::spawn(async move {
            loop {
                if sender.is_closed() {
                    return;
                }
                match source.fetch(computation_offset).await {
                    Ok(Some(result)) => {
                        let _ = sender.send(result);
                        return;
                    }
                    Ok(None) => {}
                    Err(err) => warn!(computation_offset, error = %err, "computation poll failed"),
                }
                tokio::time::sleep(interval).await;
            }
        });

        Ok(receiver)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResultOutcome {
    Completed(ComputationResult),
    TimedOut,
    Unavailable(String),
}

/// Detached handle on a computation result. Dropping it does not cancel the watch.
#[derive(Debug)]
pub struct PendingResult {
    computation_offset: u64,
    handle: JoinHandle<ResultOutcome>,
}

impl PendingResult {
    pub fn computation_offset(&self) -> u64 {
        self.computation_offset
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub async fn wait(self) -> ResultOutcome {
        self.handle
            .await
            .unwrap_or_else(|err| ResultOutcome::Unavailable(err.to_string()))
    }
}

#[derive(Clone, new)]
pub struct ResultNotifier {
    channel: Arc<dyn ResultChannel>,
    timeout: Duration,
}

impl ResultNotifier {
    pub async fn watch(&self, computation_offset: u64, resource_id: &ResourceId) -> PendingResult {
        let registration = self.channel.register(computation_offset).await;
        let timeout = self.timeout;
        let resource_id = resource_id.clone();

        let handle = tokio::spawn(async move {
            let receiver = match registration {
                Ok(receiver) => receiver,
                Err(err) => {
                    warn!(computation_offset, %resource_id, error = %err, "result registration failed");
                    return ResultOutcome::Unavailable(err.to_string());
                }
            };

            match tokio::time::timeout(timeout, receiver).await {
                Ok(Ok(result)) => {
                    info!(computation_offset, %resource_id, "computation result received");
                    ResultOutcome::Completed(result)
                }
                Ok(Err(_)) => ResultOutcome::Unavailable("result channel closed".to_string()),
                Err(_) => {
                    warn!(computation_offset, %resource_id, ?timeout, "computation result timed out");
                    ResultOutcome::TimedOut
                }
            }
        });

        PendingResult {
            computation_offset,
            handle,
        }
    }
}
