//! Scripted in-memory driver for tests.

use crate::error::MooringError;
use crate::models::{ClientOptions, HandleError, HandleState};
use crate::services::driver::{Driver, DriverHandle, Handle};

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Driver that counts opens and can be told to fail.
#[derive(Default)]
pub(crate) struct MockDriver {
    opens: AtomicUsize,
    failures_pending: AtomicUsize,
    open_delay: Option<Duration>,
    required: ClientOptions,
    handles: Mutex<Vec<Arc<MockHandle>>>,
    last_options: Mutex<Option<ClientOptions>>,
}

impl MockDriver {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Opens take `delay` before completing.
    pub(crate) fn with_open_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self { open_delay: Some(delay), ..Self::default() })
    }

    pub(crate) fn with_required_options(required: ClientOptions) -> Arc<Self> {
        Arc::new(Self { required, ..Self::default() })
    }

    /// Number of `open` calls so far, failed ones included.
    pub(crate) fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Make the next `count` opens fail.
    pub(crate) fn fail_next_opens(&self, count: usize) {
        self.failures_pending.store(count, Ordering::SeqCst);
    }

    pub(crate) fn last_handle(&self) -> Option<Arc<MockHandle>> {
        self.handles.lock().last().cloned()
    }

    pub(crate) fn last_options(&self) -> Option<ClientOptions> {
        self.last_options.lock().clone()
    }
}

#[async_trait]
impl Driver for MockDriver {
    fn name(&self) -> &str {
        "mock"
    }

    fn required_options(&self) -> ClientOptions {
        self.required.clone()
    }

    async fn open(&self, address: &str, options: &ClientOptions) -> Result<Handle, MooringError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.open_delay {
            tokio::time::sleep(delay).await;
        }

        let failing = self
            .failures_pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(MooringError::connection(format!("connection refused: {address}")));
        }

        let handle = Arc::new(MockHandle::new());
        self.handles.lock().push(Arc::clone(&handle));
        *self.last_options.lock() = Some(options.clone());

        let handle: Handle = handle;
        Ok(handle)
    }
}

/// Handle whose state and error events are driven by the test.
pub(crate) struct MockHandle {
    state: Mutex<HandleState>,
    closes: AtomicUsize,
    errors: broadcast::Sender<HandleError>,
}

impl MockHandle {
    fn new() -> Self {
        let (errors, _) = broadcast::channel(16);
        Self { state: Mutex::new(HandleState::Connected), closes: AtomicUsize::new(0), errors }
    }

    /// Raise an error event as the driver would.
    pub(crate) fn emit_error(&self, message: &str) {
        let _ = self.errors.send(HandleError::new(message));
    }

    /// Change the driver-reported state without any event.
    pub(crate) fn set_state(&self, state: HandleState) {
        *self.state.lock() = state;
    }

    pub(crate) fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DriverHandle for MockHandle {
    fn state(&self) -> HandleState {
        *self.state.lock()
    }

    async fn close(&self) -> Result<(), MooringError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        *self.state.lock() = HandleState::Disconnected;
        Ok(())
    }

    fn error_events(&self) -> broadcast::Receiver<HandleError> {
        self.errors.subscribe()
    }
}

/// Whether two handles are the same allocation.
pub(crate) fn same_handle(a: &Handle, b: &Handle) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Whether `handle` is the mock handle `mock`.
pub(crate) fn is_mock(handle: &Handle, mock: &Arc<MockHandle>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(handle), Arc::as_ptr(mock))
}
