//! Debouncer for typed search input.
//!
//! [`Debouncer`] owns a small timer task. Every pushed value restarts the
//! timer; only a value that stays unchanged for the whole delay is emitted
//! on the settled channel.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Capacity of the settled-value channel.
const SETTLED_CAPACITY: usize = 16;

enum Signal<T> {
    Value(T),
    Cancel,
}

/// Delays propagation of rapidly changing input until it stabilizes.
///
/// Dropping the debouncer aborts its timer task: a pending value is never
/// emitted after teardown.
#[derive(Debug)]
pub struct Debouncer<T> {
    input: mpsc::UnboundedSender<Signal<T>>,
    task: JoinHandle<()>,
    delay: Duration,
}

impl<T: Send + 'static> Debouncer<T> {
    /// Spawns the timer task and returns the debouncer together with the
    /// receiver of settled values.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(delay: Duration) -> (Self, mpsc::Receiver<T>) {
        let (input, input_rx) = mpsc::unbounded_channel();
        let (settled_tx, settled_rx) = mpsc::channel(SETTLED_CAPACITY);
        let task = tokio::spawn(run_timer(delay, input_rx, settled_tx));
        (Self { input, task, delay }, settled_rx)
    }

    /// Feeds a raw value, restarting the delay.
    pub fn push(&self, value: T) {
        // Only fails after the task was aborted, i.e. during teardown.
        let _ = self.input.send(Signal::Value(value));
    }

    /// Drops the pending value, if any, without emitting it.
    pub fn cancel(&self) {
        let _ = self.input.send(Signal::Cancel);
    }

    /// The configured delay.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_timer<T>(
    delay: Duration,
    mut input: mpsc::UnboundedReceiver<Signal<T>>,
    settled: mpsc::Sender<T>,
) {
    let mut pending: Option<T> = None;
    loop {
        let Some(value) = pending.take() else {
            match input.recv().await {
                Some(Signal::Value(value)) => pending = Some(value),
                Some(Signal::Cancel) => {}
                None => break,
            }
            continue;
        };

        tokio::select! {
            next = input.recv() => match next {
                Some(Signal::Value(newer)) => pending = Some(newer),
                Some(Signal::Cancel) => {}
                // Input closed while a value was pending: teardown, no emission.
                None => break,
            },
            () = tokio::time::sleep(delay) => {
                if settled.send(value).await.is_err() {
                    break;
                }
            }
        }
    }
}
