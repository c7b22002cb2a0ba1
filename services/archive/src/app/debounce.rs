//! services/archive/src/app/debounce.rs
//!
//! A small debouncer: values pushed in quick succession collapse into one
//! delivery of the latest value once the input has been quiet for `delay`.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct Debouncer<T> {
    sender: mpsc::UnboundedSender<T>,
    task: JoinHandle<()>,
}

impl<T: Send + 'static> Debouncer<T> {
    /// Spawns the timer task. `on_settled` runs on the runtime for every
    /// settled value. Must be called from within a tokio runtime.
    pub fn spawn<F>(delay: Duration, mut on_settled: F) -> Self
    where
        F: FnMut(T) + Send + 'static,
    {
        let (sender, mut receiver) = mpsc::unbounded_channel::<T>();

        let task = tokio::spawn(async move {
            while let Some(mut latest) = receiver.recv().await {
                loop {
                    tokio::select! {
                        next = receiver.recv() => match next {
                            Some(value) => latest = value,
                            // Torn down with a value pending: drop it.
                            None => return,
                        },
                        _ = tokio::time::sleep(delay) => {
                            on_settled(latest);
                            break;
                        }
                    }
                }
            }
        });

        Self { sender, task }
    }

    /// Pushes a new value and restarts the quiet period.
    pub fn push(&self, value: T) {
        // The receiver only goes away when the task is aborted on drop.
        let _ = self.sender.send(value);
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}
