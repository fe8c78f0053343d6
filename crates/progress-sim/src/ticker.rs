use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use crate::simulator::{ProgressSimulator, ProgressView};

/// Fixed cadence between cosmetic step advances.
pub const STEP_INTERVAL: Duration = Duration::from_millis(1_800);

enum Command {
    Complete,
    Reset(Vec<String>),
}

/// Owns a [`ProgressSimulator`] on a background task and publishes a
/// [`ProgressView`] after every change. Dropping the ticker stops it.
pub struct ProgressTicker {
    commands: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<ProgressView>,
    task: JoinHandle<()>,
}

impl ProgressTicker {
    pub fn spawn(steps: Vec<String>, period: Duration) -> Self {
        let simulator = ProgressSimulator::new(steps);
        let (view_tx, view) = watch::channel(simulator.view());
        let (commands, command_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(simulator, period, command_rx, view_tx));
        Self { commands, view, task }
    }

    /// The real artifact arrived.
    pub fn complete(&self) {
        self.send(Command::Complete);
    }

    /// Starts over with a new step list and a fresh timer.
    pub fn reset(&self, steps: Vec<String>) {
        self.send(Command::Reset(steps));
    }

    pub fn view(&self) -> ProgressView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProgressView> {
        self.view.clone()
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("Progress ticker already stopped");
        }
    }
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    mut simulator: ProgressSimulator,
    period: Duration,
    mut commands: mpsc::UnboundedReceiver<Command>,
    view: watch::Sender<ProgressView>,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick(), if !simulator.is_complete() => {
                if simulator.tick() {
                    view.send_replace(simulator.view());
                }
            }
            command = commands.recv() => match command {
                Some(Command::Complete) => {
                    simulator.mark_complete();
                    view.send_replace(simulator.view());
                }
                Some(Command::Reset(steps)) => {
                    simulator.reset(steps);
                    ticker.reset();
                    view.send_replace(simulator.view());
                }
                None => break,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::OVERFLOW_STEPS;

    fn make_steps(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("step {}", i)).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_advances_once_per_interval() {
        let ticker = ProgressTicker::spawn(make_steps(4), STEP_INTERVAL);

        tokio::time::sleep(STEP_INTERVAL / 2).await;
        assert_eq!(ticker.view().completed, 0);

        tokio::time::sleep(STEP_INTERVAL).await;
        assert_eq!(ticker.view().completed, 1);

        tokio::time::sleep(STEP_INTERVAL * 2).await;
        assert_eq!(ticker.view().completed, 3);
        assert_eq!(ticker.view().steps.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overflow_keeps_growing_until_complete() {
        let ticker = ProgressTicker::spawn(make_steps(2), STEP_INTERVAL);

        tokio::time::sleep(STEP_INTERVAL * 3 + STEP_INTERVAL / 2).await;
        let view = ticker.view();
        assert_eq!(view.steps.len(), 4);
        assert_eq!(view.steps[2], OVERFLOW_STEPS[0]);
        assert_eq!(view.completed, 3);
        assert!(!view.complete);

        ticker.complete();
        let mut rx = ticker.subscribe();
        let done = rx.wait_for(|v| v.complete).await.unwrap().clone();
        assert_eq!(done.completed, 4);

        tokio::time::sleep(STEP_INTERVAL * 5).await;
        assert_eq!(ticker.view(), done);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_ignores_elapsed_ticks() {
        let ticker = ProgressTicker::spawn(make_steps(6), STEP_INTERVAL);
        ticker.complete();

        let mut rx = ticker.subscribe();
        let done = rx.wait_for(|v| v.complete).await.unwrap().clone();
        assert_eq!(done.completed, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_restarts_timer() {
        let ticker = ProgressTicker::spawn(make_steps(3), STEP_INTERVAL);
        tokio::time::sleep(STEP_INTERVAL + STEP_INTERVAL / 2).await;
        assert_eq!(ticker.view().completed, 1);

        ticker.reset(make_steps(5));
        let mut rx = ticker.subscribe();
        let fresh = rx.wait_for(|v| v.steps.len() == 5).await.unwrap().clone();
        assert_eq!(fresh.completed, 0);

        tokio::time::sleep(STEP_INTERVAL / 2).await;
        assert_eq!(ticker.view().completed, 0);
        tokio::time::sleep(STEP_INTERVAL).await;
        assert_eq!(ticker.view().completed, 1);
    }
}
