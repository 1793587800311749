use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use tokio::time::sleep;
use tracing::{error, info};

use crate::config::SchedulerSection;
use crate::run::{RunOrchestrator, RunReport, RunResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    Idle,
    Running,
    CooldownSuccess,
    CooldownError,
}

#[derive(Debug, Clone)]
pub struct SchedulerState {
    pub phase: SchedulerPhase,
    pub last_run_started: Option<DateTime<Utc>>,
    pub runs_completed: u64,
    pub consecutive_failures: u32,
}

impl Default for SchedulerState {
    fn default() -> Self {
        Self {
            phase: SchedulerPhase::Idle,
            last_run_started: None,
            runs_completed: 0,
            consecutive_failures: 0,
        }
    }
}

#[async_trait(?Send)]
pub trait RunPipeline {
    async fn run_once(&mut self) -> RunResult<RunReport>;
}

#[async_trait(?Send)]
impl RunPipeline for RunOrchestrator {
    async fn run_once(&mut self) -> RunResult<RunReport> {
        RunOrchestrator::run_once(self).await
    }
}

/// Target inter-run delay after a successful run: uniform inside the
/// configured window, minus the time the run itself took, floored at the
/// configured minimum.
pub fn success_delay<R: Rng + ?Sized>(
    rng: &mut R,
    config: &SchedulerSection,
    elapsed: Duration,
) -> Duration {
    let [low, high] = config.post_interval_minutes;
    let minutes = rng.gen_range(low.min(high)..=low.max(high));
    let target = Duration::from_secs(minutes * 60);
    let floor = Duration::from_secs(config.minimum_delay_minutes * 60);
    target.saturating_sub(elapsed).max(floor)
}

/// Back-off after a failed run. Replaces the normal inter-run delay for
/// that cycle.
pub fn backoff_delay<R: Rng + ?Sized>(rng: &mut R, config: &SchedulerSection) -> Duration {
    let [low, high] = config.error_backoff_minutes;
    let minutes = rng.gen_range(low.min(high)..=low.max(high));
    Duration::from_secs(minutes * 60)
}

/// Runs the pipeline forever: Idle → Running → Cooldown → Idle. A failed
/// run is logged and retried after back-off — there is no retry cap and no
/// terminal state short of the process being killed.
pub struct Scheduler {
    pipeline: Box<dyn RunPipeline>,
    config: SchedulerSection,
    state: SchedulerState,
}

impl Scheduler {
    pub fn new(pipeline: Box<dyn RunPipeline>, config: SchedulerSection) -> Self {
        Self {
            pipeline,
            config,
            state: SchedulerState::default(),
        }
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    pub async fn run_forever(&mut self) {
        info!(
            interval = ?self.config.post_interval_minutes,
            backoff = ?self.config.error_backoff_minutes,
            "scheduler starting"
        );
        loop {
            self.state.phase = SchedulerPhase::Running;
            self.state.last_run_started = Some(Utc::now());
            let started = Instant::now();

            let delay = match self.pipeline.run_once().await {
                Ok(report) => {
                    self.state.runs_completed += 1;
                    self.state.consecutive_failures = 0;
                    self.state.phase = SchedulerPhase::CooldownSuccess;
                    let delay =
                        success_delay(&mut rand::thread_rng(), &self.config, started.elapsed());
                    info!(
                        run_id = %report.run_id,
                        next_run_minutes = delay.as_secs() / 60,
                        "run succeeded, waiting for next cycle"
                    );
                    delay
                }
                Err(err) => {
                    self.state.consecutive_failures += 1;
                    self.state.phase = SchedulerPhase::CooldownError;
                    let delay = backoff_delay(&mut rand::thread_rng(), &self.config);
                    error!(
                        error = %err,
                        consecutive_failures = self.state.consecutive_failures,
                        backoff_minutes = delay.as_secs() / 60,
                        "run failed, backing off"
                    );
                    delay
                }
            };

            sleep(delay).await;
            self.state.phase = SchedulerPhase::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::RunError;
    use crate::discovery::DiscoveryError;
    use futures::future::poll_fn;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::future::Future;
    use std::pin::Pin;
    use std::rc::Rc;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::task::Poll;
    use uuid::Uuid;

    #[test]
    fn success_delay_stays_within_bounds() {
        let config = SchedulerSection::default();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..500 {
            let delay = success_delay(&mut rng, &config, Duration::from_secs(5 * 60));
            assert!(delay >= Duration::from_secs(60), "delay below floor: {delay:?}");
            assert!(
                delay <= Duration::from_secs(70 * 60),
                "delay above window: {delay:?}"
            );
        }
    }

    #[test]
    fn success_delay_floors_when_run_outlasts_window() {
        let config = SchedulerSection::default();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let delay = success_delay(&mut rng, &config, Duration::from_secs(90 * 60));
        assert_eq!(delay, Duration::from_secs(60));
    }

    #[test]
    fn backoff_delay_stays_within_bounds() {
        let config = SchedulerSection::default();
        let mut rng = ChaCha8Rng::seed_from_u64(13);
        for _ in 0..500 {
            let delay = backoff_delay(&mut rng, &config);
            assert!(delay >= Duration::from_secs(30 * 60));
            assert!(delay <= Duration::from_secs(60 * 60));
        }
    }

    struct CountingPipeline {
        runs: Rc<AtomicU64>,
        fail: bool,
    }

    #[async_trait(?Send)]
    impl RunPipeline for CountingPipeline {
        async fn run_once(&mut self) -> RunResult<RunReport> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(RunError::Discovery(DiscoveryError::NoContent))
            } else {
                Ok(RunReport {
                    run_id: Uuid::new_v4(),
                    url: "https://i.pinimg.com/originals/a.jpg".to_string(),
                    bytes: 10,
                    duration_ms: 1,
                })
            }
        }
    }

    async fn poll_once(future: &mut Pin<Box<impl Future<Output = ()>>>) {
        poll_fn(|cx| match future.as_mut().poll(cx) {
            Poll::Pending => Poll::Ready(()),
            Poll::Ready(()) => panic!("scheduler loop terminated"),
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_runs_are_retried_after_backoff() {
        let runs = Rc::new(AtomicU64::new(0));
        let pipeline = CountingPipeline {
            runs: Rc::clone(&runs),
            fail: true,
        };
        let mut scheduler = Scheduler::new(Box::new(pipeline), SchedulerSection::default());

        let mut future = Box::pin(scheduler.run_forever());
        poll_once(&mut future).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        // Back-off is at most 60 minutes; after advancing past it the loop
        // must have started the next run.
        tokio::time::advance(Duration::from_secs(60 * 60)).await;
        poll_once(&mut future).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn successful_runs_wait_out_the_full_window() {
        let runs = Rc::new(AtomicU64::new(0));
        let pipeline = CountingPipeline {
            runs: Rc::clone(&runs),
            fail: false,
        };
        let mut scheduler = Scheduler::new(Box::new(pipeline), SchedulerSection::default());

        let mut future = Box::pin(scheduler.run_forever());
        poll_once(&mut future).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        // Under a minute in: still cooling down.
        tokio::time::advance(Duration::from_secs(30)).await;
        poll_once(&mut future).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        // Past the upper bound of the window: next run must have fired.
        tokio::time::advance(Duration::from_secs(70 * 60)).await;
        poll_once(&mut future).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }
}
