//! Debounce countdown.
//!
//! [`Debounce`] is a small state machine driven with explicit instants, so it
//! can be exercised with any clock. The session polls it from its event loop
//! and sleeps until [`Debounce::deadline`].
//!
//! ```text
//!   Idle --start/reset--> Counting --expire--> Idle   (fires once)
//!   Counting --pause--> Paused{Some(left)} --resume--> Counting
//!   Idle --pause--> Paused{None} --resume--> Idle
//!   Paused --reset--> Paused{Some(T)}
//! ```
//!
//! [`Debounce::fire_now`] is `reset` with a zero quiet period.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DebounceState {
    /// Nothing pending.
    Idle,
    /// Will fire at `deadline`.
    Counting { deadline: Instant },
    /// Suspended. `remaining` is what is left of an armed countdown.
    Paused { remaining: Option<Duration> },
}

#[derive(Clone, Debug)]
pub struct Debounce {
    period: Duration,
    state: DebounceState,
}

impl Debounce {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            state: DebounceState::Idle,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    /// When the pending trigger fires, if one is counting down.
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            DebounceState::Counting { deadline } => Some(deadline),
            DebounceState::Idle | DebounceState::Paused { .. } => None,
        }
    }

    /// A trigger is owed: counting, or armed while paused.
    pub fn is_armed(&self) -> bool {
        matches!(
            self.state,
            DebounceState::Counting { .. } | DebounceState::Paused { remaining: Some(_) }
        )
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.state, DebounceState::Paused { .. })
    }

    /// Cancel any pending countdown and restart it from the full period.
    ///
    /// While paused the countdown is re-armed but stays suspended until
    /// [`resume`](Self::resume).
    pub fn reset(&mut self, now: Instant) {
        self.state = match self.state {
            DebounceState::Paused { .. } => DebounceState::Paused {
                remaining: Some(self.period),
            },
            DebounceState::Idle | DebounceState::Counting { .. } => DebounceState::Counting {
                deadline: now + self.period,
            },
        };
    }

    /// Begin counting down if idle; continue if paused.
    pub fn start(&mut self, now: Instant) {
        match self.state {
            DebounceState::Idle => {
                self.state = DebounceState::Counting {
                    deadline: now + self.period,
                };
            }
            DebounceState::Paused { .. } => self.resume(now),
            DebounceState::Counting { .. } => {}
        }
    }

    /// Suspend without cancelling.
    pub fn pause(&mut self, now: Instant) {
        self.state = match self.state {
            DebounceState::Idle => DebounceState::Paused { remaining: None },
            DebounceState::Counting { deadline } => DebounceState::Paused {
                remaining: Some(deadline.saturating_duration_since(now)),
            },
            paused @ DebounceState::Paused { .. } => paused,
        };
    }

    /// Continue a paused countdown. A pause with nothing armed goes idle.
    pub fn resume(&mut self, now: Instant) {
        if let DebounceState::Paused { remaining } = self.state {
            self.state = match remaining {
                Some(left) => DebounceState::Counting {
                    deadline: now + left,
                },
                None => DebounceState::Idle,
            };
        }
    }

    /// Arm the countdown to expire at `now`, skipping the quiet period.
    /// While paused, the owed trigger fires as soon as it resumes.
    pub fn fire_now(&mut self, now: Instant) {
        self.state = match self.state {
            DebounceState::Paused { .. } => DebounceState::Paused {
                remaining: Some(Duration::ZERO),
            },
            DebounceState::Idle | DebounceState::Counting { .. } => {
                DebounceState::Counting { deadline: now }
            }
        };
    }

    /// Fire if the deadline has passed. Returns `true` exactly once per
    /// countdown; the machine does not re-arm itself.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.state {
            DebounceState::Counting { deadline } if deadline <= now => {
                self.state = DebounceState::Idle;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: Duration = Duration::from_millis(500);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn starts_idle_and_never_fires_on_its_own() {
        let t0 = Instant::now();
        let mut debounce = Debounce::new(T);
        assert_eq!(debounce.state(), DebounceState::Idle);
        assert!(!debounce.poll(t0 + ms(10_000)));
    }

    #[test]
    fn fires_once_after_quiet_period() {
        let t0 = Instant::now();
        let mut debounce = Debounce::new(T);
        debounce.start(t0);
        assert!(!debounce.poll(t0 + ms(499)));
        assert!(debounce.poll(t0 + ms(500)));
        assert!(!debounce.poll(t0 + ms(2_000)));
        assert_eq!(debounce.state(), DebounceState::Idle);
    }

    #[test]
    fn burst_of_resets_coalesces_into_one_fire() {
        let t0 = Instant::now();
        let mut debounce = Debounce::new(T);
        let mut fired = 0;
        for step in 0..10 {
            let now = t0 + ms(step * 100);
            if debounce.poll(now) {
                fired += 1;
            }
            debounce.reset(now);
        }
        // last reset at 900ms
        assert!(!debounce.poll(t0 + ms(1_399)));
        if debounce.poll(t0 + ms(1_400)) {
            fired += 1;
        }
        assert_eq!(fired, 1);
    }

    #[test]
    fn pause_preserves_remaining_time() {
        let t0 = Instant::now();
        let mut debounce = Debounce::new(T);
        debounce.reset(t0);
        debounce.pause(t0 + ms(200));
        assert_eq!(
            debounce.state(),
            DebounceState::Paused {
                remaining: Some(ms(300))
            }
        );
        assert!(!debounce.poll(t0 + ms(5_000)));

        debounce.resume(t0 + ms(5_000));
        assert_eq!(debounce.deadline(), Some(t0 + ms(5_300)));
    }

    #[test]
    fn reset_while_paused_rearms_without_starting() {
        let t0 = Instant::now();
        let mut debounce = Debounce::new(T);
        debounce.pause(t0);
        assert!(!debounce.is_armed());

        debounce.reset(t0 + ms(50));
        debounce.reset(t0 + ms(60));
        assert!(debounce.is_armed());
        assert!(debounce.deadline().is_none());
        assert!(!debounce.poll(t0 + ms(5_000)));

        debounce.resume(t0 + ms(1_000));
        assert_eq!(debounce.deadline(), Some(t0 + ms(1_500)));
    }

    #[test]
    fn resume_without_pending_goes_idle() {
        let t0 = Instant::now();
        let mut debounce = Debounce::new(T);
        debounce.pause(t0);
        debounce.resume(t0 + ms(10));
        assert_eq!(debounce.state(), DebounceState::Idle);
    }

    #[test]
    fn start_does_not_restart_a_running_countdown() {
        let t0 = Instant::now();
        let mut debounce = Debounce::new(T);
        debounce.start(t0);
        debounce.start(t0 + ms(400));
        assert_eq!(debounce.deadline(), Some(t0 + T));
    }

    #[test]
    fn start_continues_a_paused_countdown() {
        let t0 = Instant::now();
        let mut debounce = Debounce::new(T);
        debounce.start(t0);
        debounce.pause(t0 + ms(100));
        debounce.start(t0 + ms(1_000));
        assert_eq!(debounce.deadline(), Some(t0 + ms(1_400)));
    }

    #[test]
    fn fire_now_skips_the_quiet_period() {
        let t0 = Instant::now();
        let mut debounce = Debounce::new(T);
        debounce.reset(t0);
        debounce.fire_now(t0 + ms(100));
        assert!(debounce.poll(t0 + ms(100)));
        assert!(!debounce.poll(t0 + ms(600)));
    }

    #[test]
    fn fire_now_while_paused_waits_for_resume() {
        let t0 = Instant::now();
        let mut debounce = Debounce::new(T);
        debounce.pause(t0);
        debounce.fire_now(t0);
        assert!(!debounce.poll(t0 + ms(1_000)));
        debounce.resume(t0 + ms(2_000));
        assert!(debounce.poll(t0 + ms(2_000)));
    }
}
