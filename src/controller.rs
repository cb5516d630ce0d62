//! Phase controllers: the wait/countdown gate and the delayed PVP switch
//!
//! Controllers are plain counters ticked once per second by their owning
//! arena. They hold no reference back to the arena; each tick returns a step
//! and the arena applies it. Cancellation is explicit and final: a cancelled
//! controller reports `Cancelled` forever and the arena discards it.

use crate::config::GameConfig;

pub trait Controller {
    fn cancel(&mut self);

    fn is_cancelled(&self) -> bool;

    /// Seconds counted in the current sub-phase.
    fn elapsed(&self) -> u32;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownReason {
    /// Capacity reached, waiting skipped
    Full,
    /// Wait duration ran out
    WaitElapsed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStep {
    /// Controller is dead; ignore
    Cancelled,
    /// Too few alive players; the round goes back to idle
    Abort,
    Waiting { remaining: u32 },
    CountdownStarted(CountdownReason),
    Countdown { remaining: u32 },
    /// Countdown finished; start the round
    Activate,
}

/// Gates round start on player count and elapsed wait time.
#[derive(Debug)]
pub struct WaitingCountdown {
    wait_secs: u32,
    countdown_secs: u32,
    min_players: usize,
    max_players: usize,
    elapsed: u32,
    in_countdown: bool,
    cancelled: bool,
}

impl WaitingCountdown {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            wait_secs: config.wait_time_seconds,
            countdown_secs: config.countdown_seconds,
            min_players: config.min_players_to_start,
            max_players: config.max_players_per_arena,
            elapsed: 0,
            in_countdown: false,
            cancelled: false,
        }
    }

    pub fn in_countdown(&self) -> bool {
        self.in_countdown
    }

    pub fn tick(&mut self, alive: usize) -> WaitStep {
        if self.cancelled {
            return WaitStep::Cancelled;
        }

        self.elapsed += 1;

        if alive < self.min_players {
            self.cancel();
            return WaitStep::Abort;
        }

        if !self.in_countdown {
            if alive >= self.max_players {
                return self.enter_countdown(CountdownReason::Full);
            }
            let remaining = self.wait_secs.saturating_sub(self.elapsed);
            if remaining > 0 {
                WaitStep::Waiting { remaining }
            } else {
                self.enter_countdown(CountdownReason::WaitElapsed)
            }
        } else {
            let remaining = self.countdown_secs.saturating_sub(self.elapsed);
            if remaining > 0 {
                WaitStep::Countdown { remaining }
            } else {
                self.cancel();
                WaitStep::Activate
            }
        }
    }

    fn enter_countdown(&mut self, reason: CountdownReason) -> WaitStep {
        self.in_countdown = true;
        self.elapsed = 0;
        WaitStep::CountdownStarted(reason)
    }
}

impl Controller for WaitingCountdown {
    fn cancel(&mut self) {
        self.cancelled = true;
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    fn elapsed(&self) -> u32 {
        self.elapsed
    }
}

/// What one PVP timer tick fired. Both can fire on the same tick when the
/// warning lead is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PvpStep {
    pub warn: bool,
    pub activate: bool,
}

/// Delays unrestricted combat after a round starts.
#[derive(Debug)]
pub struct PvpActivation {
    activation_secs: u32,
    warning_lead_secs: u32,
    elapsed: u32,
    warned: bool,
    cancelled: bool,
}

impl PvpActivation {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            activation_secs: config.pvp_mode.activation_time_minutes.saturating_mul(60),
            warning_lead_secs: config.pvp_mode.warning_time_seconds,
            elapsed: 0,
            warned: false,
            cancelled: false,
        }
    }

    pub fn warning_lead(&self) -> u32 {
        self.warning_lead_secs
    }

    pub fn tick(&mut self) -> PvpStep {
        let mut step = PvpStep::default();
        if self.cancelled {
            return step;
        }

        self.elapsed += 1;

        let warn_at = self.activation_secs.saturating_sub(self.warning_lead_secs);
        if !self.warned && self.elapsed >= warn_at {
            self.warned = true;
            step.warn = true;
        }
        if self.elapsed >= self.activation_secs {
            self.cancel();
            step.activate = true;
        }
        step
    }
}

impl Controller for PvpActivation {
    fn cancel(&mut self) {
        self.cancelled = true;
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    fn elapsed(&self) -> u32 {
        self.elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GameConfig {
        GameConfig::default().min_players(2).max_players(4).wait_seconds(3).countdown(2)
    }

    #[test]
    fn test_wait_then_countdown_then_activate() {
        let mut c = WaitingCountdown::new(&config());
        assert_eq!(c.tick(2), WaitStep::Waiting { remaining: 2 });
        assert_eq!(c.tick(2), WaitStep::Waiting { remaining: 1 });
        assert_eq!(c.tick(2), WaitStep::CountdownStarted(CountdownReason::WaitElapsed));
        assert!(c.in_countdown());
        assert_eq!(c.elapsed(), 0);
        assert_eq!(c.tick(2), WaitStep::Countdown { remaining: 1 });
        assert_eq!(c.tick(2), WaitStep::Activate);
        assert!(c.is_cancelled());
        assert_eq!(c.tick(2), WaitStep::Cancelled);
    }

    #[test]
    fn test_full_arena_skips_wait() {
        let mut c = WaitingCountdown::new(&config());
        assert_eq!(c.tick(4), WaitStep::CountdownStarted(CountdownReason::Full));
    }

    #[test]
    fn test_abort_below_minimum_in_either_sub_phase() {
        let mut c = WaitingCountdown::new(&config());
        assert_eq!(c.tick(1), WaitStep::Abort);
        assert_eq!(c.tick(3), WaitStep::Cancelled);

        let mut c = WaitingCountdown::new(&config());
        c.tick(4);
        assert_eq!(c.tick(1), WaitStep::Abort);
    }

    #[test]
    fn test_pvp_warns_once_then_activates_once() {
        let config = GameConfig::default().pvp(true, 3, 30);
        let mut c = PvpActivation::new(&config);

        let mut warnings = Vec::new();
        let mut activations = Vec::new();
        for second in 1..=300 {
            let step = c.tick();
            if step.warn {
                warnings.push(second);
            }
            if step.activate {
                activations.push(second);
            }
        }
        assert_eq!(warnings, vec![150]);
        assert_eq!(activations, vec![180]);
        assert!(c.is_cancelled());
    }

    #[test]
    fn test_pvp_zero_lead_fires_together() {
        let config = GameConfig::default().pvp(true, 1, 0);
        let mut c = PvpActivation::new(&config);
        for _ in 1..60 {
            assert_eq!(c.tick(), PvpStep::default());
        }
        assert_eq!(c.tick(), PvpStep { warn: true, activate: true });
    }
}
