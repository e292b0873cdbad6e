//! Decides whether an event is worth an advisory call.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Everything the gate looks at for one event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateInput {
    pub enabled: bool,
    pub duplicate: bool,
    pub novelty: f64,
    pub last_dispatch: Option<DateTime<Utc>>,
    pub now: DateTime<Utc>,
}

/// Outcome of [`AdvisoryGate::evaluate`]. Only [`GateDecision::Dispatch`]
/// allows a call; the rest name the first check that failed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateDecision {
    Dispatch,
    Disabled,
    Duplicate,
    BelowThreshold { novelty: f64, threshold: f64 },
    CoolingDown { remaining: Duration },
}

impl GateDecision {
    pub fn should_dispatch(&self) -> bool {
        matches!(self, GateDecision::Dispatch)
    }
}

/// Novelty threshold plus per-session cooldown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdvisoryGate {
    threshold: f64,
    cooldown: Duration,
}

impl AdvisoryGate {
    pub fn new(threshold: f64, cooldown: Duration) -> Self {
        Self {
            threshold,
            cooldown,
        }
    }

    /// Run the checks in order: enabled, not duplicate, novelty at or above
    /// the threshold, cooldown elapsed since the last dispatch.
    ///
    /// A last dispatch in the future (clock moved backwards) counts as
    /// still cooling down.
    pub fn evaluate(&self, input: &GateInput) -> GateDecision {
        if !input.enabled {
            return GateDecision::Disabled;
        }
        if input.duplicate {
            return GateDecision::Duplicate;
        }
        if input.novelty < self.threshold {
            return GateDecision::BelowThreshold {
                novelty: input.novelty,
                threshold: self.threshold,
            };
        }
        let Some(last) = input.last_dispatch else {
            return GateDecision::Dispatch;
        };
        match (input.now - last).to_std() {
            Ok(elapsed) if elapsed >= self.cooldown => GateDecision::Dispatch,
            Ok(elapsed) => GateDecision::CoolingDown {
                remaining: self.cooldown - elapsed,
            },
            Err(_) => GateDecision::CoolingDown {
                remaining: self.cooldown,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COOLDOWN: Duration = Duration::from_secs(300);

    fn gate() -> AdvisoryGate {
        AdvisoryGate::new(0.6, COOLDOWN)
    }

    fn passing(now: DateTime<Utc>) -> GateInput {
        GateInput {
            enabled: true,
            duplicate: false,
            novelty: 0.9,
            last_dispatch: None,
            now,
        }
    }

    #[test]
    fn dispatches_when_every_check_passes() {
        let now = Utc::now();
        assert_eq!(gate().evaluate(&passing(now)), GateDecision::Dispatch);
    }

    #[test]
    fn each_condition_blocks_independently() {
        let now = Utc::now();
        let g = gate();

        let disabled = GateInput {
            enabled: false,
            ..passing(now)
        };
        assert_eq!(g.evaluate(&disabled), GateDecision::Disabled);

        let duplicate = GateInput {
            duplicate: true,
            ..passing(now)
        };
        assert_eq!(g.evaluate(&duplicate), GateDecision::Duplicate);

        let low = GateInput {
            novelty: 0.59,
            ..passing(now)
        };
        assert!(matches!(
            g.evaluate(&low),
            GateDecision::BelowThreshold { .. }
        ));

        let recent = GateInput {
            last_dispatch: Some(now - chrono::Duration::seconds(10)),
            ..passing(now)
        };
        assert_eq!(
            g.evaluate(&recent),
            GateDecision::CoolingDown {
                remaining: Duration::from_secs(290)
            }
        );
    }

    #[test]
    fn full_input_matrix() {
        let now = Utc::now();
        let g = gate();
        for enabled in [false, true] {
            for duplicate in [false, true] {
                for novelty in [0.2, 0.6, 0.95] {
                    for last in [None, Some(60), Some(300), Some(3600)] {
                        let input = GateInput {
                            enabled,
                            duplicate,
                            novelty,
                            last_dispatch: last.map(|s| now - chrono::Duration::seconds(s)),
                            now,
                        };
                        let expected = enabled
                            && !duplicate
                            && novelty >= 0.6
                            && last.map_or(true, |s| s >= 300);
                        assert_eq!(
                            g.evaluate(&input).should_dispatch(),
                            expected,
                            "{input:?}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn threshold_is_inclusive_and_so_is_cooldown() {
        let now = Utc::now();
        let exact = GateInput {
            novelty: 0.6,
            last_dispatch: Some(now - chrono::Duration::seconds(300)),
            ..passing(now)
        };
        assert_eq!(gate().evaluate(&exact), GateDecision::Dispatch);
    }

    #[test]
    fn future_last_dispatch_is_cooling_down() {
        let now = Utc::now();
        let skewed = GateInput {
            last_dispatch: Some(now + chrono::Duration::seconds(30)),
            ..passing(now)
        };
        assert_eq!(
            gate().evaluate(&skewed),
            GateDecision::CoolingDown {
                remaining: COOLDOWN
            }
        );
    }

    #[test]
    fn zero_cooldown_always_allows() {
        let now = Utc::now();
        let g = AdvisoryGate::new(0.0, Duration::ZERO);
        let input = GateInput {
            novelty: 0.0,
            last_dispatch: Some(now),
            ..passing(now)
        };
        assert!(g.evaluate(&input).should_dispatch());
    }
}
