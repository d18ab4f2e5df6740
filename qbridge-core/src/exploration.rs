//! Exploration schedule of the decision service.
use serde::{Deserialize, Serialize};

/// Episode-indexed linear decay of the exploration probability.
///
/// The schedule is a function of the episode counter alone, never of step or
/// message counts, so the amount of exploration is insulated from how many
/// steps occur per pseudo-episode.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct EpsilonSchedule {
    /// Exploration probability of the first episode.
    pub eps_start: f64,

    /// Floor reached after `decay_episodes` episodes.
    pub eps_min: f64,

    /// Episode index at which the floor is reached.
    pub decay_episodes: usize,
}

impl Default for EpsilonSchedule {
    fn default() -> Self {
        Self {
            eps_start: 1.0,
            eps_min: 0.1,
            decay_episodes: 2000,
        }
    }
}

impl EpsilonSchedule {
    /// Exploration probability for the given episode index.
    pub fn value(&self, episode_idx: usize) -> f64 {
        if episode_idx <= 1 {
            return self.eps_start;
        }
        if episode_idx >= self.decay_episodes {
            return self.eps_min;
        }
        let t = (episode_idx - 1) as f64 / (self.decay_episodes - 1) as f64;
        (self.eps_start + t * (self.eps_min - self.eps_start)).max(self.eps_min)
    }

    /// Sets the probability of the first episode.
    pub fn eps_start(mut self, v: f64) -> Self {
        self.eps_start = v;
        self
    }

    /// Sets the floor probability.
    pub fn eps_min(mut self, v: f64) -> Self {
        self.eps_min = v;
        self
    }

    /// Sets the episode index at which the floor is reached.
    pub fn decay_episodes(mut self, v: usize) -> Self {
        self.decay_episodes = v;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints() {
        let schedule = EpsilonSchedule::default().decay_episodes(1000);
        assert_eq!(schedule.value(0), 1.0);
        assert_eq!(schedule.value(1), 1.0);
        assert_eq!(schedule.value(1000), 0.1);
        assert_eq!(schedule.value(5000), 0.1);
    }

    #[test]
    fn monotone_non_increasing() {
        let schedule = EpsilonSchedule::default().decay_episodes(100);
        let mut prev = schedule.value(1);
        for episode in 2..120 {
            let eps = schedule.value(episode);
            assert!(eps <= prev, "eps increased at episode {}", episode);
            assert!(eps >= schedule.eps_min);
            prev = eps;
        }
    }

    #[test]
    fn linear_midpoint() {
        let schedule = EpsilonSchedule::default().decay_episodes(3);
        assert!((schedule.value(2) - 0.55).abs() < 1e-12);
    }
}
