// Event-type probability budget for a battle royale.

use serde::{Deserialize, Serialize};

use super::SimulationError;

/// Probability configuration for the per-elimination event draw.
///
/// The four values share one budget; whatever is left over is the mass of
/// plain weapon kills. Configurations are validated, never renormalized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Probabilities {
    pub suicide: f64,
    pub block: f64,
    pub bomb_or_melee: f64,
    pub exotic: f64,
}

impl Default for Probabilities {
    fn default() -> Self {
        Self {
            suicide: 0.05,
            block: 0.3,
            bomb_or_melee: 0.15,
            exotic: 0.05,
        }
    }
}

impl Probabilities {
    /// Only plain weapon kills.
    pub fn weapon_kills_only() -> Self {
        Self {
            suicide: 0.0,
            block: 0.0,
            bomb_or_melee: 0.0,
            exotic: 0.0,
        }
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        let named = [
            ("suicide", self.suicide),
            ("block", self.block),
            ("bomb_or_melee", self.bomb_or_melee),
            ("exotic", self.exotic),
        ];

        for (name, value) in named {
            if !(0.0..=1.0).contains(&value) {
                return Err(SimulationError::InvalidProbability(format!(
                    "{name} = {value} is outside [0, 1]"
                )));
            }
        }

        let sum = self.suicide + self.block + self.bomb_or_melee + self.exotic;
        if sum > 1.0 + f64::EPSILON {
            return Err(SimulationError::InvalidProbability(format!(
                "probabilities sum to {sum}, which exceeds 1"
            )));
        }

        // Kills happen below `1 - block + suicide`; if that bound is 0 every
        // attack is blocked and the roster never shrinks.
        if self.kill_threshold() <= 0.0 {
            return Err(SimulationError::InvalidProbability(
                "block leaves no probability mass for eliminations".to_string(),
            ));
        }

        Ok(())
    }

    /// Upper bound (exclusive) of the draw that still eliminates the target.
    pub(crate) fn kill_threshold(&self) -> f64 {
        1.0 - self.block + self.suicide
    }

    pub(crate) fn bomb_or_melee_threshold(&self) -> f64 {
        self.suicide + self.bomb_or_melee
    }

    /// Draws below this value (inside the bomb-or-melee range) are bombs.
    pub(crate) fn bomb_threshold(&self) -> f64 {
        self.suicide + self.bomb_or_melee / 2.0
    }

    pub(crate) fn exotic_threshold(&self) -> f64 {
        self.suicide + self.bomb_or_melee + self.exotic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(Probabilities::default().validate().is_ok());
        assert!(Probabilities::weapon_kills_only().validate().is_ok());
    }

    #[test]
    fn test_out_of_range_rejected() {
        let odds = Probabilities {
            suicide: -0.1,
            ..Probabilities::weapon_kills_only()
        };
        assert!(matches!(
            odds.validate(),
            Err(SimulationError::InvalidProbability(_))
        ));

        let odds = Probabilities {
            exotic: 1.5,
            ..Probabilities::weapon_kills_only()
        };
        assert!(odds.validate().is_err());

        let odds = Probabilities {
            block: f64::NAN,
            ..Probabilities::weapon_kills_only()
        };
        assert!(odds.validate().is_err());
    }

    #[test]
    fn test_sum_over_one_rejected() {
        let odds = Probabilities {
            suicide: 0.6,
            block: 0.6,
            ..Probabilities::weapon_kills_only()
        };
        let err = odds.validate().unwrap_err();
        assert!(matches!(err, SimulationError::InvalidProbability(_)));
        assert!(err.to_string().contains("exceeds 1"));
    }

    #[test]
    fn test_all_suicide_is_valid() {
        let odds = Probabilities {
            suicide: 1.0,
            ..Probabilities::weapon_kills_only()
        };
        assert!(odds.validate().is_ok());
    }

    #[test]
    fn test_block_only_rejected() {
        let odds = Probabilities {
            block: 1.0,
            ..Probabilities::weapon_kills_only()
        };
        assert!(odds.validate().is_err());
    }

    #[test]
    fn test_thresholds() {
        let odds = Probabilities::default();
        assert!((odds.kill_threshold() - 0.75).abs() < 1e-9);
        assert!((odds.bomb_or_melee_threshold() - 0.2).abs() < 1e-9);
        assert!((odds.bomb_threshold() - 0.125).abs() < 1e-9);
        assert!((odds.exotic_threshold() - 0.25).abs() < 1e-9);
    }
}
