use rand::Rng;
use std::collections::HashSet;

/// Fallback when the highest issue number cannot be estimated.
pub const DEFAULT_HIGHEST_NUMBER: u32 = 50;

/// Hard cap on individual probes in one retrieval.
pub const MAX_PROBES: usize = 150;

const SMALL_RANGE: u32 = 100;
const MEDIUM_RANGE: u32 = 1_000;
const MEDIUM_RECENT_WINDOW: u32 = 50;
const MEDIUM_STRIDE: u32 = 10;
const LARGE_RECENT_WINDOW: u32 = 30;
const LARGE_CHECKPOINTS: u32 = 20;
const LARGE_RANDOM_SAMPLES: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryScale {
    Small,
    Medium,
    Large,
}

/// Issue numbers to probe, most promising first.
#[derive(Debug, Clone)]
pub struct SamplingPlan {
    pub scale: RepositoryScale,
    pub numbers: Vec<u64>,
}

impl SamplingPlan {
    pub fn build<R: Rng>(highest: u32, rng: &mut R) -> Self {
        let highest = highest.max(1);
        let mut plan = PlanBuilder::default();

        let scale = if highest <= SMALL_RANGE {
            for n in (1..=highest).rev() {
                plan.push(n);
            }
            RepositoryScale::Small
        } else if highest <= MEDIUM_RANGE {
            let window_start = highest - MEDIUM_RECENT_WINDOW + 1;
            for n in (window_start..=highest).rev() {
                plan.push(n);
            }
            for n in (1..window_start).rev().step_by(MEDIUM_STRIDE as usize) {
                plan.push(n);
            }
            RepositoryScale::Medium
        } else {
            let window_start = highest - LARGE_RECENT_WINDOW + 1;
            for n in (window_start..=highest).rev() {
                plan.push(n);
            }

            let older = window_start - 1;
            let step = (older / LARGE_CHECKPOINTS).max(1);
            for i in 0..LARGE_CHECKPOINTS {
                let n = older.saturating_sub(i * step);
                if n >= 1 {
                    plan.push(n);
                }
            }

            let mut drawn = 0;
            let mut attempts = 0;
            while drawn < LARGE_RANDOM_SAMPLES && attempts < LARGE_RANDOM_SAMPLES * 10 {
                attempts += 1;
                if plan.push(rng.gen_range(1..=older)) {
                    drawn += 1;
                }
            }
            RepositoryScale::Large
        };

        let mut numbers = plan.numbers;
        numbers.truncate(MAX_PROBES);
        Self { scale, numbers }
    }
}

#[derive(Default)]
struct PlanBuilder {
    seen: HashSet<u64>,
    numbers: Vec<u64>,
}

impl PlanBuilder {
    fn push(&mut self, number: u32) -> bool {
        let number = u64::from(number);
        if self.seen.insert(number) {
            self.numbers.push(number);
            true
        } else {
            false
        }
    }
}

/// Converts a tracker-reported number into a probe ceiling, never letting an
/// out-of-range value through.
pub fn clamp_highest_number(raw: Option<u64>) -> u32 {
    match raw.map(u32::try_from) {
        Some(Ok(n)) if n > 0 => n,
        Some(_) => {
            tracing::warn!(
                "Highest issue number out of range, using {}",
                DEFAULT_HIGHEST_NUMBER
            );
            DEFAULT_HIGHEST_NUMBER
        }
        None => DEFAULT_HIGHEST_NUMBER,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_small_range_probes_everything() {
        let plan = SamplingPlan::build(12, &mut rng());
        assert_eq!(plan.scale, RepositoryScale::Small);
        assert_eq!(plan.numbers, (1..=12).rev().collect::<Vec<u64>>());
    }

    #[test]
    fn test_medium_range_recent_window_then_decimated() {
        let plan = SamplingPlan::build(400, &mut rng());
        assert_eq!(plan.scale, RepositoryScale::Medium);
        assert_eq!(plan.numbers[0], 400);
        assert_eq!(plan.numbers[49], 351);
        assert_eq!(plan.numbers[50], 350);
        assert_eq!(plan.numbers[51], 340);
        assert!(plan.numbers.iter().all(|n| (1..=400).contains(n)));
    }

    #[test]
    fn test_large_range_is_bounded_and_unique() {
        let plan = SamplingPlan::build(250_000, &mut rng());
        assert_eq!(plan.scale, RepositoryScale::Large);
        assert_eq!(plan.numbers[0], 250_000);
        assert!(plan.numbers.len() <= MAX_PROBES);
        assert!(plan.numbers.len() >= 60);
        let unique: HashSet<_> = plan.numbers.iter().collect();
        assert_eq!(unique.len(), plan.numbers.len());
        assert!(plan.numbers.iter().all(|n| (1..=250_000).contains(n)));
    }

    #[test]
    fn test_clamp_highest_number() {
        assert_eq!(clamp_highest_number(Some(420)), 420);
        assert_eq!(clamp_highest_number(Some(u64::MAX)), DEFAULT_HIGHEST_NUMBER);
        assert_eq!(clamp_highest_number(Some(0)), DEFAULT_HIGHEST_NUMBER);
        assert_eq!(clamp_highest_number(None), DEFAULT_HIGHEST_NUMBER);
    }
}
