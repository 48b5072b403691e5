//! Pure tier evaluation over a single resource sample.

use vaultbatch_core::{ResourceSample, Thresholds, Tier};

/// Maps a sample to its degradation tier.
///
/// Pure and deterministic: identical `(sample, thresholds)` always yields
/// the identical tier, independent of call history. Memory pressure takes
/// precedence over GPU pressure; absent GPU metrics never escalate.
pub fn evaluate_tier(sample: &ResourceSample, thresholds: &Thresholds) -> Tier {
    if sample.memory_percent >= thresholds.memory_survival {
        return Tier::Survival;
    }
    if sample.memory_percent >= thresholds.memory_minimal {
        return Tier::Minimal;
    }
    if sample.memory_percent >= thresholds.memory_reduced {
        return Tier::Reduced;
    }

    if let Some(gpu) = sample.gpu_pressure() {
        if gpu >= thresholds.gpu_minimal {
            return Tier::Minimal;
        }
        if gpu >= thresholds.gpu_reduced {
            return Tier::Reduced;
        }
    }

    Tier::Full
}

/// Whether memory pressure demands a host restart.
///
/// Holds on every qualifying sample, not just the first: restart pressure
/// keeps signalling until it resolves.
pub fn should_restart(sample: &ResourceSample, thresholds: &Thresholds) -> bool {
    sample.memory_percent >= thresholds.restart_memory
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample(memory: f64, gpu: Option<f64>, gpu_memory: Option<f64>) -> ResourceSample {
        ResourceSample {
            memory_percent: memory,
            memory_available: 2 * 1024 * 1024 * 1024,
            cpu_percent: 30.0,
            gpu_percent: gpu,
            gpu_memory_percent: gpu_memory,
            timestamp: Utc::now(),
        }
    }

    fn thresholds() -> Thresholds {
        Thresholds {
            memory_reduced: 60.0,
            memory_minimal: 75.0,
            memory_survival: 85.0,
            gpu_reduced: 70.0,
            gpu_minimal: 85.0,
            restart_memory: 90.0,
        }
    }

    #[test]
    fn test_memory_tier_boundaries() {
        let limits = thresholds();
        assert_eq!(evaluate_tier(&sample(40.0, None, None), &limits), Tier::Full);
        assert_eq!(
            evaluate_tier(&sample(60.0, None, None), &limits),
            Tier::Reduced
        );
        assert_eq!(
            evaluate_tier(&sample(80.0, None, None), &limits),
            Tier::Minimal
        );
        assert_eq!(
            evaluate_tier(&sample(85.0, None, None), &limits),
            Tier::Survival
        );
        assert_eq!(
            evaluate_tier(&sample(99.0, None, None), &limits),
            Tier::Survival
        );
    }

    #[test]
    fn test_gpu_escalates_when_memory_is_calm() {
        let limits = thresholds();
        assert_eq!(
            evaluate_tier(&sample(40.0, Some(72.0), None), &limits),
            Tier::Reduced
        );
        assert_eq!(
            evaluate_tier(&sample(40.0, None, Some(90.0)), &limits),
            Tier::Minimal
        );
        assert_eq!(
            evaluate_tier(&sample(40.0, Some(10.0), Some(20.0)), &limits),
            Tier::Full
        );
    }

    #[test]
    fn test_memory_takes_precedence_over_gpu() {
        // Memory says Survival, GPU says Reduced: memory wins.
        let limits = thresholds();
        assert_eq!(
            evaluate_tier(&sample(90.0, Some(72.0), None), &limits),
            Tier::Survival
        );
        // Memory says Reduced, GPU says Minimal: memory still decides first.
        assert_eq!(
            evaluate_tier(&sample(62.0, Some(90.0), None), &limits),
            Tier::Reduced
        );
    }

    #[test]
    fn test_missing_gpu_metrics_never_escalate() {
        let limits = thresholds();
        assert_eq!(evaluate_tier(&sample(10.0, None, None), &limits), Tier::Full);
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let limits = thresholds();
        let reading = sample(80.0, Some(95.0), Some(12.0));
        let first = evaluate_tier(&reading, &limits);
        for _ in 0..10 {
            assert_eq!(evaluate_tier(&reading, &limits), first);
        }
        assert_eq!(first, Tier::Minimal);
    }

    #[test]
    fn test_should_restart_holds_while_above_threshold() {
        let limits = thresholds();
        assert!(should_restart(&sample(92.0, None, None), &limits));
        assert!(should_restart(&sample(92.0, None, None), &limits));
        assert!(should_restart(&sample(90.0, None, None), &limits));
        assert!(!should_restart(&sample(89.9, None, None), &limits));
    }
}
