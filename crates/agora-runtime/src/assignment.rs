//! Model assignment
//!
//! Runs before the first phase; the resulting records are immutable.

use agora_core::{ParticipantRecord, ParticipantSpec};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use std::collections::BTreeSet;

use crate::config::ModelAssignment;
use crate::error::RunError;

/// Give every participant a model. Preassigned models are kept; `available`
/// is the pool for random assignment.
pub fn assign_models(
    specs: Vec<ParticipantSpec>,
    assignment: &ModelAssignment,
    available: &[&str],
) -> Result<Vec<ParticipantRecord>, RunError> {
    match assignment {
        ModelAssignment::Fixed(model) => Ok(specs
            .into_iter()
            .map(|spec| {
                let model = spec.assigned_model.clone().unwrap_or_else(|| model.clone());
                spec.assign(&model)
            })
            .collect()),
        ModelAssignment::Random { seed } => {
            let mut rng = StdRng::seed_from_u64(*seed);
            let mut records = Vec::with_capacity(specs.len());
            for spec in specs {
                let model = match &spec.assigned_model {
                    Some(model) => model.clone(),
                    None => available
                        .choose(&mut rng)
                        .map(|m| m.to_string())
                        .ok_or_else(|| RunError::Config("no enabled models to assign".to_string()))?,
                };
                records.push(spec.assign(&model));
            }
            Ok(records)
        }
    }
}

/// The single model used in shared-context mode
pub fn shared_model(assignment: &ModelAssignment, available: &[&str]) -> Result<String, RunError> {
    match assignment {
        ModelAssignment::Fixed(model) => Ok(model.clone()),
        ModelAssignment::Random { seed } => {
            let mut rng = StdRng::seed_from_u64(*seed);
            available
                .choose(&mut rng)
                .map(|m| m.to_string())
                .ok_or_else(|| RunError::Config("no enabled models to assign".to_string()))
        }
    }
}

/// Distinct model keys in use, sorted
pub fn models_in_use<'a>(records: &'a [ParticipantRecord], extra: Option<&'a str>) -> Vec<&'a str> {
    let mut models: BTreeSet<&str> = records.iter().map(|r| r.assigned_model.as_str()).collect();
    models.extend(extra);
    models.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs(n: usize) -> Vec<ParticipantSpec> {
        (1..=n).map(|i| ParticipantSpec::new(&format!("resident_{:02}", i))).collect()
    }

    #[test]
    fn test_fixed_keeps_preassigned() {
        let mut input = specs(3);
        input[1] = input[1].clone().with_model("kimi-k2");
        let records = assign_models(input, &ModelAssignment::Fixed("mock".into()), &[]).unwrap();
        let models: Vec<&str> = records.iter().map(|r| r.assigned_model.as_str()).collect();
        assert_eq!(models, vec!["mock", "kimi-k2", "mock"]);
    }

    #[test]
    fn test_random_is_reproducible() {
        let pool = ["gemini-3-flash", "gpt-5-mini", "claude-haiku-4.5"];
        let a = assign_models(specs(12), &ModelAssignment::Random { seed: 42 }, &pool).unwrap();
        let b = assign_models(specs(12), &ModelAssignment::Random { seed: 42 }, &pool).unwrap();
        assert_eq!(a, b);
        assert!(a.iter().all(|r| pool.contains(&r.assigned_model.as_str())));
    }

    #[test]
    fn test_random_without_models_fails() {
        let err = assign_models(specs(1), &ModelAssignment::Random { seed: 1 }, &[]);
        assert!(matches!(err, Err(RunError::Config(_))));
        assert!(shared_model(&ModelAssignment::Random { seed: 1 }, &[]).is_err());
    }

    #[test]
    fn test_models_in_use() {
        let records = assign_models(specs(2), &ModelAssignment::Fixed("mock".into()), &[]).unwrap();
        assert_eq!(models_in_use(&records, Some("gemini-3-flash")), vec!["gemini-3-flash", "mock"]);
    }
}
