use crate::config::{MatchPolicy, MatcherConfig};
use rand::Rng;
use storage::directory::StudentDirectory;
use storage::models::Student;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error, PartialEq)]
pub enum MatchError {
    #[error("no students registered")]
    NoStudentsRegistered,
    #[error("face not recognized")]
    NoMatchFound,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    pub student: Student,
    /// Distance to the chosen reference; `None` for a fallback pick.
    pub distance: Option<f32>,
    pub fallback: bool,
}

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[derive(Debug, Clone)]
pub struct FaceMatcher {
    threshold: f32,
    policy: MatchPolicy,
}

impl FaceMatcher {
    pub fn new(config: &MatcherConfig) -> Self {
        Self {
            threshold: config.threshold,
            policy: config.policy,
        }
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    pub fn match_descriptor(
        &self,
        query: &[f32],
        directory: &StudentDirectory,
    ) -> Result<MatchOutcome, MatchError> {
        self.match_with_rng(query, directory, &mut rand::thread_rng())
    }

    /// Nearest reference strictly under the threshold. References that are
    /// empty or of a different length than `query` are not comparable.
    pub fn match_with_rng<R: Rng>(
        &self,
        query: &[f32],
        directory: &StudentDirectory,
        rng: &mut R,
    ) -> Result<MatchOutcome, MatchError> {
        let students = directory.all();
        if students.is_empty() {
            return Err(MatchError::NoStudentsRegistered);
        }

        let mut best: Option<(&Student, f32)> = None;
        for student in students {
            let reference = &student.reference_descriptor;
            if reference.is_empty() {
                continue;
            }
            if reference.len() != query.len() {
                warn!(
                    student = %student.id,
                    "reference descriptor length {} != query length {}",
                    reference.len(),
                    query.len()
                );
                continue;
            }
            let distance = euclidean_distance(query, reference);
            if distance < self.threshold && best.map_or(true, |(_, d)| distance < d) {
                best = Some((student, distance));
            }
        }

        if let Some((student, distance)) = best {
            debug!(student = %student.id, distance, "face matched");
            return Ok(MatchOutcome {
                student: student.clone(),
                distance: Some(distance),
                fallback: false,
            });
        }

        match self.policy {
            MatchPolicy::Strict => Err(MatchError::NoMatchFound),
            MatchPolicy::Lenient => {
                let student = &students[rng.gen_range(0..students.len())];
                warn!(student = %student.id, "no face within threshold, using fallback student");
                Ok(MatchOutcome {
                    student: student.clone(),
                    distance: None,
                    fallback: true,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn student(id: &str, descriptor: Vec<f32>) -> Student {
        Student {
            id: id.to_string(),
            name: format!("Student {id}"),
            reference_descriptor: descriptor,
        }
    }

    fn matcher(policy: MatchPolicy) -> FaceMatcher {
        FaceMatcher::new(&MatcherConfig {
            threshold: 0.6,
            policy,
        })
    }

    #[test]
    fn exact_reference_wins_regardless_of_order() {
        let a = student("a", vec![0.0, 0.0]);
        let b = student("b", vec![5.0, 5.0]);
        for roster in [vec![a.clone(), b.clone()], vec![b.clone(), a.clone()]] {
            let dir = StudentDirectory::new(roster).unwrap();
            let out = matcher(MatchPolicy::Strict)
                .match_descriptor(&[5.0, 5.0], &dir)
                .unwrap();
            assert_eq!(out.student.id, "b");
            assert_eq!(out.distance, Some(0.0));
            assert!(!out.fallback);
        }
    }

    #[test]
    fn nearest_candidate_beats_first_candidate() {
        let dir = StudentDirectory::new(vec![
            student("far", vec![0.5, 0.0]),
            student("near", vec![0.1, 0.0]),
        ])
        .unwrap();
        let out = matcher(MatchPolicy::Strict)
            .match_descriptor(&[0.0, 0.0], &dir)
            .unwrap();
        assert_eq!(out.student.id, "near");
    }

    #[test]
    fn threshold_is_strict() {
        let dir = StudentDirectory::new(vec![student("edge", vec![3.0, 4.0])]).unwrap();
        let err = FaceMatcher::new(&MatcherConfig {
            threshold: 5.0,
            policy: MatchPolicy::Strict,
        })
        .match_descriptor(&[0.0, 0.0], &dir)
        .unwrap_err();
        assert_eq!(err, MatchError::NoMatchFound);
    }

    #[test]
    fn empty_directory_fails_under_both_policies() {
        let dir = StudentDirectory::default();
        for policy in [MatchPolicy::Strict, MatchPolicy::Lenient] {
            assert_eq!(
                matcher(policy).match_descriptor(&[0.0], &dir).unwrap_err(),
                MatchError::NoStudentsRegistered
            );
        }
    }

    #[test]
    fn lenient_falls_back_to_a_roster_student() {
        let dir = StudentDirectory::new(vec![
            student("a", vec![]),
            student("b", vec![9.0, 9.0]),
            student("c", vec![1.0]),
        ])
        .unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let out = matcher(MatchPolicy::Lenient)
                .match_with_rng(&[0.0, 0.0], &dir, &mut rng)
                .unwrap();
            assert!(out.fallback);
            assert!(out.distance.is_none());
            assert!(dir.find(&out.student.id).is_some());
        }
    }

    #[test]
    fn distance_is_euclidean() {
        assert!((euclidean_distance(&[0.0, 0.0], &[3.0, 4.0]) - 5.0).abs() < 1e-6);
    }
}
