//! Retraining trigger for the downstream classifier.
//!
//! A level-triggered loop: every `interval` it looks at the model artifact
//! and the dataset metadata and decides again, from scratch, whether the
//! classifier should be retrained.
//!
//! | Model artifact | Condition | State |
//! |----------------|-----------|-------|
//! | missing | dataset below `size_threshold_mb` | [`TriggerState::WaitingForData`] |
//! | missing | dataset at or above the threshold | [`TriggerState::Retraining`] |
//! | present | last update older than `max_staleness` | [`TriggerState::Retraining`] |
//! | present | otherwise | [`TriggerState::ModelCurrent`] |
//!
//! The trainer runs inline; the loop waits for it to finish. A trainer or
//! metadata failure is logged and the decision is made again next interval.

use async_trait::async_trait;
use chrono::{Duration, Local, NaiveDateTime};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration as StdDuration;
use tokio::process::Command;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument};

use crate::dataset::MetadataTracker;
use crate::errors::{MetadataError, TickError, TrainerError};
use crate::models::DatasetMetadata;

/// Outcome of one trigger evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    /// No model yet and not enough data to train one.
    WaitingForData,
    /// A model exists and the dataset has been updated recently.
    ModelCurrent,
    /// Training is due.
    Retraining,
}

impl fmt::Display for TriggerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TriggerState::WaitingForData => "WAITING_FOR_DATA",
            TriggerState::ModelCurrent => "MODEL_CURRENT",
            TriggerState::Retraining => "RETRAINING",
        })
    }
}

/// Thresholds of the retraining decision.
#[derive(Debug, Clone)]
pub struct RetrainPolicy {
    pub size_threshold_mb: f64,
    pub max_staleness: Duration,
}

impl Default for RetrainPolicy {
    fn default() -> Self {
        Self {
            size_threshold_mb: 10.0,
            max_staleness: Duration::days(30),
        }
    }
}

impl RetrainPolicy {
    /// Decide what the trigger should do. Pure; the same inputs always give
    /// the same state.
    ///
    /// An empty `dataset_last_update` with a model present counts as current:
    /// nothing was ingested since the model was built.
    pub fn evaluate(
        &self,
        model_exists: bool,
        metadata: &DatasetMetadata,
        now: NaiveDateTime,
    ) -> Result<TriggerState, MetadataError> {
        if !model_exists {
            let size_mb = metadata.size_mb()?;
            if size_mb < self.size_threshold_mb {
                debug!(
                    size_mb,
                    threshold_mb = self.size_threshold_mb,
                    "Dataset too small; waiting for more data"
                );
                return Ok(TriggerState::WaitingForData);
            }
            return Ok(TriggerState::Retraining);
        }

        match metadata.last_update()? {
            Some(last_update) if now - last_update > self.max_staleness => {
                debug!(%last_update, "Dataset last updated too long ago; retraining");
                Ok(TriggerState::Retraining)
            }
            _ => Ok(TriggerState::ModelCurrent),
        }
    }
}

/// Files produced by a successful training run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainedArtifacts {
    pub model: PathBuf,
    pub category_mapping: PathBuf,
}

/// The external training collaborator.
#[async_trait]
pub trait Trainer: Send + Sync {
    async fn train(&self) -> Result<TrainedArtifacts, TrainerError>;
}

/// [`Trainer`] that runs an external program and waits for it.
///
/// The program is expected to write the model to `artifacts.model`; a zero
/// exit status without that file is treated as a failure.
#[derive(Debug, Clone)]
pub struct CommandTrainer {
    program: String,
    args: Vec<String>,
    artifacts: TrainedArtifacts,
}

impl CommandTrainer {
    pub fn new(program: impl Into<String>, args: Vec<String>, artifacts: TrainedArtifacts) -> Self {
        Self {
            program: program.into(),
            args,
            artifacts,
        }
    }
}

#[async_trait]
impl Trainer for CommandTrainer {
    #[instrument(level = "info", skip(self), fields(program = %self.program))]
    async fn train(&self) -> Result<TrainedArtifacts, TrainerError> {
        info!(args = ?self.args, "Starting model training");
        let status = Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|source| TrainerError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if !status.success() {
            return Err(TrainerError::Failed {
                program: self.program.clone(),
                status: status.to_string(),
            });
        }
        if !self.artifacts.model.exists() {
            return Err(TrainerError::MissingArtifact(self.artifacts.model.clone()));
        }
        info!(model = %self.artifacts.model.display(), "Model trained");
        Ok(self.artifacts.clone())
    }
}

pub struct RetrainTrigger<T> {
    metadata: MetadataTracker,
    model_path: PathBuf,
    policy: RetrainPolicy,
    interval: StdDuration,
    trainer: T,
}

impl<T: Trainer> RetrainTrigger<T> {
    pub fn new(
        metadata: MetadataTracker,
        model_path: impl Into<PathBuf>,
        policy: RetrainPolicy,
        interval: StdDuration,
        trainer: T,
    ) -> Self {
        Self {
            metadata,
            model_path: model_path.into(),
            policy,
            interval,
            trainer,
        }
    }

    /// Evaluate once and train if due. Returns the state that was decided.
    #[instrument(level = "info", skip_all)]
    pub async fn tick(&self) -> Result<TriggerState, TickError> {
        let model_exists = self.model_path.exists();
        let metadata = self.metadata.read()?;
        let state = self
            .policy
            .evaluate(model_exists, &metadata, Local::now().naive_local())?;
        info!(%state, model_exists, dataset_size = %metadata.dataset_size, "Trigger evaluated");

        if state == TriggerState::Retraining {
            let artifacts = self.trainer.train().await?;
            info!(
                model = %artifacts.model.display(),
                category_mapping = %artifacts.category_mapping.display(),
                "Retraining finished"
            );
        }
        Ok(state)
    }

    /// Evaluate every `interval`, forever.
    pub async fn run(&self) {
        info!(
            interval_secs = self.interval.as_secs(),
            model = %self.model_path.display(),
            "Retrain trigger started"
        );
        loop {
            match self.tick().await {
                Ok(_) => {}
                Err(TickError::Metadata(e)) => {
                    error!(
                        path = %self.metadata.path().display(),
                        error = %e,
                        "Dataset metadata is unreadable; skipping this evaluation"
                    );
                }
                Err(TickError::Trainer(e)) => {
                    error!(error = %e, "Model training failed; will re-evaluate next interval");
                }
            }
            sleep(self.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 16)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn meta(size: &str, last_update: &str) -> DatasetMetadata {
        DatasetMetadata {
            dataset_size: size.to_string(),
            dataset_last_update: last_update.to_string(),
        }
    }

    fn days_ago(days: i64) -> String {
        (now() - Duration::days(days))
            .format(crate::utils::TIMESTAMP_FORMAT)
            .to_string()
    }

    #[test]
    fn test_size_threshold_without_model() {
        let policy = RetrainPolicy::default();
        assert_eq!(
            policy.evaluate(false, &meta("8.00 МБ", ""), now()).unwrap(),
            TriggerState::WaitingForData
        );
        assert_eq!(
            policy.evaluate(false, &meta("11.00 МБ", ""), now()).unwrap(),
            TriggerState::Retraining
        );
        assert_eq!(
            policy.evaluate(false, &meta("1.20 ГБ", ""), now()).unwrap(),
            TriggerState::Retraining
        );
        assert_eq!(
            policy.evaluate(false, &meta("", ""), now()).unwrap(),
            TriggerState::WaitingForData
        );
    }

    #[test]
    fn test_staleness_with_model() {
        let policy = RetrainPolicy::default();
        assert_eq!(
            policy.evaluate(true, &meta("50.00 МБ", &days_ago(31)), now()).unwrap(),
            TriggerState::Retraining
        );
        assert_eq!(
            policy.evaluate(true, &meta("50.00 МБ", &days_ago(29)), now()).unwrap(),
            TriggerState::ModelCurrent
        );
        assert_eq!(
            policy.evaluate(true, &meta("", ""), now()).unwrap(),
            TriggerState::ModelCurrent
        );
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let policy = RetrainPolicy::default();
        let m = meta("11.00 МБ", &days_ago(1));
        let first = policy.evaluate(false, &m, now()).unwrap();
        let second = policy.evaluate(false, &m, now()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_malformed_metadata_is_reported() {
        let policy = RetrainPolicy::default();
        assert!(matches!(
            policy.evaluate(false, &meta("many", ""), now()),
            Err(MetadataError::MalformedSize(_))
        ));
        assert!(matches!(
            policy.evaluate(true, &meta("", "last tuesday"), now()),
            Err(MetadataError::MalformedTimestamp(_))
        ));
    }

    struct CountingTrainer {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Trainer for CountingTrainer {
        async fn train(&self) -> Result<TrainedArtifacts, TrainerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(TrainerError::MissingArtifact(PathBuf::from("model.joblib")));
            }
            Ok(TrainedArtifacts {
                model: PathBuf::from("model.joblib"),
                category_mapping: PathBuf::from("category_mapping.json"),
            })
        }
    }

    fn trigger(dir: &Path, size: &str, fail: bool) -> RetrainTrigger<CountingTrainer> {
        let metadata = MetadataTracker::new(dir.join("info.json"));
        metadata.initialize().unwrap();
        metadata.update(&[("dataset_size", size)]).unwrap();
        RetrainTrigger::new(
            metadata,
            dir.join("model").join("model.joblib"),
            RetrainPolicy::default(),
            StdDuration::from_secs(6000),
            CountingTrainer {
                calls: AtomicUsize::new(0),
                fail,
            },
        )
    }

    #[tokio::test]
    async fn test_tick_trains_only_when_due() {
        let tmp = tempfile::tempdir().unwrap();
        let small = trigger(tmp.path(), "8.00 МБ", false);
        assert_eq!(small.tick().await.unwrap(), TriggerState::WaitingForData);
        assert_eq!(small.trainer.calls.load(Ordering::SeqCst), 0);

        let large = trigger(tmp.path(), "11.00 МБ", false);
        assert_eq!(large.tick().await.unwrap(), TriggerState::Retraining);
        assert_eq!(large.trainer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_tick_with_existing_model() {
        let tmp = tempfile::tempdir().unwrap();
        let t = trigger(tmp.path(), "11.00 МБ", false);
        fs::create_dir_all(t.model_path.parent().unwrap()).unwrap();
        fs::write(&t.model_path, b"model").unwrap();
        let stamp = Local::now()
            .naive_local()
            .format(crate::utils::TIMESTAMP_FORMAT)
            .to_string();
        t.metadata.update(&[("dataset_last_update", &stamp)]).unwrap();

        assert_eq!(t.tick().await.unwrap(), TriggerState::ModelCurrent);
        assert_eq!(t.trainer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_trainer_failure_is_returned() {
        let tmp = tempfile::tempdir().unwrap();
        let t = trigger(tmp.path(), "11.00 МБ", true);
        assert!(matches!(t.tick().await, Err(TickError::Trainer(_))));
        // Level-triggered: the same metadata asks for training again.
        assert!(t.tick().await.is_err());
        assert_eq!(t.trainer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_command_trainer_missing_program() {
        let tmp = tempfile::tempdir().unwrap();
        let trainer = CommandTrainer::new(
            "definitely-not-a-real-trainer-binary",
            vec![],
            TrainedArtifacts {
                model: tmp.path().join("model.joblib"),
                category_mapping: tmp.path().join("category_mapping.json"),
            },
        );
        assert!(matches!(trainer.train().await, Err(TrainerError::Spawn { .. })));
    }
}
