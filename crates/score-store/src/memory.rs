use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use common::{ExamId, Score, StudentId};
use tokio::sync::RwLock;

use crate::{
    ExamRecord, Result, StoreConfig, StoreError, StudentRecord,
    store::{ScoreChange, ScoreStore},
};

type Shard<T> = Arc<RwLock<T>>;
type ShardMap<K, T> = Arc<RwLock<HashMap<K, Shard<T>>>>;

/// In-memory, dual-indexed score aggregates.
///
/// Every exam and every student lives in its own lock-protected shard, so
/// writes to different exams proceed in parallel and readers only hold one
/// shard long enough to copy it. A write holds the exam shard and then the
/// student shard while it mutates both, which keeps the two indices in step.
///
/// Shards are created just before their first write and stay invisible to
/// readers until they hold a score.
///
/// Cloning is cheap and yields a handle to the same data.
#[derive(Clone, Default)]
pub struct AggregateStore {
    exams: ShardMap<ExamId, ExamRecord>,
    students: ShardMap<StudentId, StudentRecord>,
    config: StoreConfig,
}

impl AggregateStore {
    /// Creates an empty store with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store with the given configuration.
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Returns the store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Records `score` for the pair, replacing any previous score.
    ///
    /// Both shard locks are acquired before anything is mutated, so a
    /// [`StoreError::LockTimeout`] leaves the aggregates untouched.
    pub async fn apply_score(
        &self,
        exam_id: &ExamId,
        student_id: &StudentId,
        score: Score,
    ) -> Result<ScoreChange> {
        let exam_shard = self
            .shard_for(&self.exams, "exam index", exam_id)
            .await?;
        let student_shard = self
            .shard_for(&self.students, "student index", student_id)
            .await?;

        // Lock order is always exam then student.
        let mut exam = self
            .bounded("exam", exam_id.as_str(), exam_shard.write())
            .await?;
        let mut student = self
            .bounded("student", student_id.as_str(), student_shard.write())
            .await?;

        let change = exam.upsert(student_id.clone(), score);
        student.set(exam_id.clone(), score);

        tracing::trace!(
            exam_id = %exam_id,
            student_id = %student_id,
            score = score.value(),
            average = exam.average(),
            "score applied"
        );

        Ok(change)
    }

    /// Returns a snapshot of the exam, or `None` if it was never seen.
    pub async fn get_exam(&self, exam_id: &ExamId) -> Option<ExamRecord> {
        let shard = self.exams.read().await.get(exam_id).cloned()?;
        let record = shard.read().await.clone();
        (!record.is_empty()).then_some(record)
    }

    /// Returns a snapshot of every exam.
    ///
    /// Each record is internally consistent; records are copied one shard at
    /// a time, so writes to other exams may land between copies.
    pub async fn get_all_exams(&self) -> BTreeMap<ExamId, ExamRecord> {
        let mut exams = BTreeMap::new();
        for (id, shard) in Self::shards(&self.exams).await {
            let record = shard.read().await.clone();
            if !record.is_empty() {
                exams.insert(id, record);
            }
        }
        exams
    }

    /// Returns a snapshot of the student's scores by exam, or `None` if the
    /// student was never seen.
    pub async fn get_exams_for_student(
        &self,
        student_id: &StudentId,
    ) -> Option<HashMap<ExamId, Score>> {
        self.get_student(student_id)
            .await
            .map(StudentRecord::into_exams)
    }

    /// Returns a snapshot of the student's record, or `None` if unknown.
    pub async fn get_student(&self, student_id: &StudentId) -> Option<StudentRecord> {
        let shard = self.students.read().await.get(student_id).cloned()?;
        let record = shard.read().await.clone();
        (!record.is_empty()).then_some(record)
    }

    /// Returns every known student ID.
    pub async fn get_all_students(&self) -> BTreeSet<StudentId> {
        let mut students = BTreeSet::new();
        for (id, shard) in Self::shards(&self.students).await {
            if !shard.read().await.is_empty() {
                students.insert(id);
            }
        }
        students
    }

    /// Returns the number of known exams.
    pub async fn exam_count(&self) -> usize {
        self.get_all_exams().await.len()
    }

    /// Returns the number of known students.
    pub async fn student_count(&self) -> usize {
        self.get_all_students().await.len()
    }

    /// Copies the shard handles out so the index lock is released before
    /// any shard is read.
    async fn shards<K: Clone, T>(map: &ShardMap<K, T>) -> Vec<(K, Shard<T>)> {
        map.read()
            .await
            .iter()
            .map(|(id, shard)| (id.clone(), Arc::clone(shard)))
            .collect()
    }

    /// Returns the shard for `key`, creating an empty one on first use.
    async fn shard_for<K, T>(
        &self,
        map: &ShardMap<K, T>,
        resource: &'static str,
        key: &K,
    ) -> Result<Shard<T>>
    where
        K: Clone + Eq + std::hash::Hash + AsRef<str>,
        T: Default,
    {
        if let Some(shard) = map.read().await.get(key) {
            return Ok(Arc::clone(shard));
        }

        let mut shards = self.bounded(resource, key.as_ref(), map.write()).await?;
        let shard = shards
            .entry(key.clone())
            .or_insert_with(|| Arc::new(RwLock::new(T::default())));
        Ok(Arc::clone(shard))
    }

    /// Awaits a lock acquisition, giving up after the configured timeout.
    async fn bounded<F: Future>(
        &self,
        resource: &'static str,
        key: &str,
        acquire: F,
    ) -> Result<F::Output> {
        let timeout = self.config.lock_timeout;
        tokio::time::timeout(timeout, acquire)
            .await
            .map_err(|_| StoreError::LockTimeout {
                resource,
                key: key.to_string(),
                timeout,
            })
    }
}

#[async_trait]
impl ScoreStore for AggregateStore {
    async fn apply_score(
        &self,
        exam_id: &ExamId,
        student_id: &StudentId,
        score: Score,
    ) -> Result<ScoreChange> {
        AggregateStore::apply_score(self, exam_id, student_id, score).await
    }
}
