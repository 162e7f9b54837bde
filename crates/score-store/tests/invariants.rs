//! Integration tests: arbitrary write sequences keep both indices consistent.

use std::collections::HashMap;

use common::{ExamId, Score, StudentId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use score_store::AggregateStore;

async fn assert_consistent(store: &AggregateStore) {
    let exams = store.get_all_exams().await;
    let students = store.get_all_students().await;

    for (exam_id, record) in &exams {
        assert_eq!(record.count() as usize, record.scores().len());

        let expected = if record.scores().is_empty() {
            0.0
        } else {
            record.scores().values().map(Score::value).sum::<f64>() / record.scores().len() as f64
        };
        assert!(
            (record.average() - expected).abs() < 1e-9,
            "average drifted for {exam_id}: {} vs {expected}",
            record.average()
        );

        for (student_id, score) in record.scores() {
            let by_student = store.get_exams_for_student(student_id).await.unwrap();
            assert_eq!(by_student.get(exam_id), Some(score));
        }
    }

    for student_id in &students {
        let by_student = store.get_exams_for_student(student_id).await.unwrap();
        for (exam_id, score) in &by_student {
            assert_eq!(exams[exam_id].score_for(student_id), Some(*score));
        }
    }
}

#[tokio::test]
async fn test_random_sequences_preserve_invariants() {
    for seed in 1..=20u64 {
        let store = AggregateStore::new();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut model: HashMap<(String, String), f64> = HashMap::new();

        for _ in 0..200 {
            let exam = format!("exam-{}", rng.random_range(0..5));
            let student = format!("student-{}", rng.random_range(0..12));
            let value = rng.random_range(0..=100u32) as f64 / 100.0;

            store
                .apply_score(
                    &ExamId::new(exam.clone()).unwrap(),
                    &StudentId::new(student.clone()).unwrap(),
                    Score::new(value).unwrap(),
                )
                .await
                .unwrap();
            model.insert((exam, student), value);

            assert_consistent(&store).await;
        }

        for ((exam, student), value) in &model {
            let record = store
                .get_exam(&ExamId::new(exam.as_str()).unwrap())
                .await
                .unwrap();
            let current = record
                .score_for(&StudentId::new(student.as_str()).unwrap())
                .unwrap();
            assert_eq!(current.value(), *value);
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_on_different_exams() {
    let store = AggregateStore::new();

    let mut handles = Vec::new();
    for e in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let exam_id = ExamId::new(format!("exam-{e}")).unwrap();
            for s in 0..50 {
                let student_id = StudentId::new(format!("student-{s}")).unwrap();
                let score = Score::new(((e * 50 + s) % 100) as f64 / 100.0).unwrap();
                store.apply_score(&exam_id, &student_id, score).await.unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(store.exam_count().await, 8);
    assert_eq!(store.student_count().await, 50);
    for exam in store.get_all_exams().await.values() {
        assert_eq!(exam.count(), 50);
    }
    assert_consistent(&store).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_see_whole_updates_only() {
    let store = AggregateStore::new();
    let exam_id = ExamId::new("exam").unwrap();
    let student_id = StudentId::new("student").unwrap();
    store
        .apply_score(&exam_id, &student_id, Score::MIN)
        .await
        .unwrap();

    let writer = {
        let store = store.clone();
        let exam_id = exam_id.clone();
        let student_id = student_id.clone();
        tokio::spawn(async move {
            for i in 0..500 {
                let value = if i % 2 == 0 { Score::MAX } else { Score::MIN };
                store.apply_score(&exam_id, &student_id, value).await.unwrap();
            }
        })
    };

    for _ in 0..500 {
        let record = store.get_exam(&exam_id).await.unwrap();
        assert_eq!(record.count(), 1);
        let only = record.score_for(&student_id).unwrap().value();
        assert!((record.sum() - only).abs() < 1e-9);
        assert!((record.average() - only).abs() < 1e-9);
        tokio::task::yield_now().await;
    }

    writer.await.unwrap();
}
