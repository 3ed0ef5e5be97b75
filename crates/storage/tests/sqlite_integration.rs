use exam_core::model::{
    Attempt, AttemptKey, AttemptStatus, CorrectAnswer, Question, QuestionId, SessionId,
    SessionStatus, TestSession, UserAnswer,
};
use exam_core::time::fixed_now;
use storage::repository::{
    AttemptRepository, QuestionRepository, SessionRepository, Storage, TestTransaction,
};
use storage::sqlite::SqliteRepository;

fn build_question(id: &str, topic: &str, correct: CorrectAnswer) -> Question {
    Question {
        id: QuestionId::new(id),
        subject: "physics".into(),
        topic: topic.into(),
        options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
        correct_answer: correct,
        marks: Some(2.0),
        tags: ["single-select".to_string()].into_iter().collect(),
    }
}

fn build_attempts(session_id: &SessionId, question_ids: &[&str]) -> Vec<Attempt> {
    question_ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            Attempt::new(
                session_id.clone(),
                QuestionId::new(*id),
                u32::try_from(i + 1).unwrap(),
            )
        })
        .collect()
}

#[tokio::test]
async fn storage_facade_wires_the_sqlite_backend() {
    let storage = Storage::sqlite("sqlite:file:memdb_facade?mode=memory&cache=shared")
        .await
        .expect("connect and migrate");

    let session = TestSession::new(SessionId::new("s1"), 60);
    storage.sessions.upsert_session(&session).await.unwrap();
    let loaded = storage.sessions.get_session(&session.id).await.unwrap();
    assert_eq!(loaded.remaining_time_seconds, 60);
    assert!(!loaded.is_synced);
}

#[tokio::test]
async fn initialize_test_session_is_atomic_and_complete() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_init?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let session = TestSession::new(SessionId::new("s1"), 1800);
    let questions = vec![
        build_question("q1", "optics", CorrectAnswer::Index(1)),
        build_question("q2", "optics", CorrectAnswer::Indices(vec![0, 2])),
        build_question("q3", "waves", CorrectAnswer::Numeric("42".into())),
    ];
    let attempts = build_attempts(&session.id, &["q1", "q2", "q3"]);

    repo.initialize_test_session(&session, &questions, &attempts)
        .await
        .expect("initialize");

    // Exactly one attempt per question, in canonical order.
    let stored = repo.attempts_for_session(&session.id).await.unwrap();
    assert_eq!(stored.len(), 3);
    assert_eq!(
        stored.iter().map(|a| a.attempt_order).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );

    let loaded = repo.get_session(&session.id).await.unwrap();
    assert_eq!(loaded.status, SessionStatus::Ready);
    assert_eq!(loaded.remaining_time_seconds, 1800);

    let fetched = repo
        .questions_by_ids(&[QuestionId::new("q3"), QuestionId::new("q1")])
        .await
        .unwrap();
    assert_eq!(fetched[0].id, QuestionId::new("q3"));
    assert_eq!(fetched[0].correct_answer, CorrectAnswer::Numeric("42".into()));
    assert_eq!(fetched[1].id, QuestionId::new("q1"));
}

#[tokio::test]
async fn failed_initialization_leaves_no_partial_state() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_init_fail?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let session = TestSession::new(SessionId::new("s1"), 600);
    let questions = vec![
        build_question("q1", "optics", CorrectAnswer::Index(0)),
        build_question("q2", "optics", CorrectAnswer::Index(1)),
    ];
    let mut attempts = build_attempts(&session.id, &["q1", "q2"]);
    // Zero violates the attempt_order check, after the session, the
    // questions, and the first attempt have already been written.
    attempts[1].attempt_order = 0;

    let err = repo
        .initialize_test_session(&session, &questions, &attempts)
        .await
        .unwrap_err();
    assert!(matches!(err, storage::StorageError::Connection(_)));

    assert!(matches!(
        repo.get_session(&session.id).await,
        Err(storage::StorageError::NotFound)
    ));
    assert!(matches!(
        repo.get_question(&QuestionId::new("q1")).await,
        Err(storage::StorageError::NotFound)
    ));
    assert!(repo.attempts_for_session(&session.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_completion_preserves_the_prior_state() {
    let repo =
        SqliteRepository::connect("sqlite:file:memdb_complete_fail?mode=memory&cache=shared")
            .await
            .expect("connect");
    repo.migrate().await.expect("migrate");

    let session = TestSession::new(SessionId::new("s1"), 600);
    let questions = vec![
        build_question("q1", "optics", CorrectAnswer::Index(0)),
        build_question("q2", "optics", CorrectAnswer::Index(1)),
    ];
    let attempts = build_attempts(&session.id, &["q1", "q2"]);
    repo.initialize_test_session(&session, &questions, &attempts)
        .await
        .unwrap();

    let mut completed = session.clone();
    completed.status = SessionStatus::Completed;
    completed.score = 2.0;
    completed.completed_at = Some(fixed_now());
    let mut graded = attempts.clone();
    graded[0].status = AttemptStatus::Correct;
    graded[0].score = 2.0;
    graded[1].attempt_order = 0;

    let err = repo
        .complete_test_session(&completed, &graded)
        .await
        .unwrap_err();
    assert!(matches!(err, storage::StorageError::Connection(_)));

    // The session write inside the failed transaction was rolled back too.
    let stored = repo.get_session(&session.id).await.unwrap();
    assert_eq!(stored.status, SessionStatus::Ready);
    assert_eq!(stored.score, 0.0);
    assert!(stored.completed_at.is_none());

    let stored = repo.attempts_for_session(&session.id).await.unwrap();
    assert_eq!(stored[0].status, AttemptStatus::Unvisited);
    assert_eq!(stored[0].score, 0.0);
}

#[tokio::test]
async fn attempt_upsert_is_idempotent_and_full_record() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_upsert?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let session = TestSession::new(SessionId::new("s1"), 600);
    let questions = vec![build_question("q1", "optics", CorrectAnswer::Index(0))];
    let attempts = build_attempts(&session.id, &["q1"]);
    repo.initialize_test_session(&session, &questions, &attempts)
        .await
        .unwrap();

    let mut attempt = attempts[0].clone();
    attempt.user_answer = Some(UserAnswer::Selection(vec![2]));
    attempt.status = AttemptStatus::Answered;
    attempt.time_spent_seconds = 14;
    repo.upsert_attempt(&attempt).await.unwrap();
    repo.upsert_attempt(&attempt).await.unwrap();

    let stored = repo.attempts_for_session(&session.id).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].user_answer, Some(UserAnswer::Selection(vec![2])));
    assert_eq!(stored[0].status, AttemptStatus::Answered);
    assert_eq!(stored[0].time_spent_seconds, 14);
    assert!(stored[0].is_correct.is_none());
}

#[tokio::test]
async fn dirty_scans_and_flag_clearing_target_exact_keys() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_dirty?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let session = TestSession::new(SessionId::new("s1"), 600);
    let questions = vec![
        build_question("q1", "optics", CorrectAnswer::Index(0)),
        build_question("q2", "optics", CorrectAnswer::Index(1)),
    ];
    let attempts = build_attempts(&session.id, &["q1", "q2"]);
    repo.initialize_test_session(&session, &questions, &attempts)
        .await
        .unwrap();

    let dirty = repo.unsynced_attempts(&session.id).await.unwrap();
    assert_eq!(dirty.len(), 2);

    let first_key = AttemptKey::new(session.id.clone(), QuestionId::new("q1"));
    repo.mark_attempts_synced(std::slice::from_ref(&first_key))
        .await
        .unwrap();

    let dirty = repo.unsynced_attempts(&session.id).await.unwrap();
    assert_eq!(dirty.len(), 1);
    assert_eq!(dirty[0].question_id, QuestionId::new("q2"));

    let sessions = repo.unsynced_sessions().await.unwrap();
    assert_eq!(sessions.len(), 1);
    repo.mark_session_synced(&session.id).await.unwrap();
    assert!(repo.unsynced_sessions().await.unwrap().is_empty());
}

#[tokio::test]
async fn completion_write_persists_results_and_keeps_completed_at() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_complete?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let mut session = TestSession::new(SessionId::new("s1"), 600);
    let questions = vec![build_question("q1", "optics", CorrectAnswer::Index(0))];
    let mut attempts = build_attempts(&session.id, &["q1"]);
    repo.initialize_test_session(&session, &questions, &attempts)
        .await
        .unwrap();

    session.status = SessionStatus::Completed;
    session.score = 2.0;
    session.accuracy = 1.0;
    session.correct_count = 1;
    session.attempted_count = 1;
    session.completed_at = Some(fixed_now());
    attempts[0].status = AttemptStatus::Correct;
    attempts[0].score = 2.0;
    attempts[0].is_correct = Some(true);

    repo.complete_test_session(&session, &attempts).await.unwrap();

    let loaded = repo.get_session(&session.id).await.unwrap();
    assert_eq!(loaded.status, SessionStatus::Completed);
    assert_eq!(loaded.completed_at, Some(fixed_now()));
    assert_eq!(loaded.score, 2.0);

    // Re-upserting with a later timestamp must not move completed_at.
    session.completed_at = Some(fixed_now() + chrono::Duration::minutes(3));
    repo.complete_test_session(&session, &attempts).await.unwrap();
    let loaded = repo.get_session(&session.id).await.unwrap();
    assert_eq!(loaded.completed_at, Some(fixed_now()));

    let stored = repo.attempts_for_session(&session.id).await.unwrap();
    assert_eq!(stored[0].is_correct, Some(true));
    assert_eq!(stored[0].score, 2.0);
}

#[tokio::test]
async fn topic_queries_filter_and_sort_by_id() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_topic?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    repo.upsert_questions(&[
        build_question("q2", "optics", CorrectAnswer::Index(0)),
        build_question("q1", "optics", CorrectAnswer::Index(1)),
        build_question("q3", "waves", CorrectAnswer::Index(2)),
    ])
    .await
    .unwrap();

    // Re-upserting the whole batch changes content in place, not row count.
    let mut updated = build_question("q1", "optics", CorrectAnswer::Index(1));
    updated.marks = Some(5.0);
    repo.upsert_questions(std::slice::from_ref(&updated)).await.unwrap();

    let optics = repo.questions_by_topic("optics").await.unwrap();
    assert_eq!(
        optics.iter().map(|q| q.id.as_str()).collect::<Vec<_>>(),
        vec!["q1", "q2"]
    );
    assert_eq!(optics[0].marks, Some(5.0));
    assert!(repo.questions_by_topic("mechanics").await.unwrap().is_empty());

    let single = repo.get_question(&QuestionId::new("q3")).await.unwrap();
    assert_eq!(single.topic, "waves");
    let missing = repo.get_question(&QuestionId::new("nope")).await;
    assert!(matches!(missing, Err(storage::StorageError::NotFound)));
}

#[tokio::test]
async fn timer_checkpoint_updates_only_remaining_time() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_timer?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let session = TestSession::new(SessionId::new("s1"), 600);
    repo.initialize_test_session(&session, &[], &[]).await.unwrap();

    repo.update_remaining_time(&session.id, 595).await.unwrap();
    let loaded = repo.get_session(&session.id).await.unwrap();
    assert_eq!(loaded.remaining_time_seconds, 595);
    assert_eq!(loaded.status, SessionStatus::Ready);

    let err = repo
        .update_remaining_time(&SessionId::new("missing"), 10)
        .await
        .unwrap_err();
    assert!(matches!(err, storage::StorageError::NotFound));
}
