use chrono::{NaiveTime, Utc};
use pretty_assertions::assert_eq;
use rfai_lib::sensing::{SignalName, SignalSample};
use rfai_lib::settings::Settings;
use rfai_lib::{AppState, BlockType, ExceptionTag, FocusState, QuizResult, SessionStatus};

fn nine_am() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap()
}

#[tokio::test]
async fn bootstrap_creates_storage_and_ticks() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("rfai");
    let state = AppState::bootstrap(&data_dir, false).await.unwrap();

    assert!(data_dir.join("rfai.sqlite3").exists());
    assert_eq!(state.settings.get().schedule.len(), 3);

    let now = Utc::now();
    state
        .board
        .publish(SignalSample::measured(SignalName::Pose, 0.95, now))
        .await;
    let snapshot = state.monitor.tick_at(now, nine_am(), None).await.unwrap();

    assert_eq!(snapshot.reading.state, FocusState::Focused);
    assert_eq!(snapshot.trend, 0.0);
    assert_eq!(state.monitor.current_focus().await, Some(snapshot.reading));
    assert!(state
        .monitor
        .current_block(now, Some("Self Help"))
        .is_some_and(|block| block.block_type == BlockType::SelfHelp));
}

#[tokio::test]
async fn unfinished_sessions_are_abandoned_on_restart() {
    let dir = tempfile::tempdir().unwrap();

    let session_id = {
        let state = AppState::bootstrap(dir.path(), false).await.unwrap();
        let session = state
            .monitor
            .start_session(BlockType::Artistic, "Artistic Movies", 3_600_000, 0.5)
            .await
            .unwrap();
        assert!(state.monitor.set_exception(ExceptionTag::Presenting).await);
        state.monitor.tick(Utc::now(), None).await.unwrap();

        // Dropped without shutdown, as after a crash.
        let stored = state
            .db
            .get_learning_session(&session.session_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, SessionStatus::Active);
        assert_eq!(stored.reading_count, 1);
        session.session_id
    };

    let restarted = AppState::bootstrap(dir.path(), false).await.unwrap();
    let stored = restarted
        .db
        .get_learning_session(&session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, SessionStatus::Abandoned);
    assert!(stored.ended_at.is_some());
    assert!(restarted
        .monitor
        .session_status(BlockType::Artistic)
        .await
        .is_none());
}

#[tokio::test]
async fn shutdown_closes_open_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let mut state = AppState::bootstrap(dir.path(), false).await.unwrap();

    let session = state
        .monitor
        .start_session(BlockType::Science, "Science Learning", 60_000, 0.5)
        .await
        .unwrap();
    state.shutdown().await.unwrap();

    let stored = state
        .db
        .get_learning_session(&session.session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, SessionStatus::Abandoned);
    assert!(state.db.list_active_learning_sessions().await.unwrap().is_empty());
}

#[tokio::test]
async fn quiz_results_feed_the_weekly_state() {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::bootstrap(dir.path(), false).await.unwrap();
    let now = Utc::now();

    for correct in [8, 9, 10] {
        let result = QuizResult::new(
            format!("quiz-{correct}"),
            Some(BlockType::Science),
            now - chrono::Duration::hours(1),
            10,
            correct,
        );
        state.db.insert_quiz_result(&result).await.unwrap();
    }

    let adjustment = state.pace.run_if_due(now, None).await.unwrap().unwrap();
    assert_eq!(adjustment.state.quiz_score, 4);
    assert_eq!(adjustment.reward, None);
    assert!(state.pace.run_if_due(now, None).await.unwrap().is_none());
}

#[tokio::test]
async fn invalid_settings_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("settings.json"),
        r#"{
            "autoStartSessions": true,
            "weights": { "gaze": -0.2 },
            "schedule": [{
                "name": "Morning Physics",
                "blockType": "science",
                "start": "09:00",
                "end": "10:00",
                "goalMinutes": 30,
                "attentionThreshold": 70
            }]
        }"#,
    )
    .unwrap();

    let state = AppState::bootstrap(dir.path(), false).await.unwrap();
    assert_eq!(state.settings.get(), Settings::default());

    let snapshot = state
        .monitor
        .tick_at(Utc::now(), nine_am(), None)
        .await
        .unwrap();
    assert_eq!(snapshot.reading.composite_score, 50.0);
    assert!(state
        .monitor
        .session_status(BlockType::Science)
        .await
        .is_none());
}
