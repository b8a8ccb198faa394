//! End-to-end debate lifecycle tests against the in-memory store and a
//! scripted judging gateway.
//!
//! Covers:
//! - create → invite → redeem → alternate 4 arguments → auto-judge → finished
//! - gateway failure lands in Failed with a marker and no winner; retry recovers
//! - wrong-speaker submissions are rejected without state change
//! - strict speaker alternation with turn 0 = A
//! - manual judgment path for autoJudge=false sessions
//! - snapshot round-trip fidelity

use std::sync::Arc;
use std::time::Duration;

use orchestration::judge::{JudgeError, ScriptedJudge};
use orchestration::orchestrator::{Orchestrator, OrchestratorSettings};
use orchestration::session::{
    JudgeRecord, JudgeVerdict, SessionSnapshot, SessionStatus, SideAssessment, Speaker, Winner,
};
use orchestration::store::MemoryStore;
use orchestration::token::TokenService;

const TOPIC: &str = "Should AI be regulated?";

fn verdict(winner: Winner) -> JudgeVerdict {
    JudgeVerdict {
        winner,
        debater_a: SideAssessment {
            score: 0.8,
            reasoning: "consistent framework across rounds".to_string(),
        },
        debater_b: SideAssessment {
            score: 0.5,
            reasoning: "strong opening, weak closing".to_string(),
        },
    }
}

fn orchestrator(gateway: ScriptedJudge) -> Arc<Orchestrator> {
    Orchestrator::new(
        MemoryStore::new().shared(),
        Arc::new(gateway),
        TokenService::new(
            "test-secret".to_string(),
            chrono::Duration::hours(24),
            chrono::Duration::hours(1),
        ),
        OrchestratorSettings {
            judge_timeout: Duration::from_secs(5),
            ..OrchestratorSettings::default()
        },
    )
    .shared()
}

/// Poll until the session reaches `status` or give up.
async fn wait_for_status(
    orch: &Arc<Orchestrator>,
    session_id: &str,
    status: SessionStatus,
) -> SessionSnapshot {
    for _ in 0..200 {
        let snapshot = orch.load_session_state(session_id).await.unwrap();
        if snapshot.session.status == status {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("session never reached {}", status);
}

/// Run a session from creation through both seats filled.
async fn seated_session(orch: &Arc<Orchestrator>, rounds: u32, auto_judge: bool) -> String {
    let snapshot = orch
        .create_session(
            TOPIC.to_string(),
            rounds,
            Some("user-a".to_string()),
            None,
            auto_judge,
        )
        .await
        .unwrap();
    assert_eq!(snapshot.session.status, SessionStatus::Created);

    let invitation = orch.issue_invitation(&snapshot.session.id).await.unwrap();
    let snapshot = orch
        .redeem_invitation(&snapshot.session.id, &invitation.token, "user-b")
        .await
        .unwrap();
    assert_eq!(snapshot.session.status, SessionStatus::Running);
    snapshot.session.id
}

const ARGUMENTS: [&str; 4] = [
    "Regulation is necessary because unchecked systems concentrate power.",
    "Regulation freezes progress before we understand what we are regulating.",
    "We regulated aviation and medicine without freezing either field.",
    "Those fields had decades of stable practice first; AI does not.",
];

#[tokio::test]
async fn test_full_auto_judged_session() {
    let orch = orchestrator(ScriptedJudge::always(Ok(verdict(Winner::A))));
    let session_id = seated_session(&orch, 2, true).await;

    for (i, argument) in ARGUMENTS.iter().enumerate() {
        let user = if i % 2 == 0 { "user-a" } else { "user-b" };
        let snapshot = orch
            .submit_argument(&session_id, user, argument.to_string())
            .await
            .unwrap();
        assert_eq!(snapshot.turns.len(), i + 1);
    }

    let snapshot = wait_for_status(&orch, &session_id, SessionStatus::Finished).await;
    assert_eq!(snapshot.session.winner, Some(Winner::A));
    assert!(matches!(
        snapshot.session.judge_result,
        Some(JudgeRecord::Gateway(_))
    ));
    assert_eq!(snapshot.turns.len(), 4);
}

#[tokio::test]
async fn test_turn_zero_is_a_and_alternation_is_strict() {
    let orch = orchestrator(ScriptedJudge::always(Ok(verdict(Winner::Tie))));
    let session_id = seated_session(&orch, 2, false).await;

    for (i, argument) in ARGUMENTS.iter().enumerate() {
        let user = if i % 2 == 0 { "user-a" } else { "user-b" };
        orch.submit_argument(&session_id, user, argument.to_string())
            .await
            .unwrap();
    }

    let snapshot = orch.load_session_state(&session_id).await.unwrap();
    assert_eq!(snapshot.turns[0].speaker, Speaker::A);
    for pair in snapshot.turns.windows(2) {
        assert_ne!(pair[0].speaker, pair[1].speaker);
        assert_eq!(pair[1].order_index, pair[0].order_index + 1);
    }
}

#[tokio::test]
async fn test_wrong_speaker_rejected_without_state_change() {
    let orch = orchestrator(ScriptedJudge::always(Ok(verdict(Winner::A))));
    let session_id = seated_session(&orch, 2, true).await;

    // Turn 0 belongs to A; B is rejected.
    let err = orch
        .submit_argument(&session_id, "user-b", ARGUMENTS[1].to_string())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "WRONG_SPEAKER");

    let snapshot = orch.load_session_state(&session_id).await.unwrap();
    assert!(snapshot.turns.is_empty());
    assert_eq!(snapshot.session.status, SessionStatus::Running);
}

#[tokio::test]
async fn test_argument_length_bounds() {
    let orch = orchestrator(ScriptedJudge::always(Ok(verdict(Winner::A))));
    let session_id = seated_session(&orch, 1, true).await;

    let err = orch
        .submit_argument(&session_id, "user-a", "too short".to_string())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION");

    let err = orch
        .submit_argument(&session_id, "user-a", "x".repeat(2001))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION");

    let snapshot = orch.load_session_state(&session_id).await.unwrap();
    assert!(snapshot.turns.is_empty());
}

#[tokio::test]
async fn test_gateway_timeout_lands_in_failed_then_retry_recovers() {
    let orch = orchestrator(ScriptedJudge::sequence(
        vec![Err(JudgeError::RequestFailed(
            "gateway unreachable".to_string(),
        ))],
        Ok(verdict(Winner::A)),
    ));
    let session_id = seated_session(&orch, 1, true).await;

    orch.submit_argument(&session_id, "user-a", ARGUMENTS[0].to_string())
        .await
        .unwrap();
    orch.submit_argument(&session_id, "user-b", ARGUMENTS[1].to_string())
        .await
        .unwrap();

    let snapshot = wait_for_status(&orch, &session_id, SessionStatus::Failed).await;
    assert_eq!(snapshot.session.winner, None);
    assert!(matches!(
        snapshot.session.judge_result,
        Some(JudgeRecord::Failure { .. })
    ));

    orch.retry_judging(&session_id).await.unwrap();
    let snapshot = wait_for_status(&orch, &session_id, SessionStatus::Finished).await;
    assert_eq!(snapshot.session.winner, Some(Winner::A));
    assert!(matches!(
        snapshot.session.judge_result,
        Some(JudgeRecord::Gateway(_))
    ));
}

#[tokio::test]
async fn test_manual_judgment_when_auto_judge_off() {
    let orch = orchestrator(ScriptedJudge::always(Ok(verdict(Winner::A))));
    let session_id = seated_session(&orch, 1, false).await;

    orch.submit_argument(&session_id, "user-a", ARGUMENTS[0].to_string())
        .await
        .unwrap();
    let snapshot = orch
        .submit_argument(&session_id, "user-b", ARGUMENTS[1].to_string())
        .await
        .unwrap();
    // No gateway involved: the session waits in Judging.
    assert_eq!(snapshot.session.status, SessionStatus::Judging);

    let snapshot = orch.user_judge(&session_id, Winner::B).await.unwrap();
    assert_eq!(snapshot.session.status, SessionStatus::Finished);
    assert_eq!(snapshot.session.winner, Some(Winner::B));
    assert_eq!(
        snapshot.session.judge_result,
        Some(JudgeRecord::Manual { winner: Winner::B })
    );
}

#[tokio::test]
async fn test_submission_after_judging_rejected_with_actual_status() {
    let orch = orchestrator(ScriptedJudge::always(Ok(verdict(Winner::A))));
    let session_id = seated_session(&orch, 1, false).await;

    orch.submit_argument(&session_id, "user-a", ARGUMENTS[0].to_string())
        .await
        .unwrap();
    orch.submit_argument(&session_id, "user-b", ARGUMENTS[1].to_string())
        .await
        .unwrap();

    let err = orch
        .submit_argument(&session_id, "user-a", ARGUMENTS[2].to_string())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "STATE_CONFLICT");
    assert!(err.to_string().contains("judging"));
}

#[tokio::test]
async fn test_retry_of_non_failed_session_reports_true_status() {
    let orch = orchestrator(ScriptedJudge::always(Ok(verdict(Winner::A))));
    let session_id = seated_session(&orch, 2, true).await;

    let err = orch.retry_judging(&session_id).await.unwrap_err();
    assert_eq!(err.code(), "STATE_CONFLICT");
    assert!(err.to_string().contains("running"));
}

#[tokio::test]
async fn test_redemption_failure_reasons_are_distinct() {
    let orch = orchestrator(ScriptedJudge::always(Ok(verdict(Winner::A))));
    let snapshot = orch
        .create_session(
            TOPIC.to_string(),
            2,
            Some("user-a".to_string()),
            None,
            true,
        )
        .await
        .unwrap();
    let invitation = orch.issue_invitation(&snapshot.session.id).await.unwrap();

    // A consumed token reports "used", not "not found".
    orch.redeem_invitation(&snapshot.session.id, &invitation.token, "user-b")
        .await
        .unwrap();
    let err = orch
        .redeem_invitation(&snapshot.session.id, &invitation.token, "user-c")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "TOKEN_USED");

    // An unknown token reports "not found".
    let err = orch
        .redeem_invitation(&snapshot.session.id, "no-such-token", "user-c")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "TOKEN_NOT_FOUND");
}

#[tokio::test]
async fn test_reissuing_invitations_keeps_older_tokens_valid() {
    let orch = orchestrator(ScriptedJudge::always(Ok(verdict(Winner::A))));
    let snapshot = orch
        .create_session(
            TOPIC.to_string(),
            2,
            Some("user-a".to_string()),
            None,
            true,
        )
        .await
        .unwrap();

    let first = orch.issue_invitation(&snapshot.session.id).await.unwrap();
    let _second = orch.issue_invitation(&snapshot.session.id).await.unwrap();

    // The earlier token still redeems.
    let snapshot = orch
        .redeem_invitation(&snapshot.session.id, &first.token, "user-b")
        .await
        .unwrap();
    assert_eq!(snapshot.session.status, SessionStatus::Running);
}

#[tokio::test]
async fn test_snapshot_roundtrip_through_wire_format() {
    let orch = orchestrator(ScriptedJudge::always(Ok(verdict(Winner::A))));
    let session_id = seated_session(&orch, 1, true).await;
    orch.submit_argument(&session_id, "user-a", ARGUMENTS[0].to_string())
        .await
        .unwrap();
    orch.submit_argument(&session_id, "user-b", ARGUMENTS[1].to_string())
        .await
        .unwrap();
    let snapshot = wait_for_status(&orch, &session_id, SessionStatus::Finished).await;

    let json = serde_json::to_string(&snapshot).unwrap();
    let rehydrated: SessionSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(rehydrated, snapshot);
    assert_eq!(rehydrated.session.winner, Some(Winner::A));
    assert_eq!(rehydrated.turns.len(), snapshot.turns.len());
}
