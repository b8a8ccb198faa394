//! Judging gateway — the external capability that turns a transcript
//! into a structured verdict.
//!
//! The orchestrator treats this as a black box: one bounded call per
//! judging attempt, no automatic retries. A failure or timeout lands the
//! session in `Failed`; recovery is always an explicit user retry.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::session::{JudgeVerdict, Speaker};

/// Error from a judging gateway invocation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum JudgeError {
    #[error("judging request failed: {0}")]
    RequestFailed(String),

    #[error("judging response unparseable: {0}")]
    ParseError(String),

    #[error("judging timed out after {0:?}")]
    Timeout(Duration),
}

/// One transcript entry as presented to the judge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptTurn {
    pub speaker: Speaker,
    pub response: String,
}

/// The material a verdict is produced from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    pub topic: String,
    pub rounds: u32,
    pub turns: Vec<TranscriptTurn>,
}

/// A capability that judges a finished debate.
#[async_trait]
pub trait JudgeGateway: Send + Sync {
    async fn judge(&self, transcript: &Transcript) -> Result<JudgeVerdict, JudgeError>;
}

/// HTTP-backed gateway: POSTs the transcript as JSON and expects a
/// `JudgeVerdict`-shaped JSON body back.
pub struct HttpJudgeGateway {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpJudgeGateway {
    /// `timeout` bounds the whole request; exceeding it surfaces as a
    /// request failure, which the orchestrator treats like any other
    /// gateway error.
    pub fn new(endpoint: String, timeout: Duration) -> Self {
        Self {
            endpoint,
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to create HTTP client"),
        }
    }
}

#[async_trait]
impl JudgeGateway for HttpJudgeGateway {
    async fn judge(&self, transcript: &Transcript) -> Result<JudgeVerdict, JudgeError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(transcript)
            .send()
            .await
            .map_err(|e| JudgeError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(JudgeError::RequestFailed(format!(
                "judge endpoint returned {}: {}",
                status, body
            )));
        }

        response
            .json::<JudgeVerdict>()
            .await
            .map_err(|e| JudgeError::ParseError(e.to_string()))
    }
}

/// Deterministic gateway double for tests: yields a scripted sequence of
/// results and counts invocations.
pub struct ScriptedJudge {
    script: Mutex<Vec<Result<JudgeVerdict, JudgeError>>>,
    fallback: Result<JudgeVerdict, JudgeError>,
    calls: AtomicU32,
}

impl ScriptedJudge {
    /// Always return the same result.
    pub fn always(result: Result<JudgeVerdict, JudgeError>) -> Self {
        Self {
            script: Mutex::new(Vec::new()),
            fallback: result,
            calls: AtomicU32::new(0),
        }
    }

    /// Return the scripted results in order, then `fallback` forever.
    pub fn sequence(
        script: Vec<Result<JudgeVerdict, JudgeError>>,
        fallback: Result<JudgeVerdict, JudgeError>,
    ) -> Self {
        Self {
            script: Mutex::new(script),
            fallback,
            calls: AtomicU32::new(0),
        }
    }

    /// How many times `judge` has been invoked.
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JudgeGateway for ScriptedJudge {
    async fn judge(&self, _transcript: &Transcript) -> Result<JudgeVerdict, JudgeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().expect("script lock");
        if script.is_empty() {
            self.fallback.clone()
        } else {
            script.remove(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{SideAssessment, Winner};

    fn verdict(winner: Winner) -> JudgeVerdict {
        JudgeVerdict {
            winner,
            debater_a: SideAssessment {
                score: 0.7,
                reasoning: "clear framing".to_string(),
            },
            debater_b: SideAssessment {
                score: 0.4,
                reasoning: "dropped rebuttals".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_scripted_always() {
        let judge = ScriptedJudge::always(Ok(verdict(Winner::A)));
        let transcript = Transcript {
            topic: "Should AI be regulated?".to_string(),
            rounds: 1,
            turns: vec![],
        };
        let v = judge.judge(&transcript).await.unwrap();
        assert_eq!(v.winner, Winner::A);
        assert_eq!(judge.call_count(), 1);
    }

    #[tokio::test]
    async fn test_scripted_sequence_then_fallback() {
        let judge = ScriptedJudge::sequence(
            vec![Err(JudgeError::RequestFailed("down".to_string()))],
            Ok(verdict(Winner::B)),
        );
        let transcript = Transcript {
            topic: "Should AI be regulated?".to_string(),
            rounds: 1,
            turns: vec![],
        };
        assert!(judge.judge(&transcript).await.is_err());
        assert_eq!(judge.judge(&transcript).await.unwrap().winner, Winner::B);
        assert_eq!(judge.call_count(), 2);
    }

    #[test]
    fn test_transcript_serializes() {
        let transcript = Transcript {
            topic: "Should AI be regulated?".to_string(),
            rounds: 1,
            turns: vec![TranscriptTurn {
                speaker: Speaker::A,
                response: "Opening statement".to_string(),
            }],
        };
        let json = serde_json::to_string(&transcript).unwrap();
        assert!(json.contains("\"topic\""));
        assert!(json.contains("\"turns\""));
    }
}
