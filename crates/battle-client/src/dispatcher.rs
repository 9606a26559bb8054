use std::time::Duration;

use battle_core::model::Verdict;
use battle_core::protocol::{RunRequest, RunResponse, SubmitRequest, SubmitResponse};
use tracing::{debug, warn};

use crate::error::ClientError;
use crate::store::MatchStore;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Issues run/submit requests against the execution service.
///
/// `run` results are ephemeral editor feedback and never touch the store.
/// `submit` optimistically marks the active problem `Pending` and resolves
/// it from the service's synchronous verdict; any failure or timeout
/// resolves it back to the pre-submission value so nothing is left stuck.
/// Either way the resolution is a no-op if an authoritative verdict landed
/// while the request was in flight.
pub struct SubmissionDispatcher {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl SubmissionDispatcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Bound the wait on the execution service (resolves the stuck-PENDING
    /// ambiguity: a silent service turns into a revert plus an error).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the code against sample input for the active problem. Validation
    /// failures are rejected before any network call.
    pub async fn run(
        &self,
        store: &MatchStore,
        code: &str,
        language: &str,
        input: &str,
    ) -> Result<RunResponse, ClientError> {
        let state = store.state().ok_or(ClientError::NoMatch)?;
        if language.trim().is_empty() {
            return Err(ClientError::NoLanguage);
        }
        let problem = state.active().ok_or(ClientError::NoActiveProblem)?;

        let request = RunRequest {
            match_id: state.match_id.clone(),
            problem_id: problem.id.clone(),
            code: code.to_string(),
            language: language.to_string(),
            input: input.to_string(),
        };

        let url = format!("{}/run", self.base_url);
        let response = tokio::time::timeout(self.timeout, async {
            let resp = self.http.post(&url).json(&request).send().await?;
            let resp = resp.error_for_status()?;
            Ok::<RunResponse, ClientError>(resp.json::<RunResponse>().await?)
        })
        .await
        .map_err(|_| ClientError::Timeout)??;

        Ok(response)
    }

    /// Submit the code for full scoring against the active problem.
    pub async fn submit(
        &self,
        store: &mut MatchStore,
        code: &str,
        language: &str,
    ) -> Result<SubmitResponse, ClientError> {
        // Validate before any network call or state mutation.
        let (match_id, problem_id, player_id, prior) = {
            let state = store.state().ok_or(ClientError::NoMatch)?;
            if language.trim().is_empty() {
                return Err(ClientError::NoLanguage);
            }
            let problem = state.active().ok_or(ClientError::NoActiveProblem)?;
            (
                state.match_id.clone(),
                problem.id.clone(),
                state.you.id.clone(),
                state.status_of(&state.you.id, &problem.id),
            )
        };

        store.apply_optimistic(&player_id, &problem_id, Verdict::Pending);

        let request = SubmitRequest {
            match_id,
            problem_id: problem_id.clone(),
            code: code.to_string(),
            language: language.to_string(),
        };

        let url = format!("{}/submit", self.base_url);
        let outcome = tokio::time::timeout(self.timeout, async {
            let resp = self.http.post(&url).json(&request).send().await?;
            let resp = resp.error_for_status()?;
            Ok::<SubmitResponse, ClientError>(resp.json::<SubmitResponse>().await?)
        })
        .await;

        match outcome {
            Ok(Ok(response)) => {
                debug!(problem_id, verdict = ?response.verdict, "submission scored");
                store.resolve_submission(&player_id, &problem_id, response.verdict);
                Ok(response)
            }
            Ok(Err(e)) => {
                warn!(problem_id, error = %e, "submission failed, reverting pending");
                store.resolve_submission(&player_id, &problem_id, prior);
                Err(e)
            }
            Err(_) => {
                warn!(problem_id, "submission timed out, reverting pending");
                store.resolve_submission(&player_id, &problem_id, prior);
                Err(ClientError::Timeout)
            }
        }
    }
}
