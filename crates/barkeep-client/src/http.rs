//! HTTP implementation of the session protocol.
//!
//! Thin wire adapter over the recommendation service's REST endpoints.
//! All conversation logic lives in `barkeep-core`; this module only
//! builds URLs, serializes requests, decodes replies, and maps
//! failures into [`TransportError`].

use std::collections::HashSet;

use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use barkeep_core::config::Config;
use barkeep_core::error::{Result, TransportError};
use barkeep_core::protocol::{
    AnswerOutcome, Arity, Question, RecommendationPayload, Recommendations, SessionApi, SessionId,
};

// ============================================================================
// Wire shapes
// ============================================================================

#[derive(Debug, Deserialize)]
struct StartReply {
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct QuestionReply {
    question: String,
    #[serde(default)]
    answers: Vec<String>,
    #[serde(default)]
    last: bool,
    #[serde(default)]
    multiple: bool,
    /// Hint some service versions attach; the selection cap is fixed
    /// client-side.
    #[serde(default, rename = "requiredSelections")]
    required_selections: Option<u32>,
}

#[derive(Debug, Serialize)]
struct AnswerRequest<'a> {
    user_id: &'a str,
    answer: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnswerReply {
    #[serde(default)]
    response: String,
    #[serde(default)]
    drink: Option<RecommendationPayload>,
    #[serde(default)]
    systembolaget_drink: Option<RecommendationPayload>,
}

#[derive(Debug, Serialize)]
struct ResetRequest<'a> {
    user_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct ResetReply {
    #[serde(default)]
    status: String,
}

// ============================================================================
// Client
// ============================================================================

/// HTTP client for the recommendation service.
///
/// Carries the shared access token as a `code` query parameter on
/// every call and enforces a single outstanding question fetch per
/// session: a second fetch while one is in flight resolves to
/// `Ok(None)` without touching the network.
#[derive(Debug)]
pub struct HttpSessionClient {
    http: reqwest::Client,
    base_url: Url,
    access_token: String,
    in_flight: Mutex<HashSet<String>>,
}

impl HttpSessionClient {
    /// Builds a client from the loaded configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| TransportError::request("client", format!("invalid base URL: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| TransportError::request("client", e.to_string()))?;
        Ok(Self {
            http,
            base_url,
            access_token: config.access_token.clone(),
            in_flight: Mutex::new(HashSet::new()),
        })
    }

    /// Fetches raw image bytes by file name (e.g. a recommendation's
    /// `Image_name`). The name lands in its own path segment, so
    /// spaces and other reserved characters are percent-encoded.
    pub async fn fetch_image(&self, name: &str) -> Result<Vec<u8>> {
        let url = self.endpoint_url("images", &["images", name], &[])?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError::request("images", e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::status("images", status.as_u16()));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::request("images", e.to_string()))?;
        Ok(bytes.to_vec())
    }

    fn endpoint_url(
        &self,
        endpoint: &'static str,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| TransportError::request(endpoint, "base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
            if !self.access_token.is_empty() {
                pairs.append_pair("code", &self.access_token);
            }
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &'static str, url: Url) -> Result<T> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError::request(endpoint, e.to_string()))?;
        Self::decode_json(endpoint, response).await
    }

    async fn post_json<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        endpoint: &'static str,
        url: Url,
        body: &B,
    ) -> Result<T> {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::request(endpoint, e.to_string()))?;
        Self::decode_json(endpoint, response).await
    }

    async fn decode_json<T: DeserializeOwned>(
        endpoint: &'static str,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::status(endpoint, status.as_u16()));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| TransportError::decode(endpoint, e.to_string()))
    }
}

fn question_from_reply(reply: QuestionReply) -> Question {
    if let Some(required) = reply.required_selections {
        debug!(required, "Service hinted a required selection count");
    }
    Question {
        text: reply.question,
        answers: reply.answers,
        arity: if reply.multiple {
            Arity::Multiple
        } else {
            Arity::Single
        },
        is_final: reply.last,
    }
}

fn outcome_from_reply(reply: AnswerReply) -> AnswerOutcome {
    let recommendations = if reply.drink.is_none() && reply.systembolaget_drink.is_none() {
        None
    } else {
        Some(Recommendations {
            venue: reply.drink,
            retail: reply.systembolaget_drink,
        })
    };
    AnswerOutcome {
        text: reply.response,
        recommendations,
    }
}

#[async_trait]
impl SessionApi for HttpSessionClient {
    async fn start(&self) -> Result<SessionId> {
        let url = self.endpoint_url("start", &["start"], &[])?;
        let reply: StartReply = self.get_json("start", url).await?;
        Ok(SessionId::new(reply.user_id))
    }

    async fn fetch_question(&self, session: &SessionId) -> Result<Option<Question>> {
        {
            let mut in_flight = self.in_flight.lock().await;
            if !in_flight.insert(session.as_str().to_string()) {
                debug!(session = %session, "Dropping question fetch; one already in flight");
                return Ok(None);
            }
        }

        let result = match self.endpoint_url("question", &["question"], &[("user_id", session.as_str())]) {
            Ok(url) => self.get_json::<QuestionReply>("question", url).await,
            Err(e) => Err(e),
        };
        self.in_flight.lock().await.remove(session.as_str());

        let reply = result?;
        Ok(Some(question_from_reply(reply)))
    }

    async fn submit_answer(&self, session: &SessionId, joined_labels: &str) -> Result<AnswerOutcome> {
        let url = self.endpoint_url("answer", &["answer"], &[])?;
        let body = AnswerRequest {
            user_id: session.as_str(),
            answer: joined_labels,
        };
        let reply: AnswerReply = self.post_json("answer", url, &body).await?;
        Ok(outcome_from_reply(reply))
    }

    async fn reset(&self, session: &SessionId) -> Result<()> {
        let url = self.endpoint_url("reset", &["reset"], &[])?;
        let body = ResetRequest {
            user_id: session.as_str(),
        };
        let reply: ResetReply = self.post_json("reset", url, &body).await?;
        debug!(status = %reply.status, "Session released");
        Ok(())
    }
}
