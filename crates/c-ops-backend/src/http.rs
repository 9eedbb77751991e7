//! ---
//! cops_section: "05-networking-external-interfaces"
//! cops_subsection: "module"
//! cops_type: "source"
//! cops_scope: "code"
//! cops_description: "Analysis backend client surface."
//! cops_version: "v0.0.0-prealpha"
//! cops_owner: "tbd"
//! ---
use async_trait::async_trait;
use c_ops_common::config::BackendConfig;
use c_ops_model::{
    AutopilotOutcome, AutopilotRequest, Enrichment, ExplainRequest, ProcurementOutcome,
    ProcurementRequest,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::{BackendError, FleetBackend};

const AUTOPILOT_PATH: &str = "agent/fleet/autopilot";
const EXPLAIN_PATH: &str = "agent/fleet/autopilot/explain";
const RECOMMEND_PATH: &str = "agent/procurement/recommend";

/// JSON-over-HTTP implementation of [`FleetBackend`].
#[derive(Debug, Clone)]
pub struct HttpFleetBackend {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpFleetBackend {
    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        let base_url = Url::parse(&config.base_url)?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, base_url })
    }

    async fn post_json<Req, Resp>(&self, path: &str, request: &Req) -> Result<Resp, BackendError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = self.base_url.join(path)?;
        debug!(%url, "dispatching backend request");
        let response = self.client.post(url).json(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                detail: extract_detail(&body),
            });
        }
        response.json().await.map_err(BackendError::Decode)
    }
}

/// Pull the backend's `detail` field out of an error body, falling back to
/// the raw body when it is absent or not JSON.
fn extract_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("detail")
                .and_then(|detail| detail.as_str())
                .map(str::to_owned)
        })
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                "no error detail provided".to_owned()
            } else {
                body.trim().to_owned()
            }
        })
}

#[async_trait]
impl FleetBackend for HttpFleetBackend {
    async fn run_autopilot(
        &self,
        request: &AutopilotRequest,
    ) -> Result<AutopilotOutcome, BackendError> {
        self.post_json(AUTOPILOT_PATH, request).await
    }

    async fn explain_autopilot(
        &self,
        request: &ExplainRequest,
    ) -> Result<Enrichment, BackendError> {
        self.post_json(EXPLAIN_PATH, request).await
    }

    async fn recommend_provider(
        &self,
        request: &ProcurementRequest,
    ) -> Result<ProcurementOutcome, BackendError> {
        self.post_json(RECOMMEND_PATH, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use c_ops_common::config::{AutopilotDefaults, ProcurementDefaults};
    use parking_lot::Mutex;
    use serde_json::{json, Value};

    type CapturedBody = Arc<Mutex<Option<Value>>>;

    async fn spawn_stub_backend(
        autopilot_response: Value,
        autopilot_status: StatusCode,
    ) -> (SocketAddr, CapturedBody) {
        let captured: CapturedBody = Arc::new(Mutex::new(None));

        let app = Router::new()
            .route(
                "/agent/fleet/autopilot",
                post({
                    let captured = captured.clone();
                    move |Json(body): Json<Value>| {
                        let captured = captured.clone();
                        let response = autopilot_response.clone();
                        async move {
                            *captured.lock() = Some(body);
                            (autopilot_status, Json(response))
                        }
                    }
                }),
            )
            .route(
                "/agent/fleet/autopilot/explain",
                post(|Json(body): Json<Value>| async move {
                    let requested: usize = body["cases"].as_array().map(Vec::len).unwrap_or(0);
                    Json(json!({
                        "summary": format!("{requested} cases reviewed"),
                        "top_reasons": ["sustained downtime"],
                        "risks": ["repeat failure"],
                        "suggested_groups": [
                            {"name": "downtown cluster", "hint": "one crew", "items": ["S1/C1"]}
                        ]
                    }))
                }),
            )
            .route(
                "/agent/procurement/recommend",
                post(|Json(_body): Json<Value>| async move {
                    Json(json!({
                        "winner": "provider-a",
                        "ranking": [
                            {
                                "provider": "provider-a",
                                "total_score": 2.1034,
                                "by_scenario": [
                                    {
                                        "scenario": "normal",
                                        "score": 0.7123,
                                        "sla_hit_rate": 0.91,
                                        "eta_p90_min": 42.5,
                                        "remote_recovery_count": 21
                                    }
                                ]
                            }
                        ],
                        "scenarios": [{"name": "normal", "trafficMode": "normal"}],
                        "weights": {"w_sla": 0.55, "w_p90": 0.25, "w_remote": 0.2},
                        "llm": {
                            "reasons": ["best SLA hit rate"],
                            "risks": ["single depot"],
                            "what_to_verify": ["crew availability"]
                        }
                    }))
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (addr, captured)
    }

    fn backend_for(addr: SocketAddr) -> HttpFleetBackend {
        HttpFleetBackend::from_config(&BackendConfig {
            base_url: format!("http://{addr}"),
            request_timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn autopilot_roundtrip_sends_wire_names_and_decodes_cases() {
        let response = json!({
            "totalCandidates": 10,
            "pickedK": 1,
            "cases": [
                {
                    "stationId": "S1", "chargerId": "C1", "name": "City Hall / CH-01",
                    "score": 0.9, "downMinutes": 120, "statusCode": 5,
                    "downProb6h": 0.8, "trafficCongestion": 0.3, "outputKw": 100.0,
                    "plan": [{"action": "OPEN_CASE", "priority": 1, "reason": "opened"}],
                    "reasons": ["down 120m"]
                }
            ]
        });
        let (addr, captured) = spawn_stub_backend(response, StatusCode::OK).await;
        let backend = backend_for(addr);

        let request = AutopilotRequest::from(&AutopilotDefaults::default());
        let outcome = backend.run_autopilot(&request).await.unwrap();
        assert_eq!(outcome.total_candidates, 10);
        assert_eq!(outcome.picked_k, 1);
        assert_eq!(outcome.cases[0].key().composite(), "S1::C1");

        let body = captured.lock().clone().expect("request captured");
        assert_eq!(body["topN"], 50);
        assert_eq!(body["autoLevel"], "safe");
        assert_eq!(body["statusCodes"], json!([4, 5]));
    }

    #[tokio::test]
    async fn non_success_status_surfaces_the_detail_field() {
        let (addr, _captured) =
            spawn_stub_backend(json!({"detail": "no twins loaded"}), StatusCode::UNPROCESSABLE_ENTITY)
                .await;
        let backend = backend_for(addr);

        let request = AutopilotRequest::from(&AutopilotDefaults::default());
        let err = backend.run_autopilot(&request).await.unwrap_err();
        match err {
            BackendError::Status { status, detail } => {
                assert_eq!(status, 422);
                assert_eq!(detail, "no twins loaded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn explain_roundtrip_carries_the_case_budget() {
        let (addr, _captured) = spawn_stub_backend(json!({}), StatusCode::OK).await;
        let backend = backend_for(addr);

        let case = serde_json::from_value(json!({
            "stationId": "S1", "chargerId": "C1", "score": 0.9
        }))
        .unwrap();
        let enrichment = backend
            .explain_autopilot(&ExplainRequest {
                cases: vec![case],
                top_k: 15,
            })
            .await
            .unwrap();
        assert_eq!(enrichment.summary, "1 cases reviewed");
        assert_eq!(enrichment.suggested_groups[0].name, "downtown cluster");
    }

    #[tokio::test]
    async fn recommend_roundtrip_decodes_ranking_and_explanation() {
        let (addr, _captured) = spawn_stub_backend(json!({}), StatusCode::OK).await;
        let backend = backend_for(addr);

        let request = ProcurementRequest::from(&ProcurementDefaults::default());
        let outcome = backend.recommend_provider(&request).await.unwrap();
        assert_eq!(outcome.winner.as_deref(), Some("provider-a"));
        assert_eq!(outcome.ranking[0].by_scenario[0].scenario, "normal");
        assert_eq!(
            outcome.llm.unwrap().what_to_verify,
            vec!["crew availability".to_string()]
        );
    }

    #[test]
    fn detail_extraction_falls_back_to_the_raw_body() {
        assert_eq!(extract_detail(r#"{"detail": "boom"}"#), "boom");
        assert_eq!(extract_detail("plain text failure"), "plain text failure");
        assert_eq!(extract_detail(""), "no error detail provided");
        assert_eq!(extract_detail(r#"{"error": "other"}"#), r#"{"error": "other"}"#);
    }
}
