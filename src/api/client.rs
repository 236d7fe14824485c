use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{ApiError, AppError, AppResult};
use crate::model::{InitialState, TestRun};

use super::port::{ControllerApi, Estimate, OkResponse, TrimParameters, WsToken};

/// Controller client over HTTPS. All calls send and receive
/// `application/json`; the base URL points at the controller's `api/`
/// mount.
#[derive(Debug, Clone)]
pub struct HttpControllerApi {
    base: Url,
    client: reqwest::Client,
}

impl HttpControllerApi {
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be constructed.
    pub fn new(mut base: Url, request_timeout: Duration) -> AppResult<Self> {
        // Url::join drops the last path segment without this.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self { base, client })
    }

    fn endpoint(&self, path: &str) -> AppResult<Url> {
        Ok(self.base.join(path)?)
    }

    async fn get<T>(&self, path: &str) -> AppResult<T>
    where
        T: DeserializeOwned,
    {
        let request = self.client.get(self.endpoint(path)?);
        Self::send(path, request).await
    }

    async fn post<TBody, T>(&self, path: &str, body: &TBody) -> AppResult<T>
    where
        TBody: Serialize + Sync,
        T: DeserializeOwned,
    {
        let request = self.client.post(self.endpoint(path)?).json(body);
        Self::send(path, request).await
    }

    async fn put<T>(&self, path: &str) -> AppResult<T>
    where
        T: DeserializeOwned,
    {
        let request = self.client.put(self.endpoint(path)?);
        Self::send(path, request).await
    }

    async fn put_unit(&self, path: &str) -> AppResult<()> {
        let request = self.client.put(self.endpoint(path)?);
        let response = request.send().await.map_err(|err| {
            AppError::api(ApiError::Request {
                path: path.to_owned(),
                source: err,
            })
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::api(ApiError::Status {
                path: path.to_owned(),
                status: status.as_u16(),
            }));
        }
        Ok(())
    }

    async fn send<T>(path: &str, request: reqwest::RequestBuilder) -> AppResult<T>
    where
        T: DeserializeOwned,
    {
        let response = request.send().await.map_err(|err| {
            AppError::api(ApiError::Request {
                path: path.to_owned(),
                source: err,
            })
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::api(ApiError::Status {
                path: path.to_owned(),
                status: status.as_u16(),
            }));
        }
        response.json::<T>().await.map_err(|err| {
            AppError::api(ApiError::Decode {
                path: path.to_owned(),
                source: err,
            })
        })
    }
}

#[async_trait]
impl ControllerApi for HttpControllerApi {
    async fn ws_token(&self) -> AppResult<WsToken> {
        self.get("wsToken").await
    }

    async fn initial_state(&self) -> AppResult<InitialState> {
        self.get("initialState").await
    }

    async fn run_details(&self, id: &str) -> AppResult<TestRun> {
        self.get(&format!("testruns/{id}/details")).await
    }

    async fn schedule_run(&self, run: &TestRun) -> AppResult<OkResponse> {
        self.post("testruns/schedule", run).await
    }

    async fn estimate_run(&self, run: &TestRun) -> AppResult<Estimate> {
        self.post("testruns/estimate", run).await
    }

    async fn terminate_run(&self, id: &str) -> AppResult<OkResponse> {
        self.put(&format!("testruns/{id}/terminate")).await
    }

    async fn retry_spawn(&self, id: &str) -> AppResult<OkResponse> {
        self.put(&format!("testruns/{id}/retrySpawn")).await
    }

    async fn redownload_outputs(&self, id: &str) -> AppResult<OkResponse> {
        self.get(&format!("testruns/{id}/redownloadOutputs")).await
    }

    async fn recalculate_results(&self, id: &str, trim: &TrimParameters) -> AppResult<OkResponse> {
        self.post(&format!("testruns/{id}/results/recalc"), trim)
            .await
    }

    async fn cancel_sweep(&self, id: &str) -> AppResult<OkResponse> {
        self.get(&format!("sweeps/{id}/cancel")).await
    }

    async fn continue_sweep(&self, id: &str) -> AppResult<OkResponse> {
        self.get(&format!("sweeps/{id}/continue")).await
    }

    async fn schedule_missing_sweep_runs(&self, id: &str) -> AppResult<OkResponse> {
        self.get(&format!("sweeps/{id}/fixMissing")).await
    }

    async fn set_max_agents(&self, max: i64) -> AppResult<()> {
        self.put_unit(&format!("testruns/maxagents/{max}")).await
    }

    async fn toggle_maintenance(&self) -> AppResult<()> {
        self.put_unit("maintenance").await
    }
}
