//! Typed client for the task REST API.
//!
//! [`ApiClient`] builds requests and classifies responses; moving bytes is left
//! to an [`HttpTransport`] so the same client runs over `fetch` in the browser
//! and over scripted transports in tests.

use async_trait::async_trait;
use http::{header, Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};

use crate::config::ClientConfig;
use crate::error::{ApiError, ApiResult, FieldErrors, TransportError};
use crate::models::{
    CreateTaskRequest, Credential, LoginFailure, LoginRequest, LoginResponse, RegisterRequest,
    RegisterResponse, Session, Task, TaskId, TaskList, UpdateTaskRequest,
};

pub const REGISTER_PATH: &str = "/auth/register/";
pub const LOGIN_PATH: &str = "/auth/login/";
pub const LOGOUT_PATH: &str = "/auth/logout/";
pub const TASKS_PATH: &str = "/tasks/";

pub fn task_path(id: TaskId) -> String {
    format!("/tasks/{id}/")
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(header::HeaderName, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn header(&self, name: &header::HeaderName) -> Option<&str> {
        self.headers
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Sends one request and returns the raw response.
///
/// Any HTTP status counts as a response; only failures to obtain one are
/// `TransportError`s.
#[async_trait(?Send)]
pub trait HttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[derive(Debug, Clone)]
pub struct ApiClient<T> {
    base_url: String,
    auth_scheme: String,
    transport: T,
}

impl<T: HttpTransport> ApiClient<T> {
    pub fn new(config: &ClientConfig, transport: T) -> Self {
        Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            auth_scheme: config.auth_scheme.clone(),
            transport,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn register(&self, form: &RegisterRequest) -> ApiResult<Session> {
        let request = self.request(Method::POST, REGISTER_PATH, None, Some(encode(form)?));
        let response = self.send(request).await?;
        if !response.status.is_success() {
            return Err(ApiError::Validation(FieldErrors::from_body(&response.body)));
        }
        let body: RegisterResponse = decode(&response)?;
        Ok(body.into())
    }

    pub async fn login(&self, username: &str, password: &str) -> ApiResult<Session> {
        let form = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let request = self.request(Method::POST, LOGIN_PATH, None, Some(encode(&form)?));
        let response = self.send(request).await?;
        if !response.status.is_success() {
            let message = serde_json::from_str::<LoginFailure>(&response.body)
                .ok()
                .and_then(|failure| failure.error)
                .unwrap_or_else(|| "Invalid credentials".to_string());
            return Err(ApiError::Auth(message));
        }
        let body: LoginResponse = decode(&response)?;
        Ok(body.into())
    }

    pub async fn logout(&self, credential: &Credential) -> ApiResult<()> {
        let request = self.request(Method::POST, LOGOUT_PATH, Some(credential), None);
        let response = self.send(request).await?;
        expect_success(&response)
    }

    pub async fn list_tasks(&self, credential: &Credential) -> ApiResult<Vec<Task>> {
        let request = self.request(Method::GET, TASKS_PATH, Some(credential), None);
        let response = self.send(request).await?;
        expect_authorized(&response)?;
        let list: TaskList = decode(&response)?;
        Ok(list.into_tasks())
    }

    pub async fn create_task(
        &self,
        credential: &Credential,
        title: &str,
        description: &str,
    ) -> ApiResult<()> {
        let body = CreateTaskRequest {
            title: title.to_string(),
            description: description.to_string(),
            completed: false,
        };
        let request = self.request(Method::POST, TASKS_PATH, Some(credential), Some(encode(&body)?));
        let response = self.send(request).await?;
        expect_authorized(&response)
    }

    pub async fn set_completed(
        &self,
        credential: &Credential,
        id: TaskId,
        completed: bool,
    ) -> ApiResult<()> {
        let body = encode(&UpdateTaskRequest { completed })?;
        let request = self.request(Method::PATCH, &task_path(id), Some(credential), Some(body));
        let response = self.send(request).await?;
        expect_authorized(&response)
    }

    pub async fn delete_task(&self, credential: &Credential, id: TaskId) -> ApiResult<()> {
        let request = self.request(Method::DELETE, &task_path(id), Some(credential), None);
        let response = self.send(request).await?;
        expect_authorized(&response)
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        credential: Option<&Credential>,
        body: Option<String>,
    ) -> HttpRequest {
        let mut headers = vec![(header::CONTENT_TYPE, "application/json".to_string())];
        if let Some(credential) = credential {
            headers.push((
                header::AUTHORIZATION,
                credential.header_value(&self.auth_scheme),
            ));
        }
        HttpRequest {
            method,
            url: format!("{}{}", self.base_url, path),
            headers,
            body,
        }
    }

    async fn send(&self, request: HttpRequest) -> ApiResult<HttpResponse> {
        let method = request.method.clone();
        let url = request.url.clone();
        debug!(%method, %url, "sending request");

        match self.transport.send(request).await {
            Ok(response) => {
                debug!(%method, %url, status = %response.status, "received response");
                Ok(response)
            }
            Err(e) => {
                error!(%method, %url, "request failed: {e}");
                Err(e.into())
            }
        }
    }
}

fn encode<B: Serialize>(body: &B) -> ApiResult<String> {
    serde_json::to_string(body).map_err(|e| ApiError::Decode(e.to_string()))
}

fn decode<B: DeserializeOwned>(response: &HttpResponse) -> ApiResult<B> {
    serde_json::from_str(&response.body).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Like [`expect_success`], but a 401 means the credential was rejected.
fn expect_authorized(response: &HttpResponse) -> ApiResult<()> {
    if response.status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Auth("Session expired".to_string()));
    }
    expect_success(response)
}

fn expect_success(response: &HttpResponse) -> ApiResult<()> {
    if response.status.is_success() {
        Ok(())
    } else {
        Err(ApiError::Request {
            status: response.status.as_u16(),
        })
    }
}
