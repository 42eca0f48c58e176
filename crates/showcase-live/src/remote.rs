use std::sync::RwLock;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use reqwest::{RequestBuilder, Response, StatusCode};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use uuid::Uuid;

use showcase_types::api::{AuthResponse, FollowStatus, LoginRequest, PutSectionRequest, RegisterRequest};
use showcase_types::events::{GatewayCommand, GatewayEvent};
use showcase_types::models::SiteConfigEntry;

use crate::backend::{AuthBackend, ConfigBackend, FollowBackend, SectionSnapshot, Subscription};
use crate::error::BackendError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Talks to a running showcase server over HTTP and the `/gateway` WebSocket.
pub struct RemoteBackend {
    http: reqwest::Client,
    base_url: String,
    gateway_url: String,
    token: RwLock<Option<String>>,
}

impl RemoteBackend {
    /// `base_url` is the server root, e.g. `http://127.0.0.1:3000`.
    pub fn new(base_url: &str) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let base_url = base_url.trim_end_matches('/').to_string();
        Ok(Self {
            http,
            gateway_url: gateway_url(&base_url),
            base_url,
            token: RwLock::new(None),
        })
    }

    pub fn with_token(self, token: impl Into<String>) -> Self {
        self.set_token(Some(token.into()));
        self
    }

    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set_token(&self, token: Option<String>) {
        *self
            .token
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = token;
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, BackendError> {
        let token = self.token().ok_or(BackendError::Unauthorized)?;
        Ok(request.bearer_auth(token))
    }

    /// Admin write through `PUT /admin/config/{section}`.
    pub async fn put_section(
        &self,
        section: &str,
        value: serde_json::Value,
    ) -> Result<SiteConfigEntry, BackendError> {
        let request = self
            .http
            .put(self.url(&format!("/admin/config/{}", section)))
            .json(&PutSectionRequest { value });
        let response = check(self.authorized(request)?.send().await?)?;
        Ok(response.json().await?)
    }

    async fn follow_request(&self, request: RequestBuilder) -> Result<FollowStatus, BackendError> {
        let response = check(self.authorized(request)?.send().await?)?;
        Ok(response.json().await?)
    }

    async fn authenticate<T: serde::Serialize>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<AuthResponse, BackendError> {
        let response = check(self.http.post(self.url(path)).json(body).send().await?)?;
        let auth: AuthResponse = response.json().await?;
        self.set_token(Some(auth.token.clone()));
        info!("signed in as {}", auth.username);
        Ok(auth)
    }
}

impl ConfigBackend for RemoteBackend {
    async fn get(&self, section: &str) -> Result<Option<SectionSnapshot>, BackendError> {
        let response = self
            .http
            .get(self.url(&format!("/config/{}", section)))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let entry: SiteConfigEntry = check(response)?.json().await?;
        Ok(Some(SectionSnapshot {
            value: entry.value,
            revision: entry.revision,
        }))
    }

    async fn subscribe(&self, section: &str) -> Result<Subscription, BackendError> {
        let (socket, _) = tokio_tungstenite::connect_async(self.gateway_url.as_str()).await?;
        let (mut sink, mut stream) = socket.split();

        let command = serde_json::to_string(&GatewayCommand::Subscribe {
            sections: vec![section.to_string()],
        })?;
        sink.send(Message::Text(command.into())).await?;

        // Wait for the ack so writes after this call are guaranteed to reach us.
        let acked = tokio::time::timeout(SUBSCRIBE_TIMEOUT, async {
            while let Some(msg) = stream.next().await {
                match msg? {
                    Message::Text(text) => {
                        if let Ok(GatewayEvent::Subscribed { .. }) = serde_json::from_str(&text) {
                            return Ok(());
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Err::<(), _>(BackendError::Disconnected)
        })
        .await;
        match acked {
            Ok(result) => result?,
            Err(_) => return Err(BackendError::Timeout),
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let wanted = section.to_string();
        let forward = tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                let msg = match msg {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!("gateway read failed: {}", e);
                        break;
                    }
                };
                match msg {
                    Message::Text(text) => match serde_json::from_str::<GatewayEvent>(&text) {
                        Ok(GatewayEvent::ConfigUpdate {
                            section,
                            value,
                            revision,
                        }) if section == wanted => {
                            if tx.send(SectionSnapshot { value, revision }).is_err() {
                                break;
                            }
                        }
                        Ok(_) => {}
                        Err(e) => warn!("bad gateway event: {}", e),
                    },
                    Message::Ping(payload) => {
                        if sink.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            debug!("gateway feed for '{}' ended", wanted);
        });

        Ok(Subscription::new(rx, move || forward.abort()))
    }
}

/// The server takes the actor from the bearer token; `actor` is not sent.
impl FollowBackend for RemoteBackend {
    async fn follow(&self, _actor: Uuid, target: Uuid) -> Result<(), BackendError> {
        let request = self.http.put(self.url(&format!("/users/{}/follow", target)));
        self.follow_request(request).await.map(|_| ())
    }

    async fn unfollow(&self, _actor: Uuid, target: Uuid) -> Result<(), BackendError> {
        let request = self.http.delete(self.url(&format!("/users/{}/follow", target)));
        self.follow_request(request).await.map(|_| ())
    }

    async fn is_following(&self, _actor: Uuid, target: Uuid) -> Result<bool, BackendError> {
        let request = self.http.get(self.url(&format!("/users/{}/follow", target)));
        Ok(self.follow_request(request).await?.following)
    }
}

impl AuthBackend for RemoteBackend {
    async fn login(&self, username: &str, password: &str) -> Result<AuthResponse, BackendError> {
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        self.authenticate("/auth/login", &body).await
    }

    async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, BackendError> {
        self.authenticate("/auth/register", &request).await
    }

    fn sign_out(&self) {
        self.set_token(None);
    }
}

fn check(response: Response) -> Result<Response, BackendError> {
    match response.status() {
        StatusCode::UNAUTHORIZED => Err(BackendError::Unauthorized),
        status if status.is_success() => Ok(response),
        status => Err(BackendError::Status(status.as_u16())),
    }
}

fn gateway_url(base_url: &str) -> String {
    let ws_base = if let Some(rest) = base_url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base_url.to_string()
    };
    format!("{}/gateway", ws_base)
}
