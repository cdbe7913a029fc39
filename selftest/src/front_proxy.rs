/*!

An authenticating front proxy for request-header authentication tests. The proxy listens on
127.0.0.1 and forwards every request to the API server over mutual TLS, using a client certificate
the API server trusts for request-header authentication. The identity asserted to the API server
is whatever user is currently set on the proxy, never what the incoming request claims.

!*/

use crate::certs::CertPair;
use anyhow::{Context, Result};
use hyper::header::{HeaderName, HeaderValue, CONNECTION, HOST, TRANSFER_ENCODING};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, HeaderMap, Request, Response, Server, StatusCode};
use log::{debug, trace, warn};
use std::convert::Infallible;
use std::fs;
use std::net::{SocketAddr, TcpListener};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// The identity the proxy asserts to the upstream.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ProxyUser {
    pub name: String,
    pub groups: Vec<String>,
}

impl ProxyUser {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            groups: Vec::new(),
        }
    }

    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }
}

struct ProxyState {
    upstream: String,
    http: reqwest::Client,
    user_header: HeaderName,
    group_header: HeaderName,
    user: RwLock<Option<ProxyUser>>,
}

pub struct FrontProxy {
    addr: SocketAddr,
    state: Arc<ProxyState>,
    shutdown: oneshot::Sender<()>,
    server: JoinHandle<()>,
}

impl FrontProxy {
    /// Starts the proxy. `upstream` is the base URL of the API server, `ca_file` the CA bundle
    /// that signed its serving certificate and `client_identity` the certificate presented to it.
    pub async fn start(
        upstream: &str,
        ca_file: &Path,
        client_identity: &CertPair,
        user_header: &str,
        group_header: &str,
    ) -> Result<Self> {
        let ca_pem = fs::read(ca_file)
            .with_context(|| format!("unable to read CA bundle '{}'", ca_file.display()))?;
        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .add_root_certificate(
                reqwest::Certificate::from_pem(&ca_pem).context("invalid CA bundle")?,
            )
            .identity(
                reqwest::Identity::from_pem(&client_identity.identity_pem())
                    .context("invalid proxy client identity")?,
            )
            .build()
            .context("unable to build proxy client")?;

        let state = Arc::new(ProxyState {
            upstream: upstream.trim_end_matches('/').to_string(),
            http,
            user_header: HeaderName::from_str(user_header)
                .with_context(|| format!("invalid user header '{}'", user_header))?,
            group_header: HeaderName::from_str(group_header)
                .with_context(|| format!("invalid group header '{}'", group_header))?,
            user: RwLock::new(None),
        });

        let listener = TcpListener::bind("127.0.0.1:0").context("unable to bind front proxy")?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;

        let service_state = state.clone();
        let make_service = make_service_fn(move |_| {
            let state = service_state.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req| {
                    let state = state.clone();
                    async move { Ok::<_, Infallible>(forward(&state, req).await) }
                }))
            }
        });
        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let server = Server::from_tcp(listener)
            .context("unable to start front proxy")?
            .serve(make_service)
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            });
        let server = tokio::spawn(async move {
            if let Err(e) = server.await {
                warn!("front proxy stopped with an error: {}", e);
            }
        });
        debug!("front proxy listening on {} for '{}'", addr, upstream);

        Ok(Self {
            addr,
            state,
            shutdown,
            server,
        })
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Sets the identity asserted for subsequent requests. `None` forwards requests with no
    /// identity at all.
    pub fn set_user(&self, user: Option<ProxyUser>) {
        let mut guard = match self.state.user.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = user;
    }

    pub async fn shutdown(self) -> Result<()> {
        if self.shutdown.send(()).is_err() {
            debug!("front proxy on {} had already stopped", self.addr);
        }
        self.server.await.context("front proxy task failed")?;
        Ok(())
    }
}

async fn forward(state: &ProxyState, req: Request<Body>) -> Response<Body> {
    match try_forward(state, req).await {
        Ok(response) => response,
        Err(e) => {
            warn!("front proxy request failed: {:#}", e);
            let mut response = Response::new(Body::from(format!("{:#}", e)));
            *response.status_mut() = StatusCode::BAD_GATEWAY;
            response
        }
    }
}

async fn try_forward(state: &ProxyState, req: Request<Body>) -> Result<Response<Body>> {
    let (parts, body) = req.into_parts();
    let path = parts
        .uri
        .path_and_query()
        .map(|p| p.as_str())
        .unwrap_or("/");
    let url = format!("{}{}", state.upstream, path);
    let user = match state.user.read() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    };
    let mut headers = parts.headers;
    rewrite_headers(
        &mut headers,
        &state.user_header,
        &state.group_header,
        user.as_ref(),
    )?;
    trace!("proxying {} {} as {:?}", parts.method, url, user);

    let body = hyper::body::to_bytes(body)
        .await
        .context("unable to read request body")?;
    let upstream = state
        .http
        .request(parts.method, &url)
        .headers(headers)
        .body(body)
        .send()
        .await
        .with_context(|| format!("unable to reach '{}'", url))?;

    let mut response = Response::builder().status(upstream.status());
    for (name, value) in upstream.headers() {
        if name != TRANSFER_ENCODING && name != CONNECTION {
            response = response.header(name, value);
        }
    }
    let bytes = upstream
        .bytes()
        .await
        .context("unable to read upstream response")?;
    Ok(response.body(Body::from(bytes))?)
}

/// Removes any identity the client tried to assert and adds the proxy's own, if any.
fn rewrite_headers(
    headers: &mut HeaderMap,
    user_header: &HeaderName,
    group_header: &HeaderName,
    user: Option<&ProxyUser>,
) -> Result<()> {
    headers.remove(user_header);
    headers.remove(group_header);
    headers.remove(HOST);
    headers.remove(CONNECTION);
    if let Some(user) = user {
        headers.insert(
            user_header.clone(),
            HeaderValue::from_str(&user.name).context("invalid user name")?,
        );
        for group in &user.groups {
            headers.append(
                group_header.clone(),
                HeaderValue::from_str(group).context("invalid group name")?,
            );
        }
    }
    Ok(())
}
