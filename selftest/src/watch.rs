/*!

Assertions over watch streams. Each `wait_for_*` call consumes events from the stream until the
expected event shows up, an event shows up that the assertion does not allow, or the call's
deadline passes.

!*/

use core::fmt::Debug;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use k8s_openapi::api::core::v1::Namespace;
use kube::api::{ListParams, WatchEvent, WatchParams};
use kube::{Api, Resource};
use log::{debug, trace};
use model::Project;
use serde::de::DeserializeOwned;
use snafu::{ensure, OptionExt, ResultExt, Snafu};
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;

/// How long `wait_for_add`, `wait_for_delete` and friends wait for the expected event.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(30);

/// How long the stream must stay quiet for `wait_for_no_event` to succeed.
pub const QUIET_PERIOD: Duration = Duration::from_secs(3);

pub type Result<T> = std::result::Result<T, WatchError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum WatchError {
    #[snafu(display("Unable to start watch on {}: {}", what, source))]
    Start { what: String, source: kube::Error },

    #[snafu(display("Timed out after {:?} waiting for {}", timeout, waiting_for))]
    Timeout {
        waiting_for: String,
        timeout: Duration,
    },

    #[snafu(display("Unexpected event {} while waiting for {}", event, waiting_for))]
    UnexpectedEvent { event: String, waiting_for: String },

    #[snafu(display("Watch stream closed while waiting for {}", waiting_for))]
    Closed { waiting_for: String },

    #[snafu(display("Watch error event ({}): {}", code, message))]
    ErrorEvent { code: u16, message: String },

    #[snafu(display("Error reading watch stream: {}", source))]
    Transport { source: kube::Error },

    #[snafu(display(
        "'{}' was terminating but then an event showed it was not: {}",
        name,
        event
    ))]
    LeftTerminating { name: String, event: String },
}

/// Where a new watch starts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WatchStart {
    /// Resource version `0`: the server first replays the current state as `ADDED` events.
    Beginning,
    /// The resource version of a fresh list, so only changes made after the watch opened arrive.
    Now,
}

/// Objects whose deletion passes through a terminating phase.
pub trait Terminating {
    fn is_terminating(&self) -> bool;
}

impl Terminating for Project {
    fn is_terminating(&self) -> bool {
        Project::is_terminating(self)
    }
}

impl Terminating for Namespace {
    fn is_terminating(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|status| status.phase.as_deref())
            == Some(model::constants::PROJECT_PHASE_TERMINATING)
    }
}

/// An open watch stream.
pub struct Watcher<K> {
    stream: BoxStream<'static, kube::Result<WatchEvent<K>>>,
}

impl<K> Watcher<K>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + 'static,
{
    /// Opens a watch on every object `api` can see.
    pub async fn start(api: &Api<K>, start: WatchStart) -> Result<Self> {
        Self::start_with(api, start, None).await
    }

    /// Opens a watch limited by a field selector such as `metadata.name=ns-01`.
    pub async fn start_with(
        api: &Api<K>,
        start: WatchStart,
        field_selector: Option<&str>,
    ) -> Result<Self> {
        let what = K::plural(&()).into_owned();
        let resource_version = match start {
            WatchStart::Beginning => "0".to_string(),
            WatchStart::Now => {
                let mut params = ListParams::default();
                if let Some(selector) = field_selector {
                    params = params.fields(selector);
                }
                api.list(&params)
                    .await
                    .context(StartSnafu { what: &what })?
                    .metadata
                    .resource_version
                    .unwrap_or_default()
            }
        };
        let mut params = WatchParams::default();
        if let Some(selector) = field_selector {
            params = params.fields(selector);
        }
        debug!("watching {} from resource version '{}'", what, resource_version);
        let stream = api
            .watch(&params, &resource_version)
            .await
            .context(StartSnafu { what })?
            .boxed();
        Ok(Self { stream })
    }

    /// Wraps an existing event stream.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: futures::Stream<Item = kube::Result<WatchEvent<K>>> + Send + 'static,
    {
        Self {
            stream: stream.boxed(),
        }
    }

    /// Waits for `ADDED` of `name`. Other events are skipped.
    pub async fn wait_for_add(&mut self, name: &str) -> Result<K> {
        let waiting_for = format!("ADDED {}", name);
        let deadline = Instant::now() + EVENT_TIMEOUT;
        loop {
            if let WatchEvent::Added(object) = self.next(&waiting_for, deadline).await? {
                if object_name(&object) == name {
                    return Ok(object);
                }
            }
        }
    }

    /// Waits for `DELETED` of `name`. Other events are skipped.
    pub async fn wait_for_delete(&mut self, name: &str) -> Result<K> {
        let waiting_for = format!("DELETED {}", name);
        let deadline = Instant::now() + EVENT_TIMEOUT;
        loop {
            if let WatchEvent::Deleted(object) = self.next(&waiting_for, deadline).await? {
                if object_name(&object) == name {
                    return Ok(object);
                }
            }
        }
    }

    /// Waits for `ADDED` of `name`, which must be the first event for that object. Modifications
    /// of other objects are skipped; any other event fails.
    pub async fn wait_for_only_add(&mut self, name: &str) -> Result<K> {
        let waiting_for = format!("only ADDED {}", name);
        let deadline = Instant::now() + EVENT_TIMEOUT;
        loop {
            let event = self.next(&waiting_for, deadline).await?;
            match event {
                WatchEvent::Added(object) if object_name(&object) == name => return Ok(object),
                WatchEvent::Modified(ref object) if object_name(object) != name => continue,
                _ => {
                    return UnexpectedEventSnafu {
                        event: describe(&event),
                        waiting_for,
                    }
                    .fail()
                }
            }
        }
    }

    /// Waits for `DELETED` of `name`. Modifications of `name` are allowed while it is terminating
    /// and modifications of other objects are skipped; any other event fails.
    pub async fn wait_for_only_delete(&mut self, name: &str) -> Result<K>
    where
        K: Terminating,
    {
        let waiting_for = format!("only DELETED {}", name);
        let deadline = Instant::now() + EVENT_TIMEOUT;
        let mut has_terminated = HashSet::new();
        loop {
            let event = self.next(&waiting_for, deadline).await?;
            match event {
                WatchEvent::Deleted(object) if object_name(&object) == name => return Ok(object),
                WatchEvent::Modified(ref object) if object_name(object) == name => {
                    let terminating = object.is_terminating();
                    ensure!(
                        terminating || !has_terminated.contains(name),
                        LeftTerminatingSnafu {
                            name,
                            event: describe(&event),
                        }
                    );
                    if terminating {
                        has_terminated.insert(name.to_string());
                    }
                }
                WatchEvent::Modified(_) => continue,
                _ => {
                    return UnexpectedEventSnafu {
                        event: describe(&event),
                        waiting_for,
                    }
                    .fail()
                }
            }
        }
    }

    /// Succeeds once no event has arrived for [`QUIET_PERIOD`]. Modifications of `skip` are
    /// tolerated and restart the quiet period; any other event fails.
    pub async fn wait_for_no_event(&mut self, skip: &str) -> Result<()> {
        let waiting_for = format!("no events other than MODIFIED {}", skip);
        loop {
            let next = tokio::time::timeout(QUIET_PERIOD, self.stream.try_next()).await;
            let event = match next {
                Err(_) => return Ok(()),
                Ok(result) => result
                    .context(TransportSnafu)?
                    .context(ClosedSnafu {
                        waiting_for: &waiting_for,
                    })?,
            };
            trace!("got {}", describe(&event));
            match event {
                WatchEvent::Modified(ref object) if object_name(object) == skip => continue,
                WatchEvent::Bookmark(_) => continue,
                WatchEvent::Error(e) => {
                    return ErrorEventSnafu {
                        code: e.code,
                        message: e.message,
                    }
                    .fail()
                }
                _ => {
                    return UnexpectedEventSnafu {
                        event: describe(&event),
                        waiting_for,
                    }
                    .fail()
                }
            }
        }
    }

    /// The next event carrying an object. Bookmarks are skipped and error events fail.
    async fn next(&mut self, waiting_for: &str, deadline: Instant) -> Result<WatchEvent<K>> {
        loop {
            let next = tokio::time::timeout_at(deadline, self.stream.try_next())
                .await
                .ok()
                .context(TimeoutSnafu {
                    waiting_for,
                    timeout: EVENT_TIMEOUT,
                })?;
            let event = next
                .context(TransportSnafu)?
                .context(ClosedSnafu { waiting_for })?;
            trace!("got {}", describe(&event));
            match event {
                WatchEvent::Bookmark(_) => continue,
                WatchEvent::Error(e) => {
                    return ErrorEventSnafu {
                        code: e.code,
                        message: e.message,
                    }
                    .fail()
                }
                event => return Ok(event),
            }
        }
    }
}

fn object_name<K: Resource>(object: &K) -> &str {
    object.meta().name.as_deref().unwrap_or_default()
}

/// A short description of an event for error messages, e.g. `MODIFIED ns-01`.
fn describe<K: Resource>(event: &WatchEvent<K>) -> String {
    match event {
        WatchEvent::Added(o) => format!("ADDED {}", object_name(o)),
        WatchEvent::Modified(o) => format!("MODIFIED {}", object_name(o)),
        WatchEvent::Deleted(o) => format!("DELETED {}", object_name(o)),
        WatchEvent::Bookmark(b) => format!("BOOKMARK {}", b.metadata.resource_version),
        WatchEvent::Error(e) => format!("ERROR {}", e.message),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use futures::stream;
    use hyper::{Body, Request, Response};
    use model::{ProjectSpec, ProjectStatus};
    use serde_json::json;
    use tokio::sync::mpsc;
    use tower_test::mock::Handle;

    fn project(name: &str, phase: Option<&str>) -> Project {
        let mut project = Project::new(name, ProjectSpec::default());
        project.status = phase.map(|phase| ProjectStatus {
            phase: Some(phase.to_string()),
        });
        project
    }

    /// A watcher that yields `events` and then stays open without further events.
    fn watcher(events: Vec<WatchEvent<Project>>) -> Watcher<Project> {
        Watcher::from_stream(
            stream::iter(events.into_iter().map(Ok)).chain(stream::pending()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn add_skips_other_events() {
        let mut w = watcher(vec![
            WatchEvent::Modified(project("ns-00", None)),
            WatchEvent::Added(project("ns-02", None)),
            WatchEvent::Added(project("ns-01", None)),
        ]);
        let added = w.wait_for_add("ns-01").await.unwrap();
        assert_eq!(added.metadata.name.as_deref(), Some("ns-01"));
    }

    #[tokio::test(start_paused = true)]
    async fn add_times_out() {
        let mut w = watcher(vec![WatchEvent::Added(project("ns-02", None))]);
        let err = w.wait_for_add("ns-01").await.unwrap_err();
        assert!(matches!(err, WatchError::Timeout { .. }), "{}", err);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_after_modifications() {
        let mut w = watcher(vec![
            WatchEvent::Modified(project("ns-03", Some("Terminating"))),
            WatchEvent::Deleted(project("ns-03", Some("Terminating"))),
        ]);
        w.wait_for_delete("ns-03").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn only_add_rejects_other_adds() {
        let mut w = watcher(vec![
            WatchEvent::Modified(project("one", None)),
            WatchEvent::Added(project("three", None)),
        ]);
        let err = w.wait_for_only_add("two").await.unwrap_err();
        assert!(matches!(err, WatchError::UnexpectedEvent { .. }), "{}", err);
    }

    #[tokio::test(start_paused = true)]
    async fn only_add_rejects_delete_of_target() {
        let mut w = watcher(vec![
            WatchEvent::Deleted(project("two", Some("Terminating"))),
            WatchEvent::Added(project("two", None)),
        ]);
        let err = w.wait_for_only_add("two").await.unwrap_err();
        assert!(
            matches!(err, WatchError::UnexpectedEvent { ref event, .. } if event.contains("DELETED")),
            "{}",
            err
        );
    }

    #[tokio::test(start_paused = true)]
    async fn only_add_rejects_modification_of_target() {
        let mut w = watcher(vec![WatchEvent::Modified(project("two", None))]);
        let err = w.wait_for_only_add("two").await.unwrap_err();
        assert!(matches!(err, WatchError::UnexpectedEvent { .. }), "{}", err);
    }

    #[tokio::test(start_paused = true)]
    async fn only_delete_tolerates_terminating() {
        let mut w = watcher(vec![
            WatchEvent::Modified(project("four", Some("Active"))),
            WatchEvent::Modified(project("four", Some("Terminating"))),
            WatchEvent::Modified(project("one", None)),
            WatchEvent::Modified(project("four", Some("Terminating"))),
            WatchEvent::Deleted(project("four", Some("Terminating"))),
        ]);
        w.wait_for_only_delete("four").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn only_delete_rejects_leaving_terminating() {
        let mut w = watcher(vec![
            WatchEvent::Modified(project("four", Some("Terminating"))),
            WatchEvent::Modified(project("four", Some("Active"))),
        ]);
        let err = w.wait_for_only_delete("four").await.unwrap_err();
        assert!(matches!(err, WatchError::LeftTerminating { .. }), "{}", err);
    }

    #[tokio::test(start_paused = true)]
    async fn only_delete_rejects_other_deletes() {
        let mut w = watcher(vec![WatchEvent::Deleted(project("three", None))]);
        let err = w.wait_for_only_delete("four").await.unwrap_err();
        assert!(matches!(err, WatchError::UnexpectedEvent { .. }), "{}", err);
    }

    #[tokio::test(start_paused = true)]
    async fn no_event_tolerates_skipped_modifications() {
        let mut w = watcher(vec![
            WatchEvent::Modified(project("ns-01", None)),
            WatchEvent::Modified(project("ns-01", None)),
        ]);
        w.wait_for_no_event("ns-01").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn no_event_rejects_other_projects() {
        let mut w = watcher(vec![WatchEvent::Modified(project("ns-03", None))]);
        let err = w.wait_for_no_event("ns-01").await.unwrap_err();
        assert!(matches!(err, WatchError::UnexpectedEvent { .. }), "{}", err);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_stream_fails() {
        let mut w = Watcher::<Project>::from_stream(stream::empty());
        let err = w.wait_for_add("ns-01").await.unwrap_err();
        assert!(matches!(err, WatchError::Closed { .. }), "{}", err);
    }

    #[tokio::test(start_paused = true)]
    async fn error_event_fails() {
        let mut w = watcher(vec![WatchEvent::Error(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: "too old resource version".to_string(),
            reason: "Expired".to_string(),
            code: 410,
        })]);
        let err = w.wait_for_add("ns-01").await.unwrap_err();
        assert!(matches!(err, WatchError::ErrorEvent { code: 410, .. }), "{}", err);
    }

    /// Serves a namespace list at resource version `4242` and a watch stream holding one `ADDED`
    /// event. Every request's query string is sent to the returned receiver.
    fn namespace_server(
        mut handle: Handle<Request<Body>, Response<Body>>,
    ) -> mpsc::UnboundedReceiver<String> {
        let (queries, received) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some((request, send)) = handle.next_request().await {
                assert_eq!(request.uri().path(), "/api/v1/namespaces");
                let query = request.uri().query().unwrap_or_default().to_string();
                let body = if query.contains("watch=true") {
                    json!({
                        "type": "ADDED",
                        "object": {
                            "apiVersion": "v1",
                            "kind": "Namespace",
                            "metadata": { "name": "ns-01", "resourceVersion": "4243" },
                        },
                    })
                } else {
                    json!({
                        "apiVersion": "v1",
                        "kind": "NamespaceList",
                        "metadata": { "resourceVersion": "4242" },
                        "items": [],
                    })
                };
                queries.send(query).unwrap();
                send.send_response(Response::new(Body::from(format!("{}\n", body))));
            }
        });
        received
    }

    fn namespaces() -> (Api<Namespace>, mpsc::UnboundedReceiver<String>) {
        let (service, handle) = tower_test::mock::pair::<Request<Body>, Response<Body>>();
        let queries = namespace_server(handle);
        (Api::all(kube::Client::new(service, "default")), queries)
    }

    #[tokio::test]
    async fn now_starts_from_fresh_list() {
        let (api, mut queries) = namespaces();
        let mut w = Watcher::start_with(&api, WatchStart::Now, Some("metadata.name=ns-01"))
            .await
            .unwrap();

        let list = queries.recv().await.unwrap();
        assert!(!list.contains("watch=true"), "{}", list);
        assert!(list.contains("fieldSelector=metadata.name%3Dns-01"), "{}", list);
        let watch = queries.recv().await.unwrap();
        assert!(watch.contains("watch=true"), "{}", watch);
        assert!(watch.contains("resourceVersion=4242"), "{}", watch);
        assert!(watch.contains("fieldSelector=metadata.name%3Dns-01"), "{}", watch);

        w.wait_for_add("ns-01").await.unwrap();
    }

    #[tokio::test]
    async fn beginning_skips_list() {
        let (api, mut queries) = namespaces();
        let mut w = Watcher::start(&api, WatchStart::Beginning).await.unwrap();

        let watch = queries.recv().await.unwrap();
        assert!(watch.contains("watch=true"), "{}", watch);
        assert!(watch.contains("resourceVersion=0"), "{}", watch);

        w.wait_for_add("ns-01").await.unwrap();
    }
}
