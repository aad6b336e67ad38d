//! Networking service - dispatch coordinator
//!
//! Every call goes through the same pipeline: build the request, wait for
//! dependencies, sign, transport, classify, and deliver the completion on
//! the caller's context. Calls that need the per-credential signature
//! counter are funnelled through a serial lane for that credential; all
//! others run as independent tasks.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use sealpost_domain::{
    ConcurrencyStrategy, EndpointDescriptor, ErrorReason, NetworkConfig, NetworkError, SealPostError,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn, Instrument};

use super::context::{RuntimeContext, WorkerContext};
use super::handle::{CallHandle, CancelOnDrop};
use super::lane::SerialLane;
use super::options::PostOptions;
use crate::classify::ResponseClassifier;
use crate::ports::{CompletionContext, Credential, ResponseObserver, SigningPrimitive, Transport};
use crate::request::{OutgoingRequest, RequestBuilder};
use crate::signing::SigningCoordinator;
use crate::token_store::TokenStore;

const DEFAULT_SERVICE_NAME: &str = "sealpost";

type Completion<T> = Box<dyn FnOnce(Result<T, NetworkError>) + Send + 'static>;

/// Lane key: a credential id, or `None` for the service-wide lane used by
/// serialized calls without a credential.
type LaneKey = Option<String>;

struct ServiceInner {
    name: String,
    config: NetworkConfig,
    accept_language: RwLock<String>,
    transport: Arc<dyn Transport>,
    signing: SigningCoordinator,
    observer: RwLock<Option<Arc<dyn ResponseObserver>>>,
    lanes: Mutex<HashMap<LaneKey, SerialLane>>,
    runtime: Handle,
    default_context: Arc<dyn CompletionContext>,
    shutdown: CancellationToken,
}

/// Dispatches typed requests to envelope-based endpoints.
///
/// Created once per session. Dropping the service, or calling
/// [`shutdown`](Self::shutdown), cancels every outstanding call.
pub struct NetworkingService {
    inner: Arc<ServiceInner>,
}

impl NetworkingService {
    pub fn builder(
        config: NetworkConfig,
        transport: Arc<dyn Transport>,
        signer: Arc<dyn SigningPrimitive>,
    ) -> NetworkingServiceBuilder {
        NetworkingServiceBuilder::new(config, transport, signer)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.inner.config
    }

    /// Language sent as `Accept-Language` on subsequent calls.
    pub fn accept_language(&self) -> String {
        self.inner.accept_language.read().clone()
    }

    pub fn set_accept_language(&self, language: impl Into<String>) {
        *self.inner.accept_language.write() = language.into();
    }

    pub fn set_response_observer(&self, observer: Option<Arc<dyn ResponseObserver>>) {
        *self.inner.observer.write() = observer;
    }

    pub fn token_store(&self) -> &Arc<TokenStore> {
        self.inner.signing.token_store()
    }

    // ========================================================================
    // Submission
    // ========================================================================

    /// Posts to an unsigned endpoint.
    pub fn post_unsigned<Req, Resp, F>(
        &self,
        endpoint: &EndpointDescriptor,
        payload: &Req,
        options: PostOptions,
        completion: F,
    ) -> CallHandle
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned + Send + 'static,
        F: FnOnce(Result<Resp, NetworkError>) + Send + 'static,
    {
        self.post(endpoint, payload, None, options, completion)
    }

    /// Posts to an endpoint signed by the credential's key.
    pub fn post_signed<Req, Resp, F>(
        &self,
        endpoint: &EndpointDescriptor,
        payload: &Req,
        credential: Arc<dyn Credential>,
        options: PostOptions,
        completion: F,
    ) -> CallHandle
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned + Send + 'static,
        F: FnOnce(Result<Resp, NetworkError>) + Send + 'static,
    {
        self.post(endpoint, payload, Some(credential), options, completion)
    }

    /// Posts to an endpoint authorized with an access token.
    pub fn post_with_token<Req, Resp, F>(
        &self,
        endpoint: &EndpointDescriptor,
        payload: &Req,
        credential: Arc<dyn Credential>,
        options: PostOptions,
        completion: F,
    ) -> CallHandle
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned + Send + 'static,
        F: FnOnce(Result<Resp, NetworkError>) + Send + 'static,
    {
        self.post(endpoint, payload, Some(credential), options, completion)
    }

    /// Posts `payload` to `endpoint`.
    ///
    /// The payload is serialized immediately. The completion runs exactly
    /// once on the chosen completion context, never inline with this call,
    /// unless the call is canceled first, in which case it never runs.
    #[instrument(skip_all, fields(service = %self.inner.name, path = %endpoint.path()))]
    pub fn post<Req, Resp, F>(
        &self,
        endpoint: &EndpointDescriptor,
        payload: &Req,
        credential: Option<Arc<dyn Credential>>,
        options: PostOptions,
        completion: F,
    ) -> CallHandle
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned + Send + 'static,
        F: FnOnce(Result<Resp, NetworkError>) + Send + 'static,
    {
        let inner = &self.inner;
        let handle = CallHandle::new(inner.shutdown.child_token());
        if inner.shutdown.is_cancelled() {
            warn!("Call submitted after shutdown; dropping it");
            handle.mark_canceled();
            return handle;
        }
        let context = options.completion_context.clone().unwrap_or_else(|| Arc::clone(&inner.default_context));

        let accept_language = inner.accept_language.read().clone();
        let request = RequestBuilder::new(&inner.config)
            .accept_language(&accept_language)
            .headers(&options.headers)
            .encryptor(options.encryptor.as_deref())
            .timeout(options.timeout)
            .build(endpoint, payload);

        let serial = match inner.config.concurrency() {
            ConcurrencyStrategy::AllConcurrent => false,
            ConcurrencyStrategy::SerialOnlyKeySigned => endpoint.requires_key_signature(),
            ConcurrencyStrategy::AllSerial => true,
        };
        let span = tracing::debug_span!("call", id = handle.id(), path = %endpoint.path(), serial);

        let call = Call {
            inner: Arc::clone(inner),
            handle: handle.clone(),
            endpoint: endpoint.clone(),
            credential,
            request,
            options,
            context,
            completion: Box::new(completion),
        };

        if !serial {
            inner.runtime.spawn(call.run().instrument(span));
            return handle;
        }

        let lane_key = match call.credential.as_ref() {
            Some(credential) if !credential.has_active_session() => {
                Err(format!("credential '{}' has no active session", credential.id()))
            }
            Some(credential) => Ok(Some(credential.id().to_string())),
            None if endpoint.auth().is_signed() => Err("signed endpoint called without a credential".to_string()),
            None => Ok(None),
        };
        let lane_key = match lane_key {
            Ok(key) => key,
            Err(message) => {
                call.reject(NetworkError::with_message(ErrorReason::SignError, message));
                return handle;
            }
        };

        let submitted = {
            let mut lanes = inner.lanes.lock();
            lanes.retain(|key, lane| *key == lane_key || !lane.is_idle());
            let lane = lanes.entry(lane_key.clone()).or_insert_with(|| {
                let name = lane_key.as_deref().unwrap_or("shared");
                SerialLane::spawn(&inner.runtime, format!("{}:{name}", inner.name), inner.shutdown.clone())
            });
            lane.submit(call.run().instrument(span).boxed())
        };
        if !submitted {
            handle.mark_canceled();
        }
        handle
    }

    /// Posts and awaits the result.
    ///
    /// The call is dispatched immediately. Awaiting the returned future
    /// yields its result; dropping the future cancels the call.
    pub fn send<Req, Resp>(
        &self,
        endpoint: &EndpointDescriptor,
        payload: &Req,
        credential: Option<Arc<dyn Credential>>,
        options: PostOptions,
    ) -> impl Future<Output = Result<Resp, NetworkError>> + Send + 'static
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let options = PostOptions { completion_context: Some(Arc::new(WorkerContext)), ..options };
        let handle = self.post(endpoint, payload, credential, options, move |result| {
            let _ = tx.send(result);
        });
        let guard = CancelOnDrop::new(handle);

        async move {
            let received = rx.await;
            guard.disarm();
            received.unwrap_or_else(|_| {
                Err(NetworkError::with_message(ErrorReason::Generic, "call canceled before completion"))
            })
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Cancels every outstanding call and stops the serial lanes.
    pub fn shutdown(&self) {
        if !self.inner.shutdown.is_cancelled() {
            info!(service = %self.inner.name, "Shutting down networking service");
            self.inner.shutdown.cancel();
            self.inner.lanes.lock().clear();
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }
}

impl Drop for NetworkingService {
    fn drop(&mut self) {
        if !self.inner.shutdown.is_cancelled() {
            debug!(service = %self.inner.name, "NetworkingService dropped; cancelling outstanding calls");
            self.inner.shutdown.cancel();
        }
    }
}

// ============================================================================
// Call execution
// ============================================================================

struct Call<Resp> {
    inner: Arc<ServiceInner>,
    handle: CallHandle,
    endpoint: EndpointDescriptor,
    credential: Option<Arc<dyn Credential>>,
    request: Result<OutgoingRequest, NetworkError>,
    options: PostOptions,
    context: Arc<dyn CompletionContext>,
    completion: Completion<Resp>,
}

impl<Resp: DeserializeOwned + Send + 'static> Call<Resp> {
    async fn run(self) {
        let Self { inner, handle, endpoint, credential, request, options, context, completion } = self;

        for dependency in &options.dependencies {
            tokio::select! {
                biased;
                () = handle.cancelled() => {
                    handle.mark_canceled();
                    debug!("Call canceled while waiting for dependencies");
                    return;
                }
                () = dependency.done() => {}
            }
        }

        if !handle.begin() {
            debug!("Call canceled before start");
            return;
        }

        // Signing is never interrupted: the credential's signing state must not
        // be shared with the next call on its lane.
        let prepared = prepare(&inner, request, &endpoint, credential.as_ref()).await;
        if handle.is_canceled() {
            handle.mark_canceled();
            debug!("Call canceled during signing");
            return;
        }

        let outcome = match prepared {
            Ok(request) => tokio::select! {
                biased;
                () = handle.cancelled() => None,
                result = exchange::<Resp>(&inner, request, &options) => Some(result),
            },
            Err(err) => Some(Err(err)),
        };

        let Some(result) = outcome else {
            handle.mark_canceled();
            debug!("Call canceled in flight");
            return;
        };

        if handle.finish() {
            context.execute(Box::new(move || completion(result)));
        } else {
            debug!("Call canceled after transport; completion suppressed");
        }
    }

    /// Completes a call that could not be queued. Delivery is deferred to a
    /// task so it never runs inline with submission.
    fn reject(self, error: NetworkError) {
        warn!(error = %error, "Serial call rejected");
        let Self { inner, handle, context, completion, .. } = self;
        inner.runtime.spawn(async move {
            if handle.reject() {
                context.execute(Box::new(move || completion(Err(error))));
            }
        });
    }
}

/// Unwraps the built request and attaches its authorization header.
async fn prepare(
    inner: &ServiceInner,
    request: Result<OutgoingRequest, NetworkError>,
    endpoint: &EndpointDescriptor,
    credential: Option<&Arc<dyn Credential>>,
) -> Result<OutgoingRequest, NetworkError> {
    let mut request = request?;
    if let Some(header) = inner.signing.sign(&request, endpoint.auth(), credential).await? {
        request.headers.insert(header.key, header.value);
    }
    Ok(request)
}

async fn exchange<Resp: DeserializeOwned>(
    inner: &ServiceInner,
    request: OutgoingRequest,
    options: &PostOptions,
) -> Result<Resp, NetworkError> {
    let url = request.url.clone();
    debug!(%url, encrypted = request.is_encrypted(), "Sending request");
    let response = inner.transport.send(request, options.progress.clone()).await;

    let observer = inner.observer.read().clone();
    ResponseClassifier::new(options.encryptor.as_deref(), inner.config.accept_plaintext_errors())
        .observer(observer.as_deref())
        .classify(&url, response)
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`NetworkingService`].
pub struct NetworkingServiceBuilder {
    name: String,
    config: NetworkConfig,
    transport: Arc<dyn Transport>,
    signer: Arc<dyn SigningPrimitive>,
    runtime: Option<Handle>,
    completion_context: Option<Arc<dyn CompletionContext>>,
    observer: Option<Arc<dyn ResponseObserver>>,
    token_store: Option<Arc<TokenStore>>,
}

impl NetworkingServiceBuilder {
    fn new(config: NetworkConfig, transport: Arc<dyn Transport>, signer: Arc<dyn SigningPrimitive>) -> Self {
        Self {
            name: DEFAULT_SERVICE_NAME.to_string(),
            config,
            transport,
            signer,
            runtime: None,
            completion_context: None,
            observer: None,
            token_store: None,
        }
    }

    /// Service name, reflected in lane names and logs.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Runtime that runs calls. Defaults to the current runtime.
    #[must_use]
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Default completion context. Defaults to the service runtime.
    #[must_use]
    pub fn completion_context(mut self, context: Arc<dyn CompletionContext>) -> Self {
        self.completion_context = Some(context);
        self
    }

    #[must_use]
    pub fn response_observer(mut self, observer: Arc<dyn ResponseObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Shares a token cache with other services.
    #[must_use]
    pub fn token_store(mut self, tokens: Arc<TokenStore>) -> Self {
        self.token_store = Some(tokens);
        self
    }

    /// Builds the service.
    ///
    /// # Errors
    /// Returns `SealPostError::Client` when no runtime was given and none is
    /// running.
    pub fn build(self) -> Result<NetworkingService, SealPostError> {
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current()
                .map_err(|e| SealPostError::Client(format!("NetworkingService requires a Tokio runtime: {e}")))?,
        };

        if self.config.is_insecure() {
            warn!(
                base_url = %self.config.base_url(),
                "Using HTTP for communication may create a serious security issue! Use HTTPS in production."
            );
        }

        let default_context = self
            .completion_context
            .unwrap_or_else(|| Arc::new(RuntimeContext::new(runtime.clone())));
        let mut signing = SigningCoordinator::new(self.signer);
        if let Some(tokens) = self.token_store {
            signing = signing.with_token_store(tokens);
        }

        info!(service = %self.name, base_url = %self.config.base_url(), "Networking service created");

        Ok(NetworkingService {
            inner: Arc::new(ServiceInner {
                accept_language: RwLock::new(self.config.accept_language().to_string()),
                name: self.name,
                config: self.config,
                transport: self.transport,
                signing,
                observer: RwLock::new(self.observer),
                lanes: Mutex::new(HashMap::new()),
                runtime,
                default_context,
                shutdown: CancellationToken::new(),
            }),
        })
    }
}
