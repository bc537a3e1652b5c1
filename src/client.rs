use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, OnceLock,
};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use http::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    Request, StatusCode,
};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{
    config::MetricsConfig,
    core::{
        consent::ConsentState,
        deletion::{
            regulation_date, DataDeletionResult, DataDeletionStatus, DeletionRegulation,
            RegulationError, RegulationRequest, RegulationResponse, REGULATIONS_CONTENT_TYPE,
        },
        event::{
            AuthenticationMethod, EventRecord, GroupTraits, Properties, UserTraits,
            AUTHENTICATION_TYPE_TRAIT,
        },
        identity::{generate_analytics_id, ANONYMOUS_ID},
        util::{AsyncHttpClient, ReqwestClient},
    },
    sink::EventSink,
    store::{self, PreferenceStore},
};

/// Process-wide gatekeeper between application code and the vendor event
/// sink.
///
/// Owns consent state, the pseudonymous installation identity, and
/// deletion-workflow bookkeeping. Cheap to clone; all clones share the same
/// state. Construction performs no I/O — the host spawns [init](Self::init)
/// in the background, and calls made before it resolves observe the
/// disabled defaults. Dropping a handful of early events is preferred over
/// blocking application startup.
#[derive(Debug, Clone)]
pub struct MetricsClient {
    sink: Arc<dyn EventSink + Send + Sync>,
    store: Arc<dyn PreferenceStore + Send + Sync>,
    http_client: Arc<dyn AsyncHttpClient + Send + Sync>,
    config: MetricsConfig,
    initial_traits: UserTraits,
    state: Arc<State>,
}

#[derive(Debug, Default)]
struct State {
    enabled: AtomicBool,
    data_recorded: AtomicBool,
    identity_merged: AtomicBool,
    legacy_identity: AtomicBool,
    analytics_id: OnceLock<String>,
    deletion_date: Mutex<Option<String>>,
}

impl MetricsClient {
    /// Build a new client.
    pub fn builder() -> MetricsClientBuilder {
        MetricsClientBuilder::default()
    }

    /// Load persisted consent and identity state and run the one-time
    /// identity merge.
    ///
    /// Safe to run again (for instance after a hot restart): the merge is
    /// guarded by a persisted flag and the identifier never changes once
    /// set. Storage failures degrade to the safe defaults — disabled
    /// consent, unmerged identity — and are logged, never returned.
    pub async fn init(&self) {
        let consent = self.load_consent().await;
        self.state
            .enabled
            .store(consent.is_enabled(), Ordering::Relaxed);

        let id = self.load_or_generate_id().await;
        let id = self.state.analytics_id.get_or_init(|| id).clone();

        self.merge_identity(&id).await;

        if self.check_enabled() && !self.initial_traits.is_empty() {
            self.identify(self.initial_traits.clone()).await;
        }

        if self.config.debug {
            debug!(consent = ?consent, id = %id, "analytics client initialized");
        }
    }

    /// Record the user's opt-in and persist it.
    ///
    /// The in-memory state flips before the write, so subsequent calls see
    /// the transition immediately; a failed write is logged, not returned.
    pub async fn enable(&self) {
        self.state.enabled.store(true, Ordering::Relaxed);
        self.persist_consent(ConsentState::Enabled).await;
    }

    /// Record the user's opt-out and persist it.
    ///
    /// Events sent while disabled are dropped, not buffered; re-enabling
    /// does not replay them.
    pub async fn disable(&self) {
        self.state.enabled.store(false, Ordering::Relaxed);
        self.persist_consent(ConsentState::Disabled).await;
    }

    pub fn check_enabled(&self) -> bool {
        self.state.enabled.load(Ordering::Relaxed)
    }

    pub fn state(&self) -> ConsentState {
        if self.check_enabled() {
            ConsentState::Enabled
        } else {
            ConsentState::Disabled
        }
    }

    /// Record an event attributed to the installation identifier.
    ///
    /// Dropped silently while consent is disabled. Marks the installation
    /// as having identifiable data on record.
    pub async fn track_event(&self, name: impl Into<String>, properties: Properties) {
        if !self.check_enabled() {
            return;
        }

        self.forward(EventRecord::identified(name, properties, self.actor_id()))
            .await;
        self.state.data_recorded.store(true, Ordering::Relaxed);
    }

    /// Record an event carrying no installation identifier.
    ///
    /// Also gated on consent. Anonymous data is not considered identifiable,
    /// so this does not mark data as recorded.
    pub async fn track_anonymous_event(&self, name: impl Into<String>, properties: Properties) {
        if !self.check_enabled() {
            return;
        }

        self.forward(EventRecord::anonymous(name, properties)).await;
    }

    /// Attach traits to the pseudonymous user identity.
    pub async fn add_traits_to_user(&self, traits: UserTraits) {
        if !self.check_enabled() {
            return;
        }

        self.identify(traits).await;
    }

    /// Associate the user with a group.
    pub async fn group(&self, group_id: &str, traits: GroupTraits) {
        if !self.check_enabled() {
            return;
        }

        if let Err(e) = self.sink.group(group_id, traits).await {
            warn!("failed to forward group association: {e:#}");
        }
    }

    /// Report how the wallet was unlocked as a single user trait.
    pub async fn apply_authentication_user_property(&self, method: AuthenticationMethod) {
        if !self.check_enabled() {
            return;
        }

        let mut traits = UserTraits::new();
        traits.insert(
            AUTHENTICATION_TYPE_TRAIT.to_owned(),
            method.as_str().into(),
        );
        self.identify(traits).await;
    }

    /// Clear the vendor-side session identity.
    ///
    /// Unconditional: runs regardless of consent state so an opted-out user
    /// still sheds any previous session linkage.
    pub async fn reset(&self) {
        if let Err(e) = self.sink.reset(ANONYMOUS_ID).await {
            warn!("failed to reset vendor session identity: {e:#}");
        }
    }

    /// Create a new deletion regulation for this installation's telemetry.
    ///
    /// Required by GDPR/CCPA. A single attempt with no retry; the outcome
    /// is returned so the UI can branch on it. On success the vendor's
    /// regulation id and today's UTC date are persisted and the
    /// data-recorded flag is cleared. Nothing is persisted on failure.
    pub async fn request_data_deletion(&self) -> DataDeletionResult {
        match self.create_regulation().await {
            Ok(regulation_id) => {
                self.state.data_recorded.store(false, Ordering::Relaxed);

                let date = regulation_date(Utc::now());
                *self.state.deletion_date.lock().await = Some(date.clone());

                if let Err(e) = self
                    .store
                    .set(store::DELETION_REGULATION_ID_KEY, &regulation_id)
                    .await
                {
                    warn!("failed to persist deletion regulation id: {e:#}");
                }
                if let Err(e) = self.store.set(store::DELETION_REQUEST_DATE_KEY, &date).await {
                    warn!("failed to persist deletion request date: {e:#}");
                }

                debug!(%regulation_id, "deletion regulation created");
                DataDeletionResult::ok()
            }
            Err(RegulationError::UnexpectedStatus(status)) => {
                warn!(%status, "deletion regulation request rejected");
                DataDeletionResult::error(None)
            }
            Err(e) => {
                warn!("deletion regulation request failed: {e}");
                DataDeletionResult::error(Some(e.to_string()))
            }
        }
    }

    /// Vendor-issued id of the last deletion regulation, if any.
    pub async fn deletion_regulation_id(&self) -> Option<String> {
        match self.store.get(store::DELETION_REGULATION_ID_KEY).await {
            Ok(id) => id,
            Err(e) => {
                warn!("failed to read deletion regulation id: {e:#}");
                None
            }
        }
    }

    /// UTC date (day/month/year) of the last deletion request, if any.
    ///
    /// Memoized in-process after the first read.
    pub async fn deletion_request_date(&self) -> Option<String> {
        let mut memo = self.state.deletion_date.lock().await;
        if let Some(date) = memo.as_ref() {
            return Some(date.clone());
        }

        match self.store.get(store::DELETION_REQUEST_DATE_KEY).await {
            Ok(Some(date)) => {
                *memo = Some(date.clone());
                Some(date)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("failed to read deletion request date: {e:#}");
                None
            }
        }
    }

    /// The last deletion regulation with its creation date.
    ///
    /// The vendor-side status is stale by definition and reported as
    /// [unknown](DataDeletionStatus::Unknown) until re-queried.
    pub async fn deletion_regulation(&self) -> Option<DeletionRegulation> {
        let regulation_id = self.deletion_regulation_id().await?;
        let requested_date = self.deletion_request_date().await?;

        Some(DeletionRegulation {
            regulation_id,
            requested_date,
            status: DataDeletionStatus::Unknown,
        })
    }

    /// Whether an identified event has been recorded since the last
    /// deletion request.
    pub fn is_data_recorded(&self) -> bool {
        self.state.data_recorded.load(Ordering::Relaxed)
    }

    /// The pseudonymous installation identifier; `None` until
    /// [init](Self::init) resolves.
    pub fn analytics_id(&self) -> Option<String> {
        self.state.analytics_id.get().cloned()
    }

    /// Whether the identifier was adopted from the previous vendor
    /// integration rather than generated here.
    pub fn uses_legacy_identity(&self) -> bool {
        self.state.legacy_identity.load(Ordering::Relaxed)
    }

    async fn load_consent(&self) -> ConsentState {
        match self.store.get(store::CONSENT_KEY).await {
            Ok(value) => ConsentState::from_preference(value.as_deref()),
            Err(e) => {
                warn!("failed to read analytics consent, defaulting to disabled: {e:#}");
                ConsentState::Disabled
            }
        }
    }

    async fn persist_consent(&self, consent: ConsentState) {
        if let Err(e) = self
            .store
            .set(store::CONSENT_KEY, consent.as_preference())
            .await
        {
            warn!("failed to persist analytics consent: {e:#}");
        }
    }

    async fn load_or_generate_id(&self) -> String {
        // An identifier carried over from the previous vendor integration
        // wins, so the user's history stays on one timeline.
        match self.store.get(store::LEGACY_ID_KEY).await {
            Ok(Some(legacy)) if !legacy.is_empty() => {
                self.state.legacy_identity.store(true, Ordering::Relaxed);
                debug!("adopted legacy analytics id");
                return legacy;
            }
            Ok(_) => {}
            Err(e) => warn!("failed to read legacy analytics id: {e:#}"),
        }

        match self.store.get(store::ANALYTICS_ID_KEY).await {
            Ok(Some(id)) if !id.is_empty() => return id,
            Ok(_) => {}
            Err(e) => warn!("failed to read analytics id: {e:#}"),
        }

        let id = generate_analytics_id();
        if let Err(e) = self.store.set(store::ANALYTICS_ID_KEY, &id).await {
            // The in-memory id still serves this session; the next startup
            // will generate a new one.
            warn!("failed to persist analytics id: {e:#}");
        }
        id
    }

    /// One-time merge of historical identities on the vendor side.
    ///
    /// A failed flag read is treated as "not yet merged" so the merge is
    /// retried on the next startup rather than skipped forever.
    async fn merge_identity(&self, id: &str) {
        if self.state.identity_merged.load(Ordering::Relaxed) {
            return;
        }

        match self.store.get(store::IDENTITY_MERGED_KEY).await {
            Ok(Some(flag)) if flag == "true" => {
                self.state.identity_merged.store(true, Ordering::Relaxed);
                return;
            }
            Ok(_) => {}
            Err(e) => warn!("failed to read identity merge flag: {e:#}"),
        }

        if let Err(e) = self.sink.alias(id).await {
            // Leave the flag unset so the merge is retried next startup.
            warn!("identity merge failed: {e:#}");
            return;
        }
        if let Err(e) = self.sink.flush().await {
            warn!("failed to flush after identity merge: {e:#}");
        }

        self.state.identity_merged.store(true, Ordering::Relaxed);
        if let Err(e) = self.store.set(store::IDENTITY_MERGED_KEY, "true").await {
            warn!("failed to persist identity merge flag: {e:#}");
        }
    }

    fn actor_id(&self) -> String {
        // Early calls racing init are attributed to an empty actor; the
        // consent default drops almost all of them anyway.
        self.state.analytics_id.get().cloned().unwrap_or_default()
    }

    async fn forward(&self, event: EventRecord) {
        if let Err(e) = self.sink.track(event).await {
            warn!("failed to forward event to sink: {e:#}");
        }
    }

    async fn identify(&self, traits: UserTraits) {
        let id = self.actor_id();
        if let Err(e) = self.sink.identify(&id, traits).await {
            warn!("failed to forward user traits: {e:#}");
            return;
        }
        if let Err(e) = self.sink.flush().await {
            warn!("failed to flush after identify: {e:#}");
        }
    }

    async fn create_regulation(&self) -> Result<String, RegulationError> {
        let id = self
            .state
            .analytics_id
            .get()
            .cloned()
            .ok_or(RegulationError::MissingIdentity)?;

        let body = serde_json::to_vec(&RegulationRequest::delete_only(&id))
            .context("failed to encode regulation request")?;

        let request = Request::post(self.config.regulations_endpoint.as_str())
            .header(CONTENT_TYPE, REGULATIONS_CONTENT_TYPE)
            .header(
                AUTHORIZATION,
                format!("Bearer {}", self.config.deletion_token),
            )
            .body(body)
            .context("failed to construct regulation request")?;

        let response = self.http_client.execute(request).await?;

        if response.status() != StatusCode::OK {
            return Err(RegulationError::UnexpectedStatus(response.status()));
        }

        serde_json::from_slice::<RegulationResponse>(response.body())
            .map(|parsed| parsed.data.regulate_id)
            .map_err(RegulationError::MalformedResponse)
    }
}

/// Builder struct for [MetricsClient].
#[derive(Debug, Clone, Default)]
pub struct MetricsClientBuilder {
    sink: Option<Arc<dyn EventSink + Send + Sync>>,
    store: Option<Arc<dyn PreferenceStore + Send + Sync>>,
    http_client: Option<Arc<dyn AsyncHttpClient + Send + Sync>>,
    config: Option<MetricsConfig>,
    initial_traits: UserTraits,
}

impl MetricsClientBuilder {
    /// Build the client.
    ///
    /// Falls back to a [ReqwestClient] when no HTTP client was provided.
    pub fn build(self) -> Result<MetricsClient> {
        let Self {
            sink,
            store,
            http_client,
            config,
            initial_traits,
        } = self;

        let Some(sink) = sink else {
            bail!("event sink is required, see `with_sink`")
        };

        let Some(store) = store else {
            bail!("preference store is required, see `with_store`")
        };

        let Some(config) = config else {
            bail!("config is required, see `with_config`")
        };

        let http_client: Arc<dyn AsyncHttpClient + Send + Sync> = match http_client {
            Some(http_client) => http_client,
            None => Arc::new(ReqwestClient::new()?),
        };

        Ok(MetricsClient {
            sink,
            store,
            http_client,
            config,
            initial_traits,
            state: Arc::new(State::default()),
        })
    }

    /// Set the [EventSink] that receives everything consent allows through.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink + Send + Sync>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Set the [PreferenceStore] holding consent and identity state.
    pub fn with_store(mut self, store: Arc<dyn PreferenceStore + Send + Sync>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the HTTP client used for the deletion-regulation endpoint.
    pub fn with_http_client(mut self, http_client: Arc<dyn AsyncHttpClient + Send + Sync>) -> Self {
        self.http_client = Some(http_client);
        self
    }

    /// Set the [MetricsConfig].
    pub fn with_config(mut self, config: MetricsConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Traits pushed once at startup when consent is already granted, e.g.
    /// the app theme or feature toggles the host wants attached to every
    /// user.
    pub fn with_initial_traits(mut self, traits: UserTraits) -> Self {
        self.initial_traits = traits;
        self
    }
}
