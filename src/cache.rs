//! Cached client-credentials token with a singleflight refresh guard.
//!
//! [`TokenCache::access_token`] serves the cached bearer token while `now < expires_at` and only
//! calls the token endpoint when the token is absent or stale. Concurrent callers that find a stale
//! token queue on one async guard; the first performs the exchange and the rest re-read the
//! refreshed value instead of stampeding the endpoint. A failed exchange leaves the cache as it was
//! and is handed to everyone who queued behind it, so a hanging endpoint costs each caller one
//! timeout rather than one per queued request.

// std
use std::sync::atomic::{AtomicU64, Ordering};

// self
use crate::{
	_prelude::*,
	auth::{CachedToken, ClientCredentials, TokenSecret},
	clock::{Clock, SystemClock},
	error::TransientError,
	http::{ReqwestHttpClient, TokenHttpClient},
	oauth::{ClientCredentialsFacade, ReqwestTransportErrorMapper, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Boxed future returned by [`TokenSource::access_token`].
pub type TokenFuture<'a> = Pin<Box<dyn Future<Output = Result<TokenSecret>> + 'a + Send>>;

/// Anything that can hand out a bearer token for the address endpoint.
pub trait TokenSource
where
	Self: Send + Sync,
{
	/// Returns a token that is valid right now, refreshing it if needed.
	fn access_token(&self) -> TokenFuture<'_>;
}

#[derive(Default)]
struct RefreshState {
	last_failure: Option<String>,
}

/// Token cache specialized for the crate's reqwest transport stack.
pub type ReqwestTokenCache = TokenCache<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Owns the single cached bearer token and the transport used to refresh it.
pub struct TokenCache<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	facade: ClientCredentialsFacade<C, M>,
	clock: Arc<dyn Clock>,
	cached: RwLock<Option<CachedToken>>,
	refresh_guard: AsyncMutex<RefreshState>,
	attempts: AtomicU64,
}
impl<C, M> TokenCache<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a cache that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		token_endpoint: &Url,
		credentials: &ClientCredentials,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		let facade = ClientCredentialsFacade::new(
			token_endpoint,
			credentials,
			http_client.into(),
			mapper.into(),
		)?;

		Ok(Self {
			facade,
			clock: Arc::new(SystemClock),
			cached: RwLock::new(None),
			refresh_guard: AsyncMutex::new(RefreshState::default()),
			attempts: AtomicU64::new(0),
		})
	}

	/// Replaces the clock used for freshness checks and expiry arithmetic.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Returns a snapshot of the cached token, fresh or not.
	pub fn cached(&self) -> Option<CachedToken> {
		self.cached.read().clone()
	}

	/// Returns a token valid at the current clock reading, exchanging credentials if needed.
	pub async fn access_token(&self) -> Result<TokenSecret> {
		if let Some(token) = self.fresh_token() {
			return Ok(token);
		}

		let observed = self.attempts.load(Ordering::Acquire);
		let mut state = self.refresh_guard.lock().await;

		if let Some(token) = self.fresh_token() {
			return Ok(token);
		}
		// An exchange finished while this caller was queued.
		if let Some(message) = state.last_failure.as_ref().filter(|_| {
			self.attempts.load(Ordering::Acquire) != observed
		}) {
			return Err(TransientError::SharedRefresh { message: message.clone() }.into());
		}

		let result = self.refresh().await;

		state.last_failure = result.as_ref().err().map(ToString::to_string);
		self.attempts.fetch_add(1, Ordering::Release);

		result
	}

	fn fresh_token(&self) -> Option<TokenSecret> {
		let now = self.clock.now_utc();

		self.cached
			.read()
			.as_ref()
			.filter(|token| token.is_fresh_at(now))
			.map(|token| token.access_token.clone())
	}

	async fn refresh(&self) -> Result<TokenSecret> {
		const KIND: FlowKind = FlowKind::TokenRefresh;

		let span = FlowSpan::new(KIND, "client_credentials");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				let issued_at = self.clock.now_utc();
				let grant = self.facade.exchange().await?;
				let token = CachedToken::from_lifetime(
					grant.access_token.clone(),
					issued_at,
					grant.expires_in,
				)?;

				tracing::debug!(
					expires_at = %token.expires_at,
					expires_in = grant.expires_in.whole_seconds(),
					status = ?grant.metadata.as_ref().and_then(|meta| meta.status),
					elapsed = ?grant.metadata.as_ref().and_then(|meta| meta.elapsed),
					"Refreshed access token."
				);

				*self.cached.write() = Some(token);

				Ok::<_, Error>(grant.access_token)
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(e) => {
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);

				tracing::warn!(error = %e, "Token exchange failed.");
			},
		}

		result
	}
}
impl TokenCache<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a cache with its own redirect-free reqwest transport bounded by `timeout`.
	pub fn new(
		token_endpoint: &Url,
		credentials: &ClientCredentials,
		timeout: std::time::Duration,
	) -> Result<Self> {
		Self::with_http_client(
			token_endpoint,
			credentials,
			ReqwestHttpClient::with_timeout(timeout)?,
			ReqwestTransportErrorMapper,
		)
	}
}
impl<C, M> TokenSource for TokenCache<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn access_token(&self) -> TokenFuture<'_> {
		Box::pin(TokenCache::access_token(self))
	}
}
impl<C, M> Debug for TokenCache<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenCache").field("cached", &*self.cached.read()).finish()
	}
}
