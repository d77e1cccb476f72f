// std
use std::sync::atomic::{AtomicUsize, Ordering};
// self
use address_relay::{
	_preludet::*,
	auth::ClientCredentials,
	cache::TokenCache,
	error::{ConfigError, Error, TransientError, TransportError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	oauth::{
		TransportErrorMapper,
		oauth2::{
			AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
			http::{StatusCode, header::CONTENT_TYPE},
		},
	},
};

#[derive(Debug)]
enum FakeTransportError {
	Throttled,
}
impl Display for FakeTransportError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Throttled => write!(f, "Transport throttled."),
		}
	}
}
impl StdError for FakeTransportError {}

#[derive(Clone)]
enum FakeBehavior {
	Throttle,
	Respond(&'static str),
}

#[derive(Clone)]
struct FakeHttpClient {
	behavior: FakeBehavior,
	calls: Arc<AtomicUsize>,
	bodies: Arc<Mutex<Vec<String>>>,
}
impl FakeHttpClient {
	fn new(behavior: FakeBehavior) -> Self {
		Self { behavior, calls: Default::default(), bodies: Default::default() }
	}
}
impl TokenHttpClient for FakeHttpClient {
	type Handle = FakeHttpHandle;
	type TransportError = FakeTransportError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		FakeHttpHandle { slot, client: self.clone() }
	}
}

struct FakeHttpHandle {
	slot: ResponseMetadataSlot,
	client: FakeHttpClient,
}
impl<'a> AsyncHttpClient<'a> for FakeHttpHandle {
	type Error = HttpClientError<FakeTransportError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'a + Send + Sync>>;

	fn call(&'a self, request: HttpRequest) -> Self::Future {
		let slot = self.slot.clone();
		let client = self.client.clone();

		Box::pin(async move {
			assert!(
				slot.take().is_none(),
				"ResponseMetadataSlot must be clear before dispatching a request."
			);

			client.calls.fetch_add(1, Ordering::SeqCst);
			client.bodies.lock().push(String::from_utf8_lossy(request.body()).into_owned());

			match client.behavior {
				FakeBehavior::Throttle => {
					slot.store(ResponseMetadata { status: Some(429), elapsed: None });

					Err(HttpClientError::Reqwest(Box::new(FakeTransportError::Throttled)))
				},
				FakeBehavior::Respond(body) => {
					slot.store(ResponseMetadata { status: Some(200), elapsed: None });

					let mut response = HttpResponse::new(body.as_bytes().to_vec());

					*response.status_mut() = StatusCode::OK;
					response.headers_mut().insert(
						CONTENT_TYPE,
						"application/json".parse().expect("Content type should parse."),
					);

					Ok(response)
				},
			}
		})
	}
}

#[derive(Clone, Default)]
struct RecordingTransportErrorMapper {
	metadata: Arc<Mutex<Vec<Option<ResponseMetadata>>>>,
}
impl RecordingTransportErrorMapper {
	fn recorded_metadata(&self) -> Vec<Option<ResponseMetadata>> {
		self.metadata.lock().clone()
	}
}
impl TransportErrorMapper<FakeTransportError> for RecordingTransportErrorMapper {
	fn map_transport_error(
		&self,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<FakeTransportError>,
	) -> Error {
		let status = meta.and_then(|value| value.status);

		self.metadata.lock().push(meta.cloned());

		match err {
			HttpClientError::Reqwest(inner) => TransientError::TokenEndpoint {
				message: format!("Fake transport error: {inner}"),
				status,
			}
			.into(),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			other => TransientError::TokenEndpoint {
				message: format!("Unhandled HTTP client error variant: {other:?}"),
				status,
			}
			.into(),
		}
	}
}

fn build_cache(
	client: &FakeHttpClient,
	mapper: &RecordingTransportErrorMapper,
	clock: &ManualClock,
) -> TokenCache<FakeHttpClient, RecordingTransportErrorMapper> {
	TokenCache::with_http_client(
		&Url::parse("https://auth.example.com/oauth2/v3/token")
			.expect("Failed to parse fake token endpoint URL."),
		&ClientCredentials::new("fake-client", "fake-secret"),
		client.clone(),
		mapper.clone(),
	)
	.expect("Failed to build fake token cache.")
	.with_clock(Arc::new(clock.clone()))
}

#[tokio::test]
async fn fake_transport_sends_credentials_in_the_body() {
	let client = FakeHttpClient::new(FakeBehavior::Respond(
		"{\"access_token\":\"fake-token\",\"token_type\":\"Bearer\",\"expires_in\":120}",
	));
	let mapper = RecordingTransportErrorMapper::default();
	let clock = test_clock();
	let cache = build_cache(&client, &mapper, &clock);
	let token = cache.access_token().await.expect("Fake exchange should succeed.");

	assert_eq!(token.expose(), "fake-token");

	cache.access_token().await.expect("Cached token should be served.");

	assert_eq!(client.calls.load(Ordering::SeqCst), 1);

	let bodies = client.bodies.lock().clone();
	let body = bodies.first().expect("One request body should be recorded.");

	assert!(body.contains("grant_type=client_credentials"));
	assert!(body.contains("client_id=fake-client"));
	assert!(body.contains("client_secret=fake-secret"));
	assert!(mapper.recorded_metadata().is_empty());
}

#[tokio::test]
async fn fake_mapper_captures_response_metadata() {
	let client = FakeHttpClient::new(FakeBehavior::Throttle);
	let mapper = RecordingTransportErrorMapper::default();
	let clock = test_clock();
	let cache = build_cache(&client, &mapper, &clock);
	let err = cache.access_token().await.expect_err("Request should be throttled with HTTP 429.");

	match err {
		Error::Transient(TransientError::TokenEndpoint { status, .. }) => {
			assert_eq!(status, Some(429));
		},
		other => panic!("Unexpected error variant: {other:?}."),
	}

	let observed = mapper.recorded_metadata();

	assert_eq!(observed.len(), 1, "Mapper must record a single request.");
	assert_eq!(observed.first().and_then(|meta| meta.as_ref()).and_then(|meta| meta.status), Some(429));
	assert!(cache.cached().is_none());
}
