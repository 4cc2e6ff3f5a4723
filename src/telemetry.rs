use opentelemetry::{KeyValue, trace::TracerProvider as _};
use opentelemetry_otlp::{Protocol, WithExportConfig, WithTonicConfig};
use opentelemetry_sdk::{
    Resource,
    trace::{RandomIdGenerator, Sampler, SdkTracerProvider},
};
use opentelemetry_semantic_conventions::{
    SCHEMA_URL,
    attribute::{SERVICE_NAME, SERVICE_VERSION},
    resource::DEPLOYMENT_ENVIRONMENT_NAME,
};
use rocket::{
    Data, Request, Response,
    fairing::{Fairing, Info, Kind},
};
use std::time::Instant;
use tonic::metadata::MetadataMap;
use tracing::{field, info_span};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::AppError;

pub struct TelemetryFairing;

#[rocket::async_trait]
impl Fairing for TelemetryFairing {
    fn info(&self) -> Info {
        Info {
            name: "OpenTelemetry",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, request: &mut Request<'_>, _: &mut Data<'_>) {
        let method = request.method().to_string();
        let uri = request.uri().to_string();

        let start_time = Instant::now();

        let span = info_span!(
            "http_request",
            otel.name = format!("{} {}", method, uri),
            http.method = method,
            http.uri = uri,
            http.route = field::Empty,
            http.status_code = field::Empty,
            http.duration_ms = field::Empty,
        );

        request.local_cache(|| (span, start_time));
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        let (span, start_time) = request.local_cache(|| {
            let span = info_span!("http_request");
            (span, Instant::now())
        });

        let duration = start_time.elapsed();

        if let Some(route) = request.route() {
            span.record("http.route", field::display(&route.uri));
        }
        span.record("http.status_code", response.status().code);
        span.record("http.duration_ms", duration.as_millis() as i64);

        let _entered = span.enter();
        tracing::info!(
            "Completed request in {}ms with status {}",
            duration.as_millis(),
            response.status().code
        );
    }
}

fn resource() -> Resource {
    let environment =
        dotenvy::var("ROCKET_PROFILE").unwrap_or_else(|_| "development".to_string());

    Resource::builder()
        .with_schema_url(
            [
                KeyValue::new(SERVICE_NAME, env!("CARGO_PKG_NAME")),
                KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
                KeyValue::new(DEPLOYMENT_ENVIRONMENT_NAME, environment),
            ],
            SCHEMA_URL,
        )
        .build()
}

fn init_tracer_provider(api_key: &str) -> Result<SdkTracerProvider, AppError> {
    let mut metadata = MetadataMap::new();
    metadata.insert(
        "x-honeycomb-team",
        api_key
            .parse()
            .map_err(|_| AppError::Internal("HONEYCOMB_API_KEY is not a valid header".into()))?,
    );

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint("https://api.honeycomb.io:443")
        .with_tls_config(tonic::transport::ClientTlsConfig::new().with_native_roots())
        .with_protocol(Protocol::Grpc)
        .with_metadata(metadata)
        .build()
        .map_err(|err| AppError::Internal(format!("Failed to build span exporter: {}", err)))?;

    Ok(SdkTracerProvider::builder()
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource())
        .with_batch_exporter(exporter)
        .build())
}

/// Flushes and shuts down the exporter when dropped.
pub struct OtelGuard {
    tracer_provider: SdkTracerProvider,
}

impl Drop for OtelGuard {
    fn drop(&mut self) {
        if let Err(err) = self.tracer_provider.shutdown() {
            eprintln!("Failed to shut down tracer provider: {:?}", err);
        }
    }
}

/// Installs the global subscriber. Spans are exported to Honeycomb only when
/// `HONEYCOMB_API_KEY` is set.
pub fn init_tracing() -> Option<OtelGuard> {
    let env_filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };

    let api_key = dotenvy::var("HONEYCOMB_API_KEY")
        .ok()
        .filter(|key| !key.trim().is_empty());

    let provider = match api_key.as_deref().map(init_tracer_provider) {
        Some(Ok(provider)) => Some(provider),
        Some(Err(err)) => {
            eprintln!("Telemetry export disabled: {}", err);
            None
        }
        None => None,
    };

    match provider {
        Some(tracer_provider) => {
            let tracer = tracer_provider.tracer(env!("CARGO_PKG_NAME"));
            let _ = tracing_subscriber::registry()
                .with(env_filter())
                .with(tracing_subscriber::fmt::layer())
                .with(OpenTelemetryLayer::new(tracer))
                .try_init();
            Some(OtelGuard { tracer_provider })
        }
        None => {
            let _ = tracing_subscriber::registry()
                .with(env_filter())
                .with(tracing_subscriber::fmt::layer())
                .try_init();
            None
        }
    }
}
