// SPDX-FileCopyrightText: © 2025 Logyard Contributors
//
// SPDX-License-Identifier: MPL-2.0

use opentelemetry::global;
use opentelemetry::metrics::Gauge;
use opentelemetry_otlp::{Protocol, WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::{metrics::PeriodicReader, metrics::SdkMeterProvider, Resource};
use std::collections::HashMap;
use std::time::Duration;

use crate::config::TelemetryConfig;

fn build_otlp_exporter(
    endpoint: &str,
    headers: &HashMap<String, String>,
) -> Result<opentelemetry_otlp::MetricExporter, Box<dyn std::error::Error>> {
    let mut exporter_builder = opentelemetry_otlp::MetricExporter::builder()
        .with_http()
        .with_protocol(Protocol::HttpBinary)
        .with_endpoint(endpoint)
        .with_timeout(Duration::from_secs(10));

    if !headers.is_empty() {
        exporter_builder = exporter_builder.with_headers(headers.clone());
    }

    exporter_builder.build().map_err(|e| {
        tracing::error!(error = %e, "failed to build OTLP metrics exporter");
        e.into()
    })
}

/// Initializes the OpenTelemetry metrics provider, exporting via OTLP if
/// `otlp_endpoint` is configured, otherwise collecting locally only.
///
/// # Errors
///
/// Returns an error if the OTLP exporter fails to build.
pub fn init_metrics(config: &TelemetryConfig) -> Result<SdkMeterProvider, Box<dyn std::error::Error>> {
    let resource = Resource::builder_empty()
        .with_attributes([
            opentelemetry::KeyValue::new("service.name", "logyard-agent"),
            opentelemetry::KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        ])
        .build();

    let builder = SdkMeterProvider::builder().with_resource(resource);

    let provider = if let Some(endpoint) = &config.otlp_endpoint {
        tracing::info!(endpoint = %endpoint, "configuring OTLP metrics exporter");
        let exporter = build_otlp_exporter(endpoint, &config.otlp_headers)?;
        let reader = PeriodicReader::builder(exporter).with_interval(Duration::from_secs(5)).build();
        builder.with_reader(reader).build()
    } else {
        tracing::info!("no OTLP endpoint configured, metrics collected but not exported");
        builder.build()
    };

    global::set_meter_provider(provider.clone());
    Ok(provider)
}

/// Gauges tracking the running-drain map by lifecycle state, refreshed every
/// time the manager's snapshot changes.
pub struct DrainGauges {
    running: Gauge<u64>,
    retrying: Gauge<u64>,
    fatal: Gauge<u64>,
    stopped: Gauge<u64>,
}

impl DrainGauges {
    #[must_use]
    pub fn new() -> Self {
        let meter = global::meter("logyard_agent");
        Self {
            running: meter.u64_gauge("logyard_drains_running").with_description("drains currently running").build(),
            retrying: meter
                .u64_gauge("logyard_drains_retrying")
                .with_description("drains currently backing off after a failure")
                .build(),
            fatal: meter.u64_gauge("logyard_drains_fatal").with_description("drains that exhausted their retry budget").build(),
            stopped: meter.u64_gauge("logyard_drains_stopped").with_description("drains currently stopped").build(),
        }
    }

    pub fn record(&self, states: &HashMap<String, logyard_core::state::DrainStateUpdate>) {
        let (mut running, mut retrying, mut fatal, mut stopped) = (0u64, 0u64, 0u64, 0u64);
        for update in states.values() {
            match update.state {
                logyard_core::state::DrainState::Running | logyard_core::state::DrainState::Starting => {
                    running += 1;
                },
                logyard_core::state::DrainState::Retrying { .. } => retrying += 1,
                logyard_core::state::DrainState::Fatal { .. } => fatal += 1,
                logyard_core::state::DrainState::Stopped => stopped += 1,
            }
        }
        self.running.record(running, &[]);
        self.retrying.record(retrying, &[]);
        self.fatal.record(fatal, &[]);
        self.stopped.record(stopped, &[]);
    }
}

impl Default for DrainGauges {
    fn default() -> Self {
        Self::new()
    }
}
