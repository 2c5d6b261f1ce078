//! Observability setup for answerpool: tracing subscriber installation and
//! the optional OpenTelemetry bridge.

pub mod tracing_setup;
