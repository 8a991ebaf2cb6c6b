//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Once;

use odrl_core::{EngineConfig, Policy};
use odrl_policy::{compile, ValidatedPolicy};

pub const ALICE: &str = "urn:party:alice";
pub const BOB: &str = "urn:party:bob";
pub const REPORT: &str = "urn:asset:report";

static TRACING: Once = Once::new();

/// Route engine logs through the test harness's captured output.
/// Set `RUST_LOG=debug` to see them.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Parse and compile a JSON policy document.
pub fn load(doc: serde_json::Value, config: &EngineConfig) -> ValidatedPolicy {
    init_tracing();
    let policy = Policy::from_json(&doc, config).expect("document parses");
    compile(&policy, config).expect("policy validates")
}
