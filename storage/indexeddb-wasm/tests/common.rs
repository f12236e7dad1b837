use std::sync::Arc;

use shelf_core::{ConnectionManager, IndexSpec, TableSpec};
use shelf_storage_indexeddb_wasm::IndexedDbEngine;
use tracing_subscriber::layer::SubscriberExt;
use tracing_wasm::{ConsoleConfig, WASMLayerConfigBuilder};
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

pub fn setup() -> ConnectionManager {
    console_error_panic_hook::set_once();

    let _ = tracing::subscriber::set_global_default(
        tracing_subscriber::registry::Registry::default().with(tracing_wasm::WASMLayer::new(
            WASMLayerConfigBuilder::new()
                .set_report_logs_in_timings(true)
                .set_console_config(ConsoleConfig::ReportWithoutConsoleColor)
                .set_max_level(tracing::Level::INFO)
                .build(),
        )),
    );

    ConnectionManager::new(Arc::new(IndexedDbEngine::new()))
}

/// A database name no other test run uses.
pub fn unique_name(prefix: &str) -> String { format!("{}_{}_{}", prefix, js_sys::Date::now() as u64, (js_sys::Math::random() * 1e9) as u64) }

pub fn items_table() -> TableSpec {
    TableSpec::new("items").key_path("id").index(IndexSpec::new("sku", "sku").unique()).index(IndexSpec::new("color", "color"))
}
