//! Scenario and comparison entry points.

use crate::payload::{compare_reference, run_cached, run_request};
use epidemos_core::comparison::ReferenceSeries;
use epidemos_core::{IntegratorSettings, ModelParameters, ScenarioCache, ScenarioRequest};
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

/// Missing settings mean defaults.
fn parse_settings(settings_val: JsValue) -> Result<IntegratorSettings, JsValue> {
    if settings_val.is_undefined() || settings_val.is_null() {
        return Ok(IntegratorSettings::default());
    }
    from_value(settings_val)
        .map_err(|e| JsValue::from_str(&format!("Invalid integrator settings: {}", e)))
}

fn to_js<T: serde::Serialize>(value: &T) -> Result<JsValue, JsValue> {
    to_value(value).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

fn to_js_error(err: anyhow::Error) -> JsValue {
    JsValue::from_str(&format!("{:#}", err))
}

#[wasm_bindgen]
pub fn run_scenario(request_val: JsValue, settings_val: JsValue) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let request: ScenarioRequest = from_value(request_val)
        .map_err(|e| JsValue::from_str(&format!("Invalid scenario request: {}", e)))?;
    let settings = parse_settings(settings_val)?;
    let payload = run_request(&request, &settings).map_err(to_js_error)?;
    to_js(&payload)
}

#[wasm_bindgen]
pub fn compare_with_reference(
    parameters_val: JsValue,
    reference_val: JsValue,
    settings_val: JsValue,
) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let parameters: ModelParameters = from_value(parameters_val)
        .map_err(|e| JsValue::from_str(&format!("Invalid model parameters: {}", e)))?;
    let reference: ReferenceSeries = from_value(reference_val)
        .map_err(|e| JsValue::from_str(&format!("Invalid reference series: {}", e)))?;
    let settings = parse_settings(settings_val)?;
    let payload = compare_reference(parameters, &reference, &settings).map_err(to_js_error)?;
    to_js(&payload)
}

/// Keeps results across UI re-renders so unchanged controls do not
/// re-integrate. Bounded like the core cache; the oldest run is dropped
/// first.
#[wasm_bindgen]
pub struct WasmScenarioCache {
    cache: ScenarioCache,
}

#[wasm_bindgen]
impl WasmScenarioCache {
    #[wasm_bindgen(constructor)]
    pub fn new() -> WasmScenarioCache {
        console_error_panic_hook::set_once();
        WasmScenarioCache {
            cache: ScenarioCache::new(),
        }
    }

    pub fn run(&mut self, request_val: JsValue, settings_val: JsValue) -> Result<JsValue, JsValue> {
        let request: ScenarioRequest = from_value(request_val)
            .map_err(|e| JsValue::from_str(&format!("Invalid scenario request: {}", e)))?;
        let settings = parse_settings(settings_val)?;
        let payload = run_cached(&mut self.cache, &request, &settings).map_err(to_js_error)?;
        to_js(&payload)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

impl Default for WasmScenarioCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::{run_scenario, WasmScenarioCache};
    use epidemos_core::ScenarioRequest;
    use serde_wasm_bindgen::to_value;
    use wasm_bindgen::JsValue;
    use wasm_bindgen_test::wasm_bindgen_test;

    #[wasm_bindgen_test]
    fn run_scenario_rejects_population_exceeded() {
        let request = ScenarioRequest::sir(500_000.0, 600_000.0, 0.0, 150, 0.2, 0.1);
        let result = run_scenario(to_value(&request).expect("request"), JsValue::UNDEFINED);

        let message = result
            .err()
            .and_then(|err| err.as_string())
            .unwrap_or_default();
        assert!(message.contains("Invalid parameter `infected`"));
    }

    #[wasm_bindgen_test]
    fn cache_runs_identical_requests_once() {
        let mut cache = WasmScenarioCache::new();
        let request = ScenarioRequest::sir(10_000.0, 1.0, 0.0, 50, 0.2, 0.1);
        cache
            .run(to_value(&request).expect("request"), JsValue::NULL)
            .expect("first run");
        cache
            .run(to_value(&request).expect("request"), JsValue::NULL)
            .expect("second run");
        assert_eq!(cache.len(), 1);
    }
}
