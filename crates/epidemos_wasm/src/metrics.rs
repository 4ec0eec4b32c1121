//! Slider transforms and derived figures for the controls panel.

use epidemos_core::metrics;
use epidemos_core::ModelVariant;
use serde_wasm_bindgen::to_value;
use wasm_bindgen::prelude::*;

fn core_err(e: epidemos_core::EpidemicError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

#[wasm_bindgen]
pub fn basic_reproduction_number(contact_rate: f64, recovery_rate: f64) -> Result<f64, JsValue> {
    metrics::basic_reproduction_number(contact_rate, recovery_rate).map_err(core_err)
}

#[wasm_bindgen]
pub fn effective_contact_rate(contacts_per_day: u32) -> Result<f64, JsValue> {
    metrics::effective_contact_rate(contacts_per_day).map_err(core_err)
}

/// `field` only labels the error, e.g. "recovery_rate".
#[wasm_bindgen]
pub fn rate_from_days(field: &str, days: u32) -> Result<f64, JsValue> {
    metrics::rate_from_days(field, days).map_err(core_err)
}

#[wasm_bindgen]
pub fn display_scale(population: f64) -> f64 {
    metrics::display_scale(population)
}

#[wasm_bindgen]
pub fn model_compartments(model: &str) -> Result<JsValue, JsValue> {
    let variant: ModelVariant = model.parse().map_err(core_err)?;
    to_value(variant.compartments())
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}
