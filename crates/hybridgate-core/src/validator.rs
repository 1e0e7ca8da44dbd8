use serde_json::{Map, Value};

use crate::error::ValidationErrors;
use crate::request::{EnrichmentDirective, EnrichmentField, Filters, LookupRequest};

const TARGET_KEY_LEN: usize = 5;

/// Schema checks run before any I/O.
///
/// Validation is total: every problem in the payload is collected into the
/// returned [`ValidationErrors`] instead of stopping at the first one.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestValidator;

impl RequestValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, payload: &Value) -> Result<LookupRequest, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let Some(body) = payload.as_object() else {
            errors.add("request", "Request body must be a JSON object");
            return Err(errors);
        };

        let target_key = validate_target_key(body, &mut errors);
        let filters = validate_filters(body, &mut errors);
        let enrichment = validate_enrichment(body, &mut errors);

        errors.into_result()?;

        Ok(LookupRequest {
            target_key: target_key.unwrap_or_default(),
            filters,
            enrichment,
        })
    }
}

fn validate_target_key(body: &Map<String, Value>, errors: &mut ValidationErrors) -> Option<String> {
    match body.get("target_key") {
        None | Some(Value::Null) => {
            errors.add("target_key", "Target key is required");
            None
        }
        Some(Value::String(key)) => {
            if key.len() == TARGET_KEY_LEN && key.chars().all(|ch| ch.is_ascii_digit()) {
                Some(key.clone())
            } else {
                errors.add("target_key", "Invalid target key format");
                None
            }
        }
        Some(_) => {
            errors.add("target_key", "Target key must be a string");
            None
        }
    }
}

fn validate_filters(body: &Map<String, Value>, errors: &mut ValidationErrors) -> Filters {
    let mut filters = Filters::default();
    let object = match body.get("filters") {
        None | Some(Value::Null) => return filters,
        Some(Value::Object(object)) => object,
        Some(_) => {
            errors.add("filters", "Filters must be an object");
            return filters;
        }
    };

    let min_value = number_field(object, "min_value", errors);
    let max_value = number_field(object, "max_value", errors);

    if let Some(min) = min_value {
        filters.min_value = min;
    }
    if let Some(max) = max_value {
        if max < filters.min_value {
            errors.add(
                "filters",
                "Minimum value must not exceed maximum value",
            );
        }
        filters.max_value = Some(max);
    }

    filters
}

fn number_field(
    object: &Map<String, Value>,
    name: &str,
    errors: &mut ValidationErrors,
) -> Option<f64> {
    match object.get(name) {
        None | Some(Value::Null) => None,
        Some(value) => match value.as_f64() {
            Some(number) => Some(number),
            None => {
                errors.add("filters", format!("{name} must be a number"));
                None
            }
        },
    }
}

fn validate_enrichment(
    body: &Map<String, Value>,
    errors: &mut ValidationErrors,
) -> EnrichmentDirective {
    let data_source = match body.get("data_source") {
        None | Some(Value::Null) => return EnrichmentDirective::disabled(),
        Some(Value::Object(object)) => object,
        Some(_) => {
            errors.add("data_source", "data_source must be an object");
            return EnrichmentDirective::disabled();
        }
    };

    let enrichment = match data_source.get("enrichment") {
        None | Some(Value::Null) => return EnrichmentDirective::disabled(),
        Some(Value::Object(object)) => object,
        Some(_) => {
            errors.add("enrichment", "enrichment must be an object");
            return EnrichmentDirective::disabled();
        }
    };

    let enabled = match enrichment.get("enabled") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(_) => {
            errors.add("enrichment", "enabled must be a boolean");
            false
        }
    };

    let fields = match enrichment.get("fields") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => parse_fields(items, errors),
        Some(_) => {
            errors.add("enrichment_fields", "Fields must be a list");
            Vec::new()
        }
    };

    let mut directive = EnrichmentDirective::fields(fields);
    directive.enabled = enabled;
    directive
}

fn parse_fields(items: &[Value], errors: &mut ValidationErrors) -> Vec<EnrichmentField> {
    let mut fields = Vec::with_capacity(items.len());
    let mut invalid = Vec::new();

    for item in items {
        match item.as_str() {
            Some(name) => match name.parse::<EnrichmentField>() {
                Ok(field) => fields.push(field),
                Err(unknown) => invalid.push(unknown),
            },
            None => invalid.push(item.to_string()),
        }
    }

    if !invalid.is_empty() {
        errors.add(
            "enrichment_fields",
            format!("Invalid fields: {}", invalid.join(", ")),
        );
    }

    fields
}
