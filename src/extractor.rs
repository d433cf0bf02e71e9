use scraper::{ElementRef, Html};

use crate::models::{FieldSpec, FieldValue, Record};
use crate::selector::{resolve, select_containers};

/// Applies one field rule to one container node.
///
/// A `multiple` field always yields a list, empty when nothing matched; its
/// `default` only stands in after a selector error. Matches without a value
/// (blank text, missing attribute) are left out of the list.
pub fn extract_field(container: ElementRef<'_>, field: &FieldSpec) -> FieldValue {
    let matches = match resolve(container, &field.selector, field.selector_type) {
        Ok(matches) => matches,
        Err(e) => {
            log::warn!("Field '{}': {}", field.name, e);
            return fallback(field);
        }
    };

    let attribute = field.attribute.as_deref().filter(|a| !a.trim().is_empty());

    if field.multiple {
        return FieldValue::List(matches.iter().filter_map(|m| m.value(attribute)).collect());
    }

    match matches.first().and_then(|m| m.value(attribute)) {
        Some(value) => FieldValue::Text(value),
        None => fallback(field),
    }
}

fn fallback(field: &FieldSpec) -> FieldValue {
    match &field.default {
        Some(default) => FieldValue::Text(default.clone()),
        None => FieldValue::Null,
    }
}

pub fn extract_record(container: ElementRef<'_>, fields: &[FieldSpec]) -> Record {
    fields
        .iter()
        .map(|field| (field.name.as_str(), extract_field(container, field)))
        .collect()
}

/// One record per container, or one record for the whole document when no
/// container selector is given
pub fn build_records(document: &Html, container_selector: Option<&str>, fields: &[FieldSpec]) -> Vec<Record> {
    let container_selector = container_selector.map(str::trim).filter(|s| !s.is_empty());

    let Some(selector) = container_selector else {
        return vec![extract_record(document.root_element(), fields)];
    };

    match select_containers(document, selector) {
        Ok(containers) => {
            log::debug!("Container '{}' matched {} elements", selector, containers.len());
            containers
                .into_iter()
                .map(|container| extract_record(container, fields))
                .collect()
        }
        Err(e) => {
            log::warn!("Container selector: {}", e);
            Vec::new()
        }
    }
}
