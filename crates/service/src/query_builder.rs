use core_types::{PreferenceQuery, QueryText};

/// Render preference fields into the canonical index query.
///
/// Field order is fixed and empty fields still produce their segment, so
/// identical inputs always yield byte-identical text.
pub fn build(
    budget: &str,
    bedrooms: &str,
    neighborhood: &str,
    features: &[String],
    property_type: &str,
) -> QueryText {
    let features = features
        .iter()
        .map(|f| f.trim())
        .filter(|f| !f.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    QueryText::new(format!(
        "Budget: {}. Bedrooms: {}. Neighborhood: {}. Features: {}. Property type: {}.",
        budget.trim(),
        bedrooms.trim(),
        neighborhood.trim(),
        features,
        property_type.trim(),
    ))
}

pub fn build_from(query: &PreferenceQuery) -> QueryText {
    build(
        &query.budget,
        &query.bedrooms,
        &query.neighborhood,
        &query.features,
        &query.property_type,
    )
}
