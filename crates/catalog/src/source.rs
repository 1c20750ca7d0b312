use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use core_types::{ListingId, ListingRecord};
use indexmap::IndexMap;

use crate::CatalogError;

const ID_COLUMN: &str = "id";
const DESCRIPTION_COLUMN: &str = "description";

pub(crate) fn read_source(path: &Path) -> Result<Vec<u8>, CatalogError> {
    match fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            Err(CatalogError::SourceMissing(path.to_path_buf()))
        }
        Err(err) => Err(err.into()),
    }
}

#[derive(Debug, Clone, Copy)]
enum Column {
    Id,
    Description,
    Price,
    Bedrooms,
    Bathrooms,
    HouseSize,
    Neighborhood,
    Attribute,
}

fn classify(header: &str) -> Column {
    match header.to_ascii_lowercase().as_str() {
        ID_COLUMN => Column::Id,
        DESCRIPTION_COLUMN => Column::Description,
        "price" => Column::Price,
        "bedrooms" => Column::Bedrooms,
        "bathrooms" => Column::Bathrooms,
        "house_size" | "size" => Column::HouseSize,
        "neighborhood" => Column::Neighborhood,
        _ => Column::Attribute,
    }
}

fn non_empty(value: &str) -> Option<String> {
    let v = value.trim();
    if v.is_empty() { None } else { Some(v.to_string()) }
}

/// Parse CSV bytes into records. Every cell stays text; no numeric coercion.
pub fn parse_listings(bytes: &[u8]) -> Result<Vec<ListingRecord>, CatalogError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(bytes);

    let headers = reader.headers()?.clone();
    let columns: Vec<Column> = headers.iter().map(classify).collect();
    for required in [ID_COLUMN, DESCRIPTION_COLUMN] {
        if !headers.iter().any(|h| h.eq_ignore_ascii_case(required)) {
            return Err(CatalogError::Malformed(format!(
                "missing required column `{required}`"
            )));
        }
    }

    let mut out = Vec::new();
    for row in reader.records() {
        let row = row?;
        let mut rec = ListingRecord::new(ListingId::new(""), String::new());
        let mut attributes = IndexMap::new();
        for ((column, header), value) in columns.iter().zip(headers.iter()).zip(row.iter()) {
            match column {
                Column::Id => rec.id = ListingId::new(value),
                Column::Description => rec.description = value.trim().to_string(),
                Column::Price => rec.price = non_empty(value),
                Column::Bedrooms => rec.bedrooms = non_empty(value),
                Column::Bathrooms => rec.bathrooms = non_empty(value),
                Column::HouseSize => rec.house_size = non_empty(value),
                Column::Neighborhood => rec.neighborhood = non_empty(value),
                Column::Attribute => {
                    attributes.insert(header.to_string(), value.to_string());
                }
            }
        }
        rec.attributes = attributes;
        out.push(rec);
    }
    Ok(out)
}
