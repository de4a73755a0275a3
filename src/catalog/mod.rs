//! The cocktail catalog: immutable records loaded once from CSV.
//!
//! Expected columns are `name`, `ingredients` and `ingredientMeasures` (the
//! list columns hold Python-style list literals), plus an optional `id`.
//! Every other column is kept verbatim in [`CatalogRecord::details`].

pub mod builder;
pub mod literal;

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Serialize;

use crate::error::{AdvisorError, Result};

const ID_COLUMN: &str = "id";
const NAME_COLUMN: &str = "name";
const INGREDIENTS_COLUMN: &str = "ingredients";
const MEASURES_COLUMN: &str = "ingredientMeasures";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogRecord {
    /// Stable identifier; the `id` column, or the name when there is none.
    pub id: String,
    pub name: String,
    pub ingredients: Vec<String>,
    #[serde(rename = "ingredientMeasures")]
    pub ingredient_measures: Vec<String>,
    /// Remaining descriptive columns (category, glass type, instructions...).
    #[serde(flatten)]
    pub details: BTreeMap<String, String>,
}

impl CatalogRecord {
    /// Text fed to the embedder: the name followed by each ingredient.
    pub fn embedding_text(&self) -> String {
        std::iter::once(self.name.as_str())
            .chain(self.ingredients.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    records: Vec<CatalogRecord>,
    by_id: HashMap<String, usize>,
}

impl Catalog {
    /// Build a catalog from records. Ids are made unique: a blank id, or one
    /// already taken by an earlier row, becomes `"{id}#{row}"` (1-based row),
    /// so every record keeps its own index key.
    pub fn from_records(mut records: Vec<CatalogRecord>) -> Self {
        let mut by_id = HashMap::with_capacity(records.len());
        for (i, record) in records.iter_mut().enumerate() {
            if record.id.trim().is_empty() || by_id.contains_key(&record.id) {
                let mut unique = format!("{}#{}", record.id.trim(), i + 1);
                let mut suffix = 1;
                while by_id.contains_key(&unique) {
                    suffix += 1;
                    unique = format!("{}#{}.{suffix}", record.id.trim(), i + 1);
                }
                tracing::warn!(
                    row = i + 1,
                    id = %record.id,
                    name = %record.name,
                    new_id = %unique,
                    "duplicate or blank catalog id, renamed"
                );
                record.id = unique;
            }
            by_id.insert(record.id.clone(), i);
        }
        Self { records, by_id }
    }

    /// Load the catalog from a CSV file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(AdvisorError::CatalogNotFound(path.to_path_buf()));
        }
        let file = std::fs::File::open(path)?;
        let catalog = Self::from_reader(file)?;
        tracing::info!(path = %path.display(), records = catalog.len(), "catalog loaded");
        Ok(catalog)
    }

    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = csv.headers()?.clone();

        let mut records = Vec::new();
        for (row, result) in csv.records().enumerate() {
            let row_data = result?;
            let mut fields: BTreeMap<String, String> = headers
                .iter()
                .zip(row_data.iter())
                .map(|(h, v)| (h.to_string(), v.to_string()))
                .collect();

            let name = fields.remove(NAME_COLUMN).unwrap_or_default();
            let id = fields
                .remove(ID_COLUMN)
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| name.clone());
            let ingredients = list_field(&mut fields, INGREDIENTS_COLUMN, row);
            let ingredient_measures = list_field(&mut fields, MEASURES_COLUMN, row);

            records.push(CatalogRecord {
                id,
                name,
                ingredients,
                ingredient_measures,
                details: fields,
            });
        }

        Ok(Self::from_records(records))
    }

    pub fn records(&self) -> &[CatalogRecord] {
        &self.records
    }

    pub fn get(&self, id: &str) -> Option<&CatalogRecord> {
        self.by_id.get(id).map(|&i| &self.records[i])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether `keys` are exactly this catalog's record ids, in row order.
    pub fn matches_keys(&self, keys: &[String]) -> bool {
        keys.len() == self.records.len()
            && keys.iter().zip(&self.records).all(|(key, r)| *key == r.id)
    }
}

/// Malformed list cells degrade to an empty list rather than failing the load.
fn list_field(fields: &mut BTreeMap<String, String>, column: &str, row: usize) -> Vec<String> {
    let Some(raw) = fields.remove(column) else {
        return Vec::new();
    };
    if raw.trim().is_empty() {
        return Vec::new();
    }
    literal::parse_list(&raw).unwrap_or_else(|| {
        tracing::warn!(row, column, value = %raw, "malformed list cell, using empty list");
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
id,name,alcoholic,category,ingredients,ingredientMeasures
11000,Mojito,Alcoholic,Cocktail,\"['Light rum', 'Lime', 'Sugar', 'Mint', 'Soda water']\",\"['2-3 oz ', 'Juice of 1 ', '2 tsp ', '2-4 ', None]\"
11006,Daiquiri,Alcoholic,Ordinary Drink,\"['Light rum', 'Lime', 'Powdered sugar']\",\"['1 1/2 oz ', 'Juice of 1/2 ', '1 tsp ']\"
";

    #[test]
    fn loads_records_and_details() {
        let catalog = Catalog::from_reader(CSV.as_bytes()).unwrap();
        assert_eq!(catalog.len(), 2);

        let daiquiri = catalog.get("11006").unwrap();
        assert_eq!(daiquiri.name, "Daiquiri");
        assert_eq!(daiquiri.ingredients, vec!["Light rum", "Lime", "Powdered sugar"]);
        assert_eq!(daiquiri.ingredient_measures.len(), 3);
        assert_eq!(daiquiri.details["category"], "Ordinary Drink");
        assert!(!daiquiri.details.contains_key("name"));
    }

    #[test]
    fn malformed_list_degrades_to_empty() {
        // `None` is not a quoted string, so the measures cell is rejected
        let catalog = Catalog::from_reader(CSV.as_bytes()).unwrap();
        let mojito = catalog.get("11000").unwrap();
        assert_eq!(mojito.ingredients.len(), 5);
        assert!(mojito.ingredient_measures.is_empty());
    }

    #[test]
    fn name_is_the_id_without_id_column() {
        let csv = "name,ingredients\nNegroni,\"['Gin', 'Campari', 'Sweet Vermouth']\"\n";
        let catalog = Catalog::from_reader(csv.as_bytes()).unwrap();
        let negroni = catalog.get("Negroni").unwrap();
        assert_eq!(negroni.embedding_text(), "Negroni Gin Campari Sweet Vermouth");
        assert!(negroni.ingredient_measures.is_empty());
    }

    #[test]
    fn repeated_names_get_distinct_ids() {
        let csv = "name,ingredients\n\
                   Mojito,\"['lime', 'soda', 'mint']\"\n\
                   Mojito,\"['rum', 'cola']\"\n\
                   ,\"['gin']\"\n";
        let catalog = Catalog::from_reader(csv.as_bytes()).unwrap();
        let ids: Vec<&str> = catalog.records().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["Mojito", "Mojito#2", "#3"]);

        assert_eq!(catalog.get("Mojito").unwrap().ingredients[0], "lime");
        assert_eq!(catalog.get("Mojito#2").unwrap().ingredients[0], "rum");
    }

    #[test]
    fn renamed_id_avoids_existing_ids() {
        let record = |id: &str| CatalogRecord {
            id: id.into(),
            name: "x".into(),
            ingredients: Vec::new(),
            ingredient_measures: Vec::new(),
            details: BTreeMap::new(),
        };
        let catalog = Catalog::from_records(vec![record("a"), record("a#3"), record("a")]);
        let ids: Vec<&str> = catalog.records().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["a", "a#3", "a#3.2"]);
    }

    #[test]
    fn serializes_flat() {
        let catalog = Catalog::from_reader(CSV.as_bytes()).unwrap();
        let json = serde_json::to_value(catalog.get("11006").unwrap()).unwrap();
        assert_eq!(json["name"], "Daiquiri");
        assert_eq!(json["category"], "Ordinary Drink");
        assert_eq!(json["ingredientMeasures"][0], "1 1/2 oz ");
    }

    #[test]
    fn missing_file_is_catalog_not_found() {
        let err = Catalog::load(Path::new("/nonexistent/cocktails.csv")).unwrap_err();
        assert!(matches!(err, AdvisorError::CatalogNotFound(_)));
    }
}
