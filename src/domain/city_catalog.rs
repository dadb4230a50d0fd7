//! City reference dataset.
//!
//! The registry only accepts pools in cities listed here. The catalog is
//! injected at startup (built-in default or a JSON file), so the registry
//! carries no knowledge of any particular country's locality scheme.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::CityCode;
use crate::error::GatewayError;

/// Built-in plate codes served when no catalog file is configured.
const BUILTIN_CITIES: &[(&str, &str)] = &[
    ("01", "Adana"),
    ("06", "Ankara"),
    ("07", "Antalya"),
    ("09", "Aydın"),
    ("10", "Balıkesir"),
    ("16", "Bursa"),
    ("17", "Çanakkale"),
    ("20", "Denizli"),
    ("21", "Diyarbakır"),
    ("27", "Gaziantep"),
    ("34", "İstanbul"),
    ("35", "İzmir"),
    ("38", "Kayseri"),
    ("41", "Kocaeli"),
    ("42", "Konya"),
    ("52", "Ordu"),
    ("55", "Samsun"),
    ("58", "Sivas"),
    ("61", "Trabzon"),
    ("63", "Şanlıurfa"),
];

/// One `{code, name}` row of the catalog, as read from and written to JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityEntry {
    /// Two-digit plate code.
    pub code: String,
    /// Display name.
    pub name: String,
}

/// Immutable lookup table of recognized cities.
#[derive(Debug, Clone, Default)]
pub struct CityCatalog {
    cities: BTreeMap<CityCode, String>,
}

impl CityCatalog {
    /// Builds a catalog from `{code, name}` entries.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidCityCode`] if an entry's code is not
    /// exactly two digits or appears twice.
    pub fn from_entries<I>(entries: I) -> Result<Self, GatewayError>
    where
        I: IntoIterator<Item = CityEntry>,
    {
        let mut cities = BTreeMap::new();
        for entry in entries {
            let code = CityCode::parse(&entry.code)?;
            if cities.insert(code, entry.name).is_some() {
                return Err(GatewayError::InvalidCityCode(format!(
                    "{code} listed twice in city catalog"
                )));
            }
        }
        Ok(Self { cities })
    }

    /// Returns the built-in catalog.
    #[must_use]
    pub fn builtin() -> Self {
        let cities = BUILTIN_CITIES
            .iter()
            .filter_map(|(code, name)| {
                CityCode::parse(code)
                    .ok()
                    .map(|code| (code, (*name).to_string()))
            })
            .collect();
        Self { cities }
    }

    /// Loads a catalog from a JSON file holding an array of `{code, name}`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// contains an invalid code.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let entries: Vec<CityEntry> = serde_json::from_str(&raw)?;
        Ok(Self::from_entries(entries)?)
    }

    /// Returns `true` if the city is recognized.
    #[must_use]
    pub fn contains(&self, code: CityCode) -> bool {
        self.cities.contains_key(&code)
    }

    /// Returns the city name, if recognized.
    #[must_use]
    pub fn name(&self, code: CityCode) -> Option<&str> {
        self.cities.get(&code).map(String::as_str)
    }

    /// Returns the name to show for a city; unrecognized codes render as
    /// `"Plate {code}"`.
    #[must_use]
    pub fn display_name(&self, code: CityCode) -> String {
        self.name(code)
            .map_or_else(|| format!("Plate {code}"), str::to_string)
    }

    /// Returns all entries ordered by code.
    #[must_use]
    pub fn entries(&self) -> Vec<CityEntry> {
        self.cities
            .iter()
            .map(|(code, name)| CityEntry {
                code: code.to_string(),
                name: name.clone(),
            })
            .collect()
    }

    /// Number of recognized cities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cities.len()
    }

    /// Returns `true` if the catalog has no cities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn city(code: &str) -> CityCode {
        let Ok(c) = CityCode::parse(code) else {
            panic!("valid city code rejected");
        };
        c
    }

    #[test]
    fn builtin_has_istanbul() {
        let catalog = CityCatalog::builtin();
        assert_eq!(catalog.len(), BUILTIN_CITIES.len());
        assert_eq!(catalog.name(city("34")), Some("İstanbul"));
    }

    #[test]
    fn unknown_city_displays_plate() {
        let catalog = CityCatalog::builtin();
        assert!(!catalog.contains(city("99")));
        assert_eq!(catalog.display_name(city("99")), "Plate 99");
        assert_eq!(catalog.display_name(city("06")), "Ankara");
    }

    #[test]
    fn from_entries_rejects_bad_codes() {
        let result = CityCatalog::from_entries(vec![CityEntry {
            code: "1".to_string(),
            name: "Nowhere".to_string(),
        }]);
        assert!(matches!(result, Err(GatewayError::InvalidCityCode(_))));
    }

    #[test]
    fn from_entries_rejects_duplicates() {
        let entry = CityEntry {
            code: "07".to_string(),
            name: "Antalya".to_string(),
        };
        let result = CityCatalog::from_entries(vec![entry.clone(), entry]);
        assert!(result.is_err());
    }

    #[test]
    fn entries_are_sorted_by_code() {
        let catalog = CityCatalog::builtin();
        let entries = catalog.entries();
        let codes: Vec<&str> = entries.iter().map(|e| e.code.as_str()).collect();
        let mut sorted = codes.clone();
        sorted.sort_unstable();
        assert_eq!(codes, sorted);
    }

    #[test]
    fn load_reads_json_file() {
        let path = std::env::temp_dir().join(format!("cities-{}.json", uuid::Uuid::new_v4()));
        let written = std::fs::write(&path, r#"[{"code":"90","name":"Testville"}]"#);
        assert!(written.is_ok());

        let loaded = CityCatalog::load(&path);
        let _ = std::fs::remove_file(&path);
        let Ok(catalog) = loaded else {
            panic!("catalog load failed");
        };
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.name(city("90")), Some("Testville"));
    }
}
