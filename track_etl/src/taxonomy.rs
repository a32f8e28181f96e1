//! Species label remediation and canonical naming.
//!
//! Both operations are driven by [`TaxonomyRules`], which is plain
//! configuration data and can be replaced from a JSON config file.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::record::EnrichedFix;

/// Fill label for a dataset that is known to omit species values.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SpeciesFill {
    pub dataset: String,
    pub species: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TaxonomyRules {
    pub species_fills: Vec<SpeciesFill>,
    /// Scientific name to display name. Names not listed pass through.
    pub canonical_names: BTreeMap<String, String>,
}

const DEFAULT_SPECIES_FILLS: &[(&str, &str)] = &[(
    "Baffin Bay narwhal- 2009 to 2012 Argos data- Fisheries and Oceans Canada",
    "Narwhal",
)];

const DEFAULT_CANONICAL_NAMES: &[(&str, &str)] = &[
    ("Balaenoptera musculus", "Blue whale"),
    ("Balaenoptera physalus", "Fin whale"),
    ("Balaenoptera borealis", "Sei whale"),
    ("Narwhal", "Narwhal"),
    ("Monodon monoceros", "Narwhal"),
    ("Balaenoptera", "Balaenopterid whale (unspecified)"),
    ("Balaena mysticetus", "Bowhead whale"),
    ("Pseudorca crassidens", "False killer whale"),
    ("Megaptera novaeangliae", "Humpback whale"),
    ("Globicephala macrorhynchus", "Short-finned pilot whale"),
    ("Globicephala", "Pilot whale (unspecified)"),
    ("Physeter macrocephalus", "Sperm whale"),
    ("Rhincodon typus", "Whale shark"),
];

impl Default for TaxonomyRules {
    fn default() -> Self {
        Self {
            species_fills: DEFAULT_SPECIES_FILLS
                .iter()
                .map(|(dataset, species)| SpeciesFill {
                    dataset: dataset.to_string(),
                    species: species.to_string(),
                })
                .collect(),
            canonical_names: DEFAULT_CANONICAL_NAMES
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TaxonomySummary {
    pub filled: usize,
    pub renamed: usize,
}

impl TaxonomyRules {
    pub fn fill_for(&self, dataset: &str) -> Option<&str> {
        self.species_fills
            .iter()
            .find(|rule| rule.dataset == dataset)
            .map(|rule| rule.species.as_str())
    }

    pub fn canonical_name<'a>(&'a self, species: &'a str) -> &'a str {
        self.canonical_names
            .get(species)
            .map(String::as_str)
            .unwrap_or(species)
    }

    /// Fills missing species for `dataset` (if a rule names it), then maps
    /// every species to its canonical name in a single lookup.
    pub fn apply(&self, dataset: &str, mut fixes: Vec<EnrichedFix>) -> (Vec<EnrichedFix>, TaxonomySummary) {
        let fill = self.fill_for(dataset);
        let mut summary = TaxonomySummary::default();
        for e in &mut fixes {
            let species = &mut e.fix.species;
            if species.as_deref().map_or(true, |s| s.trim().is_empty()) {
                if let Some(label) = fill {
                    *species = Some(label.to_string());
                    summary.filled += 1;
                }
            }
            if let Some(name) = species.as_mut() {
                if let Some(canonical) = self.canonical_names.get(name.as_str()) {
                    if canonical.as_str() != name.as_str() {
                        *name = canonical.clone();
                        summary.renamed += 1;
                    }
                }
            }
        }
        (fixes, summary)
    }
}
