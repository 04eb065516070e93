use crate::error::IngestError;
use crate::models::ActivityKind;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;

/// Lowercased alphanumeric tokens of a subtype string or hint. Punctuation
/// and whitespace both separate, so "Flight (Long-haul)" becomes
/// ["flight", "long", "haul"].
fn subtype_tokens(s: &str) -> Vec<String> {
    s.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_string())
        .collect()
}

/// Whether `needle` appears as a contiguous run inside `haystack`.
fn is_contiguous_run(needle: &[String], haystack: &[String]) -> bool {
    if needle.is_empty() || needle.len() > haystack.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|window| window == needle)
}

/// Subtype used when a record carries no usable hint for its kind.
pub fn default_subtype(kind: ActivityKind) -> &'static str {
    match kind {
        ActivityKind::Fuel => "Diesel",
        ActivityKind::Electricity => "Global Average",
        ActivityKind::Transport => "Car (Petrol/Gasoline)",
        ActivityKind::Waste => "Landfill (Mixed)",
        ActivityKind::Water => "Supply",
        ActivityKind::Refrigerant => "R-410A",
    }
}

/// Fallback flight subtype when the category marks a flight but no haul
/// length resolves.
pub const DEFAULT_FLIGHT_SUBTYPE: &str = "Flight (Short-haul)";

/// Emission factors by kind and subtype. Entry order within a kind is the
/// resolution order, so the table declaration doubles as lookup priority.
/// Refrigerant entries hold GWP values rather than direct factors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorCatalog {
    factors: BTreeMap<ActivityKind, Vec<(String, f64)>>,
}

impl Default for FactorCatalog {
    fn default() -> Self {
        let mut catalog = Self {
            factors: BTreeMap::new(),
        };

        // kg CO2e per litre (natural gas per m3).
        catalog.add_many(
            ActivityKind::Fuel,
            &[
                ("Petrol/Gasoline", 2.31),
                ("Diesel", 2.68),
                ("LPG/Propane", 1.51),
                ("Natural Gas", 2.02),
                ("Biodiesel", 1.79),
                ("E85 (Ethanol)", 1.56),
            ],
        );

        // kg CO2e per kWh; country averages first, then US grid regions.
        catalog.add_many(
            ActivityKind::Electricity,
            &[
                ("UK", 0.19),
                ("EU Average", 0.23),
                ("US Average", 0.38),
                ("China", 0.55),
                ("India", 0.71),
                ("Global Average", 0.48),
                ("Northeast", 0.35),
                ("Southeast", 0.42),
                ("Midwest", 0.53),
                ("Southwest", 0.38),
                ("Northwest", 0.22),
            ],
        );

        // kg CO2e per km.
        catalog.add_many(
            ActivityKind::Transport,
            &[
                ("Car (Petrol/Gasoline)", 0.19),
                ("Car (Diesel)", 0.17),
                ("Car (Hybrid)", 0.11),
                ("Car (Electric)", 0.05),
                ("Bus", 0.10),
                ("Train", 0.04),
                ("Flight (Short-haul)", 0.16),
                ("Flight (Medium-haul)", 0.14),
                ("Flight (Long-haul)", 0.15),
            ],
        );

        // kg CO2e per kg.
        catalog.add_many(
            ActivityKind::Waste,
            &[
                ("Landfill (Mixed)", 0.45),
                ("Recycled Paper", 0.02),
                ("Recycled Plastic", 0.04),
                ("Recycled Glass", 0.01),
                ("Recycled Metal", 0.02),
                ("Composted", 0.01),
                ("Incineration", 0.22),
            ],
        );

        // kg CO2e per m3.
        catalog.add_many(
            ActivityKind::Water,
            &[("Supply", 0.34), ("Treatment", 0.71), ("Recycled", 0.05)],
        );

        // GWP, dimensionless.
        catalog.add_many(
            ActivityKind::Refrigerant,
            &[
                ("R-410A", 2088.0),
                ("R-22", 1810.0),
                ("R-134a", 1430.0),
                ("R-404A", 3922.0),
                ("R-407C", 1774.0),
                ("R-32", 675.0),
            ],
        );

        catalog
    }
}

impl FactorCatalog {
    pub fn empty() -> Self {
        Self {
            factors: BTreeMap::new(),
        }
    }

    fn add_many(&mut self, kind: ActivityKind, entries: &[(&str, f64)]) {
        for (subtype, factor) in entries {
            self.insert(kind, subtype, *factor);
        }
    }

    /// Insert or replace one factor. Replacement keeps the original position
    /// so resolution priority stays stable.
    pub fn insert(&mut self, kind: ActivityKind, subtype: &str, factor: f64) {
        let entries = self.factors.entry(kind).or_default();
        match entries.iter_mut().find(|(name, _)| name == subtype) {
            Some(entry) => entry.1 = factor,
            None => entries.push((subtype.to_string(), factor)),
        }
    }

    pub fn get(&self, kind: ActivityKind, subtype: &str) -> Option<f64> {
        self.factors
            .get(&kind)?
            .iter()
            .find(|(name, _)| name == subtype)
            .map(|(_, factor)| *factor)
    }

    /// Subtypes of one kind in resolution order.
    pub fn subtypes(&self, kind: ActivityKind) -> impl Iterator<Item = (&str, f64)> {
        self.factors
            .get(&kind)
            .into_iter()
            .flat_map(|entries| entries.iter().map(|(name, factor)| (name.as_str(), *factor)))
    }

    /// Resolve a free-text hint to a catalog key; the first entry in
    /// resolution order wins. `None` means the caller should fall back to
    /// the kind default.
    ///
    /// Matching is token-based rather than raw substring containment: both
    /// sides are lowercased and split on punctuation, and a hit requires one
    /// side's tokens to appear as a contiguous run in the other's. That way
    /// "Business Flight (Long-haul International)" still resolves to
    /// "Flight (Long-haul)" even though the parenthesized key is not a
    /// byte-contiguous substring of the hint.
    pub fn resolve(&self, kind: ActivityKind, hint: &str) -> Option<(String, f64)> {
        self.resolve_where(kind, hint, |_| true)
    }

    /// [`resolve`](Self::resolve) restricted to subtype keys the predicate
    /// accepts, e.g. only flight factors for a flown distance.
    pub fn resolve_where<F>(&self, kind: ActivityKind, hint: &str, accept: F) -> Option<(String, f64)>
    where
        F: Fn(&str) -> bool,
    {
        let hint_tokens = subtype_tokens(hint);
        if hint_tokens.is_empty() {
            return None;
        }
        self.subtypes(kind)
            .filter(|(name, _)| accept(name))
            .find(|(name, _)| {
                let key_tokens = subtype_tokens(name);
                is_contiguous_run(&key_tokens, &hint_tokens)
                    || is_contiguous_run(&hint_tokens, &key_tokens)
            })
            .map(|(name, factor)| (name.to_string(), factor))
    }

    /// Load `kind,subtype,factor` rows. Unknown kinds and malformed factors
    /// are skipped with a warning; the parsed rows replace or extend the
    /// current table.
    pub fn load_csv<R: Read>(&mut self, reader: R) -> Result<usize, IngestError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);
        let mut loaded = 0usize;
        for record in csv_reader.records() {
            let record = record?;
            if record.len() < 3 {
                continue;
            }
            let kind = match ActivityKind::ALL
                .iter()
                .find(|k| k.name().eq_ignore_ascii_case(record[0].trim()))
            {
                Some(kind) => *kind,
                None => {
                    warn!("skipping factor row with unknown kind '{}'", &record[0]);
                    continue;
                }
            };
            let subtype = record[1].trim();
            let factor = match record[2].trim().parse::<f64>() {
                Ok(f) if f.is_finite() && f > 0.0 => f,
                _ => {
                    warn!(
                        "skipping factor row '{}/{}' with unusable value '{}'",
                        kind, subtype, &record[2]
                    );
                    continue;
                }
            };
            if subtype.is_empty() {
                continue;
            }
            self.insert(kind, subtype, factor);
            loaded += 1;
        }
        info!("loaded {} emission factors from CSV", loaded);
        Ok(loaded)
    }

    pub fn from_csv<R: Read>(reader: R) -> Result<Self, IngestError> {
        let mut catalog = Self::empty();
        catalog.load_csv(reader)?;
        Ok(catalog)
    }

    /// Configuration check run before any row is ingested: every kind's
    /// default subtype must exist and all factors must be strictly positive.
    pub fn validate(&self) -> Result<(), IngestError> {
        for kind in ActivityKind::ALL {
            let default = default_subtype(kind);
            if self.get(kind, default).is_none() {
                return Err(IngestError::FactorMissing {
                    kind,
                    subtype: default.to_string(),
                });
            }
        }
        if self.get(ActivityKind::Transport, DEFAULT_FLIGHT_SUBTYPE).is_none() {
            return Err(IngestError::FactorMissing {
                kind: ActivityKind::Transport,
                subtype: DEFAULT_FLIGHT_SUBTYPE.to_string(),
            });
        }
        for (kind, entries) in &self.factors {
            for (subtype, factor) in entries {
                if !(factor.is_finite() && *factor > 0.0) {
                    return Err(IngestError::FactorNotPositive {
                        kind: *kind,
                        subtype: subtype.clone(),
                        value: *factor,
                    });
                }
            }
        }
        Ok(())
    }
}
