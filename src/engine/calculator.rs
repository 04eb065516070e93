use crate::engine::factors::{default_subtype, FactorCatalog, DEFAULT_FLIGHT_SUBTYPE};
use crate::models::{ActivityKind, ActivityRecord, ColumnRole, EmissionLine};
use log::debug;

/// Keywords that promote a context string to a subtype hint, per kind. The
/// first context value containing any keyword becomes the hint.
const SUBTYPE_KEYWORDS: &[(ActivityKind, &[&str])] = &[
    (
        ActivityKind::Fuel,
        &["diesel", "gasoline", "petrol", "natural gas", "lpg", "propane"],
    ),
    (
        ActivityKind::Electricity,
        &[
            "uk", "us", "eu", "china", "india", "northeast", "northwest", "southeast",
            "southwest", "midwest",
        ],
    ),
    (ActivityKind::Transport, &["car", "bus", "train", "flight", "plane"]),
    (
        ActivityKind::Waste,
        &["landfill", "recycled", "composted", "incineration"],
    ),
    (ActivityKind::Water, &["supply", "treatment", "recycled"]),
    (ActivityKind::Refrigerant, &["r-", "hfc", "refrigerant"]),
];

/// Hardwired last-resort factors, mirroring the catalog defaults. Only
/// reachable with a catalog that skipped validation.
fn fallback_factor(kind: ActivityKind, flight: bool) -> f64 {
    if flight {
        return 0.16;
    }
    match kind {
        ActivityKind::Fuel => 2.68,
        ActivityKind::Electricity => 0.48,
        ActivityKind::Transport => 0.19,
        ActivityKind::Waste => 0.45,
        ActivityKind::Water => 0.34,
        ActivityKind::Refrigerant => 2088.0,
    }
}

/// Joins activity records against a read-only factor catalog.
pub struct EmissionsCalculator<'a> {
    catalog: &'a FactorCatalog,
}

impl<'a> EmissionsCalculator<'a> {
    pub fn new(catalog: &'a FactorCatalog) -> Self {
        Self { catalog }
    }

    /// Compute one emission line. Infallible: a missing subtype falls back
    /// to the kind default, and the catalog guarantees positive factors.
    pub fn calculate(&self, record: &ActivityRecord) -> EmissionLine {
        let flight = record.kind == ActivityKind::Transport && self.is_flight(record);
        let hint = self.subtype_hint(record);
        let (subtype, factor) = self.resolve_factor(record.kind, hint.as_deref(), flight);

        let (emissions, trace) = self.compute(record, &subtype, factor);
        debug!(
            "row {}: {} {} -> {:.2} kg CO2e via {}",
            record.row_index, record.amount, record.kind, emissions, subtype
        );

        EmissionLine {
            scope: record.scope,
            kind: record.kind,
            description: self.description(record),
            amount: record.amount,
            unit: record.unit.clone(),
            subtype,
            emission_factor: factor,
            emissions,
            trace,
            date: record
                .first_context_value(ColumnRole::Date)
                .map(|cell| cell.display()),
            row_index: record.row_index,
        }
    }

    /// First context string containing one of the kind's keywords.
    fn subtype_hint(&self, record: &ActivityRecord) -> Option<String> {
        let keywords = SUBTYPE_KEYWORDS
            .iter()
            .find(|(kind, _)| *kind == record.kind)
            .map(|(_, kws)| *kws)?;
        record
            .subtype_candidates()
            .find(|candidate| {
                let lowered = candidate.to_lowercase();
                keywords.iter().any(|kw| lowered.contains(kw))
            })
            .map(|s| s.to_string())
    }

    fn is_flight(&self, record: &ActivityRecord) -> bool {
        record
            .category
            .as_deref()
            .map(|text| text.contains("flight") || text.contains("plane") || text.contains("air"))
            .unwrap_or(false)
    }

    /// Resolve hint -> catalog key through [`FactorCatalog::resolve`]. For
    /// transport the flight branch restricts the candidate keys so a flown
    /// kilometre never picks up a road factor, and vice versa.
    fn resolve_factor(
        &self,
        kind: ActivityKind,
        hint: Option<&str>,
        flight: bool,
    ) -> (String, f64) {
        if let Some(hint) = hint {
            let resolved = if kind == ActivityKind::Transport {
                self.catalog.resolve_where(kind, hint, |name| {
                    name.to_lowercase().contains("flight") == flight
                })
            } else {
                self.catalog.resolve(kind, hint)
            };
            if let Some((name, factor)) = resolved {
                return (name, factor);
            }
        }

        let default = if flight {
            DEFAULT_FLIGHT_SUBTYPE
        } else {
            default_subtype(kind)
        };
        let factor = self
            .catalog
            .get(kind, default)
            .unwrap_or_else(|| fallback_factor(kind, flight));
        (default.to_string(), factor)
    }

    /// Emission formula plus the calculation trace.
    ///
    /// All kinds report kg CO2e. Refrigerant factors are GWPs: the
    /// conventional figure is `amount_kg x GWP / 1000` tonnes CO2e, which the
    /// trace keeps visible; the stored value is normalized back to kg so
    /// every line shares one unit.
    fn compute(&self, record: &ActivityRecord, subtype: &str, factor: f64) -> (f64, String) {
        let amount = record.amount;
        match record.kind {
            ActivityKind::Refrigerant => {
                let tonnes = amount * factor / 1000.0;
                let emissions = tonnes * 1000.0;
                let trace = format!(
                    "{} kg × {} (GWP for {}) ÷ 1000 = {:.2} t CO2e",
                    amount, factor, subtype, tonnes
                );
                (emissions, trace)
            }
            kind => {
                let emissions = amount * factor;
                let unit_label = match kind {
                    ActivityKind::Electricity => " kWh",
                    ActivityKind::Transport => " km",
                    ActivityKind::Waste => " kg",
                    ActivityKind::Water => " m³",
                    _ => "",
                };
                let trace = format!(
                    "{}{} × {} (emission factor for {}) = {:.2} kg CO2e",
                    amount, unit_label, factor, subtype, emissions
                );
                (emissions, trace)
            }
        }
    }

    fn description(&self, record: &ActivityRecord) -> Option<String> {
        record
            .first_context_value(ColumnRole::Notes)
            .map(|cell| cell.display())
            .or_else(|| record.category.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CellValue, ContextEntry};
    use std::collections::BTreeMap;

    fn record(kind: ActivityKind, amount: f64, category: Option<&str>) -> ActivityRecord {
        ActivityRecord {
            kind,
            scope: kind.default_scope(),
            amount,
            unit: None,
            category: category.map(|s| s.to_lowercase()),
            context: Vec::new(),
            source_row: BTreeMap::new(),
            row_index: 0,
        }
    }

    fn context(column: &str, role: ColumnRole, value: &str) -> ContextEntry {
        ContextEntry {
            column: column.to_string(),
            role,
            value: CellValue::Text(value.to_string()),
        }
    }

    #[test]
    fn test_fuel_subtype_from_category() {
        let catalog = FactorCatalog::default();
        let calc = EmissionsCalculator::new(&catalog);
        let line = calc.calculate(&record(ActivityKind::Fuel, 450.0, Some("Diesel Fuel")));
        assert_eq!(line.subtype, "Diesel");
        assert_eq!(line.emission_factor, 2.68);
        assert!((line.emissions - 1206.0).abs() < 1e-6);
        assert!(line.trace.contains("450"));
        assert!(line.trace.contains("2.68"));
        assert!(line.trace.contains("Diesel"));
        assert!(line.trace.contains("1206.00"));
    }

    #[test]
    fn test_fuel_defaults_to_diesel() {
        let catalog = FactorCatalog::default();
        let calc = EmissionsCalculator::new(&catalog);
        let line = calc.calculate(&record(ActivityKind::Fuel, 10.0, Some("fleet fill-up")));
        assert_eq!(line.subtype, "Diesel");
    }

    #[test]
    fn test_electricity_region_from_context() {
        let catalog = FactorCatalog::default();
        let calc = EmissionsCalculator::new(&catalog);
        let mut rec = record(ActivityKind::Electricity, 1000.0, Some("electricity"));
        rec.context
            .push(context("Location", ColumnRole::Location, "UK headquarters"));
        let line = calc.calculate(&rec);
        assert_eq!(line.subtype, "UK");
        assert!((line.emissions - 190.0).abs() < 1e-6);
    }

    #[test]
    fn test_electricity_defaults_to_global_average() {
        let catalog = FactorCatalog::default();
        let calc = EmissionsCalculator::new(&catalog);
        let line = calc.calculate(&record(ActivityKind::Electricity, 10500.0, Some("electricity")));
        assert_eq!(line.subtype, "Global Average");
        assert_eq!(line.emission_factor, 0.48);
        assert!((line.emissions - 5040.0).abs() < 1e-6);
    }

    #[test]
    fn test_flight_category_takes_flight_factors() {
        let catalog = FactorCatalog::default();
        let calc = EmissionsCalculator::new(&catalog);
        let line = calc.calculate(&record(
            ActivityKind::Transport,
            3500.0,
            Some("Business Flight (Long-haul International)"),
        ));
        assert_eq!(line.subtype, "Flight (Long-haul)");
        assert_eq!(line.emission_factor, 0.15);
        assert!((line.emissions - 525.0).abs() < 1e-6);
    }

    #[test]
    fn test_unhinted_flight_falls_back_to_short_haul() {
        let catalog = FactorCatalog::default();
        let calc = EmissionsCalculator::new(&catalog);
        let line = calc.calculate(&record(ActivityKind::Transport, 100.0, Some("air travel")));
        assert_eq!(line.subtype, "Flight (Short-haul)");
        assert_eq!(line.emission_factor, 0.16);
    }

    #[test]
    fn test_ground_transport_never_picks_flight_factor() {
        let catalog = FactorCatalog::default();
        let calc = EmissionsCalculator::new(&catalog);
        let line = calc.calculate(&record(ActivityKind::Transport, 850.0, Some("company car travel")));
        assert_eq!(line.subtype, "Car (Petrol/Gasoline)");
        assert!((line.emissions - 161.5).abs() < 1e-6);
    }

    #[test]
    fn test_car_diesel_resolves_exactly() {
        let catalog = FactorCatalog::default();
        let calc = EmissionsCalculator::new(&catalog);
        let line = calc.calculate(&record(ActivityKind::Transport, 100.0, Some("Car (Diesel)")));
        assert_eq!(line.subtype, "Car (Diesel)");
        assert_eq!(line.emission_factor, 0.17);
    }

    #[test]
    fn test_refrigerant_gwp_scaling() {
        let catalog = FactorCatalog::default();
        let calc = EmissionsCalculator::new(&catalog);
        let line = calc.calculate(&record(
            ActivityKind::Refrigerant,
            2.5,
            Some("Refrigerant R-410A"),
        ));
        assert_eq!(line.subtype, "R-410A");
        assert_eq!(line.emission_factor, 2088.0);
        // Stored in kg; the trace keeps the conventional tonnes figure.
        assert!((line.emissions - 5220.0).abs() < 1e-6);
        assert!(line.trace.contains("2088"));
        assert!(line.trace.contains("5.22"));
        assert!(line.trace.contains("R-410A"));
    }

    #[test]
    fn test_one_kg_of_r134a() {
        let catalog = FactorCatalog::default();
        let calc = EmissionsCalculator::new(&catalog);
        let line = calc.calculate(&record(ActivityKind::Refrigerant, 1.0, Some("R-134a leak")));
        assert_eq!(line.subtype, "R-134a");
        assert!((line.emissions - 1430.0).abs() < 1e-6);
        assert!(line.trace.contains("1.43"));
    }

    #[test]
    fn test_waste_and_water_subtypes() {
        let catalog = FactorCatalog::default();
        let calc = EmissionsCalculator::new(&catalog);

        let line = calc.calculate(&record(ActivityKind::Waste, 120.0, Some("Recycled Paper")));
        assert_eq!(line.subtype, "Recycled Paper");
        assert!((line.emissions - 2.4).abs() < 1e-6);

        let line = calc.calculate(&record(ActivityKind::Water, 85.0, Some("Water Supply")));
        assert_eq!(line.subtype, "Supply");
        assert!((line.emissions - 28.9).abs() < 1e-6);
    }

    #[test]
    fn test_description_prefers_notes_over_category() {
        let catalog = FactorCatalog::default();
        let calc = EmissionsCalculator::new(&catalog);
        let mut rec = record(ActivityKind::Water, 1.0, Some("water supply"));
        rec.context
            .push(context("Notes", ColumnRole::Notes, "Municipal meter reading"));
        let line = calc.calculate(&rec);
        assert_eq!(line.description.as_deref(), Some("Municipal meter reading"));
    }

    #[test]
    fn test_negative_amounts_pass_through() {
        let catalog = FactorCatalog::default();
        let calc = EmissionsCalculator::new(&catalog);
        let line = calc.calculate(&record(ActivityKind::Waste, -10.0, Some("landfill waste")));
        assert!((line.emissions + 4.5).abs() < 1e-6);
    }
}
