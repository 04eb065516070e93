use crate::models::{EmissionLine, EmissionReport, IngestionDiagnostics, Scope};
use std::collections::BTreeMap;

/// Roll an ordered stream of emission lines up into a report. Pure fold:
/// equal input yields equal output, and the line order is preserved.
pub fn aggregate(lines: Vec<EmissionLine>, diagnostics: IngestionDiagnostics) -> EmissionReport {
    let mut by_scope: BTreeMap<String, f64> = BTreeMap::new();
    let mut scope_breakdown: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
    for scope in Scope::ALL {
        by_scope.insert(scope.label().to_string(), 0.0);
        scope_breakdown.insert(scope.label().to_string(), BTreeMap::new());
    }

    let mut by_category: BTreeMap<String, f64> = BTreeMap::new();
    let mut total = 0.0;

    for line in &lines {
        let scope_key = line.scope.label().to_string();
        let kind_key = line.kind.name().to_string();

        *by_scope.entry(scope_key.clone()).or_insert(0.0) += line.emissions;
        *scope_breakdown
            .entry(scope_key)
            .or_default()
            .entry(kind_key.clone())
            .or_insert(0.0) += line.emissions;
        *by_category.entry(kind_key).or_insert(0.0) += line.emissions;
        total += line.emissions;
    }

    EmissionReport {
        total_emissions: total,
        by_scope,
        by_category,
        scope_breakdown,
        line_items: lines,
        diagnostics,
    }
}
