use crate::models::{ColumnMapping, EmissionReport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use uuid::Uuid;

/// One saved calculation in the shape the outer application persists:
/// numeric scope totals plus a JSON blob carrying the union of inputs and
/// derived results. The core only builds the value; storing it is the
/// persistence collaborator's job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculationSnapshot {
    pub id: Uuid,
    pub organization_name: Option<String>,
    pub report_year: Option<i32>,
    pub time_period: String,
    pub calculation_method: String,
    pub input_data: serde_json::Value,
    pub scope1_emissions: f64,
    pub scope2_emissions: f64,
    pub scope3_emissions: f64,
    pub total_emissions: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CalculationSnapshot {
    pub fn from_report(
        report: &EmissionReport,
        column_mappings: &BTreeMap<String, ColumnMapping>,
        organization_name: Option<String>,
        report_year: Option<i32>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            organization_name,
            report_year,
            time_period: "Annually".to_string(),
            calculation_method: "Imported spreadsheet data".to_string(),
            input_data: json!({
                "column_mappings": column_mappings,
                "by_scope": report.by_scope,
                "by_category": report.by_category,
                "scope_breakdown": report.scope_breakdown,
                "line_items": report.line_items,
                "diagnostics": report.diagnostics,
            }),
            scope1_emissions: report.by_scope.get("Scope 1").copied().unwrap_or(0.0),
            scope2_emissions: report.by_scope.get("Scope 2").copied().unwrap_or(0.0),
            scope3_emissions: report.by_scope.get("Scope 3").copied().unwrap_or(0.0),
            total_emissions: report.total_emissions,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IngestionDiagnostics;

    #[test]
    fn test_snapshot_carries_scope_totals() {
        let mut report = EmissionReport::empty(IngestionDiagnostics::default());
        report.by_scope.insert("Scope 1".to_string(), 100.0);
        report.by_scope.insert("Scope 2".to_string(), 200.0);
        report.total_emissions = 300.0;

        let snapshot =
            CalculationSnapshot::from_report(&report, &BTreeMap::new(), Some("Acme".into()), Some(2024));
        assert_eq!(snapshot.scope1_emissions, 100.0);
        assert_eq!(snapshot.scope2_emissions, 200.0);
        assert_eq!(snapshot.scope3_emissions, 0.0);
        assert_eq!(snapshot.total_emissions, 300.0);
        assert_eq!(snapshot.organization_name.as_deref(), Some("Acme"));
        assert!(snapshot.input_data.get("by_scope").is_some());
        assert!(snapshot.input_data.get("line_items").is_some());
    }

    #[test]
    fn test_touch_moves_updated_at_forward() {
        let report = EmissionReport::empty(IngestionDiagnostics::default());
        let mut snapshot = CalculationSnapshot::from_report(&report, &BTreeMap::new(), None, None);
        let before = snapshot.updated_at;
        snapshot.touch();
        assert!(snapshot.updated_at >= before);
    }
}
