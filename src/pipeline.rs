use crate::engine::{aggregate, EmissionsCalculator, FactorCatalog};
use crate::error::IngestError;
use crate::import::{classify_columns, map_rows, read_workbook, ColumnAnalyzer, OpenAiColumnAnalyzer};
use crate::models::{ColumnRole, EmissionReport, IngestionDiagnostics};
use log::{info, warn};
use std::fmt;

/// Caller-supplied configuration for one ingestion. The pipeline itself is
/// stateless; everything it needs arrives here.
pub struct IngestionOptions {
    /// Consult a column analyzer for columns local rules cannot place.
    pub use_llm: bool,
    /// Substitute factor catalog; `None` uses the built-in defaults.
    pub factor_catalog: Option<FactorCatalog>,
    /// Preferred worksheet name for workbook inputs.
    pub sheet_hint: Option<String>,
    /// Explicit analyzer implementation. When `use_llm` is set and this is
    /// `None`, an environment-gated adapter is constructed instead.
    pub column_analyzer: Option<Box<dyn ColumnAnalyzer>>,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            use_llm: false,
            factor_catalog: None,
            sheet_hint: None,
            column_analyzer: None,
        }
    }
}

impl fmt::Debug for IngestionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionOptions")
            .field("use_llm", &self.use_llm)
            .field("factor_catalog_set", &self.factor_catalog.is_some())
            .field("sheet_hint", &self.sheet_hint)
            .field("column_analyzer_set", &self.column_analyzer.is_some())
            .finish()
    }
}

/// Run the full pipeline on one spreadsheet buffer: read, classify columns,
/// map rows, compute per-line emissions, aggregate.
///
/// Classification and mapping ambiguities never abort an ingestion; rows
/// degrade or drop and the report's diagnostics say so. Only an unreadable
/// buffer and a misconfigured factor catalog are terminal.
pub fn ingest(buffer: &[u8], options: &IngestionOptions) -> Result<EmissionReport, IngestError> {
    let default_catalog;
    let catalog = match &options.factor_catalog {
        Some(catalog) => catalog,
        None => {
            default_catalog = FactorCatalog::default();
            &default_catalog
        }
    };
    catalog.validate()?;

    let table = read_workbook(buffer, options.sheet_hint.as_deref())?;

    let env_analyzer;
    let analyzer: Option<&dyn ColumnAnalyzer> = if options.use_llm {
        match &options.column_analyzer {
            Some(boxed) => Some(boxed.as_ref()),
            None => {
                env_analyzer = OpenAiColumnAnalyzer::from_env();
                if env_analyzer.is_none() {
                    info!("no analyzer credential in environment, using local rules only");
                }
                env_analyzer.as_ref().map(|a| a as &dyn ColumnAnalyzer)
            }
        }
    } else {
        None
    };

    let mappings = classify_columns(&table, analyzer);

    let mut diagnostics = IngestionDiagnostics {
        rows_total: table.rows.len(),
        ..Default::default()
    };
    for name in &table.columns {
        if mappings
            .get(name)
            .map(|m| m.role == ColumnRole::Unknown)
            .unwrap_or(true)
        {
            diagnostics.unrecognized_columns.push(name.clone());
        }
    }

    let nothing_recognized = table.columns.iter().all(|name| {
        mappings
            .get(name)
            .map(|m| matches!(m.role, ColumnRole::Unknown | ColumnRole::Ignore))
            .unwrap_or(true)
    });
    let has_amount = mappings.values().any(|m| m.role == ColumnRole::Amount);
    if nothing_recognized && !has_amount {
        warn!("no column could be classified; returning empty report");
        diagnostics.warnings.push(format!(
            "no usable columns recognized; unrecognized: {}",
            diagnostics.unrecognized_columns.join(", ")
        ));
        return Ok(EmissionReport::empty(diagnostics));
    }

    let records = map_rows(&table, &mappings);
    diagnostics.rows_mapped = records.len();
    diagnostics.rows_dropped = diagnostics.rows_total - records.len();

    let calculator = EmissionsCalculator::new(catalog);
    let lines = records
        .iter()
        .map(|record| calculator.calculate(record))
        .collect::<Vec<_>>();

    let report = aggregate(lines, diagnostics);
    info!(
        "ingestion complete: {} lines, {:.2} kg CO2e total",
        report.line_items.len(),
        report.total_emissions
    );
    Ok(report)
}
