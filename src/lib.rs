pub mod engine;
pub mod error;
pub mod import;
pub mod models;
pub mod pipeline;
pub mod snapshot;
pub mod template;

pub use engine::{aggregate, default_subtype, EmissionsCalculator, FactorCatalog};
pub use error::IngestError;
pub use import::{
    classify_columns, detect_unit, map_rows, read_workbook, ColumnAnalysis, ColumnAnalyzer,
    OpenAiColumnAnalyzer,
};
pub use models::{
    ActivityKind, ActivityRecord, CellValue, ColumnMapping, ColumnRole, ContextEntry,
    EmissionLine, EmissionReport, IngestionDiagnostics, InputTable, Scope,
};
pub use pipeline::{ingest, IngestionOptions};
pub use snapshot::CalculationSnapshot;
pub use template::sample_template_csv;
