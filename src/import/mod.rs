pub mod classify;
pub mod llm;
pub mod mapper;
pub mod reader;

pub use classify::{classify_columns, detect_unit};
pub use llm::{ColumnAnalysis, ColumnAnalyzer, OpenAiColumnAnalyzer};
pub use mapper::map_rows;
pub use reader::read_workbook;
