use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ======================================================================
// SCOPES AND ACTIVITY KINDS
// ======================================================================

/// GHG Protocol scope. Every emission line belongs to exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Scope {
    One,
    Two,
    Three,
}

impl Scope {
    pub fn number(&self) -> u8 {
        match self {
            Scope::One => 1,
            Scope::Two => 2,
            Scope::Three => 3,
        }
    }

    pub fn from_number(n: u8) -> Option<Scope> {
        match n {
            1 => Some(Scope::One),
            2 => Some(Scope::Two),
            3 => Some(Scope::Three),
            _ => None,
        }
    }

    /// The key downstream consumers use in scope maps.
    pub fn label(&self) -> &'static str {
        match self {
            Scope::One => "Scope 1",
            Scope::Two => "Scope 2",
            Scope::Three => "Scope 3",
        }
    }

    pub const ALL: [Scope; 3] = [Scope::One, Scope::Two, Scope::Three];
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Canonical emission-producing activity categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Fuel,
    Electricity,
    Transport,
    Waste,
    Water,
    Refrigerant,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 6] = [
        ActivityKind::Fuel,
        ActivityKind::Electricity,
        ActivityKind::Transport,
        ActivityKind::Waste,
        ActivityKind::Water,
        ActivityKind::Refrigerant,
    ];

    /// Scope assigned when no explicit scope signal is present in the data.
    pub fn default_scope(&self) -> Scope {
        match self {
            ActivityKind::Fuel | ActivityKind::Refrigerant => Scope::One,
            ActivityKind::Electricity => Scope::Two,
            ActivityKind::Transport | ActivityKind::Waste | ActivityKind::Water => Scope::Three,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ActivityKind::Fuel => "fuel",
            ActivityKind::Electricity => "electricity",
            ActivityKind::Transport => "transport",
            ActivityKind::Waste => "waste",
            ActivityKind::Water => "water",
            ActivityKind::Refrigerant => "refrigerant",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ======================================================================
// COLUMN ROLES
// ======================================================================

/// Semantic role of one spreadsheet column. Closed vocabulary; every column
/// gets exactly one role, falling back to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnRole {
    Fuel,
    Electricity,
    Transport,
    Waste,
    Water,
    Refrigerant,
    Amount,
    Unit,
    Date,
    Category,
    Location,
    Notes,
    Ignore,
    Unknown,
}

impl ColumnRole {
    /// Defensive parse used for externally supplied classifications.
    pub fn parse(s: &str) -> Option<ColumnRole> {
        match s.trim().to_lowercase().as_str() {
            "fuel" => Some(ColumnRole::Fuel),
            "electricity" => Some(ColumnRole::Electricity),
            "transport" => Some(ColumnRole::Transport),
            "waste" => Some(ColumnRole::Waste),
            "water" => Some(ColumnRole::Water),
            "refrigerant" => Some(ColumnRole::Refrigerant),
            "amount" => Some(ColumnRole::Amount),
            "unit" => Some(ColumnRole::Unit),
            "date" => Some(ColumnRole::Date),
            "category" => Some(ColumnRole::Category),
            "location" => Some(ColumnRole::Location),
            "notes" => Some(ColumnRole::Notes),
            "ignore" => Some(ColumnRole::Ignore),
            "unknown" => Some(ColumnRole::Unknown),
            _ => None,
        }
    }

    /// Roles naming an activity kind map directly onto it.
    pub fn as_activity_kind(&self) -> Option<ActivityKind> {
        match self {
            ColumnRole::Fuel => Some(ActivityKind::Fuel),
            ColumnRole::Electricity => Some(ActivityKind::Electricity),
            ColumnRole::Transport => Some(ActivityKind::Transport),
            ColumnRole::Waste => Some(ActivityKind::Waste),
            ColumnRole::Water => Some(ActivityKind::Water),
            ColumnRole::Refrigerant => Some(ActivityKind::Refrigerant),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ColumnRole::Fuel => "fuel",
            ColumnRole::Electricity => "electricity",
            ColumnRole::Transport => "transport",
            ColumnRole::Waste => "waste",
            ColumnRole::Water => "water",
            ColumnRole::Refrigerant => "refrigerant",
            ColumnRole::Amount => "amount",
            ColumnRole::Unit => "unit",
            ColumnRole::Date => "date",
            ColumnRole::Category => "category",
            ColumnRole::Location => "location",
            ColumnRole::Notes => "notes",
            ColumnRole::Ignore => "ignore",
            ColumnRole::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ======================================================================
// CELLS AND TABLES
// ======================================================================

/// One normalized spreadsheet cell. Empty strings, NaN and parse errors all
/// collapse to `Empty` at read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Empty,
    Number(f64),
    Bool(bool),
    Date(NaiveDateTime),
    Text(String),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Explicit numeric coercion. Text cells are parsed rather than
    /// duck-typed; anything that fails to parse is simply not an amount.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) if n.is_finite() => Some(*n),
            CellValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Human-readable form used for samples, traces and context values.
    pub fn display(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Number(n) => format!("{}", n),
            CellValue::Bool(b) => format!("{}", b),
            CellValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            CellValue::Text(s) => s.clone(),
        }
    }
}

/// Raw workbook materialization: ordered columns, rows of cells indexed in
/// column order. Immutable once read.
#[derive(Debug, Clone, Serialize)]
pub struct InputTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl InputTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY)
    }

    /// All cells of one column, top to bottom.
    pub fn column_cells(&self, col: usize) -> impl Iterator<Item = &CellValue> {
        self.rows.iter().filter_map(move |r| r.get(col))
    }

    /// Copy of one row keyed by column name, for traceability.
    pub fn row_map(&self, row: usize) -> BTreeMap<String, CellValue> {
        let mut map = BTreeMap::new();
        if let Some(cells) = self.rows.get(row) {
            for (idx, name) in self.columns.iter().enumerate() {
                if let Some(cell) = cells.get(idx) {
                    if !cell.is_empty() {
                        map.insert(name.clone(), cell.clone());
                    }
                }
            }
        }
        map
    }
}

// ======================================================================
// CLASSIFICATION OUTPUT
// ======================================================================

/// Per-column classification. Plain data; callers may overwrite any field
/// before rows are mapped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub role: ColumnRole,
    pub scope: Option<Scope>,
    pub unit: Option<String>,
    pub confidence: f64,
}

impl ColumnMapping {
    pub fn new(role: ColumnRole, confidence: f64) -> Self {
        Self {
            role,
            scope: None,
            unit: None,
            confidence,
        }
    }

    pub fn unknown() -> Self {
        Self::new(ColumnRole::Unknown, 0.1)
    }
}

// ======================================================================
// ACTIVITY RECORDS
// ======================================================================

/// A non-ignored, non-null cell carried along for subtype detection.
#[derive(Debug, Clone, Serialize)]
pub struct ContextEntry {
    pub column: String,
    pub role: ColumnRole,
    pub value: CellValue,
}

/// Canonical view of one input row after mapping: kind-tagged, scoped, with
/// a coerced amount and the surrounding context preserved.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityRecord {
    pub kind: ActivityKind,
    pub scope: Scope,
    pub amount: f64,
    pub unit: Option<String>,
    /// First non-null category cell, lowercased.
    pub category: Option<String>,
    /// Values of every recognized column that was non-null in this row, in
    /// table column order.
    pub context: Vec<ContextEntry>,
    pub source_row: BTreeMap<String, CellValue>,
    pub row_index: usize,
}

impl ActivityRecord {
    /// String values the calculator scans for subtype keywords: the category
    /// text first, then context entries in column order.
    pub fn subtype_candidates(&self) -> impl Iterator<Item = &str> {
        self.category.as_deref().into_iter().chain(
            self.context
                .iter()
                .filter_map(|entry| entry.value.as_text()),
        )
    }

    pub fn first_context_value(&self, role: ColumnRole) -> Option<&CellValue> {
        self.context
            .iter()
            .find(|entry| entry.role == role)
            .map(|entry| &entry.value)
    }
}

// ======================================================================
// COMPUTED RESULTS
// ======================================================================

/// Computed result for one activity record. `emissions` is always kg CO2e.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmissionLine {
    pub scope: Scope,
    pub kind: ActivityKind,
    pub description: Option<String>,
    pub amount: f64,
    pub unit: Option<String>,
    /// Resolved factor catalog key.
    pub subtype: String,
    pub emission_factor: f64,
    pub emissions: f64,
    pub trace: String,
    pub date: Option<String>,
    pub row_index: usize,
}

/// Counters and soft warnings accumulated during one ingestion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestionDiagnostics {
    pub rows_total: usize,
    pub rows_mapped: usize,
    pub rows_dropped: usize,
    pub unrecognized_columns: Vec<String>,
    pub warnings: Vec<String>,
}

/// Aggregate result of one ingestion. All totals are kg CO2e; `by_scope`
/// always carries all three scope keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmissionReport {
    pub total_emissions: f64,
    pub by_scope: BTreeMap<String, f64>,
    pub by_category: BTreeMap<String, f64>,
    pub scope_breakdown: BTreeMap<String, BTreeMap<String, f64>>,
    pub line_items: Vec<EmissionLine>,
    pub diagnostics: IngestionDiagnostics,
}

impl EmissionReport {
    /// Zeroed report, used when classification recognizes nothing.
    pub fn empty(diagnostics: IngestionDiagnostics) -> Self {
        let mut by_scope = BTreeMap::new();
        let mut scope_breakdown = BTreeMap::new();
        for scope in Scope::ALL {
            by_scope.insert(scope.label().to_string(), 0.0);
            scope_breakdown.insert(scope.label().to_string(), BTreeMap::new());
        }
        Self {
            total_emissions: 0.0,
            by_scope,
            by_category: BTreeMap::new(),
            scope_breakdown,
            line_items: Vec::new(),
            diagnostics,
        }
    }
}
