use crate::import::llm::ColumnAnalyzer;
use crate::models::{CellValue, ColumnMapping, ColumnRole, InputTable, Scope};
use log::{debug, info, warn};
use std::collections::BTreeMap;

/// Name-pattern table, checked in priority order; the first role with any
/// keyword hit wins. Kept as one immutable table rather than scattered
/// conditionals so coverage can be asserted in tests.
const ROLE_KEYWORDS: &[(ColumnRole, &[&str])] = &[
    (
        ColumnRole::Fuel,
        &[
            "fuel", "diesel", "gasoline", "petrol", "gas", "oil", "litre", "liter", "gallon",
            "combustion", "fleet", "natural gas", "lpg", "propane", "biodiesel",
        ],
    ),
    (
        ColumnRole::Electricity,
        &[
            "electric", "energy", "kwh", "mwh", "power", "grid", "renewable", "solar", "wind",
        ],
    ),
    (
        ColumnRole::Transport,
        &[
            "travel", "transport", "vehicle", "flight", "distance", "km", "mile", "commute",
            "train", "bus", "taxi", "ship", "ferry", "logistics",
        ],
    ),
    (
        ColumnRole::Waste,
        &[
            "waste", "landfill", "recycl", "compost", "garbage", "trash", "disposal",
            "incineration", "hazardous", "sewage",
        ],
    ),
    (
        ColumnRole::Water,
        &[
            "water", "cubic", "m3", "wastewater", "effluent", "irrigation", "potable",
        ],
    ),
    (
        ColumnRole::Refrigerant,
        &[
            "refrigerant", "coolant", "air condition", "hfc", "leak", "fugitive", "hvac",
            "chiller",
        ],
    ),
    (
        ColumnRole::Amount,
        &[
            "amount", "quantity", "volume", "weight", "total", "consumption", "usage", "value",
            "count", "sum",
        ],
    ),
    (
        ColumnRole::Unit,
        &[
            "unit", "uom", "measure", "metric", "kwh", "kg", "ton", "liter", "gallon", "km",
            "mile", "m3",
        ],
    ),
    (
        ColumnRole::Date,
        &[
            "date", "time", "period", "month", "year", "quarter", "week", "day", "fiscal",
            "calendar", "reporting",
        ],
    ),
    (
        ColumnRole::Category,
        &[
            "category", "type", "class", "scope", "classification", "group", "source", "activity",
        ],
    ),
    (
        ColumnRole::Location,
        &[
            "location", "site", "facility", "building", "office", "plant", "region", "country",
            "city", "address", "geography",
        ],
    ),
    (
        ColumnRole::Notes,
        &[
            "note", "comment", "description", "detail", "additional", "info", "remark",
        ],
    ),
];

/// Unit tokens recognized in free-text cells, mapped onto canonical units.
/// Longer tokens come before their prefixes so "kilometer" is not read as
/// "kilo".
const CELL_UNIT_TOKENS: &[(&str, &str)] = &[
    ("kwh", "kWh"),
    ("kilowatt", "kWh"),
    ("mwh", "MWh"),
    ("megawatt", "MWh"),
    ("tonne", "tonnes"),
    ("ton", "tonnes"),
    ("kilometer", "km"),
    ("kilometre", "km"),
    ("km", "km"),
    ("mile", "miles"),
    ("kg", "kg"),
    ("kilo", "kg"),
    ("litre", "litres"),
    ("liter", "litres"),
    ("gallon", "gallons"),
    ("gal", "gallons"),
    ("cubic", "m³"),
    ("m3", "m³"),
];

/// Column-name substrings mapped onto canonical units, checked in order.
const NAME_UNIT_TOKENS: &[(&str, &str)] = &[
    ("kwh", "kWh"),
    ("kw-h", "kWh"),
    ("kilowatt", "kWh"),
    ("mwh", "MWh"),
    ("mw-h", "MWh"),
    ("megawatt", "MWh"),
    ("kilometer", "km"),
    ("kilometre", "km"),
    ("km", "km"),
    ("mile", "miles"),
    ("kg", "kg"),
    ("kilo", "kg"),
    ("weight", "kg"),
    ("tonne", "tonnes"),
    ("ton", "tonnes"),
    ("litre", "litres"),
    ("liter", "litres"),
    ("gallon", "gallons"),
    ("m3", "m³"),
    ("cubic", "m³"),
];

const STRING_UNIT_TOKENS: &[&str] = &[
    "kwh", "mwh", "kg", "ton", "tonnes", "liter", "litre", "gallon", "km", "mile", "m3",
];

const STRING_FUEL_TOKENS: &[&str] = &["diesel", "gasoline", "petrol", "natural gas", "lpg", "propane"];

/// Classify every column of a table. Never fails: columns nothing matches
/// come back as `unknown` with low confidence. The optional analyzer is only
/// consulted for columns local rules cannot place.
pub fn classify_columns(
    table: &InputTable,
    analyzer: Option<&dyn ColumnAnalyzer>,
) -> BTreeMap<String, ColumnMapping> {
    let mut mappings = BTreeMap::new();

    for (idx, name) in table.columns.iter().enumerate() {
        let mapping = classify_column(table, idx, name, analyzer);
        debug!(
            "column '{}' classified as {} (confidence {:.2})",
            name, mapping.role, mapping.confidence
        );
        mappings.insert(name.clone(), mapping);
    }

    let recognized = mappings
        .values()
        .filter(|m| m.role != ColumnRole::Unknown)
        .count();
    info!(
        "classified {} columns, {} recognized",
        table.columns.len(),
        recognized
    );
    mappings
}

fn classify_column(
    table: &InputTable,
    idx: usize,
    name: &str,
    analyzer: Option<&dyn ColumnAnalyzer>,
) -> ColumnMapping {
    // 1. Name pattern match.
    if let Some(role) = match_name(name) {
        let mut mapping = ColumnMapping::new(role, 0.8);
        mapping.scope = role.as_activity_kind().map(|k| k.default_scope());
        if role == ColumnRole::Amount || role == ColumnRole::Unit {
            mapping.unit = detect_unit(name, table, idx);
        }
        return mapping;
    }

    // 2. Content inference.
    if let Some(mapping) = infer_from_content(table, idx, name) {
        return mapping;
    }

    // 3. Optional LLM fallback, parsed defensively.
    if let Some(analyzer) = analyzer {
        let samples: Vec<String> = table
            .column_cells(idx)
            .filter(|c| !c.is_empty())
            .take(3)
            .map(|c| c.display())
            .collect();
        match analyzer.classify_column(name, &samples) {
            Some(analysis) => {
                let mut mapping = ColumnMapping::new(analysis.role, analysis.confidence);
                mapping.scope = analysis
                    .scope
                    .or_else(|| analysis.role.as_activity_kind().map(|k| k.default_scope()));
                mapping.unit = analysis.unit;
                return mapping;
            }
            None => warn!("column analyzer gave no usable answer for '{}'", name),
        }
    }

    // 4. Default.
    ColumnMapping::unknown()
}

fn match_name(name: &str) -> Option<ColumnRole> {
    let lowered = name.to_lowercase();
    for (role, keywords) in ROLE_KEYWORDS {
        if keywords.iter().any(|kw| lowered.contains(kw)) {
            return Some(*role);
        }
        if *role == ColumnRole::Refrigerant && contains_refrigerant_code(&lowered) {
            return Some(*role);
        }
    }
    None
}

/// `r-` immediately followed by a digit, as in R-410A or r-22.
fn contains_refrigerant_code(lowered: &str) -> bool {
    lowered
        .match_indices("r-")
        .any(|(pos, _)| {
            lowered[pos + 2..]
                .chars()
                .next()
                .map(|c| c.is_ascii_digit())
                .unwrap_or(false)
        })
}

fn infer_from_content(table: &InputTable, idx: usize, name: &str) -> Option<ColumnMapping> {
    let non_empty: Vec<&CellValue> = table
        .column_cells(idx)
        .filter(|c| !c.is_empty())
        .collect();
    if non_empty.is_empty() {
        return None;
    }

    // Date-typed columns.
    if non_empty.iter().all(|c| matches!(c, CellValue::Date(_))) {
        return Some(ColumnMapping::new(ColumnRole::Date, 0.9));
    }

    // Numeric columns are amounts; small ranges look like percentages.
    if non_empty
        .iter()
        .all(|c| matches!(c, CellValue::Number(_)))
    {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for cell in &non_empty {
            if let CellValue::Number(n) = cell {
                min = min.min(*n);
                max = max.max(*n);
            }
        }
        if (0.0..=100.0).contains(&min) && (0.0..=100.0).contains(&max) {
            let mut mapping = ColumnMapping::new(ColumnRole::Amount, 0.6);
            mapping.unit = Some("%".to_string());
            return Some(mapping);
        }
        let mut mapping = ColumnMapping::new(ColumnRole::Amount, 0.7);
        mapping.unit = detect_unit(name, table, idx);
        return Some(mapping);
    }

    // String content: scope declarations, unit tokens, fuel types.
    let texts: Vec<String> = non_empty
        .iter()
        .filter_map(|c| c.as_text())
        .map(|s| s.to_lowercase())
        .collect();
    if texts.is_empty() {
        return None;
    }

    for scope in Scope::ALL {
        let needle = format!("scope {}", scope.number());
        if texts.iter().any(|t| t.contains(&needle)) {
            let mut mapping = ColumnMapping::new(ColumnRole::Category, 0.8);
            mapping.scope = Some(scope);
            return Some(mapping);
        }
    }

    for text in &texts {
        if let Some(token) = STRING_UNIT_TOKENS.iter().find(|tok| text.contains(*tok)) {
            let mut mapping = ColumnMapping::new(ColumnRole::Unit, 0.7);
            mapping.unit = normalize_unit_token(*token);
            return Some(mapping);
        }
    }

    if texts
        .iter()
        .any(|t| STRING_FUEL_TOKENS.iter().any(|tok| t.contains(tok)))
    {
        let mut mapping = ColumnMapping::new(ColumnRole::Fuel, 0.8);
        mapping.scope = Some(Scope::One);
        return Some(mapping);
    }

    None
}

fn normalize_unit_token(token: &str) -> Option<String> {
    CELL_UNIT_TOKENS
        .iter()
        .find(|(tok, _)| *tok == token || token.contains(tok))
        .map(|(_, unit)| unit.to_string())
}

/// Infer a canonical unit for a column: the column name is authoritative
/// when it carries a unit token; otherwise free-text cells are scanned.
pub fn detect_unit(name: &str, table: &InputTable, idx: usize) -> Option<String> {
    let lowered = name.to_lowercase();
    for (token, unit) in NAME_UNIT_TOKENS {
        if lowered.contains(token) {
            return Some(unit.to_string());
        }
    }

    for cell in table.column_cells(idx) {
        if let Some(text) = cell.as_text() {
            let lowered = text.to_lowercase();
            for (token, unit) in CELL_UNIT_TOKENS {
                if lowered.contains(token) {
                    return Some(unit.to_string());
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: &[&str], rows: Vec<Vec<CellValue>>) -> InputTable {
        InputTable {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        }
    }

    #[test]
    fn test_name_match_priority_order() {
        assert_eq!(match_name("Fuel Type"), Some(ColumnRole::Fuel));
        assert_eq!(match_name("Electricity (kWh)"), Some(ColumnRole::Electricity));
        assert_eq!(match_name("Business Travel"), Some(ColumnRole::Transport));
        assert_eq!(match_name("Waste Disposal"), Some(ColumnRole::Waste));
        assert_eq!(match_name("Water Use"), Some(ColumnRole::Water));
        assert_eq!(match_name("HVAC Refrigerant"), Some(ColumnRole::Refrigerant));
        assert_eq!(match_name("Quantity"), Some(ColumnRole::Amount));
        assert_eq!(match_name("UoM"), Some(ColumnRole::Unit));
        assert_eq!(match_name("Reporting Period"), Some(ColumnRole::Date));
        assert_eq!(match_name("Scope"), Some(ColumnRole::Category));
        assert_eq!(match_name("Facility"), Some(ColumnRole::Location));
        assert_eq!(match_name("Comments"), Some(ColumnRole::Notes));
        assert_eq!(match_name("xyzzy"), None);
    }

    #[test]
    fn test_refrigerant_code_in_name() {
        assert_eq!(match_name("R-410A top-up"), Some(ColumnRole::Refrigerant));
        assert!(contains_refrigerant_code("r-22 charge"));
        assert!(!contains_refrigerant_code("r-x charge"));
        assert!(!contains_refrigerant_code("order-line"));
    }

    #[test]
    fn test_kind_columns_get_default_scope_hint() {
        let t = table(&["Electricity"], vec![vec![CellValue::Number(5.0)]]);
        let mappings = classify_columns(&t, None);
        let m = &mappings["Electricity"];
        assert_eq!(m.role, ColumnRole::Electricity);
        assert_eq!(m.scope, Some(Scope::Two));
        assert!((m.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_numeric_content_is_amount() {
        let t = table(
            &["xyz"],
            vec![
                vec![CellValue::Number(1200.0)],
                vec![CellValue::Number(3400.0)],
            ],
        );
        let m = &classify_columns(&t, None)["xyz"];
        assert_eq!(m.role, ColumnRole::Amount);
        assert!((m.confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_small_numeric_range_looks_like_percentage() {
        let t = table(
            &["xyz"],
            vec![vec![CellValue::Number(12.0)], vec![CellValue::Number(88.0)]],
        );
        let m = &classify_columns(&t, None)["xyz"];
        assert_eq!(m.role, ColumnRole::Amount);
        assert_eq!(m.unit.as_deref(), Some("%"));
        assert!((m.confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_scope_text_in_cells_becomes_category_with_hint() {
        let t = table(
            &["xyz"],
            vec![vec![CellValue::Text("Scope 2 - purchased power".into())]],
        );
        let m = &classify_columns(&t, None)["xyz"];
        assert_eq!(m.role, ColumnRole::Category);
        assert_eq!(m.scope, Some(Scope::Two));
    }

    #[test]
    fn test_unit_token_in_cells_becomes_unit_role() {
        let t = table(&["xyz"], vec![vec![CellValue::Text("kWh".into())]]);
        let m = &classify_columns(&t, None)["xyz"];
        assert_eq!(m.role, ColumnRole::Unit);
        assert_eq!(m.unit.as_deref(), Some("kWh"));
    }

    #[test]
    fn test_fuel_token_in_cells_becomes_fuel_role() {
        let t = table(&["xyz"], vec![vec![CellValue::Text("Diesel".into())]]);
        let m = &classify_columns(&t, None)["xyz"];
        assert_eq!(m.role, ColumnRole::Fuel);
        assert_eq!(m.scope, Some(Scope::One));
    }

    #[test]
    fn test_unmatched_column_defaults_to_unknown() {
        let t = table(&["xyz"], vec![vec![CellValue::Bool(true)]]);
        let m = &classify_columns(&t, None)["xyz"];
        assert_eq!(m.role, ColumnRole::Unknown);
        assert!((m.confidence - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_unit_hint_from_name_wins_over_cells() {
        // Unit-hint monotonicity: a unit token in the name always decides.
        let t = table(
            &["Total Weight (kg)"],
            vec![vec![CellValue::Text("tonnes".into())]],
        );
        let m = &classify_columns(&t, None)["Total Weight (kg)"];
        assert_eq!(m.role, ColumnRole::Amount);
        assert_eq!(m.unit.as_deref(), Some("kg"));
    }

    #[test]
    fn test_detect_unit_orders_km_before_kilo() {
        let t = table(&["Distance in kilometers"], vec![]);
        assert_eq!(
            detect_unit("Distance in kilometers", &t, 0).as_deref(),
            Some("km")
        );
    }

    #[test]
    fn test_classifier_is_idempotent() {
        let t = table(
            &["Category", "Amount", "Unit"],
            vec![vec![
                CellValue::Text("Electricity".into()),
                CellValue::Number(10.0),
                CellValue::Text("kWh".into()),
            ]],
        );
        let first = classify_columns(&t, None);
        let second = classify_columns(&t, None);
        assert_eq!(first, second);
    }

    #[test]
    fn test_keyword_table_covers_every_assignable_role() {
        // Every role except ignore/unknown must be reachable by name match.
        let covered: Vec<ColumnRole> = ROLE_KEYWORDS.iter().map(|(role, _)| *role).collect();
        for role in [
            ColumnRole::Fuel,
            ColumnRole::Electricity,
            ColumnRole::Transport,
            ColumnRole::Waste,
            ColumnRole::Water,
            ColumnRole::Refrigerant,
            ColumnRole::Amount,
            ColumnRole::Unit,
            ColumnRole::Date,
            ColumnRole::Category,
            ColumnRole::Location,
            ColumnRole::Notes,
        ] {
            assert!(covered.contains(&role), "missing keywords for {}", role);
        }
    }
}
