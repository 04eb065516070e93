use crate::models::{
    ActivityKind, ActivityRecord, ColumnMapping, ColumnRole, ContextEntry, InputTable, Scope,
};
use log::{debug, info};
use std::collections::BTreeMap;

/// Category-text fallback for kind detection, checked in order. The first
/// keyword contained in the category text decides the kind.
const CATEGORY_KIND_KEYWORDS: &[(ActivityKind, &[&str])] = &[
    (ActivityKind::Fuel, &["fuel", "diesel", "gasoline", "petrol"]),
    (ActivityKind::Refrigerant, &["refrigerant", "coolant", "r-"]),
    (ActivityKind::Electricity, &["electric", "power", "energy"]),
    (ActivityKind::Transport, &["transport", "travel", "vehicle", "flight"]),
    (ActivityKind::Waste, &["waste", "landfill", "recycl"]),
    (ActivityKind::Water, &["water"]),
];

/// Project every table row onto zero or one [`ActivityRecord`]. Rows without
/// a coercible amount or a recognizable kind are dropped silently; output
/// order follows input order.
pub fn map_rows(
    table: &InputTable,
    mappings: &BTreeMap<String, ColumnMapping>,
) -> Vec<ActivityRecord> {
    let mut records = Vec::new();
    for row_index in 0..table.rows.len() {
        match map_row(table, mappings, row_index) {
            Some(record) => records.push(record),
            None => debug!("row {} produced no activity record", row_index),
        }
    }
    info!(
        "mapped {} of {} rows to activity records",
        records.len(),
        table.rows.len()
    );
    records
}

fn map_row(
    table: &InputTable,
    mappings: &BTreeMap<String, ColumnMapping>,
    row_index: usize,
) -> Option<ActivityRecord> {
    let role_of = |name: &str| mappings.get(name).map(|m| m.role).unwrap_or(ColumnRole::Unknown);

    // Amount: first coercible cell among amount columns, in table order.
    let mut amount = None;
    for (idx, name) in table.columns.iter().enumerate() {
        if role_of(name) == ColumnRole::Amount {
            if let Some(n) = table.cell(row_index, idx).as_number() {
                amount = Some(n);
                break;
            }
        }
    }
    let amount = amount?;

    // Unit: first non-null string among unit columns.
    let mut unit = None;
    for (idx, name) in table.columns.iter().enumerate() {
        if role_of(name) == ColumnRole::Unit {
            let cell = table.cell(row_index, idx);
            if !cell.is_empty() {
                unit = Some(cell.display());
                break;
            }
        }
    }

    // Category text: first non-null category cell, lowercased.
    let mut category = None;
    for (idx, name) in table.columns.iter().enumerate() {
        if role_of(name) == ColumnRole::Category {
            let cell = table.cell(row_index, idx);
            if !cell.is_empty() {
                category = Some(cell.display().to_lowercase());
                break;
            }
        }
    }

    // Kind: a populated kind-role column wins, else the category text.
    let mut kind = None;
    let mut scope = None;
    for (idx, name) in table.columns.iter().enumerate() {
        let mapping = match mappings.get(name) {
            Some(m) => m,
            None => continue,
        };
        if let Some(column_kind) = mapping.role.as_activity_kind() {
            if !table.cell(row_index, idx).is_empty() {
                kind = Some(column_kind);
                scope = Some(mapping.scope.unwrap_or_else(|| column_kind.default_scope()));
                break;
            }
        }
    }
    if kind.is_none() {
        if let Some(text) = category.as_deref() {
            for (candidate, keywords) in CATEGORY_KIND_KEYWORDS {
                if keywords.iter().any(|kw| text.contains(kw)) {
                    kind = Some(*candidate);
                    scope = Some(candidate.default_scope());
                    break;
                }
            }
        }
    }
    let kind = kind?;
    let mut scope = scope.unwrap_or_else(|| kind.default_scope());

    // Declared scopes override the kind default: a populated column with a
    // scope hint first, then an explicit "scope N" in the category text.
    for (idx, name) in table.columns.iter().enumerate() {
        if let Some(mapping) = mappings.get(name) {
            if let Some(declared) = mapping.scope {
                if !table.cell(row_index, idx).is_empty() {
                    scope = declared;
                    break;
                }
            }
        }
    }
    if let Some(text) = category.as_deref() {
        for candidate in Scope::ALL {
            if text.contains(&format!("scope {}", candidate.number())) {
                scope = candidate;
                break;
            }
        }
    }

    // Context bag: every recognized, populated column in table order.
    let mut context = Vec::new();
    for (idx, name) in table.columns.iter().enumerate() {
        let role = role_of(name);
        if matches!(role, ColumnRole::Ignore | ColumnRole::Unknown) {
            continue;
        }
        let cell = table.cell(row_index, idx);
        if !cell.is_empty() {
            context.push(ContextEntry {
                column: name.clone(),
                role,
                value: cell.clone(),
            });
        }
    }

    Some(ActivityRecord {
        kind,
        scope,
        amount,
        unit,
        category,
        context,
        source_row: table.row_map(row_index),
        row_index,
    })
}
