//! JSON (array of objects) and JSON Lines codecs.
//!
//! Column order follows first appearance across records. Values keep their
//! JSON type; a key missing from a record reads as `null`.

use serde_json::{Map, Value};

use super::{Cell, Table, TableError};

pub fn parse_json(source: &str) -> Result<Table, TableError> {
    let value: Value = serde_json::from_str(source).map_err(|e| TableError::Json(e.to_string()))?;
    let Value::Array(items) = value else {
        return Err(TableError::Json("expected an array of objects".to_string()));
    };
    let objects = items
        .into_iter()
        .enumerate()
        .map(|(i, item)| into_object(item, i + 1))
        .collect::<Result<Vec<_>, _>>()?;
    from_objects(objects)
}

pub fn parse_jsonl(source: &str) -> Result<Table, TableError> {
    let mut objects = Vec::new();
    for (i, line) in source.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line)
            .map_err(|e| TableError::Json(format!("line {}: {}", i + 1, e)))?;
        objects.push(into_object(value, i + 1)?);
    }
    from_objects(objects)
}

fn into_object(value: Value, position: usize) -> Result<Map<String, Value>, TableError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(TableError::Json(format!(
            "record {} is not an object: {}",
            position, other
        ))),
    }
}

fn from_objects(objects: Vec<Map<String, Value>>) -> Result<Table, TableError> {
    let mut columns: Vec<String> = Vec::new();
    for object in &objects {
        for key in object.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    let mut table = Table::new(columns.clone());
    for mut object in objects {
        let row: Vec<Cell> = columns
            .iter()
            .map(|c| object.remove(c).map(Cell::from_json).unwrap_or_default())
            .collect();
        table.push_row(row)?;
    }
    Ok(table)
}

fn to_objects(table: &Table) -> impl Iterator<Item = Value> + '_ {
    table.rows().iter().map(|row| {
        let map: Map<String, Value> = table
            .columns()
            .iter()
            .zip(row)
            .map(|(column, cell)| (column.clone(), cell.to_json()))
            .collect();
        Value::Object(map)
    })
}

pub fn write_json(table: &Table) -> Result<String, TableError> {
    let array = Value::Array(to_objects(table).collect());
    let mut output =
        serde_json::to_string_pretty(&array).map_err(|e| TableError::Json(e.to_string()))?;
    output.push('\n');
    Ok(output)
}

pub fn write_jsonl(table: &Table) -> Result<String, TableError> {
    let mut output = String::new();
    for object in to_objects(table) {
        let line = serde_json::to_string(&object).map_err(|e| TableError::Json(e.to_string()))?;
        output.push_str(&line);
        output.push('\n');
    }
    Ok(output)
}
