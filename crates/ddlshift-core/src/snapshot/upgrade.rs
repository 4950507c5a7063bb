//! Version-upgrade chain for snapshot JSON.
//!
//! Each historical format boundary has one pure `Vn -> Vn+1` function. A
//! document is always carried through every step from its stored version to
//! [`CURRENT_VERSION`], in order. Steps may report non-fatal [`Hint`]s; a
//! shape a step does not understand is a hard error naming the version.
//!
//! | Step | Change |
//! |------|--------|
//! | 1 → 2 | foreign keys: `;`-separated strings to objects |
//! | 2 → 3 | `prevId` to `prevIds` |
//! | 3 → 4 | schema-qualified table and enum keys, `schemaTo` on foreign keys |
//! | 4 → 5 | column `primaryKey` flags to named composite primary keys |
//! | 5 → 6 | index column strings to objects |
//! | 6 → 7 | column `isUnique` flags to named unique constraints; sequences, roles, policies and views |
//! | 7 → 8 | nested maps to the flat `ddl` entity list with `nameExplicit` |

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::ddl::{
    naming, Check, Column, ColumnDefault, Entity, Enum, ForeignKey, ForeignKeyAction, Generated,
    GeneratedKind, Identity, IdentityKind, Index, IndexColumn, Policy, PolicyAs, PolicyFor,
    PrimaryKey, Role, Schema, Sequence, Table, Unique, View,
};
use crate::dialect::{dialect_for, DialectKind};
use crate::error::SnapshotError;

/// Version written by this build.
pub const CURRENT_VERSION: u32 = 8;

/// A non-fatal remark produced while upgrading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hint {
    /// Version the step started from.
    pub version: u32,
    /// What the user may want to do about it.
    pub message: String,
}

impl fmt::Display for Hint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{} -> v{}: {}", self.version, self.version + 1, self.message)
    }
}

type Step = fn(Value, &mut Vec<Hint>) -> Result<Value, SnapshotError>;

/// `STEPS[n - 1]` upgrades version `n` to `n + 1`.
const STEPS: [Step; 7] = [
    v1_to_v2, v2_to_v3, v3_to_v4, v4_to_v5, v5_to_v6, v6_to_v7, v7_to_v8,
];

/// Reads the `version` field, as a string or a number.
///
/// # Errors
///
/// Fails when `version` is missing or outside `1..=CURRENT_VERSION`.
pub fn version_of(doc: &Value) -> Result<u32, SnapshotError> {
    let raw = match doc.get("version") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => {
            return Err(SnapshotError::Malformed {
                version: "?".to_string(),
                detail: "missing `version`".to_string(),
            })
        }
    };
    match raw.parse::<u32>() {
        Ok(v) if (1..=CURRENT_VERSION).contains(&v) => Ok(v),
        _ => Err(SnapshotError::UnsupportedVersion(raw)),
    }
}

/// Applies exactly one step to a document older than [`CURRENT_VERSION`].
/// A current document is returned unchanged.
///
/// # Errors
///
/// Fails when the version is unknown or the step does not understand the
/// document.
pub fn upgrade_step(doc: Value, hints: &mut Vec<Hint>) -> Result<Value, SnapshotError> {
    let version = version_of(&doc)?;
    if version == CURRENT_VERSION {
        return Ok(doc);
    }
    STEPS[version as usize - 1](doc, hints)
}

/// Upgrades a document from its stored version to [`CURRENT_VERSION`].
///
/// # Errors
///
/// Fails at the first step that does not understand the document; the
/// error names the version that step started from.
pub fn upgrade(doc: Value) -> Result<(Value, Vec<Hint>), SnapshotError> {
    let from = version_of(&doc)?;
    let mut hints = Vec::new();
    let mut doc = doc;
    for step in &STEPS[from as usize - 1..] {
        doc = step(doc, &mut hints)?;
    }
    for hint in &hints {
        warn!(%hint, "snapshot upgrade hint");
    }
    Ok((doc, hints))
}

// ================================================================
// JSON helpers
// ================================================================

fn malformed(version: u32, detail: impl Into<String>) -> SnapshotError {
    SnapshotError::Malformed {
        version: version.to_string(),
        detail: detail.into(),
    }
}

fn root(doc: &mut Value, version: u32) -> Result<&mut Map<String, Value>, SnapshotError> {
    doc.as_object_mut()
        .ok_or_else(|| malformed(version, "document is not an object"))
}

/// The object under `field`, created empty when missing.
fn object_field<'a>(
    obj: &'a mut Map<String, Value>,
    field: &str,
    version: u32,
) -> Result<&'a mut Map<String, Value>, SnapshotError> {
    obj.entry(field)
        .or_insert_with(|| json!({}))
        .as_object_mut()
        .ok_or_else(|| malformed(version, format!("`{field}` is not an object")))
}

fn tables(doc: &mut Value, version: u32) -> Result<&mut Map<String, Value>, SnapshotError> {
    object_field(root(doc, version)?, "tables", version)
}

fn as_object<'a>(value: &'a mut Value, what: &str, version: u32) -> Result<&'a mut Map<String, Value>, SnapshotError> {
    value
        .as_object_mut()
        .ok_or_else(|| malformed(version, format!("{what} is not an object")))
}

fn set_version(doc: &mut Value, version: u32) {
    if let Some(obj) = doc.as_object_mut() {
        obj.insert("version".to_string(), json!(version.to_string()));
    }
}

fn str_of(obj: &Map<String, Value>, field: &str) -> Option<String> {
    obj.get(field).and_then(Value::as_str).map(str::to_string)
}

fn bool_of(obj: &Map<String, Value>, field: &str) -> bool {
    obj.get(field).and_then(Value::as_bool).unwrap_or(false)
}

fn strings_of(obj: &Map<String, Value>, field: &str) -> Vec<String> {
    obj.get(field)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Numbers and strings both read as text.
fn text_of(obj: &Map<String, Value>, field: &str) -> Option<String> {
    match obj.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn qualified(schema: &str, name: &str) -> String {
    if schema.is_empty() {
        name.to_string()
    } else {
        format!("{schema}.{name}")
    }
}

fn dialect_of(doc: &Value, version: u32) -> Result<DialectKind, SnapshotError> {
    let raw = doc
        .get("dialect")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed(version, "missing `dialect`"))?;
    DialectKind::from_str(raw).map_err(|e| malformed(version, e.to_string()))
}

// ================================================================
// Steps
// ================================================================

/// `"name;tableFrom;colsFrom;tableTo;colsTo;onDelete;onUpdate"`
fn v1_to_v2(mut doc: Value, _hints: &mut Vec<Hint>) -> Result<Value, SnapshotError> {
    const V: u32 = 1;
    for (table_key, table) in tables(&mut doc, V)?.iter_mut() {
        let table = as_object(table, &format!("table `{table_key}`"), V)?;
        let Some(fks) = table.get_mut("foreignKeys").and_then(Value::as_object_mut) else {
            continue;
        };
        for (name, fk) in fks.iter_mut() {
            let text = fk.as_str().ok_or_else(|| {
                malformed(V, format!("foreign key `{name}` on `{table_key}` is not a string"))
            })?;
            let parts: Vec<&str> = text.split(';').collect();
            let [fk_name, table_from, columns_from, table_to, columns_to, on_delete, on_update] =
                parts[..]
            else {
                return Err(malformed(
                    V,
                    format!(
                        "foreign key `{name}` on `{table_key}` has {} parts, expected 7",
                        parts.len()
                    ),
                ));
            };
            let split = |s: &str| -> Vec<String> {
                s.split(',')
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
                    .collect()
            };
            *fk = json!({
                "name": fk_name,
                "tableFrom": table_from,
                "columnsFrom": split(columns_from),
                "tableTo": table_to,
                "columnsTo": split(columns_to),
                "onDelete": on_delete,
                "onUpdate": on_update,
            });
        }
    }
    set_version(&mut doc, 2);
    Ok(doc)
}

fn v2_to_v3(mut doc: Value, _hints: &mut Vec<Hint>) -> Result<Value, SnapshotError> {
    const V: u32 = 2;
    let obj = root(&mut doc, V)?;
    let prev_ids = match obj.remove("prevId") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(id)) => vec![id],
        Some(_) => return Err(malformed(V, "`prevId` is not a string")),
    };
    obj.insert("prevIds".to_string(), json!(prev_ids));
    set_version(&mut doc, 3);
    Ok(doc)
}

fn v3_to_v4(mut doc: Value, _hints: &mut Vec<Hint>) -> Result<Value, SnapshotError> {
    const V: u32 = 3;
    let default = dialect_for(dialect_of(&doc, V)?).default_schema();
    let obj = root(&mut doc, V)?;

    for field in ["tables", "enums"] {
        let old = std::mem::take(object_field(obj, field, V)?);
        let mut new = Map::new();
        for (key, mut entry) in old {
            let entry_obj = as_object(&mut entry, &format!("`{field}.{key}`"), V)?;
            let schema = str_of(entry_obj, "schema")
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| default.to_string());
            let name = str_of(entry_obj, "name").unwrap_or_else(|| key.clone());
            entry_obj.insert("schema".to_string(), json!(schema));
            entry_obj.insert("name".to_string(), json!(name));
            if let Some(fks) = entry_obj.get_mut("foreignKeys").and_then(Value::as_object_mut) {
                for fk in fks.values_mut() {
                    if let Some(fk) = fk.as_object_mut() {
                        fk.entry("schemaTo").or_insert_with(|| json!(schema));
                    }
                }
            }
            new.insert(qualified(&schema, &name), entry);
        }
        obj.insert(field.to_string(), Value::Object(new));
    }

    set_version(&mut doc, 4);
    Ok(doc)
}

fn v4_to_v5(mut doc: Value, hints: &mut Vec<Hint>) -> Result<Value, SnapshotError> {
    const V: u32 = 4;
    for (table_key, table) in tables(&mut doc, V)?.iter_mut() {
        let table = as_object(table, &format!("table `{table_key}`"), V)?;
        let table_name = str_of(table, "name").unwrap_or_else(|| table_key.clone());

        let mut flagged = Vec::new();
        for (column_key, column) in object_field(table, "columns", V)?.iter_mut() {
            let column = as_object(column, &format!("column `{table_key}.{column_key}`"), V)?;
            if column.remove("primaryKey").and_then(|v| v.as_bool()) == Some(true) {
                flagged.push(str_of(column, "name").unwrap_or_else(|| column_key.clone()));
            }
        }

        let pks = object_field(table, "compositePrimaryKeys", V)?;
        for (name, pk) in pks.iter_mut() {
            let columns = pk.as_str().ok_or_else(|| {
                malformed(V, format!("composite primary key `{name}` on `{table_key}` is not a string"))
            })?;
            let columns: Vec<&str> = columns.split(',').filter(|c| !c.is_empty()).collect();
            *pk = json!({ "name": name, "columns": columns });
        }
        if flagged.is_empty() {
            continue;
        }
        if !pks.is_empty() {
            return Err(malformed(
                V,
                format!("`{table_key}` has both primary key columns and a composite primary key"),
            ));
        }
        let name = naming::primary_key(&table_name);
        hints.push(Hint {
            version: V,
            message: format!(
                "primary key of `{table_key}` is now named `{name}`; rename it in the database if it exists under another name"
            ),
        });
        pks.insert(name.clone(), json!({ "name": name, "columns": flagged }));
    }
    set_version(&mut doc, 5);
    Ok(doc)
}

fn v5_to_v6(mut doc: Value, _hints: &mut Vec<Hint>) -> Result<Value, SnapshotError> {
    const V: u32 = 5;
    for (table_key, table) in tables(&mut doc, V)?.iter_mut() {
        let table = as_object(table, &format!("table `{table_key}`"), V)?;
        for (name, index) in object_field(table, "indexes", V)?.iter_mut() {
            let index = as_object(index, &format!("index `{name}`"), V)?;
            let Some(columns) = index.get_mut("columns").and_then(Value::as_array_mut) else {
                return Err(malformed(V, format!("index `{name}` on `{table_key}` has no columns")));
            };
            for column in columns.iter_mut() {
                let expression = column.as_str().ok_or_else(|| {
                    malformed(V, format!("index `{name}` on `{table_key}` has a non-string column"))
                })?;
                *column = json!({
                    "expression": expression,
                    "isExpression": false,
                    "asc": true,
                    "nulls": "last",
                });
            }
        }
    }
    set_version(&mut doc, 6);
    Ok(doc)
}

fn v6_to_v7(mut doc: Value, hints: &mut Vec<Hint>) -> Result<Value, SnapshotError> {
    const V: u32 = 6;
    for (table_key, table) in tables(&mut doc, V)?.iter_mut() {
        let table = as_object(table, &format!("table `{table_key}`"), V)?;
        let table_name = str_of(table, "name").unwrap_or_else(|| table_key.clone());

        let mut flagged = Vec::new();
        for (column_key, column) in object_field(table, "columns", V)?.iter_mut() {
            let column = as_object(column, &format!("column `{table_key}.{column_key}`"), V)?;
            let unique = column.remove("isUnique").and_then(|v| v.as_bool()) == Some(true);
            let unique_name = column.remove("uniqueName").and_then(|v| v.as_str().map(str::to_string));
            let nulls_not_distinct =
                column.remove("nullsNotDistinct").and_then(|v| v.as_bool()) == Some(true);
            if unique {
                let name = str_of(column, "name").unwrap_or_else(|| column_key.clone());
                flagged.push((name, unique_name, nulls_not_distinct));
            }
        }

        let uniques = object_field(table, "uniqueConstraints", V)?;
        for (column, explicit, nulls_not_distinct) in flagged {
            let columns = vec![column.clone()];
            let name = match explicit {
                Some(name) => name,
                None => {
                    let name = naming::unique(&table_name, &columns);
                    hints.push(Hint {
                        version: V,
                        message: format!(
                            "unique constraint on `{table_key}.{column}` is now named `{name}`; rename it in the database if it exists under another name"
                        ),
                    });
                    name
                }
            };
            if uniques.contains_key(&name) {
                return Err(malformed(V, format!("unique constraint `{name}` on `{table_key}` is declared twice")));
            }
            uniques.insert(
                name.clone(),
                json!({ "name": name, "columns": columns, "nullsNotDistinct": nulls_not_distinct }),
            );
        }
    }

    let obj = root(&mut doc, V)?;
    for field in ["sequences", "roles", "policies", "views"] {
        obj.entry(field).or_insert_with(|| json!({}));
    }
    set_version(&mut doc, 7);
    Ok(doc)
}

fn fk_action(raw: Option<String>, version: u32) -> Result<ForeignKeyAction, SnapshotError> {
    let Some(raw) = raw else {
        return Ok(ForeignKeyAction::NoAction);
    };
    match raw.to_ascii_lowercase().replace(['_', ' '], "").as_str() {
        "" | "noaction" => Ok(ForeignKeyAction::NoAction),
        "restrict" => Ok(ForeignKeyAction::Restrict),
        "cascade" => Ok(ForeignKeyAction::Cascade),
        "setnull" => Ok(ForeignKeyAction::SetNull),
        "setdefault" => Ok(ForeignKeyAction::SetDefault),
        _ => Err(malformed(version, format!("unknown foreign key action `{raw}`"))),
    }
}

/// Quoted legacy defaults are literals, everything else is an expression.
fn legacy_default(value: Option<&Value>) -> Option<ColumnDefault> {
    match value? {
        Value::Null => None,
        Value::String(s) if s.len() >= 2 && s.starts_with('\'') && s.ends_with('\'') => {
            Some(ColumnDefault::literal(s[1..s.len() - 1].replace("''", "'")))
        }
        Value::String(s) => Some(ColumnDefault::expression(s.clone())),
        other => Some(ColumnDefault::expression(other.to_string())),
    }
}

fn legacy_identity(value: Option<&Value>) -> Option<Identity> {
    let obj = value?.as_object()?;
    let kind = match str_of(obj, "type").as_deref() {
        Some("always") => IdentityKind::Always,
        _ => IdentityKind::ByDefault,
    };
    Some(Identity {
        kind,
        increment_by: text_of(obj, "increment"),
        min_value: text_of(obj, "minValue"),
        max_value: text_of(obj, "maxValue"),
        start_with: text_of(obj, "startWith"),
        cache: obj.get("cache").and_then(Value::as_i64),
        cycle: bool_of(obj, "cycle"),
    })
}

fn legacy_index_column(value: &Value) -> IndexColumn {
    let Some(obj) = value.as_object() else {
        return IndexColumn::column(value.as_str().unwrap_or_default());
    };
    IndexColumn {
        value: str_of(obj, "expression").unwrap_or_default(),
        is_expression: bool_of(obj, "isExpression"),
        asc: obj.get("asc").and_then(Value::as_bool).unwrap_or(true),
        nulls_first: str_of(obj, "nulls").as_deref() == Some("first"),
        opclass: str_of(obj, "opclass"),
    }
}

fn legacy_policy(
    obj: &Map<String, Value>,
    schema: &str,
    table: &str,
    name: &str,
    version: u32,
) -> Result<Policy, SnapshotError> {
    let as_clause = match str_of(obj, "as").map(|s| s.to_ascii_lowercase()).as_deref() {
        None | Some("permissive") => PolicyAs::Permissive,
        Some("restrictive") => PolicyAs::Restrictive,
        Some(other) => return Err(malformed(version, format!("policy `{name}`: unknown `as` value `{other}`"))),
    };
    let for_clause = match str_of(obj, "for").map(|s| s.to_ascii_lowercase()).as_deref() {
        None | Some("all") => PolicyFor::All,
        Some("select") => PolicyFor::Select,
        Some("insert") => PolicyFor::Insert,
        Some("update") => PolicyFor::Update,
        Some("delete") => PolicyFor::Delete,
        Some(other) => return Err(malformed(version, format!("policy `{name}`: unknown `for` value `{other}`"))),
    };
    Ok(Policy {
        schema: schema.to_string(),
        table: table.to_string(),
        name: name.to_string(),
        as_clause,
        for_clause,
        roles: strings_of(obj, "to"),
        using: str_of(obj, "using"),
        with_check: str_of(obj, "withCheck"),
    })
}

fn legacy_column(
    key: &str,
    c: &Map<String, Value>,
    schema: &str,
    table: &str,
    table_key: &str,
    version: u32,
) -> Result<Column, SnapshotError> {
    let generated = c.get("generated").and_then(Value::as_object).map(|g| Generated {
        expression: str_of(g, "as").unwrap_or_default(),
        kind: if str_of(g, "type").as_deref() == Some("virtual") {
            GeneratedKind::Virtual
        } else {
            GeneratedKind::Stored
        },
    });
    Ok(Column {
        schema: schema.to_string(),
        table: table.to_string(),
        name: str_of(c, "name").unwrap_or_else(|| key.to_string()),
        sql_type: str_of(c, "type")
            .ok_or_else(|| malformed(version, format!("column on `{table_key}` has no type")))?,
        type_schema: str_of(c, "typeSchema"),
        dimensions: c
            .get("dimensions")
            .and_then(Value::as_u64)
            .and_then(|d| u32::try_from(d).ok())
            .unwrap_or(0),
        not_null: bool_of(c, "notNull"),
        default: legacy_default(c.get("default")),
        generated,
        identity: legacy_identity(c.get("identity")),
    })
}

fn legacy_foreign_key(
    key: &str,
    fk: &Map<String, Value>,
    schema: &str,
    table: &str,
    version: u32,
) -> Result<ForeignKey, SnapshotError> {
    let columns = strings_of(fk, "columnsFrom");
    let columns_to = strings_of(fk, "columnsTo");
    let table_to = str_of(fk, "tableTo")
        .ok_or_else(|| malformed(version, format!("foreign key `{key}` has no `tableTo`")))?;
    let name = str_of(fk, "name").unwrap_or_else(|| key.to_string());
    Ok(ForeignKey {
        schema: schema.to_string(),
        table: table.to_string(),
        name_explicit: name != naming::foreign_key(table, &columns, &table_to, &columns_to),
        name,
        columns,
        schema_to: str_of(fk, "schemaTo").unwrap_or_else(|| schema.to_string()),
        table_to,
        columns_to,
        on_update: fk_action(str_of(fk, "onUpdate"), version)?,
        on_delete: fk_action(str_of(fk, "onDelete"), version)?,
    })
}

fn legacy_index(key: &str, index: &Map<String, Value>, schema: &str, table: &str) -> Index {
    let columns: Vec<IndexColumn> = index
        .get("columns")
        .and_then(Value::as_array)
        .map(|cols| cols.iter().map(legacy_index_column).collect())
        .unwrap_or_default();
    let name = str_of(index, "name").unwrap_or_else(|| key.to_string());
    let with = index
        .get("with")
        .and_then(Value::as_object)
        .filter(|w| !w.is_empty())
        .map(|w| {
            w.iter()
                .map(|(k, v)| match v {
                    Value::String(s) => format!("{k}={s}"),
                    other => format!("{k}={other}"),
                })
                .collect::<Vec<_>>()
                .join(", ")
        });
    Index {
        schema: schema.to_string(),
        table: table.to_string(),
        name_explicit: Some(&name) != naming::index(table, &columns).as_ref(),
        name,
        columns,
        is_unique: bool_of(index, "isUnique"),
        method: str_of(index, "method").unwrap_or_default(),
        where_clause: str_of(index, "where"),
        concurrently: bool_of(index, "concurrently"),
        with,
    }
}

fn legacy_sequence(key: String, s: &Map<String, Value>) -> Sequence {
    Sequence {
        schema: str_of(s, "schema").unwrap_or_default(),
        name: str_of(s, "name").unwrap_or(key),
        increment_by: text_of(s, "increment"),
        min_value: text_of(s, "minValue"),
        max_value: text_of(s, "maxValue"),
        start_with: text_of(s, "startWith"),
        cache: s.get("cache").and_then(Value::as_i64),
        cycle: bool_of(s, "cycle"),
    }
}

fn legacy_view(key: String, v: &Map<String, Value>) -> View {
    let with: BTreeMap<String, String> = v
        .get("with")
        .and_then(Value::as_object)
        .map(|w| {
            w.iter()
                .map(|(k, v)| {
                    let text = v.as_str().map_or_else(|| v.to_string(), str::to_string);
                    (k.clone(), text)
                })
                .collect()
        })
        .unwrap_or_default();
    View {
        schema: str_of(v, "schema").unwrap_or_default(),
        name: str_of(v, "name").unwrap_or(key),
        definition: str_of(v, "definition"),
        materialized: bool_of(v, "materialized"),
        with,
        with_no_data: bool_of(v, "withNoData"),
    }
}

/// Pulls the entities of one legacy table into `ddl`. Constraint names are
/// compared against the default they would get today to recover
/// `nameExplicit`.
fn flatten_table(
    key: &str,
    table: &Map<String, Value>,
    ddl: &mut Vec<Entity>,
    version: u32,
) -> Result<(), SnapshotError> {
    let schema = str_of(table, "schema").unwrap_or_default();
    let name = str_of(table, "name").unwrap_or_else(|| key.to_string());
    let entries = |field: &str| -> Vec<(String, Map<String, Value>)> {
        table
            .get(field)
            .and_then(Value::as_object)
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| v.as_object().map(|o| (k.clone(), o.clone())))
                    .collect()
            })
            .unwrap_or_default()
    };

    ddl.push(
        Table {
            schema: schema.clone(),
            name: name.clone(),
            is_rls_enabled: bool_of(table, "isRLSEnabled"),
        }
        .into(),
    );

    for (column_key, c) in entries("columns") {
        ddl.push(legacy_column(&column_key, &c, &schema, &name, key, version)?.into());
    }

    for (pk_key, pk) in entries("compositePrimaryKeys") {
        let pk_name = str_of(&pk, "name").unwrap_or(pk_key);
        ddl.push(
            PrimaryKey {
                schema: schema.clone(),
                table: name.clone(),
                name_explicit: pk_name != naming::primary_key(&name),
                name: pk_name,
                columns: strings_of(&pk, "columns"),
            }
            .into(),
        );
    }

    for (unique_key, u) in entries("uniqueConstraints") {
        let columns = strings_of(&u, "columns");
        let unique_name = str_of(&u, "name").unwrap_or(unique_key);
        ddl.push(
            Unique {
                schema: schema.clone(),
                table: name.clone(),
                name_explicit: unique_name != naming::unique(&name, &columns),
                name: unique_name,
                columns,
                nulls_not_distinct: bool_of(&u, "nullsNotDistinct"),
            }
            .into(),
        );
    }

    for (fk_key, fk) in entries("foreignKeys") {
        ddl.push(legacy_foreign_key(&fk_key, &fk, &schema, &name, version)?.into());
    }

    for (check_key, check) in entries("checkConstraints") {
        let check_name = str_of(&check, "name").unwrap_or(check_key);
        ddl.push(
            Check {
                schema: schema.clone(),
                table: name.clone(),
                name_explicit: !naming::is_default_check(&name, &check_name),
                name: check_name,
                value: str_of(&check, "value").unwrap_or_default(),
            }
            .into(),
        );
    }

    for (index_key, index) in entries("indexes") {
        ddl.push(legacy_index(&index_key, &index, &schema, &name).into());
    }

    for (policy_key, policy) in entries("policies") {
        let policy_name = str_of(&policy, "name").unwrap_or(policy_key);
        ddl.push(legacy_policy(&policy, &schema, &name, &policy_name, version)?.into());
    }
    Ok(())
}

fn v7_to_v8(mut doc: Value, hints: &mut Vec<Hint>) -> Result<Value, SnapshotError> {
    const V: u32 = 7;
    let dialect = dialect_of(&doc, V)?;
    let obj = root(&mut doc, V)?;
    let take = |obj: &mut Map<String, Value>, field: &str| -> Vec<(String, Map<String, Value>)> {
        match obj.remove(field) {
            Some(Value::Object(m)) => m
                .into_iter()
                .filter_map(|(k, v)| match v {
                    Value::Object(o) => Some((k, o)),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    };

    let mut ddl: Vec<Entity> = Vec::new();

    if let Some(Value::Object(schemas)) = obj.remove("schemas") {
        for name in schemas.keys() {
            ddl.push(Schema::new(name).into());
        }
    }
    for (key, e) in take(obj, "enums") {
        ddl.push(
            Enum {
                schema: str_of(&e, "schema").unwrap_or_default(),
                name: str_of(&e, "name").unwrap_or(key),
                values: strings_of(&e, "values"),
            }
            .into(),
        );
    }
    for (key, s) in take(obj, "sequences") {
        ddl.push(legacy_sequence(key, &s).into());
    }
    for (key, r) in take(obj, "roles") {
        let mut role = Role::new(str_of(&r, "name").unwrap_or(key));
        role.create_db = bool_of(&r, "createDb");
        role.create_role = bool_of(&r, "createRole");
        role.inherit = r.get("inherit").and_then(Value::as_bool).unwrap_or(true);
        ddl.push(role.into());
    }
    for (key, table) in take(obj, "tables") {
        flatten_table(&key, &table, &mut ddl, V)?;
    }
    for (key, p) in take(obj, "policies") {
        let name = str_of(&p, "name").unwrap_or_else(|| key.clone());
        match str_of(&p, "on") {
            Some(on) => {
                let (schema, table) = on.split_once('.').unwrap_or(("", on.as_str()));
                ddl.push(legacy_policy(&p, schema, table, &name, V)?.into());
            }
            None => hints.push(Hint {
                version: V,
                message: format!("policy `{key}` is not linked to a table and was left out"),
            }),
        }
    }
    for (key, v) in take(obj, "views") {
        ddl.push(legacy_view(key, &v).into());
    }

    let ddl = serde_json::to_value(&ddl).map_err(|e| malformed(V, e.to_string()))?;
    Ok(json!({
        "version": CURRENT_VERSION.to_string(),
        "dialect": dialect.as_str(),
        "id": obj.get("id").cloned().unwrap_or(Value::Null),
        "prevIds": obj.get("prevIds").cloned().unwrap_or_else(|| json!([])),
        "ddl": ddl,
        "renames": [],
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v1() -> Value {
        json!({
            "version": "1",
            "dialect": "pg",
            "id": "2b0c7a1e-0000-4000-8000-000000000002",
            "prevId": "2b0c7a1e-0000-4000-8000-000000000001",
            "enums": { "mood": { "name": "mood", "values": ["sad", "happy"] } },
            "tables": {
                "users": {
                    "name": "users",
                    "columns": {
                        "id": { "name": "id", "type": "serial", "primaryKey": true, "notNull": true },
                        "email": { "name": "email", "type": "text", "notNull": true, "isUnique": true },
                        "mood": { "name": "mood", "type": "mood", "default": "'happy'" }
                    },
                    "indexes": {
                        "users_email_index": { "name": "users_email_index", "columns": ["email"], "isUnique": false }
                    },
                    "foreignKeys": {}
                },
                "posts": {
                    "name": "posts",
                    "columns": {
                        "id": { "name": "id", "type": "serial", "primaryKey": true, "notNull": true },
                        "author_id": { "name": "author_id", "type": "integer" }
                    },
                    "indexes": {},
                    "foreignKeys": {
                        "posts_author_fk": "posts_author_fk;posts;author_id;users;id;cascade;no action"
                    }
                }
            }
        })
    }

    fn stepwise(mut doc: Value) -> (Value, Vec<Hint>) {
        let mut hints = Vec::new();
        while version_of(&doc).unwrap() < CURRENT_VERSION {
            let before = version_of(&doc).unwrap();
            doc = upgrade_step(doc, &mut hints).unwrap();
            assert_eq!(version_of(&doc).unwrap(), before + 1);
        }
        (doc, hints)
    }

    #[test]
    fn test_direct_equals_stepwise() {
        let (direct, direct_hints) = upgrade(v1()).unwrap();
        let (steps, step_hints) = stepwise(v1());
        assert_eq!(direct, steps);
        assert_eq!(direct_hints, step_hints);
        assert_eq!(direct["version"], "8");
        assert_eq!(direct["dialect"], "postgresql");
    }

    #[test]
    fn test_fk_strings_become_objects() {
        let mut hints = Vec::new();
        let v2 = upgrade_step(v1(), &mut hints).unwrap();
        let fk = &v2["tables"]["posts"]["foreignKeys"]["posts_author_fk"];
        assert_eq!(fk["columnsFrom"], json!(["author_id"]));
        assert_eq!(fk["tableTo"], "users");
        assert_eq!(fk["onDelete"], "cascade");
    }

    #[test]
    fn test_prev_id_becomes_list() {
        let mut hints = Vec::new();
        let v2 = upgrade_step(v1(), &mut hints).unwrap();
        let v3 = upgrade_step(v2, &mut hints).unwrap();
        assert_eq!(v3["prevIds"], json!(["2b0c7a1e-0000-4000-8000-000000000001"]));
        assert!(v3.get("prevId").is_none());
    }

    #[test]
    fn test_flags_become_named_constraints_with_hints() {
        let (doc, hints) = upgrade(v1()).unwrap();
        let ddl = doc["ddl"].as_array().unwrap();

        let pk = ddl
            .iter()
            .find(|e| e["entityType"] == "primaryKey" && e["table"] == "users")
            .unwrap();
        assert_eq!(pk["name"], "users_pk");
        assert_eq!(pk["nameExplicit"], false);

        let unique = ddl.iter().find(|e| e["entityType"] == "unique").unwrap();
        assert_eq!(unique["name"], "users_email_unique");

        let fk = ddl.iter().find(|e| e["entityType"] == "foreignKey").unwrap();
        assert_eq!(fk["nameExplicit"], true);
        assert_eq!(fk["onDelete"], "cascade");
        assert_eq!(fk["schemaTo"], "public");

        let index = ddl.iter().find(|e| e["entityType"] == "index").unwrap();
        assert_eq!(index["nameExplicit"], false);
        assert_eq!(index["columns"][0]["value"], "email");

        let mood = ddl
            .iter()
            .find(|e| e["entityType"] == "column" && e["name"] == "mood")
            .unwrap();
        assert_eq!(mood["default"], json!({ "value": "happy", "expression": false }));

        // Two primary keys and one unique got new default names.
        assert_eq!(hints.len(), 3);
        assert!(hints.iter().all(|h| h.version == 4 || h.version == 6));
    }

    #[test]
    fn test_current_version_is_untouched() {
        let doc = json!({ "version": "8", "dialect": "sqlite", "id": "x", "prevIds": [], "ddl": [], "renames": [] });
        let (out, hints) = upgrade(doc.clone()).unwrap();
        assert_eq!(out, doc);
        assert!(hints.is_empty());
    }

    #[test]
    fn test_unknown_version_fails() {
        let err = upgrade(json!({ "version": "9" })).unwrap_err();
        assert!(matches!(err, SnapshotError::UnsupportedVersion(ref v) if v == "9"));
        assert!(upgrade(json!({ "version": "0" })).is_err());
    }

    #[test]
    fn test_malformed_fk_names_version() {
        let mut doc = v1();
        doc["tables"]["posts"]["foreignKeys"]["posts_author_fk"] = json!("too;few");
        let err = upgrade(doc).unwrap_err();
        match err {
            SnapshotError::Malformed { version, detail } => {
                assert_eq!(version, "1");
                assert!(detail.contains("expected 7"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_mysql_keys_stay_unqualified() {
        let mut doc = v1();
        doc["dialect"] = json!("mysql");
        let (out, _) = upgrade(doc).unwrap();
        let table = out["ddl"]
            .as_array()
            .unwrap()
            .iter()
            .find(|e| e["entityType"] == "table")
            .unwrap()
            .clone();
        assert_eq!(table["schema"], "");
    }

    fn step(doc: Value) -> (Value, Vec<Hint>) {
        let mut hints = Vec::new();
        let out = upgrade_step(doc, &mut hints).unwrap();
        (out, hints)
    }

    fn entity<'a>(doc: &'a Value, kind: &str, name: &str) -> &'a Value {
        doc["ddl"]
            .as_array()
            .unwrap()
            .iter()
            .find(|e| e["entityType"] == kind && e["name"] == name)
            .unwrap_or_else(|| panic!("no {kind} `{name}` in {doc}"))
    }

    #[test]
    fn test_v3_keys_become_schema_qualified() {
        let v3 = json!({
            "version": "3", "dialect": "postgresql", "id": "c", "prevIds": ["b"],
            "enums": { "mood": { "name": "mood", "values": ["sad"] } },
            "tables": {
                "sessions": {
                    "name": "sessions", "schema": "auth",
                    "columns": {}, "indexes": {},
                    "foreignKeys": {
                        "sessions_user_fk": { "name": "sessions_user_fk", "tableFrom": "sessions",
                                              "columnsFrom": ["user_id"], "tableTo": "users",
                                              "columnsTo": ["id"], "onDelete": "cascade", "onUpdate": "no action" }
                    }
                },
                "users": { "name": "users", "schema": "", "columns": {}, "indexes": {}, "foreignKeys": {} }
            }
        });

        let (v4, hints) = step(v3);
        assert!(hints.is_empty());
        assert_eq!(v4["version"], "4");
        let keys: Vec<&String> = v4["tables"].as_object().unwrap().keys().collect();
        assert_eq!(keys, ["auth.sessions", "public.users"]);
        assert_eq!(v4["tables"]["public.users"]["schema"], "public");
        assert_eq!(
            v4["tables"]["auth.sessions"]["foreignKeys"]["sessions_user_fk"]["schemaTo"],
            "auth"
        );
        assert_eq!(v4["enums"]["public.mood"]["schema"], "public");
    }

    #[test]
    fn test_v4_primary_key_flags_become_composite_keys() {
        let v4 = json!({
            "version": "4", "dialect": "postgresql", "id": "d", "prevIds": ["c"], "enums": {},
            "tables": {
                "public.memberships": {
                    "name": "memberships", "schema": "public",
                    "columns": {
                        "user_id": { "name": "user_id", "type": "integer", "primaryKey": true },
                        "group_id": { "name": "group_id", "type": "integer", "primaryKey": true },
                        "note": { "name": "note", "type": "text", "primaryKey": false }
                    },
                    "compositePrimaryKeys": {}
                },
                "public.tags": {
                    "name": "tags", "schema": "public",
                    "columns": { "a": { "name": "a", "type": "text" }, "b": { "name": "b", "type": "text" } },
                    "compositePrimaryKeys": { "tags_a_b_pk": "a,b" }
                }
            }
        });

        let (v5, hints) = step(v4);
        assert_eq!(v5["version"], "5");
        let memberships = &v5["tables"]["public.memberships"];
        let mut columns =
            strings_of(memberships["compositePrimaryKeys"]["memberships_pk"].as_object().unwrap(), "columns");
        columns.sort();
        assert_eq!(columns, ["group_id", "user_id"]);
        assert!(memberships["columns"]["user_id"].get("primaryKey").is_none());
        assert_eq!(
            v5["tables"]["public.tags"]["compositePrimaryKeys"]["tags_a_b_pk"],
            json!({ "name": "tags_a_b_pk", "columns": ["a", "b"] })
        );
        assert_eq!(hints.len(), 1);
        assert_eq!(hints[0].version, 4);
        assert!(hints[0].to_string().starts_with("v4 -> v5: primary key of `public.memberships`"));
    }

    #[test]
    fn test_v4_flags_and_composite_key_conflict() {
        let v4 = json!({
            "version": "4", "dialect": "postgresql", "id": "d", "prevIds": [],
            "tables": {
                "public.t": {
                    "name": "t", "schema": "public",
                    "columns": { "a": { "name": "a", "type": "integer", "primaryKey": true } },
                    "compositePrimaryKeys": { "t_a_pk": "a" }
                }
            }
        });
        let err = upgrade_step(v4, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, SnapshotError::Malformed { ref version, .. } if version == "4"));
    }

    #[test]
    fn test_v5_index_columns_become_objects() {
        let v5 = json!({
            "version": "5", "dialect": "postgresql", "id": "e", "prevIds": ["d"],
            "tables": {
                "public.users": {
                    "name": "users", "schema": "public", "columns": {},
                    "indexes": {
                        "users_email_name_index": { "name": "users_email_name_index",
                                                    "columns": ["email", "name"], "isUnique": true }
                    }
                }
            }
        });

        let (v6, hints) = step(v5);
        assert!(hints.is_empty());
        assert_eq!(v6["version"], "6");
        let columns = &v6["tables"]["public.users"]["indexes"]["users_email_name_index"]["columns"];
        assert_eq!(
            columns[1],
            json!({ "expression": "name", "isExpression": false, "asc": true, "nulls": "last" })
        );
        assert_eq!(columns.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_v6_unique_flags_become_constraints() {
        let v6 = json!({
            "version": "6", "dialect": "postgresql", "id": "f", "prevIds": ["e"],
            "tables": {
                "public.users": {
                    "name": "users", "schema": "public",
                    "columns": {
                        "email": { "name": "email", "type": "text", "isUnique": true,
                                   "uniqueName": "users_email_key", "nullsNotDistinct": true },
                        "handle": { "name": "handle", "type": "text", "isUnique": true },
                        "bio": { "name": "bio", "type": "text", "isUnique": false }
                    },
                    "uniqueConstraints": {}
                }
            }
        });

        let (v7, hints) = step(v6);
        assert_eq!(v7["version"], "7");
        let uniques = &v7["tables"]["public.users"]["uniqueConstraints"];
        assert_eq!(
            uniques["users_email_key"],
            json!({ "name": "users_email_key", "columns": ["email"], "nullsNotDistinct": true })
        );
        assert_eq!(uniques["users_handle_unique"]["columns"], json!(["handle"]));
        assert_eq!(uniques.as_object().unwrap().len(), 2);
        assert!(v7["tables"]["public.users"]["columns"]["email"].get("isUnique").is_none());
        for field in ["sequences", "roles", "policies", "views"] {
            assert_eq!(v7[field], json!({}), "{field}");
        }

        // Only the constraint that got a generated name is reported.
        assert_eq!(hints.len(), 1);
        assert_eq!(hints[0].version, 6);
        assert!(hints[0].message.contains("users_handle_unique"));
    }

    fn v7() -> Value {
        json!({
            "version": "7", "dialect": "postgresql", "id": "g", "prevIds": ["f"],
            "schemas": { "auth": "auth" },
            "enums": { "auth.role_kind": { "schema": "auth", "name": "role_kind", "values": ["admin", "member"] } },
            "sequences": {
                "public.invoice_seq": { "schema": "public", "name": "invoice_seq", "increment": "2",
                                        "startWith": 100, "cache": 1, "cycle": false }
            },
            "roles": { "reader": { "name": "reader", "createDb": false, "inherit": false } },
            "tables": {
                "auth.accounts": {
                    "schema": "auth", "name": "accounts", "isRLSEnabled": true,
                    "columns": {
                        "id": { "name": "id", "type": "integer", "notNull": true,
                                "identity": { "type": "always", "startWith": "1", "increment": "1", "cache": 1 } },
                        "email": { "name": "email", "type": "text", "notNull": true },
                        "kind": { "name": "kind", "type": "role_kind", "typeSchema": "auth", "default": "'member'" },
                        "email_lower": { "name": "email_lower", "type": "text",
                                         "generated": { "as": "lower(email)", "type": "stored" } }
                    },
                    "compositePrimaryKeys": { "accounts_pk": { "name": "accounts_pk", "columns": ["id"] } },
                    "uniqueConstraints": {
                        "accounts_login_key": { "name": "accounts_login_key", "columns": ["email"], "nullsNotDistinct": false }
                    },
                    "foreignKeys": {},
                    "checkConstraints": { "accounts_check": { "name": "accounts_check", "value": "id > 0" } },
                    "indexes": {
                        "accounts_email_lower_index": {
                            "name": "accounts_email_lower_index",
                            "columns": [{ "expression": "email_lower", "isExpression": false, "asc": true, "nulls": "last" }],
                            "isUnique": false, "method": "btree", "with": {}
                        }
                    },
                    "policies": {
                        "own_rows": { "name": "own_rows", "as": "PERMISSIVE", "for": "SELECT",
                                      "to": ["reader"], "using": "id = current_account()" }
                    }
                },
                "public.invoices": {
                    "schema": "public", "name": "invoices",
                    "columns": { "account_id": { "name": "account_id", "type": "integer" } },
                    "foreignKeys": {
                        "invoices_account_id_accounts_id_fk": {
                            "name": "invoices_account_id_accounts_id_fk", "tableFrom": "invoices",
                            "columnsFrom": ["account_id"], "tableTo": "accounts", "schemaTo": "auth",
                            "columnsTo": ["id"], "onDelete": "cascade", "onUpdate": "no action"
                        }
                    }
                }
            },
            "policies": {
                "admins_only": { "name": "admins_only", "as": "RESTRICTIVE", "for": "DELETE",
                                 "to": ["reader"], "on": "public.invoices", "using": "false" },
                "orphan": { "name": "orphan", "as": "PERMISSIVE", "for": "ALL", "to": [] }
            },
            "views": {
                "auth.active_accounts": { "schema": "auth", "name": "active_accounts",
                                          "definition": "select * from auth.accounts",
                                          "materialized": true, "with": { "fillfactor": 70 }, "withNoData": true }
            }
        })
    }

    #[test]
    fn test_v7_flattens_into_typed_entities() {
        let (v8, _) = step(v7());
        assert_eq!(v8["version"], "8");
        assert_eq!(v8["id"], "g");
        assert_eq!(v8["prevIds"], json!(["f"]));
        assert_eq!(v8["renames"], json!([]));
        let parsed: Vec<Entity> = serde_json::from_value(v8["ddl"].clone()).unwrap();
        assert_eq!(parsed.len(), 19);

        assert_eq!(entity(&v8, "schema", "auth")["name"], "auth");
        assert_eq!(entity(&v8, "enum", "role_kind")["schema"], "auth");
        let sequence = entity(&v8, "sequence", "invoice_seq");
        assert_eq!(sequence["incrementBy"], "2");
        assert_eq!(sequence["startWith"], "100");
        assert_eq!(entity(&v8, "role", "reader")["inherit"], false);

        let id = entity(&v8, "column", "id");
        assert_eq!(id["identity"]["kind"], "always");
        assert_eq!(id["identity"]["startWith"], "1");
        let kind = entity(&v8, "column", "kind");
        assert_eq!(kind["typeSchema"], "auth");
        assert_eq!(kind["default"], json!({ "value": "member", "expression": false }));
        assert_eq!(
            entity(&v8, "column", "email_lower")["generated"],
            json!({ "expression": "lower(email)", "kind": "stored" })
        );

        let view = entity(&v8, "view", "active_accounts");
        assert_eq!(view["materialized"], true);
        assert_eq!(view["with"], json!({ "fillfactor": "70" }));
        assert_eq!(view["withNoData"], true);
    }

    #[test]
    fn test_v7_recovers_name_explicit() {
        let (v8, _) = step(v7());
        assert_eq!(entity(&v8, "primaryKey", "accounts_pk")["nameExplicit"], false);
        assert_eq!(entity(&v8, "unique", "accounts_login_key")["nameExplicit"], true);
        assert_eq!(entity(&v8, "check", "accounts_check")["nameExplicit"], false);
        assert_eq!(entity(&v8, "index", "accounts_email_lower_index")["nameExplicit"], false);

        let fk = entity(&v8, "foreignKey", "invoices_account_id_accounts_id_fk");
        assert_eq!(fk["nameExplicit"], false);
        assert_eq!(fk["schemaTo"], "auth");
        assert_eq!(fk["onDelete"], "cascade");
    }

    #[test]
    fn test_v7_links_policies_and_reports_orphans() {
        let (v8, hints) = step(v7());

        let own = entity(&v8, "policy", "own_rows");
        assert_eq!(own["schema"], "auth");
        assert_eq!(own["table"], "accounts");
        assert_eq!(own["for"], "select");
        let admins = entity(&v8, "policy", "admins_only");
        assert_eq!(admins["schema"], "public");
        assert_eq!(admins["table"], "invoices");
        assert_eq!(admins["as"], "restrictive");
        assert_eq!(admins["roles"], json!(["reader"]));

        assert!(!v8["ddl"].as_array().unwrap().iter().any(|e| e["name"] == "orphan"));
        assert_eq!(hints.len(), 1);
        assert_eq!(hints[0].version, 7);
        assert!(hints[0].message.contains("`orphan`"));
    }
}
