//! Default names for constraints and indexes the user did not name.
//!
//! A default name is a pure function of the table and member columns, so it
//! is recomputed whenever either is renamed.

use regex::Regex;

use super::{Check, ForeignKey, Index, IndexColumn, PrimaryKey, Unique};

/// Token an expression key part contributes to a default index name.
pub const EXPRESSION_TOKEN: &str = "expr";

/// `<table>_pk`
#[must_use]
pub fn primary_key(table: &str) -> String {
    format!("{table}_pk")
}

/// `<table>_<cols>_unique`
#[must_use]
pub fn unique(table: &str, columns: &[String]) -> String {
    format!("{table}_{}_unique", columns.join("_"))
}

/// `<table>_<cols>_<tableTo>_<colsTo>_fk`
#[must_use]
pub fn foreign_key(table: &str, columns: &[String], table_to: &str, columns_to: &[String]) -> String {
    format!(
        "{table}_{}_{table_to}_{}_fk",
        columns.join("_"),
        columns_to.join("_")
    )
}

/// `<table>_<cols>_index`, or `None` for indexes built only from
/// expressions.
#[must_use]
pub fn index(table: &str, columns: &[IndexColumn]) -> Option<String> {
    if columns.iter().all(|c| c.is_expression) {
        return None;
    }
    let parts: Vec<&str> = columns
        .iter()
        .map(|c| {
            if c.is_expression {
                EXPRESSION_TOKEN
            } else {
                c.value.as_str()
            }
        })
        .collect();
    Some(format!("{table}_{}_index", parts.join("_")))
}

/// `<table>_check` for the first default-named check on a table and
/// `<table>_check_<n>` for the `n`-th (1-based) after that.
#[must_use]
pub fn check(table: &str, ordinal: usize) -> String {
    if ordinal <= 1 {
        format!("{table}_check")
    } else {
        format!("{table}_check_{ordinal}")
    }
}

/// Whether `name` has the shape of a default check name on `table`.
#[must_use]
pub fn is_default_check(table: &str, name: &str) -> bool {
    let pattern = format!("^{}_check(_[0-9]+)?$", regex::escape(table));
    Regex::new(&pattern).is_ok_and(|re| re.is_match(name))
}

/// Carries the ordinal suffix of a default check name over to a new table.
#[must_use]
pub fn rebase_check(name: &str, old_table: &str, new_table: &str) -> String {
    let prefix = format!("{old_table}_check");
    name.strip_prefix(&prefix).map_or_else(
        || check(new_table, 1),
        |rest| format!("{new_table}_check{rest}"),
    )
}

/// Default name of a primary key record.
#[must_use]
pub fn default_primary_key(pk: &PrimaryKey) -> String {
    primary_key(&pk.table)
}

/// Default name of a unique record.
#[must_use]
pub fn default_unique(unique: &Unique) -> String {
    self::unique(&unique.table, &unique.columns)
}

/// Default name of a foreign key record.
#[must_use]
pub fn default_foreign_key(fk: &ForeignKey) -> String {
    foreign_key(&fk.table, &fk.columns, &fk.table_to, &fk.columns_to)
}

/// Default name of an index record.
#[must_use]
pub fn default_index(index: &Index) -> Option<String> {
    self::index(&index.table, &index.columns)
}

/// Whether a check record carries a default-shaped name.
#[must_use]
pub fn has_default_check_name(check: &Check) -> bool {
    is_default_check(&check.table, &check.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn constraint_defaults() {
        assert_eq!(primary_key("users"), "users_pk");
        assert_eq!(unique("users", &cols(&["email"])), "users_email_unique");
        assert_eq!(
            foreign_key("posts", &cols(&["author_id"]), "users", &cols(&["id"])),
            "posts_author_id_users_id_fk"
        );
    }

    #[test]
    fn index_defaults() {
        let mixed = [IndexColumn::column("a"), IndexColumn::expression("lower(b)")];
        assert_eq!(index("t", &mixed).as_deref(), Some("t_a_expr_index"));

        let only_expr = [IndexColumn::expression("lower(b)")];
        assert_eq!(index("t", &only_expr), None);
    }

    #[test]
    fn check_ordinals() {
        assert_eq!(check("t", 1), "t_check");
        assert_eq!(check("t", 3), "t_check_3");
        assert!(is_default_check("t", "t_check"));
        assert!(is_default_check("t", "t_check_2"));
        assert!(!is_default_check("t", "t_check_positive"));
        assert!(!is_default_check("t.x", "tAx_check"));
        assert_eq!(rebase_check("t_check_2", "t", "u"), "u_check_2");
    }
}
