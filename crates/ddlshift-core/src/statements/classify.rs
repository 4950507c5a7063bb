//! Destructive-statement classification.

use std::fmt;

use serde::Serialize;

use super::Statement;

/// Why a statement needs confirmation before it is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Hazard {
    /// Table data is deleted.
    DropTable,
    /// Column data is deleted.
    DropColumn,
    /// Everything inside the schema is deleted.
    DropSchema,
    /// Columns using the type lose it.
    DropEnum,
    /// Sequence state is lost.
    DropSequence,
    /// Dependants of the view break.
    DropView,
    /// Labels may disappear while existing rows still use them.
    EnumRecreation,
    /// Existing rows have no value for the new `NOT NULL` column.
    NotNullWithoutDefault,
    /// Existing rows may hold nulls in the column that becomes `NOT NULL`.
    NotNullOnExistingColumn,
    /// Existing values may not convert.
    TypeChange,
    /// Existing rows may violate the new unique constraint.
    UniqueOnExistingData,
    /// The table's identity changes.
    PrimaryKeyChange,
    /// The table is rebuilt and its data copied.
    TableRecreation,
}

impl fmt::Display for Hazard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::DropTable => "drops a table and its data",
            Self::DropColumn => "drops a column and its data",
            Self::DropSchema => "drops a schema",
            Self::DropEnum => "drops an enum type",
            Self::DropSequence => "drops a sequence",
            Self::DropView => "drops a view",
            Self::EnumRecreation => "rebuilds an enum type; removed labels must be unused",
            Self::NotNullWithoutDefault => {
                "adds NOT NULL without a default; fails if the table has rows with nulls"
            }
            Self::NotNullOnExistingColumn => {
                "sets NOT NULL on an existing column; fails if any row holds a null"
            }
            Self::TypeChange => "changes a column type; existing values must convert",
            Self::UniqueOnExistingData => "adds a unique constraint; fails on duplicate rows",
            Self::PrimaryKeyChange => "changes a primary key",
            Self::TableRecreation => "recreates a table and copies its data",
        };
        f.write_str(text)
    }
}

/// Classification of one statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Safety {
    /// Can be applied without confirmation.
    Safe,
    /// May lose data or fail on existing data.
    Destructive(Hazard),
}

/// Classifies a statement.
#[must_use]
pub fn classify(statement: &Statement) -> Safety {
    let hazard = match statement {
        Statement::DropTable { .. } => Hazard::DropTable,
        Statement::DropColumn { .. } => Hazard::DropColumn,
        Statement::DropSchema { .. } => Hazard::DropSchema,
        Statement::DropEnum { .. } => Hazard::DropEnum,
        Statement::DropSequence { .. } => Hazard::DropSequence,
        Statement::DropView { .. } => Hazard::DropView,
        Statement::RecreateEnum { .. } => Hazard::EnumRecreation,
        Statement::RecreateTable { .. } => Hazard::TableRecreation,
        Statement::AddPrimaryKey { .. } | Statement::DropPrimaryKey { .. } => {
            Hazard::PrimaryKeyChange
        }
        Statement::AddUnique { .. } => Hazard::UniqueOnExistingData,
        Statement::AddColumn { column }
            if column.not_null
                && column.default.is_none()
                && column.generated.is_none()
                && column.identity.is_none() =>
        {
            Hazard::NotNullWithoutDefault
        }
        Statement::AlterColumn { delta, .. } if delta.sql_type || delta.dimensions => {
            Hazard::TypeChange
        }
        Statement::AlterColumn { to, delta, .. } if delta.not_null && to.not_null => {
            Hazard::NotNullOnExistingColumn
        }
        _ => return Safety::Safe,
    };
    Safety::Destructive(hazard)
}

/// Statements split by [`classify`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partitioned {
    /// Statements that need no confirmation.
    pub safe: Vec<Statement>,
    /// Statements that need confirmation, with the reason.
    pub destructive: Vec<(Statement, Hazard)>,
}

/// Splits statements into safe and destructive ones, keeping order.
#[must_use]
pub fn partition(statements: &[Statement]) -> Partitioned {
    let mut out = Partitioned::default();
    for statement in statements {
        match classify(statement) {
            Safety::Safe => out.safe.push(statement.clone()),
            Safety::Destructive(hazard) => out.destructive.push((statement.clone(), hazard)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddl::{Column, ColumnDefault, Table};
    use crate::diff::delta::ColumnDelta;

    #[test]
    fn drops_are_destructive() {
        let drop = Statement::DropTable {
            table: Table::new("public", "users"),
        };
        assert_eq!(classify(&drop), Safety::Destructive(Hazard::DropTable));
    }

    #[test]
    fn not_null_needs_a_default() {
        let bare = Column::new("public", "users", "age", "integer").not_null();
        assert_eq!(
            classify(&Statement::AddColumn {
                column: bare.clone()
            }),
            Safety::Destructive(Hazard::NotNullWithoutDefault)
        );

        let defaulted = bare.default_value(ColumnDefault::expression("0"));
        assert_eq!(
            classify(&Statement::AddColumn { column: defaulted }),
            Safety::Safe
        );
    }

    #[test]
    fn setting_not_null_is_flagged_even_with_a_default() {
        let from = Column::new("public", "t", "c", "integer")
            .default_value(ColumnDefault::expression("0"));
        let to = from.clone().not_null();
        let tighten = Statement::AlterColumn {
            from: from.clone(),
            to: to.clone(),
            delta: ColumnDelta {
                not_null: true,
                ..ColumnDelta::default()
            },
        };
        assert_eq!(
            classify(&tighten),
            Safety::Destructive(Hazard::NotNullOnExistingColumn)
        );

        let relax = Statement::AlterColumn {
            from: to,
            to: from,
            delta: ColumnDelta {
                not_null: true,
                ..ColumnDelta::default()
            },
        };
        assert_eq!(classify(&relax), Safety::Safe);
    }

    #[test]
    fn type_change_is_flagged() {
        let from = Column::new("public", "t", "c", "text");
        let to = Column::new("public", "t", "c", "integer");
        let statement = Statement::AlterColumn {
            from,
            to,
            delta: ColumnDelta {
                sql_type: true,
                ..ColumnDelta::default()
            },
        };
        assert_eq!(classify(&statement), Safety::Destructive(Hazard::TypeChange));
    }

    #[test]
    fn partition_keeps_order() {
        let statements = vec![
            Statement::AddColumn {
                column: Column::new("public", "t", "a", "text"),
            },
            Statement::DropColumn {
                column: Column::new("public", "t", "b", "text"),
            },
            Statement::AddColumn {
                column: Column::new("public", "t", "c", "text"),
            },
        ];
        let split = partition(&statements);
        assert_eq!(split.safe.len(), 2);
        assert_eq!(split.destructive.len(), 1);
        assert_eq!(split.destructive[0].1, Hazard::DropColumn);
    }
}
