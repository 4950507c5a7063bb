//! Rendering and phase grouping of planned statements.

use std::fmt;

use serde::Serialize;

use super::{classify, Phase, Planned, Safety, Statement};
use crate::dialect::Dialect;
use crate::error::Result;

/// A statement together with the SQL it renders to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupItem {
    /// The statement.
    pub statement: Statement,
    /// Rendered SQL, one entry per executable statement.
    pub sql: Vec<String>,
    /// Whether applying the statement can lose data or fail on existing rows.
    pub destructive: bool,
}

/// All statements scheduled in one phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementGroup {
    /// The phase.
    pub phase: Phase,
    /// Statements in execution order.
    pub items: Vec<GroupItem>,
}

impl StatementGroup {
    /// Number of destructive statements in the group.
    #[must_use]
    pub fn destructive_count(&self) -> usize {
        self.items.iter().filter(|i| i.destructive).count()
    }
}

impl fmt::Display for StatementGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} statement(s)", self.phase, self.items.len())?;
        let destructive = self.destructive_count();
        if destructive > 0 {
            write!(f, ", {destructive} destructive")?;
        }
        Ok(())
    }
}

/// Groups already-ordered statements by phase and renders each one.
///
/// Empty phases are left out.
///
/// # Errors
///
/// Returns [`Error::Unsupported`](crate::error::Error::Unsupported) when the
/// dialect cannot express a statement.
pub fn group(planned: &[Planned], dialect: &dyn Dialect) -> Result<Vec<StatementGroup>> {
    let mut groups: Vec<StatementGroup> = Vec::new();
    for item in planned {
        let sql = dialect.generate_sql(&item.statement)?;
        let entry = GroupItem {
            statement: item.statement.clone(),
            sql,
            destructive: matches!(classify(&item.statement), Safety::Destructive(_)),
        };
        match groups.last_mut() {
            Some(last) if last.phase == item.phase => last.items.push(entry),
            _ => groups.push(StatementGroup {
                phase: item.phase,
                items: vec![entry],
            }),
        }
    }
    Ok(groups)
}

/// Renders statements to a flat list of SQL strings.
///
/// # Errors
///
/// Returns [`Error::Unsupported`](crate::error::Error::Unsupported) when the
/// dialect cannot express a statement.
pub fn render(statements: &[Statement], dialect: &dyn Dialect) -> Result<Vec<String>> {
    let mut sql = Vec::new();
    for statement in statements {
        sql.extend(dialect.generate_sql(statement)?);
    }
    Ok(sql)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddl::{Column, Schema, Table};
    use crate::dialect::PostgresDialect;
    use crate::statements::order;

    #[test]
    fn groups_follow_phases() {
        let planned = order(vec![
            Planned::new(Statement::DropColumn {
                column: Column::new("public", "users", "legacy", "text"),
            }),
            Planned::new(Statement::CreateSchema {
                schema: Schema::new("auth"),
            }),
            Planned::new(Statement::AddColumn {
                column: Column::new("public", "users", "bio", "text"),
            }),
            Planned::new(Statement::AlterRls {
                table: Table::new("public", "users"),
            }),
        ]);

        let groups = group(&planned, &PostgresDialect::new()).unwrap();
        let phases: Vec<Phase> = groups.iter().map(|g| g.phase).collect();
        assert_eq!(
            phases,
            [Phase::Namespaces, Phase::Tables, Phase::Access, Phase::Drops]
        );
        assert_eq!(groups[3].destructive_count(), 1);
        assert_eq!(groups[3].to_string(), "drops: 1 statement(s), 1 destructive");
        assert_eq!(
            groups[1].items[0].sql,
            ["ALTER TABLE \"users\" ADD COLUMN \"bio\" text"]
        );
    }

    #[test]
    fn render_flattens() {
        let sql = render(
            &[
                Statement::CreateSchema {
                    schema: Schema::new("a"),
                },
                Statement::CreateSchema {
                    schema: Schema::new("b"),
                },
            ],
            &PostgresDialect::new(),
        )
        .unwrap();
        assert_eq!(sql, ["CREATE SCHEMA \"a\"", "CREATE SCHEMA \"b\""]);
    }
}
