use regex::Regex;
use sqlparser::ast::{ColumnOption, Statement, TableConstraint};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;
use crate::schema::Constraint;

/// Constraints recovered from a parsed `CREATE TABLE`, already normalized.
#[derive(Debug, Default, PartialEq)]
pub struct LiveConstraints {
    pub checks: Vec<String>,
    pub uniques: Vec<Vec<String>>,
}

/// Decides whether a declared constraint is present in live DDL.
///
/// CHECK predicates and UNIQUE column groups are compared structurally when
/// both sides parse. Otherwise the normalized declared fragment must be a
/// substring of the normalized DDL, which tolerates formatting variance but
/// reports drift for semantically equal text written differently.
pub struct ConstraintMatcher {
    whitespace: Regex,
}

impl ConstraintMatcher {
    pub fn new() -> Self {
        Self {
            whitespace: Regex::new(r"\s+").unwrap(),
        }
    }

    pub fn normalize(&self, sql: &str) -> String {
        self.whitespace
            .replace_all(sql.trim(), " ")
            .to_lowercase()
    }

    pub fn contains_fragment(&self, ddl: &str, fragment: &str) -> bool {
        self.normalize(ddl).contains(&self.normalize(fragment))
    }

    pub fn parse_live(&self, ddl: &str) -> Option<LiveConstraints> {
        let statements = Parser::parse_sql(&SQLiteDialect {}, ddl).ok()?;
        let create = match statements.into_iter().next()? {
            Statement::CreateTable(create) => create,
            _ => return None,
        };

        let mut live = LiveConstraints::default();
        for column in &create.columns {
            for option in &column.options {
                match &option.option {
                    ColumnOption::Check(expr) => live.checks.push(self.normalize(&expr.to_string())),
                    ColumnOption::Unique { is_primary: false, .. } => {
                        live.uniques.push(vec![column.name.value.to_lowercase()])
                    }
                    _ => {}
                }
            }
        }
        for constraint in &create.constraints {
            match constraint {
                TableConstraint::Check { expr, .. } => {
                    live.checks.push(self.normalize(&expr.to_string()))
                }
                TableConstraint::Unique { columns, .. } => live.uniques.push(
                    columns
                        .iter()
                        .map(|c| c.to_string().trim_matches('"').to_lowercase())
                        .collect(),
                ),
                _ => {}
            }
        }
        Some(live)
    }

    fn parse_check(&self, expr: &str) -> Option<String> {
        let dialect = SQLiteDialect {};
        let parsed = Parser::new(&dialect).try_with_sql(expr).ok()?.parse_expr().ok()?;
        Some(self.normalize(&parsed.to_string()))
    }

    pub fn is_present(&self, ddl: &str, constraint: &Constraint) -> bool {
        if let Some(live) = self.parse_live(ddl) {
            match constraint {
                Constraint::Check(expr) => {
                    if let Some(declared) = self.parse_check(expr) {
                        return live.checks.contains(&declared);
                    }
                }
                Constraint::Unique(columns) => {
                    let declared: Vec<String> = columns.iter().map(|c| c.to_lowercase()).collect();
                    return live.uniques.contains(&declared);
                }
            }
        }
        self.contains_fragment(ddl, &constraint.to_sql())
    }
}

impl Default for ConstraintMatcher {
    fn default() -> Self {
        Self::new()
    }
}
