use sqlparser::ast::{
    self, AssignmentTarget, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject, Value,
    ValueWithSpan,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use crate::model::*;

/// Which reservations a `SELECT ... FROM reservations` asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationFilter {
    All,
    Resource(ResourceId),
    Principal(PrincipalId),
}

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    InsertResource {
        id: ResourceId,
        name: String,
        description: Option<String>,
        location: Option<String>,
    },
    /// Only the columns named in `SET` are changed. The outer `Option` means
    /// "not mentioned", the inner one is the nullable value.
    UpdateResource {
        id: ResourceId,
        name: Option<String>,
        description: Option<Option<String>>,
        location: Option<Option<String>>,
    },
    DeleteResource {
        id: ResourceId,
    },
    InsertReservation {
        resource_id: ResourceId,
        principal_id: PrincipalId,
        group: String,
        start: Ms,
        end: Ms,
    },
    CancelReservation {
        id: ReservationId,
        principal_id: PrincipalId,
    },
    /// Administrative hard delete.
    DeleteReservation {
        id: ReservationId,
    },
    UnlockSession {
        resource_id: ResourceId,
        code: String,
    },
    LockSessions {
        resource_id: ResourceId,
    },
    SelectEligibility {
        resource_id: ResourceId,
    },
    SelectResources {
        id: Option<ResourceId>,
    },
    SelectReservations {
        filter: ReservationFilter,
        window: Option<(Ms, Ms)>,
    },
    SelectSession {
        reservation_id: ReservationId,
    },
    SelectStats,
    Sweep,
    Listen {
        channel: String,
    },
    Unlisten {
        channel: String,
    },
    UnlistenAll,
}

/// Statements sqlparser does not model are matched by keyword prefix.
fn parse_keyword_command(trimmed: &str) -> Option<Command> {
    let body = trimmed.trim_end_matches(';').trim();
    let mut words = body.split_whitespace();
    let keyword = words.next()?.to_uppercase();
    let arg = words.next().map(|w| w.trim_matches('"').to_string());
    if words.next().is_some() {
        return None;
    }
    match (keyword.as_str(), arg) {
        ("SWEEP", None) => Some(Command::Sweep),
        ("LISTEN", Some(channel)) => Some(Command::Listen { channel }),
        ("UNLISTEN", Some(channel)) if channel == "*" => Some(Command::UnlistenAll),
        ("UNLISTEN", Some(channel)) => Some(Command::Unlisten { channel }),
        _ => None,
    }
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let trimmed = sql.trim();
    if trimmed.is_empty() {
        return Err(SqlError::Empty);
    }
    if let Some(cmd) = parse_keyword_command(trimmed) {
        return Ok(cmd);
    }

    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    if stmts.is_empty() {
        return Err(SqlError::Empty);
    }

    match &stmts[0] {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Update {
            table,
            assignments,
            selection,
            ..
        } => parse_update(table, assignments, selection.as_ref()),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

// ── INSERT ────────────────────────────────────────────────────

/// Values of one INSERT row, looked up by column name when the statement
/// lists columns and by position otherwise.
struct Row<'a> {
    columns: Vec<String>,
    values: &'a [Expr],
    table: &'static str,
}

impl<'a> Row<'a> {
    fn get(&self, position: usize, column: &'static str) -> Option<&'a Expr> {
        if self.columns.is_empty() {
            self.values.get(position)
        } else {
            let idx = self.columns.iter().position(|c| c == column)?;
            self.values.get(idx)
        }
    }

    fn require(&self, position: usize, column: &'static str) -> Result<&'a Expr, SqlError> {
        self.get(position, column)
            .ok_or(SqlError::MissingColumn(self.table, column))
    }
}

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    let values = extract_insert_values(insert)?;
    let columns: Vec<String> = insert.columns.iter().map(|c| c.value.to_lowercase()).collect();
    if !columns.is_empty() && columns.len() != values.len() {
        return Err(SqlError::WrongArity(columns.len(), values.len()));
    }

    match table.as_str() {
        "resources" => {
            let row = Row { columns, values, table: "resources" };
            Ok(Command::InsertResource {
                id: parse_i64(row.require(0, "id")?)?,
                name: parse_string(row.require(1, "name")?)?,
                description: row.get(2, "description").map(parse_string_or_null).transpose()?.flatten(),
                location: row.get(3, "location").map(parse_string_or_null).transpose()?.flatten(),
            })
        }
        "reservations" => {
            let row = Row { columns, values, table: "reservations" };
            Ok(Command::InsertReservation {
                resource_id: parse_i64(row.require(0, "resource_id")?)?,
                principal_id: parse_i64(row.require(1, "principal_id")?)?,
                group: parse_string(row.require(2, "group")?)?,
                start: parse_i64(row.require(3, "start")?)?,
                end: parse_i64(row.require(4, "end")?)?,
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

// ── UPDATE ────────────────────────────────────────────────────

fn parse_update(
    table: &ast::TableWithJoins,
    assignments: &[ast::Assignment],
    selection: Option<&Expr>,
) -> Result<Command, SqlError> {
    let table = table_factor_name(&table.relation)?;
    let mut set: Vec<(String, &Expr)> = Vec::with_capacity(assignments.len());
    for a in assignments {
        let column = match &a.target {
            AssignmentTarget::ColumnName(name) => object_name_last(name),
            AssignmentTarget::Tuple(_) => None,
        }
        .ok_or_else(|| SqlError::Unsupported("tuple assignment".into()))?;
        set.push((column, &a.value));
    }
    let filters = Filters::collect(selection)?;

    match table.as_str() {
        "resources" => {
            let mut name = None;
            let mut description = None;
            let mut location = None;
            for (column, value) in set {
                match column.as_str() {
                    "name" => name = Some(parse_string(value)?),
                    "description" => description = Some(parse_string_or_null(value)?),
                    "location" => location = Some(parse_string_or_null(value)?),
                    _ => return Err(SqlError::ReadOnlyColumn(column)),
                }
            }
            Ok(Command::UpdateResource {
                id: filters.require("id", filters.id)?,
                name,
                description,
                location,
            })
        }
        "sessions" => match status_assignment(&set)?.as_str() {
            "unlocked" => Ok(Command::UnlockSession {
                resource_id: filters.require("resource_id", filters.resource_id)?,
                code: filters
                    .unlock_code
                    .clone()
                    .ok_or(SqlError::MissingFilter("unlock_code"))?,
            }),
            "locked" => Ok(Command::LockSessions {
                resource_id: filters.require("resource_id", filters.resource_id)?,
            }),
            other => Err(SqlError::BadStatus(other.to_string())),
        },
        "reservations" => match status_assignment(&set)?.as_str() {
            "cancelled" => Ok(Command::CancelReservation {
                id: filters.require("id", filters.id)?,
                principal_id: filters.require("principal_id", filters.principal_id)?,
            }),
            other => Err(SqlError::BadStatus(other.to_string())),
        },
        _ => Err(SqlError::UnknownTable(table)),
    }
}

/// The only writable column of sessions and reservations is `status`.
fn status_assignment(set: &[(String, &Expr)]) -> Result<String, SqlError> {
    match set {
        [(column, value)] if column == "status" => Ok(parse_string(value)?.to_lowercase()),
        [(column, _)] => Err(SqlError::ReadOnlyColumn(column.clone())),
        _ => Err(SqlError::Unsupported("expected exactly SET status = '...'".into())),
    }
}

// ── DELETE ────────────────────────────────────────────────────

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    let filters = Filters::collect(delete.selection.as_ref())?;
    let id = filters.require("id", filters.id)?;

    match table.as_str() {
        "resources" => Ok(Command::DeleteResource { id }),
        "reservations" => Ok(Command::DeleteReservation { id }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

// ── SELECT ────────────────────────────────────────────────────

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    if select.from.is_empty() {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    }
    let table = table_factor_name(&select.from[0].relation)?;
    let filters = Filters::collect(select.selection.as_ref())?;

    match table.as_str() {
        "resources" => Ok(Command::SelectResources { id: filters.id }),
        "reservations" => {
            let filter = match (filters.resource_id, filters.principal_id) {
                (Some(_), Some(_)) => {
                    return Err(SqlError::Unsupported(
                        "filter reservations by resource_id or principal_id, not both".into(),
                    ));
                }
                (Some(rid), None) => ReservationFilter::Resource(rid),
                (None, Some(pid)) => ReservationFilter::Principal(pid),
                (None, None) => ReservationFilter::All,
            };
            let window = match (filters.start, filters.end) {
                (Some(s), Some(e)) => Some((s, e)),
                (None, None) => None,
                (None, Some(_)) => return Err(SqlError::MissingFilter("start")),
                (Some(_), None) => return Err(SqlError::MissingFilter("end")),
            };
            Ok(Command::SelectReservations { filter, window })
        }
        "sessions" => Ok(Command::SelectSession {
            reservation_id: filters.require("reservation_id", filters.reservation_id)?,
        }),
        "eligibility" => Ok(Command::SelectEligibility {
            resource_id: filters.require("resource_id", filters.resource_id)?,
        }),
        "stats" => Ok(Command::SelectStats),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

// ── WHERE clauses ─────────────────────────────────────────────

/// Conjunctive equality/range filters pulled out of a WHERE clause.
#[derive(Debug, Default)]
struct Filters {
    id: Option<i64>,
    resource_id: Option<ResourceId>,
    principal_id: Option<PrincipalId>,
    reservation_id: Option<ReservationId>,
    unlock_code: Option<String>,
    start: Option<Ms>,
    end: Option<Ms>,
}

impl Filters {
    fn collect(selection: Option<&Expr>) -> Result<Self, SqlError> {
        let mut filters = Filters::default();
        if let Some(expr) = selection {
            filters.visit(expr)?;
        }
        Ok(filters)
    }

    fn visit(&mut self, expr: &Expr) -> Result<(), SqlError> {
        match expr {
            Expr::Nested(inner) => self.visit(inner),
            Expr::BinaryOp { left, op, right } => match op {
                ast::BinaryOperator::And => {
                    self.visit(left)?;
                    self.visit(right)
                }
                ast::BinaryOperator::Eq => {
                    match expr_column_name(left).as_deref() {
                        Some("id") => self.id = Some(parse_i64(right)?),
                        Some("resource_id") => self.resource_id = Some(parse_i64(right)?),
                        Some("principal_id") => self.principal_id = Some(parse_i64(right)?),
                        Some("reservation_id") => self.reservation_id = Some(parse_i64(right)?),
                        Some("unlock_code") => self.unlock_code = Some(parse_string(right)?),
                        Some(other) => return Err(SqlError::UnsupportedFilter(other.to_string())),
                        None => return Err(SqlError::Parse(format!("expected column, got {left}"))),
                    }
                    Ok(())
                }
                ast::BinaryOperator::GtEq if expr_column_name(left).as_deref() == Some("start") => {
                    self.start = Some(parse_i64(right)?);
                    Ok(())
                }
                ast::BinaryOperator::LtEq if expr_column_name(left).as_deref() == Some("end") => {
                    self.end = Some(parse_i64(right)?);
                    Ok(())
                }
                _ => Err(SqlError::Unsupported(format!("WHERE {expr}"))),
            },
            _ => Err(SqlError::Unsupported(format!("WHERE {expr}"))),
        }
    }

    fn require<T>(&self, column: &'static str, value: Option<T>) -> Result<T, SqlError> {
        value.ok_or(SqlError::MissingFilter(column))
    }
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    if let Some(first) = tables_with_joins.first() {
        table_factor_name(&first.relation)
    } else {
        Err(SqlError::Parse("DELETE without table".into()))
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn extract_insert_values(insert: &ast::Insert) -> Result<&[Expr], SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => match values.rows.as_slice() {
            [row] => Ok(row.as_slice()),
            [] => Err(SqlError::Parse("empty VALUES".into())),
            _ => Err(SqlError::Unsupported("multi-row INSERT".into())),
        },
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

/// Integers arrive bare or, from bound parameters, as quoted text.
fn parse_i64(expr: &Expr) -> Result<i64, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Number(s, _) | Value::SingleQuotedString(s) => s
                .trim()
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad integer {s:?}: {e}"))),
            _ => Err(SqlError::Parse(format!("expected integer, got {value}"))),
        }
    } else if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        Ok(-parse_i64(expr)?)
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr}")))
    }
}

fn parse_string(expr: &Expr) -> Result<String, SqlError> {
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s)) => Ok(s.clone()),
        Some(value) => Err(SqlError::Parse(format!("expected string, got {value}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr}"))),
    }
}

fn parse_string_or_null(expr: &Expr) -> Result<Option<String>, SqlError> {
    match extract_value(expr) {
        Some(Value::Null) => Ok(None),
        _ => parse_string(expr).map(Some),
    }
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    WrongArity(usize, usize),
    MissingColumn(&'static str, &'static str),
    MissingFilter(&'static str),
    UnsupportedFilter(String),
    ReadOnlyColumn(String),
    BadStatus(String),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::WrongArity(columns, values) => {
                write!(f, "{columns} columns but {values} values")
            }
            SqlError::MissingColumn(t, c) => write!(f, "{t}: missing column {c}"),
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
            SqlError::UnsupportedFilter(col) => write!(f, "cannot filter on {col}"),
            SqlError::ReadOnlyColumn(col) => write!(f, "column {col} cannot be updated"),
            SqlError::BadStatus(s) => write!(f, "unsupported status transition to {s:?}"),
        }
    }
}

impl std::error::Error for SqlError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_insert_resource_positional() {
        let cmd = parse_sql("INSERT INTO resources VALUES (1, 'PC-01', 'Workstation', 'Lab A')").unwrap();
        assert_eq!(
            cmd,
            Command::InsertResource {
                id: 1,
                name: "PC-01".into(),
                description: Some("Workstation".into()),
                location: Some("Lab A".into()),
            }
        );
    }

    #[test]
    fn parse_insert_resource_named_columns() {
        let cmd = parse_sql("INSERT INTO resources (name, id) VALUES ('PC-02', 2)").unwrap();
        assert_eq!(
            cmd,
            Command::InsertResource {
                id: 2,
                name: "PC-02".into(),
                description: None,
                location: None,
            }
        );
    }

    #[test]
    fn parse_insert_resource_null_description() {
        let cmd = parse_sql("INSERT INTO resources (id, name, description) VALUES (3, 'PC-03', NULL)").unwrap();
        assert!(matches!(cmd, Command::InsertResource { description: None, .. }));
    }

    #[test]
    fn parse_insert_resource_missing_name() {
        let err = parse_sql("INSERT INTO resources (id) VALUES (3)").unwrap_err();
        assert!(matches!(err, SqlError::MissingColumn("resources", "name")));
    }

    #[test]
    fn parse_insert_reservation() {
        let sql = r#"INSERT INTO reservations (resource_id, principal_id, "group", start, "end")
                     VALUES (1, 7, 'user', 1767261600000, 1767265200000)"#;
        assert_eq!(
            parse_sql(sql).unwrap(),
            Command::InsertReservation {
                resource_id: 1,
                principal_id: 7,
                group: "user".into(),
                start: 1_767_261_600_000,
                end: 1_767_265_200_000,
            }
        );
    }

    #[test]
    fn parse_insert_reservation_quoted_numbers() {
        // Bound parameters are substituted as quoted text.
        let sql = r#"INSERT INTO reservations (resource_id, principal_id, "group", start, "end")
                     VALUES ('1', '7', 'user', '1000', '2000')"#;
        assert!(matches!(
            parse_sql(sql).unwrap(),
            Command::InsertReservation { resource_id: 1, principal_id: 7, start: 1000, end: 2000, .. }
        ));
    }

    #[test]
    fn parse_insert_arity_mismatch() {
        let err = parse_sql("INSERT INTO resources (id, name) VALUES (1)").unwrap_err();
        assert!(matches!(err, SqlError::WrongArity(2, 1)));
    }

    #[test]
    fn parse_update_resource_partial() {
        let cmd = parse_sql("UPDATE resources SET location = 'Lab B', description = NULL WHERE id = 4").unwrap();
        assert_eq!(
            cmd,
            Command::UpdateResource {
                id: 4,
                name: None,
                description: Some(None),
                location: Some(Some("Lab B".into())),
            }
        );
    }

    #[test]
    fn parse_update_resource_rejects_id() {
        let err = parse_sql("UPDATE resources SET id = 5 WHERE id = 4").unwrap_err();
        assert!(matches!(err, SqlError::ReadOnlyColumn(c) if c == "id"));
    }

    #[test]
    fn parse_unlock() {
        let cmd = parse_sql("UPDATE sessions SET status = 'unlocked' WHERE resource_id = 1 AND unlock_code = 'ABC12345'")
            .unwrap();
        assert_eq!(
            cmd,
            Command::UnlockSession {
                resource_id: 1,
                code: "ABC12345".into(),
            }
        );
    }

    #[test]
    fn parse_unlock_requires_code() {
        let err = parse_sql("UPDATE sessions SET status = 'unlocked' WHERE resource_id = 1").unwrap_err();
        assert!(matches!(err, SqlError::MissingFilter("unlock_code")));
    }

    #[test]
    fn parse_lock() {
        let cmd = parse_sql("UPDATE sessions SET status = 'LOCKED' WHERE resource_id = 9").unwrap();
        assert_eq!(cmd, Command::LockSessions { resource_id: 9 });
    }

    #[test]
    fn parse_cancel() {
        let cmd = parse_sql("UPDATE reservations SET status = 'cancelled' WHERE id = 12 AND principal_id = 7").unwrap();
        assert_eq!(cmd, Command::CancelReservation { id: 12, principal_id: 7 });
    }

    #[test]
    fn parse_cancel_requires_principal() {
        let err = parse_sql("UPDATE reservations SET status = 'cancelled' WHERE id = 12").unwrap_err();
        assert!(matches!(err, SqlError::MissingFilter("principal_id")));
    }

    #[test]
    fn parse_reservation_status_other_than_cancel() {
        let err = parse_sql("UPDATE reservations SET status = 'active' WHERE id = 12 AND principal_id = 7").unwrap_err();
        assert!(matches!(err, SqlError::BadStatus(s) if s == "active"));
    }

    #[test]
    fn parse_deletes() {
        assert_eq!(parse_sql("DELETE FROM resources WHERE id = 3").unwrap(), Command::DeleteResource { id: 3 });
        assert_eq!(
            parse_sql("DELETE FROM reservations WHERE id = 8").unwrap(),
            Command::DeleteReservation { id: 8 }
        );
        assert!(matches!(
            parse_sql("DELETE FROM resources").unwrap_err(),
            SqlError::MissingFilter("id")
        ));
    }

    #[test]
    fn parse_selects() {
        assert_eq!(
            parse_sql("SELECT * FROM resources").unwrap(),
            Command::SelectResources { id: None }
        );
        assert_eq!(
            parse_sql("SELECT * FROM eligibility WHERE resource_id = 1").unwrap(),
            Command::SelectEligibility { resource_id: 1 }
        );
        assert_eq!(
            parse_sql("SELECT * FROM sessions WHERE reservation_id = 5").unwrap(),
            Command::SelectSession { reservation_id: 5 }
        );
        assert_eq!(parse_sql("SELECT * FROM stats").unwrap(), Command::SelectStats);
    }

    #[test]
    fn parse_select_reservations_filters() {
        assert_eq!(
            parse_sql("SELECT * FROM reservations").unwrap(),
            Command::SelectReservations {
                filter: ReservationFilter::All,
                window: None,
            }
        );
        assert_eq!(
            parse_sql(r#"SELECT * FROM reservations WHERE resource_id = 2 AND start >= 100 AND "end" <= 200"#).unwrap(),
            Command::SelectReservations {
                filter: ReservationFilter::Resource(2),
                window: Some((100, 200)),
            }
        );
        assert_eq!(
            parse_sql("SELECT * FROM reservations WHERE principal_id = 7").unwrap(),
            Command::SelectReservations {
                filter: ReservationFilter::Principal(7),
                window: None,
            }
        );
    }

    #[test]
    fn parse_select_half_window_rejected() {
        let err = parse_sql("SELECT * FROM reservations WHERE start >= 100").unwrap_err();
        assert!(matches!(err, SqlError::MissingFilter("end")));
    }

    #[test]
    fn parse_unknown_filter_rejected() {
        let err = parse_sql("SELECT * FROM reservations WHERE status = 'active'").unwrap_err();
        assert!(matches!(err, SqlError::UnsupportedFilter(c) if c == "status"));
    }

    #[test]
    fn parse_keyword_commands() {
        assert_eq!(parse_sql("SWEEP").unwrap(), Command::Sweep);
        assert_eq!(parse_sql("sweep;").unwrap(), Command::Sweep);
        assert_eq!(
            parse_sql("LISTEN resource_1").unwrap(),
            Command::Listen { channel: "resource_1".into() }
        );
        assert_eq!(
            parse_sql("UNLISTEN resource_1;").unwrap(),
            Command::Unlisten { channel: "resource_1".into() }
        );
        assert_eq!(parse_sql("UNLISTEN *").unwrap(), Command::UnlistenAll);
    }

    #[test]
    fn parse_unknown_table() {
        let err = parse_sql("SELECT * FROM users").unwrap_err();
        assert!(matches!(err, SqlError::UnknownTable(t) if t == "users"));
    }

    #[test]
    fn parse_empty() {
        assert!(matches!(parse_sql("   ").unwrap_err(), SqlError::Empty));
    }

    #[test]
    fn parse_negative_number() {
        let cmd = parse_sql("SELECT * FROM eligibility WHERE resource_id = -1").unwrap();
        assert_eq!(cmd, Command::SelectEligibility { resource_id: -1 });
    }
}
