//! Parameterised `SELECT` construction.
//!
//! Only table and column names from static declarations are written into the
//! SQL text. Every caller-supplied value, and every JSON path, is bound as a
//! parameter.

use dictstore_core::query::{Filter, MatchMode, SortDirection};
use rusqlite::{
  Connection, Row, functions::FunctionFlags, params_from_iter,
  types::Value as SqlValue,
};

use crate::encode::filter_to_sql;

/// Unicode lowercase folding; SQLite's own `lower()` only folds ASCII.
const FOLD: &str = "fold";

/// Register the scalar functions the builder emits. Must run once on every
/// connection before a wildcard filter is executed.
pub fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
  conn.create_scalar_function(
    FOLD,
    1,
    FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
    |ctx| Ok(ctx.get::<Option<String>>(0)?.map(|s| s.to_lowercase())),
  )
}

/// Where a field lives: a real column, or a top-level key of the JSON body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
  Column(&'static str),
  Json(&'static str),
}

impl Target {
  /// The SQL expression for this target, pushing any parameter it needs.
  fn expr(self, params: &mut Vec<SqlValue>) -> String {
    match self {
      Self::Column(name) => name.to_owned(),
      Self::Json(field) => {
        params.push(SqlValue::Text(format!("$.{field}")));
        "json_extract(body, ?)".to_owned()
      }
    }
  }
}

/// A conjunction of conditions over one table.
#[derive(Debug, Clone)]
pub struct Select {
  table:   &'static str,
  clauses: Vec<String>,
  params:  Vec<SqlValue>,
}

impl Select {
  pub fn new(table: &'static str) -> Self {
    Self { table, clauses: Vec::new(), params: Vec::new() }
  }

  /// `column = value`.
  pub fn eq(mut self, column: &'static str, value: impl Into<SqlValue>) -> Self {
    self.clauses.push(format!("{column} = ?"));
    self.params.push(value.into());
    self
  }

  /// `column <> value`.
  pub fn ne(mut self, column: &'static str, value: impl Into<SqlValue>) -> Self {
    self.clauses.push(format!("{column} <> ?"));
    self.params.push(value.into());
    self
  }

  /// Apply one declared filter. Exact mode compares typed values; wildcard
  /// mode is a case-insensitive substring match on the field as text.
  pub fn filter(mut self, target: Target, filter: &Filter) -> Self {
    let expr = target.expr(&mut self.params);
    match filter.mode {
      MatchMode::Exact => {
        self.clauses.push(format!("{expr} = ?"));
        self.params.push(filter_to_sql(&filter.value));
      }
      MatchMode::Wildcard => {
        self.clauses.push(format!(
          "instr({FOLD}(CAST({expr} AS TEXT)), {FOLD}(?)) > 0"
        ));
        self.params.push(SqlValue::Text(filter.value.to_string()));
      }
    }
    self
  }

  /// `target IN (values...)`. An empty list matches nothing.
  pub fn one_of(mut self, target: Target, values: Vec<SqlValue>) -> Self {
    if values.is_empty() {
      self.clauses.push("0".to_owned());
      return self;
    }
    let expr = target.expr(&mut self.params);
    let marks = vec!["?"; values.len()].join(", ");
    self.clauses.push(format!("{expr} IN ({marks})"));
    self.params.extend(values);
    self
  }

  fn where_clause(&self) -> String {
    if self.clauses.is_empty() {
      String::new()
    } else {
      format!(" WHERE {}", self.clauses.join(" AND "))
    }
  }

  /// Number of matching rows.
  pub fn count(&self, conn: &Connection) -> rusqlite::Result<u64> {
    let sql = format!("SELECT COUNT(*) FROM {}{}", self.table, self.where_clause());
    let n: i64 =
      conn.query_row(&sql, params_from_iter(self.params.iter()), |r| r.get(0))?;
    Ok(u64::try_from(n).unwrap_or_default())
  }

  /// One sorted page. Ties on the sort key fall back to insertion order so
  /// consecutive pages never overlap.
  pub fn page<T, F>(
    &self,
    conn: &Connection,
    columns: &str,
    sort: Target,
    direction: SortDirection,
    limit: u32,
    offset: u32,
    map: F,
  ) -> rusqlite::Result<Vec<T>>
  where
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
  {
    let mut params = self.params.clone();
    let order = sort.expr(&mut params);
    params.push(SqlValue::Integer(i64::from(limit)));
    params.push(SqlValue::Integer(i64::from(offset)));

    let sql = format!(
      "SELECT {columns} FROM {}{} ORDER BY {order} {}, rowid ASC LIMIT ? OFFSET ?",
      self.table,
      self.where_clause(),
      direction.as_sql(),
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(params.iter()), map)?;
    rows.collect()
  }

  /// Every matching row in insertion order.
  pub fn all<T, F>(
    &self,
    conn: &Connection,
    columns: &str,
    map: F,
  ) -> rusqlite::Result<Vec<T>>
  where
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
  {
    let sql = format!(
      "SELECT {columns} FROM {}{} ORDER BY rowid ASC",
      self.table,
      self.where_clause()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(self.params.iter()), map)?;
    rows.collect()
  }

  /// The first matching row, if any.
  pub fn first<T, F>(
    &self,
    conn: &Connection,
    columns: &str,
    map: F,
  ) -> rusqlite::Result<Option<T>>
  where
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
  {
    let sql = format!(
      "SELECT {columns} FROM {}{} ORDER BY rowid ASC LIMIT 1",
      self.table,
      self.where_clause()
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map(params_from_iter(self.params.iter()), map)?;
    rows.next().transpose()
  }

  /// The distinct values `target` takes across matching rows.
  pub fn distinct(
    &self,
    conn: &Connection,
    target: Target,
  ) -> rusqlite::Result<Vec<SqlValue>> {
    let mut params = Vec::new();
    let expr = target.expr(&mut params);
    params.extend(self.params.iter().cloned());

    let sql =
      format!("SELECT DISTINCT {expr} FROM {}{}", self.table, self.where_clause());
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(params.iter()), |r| r.get(0))?;
    rows.collect()
  }

  /// Delete every matching row, returning how many went.
  pub fn delete(&self, conn: &Connection) -> rusqlite::Result<u64> {
    let sql = format!("DELETE FROM {}{}", self.table, self.where_clause());
    let n = conn.execute(&sql, params_from_iter(self.params.iter()))?;
    Ok(n as u64)
  }
}

#[cfg(test)]
mod tests {
  use dictstore_core::query::Filter;

  use super::*;

  fn conn() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    register_functions(&conn).unwrap();
    conn
      .execute_batch(
        "CREATE TABLE t (body TEXT NOT NULL);
         INSERT INTO t VALUES ('{\"stem\":\"SET_STATE\",\"n\":12}');
         INSERT INTO t VALUES ('{\"stem\":\"st_reset\",\"n\":3}');
         INSERT INTO t VALUES ('{\"stem\":\"PWR_ON\",\"n\":120}');
         INSERT INTO t VALUES ('{\"stem\":\"ÉTAT_ON\",\"n\":1}');",
      )
      .unwrap();
    conn
  }

  fn stems(conn: &Connection, select: &Select) -> Vec<String> {
    select
      .page(
        conn,
        "json_extract(body, '$.stem')",
        Target::Json("stem"),
        SortDirection::Asc,
        100,
        0,
        |r| r.get(0),
      )
      .unwrap()
  }

  #[test]
  fn wildcard_is_case_insensitive_substring() {
    let conn = conn();
    let select = Select::new("t")
      .filter(Target::Json("stem"), &Filter::wildcard("stem", "St"));
    assert_eq!(stems(&conn, &select), ["SET_STATE", "st_reset"]);
    assert_eq!(select.count(&conn).unwrap(), 2);
  }

  #[test]
  fn wildcard_folds_non_ascii_case() {
    let conn = conn();
    let select = Select::new("t")
      .filter(Target::Json("stem"), &Filter::wildcard("stem", "état"));
    assert_eq!(stems(&conn, &select), ["ÉTAT_ON"]);
  }

  #[test]
  fn exact_needs_full_equality() {
    let conn = conn();
    let select = Select::new("t")
      .filter(Target::Json("stem"), &Filter::exact("stem", "ST"));
    assert_eq!(select.count(&conn).unwrap(), 0);

    let select = Select::new("t")
      .filter(Target::Json("stem"), &Filter::exact("stem", "SET_STATE"));
    assert_eq!(stems(&conn, &select), ["SET_STATE"]);
  }

  #[test]
  fn integers_compare_typed_or_as_digits() {
    let conn = conn();
    let exact = Select::new("t")
      .filter(Target::Json("n"), &Filter::exact("n", 12_i64));
    assert_eq!(stems(&conn, &exact), ["SET_STATE"]);

    let wild = Select::new("t")
      .filter(Target::Json("n"), &Filter::wildcard("n", "12"));
    assert_eq!(stems(&conn, &wild), ["PWR_ON", "SET_STATE"]);
  }

  #[test]
  fn filter_values_are_never_sql() {
    let conn = conn();
    let select = Select::new("t").filter(
      Target::Json("stem"),
      &Filter::exact("stem", "x' OR '1'='1"),
    );
    assert_eq!(select.count(&conn).unwrap(), 0);
  }

  #[test]
  fn pages_slice_the_sorted_set() {
    let conn = conn();
    let select = Select::new("t");
    let page = select
      .page(
        &conn,
        "json_extract(body, '$.stem')",
        Target::Json("n"),
        SortDirection::Desc,
        2,
        1,
        |r| r.get::<_, String>(0),
      )
      .unwrap();
    assert_eq!(page, ["SET_STATE", "st_reset"]);
  }

  #[test]
  fn empty_in_list_matches_nothing() {
    let conn = conn();
    let select = Select::new("t").one_of(Target::Json("stem"), vec![]);
    assert_eq!(select.count(&conn).unwrap(), 0);

    let select = Select::new("t").one_of(
      Target::Json("stem"),
      vec![SqlValue::Text("PWR_ON".into()), SqlValue::Text("nope".into())],
    );
    assert_eq!(select.distinct(&conn, Target::Json("stem")).unwrap(), [
      SqlValue::Text("PWR_ON".into())
    ]);
  }
}
