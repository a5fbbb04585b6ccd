//! sqlparser AST -> plan dispatch (spec §6 SQL surface). The handful of
//! statements in spec's grammar that aren't standard SQL (`CREATE INDEX
//! t (c...)` with no `ON`/index name, `DROP INDEX t (c...)`, `DESC t`,
//! `SHOW INDEX FROM t`, `ABORT`) are recognized by a small keyword
//! pre-dispatch before falling through to `sqlparser` for everything
//! else, mirroring how the source's own hand-written grammar treats
//! these as distinct productions rather than forcing them through a
//! generic "CREATE INDEX" rule.

use sqlparser::ast::{
    Assignment, BinaryOperator, Expr, ObjectType, OrderByExpr, Query, SelectItem, SetExpr,
    Statement, TableFactor, Value as SqlValue,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use crate::{
    database::Database,
    error::{aborts_transaction, SmallError, SmallResult},
    execution::{
        aggregate::{AggFn, AggregateExecutor},
        delete::DeleteExecutor,
        insert::InsertExecutor,
        nested_loop_join::NestedLoopJoinExecutor,
        sort::{SortDirection, SortExecutor},
        update::{SetClause, UpdateExecutor},
        CondOp, CondRhs, Condition, Executor,
    },
    sql::{planner::pick_scan, session::Session},
    storage::{
        schema::{ColType, TableSchema},
        tuple::Value,
    },
    transaction::txn::Transaction,
};

pub enum QueryResult {
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    Affected(usize),
    Message(String),
}

impl QueryResult {
    fn message(s: impl Into<String>) -> Self {
        QueryResult::Message(s.into())
    }
}

pub fn execute(db: &Database, session: &mut Session, sql: &str) -> SmallResult<QueryResult> {
    let trimmed = sql.trim().trim_end_matches(';').trim();
    let upper = trimmed.to_uppercase();

    match upper.as_str() {
        "BEGIN" => {
            session.begin(db)?;
            return Ok(QueryResult::message("transaction started"));
        }
        "COMMIT" => {
            session.commit(db)?;
            return Ok(QueryResult::message("transaction committed"));
        }
        "ABORT" | "ROLLBACK" => {
            session.rollback(db)?;
            return Ok(QueryResult::message("transaction rolled back"));
        }
        "SHOW TABLES" => return Ok(show_tables(db)),
        _ => {}
    }

    if let Some(rest) = strip_ci(trimmed, &upper, "DESC ") {
        return desc_table(db, rest.trim());
    }
    if let Some(rest) = strip_ci(trimmed, &upper, "SHOW INDEX FROM ") {
        return show_index(db, rest.trim());
    }
    if let Some(rest) = strip_ci(trimmed, &upper, "CREATE INDEX ") {
        let (table, cols) = parse_table_and_cols(rest)?;
        db.catalog.create_index(&table, &cols)?;
        return Ok(QueryResult::message(format!("index created on {}", table)));
    }
    if let Some(rest) = strip_ci(trimmed, &upper, "DROP INDEX ") {
        let (table, cols) = parse_table_and_cols(rest)?;
        db.catalog.drop_index(&table, &cols)?;
        return Ok(QueryResult::message(format!("index dropped on {}", table)));
    }

    let dialect = GenericDialect {};
    let ast = Parser::parse_sql(&dialect, trimmed)
        .map_err(|e| SmallError::internal(format!("sql parse error: {}", e)))?;
    let stmt = ast
        .into_iter()
        .next()
        .ok_or_else(|| SmallError::internal("empty statement"))?;

    match stmt {
        Statement::CreateTable { name, columns, .. } => {
            let table = name.to_string();
            let cols = columns
                .iter()
                .map(|c| {
                    let (ty, len) = sql_type_to_col(&c.data_type)?;
                    Ok((c.name.to_string(), ty, len))
                })
                .collect::<SmallResult<Vec<_>>>()?;
            db.catalog.create_table(&table, cols)?;
            Ok(QueryResult::message(format!("table {} created", table)))
        }
        Statement::Drop {
            object_type: ObjectType::Table,
            names,
            ..
        } => {
            for name in names {
                db.catalog.drop_table(&name.to_string())?;
            }
            Ok(QueryResult::message("table dropped"))
        }
        Statement::Insert {
            table_name,
            source,
            ..
        } => run_stmt(db, session, |db, txn| {
            execute_insert(db, txn, &table_name.to_string(), &source)
        }),
        Statement::Delete {
            from, selection, ..
        } => {
            let table = first_table_name(&from)?;
            run_stmt(db, session, |db, txn| {
                execute_delete(db, txn, &table, selection.as_ref())
            })
        }
        Statement::Update {
            table,
            assignments,
            selection,
            ..
        } => {
            let table_name = table_factor_name(&table.relation)?;
            run_stmt(db, session, |db, txn| {
                execute_update(db, txn, &table_name, &assignments, selection.as_ref())
            })
        }
        Statement::Query(query) => run_stmt(db, session, |db, txn| execute_select(db, txn, &query)),
        other => Err(SmallError::internal(format!(
            "unsupported statement: {}",
            other
        ))),
    }
}

fn strip_ci<'a>(trimmed: &'a str, upper: &str, prefix: &str) -> Option<&'a str> {
    if upper.starts_with(prefix) {
        Some(&trimmed[prefix.len()..])
    } else {
        None
    }
}

fn parse_table_and_cols(rest: &str) -> SmallResult<(String, Vec<String>)> {
    let open = rest
        .find('(')
        .ok_or_else(|| SmallError::internal("expected column list in parentheses"))?;
    let close = rest
        .rfind(')')
        .ok_or_else(|| SmallError::internal("expected closing parenthesis"))?;
    let table = rest[..open].trim().to_string();
    let cols = rest[open + 1..close]
        .split(',')
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    Ok((table, cols))
}

fn run_stmt<F>(db: &Database, session: &mut Session, f: F) -> SmallResult<QueryResult>
where
    F: FnOnce(&Database, &mut Transaction) -> SmallResult<QueryResult>,
{
    if let Some(mut txn) = session.txn.take() {
        let result = f(db, &mut txn);
        match &result {
            Err(e) if aborts_transaction(e) => {
                let _ = db.abort(&mut txn);
            }
            _ => session.txn = Some(txn),
        }
        result
    } else {
        let mut txn = db.begin()?;
        match f(db, &mut txn) {
            Ok(r) => {
                db.commit(&mut txn)?;
                Ok(r)
            }
            Err(e) => {
                let _ = db.abort(&mut txn);
                Err(e)
            }
        }
    }
}

fn sql_type_to_col(ty: &sqlparser::ast::DataType) -> SmallResult<(ColType, usize)> {
    use sqlparser::ast::DataType;
    match ty {
        DataType::Int(_) | DataType::Integer(_) => Ok((ColType::Int, 0)),
        DataType::BigInt(_) => Ok((ColType::BigInt, 0)),
        DataType::Float(_) | DataType::Double | DataType::Real => Ok((ColType::Float, 0)),
        DataType::Datetime(_) | DataType::Timestamp(_, _) => Ok((ColType::Datetime, 0)),
        DataType::Char(Some(len)) | DataType::Varchar(Some(len)) => {
            Ok((ColType::Char, char_len(len)))
        }
        other => Err(SmallError::internal(format!("unsupported column type: {}", other))),
    }
}

fn char_len(len: &sqlparser::ast::CharacterLength) -> usize {
    match len {
        sqlparser::ast::CharacterLength::IntegerLength { length, .. } => *length as usize,
        _ => 0,
    }
}

fn show_tables(db: &Database) -> QueryResult {
    let tables = db.catalog.show_tables();
    QueryResult::Rows {
        columns: vec!["table_name".to_string()],
        rows: tables.into_iter().map(|t| vec![t]).collect(),
    }
}

fn desc_table(db: &Database, table: &str) -> SmallResult<QueryResult> {
    let schema = db.catalog.desc_table(table)?;
    let rows = schema
        .columns
        .iter()
        .map(|c| vec![c.name.clone(), format!("{:?}", c.col_type), c.len.to_string()])
        .collect();
    Ok(QueryResult::Rows {
        columns: vec!["field".into(), "type".into(), "len".into()],
        rows,
    })
}

fn show_index(db: &Database, table: &str) -> SmallResult<QueryResult> {
    let indexes = db.catalog.show_index(table)?;
    let rows = indexes
        .iter()
        .map(|ix| vec![table.to_string(), ix.cols.join(",")])
        .collect();
    Ok(QueryResult::Rows {
        columns: vec!["table_name".into(), "index_cols".into()],
        rows,
    })
}

fn first_table_name(from: &[sqlparser::ast::TableWithJoins]) -> SmallResult<String> {
    let first = from
        .first()
        .ok_or_else(|| SmallError::internal("missing FROM clause"))?;
    table_factor_name(&first.relation)
}

fn table_factor_name(factor: &TableFactor) -> SmallResult<String> {
    match factor {
        TableFactor::Table { name, .. } => Ok(name.to_string()),
        other => Err(SmallError::internal(format!("unsupported table reference: {:?}", other))),
    }
}

fn expr_to_literal(expr: &Expr, col_type: ColType) -> SmallResult<Value> {
    match expr {
        Expr::Value(SqlValue::Number(n, _)) => numeric_literal(n, col_type),
        Expr::Value(SqlValue::SingleQuotedString(s)) | Expr::Value(SqlValue::DoubleQuotedString(s)) => {
            Value::Char(s.clone().into_bytes()).coerce_to(col_type)
        }
        Expr::UnaryOp {
            op: sqlparser::ast::UnaryOperator::Minus,
            expr,
        } => match expr.as_ref() {
            Expr::Value(SqlValue::Number(n, _)) => numeric_literal(&format!("-{}", n), col_type),
            _ => Err(SmallError::internal("unsupported literal expression")),
        },
        other => Err(SmallError::internal(format!("unsupported literal expression: {}", other))),
    }
}

fn numeric_literal(n: &str, col_type: ColType) -> SmallResult<Value> {
    match col_type {
        ColType::Int => n
            .parse::<i32>()
            .map(Value::Int)
            .map_err(|_| SmallError::IncompatibleType(format!("{} is not a valid INT", n))),
        ColType::BigInt => n
            .parse::<i64>()
            .map(Value::BigInt)
            .map_err(|_| SmallError::IncompatibleType(format!("{} is not a valid BIGINT", n))),
        ColType::Float => n
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| SmallError::IncompatibleType(format!("{} is not a valid FLOAT", n))),
        _ => Err(SmallError::IncompatibleType(format!(
            "numeric literal {} not valid for {:?}",
            n, col_type
        ))),
    }
}

fn ident_tail(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(id) => Some(id.value.clone()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.clone()),
        _ => None,
    }
}

fn binop_to_condop(op: &BinaryOperator) -> Option<CondOp> {
    match op {
        BinaryOperator::Eq => Some(CondOp::Eq),
        BinaryOperator::NotEq => Some(CondOp::Ne),
        BinaryOperator::Lt => Some(CondOp::Lt),
        BinaryOperator::Gt => Some(CondOp::Gt),
        BinaryOperator::LtEq => Some(CondOp::Le),
        BinaryOperator::GtEq => Some(CondOp::Ge),
        _ => None,
    }
}

/// Splits a top-level AND conjunction into flat conditions and
/// resolves each side against `schema` (spec §4.8 "Condition
/// normalization also swaps sides so lhs refers to the scanned
/// table"); only `AND`-joined comparisons are accepted (spec §6).
fn expr_to_conditions(expr: &Expr, schema: &TableSchema) -> SmallResult<Vec<Condition>> {
    match expr {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } => {
            let mut conds = expr_to_conditions(left, schema)?;
            conds.extend(expr_to_conditions(right, schema)?);
            Ok(conds)
        }
        Expr::BinaryOp { left, op, right } => {
            let op = binop_to_condop(op)
                .ok_or_else(|| SmallError::internal("unsupported comparison operator"))?;
            let (lhs_col, rhs, op) = match (ident_tail(left), ident_tail(right)) {
                (Some(l), _) if schema.col(&l).is_some() => {
                    let rhs = match ident_tail(right) {
                        Some(r) if schema.col(&r).is_some() => CondRhs::Column(r),
                        _ => {
                            let col_type = schema.col(&l).unwrap().col_type;
                            CondRhs::Value(expr_to_literal(right, col_type)?)
                        }
                    };
                    (l, rhs, op)
                }
                (_, Some(r)) if schema.col(&r).is_some() => {
                    let col_type = schema.col(&r).unwrap().col_type;
                    (r, CondRhs::Value(expr_to_literal(left, col_type)?), Condition::flip(op))
                }
                _ => return Err(SmallError::internal("condition does not reference a known column")),
            };
            Ok(vec![Condition::new(lhs_col, op, rhs)])
        }
        Expr::Nested(inner) => expr_to_conditions(inner, schema),
        _ => Err(SmallError::internal("unsupported WHERE expression")),
    }
}

fn execute_insert(db: &Database, txn: &mut Transaction, table: &str, source: &Query) -> SmallResult<QueryResult> {
    let schema = db.catalog.desc_table(table)?;
    let rows = match source.body.as_ref() {
        SetExpr::Values(values) => &values.rows,
        _ => return Err(SmallError::internal("INSERT requires a VALUES list")),
    };

    let executor = InsertExecutor::new(&db.catalog, &db.lock_manager, &db.log_manager, table, schema.clone());
    let mut count = 0;
    for row in rows {
        if row.len() != schema.columns.len() {
            return Err(SmallError::InvalidValueCount {
                expected: schema.columns.len(),
                got: row.len(),
            });
        }
        let values = row
            .iter()
            .zip(schema.columns.iter())
            .map(|(expr, col)| expr_to_literal(expr, col.col_type))
            .collect::<SmallResult<Vec<_>>>()?;
        executor.execute(txn, &values)?;
        count += 1;
    }
    Ok(QueryResult::Affected(count))
}

fn execute_delete(db: &Database, txn: &mut Transaction, table: &str, selection: Option<&Expr>) -> SmallResult<QueryResult> {
    let schema = db.catalog.desc_table(table)?;
    let conds = match selection {
        Some(e) => expr_to_conditions(e, &schema)?,
        None => Vec::new(),
    };
    let mut child = pick_scan(&db.catalog, table, &schema, conds)?;
    let executor = DeleteExecutor::new(&db.catalog, &db.lock_manager, &db.log_manager, table, schema);
    let count = executor.execute(txn, child.as_mut())?;
    Ok(QueryResult::Affected(count))
}

fn execute_update(
    db: &Database,
    txn: &mut Transaction,
    table: &str,
    assignments: &[Assignment],
    selection: Option<&Expr>,
) -> SmallResult<QueryResult> {
    let schema = db.catalog.desc_table(table)?;
    let conds = match selection {
        Some(e) => expr_to_conditions(e, &schema)?,
        None => Vec::new(),
    };
    let mut child = pick_scan(&db.catalog, table, &schema, conds)?;

    let set_clauses = assignments
        .iter()
        .map(|a| {
            let col_name = a.id.last().map(|i| i.value.clone()).ok_or_else(|| {
                SmallError::internal("empty assignment target")
            })?;
            let col = schema
                .col(&col_name)
                .ok_or_else(|| SmallError::ColumnNotFound(col_name.clone()))?;
            Ok(SetClause {
                col: col_name,
                value: expr_to_literal(&a.value, col.col_type)?,
            })
        })
        .collect::<SmallResult<Vec<_>>>()?;

    let executor = UpdateExecutor::new(&db.catalog, &db.lock_manager, &db.log_manager, table, schema);
    let count = executor.execute(txn, child.as_mut(), &set_clauses)?;
    Ok(QueryResult::Affected(count))
}

fn execute_select(db: &Database, txn: &mut Transaction, query: &Query) -> SmallResult<QueryResult> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s.as_ref(),
        _ => return Err(SmallError::internal("only SELECT queries are supported")),
    };

    if let Some(agg) = try_build_aggregate(db, txn, select)? {
        return agg;
    }

    let tables = select
        .from
        .iter()
        .map(|t| table_factor_name(&t.relation))
        .collect::<SmallResult<Vec<_>>>()?;
    if tables.is_empty() {
        return Err(SmallError::internal("SELECT requires a FROM clause"));
    }

    db.lock_manager.lock_shared_on_table(txn, db.catalog.heap(&tables[0])?.fd)?;

    let mut schemas = Vec::with_capacity(tables.len());
    for t in &tables {
        schemas.push(db.catalog.desc_table(t)?);
    }

    let mut exec: Box<dyn Executor> = if tables.len() == 1 {
        let conds = match &select.selection {
            Some(e) => expr_to_conditions(e, &schemas[0])?,
            None => Vec::new(),
        };
        pick_scan(&db.catalog, &tables[0], &schemas[0], conds)?
    } else {
        let mut combined = schemas[0].clone();
        let mut iter = schemas.iter().skip(1);
        let mut left: Box<dyn Executor> = pick_scan(&db.catalog, &tables[0], &schemas[0], Vec::new())?;
        for (i, schema) in iter.by_ref().enumerate() {
            db.lock_manager
                .lock_shared_on_table(txn, db.catalog.heap(&tables[i + 1])?.fd)?;
            combined.columns.extend(schema.columns.iter().cloned());
            let right: Box<dyn Executor> = pick_scan(&db.catalog, &tables[i + 1], schema, Vec::new())?;
            let is_last = i + 2 == tables.len();
            let conds = if is_last {
                match &select.selection {
                    Some(e) => expr_to_conditions(e, &combined)?,
                    None => Vec::new(),
                }
            } else {
                Vec::new()
            };
            left = Box::new(NestedLoopJoinExecutor::new(
                left,
                right,
                conds,
                db.config.join_buffer_pages,
            ));
        }
        left
    };

    if !query.order_by.is_empty() {
        let keys = order_by_keys(&query.order_by)?;
        let limit = query_limit(query)?;
        exec = Box::new(SortExecutor::new(exec, keys, limit));
    } else if let Some(limit) = query_limit(query)? {
        let keys = Vec::new();
        exec = Box::new(SortExecutor::new(exec, keys, Some(limit)));
    }

    let projected = select
        .projection
        .iter()
        .map(|item| match item {
            SelectItem::Wildcard(_) => Ok(None),
            SelectItem::UnnamedExpr(e) | SelectItem::ExprWithAlias { expr: e, .. } => {
                ident_tail(e).map(Some).ok_or_else(|| SmallError::internal("unsupported projection expression"))
            }
            _ => Err(SmallError::internal("unsupported projection")),
        })
        .collect::<SmallResult<Vec<_>>>()?;

    exec.begin_tuple()?;
    let cols = exec.cols().to_vec();
    let out_cols: Vec<usize> = if projected.iter().any(|p| p.is_none()) {
        (0..cols.len()).collect()
    } else {
        projected
            .iter()
            .map(|p| {
                let name = p.as_ref().unwrap();
                cols.iter()
                    .position(|c| &c.name == name)
                    .ok_or_else(|| SmallError::ColumnNotFound(name.clone()))
            })
            .collect::<SmallResult<Vec<_>>>()?
    };

    let mut rows = Vec::new();
    while !exec.is_end() {
        let tuple = exec.current_tuple()?;
        let mut row = Vec::with_capacity(out_cols.len());
        for &idx in &out_cols {
            let col = &cols[idx];
            let v = Value::from_bytes(col.col_type, &tuple.bytes[col.offset..col.offset + col.len]);
            row.push(value_to_display(&v));
        }
        rows.push(row);
        exec.next_tuple()?;
    }

    Ok(QueryResult::Rows {
        columns: out_cols.iter().map(|&i| cols[i].name.clone()).collect(),
        rows,
    })
}

fn try_build_aggregate(
    db: &Database,
    txn: &mut Transaction,
    select: &sqlparser::ast::Select,
) -> SmallResult<Option<SmallResult<QueryResult>>> {
    if select.projection.len() != 1 || select.from.len() != 1 {
        return Ok(None);
    }
    let func = match &select.projection[0] {
        SelectItem::UnnamedExpr(Expr::Function(f)) => f,
        _ => return Ok(None),
    };
    let name = func.name.to_string().to_uppercase();
    let agg_fn = match name.as_str() {
        "MIN" => AggFn::Min,
        "MAX" => AggFn::Max,
        "SUM" => AggFn::Sum,
        "COUNT" => AggFn::Count,
        _ => return Ok(None),
    };

    let table = table_factor_name(&select.from[0].relation)?;
    let schema = db.catalog.desc_table(&table)?;
    db.lock_manager.lock_shared_on_table(txn, db.catalog.heap(&table)?.fd)?;
    let conds = match &select.selection {
        Some(e) => expr_to_conditions(e, &schema)?,
        None => Vec::new(),
    };
    let child = match pick_scan(&db.catalog, &table, &schema, conds) {
        Ok(c) => c,
        Err(e) => return Ok(Some(Err(e))),
    };

    let col_name = agg_arg_name(func);
    let mut exec = AggregateExecutor::new(child, agg_fn, &col_name);
    let result = (|| -> SmallResult<QueryResult> {
        exec.begin_tuple()?;
        let cols = exec.cols().to_vec();
        let tuple = exec.current_tuple()?;
        let col = &cols[0];
        let v = Value::from_bytes(col.col_type, &tuple.bytes[col.offset..col.offset + col.len]);
        Ok(QueryResult::Rows {
            columns: vec![col.name.clone()],
            rows: vec![vec![value_to_display(&v)]],
        })
    })();
    Ok(Some(result))
}

fn agg_arg_name(func: &sqlparser::ast::Function) -> String {
    use sqlparser::ast::{FunctionArg, FunctionArgExpr, FunctionArguments};
    let args = match &func.args {
        FunctionArguments::List(list) => &list.args,
        _ => return "*".to_string(),
    };
    match args.first() {
        Some(FunctionArg::Unnamed(FunctionArgExpr::Expr(e))) => ident_tail(e).unwrap_or_else(|| "*".to_string()),
        Some(FunctionArg::Unnamed(FunctionArgExpr::Wildcard)) => "*".to_string(),
        _ => "*".to_string(),
    }
}

fn order_by_keys(order_by: &[OrderByExpr]) -> SmallResult<Vec<(String, SortDirection)>> {
    order_by
        .iter()
        .map(|o| {
            let name = ident_tail(&o.expr).ok_or_else(|| SmallError::internal("unsupported ORDER BY expression"))?;
            let dir = if o.asc.unwrap_or(true) {
                SortDirection::Asc
            } else {
                SortDirection::Desc
            };
            Ok((name, dir))
        })
        .collect()
}

fn query_limit(query: &Query) -> SmallResult<Option<usize>> {
    match &query.limit {
        Some(Expr::Value(SqlValue::Number(n, _))) => n
            .parse::<usize>()
            .map(Some)
            .map_err(|_| SmallError::internal("invalid LIMIT value")),
        Some(_) => Err(SmallError::internal("unsupported LIMIT expression")),
        None => Ok(None),
    }
}

fn value_to_display(v: &Value) -> String {
    match v {
        Value::Int(n) => n.to_string(),
        Value::BigInt(n) => n.to_string(),
        Value::Float(n) => n.to_string(),
        Value::Char(bytes) => String::from_utf8_lossy(bytes).trim_end_matches('\0').to_string(),
        Value::Datetime(n) => n.to_string(),
    }
}
