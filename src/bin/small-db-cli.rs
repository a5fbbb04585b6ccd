//! Thin REPL client (spec §1 "CLI/network REPL" is out of scope as a
//! design concern; this just wires stdin lines into
//! `sql::handler::execute` and prints the result per spec §6 "Result
//! output").

use std::fs::OpenOptions;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use small_db::{config::DbConfig, database::Database, sql::session::Session, sql::QueryResult, utils::init_log};

fn print_result(result: &QueryResult, out: &mut impl Write) -> io::Result<()> {
    match result {
        QueryResult::Rows { columns, rows } => {
            writeln!(out, "{}", columns.join("|"))?;
            for row in rows {
                writeln!(out, "{}", row.join("|"))?;
            }
        }
        QueryResult::Affected(n) => writeln!(out, "({} rows affected)", n)?,
        QueryResult::Message(msg) => writeln!(out, "{}", msg)?,
    }
    Ok(())
}

fn main() -> ExitCode {
    init_log();

    let db_name = std::env::args().nth(1).unwrap_or_else(|| "default_db".to_string());
    let db = match Database::open(DbConfig::default(), &db_name) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("failed to open database {}: {}", db_name, e);
            return ExitCode::FAILURE;
        }
    };

    let mut session = Session::new();
    let mut output_file = match OpenOptions::new().create(true).append(true).open("output.txt") {
        Ok(f) => f,
        Err(e) => {
            eprintln!("failed to open output.txt: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let stdin = io::stdin();
    let stdout = io::stdout();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("i/o error reading stdin: {}", e);
                return ExitCode::FAILURE;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match small_db::sql::execute(&db, &mut session, line) {
            Ok(result) => {
                let mut handle = stdout.lock();
                let _ = print_result(&result, &mut handle);
                let _ = print_result(&result, &mut output_file);
            }
            Err(e) => eprintln!("error: {}", e),
        }
    }

    ExitCode::SUCCESS
}
