//! JSON output for CLI commands
//!
//! Each command writes exactly one JSON line to stdout: the data it
//! produced, or the error that stopped it.

use std::io::{self, Write};

use serde_json::{json, Value};

use super::errors::{CliError, CliResult};

fn write_line(value: &Value) -> CliResult<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, value)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}

pub fn write_response(data: Value) -> CliResult<()> {
    write_line(&json!({ "status": "ok", "data": data }))
}

pub fn write_error(err: &CliError) -> CliResult<()> {
    write_line(&json!({
        "status": "error",
        "code": err.code().as_str(),
        "message": err.message(),
    }))
}
