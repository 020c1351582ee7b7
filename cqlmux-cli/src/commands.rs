//! Statement execution and result formatting.

use colored::Colorize;
use cqlmux_client::Connection;
use cqlmux_protocol::{Consistency, QueryResult, ResultSet, Row};

/// Executes a statement and returns the formatted output.
pub async fn execute(
    conn: &Connection,
    cql: &str,
    consistency: Consistency,
    json: bool,
) -> Result<String, Box<dyn std::error::Error>> {
    let result = conn.execute(cql, consistency).await?;
    tracing::debug!("statement returned {} result", result.kind_name());
    format_result(&result, json)
}

/// Renders a result for the terminal.
pub fn format_result(result: &QueryResult, json: bool) -> Result<String, Box<dyn std::error::Error>> {
    match result {
        QueryResult::Void => Ok("OK".green().to_string()),
        QueryResult::SetKeyspace(keyspace) => Ok(format!(
            "{} keyspace {}",
            "Using".green(),
            keyspace.cyan()
        )),
        QueryResult::Prepared => Ok(format!("{} (prepared)", "OK".green())),
        QueryResult::SchemaChange => Ok(format!("{} (schema change)", "OK".green())),
        QueryResult::Rows(rows) if json => format_json_rows(rows),
        QueryResult::Rows(rows) => Ok(format_rows(rows)),
    }
}

fn format_rows(rows: &ResultSet) -> String {
    if rows.is_empty() {
        return "(0 rows)".dimmed().to_string();
    }

    let mut output = String::new();
    for row in rows {
        output.push_str(&format_row(row));
        output.push('\n');
    }

    let summary = match rows.len() {
        1 => "(1 row)".to_string(),
        n => format!("({} rows)", n),
    };
    output.push_str(&summary.dimmed().to_string());
    if rows.paging_state().is_some() {
        output.push_str(&format!(" {}", "more pages available".yellow()));
    }
    output
}

fn format_row(row: &Row) -> String {
    let columns = row.columns();
    (0..row.len())
        .map(|i| {
            let value = match row.decode(i) {
                Ok(Some(value)) => value.to_string(),
                Ok(None) => "null".dimmed().to_string(),
                Err(_) => "<undecodable>".red().to_string(),
            };
            format!("{}={}", columns[i].name.cyan(), value)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_json_rows(rows: &ResultSet) -> Result<String, Box<dyn std::error::Error>> {
    let lines = rows
        .iter()
        .map(serde_json::to_string)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{BufMut, BytesMut};
    use cqlmux_protocol::wire;

    fn two_rows() -> QueryResult {
        let mut buf = BytesMut::new();
        buf.put_i32(0x0002);
        buf.put_i32(0x0001);
        buf.put_i32(2);
        wire::write_string(&mut buf, "app");
        wire::write_string(&mut buf, "users");
        wire::write_string(&mut buf, "id");
        buf.put_u16(0x0009);
        wire::write_string(&mut buf, "name");
        buf.put_u16(0x000D);
        buf.put_i32(2);
        wire::write_bytes(&mut buf, Some(&1i32.to_be_bytes()[..]));
        wire::write_bytes(&mut buf, Some(&b"ada"[..]));
        wire::write_bytes(&mut buf, Some(&2i32.to_be_bytes()[..]));
        wire::write_bytes(&mut buf, None);
        QueryResult::decode(buf.freeze()).unwrap()
    }

    #[test]
    fn test_format_rows_plain() {
        colored::control::set_override(false);
        let output = format_result(&two_rows(), false).unwrap();
        assert_eq!(output, "id=1, name=ada\nid=2, name=null\n(2 rows)");
    }

    #[test]
    fn test_format_rows_json() {
        let output = format_result(&two_rows(), true).unwrap();
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["id"], 1);
        assert_eq!(first["name"], "ada");
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert!(second["name"].is_null());
    }

    #[test]
    fn test_format_void_and_keyspace() {
        colored::control::set_override(false);
        assert_eq!(format_result(&QueryResult::Void, false).unwrap(), "OK");
        assert_eq!(
            format_result(&QueryResult::SetKeyspace("app".into()), false).unwrap(),
            "Using keyspace app"
        );
    }
}
