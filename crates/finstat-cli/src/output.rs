use serde_json::Value;

use crate::cli::OutputFormat;
use crate::error::CliError;

pub fn render(value: &Value, format: OutputFormat, pretty: bool) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            let payload = if pretty {
                serde_json::to_string_pretty(value)?
            } else {
                serde_json::to_string(value)?
            };
            println!("{payload}");
        }
        OutputFormat::Table => render_table(value),
    }

    Ok(())
}

/// Shallow key/value table. Nested structures are summarized, not expanded;
/// use the JSON format for the full payload.
fn render_table(value: &Value) {
    match value {
        Value::Object(map) => {
            for (key, entry) in map {
                println!("{key:<28} {}", summarize(entry));
            }
        }
        Value::Array(items) => {
            for item in items {
                println!("{}", summarize(item));
            }
        }
        other => println!("{other}"),
    }
}

fn summarize(value: &Value) -> String {
    match value {
        Value::Null => String::from("-"),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => format!("[{} item(s)]", items.len()),
        Value::Object(map) => format!("{{{} field(s)}}", map.len()),
    }
}
