use serde_json::{json, Value};

use crate::cli::OutputFormat;

/// Output a success message in the appropriate format
pub fn output_success(output_format: &OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let (Some(Value::Object(extra)), Some(target)) = (data, response.as_object_mut()) {
                target.extend(extra);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output an error message in the appropriate format
pub fn output_error(output_format: &OutputFormat, message: &str, details: Option<&str>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": false,
                "error": message
            });

            if let Some(details) = details {
                response["details"] = json!(details);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => match details {
            Some(details) => eprintln!("Error: {} ({})", message, details),
            None => eprintln!("Error: {}", message),
        },
    }
    Ok(())
}

/// Read a JSON document from a file path, or stdin when the path is `-`
pub fn read_json_input(path: &str) -> anyhow::Result<Value> {
    let raw = if path == "-" {
        std::io::read_to_string(std::io::stdin())?
    } else {
        std::fs::read_to_string(path).map_err(|e| anyhow::anyhow!("failed to read {}: {}", path, e))?
    };
    serde_json::from_str(&raw).map_err(|e| anyhow::anyhow!("invalid JSON in {}: {}", path, e))
}
