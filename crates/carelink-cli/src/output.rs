use carelink_http::ClientError;
use serde_json::{json, Value};

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    pub fn is_json(self) -> bool {
        matches!(self, OutputFormat::Json)
    }
}

/// Trait for formatting CLI output
pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    fn print_json(&self, value: &Value);
    /// Prints a response body
    fn body(&self, value: &Value);
    /// Prints a failed request with its code and details
    fn request_failed(&self, error: &ClientError);
}

/// Human-readable output formatter with checkmarks and indentation
pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("\u{2713} {}", message);
    }
    fn error(&self, message: &str) {
        eprintln!("\u{2717} Error: {}", message);
    }
    fn warn(&self, message: &str) {
        eprintln!("\u{26a0} Warning: {}", message);
    }
    fn info(&self, message: &str) {
        println!("  {}", message);
    }
    fn print_json(&self, _value: &Value) {
        // Human formatter doesn't print JSON
    }
    fn body(&self, value: &Value) {
        match value {
            Value::Null => {}
            Value::String(text) => println!("{}", text),
            other => println!(
                "{}",
                serde_json::to_string_pretty(other).unwrap_or_default()
            ),
        }
    }
    fn request_failed(&self, error: &ClientError) {
        self.error(&format!("{} ({})", error, error.code()));
        if let Some(details) = error.as_api().and_then(|e| e.details()) {
            eprintln!("  details: {}", details);
        }
    }
}

/// JSON output formatter
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        println!("{}", json!({"success": true, "message": message}));
    }
    fn error(&self, message: &str) {
        eprintln!("{}", json!({"success": false, "error": message}));
    }
    fn warn(&self, message: &str) {
        eprintln!("{}", json!({"level": "warning", "message": message}));
    }
    fn info(&self, _message: &str) {}
    fn print_json(&self, value: &Value) {
        println!(
            "{}",
            serde_json::to_string_pretty(value).unwrap_or_default()
        );
    }
    fn body(&self, value: &Value) {
        self.print_json(&json!({"success": true, "data": value}));
    }
    fn request_failed(&self, error: &ClientError) {
        self.print_json(&error_json(error));
    }
}

/// JSON shape of a failed request
pub fn error_json(error: &ClientError) -> Value {
    match error {
        ClientError::Api(api) => json!({"success": false, "error": api.to_json()}),
        ClientError::Config(config) => json!({
            "success": false,
            "error": {"code": error.code(), "message": config.to_string()},
        }),
    }
}

pub fn get_formatter(json: bool) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonFormatter)
    } else {
        Box::new(HumanFormatter)
    }
}
