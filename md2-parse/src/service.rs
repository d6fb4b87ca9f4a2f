//! JSON request/response conversion service.
//!
//! One request in, exactly one response out:
//!
//! ```text
//! {"request_name": "ConvertMarkdownToHtml", "markdown": "..."}
//! {"result": true, "payload": "<p>...</p>"}
//! {"result": false, "reason": "..."}
//! ```

use serde_json::{Value, json};

use crate::error::ServiceError;
use crate::logging::{Level, LogSink, NOOP};
use crate::parse::Parser;
use crate::render::GeneratorContext;
use crate::render_html::{HtmlOptions, generate_html};

pub const CONVERT_MARKDOWN_TO_HTML: &str = "ConvertMarkdownToHtml";

/// Answer one decoded request.
pub fn handle_request(request: &Value) -> Value {
    handle_request_with(request, &NOOP)
}

/// Like [`handle_request`], reporting rejections and conversion
/// diagnostics to `sink`.
pub fn handle_request_with(request: &Value, sink: &dyn LogSink) -> Value {
    match convert(request, sink) {
        Ok(payload) => json!({ "result": true, "payload": payload }),
        Err(error) => failure(&error, sink),
    }
}

/// Answer one raw request body. Bodies that are not JSON fail like any other
/// bad request.
pub fn handle_raw(body: &str) -> String {
    handle_raw_with(body, &NOOP)
}

pub fn handle_raw_with(body: &str, sink: &dyn LogSink) -> String {
    let response = match serde_json::from_str::<Value>(body) {
        Ok(request) => handle_request_with(&request, sink),
        Err(e) => failure(&ServiceError::InvalidRequest(e.to_string()), sink),
    };
    response.to_string()
}

fn failure(error: &ServiceError, sink: &dyn LogSink) -> Value {
    sink.log(Level::DEBUG, &format!("request rejected: {error}"));
    json!({ "result": false, "reason": error.to_string() })
}

fn convert(request: &Value, sink: &dyn LogSink) -> Result<String, ServiceError> {
    let name = request
        .get("request_name")
        .and_then(Value::as_str)
        .ok_or(ServiceError::MissingRequestName)?;
    if name != CONVERT_MARKDOWN_TO_HTML {
        return Err(ServiceError::UnsupportedService(name.to_string()));
    }
    let markdown = request
        .get("markdown")
        .and_then(Value::as_str)
        .ok_or(ServiceError::MissingMarkdown)?;

    let tree = Parser::with_sink(sink).parse(markdown);
    let context = GeneratorContext::new().with_sink(sink);
    Ok(generate_html(&tree, &HtmlOptions::default(), &context))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::testing::MemorySink;
    use pretty_assertions::assert_eq;

    #[test]
    fn converts_markdown() {
        let response = handle_request(&json!({
            "request_name": "ConvertMarkdownToHtml",
            "markdown": "**hello**, *world!*",
        }));
        assert_eq!(
            response,
            json!({
                "result": true,
                "payload": "<p><span class='font-weight-bold'>hello</span>, <span class='font-italic'>world!</span></p>",
            })
        );
    }

    #[test]
    fn missing_request_name() {
        assert_eq!(
            handle_request(&json!({ "markdown": "a" })),
            json!({ "result": false, "reason": "Request name is missing." })
        );
    }

    #[test]
    fn unsupported_service() {
        assert_eq!(
            handle_request(&json!({ "request_name": "Shutdown", "markdown": "a" })),
            json!({ "result": false, "reason": "Unsupported service : Shutdown" })
        );
    }

    #[test]
    fn missing_markdown() {
        assert_eq!(
            handle_request(&json!({ "request_name": "ConvertMarkdownToHtml" })),
            json!({ "result": false, "reason": "Request does not contain 'markdown'." })
        );
    }

    #[test]
    fn raw_body_round_trip() {
        let response: Value =
            serde_json::from_str(&handle_raw(r#"{"request_name":"ConvertMarkdownToHtml","markdown":"a"}"#)).unwrap();
        assert_eq!(response, json!({ "result": true, "payload": "<p>a</p>" }));

        let response: Value = serde_json::from_str(&handle_raw("{not json")).unwrap();
        assert_eq!(response["result"], json!(false));
        assert!(!response["reason"].as_str().unwrap().is_empty());
    }

    #[test]
    fn rejections_go_to_the_given_sink() {
        let sink = MemorySink::default();
        handle_request_with(&json!({ "request_name": "Shutdown" }), &sink);
        handle_raw_with("{not json", &sink);

        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], (Level::DEBUG, "request rejected: Unsupported service : Shutdown".to_string()));
        assert!(entries[1].1.starts_with("request rejected: "));
    }

    #[test]
    fn accepted_requests_log_nothing() {
        let sink = MemorySink::default();
        let response = handle_raw_with(r#"{"request_name":"ConvertMarkdownToHtml","markdown":"a"}"#, &sink);
        assert!(response.contains("\"result\":true"));
        assert!(sink.entries.lock().unwrap().is_empty());
    }
}
