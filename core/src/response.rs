//! Classification of a complete response into an [`Outcome`].

use serde_json::Value;

use crate::error::{Error, Outcome};
use crate::http::HttpResponse;

/// In-band failure marker of a device function call.
const FAILED_RETURN_VALUE: i64 = -1;

/// Classify a fully received response.
///
/// Order matters: the body must parse before the status is looked at, and
/// only a 200 is inspected for a failed `return_value`.
pub fn classify(response: &HttpResponse) -> Outcome {
    let body = response.body.trim();
    let data: Value = serde_json::from_str(body).map_err(|source| Error::InvalidResponse {
        body: body.to_string(),
        source,
    })?;

    if response.status != 200 {
        let text = |key: &str| data.get(key).and_then(Value::as_str).map(str::to_string);
        return Err(Error::Api {
            status: response.status,
            code: data.get("code").cloned(),
            error: text("error"),
            error_description: text("error_description"),
        });
    }

    if data.get("return_value").and_then(Value::as_i64) == Some(FAILED_RETURN_VALUE) {
        return Err(Error::ActionFailed { payload: data });
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            body: body.to_string(),
        }
    }

    #[test]
    fn success_returns_parsed_body() {
        let data = classify(&response(200, r#"[{"id":"abc","connected":true}]"#)).unwrap();
        assert_eq!(data, json!([{"id": "abc", "connected": true}]));
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let data = classify(&response(200, "\n  {\"ok\": true}\r\n")).unwrap();
        assert_eq!(data, json!({"ok": true}));
    }

    #[test]
    fn not_json_is_invalid_response() {
        let err = classify(&response(200, "not json")).unwrap_err();
        assert!(matches!(err, Error::InvalidResponse { ref body, .. } if body == "not json"));
    }

    #[test]
    fn invalid_json_wins_over_bad_status() {
        let err = classify(&response(502, "<html>Bad Gateway</html>")).unwrap_err();
        assert!(matches!(err, Error::InvalidResponse { .. }));
    }

    #[test]
    fn non_200_is_api_error_with_fields() {
        let err = classify(&response(
            404,
            r#"{"code":404,"error":"not_found","error_description":"no such device"}"#,
        ))
        .unwrap_err();
        match err {
            Error::Api {
                status,
                code,
                error,
                error_description,
            } => {
                assert_eq!(status, 404);
                assert_eq!(code, Some(json!(404)));
                assert_eq!(error.as_deref(), Some("not_found"));
                assert_eq!(error_description.as_deref(), Some("no such device"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn api_error_fields_absent_when_not_sent() {
        let err = classify(&response(401, r#"{"ok":false}"#)).unwrap_err();
        assert!(matches!(
            err,
            Error::Api {
                status: 401,
                code: None,
                error: None,
                error_description: None
            }
        ));
    }

    #[test]
    fn return_value_minus_one_is_action_failed_with_payload() {
        let err = classify(&response(200, r#"{"return_value": -1, "id": "x"}"#)).unwrap_err();
        assert_eq!(err.payload(), Some(&json!({"return_value": -1, "id": "x"})));
    }

    #[test]
    fn other_return_values_succeed() {
        let data = classify(&response(200, r#"{"return_value": 0}"#)).unwrap();
        assert_eq!(data["return_value"], 0);
        assert!(classify(&response(200, r#"{"return_value": "-1"}"#)).is_ok());
    }

    #[test]
    fn return_value_is_only_checked_on_200() {
        let err = classify(&response(400, r#"{"return_value": -1}"#)).unwrap_err();
        assert!(matches!(err, Error::Api { status: 400, .. }));
    }
}
