//! Talking to the postal directory: building the request for a settled code
//! and turning whatever comes back into a [`LookupOutcome`].

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::capabilities::{HttpError, HttpRequest, HttpResult};
use crate::model::{LookupConfig, LookupToken, PostOffice, Query};
use crate::AppError;

const SUCCESS_STATUS: &str = "Success";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LookupResult {
    Success {
        offices: Vec<PostOffice>,
        message: Option<String>,
    },
    Empty,
}

impl LookupResult {
    pub fn offices(&self) -> &[PostOffice] {
        match self {
            LookupResult::Success { offices, .. } => offices,
            LookupResult::Empty => &[],
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum LookupOutcome {
    Completed(LookupResult),
    Failed(AppError),
    /// The transport was aborted. Never surfaced to the user.
    Cancelled,
}

/// One element of the directory's top-level JSON array.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DirectoryEntry {
    status: Option<String>,
    message: Option<String>,
    post_office: Option<Vec<PostOffice>>,
}

pub fn build_request(
    config: &LookupConfig,
    code: &Query,
    token: LookupToken,
) -> Result<HttpRequest, HttpError> {
    let url = config.endpoint().join_segment(code.as_str())?;
    Ok(HttpRequest::get(url)
        .with_header("Accept", "application/json")?
        .with_request_id(token.request_id()))
}

pub fn classify(result: &HttpResult) -> LookupOutcome {
    match result {
        Err(e) if e.is_aborted() => LookupOutcome::Cancelled,
        Err(e) => LookupOutcome::Failed(AppError::from(e.clone())),
        Ok(response) if !response.is_success() => LookupOutcome::Failed(
            AppError::network(format!("unexpected HTTP status {}", response.status()))
                .with_context("http_status", response.status().to_string())
                .with_context("request_id", response.request_id()),
        ),
        Ok(response) => {
            let result = parse_payload(response.body());
            if result == LookupResult::Empty {
                debug!(
                    request_id = response.request_id(),
                    content_type = response.header("Content-Type").unwrap_or("unknown"),
                    "lookup returned no data"
                );
            }
            LookupOutcome::Completed(result)
        }
    }
}

/// Anything other than `[{"Status": "Success", "PostOffice": [..non-empty..]}, ..]`
/// counts as no data.
pub fn parse_payload(body: &[u8]) -> LookupResult {
    let entries = match serde_json::from_slice::<Vec<DirectoryEntry>>(body) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(error = %e, "lookup payload did not match the expected shape");
            return LookupResult::Empty;
        }
    };

    let Some(entry) = entries.into_iter().next() else {
        return LookupResult::Empty;
    };

    if entry.status.as_deref() != Some(SUCCESS_STATUS) {
        debug!(status = ?entry.status, message = ?entry.message, "lookup reported no success");
        return LookupResult::Empty;
    }

    match entry.post_office {
        Some(offices) if !offices.is_empty() => LookupResult::Success {
            offices,
            message: entry.message,
        },
        _ => LookupResult::Empty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{HttpHeaders, HttpResponse};
    use crate::ErrorKind;
    use assert_matches::assert_matches;

    const DELHI: &str = r#"[{
        "Message": "Number of pincode(s) found:1",
        "Status": "Success",
        "PostOffice": [{
            "Name": "Connaught Place",
            "Description": null,
            "BranchType": "Sub Post Office",
            "DeliveryStatus": "Non-Delivery",
            "Circle": "Delhi",
            "District": "New Delhi",
            "Division": "New Delhi Central",
            "Region": "Delhi",
            "Block": "New Delhi",
            "State": "Delhi",
            "Country": "India",
            "Pincode": "110001"
        }]
    }]"#;

    fn ok(body: &str) -> HttpResult {
        Ok(HttpResponse::ok(body, "lookup-1"))
    }

    #[test]
    fn test_success_payload() {
        let outcome = classify(&ok(DELHI));
        assert_matches!(outcome, LookupOutcome::Completed(LookupResult::Success { ref offices, ref message }) => {
            assert_eq!(offices.len(), 1);
            assert_eq!(offices[0].name, "Connaught Place");
            assert_eq!(offices[0].branch_type, "Sub Post Office");
            assert_eq!(offices[0].pincode, "110001");
            assert_eq!(offices[0].country.as_deref(), Some("India"));
            assert_eq!(message.as_deref(), Some("Number of pincode(s) found:1"));
        });
    }

    #[test]
    fn test_error_status_is_empty() {
        let body = r#"[{"Message":"No records found","Status":"Error","PostOffice":null}]"#;
        assert_eq!(classify(&ok(body)), LookupOutcome::Completed(LookupResult::Empty));
        assert_eq!(parse_payload(br#"[{"Status":"Error"}]"#), LookupResult::Empty);
    }

    #[test]
    fn test_shape_deviations_are_empty() {
        for body in [
            "",
            "not json",
            "{}",
            "[]",
            r#"[{"Status":"Success"}]"#,
            r#"[{"Status":"Success","PostOffice":null}]"#,
            r#"[{"Status":"Success","PostOffice":[]}]"#,
            r#"[{"Status":"success","PostOffice":[{"Name":"X"}]}]"#,
            r#"[{"Status":"Success","PostOffice":{"Name":"X"}}]"#,
        ] {
            assert_eq!(parse_payload(body.as_bytes()), LookupResult::Empty, "{body}");
        }
    }

    #[test]
    fn test_only_first_entry_counts() {
        let body = r#"[{"Status":"Error"},{"Status":"Success","PostOffice":[{"Name":"X"}]}]"#;
        assert_eq!(parse_payload(body.as_bytes()), LookupResult::Empty);
    }

    #[test]
    fn test_http_status_failure_is_network_error() {
        let response = HttpResponse::new(503, HttpHeaders::new(), Vec::new(), "lookup-9".into());
        assert_matches!(classify(&Ok(response)), LookupOutcome::Failed(e) => {
            assert_eq!(e.kind, ErrorKind::Network);
            assert_eq!(e.context.get("http_status").map(String::as_str), Some("503"));
        });
    }

    #[test]
    fn test_html_error_page_is_no_data() {
        let mut headers = HttpHeaders::new();
        headers.insert("Content-Type", "text/html").unwrap();
        let response = HttpResponse::new(
            200,
            headers,
            b"<html>maintenance</html>".to_vec(),
            "lookup-3".into(),
        );
        assert_eq!(response.header("content-type"), Some("text/html"));
        assert_eq!(
            classify(&Ok(response)),
            LookupOutcome::Completed(LookupResult::Empty)
        );
    }

    #[test]
    fn test_transport_failure_is_network_error() {
        let result: HttpResult = Err(HttpError::Network {
            message: "connection reset".into(),
            request_id: "lookup-2".into(),
        });
        assert_matches!(classify(&result), LookupOutcome::Failed(e) => {
            assert_eq!(e.kind, ErrorKind::Network);
        });
    }

    #[test]
    fn test_abort_is_cancelled() {
        let result: HttpResult = Err(HttpError::Aborted {
            request_id: "lookup-2".into(),
        });
        assert_eq!(classify(&result), LookupOutcome::Cancelled);
    }

    #[test]
    fn test_build_request() {
        let config = LookupConfig::default();
        let request =
            build_request(&config, &Query::sanitize("110001", 6), LookupToken(4)).unwrap();
        assert_eq!(
            request.url().as_str(),
            "https://api.postalpincode.in/pincode/110001"
        );
        assert_eq!(request.request_id(), "lookup-4");
        assert_eq!(request.headers().get("Accept"), Some("application/json"));
    }

    #[test]
    fn test_build_request_rejects_empty_code() {
        let config = LookupConfig::default();
        assert!(build_request(&config, &Query::default(), LookupToken(1)).is_err());
    }
}
