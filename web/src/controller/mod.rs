use serde::Serialize;
pub(crate) mod announcement_controller;
pub(crate) mod health_check_controller;
pub(crate) mod status_controller;

#[derive(Debug, Serialize)]
struct ApiResponse<T: Serialize> {
    status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(status_code: u16, data: T) -> Self {
        Self {
            status_code,
            data: Some(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[test]
    fn api_response_wraps_data_with_status() {
        let response = ApiResponse::new(
            StatusCode::OK.into(),
            json!({"connection_count": 2, "user_ids": ["a", "b"]}),
        );

        // Compare as values so key order does not matter
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            json!({"status_code": 200, "data": {"connection_count": 2, "user_ids": ["a", "b"]}})
        );
    }
}
