use serde::Serialize;

/// The body of every successful response.
#[derive(Debug, Serialize)]
pub struct SuccessResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    message: String,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn data(data: T, message: impl Into<String>) -> Self {
        SuccessResponse {
            success: true,
            data: Some(data),
            message: message.into(),
        }
    }
}

impl SuccessResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        SuccessResponse {
            success: true,
            data: None,
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Healthz<'a> {
    pub revision: Option<&'a str>,
    pub timestamp: Option<&'a str>,
    pub version: &'a str,
}
