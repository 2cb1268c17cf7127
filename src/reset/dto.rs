use serde::{Deserialize, Serialize};

/// Request body for reset step 1.
#[derive(Debug, Deserialize)]
pub struct RequestResetRequest {
    pub email: String,
}

/// Request body for reset step 2.
#[derive(Debug, Deserialize)]
pub struct VerifyCodeRequest {
    pub email: String,
    pub code: String,
}

/// Request body for reset step 3.
#[derive(Debug, Deserialize)]
pub struct CommitPasswordRequest {
    pub email: String,
    pub new_password: String,
}

/// Generic acknowledgement body.
#[derive(Debug, Serialize)]
pub struct Acknowledgement {
    pub message: &'static str,
}
