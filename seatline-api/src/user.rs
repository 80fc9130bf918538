use serde::Deserialize;

/// Client-supplied user identifier. Accepted as a JSON string or number and
/// always handled as a string downstream.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UserRef {
    Number(i64),
    Text(String),
}

impl UserRef {
    pub fn into_string(self) -> String {
        match self {
            UserRef::Number(n) => n.to_string(),
            UserRef::Text(s) => s,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SeatActionRequest {
    pub user_id: UserRef,
}
