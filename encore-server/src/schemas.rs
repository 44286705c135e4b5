use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::StatusCode,
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use serde_json::Value;
use validator::Validate;

#[derive(Debug, Validate, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSongSchema {
    #[validate(length(min = 1))]
    pub title: String,
    #[validate(length(min = 1))]
    pub artist: String,
    pub youtube: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub favorite: bool,
    #[serde(default, deserialize_with = "lenient_key")]
    pub key: i64,
}

/// Any subset of song fields. Absent fields stay untouched.
#[derive(Debug, Default, Validate, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSongSchema {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub youtube: Option<String>,
    pub category: Option<String>,
    pub favorite: Option<bool>,
    #[serde(default, deserialize_with = "lenient_key_opt")]
    pub key: Option<i64>,
}

impl UpdateSongSchema {
    /// An update that touches nothing is rejected with a 400
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.artist.is_none()
            && self.youtube.is_none()
            && self.category.is_none()
            && self.favorite.is_none()
            && self.key.is_none()
    }
}

#[derive(Debug, Validate, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRequestSchema {
    #[validate(length(min = 1))]
    pub song: String,
}

/// The key offset arrives from form-like clients as either a number or a
/// string. Anything that doesn't parse as an integer becomes 0.
fn coerce_key(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn lenient_key<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_key(&value))
}

fn lenient_key_opt<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;

    Ok(match value {
        Value::Null => None,
        value => Some(coerce_key(&value)),
    })
}

pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let extracted_json: Json<T> = Json::from_request(req, state)
            .await
            .map_err(|_| (StatusCode::BAD_REQUEST, "JSON parse failed"))?;

        extracted_json
            .0
            .validate()
            .map_err(|_| (StatusCode::BAD_REQUEST, "Request body is invalid"))?;

        Ok(Self(extracted_json.0))
    }
}
