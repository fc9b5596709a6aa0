// Client for the `user` login type. Adds the recording, audio, file and
// device endpoints a user account can reach on top of `ApiBase`.

use crate::api::{check_response, http_error, json_str, parse_json, ApiBase, ByteChunks};
use crate::config::ClientConfig;
use crate::error::ApiError;
use reqwest::blocking::Response;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fmt::Display;
use std::ops::{Deref, DerefMut};
use std::path::Path;

/// Filters for the recording and audio queries. `Default` matches every
/// recording of any length, first page of 100.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingQuery {
    /// Inclusive lower bound on `recordingDateTime`, ISO-8601.
    pub start_date: Option<String>,
    /// Inclusive upper bound on `recordingDateTime`, ISO-8601.
    pub end_date: Option<String>,
    pub min_secs: f64,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub tag_mode: Option<String>,
    pub tags: Option<Value>,
}

impl Default for RecordingQuery {
    fn default() -> Self {
        RecordingQuery {
            start_date: None,
            end_date: None,
            min_secs: 0.0,
            limit: Some(100),
            offset: Some(0),
            tag_mode: None,
            tags: None,
        }
    }
}

impl RecordingQuery {
    /// The `where` filter sent to the server.
    pub fn where_clause(&self) -> Value {
        let mut clause = json!({ "duration": { "$gte": self.min_secs } });
        let mut range = Map::new();
        if let Some(start) = &self.start_date {
            range.insert("$gte".into(), json!(start));
        }
        if let Some(end) = &self.end_date {
            range.insert("$lte".into(), json!(end));
        }
        if !range.is_empty() {
            clause["recordingDateTime"] = Value::Object(range);
        }
        clause
    }
}

/// A logged-in (or about to log in) user.
#[derive(Clone)]
pub struct UserApi {
    base: ApiBase,
}

impl UserApi {
    /// User client with the default password.
    pub fn new(base_url: impl Into<String>, username: impl Into<String>) -> Result<Self, ApiError> {
        Self::from_config(ClientConfig::new("user", base_url, username))
    }

    pub fn from_config(config: ClientConfig) -> Result<Self, ApiError> {
        Ok(UserApi {
            base: ApiBase::new(config)?,
        })
    }

    pub fn query_recordings(&self, query: &RecordingQuery) -> Result<Vec<Value>, ApiError> {
        let mut params = vec![("where", query.where_clause().to_string())];
        if let Some(mode) = &query.tag_mode {
            params.push(("tagMode", mode.clone()));
        }
        if let Some(tags) = &query.tags {
            params.push(("tags", tags.to_string()));
        }
        self.query_results("recordings", params, query.limit, query.offset)
    }

    pub fn get_recording(&self, recording_id: impl Display) -> Result<Value, ApiError> {
        let mut body = self.send(Method::GET, &format!("/api/v1/recordings/{}", recording_id))?;
        take_field(&mut body, "recording")
    }

    pub fn delete_recording(&self, recording_id: impl Display) -> Result<Value, ApiError> {
        self.send(Method::DELETE, &format!("/api/v1/recordings/{}", recording_id))
    }

    pub fn update_recording(
        &self,
        recording_id: impl Display,
        updates: &impl Serialize,
    ) -> Result<Value, ApiError> {
        let updates = serde_json::to_string(updates)?;
        let response = self
            .request(Method::PATCH, &format!("/api/v1/recordings/{}", recording_id))?
            .form(&[("updates", updates)])
            .send()?;
        check_response(response)
    }

    /// Stream the raw (CPTV) file of a recording.
    pub fn download_cptv(&self, recording_id: impl Display) -> Result<ByteChunks, ApiError> {
        self.download_recording(recording_id, "downloadRawJWT")
    }

    /// Stream the rendered (MP4) file of a recording.
    pub fn download_mp4(&self, recording_id: impl Display) -> Result<ByteChunks, ApiError> {
        self.download_recording(recording_id, "downloadFileJWT")
    }

    /// Audio query. The audio endpoint takes its filters as headers.
    pub fn query_audio(&self, query: &RecordingQuery) -> Result<Vec<Value>, ApiError> {
        let mut request = self
            .request(Method::GET, "/api/v1/audiorecordings")?
            .header("where", query.where_clause().to_string());
        if let Some(limit) = query.limit {
            request = request.header("limit", limit.to_string());
        }
        if let Some(offset) = query.offset {
            request = request.header("offset", offset.to_string());
        }
        let mut body = query_response(request.send()?)?;
        body.get_mut("result")
            .and_then(|r| r.get_mut("rows"))
            .map(Value::take)
            .and_then(|rows| match rows {
                Value::Array(rows) => Some(rows),
                _ => None,
            })
            .ok_or(ApiError::MissingField("rows"))
    }

    pub fn get_audio(&self, recording_id: impl Display) -> Result<Value, ApiError> {
        self.send(Method::GET, &format!("/api/v1/audiorecordings/{}", recording_id))
    }

    pub fn delete_audio(&self, recording_id: impl Display) -> Result<Value, ApiError> {
        self.send(Method::DELETE, &format!("/api/v1/audiorecordings/{}", recording_id))
    }

    pub fn update_audio_recording(
        &self,
        recording_id: impl Display,
        updates: &impl Serialize,
    ) -> Result<Value, ApiError> {
        let data = serde_json::to_string(updates)?;
        let response = self
            .request(Method::PUT, &format!("/api/v1/audiorecordings/{}", recording_id))?
            .form(&[("data", data)])
            .send()?;
        check_response(response)
    }

    pub fn download_audio(&self, recording_id: impl Display) -> Result<ByteChunks, ApiError> {
        let body = self.send(Method::GET, &format!("/api/v1/audiorecordings/{}", recording_id))?;
        self.download_signed(json_str(&body, "jwt")?)
    }

    pub fn devices(&self) -> Result<Value, ApiError> {
        self.get_all("/api/v1/devices")
    }

    pub fn groups(&self) -> Result<Value, ApiError> {
        self.get_all("/api/v1/groups")
    }

    /// Id of the device called `device_name`, or `None` if this user
    /// cannot see such a device.
    pub fn device_id(&self, device_name: &str) -> Result<Option<Value>, ApiError> {
        let devices = self.devices()?;
        let rows = devices
            .get("devices")
            .and_then(|d| d.get("rows"))
            .and_then(Value::as_array)
            .ok_or(ApiError::MissingField("rows"))?;
        Ok(rows
            .iter()
            .find(|device| device.get("devicename").and_then(Value::as_str) == Some(device_name))
            .and_then(|device| device.get("id").cloned()))
    }

    pub fn create_group(&self, group_name: &str) -> Result<(), ApiError> {
        let response = self
            .request(Method::POST, "/api/v1/groups")?
            .form(&[("groupname", group_name)])
            .send()?;
        check_response(response)?;
        Ok(())
    }

    /// Raw user record. The body is returned whatever the status, so
    /// tests can inspect error payloads too.
    pub fn user_details(&self, username: &str) -> Result<Value, ApiError> {
        let response = self
            .request(Method::GET, &format!("/api/v1/users/{}", username))?
            .send()?;
        parse_json(response)
    }

    pub fn tag_recording(&self, recording_id: impl Display, tag: &impl Serialize) -> Result<(), ApiError> {
        let form = [
            ("tag", serde_json::to_string(tag)?),
            ("recordingId", recording_id.to_string()),
        ];
        let response = self.request(Method::POST, "/api/v1/tags/")?.form(&form).send()?;
        if !response.status().is_success() {
            return Err(http_error(response));
        }
        Ok(())
    }

    pub fn query_events(
        &self,
        limit: Option<u32>,
        offset: Option<u32>,
        device_id: Option<u64>,
    ) -> Result<Vec<Value>, ApiError> {
        let clause = match device_id {
            Some(id) => json!({ "DeviceId": id }).to_string(),
            None => "{}".to_string(),
        };
        self.query_results("events", vec![("where", clause)], limit, offset)
    }

    pub fn query_files(
        &self,
        where_clause: &str,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Vec<Value>, ApiError> {
        self.query_results("files", vec![("where", where_clause.to_string())], limit, offset)
    }

    pub fn upload_file(&self, path: impl AsRef<Path>, props: &impl Serialize) -> Result<String, ApiError> {
        self.upload("api/v1/files", path, props)
    }

    pub fn delete_file(&self, file_id: impl Display) -> Result<(), ApiError> {
        self.send(Method::DELETE, &format!("/api/v1/files/{}", file_id))?;
        Ok(())
    }

    /// Upload a recording on behalf of `device_name`. Without `props` the
    /// file is sent as a raw thermal recording.
    pub fn upload_recording_for(
        &self,
        device_name: &str,
        path: impl AsRef<Path>,
        props: Option<&Value>,
    ) -> Result<String, ApiError> {
        let default_props = json!({ "type": "thermalRaw" });
        let props = props.unwrap_or(&default_props);
        self.upload(&format!("/api/v1/recordings/{}", device_name), path, props)
    }

    pub fn upload_schedule(&self, device_ids: &[u64], schedule: &impl Serialize) -> Result<(), ApiError> {
        let form = [
            ("devices", serde_json::to_string(device_ids)?),
            ("schedule", serde_json::to_string(schedule)?),
        ];
        let response = self.request(Method::POST, "api/v1/schedules")?.form(&form).send()?;
        check_response(response)?;
        Ok(())
    }

    pub fn audio_schedule(&self, device_name: &str) -> Result<Value, ApiError> {
        self.send(Method::GET, &format!("/api/v1/schedules/{}", device_name))
    }

    fn download_recording(&self, recording_id: impl Display, jwt_key: &'static str) -> Result<ByteChunks, ApiError> {
        let body = self.send(Method::GET, &format!("/api/v1/recordings/{}", recording_id))?;
        self.download_signed(json_str(&body, jwt_key)?)
    }

    /// Authorized request with no body, checked for 200.
    fn send(&self, method: Method, path: &str) -> Result<Value, ApiError> {
        check_response(self.request(method, path)?.send()?)
    }

    fn get_all(&self, path: &str) -> Result<Value, ApiError> {
        let response = self
            .request(Method::GET, path)?
            .query(&[("where", "{}")])
            .send()?;
        if !response.status().is_success() {
            return Err(http_error(response));
        }
        parse_json(response)
    }

    fn query_results(
        &self,
        name: &str,
        mut params: Vec<(&'static str, String)>,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Vec<Value>, ApiError> {
        if let Some(limit) = limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(offset) = offset {
            params.push(("offset", offset.to_string()));
        }
        let response = self
            .request(Method::GET, &format!("/api/v1/{}", name))?
            .query(&params)
            .send()?;
        let mut body = query_response(response)?;
        match take_field(&mut body, "rows")? {
            Value::Array(rows) => Ok(rows),
            _ => Err(ApiError::MissingField("rows")),
        }
    }
}

impl Deref for UserApi {
    type Target = ApiBase;

    fn deref(&self) -> &ApiBase {
        &self.base
    }
}

impl DerefMut for UserApi {
    fn deref_mut(&mut self) -> &mut ApiBase {
        &mut self.base
    }
}

/// Query endpoints explain a 400 with a `messages` list.
fn query_response(response: Response) -> Result<Value, ApiError> {
    match response.status() {
        StatusCode::OK => parse_json(response),
        StatusCode::BAD_REQUEST => {
            let status = response.status().as_u16();
            let mut body = parse_json(response)?;
            Err(ApiError::BadQuery {
                status,
                messages: body.get_mut("messages").map(Value::take).unwrap_or(Value::Null),
            })
        }
        _ => Err(http_error(response)),
    }
}

fn take_field(body: &mut Value, key: &'static str) -> Result<Value, ApiError> {
    body.get_mut(key)
        .map(Value::take)
        .ok_or(ApiError::MissingField(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_query_filters_on_duration_only() {
        let clause = RecordingQuery::default().where_clause();
        assert_eq!(clause, json!({ "duration": { "$gte": 0.0 } }));
    }

    #[test]
    fn test_date_bounds_share_one_range() {
        let query = RecordingQuery {
            start_date: Some("2024-01-01T00:00:00".into()),
            end_date: Some("2024-02-01T00:00:00".into()),
            min_secs: 5.0,
            ..Default::default()
        };
        assert_eq!(
            query.where_clause(),
            json!({
                "duration": { "$gte": 5.0 },
                "recordingDateTime": {
                    "$gte": "2024-01-01T00:00:00",
                    "$lte": "2024-02-01T00:00:00"
                }
            })
        );
    }

    #[test]
    fn test_take_field() {
        let mut body = json!({ "recording": { "id": 3 } });
        assert_eq!(take_field(&mut body, "recording").unwrap(), json!({ "id": 3 }));
        assert!(matches!(
            take_field(&mut body, "rows"),
            Err(ApiError::MissingField("rows"))
        ));
    }

    #[test]
    fn test_user_api_logs_in_as_user() {
        let api = UserApi::new("http://localhost:1080", "carol").unwrap();
        assert_eq!(api.login_type(), "user");
        assert_eq!(api.login_name(), "carol");
    }
}
