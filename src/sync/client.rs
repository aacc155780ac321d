//! HTTP client for the cardholder-management API.

use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ApiConfig;
use crate::error::PipelineError;
use crate::record::UpdateCommand;

/// Wire format of the photo-update timestamp field.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Sync collaborator: applies one `UpdateCommand` to the external system.
pub trait SyncApi: Send + Sync {
    fn apply(&self, command: &UpdateCommand) -> Result<(), PipelineError>;
}

pub struct HttpSyncClient {
    agent: ureq::Agent,
    base_url: String,
    auth_header: String,
    utc_offset: String,
    quality_field: String,
    last_photo_update_field: String,
}

impl HttpSyncClient {
    pub fn new(config: &ApiConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();

        Self {
            agent,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_header: format!("{}:{}", config.user, config.password),
            utc_offset: config.utc_offset_minutes.to_string(),
            quality_field: config.quality_field.clone(),
            last_photo_update_field: config.last_photo_update_field.clone(),
        }
    }

    fn request(&self, method: &str, path: &str) -> ureq::Request {
        self.agent
            .request(method, &format!("{}/{}", self.base_url, path))
            .set("WAccessAuthentication", &self.auth_header)
            .set("WAccessUtcOffset", &self.utc_offset)
    }

    fn get_person(&self, id: i64) -> Result<Value, PipelineError> {
        self.request("GET", &format!("cardholders/{id}"))
            .call()
            .map_err(|e| PipelineError::Api(format!("get cardholder {id}: {e}")))?
            .into_json()
            .map_err(|e| PipelineError::Api(format!("parse cardholder {id}: {e}")))
    }

    fn put_person(&self, id: i64, person: &Value) -> Result<(), PipelineError> {
        self.request("PUT", "cardholders")
            .query("CallAction", "false")
            .send_json(person)
            .map_err(|e| PipelineError::Api(format!("put cardholder {id}: {e}")))?;
        Ok(())
    }

    fn put_photo(&self, id: i64, bytes: &[u8]) -> Result<(), PipelineError> {
        let response = self
            .request("PUT", &format!("cardholders/{id}/photos/1"))
            .set("Content-Type", "image/jpeg")
            .send_bytes(bytes)
            .map_err(|e| PipelineError::Api(format!("upload photo for {id}: {e}")))?;

        debug!(id, status = response.status(), "photo slot 1 updated");
        Ok(())
    }
}

impl SyncApi for HttpSyncClient {
    /// Pushes the staged photo first, then the cardholder record. The
    /// photo-update timestamp field is only written when the slot-1 upload
    /// succeeded; a failed upload degrades to a score-only update.
    fn apply(&self, command: &UpdateCommand) -> Result<(), PipelineError> {
        let photo_uploaded = match &command.photo_bytes {
            Some(bytes) => match self.put_photo(command.id, bytes) {
                Ok(()) => true,
                Err(e) => {
                    warn!(id = command.id, error = %e, "photo upload failed, keeping previous photo state");
                    false
                }
            },
            None => false,
        };

        let mut person = self.get_person(command.id)?;
        let Some(fields) = person.as_object_mut() else {
            return Err(PipelineError::Api(format!(
                "cardholder {} payload is not an object",
                command.id
            )));
        };

        fields.insert(
            self.quality_field.clone(),
            Value::from(command.quality_score),
        );
        if photo_uploaded {
            if let Some(updated_at) = command.updated_at {
                fields.insert(
                    self.last_photo_update_field.clone(),
                    Value::from(updated_at.format(TIMESTAMP_FORMAT).to_string()),
                );
            }
        }

        self.put_person(command.id, &person)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn timestamp_format_matches_store_wire_format() {
        let t = Utc.with_ymd_and_hms(2024, 5, 17, 9, 30, 5).unwrap()
            + chrono::Duration::milliseconds(40);
        assert_eq!(t.format(TIMESTAMP_FORMAT).to_string(), "2024-05-17 09:30:05.040");
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let config = ApiConfig {
            base_url: "http://localhost/api/".to_string(),
            user: "svc".to_string(),
            password: "secret".to_string(),
            ..Default::default()
        };
        let client = HttpSyncClient::new(&config);
        assert_eq!(client.base_url, "http://localhost/api");
        assert_eq!(client.auth_header, "svc:secret");
        assert_eq!(client.utc_offset, "-180");
    }
}
