use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Method;
use serde::Serialize;
use tracing::info;

use crate::api::{ApiClient, ApiResult, ObjectId};
use crate::error::ApiError;
use crate::invoker::ApiCall;
use crate::transport::{Clock, Transport};

/// Body of `PUT Object/<id>/Attachments`.
#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct AttachmentParams<'a> {
    file_name: &'a str,
    description: &'a str,
    data: String,
}

pub fn attachments_endpoint(object_id: &ObjectId) -> String {
    format!("Object/{}/Attachments", object_id)
}

impl<T: Transport, C: Clock> ApiClient<T, C> {
    /// Attach the file at `path` to `object_id`. The whole file goes out
    /// base64-encoded in a single request.
    pub fn upload_attachment(
        &mut self,
        object_id: &ObjectId,
        path: &Path,
        description: &str,
    ) -> Result<ApiResult, ApiError> {
        let bytes = std::fs::read(path)
            .map_err(|source| ApiError::ReadFile { path: path.to_path_buf(), source })?;
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("attachment");

        let params = AttachmentParams { file_name, description, data: STANDARD.encode(&bytes) };
        let call = ApiCall {
            operation: format!("upload attachment to {}", object_id),
            endpoint: attachments_endpoint(object_id),
            method: Method::PUT,
            params: serde_json::to_value(&params)?,
        };

        info!(
            object_id = %object_id,
            file = %path.display(),
            bytes = bytes.len(),
            "uploading attachment"
        );
        self.call(&call)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serde_json::json;

    use super::*;
    use crate::invoker::Invoker;
    use crate::testing::{data, grant_response, is_grant, settings, FakeClock, MockTransport};

    #[test]
    fn uploads_base64_body_with_put() {
        let transport = MockTransport::new(|req| {
            if is_grant(req) {
                Ok(grant_response(3600))
            } else {
                Ok(data(json!([])))
            }
        });
        let clock = FakeClock::at(0);
        let mut client = ApiClient::new(Invoker::new(&transport, &clock), settings(1));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        std::fs::File::create(&path).unwrap().write_all(b"hello").unwrap();

        let result =
            client.upload_attachment(&ObjectId::new("42"), &path, "nightly report").unwrap();

        assert!(result.success);
        let upload = &transport.requests()[1];
        assert_eq!(upload.method, Method::PUT);
        assert_eq!(upload.url, "https://alloy.test/api/Object/42/Attachments");
        assert_eq!(
            upload.body,
            json!({ "FileName": "report.txt", "Description": "nightly report", "Data": "aGVsbG8=" })
        );
    }

    #[test]
    fn unreadable_file_fails_before_any_request() {
        let transport = MockTransport::new(|_| Ok(grant_response(3600)));
        let clock = FakeClock::at(0);
        let mut client = ApiClient::new(Invoker::new(&transport, &clock), settings(1));

        let err = client
            .upload_attachment(&ObjectId::new("1"), Path::new("/no/such/file.bin"), "x")
            .unwrap_err();

        assert!(matches!(err, ApiError::ReadFile { .. }));
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn endpoint_embeds_object_id() {
        assert_eq!(attachments_endpoint(&ObjectId::new("CMP-9")), "Object/CMP-9/Attachments");
    }
}
