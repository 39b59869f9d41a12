use async_trait::async_trait;
use reqwest::multipart::Form;
use sha1::{Digest, Sha1};

use crate::media::{MediaKind, MediaRef, MediaStore};
use crate::utils::config::CloudinaryConfig;

/// Deletes referenced media through the Cloudinary destroy API.
pub struct CloudinaryMedia {
    config: CloudinaryConfig,
    client: reqwest::Client,
}

impl CloudinaryMedia {
    pub fn new(config: CloudinaryConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn destroy_url(&self, kind: MediaKind) -> String {
        format!(
            "https://api.cloudinary.com/v1_1/{}/{}/destroy",
            self.config.cloud_name,
            resource_type(kind)
        )
    }
}

fn resource_type(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Video => "video",
        MediaKind::Image | MediaKind::Gif => "image",
    }
}

/// Cloudinary signs the sorted parameters followed by the api secret.
pub fn sign(public_id: &str, timestamp: i64, api_secret: &str) -> String {
    let to_sign = format!("public_id={}&timestamp={}{}", public_id, timestamp, api_secret);
    let mut hasher = Sha1::new();
    hasher.update(to_sign.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[async_trait]
impl MediaStore for CloudinaryMedia {
    async fn delete(&self, media: &MediaRef) -> Result<(), String> {
        let timestamp = chrono::Utc::now().timestamp();
        let signature = sign(&media.external_id, timestamp, &self.config.api_secret);

        let form = Form::new()
            .text("public_id", media.external_id.clone())
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp.to_string())
            .text("signature", signature);

        let response = self
            .client
            .post(self.destroy_url(media.kind))
            .multipart(form)
            .send()
            .await
            .map_err(|e| format!("Failed to send delete request: {}", e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(format!(
                "Cloudinary refused to delete {} ({})",
                media.external_id,
                response.status()
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_sha1_of_params_and_secret() {
        // sha1("public_id=sample&timestamp=1315060510abcd")
        assert_eq!(
            sign("sample", 1315060510, "abcd"),
            "c3470533147774275dd37996cc4d0e68fd03cd4f"
        );
    }

    #[test]
    fn videos_use_their_own_resource_type() {
        let media = CloudinaryMedia::new(CloudinaryConfig {
            cloud_name: "demo".into(),
            api_key: "key".into(),
            api_secret: "secret".into(),
        });
        assert_eq!(
            media.destroy_url(MediaKind::Video),
            "https://api.cloudinary.com/v1_1/demo/video/destroy"
        );
        assert_eq!(
            media.destroy_url(MediaKind::Gif),
            "https://api.cloudinary.com/v1_1/demo/image/destroy"
        );
    }
}
