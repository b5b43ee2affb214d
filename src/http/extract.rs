use axum::extract::multipart::MultipartError;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use axum::Form;
use std::collections::HashMap;

use crate::app::forms::{PostFormData, UploadedFile};
use crate::http::AppError;

/// The post create/edit form, accepted both as `multipart/form-data` (the
/// browser form, which may carry an image) and as a plain urlencoded body.
pub struct PostSubmission(pub PostFormData);

#[axum::async_trait]
impl<S> FromRequest<S> for PostSubmission
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.starts_with("multipart/form-data"))
            .unwrap_or(false);

        if !is_multipart {
            let Form(fields) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|err| AppError::bad_request(err.body_text()))?;
            return Ok(Self(PostFormData {
                text: fields.get("text").cloned().unwrap_or_default(),
                group: fields.get("group").cloned().unwrap_or_default(),
                image: None,
                image_clear: fields.contains_key("image-clear"),
            }));
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|err| AppError::new(err.status(), err.body_text()))?;

        let mut data = PostFormData::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(rejected)?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "text" | "group" => {
                    let value = field
                        .text()
                        .await
                        .map_err(rejected)?;
                    if name == "text" {
                        data.text = value;
                    } else {
                        data.group = value;
                    }
                }
                "image-clear" => data.image_clear = true,
                "image" => {
                    let filename = field.file_name().unwrap_or_default().to_string();
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(rejected)?;
                    // Browsers send an empty, unnamed part when no file was picked.
                    if !filename.is_empty() || !bytes.is_empty() {
                        data.image = Some(UploadedFile { filename, bytes });
                    }
                }
                _ => {}
            }
        }

        Ok(Self(data))
    }
}

fn rejected(err: MultipartError) -> AppError {
    AppError::new(err.status(), err.body_text())
}
