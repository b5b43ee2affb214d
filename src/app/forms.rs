//! Validation of untrusted form submissions.
//!
//! Every validator is a pure function from raw field values to either a value
//! that is ready to persist or a [`FormErrors`] set keyed by field name. The
//! HTTP layer re-renders the form with those errors; nothing is persisted.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::domain::group::Group;

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_CHOICE: &str =
    "Select a valid choice. That choice is not one of the available choices.";
pub const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

const IMAGE_EXTENSIONS: [&str; 5] = ["gif", "jpeg", "jpg", "png", "webp"];
const USERNAME_MAX_LEN: usize = 150;
const PASSWORD_MIN_LEN: usize = 8;
const MAX_FILENAME_LEN: usize = 100;

/// Path segments that route to something other than a profile.
const RESERVED_USERNAMES: [&str; 8] = [
    "about", "admin", "auth", "follow", "group", "health", "media", "new",
];

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn finish<T>(self, value: T) -> Result<T, FormErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

/// A file part exactly as it arrived in the request.
#[derive(Debug, Clone, Default)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Bytes,
}

/// Raw post form fields. `group` is the submitted choice value (a group id or
/// an empty string), `image_clear` is the "remove current image" checkbox.
#[derive(Debug, Clone, Default)]
pub struct PostFormData {
    pub text: String,
    pub group: String,
    pub image: Option<UploadedFile>,
    pub image_clear: bool,
}

#[derive(Debug, Clone)]
pub struct ValidPost {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: ImageChange,
}

#[derive(Debug, Clone)]
pub enum ImageChange {
    Keep,
    Clear,
    Replace(ValidImage),
}

/// An upload that decoded as an image.
#[derive(Debug, Clone)]
pub struct ValidImage {
    pub filename: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl ValidImage {
    /// Storage key under `posts/`, prefixed with a content hash so equal
    /// filenames from different uploads never collide.
    pub fn storage_key(&self) -> String {
        let digest = Sha256::digest(&self.bytes);
        let hash = hex::encode(digest);
        format!("posts/{}_{}", &hash[..16], self.filename)
    }
}

pub fn validate_post(data: &PostFormData, groups: &[Group]) -> Result<ValidPost, FormErrors> {
    let mut errors = FormErrors::default();

    let text = data.text.trim();
    if text.is_empty() {
        errors.add("text", REQUIRED);
    }

    let group_id = match data.group.trim() {
        "" => None,
        raw => match raw.parse::<i64>() {
            Ok(id) if groups.iter().any(|group| group.id == id) => Some(id),
            _ => {
                errors.add("group", INVALID_CHOICE);
                None
            }
        },
    };

    let image = match &data.image {
        Some(upload) => match validate_image(upload) {
            Ok(image) => ImageChange::Replace(image),
            Err(message) => {
                errors.add("image", message);
                ImageChange::Keep
            }
        },
        None if data.image_clear => ImageChange::Clear,
        None => ImageChange::Keep,
    };

    errors.finish(ValidPost {
        text: text.to_string(),
        group_id,
        image,
    })
}

fn validate_image(upload: &UploadedFile) -> Result<ValidImage, String> {
    let extension = upload
        .filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if !IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        return Err(format!(
            "File extension “{}” is not allowed. Allowed extensions are: {}.",
            extension,
            IMAGE_EXTENSIONS.join(", ")
        ));
    }

    if upload.bytes.is_empty() {
        return Err("The submitted file is empty.".to_string());
    }

    let format = image::guess_format(&upload.bytes).map_err(|_| INVALID_IMAGE.to_string())?;
    image::load_from_memory_with_format(&upload.bytes, format)
        .map_err(|_| INVALID_IMAGE.to_string())?;

    Ok(ValidImage {
        filename: sanitize_filename(&upload.filename, &extension),
        content_type: format.to_mime_type().to_string(),
        bytes: upload.bytes.clone(),
    })
}

fn sanitize_filename(raw: &str, extension: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        return format!("image.{}", extension);
    }
    let len = cleaned.len().min(MAX_FILENAME_LEN);
    cleaned[cleaned.len() - len..].to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

impl CommentForm {
    pub fn validate(&self) -> Result<String, FormErrors> {
        let mut errors = FormErrors::default();
        let text = self.text.trim();
        if text.is_empty() {
            errors.add("text", REQUIRED);
        }
        errors.finish(text.to_string())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::default();
        if self.username.trim().is_empty() {
            errors.add("username", REQUIRED);
        }
        if self.password.is_empty() {
            errors.add("password", REQUIRED);
        }
        errors.finish(())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SignupForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing)]
    pub password1: String,
    #[serde(default, skip_serializing)]
    pub password2: String,
}

#[derive(Debug, Clone)]
pub struct ValidSignup {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl SignupForm {
    pub fn validate(&self) -> Result<ValidSignup, FormErrors> {
        let mut errors = FormErrors::default();

        let username = self.username.trim();
        if username.is_empty() {
            errors.add("username", REQUIRED);
        } else if username.chars().count() > USERNAME_MAX_LEN {
            errors.add(
                "username",
                format!(
                    "Ensure this value has at most {} characters.",
                    USERNAME_MAX_LEN
                ),
            );
        } else if !username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
        {
            errors.add(
                "username",
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
            );
        } else if RESERVED_USERNAMES.contains(&username.to_lowercase().as_str()) {
            errors.add("username", "This username is reserved.");
        }

        let email = self.email.trim();
        if email.is_empty() {
            errors.add("email", REQUIRED);
        } else if !is_plausible_email(email) {
            errors.add("email", "Enter a valid email address.");
        }

        if self.password1.is_empty() {
            errors.add("password1", REQUIRED);
        } else if self.password1.chars().count() < PASSWORD_MIN_LEN {
            errors.add(
                "password1",
                format!(
                    "This password is too short. It must contain at least {} characters.",
                    PASSWORD_MIN_LEN
                ),
            );
        }
        if self.password2.is_empty() {
            errors.add("password2", REQUIRED);
        } else if self.password1 != self.password2 {
            errors.add("password2", "The two password fields didn’t match.");
        }

        errors.finish(ValidSignup {
            username: username.to_string(),
            email: email.to_string(),
            password: self.password1.clone(),
        })
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL_GIF: &[u8] = &[
        0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
        0x00, 0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00,
        0x00, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x0C, 0x0A, 0x00, 0x3B,
    ];

    fn groups() -> Vec<Group> {
        vec![Group {
            id: 7,
            title: "Cats".into(),
            description: "About cats".into(),
            slug: "cats".into(),
        }]
    }

    fn gif(filename: &str) -> UploadedFile {
        UploadedFile {
            filename: filename.into(),
            bytes: Bytes::from_static(SMALL_GIF),
        }
    }

    #[test]
    fn post_text_is_required() {
        let data = PostFormData {
            text: "   ".into(),
            ..Default::default()
        };
        let errors = validate_post(&data, &groups()).unwrap_err();
        assert_eq!(errors.get("text"), [REQUIRED.to_string()]);
    }

    #[test]
    fn post_without_group_is_valid() {
        let data = PostFormData {
            text: " Hello ".into(),
            ..Default::default()
        };
        let post = validate_post(&data, &groups()).unwrap();
        assert_eq!(post.text, "Hello");
        assert_eq!(post.group_id, None);
        assert!(matches!(post.image, ImageChange::Keep));
    }

    #[test]
    fn post_group_must_exist() {
        let mut data = PostFormData {
            text: "Hello".into(),
            group: "7".into(),
            ..Default::default()
        };
        assert_eq!(validate_post(&data, &groups()).unwrap().group_id, Some(7));

        data.group = "8".into();
        let errors = validate_post(&data, &groups()).unwrap_err();
        assert_eq!(errors.get("group"), [INVALID_CHOICE.to_string()]);

        data.group = "cats".into();
        assert!(validate_post(&data, &groups()).is_err());
    }

    #[test]
    fn post_accepts_real_image() {
        let data = PostFormData {
            text: "With picture".into(),
            image: Some(gif("small.gif")),
            ..Default::default()
        };
        let post = validate_post(&data, &groups()).unwrap();
        let ImageChange::Replace(image) = post.image else {
            panic!("expected an image");
        };
        assert_eq!(image.content_type, "image/gif");
        assert_eq!(image.bytes.as_ref(), SMALL_GIF);
        let key = image.storage_key();
        assert!(key.starts_with("posts/"));
        assert!(key.ends_with("_small.gif"));
    }

    #[test]
    fn post_rejects_non_image_payload() {
        let data = PostFormData {
            text: "Broken".into(),
            image: Some(UploadedFile {
                filename: "fake.png".into(),
                bytes: Bytes::from_static(b"definitely not a png"),
            }),
            ..Default::default()
        };
        let errors = validate_post(&data, &groups()).unwrap_err();
        assert_eq!(errors.get("image"), [INVALID_IMAGE.to_string()]);
    }

    #[test]
    fn post_rejects_bad_extension() {
        let data = PostFormData {
            text: "Script".into(),
            image: Some(gif("small.exe")),
            ..Default::default()
        };
        let errors = validate_post(&data, &groups()).unwrap_err();
        assert!(errors.get("image")[0].contains("not allowed"));
    }

    #[test]
    fn image_clear_without_upload_clears() {
        let data = PostFormData {
            text: "Text".into(),
            image_clear: true,
            ..Default::default()
        };
        let post = validate_post(&data, &groups()).unwrap();
        assert!(matches!(post.image, ImageChange::Clear));
    }

    #[test]
    fn filenames_are_sanitized() {
        assert_eq!(sanitize_filename("../../etc/cat pic.png", "png"), "cat_pic.png");
        assert_eq!(sanitize_filename("C:\\tmp\\dog.jpg", "jpg"), "dog.jpg");
        assert_eq!(sanitize_filename("...", "gif"), "image.gif");
    }

    #[test]
    fn comment_text_is_required() {
        let form = CommentForm { text: "\n ".into() };
        assert_eq!(form.validate().unwrap_err().get("text"), [REQUIRED.to_string()]);

        let form = CommentForm {
            text: " Nice post ".into(),
        };
        assert_eq!(form.validate().unwrap(), "Nice post");
    }

    #[test]
    fn signup_checks_passwords_and_username() {
        let form = SignupForm {
            username: "new".into(),
            email: "not-an-email".into(),
            password1: "short".into(),
            password2: "other".into(),
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.get("username"), ["This username is reserved.".to_string()]);
        assert_eq!(errors.get("email").len(), 1);
        assert_eq!(errors.get("password1").len(), 1);
        assert_eq!(errors.get("password2").len(), 1);

        let form = SignupForm {
            username: "leo.tolstoy".into(),
            email: "leo@example.com".into(),
            password1: "war-and-peace".into(),
            password2: "war-and-peace".into(),
        };
        let valid = form.validate().unwrap();
        assert_eq!(valid.username, "leo.tolstoy");
        assert_eq!(valid.password, "war-and-peace");
    }

    #[test]
    fn signup_rejects_spaces_in_username() {
        let form = SignupForm {
            username: "two words".into(),
            password1: "password123".into(),
            password2: "password123".into(),
            ..Default::default()
        };
        assert_eq!(form.validate().unwrap_err().get("username").len(), 1);
    }

    #[test]
    fn login_requires_both_fields() {
        let errors = LoginForm::default().validate().unwrap_err();
        assert_eq!(errors.get("username"), [REQUIRED.to_string()]);
        assert_eq!(errors.get("password"), [REQUIRED.to_string()]);
    }
}
