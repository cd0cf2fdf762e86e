use thiserror::Error;

const DEFAULT_EXTENSION: &str = "jpg";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Unsupported content type '{0}', expected an image")]
    UnsupportedContentType(String),

    #[error("Missing content type, expected an image")]
    MissingContentType,

    #[error("Uploaded image is empty")]
    EmptyImage,

    #[error("Pipeline is shutting down")]
    ShuttingDown,
}

/// An uploaded image that passed the boundary checks.
///
/// The only way to build one is [`ImageSubmission::from_upload`], so a
/// submission in hand is always non-empty and has a safe extension.
#[derive(Debug, Clone)]
pub struct ImageSubmission {
    bytes: Vec<u8>,
    extension: String,
}

impl ImageSubmission {
    pub fn from_upload(
        bytes: Vec<u8>,
        filename: Option<&str>,
        content_type: Option<&str>,
    ) -> Result<Self, SubmitError> {
        match content_type {
            None => return Err(SubmitError::MissingContentType),
            Some(ct) if !ct.trim().to_ascii_lowercase().starts_with("image/") => {
                return Err(SubmitError::UnsupportedContentType(ct.to_string()));
            }
            Some(_) => {}
        }

        if bytes.is_empty() {
            return Err(SubmitError::EmptyImage);
        }

        Ok(Self {
            bytes,
            extension: extension_from_filename(filename),
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Text after the last `.`, lower-cased, ASCII alphanumerics only.
fn extension_from_filename(filename: Option<&str>) -> String {
    let extension: String = filename
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| {
            ext.chars()
                .filter(char::is_ascii_alphanumeric)
                .map(|c| c.to_ascii_lowercase())
                .collect()
        })
        .unwrap_or_default();

    if extension.is_empty() {
        DEFAULT_EXTENSION.to_string()
    } else {
        extension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_image_upload() {
        let submission =
            ImageSubmission::from_upload(vec![1, 2, 3], Some("receipt.PNG"), Some("image/png"))
                .unwrap();
        assert_eq!(submission.extension(), "png");
        assert_eq!(submission.bytes(), &[1, 2, 3]);
        assert_eq!(submission.len(), 3);
    }

    #[test]
    fn test_rejects_non_image_content_type() {
        let err = ImageSubmission::from_upload(vec![1], Some("a.pdf"), Some("application/pdf"))
            .unwrap_err();
        assert_eq!(
            err,
            SubmitError::UnsupportedContentType("application/pdf".to_string())
        );
        assert_eq!(
            ImageSubmission::from_upload(vec![1], Some("a.jpg"), None).unwrap_err(),
            SubmitError::MissingContentType
        );
    }

    #[test]
    fn test_rejects_empty_bytes() {
        let err = ImageSubmission::from_upload(Vec::new(), Some("a.jpg"), Some("image/jpeg"))
            .unwrap_err();
        assert_eq!(err, SubmitError::EmptyImage);
    }

    #[test]
    fn test_extension_rules() {
        assert_eq!(extension_from_filename(Some("scan.tar.JPEG")), "jpeg");
        assert_eq!(extension_from_filename(Some("no_extension")), "jpg");
        assert_eq!(extension_from_filename(Some("trailing.")), "jpg");
        assert_eq!(extension_from_filename(Some("evil.p/n\\g")), "png");
        assert_eq!(extension_from_filename(Some("weird.___")), "jpg");
        assert_eq!(extension_from_filename(None), "jpg");
    }

    #[test]
    fn test_content_type_case_insensitive() {
        assert!(ImageSubmission::from_upload(vec![0], None, Some("Image/WebP")).is_ok());
    }
}
