//! Multipart form construction for image and PDF uploads.
//!
//! Field names are fixed by the backend; each builder below produces the
//! exact form one upload endpoint expects.

use std::path::Path;

use crate::error::ApiError;
use crate::http::{MultipartForm, UploadFile};

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = content_type_for(&file_name).to_string();
        Self {
            file_name,
            content_type,
            bytes,
        }
    }

    /// Read a file from disk. The content type is guessed from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ApiError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ApiError::Serialize(format!("{}: {e}", path.display())))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::new(file_name, bytes))
    }
}

fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Form for `/catalog/admin/products/{id}/upload-image/`.
#[derive(Debug, Clone)]
pub struct ProductImageUpload {
    pub image: UploadFile,
    pub color: String,
    pub alt_text: String,
    /// Ask the backend to drop existing images of the same color first.
    pub clear_old: bool,
}

impl ProductImageUpload {
    pub fn new(image: UploadFile, color: impl Into<String>) -> Self {
        Self {
            image,
            color: color.into(),
            alt_text: String::new(),
            clear_old: false,
        }
    }

    pub fn into_form(self) -> MultipartForm {
        MultipartForm::new()
            .file("image", self.image)
            .text("color", self.color)
            .text("alt_text", self.alt_text)
            .text("clear_old", self.clear_old.to_string())
    }
}

/// Form for `/blogs/admin/blogs/{id}/upload-multi-image/`.
#[derive(Debug, Clone)]
pub struct BlogImageUpload {
    pub image: UploadFile,
    pub alt_text: String,
    pub ordering: i64,
}

impl BlogImageUpload {
    pub fn new(image: UploadFile) -> Self {
        Self {
            image,
            alt_text: String::new(),
            ordering: 0,
        }
    }

    pub fn into_form(self) -> MultipartForm {
        MultipartForm::new()
            .file("image", self.image)
            .text("alt_text", self.alt_text)
            .text("ordering", self.ordering.to_string())
    }
}

pub(crate) fn featured_image_form(image: UploadFile) -> MultipartForm {
    MultipartForm::new().file("featured_image", image)
}

pub(crate) fn pdf_form(pdf: UploadFile, thumbnail: Option<UploadFile>) -> MultipartForm {
    let form = MultipartForm::new().file("pdf_file", pdf);
    match thumbnail {
        Some(thumb) => form.file("pdf_thumbnail", thumb),
        None => form,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::PartValue;

    fn png() -> UploadFile {
        UploadFile::new("shoe.PNG", vec![0x89, b'P', b'N', b'G'])
    }

    #[test]
    fn content_type_follows_extension() {
        assert_eq!(png().content_type, "image/png");
        assert_eq!(UploadFile::new("a.pdf", vec![]).content_type, "application/pdf");
        assert_eq!(
            UploadFile::new("noext", vec![]).content_type,
            "application/octet-stream"
        );
    }

    #[test]
    fn product_image_form_fields() {
        let mut upload = ProductImageUpload::new(png(), "Red");
        upload.clear_old = true;
        let form = upload.into_form();
        assert_eq!(form.field_names(), vec!["image", "color", "alt_text", "clear_old"]);
        assert_eq!(form.part("clear_old"), Some(&PartValue::Text("true".to_string())));
        assert_eq!(form.part("alt_text"), Some(&PartValue::Text(String::new())));
    }

    #[test]
    fn blog_image_form_fields() {
        let mut upload = BlogImageUpload::new(png());
        upload.ordering = 3;
        let form = upload.into_form();
        assert_eq!(form.field_names(), vec!["image", "alt_text", "ordering"]);
        assert_eq!(form.part("ordering"), Some(&PartValue::Text("3".to_string())));
    }

    #[test]
    fn pdf_thumbnail_is_optional() {
        let pdf = UploadFile::new("post.pdf", b"%PDF".to_vec());
        assert_eq!(pdf_form(pdf.clone(), None).field_names(), vec!["pdf_file"]);
        assert_eq!(
            pdf_form(pdf, Some(png())).field_names(),
            vec!["pdf_file", "pdf_thumbnail"]
        );
    }

    #[tokio::test]
    async fn from_path_reads_bytes_and_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cover.jpg");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();
        let file = UploadFile::from_path(&path).await.unwrap();
        assert_eq!(file.file_name, "cover.jpg");
        assert_eq!(file.content_type, "image/jpeg");
        assert_eq!(file.bytes, vec![1, 2, 3]);
    }
}
