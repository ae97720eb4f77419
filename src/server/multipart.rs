//! Multipart form data parsing.

use bytes::Bytes;
use futures_util::stream;
use multer::Multipart;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::types::{ParamList, UploadedFile, UPLOAD_ERR_OK, UPLOAD_ERR_SIZE};

/// Form fields and uploaded files of one multipart body.
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub fields: ParamList,
    pub files: Vec<(String, UploadedFile)>,
}

/// Boundary parameter of a `multipart/form-data` content type.
pub fn boundary(content_type: &str) -> Option<String> {
    content_type.split(';').find_map(|part| {
        let part = part.trim();
        let (key, value) = part.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("boundary")
            .then(|| value.trim().trim_matches('"').to_string())
    })
}

/// Parse a multipart body, writing each upload to a temporary file.
///
/// Files larger than `max_file_size` are reported with an error code and no
/// temporary file.
pub async fn parse_multipart(
    content_type: &str,
    body: Bytes,
    max_file_size: u64,
) -> Result<MultipartForm, String> {
    let boundary =
        boundary(content_type).ok_or("Missing boundary in multipart content-type")?;
    let mut multipart = Multipart::new(
        stream::once(async { Ok::<_, std::io::Error>(body) }),
        boundary,
    );

    let mut form = MultipartForm::default();

    while let Some(field) = multipart.next_field().await.map_err(|e| e.to_string())? {
        let field_name = field.name().unwrap_or("").to_string();
        let file_name = field.file_name().map(str::to_string);
        let mime_type = field
            .content_type()
            .map(|m| m.to_string())
            .unwrap_or_default();

        let Some(name) = file_name else {
            let value = field.text().await.map_err(|e| e.to_string())?;
            form.fields.push((field_name, value));
            continue;
        };
        if name.is_empty() {
            continue;
        }

        let data = field.bytes().await.map_err(|e| e.to_string())?;
        let size = data.len() as u64;
        let field_name = field_name
            .strip_suffix("[]")
            .map(str::to_string)
            .unwrap_or(field_name);

        let upload = if size > max_file_size {
            UploadedFile {
                name,
                mime_type,
                tmp_name: String::new(),
                size,
                error: UPLOAD_ERR_SIZE,
            }
        } else {
            let path = std::env::temp_dir().join(format!("pivot{}", Uuid::new_v4().simple()));
            let mut file = File::create(&path).await.map_err(|e| e.to_string())?;
            file.write_all(&data).await.map_err(|e| e.to_string())?;
            file.flush().await.map_err(|e| e.to_string())?;
            UploadedFile {
                name,
                mime_type,
                tmp_name: path.to_string_lossy().into_owned(),
                size,
                error: UPLOAD_ERR_OK,
            }
        };

        tracing::debug!(
            field = %field_name,
            file = %upload.name,
            size = upload.size,
            error = upload.error,
            "parsed uploaded file"
        );
        form.files.push((field_name, upload));
    }

    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = "--XyZ\r\n\
        Content-Disposition: form-data; name=\"title\"\r\n\r\n\
        hello\r\n\
        --XyZ\r\n\
        Content-Disposition: form-data; name=\"docs[]\"; filename=\"a.txt\"\r\n\
        Content-Type: text/plain\r\n\r\n\
        abc\r\n\
        --XyZ--\r\n";

    #[test]
    fn test_boundary() {
        assert_eq!(
            boundary("multipart/form-data; boundary=\"XyZ\"").as_deref(),
            Some("XyZ")
        );
        assert_eq!(
            boundary("multipart/form-data; charset=utf-8; BOUNDARY=abc").as_deref(),
            Some("abc")
        );
        assert_eq!(boundary("multipart/form-data"), None);
    }

    #[tokio::test]
    async fn test_fields_and_files() {
        let form = parse_multipart("multipart/form-data; boundary=XyZ", Bytes::from(BODY), 1024)
            .await
            .unwrap();

        assert_eq!(form.fields, vec![("title".to_string(), "hello".to_string())]);
        let (field, file) = &form.files[0];
        assert_eq!(field, "docs");
        assert_eq!(file.name, "a.txt");
        assert_eq!(file.mime_type, "text/plain");
        assert_eq!(file.size, 3);
        assert!(file.is_ok());
        assert_eq!(std::fs::read(&file.tmp_name).unwrap(), b"abc");
        std::fs::remove_file(&file.tmp_name).unwrap();
    }

    #[tokio::test]
    async fn test_oversized_file_is_flagged() {
        let form = parse_multipart("multipart/form-data; boundary=XyZ", Bytes::from(BODY), 2)
            .await
            .unwrap();
        let (_, file) = &form.files[0];
        assert_eq!(file.error, UPLOAD_ERR_SIZE);
        assert!(file.tmp_name.is_empty());
    }

    #[tokio::test]
    async fn test_missing_boundary() {
        let err = parse_multipart("multipart/form-data", Bytes::new(), 10)
            .await
            .unwrap_err();
        assert!(err.contains("boundary"));
    }
}
