//! Uploaded file metadata

/// Uploaded file metadata as handed over by the host's multipart parser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Filename supplied by the client
    pub client_original_name: String,

    /// Content type (MIME type)
    pub content_type: String,

    /// File size in bytes
    pub size: usize,
}

impl UploadedFile {
    /// Create a new uploaded file description
    pub fn new(
        client_original_name: impl Into<String>,
        content_type: impl Into<String>,
        size: usize,
    ) -> Self {
        Self {
            client_original_name: client_original_name.into(),
            content_type: content_type.into(),
            size,
        }
    }

    /// Get file extension
    pub fn extension(&self) -> Option<&str> {
        self.client_original_name
            .rsplit_once('.')
            .map(|(_, ext)| ext)
    }

    /// Check if file is an image
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

/// An upload field: a single file, a list of fields, or named fields.
///
/// Nesting is unbounded, mirroring `photos[]` and `gallery[summer][]` style
/// multipart field names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileInput {
    File(UploadedFile),
    List(Vec<FileInput>),
    Map(Vec<(String, FileInput)>),
}

impl FileInput {
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<FileInput>,
    {
        FileInput::List(items.into_iter().map(Into::into).collect())
    }

    pub fn map<I, K, T>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, T)>,
        K: Into<String>,
        T: Into<FileInput>,
    {
        FileInput::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl From<UploadedFile> for FileInput {
    fn from(file: UploadedFile) -> Self {
        FileInput::File(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uploaded_file_metadata() {
        let file = UploadedFile::new("avatar.jpg", "image/jpeg", 2048);
        assert_eq!(file.extension(), Some("jpg"));
        assert!(file.is_image());

        let file = UploadedFile::new("README", "text/plain", 12);
        assert_eq!(file.extension(), None);
        assert!(!file.is_image());
    }

    #[test]
    fn test_file_input_constructors() {
        let input = FileInput::map([(
            "photos",
            FileInput::list([
                UploadedFile::new("a.jpg", "image/jpeg", 1),
                UploadedFile::new("b.jpg", "image/jpeg", 1),
            ]),
        )]);

        match input {
            FileInput::Map(entries) => {
                assert_eq!(entries[0].0, "photos");
                assert!(matches!(&entries[0].1, FileInput::List(items) if items.len() == 2));
            }
            other => panic!("unexpected input: {:?}", other),
        }
    }
}
