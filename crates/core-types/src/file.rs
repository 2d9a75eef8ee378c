use serde::{Deserialize, Serialize};

/// A file fetched on demand from a URL referenced by the payload.
///
/// Never persisted. The page-side file object built from it only lives as
/// long as the hosted page does.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    pub name: String,
    pub mime_type: String,
    pub size: usize,
    pub bytes: Vec<u8>,
}

impl RemoteFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size: bytes.len(),
            bytes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Best-effort MIME type from a file name, for relay responses that omit one.
pub fn guess_mime_type(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "tif" | "tiff" => "image/tiff",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_tracks_bytes() {
        let file = RemoteFile::new("a.pdf", "application/pdf", vec![1, 2, 3]);
        assert_eq!(file.size, 3);
        assert!(!file.is_empty());
    }

    #[test]
    fn guesses_common_types() {
        assert_eq!(guess_mime_type("signature.PNG"), "image/png");
        assert_eq!(guess_mime_type("report.pdf"), "application/pdf");
        assert_eq!(guess_mime_type("noext"), "application/octet-stream");
    }
}
