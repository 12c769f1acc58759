//! Attachment Resolver — promotes at most one attachment per message to a
//! materialized résumé file.
//!
//! Single-attempt semantics: attachments are scanned in their
//! natural order and the first one decides the outcome. An unsupported
//! extension fails the whole message rather than falling through to a later
//! attachment.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::info;

use crate::models::message::{InboundMessage, ResolvedResume, ResumeFormat};

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("message has no attachments")]
    NoAttachments,

    #[error("attachment has no filename")]
    UnnamedAttachment,

    #[error("unsupported attachment extension: .{0}")]
    UnsupportedExtension(String),

    #[error("I/O error materializing attachment: {0}")]
    Io(#[from] std::io::Error),
}

/// Materializes the message's résumé attachment into `destination_dir`.
///
/// The blob is first written to a scratch temp file, then relocated
/// atomically into the destination, overwriting a same-named prior file
/// (logged, not fatal). Scratch files that are not relocated are removed on
/// every exit path.
pub fn resolve(
    message: &InboundMessage,
    scratch_dir: &Path,
    destination_dir: &Path,
) -> Result<ResolvedResume, AttachmentError> {
    if message.attachments.is_empty() {
        return Err(AttachmentError::NoAttachments);
    }

    info!(
        "message {} carries {} attachment(s)",
        message.filename,
        message.attachments.len()
    );

    for attachment in &message.attachments {
        let raw_name = attachment
            .filename
            .as_deref()
            .ok_or(AttachmentError::UnnamedAttachment)?;

        // Only the final path component; a crafted filename must not escape
        // the destination folder.
        let name = Path::new(raw_name)
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or(AttachmentError::UnnamedAttachment)?;

        let extension = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");

        let format = ResumeFormat::from_extension(extension)
            .ok_or_else(|| AttachmentError::UnsupportedExtension(extension.to_string()))?;

        let mut scratch_file = NamedTempFile::new_in(scratch_dir)?;
        scratch_file.write_all(&attachment.data)?;

        let final_path = destination_dir.join(name);
        if final_path.exists() {
            info!("replacing existing file: {}", final_path.display());
        }
        scratch_file
            .persist(&final_path)
            .map_err(|e| AttachmentError::Io(e.error))?;

        return Ok(ResolvedResume {
            path: final_path,
            format,
            bytes: attachment.data.clone(),
        });
    }

    Err(AttachmentError::NoAttachments)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::models::message::AttachmentCandidate;

    fn message_with(attachments: Vec<AttachmentCandidate>) -> InboundMessage {
        InboundMessage {
            filename: "application_ DataEng from Marie Curie.msg".to_string(),
            sent_at: None,
            linkedin_title: "N/A".to_string(),
            linkedin_address: "N/A".to_string(),
            attachments,
        }
    }

    fn named(name: &str, data: &[u8]) -> AttachmentCandidate {
        AttachmentCandidate {
            filename: Some(name.to_string()),
            data: data.to_vec(),
        }
    }

    #[test]
    fn test_no_attachments() {
        let scratch = tempdir().unwrap();
        let dest = tempdir().unwrap();
        let result = resolve(&message_with(vec![]), scratch.path(), dest.path());
        assert!(matches!(result, Err(AttachmentError::NoAttachments)));
    }

    #[test]
    fn test_unnamed_attachment() {
        let scratch = tempdir().unwrap();
        let dest = tempdir().unwrap();
        let message = message_with(vec![AttachmentCandidate {
            filename: None,
            data: vec![1, 2, 3],
        }]);
        let result = resolve(&message, scratch.path(), dest.path());
        assert!(matches!(result, Err(AttachmentError::UnnamedAttachment)));
    }

    #[test]
    fn test_unsupported_extension_does_not_fall_through() {
        let scratch = tempdir().unwrap();
        let dest = tempdir().unwrap();
        // A valid .pdf sits behind a .txt; first-match-or-fail means the
        // .txt decides the outcome for the whole message.
        let message = message_with(vec![
            named("notes.txt", b"notes"),
            named("resume.pdf", b"%PDF"),
        ]);
        let result = resolve(&message, scratch.path(), dest.path());
        match result {
            Err(AttachmentError::UnsupportedExtension(ext)) => assert_eq!(ext, "txt"),
            other => panic!("expected UnsupportedExtension, got {other:?}"),
        }
        assert!(!dest.path().join("resume.pdf").exists());
    }

    #[test]
    fn test_pdf_attachment_materialized() {
        let scratch = tempdir().unwrap();
        let dest = tempdir().unwrap();
        let message = message_with(vec![named("resume.pdf", b"%PDF content")]);
        let resume = resolve(&message, scratch.path(), dest.path()).unwrap();
        assert_eq!(resume.format, ResumeFormat::Pdf);
        assert_eq!(resume.bytes, b"%PDF content");
        assert_eq!(std::fs::read(&resume.path).unwrap(), b"%PDF content");
        // Nothing left behind in scratch.
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_docx_extension_case_insensitive() {
        let scratch = tempdir().unwrap();
        let dest = tempdir().unwrap();
        let message = message_with(vec![named("CV.DOCX", b"PK")]);
        let resume = resolve(&message, scratch.path(), dest.path()).unwrap();
        assert_eq!(resume.format, ResumeFormat::Docx);
    }

    #[test]
    fn test_same_named_file_overwritten() {
        let scratch = tempdir().unwrap();
        let dest = tempdir().unwrap();
        std::fs::write(dest.path().join("resume.pdf"), b"old").unwrap();
        let message = message_with(vec![named("resume.pdf", b"new")]);
        let resume = resolve(&message, scratch.path(), dest.path()).unwrap();
        assert_eq!(std::fs::read(resume.path).unwrap(), b"new");
    }
}
