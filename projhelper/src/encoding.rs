use encoding_rs::{Encoding, UTF_8};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::Path;
use tracing::{trace, warn};

use crate::errors::{HelperError, HelperResult};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// How to handle files that are not valid in any configured encoding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingMode {
    /// Report an encoding error for the file
    #[default]
    FailFast,
    /// Replace invalid sequences with U+FFFD. Such text is only ever searched, never written back.
    Lossy,
}

impl std::str::FromStr for EncodingMode {
    type Err = HelperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "failfast" | "fail-fast" => Ok(Self::FailFast),
            "lossy" => Ok(Self::Lossy),
            other => Err(HelperError::config_error(format!(
                "Unknown encoding mode '{}' (expected failfast or lossy)",
                other
            ))),
        }
    }
}

/// File contents decoded to text, remembering how to encode them again
#[derive(Debug, Clone)]
pub struct DecodedText {
    /// The text, without any byte-order mark
    pub text: String,
    /// The encoding the bytes were read in
    pub encoding: &'static Encoding,
    /// Whether the file started with a UTF-8 byte-order mark
    pub bom: bool,
    /// Whether invalid sequences were replaced (lossy mode)
    pub lossy: bool,
}

/// Decodes and re-encodes file contents.
///
/// UTF-8 is always tried first; the optional fallback encoding is tried next.
#[derive(Debug, Clone, Copy)]
pub struct TextCodec {
    mode: EncodingMode,
    fallback: Option<&'static Encoding>,
}

impl Default for TextCodec {
    fn default() -> Self {
        Self {
            mode: EncodingMode::FailFast,
            fallback: None,
        }
    }
}

impl TextCodec {
    /// Creates a codec. `fallback_label` is a WHATWG encoding label such as `windows-1251`.
    pub fn new(mode: EncodingMode, fallback_label: Option<&str>) -> HelperResult<Self> {
        let fallback = match fallback_label {
            None => None,
            Some(label) => {
                let encoding = Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| {
                    HelperError::config_error(format!("Unknown encoding label '{}'", label))
                })?;
                // UTF-16 variants cannot be written back by encoding_rs
                if encoding.output_encoding() != encoding {
                    return Err(HelperError::config_error(format!(
                        "Encoding '{}' is not supported for rewriting files",
                        encoding.name()
                    )));
                }
                Some(encoding)
            }
        };
        Ok(Self { mode, fallback })
    }

    /// Decodes raw file bytes
    pub fn decode(&self, bytes: &[u8], path: &Path) -> HelperResult<DecodedText> {
        let (body, bom) = match bytes.strip_prefix(UTF8_BOM) {
            Some(rest) => (rest, true),
            None => (bytes, false),
        };

        if let Ok(text) = std::str::from_utf8(body) {
            return Ok(DecodedText {
                text: text.to_owned(),
                encoding: UTF_8,
                bom,
                lossy: false,
            });
        }

        if let Some(encoding) = self.fallback.filter(|_| !bom) {
            if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes)
            {
                trace!("Decoded {} as {}", path.display(), encoding.name());
                return Ok(DecodedText {
                    text: text.into_owned(),
                    encoding,
                    bom: false,
                    lossy: false,
                });
            }
        }

        match self.mode {
            EncodingMode::FailFast => Err(HelperError::encoding_error(
                path,
                self.fallback.unwrap_or(UTF_8).name(),
            )),
            EncodingMode::Lossy => {
                warn!("Invalid UTF-8 replaced in file: {}", path.display());
                Ok(DecodedText {
                    text: String::from_utf8_lossy(body).into_owned(),
                    encoding: UTF_8,
                    bom,
                    lossy: true,
                })
            }
        }
    }

    /// Encodes `text` back into the encoding `original` was read in
    pub fn encode(&self, original: &DecodedText, text: &str, path: &Path) -> HelperResult<Vec<u8>> {
        if original.lossy {
            return Err(HelperError::encoding_error(path, original.encoding.name()));
        }

        if original.encoding == UTF_8 {
            let mut out = Vec::with_capacity(text.len() + UTF8_BOM.len());
            if original.bom {
                out.extend_from_slice(UTF8_BOM);
            }
            out.extend_from_slice(text.as_bytes());
            return Ok(out);
        }

        let (bytes, _, unmappable) = original.encoding.encode(text);
        if unmappable {
            return Err(HelperError::unmappable_replacement(
                path,
                original.encoding.name(),
            ));
        }
        Ok(match bytes {
            Cow::Borrowed(b) => b.to_vec(),
            Cow::Owned(b) => b,
        })
    }
}

/// Reads and decodes a file, mapping I/O failures to per-file errors
pub fn read_text(path: &Path, codec: &TextCodec) -> HelperResult<DecodedText> {
    let bytes = std::fs::read(path).map_err(|e| HelperError::from_io(path, e))?;
    codec.decode(&bytes, path)
}
