//! Strips binary exhibits out of EDGAR complete-submission text files.
//!
//! A submission is one big SGML container: a header followed by
//! `<DOCUMENT>`...`</DOCUMENT>` segments, one per exhibit. Graphics, PDFs and
//! spreadsheets ride along uuencoded and dominate the file size while being
//! useless as text. Dropping those segments keeps everything else, byte for
//! byte, so headers, the primary document and text exhibits survive intact.

use std::borrow::Cow;
use tracing::{debug, warn};

use crate::errors::SyncError;

/// Attachment extensions that mark a segment as binary ballast.
pub const DEFAULT_BINARY_EXTENSIONS: &[&str] = &[
    "gif", "jpg", "jpeg", "bmp", "png", "pdf", "xls", "xlsx", "zip",
];

const DOC_OPEN: &str = "<DOCUMENT>";
const DOC_CLOSE: &str = "</DOCUMENT>";

#[derive(Debug, Clone)]
pub struct StripPolicy {
    /// Lower-cased extensions whose segments are dropped.
    pub binary_extensions: Vec<String>,
    /// Also drop any non-primary segment larger than this, whatever it
    /// claims to be.
    pub max_segment_bytes: Option<usize>,
    /// How far into a segment to look for its metadata tags. The tags sit in
    /// the first few lines; a bound keeps us from scanning megabytes of
    /// uuencoded payload.
    pub probe_window: usize,
}

impl Default for StripPolicy {
    fn default() -> StripPolicy {
        StripPolicy {
            binary_extensions: DEFAULT_BINARY_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            max_segment_bytes: None,
            probe_window: 1_000,
        }
    }
}

struct Segment {
    start: usize,
    end: usize,
}

/// Remove attachment segments from a filing according to `policy`.
///
/// The primary document (sequence 1, or the first segment when no sequence
/// is declared) is always kept. When nothing needs dropping, or the
/// container cannot be parsed, the input comes back borrowed and unchanged;
/// a filing is never lost to a stripping problem.
pub fn strip_attachments<'a>(text: &'a str, policy: &StripPolicy) -> Cow<'a, str> {
    let segments = match scan_segments(text) {
        Ok(segments) => segments,
        Err(err) => {
            warn!("Keeping filing unmodified: {}", err);
            return Cow::Borrowed(text);
        }
    };
    if segments.is_empty() {
        debug!("No document boundaries found; keeping filing unmodified");
        return Cow::Borrowed(text);
    }
    let dropped: Vec<&Segment> = segments
        .iter()
        .enumerate()
        .filter(|(index, segment)| should_drop(text, segment, *index, policy))
        .map(|(_, segment)| segment)
        .collect();
    if dropped.is_empty() {
        return Cow::Borrowed(text);
    }
    let mut kept = String::with_capacity(text.len());
    let mut cursor = 0;
    for segment in &dropped {
        kept.push_str(&text[cursor..segment.start]);
        cursor = skip_trailing_newline(text, segment.end);
    }
    kept.push_str(&text[cursor..]);
    debug!(
        "Stripped {} of {} container segments",
        dropped.len(),
        segments.len()
    );
    Cow::Owned(kept)
}

/// Locate every `<DOCUMENT>`...`</DOCUMENT>` span. An opening marker without
/// a matching close means the container is malformed and we refuse to guess
/// where the segment ends.
fn scan_segments(text: &str) -> Result<Vec<Segment>, SyncError> {
    let mut segments = Vec::new();
    let mut cursor = 0;
    while let Some(offset) = text[cursor..].find(DOC_OPEN) {
        let start = cursor + offset;
        let close = text[start..].find(DOC_CLOSE).ok_or_else(|| {
            SyncError::AttachmentParse(format!("unterminated {DOC_OPEN} at byte {start}"))
        })?;
        let end = start + close + DOC_CLOSE.len();
        segments.push(Segment { start, end });
        cursor = end;
    }
    Ok(segments)
}

fn should_drop(text: &str, segment: &Segment, index: usize, policy: &StripPolicy) -> bool {
    let probe = probe(text, segment, policy.probe_window);
    let sequence: Option<u32> = tag_value(probe, "<SEQUENCE>").and_then(|v| v.parse().ok());
    let primary = sequence == Some(1) || (sequence.is_none() && index == 0);
    if primary {
        return false;
    }
    if let Some(filename) = tag_value(probe, "<FILENAME>") {
        if let Some((_, extension)) = filename.rsplit_once('.') {
            if policy
                .binary_extensions
                .iter()
                .any(|blocked| blocked.eq_ignore_ascii_case(extension))
            {
                return true;
            }
        }
    }
    if let Some(limit) = policy.max_segment_bytes {
        if segment.end - segment.start > limit {
            return true;
        }
    }
    false
}

/// Head of the segment, clamped to the probe window without splitting a
/// UTF-8 character.
fn probe<'a>(text: &'a str, segment: &Segment, window: usize) -> &'a str {
    let body = &text[segment.start..segment.end];
    let mut end = window.min(body.len());
    while end < body.len() && !body.is_char_boundary(end) {
        end += 1;
    }
    &body[..end]
}

/// Value of a `<TAG>value` line within the probe, if present and non-empty.
fn tag_value<'a>(probe: &'a str, tag: &str) -> Option<&'a str> {
    let rest = &probe[probe.find(tag)? + tag.len()..];
    let end = rest
        .find(&['<', '\n', '\r'][..])
        .unwrap_or(rest.len());
    let value = rest[..end].trim();
    (!value.is_empty()).then_some(value)
}

/// Dropping a segment also swallows the newline that followed it, so the
/// remaining parts do not accumulate blank lines.
fn skip_trailing_newline(text: &str, end: usize) -> usize {
    if text[end..].starts_with("\r\n") {
        end + 2
    } else if text[end..].starts_with('\n') {
        end + 1
    } else {
        end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(sequence: &str, filename: &str, body: &str) -> String {
        format!(
            "<DOCUMENT>\n<TYPE>EX-99\n<SEQUENCE>{sequence}\n<FILENAME>{filename}\n<TEXT>\n{body}\n</TEXT>\n</DOCUMENT>\n"
        )
    }

    fn container(segments: &[String]) -> String {
        format!(
            "<SEC-DOCUMENT>0000320193-21-000105.txt : 20210813\n<SEC-HEADER>\nACCESSION NUMBER: 0000320193-21-000105\n</SEC-HEADER>\n{}</SEC-DOCUMENT>\n",
            segments.concat()
        )
    }

    #[test]
    fn drops_binary_segments_and_keeps_the_rest_byte_for_byte() {
        let primary = segment("1", "form10-k.htm", "ANNUAL REPORT BODY");
        let chart = segment("2", "chart.jpg", "M9J/4AAQSkZJRg");
        let exhibit = segment("3", "ex-21.htm", "SUBSIDIARIES LIST");
        let input = container(&[primary.clone(), chart, exhibit.clone()]);

        let output = strip_attachments(&input, &StripPolicy::default());
        let expected = container(&[primary, exhibit]);
        assert_eq!(output, expected);
        assert!(!output.contains("chart.jpg"));
        assert!(output.contains("<SEC-HEADER>"));
        assert!(output.contains("SUBSIDIARIES LIST"));
    }

    #[test]
    fn primary_document_survives_even_with_binary_name() {
        let primary = segment("1", "report.pdf", "PDF PAYLOAD");
        let input = container(&[primary]);
        let output = strip_attachments(&input, &StripPolicy::default());
        assert!(matches!(output, Cow::Borrowed(_)));
        assert!(output.contains("PDF PAYLOAD"));
    }

    #[test]
    fn first_segment_is_primary_when_no_sequence_declared() {
        let first = "<DOCUMENT>\n<TYPE>10-K\n<FILENAME>main.pdf\n<TEXT>\nBODY\n</TEXT>\n</DOCUMENT>\n".to_string();
        let second = "<DOCUMENT>\n<TYPE>GRAPHIC\n<FILENAME>logo.gif\n<TEXT>\nGIF89A\n</TEXT>\n</DOCUMENT>\n".to_string();
        let input = container(&[first.clone(), second]);
        let output = strip_attachments(&input, &StripPolicy::default());
        assert!(output.contains("main.pdf"));
        assert!(!output.contains("logo.gif"));
    }

    #[test]
    fn no_boundaries_returns_input_borrowed() {
        let input = "just a plain text file with no SGML markers";
        let output = strip_attachments(input, &StripPolicy::default());
        assert!(matches!(output, Cow::Borrowed(_)));
        assert_eq!(output, input);
    }

    #[test]
    fn unterminated_segment_leaves_input_unmodified() {
        let input = "<SEC-DOCUMENT>\n<DOCUMENT>\n<SEQUENCE>2\n<FILENAME>x.jpg\n<TEXT>\ntruncated";
        let output = strip_attachments(input, &StripPolicy::default());
        assert!(matches!(output, Cow::Borrowed(_)));
        assert_eq!(output, input);
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        let primary = segment("1", "form.htm", "BODY");
        let loud = segment("2", "SCAN.JPG", "M9J/4");
        let input = container(&[primary, loud]);
        let output = strip_attachments(&input, &StripPolicy::default());
        assert!(!output.contains("SCAN.JPG"));
    }

    #[test]
    fn text_attachments_are_kept_by_default() {
        let primary = segment("1", "form.htm", "BODY");
        let exhibit = segment("2", "ex-10.txt", "MATERIAL CONTRACT");
        let input = container(&[primary, exhibit]);
        let output = strip_attachments(&input, &StripPolicy::default());
        assert!(matches!(output, Cow::Borrowed(_)));
        assert!(output.contains("MATERIAL CONTRACT"));
    }

    #[test]
    fn oversize_segments_fall_to_the_size_limit() {
        let primary = segment("1", "form.htm", &"A".repeat(4_000));
        let big_text = segment("2", "huge.htm", &"B".repeat(4_000));
        let small_text = segment("3", "ex.htm", "small");
        let input = container(&[primary.clone(), big_text, small_text.clone()]);
        let policy = StripPolicy {
            max_segment_bytes: Some(1_000),
            ..StripPolicy::default()
        };
        let output = strip_attachments(&input, &policy);
        // The primary is immune to the size limit; the big exhibit is not.
        assert!(output.contains(&"A".repeat(4_000)));
        assert!(!output.contains(&"B".repeat(4_000)));
        assert!(output.contains("small"));
    }

    #[test]
    fn filename_beyond_probe_window_is_not_classified() {
        // Tags pushed past the probe window look like an untagged segment;
        // non-primary segments without a readable filename are kept.
        let padding = "X".repeat(2_000);
        let hidden = format!(
            "<DOCUMENT>\n<TEXT>{padding}<SEQUENCE>2\n<FILENAME>far.jpg\n</TEXT>\n</DOCUMENT>\n"
        );
        let primary = segment("1", "form.htm", "BODY");
        let input = container(&[primary, hidden]);
        let output = strip_attachments(&input, &StripPolicy::default());
        assert!(output.contains("far.jpg"));
    }

    #[test]
    fn custom_extension_list_overrides_default() {
        let primary = segment("1", "form.htm", "BODY");
        let txt = segment("2", "notes.txt", "NOTES");
        let jpg = segment("3", "chart.jpg", "M9J/4");
        let input = container(&[primary, txt, jpg]);
        let policy = StripPolicy {
            binary_extensions: vec!["txt".to_string()],
            ..StripPolicy::default()
        };
        let output = strip_attachments(&input, &policy);
        assert!(!output.contains("NOTES"));
        assert!(output.contains("chart.jpg"));
    }

    #[test]
    fn multibyte_text_near_probe_boundary_does_not_panic() {
        let mut body = String::new();
        // Fill the area around the 1000-byte probe edge with multibyte chars.
        while body.len() < 1_050 {
            body.push('é');
        }
        let primary = segment("1", "form.htm", "BODY");
        let odd = segment("2", &format!("{body}.htm"), "TEXT");
        let input = container(&[primary, odd]);
        let output = strip_attachments(&input, &StripPolicy::default());
        // The truncated filename cannot be classified, so nothing is dropped.
        assert!(matches!(output, Cow::Borrowed(_)));
    }
}
