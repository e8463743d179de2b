//! Plain-text dump of a whole document.

use crate::error::Result;
use crate::source::DocumentSource;

/// Header written before the text of page `number` (1-based).
pub fn page_delimiter(number: usize) -> String {
    format!("--- Page {} ---\n\n", number)
}

/// Concatenate the text of every page, each preceded by its delimiter and
/// followed by a blank line.
pub fn extract_text<S: DocumentSource + ?Sized>(source: &S) -> Result<String> {
    let mut output = String::new();

    for page in 0..source.page_count() {
        let text = source.extract_plain_text(page)?;
        log::debug!("Page {}: {} characters of text", page + 1, text.len());

        output.push_str(&page_delimiter(page + 1));
        output.push_str(&text);
        output.push_str("\n\n");
    }

    Ok(output)
}
