use vantage_models::Narrative;

pub const TECHNICAL_MARKER: &str = "Technical Summary";
pub const PLAIN_MARKER: &str = "Plain-English Summary";

/// Split a model reply into its technical and plain-English sections.
///
/// Both literal markers (case-sensitive) must be present, in either order;
/// each section runs from just after its marker to the other marker or the
/// end of the text. Otherwise both outputs are the unmodified reply.
pub fn split_narrative(text: &str) -> Narrative {
    let (Some(technical_at), Some(plain_at)) = (text.find(TECHNICAL_MARKER), text.find(PLAIN_MARKER))
    else {
        return Narrative::new(text, text);
    };

    let technical_start = technical_at + TECHNICAL_MARKER.len();
    let plain_start = plain_at + PLAIN_MARKER.len();

    let (technical, plain) = if technical_at < plain_at {
        (&text[technical_start..plain_at], &text[plain_start..])
    } else {
        (&text[technical_start..], &text[plain_start..technical_at])
    };

    Narrative::new(clean_section(technical), clean_section(plain))
}

/// Strip what the headings leave behind: the rest of this marker's line
/// (`:`, `**`) and the next marker's line prefix (`## `, `**`). Emphasis in
/// the model's own text is kept.
fn clean_section(section: &str) -> String {
    let is_residue = |c: char| matches!(c, '*' | '#' | ':') || c.is_whitespace();

    let body = match section.rfind('\n') {
        Some(at) if section[at..].chars().all(is_residue) => &section[..at],
        _ => section,
    };

    let body = match body.find('\n') {
        Some(at) if body[..at].chars().all(is_residue) => &body[at + 1..],
        _ => after_label(body),
    };

    body.trim().to_string()
}

/// Drop a `:` / `:**` run that closes an inline label, when followed by
/// whitespace or nothing.
fn after_label(text: &str) -> &str {
    let text = text.trim_start();
    let rest = text.trim_start_matches(|c: char| matches!(c, '*' | '#' | ':'));
    if rest.len() < text.len() && (rest.is_empty() || rest.starts_with(char::is_whitespace)) {
        rest
    } else {
        text
    }
}
