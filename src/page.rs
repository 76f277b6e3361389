//! Reading results out of the server's rendered prediction page
//!
//! The reference server answers form posts with its HTML page rather than
//! JSON: a result card (`result-card`) holding the emotion, a
//! `confidence-fill` bar and one `prob-fill` bar per class, or an error box.
//! Elements are located by CSS class and their text extracted. This is not a
//! general HTML parser.

use crate::types::SubmissionSummary;

/// Classes the page uses for its error box
const ERROR_CLASSES: [&str; 3] = ["error", "alert-danger", "alert-error"];

/// Classes that hold the prediction, most specific first
const RESULT_CLASSES: [&str; 3] = ["result-card", "result-section", "result"];

/// What a rendered page says about a submission
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PageAnswer {
    Prediction(SubmissionSummary),
    Error(String),
    /// The page carries neither, e.g. the empty form
    Nothing,
}

/// True when `body` is markup rather than JSON or plain text.
pub(crate) fn is_html(body: &str) -> bool {
    body.trim_start().starts_with('<')
}

pub(crate) fn read_prediction_page(html: &str) -> PageAnswer {
    let tags = scan_tags(html);

    for idx in matching(&tags, &ERROR_CLASSES) {
        let message = strip_error_prefix(&text_of(inner_html(html, &tags, idx)));
        if !message.is_empty() {
            return PageAnswer::Error(message);
        }
    }

    for marker in RESULT_CLASSES {
        for idx in matching(&tags, &[marker]) {
            let card = inner_html(html, &tags, idx);
            if let Some(summary) = read_result_card(card) {
                return PageAnswer::Prediction(summary);
            }
        }
    }

    PageAnswer::Nothing
}

fn read_result_card(card: &str) -> Option<SubmissionSummary> {
    let text = text_of(card);
    let emotion = first_emotion(&text)?;
    let tags = scan_tags(card);

    let confidence = matching(&tags, &["confidence-fill"])
        .into_iter()
        .find_map(|idx| style_width(&tags[idx]))
        .or_else(|| first_percentage(&text));

    let probabilities = matching(&tags, &["prob-fill"])
        .into_iter()
        .filter_map(|idx| style_width(&tags[idx]))
        .map(|w| w / 100.0)
        .collect();

    Some(SubmissionSummary {
        emotion,
        confidence,
        probabilities,
    })
}

#[derive(Debug, Clone, Copy)]
struct Tag<'a> {
    name: &'a str,
    attrs: &'a str,
    closing: bool,
    self_closing: bool,
    start: usize,
    end: usize,
}

fn scan_tags(html: &str) -> Vec<Tag<'_>> {
    let lower = html.to_ascii_lowercase();
    let mut tags = Vec::new();
    let mut pos = 0;

    while let Some(offset) = html[pos..].find('<') {
        let start = pos + offset;
        let rest = &html[start..];

        if rest.starts_with("<!--") {
            pos = rest.find("-->").map_or(html.len(), |e| start + e + 3);
            continue;
        }

        let close = match rest.find('>') {
            Some(close) => close,
            None => break,
        };
        let end = start + close + 1;
        let raw = &rest[1..close];
        let closing = raw.starts_with('/');
        let self_closing = raw.ends_with('/');
        let inner = raw.trim_start_matches('/').trim_end_matches('/');
        let name_len = inner
            .find(|c: char| c.is_whitespace())
            .unwrap_or(inner.len());
        let name = &inner[..name_len];

        // a bare '<' in text
        if name.is_empty() || !name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '!') {
            pos = start + 1;
            continue;
        }

        tags.push(Tag {
            name,
            attrs: &inner[name_len..],
            closing,
            self_closing,
            start,
            end,
        });
        pos = end;

        // raw text elements: skip straight to their closing tag
        if !closing && is_raw_text(name) {
            let needle = format!("</{}", name.to_ascii_lowercase());
            pos = lower[end..].find(&needle).map_or(html.len(), |e| end + e);
        }
    }

    tags
}

/// Indices of opening tags carrying one of `classes`. A class matches
/// exactly or as the stem of a hyphenated class (`error` matches
/// `error-message`).
fn matching(tags: &[Tag<'_>], classes: &[&str]) -> Vec<usize> {
    tags.iter()
        .enumerate()
        .filter(|(_, tag)| !tag.closing)
        .filter(|(_, tag)| {
            attr(tag, "class").map_or(false, |value| {
                value.split_whitespace().any(|class| {
                    classes.iter().any(|marker| {
                        class == *marker
                            || class
                                .strip_prefix(marker)
                                .map_or(false, |rest| rest.starts_with('-'))
                    })
                })
            })
        })
        .map(|(idx, _)| idx)
        .collect()
}

fn attr<'a>(tag: &Tag<'a>, name: &str) -> Option<&'a str> {
    let attrs = tag.attrs;
    let mut search = 0;

    while let Some(offset) = attrs[search..].find(name) {
        let at = search + offset;
        search = at + name.len();

        let boundary = attrs[..at]
            .chars()
            .next_back()
            .map_or(true, char::is_whitespace);
        let after = attrs[search..].trim_start();
        if !boundary || !after.starts_with('=') {
            continue;
        }

        let value = after[1..].trim_start();
        return match value.chars().next() {
            Some(q @ ('"' | '\'')) => {
                let body = &value[1..];
                Some(body.find(q).map_or(body, |e| &body[..e]))
            }
            Some(_) => Some(
                value
                    .split(|c: char| c.is_whitespace())
                    .next()
                    .unwrap_or_default(),
            ),
            None => None,
        };
    }
    None
}

fn is_raw_text(name: &str) -> bool {
    name.eq_ignore_ascii_case("script") || name.eq_ignore_ascii_case("style")
}

/// Markup between the opening tag at `open` and its matching closing tag
fn inner_html<'a>(html: &'a str, tags: &[Tag<'_>], open: usize) -> &'a str {
    let opening = &tags[open];
    if opening.self_closing {
        return "";
    }

    let mut depth = 0usize;
    for tag in &tags[open + 1..] {
        if !tag.name.eq_ignore_ascii_case(opening.name) {
            continue;
        }
        if tag.closing {
            if depth == 0 {
                return &html[opening.end..tag.start];
            }
            depth -= 1;
        } else if !tag.self_closing {
            depth += 1;
        }
    }
    &html[opening.end..]
}

/// Visible text of a fragment, entities decoded and whitespace collapsed
fn text_of(fragment: &str) -> String {
    let mut text = String::new();
    let mut pos = 0;
    let mut raw_until: Option<&str> = None;

    for tag in scan_tags(fragment) {
        if raw_until.is_none() {
            text.push_str(&fragment[pos..tag.start]);
            text.push(' ');
        }
        if let Some(name) = raw_until {
            if tag.closing && tag.name.eq_ignore_ascii_case(name) {
                raw_until = None;
            }
        } else if !tag.closing && is_raw_text(tag.name) {
            raw_until = Some(tag.name);
        }
        pos = tag.end;
    }
    if raw_until.is_none() {
        text.push_str(&fragment[pos..]);
    }

    decode_entities(&text)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

fn strip_error_prefix(message: &str) -> String {
    let trimmed = message.trim();
    let rest = match trimmed.get(..6) {
        Some(head) if head.eq_ignore_ascii_case("error:") => &trimmed[6..],
        _ => trimmed,
    };
    rest.trim().to_string()
}

/// First emotion name in reading order
fn first_emotion(text: &str) -> Option<String> {
    text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
        .find(|word| {
            matches!(*word, "NEGATIVE" | "NEUTRAL" | "POSITIVE")
                || word.strip_prefix("UNKNOWN_").map_or(false, |id| {
                    !id.is_empty() && id.trim_start_matches('-').chars().all(|c| c.is_ascii_digit())
                })
        })
        .map(str::to_string)
}

fn first_percentage(text: &str) -> Option<f64> {
    text.split_whitespace()
        .filter_map(|word| word.trim_end_matches(|c: char| c != '%').strip_suffix('%'))
        .find_map(|number| number.trim_start_matches('(').parse::<f64>().ok())
}

fn style_width(tag: &Tag<'_>) -> Option<f64> {
    let style = attr(tag, "style")?;
    style.split(';').find_map(|decl| {
        let (prop, value) = decl.split_once(':')?;
        if !prop.trim().eq_ignore_ascii_case("width") {
            return None;
        }
        value.trim().strip_suffix('%')?.trim().parse().ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const RESULT_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>Brain Emotion Detection</title>
  <style>.error { color: red; } .result-card { padding: 1rem; }</style>
</head>
<body>
  <form id="emotionForm" method="POST">
    <input class="feature-input" name="f0" value="-1.25">
    <button type="button" class="pattern-btn">Positive Pattern</button>
  </form>
  <!-- <div class="error">commented out</div> -->
  <div class="result-section">
    <div class="result-card positive">
      <h2 class="emotion-result">POSITIVE</h2>
      <div class="confidence-bar"><div class="confidence-fill" style="width: 87.6%"></div></div>
      <p class="confidence-text">Confidence: 87.6%</p>
      <div class="probabilities">
        <div class="prob-item"><span>NEGATIVE</span><div class="prob-fill" style="width: 10.0%"></div></div>
        <div class="prob-item"><span>NEUTRAL</span><div class="prob-fill" style="width: 2.4%"></div></div>
        <div class="prob-item"><span>POSITIVE</span><div class="prob-fill" style="width: 87.6%"></div></div>
      </div>
    </div>
  </div>
  <script src="/static/js/script.js"></script>
</body>
</html>"#;

    #[test]
    fn test_reads_result_card() {
        let summary = match read_prediction_page(RESULT_PAGE) {
            PageAnswer::Prediction(summary) => summary,
            other => panic!("unexpected answer: {other:?}"),
        };

        assert_eq!(summary.emotion, "POSITIVE");
        assert_eq!(summary.confidence, Some(87.6));
        assert_eq!(summary.probabilities.len(), 3);
        for (got, want) in summary.probabilities.iter().zip([0.1, 0.024, 0.876]) {
            assert!((got - want).abs() < 1e-9, "{got} != {want}");
        }
    }

    #[test]
    fn test_reads_error_box() {
        let page = r#"<html><body>
            <div class="error-message"><strong>Error:</strong> Expected 45 features, got 44</div>
        </body></html>"#;

        assert_eq!(
            read_prediction_page(page),
            PageAnswer::Error("Expected 45 features, got 44".to_string())
        );
    }

    #[test]
    fn test_empty_error_box_is_ignored() {
        let page = r#"<div class="error" style="display:none"></div>
            <div class="result-card"><h2>UNKNOWN_3</h2><p>Confidence: 41.0%</p></div>"#;

        match read_prediction_page(page) {
            PageAnswer::Prediction(summary) => {
                assert_eq!(summary.emotion, "UNKNOWN_3");
                assert_eq!(summary.confidence, Some(41.0));
                assert!(summary.probabilities.is_empty());
            }
            other => panic!("unexpected answer: {other:?}"),
        }
    }

    #[test]
    fn test_blank_form_has_nothing() {
        let page = r#"<html><body><form><input class="feature-input" name="f0"></form>
            <p>Try the POSITIVE pattern</p></body></html>"#;
        assert_eq!(read_prediction_page(page), PageAnswer::Nothing);
    }

    #[test]
    fn test_entities_and_quotes() {
        let page = "<div class='alert alert-danger'>Prediction error: &quot;x&quot; &amp; y</div>";
        assert_eq!(
            read_prediction_page(page),
            PageAnswer::Error("Prediction error: \"x\" & y".to_string())
        );
    }

    #[test]
    fn test_is_html() {
        assert!(is_html("  <!DOCTYPE html><html></html>"));
        assert!(!is_html(r#"{"result": "NEUTRAL"}"#));
        assert!(!is_html("ok"));
    }
}
