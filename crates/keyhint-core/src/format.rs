use crate::config::StyleSettings;
use crate::mapping::KeyStroke;
use unicode_width::UnicodeWidthChar;

/// Turns single entries and the typed sequence into markup.
pub trait EntryFormatter: Send + Sync {
    fn format(&self, key: &str, description: &str, is_prefix: bool) -> String;
    fn format_typed_sequence(&self, keys: &[KeyStroke]) -> String;
}

/// Default formatter emitting `<span color=..>` markup.
#[derive(Debug, Clone, Default)]
pub struct MarkupFormatter {
    style: StyleSettings,
}

impl MarkupFormatter {
    pub fn new(style: StyleSettings) -> Self {
        Self { style }
    }
}

impl EntryFormatter for MarkupFormatter {
    fn format(&self, key: &str, description: &str, is_prefix: bool) -> String {
        let (color, marker) = if is_prefix {
            (&self.style.prefix_color, "+")
        } else {
            (&self.style.command_color, "")
        };
        format!(
            "<span color='{}'>{}</span>{}<span color='{}'>{}{}</span>",
            escape(&self.style.key_color),
            escape(key).replace(' ', "&#160;"),
            escape(&self.style.divider),
            escape(color),
            marker,
            escape(description),
        )
    }

    fn format_typed_sequence(&self, keys: &[KeyStroke]) -> String {
        let typed: String = keys.iter().map(KeyStroke::as_str).collect();
        format!(
            "<span color='{}'>{}</span>",
            escape(&self.style.key_color),
            escape(&typed),
        )
    }
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\'' => out.push_str("&#39;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Terminal columns the markup occupies once rendered: tags take no space,
/// entities take one.
pub fn visible_width(markup: &str) -> usize {
    let mut width = 0;
    let mut chars = markup.chars();
    while let Some(c) = chars.next() {
        match c {
            '<' => {
                for c in chars.by_ref() {
                    if c == '>' {
                        break;
                    }
                }
            }
            '&' => {
                let rest = chars.as_str();
                if let Some(end) = rest.find(';').filter(|&end| end <= 8) {
                    chars = rest[end + 1..].chars();
                }
                width += 1;
            }
            _ => width += char_width(c),
        }
    }
    width
}

/// Display width of plain text, measured the same way as [`visible_width`].
pub fn text_width(text: &str) -> usize {
    text.chars().map(char_width).sum()
}

fn char_width(c: char) -> usize {
    c.width().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_covers_markup_metacharacters() {
        assert_eq!(escape("<C-w> & 'x' \"y\""), "&lt;C-w&gt; &amp; &#39;x&#39; &quot;y&quot;");
    }

    #[test]
    fn visible_width_skips_tags() {
        assert_eq!(visible_width("<span color='red'>abc</span>"), 3);
    }

    #[test]
    fn visible_width_counts_entities_once() {
        assert_eq!(visible_width("&lt;leader&gt;"), 8);
        assert_eq!(visible_width("&#160;&#160;w"), 3);
    }

    #[test]
    fn visible_width_counts_wide_chars_double() {
        assert_eq!(visible_width("日本"), 4);
    }

    #[test]
    fn text_width_agrees_with_escaped_markup() {
        for text in ["<leader>", "日本", "\u{1F468}\u{200D}\u{1F469}", "a & b"] {
            assert_eq!(text_width(text), visible_width(&escape(text)), "{:?}", text);
        }
    }

    #[test]
    fn visible_width_keeps_stray_ampersand() {
        assert_eq!(visible_width("a & b"), 5);
    }

    #[test]
    fn format_marks_prefix_entries() {
        let f = MarkupFormatter::default();
        let prefix = f.format("g", "goto", true);
        let command = f.format("w", "write", false);
        assert!(prefix.contains("+goto"));
        assert!(!command.contains("+write"));
    }

    #[test]
    fn format_keeps_key_padding_visible() {
        let f = MarkupFormatter::default();
        let out = f.format("  w", "write", false);
        assert!(out.contains("&#160;&#160;w"));
        assert_eq!(visible_width(&out), "  w → write".chars().count());
    }

    #[test]
    fn format_escapes_user_text() {
        let f = MarkupFormatter::default();
        let out = f.format("<leader>", "a < b", false);
        assert!(out.contains("&lt;leader&gt;"));
        assert!(out.contains("a &lt; b"));
    }

    #[test]
    fn typed_sequence_joins_keys() {
        let f = MarkupFormatter::default();
        let keys = [KeyStroke::new("<leader>"), KeyStroke::new("g")];
        let out = f.format_typed_sequence(&keys);
        assert_eq!(visible_width(&out), "<leader>g".len());
    }
}
