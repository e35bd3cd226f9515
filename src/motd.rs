//! MOTD representation and color stripping (spec §3, §9 Design Notes).
//!
//! The public Server List Ping `description` field arrives as either a bare
//! string or a rich-text object with `text`/`extra`. We store it tagged and
//! only strip formatting codes at render time, so forward-compatible JSON
//! shapes are never rejected at parse time.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Motd {
    Plain(String),
    Rich {
        #[serde(default)]
        text: String,
        #[serde(default)]
        extra: Vec<Motd>,
    },
}

impl Default for Motd {
    fn default() -> Self {
        Motd::Plain(String::new())
    }
}

impl Motd {
    /// Flattens a (possibly nested) rich MOTD into plain text, preserving
    /// Minecraft color codes (§ sequences) for later stripping.
    pub fn flatten(&self) -> String {
        match self {
            Motd::Plain(s) => s.clone(),
            Motd::Rich { text, extra } => {
                let mut out = text.clone();
                for part in extra {
                    out.push_str(&part.flatten());
                }
                out
            }
        }
    }

    /// Flattens and strips color codes in one step — the representation
    /// stored on [`crate::model::ProbeResult::motd`].
    pub fn render_plain(&self) -> String {
        strip_color_codes(&self.flatten())
    }
}

/// Strips Minecraft `§`-prefixed formatting codes from `s`. Idempotent:
/// `strip_color_codes(strip_color_codes(s)) == strip_color_codes(s)`.
pub fn strip_color_codes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '§' {
            // consume the following format-code character, if any
            chars.next();
            continue;
        }
        out.push(c);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_color_idempotent() {
        let cases = ["§aHello§r World", "plain text", "§k§l§m§n§o§r", ""];
        for case in cases {
            let once = strip_color_codes(case);
            let twice = strip_color_codes(&once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn strip_matches_example() {
        assert_eq!(strip_color_codes("§aHello§r World"), "Hello World");
    }

    #[test]
    fn rich_motd_flattens_extras() {
        let motd = Motd::Rich {
            text: "§aHi".into(),
            extra: vec![Motd::Plain(" there".into())],
        };
        assert_eq!(motd.render_plain(), "Hi there");
    }

    #[test]
    fn plain_motd_roundtrips_through_json() {
        let json = serde_json::json!("Hi");
        let motd: Motd = serde_json::from_value(json).unwrap();
        assert_eq!(motd, Motd::Plain("Hi".into()));
    }

    #[test]
    fn object_motd_parses_with_extra() {
        let json = serde_json::json!({"text": "Hi", "extra": [{"text": " there"}]});
        let motd: Motd = serde_json::from_value(json).unwrap();
        assert_eq!(motd.render_plain(), "Hi there");
    }
}
