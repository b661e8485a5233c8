//! Steam app manifests (`appmanifest_<appid>.acf`).
//!
//! Manifests use Valve's KeyValues text format:
//!
//! ```text
//! "AppState"
//! {
//!     "appid"      "440"
//!     "name"       "Team Fortress 2"
//!     "UserConfig" { "language" "english" }
//! }
//! ```
//!
//! Only the scalar fields of the outermost block are collected; nested blocks
//! are skipped. The parser never fails: malformed input yields whatever pairs
//! could be recovered before the damage.

use std::{collections::HashMap, fs, path::Path};

use anyhow::{Context, Result};

/// Suffix of Steam app manifest files.
pub const MANIFEST_SUFFIX: &str = ".acf";

/// Flat view of the top-level scalar fields of an app manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppManifest {
    fields: HashMap<String, String>,
}

impl AppManifest {
    /// Read and parse the manifest at `path`. Only I/O failures are errors.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("failed to read manifest {}", path.display()))?;
        Ok(Self::parse(&bytes))
    }

    /// Parse raw manifest bytes.
    pub fn parse(bytes: &[u8]) -> Self {
        let text = String::from_utf8_lossy(bytes);
        let mut fields = HashMap::new();
        let mut depth = 0usize;
        let mut pending_key: Option<String> = None;

        for token in tokenize(&text) {
            match token {
                Token::Open => {
                    depth += 1;
                    pending_key = None;
                }
                Token::Close => {
                    depth = depth.saturating_sub(1);
                    pending_key = None;
                }
                Token::Text(text) => match pending_key.take() {
                    Some(key) => {
                        if depth <= 1 {
                            fields.insert(key, text);
                        }
                    }
                    None => pending_key = Some(text),
                },
            }
        }

        Self { fields }
    }

    /// Value for `key`, matched case-insensitively.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .or_else(|| {
                self.fields
                    .iter()
                    .find(|(candidate, _)| candidate.eq_ignore_ascii_case(key))
                    .map(|(_, value)| value)
            })
            .map(String::as_str)
    }

    /// Steam app id (`appid`).
    pub fn app_id(&self) -> Option<&str> {
        self.get("appid").map(str::trim).filter(|id| !id.is_empty())
    }

    /// Store name of the app (`name`).
    pub fn name(&self) -> Option<&str> {
        self.get("name").map(str::trim).filter(|name| !name.is_empty())
    }

    /// Folder under `steamapps/common` holding the install (`installdir`).
    pub fn install_dir(&self) -> Option<&str> {
        self.get("installdir")
    }

    /// All recovered top-level fields.
    pub fn fields(&self) -> &HashMap<String, String> {
        &self.fields
    }

    /// Whether nothing could be recovered.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Token {
    Open,
    Close,
    Text(String),
}

fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '{' => tokens.push(Token::Open),
            '}' => tokens.push(Token::Close),
            '/' if chars.peek() == Some(&'/') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        break;
                    }
                }
            }
            '"' => {
                let mut text = String::new();
                while let Some(next) = chars.next() {
                    match next {
                        '"' => break,
                        '\\' => match chars.next() {
                            Some('n') => text.push('\n'),
                            Some('t') => text.push('\t'),
                            Some(escaped) => text.push(escaped),
                            None => break,
                        },
                        other => text.push(other),
                    }
                }
                tokens.push(Token::Text(text));
            }
            other => {
                let mut text = other.to_string();
                while let Some(&next) = chars.peek() {
                    if next.is_whitespace() || matches!(next, '{' | '}' | '"') {
                        break;
                    }
                    text.push(next);
                    chars.next();
                }
                tokens.push(Token::Text(text));
            }
        }
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const TF2: &str = r#"
"AppState"
{
	"appid"		"440"
	"Universe"		"1"
	"name"		"Team Fortress 2"
	"StateFlags"		"4"
	"installdir"		"Team Fortress 2"
	"InstalledDepots"
	{
		"441"
		{
			"manifest"		"7707612755105219489"
			"name"		"depot name that must not leak"
		}
	}
	"UserConfig"
	{
		"language"		"english"
	}
	"SizeOnDisk"		"26461761327"
}
"#;

    #[test]
    fn extracts_top_level_fields() {
        let manifest = AppManifest::parse(TF2.as_bytes());
        assert_eq!(manifest.app_id(), Some("440"));
        assert_eq!(manifest.name(), Some("Team Fortress 2"));
        assert_eq!(manifest.install_dir(), Some("Team Fortress 2"));
        assert_eq!(manifest.get("SizeOnDisk"), Some("26461761327"));
        assert_eq!(manifest.get("sizeondisk"), Some("26461761327"));
        assert!(manifest.get("language").is_none());
        assert!(manifest.get("manifest").is_none());
    }

    #[test]
    fn minimal_manifest_yields_exact_mapping() {
        let manifest = AppManifest::parse(
            br#""AppState" { "appid" "440" "name" "Team Fortress 2" }"#,
        );
        let mut expected = HashMap::new();
        expected.insert("appid".to_string(), "440".to_string());
        expected.insert("name".to_string(), "Team Fortress 2".to_string());
        assert_eq!(manifest.fields(), &expected);
    }

    #[test]
    fn handles_escapes_and_comments() {
        let manifest = AppManifest::parse(
            br#"
// exported by steamcmd
"AppState"
{
    "appid" "70"
    "name" "Half-Life \"Source\" \\ Edition"
}
"#,
        );
        assert_eq!(manifest.name(), Some(r#"Half-Life "Source" \ Edition"#));
    }

    #[test]
    fn malformed_input_yields_partial_mapping() {
        let truncated = AppManifest::parse(b"\"AppState\"\n{\n\t\"appid\"\t\"620\"\n\t\"name\"\t\"Por");
        assert_eq!(truncated.app_id(), Some("620"));
        assert_eq!(truncated.name(), Some("Por"));

        let garbage = AppManifest::parse(&[0xff, 0xfe, 0x00, b'{', b'}', b'}']);
        assert!(garbage.app_id().is_none());
        assert!(garbage.name().is_none());

        let empty = AppManifest::parse(b"");
        assert!(empty.is_empty());
    }

    #[test]
    fn blank_values_count_as_missing() {
        let manifest = AppManifest::parse(br#""AppState" { "appid" "" "name" "  " }"#);
        assert!(manifest.app_id().is_none());
        assert!(manifest.name().is_none());
    }

    #[test]
    fn load_reads_from_disk() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("appmanifest_440.acf");
        fs::write(&path, TF2)?;
        let manifest = AppManifest::load(&path)?;
        assert_eq!(manifest.app_id(), Some("440"));

        assert!(AppManifest::load(dir.path().join("missing.acf")).is_err());
        Ok(())
    }
}
