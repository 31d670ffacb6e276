//! Versioned prompt configurations
//!
//! A prompt template is parsed once into literal and placeholder segments.
//! Placeholders look like `{name}` where `name` matches `[A-Za-z0-9_]+`; any
//! other brace text is kept literally. A rendered prompt must not contain a
//! placeholder pattern either, whether it came from the template or from a
//! substituted value. Each rendered configuration carries a
//! content hash (`acv-` + 12 hex chars) derived from the template and its
//! variables, so identical inputs always produce the same version.

use serde::{Deserialize, Serialize};
use serde_json::ser::Formatter;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::io;

use super::error::ConfigError;

const VERSION_PREFIX: &str = "acv-";
const VERSION_HEX_LEN: usize = 12;

/// Immutable, rendered prompt configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub name: String,
    pub version: String,
    pub prompt_template: String,
    pub variables: BTreeMap<String, String>,
    /// Template with every placeholder substituted
    pub prompt: String,
}

impl AgentConfig {
    /// `name:version`
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.name, self.version)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment<'a> {
    Literal(&'a str),
    Placeholder(&'a str),
}

/// Template split into literal and placeholder segments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate<'a> {
    segments: Vec<Segment<'a>>,
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(is_name_byte)
}

impl<'a> PromptTemplate<'a> {
    pub fn parse(template: &'a str) -> Self {
        let bytes = template.as_bytes();
        let mut segments = Vec::new();
        let mut literal_start = 0;
        let mut i = 0;

        while i < bytes.len() {
            if bytes[i] == b'{' {
                let name_start = i + 1;
                let mut end = name_start;
                while end < bytes.len() && is_name_byte(bytes[end]) {
                    end += 1;
                }
                if end > name_start && end < bytes.len() && bytes[end] == b'}' {
                    if literal_start < i {
                        segments.push(Segment::Literal(&template[literal_start..i]));
                    }
                    segments.push(Segment::Placeholder(&template[name_start..end]));
                    i = end + 1;
                    literal_start = i;
                    continue;
                }
            }
            i += 1;
        }

        if literal_start < bytes.len() {
            segments.push(Segment::Literal(&template[literal_start..]));
        }

        Self { segments }
    }

    /// Distinct placeholder names, sorted
    pub fn placeholders(&self) -> BTreeSet<&'a str> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Placeholder(name) => Some(*name),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Substitute every placeholder, or list the names left unresolved.
    ///
    /// Names without a value are reported first. Otherwise the rendered text
    /// is parsed again and any placeholder pattern it still contains, for
    /// example one introduced by a substituted value, is reported.
    pub fn render(&self, variables: &BTreeMap<String, String>) -> Result<String, Vec<String>> {
        let missing: Vec<String> = self
            .placeholders()
            .into_iter()
            .filter(|name| !variables.contains_key(*name))
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(missing);
        }

        let mut rendered = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => rendered.push_str(text),
                Segment::Placeholder(name) => {
                    if let Some(value) = variables.get(*name) {
                        rendered.push_str(value);
                    }
                }
            }
        }

        let unresolved: Vec<String> = PromptTemplate::parse(&rendered)
            .placeholders()
            .into_iter()
            .map(str::to_string)
            .collect();
        if !unresolved.is_empty() {
            return Err(unresolved);
        }
        Ok(rendered)
    }
}

/// Build a versioned prompt configuration.
///
/// Fails with [`ConfigError::InvalidVariableName`] for a key outside
/// `[A-Za-z0-9_]+`, and with [`ConfigError::MissingPlaceholders`] when the
/// template references names that have no value or the rendered prompt still
/// contains a `{name}` pattern.
pub fn create_agent_config<I, K, V>(
    name: impl Into<String>,
    prompt_template: impl Into<String>,
    variables: I,
) -> Result<AgentConfig, ConfigError>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let prompt_template = prompt_template.into();

    let mut normalized = BTreeMap::new();
    for (key, value) in variables {
        let key = key.into();
        if !is_valid_name(&key) {
            return Err(ConfigError::InvalidVariableName(key));
        }
        normalized.insert(key, value.into());
    }

    let prompt = PromptTemplate::parse(&prompt_template)
        .render(&normalized)
        .map_err(ConfigError::MissingPlaceholders)?;
    let version = compute_agent_config_version(&prompt_template, &normalized);

    Ok(AgentConfig {
        name: name.into(),
        version,
        prompt_template,
        variables: normalized,
        prompt,
    })
}

/// Deterministic version for a template and its variables.
///
/// Hashes the compact JSON document
/// `{"prompt_template":...,"variables":{...}}` with keys sorted and every
/// non-ASCII character escaped.
pub fn compute_agent_config_version(
    prompt_template: &str,
    variables: &BTreeMap<String, String>,
) -> String {
    let canonical = canonical_json(prompt_template, variables);
    let digest = Sha256::digest(canonical.as_bytes());
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest.iter() {
        let _ = write!(hex, "{:02x}", byte);
    }
    format!("{}{}", VERSION_PREFIX, &hex[..VERSION_HEX_LEN])
}

#[derive(Serialize)]
struct CanonicalDocument<'a> {
    prompt_template: &'a str,
    variables: &'a BTreeMap<String, String>,
}

/// Compact JSON that escapes everything outside printable ASCII as `\uXXXX`
struct AsciiFormatter;

impl Formatter for AsciiFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        for ch in fragment.chars() {
            if (' '..='~').contains(&ch) {
                writer.write_all(&[ch as u8])?;
            } else {
                let mut units = [0u16; 2];
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }
}

fn canonical_json(prompt_template: &str, variables: &BTreeMap<String, String>) -> String {
    let document = CanonicalDocument {
        prompt_template,
        variables,
    };
    let mut buf = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, AsciiFormatter);
    if document.serialize(&mut serializer).is_err() {
        return String::new();
    }
    String::from_utf8(buf).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renders_prompt_exactly() {
        let config = create_agent_config(
            "onboarding",
            "Welcome {user}, today we will use the {tool} toolkit.",
            [("user", "Ada"), ("tool", "hopeit")],
        )
        .unwrap();

        assert_eq!(config.prompt, "Welcome Ada, today we will use the hopeit toolkit.");
        assert_eq!(config.qualified_name(), format!("onboarding:{}", config.version));
    }

    #[test]
    fn test_missing_placeholder_is_reported() {
        let err = create_agent_config("greeter", "Hi {user}, run {tool}.", [("user", "Ada")])
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingPlaceholders(vec!["tool".to_string()]));
        assert!(err.to_string().contains("tool"));
    }

    #[test]
    fn test_missing_placeholders_sorted_and_unique() {
        let err = create_agent_config(
            "greeter",
            "{zeta} {alpha} {zeta}",
            Vec::<(String, String)>::new(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingPlaceholders(vec!["alpha".to_string(), "zeta".to_string()])
        );
    }

    #[test]
    fn test_invalid_variable_name() {
        let err = create_agent_config("x", "{a}", [("a", "1"), ("bad-name", "2")]).unwrap_err();
        assert_eq!(err, ConfigError::InvalidVariableName("bad-name".to_string()));
    }

    #[test]
    fn test_version_ignores_insertion_order() {
        let first = create_agent_config("a", "{x} {y}", [("x", "1"), ("y", "2")]).unwrap();
        let second = create_agent_config("b", "{x} {y}", [("y", "2"), ("x", "1")]).unwrap();
        assert_eq!(first.version, second.version);
        assert_ne!(first.qualified_name(), second.qualified_name());
    }

    #[test]
    fn test_version_format() {
        let config = create_agent_config("a", "static prompt", Vec::<(&str, &str)>::new()).unwrap();
        let hex = config.version.strip_prefix("acv-").unwrap();
        assert_eq!(hex.len(), 12);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_version_changes_with_values() {
        let template = "Hello {name}";
        let first = create_agent_config("a", template, [("name", "Ada")]).unwrap();
        let second = create_agent_config("a", template, [("name", "Grace")]).unwrap();
        assert_ne!(first.version, second.version);
    }

    #[test]
    fn test_non_placeholder_braces_are_literal() {
        let config = create_agent_config(
            "json",
            "Reply as {\"answer\": ...} for {user} {} {x-y}",
            [("user", "Ada")],
        )
        .unwrap();
        assert_eq!(config.prompt, "Reply as {\"answer\": ...} for Ada {} {x-y}");
    }

    #[test]
    fn test_doubled_braces_leave_a_placeholder_behind() {
        let err = create_agent_config("json", "Reply for {{user}}", [("user", "Ada")]).unwrap_err();
        assert_eq!(err, ConfigError::MissingPlaceholders(vec!["Ada".to_string()]));
    }

    #[test]
    fn test_substituted_placeholder_is_unresolved() {
        let err = create_agent_config("x", "{a} {b}", [("a", "{b}"), ("b", "value")]).unwrap_err();
        assert_eq!(err, ConfigError::MissingPlaceholders(vec!["b".to_string()]));
    }

    #[test]
    fn test_canonical_json_escapes_non_ascii() {
        let mut vars = BTreeMap::new();
        vars.insert("b".to_string(), "caf\u{e9} \u{1F600}".to_string());
        vars.insert("a".to_string(), "line\n\"q\"".to_string());

        assert_eq!(
            canonical_json("T {a}", &vars),
            "{\"prompt_template\":\"T {a}\",\"variables\":{\"a\":\"line\\n\\\"q\\\"\",\"b\":\"caf\\u00e9 \\ud83d\\ude00\"}}"
        );
    }

    #[test]
    fn test_canonical_json_matches_serde_for_ascii() {
        let mut vars = BTreeMap::new();
        vars.insert("user".to_string(), "Ada".to_string());
        let expected = serde_json::to_string(&serde_json::json!({
            "prompt_template": "Hi {user}",
            "variables": {"user": "Ada"}
        }))
        .unwrap();
        assert_eq!(canonical_json("Hi {user}", &vars), expected);
    }
}
