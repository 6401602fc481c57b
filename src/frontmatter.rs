use anyhow::anyhow;
use serde_json::{Map, Value};

const MARKER: &str = "---";

/// Metadata block and Markdown body of a content file.
#[derive(Debug, Clone, PartialEq)]
pub struct Frontmatter<'a> {
    pub data: Map<String, Value>,
    pub body: &'a str,
}

/// Splits a YAML block delimited by `---` lines off the front of `data`.
/// Text without an opening marker is all body.
pub fn parse(data: &str) -> anyhow::Result<Frontmatter<'_>> {
    let data = data.strip_prefix('\u{feff}').unwrap_or(data);

    let mut lines = data.split_inclusive('\n');

    let start = match lines.next() {
        Some(first) if first.trim_end() == MARKER => first.len(),
        _ => {
            return Ok(Frontmatter {
                data: Map::new(),
                body: data,
            })
        }
    };

    let mut offset = start;
    for line in lines {
        if line.trim_end() == MARKER {
            let frontmatter = &data[start..offset];
            let extra = &data[offset + line.len()..];

            return Ok(Frontmatter {
                data: parse_block(frontmatter)?,
                body: extra.trim_start(),
            });
        }
        offset += line.len();
    }

    Err(anyhow!("unterminated frontmatter"))
}

fn parse_block(block: &str) -> anyhow::Result<Map<String, Value>> {
    if block.trim().is_empty() {
        return Ok(Map::new());
    }

    match serde_yaml::from_str::<Value>(block)? {
        Value::Null => Ok(Map::new()),
        Value::Object(map) => Ok(map),
        other => Err(anyhow!(
            "frontmatter must be a mapping, found {}",
            kind_of(&other)
        )),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_metadata_and_body() {
        let text = "---\ntitle: Intro\npriority: 0.5\ntags: [a, b]\n---\n\n# Hello\n";
        let parsed = parse(text).unwrap();

        assert_eq!(parsed.data["title"], "Intro");
        assert_eq!(parsed.data["priority"].as_f64(), Some(0.5));
        assert_eq!(parsed.data["tags"], serde_json::json!(["a", "b"]));
        assert_eq!(parsed.body, "# Hello\n");
    }

    #[test]
    fn text_without_marker_is_all_body() {
        let parsed = parse("# Just markdown\n\n---\n").unwrap();

        assert!(parsed.data.is_empty());
        assert_eq!(parsed.body, "# Just markdown\n\n---\n");
    }

    #[test]
    fn empty_block_and_crlf() {
        let parsed = parse("---\r\n---\r\nbody").unwrap();

        assert!(parsed.data.is_empty());
        assert_eq!(parsed.body, "body");
    }

    #[test]
    fn unterminated_block_is_an_error() {
        let err = parse("---\ntitle: x\n# no end").unwrap_err();
        assert!(err.to_string().contains("unterminated"));
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        assert!(parse("---\ntitle: [unclosed\n---\nbody").is_err());
    }

    #[test]
    fn scalar_block_is_rejected() {
        let err = parse("---\njust a string\n---\nbody").unwrap_err();
        assert!(err.to_string().contains("a string"));
    }
}
