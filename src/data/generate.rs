//! AI-generated data tables.
//!
//! The generator is asked for a JSON array of objects carrying exactly the
//! requested keys. The reply is free text, so the first syntactically valid
//! JSON array inside it is used. Generation is all-or-nothing: any failure
//! returns [`StencilError::Generation`] and no table.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::{DataTable, Row};
use crate::error::{Result, StencilError};
use crate::services::TextGenerator;

/// What to ask the generator for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRequest {
    pub columns: Vec<String>,
    pub count: usize,
    /// Free-form description of the content, e.g. "spring sale products".
    #[serde(default)]
    pub topic: String,
}

impl TableRequest {
    pub fn new(columns: Vec<String>, count: usize, topic: impl Into<String>) -> Self {
        Self {
            columns,
            count,
            topic: topic.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.columns.iter().all(|c| c.trim().is_empty()) {
            return Err(StencilError::Validation("at least one column is required".into()));
        }
        if self.count == 0 {
            return Err(StencilError::Validation("row count must be at least 1".into()));
        }
        Ok(())
    }

    /// Prompt text sent to the generator.
    pub fn prompt(&self, brand: Option<&str>) -> String {
        let keys = self
            .columns
            .iter()
            .map(|c| format!("\"{}\"", c.trim()))
            .collect::<Vec<_>>()
            .join(", ");
        let mut prompt = format!(
            "Generate {} rows of data for social media designs",
            self.count
        );
        if !self.topic.trim().is_empty() {
            prompt.push_str(&format!(" about: {}", self.topic.trim()));
        }
        prompt.push_str(".\n");
        if let Some(brand) = brand {
            prompt.push_str(&format!("Brand context: {}\n", brand));
        }
        prompt.push_str(&format!(
            "Respond with only a JSON array of {} objects. Each object must have exactly these keys: {}. All values must be strings.",
            self.count, keys
        ));
        prompt
    }
}

/// Ask `generator` for a table matching `request`.
pub async fn generate_table(
    generator: &dyn TextGenerator,
    request: &TableRequest,
    brand: Option<&str>,
) -> Result<DataTable> {
    request.validate()?;
    let response = generator.generate_text(&request.prompt(brand)).await?;
    let table = table_from_response(&response, &request.columns)?;
    info!(
        rows = table.len(),
        requested = request.count,
        "generated data table"
    );
    Ok(table)
}

/// Parse a generator reply into a table with the requested columns.
pub fn table_from_response(response: &str, columns: &[String]) -> Result<DataTable> {
    let values = extract_json_array(response)
        .ok_or_else(|| StencilError::Generation("no JSON array found in response".into()))?;

    let rows: Vec<Row> = values
        .into_iter()
        .filter_map(|value| match value {
            Value::Object(map) => Some(Row::from_pairs(
                map.into_iter()
                    .filter_map(|(k, v)| value_to_string(v).map(|s| (k.trim().to_string(), s))),
            )),
            _ => None,
        })
        .collect();
    debug!(objects = rows.len(), "parsed generated rows");

    DataTable::from_rows(columns.to_vec(), rows).map_err(|e| match e {
        StencilError::Import(msg) => StencilError::Generation(msg),
        other => other,
    })
}

/// First `[...]` substring that parses as a JSON array holding at least one
/// object, else the first that parses at all.
pub fn extract_json_array(text: &str) -> Option<Vec<Value>> {
    let mut fallback = None;
    for (start, _) in text.match_indices('[') {
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        if let Some(Ok(Value::Array(items))) = stream.next() {
            if items.iter().any(Value::is_object) {
                return Some(items);
            }
            fallback.get_or_insert(items);
        }
    }
    fallback
}

fn value_to_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        nested => Some(nested.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    struct Canned(&'static str);

    #[async_trait]
    impl TextGenerator for Canned {
        async fn generate_text(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct Failing;

    #[async_trait]
    impl TextGenerator for Failing {
        async fn generate_text(&self, _prompt: &str) -> Result<String> {
            Err(StencilError::Generation("timed out".into()))
        }
    }

    fn cols(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn extracts_array_from_prose() {
        let text = "Sure! Note [1] the format:\n```json\n[{\"a\": \"x\"}, {\"a\": \"y\"}]\n```";
        // "[1]" parses first but holds no objects
        assert_eq!(
            extract_json_array(text).unwrap(),
            vec![serde_json::json!({"a": "x"}), serde_json::json!({"a": "y"})]
        );
        assert_eq!(extract_json_array("only [1, 2] here").unwrap().len(), 2);

        let text = "Here you go: [{\"a\": \"x\"}, {\"a\": \"y\"}] hope that helps [";
        assert_eq!(extract_json_array(text).unwrap().len(), 2);
    }

    #[test]
    fn skips_broken_brackets() {
        let text = "[oops [{\"a\": \"1\"}]";
        assert_eq!(extract_json_array(text).unwrap().len(), 1);
        assert!(extract_json_array("no array here").is_none());
        assert!(extract_json_array("[unterminated").is_none());
    }

    #[test]
    fn coerces_values_and_ignores_extra_keys() {
        let table = table_from_response(
            r#"[{"name": "Ann", "age": 31, "vip": true, "extra": "x"}, {"name": null, "age": 2}]"#,
            &cols(&["name", "age", "vip"]),
        )
        .unwrap();
        assert_eq!(table.columns(), &cols(&["name", "age", "vip"]));
        assert_eq!(table.rows()[0].get("age"), Some("31"));
        assert_eq!(table.rows()[0].get("vip"), Some("true"));
        assert_eq!(table.rows()[0].get("extra"), None);
        assert_eq!(table.rows()[1].get("name"), None);
    }

    #[test]
    fn empty_array_is_generation_error() {
        assert!(matches!(
            table_from_response("[]", &cols(&["a"])),
            Err(StencilError::Generation(_))
        ));
        assert!(matches!(
            table_from_response("[1, 2]", &cols(&["a"])),
            Err(StencilError::Generation(_))
        ));
    }

    #[test]
    fn prompt_lists_keys_and_brand() {
        let req = TableRequest::new(cols(&["headline", "cta"]), 3, "summer menu");
        let prompt = req.prompt(Some("Cozy bakery"));
        assert!(prompt.contains("\"headline\", \"cta\""));
        assert!(prompt.contains("3 objects"));
        assert!(prompt.contains("summer menu"));
        assert!(prompt.contains("Cozy bakery"));
        assert!(!req.prompt(None).contains("Brand context"));
    }

    #[tokio::test]
    async fn generate_table_end_to_end() {
        let generator = Canned(r#"```json
[{"headline": "Fresh bread"}, {"headline": "Hot coffee"}]
```"#);
        let req = TableRequest::new(cols(&["headline"]), 2, "");
        let table = generate_table(&generator, &req, None).await.unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[1].get("headline"), Some("Hot coffee"));
    }

    #[tokio::test]
    async fn footnote_brackets_before_the_table_are_skipped() {
        let generator = Canned(r#"Note [1]: values are invented. [{"headline": "Fresh bread"}]"#);
        let req = TableRequest::new(cols(&["headline"]), 1, "");
        let table = generate_table(&generator, &req, None).await.unwrap();
        assert_eq!(table.rows()[0].get("headline"), Some("Fresh bread"));
    }

    #[tokio::test]
    async fn generator_failures_propagate() {
        let req = TableRequest::new(cols(&["headline"]), 2, "");
        assert!(matches!(
            generate_table(&Failing, &req, None).await,
            Err(StencilError::Generation(_))
        ));
        assert!(matches!(
            generate_table(&Canned("sorry, I can't"), &req, None).await,
            Err(StencilError::Generation(_))
        ));
        let bad = TableRequest::new(cols(&["headline"]), 0, "");
        assert!(matches!(
            generate_table(&Canned("[]"), &bad, None).await,
            Err(StencilError::Validation(_))
        ));
    }
}
