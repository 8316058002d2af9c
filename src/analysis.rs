//! Recipe analysis: the one operation the relay exists for.
//!
//! `analyze(content, is_image)` builds the prompt, calls the upstream and
//! parses the assistant's JSON into an [`AllergenReport`].

use crate::error::RelayError;
use crate::prompt::{is_regulated_allergen, text_instruction, IMAGE_INSTRUCTION, SYSTEM_PROMPT};
use crate::upstream::{ChatClient, ChatMessage, ContentPart, ImageUrl, Usage};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// One product and its allergen classification.
///
/// Keys the model adds beyond the three known ones are kept in `extra` and
/// relayed untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Product {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub allergens: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub traces: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Result of one analysis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AllergenReport {
    pub products: Vec<Product>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Models sometimes answer `null` instead of `[]` for an empty list.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// What the caller sent us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipeInput {
    Text(String),
    /// Data URL or http(s) URL.
    Image(String),
}

impl RecipeInput {
    /// Build from the `/analyze` body fields. Missing or empty content is
    /// rejected; whitespace is forwarded as-is.
    pub fn from_request(content: Option<String>, is_image: bool) -> Result<Self, RelayError> {
        let content = content
            .filter(|c| !c.is_empty())
            .ok_or(RelayError::MissingContent)?;

        Ok(if is_image {
            Self::Image(content)
        } else {
            Self::Text(content)
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Image(_) => "image",
        }
    }

    /// System + user messages for this input.
    pub fn to_messages(&self) -> Vec<ChatMessage> {
        let user = match self {
            Self::Text(content) => ChatMessage::user(text_instruction(content)),
            Self::Image(url) => ChatMessage::user_parts(vec![
                ContentPart::Text {
                    text: IMAGE_INSTRUCTION.to_string(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl { url: url.clone() },
                },
            ]),
        };

        vec![ChatMessage::system(SYSTEM_PROMPT), user]
    }
}

/// A parsed report together with upstream token usage.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub report: AllergenReport,
    pub usage: Option<Usage>,
}

/// Runs analyses against the configured upstream.
#[derive(Clone)]
pub struct Analyzer {
    client: ChatClient,
}

impl Analyzer {
    pub fn new(client: ChatClient) -> Self {
        Self { client }
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_configured()
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }

    pub async fn analyze(&self, input: &RecipeInput) -> Result<Analysis, RelayError> {
        if !self.is_configured() {
            return Err(RelayError::ApiKeyMissing);
        }

        let completion = self.client.complete(input.to_messages()).await?;
        let report = parse_report(&completion.content)?;

        for product in &report.products {
            for name in product.allergens.iter().chain(&product.traces) {
                if !is_regulated_allergen(name) {
                    tracing::warn!(product = %product.name, allergen = %name, "Model returned a non-regulated allergen");
                }
            }
        }

        Ok(Analysis {
            report,
            usage: completion.usage,
        })
    }
}

/// Parse the assistant's content into a report.
///
/// JSON mode normally returns a bare object, but some compatible backends
/// still wrap it in a Markdown fence.
pub fn parse_report(content: &str) -> Result<AllergenReport, RelayError> {
    static FENCE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?s)^\s*```(?:json)?\s*(.*?)\s*```\s*$").expect("static regex")
    });

    let json = FENCE_REGEX
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(content);

    serde_json::from_str(json).map_err(|e| RelayError::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::{MessageContent, Role};
    use pretty_assertions::assert_eq;
    use reqwest::Client;
    use serde_json::json;

    fn croissant() -> Product {
        Product {
            name: "Croissant".to_string(),
            allergens: vec!["Gluten".to_string(), "Lait".to_string()],
            traces: vec!["Sésame".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn missing_or_empty_content_is_rejected() {
        assert_eq!(
            RecipeInput::from_request(None, false),
            Err(RelayError::MissingContent)
        );
        assert_eq!(
            RecipeInput::from_request(Some(String::new()), true),
            Err(RelayError::MissingContent)
        );
    }

    #[test]
    fn whitespace_content_is_forwarded() {
        assert_eq!(
            RecipeInput::from_request(Some("  ".to_string()), false),
            Ok(RecipeInput::Text("  ".to_string()))
        );
    }

    #[test]
    fn is_image_flag_selects_input_kind() {
        let text = RecipeInput::from_request(Some("farine".to_string()), false).unwrap();
        let image = RecipeInput::from_request(Some("data:image/png;base64,AA".to_string()), true).unwrap();

        assert_eq!(text.kind(), "text");
        assert_eq!(image.kind(), "image");
    }

    #[test]
    fn text_input_builds_system_then_user_string() {
        let messages = RecipeInput::Text("Farine, beurre".to_string()).to_messages();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, MessageContent::Text(SYSTEM_PROMPT.to_string()));
        assert_eq!(messages[1].role, Role::User);
        match &messages[1].content {
            MessageContent::Text(text) => assert!(text.ends_with("Farine, beurre")),
            other => panic!("expected text content, got {:?}", other),
        }
    }

    #[test]
    fn image_input_builds_two_part_user_message() {
        let messages = RecipeInput::Image("https://example.com/recette.jpg".to_string()).to_messages();

        let value = serde_json::to_value(&messages[1]).unwrap();
        assert_eq!(value["content"][0]["type"], "text");
        assert_eq!(value["content"][0]["text"], IMAGE_INSTRUCTION);
        assert_eq!(value["content"][1]["type"], "image_url");
        assert_eq!(value["content"][1]["image_url"]["url"], "https://example.com/recette.jpg");
    }

    #[test]
    fn parses_bare_json_report() {
        let content = json!({"products": [croissant()]}).to_string();
        let report = parse_report(&content).unwrap();
        assert_eq!(report.products, vec![croissant()]);
    }

    #[test]
    fn parses_fenced_json_report() {
        let content = "```json\n{\"products\": [{\"name\": \"Pain\", \"allergens\": [\"Gluten\"]}]}\n```";
        let report = parse_report(content).unwrap();

        assert_eq!(report.products[0].name, "Pain");
        assert_eq!(report.products[0].traces, Vec::<String>::new());
    }

    #[test]
    fn null_lists_become_empty() {
        let content = r#"{"products": [{"name": "Pain", "allergens": ["Gluten"], "traces": null}]}"#;
        let report = parse_report(content).unwrap();

        assert_eq!(report.products[0].allergens, vec!["Gluten".to_string()]);
        assert_eq!(report.products[0].traces, Vec::<String>::new());

        let report = parse_report(r#"{"products": [{"name": "Eau", "allergens": null}]}"#).unwrap();
        assert!(report.products[0].allergens.is_empty());
    }

    #[test]
    fn unknown_keys_are_relayed() {
        let content = json!({
            "products": [{"name": "Pain", "allergens": [], "traces": [], "notes": "sans levure"}],
            "warning": "photo floue"
        });

        let report = parse_report(&content.to_string()).unwrap();

        assert_eq!(report.extra["warning"], "photo floue");
        assert_eq!(report.products[0].extra["notes"], "sans levure");
        assert_eq!(serde_json::to_value(&report).unwrap(), content);
    }

    #[test]
    fn non_json_content_is_a_parse_error() {
        let err = parse_report("Voici les allergènes : gluten").unwrap_err();
        assert!(matches!(err, RelayError::Parse(_)));
    }

    #[test]
    fn report_without_products_is_a_parse_error() {
        let err = parse_report(r#"{"items": []}"#).unwrap_err();
        assert!(err.to_string().contains("products"));
    }

    #[tokio::test]
    async fn analyzer_without_key_reports_missing_key() {
        let client = ChatClient::new(Client::new(), "http://127.0.0.1:9/v1", "gpt-4o");
        let analyzer = Analyzer::new(client);

        let err = analyzer
            .analyze(&RecipeInput::Text("farine".to_string()))
            .await
            .unwrap_err();

        assert_eq!(err, RelayError::ApiKeyMissing);
    }

    #[tokio::test]
    async fn analyzer_returns_parsed_report_and_usage() {
        let mut server = mockito::Server::new_async().await;
        let content = json!({"products": [croissant()]}).to_string();
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(
                json!({
                    "choices": [{"message": {"content": content}}],
                    "usage": {"prompt_tokens": 1000, "completion_tokens": 40, "total_tokens": 1040}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = ChatClient::new(Client::new(), format!("{}/v1", server.url()), "gpt-4o")
            .with_api_key(Some("sk-test".to_string()));
        let analysis = Analyzer::new(client)
            .analyze(&RecipeInput::Text("Croissant: farine, beurre".to_string()))
            .await
            .unwrap();

        assert_eq!(analysis.report.products, vec![croissant()]);
        assert_eq!(analysis.usage.map(|u| u.completion_tokens), Some(40));
    }
}
