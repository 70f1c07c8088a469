use apigw_core::model::{LlmProvider, LlmProviderTemplate};
use apigw_core::{Error, Resource, TypeUrl};

use crate::translator::{Translation, Translator};

/// One `LLMProvider` resource per provider, named by provider name.
#[derive(Default)]
pub struct LlmProviderTranslator;

impl LlmProviderTranslator {
    pub fn new() -> Self {
        Self
    }
}

impl Translator<LlmProvider> for LlmProviderTranslator {
    fn type_url(&self) -> TypeUrl {
        TypeUrl::LlmProvider
    }

    fn translate(&self, items: &[LlmProvider]) -> Translation {
        let mut out = Translation::new();
        for provider in items {
            if !provider.api_base_url.starts_with("http://")
                && !provider.api_base_url.starts_with("https://")
            {
                out.fail(
                    &provider.name,
                    Error::translation(&provider.name, "api_base_url is not an http(s) URL"),
                );
                continue;
            }
            match Resource::encode(&provider.name, &self.type_url(), provider) {
                Ok(resource) => out.push(self.type_url(), resource),
                Err(err) => out.fail(&provider.name, err),
            }
        }
        out
    }
}

/// One `LLMProviderTemplate` resource per template, named by template name.
#[derive(Default)]
pub struct LlmTemplateTranslator;

impl LlmTemplateTranslator {
    pub fn new() -> Self {
        Self
    }
}

impl Translator<LlmProviderTemplate> for LlmTemplateTranslator {
    fn type_url(&self) -> TypeUrl {
        TypeUrl::LlmProviderTemplate
    }

    fn translate(&self, items: &[LlmProviderTemplate]) -> Translation {
        let mut out = Translation::new();
        for template in items {
            match Resource::encode(&template.name, &self.type_url(), template) {
                Ok(resource) => out.push(self.type_url(), resource),
                Err(err) => out.fail(&template.name, err),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_with_bad_url_is_skipped() {
        let providers = vec![
            LlmProvider {
                name: "openai".into(),
                api_base_url: "https://api.openai.com/v1".into(),
                template: "openai".into(),
                auth_header: None,
                models: vec!["gpt-4o".into()],
            },
            LlmProvider {
                name: "broken".into(),
                api_base_url: "ftp://nope".into(),
                template: "openai".into(),
                auth_header: None,
                models: Vec::new(),
            },
        ];
        let translation = LlmProviderTranslator::new().translate(&providers);
        assert_eq!(translation.resources[&TypeUrl::LlmProvider].len(), 1);
        assert_eq!(translation.failures.len(), 1);
    }
}
