//! CDP 라우터 - 질문이 어느 제품(또는 비교)에 관한 것인지 결정

use regex::{Regex, RegexBuilder};

use crate::config::{ProductProfile, RouterSettings};
use crate::error::ConfigError;

/// 라우팅 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// 특정 제품 (프로필 ID)
    Product(String),
    /// 여러 제품 비교 질문
    Comparison,
    /// 제품을 특정할 수 없음
    Unknown,
}

struct ProductAliases {
    id: String,
    aliases: Vec<String>,
}

pub struct CdpRouter {
    products: Vec<ProductAliases>,
    comparison_cues: Vec<Regex>,
    comparison_threshold: usize,
}

impl CdpRouter {
    pub fn new(products: &[ProductProfile], settings: &RouterSettings) -> Result<Self, ConfigError> {
        let comparison_cues = settings
            .comparison_cues
            .iter()
            .map(|cue| {
                RegexBuilder::new(&format!(r"\b{}\b", regex::escape(cue)))
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| ConfigError::Pattern {
                        product: "router".to_string(),
                        pattern: cue.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let products = products
            .iter()
            .map(|p| ProductAliases {
                id: p.id.clone(),
                aliases: p.aliases().collect(),
            })
            .collect();

        Ok(Self {
            products,
            comparison_cues,
            comparison_threshold: settings.comparison_threshold,
        })
    }

    /// 질문에 언급된 제품 ID 목록 (설정 순서, 중복 없음)
    pub fn mentioned_products(&self, question: &str) -> Vec<&str> {
        let lower = question.to_lowercase();
        self.products
            .iter()
            .filter(|p| p.aliases.iter().any(|alias| lower.contains(alias.as_str())))
            .map(|p| p.id.as_str())
            .collect()
    }

    fn cue_count(&self, question: &str) -> usize {
        self.comparison_cues
            .iter()
            .filter(|re| re.is_match(question))
            .count()
    }

    /// 라우팅: 비교 판정을 먼저 하고, 그 다음 첫 번째로 언급된 제품
    pub fn route(&self, question: &str) -> Route {
        let mentioned = self.mentioned_products(question);

        if mentioned.len() >= 2 && self.cue_count(question) >= self.comparison_threshold {
            tracing::debug!(products = ?mentioned, "Routed as comparison");
            return Route::Comparison;
        }

        match mentioned.first() {
            Some(id) => Route::Product(id.to_string()),
            None => Route::Unknown,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_products;

    fn router() -> CdpRouter {
        CdpRouter::new(&default_products(), &RouterSettings::default()).unwrap()
    }

    #[test]
    fn test_single_product() {
        let r = router();
        assert_eq!(
            r.route("How do I set up a new source in Segment?"),
            Route::Product("segment".to_string())
        );
        assert_eq!(
            r.route("how do i create an audience in LYTICS"),
            Route::Product("lytics".to_string())
        );
        assert_eq!(
            r.route("How can I use m particle feeds?"),
            Route::Product("mparticle".to_string())
        );
    }

    #[test]
    fn test_comparison_needs_cues_and_products() {
        let r = router();
        assert_eq!(
            r.route("Compare Segment vs Lytics: which is better?"),
            Route::Comparison
        );
        // 신호 단어 1개
        assert_ne!(
            r.route("What is the difference between Segment and Zeotap?"),
            Route::Comparison
        );
        // 제품 1개
        assert_eq!(
            r.route("Compare the difference between Segment sources"),
            Route::Product("segment".to_string())
        );
    }

    #[test]
    fn test_comparison_cues_are_whole_words() {
        let r = router();
        // "vs" 가 다른 단어 안에 있으면 세지 않음
        assert_eq!(
            r.route("Segment and Zeotap canvs comparer"),
            Route::Product("segment".to_string())
        );
    }

    #[test]
    fn test_first_mentioned_in_config_order() {
        let r = router();
        assert_eq!(
            r.route("Move from Zeotap to Segment"),
            Route::Product("segment".to_string())
        );
    }

    #[test]
    fn test_unknown() {
        let r = router();
        assert_eq!(r.route("What's the weather today?"), Route::Unknown);
        assert_eq!(r.route(""), Route::Unknown);
    }
}
