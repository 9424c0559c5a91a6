//! 질문 분류기 - 도메인 판정 + how-to 판정
//!
//! 제품 프로필의 규칙 테이블(도메인 용어, how-to 패턴)을 컴파일해서 사용하는
//! 단일 범용 분류기입니다. 제품을 추가할 때 코드는 바뀌지 않습니다.

use regex::{Regex, RegexBuilder};

use crate::config::ProductProfile;
use crate::error::ConfigError;

/// 분류 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub in_domain: bool,
    pub is_how_to: bool,
}

/// 분류에 따른 처리 결정
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    /// 도메인 밖 질문 - 고정 안내
    Decline(String),
    /// how-to 가 아닌 질문 - 고정 안내 (예시 포함)
    Redirect(String),
    /// 검색 진행
    Proceed,
}

/// 제품별 질문 분류기
#[derive(Debug, Clone)]
pub struct QuestionClassifier {
    product_name: Regex,
    domain_terms: Vec<Regex>,
    term_threshold: usize,
    how_to_patterns: Vec<Regex>,
    decline_message: String,
    redirect_message: String,
}

/// 대소문자 무시 단어 경계 정규식
fn whole_word(term: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(&format!(r"\b{}\b", regex::escape(term)))
        .case_insensitive(true)
        .build()
}

impl QuestionClassifier {
    /// 제품 프로필에서 분류기 생성
    pub fn from_profile(profile: &ProductProfile) -> Result<Self, ConfigError> {
        let pattern_error = |pattern: &str, source: regex::Error| ConfigError::Pattern {
            product: profile.id.clone(),
            pattern: pattern.to_string(),
            source,
        };

        let product_name =
            whole_word(&profile.name).map_err(|e| pattern_error(&profile.name, e))?;

        let domain_terms = profile
            .domain_terms
            .iter()
            .map(|t| whole_word(t).map_err(|e| pattern_error(t, e)))
            .collect::<Result<Vec<_>, _>>()?;

        let how_to_patterns = profile
            .how_to_patterns
            .iter()
            .map(|p| {
                RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| pattern_error(p, e))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            product_name,
            domain_terms,
            term_threshold: profile.term_threshold,
            how_to_patterns,
            decline_message: profile.decline_message.clone(),
            redirect_message: profile.redirect_message.clone(),
        })
    }

    /// 도메인 판정: 제품명(단어 단위) 또는 도메인 용어 N개 이상
    pub fn is_in_domain(&self, question: &str) -> bool {
        if self.product_name.is_match(question) {
            return true;
        }

        let term_count = self
            .domain_terms
            .iter()
            .filter(|re| re.is_match(question))
            .count();

        term_count >= self.term_threshold
    }

    /// how-to 판정: 패턴 중 하나라도 부분 일치
    pub fn is_how_to(&self, question: &str) -> bool {
        self.how_to_patterns.iter().any(|re| re.is_match(question))
    }

    pub fn classify(&self, question: &str) -> Classification {
        Classification {
            in_domain: self.is_in_domain(question),
            is_how_to: self.is_how_to(question),
        }
    }

    /// 두 판정을 순서대로 적용
    pub fn gate(&self, question: &str) -> Gate {
        if !self.is_in_domain(question) {
            return Gate::Decline(self.decline_message.clone());
        }
        if !self.is_how_to(question) {
            return Gate::Redirect(self.redirect_message.clone());
        }
        Gate::Proceed
    }
}

// ============================================================================
// Tests
// ============================================================================
