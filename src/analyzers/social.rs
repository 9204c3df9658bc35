//! Social presence scoring

use crate::config::SocialAnalyzerConfig;
use crate::models::{FactorResult, SocialMetadata, SocialSignals};

/// Keywords common in pump-and-dump token names
const HYPE_KEYWORDS: &[&str] = &[
    "elon", "musk", "doge", "shib", "inu", "moon", "rocket", "pump", "safe", "x100", "1000x",
    "lambo", "gem", "pepe", "wojak", "chad",
];

pub const NO_METADATA_REASON: &str = "no social metadata found";

pub fn hype_keywords(name: Option<&str>, symbol: Option<&str>) -> Vec<&'static str> {
    let text = format!("{} {}", name.unwrap_or(""), symbol.unwrap_or("")).to_ascii_lowercase();
    HYPE_KEYWORDS
        .iter()
        .copied()
        .filter(|k| text.contains(k))
        .collect()
}

pub fn score_social(
    metadata: Option<&SocialMetadata>,
    name: Option<&str>,
    symbol: Option<&str>,
    config: &SocialAnalyzerConfig,
) -> FactorResult {
    let mut result = match metadata {
        None => FactorResult::abstained(config.missing_score, NO_METADATA_REASON),
        Some(meta) => {
            let signals = SocialSignals::from(meta);
            let present: Vec<&str> = [
                (signals.has_website, "website"),
                (signals.has_twitter, "twitter"),
                (signals.has_telegram, "telegram"),
            ]
            .into_iter()
            .filter_map(|(has, label)| has.then_some(label))
            .collect();

            let (score, reason) = match present.len() {
                0 => (config.none_score, "no website or social links".to_string()),
                3 => (config.full_score, "website, twitter and telegram present".to_string()),
                _ => (config.partial_score, format!("partial social presence: {}", present.join(", "))),
            };
            FactorResult::scored(score, vec![reason])
        }
    };

    if config.check_name_patterns {
        let hits = hype_keywords(name, symbol);
        if !hits.is_empty() {
            result
                .reasons
                .push(format!("hype-style name ({})", hits.join(", ")));
        }
    }
    result
}
