// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Task complexity scoring for Smart-Delegate's model tier selection.
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexityAssessment {
    pub score: f64,
    pub tier: String,
    pub reasons: Vec<String>,
    pub word_count: usize,
    pub signal_matches: Vec<String>,
}

macro_rules! lazy_regex_set {
    ($name:ident, [$($pat:expr),+ $(,)?]) => {
        static $name: LazyLock<Vec<Regex>> = LazyLock::new(|| {
            vec![$(Regex::new($pat).unwrap()),+]
        });
    };
}

lazy_regex_set!(
    HIGH_COMPLEXITY_SIGNALS,
    [
        r"(?i)\barchitect(?:ure)?\b",
        r"(?i)\bdesign\s+(?:system|pattern|decision)",
        r"(?i)\brefactor(?:ing)?\b.*(?:large|entire|whole|major)",
        r"(?i)\bmigrat(?:e|ion)\b",
        r"(?i)\boptimiz(?:e|ation)\b.*(?:performance|algorithm|query)",
        r"(?i)\bsecurity\s+(?:audit|review|analysis)",
        r"(?i)\bscalability\b",
        r"(?i)\bconcurrency\b",
        r"(?i)\bdistributed\b",
        r"(?i)\bmicroservices?\b",
        r"(?i)\binfrastructure\b",
        r"(?i)\bkubernetes|k8s|terraform|ansible\b",
        r"(?i)\bdeep\s+(?:analysis|dive|review|investigation)\b",
        r"(?i)\bcomplex\b",
        r"(?i)\bcritical\b.*(?:bug|issue|problem|error)",
        r"(?i)\bproduction\b.*(?:issue|bug|incident|outage)",
        r"(?i)\bwrite\s+(?:a\s+)?(?:full|complete|comprehensive)\b",
        r"(?i)\bfrom\s+scratch\b",
        r"(?i)\bimplement\s+(?:a\s+)?(?:new|full|complete)\b",
        r"(?i)\bmulti-?step\b",
        r"(?i)\bplan\s+and\s+implement\b",
        r"(?i)\banalyze\s+(?:and|then)\s+",
        r"(?i)\bresearch\s+(?:and|then)\s+",
        r"(?i)\bcompare\s+(?:and\s+)?(?:contrast|evaluate|choose)\b",
        r"(?i)\btrade-?offs?\b",
        r"(?i)\bpros?\s+(?:and|&)\s+cons?\b",
        r"(?i)\bdeploy\s+to\s+production\b",
        r"(?i)\bzero\s+downtime\b",
    ]
);

lazy_regex_set!(
    MID_COMPLEXITY_SIGNALS,
    [
        r"(?i)\bexplain\s+(?:how|why|the)\b",
        r"(?i)\bdebug(?:ging)?\b",
        r"(?i)\bfix\s+(?:this|the|a)\b.*\b(?:bug|error|issue)\b",
        r"(?i)\bwrite\s+(?:a\s+)?(?:function|class|module|script|test)\b",
        r"(?i)\badd\s+(?:a\s+)?(?:feature|endpoint|handler)\b",
        r"(?i)\bintegrat(?:e|ion)\b",
        r"(?i)\bupdate\s+(?:the|this)\b",
        r"(?i)\bconfigure\b",
        r"(?i)\bsetup\b",
        r"(?i)\breview\b",
        r"(?i)\btest(?:ing)?\b",
    ]
);

lazy_regex_set!(
    LOW_COMPLEXITY_SIGNALS,
    [
        r"(?i)\bwhat\s+is\b",
        r"(?i)\bshow\s+me\b",
        r"(?i)\blist\b",
        r"(?i)\bhelp\b",
        r"(?i)\bstatus\b",
        r"(?i)\bweather\b",
        r"(?i)\btime\b",
        r"(?i)\bhello\b",
        r"(?i)\bhi\b",
        r"(?i)\bthanks?\b",
        r"(?i)\bremind\b",
    ]
);

static ACTION_VERB_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:implement|add|write|create|build|deploy|configure|setup|test|fix|update|refactor|migrate|research|analyze)\b",
    )
    .unwrap()
});

fn matches_of<'a>(signals: &'static [Regex], text: &'a str) -> Vec<&'a str> {
    signals
        .iter()
        .filter_map(|re| re.find(text).map(|m| m.as_str()))
        .collect()
}

/// Assess the complexity of `task`, returning a clamped `[0, 1]` score and
/// its mapped tier (`xhigh`/`high`/`mid`/`low`/`fast`).
pub fn assess(task: &str) -> ComplexityAssessment {
    let task_lower = task.to_lowercase();
    let word_count = task.split_whitespace().count();

    let high_matches = matches_of(&HIGH_COMPLEXITY_SIGNALS, &task_lower);
    let mid_matches = matches_of(&MID_COMPLEXITY_SIGNALS, &task_lower);
    let low_matches = matches_of(&LOW_COMPLEXITY_SIGNALS, &task_lower);

    let mut score = 0.30_f64;
    score += (high_matches.len() as f64 * 0.15).min(0.45);
    score += (mid_matches.len() as f64 * 0.08).min(0.20);
    score -= (low_matches.len() as f64 * 0.10).min(0.30);

    if word_count > 100 {
        score += 0.15;
    } else if word_count > 50 {
        score += 0.10;
    } else if word_count > 25 {
        score += 0.05;
    } else if word_count < 10 {
        score -= 0.10;
    }

    let sentence_count = task.trim().split(['.', '!', '?']).filter(|s| !s.is_empty()).count().max(1);
    if sentence_count > 4 {
        score += 0.10;
    } else if sentence_count > 2 {
        score += 0.05;
    }

    let action_verbs = ACTION_VERB_RE.find_iter(&task_lower).count();
    if action_verbs >= 4 {
        score += 0.20;
    } else if action_verbs >= 3 {
        score += 0.12;
    } else if action_verbs >= 2 {
        score += 0.05;
    }

    if task.contains("```")
        || Regex::new(r"(?:def |class |function |import )").unwrap().is_match(task)
    {
        score += 0.10;
    }

    score = score.clamp(0.0, 1.0);

    let mut reasons = Vec::new();
    let tier = if score >= 0.75 {
        reasons.push(format!("Very complex task (score {score:.2})"));
        if !high_matches.is_empty() {
            reasons.push(format!("Key signals: {}", high_matches[..high_matches.len().min(3)].join(", ")));
        }
        reasons.push("Needs deep reasoning model for best results".to_string());
        "xhigh"
    } else if score >= 0.55 {
        reasons.push(format!("Complex task (score {score:.2})"));
        if !high_matches.is_empty() {
            reasons.push(format!("Complexity indicators: {}", high_matches[..high_matches.len().min(3)].join(", ")));
        }
        reasons.push("Strong model recommended for accuracy".to_string());
        "high"
    } else if score >= 0.35 {
        reasons.push(format!("Moderate complexity (score {score:.2})"));
        if !mid_matches.is_empty() {
            reasons.push(format!("Task involves: {}", mid_matches[..mid_matches.len().min(3)].join(", ")));
        }
        "mid"
    } else if score >= 0.20 {
        reasons.push(format!("Straightforward task (score {score:.2})"));
        "low"
    } else {
        reasons.push(format!("Simple task (score {score:.2})"));
        reasons.push("Fast model is sufficient".to_string());
        "fast"
    };

    let mut signal_matches: Vec<String> = high_matches.iter().chain(mid_matches.iter()).map(|s| s.to_string()).collect();
    signal_matches.dedup();

    ComplexityAssessment {
        score,
        tier: tier.to_string(),
        reasons,
        word_count,
        signal_matches,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trivial_greeting_is_fast_tier() {
        let a = assess("hello");
        assert!(a.score <= 0.30);
        assert_eq!(a.tier, "fast");
    }

    #[test]
    fn architecture_task_is_high_or_xhigh() {
        let a = assess(
            "Design a microservices architecture for a payment processing system. Consider \
             scalability, security audit requirements, and distributed transaction handling. \
             Compare trade-offs between event sourcing and CQRS.",
        );
        assert!(a.score >= 0.60, "score was {}", a.score);
        assert!(a.tier == "xhigh" || a.tier == "high");
    }

    #[test]
    fn score_is_always_clamped() {
        let a = assess("architecture migration distributed concurrency scalability security audit");
        assert!(a.score >= 0.0 && a.score <= 1.0);
    }

    #[test]
    fn code_block_adds_bonus() {
        let without = assess("review this");
        let with = assess("review this\n```rust\nfn main() {}\n```");
        assert!(with.score >= without.score);
    }
}
