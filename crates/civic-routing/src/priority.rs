use civic_core::IssuePriority;

pub const HIGH_PRIORITY_KEYWORDS: [&str; 13] = [
    "emergency",
    "urgent",
    "danger",
    "hazard",
    "accident",
    "injury",
    "fire",
    "flood",
    "electrical shock",
    "gas leak",
    "collapse",
    "blocked",
    "overflow",
];

pub const MEDIUM_PRIORITY_KEYWORDS: [&str; 8] = [
    "broken",
    "damaged",
    "not working",
    "problem",
    "issue",
    "complaint",
    "repair needed",
    "maintenance required",
];

/// Substring scan of the lowercased text: any high keyword wins, then any
/// medium keyword, otherwise Low.
pub fn estimate_priority(text: &str) -> IssuePriority {
    let text = text.to_lowercase();
    if HIGH_PRIORITY_KEYWORDS.iter().any(|kw| text.contains(kw)) {
        IssuePriority::High
    } else if MEDIUM_PRIORITY_KEYWORDS.iter().any(|kw| text.contains(kw)) {
        IssuePriority::Medium
    } else {
        IssuePriority::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_keywords_win_over_medium() {
        assert_eq!(estimate_priority("urgent gas leak emergency"), IssuePriority::High);
        assert_eq!(
            estimate_priority("Broken pipe, road BLOCKED"),
            IssuePriority::High
        );
    }

    #[test]
    fn medium_and_low() {
        assert_eq!(estimate_priority("streetlight not working"), IssuePriority::Medium);
        assert_eq!(estimate_priority("please paint the bench"), IssuePriority::Low);
        assert_eq!(estimate_priority(""), IssuePriority::Low);
    }

    #[test]
    fn every_high_keyword_alone_is_high() {
        for keyword in HIGH_PRIORITY_KEYWORDS {
            assert_eq!(estimate_priority(keyword), IssuePriority::High, "{keyword}");
            let padded = format!("near the market {keyword} since monday");
            assert_eq!(estimate_priority(&padded), IssuePriority::High, "{keyword}");
        }
    }

    #[test]
    fn estimation_is_pure() {
        let text = "damaged sidewalk outside the clinic";
        let first = estimate_priority(text);
        for _ in 0..5 {
            assert_eq!(estimate_priority(text), first);
        }
    }
}
