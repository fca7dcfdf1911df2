use crate::Classification;
use civic_core::{scan_text, Department, RoutingMethod};

pub const FALLBACK_DEFAULT: Department = Department::PublicWorks;
pub const FALLBACK_MIN_CONFIDENCE: f64 = 0.3;
pub const FALLBACK_MAX_CONFIDENCE: f64 = 0.8;

/// Keyword sets in enumeration order; ties resolve to the earlier entry.
pub const DEPARTMENT_KEYWORDS: [(Department, &[&str]); 6] = [
    (
        Department::Sanitation,
        &["garbage", "trash", "waste", "dirty", "clean", "toilet", "bin", "litter"],
    ),
    (
        Department::PublicWorks,
        &["road", "pothole", "construction", "building", "infrastructure", "repair", "sidewalk"],
    ),
    (
        Department::TrafficPolice,
        &["traffic", "signal", "parking", "accident", "violation", "congestion", "vehicle"],
    ),
    (
        Department::WaterDepartment,
        &["water", "leak", "pipe", "sewage", "drainage", "contamination", "supply"],
    ),
    (
        Department::ElectricityBoard,
        &["light", "power", "electrical", "outage", "transformer", "wire", "electricity"],
    ),
    (
        Department::ParksRecreation,
        &["park", "garden", "tree", "playground", "recreation", "green"],
    ),
];

/// Deterministic keyword routing over `title + description`. Each keyword
/// counts once if it occurs anywhere as a substring.
pub fn fallback_classification(title: &str, description: &str) -> Classification {
    let text = scan_text(title, description);

    let mut best = FALLBACK_DEFAULT;
    let mut best_hits: Vec<&str> = Vec::new();
    for (department, keywords) in DEPARTMENT_KEYWORDS {
        let hits = keywords
            .iter()
            .copied()
            .filter(|keyword| text.contains(keyword))
            .collect::<Vec<_>>();
        if hits.len() > best_hits.len() {
            best = department;
            best_hits = hits;
        }
    }

    let reasoning = if best_hits.is_empty() {
        "keyword_fallback:no_match".to_string()
    } else {
        format!("keyword_fallback:{}", best_hits.join("+"))
    };

    Classification {
        department: best,
        confidence: fallback_confidence(best_hits.len()),
        method: RoutingMethod::Fallback,
        reasoning,
    }
}

pub fn fallback_confidence(hit_count: usize) -> f64 {
    (hit_count as f64 / 5.0).clamp(FALLBACK_MIN_CONFIDENCE, FALLBACK_MAX_CONFIDENCE)
}
