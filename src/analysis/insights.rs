//! Cross-report emotional insights and recommendations.
//!
//! Pure functions over already-loaded reports; nothing here touches the
//! store.

use crate::models::{EmotionLabel, EmotionShare, Recommendation, Report};

/// Percentage share of every label that appears across `reports`.
///
/// Labels that never appear are omitted. Shares are sorted by percentage,
/// highest first; equal shares keep the order in which their labels were
/// first seen in the flattened observation sequence. Returns `None` when
/// there are no observations at all.
pub fn summarize_across_reports(reports: &[Report]) -> Option<Vec<EmotionShare>> {
    // (label, count) in first-encounter order
    let mut counts: Vec<(EmotionLabel, usize)> = Vec::new();
    let mut total = 0usize;

    for observation in reports.iter().flat_map(|r| &r.expressions) {
        total += 1;
        match counts.iter_mut().find(|(label, _)| *label == observation.emotion) {
            Some((_, count)) => *count += 1,
            None => counts.push((observation.emotion, 1)),
        }
    }

    if total == 0 {
        return None;
    }

    // Stable sort keeps first-encounter order for ties.
    counts.sort_by_key(|(_, count)| std::cmp::Reverse(*count));

    Some(
        counts
            .into_iter()
            .map(|(emotion, count)| EmotionShare {
                emotion,
                percentage: count as f64 / total as f64 * 100.0,
            })
            .collect(),
    )
}

const GENERAL_WELLBEING: Recommendation = Recommendation {
    title: "General Wellbeing",
    activities: &[
        "Practice regular meditation",
        "Maintain a consistent sleep schedule",
        "Engage in physical activity",
    ],
};

/// Fixed recommendation for a dominant emotion.
pub fn recommendation_for(emotion: EmotionLabel) -> Recommendation {
    match emotion {
        EmotionLabel::Happy => Recommendation {
            title: "Maintain Positive Energy",
            activities: &[
                "Practice gratitude journaling",
                "Share your joy with others",
                "Engage in creative activities",
            ],
        },
        EmotionLabel::Sad => Recommendation {
            title: "Uplift Your Mood",
            activities: &[
                "Try a guided meditation session",
                "Take a mindful walk outside",
                "Connect with a supportive friend",
            ],
        },
        EmotionLabel::Angry => Recommendation {
            title: "Find Inner Peace",
            activities: &[
                "Practice deep breathing exercises",
                "Try progressive muscle relaxation",
                "Write down your thoughts",
            ],
        },
        EmotionLabel::Fearful => Recommendation {
            title: "Build Confidence",
            activities: &[
                "Practice grounding techniques",
                "Try positive affirmations",
                "Start with small achievable goals",
            ],
        },
        EmotionLabel::Neutral => Recommendation {
            title: "Enhance Emotional Awareness",
            activities: &[
                "Try mindfulness exercises",
                "Start emotion journaling",
                "Explore new activities",
            ],
        },
        EmotionLabel::Disgusted => GENERAL_WELLBEING,
        EmotionLabel::Surprised => GENERAL_WELLBEING,
    }
}

/// Recommendation for a free-form label; unknown labels get the general one.
pub fn recommend_for_label(label: &str) -> Recommendation {
    label
        .parse::<EmotionLabel>()
        .map(recommendation_for)
        .unwrap_or(GENERAL_WELLBEING)
}

/// Recommendations keyed on the dominant (first) share of `insights`.
pub fn recommend(insights: &[EmotionShare]) -> Vec<Recommendation> {
    insights
        .first()
        .map(|top| vec![recommendation_for(top.emotion)])
        .unwrap_or_default()
}
