//! Structured candidate evaluation.
//!
//! Field names follow the JSON contract the evaluation prompt asks the model
//! for (`technicalSkills`, `overallRecommendation`, ...). Decoding is lenient
//! where models are sloppy (scores as strings or floats, recommendation
//! casing); encoding is always canonical.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// A 1-10 score with its justification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Score {
    #[serde(deserialize_with = "deserialize_score")]
    pub score: u8,
    #[serde(default)]
    pub assessment: String,
}

impl Score {
    pub fn new(score: u8, assessment: impl Into<String>) -> Self {
        Self {
            score: score.clamp(1, 10),
            assessment: assessment.into(),
        }
    }
}

fn deserialize_score<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let raw = match &value {
        Value::Number(n) => n.as_f64(),
        // "7" or "7/10"
        Value::String(s) => s
            .split('/')
            .next()
            .and_then(|head| head.trim().parse::<f64>().ok()),
        _ => None,
    };
    match raw {
        Some(n) if n.is_finite() => Ok(n.round().clamp(1.0, 10.0) as u8),
        _ => Err(de::Error::custom(format!("invalid score: {value}"))),
    }
}

/// Hiring recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recommendation {
    Reject,
    Consider,
    StrongConsider,
    Hire,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Reject => "Reject",
            Recommendation::Consider => "Consider",
            Recommendation::StrongConsider => "Strong Consider",
            Recommendation::Hire => "Hire",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Recommendation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "reject" => Ok(Recommendation::Reject),
            "consider" => Ok(Recommendation::Consider),
            "strongconsider" => Ok(Recommendation::StrongConsider),
            "hire" => Ok(Recommendation::Hire),
            _ => Err(format!("unknown recommendation: {s}")),
        }
    }
}

impl Serialize for Recommendation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Recommendation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// The full assessment produced in evaluation mode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub technical_skills: Score,
    pub communication_skills: Score,
    pub cultural_fit: Score,
    pub overall_recommendation: Recommendation,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub areas_for_improvement: Vec<String>,
    #[serde(default)]
    pub suggested_follow_up_questions: Vec<String>,
}

/// What goes in the `response` field of an evaluation reply.
///
/// Consumers must render the three forms differently: a structured result,
/// the model's raw text when it could not be parsed, or a plain apology when
/// the provider call itself failed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum EvaluationPayload {
    Structured(EvaluationResult),
    Raw {
        #[serde(rename = "rawText")]
        raw_text: String,
    },
    Message(String),
}

impl EvaluationPayload {
    pub fn raw(text: impl Into<String>) -> Self {
        EvaluationPayload::Raw {
            raw_text: text.into(),
        }
    }

    pub fn as_structured(&self) -> Option<&EvaluationResult> {
        match self {
            EvaluationPayload::Structured(result) => Some(result),
            _ => None,
        }
    }

    pub fn is_structured(&self) -> bool {
        self.as_structured().is_some()
    }
}

/// Body of an evaluation-mode reply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationResponse {
    pub response: EvaluationPayload,
    #[serde(rename = "isEvaluation")]
    pub is_evaluation: bool,
}

impl EvaluationResponse {
    pub fn new(response: EvaluationPayload) -> Self {
        Self {
            response,
            is_evaluation: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> EvaluationResult {
        EvaluationResult {
            technical_skills: Score::new(8, "Solid Rust fundamentals"),
            communication_skills: Score::new(7, "Clear answers"),
            cultural_fit: Score::new(9, "Collaborative"),
            overall_recommendation: Recommendation::StrongConsider,
            strengths: vec!["Ownership model".into()],
            areas_for_improvement: vec!["Async internals".into()],
            suggested_follow_up_questions: vec!["Describe a production incident".into()],
        }
    }

    #[test]
    fn serializes_with_contract_field_names() {
        let v = serde_json::to_value(sample()).expect("serialize");
        assert_eq!(v["technicalSkills"]["score"], 8);
        assert_eq!(v["overallRecommendation"], "Strong Consider");
        assert_eq!(v["areasForImprovement"][0], "Async internals");
        assert_eq!(
            v["suggestedFollowUpQuestions"][0],
            "Describe a production incident"
        );
    }

    #[test]
    fn lenient_scores_and_recommendations() {
        let v = json!({
            "technicalSkills": {"score": "7/10", "assessment": "ok"},
            "communicationSkills": {"score": 6.6, "assessment": "ok"},
            "culturalFit": {"score": 14},
            "overallRecommendation": "strong_consider"
        });
        let parsed: EvaluationResult = serde_json::from_value(v).expect("lenient decode");
        assert_eq!(parsed.technical_skills.score, 7);
        assert_eq!(parsed.communication_skills.score, 7);
        assert_eq!(parsed.cultural_fit.score, 10);
        assert_eq!(parsed.cultural_fit.assessment, "");
        assert_eq!(parsed.overall_recommendation, Recommendation::StrongConsider);
        assert!(parsed.strengths.is_empty());
    }

    #[test]
    fn rejects_unknown_recommendation() {
        assert!("maybe later".parse::<Recommendation>().is_err());
        assert_eq!("HIRE".parse::<Recommendation>(), Ok(Recommendation::Hire));
        assert_eq!(
            "Strong Consider".parse::<Recommendation>(),
            Ok(Recommendation::StrongConsider)
        );
    }

    #[test]
    fn payload_forms_serialize_distinctly() {
        let raw = serde_json::to_value(EvaluationResponse::new(EvaluationPayload::raw("x")))
            .expect("serialize");
        assert_eq!(raw, json!({"response": {"rawText": "x"}, "isEvaluation": true}));

        let msg = serde_json::to_value(EvaluationResponse::new(EvaluationPayload::Message(
            "sorry".into(),
        )))
        .expect("serialize");
        assert_eq!(msg, json!({"response": "sorry", "isEvaluation": true}));

        let structured = EvaluationPayload::Structured(sample());
        let back: EvaluationPayload =
            serde_json::from_value(serde_json::to_value(&structured).expect("serialize"))
                .expect("decode");
        assert_eq!(back, structured);
    }
}
