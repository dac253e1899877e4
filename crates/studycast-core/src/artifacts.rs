//! Schemas for the payloads produced by the coaching backend.
//!
//! Every payload is parsed and checked here, at the boundary, so the rest of
//! the program only ever sees well-formed records. The three failure kinds
//! stay distinguishable: the body was not JSON, the JSON did not match the
//! schema, or it matched but broke a semantic rule.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    Analysis,
    MarketTrends,
    SalaryNegotiation,
    InterviewSimulation,
    SeniorFeedback,
    JobTranslation,
    RedFlags,
    ChatReply,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Analysis => "analysis",
            Self::MarketTrends => "market-trends",
            Self::SalaryNegotiation => "salary-negotiation",
            Self::InterviewSimulation => "interview-simulation",
            Self::SeniorFeedback => "senior-feedback",
            Self::JobTranslation => "job-translation",
            Self::RedFlags => "red-flags",
            Self::ChatReply => "chat-reply",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("{kind}: response is not valid JSON: {source}")]
    Malformed {
        kind: ArtifactKind,
        source: serde_json::Error,
    },
    #[error("{kind}: response does not match schema: {source}")]
    SchemaMismatch {
        kind: ArtifactKind,
        source: serde_json::Error,
    },
    #[error("{kind}: {reason}")]
    Invalid { kind: ArtifactKind, reason: String },
}

impl ArtifactError {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Self::Malformed { kind, .. }
            | Self::SchemaMismatch { kind, .. }
            | Self::Invalid { kind, .. } => *kind,
        }
    }
}

/// A record the backend can return.
pub trait ArtifactPayload: DeserializeOwned + Serialize {
    const KIND: ArtifactKind;

    /// Semantic checks beyond the shape serde already enforces.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }

    fn into_artifact(self) -> Artifact;
}

/// Parse and validate one payload.
pub fn parse<T: ArtifactPayload>(body: &str) -> Result<T, ArtifactError> {
    let value: T = serde_json::from_str(body).map_err(|source| {
        if source.is_data() {
            ArtifactError::SchemaMismatch {
                kind: T::KIND,
                source,
            }
        } else {
            ArtifactError::Malformed {
                kind: T::KIND,
                source,
            }
        }
    })?;
    value.validate().map_err(|reason| ArtifactError::Invalid {
        kind: T::KIND,
        reason,
    })?;
    Ok(value)
}

/// Parse a payload whose kind is only known at runtime.
pub fn parse_artifact(kind: ArtifactKind, body: &str) -> Result<Artifact, ArtifactError> {
    Ok(match kind {
        ArtifactKind::Analysis => parse::<AnalysisResult>(body)?.into_artifact(),
        ArtifactKind::MarketTrends => parse::<MarketTrends>(body)?.into_artifact(),
        ArtifactKind::SalaryNegotiation => parse::<SalaryNegotiation>(body)?.into_artifact(),
        ArtifactKind::InterviewSimulation => parse::<InterviewSimulation>(body)?.into_artifact(),
        ArtifactKind::SeniorFeedback => parse::<SeniorFeedback>(body)?.into_artifact(),
        ArtifactKind::JobTranslation => parse::<JobTranslation>(body)?.into_artifact(),
        ArtifactKind::RedFlags => parse::<RedFlagsAnalysis>(body)?.into_artifact(),
        ArtifactKind::ChatReply => parse::<ChatReply>(body)?.into_artifact(),
    })
}

/// Any validated backend payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "payload", rename_all = "kebab-case")]
pub enum Artifact {
    Analysis(AnalysisResult),
    MarketTrends(MarketTrends),
    SalaryNegotiation(SalaryNegotiation),
    InterviewSimulation(InterviewSimulation),
    SeniorFeedback(SeniorFeedback),
    JobTranslation(JobTranslation),
    RedFlags(RedFlagsAnalysis),
    ChatReply(ChatReply),
}

impl Artifact {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Self::Analysis(_) => ArtifactKind::Analysis,
            Self::MarketTrends(_) => ArtifactKind::MarketTrends,
            Self::SalaryNegotiation(_) => ArtifactKind::SalaryNegotiation,
            Self::InterviewSimulation(_) => ArtifactKind::InterviewSimulation,
            Self::SeniorFeedback(_) => ArtifactKind::SeniorFeedback,
            Self::JobTranslation(_) => ArtifactKind::JobTranslation,
            Self::RedFlags(_) => ArtifactKind::RedFlags,
            Self::ChatReply(_) => ArtifactKind::ChatReply,
        }
    }
}

// ─── Analysis and study path ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub verdict: String,
    pub verdict_explanation: String,
    /// Seconds the backend spent generating.
    #[serde(default)]
    pub analysis_duration: Option<f64>,
    #[serde(default)]
    pub accessibility_statement: Option<String>,
    pub vacancy_analysis: String,
    pub candidate_analysis: String,
    pub comparison_matrix: Vec<ComparisonRow>,
    pub study_path: Vec<WeeklyModule>,
}

impl AnalysisResult {
    pub fn module(&self, week_number: u32) -> Option<&WeeklyModule> {
        self.study_path.iter().find(|m| m.week_number == week_number)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonRow {
    pub criteria: String,
    pub requirement: String,
    pub candidate_match: String,
    pub status: MatchStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    Match,
    Partial,
    Gap,
}

/// One week of the study path, including its narrated podcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyModule {
    pub week_number: u32,
    pub title: String,
    pub theory: String,
    pub podcast_script: String,
    #[serde(default)]
    pub podcast_summary: String,
    #[serde(default)]
    pub estimated_hours: Option<String>,
    #[serde(default)]
    pub resources: Vec<StudyResource>,
    #[serde(default)]
    pub assessments: Vec<Assessment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyResource {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// A search query rather than a URL; see [`StudyResource::search_url`].
    pub link: String,
}

impl StudyResource {
    /// Turn the resource's query into a search URL suited to its type.
    pub fn search_url(&self) -> String {
        let q = urlencoding::encode(&self.link);
        match self.kind.as_str() {
            "Video" => format!("https://www.youtube.com/results?search_query={q}"),
            "Document" => format!("https://www.google.com/search?q={q}+filetype:pdf"),
            _ => format!("https://www.google.com/search?q={q}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub questions: Vec<QuizQuestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question: String,
    #[serde(rename = "type", default = "default_question_kind")]
    pub kind: QuestionKind,
    #[serde(default)]
    pub options: Vec<String>,
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionKind {
    MultipleChoice,
    OpenEnded,
}

fn default_question_kind() -> QuestionKind {
    QuestionKind::MultipleChoice
}

impl ArtifactPayload for AnalysisResult {
    const KIND: ArtifactKind = ArtifactKind::Analysis;

    fn validate(&self) -> Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        for module in &self.study_path {
            if module.week_number == 0 {
                return Err(format!("study module {:?} has week number 0", module.title));
            }
            if !seen.insert(module.week_number) {
                return Err(format!("duplicate study week {}", module.week_number));
            }
            for assessment in &module.assessments {
                for q in &assessment.questions {
                    if q.kind == QuestionKind::MultipleChoice && q.options.is_empty() {
                        return Err(format!(
                            "week {}: multiple-choice question {:?} has no options",
                            module.week_number, q.question
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    fn into_artifact(self) -> Artifact {
        Artifact::Analysis(self)
    }
}

// ─── Market ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketTrends {
    pub growing_tech: Vec<String>,
    pub declining_tech: Vec<String>,
    pub market_gaps: Vec<String>,
    pub emerging_roles: Vec<String>,
    pub recommendations: Vec<String>,
}

impl ArtifactPayload for MarketTrends {
    const KIND: ArtifactKind = ArtifactKind::MarketTrends;

    fn into_artifact(self) -> Artifact {
        Artifact::MarketTrends(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalaryNegotiation {
    pub initial_offer: String,
    pub recruiter_excuse: String,
    pub lowball_risks: Vec<String>,
    pub negotiation_strategy: Vec<NegotiationMove>,
    pub closing_tips: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiationMove {
    pub objection: String,
    pub counter_script: String,
}

impl ArtifactPayload for SalaryNegotiation {
    const KIND: ArtifactKind = ArtifactKind::SalaryNegotiation;

    fn validate(&self) -> Result<(), String> {
        if self.negotiation_strategy.is_empty() {
            return Err("negotiation strategy is empty".into());
        }
        Ok(())
    }

    fn into_artifact(self) -> Artifact {
        Artifact::SalaryNegotiation(self)
    }
}

// ─── Interview and feedback ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewSimulation {
    pub introduction: String,
    pub questions: Vec<InterviewQuestion>,
    #[serde(default)]
    pub general_tips: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewQuestion {
    pub category: String,
    pub question: String,
    /// What the interviewer is really probing for.
    pub intent: String,
    /// Markdown answer guide.
    pub guide: String,
}

impl ArtifactPayload for InterviewSimulation {
    const KIND: ArtifactKind = ArtifactKind::InterviewSimulation;

    fn validate(&self) -> Result<(), String> {
        if self.questions.is_empty() {
            return Err("interview has no questions".into());
        }
        Ok(())
    }

    fn into_artifact(self) -> Artifact {
        Artifact::InterviewSimulation(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeniorFeedback {
    pub reality_check: String,
    pub doing_well: Vec<String>,
    pub doing_poorly: Vec<String>,
    pub stop_doing_immediately: Vec<String>,
    pub priorities: Vec<String>,
    #[serde(default)]
    pub market_trends: Vec<String>,
    pub improvement_plan: String,
}

impl ArtifactPayload for SeniorFeedback {
    const KIND: ArtifactKind = ArtifactKind::SeniorFeedback;

    fn into_artifact(self) -> Artifact {
        Artifact::SeniorFeedback(self)
    }
}

// ─── Job description translation ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobTranslation {
    pub ambiguities: Vec<Ambiguity>,
    pub dictionary: Vec<JargonEntry>,
    pub hidden_signals: Vec<String>,
    pub responsibilities: Responsibilities,
    pub honest_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ambiguity {
    pub quote: String,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JargonEntry {
    pub jargon: String,
    pub reality: String,
}

/// Duties the role really involves versus filler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Responsibilities {
    pub real: Vec<String>,
    pub smoke: Vec<String>,
}

impl ArtifactPayload for JobTranslation {
    const KIND: ArtifactKind = ArtifactKind::JobTranslation;

    fn into_artifact(self) -> Artifact {
        Artifact::JobTranslation(self)
    }
}

// ─── Red flags ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedFlagsAnalysis {
    pub red_flags: Vec<RedFlag>,
    #[serde(default)]
    pub green_flags: Vec<String>,
    #[serde(default)]
    pub summary: String,
}

/// A warning sign found in a job description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedFlag {
    pub flag: String,
    pub explanation: String,
    #[serde(default)]
    pub severity: Severity,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
}

impl ArtifactPayload for RedFlagsAnalysis {
    const KIND: ArtifactKind = ArtifactKind::RedFlags;

    fn validate(&self) -> Result<(), String> {
        match self.red_flags.iter().position(|f| f.flag.trim().is_empty()) {
            Some(i) => Err(format!("red flag {i} has no title")),
            None => Ok(()),
        }
    }

    fn into_artifact(self) -> Artifact {
        Artifact::RedFlags(self)
    }
}

// ─── Tutor chat ────────────────────────────────────────────────────────────

/// One tutor answer. `text` may be absent when the model produced nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub text: Option<String>,
}

impl ChatReply {
    /// The answer, or `fallback` when the tutor returned no text.
    pub fn text_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        match self.text.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text,
            _ => fallback,
        }
    }
}

impl ArtifactPayload for ChatReply {
    const KIND: ArtifactKind = ArtifactKind::ChatReply;

    fn into_artifact(self) -> Artifact {
        Artifact::ChatReply(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn analysis_json() -> serde_json::Value {
        json!({
            "verdict": "APTO",
            "verdictExplanation": "Strong match.",
            "analysisDuration": 12.5,
            "vacancyAnalysis": "Backend role.",
            "candidateAnalysis": "Rust experience.",
            "comparisonMatrix": [
                {"criteria": "Rust", "requirement": "3y", "candidateMatch": "4y", "status": "Match"},
                {"criteria": "K8s", "requirement": "2y", "candidateMatch": "none", "status": "Gap"}
            ],
            "studyPath": [{
                "weekNumber": 1,
                "title": "Kubernetes basics",
                "theory": "# Pods",
                "podcastScript": "Host A: Welcome. Host B: Let's start.",
                "podcastSummary": "Intro to pods.",
                "estimatedHours": "6h",
                "resources": [
                    {"type": "Video", "title": "Pods", "description": "Talk", "link": "kubernetes pods"}
                ],
                "assessments": [{
                    "title": "Concepts",
                    "type": "Conceptual",
                    "questions": [{
                        "question": "What is a pod?",
                        "type": "MultipleChoice",
                        "options": ["A container group", "A node"],
                        "correctAnswer": "A container group"
                    }]
                }]
            }]
        })
    }

    #[test]
    fn parses_analysis() {
        let a: AnalysisResult = parse(&analysis_json().to_string()).unwrap();
        assert_eq!(a.verdict, "APTO");
        assert_eq!(a.comparison_matrix[1].status, MatchStatus::Gap);
        let week = a.module(1).unwrap();
        assert!(week.podcast_script.starts_with("Host A:"));
        assert_eq!(week.assessments[0].questions[0].kind, QuestionKind::MultipleChoice);
        assert!(a.module(2).is_none());
    }

    #[test]
    fn not_json_is_malformed() {
        let err = parse::<AnalysisResult>("<html>502</html>").unwrap_err();
        assert!(matches!(err, ArtifactError::Malformed { kind: ArtifactKind::Analysis, .. }));
    }

    #[test]
    fn truncated_json_is_malformed() {
        let body = analysis_json().to_string();
        let err = parse::<AnalysisResult>(&body[..body.len() / 2]).unwrap_err();
        assert!(matches!(err, ArtifactError::Malformed { .. }));
    }

    #[test]
    fn missing_field_is_schema_mismatch() {
        let mut v = analysis_json();
        v.as_object_mut().unwrap().remove("studyPath");
        let err = parse::<AnalysisResult>(&v.to_string()).unwrap_err();
        assert!(matches!(err, ArtifactError::SchemaMismatch { .. }));
        assert!(err.to_string().contains("studyPath"));
    }

    #[test]
    fn unknown_status_is_schema_mismatch() {
        let mut v = analysis_json();
        v["comparisonMatrix"][0]["status"] = json!("Maybe");
        let err = parse::<AnalysisResult>(&v.to_string()).unwrap_err();
        assert!(matches!(err, ArtifactError::SchemaMismatch { .. }));
    }

    #[test]
    fn duplicate_week_is_invalid() {
        let mut v = analysis_json();
        let week = v["studyPath"][0].clone();
        v["studyPath"].as_array_mut().unwrap().push(week);
        let err = parse::<AnalysisResult>(&v.to_string()).unwrap_err();
        assert!(matches!(err, ArtifactError::Invalid { .. }));
    }

    #[test]
    fn multiple_choice_without_options_is_invalid() {
        let mut v = analysis_json();
        v["studyPath"][0]["assessments"][0]["questions"][0]["options"] = json!([]);
        let err = parse::<AnalysisResult>(&v.to_string()).unwrap_err();
        assert!(matches!(err, ArtifactError::Invalid { .. }));
    }

    #[test]
    fn salary_needs_strategy() {
        let body = json!({
            "initialOffer": "40k",
            "recruiterExcuse": "Budget.",
            "lowballRisks": [],
            "negotiationStrategy": [],
            "closingTips": []
        });
        let err = parse::<SalaryNegotiation>(&body.to_string()).unwrap_err();
        assert_eq!(err.kind(), ArtifactKind::SalaryNegotiation);
        assert!(matches!(err, ArtifactError::Invalid { .. }));
    }

    #[test]
    fn runtime_kind_dispatch() {
        let body = json!({
            "growingTech": ["Rust"],
            "decliningTech": ["Perl"],
            "marketGaps": [],
            "emergingRoles": ["Platform engineer"],
            "recommendations": ["Learn eBPF"]
        });
        let artifact = parse_artifact(ArtifactKind::MarketTrends, &body.to_string()).unwrap();
        assert_eq!(artifact.kind(), ArtifactKind::MarketTrends);

        let err = parse_artifact(ArtifactKind::JobTranslation, &body.to_string()).unwrap_err();
        assert!(matches!(
            err,
            ArtifactError::SchemaMismatch {
                kind: ArtifactKind::JobTranslation,
                ..
            }
        ));
    }

    #[test]
    fn artifact_serializes_tagged() {
        let a: AnalysisResult = parse(&analysis_json().to_string()).unwrap();
        let v = serde_json::to_value(a.into_artifact()).unwrap();
        assert_eq!(v["kind"], "analysis");
        assert_eq!(v["payload"]["verdict"], "APTO");
    }

    #[test]
    fn resource_search_urls() {
        let mut r = StudyResource {
            kind: "Video".into(),
            title: "t".into(),
            description: String::new(),
            link: "rust async & tokio".into(),
        };
        assert_eq!(
            r.search_url(),
            "https://www.youtube.com/results?search_query=rust%20async%20%26%20tokio"
        );
        r.kind = "Document".into();
        assert!(r.search_url().ends_with("+filetype:pdf"));
        r.kind = "Book".into();
        assert!(r.search_url().starts_with("https://www.google.com/search?q=rust"));
    }

    #[test]
    fn red_flags_parse_with_default_severity() {
        let body = json!({
            "redFlags": [
                {"flag": "Rockstar wanted", "explanation": "Vague seniority.", "severity": "High"},
                {"flag": "Unlimited PTO", "explanation": "Often means none."}
            ]
        });
        let flags: RedFlagsAnalysis = parse(&body.to_string()).unwrap();
        assert_eq!(flags.red_flags.len(), 2);
        assert_eq!(flags.red_flags[0].severity, Severity::High);
        assert_eq!(flags.red_flags[1].severity, Severity::Medium);
        assert!(flags.green_flags.is_empty());
    }

    #[test]
    fn red_flag_without_title_is_invalid() {
        let body = json!({ "redFlags": [{"flag": "  ", "explanation": "x"}] });
        let err = parse::<RedFlagsAnalysis>(&body.to_string()).unwrap_err();
        assert!(matches!(err, ArtifactError::Invalid { kind: ArtifactKind::RedFlags, .. }));
    }

    #[test]
    fn chat_reply_falls_back_when_text_missing() {
        let reply: ChatReply = parse(r#"{"text": "Empieza por los pods."}"#).unwrap();
        assert_eq!(reply.text_or("-"), "Empieza por los pods.");

        let empty: ChatReply = parse("{}").unwrap();
        assert_eq!(empty.text_or("sin respuesta"), "sin respuesta");
        let blank: ChatReply = parse(r#"{"text": "  "}"#).unwrap();
        assert_eq!(blank.text_or("sin respuesta"), "sin respuesta");
    }

    #[test]
    fn chat_reply_rejects_non_object() {
        let err = parse::<ChatReply>("[1]").unwrap_err();
        assert!(matches!(err, ArtifactError::SchemaMismatch { kind: ArtifactKind::ChatReply, .. }));
    }
}
