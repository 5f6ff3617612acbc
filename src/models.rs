use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Local};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Opaque id of a contest, job, user or problem.
///
/// Held as text so it survives the string-only state file unchanged. The
/// judge server uses unsigned integers, so numeric ids go back out on the
/// wire as JSON numbers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(value: impl Into<String>) -> Self {
        Identifier(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn as_unsigned(&self) -> Option<u64> {
        let number = self.0.parse::<u64>().ok()?;
        // "007" is not the number 7 as far as the server is concerned
        (number.to_string() == self.0).then_some(number)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u32> for Identifier {
    fn from(value: u32) -> Self {
        Identifier(value.to_string())
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Identifier(value.to_string())
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Identifier(value)
    }
}

impl Serialize for Identifier {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.as_unsigned() {
            Some(number) => serializer.serialize_u64(number),
            None => serializer.serialize_str(&self.0),
        }
    }
}

struct IdentifierVisitor;

impl Visitor<'_> for IdentifierVisitor {
    type Value = Identifier;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an integer or a string id")
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Identifier, E> {
        Ok(Identifier(value.to_string()))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Identifier, E> {
        Ok(Identifier(value.to_string()))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Identifier, E> {
        Ok(Identifier(value.to_string()))
    }

    fn visit_string<E: de::Error>(self, value: String) -> Result<Identifier, E> {
        Ok(Identifier(value))
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(IdentifierVisitor)
    }
}

/// Entity kind a persisted selection refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Job,
    Contest,
}

impl Domain {
    pub fn storage_key(self) -> &'static str {
        match self {
            Domain::Job => "jobId",
            Domain::Contest => "contestId",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Job => f.write_str("job"),
            Domain::Contest => f.write_str("contest"),
        }
    }
}

/// Sidebar page. Persisted so a restart lands on the same page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Page {
    #[default]
    Home,
    Submit,
    Contest,
    Status,
}

impl Page {
    pub const ALL: [Page; 4] = [Page::Home, Page::Submit, Page::Contest, Page::Status];

    pub const STORAGE_KEY: &'static str = "curPage";

    pub fn as_str(self) -> &'static str {
        match self {
            Page::Home => "home",
            Page::Submit => "submit",
            Page::Contest => "contest",
            Page::Status => "status",
        }
    }

    /// Unknown text falls back to the home page.
    pub fn from_persisted(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("submit") => Page::Submit,
            Some("contest") => Page::Contest,
            Some("status") => Page::Status,
            _ => Page::Home,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Page::Home => "Home",
            Page::Submit => "Submit",
            Page::Contest => "Contests",
            Page::Status => "Status",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Contest {
    pub id: Identifier,
    pub name: String,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub problem_ids: Vec<Identifier>,
    #[serde(default)]
    pub user_ids: Vec<Identifier>,
    pub submission_limit: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct NewContest {
    pub name: String,
    pub from: String,
    pub to: String,
    pub problem_ids: Vec<Identifier>,
    pub user_ids: Vec<Identifier>,
    pub submission_limit: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Submission {
    pub source_code: String,
    pub language: String,
    pub user_id: Identifier,
    pub contest_id: Identifier,
    pub problem_id: Identifier,
}

/// `POST /jobs` body. The server takes the bare submission fields.
pub type NewJob = Submission;

/// Grading lifecycle as reported by the server. The client never advances it.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobState {
    Queueing,
    Running,
    Finished,
    Canceled,
    #[default]
    #[serde(other)]
    Unknown,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Finished | JobState::Canceled)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            JobState::Queueing => "Queueing",
            JobState::Running => "Running",
            JobState::Finished => "Finished",
            JobState::Canceled => "Canceled",
            JobState::Unknown => "Unknown",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verdict {
    Waiting,
    Running,
    Accepted,
    #[serde(rename = "Compilation Error")]
    CompilationError,
    #[serde(rename = "Compilation Success")]
    CompilationSuccess,
    #[serde(rename = "Wrong Answer")]
    WrongAnswer,
    #[serde(rename = "Runtime Error")]
    RuntimeError,
    #[serde(rename = "Time Limit Exceeded")]
    TimeLimitExceeded,
    #[serde(rename = "Memory Limit Exceeded")]
    MemoryLimitExceeded,
    #[serde(rename = "System Error")]
    SystemError,
    #[serde(rename = "SPJ Error")]
    SpjError,
    Skipped,
    #[default]
    #[serde(other)]
    Unknown,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Waiting => "Waiting",
            Verdict::Running => "Running",
            Verdict::Accepted => "Accepted",
            Verdict::CompilationError => "Compilation Error",
            Verdict::CompilationSuccess => "Compilation Success",
            Verdict::WrongAnswer => "Wrong Answer",
            Verdict::RuntimeError => "Runtime Error",
            Verdict::TimeLimitExceeded => "Time Limit Exceeded",
            Verdict::MemoryLimitExceeded => "Memory Limit Exceeded",
            Verdict::SystemError => "System Error",
            Verdict::SpjError => "SPJ Error",
            Verdict::Skipped => "Skipped",
            Verdict::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CaseResult {
    pub id: u32,
    pub result: Verdict,
    #[serde(default)]
    pub time: u64,
    #[serde(default)]
    pub memory: u64,
    #[serde(default)]
    pub info: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Job {
    pub id: Identifier,
    pub created_time: String,
    pub updated_time: String,
    pub submission: Submission,
    pub state: JobState,
    pub result: Verdict,
    pub score: f64,
    #[serde(default)]
    pub cases: Vec<CaseResult>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct User {
    pub id: Identifier,
    pub name: String,
}

/// One leaderboard line as the server sends it. `scores[i]` belongs to the
/// contest's `problem_ids[i]`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RanklistEntry {
    pub user: User,
    pub rank: u32,
    #[serde(default)]
    pub scores: Vec<f64>,
}

/// Leaderboard line reshaped for a table keyed by problem id.
#[derive(Debug, Clone, PartialEq)]
pub struct RanklistRow {
    /// Table row identity, 1-based position. Not the rank.
    pub key: usize,
    pub name: String,
    pub rank: u32,
    pub scores_by_problem_id: HashMap<Identifier, f64>,
}

/// Error envelope the judge server puts in non-success bodies.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ServerError {
    pub code: u32,
    pub reason: String,
    pub message: String,
}

pub trait HasId {
    fn id(&self) -> &Identifier;
}

impl HasId for Contest {
    fn id(&self) -> &Identifier {
        &self.id
    }
}

impl HasId for Job {
    fn id(&self) -> &Identifier {
        &self.id
    }
}

/// Renders a server timestamp in local time, or the raw text when it is not
/// RFC 3339.
pub fn display_time(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(time) => time
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        Err(_) => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_accepts_numbers_and_strings() {
        let ids: Vec<Identifier> = serde_json::from_str(r#"[0, 17, "A", "p-2"]"#).unwrap();
        let texts: Vec<&str> = ids.iter().map(Identifier::as_str).collect();
        assert_eq!(texts, vec!["0", "17", "A", "p-2"]);
    }

    #[test]
    fn numeric_identifier_goes_back_out_as_number() {
        let body = serde_json::to_string(&vec![
            Identifier::from(3),
            Identifier::from("B"),
            Identifier::from("007"),
        ])
        .unwrap();
        assert_eq!(body, r#"[3,"B","007"]"#);
    }

    #[test]
    fn job_decodes_server_payload() {
        let raw = r#"{
            "id": 5,
            "created_time": "2022-08-27T02:05:29.000Z",
            "updated_time": "2022-08-27T02:05:30.000Z",
            "submission": {
                "source_code": "fn main() {}",
                "language": "Rust",
                "user_id": 0,
                "contest_id": 0,
                "problem_id": 1
            },
            "state": "Finished",
            "result": "Wrong Answer",
            "score": 87.5,
            "cases": [
                {"id": 0, "result": "Compilation Success", "time": 0, "memory": 0, "info": ""},
                {"id": 1, "result": "SPJ Error", "time": 1024, "memory": 0, "info": "bad"}
            ]
        }"#;
        let job: Job = serde_json::from_str(raw).unwrap();
        assert_eq!(job.id, Identifier::from(5));
        assert_eq!(job.state, JobState::Finished);
        assert_eq!(job.result, Verdict::WrongAnswer);
        assert_eq!(job.cases[1].result, Verdict::SpjError);
        assert_eq!(job.submission.problem_id.as_str(), "1");
    }

    #[test]
    fn unexpected_state_and_verdict_text_is_unknown() {
        let state: JobState = serde_json::from_str(r#""Paused""#).unwrap();
        let verdict: Verdict = serde_json::from_str(r#""Presentation Error""#).unwrap();
        assert_eq!(state, JobState::Unknown);
        assert_eq!(verdict, Verdict::Unknown);
    }

    #[test]
    fn page_from_persisted_text() {
        assert_eq!(Page::from_persisted(Some("status")), Page::Status);
        assert_eq!(Page::from_persisted(Some("contest")), Page::Contest);
        assert_eq!(Page::from_persisted(Some("nowhere")), Page::Home);
        assert_eq!(Page::from_persisted(None), Page::Home);
    }

    #[test]
    fn display_time_keeps_unparseable_text() {
        assert_eq!(display_time("yesterday"), "yesterday");
        assert_ne!(display_time("2022-08-27T02:05:29.000Z"), "2022-08-27T02:05:29.000Z");
    }
}
