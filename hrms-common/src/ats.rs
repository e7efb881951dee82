//! Deterministic resume screening (ATS score)
//!
//! Scores a resume against a job posting from five weighted signals:
//! skills 35%, keywords 20%, experience 25%, education 10%, plus a fixed
//! neutral assessment worth 10%.

use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

const SKILL_DATABASE: &[(&str, &[&str])] = &[
    (
        "programming",
        &[
            "python", "javascript", "java", "c++", "c#", "ruby", "php", "go", "rust", "typescript",
            "kotlin", "swift", "scala", "r", "matlab", "perl",
        ],
    ),
    (
        "web",
        &[
            "html", "css", "react", "angular", "vue", "node.js", "express", "django", "flask",
            "spring", "asp.net", "laravel", "next.js", "gatsby", "svelte",
        ],
    ),
    (
        "database",
        &[
            "sql", "mysql", "postgresql", "mongodb", "redis", "cassandra", "oracle", "dynamodb",
            "elasticsearch", "neo4j", "sqlite", "mariadb",
        ],
    ),
    (
        "cloud",
        &[
            "aws", "azure", "gcp", "google cloud", "heroku", "digitalocean", "ec2", "s3", "lambda",
            "cloudformation", "terraform",
        ],
    ),
    (
        "devops",
        &[
            "docker", "kubernetes", "jenkins", "gitlab ci", "github actions", "ansible", "chef",
            "puppet", "ci/cd", "travis ci",
        ],
    ),
    (
        "data_science",
        &[
            "machine learning", "deep learning", "ai", "data science", "nlp", "computer vision",
            "tensorflow", "pytorch", "scikit-learn", "pandas", "numpy", "keras", "spark", "hadoop",
        ],
    ),
    (
        "mobile",
        &["android", "ios", "react native", "flutter", "xamarin", "swift", "kotlin", "objective-c"],
    ),
    (
        "tools",
        &[
            "git", "github", "gitlab", "jira", "confluence", "slack", "trello", "postman",
            "swagger", "figma", "sketch",
        ],
    ),
    (
        "methodologies",
        &[
            "agile", "scrum", "kanban", "waterfall", "devops", "tdd", "bdd", "microservices",
            "rest api", "graphql", "soap",
        ],
    ),
];

const LEVEL_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "senior",
        &["senior", "lead", "principal", "architect", "head of", "director", "manager"],
    ),
    (
        "mid",
        &["mid-level", "intermediate", "engineer", "developer", "analyst"],
    ),
    (
        "junior",
        &["junior", "associate", "entry-level", "trainee", "intern"],
    ),
];

const EDUCATION_KEYWORDS: &[&str] = &[
    "bachelor",
    "master",
    "phd",
    "doctorate",
    "mba",
    "b.tech",
    "m.tech",
    "b.e.",
    "m.e.",
    "b.sc",
    "m.sc",
    "computer science",
    "engineering",
    "information technology",
    "software engineering",
];

const STOP_WORDS: &[&str] = &[
    "that", "this", "with", "from", "have", "will", "your", "their", "about", "would", "there",
    "which", "when", "where", "been",
];

/// Score given to the assessment component that has no deterministic signal
pub const NEUTRAL_ASSESSMENT_SCORE: f64 = 50.0;

/// Larger year counts are treated as noise rather than experience
const MAX_YEARS: u32 = 100;

const WEIGHT_SKILLS: f64 = 0.35;
const WEIGHT_KEYWORDS: f64 = 0.20;
const WEIGHT_EXPERIENCE: f64 = 0.25;
const WEIGHT_EDUCATION: f64 = 0.10;
const WEIGHT_ASSESSMENT: f64 = 0.10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillAnalysis {
    pub matched_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub skill_match_percentage: f64,
    pub total_skills_found: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeywordMatch {
    pub score: f64,
    pub matched_keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperienceAnalysis {
    pub score: f64,
    pub years_found: u32,
    pub years_required: u32,
    pub level: &'static str,
    pub required_level: &'static str,
    #[serde(rename = "match")]
    pub level_match: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EducationVerification {
    pub score: f64,
    pub qualifications_found: Vec<String>,
}

/// Full screening report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreeningResult {
    pub ats_score: u32,
    pub recommendation: &'static str,
    pub skill_analysis: SkillAnalysis,
    pub keyword_match: KeywordMatch,
    pub experience_analysis: ExperienceAnalysis,
    pub education_verification: EducationVerification,
    pub strengths: Vec<String>,
    pub gaps: Vec<String>,
    pub interview_questions: Vec<String>,
}

/// Screen a resume against a job posting
///
/// The job title is folded into the job text so skills named only in the
/// title still count as requirements.
pub fn screen_resume(resume_text: &str, job_description: &str, job_title: &str) -> ScreeningResult {
    let job_text = if job_title.trim().is_empty() {
        job_description.to_string()
    } else {
        format!("{}\n{}", job_title, job_description)
    };

    let resume_skills = extract_skills(resume_text);
    let job_skills = extract_skills(&job_text);
    let skills = skill_match(&resume_skills, &job_skills);

    let keyword_score = keyword_score(resume_text, &job_text);
    let experience = analyze_experience(resume_text, &job_text);
    let education_score = education_score(resume_text, &job_text);

    let ats_score = weighted_score(
        skills.skill_match_percentage,
        keyword_score,
        experience.score,
        education_score,
    );

    let strengths = strengths(&skills, &experience, education_score);
    let gaps = gaps(&skills, &experience, education_score);
    let interview_questions = interview_questions(&skills);

    ScreeningResult {
        ats_score,
        recommendation: recommendation(ats_score),
        keyword_match: KeywordMatch {
            score: keyword_score,
            matched_keywords: matched_keywords(resume_text, &job_text),
        },
        skill_analysis: SkillAnalysis {
            total_skills_found: resume_skills.len(),
            ..skills
        },
        experience_analysis: experience,
        education_verification: EducationVerification {
            score: education_score,
            qualifications_found: qualifications(resume_text),
        },
        strengths,
        gaps,
        interview_questions,
    }
}

/// Map an ATS score to a hiring recommendation
pub fn recommendation(ats_score: u32) -> &'static str {
    match ats_score {
        85.. => "Highly Recommended",
        70..=84 => "Recommended",
        55..=69 => "Consider",
        40..=54 => "Weak Candidate",
        _ => "Not Recommended",
    }
}

fn weighted_score(skills: f64, keywords: f64, experience: f64, education: f64) -> u32 {
    let total = skills * WEIGHT_SKILLS
        + keywords * WEIGHT_KEYWORDS
        + experience * WEIGHT_EXPERIENCE
        + education * WEIGHT_EDUCATION
        + NEUTRAL_ASSESSMENT_SCORE * WEIGHT_ASSESSMENT;
    total.round().clamp(0.0, 100.0) as u32
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Whole-term, case-sensitive search in already-lowercased text
fn contains_term(haystack: &str, term: &str) -> bool {
    haystack.match_indices(term).any(|(start, matched)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + matched.len()..].chars().next();
        before.map_or(true, |c| !is_word_char(c)) && after.map_or(true, |c| !is_word_char(c))
    })
}

/// Distinct dictionary skills present in the text
fn extract_skills(text: &str) -> BTreeSet<&'static str> {
    let lower = text.to_lowercase();
    SKILL_DATABASE
        .iter()
        .flat_map(|(_, skills)| skills.iter().copied())
        .filter(|skill| contains_term(&lower, skill))
        .collect()
}

fn skill_match(resume: &BTreeSet<&'static str>, job: &BTreeSet<&'static str>) -> SkillAnalysis {
    if job.is_empty() {
        return SkillAnalysis {
            matched_skills: Vec::new(),
            missing_skills: Vec::new(),
            skill_match_percentage: 100.0,
            total_skills_found: resume.len(),
        };
    }
    let matched: Vec<String> = job.intersection(resume).map(|s| s.to_string()).collect();
    let missing: Vec<String> = job.difference(resume).map(|s| s.to_string()).collect();
    let score = matched.len() as f64 / job.len() as f64 * 100.0;
    SkillAnalysis {
        matched_skills: matched,
        missing_skills: missing,
        skill_match_percentage: round2(score),
        total_skills_found: resume.len(),
    }
}

/// Lowercase alphabetic words of at least four letters
fn keywords(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !is_word_char(c))
        .filter(|w| w.len() >= 4 && w.chars().all(|c| c.is_ascii_lowercase()))
        .map(String::from)
        .collect()
}

fn job_keywords(job_text: &str) -> BTreeSet<String> {
    keywords(job_text)
        .into_iter()
        .filter(|w| !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

fn keyword_score(resume_text: &str, job_text: &str) -> f64 {
    let job = job_keywords(job_text);
    if job.is_empty() {
        return 0.0;
    }
    let resume: HashSet<String> = keywords(resume_text).into_iter().collect();
    let matches = job.iter().filter(|k| resume.contains(*k)).count();
    round2(matches as f64 / job.len() as f64 * 100.0)
}

fn matched_keywords(resume_text: &str, job_text: &str) -> Vec<String> {
    let resume: HashSet<String> = keywords(resume_text).into_iter().collect();
    job_keywords(job_text)
        .into_iter()
        .filter(|k| resume.contains(k))
        .take(20)
        .collect()
}

fn skip_spaces(s: &[u8], mut i: usize) -> usize {
    while i < s.len() && s[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// `\d+\+?\s*(years?|yrs?)` starting exactly at `i`
fn years_at(s: &[u8], i: usize) -> Option<(u32, usize)> {
    let mut j = i;
    while j < s.len() && s[j].is_ascii_digit() {
        j += 1;
    }
    if j == i {
        return None;
    }
    let value: u32 = std::str::from_utf8(&s[i..j]).ok()?.parse().ok()?;
    if value > MAX_YEARS {
        return None;
    }
    if j < s.len() && s[j] == b'+' {
        j += 1;
    }
    j = skip_spaces(s, j);
    let rest = &s[j..];
    let unit_len = if rest.starts_with(b"years") {
        5
    } else if rest.starts_with(b"year") {
        4
    } else if rest.starts_with(b"yrs") {
        3
    } else if rest.starts_with(b"yr") {
        2
    } else {
        return None;
    };
    Some((value, j + unit_len))
}

/// Skip `\s*(of)?\s*`
fn skip_optional_of(s: &[u8], i: usize) -> usize {
    let i = skip_spaces(s, i);
    if s[i..].starts_with(b"of") {
        skip_spaces(s, i + 2)
    } else {
        i
    }
}

/// Offsets where a run of digits begins
fn number_starts(s: &[u8]) -> impl Iterator<Item = usize> + '_ {
    (0..s.len())
        .filter(move |&i| s[i].is_ascii_digit() && (i == 0 || !s[i - 1].is_ascii_digit()))
}

/// Years of experience mentioned in the text, trying the most specific phrasing first
fn years_of_experience(text: &str) -> u32 {
    let lower = text.to_lowercase();
    let s = lower.as_bytes();

    // "5+ years of experience"
    for i in number_starts(s) {
        if let Some((value, end)) = years_at(s, i) {
            if s[skip_optional_of(s, end)..].starts_with(b"experience") {
                return value;
            }
        }
    }

    // "experience of 5 years"
    for (start, _) in lower.match_indices("experience") {
        let j = skip_optional_of(s, start + "experience".len());
        if let Some((value, _)) = years_at(s, j) {
            return value;
        }
    }

    // "5 years"
    for i in number_starts(s) {
        if let Some((value, _)) = years_at(s, i) {
            return value;
        }
    }
    0
}

fn experience_level(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    LEVEL_KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(level, _)| *level)
        .unwrap_or("mid")
}

fn analyze_experience(resume_text: &str, job_text: &str) -> ExperienceAnalysis {
    let found = years_of_experience(resume_text);
    let required = years_of_experience(job_text);

    let score = if required > 0 && found < required {
        found as f64 / required as f64 * 100.0
    } else if required > 0 && u64::from(found) > u64::from(required) * 2 {
        90.0
    } else {
        100.0
    };

    let level = experience_level(resume_text);
    let required_level = experience_level(job_text);

    ExperienceAnalysis {
        score: round2(score),
        years_found: found,
        years_required: required,
        level,
        required_level,
        level_match: level == required_level || (level == "senior" && required_level == "mid"),
    }
}

fn education_score(resume_text: &str, job_text: &str) -> f64 {
    let job = job_text.to_lowercase();
    if !EDUCATION_KEYWORDS.iter().any(|k| job.contains(k)) {
        return 100.0;
    }
    let resume = resume_text.to_lowercase();
    if EDUCATION_KEYWORDS.iter().any(|k| resume.contains(k)) {
        100.0
    } else {
        50.0
    }
}

fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_alpha = false;
    for c in value.chars() {
        if c.is_alphabetic() && !prev_alpha {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        prev_alpha = c.is_alphabetic();
    }
    out
}

fn qualifications(resume_text: &str) -> Vec<String> {
    let lower = resume_text.to_lowercase();
    EDUCATION_KEYWORDS
        .iter()
        .filter(|k| lower.contains(*k))
        .map(|k| title_case(k))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn strengths(skills: &SkillAnalysis, experience: &ExperienceAnalysis, education: f64) -> Vec<String> {
    let mut out = Vec::new();
    if skills.skill_match_percentage >= 70.0 {
        out.push(format!(
            "Strong technical skills match ({} key skills)",
            skills.matched_skills.len()
        ));
    }
    if experience.score >= 80.0 {
        out.push(format!("Relevant experience ({} years)", experience.years_found));
    }
    if education >= 100.0 {
        out.push("Meets education requirements".to_string());
    }
    if skills.matched_skills.len() > 10 {
        out.push("Diverse technical skill set".to_string());
    }
    if out.is_empty() {
        out.push("Candidate shows potential".to_string());
    }
    out
}

fn gaps(skills: &SkillAnalysis, experience: &ExperienceAnalysis, education: f64) -> Vec<String> {
    let mut out = Vec::new();
    if !skills.missing_skills.is_empty() {
        let sample: Vec<&str> = skills.missing_skills.iter().take(3).map(String::as_str).collect();
        out.push(format!(
            "Missing {} required skills: {}",
            skills.missing_skills.len(),
            sample.join(", ")
        ));
    }
    if experience.years_required > experience.years_found {
        out.push(format!(
            "Experience gap: {} years below requirement",
            experience.years_required - experience.years_found
        ));
    }
    if education < 100.0 {
        out.push("Education requirements not fully met".to_string());
    }
    if skills.skill_match_percentage < 50.0 {
        out.push("Significant technical skills gap".to_string());
    }
    if out.is_empty() {
        out.push("No major gaps identified".to_string());
    }
    out
}

fn interview_questions(skills: &SkillAnalysis) -> Vec<String> {
    let mut questions: Vec<String> = skills
        .matched_skills
        .iter()
        .take(3)
        .map(|s| format!("Can you describe your experience with {}?", s))
        .collect();
    if let Some(missing) = skills.missing_skills.first() {
        questions.push(format!("How would you approach learning {}?", missing));
    }
    questions.extend(
        [
            "Describe a challenging project you've worked on recently.",
            "How do you stay updated with industry trends?",
            "Tell me about a time you had to work under tight deadlines.",
        ]
        .iter()
        .map(|q| q.to_string()),
    );
    questions.truncate(5);
    questions
}

#[cfg(test)]
mod tests {
    use super::*;

    const JOB: &str = "We need a senior engineer with 5+ years of experience in Rust, Docker \
                       and PostgreSQL. Bachelor degree in computer science required.";

    #[test]
    fn test_whole_term_matching() {
        assert!(contains_term("i write rust daily", "rust"));
        assert!(!contains_term("trusted partner", "rust"));
        assert!(contains_term("c++ and c#", "c++"));
        assert!(contains_term("uses node.js.", "node.js"));
        assert!(!contains_term("golang", "go"));
        assert!(contains_term("ci/cd pipelines", "ci/cd"));
    }

    #[test]
    fn test_years_extraction_prefers_experience_phrasing() {
        assert_eq!(years_of_experience("Over 7+ years of experience building APIs"), 7);
        assert_eq!(years_of_experience("Experience of 3 years in support"), 3);
        assert_eq!(years_of_experience("2 yrs at Acme, 4 years experience overall"), 4);
        assert_eq!(years_of_experience("Worked 2 yrs at Acme"), 2);
        assert_eq!(years_of_experience("No numbers here"), 0);
    }

    #[test]
    fn test_experience_scoring() {
        let under = analyze_experience("2 years of experience", "4 years of experience");
        assert_eq!(under.score, 50.0);
        let over = analyze_experience("10 years of experience", "4 years of experience");
        assert_eq!(over.score, 90.0);
        let fit = analyze_experience("6 years of experience", "4 years of experience");
        assert_eq!(fit.score, 100.0);
        let none_required = analyze_experience("1 year", "a friendly team");
        assert_eq!(none_required.score, 100.0);
    }

    #[test]
    fn test_implausible_years_are_ignored() {
        assert_eq!(years_of_experience("3000000001 years of experience"), 0);
        assert_eq!(years_of_experience("101 years of experience, 8 years in Rust"), 8);
        assert_eq!(years_of_experience("99999999999999999999 years"), 0);

        let result = screen_resume(
            "3000000001 years of experience",
            "3000000000 years of experience",
            "",
        );
        assert_eq!(result.experience_analysis.years_found, 0);
        assert_eq!(result.experience_analysis.score, 100.0);
    }

    #[test]
    fn test_long_digit_runs_scan_once() {
        let resume = format!("{} 4 years of experience", "7".repeat(200_000));
        assert_eq!(years_of_experience(&resume), 4);
    }

    #[test]
    fn test_levels() {
        assert_eq!(experience_level("Senior developer"), "senior");
        assert_eq!(experience_level("Junior tester"), "junior");
        assert_eq!(experience_level("generalist"), "mid");
    }

    #[test]
    fn test_skill_match_no_job_skills_scores_full() {
        let result = screen_resume("rust docker", "A friendly cashier role", "");
        assert_eq!(result.skill_analysis.skill_match_percentage, 100.0);
        assert!(result.skill_analysis.missing_skills.is_empty());
    }

    #[test]
    fn test_strong_candidate() {
        let resume = "Senior engineer with 6 years of experience. Rust, Docker, PostgreSQL, \
                      Kubernetes. Bachelor of Science in Computer Science. We need senior \
                      engineer experience degree required.";
        let result = screen_resume(resume, JOB, "Rust Engineer");
        assert_eq!(result.skill_analysis.missing_skills, Vec::<String>::new());
        assert_eq!(result.skill_analysis.skill_match_percentage, 100.0);
        assert_eq!(result.experience_analysis.years_found, 6);
        assert_eq!(result.experience_analysis.years_required, 5);
        assert_eq!(result.education_verification.score, 100.0);
        assert!(result.ats_score >= 70, "score was {}", result.ats_score);
        assert!(result.strengths.iter().any(|s| s.starts_with("Strong technical skills")));
        assert_eq!(result.gaps, vec!["No major gaps identified".to_string()]);
    }

    #[test]
    fn test_weak_candidate() {
        let resume = "Cashier with 1 year retail background.";
        let result = screen_resume(resume, JOB, "Rust Engineer");
        assert_eq!(result.skill_analysis.skill_match_percentage, 0.0);
        assert_eq!(result.education_verification.score, 50.0);
        assert!(result.ats_score < 40, "score was {}", result.ats_score);
        assert_eq!(result.recommendation, "Not Recommended");
        assert!(result.gaps[0].starts_with("Missing 3 required skills"));
        assert!(result.gaps.iter().any(|g| g == "Experience gap: 4 years below requirement"));
    }

    #[test]
    fn test_recommendation_thresholds() {
        assert_eq!(recommendation(100), "Highly Recommended");
        assert_eq!(recommendation(85), "Highly Recommended");
        assert_eq!(recommendation(84), "Recommended");
        assert_eq!(recommendation(70), "Recommended");
        assert_eq!(recommendation(55), "Consider");
        assert_eq!(recommendation(40), "Weak Candidate");
        assert_eq!(recommendation(39), "Not Recommended");
    }

    #[test]
    fn test_keywords_ignore_stop_words_and_short_words() {
        let kw = job_keywords("This role will work with data pipelines and APIs");
        assert!(kw.contains("role"));
        assert!(kw.contains("pipelines"));
        assert!(!kw.contains("this"));
        assert!(!kw.contains("will"));
        assert!(!kw.contains("and"));
    }

    #[test]
    fn test_interview_questions_capped_at_five() {
        let result = screen_resume("rust docker postgresql", JOB, "");
        assert_eq!(result.interview_questions.len(), 5);
        assert!(result.interview_questions[0].starts_with("Can you describe your experience with"));
    }

    #[test]
    fn test_qualifications_title_cased() {
        let q = qualifications("B.Tech in Computer Science, MBA");
        assert!(q.contains(&"B.Tech".to_string()));
        assert!(q.contains(&"Computer Science".to_string()));
        assert!(q.contains(&"Mba".to_string()));
    }
}
