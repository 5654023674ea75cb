/// Subject keywords that mark an email as job-application correspondence.
/// Any single match includes the email.
pub const DEFAULT_KEYWORDS: [&str; 8] = [
    "applied",
    "application",
    "thanks for applying",
    "thanks from",
    "follow-up",
    "update",
    "recruiting",
    "thank you for applying",
];

#[derive(Debug, Clone)]
pub struct SubjectFilter {
    keywords: Vec<String>,
}

impl Default for SubjectFilter {
    fn default() -> Self {
        Self::new(DEFAULT_KEYWORDS)
    }
}

impl SubjectFilter {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();

        Self { keywords }
    }

    pub fn is_job_related(&self, subject: &str) -> bool {
        let subject = subject.to_lowercase();
        self.keywords.iter().any(|k| subject.contains(k.as_str()))
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}
