use crate::errors::GenerateError;

/// Body of `POST /api/projects/{projectId}/plans/generate`.
///
/// `extra` carries any app-defined parameters and is flattened into the JSON
/// object.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePlanRequest {
    /// Name of the plan version to create. Must be unique per project.
    pub version_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl GeneratePlanRequest {
    pub fn new(version_name: impl Into<String>) -> Self {
        Self {
            version_name: version_name.into(),
            ..Self::default()
        }
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn dates(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.start_date = Some(start.into());
        self.end_date = Some(end.into());
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Adds an app-defined parameter.
    pub fn extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub(crate) fn validate(&self) -> Result<(), GenerateError> {
        if self.version_name.trim().is_empty() {
            return Err(GenerateError::Validation(
                "plan version name must not be empty".into(),
            ));
        }
        Ok(())
    }
}

pub(crate) fn validate_project_id(project_id: &str) -> Result<(), GenerateError> {
    if project_id.trim().is_empty() {
        return Err(GenerateError::Validation(
            "project id must not be empty".into(),
        ));
    }
    // `.`/`..` (and their `%2e` spellings) are resolved away by the URL parser.
    if matches!(project_id, "." | "..")
        || project_id
            .chars()
            .any(|c| matches!(c, '/' | '\\' | '?' | '#' | '%') || c.is_whitespace())
    {
        return Err(GenerateError::Validation(format!(
            "project id is not a valid path segment: {project_id}"
        )));
    }
    Ok(())
}
