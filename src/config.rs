/// Server configuration for [`Client`](crate::Client).
///
/// # Examples
/// ```
/// # use tweakship::ClientConfig;
/// let config = ClientConfig::new("https://tweakship.example.com", "project-id");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub(crate) host: String,
    pub(crate) project_id: String,
}

const EVALUATE_ENDPOINT: &str = "remoteConfigs/evaluate";

impl ClientConfig {
    /// Create a configuration pointing at `host` for the given project.
    pub fn new(host: impl Into<String>, project_id: impl Into<String>) -> Self {
        ClientConfig {
            host: host.into(),
            project_id: project_id.into(),
        }
    }

    /// Override the server host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Override the project id.
    pub fn project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = project_id.into();
        self
    }

    /// URL of the batch evaluation endpoint for the configured project.
    pub(crate) fn evaluate_url(&self) -> String {
        let separator = if self.host.ends_with('/') { "" } else { "/" };
        format!(
            "{}{}api/client/projects/{}/{}",
            self.host, separator, self.project_id, EVALUATE_ENDPOINT
        )
    }
}
