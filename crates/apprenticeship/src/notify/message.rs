use crate::registry::domain::ApprenticeshipFlag;

pub const DEFAULT_REPORT_PORTAL_URL: &str = "https://auth.mkrit.ru";

/// Renders the confirmation text sent to a student after a flag is confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationTemplate {
    portal_url: String,
}

impl ConfirmationTemplate {
    pub fn new(portal_url: impl Into<String>) -> Self {
        Self {
            portal_url: portal_url.into(),
        }
    }

    pub fn portal_url(&self) -> &str {
        &self.portal_url
    }

    /// Every flag currently shares one message.
    pub fn render(&self, _flag: ApprenticeshipFlag) -> String {
        format!(
            "Вашу заявку на прохождение практики подтвердили! По окончании практики отчёт необходимо загрузить по ссылке: {}",
            self.portal_url
        )
    }
}

impl Default for ConfirmationTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_REPORT_PORTAL_URL)
    }
}
