use super::TemplateValidator;
use crate::providers::aws::{AwsConfig, AwsCredentials, AwsHttpBackend, AwsRequest, AwsService};
use async_trait::async_trait;
use tracing::debug;

const API_VERSION: &str = "2010-05-15";

/// CloudFormation `ValidateTemplate` over the query protocol.
#[derive(Debug, Clone)]
pub struct CloudFormationValidator {
    http: AwsHttpBackend,
}

impl CloudFormationValidator {
    pub fn new(config: &AwsConfig, credentials: AwsCredentials) -> anyhow::Result<Self> {
        let http = AwsHttpBackend::new(config, AwsService::CloudFormation, credentials)?;
        Ok(Self { http })
    }

    pub fn from_env(config: &AwsConfig) -> anyhow::Result<Self> {
        Self::new(config, AwsCredentials::from_env()?)
    }
}

pub(crate) fn validate_template_form(template_body: &str) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .append_pair("Action", "ValidateTemplate")
        .append_pair("Version", API_VERSION)
        .append_pair("TemplateBody", template_body)
        .finish()
}

#[async_trait]
impl TemplateValidator for CloudFormationValidator {
    async fn validate(&self, template_body: &str) -> anyhow::Result<()> {
        let request = AwsRequest::post("/", validate_template_form(template_body).into_bytes())
            .header(
                "content-type",
                "application/x-www-form-urlencoded; charset=utf-8",
            );
        self.http.send(&request).await?;
        debug!(bytes = template_body.len(), "template accepted");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "cloudformation"
    }
}
