//! Template validation service seam.

pub mod cloudformation;

use async_trait::async_trait;

pub use cloudformation::CloudFormationValidator;

/// Validates an infrastructure template body. `Ok(())` means accepted; any
/// error means rejected, whatever the cause.
#[async_trait]
pub trait TemplateValidator: Send + Sync {
    async fn validate(&self, template_body: &str) -> anyhow::Result<()>;

    fn name(&self) -> &'static str;
}

/// Accepts every template. For offline runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllValidator;

#[async_trait]
impl TemplateValidator for AcceptAllValidator {
    async fn validate(&self, _template_body: &str) -> anyhow::Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "accept-all"
    }
}

/// Validator backed by a closure.
pub struct FnValidator<F> {
    name: &'static str,
    f: F,
}

impl<F> FnValidator<F>
where
    F: Fn(&str) -> anyhow::Result<()> + Send + Sync,
{
    pub fn new(name: &'static str, f: F) -> Self {
        Self { name, f }
    }
}

#[async_trait]
impl<F> TemplateValidator for FnValidator<F>
where
    F: Fn(&str) -> anyhow::Result<()> + Send + Sync,
{
    async fn validate(&self, template_body: &str) -> anyhow::Result<()> {
        (self.f)(template_body)
    }

    fn name(&self) -> &'static str {
        self.name
    }
}
