pub mod aws;
pub mod llm;
pub mod validator;
