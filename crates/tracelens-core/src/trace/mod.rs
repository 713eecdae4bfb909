pub mod conversation;
pub mod extract;
pub mod kind;
pub mod record;
pub mod schema;

/// Attribute keys written by the traceloop SDK on every task span.
pub mod keys {
    pub const WORKFLOW_NAME: &str = "traceloop.workflow.name";
    pub const ENTITY_NAME: &str = "traceloop.entity.name";
    pub const ENTITY_INPUT: &str = "traceloop.entity.input";
    pub const ENTITY_OUTPUT: &str = "traceloop.entity.output";
}

/// Instrumentation scope that carries workflow/task spans.
pub const TASK_SCOPE_NAME: &str = "traceloop.tracer";
