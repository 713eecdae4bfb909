/// Collapse transcript role prefixes to `H:` / `A:` so the embedded
/// conversation does not read as turns of the judge prompt itself.
pub fn normalize_roles(full_prompt: &str) -> String {
    full_prompt
        .replace("Human:", "H:")
        .replace("Assistant:", "A:")
}

/// Fill the fixed two-question evaluation template.
///
/// Single-pass formatting: braces inside the conversation or the template
/// are never re-interpreted as placeholders.
pub fn build_judge_prompt(conversation: &str, template: &str) -> String {
    format!(
        "\n\nHuman: You are an expert AWS cloud engineer who knows everything about AWS and infrastructure as code.\n\
         Your job is to evaluate the following CloudFormation template which was provided to a human (H) by an assistant (A) based on the conversational context below.\n\
         Here is the original conversation right before the template was provided.\n\
         \n\
         <conversation>\n\
         {conversation}\n\
         </conversation>\n\
         \n\
         <cloudformation-template>\n\
         {template}\n\
         </cloudformation-template>\n\
         \n\
         Answer the following questions in a markdown numbered list where each answer contains only one word \"yes\" or \"no\".\n\
         Preserve the order of the questions in your answered list.\n\
         \n\
         1. Are there any glaring security issues in the template?\n\
         2. Does the template accomplish what the human was asking for?\n\
         \n\
         Assistant: Here are the answers to your questions.\n"
    )
}
