//! Prompt templates used by the dev-team agents.

use switchyard_core::skill::{Skill, SkillLibrary};

/// Skill name for drafting a README.
pub const README: &str = "pm.readme";

const README_TEMPLATE: &str = "\
You are a program manager on a software development team. You are working on an app described below.
Based on the input below, and any dialog or other context, write a raw README.md in markdown documenting the app.
The README should be comprehensive: list the features, describe how to install and run the app, and include a short usage example.
If anything in the request is unclear, list your open questions at the end of the README.
Input: {{$input}}
{{$waf}}";

/// Every skill the dev-team agents invoke.
pub fn library() -> SkillLibrary {
    let mut skills = SkillLibrary::new();
    skills.register(Skill::new(README, README_TEMPLATE));
    skills
}
