use crate::models::UserProfile;

/// Append the student context block to `system_prompt` when a profile is present
pub fn assemble_system_prompt(system_prompt: &str, profile: Option<&UserProfile>) -> String {
    let Some(profile) = profile else {
        return system_prompt.to_string();
    };

    format!(
        "{system_prompt}\n\nStudent Context:\n- Education Level: {}\n- Learning Style: {}\n- Interests: {}\n- Additional Info: {}",
        profile.education_level,
        profile.learning_style,
        profile.interests.join(", "),
        profile.additional_info,
    )
}
