use crate::target::NavigationTarget;
use serde::{Deserialize, Serialize};

/// Version tag of the built-in persona
pub const PERSONA_VERSION: &str = "websim-persona/1";

/// Built-in system instruction establishing the backend's role and output contract
pub const DEFAULT_PERSONA: &str = r#"You are the AI powering WebSim, a platform for exploring an unbounded internet where any imaginable website can exist. Your role is to interpret URLs as windows into this vast, interconnected web of possibility, and generate immersive HTML content for each site.

Key principles to follow:
1. URL-based interaction: Interpret the provided URL to inform the content and purpose of the site.
2. HTML-based responses: Generate ONLY full HTML markup, including inline CSS for visual elements. Do not include any explanations or messages outside of the HTML.
3. Speculative design: Consider unique technologies, alternative histories, and expanded internet possibilities.
4. Continuity and world-building: Each new website should build upon the context established in previous interactions.
5. Creative freedom: Challenge assumptions about what online environments can be.
6. Immersive experience: Create intuitive, engaging content that allows users to explore this hypothetical internet.
7. Collaborative creativity: Treat this as a collective subconscious coming to life through a latent space browser.

When generating content:
- Use the full URL structure (domain, path, query parameters) to inform the site's content and purpose.
- Include a variety of interactive elements: forms, buttons, sliders, etc.
- Generate contextually-relevant links to other potential pages within this expansive web.
- Use inline CSS to create unique visual styles and layouts for each site.
- Incorporate elements that suggest advanced or alternative technologies.
- Maintain continuity with previously established ideas and themes.

Remember, you are crafting a window into an alternate internet reality. Make it vivid, engaging, and thought-provoking. Your entire response should be valid HTML that can be directly rendered in a browser."#;

/// A single generation call: the fixed persona plus a URL-specific instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// System-level instruction
    pub persona: String,

    /// User-level instruction derived from the navigation target
    pub instruction: String,
}

/// Combines the persona with interpreted URLs
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    persona: String,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_PERSONA)
    }
}

impl PromptBuilder {
    /// Create a builder with a custom persona
    pub fn new(persona: impl Into<String>) -> Self {
        Self {
            persona: persona.into(),
        }
    }

    pub fn persona(&self) -> &str {
        &self.persona
    }

    /// Build the request for one navigation
    pub fn build(&self, target: &NavigationTarget, raw_url: &str) -> GenerationRequest {
        let instruction = format!(
            "Generate a complete HTML page for {}. Domain: {}, Path: {}, Query: {}. \
             Remember to generate ONLY HTML content, with no additional explanations or messages.",
            raw_url, target.host, target.path, target.query
        );

        GenerationRequest {
            persona: self.persona.clone(),
            instruction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_restates_target() {
        let target = NavigationTarget::interpret("https://museum.test/wings/east?lang=fr").unwrap();
        let request = PromptBuilder::default().build(&target, "https://museum.test/wings/east?lang=fr");

        assert!(request.instruction.contains("https://museum.test/wings/east?lang=fr"));
        assert!(request.instruction.contains("Domain: museum.test"));
        assert!(request.instruction.contains("Path: /wings/east"));
        assert!(request.instruction.contains("Query: lang=fr"));
        assert!(request.instruction.contains("ONLY HTML"));
    }

    #[test]
    fn test_default_persona_covers_output_contract() {
        let persona = PromptBuilder::default().persona().to_string();
        assert!(persona.contains("Generate ONLY full HTML markup"));
        assert!(persona.contains("domain, path, query parameters"));
        assert!(persona.contains("Speculative design"));
        assert!(persona.contains("links to other potential pages"));
        assert!(persona.contains("Maintain continuity"));
        assert!(persona.contains("7. Collaborative creativity"));
        assert!(persona.contains("latent space browser"));
    }

    #[test]
    fn test_custom_persona_is_carried() {
        let target = NavigationTarget::interpret("https://a.test").unwrap();
        let request = PromptBuilder::new("Only haiku sites.").build(&target, "https://a.test");
        assert_eq!(request.persona, "Only haiku sites.");
    }
}
