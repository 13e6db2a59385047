//! Generated content shapes and their parsing from raw model output

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::GenerationError;

/// Kind of content a generation request produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    StoryOutline,
    StoryContent,
    StoryRevision,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StoryOutline => "story_outline",
            Self::StoryContent => "story_content",
            Self::StoryRevision => "story_revision",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "story_outline" | "outline" => Ok(Self::StoryOutline),
            "story_content" | "content" | "story" => Ok(Self::StoryContent),
            "story_revision" | "revision" => Ok(Self::StoryRevision),
            other => Err(GenerationError::configuration(format!(
                "unknown content type '{}'",
                other
            ))),
        }
    }
}

/// Inclusive reader age range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeRange {
    pub min: u8,
    pub max: u8,
}

/// What the caller asked for; drives relevance and readability checks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentMetadata {
    pub target_age_range: Option<AgeRange>,
    pub genre: Option<String>,
    pub themes: Vec<String>,
    pub educational_goals: Vec<String>,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterOutline {
    pub title: String,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterProfile {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryOutline {
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub chapters: Vec<ChapterOutline>,
    #[serde(default)]
    pub characters: Vec<CharacterProfile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryContent {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub chapters: Option<Vec<Chapter>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryRevision {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub revision_notes: Vec<String>,
}

/// Parsed content, one variant per content type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GeneratedContent {
    StoryOutline(StoryOutline),
    StoryContent(StoryContent),
    StoryRevision(StoryRevision),
}

impl GeneratedContent {
    /// Parse raw model output as `content_type`.
    ///
    /// JSON output (optionally inside a ```json fence) is tried first. Anything
    /// else is read as plain text: the first line becomes the title when more
    /// than one line is present, the rest becomes the body.
    pub fn parse(content_type: ContentType, raw: &str) -> Self {
        let trimmed = strip_code_fence(raw.trim());

        if trimmed.starts_with('{') {
            let parsed = match content_type {
                ContentType::StoryOutline => {
                    serde_json::from_str::<StoryOutline>(trimmed).map(Self::StoryOutline)
                }
                ContentType::StoryContent => {
                    serde_json::from_str::<StoryContent>(trimmed).map(Self::StoryContent)
                }
                ContentType::StoryRevision => {
                    serde_json::from_str::<StoryRevision>(trimmed).map(Self::StoryRevision)
                }
            };
            match parsed {
                Ok(content) => return content,
                Err(e) => debug!(content_type = %content_type, error = %e, "Raw output is not valid JSON content, reading as text"),
            }
        }

        let (title, body) = split_title(trimmed);
        match content_type {
            ContentType::StoryOutline => Self::StoryOutline(StoryOutline {
                title,
                summary: body,
                chapters: Vec::new(),
                characters: Vec::new(),
            }),
            ContentType::StoryContent => Self::StoryContent(StoryContent {
                title,
                content: body,
                chapters: None,
            }),
            ContentType::StoryRevision => Self::StoryRevision(StoryRevision {
                title,
                content: body,
                revision_notes: Vec::new(),
            }),
        }
    }

    pub fn content_type(&self) -> ContentType {
        match self {
            Self::StoryOutline(_) => ContentType::StoryOutline,
            Self::StoryContent(_) => ContentType::StoryContent,
            Self::StoryRevision(_) => ContentType::StoryRevision,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::StoryOutline(outline) => &outline.title,
            Self::StoryContent(story) => &story.title,
            Self::StoryRevision(revision) => &revision.title,
        }
    }

    /// Prose the quality heuristics run over
    pub fn body_text(&self) -> String {
        match self {
            Self::StoryOutline(outline) => {
                let mut parts = vec![outline.summary.clone()];
                parts.extend(outline.chapters.iter().map(|c| c.summary.clone()));
                parts.extend(outline.characters.iter().map(|c| c.description.clone()));
                parts
                    .into_iter()
                    .filter(|p| !p.trim().is_empty())
                    .collect::<Vec<_>>()
                    .join("\n\n")
            }
            Self::StoryContent(story) => match &story.chapters {
                Some(chapters) if story.content.trim().is_empty() => chapters
                    .iter()
                    .map(|c| c.content.as_str())
                    .collect::<Vec<_>>()
                    .join("\n\n"),
                _ => story.content.clone(),
            },
            Self::StoryRevision(revision) => revision.content.clone(),
        }
    }

    /// Number of chapters the content declares
    pub fn chapter_count(&self) -> usize {
        match self {
            Self::StoryOutline(outline) => outline.chapters.len(),
            Self::StoryContent(story) => story.chapters.as_ref().map(Vec::len).unwrap_or(0),
            Self::StoryRevision(_) => 0,
        }
    }

    /// Characters declared explicitly (outlines only)
    pub fn declared_characters(&self) -> usize {
        match self {
            Self::StoryOutline(outline) => outline.characters.len(),
            _ => 0,
        }
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let Some(rest) = raw.strip_prefix("```") else {
        return raw;
    };
    // Drop the language tag line, then the closing fence
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn split_title(text: &str) -> (String, String) {
    match text.split_once('\n') {
        Some((first, rest)) if !rest.trim().is_empty() => {
            let title = first.trim().trim_start_matches('#').trim();
            let title = if title.is_empty() { "Untitled" } else { title };
            (title.to_string(), rest.trim().to_string())
        }
        _ => ("Untitled".to_string(), text.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_story() {
        let raw = r#"{"title": "The Brave Owl", "content": "Once upon a time..."}"#;
        let content = GeneratedContent::parse(ContentType::StoryContent, raw);
        assert_eq!(content.title(), "The Brave Owl");
        assert_eq!(content.body_text(), "Once upon a time...");
        assert_eq!(content.content_type(), ContentType::StoryContent);
    }

    #[test]
    fn test_parse_fenced_json_outline() {
        let raw = "```json\n{\"title\": \"Stars\", \"summary\": \"A trip.\", \"chapters\": [{\"title\": \"One\", \"summary\": \"Lift off.\"}], \"characters\": [{\"name\": \"Ava\"}]}\n```";
        let content = GeneratedContent::parse(ContentType::StoryOutline, raw);
        assert_eq!(content.title(), "Stars");
        assert_eq!(content.chapter_count(), 1);
        assert_eq!(content.declared_characters(), 1);
        assert_eq!(content.body_text(), "A trip.\n\nLift off.");
    }

    #[test]
    fn test_parse_plain_text_falls_back() {
        let raw = "# The Lost Kite\n\nOne day a kite flew away.";
        let content = GeneratedContent::parse(ContentType::StoryRevision, raw);
        assert_eq!(content.title(), "The Lost Kite");
        assert_eq!(content.body_text(), "One day a kite flew away.");
    }

    #[test]
    fn test_parse_single_line_and_broken_json() {
        let single = GeneratedContent::parse(ContentType::StoryContent, "Just one line.");
        assert_eq!(single.title(), "Untitled");
        assert_eq!(single.body_text(), "Just one line.");

        let broken = GeneratedContent::parse(ContentType::StoryContent, "{\"title\": ");
        assert_eq!(broken.body_text(), "{\"title\":");
    }

    #[test]
    fn test_content_type_from_str() {
        assert_eq!("story_outline".parse::<ContentType>().unwrap(), ContentType::StoryOutline);
        assert_eq!("Revision".parse::<ContentType>().unwrap(), ContentType::StoryRevision);
        assert!("poem".parse::<ContentType>().is_err());
    }
}
