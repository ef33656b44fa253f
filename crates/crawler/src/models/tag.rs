use std::fmt::{Display, Formatter, Result as FmtResult};

/// A browsable tag on a site.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tag {
    /// Display name
    pub name: String,
    /// Identifier passed back to [`Crawler::tag_result`](crate::Crawler::tag_result)
    pub id: String,
}
impl Display for Tag {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.name)
    }
}

/// Tags sharing a category, e.g. "genre" or "region".
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TagGroup {
    pub category: String,
    pub tags: Vec<Tag>,
}

/// Every tag a site offers, grouped by category.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TagGroups {
    pub site: String,
    pub groups: Vec<TagGroup>,
}
impl TagGroups {
    /// Find a tag by id across all categories.
    pub fn find(&self, id: &str) -> Option<&Tag> {
        self.groups.iter().flat_map(|g| g.tags.iter()).find(|t| t.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_across_groups() {
        let tag = |name: &str, id: &str| Tag {
            name: name.to_string(),
            id: id.to_string(),
        };
        let groups = TagGroups {
            site: "qq".to_string(),
            groups: vec![
                TagGroup {
                    category: "genre".to_string(),
                    tags: vec![tag("Adventure", "adv"), tag("Comedy", "com")],
                },
                TagGroup {
                    category: "region".to_string(),
                    tags: vec![tag("Japan", "jp")],
                },
            ],
        };
        assert_eq!(groups.find("jp").map(|t| t.to_string()), Some("Japan".to_string()));
        assert_eq!(groups.find("com").map(|t| t.name.as_str()), Some("Comedy"));
        assert!(groups.find("missing").is_none());
    }
}
