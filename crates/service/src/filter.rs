use std::convert::Infallible;
use std::str::FromStr;
use tankobon_crawler::Registry;

/// Which sites an aggregate query should run against.
///
/// Either every registered site, or an explicit list. An explicit list keeps
/// the first occurrence of each identifier and its position; identifiers the
/// registry does not know are dropped when targets are resolved, without
/// error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteFilter(Option<Vec<String>>);

impl SiteFilter {
    pub fn all() -> Self {
        Self(None)
    }

    /// Restrict to `sites`. An empty list targets nothing.
    pub fn only<I, S>(sites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for site in sites {
            let site = site.into();
            if !unique.contains(&site) {
                unique.push(site);
            }
        }
        Self(Some(unique))
    }

    /// Parse the comma-separated form used in requests (`"qq,manhuagui"`).
    ///
    /// Blank segments are ignored; a string with no site in it at all means
    /// every site.
    pub fn parse(sites: &str) -> Self {
        let sites: Vec<&str> = sites.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
        match sites.is_empty() {
            true => Self::all(),
            false => Self::only(sites),
        }
    }

    pub fn is_all(&self) -> bool {
        self.0.is_none()
    }

    /// The sites to query, in order: registry order for [`all`](Self::all),
    /// first-occurrence order otherwise.
    pub fn targets(&self, registry: &Registry) -> Vec<String> {
        let Some(sites) = &self.0 else {
            return registry.sites().map(str::to_string).collect();
        };
        sites
            .iter()
            .filter(|site| {
                let supported = registry.is_supported(site);
                if !supported {
                    tracing::debug!(site = site.as_str(), "Dropping unsupported site from aggregate query");
                }
                supported
            })
            .cloned()
            .collect()
    }
}

impl<S: Into<String>> FromIterator<S> for SiteFilter {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::only(iter)
    }
}

impl FromStr for SiteFilter {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}
