//! Page selectors for multi-page exports.
//!
//! Accepted forms (pages are 1-based):
//! - `all`
//! - a single range `3-7` (inclusive, either order)
//! - a comma list mixing numbers and ranges: `1,3,5-9`
//!
//! Parsing checks syntax only. [`PageSelection::resolve`] applies it to a
//! document: pages past the end are dropped, and a selection that keeps no
//! page at all is an error.

use std::collections::BTreeSet;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PageError {
    #[error("empty page selector")]
    Empty,
    #[error("invalid page selector '{0}': expected a page number or range like 2-5")]
    Invalid(String),
    #[error("page numbers start at 1")]
    Zero,
    #[error("selector '{selector}' matches no page in a {total}-page document")]
    NoValidPages { selector: String, total: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageSelection {
    All,
    /// Inclusive ranges in the order written.
    Ranges(Vec<(u32, u32)>),
}

impl PageSelection {
    pub fn parse(input: &str) -> Result<Self, PageError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(PageError::Empty);
        }
        if trimmed.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }

        let mut ranges = Vec::new();
        for part in trimmed.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let range = match part.split_once('-') {
                Some((a, b)) => {
                    let (a, b) = (parse_page(a, part)?, parse_page(b, part)?);
                    (a.min(b), a.max(b))
                }
                None => {
                    let n = parse_page(part, part)?;
                    (n, n)
                }
            };
            ranges.push(range);
        }
        if ranges.is_empty() {
            return Err(PageError::Empty);
        }
        Ok(Self::Ranges(ranges))
    }

    /// Sorted, de-duplicated 1-based pages that exist in a `total`-page document.
    pub fn resolve(&self, total: u32) -> Result<Vec<u32>, PageError> {
        let pages: BTreeSet<u32> = match self {
            Self::All => (1..=total).collect(),
            Self::Ranges(ranges) => ranges
                .iter()
                .flat_map(|&(a, b)| a..=b.min(total))
                .collect(),
        };
        if pages.is_empty() {
            return Err(PageError::NoValidPages {
                selector: self.to_string(),
                total,
            });
        }
        Ok(pages.into_iter().collect())
    }
}

fn parse_page(text: &str, part: &str) -> Result<u32, PageError> {
    let n: u32 = text
        .trim()
        .parse()
        .map_err(|_| PageError::Invalid(part.to_string()))?;
    if n == 0 {
        return Err(PageError::Zero);
    }
    Ok(n)
}

impl FromStr for PageSelection {
    type Err = PageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for PageSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Ranges(ranges) => {
                let parts: Vec<String> = ranges
                    .iter()
                    .map(|&(a, b)| if a == b { a.to_string() } else { format!("{a}-{b}") })
                    .collect();
                f.write_str(&parts.join(","))
            }
        }
    }
}
