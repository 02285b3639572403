/// Placeholder values available to every generated page.
#[derive(Debug, Clone, Copy)]
pub struct TemplateVars<'a> {
    pub url: &'a str,
    pub version: &'a str,
    pub link: &'a str,
}

/// Post-processing applied to a buffered body before it is sent. A closed set:
/// anything not listed here is sent as read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transform {
    /// Fill `##URL##`, `##VERSION##` and `##LINK##` in a not-found page.
    NotFoundPage,
    /// Fill the common placeholders in the template, then insert the
    /// rendered table at the first `##LISTING##`. The table itself is never
    /// scanned for placeholders.
    DirectoryListing(String),
}

impl Transform {
    pub fn apply(&self, template: &str, vars: &TemplateVars) -> String {
        match self {
            Transform::NotFoundPage => fill_placeholders(template, vars),
            Transform::DirectoryListing(listing) => match template.split_once("##LISTING##") {
                Some((before, after)) => format!(
                    "{}{}{}",
                    fill_placeholders(before, vars),
                    listing,
                    fill_placeholders(after, vars)
                ),
                None => fill_placeholders(template, vars),
            },
        }
    }
}

fn fill_placeholders(page: &str, vars: &TemplateVars) -> String {
    page.replace("##URL##", &html_escape(vars.url))
        .replace("##VERSION##", vars.version)
        .replace("##LINK##", vars.link)
}

pub fn html_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
