use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeSet;
use url::Url;

lazy_static! {
    static ref RE_PROFILE: Regex = Regex::new(r"/(?:en/)?persons/[\w-]+").expect("valid regex");
    static ref RE_YEAR: Regex = Regex::new(r"(19|20)\d{2}").expect("valid regex");
}

/// Listing-page metadata for one publication; completed by the detail fetch.
#[derive(Debug, Clone)]
pub struct PublicationStub {
    pub title: String,
    pub authors: Vec<String>,
    pub year: Option<String>,
    pub url: Url,
}

#[derive(Debug, Clone, Default)]
pub struct PublicationDetails {
    pub abstract_text: String,
    pub keywords: Vec<String>,
}

/// Compiled selectors for the portal's markup, built once at startup.
pub struct Selectors {
    anchor: Selector,
    header: Selector,
    container: Selector,
    title: Selector,
    link: Selector,
    date: Selector,
    authors: Selector,
    next_link: Selector,
    abstract_block: Selector,
    heading: Selector,
    list_item: Selector,
    fingerprint: Selector,
}

impl Selectors {
    pub fn new() -> Self {
        Self {
            anchor: Selector::parse("a[href]").expect("valid selector"),
            header: Selector::parse(".header h1, .header h2, h1").expect("valid selector"),
            container: Selector::parse(
                ".list-results .result-container, .list-results .result-item, \
                 .rendering_researchoutput, article.publication",
            )
            .expect("valid selector"),
            title: Selector::parse(".title").expect("valid selector"),
            link: Selector::parse("a.link, .title a").expect("valid selector"),
            date: Selector::parse(".date, .year").expect("valid selector"),
            authors: Selector::parse(".authors").expect("valid selector"),
            next_link: Selector::parse(".nextLink").expect("valid selector"),
            abstract_block: Selector::parse(
                ".rendering_researchoutput_abstractportal .textblock, \
                 .abstract .textblock, .rendering_researchoutput .textblock",
            )
            .expect("valid selector"),
            heading: Selector::parse("h2, h3").expect("valid selector"),
            list_item: Selector::parse("li").expect("valid selector"),
            fingerprint: Selector::parse(".fingerprint-tag").expect("valid selector"),
        }
    }
}

impl Default for Selectors {
    fn default() -> Self {
        Self::new()
    }
}

fn element_text(el: ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Author profile links on a listing page, restricted to the portal host and
/// deduplicated in sorted order for a deterministic traversal.
pub fn profile_links(body: &str, base: &Url, sels: &Selectors) -> Vec<Url> {
    let html = Html::parse_document(body);
    let base_host = base.host_str().unwrap_or_default().to_string();
    let mut links: BTreeSet<String> = BTreeSet::new();
    for a in html.select(&sels.anchor) {
        let Some(href) = a.value().attr("href") else { continue };
        if !RE_PROFILE.is_match(href) {
            continue;
        }
        if let Ok(joined) = base.join(href) {
            if joined.host_str() == Some(base_host.as_str()) {
                links.insert(joined.to_string());
            }
        }
    }
    links.iter().filter_map(|s| Url::parse(s).ok()).collect()
}

pub fn author_name(body: &str, sels: &Selectors) -> String {
    let html = Html::parse_document(body);
    html.select(&sels.header)
        .map(element_text)
        .find(|t| !t.is_empty())
        .unwrap_or_else(|| "Unknown Author".to_string())
}

/// Publication metadata from a profile listing page. The profile's author is
/// the fallback when a container carries no authors of its own.
pub fn publication_stubs(
    body: &str,
    profile_url: &Url,
    author: &str,
    sels: &Selectors,
) -> Vec<PublicationStub> {
    let html = Html::parse_document(body);
    let mut stubs = Vec::new();
    for container in html.select(&sels.container) {
        let Some(title_el) = container.select(&sels.title).next() else { continue };
        let title = element_text(title_el);
        if title.is_empty() {
            continue;
        }

        let url = container
            .select(&sels.link)
            .find_map(|a| a.value().attr("href"))
            .and_then(|href| profile_url.join(href).ok())
            .unwrap_or_else(|| profile_url.clone());

        let year = container
            .select(&sels.date)
            .next()
            .and_then(|el| RE_YEAR.find(&element_text(el)).map(|m| m.as_str().to_string()));

        let authors = container
            .select(&sels.authors)
            .next()
            .map(|el| {
                element_text(el)
                    .split([',', '&', ';'])
                    .map(|a| a.trim().to_string())
                    .filter(|a| !a.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| vec![author.to_string()]);

        stubs.push(PublicationStub { title, authors, year, url });
    }
    stubs
}

/// The `.nextLink` pagination anchor, if the listing has another page.
pub fn next_page(body: &str, base: &Url, sels: &Selectors) -> Option<Url> {
    let html = Html::parse_document(body);
    html.select(&sels.next_link)
        .find_map(|el| el.value().attr("href").map(str::to_string))
        .and_then(|href| base.join(&href).ok())
}

/// Abstract text and keywords from a publication detail page. Keywords come
/// from the list following a "Keywords" heading plus any fingerprint tags.
pub fn publication_details(body: &str, sels: &Selectors) -> PublicationDetails {
    let html = Html::parse_document(body);
    let mut details = PublicationDetails::default();

    if let Some(el) = html.select(&sels.abstract_block).next() {
        details.abstract_text = element_text(el);
    }

    for heading in html.select(&sels.heading) {
        if !element_text(heading).to_lowercase().contains("keyword") {
            continue;
        }
        let list = heading
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "ul");
        if let Some(ul) = list {
            for li in ul.select(&sels.list_item) {
                let kw = element_text(li);
                if !kw.is_empty() && !details.keywords.contains(&kw) {
                    details.keywords.push(kw);
                }
            }
        }
    }

    for tag in html.select(&sels.fingerprint) {
        let kw = element_text(tag);
        if !kw.is_empty() && !details.keywords.contains(&kw) {
            details.keywords.push(kw);
        }
    }

    details
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://pureportal.example.ac.uk/en/organisations/centre").unwrap()
    }

    #[test]
    fn finds_profile_links_on_the_portal_host() {
        let body = r#"
            <html><body>
              <a href="/en/persons/jane-doe">Jane Doe</a>
              <a href="/en/persons/john-smith">John Smith</a>
              <a href="/en/persons/jane-doe">Jane again</a>
              <a href="https://elsewhere.example.com/en/persons/other">Other</a>
              <a href="/en/publications/x">Not a person</a>
            </body></html>"#;
        let links = profile_links(body, &base(), &Selectors::new());
        assert_eq!(links.len(), 2);
        assert!(links.iter().all(|u| u.path().starts_with("/en/persons/")));
    }

    #[test]
    fn extracts_stubs_with_year_and_authors() {
        let body = r#"
            <div class="list-results">
              <div class="result-container">
                <h3 class="title"><a href="/en/publications/gas-turbines">Advances in Gas Turbine Design</a></h3>
                <span class="authors">Doe, J. &amp; Smith, A.</span>
                <span class="date">12 Mar 2022</span>
              </div>
              <div class="result-container">
                <h3 class="title"><a href="/en/publications/wind">Offshore Wind Energy</a></h3>
              </div>
            </div>"#;
        let profile = Url::parse("https://pureportal.example.ac.uk/en/persons/jane-doe").unwrap();
        let stubs = publication_stubs(body, &profile, "Jane Doe", &Selectors::new());
        assert_eq!(stubs.len(), 2);
        assert_eq!(stubs[0].title, "Advances in Gas Turbine Design");
        assert_eq!(stubs[0].year.as_deref(), Some("2022"));
        assert_eq!(stubs[0].authors, vec!["Doe", "J.", "Smith", "A."]);
        // Second container has no authors of its own: profile author wins.
        assert_eq!(stubs[1].authors, vec!["Jane Doe"]);
        assert_eq!(stubs[1].year, None);
    }

    #[test]
    fn follows_next_link() {
        let body = r#"<a class="nextLink" href="?page=1">Next</a>"#;
        let profile = Url::parse("https://pureportal.example.ac.uk/en/persons/jane-doe").unwrap();
        let next = next_page(body, &profile, &Selectors::new()).unwrap();
        assert_eq!(next.query(), Some("page=1"));
    }

    #[test]
    fn scrapes_abstract_and_keywords() {
        let body = r#"
            <div class="rendering_researchoutput_abstractportal">
              <div class="textblock">We study combustion stability.</div>
            </div>
            <h3>Keywords</h3>
            <ul><li>turbine</li><li>combustion</li></ul>
            <span class="fingerprint-tag">Thermodynamics</span>
            <span class="fingerprint-tag">turbine</span>"#;
        let details = publication_details(body, &Selectors::new());
        assert_eq!(details.abstract_text, "We study combustion stability.");
        assert_eq!(details.keywords, vec!["turbine", "combustion", "Thermodynamics"]);
    }

    #[test]
    fn missing_sections_yield_defaults() {
        let details = publication_details("<html><body><p>nothing</p></body></html>", &Selectors::new());
        assert!(details.abstract_text.is_empty());
        assert!(details.keywords.is_empty());
    }
}
