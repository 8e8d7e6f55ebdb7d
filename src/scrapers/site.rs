//! Three-stage walk shared by the HTML news sources.
//!
//! A [`SiteLayout`] knows how to read a source's pages: which categories the
//! home page lists, which article links a category page lists, and what a
//! single article page contains. Parsing is synchronous and works on page
//! text, so layouts are testable against saved HTML. [`SiteScraper`] turns a
//! layout into a [`SourceAdapter`] by doing the downloads.

use async_trait::async_trait;
use chrono::Local;
use scraper::{ElementRef, Selector};
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::errors::SourceError;
use crate::http::Session;
use crate::models::RawArticle;
use crate::scrapers::SourceAdapter;
use crate::utils::{normalize_published_at, truncate_for_log};

/// A rubric listed on the source's home page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub link: String,
}

/// An article link found on a category page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleLink {
    pub link: String,
    /// Some listings carry the headline, others only the article page does.
    pub title: Option<String>,
}

/// Content extracted from one article page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticlePage {
    pub title: Option<String>,
    /// Timestamp as published by the source, before normalization.
    pub published_at: String,
    pub body_text: String,
}

/// Page-reading rules of one HTML news source.
pub trait SiteLayout: Send + Sync {
    fn name(&self) -> &'static str;

    /// Home page; categories are read from it and relative links resolve
    /// against it.
    fn home(&self) -> &'static str;

    fn categories(&self, html: &str, base: &Url) -> Result<Vec<Category>, SourceError>;

    fn article_links(&self, html: &str, base: &Url) -> Result<Vec<ArticleLink>, SourceError>;

    fn article(&self, html: &str) -> Result<ArticlePage, SourceError>;
}

/// [`SourceAdapter`] that drives a [`SiteLayout`] over the network.
#[derive(Debug)]
pub struct SiteScraper<L> {
    layout: L,
}

impl<L: SiteLayout> SiteScraper<L> {
    pub fn new(layout: L) -> Self {
        Self { layout }
    }

    /// Links of one category that are not in the dataset yet.
    async fn new_links(
        &self,
        session: &Session,
        base: &Url,
        category: &Category,
    ) -> Result<Vec<ArticleLink>, SourceError> {
        let html = session.get_html(&category.link).await?;
        let mut links = self.layout.article_links(&html, base)?;
        let listed = links.len();
        let mut listed_here = HashSet::new();
        links.retain(|l| !session.seen().contains(&l.link) && listed_here.insert(l.link.clone()));
        debug!(category = %category.name, listed, new = links.len(), "Category enumerated");
        Ok(links)
    }

    async fn fetch_article(
        &self,
        session: &Session,
        category: &Category,
        link: &ArticleLink,
    ) -> Result<RawArticle, SourceError> {
        let html = session.get_html(&link.link).await?;
        let page = self.layout.article(&html)?;
        let title = page
            .title
            .or_else(|| link.title.clone())
            .ok_or(SourceError::MissingElement("title"))?;
        let today = Local::now().date_naive();
        Ok(RawArticle {
            source_name: self.layout.name().to_string(),
            source_link: self.layout.home().to_string(),
            category_name: category.name.clone(),
            category_link: category.link.clone(),
            published_at: normalize_published_at(&page.published_at, today),
            article_link: link.link.clone(),
            title,
            body_text: page.body_text,
        })
    }
}

#[async_trait]
impl<L: SiteLayout> SourceAdapter for SiteScraper<L> {
    fn name(&self) -> &str {
        self.layout.name()
    }

    #[instrument(level = "info", skip_all, fields(source = self.layout.name()))]
    async fn fetch(&self, session: &Session) -> Result<Vec<RawArticle>, SourceError> {
        let base = Url::parse(self.layout.home())?;
        let home = session.get_html(self.layout.home()).await?;
        let categories = self.layout.categories(&home, &base)?;
        if categories.is_empty() {
            warn!("No categories found, aborting scraping");
            return Ok(Vec::new());
        }
        info!(count = categories.len(), "Categories found");

        let mut articles = Vec::new();
        for category in &categories {
            let links = match self.new_links(session, &base, category).await {
                Ok(links) => links,
                Err(e) => {
                    warn!(category = %category.link, error = %e, "Skipping category");
                    continue;
                }
            };
            for link in &links {
                match self.fetch_article(session, category, link).await {
                    Ok(article) => {
                        debug!(
                            url = %article.article_link,
                            title = %truncate_for_log(&article.title, 80),
                            "Parsed article"
                        );
                        articles.push(article);
                    }
                    Err(e) => warn!(url = %link.link, error = %e, "Skipping article"),
                }
            }
        }
        Ok(articles)
    }
}

/// Compile a CSS selector, reporting the offending text on failure.
pub fn selector(css: &'static str) -> Result<Selector, SourceError> {
    Selector::parse(css).map_err(|e| SourceError::Selector {
        css,
        reason: e.to_string(),
    })
}

/// Whitespace-normalized text of an element.
pub fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text of an element, leaving out every subtree matched by `skip`.
pub fn text_without(element: ElementRef<'_>, skip: &[Selector]) -> String {
    let mut words = Vec::new();
    collect_text(element, skip, &mut words);
    words.join(" ")
}

fn collect_text<'a>(element: ElementRef<'a>, skip: &[Selector], words: &mut Vec<&'a str>) {
    for child in element.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            if skip.iter().any(|s| s.matches(&child_el)) {
                continue;
            }
            collect_text(child_el, skip, words);
        } else if let Some(text) = child.value().as_text() {
            words.extend(text.split_whitespace());
        }
    }
}
