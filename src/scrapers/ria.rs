//! RIA Novosti (ria.ru) article scraper.
//!
//! Rubrics come from the extension table of the home page. Listings carry
//! the headline, so article pages are only read for the date and body.
//! Dates look like `14:32 16.10.2026`.

use scraper::Html;
use url::Url;

use crate::errors::SourceError;
use crate::scrapers::site::{
    ArticleLink, ArticlePage, Category, SiteLayout, element_text, selector,
};
use crate::utils::resolve_link;

/// Body blocks that embed other articles or photo galleries.
const SKIPPED_BLOCK_TYPES: [&str; 2] = ["article", "photolenta"];

#[derive(Debug, Clone, Copy, Default)]
pub struct Ria;

impl SiteLayout for Ria {
    fn name(&self) -> &'static str {
        "ria"
    }

    fn home(&self) -> &'static str {
        "https://ria.ru/"
    }

    fn categories(&self, html: &str, base: &Url) -> Result<Vec<Category>, SourceError> {
        let document = Html::parse_document(html);
        let Some(table) = document
            .select(&selector("div.cell-extension__table")?)
            .next()
        else {
            return Ok(Vec::new());
        };

        let mut categories = Vec::new();
        for a in table.select(&selector("a[href]")?) {
            if let Some(href) = a.value().attr("href") {
                categories.push(Category {
                    name: element_text(a),
                    link: resolve_link(base, href)?,
                });
            }
        }
        Ok(categories)
    }

    fn article_links(&self, html: &str, base: &Url) -> Result<Vec<ArticleLink>, SourceError> {
        let document = Html::parse_document(html);
        let titles = selector("div.list-item__content a.list-item__title[href]")?;

        let mut out = Vec::new();
        for a in document.select(&titles) {
            if let Some(href) = a.value().attr("href") {
                let title = element_text(a);
                out.push(ArticleLink {
                    link: resolve_link(base, href)?,
                    title: (!title.is_empty()).then_some(title),
                });
            }
        }
        Ok(out)
    }

    fn article(&self, html: &str) -> Result<ArticlePage, SourceError> {
        let document = Html::parse_document(html);

        let published_at = document
            .select(&selector("div.article__info-date a")?)
            .next()
            .map(element_text)
            .ok_or(SourceError::MissingElement("div.article__info-date"))?;

        let blocks = selector("div.article__body div.article__block")?;
        let body_text = document
            .select(&blocks)
            .filter(|b| {
                b.value()
                    .attr("data-type")
                    .is_none_or(|t| !SKIPPED_BLOCK_TYPES.contains(&t))
            })
            .map(element_text)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        Ok(ArticlePage {
            title: None,
            published_at,
            body_text,
        })
    }
}
