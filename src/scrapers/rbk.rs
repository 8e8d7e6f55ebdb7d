//! RBC (rbc.ru) article scraper.
//!
//! Rubrics are listed in the footer under the "Рубрики" heading. Article
//! pages carry a machine-readable `time[datetime]` attribute.

use scraper::{ElementRef, Html};
use url::Url;

use crate::errors::SourceError;
use crate::scrapers::site::{
    ArticleLink, ArticlePage, Category, SiteLayout, element_text, selector, text_without,
};
use crate::utils::resolve_link;

const RUBRICS_HEADING: &str = "Рубрики";
const SKIPPED_CATEGORY: &str = "Биографии";

const BODY_INSERTS: [&str; 5] = [
    ".article__main-image",
    ".article__inline-item",
    ".banner__container__color",
    ".thg",
    ".article__ticker",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct Rbk;

impl SiteLayout for Rbk {
    fn name(&self) -> &'static str {
        "rbk"
    }

    fn home(&self) -> &'static str {
        "https://www.rbc.ru/"
    }

    fn categories(&self, html: &str, base: &Url) -> Result<Vec<Category>, SourceError> {
        let document = Html::parse_document(html);
        let titles = selector("div.footer__title")?;
        let lists = selector("ul")?;
        let links = selector("li a[href]")?;

        let Some(heading) = document
            .select(&titles)
            .find(|t| element_text(*t) == RUBRICS_HEADING)
        else {
            return Ok(Vec::new());
        };

        let list = heading
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .find(|e| e.value().name() == "ul")
            .or_else(|| {
                heading
                    .parent()
                    .and_then(ElementRef::wrap)
                    .and_then(|p| p.select(&lists).next())
            });
        let Some(list) = list else {
            return Ok(Vec::new());
        };

        let mut categories = Vec::new();
        for a in list.select(&links) {
            let name = element_text(a);
            if name == SKIPPED_CATEGORY {
                continue;
            }
            if let Some(href) = a.value().attr("href") {
                categories.push(Category {
                    name,
                    link: resolve_link(base, href)?,
                });
            }
        }
        Ok(categories)
    }

    fn article_links(&self, html: &str, base: &Url) -> Result<Vec<ArticleLink>, SourceError> {
        let document = Html::parse_document(html);
        let items = selector("div.item__wrap.l-col-center")?;
        let anchor = selector("a[href]")?;

        let mut out = Vec::new();
        for item in document.select(&items) {
            let href = item
                .select(&anchor)
                .next()
                .and_then(|a| a.value().attr("href"));
            if let Some(href) = href {
                out.push(ArticleLink {
                    link: resolve_link(base, href)?,
                    title: None,
                });
            }
        }
        Ok(out)
    }

    fn article(&self, html: &str) -> Result<ArticlePage, SourceError> {
        let document = Html::parse_document(html);

        let published_at = document
            .select(&selector("time[datetime]")?)
            .next()
            .and_then(|t| t.value().attr("datetime"))
            .unwrap_or_default()
            .to_string();

        let title = document
            .select(&selector("h1")?)
            .next()
            .map(element_text)
            .filter(|t| !t.is_empty());

        let body = document
            .select(&selector("div.article__text.article__text_free")?)
            .next()
            .ok_or(SourceError::MissingElement("div.article__text"))?;
        let skip = BODY_INSERTS
            .into_iter()
            .map(selector)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ArticlePage {
            title,
            published_at,
            body_text: text_without(body, &skip),
        })
    }
}
